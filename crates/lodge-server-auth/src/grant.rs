// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-property access grants.
//!
//! A grant is an explicit `(user, property)` ACL row carrying a preset role and
//! six capability flags. Owners never get a persisted row; their access is
//! synthesized at read time as [`Grant::Owner`], which has no persisted id and
//! therefore cannot be revoked or written back.
//!
//! [`PropertyGrantStore`] does not check who is granting. Callers gate it with
//! the permission service first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

use crate::directory::{PropertyDirectory, UserDirectory};
use crate::error::{AuthError, Result};
use crate::types::{GrantId, PropertyId, UnknownVariant, UserId};

// =============================================================================
// Roles and flags
// =============================================================================

/// Named flag bundle a grant starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantRole {
	Caretaker,
	Agent,
	Readonly,
	Custom,
}

impl GrantRole {
	pub fn all() -> &'static [GrantRole] {
		&[
			GrantRole::Caretaker,
			GrantRole::Agent,
			GrantRole::Readonly,
			GrantRole::Custom,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			GrantRole::Caretaker => "caretaker",
			GrantRole::Agent => "agent",
			GrantRole::Readonly => "readonly",
			GrantRole::Custom => "custom",
		}
	}
}

impl fmt::Display for GrantRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for GrantRole {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		GrantRole::all()
			.iter()
			.copied()
			.find(|r| r.as_str() == s)
			.ok_or_else(|| UnknownVariant {
				kind: "grant role",
				value: s.to_string(),
			})
	}
}

/// The capability flags stored on a grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityFlags {
	pub can_manage_tenants: bool,
	pub can_manage_leases: bool,
	pub can_collect_payments: bool,
	pub can_view_financials: bool,
	pub can_manage_maintenance: bool,
	pub can_manage_properties: bool,
}

impl CapabilityFlags {
	pub fn all() -> Self {
		Self {
			can_manage_tenants: true,
			can_manage_leases: true,
			can_collect_payments: true,
			can_view_financials: true,
			can_manage_maintenance: true,
			can_manage_properties: true,
		}
	}

	pub fn none() -> Self {
		Self::default()
	}

	/// Base flags for a grant role. `Custom` starts from nothing.
	pub fn preset(role: GrantRole) -> Self {
		match role {
			GrantRole::Caretaker => Self {
				can_manage_tenants: true,
				can_manage_maintenance: true,
				..Self::none()
			},
			GrantRole::Agent => Self {
				can_manage_properties: false,
				..Self::all()
			},
			GrantRole::Readonly | GrantRole::Custom => Self::none(),
		}
	}
}

/// Per-flag overrides applied on top of a preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPermissions {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub can_manage_tenants: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub can_manage_leases: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub can_collect_payments: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub can_view_financials: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub can_manage_maintenance: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub can_manage_properties: Option<bool>,
}

impl CustomPermissions {
	/// Overwrites only the flags that are set here.
	pub fn apply(&self, mut flags: CapabilityFlags) -> CapabilityFlags {
		if let Some(v) = self.can_manage_tenants {
			flags.can_manage_tenants = v;
		}
		if let Some(v) = self.can_manage_leases {
			flags.can_manage_leases = v;
		}
		if let Some(v) = self.can_collect_payments {
			flags.can_collect_payments = v;
		}
		if let Some(v) = self.can_view_financials {
			flags.can_view_financials = v;
		}
		if let Some(v) = self.can_manage_maintenance {
			flags.can_manage_maintenance = v;
		}
		if let Some(v) = self.can_manage_properties {
			flags.can_manage_properties = v;
		}
		flags
	}
}

/// Resolves the flags a grant is stored with.
///
/// `Custom` requires overrides. Every other role starts from its preset and
/// applies any overrides on top.
pub fn resolve_flags(
	role: GrantRole,
	custom: Option<&CustomPermissions>,
) -> Result<CapabilityFlags> {
	let base = CapabilityFlags::preset(role);
	match (role, custom) {
		(GrantRole::Custom, None) => Err(AuthError::Validation(
			"custom permissions are required when role is custom".to_string(),
		)),
		(_, Some(overrides)) => Ok(overrides.apply(base)),
		(_, None) => Ok(base),
	}
}

// =============================================================================
// Grants
// =============================================================================

/// A persisted grant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyGrant {
	pub id: GrantId,
	pub user_id: UserId,
	pub property_id: PropertyId,
	pub role: GrantRole,
	#[serde(flatten)]
	pub flags: CapabilityFlags,
	pub granted_by: UserId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Input to [`GrantStore::upsert_grant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
	pub user_id: UserId,
	pub property_id: PropertyId,
	pub role: GrantRole,
	pub flags: CapabilityFlags,
	pub granted_by: UserId,
}

/// Full access derived from ownership. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerGrant {
	pub user_id: UserId,
	pub property_id: PropertyId,
}

impl OwnerGrant {
	pub fn id(&self) -> String {
		format!("owner-{}", self.property_id)
	}
}

/// What a user sees when listing their access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
	Explicit(PropertyGrant),
	Owner(OwnerGrant),
}

impl Grant {
	/// Display id. Owner grants use an `owner-` prefix.
	pub fn id(&self) -> String {
		match self {
			Grant::Explicit(g) => g.id.to_string(),
			Grant::Owner(g) => g.id(),
		}
	}

	pub fn property_id(&self) -> PropertyId {
		match self {
			Grant::Explicit(g) => g.property_id,
			Grant::Owner(g) => g.property_id,
		}
	}

	pub fn user_id(&self) -> UserId {
		match self {
			Grant::Explicit(g) => g.user_id,
			Grant::Owner(g) => g.user_id,
		}
	}

	pub fn flags(&self) -> CapabilityFlags {
		match self {
			Grant::Explicit(g) => g.flags,
			Grant::Owner(_) => CapabilityFlags::all(),
		}
	}

	pub fn is_synthesized(&self) -> bool {
		matches!(self, Grant::Owner(_))
	}
}

/// Uniform wire shape for UI listing.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GrantView {
	id: String,
	user_id: UserId,
	property_id: PropertyId,
	role: &'static str,
	#[serde(flatten)]
	flags: CapabilityFlags,
	is_owner: bool,
}

impl Serialize for Grant {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		let role = match self {
			Grant::Explicit(g) => g.role.as_str(),
			Grant::Owner(_) => "owner",
		};
		GrantView {
			id: self.id(),
			user_id: self.user_id(),
			property_id: self.property_id(),
			role,
			flags: self.flags(),
			is_owner: self.is_synthesized(),
		}
		.serialize(serializer)
	}
}

/// A grant annotated for audit display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedGrant {
	#[serde(flatten)]
	pub grant: PropertyGrant,
	pub user_name: String,
	pub user_email: String,
	pub granted_by_name: Option<String>,
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
pub trait GrantStore: Send + Sync {
	/// Inserts or updates the grant for `(user_id, property_id)` atomically.
	async fn upsert_grant(&self, grant: &NewGrant) -> Result<PropertyGrant>;

	/// Returns false if no grant existed.
	async fn delete_grant(&self, user_id: UserId, property_id: PropertyId) -> Result<bool>;

	async fn get_grant(&self, user_id: UserId, property_id: PropertyId)
		-> Result<Option<PropertyGrant>>;

	async fn list_grants_for_user(&self, user_id: UserId) -> Result<Vec<PropertyGrant>>;

	async fn list_grants_for_property(&self, property_id: PropertyId)
		-> Result<Vec<AnnotatedGrant>>;
}

/// Property ACL operations.
#[derive(Clone)]
pub struct PropertyGrantStore {
	grants: Arc<dyn GrantStore>,
	properties: Arc<dyn PropertyDirectory>,
	users: Arc<dyn UserDirectory>,
}

impl PropertyGrantStore {
	pub fn new(
		grants: Arc<dyn GrantStore>,
		properties: Arc<dyn PropertyDirectory>,
		users: Arc<dyn UserDirectory>,
	) -> Self {
		Self {
			grants,
			properties,
			users,
		}
	}

	/// Creates or updates the grant for `(user_id, property_id)`.
	#[instrument(skip(self, custom), fields(%granter, %property_id, %user_id, %role))]
	pub async fn assign_permission(
		&self,
		granter: UserId,
		property_id: PropertyId,
		user_id: UserId,
		role: GrantRole,
		custom: Option<&CustomPermissions>,
	) -> Result<PropertyGrant> {
		let flags = resolve_flags(role, custom)?;

		if self.properties.get_property_by_id(property_id).await?.is_none() {
			return Err(AuthError::PropertyNotFound(property_id));
		}
		if self.users.get_user_by_id(user_id).await?.is_none() {
			return Err(AuthError::UserNotFound(user_id));
		}

		let grant = self
			.grants
			.upsert_grant(&NewGrant {
				user_id,
				property_id,
				role,
				flags,
				granted_by: granter,
			})
			.await?;

		tracing::info!(grant_id = %grant.id, "property permission assigned");
		Ok(grant)
	}

	/// Deletes the grant. A missing grant is an error.
	#[instrument(skip(self), fields(%property_id, %user_id))]
	pub async fn revoke_permission(&self, property_id: PropertyId, user_id: UserId) -> Result<()> {
		if !self.grants.delete_grant(user_id, property_id).await? {
			return Err(AuthError::GrantNotFound {
				user_id,
				property_id,
			});
		}
		tracing::info!("property permission revoked");
		Ok(())
	}

	/// Explicit grants plus synthesized owner grants.
	///
	/// For owner-class users every owned property appears once as an owner
	/// grant; an explicit grant on an owned property is superseded.
	#[instrument(skip(self), fields(%user_id))]
	pub async fn get_permissions_for_user(&self, user_id: UserId) -> Result<Vec<Grant>> {
		let user = self
			.users
			.get_user_by_id(user_id)
			.await?
			.ok_or(AuthError::UserNotFound(user_id))?;

		let mut owned = HashSet::new();
		let mut result = Vec::new();
		if user.role.is_owner_class() {
			for property in self.properties.list_properties_owned_by(user_id).await? {
				if owned.insert(property.id) {
					result.push(Grant::Owner(OwnerGrant {
						user_id,
						property_id: property.id,
					}));
				}
			}
		}

		for grant in self.grants.list_grants_for_user(user_id).await? {
			if !owned.contains(&grant.property_id) {
				result.push(Grant::Explicit(grant));
			}
		}

		tracing::debug!(count = result.len(), "resolved user grants");
		Ok(result)
	}

	/// Grants on a property annotated with grantee and granter names.
	#[instrument(skip(self), fields(%property_id))]
	pub async fn get_permissions_for_property(
		&self,
		property_id: PropertyId,
	) -> Result<Vec<AnnotatedGrant>> {
		if self.properties.get_property_by_id(property_id).await?.is_none() {
			return Err(AuthError::PropertyNotFound(property_id));
		}
		self.grants.list_grants_for_property(property_id).await
	}
}
