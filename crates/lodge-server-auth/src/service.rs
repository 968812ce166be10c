// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Property ACL management surface.
//!
//! Every call first establishes that the actor may manage grants on the
//! property: an admin, the owner of the property's organization, or the
//! property's direct owner. Only then is [`PropertyGrantStore`] touched.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

use crate::actor::Actor;
use crate::directory::{OrganizationDirectory, Property, PropertyDirectory, User, UserDirectory};
use crate::error::{AuthError, Result};
use crate::grant::{AnnotatedGrant, CustomPermissions, Grant, GrantRole, PropertyGrant, PropertyGrantStore};
use crate::types::{PropertyId, Role, UserId};

/// A member who could receive a grant on a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignableUser {
	#[serde(flatten)]
	pub user: User,
	pub has_permission: bool,
}

#[derive(Clone)]
pub struct PermissionsService {
	grants: PropertyGrantStore,
	organizations: Arc<dyn OrganizationDirectory>,
	properties: Arc<dyn PropertyDirectory>,
	users: Arc<dyn UserDirectory>,
}

impl PermissionsService {
	pub fn new(
		grants: PropertyGrantStore,
		organizations: Arc<dyn OrganizationDirectory>,
		properties: Arc<dyn PropertyDirectory>,
		users: Arc<dyn UserDirectory>,
	) -> Self {
		Self {
			grants,
			organizations,
			properties,
			users,
		}
	}

	/// Loads the property if `actor` may manage its grants.
	#[instrument(skip(self, actor), fields(user_id = ?actor.map(|a| a.user_id), %property_id))]
	pub async fn require_grant_manager(
		&self,
		actor: Option<&Actor>,
		property_id: PropertyId,
	) -> Result<Property> {
		let Some(actor) = actor else {
			return Err(AuthError::AuthenticationRequired);
		};
		let property = self
			.properties
			.get_property_by_id(property_id)
			.await?
			.ok_or(AuthError::PropertyNotFound(property_id))?;

		if actor.is_admin() || property.owner_id == Some(actor.user_id) {
			return Ok(property);
		}

		let org = self
			.organizations
			.get_organization_by_id(property.organization_id)
			.await?
			.ok_or(AuthError::OrgNotFound(property.organization_id))?;
		if actor.role == Role::AgentOwner && org.is_owned_by(actor.user_id) {
			return Ok(property);
		}

		tracing::debug!("actor may not manage grants on property");
		Err(AuthError::Forbidden(
			"only the property owner, organization owner or an admin can manage permissions"
				.to_string(),
		))
	}

	#[instrument(skip(self, actor, custom), fields(%property_id, %user_id, %role))]
	pub async fn assign_permission(
		&self,
		actor: Option<&Actor>,
		property_id: PropertyId,
		user_id: UserId,
		role: GrantRole,
		custom: Option<&CustomPermissions>,
	) -> Result<PropertyGrant> {
		let property = self.require_grant_manager(actor, property_id).await?;
		let granter = actor.map(|a| a.user_id).ok_or(AuthError::AuthenticationRequired)?;

		let grantee = self
			.users
			.get_user_by_id(user_id)
			.await?
			.ok_or(AuthError::UserNotFound(user_id))?;
		if !grantee.role.is_grantable() {
			return Err(AuthError::Validation(format!(
				"users with role {} cannot receive property permissions",
				grantee.role
			)));
		}
		if grantee
			.organization_id
			.is_some_and(|org| org != property.organization_id)
		{
			return Err(AuthError::Validation(
				"user belongs to another organization".to_string(),
			));
		}

		self
			.grants
			.assign_permission(granter, property_id, user_id, role, custom)
			.await
	}

	#[instrument(skip(self, actor), fields(%property_id, %user_id))]
	pub async fn revoke_permission(
		&self,
		actor: Option<&Actor>,
		property_id: PropertyId,
		user_id: UserId,
	) -> Result<()> {
		self.require_grant_manager(actor, property_id).await?;
		self.grants.revoke_permission(property_id, user_id).await
	}

	/// Grants held by `user_id`. Users may always list their own.
	#[instrument(skip(self, actor), fields(%user_id))]
	pub async fn get_user_permissions(
		&self,
		actor: Option<&Actor>,
		user_id: UserId,
	) -> Result<Vec<Grant>> {
		let Some(actor) = actor else {
			return Err(AuthError::AuthenticationRequired);
		};
		if actor.user_id != user_id && !actor.is_admin() {
			let user = self
				.users
				.get_user_by_id(user_id)
				.await?
				.ok_or(AuthError::UserNotFound(user_id))?;
			let owns_users_org = match (actor.role, user.organization_id) {
				(Role::AgentOwner, Some(org_id)) => self
					.organizations
					.get_organization_by_id(org_id)
					.await?
					.is_some_and(|org| org.is_owned_by(actor.user_id)),
				_ => false,
			};
			if !owns_users_org {
				return Err(AuthError::Forbidden(
					"cannot view another user's permissions".to_string(),
				));
			}
		}
		self.grants.get_permissions_for_user(user_id).await
	}

	#[instrument(skip(self, actor), fields(%property_id))]
	pub async fn get_property_permissions(
		&self,
		actor: Option<&Actor>,
		property_id: PropertyId,
	) -> Result<Vec<AnnotatedGrant>> {
		self.require_grant_manager(actor, property_id).await?;
		self.grants.get_permissions_for_property(property_id).await
	}

	/// Organization members who could be granted access to the property.
	///
	/// Excludes the organization owner and the caller.
	#[instrument(skip(self, actor), fields(%property_id))]
	pub async fn get_assignable_users(
		&self,
		actor: Option<&Actor>,
		property_id: PropertyId,
	) -> Result<Vec<AssignableUser>> {
		let property = self.require_grant_manager(actor, property_id).await?;
		let caller = actor.map(|a| a.user_id);
		let org = self
			.organizations
			.get_organization_by_id(property.organization_id)
			.await?
			.ok_or(AuthError::OrgNotFound(property.organization_id))?;

		let granted: HashSet<UserId> = self
			.grants
			.get_permissions_for_property(property_id)
			.await?
			.into_iter()
			.map(|g| g.grant.user_id)
			.collect();

		let mut users: Vec<AssignableUser> = self
			.users
			.list_organization_members(org.id)
			.await?
			.into_iter()
			.filter(|u| u.role.is_grantable())
			.filter(|u| u.id != org.owner_id && Some(u.id) != caller)
			.map(|user| AssignableUser {
				has_permission: granted.contains(&user.id),
				user,
			})
			.collect();
		users.sort_by(|a, b| a.user.name.cmp(&b.user.name));
		Ok(users)
	}
}
