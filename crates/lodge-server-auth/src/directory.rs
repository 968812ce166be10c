// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lookups the access core consumes but does not implement.
//!
//! Each trait is implemented by the persistence crate and injected into the
//! services that need it. Lookups return `Ok(None)` for missing records; the
//! caller decides which not-found error to raise.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::org::Organization;
use crate::team::Team;
use crate::types::{OrgId, PropertyId, Role, TeamId, UserId};

/// A managed property. Always belongs to exactly one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
	pub id: PropertyId,
	pub organization_id: OrgId,
	/// The landlord, when the property is held by a property owner.
	pub owner_id: Option<UserId>,
	pub name: String,
}

impl Property {
	pub fn new(organization_id: OrgId, name: impl Into<String>) -> Self {
		Self {
			id: PropertyId::generate(),
			organization_id,
			owner_id: None,
			name: name.into(),
		}
	}

	pub fn with_owner(mut self, owner_id: UserId) -> Self {
		self.owner_id = Some(owner_id);
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	pub id: UserId,
	pub name: String,
	pub email: String,
	pub role: Role,
	pub organization_id: Option<OrgId>,
}

impl User {
	pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
		Self {
			id: UserId::generate(),
			name: name.into(),
			email: email.into(),
			role,
			organization_id: None,
		}
	}

	pub fn in_organization(mut self, org_id: OrgId) -> Self {
		self.organization_id = Some(org_id);
		self
	}
}

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
	async fn get_organization_by_id(&self, id: OrgId) -> Result<Option<Organization>>;
}

#[async_trait]
pub trait TeamDirectory: Send + Sync {
	async fn get_team_by_id(&self, id: TeamId) -> Result<Option<Team>>;

	async fn is_property_in_team(&self, team_id: TeamId, property_id: PropertyId) -> Result<bool>;

	async fn get_team_property_ids(&self, team_id: TeamId) -> Result<Vec<PropertyId>>;
}

#[async_trait]
pub trait PropertyDirectory: Send + Sync {
	async fn get_property_by_id(&self, id: PropertyId) -> Result<Option<Property>>;

	/// Properties the user owns directly or through an organization they own.
	async fn list_properties_owned_by(&self, user_id: UserId) -> Result<Vec<Property>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
	async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>>;

	async fn list_organization_members(&self, org_id: OrgId) -> Result<Vec<User>>;
}
