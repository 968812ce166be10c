// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for access decisions.
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs ([`UserId`], [`OrgId`],
//!   [`TeamId`], [`PropertyId`], [`GrantId`]) preventing accidental mixing
//! - **[`Role`]**: the closed set of system roles carried by every actor
//! - **[`Resource`] / [`Action`]**: the fixed vocabulary of capabilities
//! - **[`Capability`]**: a `(resource, action)` pair
//!
//! Every enum parses from and renders to its `snake_case` wire name, and
//! parsing an unknown name is an error rather than a silent default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(OrgId, "Unique identifier for an organization.");
define_id_type!(TeamId, "Unique identifier for a team.");
define_id_type!(PropertyId, "Unique identifier for a property.");
define_id_type!(GrantId, "Unique identifier for a persisted property grant.");

/// Returned when a wire name does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
	pub kind: &'static str,
	pub value: String,
}

impl UnknownVariant {
	fn new(kind: &'static str, value: &str) -> Self {
		Self {
			kind,
			value: value.to_string(),
		}
	}
}

// =============================================================================
// Roles
// =============================================================================

/// System-wide role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Platform administrator. Bypasses every other check.
	Admin,
	/// Agency owner; full control over the organizations they own.
	AgentOwner,
	/// Agency employee working inside an organization.
	AgentStaff,
	/// Landlord whose properties are managed by an agency.
	PropertyOwner,
	/// On-site caretaker handling tenants and maintenance.
	Caretaker,
	/// Resident; only acts on their own maintenance requests.
	TenantUser,
}

impl Role {
	/// Returns all available roles.
	pub fn all() -> &'static [Role] {
		&[
			Role::Admin,
			Role::AgentOwner,
			Role::AgentStaff,
			Role::PropertyOwner,
			Role::Caretaker,
			Role::TenantUser,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Admin => "admin",
			Role::AgentOwner => "agent_owner",
			Role::AgentStaff => "agent_staff",
			Role::PropertyOwner => "property_owner",
			Role::Caretaker => "caretaker",
			Role::TenantUser => "tenant_user",
		}
	}

	/// Roles that may receive an explicit property grant.
	pub fn is_grantable(&self) -> bool {
		matches!(
			self,
			Role::AgentStaff | Role::Caretaker | Role::PropertyOwner
		)
	}

	/// Roles that own properties and therefore see synthesized owner grants.
	pub fn is_owner_class(&self) -> bool {
		matches!(self, Role::AgentOwner | Role::PropertyOwner)
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Role::all()
			.iter()
			.copied()
			.find(|r| r.as_str() == s)
			.ok_or_else(|| UnknownVariant::new("role", s))
	}
}

// =============================================================================
// Resources
// =============================================================================

/// Kinds of resources a capability can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
	Property,
	Unit,
	Tenant,
	Lease,
	Payment,
	Maintenance,
	Document,
	Report,
	Staff,
	Team,
	Subscription,
	Organization,
}

impl Resource {
	pub fn all() -> &'static [Resource] {
		&[
			Resource::Property,
			Resource::Unit,
			Resource::Tenant,
			Resource::Lease,
			Resource::Payment,
			Resource::Maintenance,
			Resource::Document,
			Resource::Report,
			Resource::Staff,
			Resource::Team,
			Resource::Subscription,
			Resource::Organization,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Resource::Property => "property",
			Resource::Unit => "unit",
			Resource::Tenant => "tenant",
			Resource::Lease => "lease",
			Resource::Payment => "payment",
			Resource::Maintenance => "maintenance",
			Resource::Document => "document",
			Resource::Report => "report",
			Resource::Staff => "staff",
			Resource::Team => "team",
			Resource::Subscription => "subscription",
			Resource::Organization => "organization",
		}
	}
}

impl fmt::Display for Resource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Resource {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Resource::all()
			.iter()
			.copied()
			.find(|r| r.as_str() == s)
			.ok_or_else(|| UnknownVariant::new("resource", s))
	}
}

// =============================================================================
// Actions
// =============================================================================

/// Operations that can be performed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	View,
	Create,
	Update,
	Delete,
	Manage,
	Assign,
	Invite,
	Export,
}

impl Action {
	pub fn all() -> &'static [Action] {
		&[
			Action::View,
			Action::Create,
			Action::Update,
			Action::Delete,
			Action::Manage,
			Action::Assign,
			Action::Invite,
			Action::Export,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Action::View => "view",
			Action::Create => "create",
			Action::Update => "update",
			Action::Delete => "delete",
			Action::Manage => "manage",
			Action::Assign => "assign",
			Action::Invite => "invite",
			Action::Export => "export",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Action {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Action::all()
			.iter()
			.copied()
			.find(|a| a.as_str() == s)
			.ok_or_else(|| UnknownVariant::new("action", s))
	}
}

// =============================================================================
// Capability
// =============================================================================

/// A `(resource, action)` pair whose permission is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
	pub resource: Resource,
	pub action: Action,
}

impl Capability {
	pub const fn new(resource: Resource, action: Action) -> Self {
		Self { resource, action }
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.resource, self.action)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod id_types {
		use super::*;

		#[test]
		fn ids_round_trip_through_display() {
			let id = PropertyId::generate();
			let parsed: PropertyId = id.to_string().parse().unwrap();
			assert_eq!(id, parsed);
		}

		#[test]
		fn ids_serialize_transparently() {
			let uuid = Uuid::new_v4();
			let id = OrgId::new(uuid);
			let json = serde_json::to_string(&id).unwrap();
			assert_eq!(json, format!("\"{uuid}\""));
		}
	}

	mod role {
		use super::*;

		#[test]
		fn every_role_parses_from_its_display_name() {
			for role in Role::all() {
				assert_eq!(role.to_string().parse::<Role>().unwrap(), *role);
			}
		}

		#[test]
		fn unknown_role_is_rejected() {
			let err = "landlord".parse::<Role>().unwrap_err();
			assert_eq!(err.kind, "role");
			assert_eq!(err.value, "landlord");
		}

		#[test]
		fn serde_uses_snake_case() {
			let json = serde_json::to_string(&Role::AgentOwner).unwrap();
			assert_eq!(json, "\"agent_owner\"");
			let role: Role = serde_json::from_str("\"tenant_user\"").unwrap();
			assert_eq!(role, Role::TenantUser);
		}

		#[test]
		fn grantable_roles() {
			assert!(Role::AgentStaff.is_grantable());
			assert!(Role::Caretaker.is_grantable());
			assert!(Role::PropertyOwner.is_grantable());
			assert!(!Role::Admin.is_grantable());
			assert!(!Role::AgentOwner.is_grantable());
			assert!(!Role::TenantUser.is_grantable());
		}
	}

	mod capability {
		use super::*;

		#[test]
		fn resources_and_actions_parse() {
			for r in Resource::all() {
				assert_eq!(r.as_str().parse::<Resource>().unwrap(), *r);
			}
			for a in Action::all() {
				assert_eq!(a.as_str().parse::<Action>().unwrap(), *a);
			}
			assert!("invoice".parse::<Resource>().is_err());
			assert!("archive".parse::<Action>().is_err());
		}

		#[test]
		fn display_is_dotted() {
			let cap = Capability::new(Resource::Maintenance, Action::Manage);
			assert_eq!(cap.to_string(), "maintenance.manage");
		}
	}
}
