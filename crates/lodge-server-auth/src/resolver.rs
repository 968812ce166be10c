// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission resolution.
//!
//! [`PermissionResolver`] composes the access layers in a fixed order, first
//! match wins:
//!
//! 1. No actor: deny everything.
//! 2. `admin`: allow everything.
//! 3. `agent_owner` who owns the organization: allow everything.
//! 4. No organization, an organization other than the actor's active one, or
//!    an active team from another organization: deny everything.
//! 5. `agent_staff` and `caretaker`: per-capability [`ResourceAccessControl`].
//! 6. `property_owner`: view properties, tenants, leases and maintenance.
//! 7. `tenant_user`: view and manage maintenance.
//! 8. Anything else: deny everything.
//!
//! Property-scoped checks then narrow team members to the properties assigned
//! to their team. A team can restrict, never widen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

use crate::actor::Actor;
use crate::directory::{OrganizationDirectory, Property, PropertyDirectory, TeamDirectory};
use crate::error::{AuthError, Result};
use crate::org::Organization;
use crate::rbac::{ResourceAccessControl, RoleCatalog};
use crate::team::Team;
use crate::types::{Action, Capability, OrgId, PropertyId, Resource, Role};

/// One named field of a [`PermissionSet`] and the capability behind it.
#[derive(Debug, Clone, Copy)]
pub struct PermissionField {
	pub name: &'static str,
	pub resource: Resource,
	/// Any of these actions grants the field.
	pub actions: &'static [Action],
}

macro_rules! permission_set {
	($( $field:ident => $name:literal : $resource:ident [$($action:ident),+] ),* $(,)?) => {
		/// Named capability snapshot used to drive the UI and coarse gating.
		#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
		#[serde(rename_all = "camelCase")]
		pub struct PermissionSet {
			$(pub $field: bool,)*
		}

		impl PermissionSet {
			pub const FIELDS: &'static [PermissionField] = &[
				$(PermissionField {
					name: $name,
					resource: Resource::$resource,
					actions: &[$(Action::$action),+],
				},)*
			];

			/// Every field set to `value`.
			pub fn uniform(value: bool) -> Self {
				Self { $($field: value,)* }
			}

			fn from_fn(mut allowed: impl FnMut(Resource, &[Action]) -> bool) -> Self {
				Self {
					$($field: allowed(Resource::$resource, &[$(Action::$action),+]),)*
				}
			}

			pub fn to_map(&self) -> BTreeMap<&'static str, bool> {
				BTreeMap::from([$(($name, self.$field)),*])
			}
		}
	};
}

permission_set! {
	can_view_properties => "canViewProperties": Property [View],
	can_create_properties => "canCreateProperties": Property [Create],
	can_edit_properties => "canEditProperties": Property [Update],
	can_delete_properties => "canDeleteProperties": Property [Delete],
	can_manage_properties => "canManageProperties": Property [Create, Update, Delete],
	can_view_units => "canViewUnits": Unit [View],
	can_manage_units => "canManageUnits": Unit [Create, Update, Delete],
	can_view_tenants => "canViewTenants": Tenant [View],
	can_manage_tenants => "canManageTenants": Tenant [Manage, Create, Update],
	can_view_leases => "canViewLeases": Lease [View],
	can_manage_leases => "canManageLeases": Lease [Manage, Create, Update],
	can_view_payments => "canViewPayments": Payment [View],
	can_collect_payments => "canCollectPayments": Payment [Create, Manage],
	can_view_financials => "canViewFinancials": Report [View],
	can_view_maintenance => "canViewMaintenance": Maintenance [View],
	can_manage_maintenance => "canManageMaintenance": Maintenance [Manage],
	can_view_documents => "canViewDocuments": Document [View],
	can_manage_documents => "canManageDocuments": Document [Create, Update, Delete],
	can_manage_users => "canManageUsers": Staff [Assign, Invite, Manage],
	can_manage_teams => "canManageTeams": Team [Manage],
	can_manage_subscription => "canManageSubscription": Subscription [Manage],
	can_manage_organization => "canManageOrganization": Organization [Manage, Update],
}

/// Output of [`PermissionResolver::determine_permissions`]. Recomputed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDecision {
	/// Organization subsequent queries are scoped to.
	pub organization_id: Option<OrgId>,
	#[serde(flatten)]
	pub permissions: PermissionSet,
}

impl PermissionDecision {
	fn deny_all() -> Self {
		Self {
			organization_id: None,
			permissions: PermissionSet::uniform(false),
		}
	}

	fn allow_all(organization_id: Option<OrgId>) -> Self {
		Self {
			organization_id,
			permissions: PermissionSet::uniform(true),
		}
	}
}

/// Result of a successful hard gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorized {
	pub organization_id: Option<OrgId>,
}

/// Which properties list queries may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyScope {
	/// Every property in the organization (or everywhere for admins).
	All,
	Only(Vec<PropertyId>),
}

impl PropertyScope {
	pub fn includes(&self, property_id: PropertyId) -> bool {
		match self {
			PropertyScope::All => true,
			PropertyScope::Only(ids) => ids.contains(&property_id),
		}
	}
}

enum Shortcut {
	Allow,
	Deny(&'static str),
	Evaluate,
}

#[derive(Clone)]
pub struct PermissionResolver {
	catalog: RoleCatalog,
	organizations: Arc<dyn OrganizationDirectory>,
	teams: Arc<dyn TeamDirectory>,
	properties: Arc<dyn PropertyDirectory>,
}

impl PermissionResolver {
	pub fn new(
		catalog: RoleCatalog,
		organizations: Arc<dyn OrganizationDirectory>,
		teams: Arc<dyn TeamDirectory>,
		properties: Arc<dyn PropertyDirectory>,
	) -> Self {
		Self {
			catalog,
			organizations,
			teams,
			properties,
		}
	}

	pub fn catalog(&self) -> &RoleCatalog {
		&self.catalog
	}

	/// Steps 1 to 4, shared by the snapshot and the hard gate.
	/// Admins and the organization owner never consult team state, so a
	/// stale active team cannot block them.
	fn bypasses_teams(actor: &Actor, organization: Option<&Organization>) -> bool {
		actor.is_admin()
			|| (actor.role == Role::AgentOwner
				&& organization.is_some_and(|org| org.is_owned_by(actor.user_id)))
	}

	fn shortcut(
		actor: &Actor,
		organization: Option<&Organization>,
		team: Option<&Team>,
	) -> Shortcut {
		if actor.is_admin() {
			return Shortcut::Allow;
		}
		let Some(org) = organization else {
			return Shortcut::Deny("no organization");
		};
		if actor.role == Role::AgentOwner && org.is_owned_by(actor.user_id) {
			return Shortcut::Allow;
		}
		if !actor.is_active_in(org.id) {
			return Shortcut::Deny("organization is not the actor's active organization");
		}
		if let Some(team) = team {
			if actor.active_team_id == Some(team.id) && !team.belongs_to(org.id) {
				return Shortcut::Deny("active team belongs to another organization");
			}
		}
		Shortcut::Evaluate
	}

	/// Steps 5 to 8 for a single capability.
	fn role_allows(
		&self,
		actor: &Actor,
		organization: &Organization,
		team: Option<&Team>,
		resource: Resource,
		actions: &[Action],
	) -> bool {
		match actor.role {
			Role::AgentStaff | Role::Caretaker => {
				ResourceAccessControl::new(&self.catalog, Some(actor), Some(organization), team)
					.can_any(resource, actions)
			}
			Role::PropertyOwner => {
				actions.contains(&Action::View)
					&& matches!(
						resource,
						Resource::Property | Resource::Tenant | Resource::Lease | Resource::Maintenance
					)
			}
			Role::TenantUser => {
				resource == Resource::Maintenance
					&& actions
						.iter()
						.any(|a| matches!(a, Action::View | Action::Manage))
			}
			Role::Admin | Role::AgentOwner => false,
		}
	}

	/// Broad capability snapshot for `actor` in `organization`.
	///
	/// Pure: everything must be loaded by the caller.
	#[instrument(
		level = "debug",
		skip_all,
		fields(
			user_id = ?actor.map(|a| a.user_id),
			org_id = ?organization.map(|o| o.id),
		)
	)]
	pub fn determine_permissions(
		&self,
		actor: Option<&Actor>,
		organization: Option<&Organization>,
		team: Option<&Team>,
	) -> PermissionDecision {
		let Some(actor) = actor else {
			return PermissionDecision::deny_all();
		};
		let org_id = organization
			.map(|o| o.id)
			.or(actor.active_organization_id);

		let org = match Self::shortcut(actor, organization, team) {
			Shortcut::Allow => return PermissionDecision::allow_all(org_id),
			Shortcut::Deny(reason) => {
				tracing::debug!(reason, "all permissions denied");
				return PermissionDecision::deny_all();
			}
			Shortcut::Evaluate => match organization {
				Some(org) => org,
				None => return PermissionDecision::deny_all(),
			},
		};

		let permissions = PermissionSet::from_fn(|resource, actions| {
			self.role_allows(actor, org, team, resource, actions)
		});
		PermissionDecision {
			organization_id: Some(org.id),
			permissions,
		}
	}

	/// Loads the actor's active organization and team, then
	/// [`PermissionResolver::determine_permissions`].
	#[instrument(skip_all, fields(user_id = ?actor.map(|a| a.user_id)))]
	pub async fn resolve_for_actor(&self, actor: Option<&Actor>) -> Result<PermissionDecision> {
		let Some(actor) = actor else {
			return Ok(PermissionDecision::deny_all());
		};
		let organization = match actor.active_organization_id {
			Some(id) => Some(self.load_organization(id).await?),
			None => None,
		};
		let team = match actor.active_team_id {
			Some(id) if !Self::bypasses_teams(actor, organization.as_ref()) => {
				Some(self.load_team(id).await?)
			}
			_ => None,
		};
		Ok(self.determine_permissions(Some(actor), organization.as_ref(), team.as_ref()))
	}

	/// The single hard gate.
	///
	/// The organization is `target_org`, else the target property's
	/// organization, else the actor's active organization. Missing records are
	/// reported as not found, never as forbidden.
	#[instrument(
		skip(self, actor),
		fields(user_id = ?actor.map(|a| a.user_id), %capability)
	)]
	pub async fn authorize(
		&self,
		actor: Option<&Actor>,
		capability: Capability,
		target_org: Option<OrgId>,
		target_property: Option<PropertyId>,
	) -> Result<Authorized> {
		let Some(actor) = actor else {
			return Err(AuthError::AuthenticationRequired);
		};

		let property = match target_property {
			Some(id) => Some(self.load_property(id).await?),
			None => None,
		};
		if let (Some(org_id), Some(p)) = (target_org, &property) {
			if p.organization_id != org_id {
				return Err(AuthError::Forbidden(
					"property belongs to another organization".to_string(),
				));
			}
		}

		let org_id = target_org
			.or(property.as_ref().map(|p| p.organization_id))
			.or(actor.active_organization_id);
		let Some(org_id) = org_id else {
			if actor.is_admin() {
				return Ok(Authorized {
					organization_id: None,
				});
			}
			return Err(AuthError::Forbidden("no active organization".to_string()));
		};
		let org = self.load_organization(org_id).await?;

		let team = match actor.active_team_id {
			Some(id) if !Self::bypasses_teams(actor, Some(&org)) => Some(self.load_team(id).await?),
			_ => None,
		};

		match Self::shortcut(actor, Some(&org), team.as_ref()) {
			Shortcut::Allow => {
				return Ok(Authorized {
					organization_id: Some(org.id),
				})
			}
			Shortcut::Deny(reason) => {
				tracing::debug!(reason, "denied");
				return Err(AuthError::Forbidden(reason.to_string()));
			}
			Shortcut::Evaluate => {}
		}

		if !self.role_allows(
			actor,
			&org,
			team.as_ref(),
			capability.resource,
			&[capability.action],
		) {
			tracing::debug!(role = %actor.role, "capability denied");
			return Err(AuthError::Forbidden(format!(
				"{} may not {} {}",
				actor.role, capability.action, capability.resource
			)));
		}

		if let Some(property) = &property {
			self.narrow_to_property(actor, team.as_ref(), property).await?;
		}

		Ok(Authorized {
			organization_id: Some(org.id),
		})
	}

	/// Restricts team members to team properties and landlords to their own.
	async fn narrow_to_property(
		&self,
		actor: &Actor,
		team: Option<&Team>,
		property: &Property,
	) -> Result<()> {
		if actor.role == Role::PropertyOwner && property.owner_id != Some(actor.user_id) {
			return Err(AuthError::Forbidden(
				"property is not owned by the actor".to_string(),
			));
		}
		if let Some(team) = team {
			if !self.teams.is_property_in_team(team.id, property.id).await? {
				tracing::debug!(team_id = %team.id, property_id = %property.id, "property outside team");
				return Err(AuthError::Forbidden(
					"property is not assigned to the actor's team".to_string(),
				));
			}
		}
		Ok(())
	}

	/// Guard for property and unit operations. Returns the organization the
	/// caller must scope its queries to.
	#[instrument(skip(self, actor), fields(user_id = ?actor.map(|a| a.user_id), %action))]
	pub async fn check_property_permissions(
		&self,
		actor: Option<&Actor>,
		action: Action,
		property_id: Option<PropertyId>,
	) -> Result<Option<OrgId>> {
		let authorized = self
			.authorize(
				actor,
				Capability::new(Resource::Property, action),
				None,
				property_id,
			)
			.await?;
		Ok(authorized.organization_id)
	}

	/// Properties list queries may return for `actor`.
	#[instrument(skip_all, fields(user_id = ?actor.map(|a| a.user_id)))]
	pub async fn accessible_property_scope(&self, actor: Option<&Actor>) -> Result<PropertyScope> {
		let Some(actor) = actor else {
			return Err(AuthError::AuthenticationRequired);
		};
		if actor.is_admin() {
			return Ok(PropertyScope::All);
		}
		let Some(org_id) = actor.active_organization_id else {
			return Ok(PropertyScope::Only(Vec::new()));
		};
		let org = self.load_organization(org_id).await?;
		if actor.role == Role::AgentOwner && org.is_owned_by(actor.user_id) {
			return Ok(PropertyScope::All);
		}

		match actor.role {
			Role::AgentStaff | Role::Caretaker => match actor.active_team_id {
				Some(team_id) => {
					let team = self.load_team(team_id).await?;
					if !team.belongs_to(org.id) {
						return Ok(PropertyScope::Only(Vec::new()));
					}
					let ids = self.teams.get_team_property_ids(team.id).await?;
					Ok(PropertyScope::Only(ids))
				}
				None => Ok(PropertyScope::All),
			},
			Role::PropertyOwner => {
				let ids = self
					.properties
					.list_properties_owned_by(actor.user_id)
					.await?
					.into_iter()
					.filter(|p| p.organization_id == org.id)
					.map(|p| p.id)
					.collect();
				Ok(PropertyScope::Only(ids))
			}
			Role::TenantUser | Role::AgentOwner | Role::Admin => Ok(PropertyScope::Only(Vec::new())),
		}
	}

	async fn load_organization(&self, id: OrgId) -> Result<Organization> {
		self
			.organizations
			.get_organization_by_id(id)
			.await?
			.ok_or(AuthError::OrgNotFound(id))
	}

	async fn load_team(&self, id: crate::types::TeamId) -> Result<Team> {
		self
			.teams
			.get_team_by_id(id)
			.await?
			.ok_or(AuthError::TeamNotFound(id))
	}

	async fn load_property(&self, id: PropertyId) -> Result<Property> {
		self
			.properties
			.get_property_by_id(id)
			.await?
			.ok_or(AuthError::PropertyNotFound(id))
	}
}
