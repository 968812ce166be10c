// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing::instrument;

use super::RoleCatalog;
use crate::actor::Actor;
use crate::org::Organization;
use crate::team::Team;
use crate::types::{Action, Resource};

/// Evaluates single capability queries for one actor.
///
/// Built per request over pre-loaded state. Evaluation order:
///
/// 1. No actor, no organization, or an organization other than the actor's
///    active one: deny.
/// 2. The actor's active team belongs to another organization: deny.
/// 3. The active team defines the pair: the team value wins, true or false.
/// 4. Otherwise the role table decides. Undefined pairs are denied.
///
/// A team that is not the actor's active team is ignored.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAccessControl<'a> {
	catalog: &'a RoleCatalog,
	actor: Option<&'a Actor>,
	organization: Option<&'a Organization>,
	team: Option<&'a Team>,
}

impl<'a> ResourceAccessControl<'a> {
	pub fn new(
		catalog: &'a RoleCatalog,
		actor: Option<&'a Actor>,
		organization: Option<&'a Organization>,
		team: Option<&'a Team>,
	) -> Self {
		Self {
			catalog,
			actor,
			organization,
			team,
		}
	}

	/// Whether the actor may perform `action` on `resource`.
	#[instrument(
		level = "debug",
		skip(self),
		fields(user_id = ?self.actor.map(|a| a.user_id))
	)]
	pub fn can(&self, resource: Resource, action: Action) -> bool {
		let Some(actor) = self.actor else {
			return false;
		};
		let Some(org) = self.organization else {
			return false;
		};
		if !actor.is_active_in(org.id) {
			tracing::debug!(org_id = %org.id, "actor not active in organization");
			return false;
		}

		if let Some(team) = self.active_team(actor) {
			if !team.belongs_to(org.id) {
				tracing::debug!(team_id = %team.id, "team belongs to another organization");
				return false;
			}
			if let Some(allowed) = team.overrides.get(resource, action) {
				return allowed;
			}
		}

		self.catalog.allows(actor.role, resource, action)
	}

	/// True if any of `actions` is allowed on `resource`.
	pub fn can_any(&self, resource: Resource, actions: &[Action]) -> bool {
		actions.iter().any(|action| self.can(resource, *action))
	}

	fn active_team(&self, actor: &Actor) -> Option<&'a Team> {
		let team = self.team?;
		(actor.active_team_id == Some(team.id)).then_some(team)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rbac::PermissionTable;
	use crate::types::{Role, UserId};
	use proptest::prelude::*;

	fn org() -> Organization {
		Organization::new("Acme Lettings", UserId::generate())
	}

	fn actor_in(role: Role, org: &Organization) -> Actor {
		Actor::new(UserId::generate(), role).with_organization(org.id)
	}

	mod absent_context {
		use super::*;

		#[test]
		fn no_actor_denies() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let ac = ResourceAccessControl::new(&catalog, None, Some(&org), None);
			assert!(!ac.can(Resource::Property, Action::View));
		}

		#[test]
		fn no_organization_denies() {
			let catalog = RoleCatalog::standard();
			let actor = Actor::new(UserId::generate(), Role::AgentStaff);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), None, None);
			assert!(!ac.can(Resource::Property, Action::View));
		}

		#[test]
		fn other_organization_denies() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let actor = Actor::new(UserId::generate(), Role::AgentStaff)
				.with_organization(crate::types::OrgId::generate());
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), None);
			assert!(!ac.can(Resource::Property, Action::View));
		}
	}

	mod team_overrides {
		use super::*;

		#[test]
		fn team_restriction_beats_role_grant() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let team = Team::new(org.id, "North")
				.with_overrides(PermissionTable::new().with(Resource::Property, Action::View, false));
			let actor = actor_in(Role::AgentStaff, &org).with_team(team.id);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), Some(&team));
			assert!(catalog.allows(Role::AgentStaff, Resource::Property, Action::View));
			assert!(!ac.can(Resource::Property, Action::View));
		}

		#[test]
		fn team_grant_beats_role_denial() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let team = Team::new(org.id, "North")
				.with_overrides(PermissionTable::new().with(Resource::Property, Action::Delete, true));
			let actor = actor_in(Role::AgentStaff, &org).with_team(team.id);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), Some(&team));
			assert!(ac.can(Resource::Property, Action::Delete));
		}

		#[test]
		fn undefined_override_falls_back_to_role() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let team = Team::new(org.id, "North")
				.with_overrides(PermissionTable::new().with(Resource::Property, Action::Delete, true));
			let actor = actor_in(Role::AgentStaff, &org).with_team(team.id);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), Some(&team));
			assert!(ac.can(Resource::Lease, Action::Update));
			assert!(!ac.can(Resource::Lease, Action::Delete));
		}

		#[test]
		fn team_that_is_not_active_is_ignored() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let team = Team::new(org.id, "North")
				.with_overrides(PermissionTable::new().with(Resource::Property, Action::Delete, true));
			let actor = actor_in(Role::AgentStaff, &org);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), Some(&team));
			assert!(!ac.can(Resource::Property, Action::Delete));
		}

		#[test]
		fn team_from_other_org_denies_everything() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let foreign = Team::new(crate::types::OrgId::generate(), "Elsewhere");
			let actor = actor_in(Role::AgentStaff, &org).with_team(foreign.id);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), Some(&foreign));
			assert!(!ac.can(Resource::Property, Action::View));
		}
	}

	mod composite {
		use super::*;

		#[test]
		fn can_any_is_logical_or() {
			let catalog = RoleCatalog::standard();
			let org = org();
			let actor = actor_in(Role::AgentStaff, &org);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), None);
			assert!(ac.can_any(Resource::Property, &[Action::Delete, Action::Update]));
			assert!(!ac.can_any(Resource::Property, &[Action::Delete, Action::Export]));
			assert!(!ac.can_any(Resource::Property, &[]));
		}
	}

	proptest! {
		#[test]
		fn present_override_always_wins(
			resource in prop::sample::select(Resource::all().to_vec()),
			action in prop::sample::select(Action::all().to_vec()),
			value in any::<bool>(),
			role in prop::sample::select(vec![Role::AgentStaff, Role::Caretaker, Role::PropertyOwner, Role::TenantUser]),
		) {
			let catalog = RoleCatalog::standard();
			let org = org();
			let team = Team::new(org.id, "T")
				.with_overrides(PermissionTable::new().with(resource, action, value));
			let actor = actor_in(role, &org).with_team(team.id);
			let ac = ResourceAccessControl::new(&catalog, Some(&actor), Some(&org), Some(&team));
			prop_assert_eq!(ac.can(resource, action), value);
		}
	}
}
