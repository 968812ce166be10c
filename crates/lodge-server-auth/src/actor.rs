// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The requesting identity.

use serde::{Deserialize, Serialize};

use crate::types::{OrgId, Role, TeamId, UserId};

/// An authenticated actor with its session context.
///
/// Built once per request from session state by the upstream authentication
/// layer and never mutated while the request is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
	pub user_id: UserId,
	pub role: Role,
	pub active_organization_id: Option<OrgId>,
	pub active_team_id: Option<TeamId>,
}

impl Actor {
	/// Creates an actor with no active organization or team.
	pub fn new(user_id: UserId, role: Role) -> Self {
		Self {
			user_id,
			role,
			active_organization_id: None,
			active_team_id: None,
		}
	}

	pub fn with_organization(mut self, org_id: OrgId) -> Self {
		self.active_organization_id = Some(org_id);
		self
	}

	pub fn with_team(mut self, team_id: TeamId) -> Self {
		self.active_team_id = Some(team_id);
		self
	}

	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}

	/// True when the actor's session is scoped to `org_id`.
	pub fn is_active_in(&self, org_id: OrgId) -> bool {
		self.active_organization_id == Some(org_id)
	}
}
