// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Teams scope staff to a subset of an organization's properties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rbac::PermissionTable;
use crate::types::{OrgId, Role, TeamId};

/// A sub-grouping inside an organization.
///
/// `overrides` holds team-specific capability values. A present value, true or
/// false, replaces the role default for that `(resource, action)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
	pub id: TeamId,
	pub organization_id: OrgId,
	pub name: String,
	pub team_admin_role: Option<Role>,
	#[serde(default)]
	pub overrides: PermissionTable,
	pub created_at: DateTime<Utc>,
}

impl Team {
	pub fn new(organization_id: OrgId, name: impl Into<String>) -> Self {
		Self {
			id: TeamId::generate(),
			organization_id,
			name: name.into(),
			team_admin_role: None,
			overrides: PermissionTable::new(),
			created_at: Utc::now(),
		}
	}

	pub fn with_overrides(mut self, overrides: PermissionTable) -> Self {
		self.overrides = overrides;
		self
	}

	pub fn belongs_to(&self, org_id: OrgId) -> bool {
		self.organization_id == org_id
	}
}
