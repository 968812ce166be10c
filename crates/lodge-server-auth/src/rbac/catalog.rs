// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;

use super::PermissionTable;
use crate::types::{Action as A, Resource as R, Role};

/// Static definition of what each role may do.
///
/// The standard matrix is a `match` so that adding a role, resource or action
/// forces this table to be revisited. A deployment may replace the table for a
/// role wholesale with [`RoleCatalog::with_role_table`]; pairs missing from a
/// replacement table are denied.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
	replacements: HashMap<Role, PermissionTable>,
}

impl RoleCatalog {
	/// The built-in matrix.
	pub fn standard() -> Self {
		Self::default()
	}

	/// Replaces the table used for `role`.
	pub fn with_role_table(mut self, role: Role, table: PermissionTable) -> Self {
		self.replacements.insert(role, table);
		self
	}

	/// Whether `role` may perform `action` on `resource`.
	pub fn allows(&self, role: Role, resource: R, action: A) -> bool {
		match self.replacements.get(&role) {
			Some(table) => table.get(resource, action).unwrap_or(false),
			None => standard_allows(role, resource, action),
		}
	}

	/// The full table for `role`, every known pair present.
	pub fn permissions_for_role(&self, role: Role) -> PermissionTable {
		if let Some(table) = self.replacements.get(&role) {
			return table.clone();
		}
		R::all()
			.iter()
			.flat_map(|r| A::all().iter().map(move |a| (*r, *a)))
			.map(|(r, a)| (r, a, standard_allows(role, r, a)))
			.collect()
	}

	/// Lookup by wire name. Unknown names yield an empty table.
	pub fn permissions_for_role_name(&self, name: &str) -> PermissionTable {
		match name.parse::<Role>() {
			Ok(role) => self.permissions_for_role(role),
			Err(_) => {
				tracing::debug!(role = name, "unknown role name, returning empty table");
				PermissionTable::new()
			}
		}
	}
}

fn standard_allows(role: Role, resource: R, action: A) -> bool {
	match role {
		Role::Admin | Role::AgentOwner => true,
		Role::AgentStaff => matches!(
			(resource, action),
			(R::Property, A::View | A::Create | A::Update)
				| (R::Unit, A::View | A::Create | A::Update)
				| (R::Tenant, A::View | A::Create | A::Update | A::Manage)
				| (R::Lease, A::View | A::Create | A::Update)
				| (R::Payment, A::View | A::Create)
				| (R::Maintenance, A::View | A::Create | A::Update | A::Manage)
				| (R::Document, A::View | A::Create)
				| (R::Report, A::View)
				| (R::Team, A::View)
				| (R::Organization, A::View)
		),
		Role::Caretaker => matches!(
			(resource, action),
			(R::Property, A::View)
				| (R::Unit, A::View)
				| (R::Tenant, A::View | A::Manage)
				| (R::Lease, A::View)
				| (R::Maintenance, A::View | A::Create | A::Update | A::Manage)
				| (R::Document, A::View)
		),
		Role::PropertyOwner => matches!(
			(resource, action),
			(
				R::Property
					| R::Unit
					| R::Tenant
					| R::Lease
					| R::Payment
					| R::Maintenance
					| R::Document
					| R::Report,
				A::View
			)
		),
		Role::TenantUser => matches!(
			(resource, action),
			(R::Maintenance, A::View | A::Create | A::Manage)
		),
	}
}
