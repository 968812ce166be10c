// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Action, Resource};

/// Nested `resource -> action -> allowed` map.
///
/// An absent entry means "not defined here", which is different from an
/// explicit `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionTable(BTreeMap<Resource, BTreeMap<Action, bool>>);

impl PermissionTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`PermissionTable::set`].
	pub fn with(mut self, resource: Resource, action: Action, allowed: bool) -> Self {
		self.set(resource, action, allowed);
		self
	}

	pub fn set(&mut self, resource: Resource, action: Action, allowed: bool) {
		self.0.entry(resource).or_default().insert(action, allowed);
	}

	/// The defined value for the pair, if any.
	pub fn get(&self, resource: Resource, action: Action) -> Option<bool> {
		self.0.get(&resource)?.get(&action).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.0.values().all(BTreeMap::is_empty)
	}

	/// Iterates defined entries in resource then action order.
	pub fn iter(&self) -> impl Iterator<Item = (Resource, Action, bool)> + '_ {
		self
			.0
			.iter()
			.flat_map(|(r, actions)| actions.iter().map(move |(a, v)| (*r, *a, *v)))
	}
}

impl FromIterator<(Resource, Action, bool)> for PermissionTable {
	fn from_iter<I: IntoIterator<Item = (Resource, Action, bool)>>(iter: I) -> Self {
		let mut table = PermissionTable::new();
		for (resource, action, allowed) in iter {
			table.set(resource, action, allowed);
		}
		table
	}
}
