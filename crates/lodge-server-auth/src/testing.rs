// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::directory::{
	OrganizationDirectory, Property, PropertyDirectory, TeamDirectory, User, UserDirectory,
};
use crate::error::{AuthError, Result};
use crate::grant::{AnnotatedGrant, GrantStore, NewGrant, PropertyGrant};
use crate::org::{Organization, TrialStatus};
use crate::subscription::TrialStore;
use crate::team::Team;
use crate::types::{GrantId, OrgId, PropertyId, TeamId, UserId};

#[derive(Default)]
struct State {
	orgs: HashMap<OrgId, Organization>,
	teams: HashMap<TeamId, Team>,
	team_properties: HashMap<TeamId, Vec<PropertyId>>,
	properties: HashMap<PropertyId, Property>,
	users: HashMap<UserId, User>,
	grants: HashMap<(UserId, PropertyId), PropertyGrant>,
	failing_expiry: HashSet<OrgId>,
}

#[derive(Default)]
pub struct MemoryBackend {
	state: Mutex<State>,
}

impl MemoryBackend {
	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap()
	}

	pub fn add_org(&self, org: Organization) {
		self.lock().orgs.insert(org.id, org);
	}

	pub fn org(&self, id: OrgId) -> Option<Organization> {
		self.lock().orgs.get(&id).cloned()
	}

	pub fn add_team(&self, team: Team) {
		self.lock().teams.insert(team.id, team);
	}

	pub fn add_property(&self, property: Property) {
		self.lock().properties.insert(property.id, property);
	}

	pub fn add_property_to_team(&self, team_id: TeamId, property_id: PropertyId) {
		self.lock()
			.team_properties
			.entry(team_id)
			.or_default()
			.push(property_id);
	}

	pub fn add_user(&self, user: User) {
		self.lock().users.insert(user.id, user);
	}

	pub fn grant_count(&self) -> usize {
		self.lock().grants.len()
	}

	pub fn fail_expiry_for(&self, org_id: OrgId) {
		self.lock().failing_expiry.insert(org_id);
	}
}

#[async_trait]
impl OrganizationDirectory for MemoryBackend {
	async fn get_organization_by_id(&self, id: OrgId) -> Result<Option<Organization>> {
		Ok(self.org(id))
	}
}

#[async_trait]
impl TeamDirectory for MemoryBackend {
	async fn get_team_by_id(&self, id: TeamId) -> Result<Option<Team>> {
		Ok(self.lock().teams.get(&id).cloned())
	}

	async fn is_property_in_team(&self, team_id: TeamId, property_id: PropertyId) -> Result<bool> {
		Ok(self
			.lock()
			.team_properties
			.get(&team_id)
			.is_some_and(|ids| ids.contains(&property_id)))
	}

	async fn get_team_property_ids(&self, team_id: TeamId) -> Result<Vec<PropertyId>> {
		Ok(self
			.lock()
			.team_properties
			.get(&team_id)
			.cloned()
			.unwrap_or_default())
	}
}

#[async_trait]
impl PropertyDirectory for MemoryBackend {
	async fn get_property_by_id(&self, id: PropertyId) -> Result<Option<Property>> {
		Ok(self.lock().properties.get(&id).cloned())
	}

	async fn list_properties_owned_by(&self, user_id: UserId) -> Result<Vec<Property>> {
		let state = self.lock();
		Ok(state
			.properties
			.values()
			.filter(|p| {
				p.owner_id == Some(user_id)
					|| state
						.orgs
						.get(&p.organization_id)
						.is_some_and(|o| o.owner_id == user_id)
			})
			.cloned()
			.collect())
	}
}

#[async_trait]
impl UserDirectory for MemoryBackend {
	async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>> {
		Ok(self.lock().users.get(&id).cloned())
	}

	async fn list_organization_members(&self, org_id: OrgId) -> Result<Vec<User>> {
		Ok(self
			.lock()
			.users
			.values()
			.filter(|u| u.organization_id == Some(org_id))
			.cloned()
			.collect())
	}
}

#[async_trait]
impl GrantStore for MemoryBackend {
	async fn upsert_grant(&self, grant: &NewGrant) -> Result<PropertyGrant> {
		let now = Utc::now();
		let mut state = self.lock();
		let row = state
			.grants
			.entry((grant.user_id, grant.property_id))
			.and_modify(|existing| {
				existing.role = grant.role;
				existing.flags = grant.flags;
				existing.granted_by = grant.granted_by;
				existing.updated_at = now;
			})
			.or_insert_with(|| PropertyGrant {
				id: GrantId::generate(),
				user_id: grant.user_id,
				property_id: grant.property_id,
				role: grant.role,
				flags: grant.flags,
				granted_by: grant.granted_by,
				created_at: now,
				updated_at: now,
			});
		Ok(row.clone())
	}

	async fn delete_grant(&self, user_id: UserId, property_id: PropertyId) -> Result<bool> {
		Ok(self.lock().grants.remove(&(user_id, property_id)).is_some())
	}

	async fn get_grant(
		&self,
		user_id: UserId,
		property_id: PropertyId,
	) -> Result<Option<PropertyGrant>> {
		Ok(self.lock().grants.get(&(user_id, property_id)).cloned())
	}

	async fn list_grants_for_user(&self, user_id: UserId) -> Result<Vec<PropertyGrant>> {
		Ok(self
			.lock()
			.grants
			.values()
			.filter(|g| g.user_id == user_id)
			.cloned()
			.collect())
	}

	async fn list_grants_for_property(&self, property_id: PropertyId) -> Result<Vec<AnnotatedGrant>> {
		let state = self.lock();
		Ok(state
			.grants
			.values()
			.filter(|g| g.property_id == property_id)
			.filter_map(|g| {
				let user = state.users.get(&g.user_id)?;
				Some(AnnotatedGrant {
					grant: g.clone(),
					user_name: user.name.clone(),
					user_email: user.email.clone(),
					granted_by_name: state.users.get(&g.granted_by).map(|u| u.name.clone()),
				})
			})
			.collect())
	}
}

#[async_trait]
impl TrialStore for MemoryBackend {
	async fn list_lapsed_trials(&self, now: DateTime<Utc>) -> Result<Vec<OrgId>> {
		Ok(self
			.lock()
			.orgs
			.values()
			.filter(|o| o.trial_lapsed_at(now))
			.map(|o| o.id)
			.collect())
	}

	async fn expire_trial(&self, org_id: OrgId, now: DateTime<Utc>) -> Result<bool> {
		let mut state = self.lock();
		if state.failing_expiry.contains(&org_id) {
			return Err(AuthError::Storage("simulated write failure".to_string()));
		}
		match state.orgs.get_mut(&org_id) {
			Some(org) if org.trial_lapsed_at(now) => {
				org.trial_status = Some(TrialStatus::Expired);
				Ok(true)
			}
			_ => Ok(false),
		}
	}
}
