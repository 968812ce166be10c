// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lodge access-decision service.
//!
//! Wires the SQLite repositories into the decision services and exposes the
//! composed operations callers use to mutate tenant data under the
//! authorization and subscription gates.

pub mod jobs;

pub use lodge_server_db as db;

use std::sync::Arc;

use lodge_server_auth::{
	Action, Actor, AuthError, Capability, Clock, LimitKind, OrgId, Organization, PermissionResolver,
	PermissionsService, Property, PropertyGrantStore, Resource, Result, RoleCatalog, SubscriptionGate,
	SystemClock, User,
};
use lodge_server_db::{
	GrantRepository, OrganizationRepository, PropertyRepository, TeamRepository, UserRepository,
};
use sqlx::sqlite::SqlitePool;
use tracing::instrument;

/// Shared services, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub organizations: Arc<OrganizationRepository>,
	pub teams: Arc<TeamRepository>,
	pub properties: Arc<PropertyRepository>,
	pub users: Arc<UserRepository>,
	pub grants: Arc<GrantRepository>,
	pub resolver: Arc<PermissionResolver>,
	pub permissions: Arc<PermissionsService>,
	pub subscriptions: Arc<SubscriptionGate>,
	pub clock: Arc<dyn Clock>,
}

pub fn create_app_state(pool: SqlitePool) -> AppState {
	create_app_state_with_clock(pool, Arc::new(SystemClock))
}

pub fn create_app_state_with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> AppState {
	let organizations = Arc::new(OrganizationRepository::new(pool.clone()));
	let teams = Arc::new(TeamRepository::new(pool.clone()));
	let properties = Arc::new(PropertyRepository::new(pool.clone()));
	let users = Arc::new(UserRepository::new(pool.clone()));
	let grants = Arc::new(GrantRepository::new(pool.clone()));

	let resolver = Arc::new(PermissionResolver::new(
		RoleCatalog::standard(),
		organizations.clone(),
		teams.clone(),
		properties.clone(),
	));
	let grant_store = PropertyGrantStore::new(grants.clone(), properties.clone(), users.clone());
	let permissions = Arc::new(PermissionsService::new(
		grant_store,
		organizations.clone(),
		properties.clone(),
		users.clone(),
	));
	let subscriptions = Arc::new(SubscriptionGate::new(organizations.clone(), clock.clone()));

	AppState {
		pool,
		organizations,
		teams,
		properties,
		users,
		grants,
		resolver,
		permissions,
		subscriptions,
		clock,
	}
}

impl AppState {
	/// Creates a property in its organization.
	///
	/// Requires `property.create`, an active subscription or trial, and room
	/// under the organization's property limit.
	#[instrument(skip(self, actor, property), fields(org_id = %property.organization_id))]
	pub async fn create_property(&self, actor: Option<&Actor>, property: Property) -> Result<Property> {
		let org_id = property.organization_id;
		self.resolver
			.authorize(
				actor,
				Capability::new(Resource::Property, Action::Create),
				Some(org_id),
				None,
			)
			.await?;
		self.subscriptions.assert_subscription_active(org_id).await?;

		let org = self.load_organization(org_id).await?;
		let limit = org.limit_at(LimitKind::Properties, self.clock.now());
		let current = self.properties.count_properties_for_org(org_id).await?;
		self.subscriptions
			.check_limit(&org, LimitKind::Properties, current)?;

		if !self
			.properties
			.create_property_within_limit(&property, limit)
			.await?
		{
			let current = self.properties.count_properties_for_org(org_id).await?;
			return Err(limit_reached(LimitKind::Properties, limit, current));
		}
		tracing::info!(property_id = %property.id, "property created");
		Ok(property)
	}

	/// Adds a new member to the actor's organization.
	///
	/// Requires `staff.invite` and room under the organization's user limit.
	#[instrument(skip(self, actor, user), fields(user_id = %user.id))]
	pub async fn add_member(&self, actor: Option<&Actor>, user: User) -> Result<User> {
		let Some(caller) = actor else {
			return Err(AuthError::AuthenticationRequired);
		};
		let org_id = caller
			.active_organization_id
			.ok_or_else(|| AuthError::Forbidden("no active organization".to_string()))?;
		self.resolver
			.authorize(
				actor,
				Capability::new(Resource::Staff, Action::Invite),
				Some(org_id),
				None,
			)
			.await?;
		self.subscriptions.assert_subscription_active(org_id).await?;

		let org = self.load_organization(org_id).await?;
		let limit = org.limit_at(LimitKind::Users, self.clock.now());
		let current = self.users.count_organization_members(org_id).await?;
		self.subscriptions.check_limit(&org, LimitKind::Users, current)?;

		let user = user.in_organization(org_id);
		if !self
			.users
			.create_member_within_limit(&user, org_id, limit)
			.await?
		{
			let current = self.users.count_organization_members(org_id).await?;
			return Err(limit_reached(LimitKind::Users, limit, current));
		}
		tracing::info!(org_id = %org_id, role = %user.role, "member added");
		Ok(user)
	}

	async fn load_organization(&self, org_id: OrgId) -> Result<Organization> {
		self.organizations
			.get_organization_by_id(org_id)
			.await?
			.ok_or(AuthError::OrgNotFound(org_id))
	}
}

/// A limited insert lost the race for the last slot.
fn limit_reached(kind: LimitKind, limit: Option<u32>, current: u32) -> AuthError {
	AuthError::PlanLimitReached {
		kind,
		limit: limit.unwrap_or(current),
		current,
	}
}
