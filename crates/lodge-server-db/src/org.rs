// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organization repository: tenant records, subscription state and trials.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lodge_server_auth::{
	OrgId, Organization, OrganizationDirectory, SubscriptionPlan, SubscriptionStatus, TrialStatus,
	TrialStore,
};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{format_ts, parse_enum, parse_id, parse_limit, parse_opt_enum, parse_opt_ts, parse_ts};

const ORG_COLUMNS: &str = "id, name, owner_id, subscription_status, subscription_plan, trial_status, \
	trial_expires_at, max_properties, max_users, created_at";

/// Repository for organization database operations.
#[derive(Clone)]
pub struct OrganizationRepository {
	pool: SqlitePool,
}

impl OrganizationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, org), fields(org_id = %org.id))]
	pub async fn create_organization(&self, org: &Organization) -> Result<(), DbError> {
		let now = format_ts(Utc::now());
		sqlx::query(
			r#"
			INSERT INTO organizations (
				id, name, owner_id, subscription_status, subscription_plan, trial_status,
				trial_expires_at, max_properties, max_users, created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(org.id.to_string())
		.bind(&org.name)
		.bind(org.owner_id.to_string())
		.bind(org.subscription_status.as_str())
		.bind(org.subscription_plan.map(|p| p.as_str()))
		.bind(org.trial_status.map(|s| s.as_str()))
		.bind(org.trial_expires_at.map(format_ts))
		.bind(org.max_properties.map(i64::from))
		.bind(org.max_users.map(i64::from))
		.bind(format_ts(org.created_at))
		.bind(now)
		.execute(&self.pool)
		.await?;

		tracing::debug!(org_id = %org.id, "organization created");
		Ok(())
	}

	/// Get an organization by ID.
	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn get_organization_by_id(&self, id: OrgId) -> Result<Option<Organization>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {ORG_COLUMNS} FROM organizations WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_org(&r)).transpose()
	}

	/// Records a subscription change.
	///
	/// Moving to a paying status converts a trial that is still active.
	#[tracing::instrument(skip(self), fields(org_id = %id, status = %status))]
	pub async fn update_subscription(
		&self,
		id: OrgId,
		status: SubscriptionStatus,
		plan: Option<SubscriptionPlan>,
	) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE organizations
			SET subscription_status = ?,
				subscription_plan = ?,
				trial_status = CASE
					WHEN ? = 1 AND trial_status = 'active' THEN 'converted'
					ELSE trial_status
				END,
				updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(status.as_str())
		.bind(plan.map(|p| p.as_str()))
		.bind(status.is_paying())
		.bind(format_ts(Utc::now()))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("organization {id}")));
		}
		tracing::debug!(org_id = %id, "subscription updated");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn start_trial(&self, id: OrgId, expires_at: DateTime<Utc>) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE organizations
			SET trial_status = 'active', trial_expires_at = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(format_ts(expires_at))
		.bind(format_ts(Utc::now()))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("organization {id}")));
		}
		Ok(())
	}

	/// Sets organization-level limits. `None` falls back to the plan default.
	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn update_limits(
		&self,
		id: OrgId,
		max_properties: Option<u32>,
		max_users: Option<u32>,
	) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE organizations
			SET max_properties = ?, max_users = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(max_properties.map(i64::from))
		.bind(max_users.map(i64::from))
		.bind(format_ts(Utc::now()))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("organization {id}")));
		}
		Ok(())
	}

	/// Ids of trials still marked active whose expiry has passed.
	///
	/// Only the id column is read, so a damaged row elsewhere cannot hold up
	/// the rest. Ids that fail to parse are logged and left out.
	#[tracing::instrument(skip(self))]
	pub async fn list_lapsed_trials(&self, now: DateTime<Utc>) -> Result<Vec<OrgId>, DbError> {
		let ids: Vec<String> = sqlx::query_scalar(
			r#"
			SELECT id FROM organizations
			WHERE trial_status = 'active' AND trial_expires_at <= ?
			ORDER BY trial_expires_at
			"#,
		)
		.bind(format_ts(now))
		.fetch_all(&self.pool)
		.await?;

		Ok(ids
			.iter()
			.filter_map(|id| match parse_id::<OrgId>(id, "organization id") {
				Ok(id) => Some(id),
				Err(e) => {
					tracing::warn!(raw_id = %id, error = %e, "skipping unparseable organization row");
					None
				}
			})
			.collect())
	}

	/// Guarded transition from active to expired.
	///
	/// Only touches the row while it is still active and lapsed, so concurrent
	/// sweeps each see at most one successful update per organization.
	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn expire_trial(&self, id: OrgId, now: DateTime<Utc>) -> Result<bool, DbError> {
		let now = format_ts(now);
		let result = sqlx::query(
			r#"
			UPDATE organizations
			SET trial_status = 'expired', updated_at = ?
			WHERE id = ? AND trial_status = 'active' AND trial_expires_at <= ?
			"#,
		)
		.bind(&now)
		.bind(id.to_string())
		.bind(&now)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	fn row_to_org(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Organization, DbError> {
		let id: String = row.get("id");
		let owner_id: String = row.get("owner_id");
		let status: String = row.get("subscription_status");
		let created_at: String = row.get("created_at");

		Ok(Organization {
			id: parse_id(&id, "organization id")?,
			name: row.get("name"),
			owner_id: parse_id(&owner_id, "owner_id")?,
			subscription_status: parse_enum(&status, "subscription_status")?,
			subscription_plan: parse_opt_enum(row.get("subscription_plan"), "subscription_plan")?,
			trial_status: parse_opt_enum::<TrialStatus>(row.get("trial_status"), "trial_status")?,
			trial_expires_at: parse_opt_ts(row.get("trial_expires_at"), "trial_expires_at")?,
			max_properties: parse_limit(row.get("max_properties"), "max_properties")?,
			max_users: parse_limit(row.get("max_users"), "max_users")?,
			created_at: parse_ts(&created_at, "created_at")?,
		})
	}
}

#[async_trait]
impl OrganizationDirectory for OrganizationRepository {
	async fn get_organization_by_id(&self, id: OrgId) -> lodge_server_auth::Result<Option<Organization>> {
		Ok(self.get_organization_by_id(id).await?)
	}
}

#[async_trait]
impl TrialStore for OrganizationRepository {
	async fn list_lapsed_trials(&self, now: DateTime<Utc>) -> lodge_server_auth::Result<Vec<OrgId>> {
		Ok(self.list_lapsed_trials(now).await?)
	}

	async fn expire_trial(&self, org_id: OrgId, now: DateTime<Utc>) -> lodge_server_auth::Result<bool> {
		Ok(self.expire_trial(org_id, now).await?)
	}
}
