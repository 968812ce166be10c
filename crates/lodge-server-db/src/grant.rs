// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Property grant repository.
//!
//! One row per `(user_id, property_id)`. Assignment is a single upsert
//! statement so concurrent assigners never produce duplicates.

use async_trait::async_trait;
use chrono::Utc;
use lodge_server_auth::{
	AnnotatedGrant, CapabilityFlags, GrantId, GrantStore, NewGrant, PropertyGrant, PropertyId, UserId,
};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{format_ts, parse_enum, parse_id, parse_ts};

const GRANT_COLUMNS: &str = "id, user_id, property_id, role, can_manage_tenants, can_manage_leases, \
	can_collect_payments, can_view_financials, can_manage_maintenance, can_manage_properties, \
	granted_by, created_at, updated_at";

#[derive(Clone)]
pub struct GrantRepository {
	pool: SqlitePool,
}

impl GrantRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert or replace the grant for the pair, keeping its id and creation time.
	#[tracing::instrument(
		skip(self, grant),
		fields(user_id = %grant.user_id, property_id = %grant.property_id, role = %grant.role)
	)]
	pub async fn upsert_grant(&self, grant: &NewGrant) -> Result<PropertyGrant, DbError> {
		let now = format_ts(Utc::now());
		let flags = &grant.flags;
		let row = sqlx::query(&format!(
			r#"
			INSERT INTO property_permissions (
				id, user_id, property_id, role,
				can_manage_tenants, can_manage_leases, can_collect_payments,
				can_view_financials, can_manage_maintenance, can_manage_properties,
				granted_by, created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(user_id, property_id) DO UPDATE SET
				role = excluded.role,
				can_manage_tenants = excluded.can_manage_tenants,
				can_manage_leases = excluded.can_manage_leases,
				can_collect_payments = excluded.can_collect_payments,
				can_view_financials = excluded.can_view_financials,
				can_manage_maintenance = excluded.can_manage_maintenance,
				can_manage_properties = excluded.can_manage_properties,
				granted_by = excluded.granted_by,
				updated_at = excluded.updated_at
			RETURNING {GRANT_COLUMNS}
			"#
		))
		.bind(GrantId::generate().to_string())
		.bind(grant.user_id.to_string())
		.bind(grant.property_id.to_string())
		.bind(grant.role.as_str())
		.bind(flags.can_manage_tenants)
		.bind(flags.can_manage_leases)
		.bind(flags.can_collect_payments)
		.bind(flags.can_view_financials)
		.bind(flags.can_manage_maintenance)
		.bind(flags.can_manage_properties)
		.bind(grant.granted_by.to_string())
		.bind(&now)
		.bind(&now)
		.fetch_one(&self.pool)
		.await?;

		let stored = self.row_to_grant(&row)?;
		tracing::info!(grant_id = %stored.id, "property grant stored");
		Ok(stored)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, property_id = %property_id))]
	pub async fn delete_grant(&self, user_id: UserId, property_id: PropertyId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM property_permissions WHERE user_id = ? AND property_id = ?")
			.bind(user_id.to_string())
			.bind(property_id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, property_id = %property_id))]
	pub async fn get_grant(
		&self,
		user_id: UserId,
		property_id: PropertyId,
	) -> Result<Option<PropertyGrant>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {GRANT_COLUMNS} FROM property_permissions WHERE user_id = ? AND property_id = ?"
		))
		.bind(user_id.to_string())
		.bind(property_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_grant(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_grants_for_user(&self, user_id: UserId) -> Result<Vec<PropertyGrant>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {GRANT_COLUMNS} FROM property_permissions WHERE user_id = ? ORDER BY created_at"
		))
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(|r| self.row_to_grant(r)).collect()
	}

	/// Grants on a property with grantee and granter names for display.
	#[tracing::instrument(skip(self), fields(property_id = %property_id))]
	pub async fn list_grants_for_property(
		&self,
		property_id: PropertyId,
	) -> Result<Vec<AnnotatedGrant>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT pp.id, pp.user_id, pp.property_id, pp.role,
				pp.can_manage_tenants, pp.can_manage_leases, pp.can_collect_payments,
				pp.can_view_financials, pp.can_manage_maintenance, pp.can_manage_properties,
				pp.granted_by, pp.created_at, pp.updated_at,
				u.name AS user_name, u.email AS user_email,
				g.name AS granted_by_name
			FROM property_permissions pp
			JOIN users u ON u.id = pp.user_id
			LEFT JOIN users g ON g.id = pp.granted_by
			WHERE pp.property_id = ?
			ORDER BY u.name
			"#,
		)
		.bind(property_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter()
			.map(|r| {
				Ok(AnnotatedGrant {
					grant: self.row_to_grant(r)?,
					user_name: r.get("user_name"),
					user_email: r.get("user_email"),
					granted_by_name: r.get("granted_by_name"),
				})
			})
			.collect()
	}

	pub async fn count_grants(&self) -> Result<i64, DbError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM property_permissions")
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}

	fn row_to_grant(&self, row: &sqlx::sqlite::SqliteRow) -> Result<PropertyGrant, DbError> {
		let id: String = row.get("id");
		let user_id: String = row.get("user_id");
		let property_id: String = row.get("property_id");
		let role: String = row.get("role");
		let granted_by: String = row.get("granted_by");
		let created_at: String = row.get("created_at");
		let updated_at: String = row.get("updated_at");

		Ok(PropertyGrant {
			id: parse_id(&id, "grant id")?,
			user_id: parse_id(&user_id, "user_id")?,
			property_id: parse_id(&property_id, "property_id")?,
			role: parse_enum(&role, "role")?,
			flags: CapabilityFlags {
				can_manage_tenants: row.get("can_manage_tenants"),
				can_manage_leases: row.get("can_manage_leases"),
				can_collect_payments: row.get("can_collect_payments"),
				can_view_financials: row.get("can_view_financials"),
				can_manage_maintenance: row.get("can_manage_maintenance"),
				can_manage_properties: row.get("can_manage_properties"),
			},
			granted_by: parse_id(&granted_by, "granted_by")?,
			created_at: parse_ts(&created_at, "created_at")?,
			updated_at: parse_ts(&updated_at, "updated_at")?,
		})
	}
}

#[async_trait]
impl GrantStore for GrantRepository {
	async fn upsert_grant(&self, grant: &NewGrant) -> lodge_server_auth::Result<PropertyGrant> {
		Ok(self.upsert_grant(grant).await?)
	}

	async fn delete_grant(&self, user_id: UserId, property_id: PropertyId) -> lodge_server_auth::Result<bool> {
		Ok(self.delete_grant(user_id, property_id).await?)
	}

	async fn get_grant(
		&self,
		user_id: UserId,
		property_id: PropertyId,
	) -> lodge_server_auth::Result<Option<PropertyGrant>> {
		Ok(self.get_grant(user_id, property_id).await?)
	}

	async fn list_grants_for_user(&self, user_id: UserId) -> lodge_server_auth::Result<Vec<PropertyGrant>> {
		Ok(self.list_grants_for_user(user_id).await?)
	}

	async fn list_grants_for_property(
		&self,
		property_id: PropertyId,
	) -> lodge_server_auth::Result<Vec<AnnotatedGrant>> {
		Ok(self.list_grants_for_property(property_id).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::org::OrganizationRepository;
	use crate::property::PropertyRepository;
	use crate::testing::create_test_pool;
	use crate::user::UserRepository;
	use lodge_server_auth::{GrantRole, Organization, Property, Role, User};

	struct Fixture {
		grants: GrantRepository,
		owner: User,
		staff: User,
		property: Property,
	}

	async fn fixture() -> Fixture {
		let pool = create_test_pool().await;
		let users = UserRepository::new(pool.clone());
		let owner = User::new("Owen", "owen@example.com", Role::AgentOwner);
		users.create_user(&owner).await.unwrap();
		let org = Organization::new("Acme", owner.id);
		OrganizationRepository::new(pool.clone())
			.create_organization(&org)
			.await
			.unwrap();
		let staff = User::new("Sam", "sam@example.com", Role::AgentStaff).in_organization(org.id);
		users.create_user(&staff).await.unwrap();
		let property = Property::new(org.id, "7 Elm Rd");
		PropertyRepository::new(pool.clone())
			.create_property(&property)
			.await
			.unwrap();
		Fixture {
			grants: GrantRepository::new(pool),
			owner,
			staff,
			property,
		}
	}

	fn new_grant(f: &Fixture, role: GrantRole) -> NewGrant {
		NewGrant {
			user_id: f.staff.id,
			property_id: f.property.id,
			role,
			flags: CapabilityFlags::preset(role),
			granted_by: f.owner.id,
		}
	}

	#[tokio::test]
	async fn upsert_keeps_single_row_and_id() {
		let f = fixture().await;
		let first = f.grants.upsert_grant(&new_grant(&f, GrantRole::Caretaker)).await.unwrap();
		let second = f.grants.upsert_grant(&new_grant(&f, GrantRole::Agent)).await.unwrap();

		assert_eq!(first.id, second.id);
		assert_eq!(first.created_at, second.created_at);
		assert_eq!(second.role, GrantRole::Agent);
		assert_eq!(second.flags, CapabilityFlags::preset(GrantRole::Agent));
		assert_eq!(f.grants.count_grants().await.unwrap(), 1);

		let stored = f.grants.get_grant(f.staff.id, f.property.id).await.unwrap();
		assert_eq!(stored, Some(second));
	}

	#[tokio::test]
	async fn delete_reports_presence() {
		let f = fixture().await;
		f.grants.upsert_grant(&new_grant(&f, GrantRole::Readonly)).await.unwrap();
		assert!(f.grants.delete_grant(f.staff.id, f.property.id).await.unwrap());
		assert!(!f.grants.delete_grant(f.staff.id, f.property.id).await.unwrap());
		assert!(f.grants.list_grants_for_user(f.staff.id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn property_listing_is_annotated() {
		let f = fixture().await;
		f.grants.upsert_grant(&new_grant(&f, GrantRole::Caretaker)).await.unwrap();

		let listed = f.grants.list_grants_for_property(f.property.id).await.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].user_name, "Sam");
		assert_eq!(listed[0].user_email, "sam@example.com");
		assert_eq!(listed[0].granted_by_name.as_deref(), Some("Owen"));
	}

	#[tokio::test]
	async fn unknown_granter_has_no_name() {
		let f = fixture().await;
		let mut grant = new_grant(&f, GrantRole::Readonly);
		grant.granted_by = UserId::generate();
		f.grants.upsert_grant(&grant).await.unwrap();

		let listed = f.grants.list_grants_for_property(f.property.id).await.unwrap();
		assert_eq!(listed[0].granted_by_name, None);
	}

	#[tokio::test]
	async fn concurrent_upserts_leave_one_row() {
		let f = fixture().await;
		let grant = new_grant(&f, GrantRole::Agent);
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let repo = f.grants.clone();
				let grant = grant.clone();
				tokio::spawn(async move { repo.upsert_grant(&grant).await })
			})
			.collect();
		for handle in handles {
			handle.await.unwrap().unwrap();
		}
		assert_eq!(f.grants.count_grants().await.unwrap(), 1);
	}
}
