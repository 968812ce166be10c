// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Property repository.

use async_trait::async_trait;
use chrono::Utc;
use lodge_server_auth::{OrgId, Property, PropertyDirectory, PropertyId, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{format_ts, parse_id, parse_opt_id};

#[derive(Clone)]
pub struct PropertyRepository {
	pool: SqlitePool,
}

impl PropertyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, property), fields(property_id = %property.id, org_id = %property.organization_id))]
	pub async fn create_property(&self, property: &Property) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO properties (id, organization_id, owner_id, name, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(property.id.to_string())
		.bind(property.organization_id.to_string())
		.bind(property.owner_id.map(|id| id.to_string()))
		.bind(&property.name)
		.bind(format_ts(Utc::now()))
		.execute(&self.pool)
		.await?;

		tracing::debug!(property_id = %property.id, "property created");
		Ok(())
	}

	/// Inserts the property only while the organization holds fewer than
	/// `limit` properties. Count and insert run as one statement, so concurrent
	/// callers cannot overshoot the limit. Returns false when the limit is
	/// already reached.
	#[tracing::instrument(skip(self, property), fields(property_id = %property.id, org_id = %property.organization_id))]
	pub async fn create_property_within_limit(
		&self,
		property: &Property,
		limit: Option<u32>,
	) -> Result<bool, DbError> {
		let Some(limit) = limit else {
			self.create_property(property).await?;
			return Ok(true);
		};
		let org_id = property.organization_id.to_string();
		let result = sqlx::query(
			r#"
			INSERT INTO properties (id, organization_id, owner_id, name, created_at)
			SELECT ?, ?, ?, ?, ?
			WHERE (SELECT COUNT(*) FROM properties WHERE organization_id = ?) < ?
			"#,
		)
		.bind(property.id.to_string())
		.bind(&org_id)
		.bind(property.owner_id.map(|id| id.to_string()))
		.bind(&property.name)
		.bind(format_ts(Utc::now()))
		.bind(&org_id)
		.bind(i64::from(limit))
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(property_id = %id))]
	pub async fn get_property_by_id(&self, id: PropertyId) -> Result<Option<Property>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, organization_id, owner_id, name
			FROM properties
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_property(&r)).transpose()
	}

	/// Properties the user owns directly or through owning their organization.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_properties_owned_by(&self, user_id: UserId) -> Result<Vec<Property>, DbError> {
		let user_id = user_id.to_string();
		let rows = sqlx::query(
			r#"
			SELECT p.id, p.organization_id, p.owner_id, p.name
			FROM properties p
			JOIN organizations o ON o.id = p.organization_id
			WHERE p.owner_id = ? OR o.owner_id = ?
			ORDER BY p.name
			"#,
		)
		.bind(&user_id)
		.bind(&user_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(|r| self.row_to_property(r)).collect()
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn count_properties_for_org(&self, org_id: OrgId) -> Result<u32, DbError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM properties WHERE organization_id = ?")
			.bind(org_id.to_string())
			.fetch_one(&self.pool)
			.await?;
		u32::try_from(count).map_err(|_| DbError::Internal(format!("property count out of range: {count}")))
	}

	fn row_to_property(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Property, DbError> {
		let id: String = row.get("id");
		let org_id: String = row.get("organization_id");

		Ok(Property {
			id: parse_id(&id, "property id")?,
			organization_id: parse_id(&org_id, "organization_id")?,
			owner_id: parse_opt_id(row.get("owner_id"), "owner_id")?,
			name: row.get("name"),
		})
	}
}

#[async_trait]
impl PropertyDirectory for PropertyRepository {
	async fn get_property_by_id(&self, id: PropertyId) -> lodge_server_auth::Result<Option<Property>> {
		Ok(self.get_property_by_id(id).await?)
	}

	async fn list_properties_owned_by(&self, user_id: UserId) -> lodge_server_auth::Result<Vec<Property>> {
		Ok(self.list_properties_owned_by(user_id).await?)
	}
}
