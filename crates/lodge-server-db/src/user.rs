// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User repository.

use async_trait::async_trait;
use chrono::Utc;
use lodge_server_auth::{OrgId, User, UserDirectory, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{format_ts, parse_enum, parse_id, parse_opt_id};

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a user. A duplicate email is reported as [`DbError::Conflict`].
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn create_user(&self, user: &User) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO users (id, name, email, role, organization_id, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.name)
		.bind(&user.email)
		.bind(user.role.as_str())
		.bind(user.organization_id.map(|id| id.to_string()))
		.bind(format_ts(Utc::now()))
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(user_id = %user.id, role = %user.role, "user created");
				Ok(())
			}
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
				Err(DbError::Conflict(format!("email already registered: {}", user.email)))
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Inserts a member of `org_id` only while the organization has fewer than
	/// `limit` members. Returns false when the limit is already reached.
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id, org_id = %org_id))]
	pub async fn create_member_within_limit(
		&self,
		user: &User,
		org_id: OrgId,
		limit: Option<u32>,
	) -> Result<bool, DbError> {
		let Some(limit) = limit else {
			let member = User {
				organization_id: Some(org_id),
				..user.clone()
			};
			self.create_user(&member).await?;
			return Ok(true);
		};
		let org_id = org_id.to_string();
		let result = sqlx::query(
			r#"
			INSERT INTO users (id, name, email, role, organization_id, created_at)
			SELECT ?, ?, ?, ?, ?, ?
			WHERE (SELECT COUNT(*) FROM users WHERE organization_id = ?) < ?
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.name)
		.bind(&user.email)
		.bind(user.role.as_str())
		.bind(&org_id)
		.bind(format_ts(Utc::now()))
		.bind(&org_id)
		.bind(i64::from(limit))
		.execute(&self.pool)
		.await;

		match result {
			Ok(r) => Ok(r.rows_affected() > 0),
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
				Err(DbError::Conflict(format!("email already registered: {}", user.email)))
			}
			Err(e) => Err(e.into()),
		}
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, email, role, organization_id
			FROM users
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_user(&r)).transpose()
	}

	/// Members ordered by name.
	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn list_organization_members(&self, org_id: OrgId) -> Result<Vec<User>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, email, role, organization_id
			FROM users
			WHERE organization_id = ?
			ORDER BY name
			"#,
		)
		.bind(org_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(|r| self.row_to_user(r)).collect()
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn count_organization_members(&self, org_id: OrgId) -> Result<u32, DbError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE organization_id = ?")
			.bind(org_id.to_string())
			.fetch_one(&self.pool)
			.await?;
		u32::try_from(count).map_err(|_| DbError::Internal(format!("member count out of range: {count}")))
	}

	/// Moves a user into (or out of) an organization.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn set_organization(&self, id: UserId, org_id: Option<OrgId>) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE users SET organization_id = ? WHERE id = ?")
			.bind(org_id.map(|o| o.to_string()))
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {id}")));
		}
		Ok(())
	}

	fn row_to_user(&self, row: &sqlx::sqlite::SqliteRow) -> Result<User, DbError> {
		let id: String = row.get("id");
		let role: String = row.get("role");

		Ok(User {
			id: parse_id(&id, "user id")?,
			name: row.get("name"),
			email: row.get("email"),
			role: parse_enum(&role, "role")?,
			organization_id: parse_opt_id(row.get("organization_id"), "organization_id")?,
		})
	}
}

#[async_trait]
impl UserDirectory for UserRepository {
	async fn get_user_by_id(&self, id: UserId) -> lodge_server_auth::Result<Option<User>> {
		Ok(self.get_user_by_id(id).await?)
	}

	async fn list_organization_members(&self, org_id: OrgId) -> lodge_server_auth::Result<Vec<User>> {
		Ok(self.list_organization_members(org_id).await?)
	}
}
