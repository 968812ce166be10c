// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Team repository: teams, their overrides and their property assignments.

use async_trait::async_trait;
use lodge_server_auth::{OrgId, PermissionTable, PropertyId, Team, TeamDirectory, TeamId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::rows::{format_ts, parse_id, parse_opt_enum, parse_ts};

#[derive(Clone)]
pub struct TeamRepository {
	pool: SqlitePool,
}

impl TeamRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a team. Names are unique within an organization.
	#[tracing::instrument(skip(self, team), fields(team_id = %team.id, org_id = %team.organization_id))]
	pub async fn create_team(&self, team: &Team) -> Result<(), DbError> {
		let overrides = serde_json::to_string(&team.overrides)?;
		let result = sqlx::query(
			r#"
			INSERT INTO teams (id, organization_id, name, team_admin_role, overrides, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(team.id.to_string())
		.bind(team.organization_id.to_string())
		.bind(&team.name)
		.bind(team.team_admin_role.map(|r| r.as_str()))
		.bind(overrides)
		.bind(format_ts(team.created_at))
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => Ok(()),
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict(format!(
				"team name already used in organization: {}",
				team.name
			))),
			Err(e) => Err(e.into()),
		}
	}

	#[tracing::instrument(skip(self), fields(team_id = %id))]
	pub async fn get_team_by_id(&self, id: TeamId) -> Result<Option<Team>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, organization_id, name, team_admin_role, overrides, created_at
			FROM teams
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| self.row_to_team(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn list_teams_for_org(&self, org_id: OrgId) -> Result<Vec<Team>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, organization_id, name, team_admin_role, overrides, created_at
			FROM teams
			WHERE organization_id = ?
			ORDER BY name
			"#,
		)
		.bind(org_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(|r| self.row_to_team(r)).collect()
	}

	/// Replaces the team's override table wholesale.
	#[tracing::instrument(skip(self, overrides), fields(team_id = %id))]
	pub async fn update_team_overrides(
		&self,
		id: TeamId,
		overrides: &PermissionTable,
	) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE teams SET overrides = ? WHERE id = ?")
			.bind(serde_json::to_string(overrides)?)
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("team {id}")));
		}
		tracing::debug!(team_id = %id, "team overrides replaced");
		Ok(())
	}

	/// Assigns a property to a team. Both must belong to the same organization.
	#[tracing::instrument(skip(self), fields(team_id = %team_id, property_id = %property_id))]
	pub async fn add_property_to_team(
		&self,
		team_id: TeamId,
		property_id: PropertyId,
	) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			INSERT OR IGNORE INTO team_properties (team_id, property_id)
			SELECT t.id, p.id
			FROM teams t
			JOIN properties p ON p.organization_id = t.organization_id
			WHERE t.id = ? AND p.id = ?
			"#,
		)
		.bind(team_id.to_string())
		.bind(property_id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() > 0 || self.is_property_in_team(team_id, property_id).await? {
			return Ok(());
		}

		let team_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM teams WHERE id = ?")
			.bind(team_id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		if team_exists.is_none() {
			return Err(DbError::NotFound(format!("team {team_id}")));
		}
		let property_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM properties WHERE id = ?")
			.bind(property_id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		if property_exists.is_none() {
			return Err(DbError::NotFound(format!("property {property_id}")));
		}

		Err(DbError::Conflict(format!(
			"property {property_id} belongs to another organization than team {team_id}"
		)))
	}

	#[tracing::instrument(skip(self), fields(team_id = %team_id, property_id = %property_id))]
	pub async fn remove_property_from_team(
		&self,
		team_id: TeamId,
		property_id: PropertyId,
	) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM team_properties WHERE team_id = ? AND property_id = ?")
			.bind(team_id.to_string())
			.bind(property_id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(team_id = %team_id, property_id = %property_id))]
	pub async fn is_property_in_team(
		&self,
		team_id: TeamId,
		property_id: PropertyId,
	) -> Result<bool, DbError> {
		let found: Option<i64> =
			sqlx::query_scalar("SELECT 1 FROM team_properties WHERE team_id = ? AND property_id = ?")
				.bind(team_id.to_string())
				.bind(property_id.to_string())
				.fetch_optional(&self.pool)
				.await?;
		Ok(found.is_some())
	}

	#[tracing::instrument(skip(self), fields(team_id = %team_id))]
	pub async fn get_team_property_ids(&self, team_id: TeamId) -> Result<Vec<PropertyId>, DbError> {
		let ids: Vec<String> =
			sqlx::query_scalar("SELECT property_id FROM team_properties WHERE team_id = ? ORDER BY property_id")
				.bind(team_id.to_string())
				.fetch_all(&self.pool)
				.await?;

		ids.iter().map(|id| parse_id(id, "property_id")).collect()
	}

	fn row_to_team(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Team, DbError> {
		let id: String = row.get("id");
		let org_id: String = row.get("organization_id");
		let overrides: String = row.get("overrides");
		let created_at: String = row.get("created_at");

		Ok(Team {
			id: parse_id(&id, "team id")?,
			organization_id: parse_id(&org_id, "organization_id")?,
			name: row.get("name"),
			team_admin_role: parse_opt_enum(row.get("team_admin_role"), "team_admin_role")?,
			overrides: serde_json::from_str(&overrides)?,
			created_at: parse_ts(&created_at, "created_at")?,
		})
	}
}

#[async_trait]
impl TeamDirectory for TeamRepository {
	async fn get_team_by_id(&self, id: TeamId) -> lodge_server_auth::Result<Option<Team>> {
		Ok(self.get_team_by_id(id).await?)
	}

	async fn is_property_in_team(
		&self,
		team_id: TeamId,
		property_id: PropertyId,
	) -> lodge_server_auth::Result<bool> {
		Ok(self.is_property_in_team(team_id, property_id).await?)
	}

	async fn get_team_property_ids(&self, team_id: TeamId) -> lodge_server_auth::Result<Vec<PropertyId>> {
		Ok(self.get_team_property_ids(team_id).await?)
	}
}
