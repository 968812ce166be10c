// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode, foreign keys and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./lodge.db")
///
/// # Errors
/// Returns `DbError::Internal` if the URL is not a `sqlite:` URL or cannot be
/// parsed, and `DbError::Sqlx` if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	if !database_url.starts_with("sqlite:") {
		return Err(DbError::Internal(
			"Invalid database URL: expected a sqlite: URL".to_string(),
		));
	}
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn creates_file_database() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("lodge.db").display());
		let pool = create_pool(&url).await.unwrap();
		let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
		assert_eq!(one, 1);
		assert!(dir.path().join("lodge.db").exists());
	}

	#[tokio::test]
	async fn rejects_invalid_url() {
		let err = create_pool("postgres://nope").await.unwrap_err();
		assert!(matches!(err, DbError::Internal(_)));
	}
}
