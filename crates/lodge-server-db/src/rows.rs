// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column conversions shared by the repositories.
//!
//! Timestamps are stored as RFC 3339 text with fixed microsecond precision and
//! a `Z` suffix so that string comparison in SQL matches time order.

use chrono::{DateTime, SecondsFormat, Utc};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|d| d.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parse_opt_ts(value: Option<String>, column: &str) -> Result<Option<DateTime<Utc>>, DbError> {
	value.map(|v| parse_ts(&v, column)).transpose()
}

pub(crate) fn parse_id<T: From<Uuid>>(value: &str, column: &str) -> Result<T, DbError> {
	Uuid::parse_str(value)
		.map(T::from)
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parse_opt_id<T: From<Uuid>>(value: Option<String>, column: &str) -> Result<Option<T>, DbError> {
	value.map(|v| parse_id(&v, column)).transpose()
}

pub(crate) fn parse_enum<T>(value: &str, column: &str) -> Result<T, DbError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	value
		.parse()
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parse_opt_enum<T>(value: Option<String>, column: &str) -> Result<Option<T>, DbError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	value.map(|v| parse_enum(&v, column)).transpose()
}

pub(crate) fn parse_limit(value: Option<i64>, column: &str) -> Result<Option<u32>, DbError> {
	value
		.map(|v| u32::try_from(v).map_err(|_| DbError::Internal(format!("Invalid {column}: {v}"))))
		.transpose()
}
