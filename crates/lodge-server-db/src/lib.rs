// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # lodge-server-db
//!
//! SQLite persistence for the Lodge access core via sqlx.
//!
//! ## Repository Pattern
//!
//! Each repository holds a `SqlitePool`, exposes inherent async methods that
//! return [`DbError`], and implements the matching collaborator trait from
//! `lodge-server-auth` by delegating to those methods:
//!
//! | Repository | Implements |
//! |------------|------------|
//! | [`OrganizationRepository`] | `OrganizationDirectory`, `TrialStore` |
//! | [`TeamRepository`] | `TeamDirectory` |
//! | [`PropertyRepository`] | `PropertyDirectory` |
//! | [`UserRepository`] | `UserDirectory` |
//! | [`GrantRepository`] | `GrantStore` |
//!
//! `DbError` converts into `AuthError`: `Conflict` becomes a validation error
//! and everything else becomes a storage error.
//!
//! ## Return Type Conventions
//!
//! | Operation | Return type |
//! |-----------|-------------|
//! | Get by ID | `Result<Option<T>>` |
//! | List | `Result<Vec<T>>` |
//! | Create | `Result<()>` |
//! | Update by ID | `Result<()>`, `NotFound` when the row is missing |
//! | Delete / guarded transition | `Result<bool>` |
//!
//! ## Testing
//!
//! [`testing::create_test_pool`] returns an in-memory pool with the schema
//! applied.

mod error;
pub mod grant;
pub mod migrations;
pub mod org;
pub mod pool;
pub mod property;
mod rows;
pub mod team;
pub mod testing;
pub mod user;

pub use error::{DbError, Result};
pub use grant::GrantRepository;
pub use migrations::run_migrations;
pub use org::OrganizationRepository;
pub use pool::create_pool;
pub use property::PropertyRepository;
pub use team::TeamRepository;
pub use user::UserRepository;
