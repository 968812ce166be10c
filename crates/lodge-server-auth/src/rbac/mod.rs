// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and team based access control.
//!
//! - [`RoleCatalog`]: the static `(role, resource, action)` matrix
//! - [`ResourceAccessControl`]: answers a single capability query for an
//!   actor, letting present team overrides win over role defaults
//! - [`PermissionTable`]: the nested `resource -> action -> bool` map used for
//!   both role tables and team overrides
//!
//! Evaluation is pure. All inputs are loaded before a query is asked.

mod catalog;
mod engine;
mod table;

pub use catalog::RoleCatalog;
pub use engine::ResourceAccessControl;
pub use table::PermissionTable;
