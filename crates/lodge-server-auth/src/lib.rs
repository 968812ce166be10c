// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access decisions for Lodge.
//!
//! This crate answers "may this actor do this to that resource" by composing
//! five layers:
//!
//! - **Roles** ([`RoleCatalog`]): the static matrix of what each role may do
//! - **Organizations**: tenant boundary; owners get everything in their own
//! - **Teams** ([`ResourceAccessControl`]): per-team overrides that beat role
//!   defaults, and property assignment that narrows scope
//! - **Property grants** ([`PropertyGrantStore`]): explicit per-property ACL rows
//! - **Subscriptions** ([`SubscriptionGate`]): trial, plan limit and feature checks
//!
//! [`PermissionResolver`] is the entry point for decisions and
//! [`PermissionsService`] is the grant management surface. All persistence is
//! behind the traits in [`directory`], [`GrantStore`] and [`TrialStore`], which
//! are injected at construction.

pub mod actor;
pub mod directory;
pub mod error;
pub mod grant;
pub mod org;
pub mod rbac;
pub mod resolver;
pub mod service;
pub mod subscription;
pub mod team;
pub mod types;

#[cfg(test)]
mod testing;

pub use actor::Actor;
pub use directory::{
	OrganizationDirectory, Property, PropertyDirectory, TeamDirectory, User, UserDirectory,
};
pub use error::{AuthError, Result};
pub use grant::{
	AnnotatedGrant, CapabilityFlags, CustomPermissions, Grant, GrantRole, GrantStore, NewGrant,
	OwnerGrant, PropertyGrant, PropertyGrantStore,
};
pub use org::{
	LimitKind, Organization, PlanFeature, PlanFeatures, SubscriptionPlan, SubscriptionStatus,
	TrialStatus,
};
pub use rbac::{PermissionTable, ResourceAccessControl, RoleCatalog};
pub use resolver::{
	Authorized, PermissionDecision, PermissionField, PermissionResolver, PermissionSet,
	PropertyScope,
};
pub use service::{AssignableUser, PermissionsService};
pub use subscription::{
	process_expired_trials, Clock, FixedClock, SubscriptionGate, SystemClock, TrialStore,
	TrialSweepReport,
};
pub use team::Team;
pub use types::{Action, Capability, GrantId, OrgId, PropertyId, Resource, Role, TeamId, UserId};
