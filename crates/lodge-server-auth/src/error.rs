// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access decision error types.

use thiserror::Error;

use crate::org::{LimitKind, PlanFeature, SubscriptionPlan};
use crate::types::{OrgId, PropertyId, TeamId, UserId};

/// Errors that can occur while resolving or managing access.
#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Authentication Errors
	// =========================================================================
	/// No authenticated actor was supplied.
	#[error("authentication required")]
	AuthenticationRequired,

	// =========================================================================
	// Authorization Errors
	// =========================================================================
	/// The actor lacks the required capability.
	#[error("forbidden: {0}")]
	Forbidden(String),

	// =========================================================================
	// Validation Errors
	// =========================================================================
	/// Malformed input to a permission-management call.
	#[error("validation failed: {0}")]
	Validation(String),

	// =========================================================================
	// Not Found Errors
	// =========================================================================
	#[error("organization not found: {0}")]
	OrgNotFound(OrgId),

	#[error("team not found: {0}")]
	TeamNotFound(TeamId),

	#[error("property not found: {0}")]
	PropertyNotFound(PropertyId),

	#[error("user not found: {0}")]
	UserNotFound(UserId),

	/// No grant exists for the `(user, property)` pair.
	#[error("no permission grant for user {user_id} on property {property_id}")]
	GrantNotFound {
		user_id: UserId,
		property_id: PropertyId,
	},

	// =========================================================================
	// Subscription Errors
	// =========================================================================
	/// A plan limit has been reached.
	#[error("{kind} limit reached ({current}/{limit}); upgrade your plan")]
	PlanLimitReached {
		kind: LimitKind,
		limit: u32,
		current: u32,
	},

	/// The feature is not part of the organization's plan.
	#[error("{feature} is not available on the {plan} plan")]
	FeatureNotInPlan {
		feature: PlanFeature,
		plan: SubscriptionPlan,
	},

	/// Neither a paid subscription nor a running trial.
	#[error("organization {0} has no active subscription or trial")]
	SubscriptionInactive(OrgId),

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	/// Persistence layer failure.
	#[error("storage error: {0}")]
	Storage(String),

	/// Internal error.
	#[error("internal error: {0}")]
	Internal(String),
}

impl AuthError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(self, AuthError::Storage(_) | AuthError::Internal(_))
	}

	/// Returns true for errors the UI renders as an upgrade prompt.
	pub fn is_subscription_error(&self) -> bool {
		matches!(
			self,
			AuthError::PlanLimitReached { .. }
				| AuthError::FeatureNotInPlan { .. }
				| AuthError::SubscriptionInactive(_)
		)
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			// 401 Unauthorized
			AuthError::AuthenticationRequired => 401,

			// 403 Forbidden
			AuthError::Forbidden(_) => 403,

			// 400 Bad Request
			AuthError::Validation(_) => 400,

			// 404 Not Found
			AuthError::OrgNotFound(_)
			| AuthError::TeamNotFound(_)
			| AuthError::PropertyNotFound(_)
			| AuthError::UserNotFound(_)
			| AuthError::GrantNotFound { .. } => 404,

			// 402 Payment Required
			AuthError::PlanLimitReached { .. }
			| AuthError::FeatureNotInPlan { .. }
			| AuthError::SubscriptionInactive(_) => 402,

			// 500 Internal Server Error
			AuthError::Storage(_) | AuthError::Internal(_) => 500,
		}
	}
}

pub type Result<T> = std::result::Result<T, AuthError>;
