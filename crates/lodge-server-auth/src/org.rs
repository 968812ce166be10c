// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organizations, subscription plans and trial state.
//!
//! The trial clock is authoritative: an organization is in trial only while
//! `now < trial_expires_at`, whatever the stored [`TrialStatus`] says. The
//! status column is a cache that the trial sweep brings up to date.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{OrgId, UnknownVariant, UserId};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Paid subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
	#[default]
	None,
	Active,
	PastDue,
}

impl SubscriptionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			SubscriptionStatus::None => "none",
			SubscriptionStatus::Active => "active",
			SubscriptionStatus::PastDue => "past_due",
		}
	}

	/// Active and past-due subscriptions both keep the organization writable.
	pub fn is_paying(&self) -> bool {
		matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
	}
}

impl fmt::Display for SubscriptionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SubscriptionStatus {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"none" => Ok(SubscriptionStatus::None),
			"active" => Ok(SubscriptionStatus::Active),
			"past_due" => Ok(SubscriptionStatus::PastDue),
			other => Err(UnknownVariant {
				kind: "subscription status",
				value: other.to_string(),
			}),
		}
	}
}

/// Cached trial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
	Active,
	Expired,
	Converted,
}

impl TrialStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			TrialStatus::Active => "active",
			TrialStatus::Expired => "expired",
			TrialStatus::Converted => "converted",
		}
	}
}

impl fmt::Display for TrialStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TrialStatus {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(TrialStatus::Active),
			"expired" => Ok(TrialStatus::Expired),
			"converted" => Ok(TrialStatus::Converted),
			other => Err(UnknownVariant {
				kind: "trial status",
				value: other.to_string(),
			}),
		}
	}
}

// =============================================================================
// Plans
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
	Starter,
	Professional,
	Enterprise,
}

impl SubscriptionPlan {
	pub fn all() -> &'static [SubscriptionPlan] {
		&[
			SubscriptionPlan::Starter,
			SubscriptionPlan::Professional,
			SubscriptionPlan::Enterprise,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			SubscriptionPlan::Starter => "starter",
			SubscriptionPlan::Professional => "professional",
			SubscriptionPlan::Enterprise => "enterprise",
		}
	}

	/// Feature bundle and default limits of the plan.
	pub fn features(&self) -> PlanFeatures {
		match self {
			SubscriptionPlan::Starter => PlanFeatures {
				document_storage: false,
				advanced_reporting: false,
				team_management: false,
				api_access: false,
				max_properties: Some(10),
				max_users: Some(3),
			},
			SubscriptionPlan::Professional => PlanFeatures {
				document_storage: true,
				advanced_reporting: true,
				team_management: true,
				api_access: false,
				max_properties: Some(50),
				max_users: Some(15),
			},
			SubscriptionPlan::Enterprise => PlanFeatures {
				document_storage: true,
				advanced_reporting: true,
				team_management: true,
				api_access: true,
				max_properties: None,
				max_users: None,
			},
		}
	}
}

impl fmt::Display for SubscriptionPlan {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SubscriptionPlan {
	type Err = UnknownVariant;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		SubscriptionPlan::all()
			.iter()
			.copied()
			.find(|p| p.as_str() == s)
			.ok_or_else(|| UnknownVariant {
				kind: "subscription plan",
				value: s.to_string(),
			})
	}
}

/// What a plan unlocks. `None` limits mean unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
	pub document_storage: bool,
	pub advanced_reporting: bool,
	pub team_management: bool,
	pub api_access: bool,
	pub max_properties: Option<u32>,
	pub max_users: Option<u32>,
}

impl PlanFeatures {
	pub fn has(&self, feature: PlanFeature) -> bool {
		match feature {
			PlanFeature::DocumentStorage => self.document_storage,
			PlanFeature::AdvancedReporting => self.advanced_reporting,
			PlanFeature::TeamManagement => self.team_management,
			PlanFeature::ApiAccess => self.api_access,
		}
	}
}

/// Feature flags gated by plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFeature {
	DocumentStorage,
	AdvancedReporting,
	TeamManagement,
	ApiAccess,
}

impl fmt::Display for PlanFeature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PlanFeature::DocumentStorage => f.write_str("document storage"),
			PlanFeature::AdvancedReporting => f.write_str("advanced reporting"),
			PlanFeature::TeamManagement => f.write_str("team management"),
			PlanFeature::ApiAccess => f.write_str("API access"),
		}
	}
}

/// Plan-limited resource counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
	Properties,
	Users,
}

impl fmt::Display for LimitKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LimitKind::Properties => f.write_str("properties"),
			LimitKind::Users => f.write_str("users"),
		}
	}
}

// =============================================================================
// Organization
// =============================================================================

/// Tenant boundary. Every property, tenant and lease belongs to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
	pub id: OrgId,
	pub name: String,
	/// The agent owner who created the organization.
	pub owner_id: UserId,
	pub subscription_status: SubscriptionStatus,
	pub subscription_plan: Option<SubscriptionPlan>,
	pub trial_status: Option<TrialStatus>,
	pub trial_expires_at: Option<DateTime<Utc>>,
	/// Overrides the plan default when set.
	pub max_properties: Option<u32>,
	/// Overrides the plan default when set.
	pub max_users: Option<u32>,
	pub created_at: DateTime<Utc>,
}

impl Organization {
	/// Creates an organization with no subscription and no trial.
	pub fn new(name: impl Into<String>, owner_id: UserId) -> Self {
		Self {
			id: OrgId::generate(),
			name: name.into(),
			owner_id,
			subscription_status: SubscriptionStatus::None,
			subscription_plan: None,
			trial_status: None,
			trial_expires_at: None,
			max_properties: None,
			max_users: None,
			created_at: Utc::now(),
		}
	}

	pub fn is_owned_by(&self, user_id: UserId) -> bool {
		self.owner_id == user_id
	}

	/// True while the trial is marked active and strictly before its expiry.
	pub fn is_in_trial_at(&self, now: DateTime<Utc>) -> bool {
		match (self.trial_status, self.trial_expires_at) {
			(Some(TrialStatus::Active), Some(expires_at)) => now < expires_at,
			_ => false,
		}
	}

	/// Whole days left in the trial, rounded up. Zero once expired.
	pub fn trial_days_remaining_at(&self, now: DateTime<Utc>) -> u32 {
		if !self.is_in_trial_at(now) {
			return 0;
		}
		let Some(expires_at) = self.trial_expires_at else {
			return 0;
		};
		let millis = (expires_at - now).num_milliseconds().max(0);
		let days = (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
		u32::try_from(days).unwrap_or(u32::MAX).max(1)
	}

	/// True when the stored status says active but the clock says expired.
	pub fn trial_lapsed_at(&self, now: DateTime<Utc>) -> bool {
		matches!(self.trial_status, Some(TrialStatus::Active))
			&& self.trial_expires_at.is_some_and(|at| now >= at)
	}

	/// The plan whose features apply right now.
	///
	/// A paying organization uses its subscribed plan (starter if none is
	/// recorded); a running trial evaluates as professional.
	pub fn effective_plan_at(&self, now: DateTime<Utc>) -> Option<SubscriptionPlan> {
		if self.subscription_status.is_paying() {
			return Some(
				self
					.subscription_plan
					.unwrap_or(SubscriptionPlan::Starter),
			);
		}
		if self.is_in_trial_at(now) {
			return Some(SubscriptionPlan::Professional);
		}
		None
	}

	/// The effective cap for `kind`. `None` means unlimited.
	pub fn limit_at(&self, kind: LimitKind, now: DateTime<Utc>) -> Option<u32> {
		let plan = self
			.effective_plan_at(now)
			.unwrap_or(SubscriptionPlan::Starter)
			.features();
		match kind {
			LimitKind::Properties => self.max_properties.or(plan.max_properties),
			LimitKind::Users => self.max_users.or(plan.max_users),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	fn trial_org(expires_at: DateTime<Utc>) -> Organization {
		let mut org = Organization::new("Acme Lettings", UserId::generate());
		org.trial_status = Some(TrialStatus::Active);
		org.trial_expires_at = Some(expires_at);
		org
	}

	mod trial {
		use super::*;

		#[test]
		fn in_trial_before_expiry() {
			let now = Utc::now();
			let org = trial_org(now + Duration::hours(1));
			assert!(org.is_in_trial_at(now));
		}

		#[test]
		fn not_in_trial_at_exact_expiry() {
			let now = Utc::now();
			let org = trial_org(now);
			assert!(!org.is_in_trial_at(now));
			assert!(org.trial_lapsed_at(now));
		}

		#[test]
		fn stale_active_status_does_not_extend_trial() {
			let now = Utc::now();
			let org = trial_org(now - Duration::days(2));
			assert_eq!(org.trial_status, Some(TrialStatus::Active));
			assert!(!org.is_in_trial_at(now));
			assert_eq!(org.trial_days_remaining_at(now), 0);
		}

		#[test]
		fn converted_trial_is_not_in_trial() {
			let now = Utc::now();
			let mut org = trial_org(now + Duration::days(3));
			org.trial_status = Some(TrialStatus::Converted);
			assert!(!org.is_in_trial_at(now));
			assert!(!org.trial_lapsed_at(now));
		}

		#[test]
		fn days_remaining_rounds_up() {
			let now = Utc::now();
			let org = trial_org(now + Duration::days(6) + Duration::hours(1));
			assert_eq!(org.trial_days_remaining_at(now), 7);

			let org = trial_org(now + Duration::minutes(5));
			assert_eq!(org.trial_days_remaining_at(now), 1);

			let org = trial_org(now + Duration::days(14));
			assert_eq!(org.trial_days_remaining_at(now), 14);
		}
	}

	mod plans {
		use super::*;

		#[test]
		fn trial_evaluates_as_professional() {
			let now = Utc::now();
			let org = trial_org(now + Duration::days(1));
			assert_eq!(
				org.effective_plan_at(now),
				Some(SubscriptionPlan::Professional)
			);
		}

		#[test]
		fn paying_org_without_plan_is_starter() {
			let mut org = Organization::new("Acme", UserId::generate());
			org.subscription_status = SubscriptionStatus::PastDue;
			assert_eq!(
				org.effective_plan_at(Utc::now()),
				Some(SubscriptionPlan::Starter)
			);
		}

		#[test]
		fn lapsed_org_has_no_plan() {
			let org = Organization::new("Acme", UserId::generate());
			assert_eq!(org.effective_plan_at(Utc::now()), None);
		}

		#[test]
		fn org_limit_overrides_plan_default() {
			let mut org = Organization::new("Acme", UserId::generate());
			org.subscription_status = SubscriptionStatus::Active;
			org.subscription_plan = Some(SubscriptionPlan::Professional);
			assert_eq!(org.limit_at(LimitKind::Properties, Utc::now()), Some(50));
			org.max_properties = Some(75);
			assert_eq!(org.limit_at(LimitKind::Properties, Utc::now()), Some(75));
		}

		#[test]
		fn enterprise_is_unlimited() {
			let mut org = Organization::new("Acme", UserId::generate());
			org.subscription_status = SubscriptionStatus::Active;
			org.subscription_plan = Some(SubscriptionPlan::Enterprise);
			assert_eq!(org.limit_at(LimitKind::Users, Utc::now()), None);
			assert!(SubscriptionPlan::Enterprise
				.features()
				.has(PlanFeature::ApiAccess));
		}

		#[test]
		fn statuses_parse() {
			assert_eq!(
				"past_due".parse::<SubscriptionStatus>().unwrap(),
				SubscriptionStatus::PastDue
			);
			assert_eq!(
				"converted".parse::<TrialStatus>().unwrap(),
				TrialStatus::Converted
			);
			assert!("gold".parse::<SubscriptionPlan>().is_err());
		}
	}
}
