// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subscription, trial and plan-limit gating.
//!
//! Checks run before any billable mutation or feature-gated operation starts.
//! Trial state always comes from comparing `trial_expires_at` with the clock;
//! the stored trial status is only brought up to date by
//! [`process_expired_trials`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::directory::OrganizationDirectory;
use crate::error::{AuthError, Result};
use crate::org::{LimitKind, Organization, PlanFeature, PlanFeatures};
use crate::types::OrgId;

/// Source of the current time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.0
	}
}

#[derive(Clone)]
pub struct SubscriptionGate {
	organizations: Arc<dyn OrganizationDirectory>,
	clock: Arc<dyn Clock>,
}

impl SubscriptionGate {
	pub fn new(organizations: Arc<dyn OrganizationDirectory>, clock: Arc<dyn Clock>) -> Self {
		Self {
			organizations,
			clock,
		}
	}

	async fn load(&self, org_id: OrgId) -> Result<Organization> {
		self
			.organizations
			.get_organization_by_id(org_id)
			.await?
			.ok_or(AuthError::OrgNotFound(org_id))
	}

	/// Fails when creating one more `kind` would exceed the plan.
	#[instrument(skip(self), fields(%org_id, ?kind))]
	pub async fn assert_within_limit(
		&self,
		org_id: OrgId,
		kind: LimitKind,
		current_count: u32,
	) -> Result<()> {
		let org = self.load(org_id).await?;
		self.check_limit(&org, kind, current_count)
	}

	/// [`SubscriptionGate::assert_within_limit`] over an already loaded organization.
	pub fn check_limit(&self, org: &Organization, kind: LimitKind, current_count: u32) -> Result<()> {
		let Some(limit) = org.limit_at(kind, self.clock.now()) else {
			return Ok(());
		};
		if current_count >= limit {
			tracing::debug!(org_id = %org.id, limit, current_count, "plan limit reached");
			return Err(AuthError::PlanLimitReached {
				kind,
				limit,
				current: current_count,
			});
		}
		Ok(())
	}

	#[instrument(skip(self), fields(%org_id))]
	pub async fn is_in_trial(&self, org_id: OrgId) -> Result<bool> {
		let org = self.load(org_id).await?;
		Ok(org.is_in_trial_at(self.clock.now()))
	}

	#[instrument(skip(self), fields(%org_id))]
	pub async fn get_trial_days_remaining(&self, org_id: OrgId) -> Result<u32> {
		let org = self.load(org_id).await?;
		Ok(org.trial_days_remaining_at(self.clock.now()))
	}

	/// Mutations need a paying subscription or a trial still running.
	#[instrument(skip(self), fields(%org_id))]
	pub async fn assert_subscription_active(&self, org_id: OrgId) -> Result<()> {
		let org = self.load(org_id).await?;
		if org.subscription_status.is_paying() || org.is_in_trial_at(self.clock.now()) {
			return Ok(());
		}
		tracing::debug!("no active subscription or trial");
		Err(AuthError::SubscriptionInactive(org_id))
	}

	/// Features of the plan in effect now, `None` when nothing is in effect.
	#[instrument(skip(self), fields(%org_id))]
	pub async fn plan_features(&self, org_id: OrgId) -> Result<Option<PlanFeatures>> {
		let org = self.load(org_id).await?;
		Ok(org.effective_plan_at(self.clock.now()).map(|p| p.features()))
	}

	/// Fails unless the effective plan includes `feature`.
	#[instrument(skip(self), fields(%org_id, ?feature))]
	pub async fn assert_feature(&self, org_id: OrgId, feature: PlanFeature) -> Result<()> {
		let org = self.load(org_id).await?;
		let Some(plan) = org.effective_plan_at(self.clock.now()) else {
			return Err(AuthError::SubscriptionInactive(org_id));
		};
		if !plan.features().has(feature) {
			return Err(AuthError::FeatureNotInPlan { feature, plan });
		}
		Ok(())
	}
}

// =============================================================================
// Trial sweep
// =============================================================================

#[async_trait]
pub trait TrialStore: Send + Sync {
	/// Ids of organizations whose trial status is still active at or past
	/// expiry.
	async fn list_lapsed_trials(&self, now: DateTime<Utc>) -> Result<Vec<OrgId>>;

	/// Moves the trial from active to expired.
	///
	/// Returns false when the trial is no longer active and lapsed, for example
	/// because an overlapping sweep already moved it.
	async fn expire_trial(&self, org_id: OrgId, now: DateTime<Utc>) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrialSweepReport {
	pub examined: usize,
	pub expired: usize,
	pub skipped: usize,
	pub failed: usize,
}

/// Marks every lapsed trial as expired.
///
/// Safe to run concurrently with itself. A failure on one organization is
/// logged and counted; the sweep carries on with the rest.
#[instrument(skip(store))]
pub async fn process_expired_trials(
	store: &dyn TrialStore,
	now: DateTime<Utc>,
) -> Result<TrialSweepReport> {
	let candidates = store.list_lapsed_trials(now).await?;
	let mut report = TrialSweepReport {
		examined: candidates.len(),
		..Default::default()
	};

	for org_id in candidates {
		match store.expire_trial(org_id, now).await {
			Ok(true) => {
				tracing::info!(%org_id, "trial expired");
				report.expired += 1;
			}
			Ok(false) => {
				tracing::debug!(%org_id, "trial already transitioned");
				report.skipped += 1;
			}
			Err(e) => {
				tracing::warn!(%org_id, error = %e, "failed to expire trial");
				report.failed += 1;
			}
		}
	}

	Ok(report)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::org::{SubscriptionPlan, SubscriptionStatus, TrialStatus};
	use crate::testing::MemoryBackend;
	use crate::types::UserId;
	use chrono::Duration;

	fn gate(backend: &Arc<MemoryBackend>, now: DateTime<Utc>) -> SubscriptionGate {
		SubscriptionGate::new(backend.clone(), Arc::new(FixedClock(now)))
	}

	fn trial_org(expires_at: DateTime<Utc>) -> Organization {
		let mut org = Organization::new("Acme", UserId::generate());
		org.trial_status = Some(TrialStatus::Active);
		org.trial_expires_at = Some(expires_at);
		org
	}

	mod limits {
		use super::*;

		#[tokio::test]
		async fn limit_reached_at_equal_count() {
			let backend = Arc::new(MemoryBackend::default());
			let mut org = Organization::new("Acme", UserId::generate());
			org.subscription_status = SubscriptionStatus::Active;
			org.max_properties = Some(5);
			backend.add_org(org.clone());
			let gate = gate(&backend, Utc::now());

			gate.assert_within_limit(org.id, LimitKind::Properties, 4).await.unwrap();
			let err = gate
				.assert_within_limit(org.id, LimitKind::Properties, 5)
				.await
				.unwrap_err();
			assert!(matches!(
				err,
				AuthError::PlanLimitReached {
					limit: 5,
					current: 5,
					..
				}
			));
			assert_eq!(err.status_code(), 402);
		}

		#[tokio::test]
		async fn unlimited_plan_never_blocks() {
			let backend = Arc::new(MemoryBackend::default());
			let mut org = Organization::new("Acme", UserId::generate());
			org.subscription_status = SubscriptionStatus::Active;
			org.subscription_plan = Some(SubscriptionPlan::Enterprise);
			backend.add_org(org.clone());
			let gate = gate(&backend, Utc::now());
			gate.assert_within_limit(org.id, LimitKind::Users, 10_000).await.unwrap();
		}

		#[tokio::test]
		async fn missing_org_is_not_found() {
			let backend = Arc::new(MemoryBackend::default());
			let gate = gate(&backend, Utc::now());
			let err = gate
				.assert_within_limit(OrgId::generate(), LimitKind::Properties, 0)
				.await
				.unwrap_err();
			assert!(matches!(err, AuthError::OrgNotFound(_)));
		}
	}

	mod trial {
		use super::*;

		#[tokio::test]
		async fn trial_ends_exactly_at_expiry() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			let org = trial_org(now);
			backend.add_org(org.clone());

			assert!(!gate(&backend, now).is_in_trial(org.id).await.unwrap());
			assert!(gate(&backend, now - Duration::milliseconds(1))
				.is_in_trial(org.id)
				.await
				.unwrap());
		}

		#[tokio::test]
		async fn days_remaining() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			let org = trial_org(now + Duration::days(3) + Duration::hours(2));
			backend.add_org(org.clone());
			assert_eq!(
				gate(&backend, now).get_trial_days_remaining(org.id).await.unwrap(),
				4
			);
			assert_eq!(
				gate(&backend, now + Duration::days(5))
					.get_trial_days_remaining(org.id)
					.await
					.unwrap(),
				0
			);
		}

		#[tokio::test]
		async fn expired_trial_blocks_mutation_before_sweep() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			let org = trial_org(now - Duration::hours(1));
			backend.add_org(org.clone());
			let err = gate(&backend, now)
				.assert_subscription_active(org.id)
				.await
				.unwrap_err();
			assert!(matches!(err, AuthError::SubscriptionInactive(_)));
		}

		#[tokio::test]
		async fn past_due_still_allows_mutation() {
			let backend = Arc::new(MemoryBackend::default());
			let mut org = Organization::new("Acme", UserId::generate());
			org.subscription_status = SubscriptionStatus::PastDue;
			backend.add_org(org.clone());
			gate(&backend, Utc::now())
				.assert_subscription_active(org.id)
				.await
				.unwrap();
		}
	}

	mod features {
		use super::*;

		#[tokio::test]
		async fn trial_gets_professional_features() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			let org = trial_org(now + Duration::days(7));
			backend.add_org(org.clone());
			let gate = gate(&backend, now);
			gate.assert_feature(org.id, PlanFeature::DocumentStorage).await.unwrap();
			let err = gate
				.assert_feature(org.id, PlanFeature::ApiAccess)
				.await
				.unwrap_err();
			assert!(matches!(
				err,
				AuthError::FeatureNotInPlan {
					feature: PlanFeature::ApiAccess,
					plan: SubscriptionPlan::Professional,
				}
			));
		}

		#[tokio::test]
		async fn starter_lacks_document_storage() {
			let backend = Arc::new(MemoryBackend::default());
			let mut org = Organization::new("Acme", UserId::generate());
			org.subscription_status = SubscriptionStatus::Active;
			org.subscription_plan = Some(SubscriptionPlan::Starter);
			backend.add_org(org.clone());
			let gate = gate(&backend, Utc::now());
			assert!(gate
				.assert_feature(org.id, PlanFeature::DocumentStorage)
				.await
				.is_err());
			let features = gate.plan_features(org.id).await.unwrap().unwrap();
			assert!(!features.team_management);
		}

		#[tokio::test]
		async fn no_plan_is_inactive() {
			let backend = Arc::new(MemoryBackend::default());
			let org = Organization::new("Acme", UserId::generate());
			backend.add_org(org.clone());
			let gate = gate(&backend, Utc::now());
			let err = gate
				.assert_feature(org.id, PlanFeature::DocumentStorage)
				.await
				.unwrap_err();
			assert!(matches!(err, AuthError::SubscriptionInactive(_)));
			assert!(gate.plan_features(org.id).await.unwrap().is_none());
		}
	}

	mod sweep {
		use super::*;

		#[tokio::test]
		async fn expires_lapsed_trials_only() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			let lapsed = trial_org(now - Duration::days(1));
			let running = trial_org(now + Duration::days(1));
			backend.add_org(lapsed.clone());
			backend.add_org(running.clone());

			let report = process_expired_trials(backend.as_ref(), now).await.unwrap();
			assert_eq!(report.expired, 1);
			assert_eq!(
				backend.org(lapsed.id).unwrap().trial_status,
				Some(TrialStatus::Expired)
			);
			assert_eq!(
				backend.org(running.id).unwrap().trial_status,
				Some(TrialStatus::Active)
			);
		}

		#[tokio::test]
		async fn second_run_is_a_no_op() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			backend.add_org(trial_org(now - Duration::days(1)));

			let first = process_expired_trials(backend.as_ref(), now).await.unwrap();
			let second = process_expired_trials(backend.as_ref(), now).await.unwrap();
			assert_eq!(first.expired, 1);
			assert_eq!(second, TrialSweepReport::default());
		}

		#[tokio::test]
		async fn one_failure_does_not_abort_the_batch() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			let broken = trial_org(now - Duration::days(2));
			let fine = trial_org(now - Duration::days(1));
			backend.add_org(broken.clone());
			backend.add_org(fine.clone());
			backend.fail_expiry_for(broken.id);

			let report = process_expired_trials(backend.as_ref(), now).await.unwrap();
			assert_eq!(report.examined, 2);
			assert_eq!(report.failed, 1);
			assert_eq!(report.expired, 1);
			assert_eq!(
				backend.org(fine.id).unwrap().trial_status,
				Some(TrialStatus::Expired)
			);
		}

		#[tokio::test]
		async fn concurrent_sweeps_expire_each_org_once() {
			let backend = Arc::new(MemoryBackend::default());
			let now = Utc::now();
			for _ in 0..5 {
				backend.add_org(trial_org(now - Duration::hours(3)));
			}
			let (a, b) = tokio::join!(
				process_expired_trials(backend.as_ref(), now),
				process_expired_trials(backend.as_ref(), now)
			);
			let (a, b) = (a.unwrap(), b.unwrap());
			assert_eq!(a.expired + b.expired, 5);
			assert_eq!(a.failed + b.failed, 0);
		}
	}
}
