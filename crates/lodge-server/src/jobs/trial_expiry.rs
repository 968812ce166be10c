// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use lodge_server_auth::{process_expired_trials, Clock, TrialStore};
use lodge_server_jobs::{Job, JobContext, JobError, JobOutput};
use std::sync::Arc;
use tracing::instrument;

/// Moves organizations whose trial has lapsed from `active` to `expired`.
pub struct TrialExpiryJob {
	store: Arc<dyn TrialStore>,
	clock: Arc<dyn Clock>,
}

impl TrialExpiryJob {
	pub fn new(store: Arc<dyn TrialStore>, clock: Arc<dyn Clock>) -> Self {
		Self { store, clock }
	}
}

#[async_trait]
impl Job for TrialExpiryJob {
	fn id(&self) -> &str {
		"trial-expiry"
	}

	fn name(&self) -> &str {
		"Trial Expiry"
	}

	fn description(&self) -> &str {
		"Mark lapsed organization trials as expired"
	}

	#[instrument(skip(self, ctx), fields(job_id = "trial-expiry", run_id = %ctx.run_id))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let report = process_expired_trials(self.store.as_ref(), self.clock.now())
			.await
			.map_err(|e| JobError::Failed {
				message: e.to_string(),
				retryable: true,
			})?;

		tracing::info!(
			examined = report.examined,
			expired = report.expired,
			skipped = report.skipped,
			failed = report.failed,
			"Trial sweep completed"
		);

		Ok(JobOutput {
			message: format!(
				"Expired {} of {} lapsed trials ({} failed)",
				report.expired, report.examined, report.failed
			),
			metadata: serde_json::to_value(&report).ok(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use chrono::{DateTime, Duration, TimeZone, Utc};
	use lodge_server_auth::{AuthError, FixedClock, OrgId, Organization, TrialStatus, UserId};
	use lodge_server_db::testing::create_test_pool;
	use lodge_server_db::OrganizationRepository;

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 7, 4, 9, 0, 0).unwrap()
	}

	struct BrokenStore;

	#[async_trait]
	impl TrialStore for BrokenStore {
		async fn list_lapsed_trials(
			&self,
			_now: DateTime<Utc>,
		) -> lodge_server_auth::Result<Vec<OrgId>> {
			Err(AuthError::Storage("database is locked".to_string()))
		}

		async fn expire_trial(&self, _org_id: OrgId, _now: DateTime<Utc>) -> lodge_server_auth::Result<bool> {
			Ok(false)
		}
	}

	#[tokio::test]
	async fn expires_lapsed_trials() {
		let repo = Arc::new(OrganizationRepository::new(create_test_pool().await));
		let mut lapsed = Organization::new("Lapsed", UserId::generate());
		lapsed.trial_status = Some(TrialStatus::Active);
		lapsed.trial_expires_at = Some(now() - Duration::hours(1));
		let mut running = Organization::new("Running", UserId::generate());
		running.trial_status = Some(TrialStatus::Active);
		running.trial_expires_at = Some(now() + Duration::days(3));
		repo.create_organization(&lapsed).await.unwrap();
		repo.create_organization(&running).await.unwrap();

		let job = TrialExpiryJob::new(repo.clone(), Arc::new(FixedClock(now())));
		let output = job.run(&JobContext::manual()).await.unwrap();

		let metadata = output.metadata.unwrap();
		assert_eq!(metadata["expired"], 1);
		assert_eq!(metadata["examined"], 1);

		let lapsed = repo.get_organization_by_id(lapsed.id).await.unwrap().unwrap();
		assert_eq!(lapsed.trial_status, Some(TrialStatus::Expired));
		let running = repo.get_organization_by_id(running.id).await.unwrap().unwrap();
		assert_eq!(running.trial_status, Some(TrialStatus::Active));
	}

	#[tokio::test]
	async fn listing_failure_is_retryable() {
		let job = TrialExpiryJob::new(Arc::new(BrokenStore), Arc::new(FixedClock(now())));
		let err = job.run(&JobContext::manual()).await.unwrap_err();
		assert!(matches!(err, JobError::Failed { retryable: true, .. }));
	}

	#[tokio::test]
	async fn respects_cancellation() {
		let job = TrialExpiryJob::new(Arc::new(BrokenStore), Arc::new(FixedClock(now())));
		let ctx = JobContext::manual();
		ctx.cancellation_token.cancel();
		assert!(matches!(job.run(&ctx).await, Err(JobError::Cancelled)));
	}
}
