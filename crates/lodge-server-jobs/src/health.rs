// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::types::{JobRun, JobStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct JobHealthStatus {
	pub job_id: String,
	pub name: String,
	pub status: HealthState,
	pub last_run: Option<LastRunInfo>,
	pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRunInfo {
	pub run_id: String,
	pub status: JobStatus,
	pub started_at: DateTime<Utc>,
	pub duration_ms: Option<i64>,
	pub error: Option<String>,
}

impl From<JobRun> for LastRunInfo {
	fn from(run: JobRun) -> Self {
		Self {
			run_id: run.id,
			status: run.status,
			started_at: run.started_at,
			duration_ms: run.duration_ms,
			error: run.error_message,
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsHealthStatus {
	pub status: HealthState,
	pub jobs: Vec<JobHealthStatus>,
}

#[derive(Default)]
struct JobRecord {
	last_run: Option<JobRun>,
	consecutive_failures: u32,
}

/// In-memory record of the latest run per job.
#[derive(Default)]
pub struct RunHistory {
	records: Mutex<HashMap<String, JobRecord>>,
}

impl RunHistory {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn record(&self, run: &JobRun) {
		let mut records = self.records.lock().await;
		let record = records.entry(run.job_id.clone()).or_default();
		match run.status {
			JobStatus::Failed => record.consecutive_failures += 1,
			JobStatus::Succeeded => record.consecutive_failures = 0,
			JobStatus::Running | JobStatus::Cancelled => {}
		}
		record.last_run = Some(run.clone());
	}

	pub async fn last_run(&self, job_id: &str) -> Option<JobRun> {
		self.records
			.lock()
			.await
			.get(job_id)
			.and_then(|r| r.last_run.clone())
	}

	pub async fn consecutive_failures(&self, job_id: &str) -> u32 {
		self.records
			.lock()
			.await
			.get(job_id)
			.map_or(0, |r| r.consecutive_failures)
	}
}

pub(crate) fn determine_health_state(last_run: &Option<JobRun>, consecutive_failures: u32) -> HealthState {
	match last_run {
		None => HealthState::Healthy,
		Some(run) => match run.status {
			JobStatus::Succeeded | JobStatus::Running | JobStatus::Cancelled => HealthState::Healthy,
			JobStatus::Failed => match consecutive_failures {
				0 => HealthState::Healthy,
				1..=2 => HealthState::Degraded,
				_ => HealthState::Unhealthy,
			},
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::TriggerSource;

	fn run_with(status: JobStatus) -> JobRun {
		let mut run = JobRun::start("run-1", "job-1", TriggerSource::Schedule);
		run.complete(status, None, None);
		run
	}

	mod health_state {
		use super::*;

		#[test]
		fn no_run_is_healthy() {
			assert_eq!(determine_health_state(&None, 0), HealthState::Healthy);
		}

		#[test]
		fn non_failures_are_healthy() {
			for status in [JobStatus::Succeeded, JobStatus::Running, JobStatus::Cancelled] {
				assert_eq!(
					determine_health_state(&Some(run_with(status)), 5),
					HealthState::Healthy
				);
			}
		}

		#[test]
		fn failures_degrade_then_turn_unhealthy() {
			let failed = Some(run_with(JobStatus::Failed));
			assert_eq!(determine_health_state(&failed, 0), HealthState::Healthy);
			assert_eq!(determine_health_state(&failed, 1), HealthState::Degraded);
			assert_eq!(determine_health_state(&failed, 2), HealthState::Degraded);
			assert_eq!(determine_health_state(&failed, 3), HealthState::Unhealthy);
			assert_eq!(determine_health_state(&failed, 9), HealthState::Unhealthy);
		}

		#[test]
		fn ordering_tracks_severity() {
			assert!(HealthState::Unhealthy > HealthState::Degraded);
			assert!(HealthState::Degraded > HealthState::Healthy);
		}
	}

	mod history {
		use super::*;

		#[tokio::test]
		async fn success_resets_failure_streak() {
			let history = RunHistory::new();
			history.record(&run_with(JobStatus::Failed)).await;
			history.record(&run_with(JobStatus::Failed)).await;
			assert_eq!(history.consecutive_failures("job-1").await, 2);

			history.record(&run_with(JobStatus::Succeeded)).await;
			assert_eq!(history.consecutive_failures("job-1").await, 0);
			assert_eq!(
				history.last_run("job-1").await.map(|r| r.status),
				Some(JobStatus::Succeeded)
			);
		}

		#[tokio::test]
		async fn unknown_job_has_no_history() {
			let history = RunHistory::new();
			assert!(history.last_run("nope").await.is_none());
			assert_eq!(history.consecutive_failures("nope").await, 0);
		}
	}
}
