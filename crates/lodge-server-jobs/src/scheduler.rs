// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::{CancellationToken, JobContext};
use crate::error::{JobError, Result};
use crate::health::{determine_health_state, HealthState, JobHealthStatus, JobsHealthStatus, RunHistory};
use crate::job::Job;
use crate::types::{JobRun, JobStatus, JobType, TriggerSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 3;

struct RegisteredJob {
	job: Arc<dyn Job>,
	job_type: JobType,
	cancellation_token: CancellationToken,
}

pub struct JobScheduler {
	jobs: HashMap<String, RegisteredJob>,
	history: Arc<RunHistory>,
	retry_base_delay: Duration,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for JobScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl JobScheduler {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			jobs: HashMap::new(),
			history: Arc::new(RunHistory::new()),
			retry_base_delay: BASE_RETRY_DELAY,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// First retry waits this long; each further retry doubles it up to a minute.
	pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
		self.retry_base_delay = delay;
		self
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		self.register(job, JobType::Periodic { interval });
	}

	pub fn register_one_shot(&mut self, job: Arc<dyn Job>) {
		self.register(job, JobType::OneShot);
	}

	fn register(&mut self, job: Arc<dyn Job>, job_type: JobType) {
		let id = job.id().to_string();
		self.jobs.insert(
			id,
			RegisteredJob {
				job,
				job_type,
				cancellation_token: CancellationToken::new(),
			},
		);
	}

	/// Spawns one loop per periodic job. One-shot jobs only run when triggered.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		let mut handles = self.handles.lock().await;

		for (job_id, registered) in &self.jobs {
			let JobType::Periodic { interval } = registered.job_type else {
				continue;
			};

			let job = Arc::clone(&registered.job);
			let history = Arc::clone(&self.history);
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let cancellation_token = registered.cancellation_token.clone();
			let retry_base_delay = self.retry_base_delay;
			let job_id = job_id.clone();

			let handle = tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							if cancellation_token.is_cancelled() {
								continue;
							}
							let _ = run_job_with_retry(
								&job,
								&history,
								TriggerSource::Schedule,
								&cancellation_token,
								retry_base_delay,
							).await;
						}
						_ = shutdown_rx.recv() => {
							info!(job_id = %job_id, "Shutting down periodic job");
							break;
						}
					}
				}
			});

			handles.push(handle);
		}

		info!(job_count = handles.len(), "Job scheduler started");
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn trigger_job(&self, job_id: &str, triggered_by: TriggerSource) -> Result<String> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		run_job_with_retry(
			&registered.job,
			&self.history,
			triggered_by,
			&registered.cancellation_token,
			self.retry_base_delay,
		)
		.await
	}

	#[instrument(skip(self))]
	pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		registered.cancellation_token.cancel();
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		for registered in self.jobs.values() {
			registered.cancellation_token.cancel();
		}
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job scheduler shut down");
	}

	pub fn job_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.jobs.keys().cloned().collect();
		ids.sort();
		ids
	}

	#[instrument(skip(self))]
	pub async fn job_status(&self, job_id: &str) -> Option<JobHealthStatus> {
		let registered = self.jobs.get(job_id)?;

		let last_run = self.history.last_run(job_id).await;
		let consecutive_failures = self.history.consecutive_failures(job_id).await;
		let status = determine_health_state(&last_run, consecutive_failures);

		Some(JobHealthStatus {
			job_id: job_id.to_string(),
			name: registered.job.name().to_string(),
			status,
			last_run: last_run.map(Into::into),
			consecutive_failures,
		})
	}

	#[instrument(skip(self))]
	pub async fn health_status(&self) -> JobsHealthStatus {
		let mut jobs = Vec::new();
		for job_id in self.job_ids() {
			if let Some(status) = self.job_status(&job_id).await {
				jobs.push(status);
			}
		}

		let status = jobs
			.iter()
			.map(|j| j.status)
			.max()
			.unwrap_or(HealthState::Healthy);

		JobsHealthStatus { status, jobs }
	}
}

async fn run_job_with_retry(
	job: &Arc<dyn Job>,
	history: &RunHistory,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
	retry_base_delay: Duration,
) -> Result<String> {
	let run_id = uuid::Uuid::new_v4().to_string();
	let mut run = JobRun::start(&run_id, job.id(), triggered_by);
	history.record(&run).await;

	loop {
		let ctx = JobContext {
			run_id: run_id.clone(),
			triggered_by: if run.retry_count > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			cancellation_token: cancellation_token.clone(),
		};

		match job.run(&ctx).await {
			Ok(output) => {
				run.complete(JobStatus::Succeeded, None, output.metadata);
				history.record(&run).await;
				info!(job_id = %job.id(), run_id = %run_id, message = %output.message, "Job completed successfully");
				return Ok(run_id);
			}
			Err(JobError::Cancelled) => {
				run.complete(JobStatus::Cancelled, None, None);
				history.record(&run).await;
				info!(job_id = %job.id(), run_id = %run_id, "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(JobError::Failed { message, retryable }) => {
				if retryable && run.retry_count < MAX_RETRIES && !cancellation_token.is_cancelled() {
					run.retry_count += 1;
					let delay = backoff_delay(retry_base_delay, run.retry_count);
					warn!(
						job_id = %job.id(),
						run_id = %run_id,
						retry_count = run.retry_count,
						delay_ms = delay.as_millis() as u64,
						error = %message,
						"Job failed, retrying"
					);
					tokio::time::sleep(delay).await;
					continue;
				}

				run.complete(JobStatus::Failed, Some(message.clone()), None);
				history.record(&run).await;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed");
				return Err(JobError::Failed { message, retryable });
			}
			Err(e) => {
				let message = e.to_string();
				run.complete(JobStatus::Failed, Some(message.clone()), None);
				history.record(&run).await;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed with error");
				return Err(e);
			}
		}
	}
}

pub(crate) fn backoff_delay(base: Duration, retry_count: u32) -> Duration {
	let factor = 2u32.saturating_pow(retry_count.saturating_sub(1));
	base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}
