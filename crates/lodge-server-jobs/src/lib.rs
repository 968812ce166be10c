// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for Lodge server.
//!
//! Runs periodic and on-demand jobs with exponential-backoff retry,
//! cooperative cancellation and in-memory health tracking.

pub mod context;
pub mod error;
pub mod health;
pub mod job;
pub mod scheduler;
pub mod types;

pub use context::{CancellationToken, JobContext};
pub use error::{JobError, Result};
pub use health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo, RunHistory};
pub use job::Job;
pub use scheduler::JobScheduler;
pub use types::{JobOutput, JobRun, JobStatus, JobType, TriggerSource};
