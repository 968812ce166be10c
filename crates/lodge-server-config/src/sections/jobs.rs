// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Jobs configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_TRIAL_SWEEP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobsConfigLayer {
	pub trial_sweep_enabled: Option<bool>,
	pub trial_sweep_interval_secs: Option<u64>,
}

impl JobsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.trial_sweep_enabled.is_some() {
			self.trial_sweep_enabled = other.trial_sweep_enabled;
		}
		if other.trial_sweep_interval_secs.is_some() {
			self.trial_sweep_interval_secs = other.trial_sweep_interval_secs;
		}
	}

	pub fn finalize(self) -> JobsConfig {
		JobsConfig {
			trial_sweep_enabled: self.trial_sweep_enabled.unwrap_or(true),
			trial_sweep_interval_secs: self
				.trial_sweep_interval_secs
				.unwrap_or(DEFAULT_TRIAL_SWEEP_INTERVAL_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobsConfig {
	pub trial_sweep_enabled: bool,
	pub trial_sweep_interval_secs: u64,
}

impl Default for JobsConfig {
	fn default() -> Self {
		Self {
			trial_sweep_enabled: true,
			trial_sweep_interval_secs: DEFAULT_TRIAL_SWEEP_INTERVAL_SECS, // hourly
		}
	}
}
