// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for Lodge server.
//!
//! Layered configuration from defaults, a TOML file and `LODGE_SERVER_*`
//! environment variables, validated after merging.
//!
//! ```ignore
//! use lodge_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("database at {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub jobs: JobsConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LODGE_SERVER_*`)
/// 2. Config file (`/etc/lodge/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let jobs = layer.jobs.unwrap_or_default().finalize();

	validate_config(&jobs)?;

	info!(
		database = %database.url,
		trial_sweep_enabled = jobs.trial_sweep_enabled,
		trial_sweep_interval_secs = jobs.trial_sweep_interval_secs,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		logging,
		jobs,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(jobs: &JobsConfig) -> Result<(), ConfigError> {
	if jobs.trial_sweep_enabled && jobs.trial_sweep_interval_secs == 0 {
		return Err(ConfigError::Validation(
			"LODGE_SERVER_TRIAL_SWEEP_INTERVAL_SECS must be greater than zero while the trial \
			 sweep is enabled. Set an interval or LODGE_SERVER_TRIAL_SWEEP_ENABLED=false."
				.to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::Write;

	#[test]
	fn test_zero_interval_rejected_when_enabled() {
		let jobs = JobsConfig {
			trial_sweep_enabled: true,
			trial_sweep_interval_secs: 0,
		};
		assert!(matches!(validate_config(&jobs), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_zero_interval_ok_when_disabled() {
		let jobs = JobsConfig {
			trial_sweep_enabled: false,
			trial_sweep_interval_secs: 0,
		};
		assert!(validate_config(&jobs).is_ok());
	}

	#[test]
	fn test_finalize_empty_layer_gives_defaults() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config, ServerConfig::default());
	}

	#[test]
	fn test_file_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[logging]
level = "warn"

[jobs]
trial_sweep_enabled = false
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let mut merged = DefaultsSource.load().unwrap();
		merged.merge(layer);
		let config = finalize(merged).unwrap();

		assert_eq!(config.logging.level, "warn");
		assert!(!config.jobs.trial_sweep_enabled);
		assert_eq!(config.jobs.trial_sweep_interval_secs, 3600);
		assert_eq!(config.database.url, "sqlite:./lodge.db");
	}

	proptest! {
		#[test]
		fn positive_intervals_always_validate(secs in 1u64..=u64::MAX, enabled: bool) {
			let jobs = JobsConfig {
				trial_sweep_enabled: enabled,
				trial_sweep_interval_secs: secs,
			};
			prop_assert!(validate_config(&jobs).is_ok());
		}
	}
}
