// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lodge access-core server binary.

use clap::{Parser, Subcommand};
use lodge_server::jobs::TrialExpiryJob;
use lodge_server::{create_app_state, db};
use lodge_server_auth::SystemClock;
use lodge_server_jobs::{Job, JobContext, JobScheduler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Lodge server - authorization and subscription core.
#[derive(Parser, Debug)]
#[command(name = "lodge-server", about = "Lodge access-core server", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/lodge/server.toml)
	#[arg(long, env = "LODGE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
	/// Expire lapsed trials once and exit
	SweepTrials,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => lodge_server_config::load_config_with_file(path)?,
		None => lodge_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(database = %config.database.url, "starting lodge-server");

	let pool = db::create_pool(&config.database.url).await?;
	db::run_migrations(&pool).await?;

	let state = create_app_state(pool);
	let trial_expiry = Arc::new(TrialExpiryJob::new(
		state.organizations.clone(),
		Arc::new(SystemClock),
	));

	if let Some(Command::SweepTrials) = args.command {
		let output = trial_expiry.run(&JobContext::manual()).await?;
		println!("{}", output.message);
		return Ok(());
	}

	let mut scheduler = JobScheduler::new();
	if config.jobs.trial_sweep_enabled {
		scheduler.register_periodic(
			trial_expiry,
			Duration::from_secs(config.jobs.trial_sweep_interval_secs),
		);
	} else {
		tracing::info!("trial sweep disabled");
	}
	scheduler.start().await?;

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");
	scheduler.shutdown().await;

	tracing::info!("Server shutdown complete");
	Ok(())
}
