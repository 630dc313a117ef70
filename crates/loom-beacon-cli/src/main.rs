// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `loom-beacon`: drive the analytics beacon from the command line.
//!
//! Delivered calls are written to stdout as JSON lines; logs go to stderr.

mod config;
mod provider;
mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use loom_beacon::{Beacon, BootState};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{load_config, Overrides};
use crate::provider::StdoutProvider;

#[derive(Parser, Debug)]
#[command(name = "loom-beacon", version, about = "Loom analytics beacon driver", long_about = None)]
struct Cli {
	/// Emit logs as JSON
	#[arg(long, global = true)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Replay a call script through a beacon and print what the provider receives
	Run(RunArgs),
	/// Validate a configuration file
	Check {
		/// Path to the TOML configuration
		#[arg(long, short)]
		config: PathBuf,
	},
}

#[derive(Args, Debug)]
struct RunArgs {
	/// Path to the TOML configuration
	#[arg(long, short)]
	config: PathBuf,

	/// JSON-lines file of calls issued before boot
	#[arg(long)]
	script: Option<PathBuf>,

	/// JSON-lines file of entries pushed to the data layer after boot
	#[arg(long)]
	data_layer: Option<PathBuf>,

	/// Analytics host, overriding the file
	#[arg(long, env = "LOOM_BEACON_HOST")]
	host: Option<String>,

	/// Site ID, overriding the file
	#[arg(long, env = "LOOM_BEACON_SITE_ID")]
	site_id: Option<String>,

	/// Log calls instead of delivering them
	#[arg(long, env = "LOOM_BEACON_DRY_RUN")]
	dry_run: bool,

	/// Verbose logging
	#[arg(long, env = "LOOM_BEACON_DEBUG")]
	debug: bool,
}

impl RunArgs {
	fn overrides(&self) -> Overrides {
		Overrides {
			host: self.host.clone(),
			site_id: self.site_id.clone(),
			debug: self.debug,
			dry_run: self.dry_run,
		}
	}
}

fn init_logging(debug: bool, json: bool) {
	let level = if debug { "debug" } else { "info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(format!("loom_beacon={level},loom_beacon_cli={level}"))
	});

	let registry = tracing_subscriber::registry().with(filter);
	if json {
		registry
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		registry
			.with(fmt::layer().with_target(false).with_writer(std::io::stderr))
			.init();
	}
}

async fn read_file(path: &Path) -> Result<String> {
	tokio::fs::read_to_string(path)
		.await
		.with_context(|| format!("failed to read {}", path.display()))
}

async fn run(args: RunArgs, json_logs: bool) -> Result<()> {
	let config = load_config(&args.config, &args.overrides())?;
	init_logging(config.debug, json_logs);

	let calls = match &args.script {
		Some(path) => script::parse_calls(&read_file(path).await?)
			.with_context(|| format!("invalid call script {}", path.display()))?,
		None => Vec::new(),
	};
	let entries = match &args.data_layer {
		Some(path) => script::parse_data_layer(&read_file(path).await?)
			.with_context(|| format!("invalid data layer file {}", path.display()))?,
		None => Vec::new(),
	};

	let beacon = Beacon::new();
	for call in calls {
		beacon.dispatch(call);
	}
	info!(queued = beacon.queue_size(), "Calls issued before boot");

	if !config.dry_run {
		beacon
			.provider_slot()
			.register(Arc::new(StdoutProvider::stdout()));
	}

	beacon.boot(config).await;

	for entry in entries {
		debug!(%entry, "Pushing data layer entry");
		beacon.data_layer().push(entry);
	}

	let state = beacon.state();
	let queue_size = beacon.queue_size();
	eprintln!("state: {state}");
	eprintln!("queue size: {queue_size}");
	beacon.destroy();

	if state == BootState::Failed {
		bail!("beacon failed to boot; {queue_size} calls left undelivered");
	}
	if queue_size > 0 {
		warn!(queue_size, "Calls left in queue");
	}
	Ok(())
}

fn check(path: &Path) -> Result<()> {
	let config = load_config(path, &Overrides::default())?;
	println!(
		"{}: ok (site {}, script {}, strategy {:?})",
		path.display(),
		config.site_id,
		config.script_url(),
		config.load_strategy
	);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	match cli.command {
		Command::Run(args) => run(args, cli.json_logs).await,
		Command::Check { config } => check(&config),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn test_cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn test_run_args_parse() {
		let cli = Cli::try_parse_from([
			"loom-beacon",
			"run",
			"--config",
			"beacon.toml",
			"--script",
			"calls.jsonl",
			"--dry-run",
		])
		.unwrap();

		match cli.command {
			Command::Run(args) => {
				assert_eq!(args.config, PathBuf::from("beacon.toml"));
				assert_eq!(args.script, Some(PathBuf::from("calls.jsonl")));
				assert!(args.dry_run);
				assert!(args.data_layer.is_none());
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_check_requires_config() {
		assert!(Cli::try_parse_from(["loom-beacon", "check"]).is_err());
	}
}
