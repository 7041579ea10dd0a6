#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Root CLI for pw-targets.
#[derive(Parser, Debug)]
#[command(name = "pw-targets")]
#[command(about = "Watch and list the targets of a Chrome DevTools endpoint")]
#[command(version)]
#[command(styles = crate::styles::cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default), json, or ndjson
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// JSON file with target manager configuration.
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Stream target notifications until interrupted.
	Watch(WatchArgs),
	/// Initialize, print the attached targets and exit.
	List(ListArgs),
}

/// Connection and tracking options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
	/// DevTools endpoint: ws://host:port/devtools/browser/<id> or http://host:port
	#[arg(value_name = "ENDPOINT")]
	pub endpoint: String,

	/// Exclude a target type from discovery (repeatable; replaces the configured list)
	#[arg(long = "exclude-type", value_name = "TYPE")]
	pub exclude_types: Vec<String>,

	/// Only track targets of this type (repeatable)
	#[arg(long = "only-type", value_name = "TYPE")]
	pub only_types: Vec<String>,

	/// Fail if initialization takes longer than this
	#[arg(long, value_name = "MS")]
	pub timeout_ms: Option<u64>,

	/// Let new targets run instead of pausing them until attached
	#[arg(long)]
	pub no_wait_for_debugger: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
	#[command(flatten)]
	pub endpoint: EndpointArgs,

	/// Hide `discovered` notifications
	#[arg(long)]
	pub attached_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
	#[command(flatten)]
	pub endpoint: EndpointArgs,

	/// Include discovered targets that are not attached
	#[arg(short, long)]
	pub all: bool,
}
