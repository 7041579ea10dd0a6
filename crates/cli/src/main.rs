mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod output;
mod styles;

use clap::Parser;
use colored::Colorize;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		eprintln!("{} {err}", "error:".red().bold());
		std::process::exit(err.exit_code());
	}
}
