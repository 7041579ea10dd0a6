//! Loads the manager configuration and applies command-line overrides.

use std::path::Path;

use pw_targets::{TargetFilter, TargetManagerConfig, TargetType, only_types};

use crate::cli::EndpointArgs;
use crate::error::{CliError, Result};

/// Reads `path` as a JSON [`TargetManagerConfig`], or returns defaults when
/// no file was given.
pub fn load(path: Option<&Path>) -> Result<TargetManagerConfig> {
	let Some(path) = path else {
		return Ok(TargetManagerConfig::default());
	};

	let raw = std::fs::read_to_string(path).map_err(|e| CliError::Config {
		path: path.to_path_buf(),
		message: e.to_string(),
	})?;
	let config = TargetManagerConfig::from_json(&raw).map_err(|e| CliError::Config {
		path: path.to_path_buf(),
		message: e.to_string(),
	})?;

	tracing::debug!(path = %path.display(), ?config, "Loaded config");
	Ok(config)
}

/// Layers flags over the file config. Flags win when present.
pub fn apply_overrides(mut config: TargetManagerConfig, args: &EndpointArgs) -> TargetManagerConfig {
	if !args.exclude_types.is_empty() {
		config.excluded_target_types = args.exclude_types.iter().map(|t| TargetType::from(t.as_str())).collect();
	}
	if let Some(ms) = args.timeout_ms {
		config.init_timeout_ms = Some(ms);
	}
	if args.no_wait_for_debugger {
		config.wait_for_debugger_on_start = false;
	}
	config
}

/// Builds the `--only-type` filter, if any types were given.
pub fn type_filter(args: &EndpointArgs) -> Option<TargetFilter> {
	if args.only_types.is_empty() {
		return None;
	}
	Some(only_types(args.only_types.iter().map(|t| TargetType::from(t.as_str()))))
}
