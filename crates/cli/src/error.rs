use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid config {path}: {message}")]
	Config { path: PathBuf, message: String },

	#[error("invalid endpoint {0}: expected ws://, wss://, http:// or https://")]
	InvalidEndpoint(String),

	#[error("endpoint lookup failed for {url}: {source:#}")]
	Endpoint {
		url: String,
		#[source]
		source: anyhow::Error,
	},

	#[error(transparent)]
	Targets(#[from] pw_targets::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl CliError {
	/// Process exit code: 2 for usage problems, 3 for timeouts, 1 otherwise.
	pub fn exit_code(&self) -> i32 {
		match self {
			CliError::Config { .. } | CliError::InvalidEndpoint(_) => 2,
			CliError::Targets(e) if e.is_timeout() => 3,
			_ => 1,
		}
	}
}
