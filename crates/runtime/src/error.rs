//! Error types for the target manager and its runtime.

use std::sync::Arc;

use pw_targets_protocol::{SessionId, TargetId};
use thiserror::Error;

/// Result type alias for runtime and target manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the browser or tracking targets.
#[derive(Debug, Error)]
pub enum Error {
	/// Transport-level error (socket, framing).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (unexpected or malformed message).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// The browser answered a command with an error.
	#[error("Remote error {code}: {message}")]
	Remote {
		/// CDP error code (e.g. `-32000`)
		code: i64,
		/// Human-readable error message
		message: String,
		/// Optional extra detail sent alongside the message
		data: Option<String>,
	},

	/// An attach event referenced a session the connection does not know.
	#[error("Session not found: {0}")]
	SessionNotFound(SessionId),

	/// A session was used after it detached.
	#[error("Session closed: {0}")]
	SessionClosed(SessionId),

	/// The target handle owning a parent session could not be resolved.
	#[error("Parent target not found for session {0}")]
	ParentTargetNotFound(SessionId),

	/// An interceptor hook failed during attach.
	#[error("Interceptor {id} failed: {source}")]
	Interceptor {
		id: u64,
		#[source]
		source: Box<Error>,
	},

	/// The target factory could not build a handle.
	#[error("Target factory failed for {target_id}: {message}")]
	Factory { target_id: TargetId, message: String },

	/// The connection was closed (locally or by the remote end).
	#[error("Connection closed: {0}")]
	ConnectionClosed(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Timeout waiting for an operation.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Startup never completed.
	#[error("Initialization failed: {0}")]
	Initialization(#[source] Arc<Error>),

	/// Invalid argument provided to a method.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		match self {
			Error::Timeout(_) => true,
			Error::Initialization(inner) => inner.is_timeout(),
			_ => false,
		}
	}

	/// Returns true if the connection can no longer be used.
	pub fn is_connection_closed(&self) -> bool {
		matches!(self, Error::ConnectionClosed(_) | Error::ChannelClosed)
	}

	/// Returns true for errors that mean the target registry can no longer be
	/// trusted, so the connection must be torn down.
	pub fn is_fatal(&self) -> bool {
		match self {
			Error::SessionNotFound(_)
			| Error::ParentTargetNotFound(_)
			| Error::Interceptor { .. }
			| Error::Factory { .. }
			| Error::ProtocolError(_)
			| Error::Json(_) => true,
			Error::Initialization(inner) => inner.is_fatal(),
			_ => false,
		}
	}
}
