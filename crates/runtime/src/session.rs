//! Session - RPC proxy for one attached target.
//!
//! A [`Session`] is created by the connection when `Target.attachedToTarget`
//! arrives and routes commands to its target through the shared socket
//! (flattened session mode).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use pw_targets_protocol::{
	Command, DetachFromTarget, RunIfWaitingForDebugger, SessionId, TargetId, TargetInfo, TargetType,
};
use serde_json::Value;

use crate::connection::{ConnectionLike, Scope, send_command};
use crate::error::{Error, Result};

/// A live, attached sub-connection to a single target.
pub struct Session {
	id: SessionId,
	target_id: TargetId,
	target_type: TargetType,
	parent: Scope,
	/// Attached through `Target.attachToTarget` rather than auto-attach.
	manual: bool,
	connection: Weak<dyn ConnectionLike>,
	detached: AtomicBool,
}

impl Session {
	/// Creates a session for `target_info`, owned by `parent`.
	pub fn new(
		id: SessionId,
		target_info: &TargetInfo,
		parent: Scope,
		manual: bool,
		connection: Weak<dyn ConnectionLike>,
	) -> Self {
		Self {
			id,
			target_id: target_info.target_id.clone(),
			target_type: target_info.target_type.clone(),
			parent,
			manual,
			connection,
			detached: AtomicBool::new(false),
		}
	}

	pub fn id(&self) -> &SessionId {
		&self.id
	}

	pub fn target_id(&self) -> &TargetId {
		&self.target_id
	}

	pub fn target_type(&self) -> &TargetType {
		&self.target_type
	}

	/// Scope that produced the attach event (root or a parent session).
	pub fn parent(&self) -> &Scope {
		&self.parent
	}

	/// Scope addressing this session.
	pub fn scope(&self) -> Scope {
		Scope::Session(self.id.clone())
	}

	pub fn is_manual(&self) -> bool {
		self.manual
	}

	pub fn is_detached(&self) -> bool {
		self.detached.load(Ordering::SeqCst)
	}

	/// Marks the session detached; further sends fail with [`Error::SessionClosed`].
	pub fn mark_detached(&self) {
		self.detached.store(true, Ordering::SeqCst);
	}

	/// Returns the owning connection, if it is still alive.
	pub fn connection(&self) -> Result<Arc<dyn ConnectionLike>> {
		self.connection
			.upgrade()
			.ok_or_else(|| Error::ConnectionClosed("connection dropped".to_string()))
	}

	/// Sends a typed command scoped to this session.
	pub async fn send<C: Command>(&self, command: &C) -> Result<C::Response> {
		if self.is_detached() {
			return Err(Error::SessionClosed(self.id.clone()));
		}
		let connection = self.connection()?;
		send_command(connection.as_ref(), &self.scope(), command).await
	}

	/// Sends an untyped command scoped to this session.
	pub async fn send_raw(&self, method: &str, params: Value) -> Result<Value> {
		if self.is_detached() {
			return Err(Error::SessionClosed(self.id.clone()));
		}
		let connection = self.connection()?;
		connection.send_message(&self.scope(), method, params).await
	}

	/// Resumes the target if it is paused waiting for a debugger.
	pub async fn run_if_waiting_for_debugger(&self) -> Result<()> {
		self.send(&RunIfWaitingForDebugger::default()).await?;
		Ok(())
	}

	/// Asks the parent connection to detach this session.
	pub async fn detach(&self) -> Result<()> {
		let connection = self.connection()?;
		let command = DetachFromTarget {
			session_id: self.id.clone(),
		};
		send_command(connection.as_ref(), &self.parent, &command).await?;
		Ok(())
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("target_id", &self.target_id)
			.field("target_type", &self.target_type)
			.field("parent", &self.parent)
			.field("detached", &self.is_detached())
			.finish()
	}
}
