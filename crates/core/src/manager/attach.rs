//! Attachment state machine.
//!
//! Handlers for the five `Target.*` lifecycle events. Work on one target id
//! runs under that id's lock; commands that only need to be attempted
//! (resuming, detaching ignored targets, per-session auto-attach) are
//! spawned and their failures logged.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use pw_targets_protocol::{SessionId, SetAutoAttach, TargetId, TargetInfo};
use pw_targets_runtime::{Error, Result, Scope, Session};

use super::ManagerInner;
use crate::notification::TargetNotification;
use crate::target::Target;

impl ManagerInner {
	pub(super) async fn on_target_created(&self, info: TargetInfo) -> Result<()> {
		let target_id = info.target_id.clone();
		tracing::debug!(target_id = %target_id, target_type = %info.target_type, "Target created");

		self.registry.upsert_discovered(info.clone());
		self.notify(TargetNotification::Discovered(info.clone()));

		// The browser target is never auto-attached; expose it without a session.
		if info.is_browser() && info.attached {
			let _guard = self.locks.lock(&target_id).await;
			if !self.registry.is_attached(&target_id) {
				let target = self.create_target(info, None)?;
				self.registry.attach(target);
				self.registry.publish(&target_id);
			}
		}
		Ok(())
	}

	pub(super) async fn on_target_destroyed(&self, target_id: TargetId) -> Result<()> {
		let _guard = self.locks.lock(&target_id).await;
		tracing::debug!(target_id = %target_id, "Target destroyed");

		let last_info = self.registry.remove_discovered(&target_id);
		self.gate.settle(&target_id);

		let Some(target) = self.registry.attached(&target_id) else {
			return Ok(());
		};

		let sessions = self.registry.sessions_for(&target_id);
		if !sessions.is_empty() {
			for session_id in sessions {
				self.release_session(&session_id, last_info.clone()).await;
				self.connection.unregister_session(&session_id);
			}
			return Ok(());
		}

		if let Some(info) = last_info.filter(TargetInfo::is_service_worker) {
			if self.registry.remove_attached_if_same(&target) {
				target.on_gone();
				self.notify(TargetNotification::Gone { target, info });
			}
		}
		Ok(())
	}

	pub(super) async fn on_target_info_changed(&self, info: TargetInfo) -> Result<()> {
		let target_id = info.target_id.clone();
		let _guard = self.locks.lock(&target_id).await;

		self.registry.upsert_discovered(info.clone());
		if self.registry.is_ignored(&target_id) || !info.attached {
			return Ok(());
		}
		let Some(target) = self.registry.attached(&target_id) else {
			return Ok(());
		};

		tracing::trace!(target_id = %target_id, url = %info.url, "Target info changed");
		target.update_info(info.clone());
		self.notify(TargetNotification::Changed { target, info });
		Ok(())
	}

	pub(super) async fn on_attached(
		&self,
		parent: &Scope,
		session_id: SessionId,
		info: TargetInfo,
		waiting_for_debugger: bool,
	) -> Result<()> {
		let session = self
			.connection
			.session(&session_id)
			.ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;
		let target_id = info.target_id.clone();

		if !self.connection.is_auto_attached(&target_id) {
			tracing::debug!(target_id = %target_id, session_id = %session_id, "Skipping manually attached target");
			return Ok(());
		}

		let _guard = self.locks.lock(&target_id).await;

		if let Some(reason) = self.ignore_reason(&info) {
			tracing::debug!(
				target_id = %target_id,
				session_id = %session_id,
				reason,
				"Detaching ignored target"
			);
			self.registry.ignore(target_id.clone());
			self.gate.settle(&target_id);
			spawn_silent_detach(session);
			return Ok(());
		}

		if self.parent_released(parent) {
			tracing::debug!(target_id = %target_id, session_id = %session_id, %parent, "Parent session already released");
			self.gate.settle(&target_id);
			self.connection.unregister_session(&session_id);
			return Ok(());
		}

		let existing = self.registry.attached(&target_id);
		let is_new = existing.is_none();
		let target = match existing {
			Some(target) => target,
			None => self.create_target(info, Some(Arc::clone(&session)))?,
		};

		// Register before subscribing so child events always find their parent.
		let session_scope = session.scope();
		self.registry.attach_session(session_id.clone(), Arc::clone(&target));
		if is_new {
			self.registry.attach(Arc::clone(&target));
		}
		self.dispatcher.subscribe(session_scope.clone());

		if let Err(e) = self.run_interceptors(parent, &target).await {
			self.roll_back_attach(&session_id, &target, is_new);
			return Err(e);
		}

		// The parent may have been released while the interceptors ran.
		if self.parent_released(parent) {
			tracing::debug!(target_id = %target_id, session_id = %session_id, %parent, "Parent session released during attach");
			self.roll_back_attach(&session_id, &target, is_new);
			self.gate.settle(&target_id);
			self.connection.unregister_session(&session_id);
			return Ok(());
		}

		self.gate.remove(&target_id);
		if is_new {
			tracing::debug!(
				target_id = %target_id,
				session_id = %session_id,
				%parent,
				waiting_for_debugger,
				"Target attached"
			);
			self.registry.publish(&target_id);
			self.notify(TargetNotification::Available(Arc::clone(&target)));
		}
		self.gate.try_resolve();

		spawn_follow_up(session, self.auto_attach_command());
		Ok(())
	}

	pub(super) async fn on_detached(&self, session_id: SessionId) -> Result<()> {
		match self.registry.target_for_session(&session_id) {
			Some(target) => {
				let _guard = self.locks.lock(target.target_id()).await;
				self.release_session(&session_id, None).await;
			}
			None => {
				tracing::debug!(session_id = %session_id, "Detached from untracked session");
				let scope = Scope::Session(session_id.clone());
				self.dispatcher.unsubscribe(&scope);
				self.interceptors.drop_scope(&scope);
			}
		}
		self.connection.unregister_session(&session_id);
		Ok(())
	}

	/// Drops `session_id`, releases the sessions announced on it, and retires
	/// its target once no other session exposes it. Caller holds the target's
	/// lock.
	async fn release_session(&self, session_id: &SessionId, last_info: Option<TargetInfo>) {
		let scope = Scope::Session(session_id.clone());
		self.dispatcher.unsubscribe(&scope);
		self.interceptors.drop_scope(&scope);

		let released = self.registry.detach_session(session_id);
		self.release_children(&scope).await;
		let Some(target) = released else {
			return;
		};
		let target_id = target.target_id().clone();

		if self.registry.has_sessions_for(&target_id) {
			tracing::debug!(target_id = %target_id, session_id = %session_id, "Target still exposed by another session");
			return;
		}
		if !self.registry.remove_attached_if_same(&target) {
			return;
		}

		let info = last_info
			.or_else(|| self.registry.discovered(&target_id))
			.unwrap_or_else(|| target.info());
		tracing::debug!(target_id = %target_id, session_id = %session_id, "Target gone");
		self.gate.settle(&target_id);
		target.on_gone();
		self.notify(TargetNotification::Gone { target, info });
	}

	/// Releases every tracked session announced on `parent`, depth first.
	fn release_children<'a>(&'a self, parent: &'a Scope) -> BoxFuture<'a, ()> {
		Box::pin(async move {
			let children: Vec<SessionId> = self
				.registry
				.session_ids()
				.into_iter()
				.filter(|child| {
					self.connection
						.session(child)
						.is_some_and(|session| session.parent() == parent)
				})
				.collect();

			for child in children {
				let Some(target) = self.registry.target_for_session(&child) else {
					continue;
				};
				let _guard = self.locks.lock(target.target_id()).await;
				// An attach still in flight may have rolled itself back meanwhile.
				if self.registry.target_for_session(&child).is_none() {
					continue;
				}
				tracing::debug!(session_id = %child, %parent, "Releasing session of released parent");
				self.release_session(&child, None).await;
				self.connection.unregister_session(&child);
			}
		})
	}

	/// Undoes the registry and subscription changes of an unfinished attach.
	fn roll_back_attach(&self, session_id: &SessionId, target: &Arc<dyn Target>, is_new: bool) {
		let scope = Scope::Session(session_id.clone());
		self.dispatcher.unsubscribe(&scope);
		self.interceptors.drop_scope(&scope);
		self.registry.detach_session(session_id);
		if is_new {
			self.registry.remove_attached_if_same(target);
		}
	}

	/// Whether `parent` is a session that is no longer tracked.
	fn parent_released(&self, parent: &Scope) -> bool {
		match parent {
			Scope::Root => false,
			Scope::Session(parent_id) => self.registry.target_for_session(parent_id).is_none(),
		}
	}

	fn ignore_reason(&self, info: &TargetInfo) -> Option<&'static str> {
		if info.is_service_worker() {
			Some("service worker")
		} else if self.registry.is_ignored(&info.target_id) {
			Some("previously ignored")
		} else if !self.accepts(info) {
			Some("rejected by filter")
		} else {
			None
		}
	}

	fn create_target(&self, info: TargetInfo, session: Option<Arc<Session>>) -> Result<Arc<dyn Target>> {
		let target_id = info.target_id.clone();
		self.factory.create_target(info, session).map_err(|e| match e {
			Error::Factory { .. } => e,
			other => Error::Factory {
				target_id,
				message: other.to_string(),
			},
		})
	}

	async fn run_interceptors(&self, parent: &Scope, target: &Arc<dyn Target>) -> Result<()> {
		if !self.interceptors.has_hooks(parent) {
			return Ok(());
		}
		let parent_target = match parent {
			Scope::Root => None,
			Scope::Session(parent_id) => Some(
				self.registry
					.target_for_session(parent_id)
					.ok_or_else(|| Error::ParentTargetNotFound(parent_id.clone()))?,
			),
		};
		self.interceptors.run(parent, target, parent_target.as_ref()).await
	}
}

/// Resumes and detaches a target that will never be exposed.
fn spawn_silent_detach(session: Arc<Session>) {
	tokio::spawn(async move {
		let (resumed, detached) = futures_util::join!(session.run_if_waiting_for_debugger(), session.detach());
		if let Err(e) = resumed {
			tracing::debug!(session_id = %session.id(), error = %e, "Failed to resume ignored target");
		}
		if let Err(e) = detached {
			tracing::debug!(session_id = %session.id(), error = %e, "Failed to detach ignored target");
		}
	});
}

/// Extends auto-attach to the new session's children and resumes the target.
fn spawn_follow_up(session: Arc<Session>, command: SetAutoAttach) {
	tokio::spawn(async move {
		let (auto_attach, resumed) =
			futures_util::join!(session.send(&command), session.run_if_waiting_for_debugger());
		if let Err(e) = auto_attach {
			tracing::warn!(session_id = %session.id(), error = %e, "Failed to enable auto-attach on session");
		}
		if let Err(e) = resumed {
			tracing::warn!(session_id = %session.id(), error = %e, "Failed to resume target");
		}
	});
}
