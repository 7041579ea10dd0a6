//! Target registry: discovered snapshots, attached handles, ignored ids.
//!
//! All maps are [`DashMap`]s so per-key updates are atomic without a global
//! lock. Reads hand out point-in-time copies. [`TargetRegistry::wait_for`]
//! uses a per-id [`Notify`] registered before the map is checked, so a
//! handle published between the check and the wait is never missed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use pw_targets_protocol::{SessionId, TargetId, TargetInfo};
use pw_targets_runtime::{Error, Result};
use tokio::sync::Notify;

use crate::target::Target;

#[derive(Default)]
pub struct TargetRegistry {
	discovered: DashMap<TargetId, TargetInfo>,
	by_target: DashMap<TargetId, Arc<dyn Target>>,
	by_session: DashMap<SessionId, Arc<dyn Target>>,
	ignored: DashSet<TargetId>,
	waiters: DashMap<TargetId, Arc<Notify>>,
}

impl TargetRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `info` as the latest snapshot, returning the previous one.
	pub fn upsert_discovered(&self, info: TargetInfo) -> Option<TargetInfo> {
		self.discovered.insert(info.target_id.clone(), info)
	}

	pub fn remove_discovered(&self, target_id: &TargetId) -> Option<TargetInfo> {
		self.discovered.remove(target_id).map(|(_, info)| info)
	}

	pub fn discovered(&self, target_id: &TargetId) -> Option<TargetInfo> {
		self.discovered.get(target_id).map(|r| r.value().clone())
	}

	pub fn discovered_targets(&self) -> HashMap<TargetId, TargetInfo> {
		self.discovered
			.iter()
			.map(|r| (r.key().clone(), r.value().clone()))
			.collect()
	}

	/// Inserts a handle keyed by its target id.
	///
	/// Waiters are not woken until [`publish`](Self::publish) runs, so a
	/// handle rolled back before publication is never observed by them.
	pub fn attach(&self, target: Arc<dyn Target>) {
		self.by_target.insert(target.target_id().clone(), target);
	}

	/// Wakes [`wait_for`](Self::wait_for) callers waiting on `target_id`.
	pub fn publish(&self, target_id: &TargetId) {
		if let Some((_, notify)) = self.waiters.remove(target_id) {
			notify.notify_waiters();
		}
	}

	pub fn attached(&self, target_id: &TargetId) -> Option<Arc<dyn Target>> {
		self.by_target.get(target_id).map(|r| r.value().clone())
	}

	pub fn is_attached(&self, target_id: &TargetId) -> bool {
		self.by_target.contains_key(target_id)
	}

	pub fn remove_attached(&self, target_id: &TargetId) -> Option<Arc<dyn Target>> {
		self.by_target.remove(target_id).map(|(_, target)| target)
	}

	/// Removes the handle for its id only if it is still `target`.
	pub fn remove_attached_if_same(&self, target: &Arc<dyn Target>) -> bool {
		self.by_target
			.remove_if(target.target_id(), |_, current| Arc::ptr_eq(current, target))
			.is_some()
	}

	pub fn attached_targets(&self) -> HashMap<TargetId, Arc<dyn Target>> {
		self.by_target
			.iter()
			.map(|r| (r.key().clone(), r.value().clone()))
			.collect()
	}

	pub fn attach_session(&self, session_id: SessionId, target: Arc<dyn Target>) {
		self.by_session.insert(session_id, target);
	}

	pub fn detach_session(&self, session_id: &SessionId) -> Option<Arc<dyn Target>> {
		self.by_session.remove(session_id).map(|(_, target)| target)
	}

	pub fn target_for_session(&self, session_id: &SessionId) -> Option<Arc<dyn Target>> {
		self.by_session.get(session_id).map(|r| r.value().clone())
	}

	/// Session ids currently mapped to `target_id`.
	pub fn sessions_for(&self, target_id: &TargetId) -> Vec<SessionId> {
		self.by_session
			.iter()
			.filter(|r| r.value().target_id() == target_id)
			.map(|r| r.key().clone())
			.collect()
	}

	/// Every tracked session id.
	pub fn session_ids(&self) -> Vec<SessionId> {
		self.by_session.iter().map(|r| r.key().clone()).collect()
	}

	pub fn has_sessions_for(&self, target_id: &TargetId) -> bool {
		self.by_session.iter().any(|r| r.value().target_id() == target_id)
	}

	/// Marks `target_id` as never to be exposed. Returns `false` if already ignored.
	pub fn ignore(&self, target_id: TargetId) -> bool {
		self.ignored.insert(target_id)
	}

	pub fn is_ignored(&self, target_id: &TargetId) -> bool {
		self.ignored.contains(target_id)
	}

	/// Waits until a handle for `target_id` is attached and published.
	pub async fn wait_for(&self, target_id: &TargetId, timeout: Duration) -> Result<Arc<dyn Target>> {
		let deadline = tokio::time::Instant::now() + timeout;

		loop {
			let notify = self
				.waiters
				.entry(target_id.clone())
				.or_insert_with(|| Arc::new(Notify::new()))
				.clone();
			let notified = notify.notified();

			if let Some(target) = self.attached(target_id) {
				return Ok(target);
			}

			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			if remaining.is_zero() {
				return Err(timeout_error(target_id));
			}

			tokio::select! {
				biased;
				_ = notified => {}
				_ = tokio::time::sleep(remaining) => {
					return Err(timeout_error(target_id));
				}
			}
		}
	}
}

fn timeout_error(target_id: &TargetId) -> Error {
	Error::Timeout(format!("Timeout waiting for target: {target_id}"))
}
