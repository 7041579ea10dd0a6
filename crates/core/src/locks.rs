//! Per-target-id async locks.
//!
//! Events touching the same target id are serialized; different ids proceed
//! independently. Entries are created on demand and dropped again by the
//! last guard when nobody else is waiting.

use std::sync::Arc;

use dashmap::DashMap;
use pw_targets_protocol::TargetId;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = Arc<DashMap<TargetId, Arc<Mutex<()>>>>;

#[derive(Default)]
pub struct TargetLocks {
	locks: LockMap,
}

pub struct TargetGuard {
	target_id: TargetId,
	locks: LockMap,
	guard: Option<OwnedMutexGuard<()>>,
}

impl TargetLocks {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn lock(&self, target_id: &TargetId) -> TargetGuard {
		let mutex = self
			.locks
			.entry(target_id.clone())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		let guard = mutex.lock_owned().await;
		TargetGuard {
			target_id: target_id.clone(),
			locks: Arc::clone(&self.locks),
			guard: Some(guard),
		}
	}
}

impl Drop for TargetGuard {
	fn drop(&mut self) {
		drop(self.guard.take());
		self.locks
			.remove_if(&self.target_id, |_, mutex| Arc::strong_count(mutex) == 1);
	}
}
