//! One-shot startup barrier over the targets that existed at connect time.
//!
//! The gate is seeded once, when target discovery is acknowledged, with the
//! ids the manager must see attached (or destroyed) before it reports ready.
//! The pending set only ever shrinks and resolution fires exactly once.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use pw_targets_protocol::TargetId;
use pw_targets_runtime::{Error, Result};
use tokio::sync::watch;

/// Lifecycle of the startup barrier.
#[derive(Debug, Clone)]
pub enum GatePhase {
	/// Waiting for the discovery acknowledgement.
	Discovering,
	/// Seeded; waiting for the pending ids to drain.
	Pending,
	Ready,
	Failed(Arc<Error>),
}

#[derive(Default)]
struct PendingSet {
	seeded: bool,
	ids: HashSet<TargetId>,
	/// Ids settled before seeding; excluded from the seed.
	settled_early: HashSet<TargetId>,
}

pub struct InitGate {
	pending: Mutex<PendingSet>,
	resolved: AtomicBool,
	phase: watch::Sender<GatePhase>,
}

impl Default for InitGate {
	fn default() -> Self {
		Self::new()
	}
}

impl InitGate {
	pub fn new() -> Self {
		let (phase, _) = watch::channel(GatePhase::Discovering);
		Self {
			pending: Mutex::new(PendingSet::default()),
			resolved: AtomicBool::new(false),
			phase,
		}
	}

	/// Seeds the pending set. Only the first call has an effect.
	pub fn seed<I>(&self, ids: I) -> bool
	where
		I: IntoIterator<Item = TargetId>,
	{
		let mut pending = self.pending.lock();
		if pending.seeded {
			return false;
		}
		let early = std::mem::take(&mut pending.settled_early);
		pending.ids = ids.into_iter().filter(|id| !early.contains(id)).collect();
		pending.seeded = true;
		tracing::debug!(pending = pending.ids.len(), "Initialization gate seeded");
		drop(pending);

		if !self.resolved.load(Ordering::SeqCst) {
			self.phase.send_replace(GatePhase::Pending);
		}
		true
	}

	/// Removes `target_id` if present. Before seeding the id is remembered
	/// and kept out of the seed.
	pub fn remove(&self, target_id: &TargetId) -> bool {
		let mut pending = self.pending.lock();
		if pending.seeded {
			pending.ids.remove(target_id)
		} else {
			pending.settled_early.insert(target_id.clone());
			false
		}
	}

	/// Resolves the gate if it is seeded and nothing is pending.
	///
	/// Returns `true` only for the call that resolved it.
	pub fn try_resolve(&self) -> bool {
		{
			let pending = self.pending.lock();
			if !pending.seeded || !pending.ids.is_empty() {
				return false;
			}
		}
		if self.resolved.swap(true, Ordering::SeqCst) {
			return false;
		}
		tracing::debug!("Initialization gate resolved");
		self.phase.send_replace(GatePhase::Ready);
		true
	}

	/// Removes `target_id` and recomputes the gate.
	pub fn settle(&self, target_id: &TargetId) -> bool {
		self.remove(target_id);
		self.try_resolve()
	}

	/// Fails the gate unless it already resolved.
	pub fn fail(&self, error: Error) {
		if self.resolved.swap(true, Ordering::SeqCst) {
			tracing::debug!(error = %error, "Ignoring failure after gate resolution");
			return;
		}
		tracing::warn!(error = %error, "Initialization gate failed");
		self.phase.send_replace(GatePhase::Failed(Arc::new(error)));
	}

	pub fn phase(&self) -> GatePhase {
		self.phase.borrow().clone()
	}

	pub fn is_ready(&self) -> bool {
		matches!(*self.phase.borrow(), GatePhase::Ready)
	}

	/// Ids still blocking the gate.
	pub fn pending(&self) -> Vec<TargetId> {
		self.pending.lock().ids.iter().cloned().collect()
	}

	/// Waits until discovery was acknowledged (or the gate failed).
	pub async fn wait_seeded(&self) -> Result<()> {
		self.wait_until(|phase| !matches!(phase, GatePhase::Discovering)).await
	}

	/// Waits until the gate is ready (or failed).
	pub async fn wait_ready(&self) -> Result<()> {
		self.wait_until(|phase| matches!(phase, GatePhase::Ready | GatePhase::Failed(_))).await
	}

	async fn wait_until(&self, reached: impl FnMut(&GatePhase) -> bool) -> Result<()> {
		let mut rx = self.phase.subscribe();
		let phase = rx.wait_for(reached).await.map_err(|_| Error::ChannelClosed)?.clone();
		match phase {
			GatePhase::Failed(error) => Err(Error::Initialization(error)),
			_ => Ok(()),
		}
	}
}
