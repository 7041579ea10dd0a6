//! Interceptor hooks run for every newly attached target, before it is
//! announced.
//!
//! Hooks are keyed by the parent [`Scope`] that produced the attach event and
//! kept in an [`IndexMap`] for stable insertion order with O(1) removal.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use pw_targets_runtime::{Error, Result, Scope};

use crate::target::Target;

/// Unique identifier for interceptor hooks.
pub type InterceptorId = u64;

static NEXT_INTERCEPTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a new globally-unique interceptor ID.
pub fn next_interceptor_id() -> InterceptorId {
	NEXT_INTERCEPTOR_ID.fetch_add(1, Ordering::SeqCst)
}

/// Boxed async hook future.
pub type InterceptorFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Hook function: `(target, parent_target)` → async `Result<()>`.
pub type InterceptorFn = Arc<dyn Fn(Arc<dyn Target>, Option<Arc<dyn Target>>) -> InterceptorFuture + Send + Sync>;

pub struct InterceptorEntry {
	pub id: InterceptorId,
	pub hook: InterceptorFn,
}

type InterceptorMap = Arc<Mutex<IndexMap<InterceptorId, InterceptorEntry>>>;

/// Ordered hooks per parent scope.
#[derive(Default)]
pub struct InterceptorChain {
	chains: DashMap<Scope, InterceptorMap>,
}

impl InterceptorChain {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a hook for targets attached under `scope`.
	pub fn add<F, Fut>(&self, scope: Scope, hook: F) -> InterceptorId
	where
		F: Fn(Arc<dyn Target>, Option<Arc<dyn Target>>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		let id = next_interceptor_id();
		let hook: InterceptorFn = Arc::new(move |target, parent| -> InterceptorFuture { Box::pin(hook(target, parent)) });

		self.chains
			.entry(scope)
			.or_default()
			.lock()
			.insert(id, InterceptorEntry { id, hook });
		id
	}

	/// Removes a hook. Unknown scopes or ids are a no-op returning `false`.
	pub fn remove(&self, scope: &Scope, id: InterceptorId) -> bool {
		let removed = match self.chains.get(scope) {
			Some(map) => map.lock().shift_remove(&id).is_some(),
			None => false,
		};
		if removed {
			self.chains.remove_if(scope, |_, map| map.lock().is_empty());
		}
		removed
	}

	/// Returns `true` if any hook is registered for `scope`.
	pub fn has_hooks(&self, scope: &Scope) -> bool {
		self.chains.get(scope).is_some_and(|map| !map.lock().is_empty())
	}

	pub fn len(&self, scope: &Scope) -> usize {
		self.chains.get(scope).map_or(0, |map| map.lock().len())
	}

	/// Drops every hook keyed on `scope`, returning how many were removed.
	pub fn drop_scope(&self, scope: &Scope) -> usize {
		self.chains
			.remove(scope)
			.map_or(0, |(_, map)| map.lock().len())
	}

	/// Runs the hooks for `scope` in insertion order.
	///
	/// The hook list is snapshotted first, so hooks may add or remove hooks
	/// without deadlocking. The first failure stops the chain.
	pub async fn run(
		&self,
		scope: &Scope,
		target: &Arc<dyn Target>,
		parent: Option<&Arc<dyn Target>>,
	) -> Result<()> {
		let hooks: Vec<_> = match self.chains.get(scope) {
			Some(map) => map.lock().values().map(|e| (e.id, Arc::clone(&e.hook))).collect(),
			None => return Ok(()),
		};

		for (id, hook) in hooks {
			if let Err(e) = hook(Arc::clone(target), parent.cloned()).await {
				tracing::error!(
					interceptor_id = id,
					target_id = %target.target_id(),
					error = %e,
					"Target interceptor failed"
				);
				return Err(Error::Interceptor {
					id,
					source: Box::new(e),
				});
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pw_targets_protocol::{SessionId, TargetInfo, TargetType};

	use super::*;
	use crate::target::BasicTarget;

	fn handle(id: &str) -> Arc<dyn Target> {
		Arc::new(BasicTarget::new(TargetInfo::new(id, TargetType::Page), None))
	}

	#[test]
	fn test_interceptor_id_increments() {
		let id1 = next_interceptor_id();
		let id2 = next_interceptor_id();
		assert!(id2 > id1);
	}

	#[tokio::test]
	async fn test_hooks_run_in_insertion_order() {
		let chain = InterceptorChain::new();
		let order = Arc::new(Mutex::new(Vec::new()));

		for label in ["first", "second", "third"] {
			let order = Arc::clone(&order);
			chain.add(Scope::Root, move |_, _| {
				let order = Arc::clone(&order);
				async move {
					order.lock().push(label);
					Ok(())
				}
			});
		}

		chain.run(&Scope::Root, &handle("T1"), None).await.unwrap();
		assert_eq!(*order.lock(), vec!["first", "second", "third"]);
	}

	#[tokio::test]
	async fn test_first_failure_stops_chain() {
		let chain = InterceptorChain::new();
		let reached = Arc::new(Mutex::new(false));

		let failing = chain.add(Scope::Root, |_, _| async { Err(Error::InvalidArgument("rejected".to_string())) });
		let flag = Arc::clone(&reached);
		chain.add(Scope::Root, move |_, _| {
			let flag = Arc::clone(&flag);
			async move {
				*flag.lock() = true;
				Ok(())
			}
		});

		match chain.run(&Scope::Root, &handle("T1"), None).await {
			Err(Error::Interceptor { id, source }) => {
				assert_eq!(id, failing);
				assert!(matches!(*source, Error::InvalidArgument(_)));
			}
			other => panic!("Expected Interceptor error, got: {other:?}"),
		}
		assert!(!*reached.lock());
	}

	#[tokio::test]
	async fn test_hook_receives_parent_target() {
		let chain = InterceptorChain::new();
		let scope = Scope::Session(SessionId::new("S1"));
		let seen = Arc::new(Mutex::new(None));

		let slot = Arc::clone(&seen);
		chain.add(scope.clone(), move |target, parent| {
			let slot = Arc::clone(&slot);
			async move {
				*slot.lock() = Some((target.target_id().clone(), parent.map(|p| p.target_id().clone())));
				Ok(())
			}
		});

		let parent = handle("P1");
		chain.run(&scope, &handle("C1"), Some(&parent)).await.unwrap();

		let (child, parent) = seen.lock().clone().unwrap();
		assert_eq!(child.as_str(), "C1");
		assert_eq!(parent.unwrap().as_str(), "P1");
	}

	#[test]
	fn test_remove_unknown_is_noop() {
		let chain = InterceptorChain::new();
		assert!(!chain.remove(&Scope::Root, 42));

		let id = chain.add(Scope::Root, |_, _| async { Ok(()) });
		assert!(!chain.remove(&Scope::Session(SessionId::new("S1")), id));
		assert!(chain.remove(&Scope::Root, id));
		assert!(!chain.remove(&Scope::Root, id));
		assert!(!chain.has_hooks(&Scope::Root));
	}

	#[test]
	fn test_drop_scope() {
		let chain = InterceptorChain::new();
		let scope = Scope::Session(SessionId::new("S1"));
		chain.add(scope.clone(), |_, _| async { Ok(()) });
		chain.add(scope.clone(), |_, _| async { Ok(()) });
		chain.add(Scope::Root, |_, _| async { Ok(()) });

		assert_eq!(chain.drop_scope(&scope), 2);
		assert_eq!(chain.len(&scope), 0);
		assert_eq!(chain.len(&Scope::Root), 1);
	}
}
