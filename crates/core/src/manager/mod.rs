//! [`TargetManager`]: discovery, auto-attach and the startup barrier.
//!
//! Construction subscribes to root events and starts target discovery.
//! [`TargetManager::initialize`] then enables auto-attach and resolves once
//! every target that existed when discovery was acknowledged has been
//! attached, ignored or destroyed.
//!
//! ```ignore
//! let transport = WebSocketTransport::connect(&url).await?;
//! let connection = Arc::new(Connection::new(transport));
//! tokio::spawn({
//!     let connection = Arc::clone(&connection);
//!     async move { connection.run().await }
//! });
//!
//! let manager = TargetManager::builder(connection).build();
//! let mut notifications = manager.subscribe();
//! manager.initialize().await?;
//! for (id, target) in manager.attached_targets() {
//!     println!("{id}: {}", target.info().url);
//! }
//! ```

mod attach;


use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use pw_targets_protocol::{SessionId, SetAutoAttach, SetDiscoverTargets, TargetEvent, TargetId, TargetInfo};
use pw_targets_runtime::{ConnectionLike, Error, Result, Scope, send_command};
use tokio::sync::{OnceCell, broadcast};

use crate::config::TargetManagerConfig;
use crate::dispatcher::{EventDispatcher, EventHandler, HandleFuture};
use crate::gate::{GatePhase, InitGate};
use crate::interceptor::{InterceptorChain, InterceptorId};
use crate::locks::TargetLocks;
use crate::notification::TargetNotification;
use crate::registry::TargetRegistry;
use crate::target::{BasicTargetFactory, Target, TargetFactory, TargetFilter};

/// Tracks targets of one browser connection.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TargetManager {
	inner: Arc<ManagerInner>,
}

struct ManagerInner {
	connection: Arc<dyn ConnectionLike>,
	config: TargetManagerConfig,
	factory: Arc<dyn TargetFactory>,
	filter: Option<TargetFilter>,
	registry: TargetRegistry,
	interceptors: InterceptorChain,
	gate: InitGate,
	dispatcher: EventDispatcher,
	locks: TargetLocks,
	notifications: broadcast::Sender<TargetNotification>,
	auto_attach: OnceCell<()>,
	disposed: AtomicBool,
}

/// Builder for [`TargetManager`].
pub struct TargetManagerBuilder {
	connection: Arc<dyn ConnectionLike>,
	config: TargetManagerConfig,
	factory: Arc<dyn TargetFactory>,
	filter: Option<TargetFilter>,
}

impl TargetManagerBuilder {
	pub fn config(mut self, config: TargetManagerConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the factory building handles; defaults to [`BasicTargetFactory`].
	pub fn factory(mut self, factory: impl TargetFactory + 'static) -> Self {
		self.factory = Arc::new(factory);
		self
	}

	/// Restricts which targets are tracked. Rejected targets are detached
	/// silently and never announced.
	pub fn filter<F>(mut self, filter: F) -> Self
	where
		F: Fn(&TargetInfo) -> bool + Send + Sync + 'static,
	{
		self.filter = Some(Arc::new(filter));
		self
	}

	pub fn shared_filter(mut self, filter: TargetFilter) -> Self {
		self.filter = Some(filter);
		self
	}

	/// Builds the manager and starts target discovery.
	///
	/// Must be called from within a Tokio runtime.
	pub fn build(self) -> TargetManager {
		let (notifications, _) = broadcast::channel(self.config.notification_capacity.max(1));
		let connection = self.connection;

		let inner = Arc::new_cyclic(|weak: &Weak<ManagerInner>| {
			let handler: Weak<dyn EventHandler> = weak.clone();
			ManagerInner {
				dispatcher: EventDispatcher::new(Arc::clone(&connection), handler),
				connection,
				config: self.config,
				factory: self.factory,
				filter: self.filter,
				registry: TargetRegistry::new(),
				interceptors: InterceptorChain::new(),
				gate: InitGate::new(),
				locks: TargetLocks::new(),
				notifications,
				auto_attach: OnceCell::new(),
				disposed: AtomicBool::new(false),
			}
		});

		inner.dispatcher.subscribe(Scope::Root);
		tokio::spawn(Arc::clone(&inner).discover());

		TargetManager { inner }
	}
}

impl TargetManager {
	pub fn builder(connection: Arc<dyn ConnectionLike>) -> TargetManagerBuilder {
		TargetManagerBuilder {
			connection,
			config: TargetManagerConfig::default(),
			factory: Arc::new(BasicTargetFactory),
			filter: None,
		}
	}

	/// Builds a manager with default config and [`BasicTargetFactory`].
	pub fn new(connection: Arc<dyn ConnectionLike>) -> Self {
		Self::builder(connection).build()
	}

	/// Enables auto-attach and waits until every target present at
	/// discovery time was attached, ignored or destroyed.
	///
	/// Safe to call more than once; auto-attach is only requested once.
	/// Dropping the returned future abandons the wait without affecting the
	/// manager.
	///
	/// # Errors
	///
	/// Returns [`Error::Initialization`] when discovery or auto-attach
	/// failed, the connection closed, or event handling hit a fatal error,
	/// and [`Error::Timeout`] when `init_timeout_ms` elapsed first.
	pub async fn initialize(&self) -> Result<()> {
		match self.inner.config.init_timeout() {
			Some(limit) => tokio::time::timeout(limit, self.inner.initialize())
				.await
				.map_err(|_| {
					Error::Timeout(format!(
						"Target initialization did not finish within {}ms",
						limit.as_millis()
					))
				})?,
			None => self.inner.initialize().await,
		}
	}

	pub fn is_ready(&self) -> bool {
		self.inner.gate.is_ready()
	}

	pub fn phase(&self) -> GatePhase {
		self.inner.gate.phase()
	}

	/// Ids still blocking initialization.
	pub fn pending_init(&self) -> Vec<TargetId> {
		self.inner.gate.pending()
	}

	/// Returns a receiver for lifecycle notifications.
	///
	/// Slow receivers lose the oldest notifications once the configured
	/// capacity is exceeded.
	pub fn subscribe(&self) -> broadcast::Receiver<TargetNotification> {
		self.inner.notifications.subscribe()
	}

	/// Point-in-time copy of the attached handles.
	pub fn attached_targets(&self) -> HashMap<TargetId, Arc<dyn Target>> {
		self.inner.registry.attached_targets()
	}

	/// Point-in-time copy of the latest snapshot of every known target.
	pub fn discovered_targets(&self) -> HashMap<TargetId, TargetInfo> {
		self.inner.registry.discovered_targets()
	}

	pub fn target(&self, target_id: &TargetId) -> Option<Arc<dyn Target>> {
		self.inner.registry.attached(target_id)
	}

	pub fn target_for_session(&self, session_id: &SessionId) -> Option<Arc<dyn Target>> {
		self.inner.registry.target_for_session(session_id)
	}

	pub fn is_ignored(&self, target_id: &TargetId) -> bool {
		self.inner.registry.is_ignored(target_id)
	}

	/// Registers a hook run for every target attached under `scope`, before
	/// it is announced. A failing hook is fatal for the connection.
	pub fn add_interceptor<F, Fut>(&self, scope: Scope, hook: F) -> InterceptorId
	where
		F: Fn(Arc<dyn Target>, Option<Arc<dyn Target>>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		self.inner.interceptors.add(scope, hook)
	}

	/// Removes a hook; returns `false` if it was not registered.
	pub fn remove_interceptor(&self, scope: &Scope, id: InterceptorId) -> bool {
		self.inner.interceptors.remove(scope, id)
	}

	/// Waits for an attached target matching `predicate`.
	///
	/// Current handles are checked first, then `Available` and `Changed`
	/// notifications.
	///
	/// # Errors
	///
	/// Returns [`Error::Timeout`] or [`Error::ChannelClosed`].
	pub async fn wait_for_target<F>(&self, predicate: F, timeout: Duration) -> Result<Arc<dyn Target>>
	where
		F: Fn(&dyn Target) -> bool,
	{
		let mut rx = self.subscribe();

		if let Some(target) = self
			.attached_targets()
			.into_values()
			.find(|target| predicate(target.as_ref()))
		{
			return Ok(target);
		}

		tokio::time::timeout(timeout, async move {
			loop {
				match rx.recv().await {
					Ok(TargetNotification::Available(target) | TargetNotification::Changed { target, .. })
						if predicate(target.as_ref()) =>
					{
						return Ok(target);
					}
					Ok(_) => continue,
					Err(broadcast::error::RecvError::Lagged(n)) => {
						tracing::warn!(dropped = n, "Target notification receiver lagged");
						if let Some(target) = self
							.attached_targets()
							.into_values()
							.find(|target| predicate(target.as_ref()))
						{
							return Ok(target);
						}
					}
					Err(broadcast::error::RecvError::Closed) => {
						return Err(Error::ChannelClosed);
					}
				}
			}
		})
		.await
		.map_err(|_| Error::Timeout("Timeout waiting for target".to_string()))?
	}

	/// Waits until a handle with `target_id` is attached.
	pub async fn wait_for_target_id(&self, target_id: &TargetId, timeout: Duration) -> Result<Arc<dyn Target>> {
		self.inner.registry.wait_for(target_id, timeout).await
	}

	pub fn config(&self) -> &TargetManagerConfig {
		&self.inner.config
	}

	pub fn connection(&self) -> &Arc<dyn ConnectionLike> {
		&self.inner.connection
	}

	/// Stops event processing. Pending [`initialize`](Self::initialize)
	/// calls fail; the registry keeps its last state.
	pub fn dispose(&self) {
		if self.inner.disposed.swap(true, Ordering::SeqCst) {
			return;
		}
		tracing::debug!("Disposing target manager");
		self.inner.dispatcher.shutdown();
		self.inner
			.gate
			.fail(Error::ConnectionClosed("target manager disposed".to_string()));
	}
}

impl std::fmt::Debug for TargetManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TargetManager")
			.field("phase", &self.inner.gate.phase())
			.field("attached", &self.inner.registry.attached_targets().len())
			.field("discovered", &self.inner.registry.discovered_targets().len())
			.finish()
	}
}

impl ManagerInner {
	fn accepts(&self, info: &TargetInfo) -> bool {
		self.filter.as_ref().is_none_or(|filter| filter(info))
	}

	fn auto_attach_command(&self) -> SetAutoAttach {
		SetAutoAttach {
			auto_attach: true,
			wait_for_debugger_on_start: self.config.wait_for_debugger_on_start,
			flatten: true,
			filter: self.config.target_filter(),
		}
	}

	fn notify(&self, notification: TargetNotification) {
		tracing::trace!(kind = notification.kind(), target_id = %notification.target_id(), "Publishing notification");
		// No receivers is not an error.
		let _ = self.notifications.send(notification);
	}

	/// Requests discovery and seeds the gate once it is acknowledged.
	async fn discover(self: Arc<Self>) {
		let command = SetDiscoverTargets {
			discover: true,
			filter: self.config.target_filter(),
		};

		if let Err(e) = send_command(self.connection.as_ref(), &Scope::Root, &command).await {
			tracing::warn!(error = %e, "Target discovery failed");
			self.gate.fail(e);
			return;
		}

		// Every targetCreated sent before the ack is already in the root stream.
		self.dispatcher.sync(&Scope::Root).await;

		let pending: Vec<TargetId> = self
			.registry
			.discovered_targets()
			.into_values()
			.filter(|info| !info.is_browser() && self.accepts(info))
			.map(|info| info.target_id)
			.collect();
		tracing::debug!(count = pending.len(), "Target discovery acknowledged");
		self.gate.seed(pending);
	}

	async fn initialize(&self) -> Result<()> {
		self.gate.wait_seeded().await?;

		let requested = self
			.auto_attach
			.get_or_try_init(|| async {
				let command = self.auto_attach_command();
				send_command(self.connection.as_ref(), &Scope::Root, &command).await?;
				Ok::<(), Error>(())
			})
			.await;
		if let Err(e) = requested {
			tracing::warn!(error = %e, "Enabling auto-attach failed");
			self.gate.fail(e);
		}

		self.gate.try_resolve();
		self.gate.wait_ready().await
	}
}

impl EventHandler for ManagerInner {
	fn handle_event<'a>(&'a self, scope: &'a Scope, event: TargetEvent) -> HandleFuture<'a> {
		Box::pin(async move {
			match event {
				TargetEvent::TargetCreated { target_info } => self.on_target_created(target_info).await,
				TargetEvent::TargetDestroyed { target_id } => self.on_target_destroyed(target_id).await,
				TargetEvent::TargetInfoChanged { target_info } => self.on_target_info_changed(target_info).await,
				TargetEvent::AttachedToTarget {
					session_id,
					target_info,
					waiting_for_debugger,
				} => {
					self.on_attached(scope, session_id, target_info, waiting_for_debugger)
						.await
				}
				TargetEvent::DetachedFromTarget { session_id, .. } => self.on_detached(session_id).await,
			}
		})
	}

	fn on_fatal(&self, scope: &Scope, method: &str, error: Error) {
		tracing::error!(%scope, method, error = %error, "Fatal error handling target event; closing connection");
		let reason = format!("{method} on {scope}: {error}");
		self.gate.fail(error);
		self.connection.close(&reason);
	}

	fn on_stream_closed(&self, scope: &Scope) {
		match scope {
			Scope::Root => {
				tracing::debug!("Root event stream ended");
				self.gate
					.fail(Error::ConnectionClosed("root event stream ended".to_string()));
			}
			Scope::Session(_) => {
				self.dispatcher.unsubscribe(scope);
			}
		}
	}
}
