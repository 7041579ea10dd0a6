//! Per-scope event pumps feeding the manager.
//!
//! Every subscribed [`Scope`] gets one tokio task reading its
//! [`EventStream`](pw_targets_runtime::EventStream) sequentially, so events
//! of one session keep their order while different sessions run
//! independently. Each task publishes how many events it has processed,
//! which lets [`EventDispatcher::sync`] wait until everything delivered so far
//! has been handled.
//!
//! Unsubscribing never interrupts a handler: the task finishes the event in
//! hand and stops before reading the next one.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pw_targets_protocol::TargetEvent;
use pw_targets_runtime::{ConnectionLike, DeliveryCount, Error, EventStream, Result, Scope};
use tokio::sync::{oneshot, watch};

/// Boxed future returned by [`EventHandler::handle_event`].
pub type HandleFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Receiver of decoded target events.
pub trait EventHandler: Send + Sync + 'static {
	fn handle_event<'a>(&'a self, scope: &'a Scope, event: TargetEvent) -> HandleFuture<'a>;

	/// Called once when handling an event failed; the pump stops afterwards.
	fn on_fatal(&self, scope: &Scope, method: &str, error: Error);

	/// Called when a stream ends without being unsubscribed.
	fn on_stream_closed(&self, scope: &Scope);
}

struct Pump {
	/// Dropping the sender stops the task at the next event boundary.
	_stop: oneshot::Sender<()>,
	delivered: DeliveryCount,
	processed: watch::Receiver<u64>,
}

pub struct EventDispatcher {
	connection: Arc<dyn ConnectionLike>,
	handler: Weak<dyn EventHandler>,
	pumps: DashMap<Scope, Pump>,
}

impl EventDispatcher {
	pub fn new(connection: Arc<dyn ConnectionLike>, handler: Weak<dyn EventHandler>) -> Self {
		Self {
			connection,
			handler,
			pumps: DashMap::new(),
		}
	}

	/// Starts pumping events for `scope`. Returns `false` if already subscribed.
	pub fn subscribe(&self, scope: Scope) -> bool {
		let entry = match self.pumps.entry(scope.clone()) {
			Entry::Occupied(_) => return false,
			Entry::Vacant(entry) => entry,
		};

		let stream = self.connection.subscribe(&scope);
		let delivered = stream.delivery_count();
		let (processed_tx, processed) = watch::channel(0u64);
		let (stop_tx, stop) = oneshot::channel();
		tokio::spawn(pump(scope.clone(), stream, stop, self.handler.clone(), processed_tx));

		entry.insert(Pump {
			_stop: stop_tx,
			delivered,
			processed,
		});
		tracing::trace!(%scope, "Subscribed to scope events");
		true
	}

	/// Stops the pump for `scope` once its current event, if any, is handled.
	/// Unknown scopes are a no-op.
	pub fn unsubscribe(&self, scope: &Scope) -> bool {
		match self.pumps.remove(scope) {
			Some(_) => {
				tracing::trace!(%scope, "Unsubscribed from scope events");
				true
			}
			None => false,
		}
	}

	pub fn is_subscribed(&self, scope: &Scope) -> bool {
		self.pumps.contains_key(scope)
	}

	/// Waits until every event delivered to `scope` so far was handled.
	///
	/// Returns immediately for unknown scopes, and when the pump stops.
	pub async fn sync(&self, scope: &Scope) {
		let (target, mut processed) = match self.pumps.get(scope) {
			Some(pump) => (pump.delivered.get(), pump.processed.clone()),
			None => return,
		};
		let _ = processed.wait_for(|count| *count >= target).await;
	}

	/// Stops every pump.
	pub fn shutdown(&self) {
		let scopes: Vec<Scope> = self.pumps.iter().map(|r| r.key().clone()).collect();
		for scope in scopes {
			self.unsubscribe(&scope);
		}
	}
}

async fn pump(
	scope: Scope,
	mut stream: EventStream,
	mut stop: oneshot::Receiver<()>,
	handler: Weak<dyn EventHandler>,
	processed: watch::Sender<u64>,
) {
	let mut count = 0u64;

	loop {
		let event = tokio::select! {
			biased;
			_ = &mut stop => {
				tracing::trace!(%scope, "Event pump stopped");
				return;
			}
			event = stream.recv() => event,
		};
		let Some(event) = event else {
			break;
		};

		let Some(handler) = handler.upgrade() else {
			return;
		};

		let result = match TargetEvent::decode(&event.method, event.params) {
			Ok(Some(decoded)) => handler.handle_event(&scope, decoded).await,
			Ok(None) => {
				tracing::debug!(%scope, method = %event.method, "Ignoring non-target event");
				Ok(())
			}
			Err(e) => Err(Error::ProtocolError(format!("malformed {} event: {e}", event.method))),
		};

		count += 1;
		if let Err(e) = result {
			handler.on_fatal(&scope, &event.method, e);
			processed.send_replace(count);
			return;
		}
		processed.send_replace(count);
	}

	if let Some(handler) = handler.upgrade() {
		handler.on_stream_closed(&scope);
	}
}
