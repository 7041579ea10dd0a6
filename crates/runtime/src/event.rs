//! Per-scope event streams.
//!
//! The connection fans protocol events out to subscribers through unbounded
//! channels. Each stream carries a delivery counter shared with its sender,
//! so a consumer can tell how many events were handed to it so far and wait
//! until it has processed all of them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pw_targets_protocol::SessionId;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::connection::Scope;

/// A protocol event as delivered to a scope's subscribers.
#[derive(Debug, Clone)]
pub struct Event {
	pub method: String,
	pub params: Value,
	/// Session the event was emitted on; `None` for the root connection.
	pub session_id: Option<SessionId>,
}

impl Event {
	pub fn new(method: impl Into<String>, params: Value, session_id: Option<SessionId>) -> Self {
		Self {
			method: method.into(),
			params,
			session_id,
		}
	}

	/// Returns the scope this event was emitted on.
	pub fn scope(&self) -> Scope {
		Scope::from(self.session_id.clone())
	}
}

/// Number of events handed to a stream so far.
#[derive(Debug, Clone, Default)]
pub struct DeliveryCount(Arc<AtomicU64>);

impl DeliveryCount {
	pub fn get(&self) -> u64 {
		self.0.load(Ordering::SeqCst)
	}
}

/// Sending half of an event stream.
#[derive(Debug, Clone)]
pub struct EventSender {
	tx: mpsc::UnboundedSender<Event>,
	delivered: DeliveryCount,
}

impl EventSender {
	/// Delivers an event. Returns `false` once the stream was dropped.
	pub fn send(&self, event: Event) -> bool {
		// Count first so a reader that already holds the event never sees a
		// smaller delivery count than what it processed.
		self.delivered.0.fetch_add(1, Ordering::SeqCst);
		if self.tx.send(event).is_err() {
			self.delivered.0.fetch_sub(1, Ordering::SeqCst);
			return false;
		}
		true
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// Receiving half of an event stream.
#[derive(Debug)]
pub struct EventStream {
	rx: mpsc::UnboundedReceiver<Event>,
	delivered: DeliveryCount,
}

impl EventStream {
	/// Receives the next event; `None` once every sender is gone.
	pub async fn recv(&mut self) -> Option<Event> {
		self.rx.recv().await
	}

	/// Non-blocking receive.
	pub fn try_recv(&mut self) -> Option<Event> {
		self.rx.try_recv().ok()
	}

	/// Shared counter of events delivered to this stream.
	pub fn delivery_count(&self) -> DeliveryCount {
		self.delivered.clone()
	}

	/// Returns a stream that is already closed.
	pub fn closed() -> Self {
		let (_, stream) = event_channel();
		stream
	}
}

/// Creates a connected sender/stream pair.
pub fn event_channel() -> (EventSender, EventStream) {
	let (tx, rx) = mpsc::unbounded_channel();
	let delivered = DeliveryCount::default();
	(
		EventSender {
			tx,
			delivered: delivered.clone(),
		},
		EventStream { rx, delivered },
	)
}
