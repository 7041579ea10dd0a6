//! CDP connection: request correlation, session table, and event fan-out.
//!
//! # Message Flow
//!
//! 1. Caller invokes `send_message()` with a scope, method, and params
//! 2. Connection assigns a unique id and parks a oneshot sender under it
//! 3. The request (carrying `sessionId` for session scopes) goes to the transport
//! 4. The run loop receives messages from the transport in order
//! 5. Responses are correlated by id and complete the parked oneshot
//! 6. Events are fanned out to the subscribers of their scope
//!
//! `Target.attachedToTarget` registers a [`Session`] *before* the event is
//! delivered, so consumers can always resolve the session it names.
//! `Target.detachedFromTarget` marks the session detached and closes its
//! event streams; the session stays resolvable until
//! [`ConnectionLike::unregister_session`] is called.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::task::{Context, Poll};

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use pw_targets_protocol::{
	AttachToTarget, Command, SessionId, TargetEvent, TargetId, TargetInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex as TokioMutex, Notify, mpsc, oneshot};

use crate::error::{Error, Result};
use crate::event::{Event, EventSender, EventStream, event_channel};
use crate::session::Session;
use crate::transport::TransportParts;

/// Parent connection node: the root connection or an attached session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
	Root,
	Session(SessionId),
}

impl Scope {
	pub fn session_id(&self) -> Option<&SessionId> {
		match self {
			Scope::Root => None,
			Scope::Session(id) => Some(id),
		}
	}
}

impl From<Option<SessionId>> for Scope {
	fn from(session_id: Option<SessionId>) -> Self {
		match session_id {
			Some(id) => Scope::Session(id),
			None => Scope::Root,
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Scope::Root => f.write_str("root"),
			Scope::Session(id) => write!(f, "session:{id}"),
		}
	}
}

/// Interface the target manager needs from a connection.
///
/// [`Connection`] implements it over a real transport; tests provide
/// scripted implementations.
pub trait ConnectionLike: Send + Sync {
	/// Sends a command on `scope` and awaits the response.
	fn send_message(
		&self,
		scope: &Scope,
		method: &str,
		params: Value,
	) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>>;

	/// Resolves a session announced by `Target.attachedToTarget`.
	fn session(&self, session_id: &SessionId) -> Option<Arc<Session>>;

	/// Drops a detached session from the session table (synchronous).
	fn unregister_session(&self, session_id: &SessionId);

	/// Returns false while the target is being attached manually, i.e. the
	/// attach was requested explicitly rather than offered by auto-attach.
	fn is_auto_attached(&self, target_id: &TargetId) -> bool;

	/// Subscribes to events emitted on `scope`.
	///
	/// Subscribing to an unknown or detached session yields a closed stream.
	fn subscribe(&self, scope: &Scope) -> EventStream;

	/// Tears the connection down, failing pending requests.
	fn close(&self, reason: &str);

	fn is_closed(&self) -> bool;
}

/// Sends a typed command through any [`ConnectionLike`].
pub async fn send_command<C: Command>(
	connection: &dyn ConnectionLike,
	scope: &Scope,
	command: &C,
) -> Result<C::Response> {
	let params = serde_json::to_value(command)?;
	let response = connection.send_message(scope, C::METHOD, params).await?;
	// Commands with empty results may answer `null` on some transports.
	let response = if response.is_null() {
		Value::Object(Default::default())
	} else {
		response
	};
	serde_json::from_value(response).map_err(Into::into)
}

/// Protocol request message sent to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	/// Unique request id for correlating responses
	pub id: u32,
	pub method: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
	/// Session the command is addressed to; absent for the root connection
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
}

/// Protocol response message from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	/// Request id this response correlates to
	pub id: u32,
	/// Success result (mutually exclusive with error)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with result)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
}

/// Protocol error details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Protocol event message from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
}

/// Discriminated union of protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Response message (has `id` field)
	Response(Response),
	/// Event message (has `method`, no `id`)
	Event(EventMessage),
	/// Unknown message type (forward-compatible catch-all)
	Unknown(Value),
}

/// Pending request callbacks keyed by request id.
type CallbackMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// RAII guard removing the parked callback when a request future is dropped.
struct CancelGuard {
	id: u32,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u32, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		if self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(id = self.id, "CancelGuard: removed orphaned callback");
		}
	}
}

/// Future returned by [`Connection::send_message`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// CDP connection over a [`TransportParts`] pair.
pub struct Connection {
	/// Sequential request id counter
	last_id: AtomicU32,
	/// Pending request callbacks keyed by request id
	callbacks: CallbackMap,
	/// Outbound messages, consumed by the transport writer
	outbound_tx: mpsc::UnboundedSender<Value>,
	/// Inbound messages (taken by `run()`)
	inbound_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	/// Sessions announced by `Target.attachedToTarget`
	sessions: DashMap<SessionId, Arc<Session>>,
	/// Event subscribers per scope
	subscribers: DashMap<Scope, Vec<EventSender>>,
	/// Targets currently being attached through `Target.attachToTarget`
	manually_attached: DashSet<TargetId>,
	closed: AtomicBool,
	close_reason: Mutex<Option<String>>,
	shutdown: Notify,
}

impl Connection {
	/// Creates a connection over the given transport halves.
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts { outbound, inbound } = parts;

		Self {
			last_id: AtomicU32::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			outbound_tx: outbound,
			inbound_rx: TokioMutex::new(Some(inbound)),
			sessions: DashMap::new(),
			subscribers: DashMap::new(),
			manually_attached: DashSet::new(),
			closed: AtomicBool::new(false),
			close_reason: Mutex::new(None),
			shutdown: Notify::new(),
		}
	}

	/// Sends a command and awaits the response.
	pub async fn send_message(&self, scope: &Scope, method: &str, params: Value) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ConnectionClosed(self.close_reason()));
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(id, %scope, method, "Sending command");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: scope.session_id().cloned(),
		};
		let request_value = serde_json::to_value(&request)?;

		if self.outbound_tx.send(request_value).is_err() {
			tracing::error!("Failed to queue message: outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Attaches to a target explicitly (flattened) and returns its session.
	///
	/// The target is excluded from auto-attach handling until the returned
	/// session is unregistered.
	pub async fn create_session(&self, target_id: &TargetId) -> Result<Arc<Session>> {
		self.manually_attached.insert(target_id.clone());
		let command = AttachToTarget {
			target_id: target_id.clone(),
			flatten: true,
		};
		let result = send_command(self, &Scope::Root, &command).await;
		let session_id = match result {
			Ok(response) => response.session_id,
			Err(e) => {
				self.manually_attached.remove(target_id);
				return Err(e);
			}
		};
		self.sessions.get(&session_id).map(|s| Arc::clone(s.value())).ok_or_else(|| {
			self.manually_attached.remove(target_id);
			Error::SessionNotFound(session_id)
		})
	}

	/// Runs the message loop until the transport ends or the connection closes.
	pub async fn run(self: &Arc<Self>) {
		let Some(mut inbound_rx) = self.inbound_rx.lock().await.take() else {
			tracing::warn!("run() called twice; ignoring");
			return;
		};

		loop {
			tokio::select! {
				message = inbound_rx.recv() => {
					let Some(message_value) = message else {
						break;
					};
					match serde_json::from_value::<Message>(message_value) {
						Ok(message) => {
							if let Err(e) = self.dispatch_internal(message) {
								tracing::error!(error = %e, "Error dispatching message");
							}
						}
						Err(e) => {
							tracing::error!(error = %e, "Failed to parse message");
						}
					}
				}
				_ = self.shutdown.notified() => break,
			}
		}

		self.close("transport closed");
	}

	/// Dispatch an incoming message (test-only public version)
	#[cfg(test)]
	pub fn dispatch(self: &Arc<Self>, message: Message) -> Result<()> {
		self.dispatch_internal(message)
	}

	fn dispatch_internal(self: &Arc<Self>, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let callback = self.callbacks.lock().remove(&response.id).ok_or_else(|| {
					Error::ProtocolError(format!("Cannot find request to respond: id={}", response.id))
				})?;

				let result = match response.error {
					Some(error) => Err(parse_protocol_error(error)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};

				let _ = callback.send(result);
				Ok(())
			}
			Message::Event(event) => {
				let scope = Scope::from(event.session_id.clone());
				match event.method.as_str() {
					TargetEvent::ATTACHED_TO_TARGET => self.on_attached(&scope, &event.params)?,
					TargetEvent::DETACHED_FROM_TARGET => {
						self.deliver(&scope, &event);
						return self.on_detached(&event.params);
					}
					_ => {}
				}
				self.deliver(&scope, &event);
				Ok(())
			}
			Message::Unknown(value) => {
				tracing::debug!(message = %value, "Unknown message type (forward-compatible, ignored)");
				Ok(())
			}
		}
	}

	/// Registers the session named by an attach event.
	fn on_attached(self: &Arc<Self>, parent: &Scope, params: &Value) -> Result<()> {
		#[derive(Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct Attached {
			session_id: SessionId,
			target_info: TargetInfo,
		}

		let attached: Attached = serde_json::from_value(params.clone())?;
		let manual = self.manually_attached.contains(&attached.target_info.target_id);
		let connection: std::sync::Weak<dyn ConnectionLike> =
			Arc::downgrade(self) as std::sync::Weak<dyn ConnectionLike>;
		let session = Session::new(
			attached.session_id.clone(),
			&attached.target_info,
			parent.clone(),
			manual,
			connection,
		);

		tracing::debug!(
			session_id = %attached.session_id,
			target_id = %attached.target_info.target_id,
			%parent,
			manual,
			"Session attached"
		);
		self.sessions.insert(attached.session_id, Arc::new(session));
		Ok(())
	}

	/// Marks a session detached and closes its event streams.
	fn on_detached(&self, params: &Value) -> Result<()> {
		#[derive(Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct Detached {
			session_id: SessionId,
		}

		let detached: Detached = serde_json::from_value(params.clone())?;
		if let Some(session) = self.sessions.get(&detached.session_id) {
			session.mark_detached();
		}
		self.subscribers.remove(&Scope::Session(detached.session_id.clone()));
		tracing::debug!(session_id = %detached.session_id, "Session detached");
		Ok(())
	}

	fn deliver(&self, scope: &Scope, event: &EventMessage) {
		let Some(mut senders) = self.subscribers.get_mut(scope) else {
			tracing::trace!(%scope, method = %event.method, "Event without subscribers");
			return;
		};
		let delivered = Event::new(event.method.clone(), event.params.clone(), event.session_id.clone());
		senders.retain(|sender| sender.send(delivered.clone()));
	}

	fn close_reason(&self) -> String {
		self.close_reason
			.lock()
			.clone()
			.unwrap_or_else(|| "connection closed".to_string())
	}
}

/// Converts an [`ErrorPayload`] into [`Error::Remote`].
fn parse_protocol_error(error: ErrorPayload) -> Error {
	Error::Remote {
		code: error.code,
		message: error.message,
		data: error.data.map(|d| match d {
			Value::String(s) => s,
			other => other.to_string(),
		}),
	}
}

impl ConnectionLike for Connection {
	fn send_message(
		&self,
		scope: &Scope,
		method: &str,
		params: Value,
	) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
		let scope = scope.clone();
		let method = method.to_string();
		Box::pin(async move { Connection::send_message(self, &scope, &method, params).await })
	}

	fn session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
		self.sessions.get(session_id).map(|s| Arc::clone(s.value()))
	}

	fn unregister_session(&self, session_id: &SessionId) {
		if let Some((_, session)) = self.sessions.remove(session_id) {
			session.mark_detached();
			if session.is_manual() {
				self.manually_attached.remove(session.target_id());
			}
		}
		self.subscribers.remove(&Scope::Session(session_id.clone()));
	}

	fn is_auto_attached(&self, target_id: &TargetId) -> bool {
		!self.manually_attached.contains(target_id)
	}

	fn subscribe(&self, scope: &Scope) -> EventStream {
		if self.is_closed() {
			return EventStream::closed();
		}
		if let Scope::Session(id) = scope {
			let live = self.sessions.get(id).is_some_and(|s| !s.is_detached());
			if !live {
				return EventStream::closed();
			}
		}
		let (sender, stream) = event_channel();
		self.subscribers.entry(scope.clone()).or_default().push(sender);
		stream
	}

	fn close(&self, reason: &str) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		tracing::debug!(reason, "Closing connection");
		*self.close_reason.lock() = Some(reason.to_string());

		let pending: Vec<_> = self.callbacks.lock().drain().collect();
		for (_, callback) in pending {
			let _ = callback.send(Err(Error::ConnectionClosed(reason.to_string())));
		}

		self.subscribers.clear();
		for session in self.sessions.iter() {
			session.mark_detached();
		}
		self.shutdown.notify_one();
	}

	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}
