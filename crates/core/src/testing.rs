//! Scripted [`ConnectionLike`] used by the unit tests.
//!
//! Commands are recorded and answered with `{}` unless a failure was scripted
//! for their method, or the method is held until released. Events are pushed
//! straight into the subscribed streams, mirroring what [`Connection`]'s
//! reader loop does: the session is registered before its attach event is
//! delivered, and a detach closes the session's streams.
//!
//! [`Connection`]: pw_targets_runtime::Connection

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use pw_targets_protocol::{SessionId, TargetEvent, TargetId, TargetInfo, TargetType};
use pw_targets_runtime::{
	ConnectionLike, Error, Event, EventSender, EventStream, Result, Scope, Session, event_channel,
};
use serde_json::{Value, json};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub(crate) struct SentCommand {
	pub scope: Scope,
	pub method: String,
	pub params: Value,
}

pub(crate) struct MockConnection {
	this: Weak<MockConnection>,
	sessions: DashMap<SessionId, Arc<Session>>,
	manual: DashSet<TargetId>,
	sent: Mutex<Vec<SentCommand>>,
	failures: DashMap<String, String>,
	holds: DashMap<String, Arc<Notify>>,
	subscribers: DashMap<Scope, Vec<EventSender>>,
	closed: AtomicBool,
	close_reason: Mutex<Option<String>>,
}

impl MockConnection {
	pub fn new() -> Arc<Self> {
		Arc::new_cyclic(|this| Self {
			this: this.clone(),
			sessions: DashMap::new(),
			manual: DashSet::new(),
			sent: Mutex::new(Vec::new()),
			failures: DashMap::new(),
			holds: DashMap::new(),
			subscribers: DashMap::new(),
			closed: AtomicBool::new(false),
			close_reason: Mutex::new(None),
		})
	}

	/// Answers every future `method` command with a remote error.
	pub fn fail(&self, method: &str, message: &str) {
		self.failures.insert(method.to_string(), message.to_string());
	}

	/// Keeps `method` commands pending until [`release`](Self::release).
	pub fn hold(&self, method: &str) {
		self.holds.insert(method.to_string(), Arc::new(Notify::new()));
	}

	pub fn release(&self, method: &str) {
		if let Some((_, notify)) = self.holds.remove(method) {
			notify.notify_waiters();
			notify.notify_one();
		}
	}

	pub fn sent(&self) -> Vec<SentCommand> {
		self.sent.lock().clone()
	}

	pub fn sent_to(&self, method: &str) -> Vec<SentCommand> {
		self.sent.lock().iter().filter(|c| c.method == method).cloned().collect()
	}

	pub fn close_reason(&self) -> Option<String> {
		self.close_reason.lock().clone()
	}

	/// Marks `target_id` as attached through an explicit attach request.
	pub fn mark_manual(&self, target_id: TargetId) {
		self.manual.insert(target_id);
	}

	pub fn register_session(&self, session_id: SessionId, info: &TargetInfo, parent: Scope) -> Arc<Session> {
		let manual = self.manual.contains(&info.target_id);
		let weak: Weak<dyn ConnectionLike> = self.this.clone();
		let session = Arc::new(Session::new(session_id.clone(), info, parent, manual, weak));
		self.sessions.insert(session_id, Arc::clone(&session));
		session
	}

	pub fn emit(&self, scope: &Scope, method: &str, params: Value) {
		let Some(mut senders) = self.subscribers.get_mut(scope) else {
			return;
		};
		senders.retain(|sender| !sender.is_closed());
		let event = Event::new(method, params, scope.session_id().cloned());
		for sender in senders.iter() {
			sender.send(event.clone());
		}
	}

	pub fn emit_created_info(&self, info: &TargetInfo) {
		self.emit(&Scope::Root, TargetEvent::TARGET_CREATED, json!({ "targetInfo": info }));
	}

	pub fn emit_created(&self, target_id: TargetId, target_type: TargetType) {
		self.emit_created_info(&TargetInfo::new(target_id, target_type));
	}

	pub fn emit_info_changed(&self, info: &TargetInfo) {
		self.emit(&Scope::Root, TargetEvent::TARGET_INFO_CHANGED, json!({ "targetInfo": info }));
	}

	pub fn emit_destroyed(&self, target_id: TargetId) {
		self.emit_destroyed_in(&Scope::Root, target_id);
	}

	pub fn emit_destroyed_in(&self, scope: &Scope, target_id: TargetId) {
		self.emit(scope, TargetEvent::TARGET_DESTROYED, json!({ "targetId": target_id }));
	}

	/// Registers a session and announces it on `parent`.
	pub fn emit_attached(&self, parent: &Scope, session_id: &str, info: &TargetInfo) -> Arc<Session> {
		let session = self.register_session(SessionId::new(session_id), info, parent.clone());
		self.emit(
			parent,
			TargetEvent::ATTACHED_TO_TARGET,
			json!({ "sessionId": session_id, "targetInfo": info, "waitingForDebugger": true }),
		);
		session
	}

	/// Announces a detach on `parent` and closes the session's streams.
	pub fn emit_detached(&self, parent: &Scope, session_id: &str) {
		let session_id = SessionId::new(session_id);
		let target_id = self.sessions.get(&session_id).map(|s| s.target_id().clone());
		self.emit(
			parent,
			TargetEvent::DETACHED_FROM_TARGET,
			json!({ "sessionId": session_id, "targetId": target_id }),
		);
		if let Some(session) = self.sessions.get(&session_id) {
			session.mark_detached();
		}
		self.subscribers.remove(&Scope::Session(session_id));
	}

	/// Ends every stream as if the transport went away.
	pub fn close_streams(&self) {
		self.subscribers.clear();
	}
}

impl ConnectionLike for MockConnection {
	fn send_message(
		&self,
		scope: &Scope,
		method: &str,
		params: Value,
	) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
		self.sent.lock().push(SentCommand {
			scope: scope.clone(),
			method: method.to_string(),
			params,
		});
		let hold = self.holds.get(method).map(|n| Arc::clone(n.value()));
		let failure = self.failures.get(method).map(|m| m.value().clone());

		Box::pin(async move {
			if let Some(notify) = hold {
				notify.notified().await;
			}
			if self.is_closed() {
				return Err(Error::ConnectionClosed(self.close_reason().unwrap_or_default()));
			}
			match failure {
				Some(message) => Err(Error::Remote {
					code: -32000,
					message,
					data: None,
				}),
				None => Ok(json!({})),
			}
		})
	}

	fn session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
		self.sessions.get(session_id).map(|s| Arc::clone(s.value()))
	}

	fn unregister_session(&self, session_id: &SessionId) {
		if let Some((_, session)) = self.sessions.remove(session_id) {
			session.mark_detached();
			if session.is_manual() {
				self.manual.remove(session.target_id());
			}
		}
		self.subscribers.remove(&Scope::Session(session_id.clone()));
	}

	fn is_auto_attached(&self, target_id: &TargetId) -> bool {
		!self.manual.contains(target_id)
	}

	fn subscribe(&self, scope: &Scope) -> EventStream {
		if self.is_closed() {
			return EventStream::closed();
		}
		if let Scope::Session(id) = scope {
			if !self.sessions.get(id).is_some_and(|s| !s.is_detached()) {
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
		*self.close_reason.lock() = Some(reason.to_string());
		self.subscribers.clear();
		for session in self.sessions.iter() {
			session.mark_detached();
		}
		for hold in self.holds.iter() {
			hold.notify_waiters();
		}
	}

	fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}
