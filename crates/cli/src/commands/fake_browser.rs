//! Scripted browser end of an in-memory transport.
//!
//! Answers every command with `{}`. Discovery announces the configured
//! targets and root auto-attach attaches every non-browser one.

use std::sync::{Arc, Mutex};

use pw_targets::{RemoteEndpoint, TargetInfo};
use serde_json::{Value, json};
use tokio::sync::mpsc;

#[derive(Clone)]
pub(crate) struct FakeBrowser {
	methods: Arc<Mutex<Vec<String>>>,
	messages: Arc<Mutex<Option<mpsc::UnboundedSender<Value>>>>,
}

impl FakeBrowser {
	pub fn spawn(remote: RemoteEndpoint, targets: Vec<TargetInfo>) -> Self {
		let RemoteEndpoint { mut requests, messages } = remote;
		let browser = Self {
			methods: Arc::default(),
			messages: Arc::new(Mutex::new(Some(messages))),
		};

		let this = browser.clone();
		tokio::spawn(async move {
			while let Some(request) = requests.recv().await {
				this.answer(&request, &targets);
			}
		});
		browser
	}

	/// Whether a command with `method` was received on any scope.
	pub fn received(&self, method: &str) -> bool {
		self.methods.lock().unwrap().iter().any(|m| m == method)
	}

	/// Closes the inbound side of the connection.
	pub fn disconnect(&self) {
		self.messages.lock().unwrap().take();
	}

	fn send(&self, message: Value) {
		if let Some(messages) = self.messages.lock().unwrap().as_ref() {
			let _ = messages.send(message);
		}
	}

	fn answer(&self, request: &Value, targets: &[TargetInfo]) {
		let method = request["method"].as_str().unwrap_or_default().to_string();
		let root = request.get("sessionId").is_none();
		self.methods.lock().unwrap().push(method.clone());

		match method.as_str() {
			"Target.setDiscoverTargets" => {
				for info in targets {
					self.send(json!({"method": "Target.targetCreated", "params": {"targetInfo": info}}));
				}
			}
			"Target.setAutoAttach" if root => {
				for info in targets.iter().filter(|info| !info.is_browser()) {
					let mut info = info.clone();
					info.attached = true;
					self.send(json!({
						"method": "Target.attachedToTarget",
						"params": {
							"sessionId": format!("S-{}", info.target_id),
							"targetInfo": info,
							"waitingForDebugger": true
						}
					}));
				}
			}
			_ => {}
		}

		self.send(json!({"id": request["id"], "result": {}}));
	}
}
