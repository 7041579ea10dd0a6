//! Manager configuration.

use std::time::Duration;

use pw_targets_protocol::{TargetFilterEntry, TargetType};
use serde::{Deserialize, Serialize};

/// Options controlling discovery and auto-attach.
///
/// Every field has a default, so a partial JSON document is a valid config:
///
/// ```json
/// { "excluded_target_types": ["tab", "shared_worker"], "init_timeout_ms": 5000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetManagerConfig {
	/// Target types excluded from discovery and auto-attach.
	pub excluded_target_types: Vec<TargetType>,
	/// Pause new targets until the follow-up commands resume them.
	pub wait_for_debugger_on_start: bool,
	/// Upper bound for [`TargetManager::initialize`](crate::TargetManager::initialize).
	pub init_timeout_ms: Option<u64>,
	/// Capacity of the notification broadcast channel.
	pub notification_capacity: usize,
}

impl Default for TargetManagerConfig {
	fn default() -> Self {
		Self {
			excluded_target_types: vec![TargetType::Tab],
			wait_for_debugger_on_start: true,
			init_timeout_ms: None,
			notification_capacity: 256,
		}
	}
}

impl TargetManagerConfig {
	pub fn init_timeout(&self) -> Option<Duration> {
		self.init_timeout_ms.map(Duration::from_millis)
	}

	/// Protocol filter shared by `setDiscoverTargets` and every `setAutoAttach`.
	pub fn target_filter(&self) -> Vec<TargetFilterEntry> {
		TargetFilterEntry::excluding(self.excluded_target_types.iter().cloned())
	}

	/// Parses a JSON document, filling missing fields with defaults.
	pub fn from_json(json: &str) -> serde_json::Result<Self> {
		serde_json::from_str(json)
	}
}
