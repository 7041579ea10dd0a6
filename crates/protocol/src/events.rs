//! Decoded `Target.*` lifecycle events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{SessionId, TargetId};
use crate::target::TargetInfo;

/// Lifecycle events of the `Target` domain that drive the target manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetEvent {
	#[serde(rename = "Target.targetCreated", rename_all = "camelCase")]
	TargetCreated { target_info: TargetInfo },

	#[serde(rename = "Target.targetDestroyed", rename_all = "camelCase")]
	TargetDestroyed { target_id: TargetId },

	#[serde(rename = "Target.targetInfoChanged", rename_all = "camelCase")]
	TargetInfoChanged { target_info: TargetInfo },

	#[serde(rename = "Target.attachedToTarget", rename_all = "camelCase")]
	AttachedToTarget {
		session_id: SessionId,
		target_info: TargetInfo,
		#[serde(default)]
		waiting_for_debugger: bool,
	},

	#[serde(rename = "Target.detachedFromTarget", rename_all = "camelCase")]
	DetachedFromTarget {
		session_id: SessionId,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		target_id: Option<TargetId>,
	},
}

impl TargetEvent {
	pub const TARGET_CREATED: &'static str = "Target.targetCreated";
	pub const TARGET_DESTROYED: &'static str = "Target.targetDestroyed";
	pub const TARGET_INFO_CHANGED: &'static str = "Target.targetInfoChanged";
	pub const ATTACHED_TO_TARGET: &'static str = "Target.attachedToTarget";
	pub const DETACHED_FROM_TARGET: &'static str = "Target.detachedFromTarget";

	/// Returns `true` if `method` names one of the lifecycle events.
	pub fn handles(method: &str) -> bool {
		matches!(
			method,
			Self::TARGET_CREATED
				| Self::TARGET_DESTROYED
				| Self::TARGET_INFO_CHANGED
				| Self::ATTACHED_TO_TARGET
				| Self::DETACHED_FROM_TARGET
		)
	}

	/// Decodes an event from its method name and params.
	///
	/// Returns `Ok(None)` for methods outside the lifecycle set, and an error
	/// when a lifecycle event carries malformed params.
	pub fn decode(method: &str, params: Value) -> serde_json::Result<Option<Self>> {
		if !Self::handles(method) {
			return Ok(None);
		}
		serde_json::from_value(serde_json::json!({ "method": method, "params": params })).map(Some)
	}

	/// Returns the protocol method name.
	pub fn method(&self) -> &'static str {
		match self {
			TargetEvent::TargetCreated { .. } => Self::TARGET_CREATED,
			TargetEvent::TargetDestroyed { .. } => Self::TARGET_DESTROYED,
			TargetEvent::TargetInfoChanged { .. } => Self::TARGET_INFO_CHANGED,
			TargetEvent::AttachedToTarget { .. } => Self::ATTACHED_TO_TARGET,
			TargetEvent::DetachedFromTarget { .. } => Self::DETACHED_FROM_TARGET,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::target::TargetType;

	#[test]
	fn test_decode_attached_to_target() {
		let params = json!({
			"sessionId": "S1",
			"targetInfo": {"targetId": "T1", "type": "page", "title": "", "url": "about:blank", "attached": true},
			"waitingForDebugger": true
		});

		let event = TargetEvent::decode("Target.attachedToTarget", params).unwrap().unwrap();
		match event {
			TargetEvent::AttachedToTarget {
				session_id,
				target_info,
				waiting_for_debugger,
			} => {
				assert_eq!(session_id.as_str(), "S1");
				assert_eq!(target_info.target_type, TargetType::Page);
				assert!(waiting_for_debugger);
			}
			other => panic!("Expected AttachedToTarget, got {other:?}"),
		}
	}

	#[test]
	fn test_decode_ignores_other_domains() {
		let event = TargetEvent::decode("Page.loadEventFired", json!({"timestamp": 1.0})).unwrap();
		assert!(event.is_none());
	}

	#[test]
	fn test_decode_rejects_malformed_lifecycle_event() {
		let result = TargetEvent::decode("Target.targetDestroyed", json!({"id": 5}));
		assert!(result.is_err());
	}

	#[test]
	fn test_detached_without_target_id() {
		let event = TargetEvent::decode("Target.detachedFromTarget", json!({"sessionId": "S9"}))
			.unwrap()
			.unwrap();
		assert_eq!(event.method(), TargetEvent::DETACHED_FROM_TARGET);
		assert_eq!(
			event,
			TargetEvent::DetachedFromTarget {
				session_id: SessionId::new("S9"),
				target_id: None,
			}
		);
	}
}
