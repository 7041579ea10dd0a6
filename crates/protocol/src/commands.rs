//! Typed params for the commands the target manager issues.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, TargetId};
use crate::target::{TargetInfo, TargetType};

/// A protocol command: params type bound to its method name and result type.
pub trait Command: Serialize {
	const METHOD: &'static str;
	type Response: DeserializeOwned;
}

/// Result of commands that return an empty object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Empty {}

/// Entry of a `Target.TargetFilter` list.
///
/// Entries are evaluated in order; the first match decides. An entry with no
/// `type` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFilterEntry {
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub target_type: Option<TargetType>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub exclude: Option<bool>,
}

impl TargetFilterEntry {
	pub fn exclude(target_type: TargetType) -> Self {
		Self {
			target_type: Some(target_type),
			exclude: Some(true),
		}
	}

	/// Catch-all entry accepting every remaining type.
	pub fn any() -> Self {
		Self::default()
	}

	/// Builds a filter excluding `excluded` and accepting everything else.
	pub fn excluding<I>(excluded: I) -> Vec<Self>
	where
		I: IntoIterator<Item = TargetType>,
	{
		excluded
			.into_iter()
			.map(Self::exclude)
			.chain(std::iter::once(Self::any()))
			.collect()
	}
}

/// `Target.setDiscoverTargets`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDiscoverTargets {
	pub discover: bool,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub filter: Vec<TargetFilterEntry>,
}

impl Command for SetDiscoverTargets {
	const METHOD: &'static str = "Target.setDiscoverTargets";
	type Response = Empty;
}

/// `Target.setAutoAttach`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAutoAttach {
	pub auto_attach: bool,
	pub wait_for_debugger_on_start: bool,
	pub flatten: bool,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub filter: Vec<TargetFilterEntry>,
}

impl Command for SetAutoAttach {
	const METHOD: &'static str = "Target.setAutoAttach";
	type Response = Empty;
}

/// `Target.detachFromTarget`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTarget {
	pub session_id: SessionId,
}

impl Command for DetachFromTarget {
	const METHOD: &'static str = "Target.detachFromTarget";
	type Response = Empty;
}

/// `Target.attachToTarget` in flattened mode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTarget {
	pub target_id: TargetId,
	pub flatten: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
	pub session_id: SessionId,
}

impl Command for AttachToTarget {
	const METHOD: &'static str = "Target.attachToTarget";
	type Response = AttachToTargetResult;
}

/// `Runtime.runIfWaitingForDebugger`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunIfWaitingForDebugger {}

impl Command for RunIfWaitingForDebugger {
	const METHOD: &'static str = "Runtime.runIfWaitingForDebugger";
	type Response = Empty;
}

/// `Target.getTargets`
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetTargets {
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub filter: Vec<TargetFilterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetsResult {
	pub target_infos: Vec<TargetInfo>,
}

impl Command for GetTargets {
	const METHOD: &'static str = "Target.getTargets";
	type Response = GetTargetsResult;
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_set_auto_attach_params() {
		let params = SetAutoAttach {
			auto_attach: true,
			wait_for_debugger_on_start: true,
			flatten: true,
			filter: TargetFilterEntry::excluding([TargetType::Tab]),
		};

		assert_eq!(
			serde_json::to_value(&params).unwrap(),
			json!({
				"autoAttach": true,
				"waitForDebuggerOnStart": true,
				"flatten": true,
				"filter": [{"type": "tab", "exclude": true}, {}]
			})
		);
	}

	#[test]
	fn test_detach_params() {
		let params = DetachFromTarget {
			session_id: SessionId::new("S1"),
		};
		assert_eq!(serde_json::to_value(&params).unwrap(), json!({"sessionId": "S1"}));
		assert_eq!(DetachFromTarget::METHOD, "Target.detachFromTarget");
	}

	#[test]
	fn test_discover_without_filter_omits_field() {
		let params = SetDiscoverTargets {
			discover: true,
			filter: Vec::new(),
		};
		assert_eq!(serde_json::to_value(&params).unwrap(), json!({"discover": true}));
	}
}
