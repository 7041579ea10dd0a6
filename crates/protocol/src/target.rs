//! Target metadata as reported by the browser.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::TargetId;

/// Kind of debuggable unit.
///
/// Unknown kinds are preserved in [`TargetType::Other`] so newer browsers do
/// not break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetType {
	Page,
	BackgroundPage,
	ServiceWorker,
	SharedWorker,
	Worker,
	Browser,
	Iframe,
	Tab,
	Webview,
	Other(String),
}

impl TargetType {
	/// Returns the protocol spelling (e.g. `"service_worker"`).
	pub fn as_str(&self) -> &str {
		match self {
			TargetType::Page => "page",
			TargetType::BackgroundPage => "background_page",
			TargetType::ServiceWorker => "service_worker",
			TargetType::SharedWorker => "shared_worker",
			TargetType::Worker => "worker",
			TargetType::Browser => "browser",
			TargetType::Iframe => "iframe",
			TargetType::Tab => "tab",
			TargetType::Webview => "webview",
			TargetType::Other(other) => other,
		}
	}
}

impl From<&str> for TargetType {
	fn from(value: &str) -> Self {
		match value {
			"page" => TargetType::Page,
			"background_page" => TargetType::BackgroundPage,
			"service_worker" => TargetType::ServiceWorker,
			"shared_worker" => TargetType::SharedWorker,
			"worker" => TargetType::Worker,
			"browser" => TargetType::Browser,
			"iframe" => TargetType::Iframe,
			"tab" => TargetType::Tab,
			"webview" => TargetType::Webview,
			other => TargetType::Other(other.to_string()),
		}
	}
}

impl From<String> for TargetType {
	fn from(value: String) -> Self {
		TargetType::from(value.as_str())
	}
}

impl From<TargetType> for String {
	fn from(value: TargetType) -> Self {
		match value {
			TargetType::Other(other) => other,
			known => known.as_str().to_string(),
		}
	}
}

impl fmt::Display for TargetType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Immutable snapshot of a target's metadata.
///
/// A new snapshot replaces the previous one wholesale on every
/// `Target.targetCreated` / `Target.targetInfoChanged`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	pub target_id: TargetId,
	#[serde(rename = "type")]
	pub target_type: TargetType,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	/// Whether some client is attached to the target.
	#[serde(default)]
	pub attached: bool,
	/// Target that opened this one (popups).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub opener_id: Option<TargetId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub browser_context_id: Option<String>,
	/// Finer-grained kind, e.g. `"prerender"` for prerendered pages.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subtype: Option<String>,
}

impl TargetInfo {
	/// Creates a minimal snapshot, mostly useful in tests.
	pub fn new(target_id: impl Into<TargetId>, target_type: TargetType) -> Self {
		Self {
			target_id: target_id.into(),
			target_type,
			title: String::new(),
			url: String::new(),
			attached: false,
			opener_id: None,
			browser_context_id: None,
			subtype: None,
		}
	}

	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	pub fn with_attached(mut self, attached: bool) -> Self {
		self.attached = attached;
		self
	}

	pub fn is_browser(&self) -> bool {
		self.target_type == TargetType::Browser
	}

	pub fn is_service_worker(&self) -> bool {
		self.target_type == TargetType::ServiceWorker
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_target_info_deserialization() {
		let json = r#"{
			"targetId": "E1A2",
			"type": "service_worker",
			"title": "sw.js",
			"url": "https://example.com/sw.js",
			"attached": false,
			"browserContextId": "CTX",
			"canAccessOpener": false
		}"#;
		let info: TargetInfo = serde_json::from_str(json).unwrap();

		assert_eq!(info.target_id.as_str(), "E1A2");
		assert_eq!(info.target_type, TargetType::ServiceWorker);
		assert!(info.is_service_worker());
		assert_eq!(info.browser_context_id.as_deref(), Some("CTX"));
		assert!(info.opener_id.is_none());
	}

	#[test]
	fn test_unknown_target_type_is_preserved() {
		let ty: TargetType = serde_json::from_str("\"auction_worklet\"").unwrap();
		assert_eq!(ty, TargetType::Other("auction_worklet".to_string()));
		assert_eq!(serde_json::to_value(&ty).unwrap(), "auction_worklet");
	}

	#[test]
	fn test_known_target_types_use_protocol_spelling() {
		assert_eq!(serde_json::to_value(TargetType::BackgroundPage).unwrap(), "background_page");
		assert_eq!(TargetType::from("shared_worker"), TargetType::SharedWorker);
		assert_eq!(TargetType::Tab.to_string(), "tab");
	}
}
