//! Endpoint resolution: WebSocket URLs pass through, HTTP endpoints are
//! resolved through `/json/version`.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::error::{CliError, Result};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EndpointKind {
	WebSocket,
	Http,
}

pub(crate) fn classify(endpoint: &str) -> Result<EndpointKind> {
	let lower = endpoint.to_ascii_lowercase();
	if lower.starts_with("ws://") || lower.starts_with("wss://") {
		Ok(EndpointKind::WebSocket)
	} else if lower.starts_with("http://") || lower.starts_with("https://") {
		Ok(EndpointKind::Http)
	} else {
		Err(CliError::InvalidEndpoint(endpoint.to_string()))
	}
}

/// Returns the browser WebSocket URL for `endpoint`.
pub async fn resolve(endpoint: &str) -> Result<String> {
	match classify(endpoint)? {
		EndpointKind::WebSocket => Ok(endpoint.to_string()),
		EndpointKind::Http => fetch_debugger_url(endpoint).await.map_err(|source| CliError::Endpoint {
			url: endpoint.to_string(),
			source,
		}),
	}
}

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Response from the DevTools `/json/version` endpoint.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
	web_socket_debugger_url: String,
}

async fn fetch_debugger_url(endpoint: &str) -> anyhow::Result<String> {
	let url = version_url(endpoint);
	tracing::debug!(%url, "Resolving browser WebSocket URL");

	let client = reqwest::Client::builder()
		.timeout(LOOKUP_TIMEOUT)
		.build()
		.context("building HTTP client")?;
	let version: VersionInfo = client
		.get(&url)
		.send()
		.await
		.with_context(|| format!("GET {url}"))?
		.error_for_status()?
		.json()
		.await
		.context("reading /json/version")?;

	Ok(version.web_socket_debugger_url)
}

fn version_url(endpoint: &str) -> String {
	format!("{}/json/version", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classify_schemes() {
		assert_eq!(
			classify("ws://127.0.0.1:9222/devtools/browser/abc").unwrap(),
			EndpointKind::WebSocket
		);
		assert_eq!(classify("WSS://example.com/devtools/browser/abc").unwrap(), EndpointKind::WebSocket);
		assert_eq!(classify("http://localhost:9222").unwrap(), EndpointKind::Http);
		assert_eq!(classify("https://localhost:9222/").unwrap(), EndpointKind::Http);
	}

	#[test]
	fn classify_rejects_other_schemes() {
		assert!(matches!(classify("localhost:9222"), Err(CliError::InvalidEndpoint(_))));
		assert!(matches!(classify("ftp://host"), Err(CliError::InvalidEndpoint(_))));
	}

	#[test]
	fn version_url_strips_trailing_slash() {
		assert_eq!(version_url("http://localhost:9222/"), "http://localhost:9222/json/version");
		assert_eq!(version_url("http://localhost:9222"), "http://localhost:9222/json/version");
	}

	#[test]
	fn version_payload() {
		let version: VersionInfo = serde_json::from_str(
			r#"{"Browser":"Chrome/120.0","webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/browser/abc"}"#,
		)
		.unwrap();
		assert_eq!(version.web_socket_debugger_url, "ws://127.0.0.1:9222/devtools/browser/abc");
	}

	#[tokio::test]
	async fn websocket_endpoint_passes_through() {
		let url = "ws://127.0.0.1:9222/devtools/browser/abc";
		assert_eq!(resolve(url).await.unwrap(), url);
	}
}
