//! Transports carrying decoded JSON messages.
//!
//! A transport is reduced to a pair of unbounded channels: the connection
//! pushes requests into [`TransportParts::outbound`] and reads responses and
//! events from [`TransportParts::inbound`]. [`WebSocketTransport`] wires
//! those channels to a DevTools WebSocket; [`TransportParts::pair`] wires
//! them to an in-memory [`RemoteEndpoint`].

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{Error, Result};

/// Connection-side halves of a transport.
pub struct TransportParts {
	pub outbound: mpsc::UnboundedSender<Value>,
	pub inbound: mpsc::UnboundedReceiver<Value>,
}

/// Browser-side halves of an in-memory transport.
pub struct RemoteEndpoint {
	/// Requests written by the connection.
	pub requests: mpsc::UnboundedReceiver<Value>,
	/// Responses and events to deliver to the connection.
	pub messages: mpsc::UnboundedSender<Value>,
}

impl TransportParts {
	/// Creates an in-memory transport and its remote end.
	pub fn pair() -> (TransportParts, RemoteEndpoint) {
		let (outbound, requests) = mpsc::unbounded_channel();
		let (messages, inbound) = mpsc::unbounded_channel();
		(TransportParts { outbound, inbound }, RemoteEndpoint { requests, messages })
	}
}

/// DevTools WebSocket transport (`ws://host:port/devtools/browser/<id>`).
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Connects to `url` and spawns the reader and writer tasks.
	///
	/// The inbound channel closes when the socket closes or fails, which
	/// ends [`Connection::run`](crate::Connection::run).
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let (socket, _response) = tokio_tungstenite::connect_async(url)
			.await
			.map_err(|e| Error::TransportError(format!("WebSocket connect to {url} failed: {e}")))?;
		tracing::debug!(url, "WebSocket connected");

		let (mut sink, mut stream) = socket.split();
		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
		let (inbound_tx, inbound) = mpsc::unbounded_channel::<Value>();

		tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				let text = match serde_json::to_string(&message) {
					Ok(text) => text,
					Err(e) => {
						tracing::error!(error = %e, "Failed to serialize outbound message");
						continue;
					}
				};
				if let Err(e) = sink.send(WsMessage::Text(text)).await {
					tracing::error!(error = %e, "Transport write error");
					break;
				}
			}
			let _ = sink.close().await;
		});

		tokio::spawn(async move {
			while let Some(frame) = stream.next().await {
				let parsed = match frame {
					Ok(WsMessage::Text(text)) => serde_json::from_str::<Value>(&text),
					Ok(WsMessage::Binary(bytes)) => serde_json::from_slice::<Value>(&bytes),
					Ok(WsMessage::Close(frame)) => {
						tracing::debug!(?frame, "WebSocket closed by peer");
						break;
					}
					Ok(_) => continue,
					Err(e) => {
						tracing::error!(error = %e, "Transport read error");
						break;
					}
				};
				match parsed {
					Ok(value) => {
						if inbound_tx.send(value).is_err() {
							break;
						}
					}
					Err(e) => tracing::error!(error = %e, "Failed to decode inbound frame"),
				}
			}
		});

		Ok(TransportParts { outbound, inbound })
	}
}
