//! pw-targets runtime - CDP connection, session routing, and transport.
//!
//! This crate is the transport collaborator of the target manager:
//!
//! - **Transport**: decoded JSON in and out, over WebSocket or in-memory channels
//! - **Connection**: request/response correlation and per-scope event fan-out
//! - **Sessions**: flattened CDP sessions created from `Target.attachedToTarget`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  pw-targets  │  Target manager (registry, attach state machine)
//! └──────┬───────┘
//!        │ uses ConnectionLike
//! ┌──────▼───────┐
//! │  runtime     │  This crate
//! │  ┌────────┐  │
//! │  │ Conn   │  │  id correlation, session table, event streams
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket / in-memory
//! │  └────────┘  │
//! └──────────────┘
//! ```
//!
//! The manager only sees [`ConnectionLike`], so tests can drive it with a
//! scripted connection instead of a browser.

pub mod connection;
pub mod error;
pub mod event;
pub mod session;
pub mod transport;

pub use connection::{
	Connection, ConnectionLike, ErrorPayload, EventMessage, Message, Request, Response, Scope,
	send_command,
};
pub use error::{Error, Result};
pub use event::{DeliveryCount, Event, EventSender, EventStream, event_channel};
pub use session::Session;
pub use transport::{RemoteEndpoint, TransportParts, WebSocketTransport};
