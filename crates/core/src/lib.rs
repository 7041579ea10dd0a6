//! pw-targets - target discovery and session attachment for CDP clients.
//!
//! [`TargetManager`] keeps a consistent view of every debuggable unit a
//! browser exposes (pages, iframes, workers, the browser itself) while
//! `Target.*` events race against the commands the client issues:
//!
//! - discovered snapshots and attached handles live in the [`TargetRegistry`]
//! - auto-attached sessions are subscribed, intercepted and announced in order
//! - [`TargetManager::initialize`] resolves once every target that existed at
//!   connect time was attached, ignored or destroyed
//!
//! Callers supply a [`TargetFactory`] to build their own handle types and
//! observe changes through [`TargetNotification`]s.

pub mod config;
pub mod dispatcher;
pub mod gate;
pub mod interceptor;
mod locks;
pub mod manager;
pub mod notification;
pub mod registry;
pub mod target;

#[cfg(test)]
pub(crate) mod testing;

pub use config::TargetManagerConfig;
pub use gate::GatePhase;
pub use interceptor::InterceptorId;
pub use manager::{TargetManager, TargetManagerBuilder};
pub use notification::TargetNotification;
pub use pw_targets_protocol::{SessionId, TargetId, TargetInfo, TargetType};
pub use pw_targets_runtime::{
	Connection, ConnectionLike, Error, RemoteEndpoint, Result, Scope, Session, TransportParts,
	WebSocketTransport,
};
pub use registry::TargetRegistry;
pub use target::{BasicTarget, BasicTargetFactory, Target, TargetFactory, TargetFilter, only_types};
