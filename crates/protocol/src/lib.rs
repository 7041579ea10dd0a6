//! Wire types for the Chrome DevTools Protocol `Target` domain.
//!
//! Everything here is plain data: identifiers, the [`TargetInfo`] snapshot,
//! the five lifecycle events the target manager consumes and the handful of
//! commands it issues. Framing and request correlation live in
//! `pw-targets-runtime`.
//!
//! # Main Types
//!
//! - [`TargetId`] / [`SessionId`] - cheap-to-clone string identifiers
//! - [`TargetInfo`] / [`TargetType`] - target metadata snapshot
//! - [`TargetEvent`] - decoded `Target.*` lifecycle events
//! - [`Command`] - typed command params with their method name

pub mod commands;
pub mod events;
pub mod ids;
pub mod target;

pub use commands::{
	AttachToTarget, AttachToTargetResult, Command, DetachFromTarget, Empty, GetTargets, GetTargetsResult,
	RunIfWaitingForDebugger, SetAutoAttach, SetDiscoverTargets, TargetFilterEntry,
};
pub use events::TargetEvent;
pub use ids::{SessionId, TargetId};
pub use target::{TargetInfo, TargetType};
