//! Notifications published by the manager.

use std::sync::Arc;

use pw_targets_protocol::{TargetId, TargetInfo};

use crate::target::Target;

/// Lifecycle notification broadcast to [`TargetManager::subscribe`](crate::TargetManager::subscribe) receivers.
#[derive(Debug, Clone)]
pub enum TargetNotification {
	/// A target was created or re-announced (`Target.targetCreated`).
	Discovered(TargetInfo),
	/// A new handle was attached and passed every interceptor.
	Available(Arc<dyn Target>),
	/// An attached target reported a new snapshot.
	Changed { target: Arc<dyn Target>, info: TargetInfo },
	/// The last session for a target went away, or the target was destroyed.
	Gone { target: Arc<dyn Target>, info: TargetInfo },
}

impl TargetNotification {
	pub fn target_id(&self) -> &TargetId {
		match self {
			Self::Discovered(info) => &info.target_id,
			Self::Available(target) => target.target_id(),
			Self::Changed { target, .. } | Self::Gone { target, .. } => target.target_id(),
		}
	}

	/// Short lowercase name used in logs and CLI output.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Discovered(_) => "discovered",
			Self::Available(_) => "available",
			Self::Changed { .. } => "changed",
			Self::Gone { .. } => "gone",
		}
	}

	/// The snapshot carried by the notification, or the handle's current one.
	pub fn info(&self) -> TargetInfo {
		match self {
			Self::Discovered(info) | Self::Changed { info, .. } | Self::Gone { info, .. } => info.clone(),
			Self::Available(target) => target.info(),
		}
	}
}
