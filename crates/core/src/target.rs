//! Target handles and the collaborators that build and filter them.
//!
//! A [`Target`] is created exactly once per attached target id by the
//! [`TargetFactory`] supplied to the manager. Handles are shared as
//! `Arc<dyn Target>` and can be downcast back to the concrete type:
//!
//! ```ignore
//! let page = target.downcast_arc::<MyPage>().ok();
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use downcast_rs::{DowncastSync, impl_downcast};
use parking_lot::RwLock;
use pw_targets_protocol::{TargetId, TargetInfo, TargetType};
use pw_targets_runtime::{Result, Session};

/// A debuggable unit tracked by the manager.
pub trait Target: DowncastSync {
	fn target_id(&self) -> &TargetId;

	/// Returns a copy of the most recent snapshot pushed into this handle.
	fn info(&self) -> TargetInfo;

	/// Session bound at creation; `None` for the browser target.
	fn session(&self) -> Option<Arc<Session>>;

	/// Replaces the snapshot wholesale on `Target.targetInfoChanged`.
	fn update_info(&self, info: TargetInfo);

	/// Called once when the last session for this target goes away.
	fn on_gone(&self) {}

	fn target_type(&self) -> TargetType {
		self.info().target_type
	}
}
impl_downcast!(sync Target);

impl fmt::Debug for dyn Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Target")
			.field("target_id", self.target_id())
			.field("session", &self.session().map(|s| s.id().clone()))
			.finish()
	}
}

/// Minimal [`Target`] holding the snapshot and the session.
pub struct BasicTarget {
	target_id: TargetId,
	info: RwLock<TargetInfo>,
	session: Option<Arc<Session>>,
	gone: AtomicBool,
}

impl BasicTarget {
	pub fn new(info: TargetInfo, session: Option<Arc<Session>>) -> Self {
		Self {
			target_id: info.target_id.clone(),
			info: RwLock::new(info),
			session,
			gone: AtomicBool::new(false),
		}
	}

	/// Returns `true` once the manager reported this target gone.
	pub fn is_gone(&self) -> bool {
		self.gone.load(Ordering::SeqCst)
	}

	pub fn url(&self) -> String {
		self.info.read().url.clone()
	}
}

impl Target for BasicTarget {
	fn target_id(&self) -> &TargetId {
		&self.target_id
	}

	fn info(&self) -> TargetInfo {
		self.info.read().clone()
	}

	fn session(&self) -> Option<Arc<Session>> {
		self.session.clone()
	}

	fn update_info(&self, info: TargetInfo) {
		*self.info.write() = info;
	}

	fn on_gone(&self) {
		self.gone.store(true, Ordering::SeqCst);
	}

	fn target_type(&self) -> TargetType {
		self.info.read().target_type.clone()
	}
}

impl fmt::Debug for BasicTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BasicTarget")
			.field("target_id", &self.target_id)
			.field("info", &*self.info.read())
			.field("gone", &self.is_gone())
			.finish()
	}
}

/// Builds a [`Target`] for a newly attached (or browser) target.
///
/// Closures of the shape `Fn(TargetInfo, Option<Arc<Session>>) -> Result<Arc<dyn Target>>`
/// implement this trait.
pub trait TargetFactory: Send + Sync {
	fn create_target(&self, info: TargetInfo, session: Option<Arc<Session>>) -> Result<Arc<dyn Target>>;
}

impl<F> TargetFactory for F
where
	F: Fn(TargetInfo, Option<Arc<Session>>) -> Result<Arc<dyn Target>> + Send + Sync,
{
	fn create_target(&self, info: TargetInfo, session: Option<Arc<Session>>) -> Result<Arc<dyn Target>> {
		self(info, session)
	}
}

/// Factory producing [`BasicTarget`] handles.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTargetFactory;

impl TargetFactory for BasicTargetFactory {
	fn create_target(&self, info: TargetInfo, session: Option<Arc<Session>>) -> Result<Arc<dyn Target>> {
		Ok(Arc::new(BasicTarget::new(info, session)))
	}
}

/// Predicate deciding whether a target is tracked at all.
pub type TargetFilter = Arc<dyn Fn(&TargetInfo) -> bool + Send + Sync>;

/// Builds a [`TargetFilter`] accepting only the listed types.
pub fn only_types(types: impl IntoIterator<Item = TargetType>) -> TargetFilter {
	let types: Vec<TargetType> = types.into_iter().collect();
	Arc::new(move |info: &TargetInfo| types.contains(&info.target_type))
}
