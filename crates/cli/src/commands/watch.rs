use std::future::Future;
use std::io::Write;

use pw_targets::{TargetManager, TargetNotification};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::Attached;
use crate::error::Result;
use crate::output::{self, OutputFormat};

pub async fn run(attached: Attached, format: OutputFormat, attached_only: bool) -> Result<()> {
	let interrupted = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::warn!(error = %e, "Cannot listen for Ctrl-C; stop with the connection instead");
			std::future::pending::<()>().await;
		}
	};

	let result = stream(&attached, &mut std::io::stdout(), format, attached_only, interrupted).await;
	attached.shutdown("watch finished").await;
	result
}

/// Prints notifications until `stop` resolves, the connection ends or
/// initialization fails.
pub(crate) async fn stream(
	attached: &Attached,
	out: &mut impl Write,
	format: OutputFormat,
	attached_only: bool,
	stop: impl Future<Output = ()>,
) -> Result<()> {
	let manager: &TargetManager = &attached.manager;
	let mut notifications = manager.subscribe();
	let init = manager.initialize();
	tokio::pin!(init, stop);
	let mut initializing = true;

	loop {
		tokio::select! {
			biased;

			received = notifications.recv() => match received {
				Ok(notification) => write(out, format, attached_only, &notification)?,
				Err(RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "Output fell behind; notifications dropped");
				}
				Err(RecvError::Closed) => return Ok(()),
			},
			result = &mut init, if initializing => {
				initializing = false;
				result?;
				tracing::info!(attached = manager.attached_targets().len(), "Initialization complete");
			}
			_ = &mut stop => {
				tracing::info!("Interrupted");
				return Ok(());
			}
			_ = attached.closed() => {
				tracing::info!("Connection closed");
				return flush_pending(&mut notifications, out, format, attached_only);
			}
		}
	}
}

fn write(out: &mut impl Write, format: OutputFormat, attached_only: bool, notification: &TargetNotification) -> Result<()> {
	if attached_only && matches!(notification, TargetNotification::Discovered(_)) {
		return Ok(());
	}
	output::write_notification(out, format, notification)
}

/// Writes notifications already queued when the connection ended.
fn flush_pending(
	notifications: &mut broadcast::Receiver<TargetNotification>,
	out: &mut impl Write,
	format: OutputFormat,
	attached_only: bool,
) -> Result<()> {
	loop {
		match notifications.try_recv() {
			Ok(notification) => write(out, format, attached_only, &notification)?,
			Err(TryRecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Output fell behind; notifications dropped");
			}
			Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
		}
	}
}
