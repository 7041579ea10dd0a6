mod endpoint;
mod list;
mod watch;

#[cfg(test)]
pub(crate) mod fake_browser;

use std::sync::Arc;

use pw_targets::{
	Connection, ConnectionLike, TargetFilter, TargetManager, TargetManagerConfig, TransportParts,
	WebSocketTransport,
};
use tokio::sync::watch as watch_channel;
use tokio::task::JoinHandle;

use crate::cli::{Cli, Commands, EndpointArgs};
use crate::config;
use crate::error::Result;

/// A live connection with a target manager attached to it.
pub(crate) struct Attached {
	pub manager: TargetManager,
	pub connection: Arc<Connection>,
	runner: JoinHandle<()>,
	closed: watch_channel::Receiver<bool>,
}

impl Attached {
	/// Wraps `parts` in a connection, starts its message loop and builds the
	/// manager on top.
	pub fn start(parts: TransportParts, config: TargetManagerConfig, filter: Option<TargetFilter>) -> Self {
		let connection = Arc::new(Connection::new(parts));
		let (closed_tx, closed) = watch_channel::channel(false);
		let runner = tokio::spawn({
			let connection = Arc::clone(&connection);
			async move {
				connection.run().await;
				closed_tx.send_replace(true);
			}
		});

		let mut builder = TargetManager::builder(connection.clone()).config(config);
		if let Some(filter) = filter {
			builder = builder.shared_filter(filter);
		}

		Self {
			manager: builder.build(),
			connection,
			runner,
			closed,
		}
	}

	pub async fn connect(args: &EndpointArgs, config: TargetManagerConfig) -> Result<Self> {
		let url = endpoint::resolve(&args.endpoint).await?;
		tracing::info!(%url, "Connecting");
		let parts = WebSocketTransport::connect(&url).await?;
		Ok(Self::start(parts, config, config::type_filter(args)))
	}

	/// Resolves once the connection's message loop has ended.
	pub async fn closed(&self) {
		let mut closed = self.closed.clone();
		if closed.wait_for(|closed| *closed).await.is_err() {
			tracing::debug!("Connection runner dropped without reporting");
		}
	}

	/// Disposes the manager and closes the connection.
	pub async fn shutdown(self, reason: &str) {
		self.manager.dispose();
		self.connection.close(reason);
		if let Err(e) = self.runner.await {
			tracing::debug!(error = %e, "Connection runner ended abnormally");
		}
	}
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let base = config::load(cli.config.as_deref())?;
	let format = cli.format;

	match cli.command {
		Commands::Watch(args) => {
			let config = config::apply_overrides(base, &args.endpoint);
			let attached = Attached::connect(&args.endpoint, config).await?;
			watch::run(attached, format, args.attached_only).await
		}
		Commands::List(args) => {
			let mut config = config::apply_overrides(base, &args.endpoint);
			config.init_timeout_ms.get_or_insert(list::DEFAULT_TIMEOUT_MS);
			let attached = Attached::connect(&args.endpoint, config).await?;
			list::run(attached, format, args.all).await
		}
	}
}
