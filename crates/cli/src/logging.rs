use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = warnings only, transport chatter off
	// 1 (-v) = info for the CLI and manager, warn for the runtime
	// 2 (-vv) = debug for everything
	// 3+ (-vvv) = trace, including every published notification
	let filter = match verbosity {
		0 => "warn,pw_targets_runtime=error",
		1 => "info,pw_targets_runtime=warn",
		2 => "debug",
		_ => "trace",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
