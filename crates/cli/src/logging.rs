use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Diagnostic logging on stderr. Operator-facing progress goes through the console
/// sink instead, so the default level keeps the engine quiet.
pub fn init_logging(verbosity: u8) {
	// 0 = errors only, engine traces off (the console already reports progress)
	// 1 (-v) = engine info, webdriver client noise at warn
	// 2+ (-vv) = debug for everything
	let filter = match verbosity {
		0 => "error,stepwise=off",
		1 => "info,fantoccini=warn,hyper=warn,hyper_util=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr.with_max_level(tracing::Level::TRACE))
		.with_target(verbosity > 1)
		.with_level(true)
		.compact()
		.init();
}
