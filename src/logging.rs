use std::sync::Once;

/// Logger setup for the renderer and its binaries.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Filter directives in `env_logger` syntax. Falls back to `RUST_LOG`,
    /// then to `info`.
    pub env_filter: Option<String>,
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
        }
    }
}

static INIT: Once = Once::new();

/// Install the global logger. Later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(log::LevelFilter::Info)
            .filter_module("wgpu_core", log::LevelFilter::Warn)
            .filter_module("wgpu_hal", log::LevelFilter::Warn)
            .filter_module("naga", log::LevelFilter::Warn);

        let filter = config
            .env_filter
            .or_else(|| std::env::var("RUST_LOG").ok());
        if let Some(filter) = filter {
            builder.parse_filters(&filter);
        }

        // A test harness may already have installed a logger.
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
