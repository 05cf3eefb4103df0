use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::Config;

/// Initialize structured logging based on configuration.
///
/// Supports both JSON (production) and pretty (development) formats.
pub fn init_logging(config: &Config) -> anyhow::Result<()> {
    let Some(log_level) = level_from_config(&config.log_level) else {
        anyhow::bail!(
            "unknown LOG_LEVEL {:?}, expected trace/debug/info/warn/error",
            config.log_level
        );
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_format.as_str() == "json" {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_line_number(true)
            .with_file(true);
        registry.with(json_layer).init();
    } else {
        let pretty_layer = fmt::layer().with_target(true);
        registry.with(pretty_layer).init();
    }

    Ok(())
}

/// Map the `LOG_LEVEL` setting to a tracing level, `None` when it names no
/// known level.
fn level_from_config(value: &str) -> Option<Level> {
    let level = match value.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => return None,
    };
    Some(level)
}
