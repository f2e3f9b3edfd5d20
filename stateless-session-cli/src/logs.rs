//!
//! Module to initialize tracing logs.
//!
//! Precedence: `RUST_LOG`, then the `--tracing-env-filter` flag, then the
//! `[logging]` section of the config file. Nothing is logged if none is set.
//!

use stateless_session::config::LoggingToml;
use tracing_subscriber::EnvFilter;

/// Build the filter from the `[logging]` config section.
fn filter_from_config(config: &LoggingToml) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::new(&config.level);
    for directive in &config.module_levels {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Pick the filter to log with, `None` if logging stays off.
fn select_filter(
    rust_log: Option<&str>,
    cli_filter: Option<&str>,
    config: Option<&LoggingToml>,
) -> anyhow::Result<Option<EnvFilter>> {
    if let Some(filter) = rust_log.and_then(|s| EnvFilter::try_new(s).ok()) {
        return Ok(Some(filter));
    }
    match (cli_filter, config) {
        (Some(filter), _) => Ok(Some(EnvFilter::try_new(filter)?)),
        (None, Some(config)) => Ok(Some(filter_from_config(config)?)),
        (None, None) => Ok(None),
    }
}

/// Initialize the tracing logger.
pub fn init_tracing_logs(
    cli_filter: Option<&str>,
    config: Option<&LoggingToml>,
) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let Some(env_filter) = select_filter(rust_log.as_deref(), cli_filter, config)? else {
        return Ok(());
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
