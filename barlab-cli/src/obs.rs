//! Logging setup for the CLI.

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides `--log-level`.
pub const LOG_ENV: &str = "BARLAB_LOG";

/// Output format of the log lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format '{other}' (expected text or json)"),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `BARLAB_LOG` takes precedence over `log_level` and accepts any `EnvFilter`
/// directive, e.g. `barlab_core=debug,info`.
pub fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let directive = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}
