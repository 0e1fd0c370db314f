use serde::Deserialize;
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum LogType {
    Stdout,
    Stderr,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Log {
    pub level: String,
    #[serde(default)]
    pub structured: bool,
    pub backend: LogType,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            structured: false,
            backend: LogType::Stderr,
        }
    }
}

/// setup log from an optional environment filter and the config file
///
/// if the environment filter is present, then the configured level is not used
pub fn setup(
    env_filter: Result<EnvFilter, tracing_subscriber::filter::FromEnvError>,
    config: &Option<Log>,
) {
    let defaults = Log::default();
    let log = config.as_ref().unwrap_or(&defaults);
    let filter = env_filter.unwrap_or_else(|_| EnvFilter::new(&log.level));

    let builder = Subscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .with_level(true)
        .with_env_filter(filter);

    // a second setup in the same process keeps the first subscriber
    let result = match (log.structured, log.backend) {
        (true, LogType::Stdout) => builder.json().with_writer(std::io::stdout).try_init(),
        (true, LogType::Stderr) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, LogType::Stdout) => builder.with_ansi(true).with_writer(std::io::stdout).try_init(),
        (false, LogType::Stderr) => builder.with_ansi(true).with_writer(std::io::stderr).try_init(),
    };
    if let Err(err) = result {
        tracing::debug!(reason = %err, "tracing subscriber already installed");
    }
}
