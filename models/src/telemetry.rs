//! Tracing setup shared by every `renewctl` subcommand.
//!
//! Events go to stderr. Stdout belongs to command output (reports and banners), so a report piped
//! into another tool never picks up log lines.
use serde::Deserialize;
use snafu::ResultExt;
use std::env;
use tracing::Subscriber;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, registry::LookupSpan, EnvFilter, Registry,
};

const DEFAULT_TRACING_FILTER_DIRECTIVE: LevelFilter = LevelFilter::INFO;

const TRACING_FILTER_DIRECTIVE_ENV_VAR: &str = "TRACING_FILTER_DIRECTIVE";
const LOGGING_FORMATTER_ENV_VAR: &str = "LOGGING_FORMATTER";
const LOGGING_ANSI_ENABLED_ENV_VAR: &str = "LOGGING_ANSI_ENABLED";

/// Layout of each logged event.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
    /// Newline-delimited JSON, for collection by log shippers.
    Json,
}

/// Logging settings, read from the environment before any subcommand runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    pub ansi: bool,
}

impl TelemetryConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_values(
            env::var(LOGGING_FORMATTER_ENV_VAR).ok().as_deref(),
            env::var(LOGGING_ANSI_ENABLED_ENV_VAR).ok().as_deref(),
        )
    }

    /// Builds the settings from raw variable values. Unset variables take their defaults.
    fn from_values(format: Option<&str>, ansi: Option<&str>) -> Result<Self> {
        let format = match format {
            Some(value) => serde_plain::from_str::<LogFormat>(value).context(error::LogFormatterEnvSnafu {
                env_value: value.to_string(),
            })?,
            None => LogFormat::default(),
        };
        let ansi = match ansi {
            Some(value) => value
                .to_lowercase()
                .parse::<bool>()
                .context(error::LogAnsiEnvSnafu {
                    env_value: value.to_string(),
                })?,
            None => false,
        };
        Ok(TelemetryConfig { format, ansi })
    }

    fn subscriber<S>(&self, base: S) -> Box<dyn Subscriber + Send + Sync>
    where
        S: SubscriberExt + Send + Sync + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(self.ansi);
        match self.format {
            LogFormat::Full => Box::new(base.with(layer)),
            LogFormat::Compact => Box::new(base.with(layer.compact())),
            LogFormat::Pretty => Box::new(base.with(layer.pretty())),
            LogFormat::Json => Box::new(base.with(layer.json())),
        }
    }
}

/// Installs the global subscriber. `TRACING_FILTER_DIRECTIVE` takes `EnvFilter` directives and
/// defaults to `info`.
pub fn init_telemetry_from_env() -> Result<()> {
    let config = TelemetryConfig::from_env()?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(DEFAULT_TRACING_FILTER_DIRECTIVE.into())
        .with_env_var(TRACING_FILTER_DIRECTIVE_ENV_VAR)
        .from_env_lossy();

    tracing::subscriber::set_global_default(config.subscriber(Registry::default().with(env_filter)))
        .context(error::TracingConfigurationSnafu)
}

pub mod error {
    use super::{LOGGING_ANSI_ENABLED_ENV_VAR, LOGGING_FORMATTER_ENV_VAR};
    use snafu::Snafu;
    use std::str::ParseBoolError;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum TelemetryConfigError {
        #[snafu(display("Unable to install the tracing subscriber: '{}'", source))]
        TracingConfiguration {
            source: tracing::subscriber::SetGlobalDefaultError,
        },

        #[snafu(display(
            "Unknown log format in '{}={}', expected one of full, compact, pretty or json: '{}'",
            LOGGING_FORMATTER_ENV_VAR,
            env_value,
            source
        ))]
        LogFormatterEnv {
            source: serde_plain::Error,
            env_value: String,
        },

        #[snafu(display(
            "Expected true or false in '{}={}': '{}'",
            LOGGING_ANSI_ENABLED_ENV_VAR,
            env_value,
            source
        ))]
        LogAnsiEnv {
            source: ParseBoolError,
            env_value: String,
        },
    }
}

type Result<T> = std::result::Result<T, TelemetryConfigError>;
pub use error::TelemetryConfigError;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(
            TelemetryConfig::from_values(None, None).unwrap(),
            TelemetryConfig {
                format: LogFormat::Full,
                ansi: false,
            }
        );
    }

    #[test]
    fn test_log_formats() {
        for (input, expected) in [
            ("full", LogFormat::Full),
            ("compact", LogFormat::Compact),
            ("pretty", LogFormat::Pretty),
            ("json", LogFormat::Json),
        ] {
            let config = TelemetryConfig::from_values(Some(input), None).unwrap();
            assert_eq!(config.format, expected);
        }
        assert!(matches!(
            TelemetryConfig::from_values(Some("bunyan"), None),
            Err(TelemetryConfigError::LogFormatterEnv { .. })
        ));
    }

    #[test]
    fn test_ansi_flag() {
        assert!(TelemetryConfig::from_values(None, Some("TRUE")).unwrap().ansi);
        assert!(!TelemetryConfig::from_values(None, Some("false")).unwrap().ansi);
        assert!(matches!(
            TelemetryConfig::from_values(None, Some("yes")),
            Err(TelemetryConfigError::LogAnsiEnv { .. })
        ));
    }
}
