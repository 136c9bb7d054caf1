//! Configuration for the load test.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line flags (only `--base-url`)
//! 2. Environment variables (prefixed with `RESTFUL__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `RESTFUL__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `RESTFUL__BASE_URL=http://localhost:8080/objects` sets the target collection
//! - `RESTFUL__USERS=50` sets the number of concurrent users
//! - `RESTFUL__LOGGING__LEVEL=debug` sets the log level
//!
//! # YAML Configuration File
//!
//! ```yaml
//! base_url: http://localhost:8080/objects
//! users: 50
//! duration: 1m
//! feeder: data/restful.json
//! logging:
//!   level: debug
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "RESTFUL__";

/// The public sample API targeted by default.
pub const DEFAULT_BASE_URL: &str = "https://api.restful-api.dev/objects";

/// Top-level configuration of a load test run.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// URL of the objects collection.
    ///
    /// Objects are created with `POST {base_url}` and addressed as `{base_url}/{id}`.
    ///
    /// # Default
    ///
    /// `https://api.restful-api.dev/objects`
    ///
    /// # Environment Variable
    ///
    /// `RESTFUL__BASE_URL`
    pub base_url: String,

    /// Number of logical users kept in flight concurrently.
    ///
    /// # Default
    ///
    /// `10`
    pub users: usize,

    /// How long new users are started for.
    ///
    /// Users still in flight when the duration elapses run to completion.
    ///
    /// # Default
    ///
    /// `5s`
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Timeout for a single request, including reading the response body.
    ///
    /// # Default
    ///
    /// `60s`
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Path to a JSON file containing an array of `{"name": ..., "data": {...}}` records.
    ///
    /// # Default
    ///
    /// `None` (uses the built-in sample dataset)
    pub feeder: Option<PathBuf>,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            users: 10,
            duration: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
            feeder: None,
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, the optional YAML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, the report is written to stdout.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `RESTFUL__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `RESTFUL__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// One JSON object per line.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert_eq!(config.users, 10);
            assert_eq!(config.duration, Duration::from_secs(5));
            assert_eq!(config.request_timeout, Duration::from_secs(60));
            assert_eq!(config.feeder, None);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RESTFUL__BASE_URL", "http://localhost:8080/objects");
            jail.set_env("RESTFUL__USERS", "50");
            jail.set_env("RESTFUL__DURATION", "1m 30s");
            jail.set_env("RESTFUL__FEEDER", "data/products.json");
            jail.set_env("RESTFUL__LOGGING__LEVEL", "debug");
            jail.set_env("RESTFUL__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            assert_eq!(config.base_url, "http://localhost:8080/objects");
            assert_eq!(config.users, 50);
            assert_eq!(config.duration, Duration::from_secs(90));
            assert_eq!(config.feeder, Some(PathBuf::from("data/products.json")));
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            base_url: http://staging.internal/objects
            users: 3
            duration: 250ms
            request_timeout: 2s
            logging:
                level: warn
                format: simplified
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.base_url, "http://staging.internal/objects");
            assert_eq!(config.users, 3);
            assert_eq!(config.duration, Duration::from_millis(250));
            assert_eq!(config.request_timeout, Duration::from_secs(2));
            assert_eq!(config.logging.level, LevelFilter::WARN);
            assert_eq!(config.logging.format, LogFormat::Simplified);

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(b"users: 3\n").unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("RESTFUL__USERS", "7");

            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.users, 7);

            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_log_format() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RESTFUL__LOGGING__FORMAT", "fancy");
            assert!(Config::load(None).is_err());
            Ok(())
        });
    }
}
