#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::schedule::SchedulePolicy;
use crate::core::ConfigProvider;
use crate::domain::model::Severity;
use crate::utils::error::{LogSenderError, Result};
use crate::utils::validation::{self, Validate};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVICE_NAME: &str = "log-sender";
pub const MAX_GRACE_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: Severity,
    pub verbose: bool,
    pub service_name: String,
    pub log_file: Option<PathBuf>,
    pub loki: Option<LokiConfig>,
}

#[derive(Clone, PartialEq)]
pub struct LokiConfig {
    pub host: String,
    pub basic_auth: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl fmt::Debug for LokiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LokiConfig")
            .field("host", &self.host)
            .field("basic_auth", &self.basic_auth.as_ref().map(|_| "***"))
            .field("labels", &self.labels)
            .finish()
    }
}

impl LokiConfig {
    pub fn new(host: impl Into<String>, basic_auth: Option<String>, service_name: &str) -> Self {
        Self {
            host: host.into(),
            basic_auth,
            labels: BTreeMap::from([("service_name".to_string(), service_name.to_string())]),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Severity::Info,
            verbose: false,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_file: None,
            loki: None,
        }
    }
}

impl LoggingConfig {
    /// Reads `LOG_LEVEL`, `LOG_SERVICE_NAME`, `LOG_FILE`, `GRAFANA_HOST` and
    /// `GRAFANA_BASICAUTH`. A missing host only disables the Loki sink.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let level = match non_empty("LOG_LEVEL") {
            Some(raw) => raw
                .parse::<Severity>()
                .map_err(|reason| LogSenderError::InvalidConfigValueError {
                    field: "LOG_LEVEL".to_string(),
                    value: raw.clone(),
                    reason,
                })?,
            None => Severity::Info,
        };

        let service_name =
            non_empty("LOG_SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let loki = non_empty("GRAFANA_HOST")
            .map(|host| LokiConfig::new(host, non_empty("GRAFANA_BASICAUTH"), &service_name));

        Ok(Self {
            level,
            verbose: false,
            service_name,
            log_file: non_empty("LOG_FILE").map(PathBuf::from),
            loki,
        })
    }

    /// Fields attached to every structured record (JSON file and Loki).
    pub fn default_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("service".to_string(), self.service_name.clone().into());
        fields
    }

    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> String {
        if self.verbose {
            format!("{},log_sender=debug", self.level)
        } else {
            self.level.to_string()
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("logging.service_name", &self.service_name)?;
        if let Some(loki) = &self.loki {
            validation::validate_url("loki.host", &loki.host)?;
        }
        Ok(())
    }
}

/// Everything the binary needs, whichever source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub schedule: SchedulePolicy,
    pub grace_period: Duration,
    pub logging: LoggingConfig,
}

impl ResolvedConfig {
    pub fn from_provider<C: ConfigProvider + ?Sized>(provider: &C) -> Result<Self> {
        let resolved = Self {
            schedule: provider.schedule()?,
            grace_period: provider.grace_period(),
            logging: provider.logging()?,
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

impl Validate for ResolvedConfig {
    fn validate(&self) -> Result<()> {
        match self.schedule {
            SchedulePolicy::Fixed { interval_ms } => {
                validation::validate_positive_number("emitter.interval_ms", interval_ms, 1)?
            }
            SchedulePolicy::Randomized {
                min_delay_ms,
                max_delay_ms,
            } => validation::validate_delay_bounds("emitter", min_delay_ms, max_delay_ms)?,
        }

        validation::validate_range(
            "emitter.grace_ms",
            self.grace_period.as_millis() as u64,
            0,
            MAX_GRACE_MS,
        )?;

        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = LoggingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LoggingConfig::default());
        assert!(config.loki.is_none());
    }

    #[test]
    fn test_grafana_variables_enable_loki() {
        let config = LoggingConfig::from_lookup(lookup(&[
            ("LOG_LEVEL", "warn"),
            ("GRAFANA_HOST", "https://logs.example.com"),
            ("GRAFANA_BASICAUTH", "42:token"),
            ("LOG_SERVICE_NAME", "issue-tester"),
        ]))
        .unwrap();

        assert_eq!(config.level, Severity::Warn);
        let loki = config.loki.as_ref().unwrap();
        assert_eq!(loki.host, "https://logs.example.com");
        assert_eq!(loki.basic_auth.as_deref(), Some("42:token"));
        assert_eq!(loki.labels["service_name"], "issue-tester");
        assert!(!format!("{:?}", loki).contains("token"));
        assert_eq!(config.default_fields()["service"], "issue-tester");
    }

    #[test]
    fn test_blank_host_disables_loki_only() {
        let config = LoggingConfig::from_lookup(lookup(&[
            ("GRAFANA_HOST", "  "),
            ("LOG_FILE", "/tmp/log-sender.jsonl"),
        ]))
        .unwrap();
        assert!(config.loki.is_none());
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/log-sender.jsonl")));
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let err = LoggingConfig::from_lookup(lookup(&[("LOG_LEVEL", "chatty")])).unwrap_err();
        assert!(matches!(err, LogSenderError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_verbose_filter_directive() {
        let mut config = LoggingConfig::default();
        assert_eq!(config.filter_directive(), "info");
        config.verbose = true;
        assert_eq!(config.filter_directive(), "info,log_sender=debug");
    }

    #[test]
    fn test_resolved_config_validation() {
        let valid = ResolvedConfig {
            schedule: SchedulePolicy::default(),
            grace_period: Duration::from_millis(200),
            logging: LoggingConfig::default(),
        };
        assert!(valid.validate().is_ok());

        let inverted = ResolvedConfig {
            schedule: SchedulePolicy::Randomized {
                min_delay_ms: 5_000,
                max_delay_ms: 1_000,
            },
            ..valid.clone()
        };
        assert!(inverted.validate().is_err());

        let zero_interval = ResolvedConfig {
            schedule: SchedulePolicy::Fixed { interval_ms: 0 },
            ..valid.clone()
        };
        assert!(zero_interval.validate().is_err());

        let mut bad_host = valid;
        bad_host.logging.loki = Some(LokiConfig::new("localhost:3100", None, "x"));
        assert!(bad_host.validate().is_err());
    }
}
