use crate::config::{LoggingConfig, LokiConfig};
use crate::core::schedule::{SchedulePolicy, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS};
use crate::core::ConfigProvider;
use crate::domain::model::Severity;
use crate::utils::error::{LogSenderError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub emitter: EmitterSection,
    #[serde(default)]
    pub logging: LoggingSection,
    pub loki: Option<LokiSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    Fixed,
    Randomized,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmitterSection {
    pub mode: Option<ScheduleMode>,
    pub interval_ms: Option<u64>,
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub grace_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
    pub service_name: Option<String>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LokiSection {
    pub host: Option<String>,
    pub basic_auth: Option<String>,
    pub labels: Option<BTreeMap<String, String>>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LogSenderError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| LogSenderError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GRAFANA_HOST})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    fn grace_ms(&self) -> u64 {
        self.emitter.grace_ms.unwrap_or(200)
    }
}

/// A value is usable when it is non-blank and every placeholder was resolved.
fn resolved(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !ENV_VAR_PATTERN.is_match(v))
        .map(str::to_string)
}

impl ConfigProvider for TomlConfig {
    fn schedule(&self) -> Result<SchedulePolicy> {
        let emitter = &self.emitter;
        let mode = emitter.mode.unwrap_or(if emitter.interval_ms.is_some() {
            ScheduleMode::Fixed
        } else {
            ScheduleMode::Randomized
        });

        match mode {
            ScheduleMode::Fixed => {
                let interval_ms =
                    emitter
                        .interval_ms
                        .ok_or_else(|| LogSenderError::MissingConfigError {
                            field: "emitter.interval_ms".to_string(),
                        })?;
                Ok(SchedulePolicy::Fixed { interval_ms })
            }
            ScheduleMode::Randomized => Ok(SchedulePolicy::Randomized {
                min_delay_ms: emitter.min_delay_ms.unwrap_or(DEFAULT_MIN_DELAY_MS),
                max_delay_ms: emitter.max_delay_ms.unwrap_or(DEFAULT_MAX_DELAY_MS),
            }),
        }
    }

    fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_ms())
    }

    fn logging(&self) -> Result<LoggingConfig> {
        self.logging_over(LoggingConfig::from_env()?)
    }
}

impl TomlConfig {
    /// 以 `[logging]` / `[loki]` 覆寫環境變數得到的設定
    pub fn logging_over(&self, base: LoggingConfig) -> Result<LoggingConfig> {
        let level = match &self.logging.level {
            Some(raw) => raw
                .parse::<Severity>()
                .map_err(|reason| LogSenderError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: raw.clone(),
                    reason,
                })?,
            None => base.level,
        };
        let service_name = self
            .logging
            .service_name
            .clone()
            .unwrap_or(base.service_name);

        let loki = match &self.loki {
            Some(section) => {
                let host = resolved(section.host.as_ref())
                    .or_else(|| base.loki.as_ref().map(|loki| loki.host.clone()));
                match host {
                    Some(host) => {
                        let basic_auth = resolved(section.basic_auth.as_ref())
                            .or_else(|| base.loki.and_then(|loki| loki.basic_auth));
                        let mut loki = LokiConfig::new(host, basic_auth, &service_name);
                        if let Some(labels) = &section.labels {
                            loki.labels.extend(labels.clone());
                        }
                        Some(loki)
                    }
                    None => {
                        tracing::warn!("Loki host is empty or unresolved, remote sink disabled");
                        None
                    }
                }
            }
            None => base
                .loki
                .map(|loki| LokiConfig::new(loki.host, loki.basic_auth, &service_name)),
        };

        Ok(LoggingConfig {
            level,
            verbose: self.logging.verbose.unwrap_or(base.verbose),
            service_name,
            log_file: self.logging.file.clone().or(base.log_file),
            loki,
        })
    }
}
