//! Configuration system for hearth.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::alias::{AliasConfig, AliasKeySource};
use crate::clarify::ClarificationConfig;
use crate::error::{HearthError, HearthResult};
use crate::policy::{PolicyConfig, QuietHours};
use crate::time::parse_timezone;
use crate::tracking::EmaConfig;
use crate::traits::{StoreConfig, StoreProvider};

/// Main hearth configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// IANA name of the household's civil timezone.
    pub timezone: String,
    pub ema: EmaConfig,
    pub alias: AliasConfig,
    pub clarification: ClarificationConfig,
    pub policy: PolicyConfig,
    pub store: StoreConfig,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/London".to_string(),
            ema: EmaConfig::default(),
            alias: AliasConfig::default(),
            clarification: ClarificationConfig::default(),
            policy: PolicyConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl HearthConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> HearthResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| HearthError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| HearthError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| HearthError::Configuration(e.to_string()))?,
            _ => {
                return Err(HearthError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `HEARTH_*` environment variables over the defaults.
    pub fn from_env() -> HearthResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HearthResult<Self> {
        let mut config = Self::default();

        if let Some(tz) = lookup("HEARTH_TIMEZONE") {
            config.timezone = tz;
        }

        // Store
        if let Some(provider) = lookup("HEARTH_STORE_PROVIDER") {
            config.store.provider = match provider.to_lowercase().as_str() {
                "memory" => StoreProvider::Memory,
                "sqlite" => StoreProvider::Sqlite,
                other => {
                    return Err(HearthError::Configuration(format!(
                        "unknown store provider '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(path) = lookup("HEARTH_STORE_PATH") {
            config.store.path = PathBuf::from(path);
        }

        // Alias
        if let Some(ttl) = lookup("HEARTH_ALIAS_CACHE_TTL_SECS") {
            config.alias.cache_ttl_secs = parse_number("HEARTH_ALIAS_CACHE_TTL_SECS", &ttl)?;
        }
        if let Some(source) = lookup("HEARTH_ALIAS_KEY_SOURCE") {
            config.alias.key_source = source.parse::<AliasKeySource>().map_err(|_| {
                HearthError::Configuration(format!("unknown alias key source '{}'", source))
            })?;
        }

        // Policy
        if let Some(cap) = lookup("HEARTH_DAILY_CAP") {
            config.policy.daily_cap = parse_number("HEARTH_DAILY_CAP", &cap)?;
        }
        if let Some(minutes) = lookup("HEARTH_COOLDOWN_MINUTES") {
            config.policy.cooldown_minutes = parse_number("HEARTH_COOLDOWN_MINUTES", &minutes)?;
        }
        if let Some(window) = lookup("HEARTH_QUIET_HOURS") {
            config.policy.quiet_hours = parse_quiet_hours(&window)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> HearthConfigBuilder {
        HearthConfigBuilder::default()
    }

    /// The parsed household timezone.
    pub fn tz(&self) -> HearthResult<Tz> {
        parse_timezone(&self.timezone)
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> HearthResult<()> {
        self.tz()?;

        for (name, alpha) in [
            ("ema.effort_alpha", self.ema.effort_alpha),
            ("ema.ignore_alpha", self.ema.ignore_alpha),
            ("ema.frequency_alpha", self.ema.frequency_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(HearthError::Configuration(format!(
                    "{} must be in (0, 1], got {}",
                    name, alpha
                )));
            }
        }

        let policy = &self.policy;
        if !(0.0..=1.0).contains(&policy.clarify_floor)
            || !(0.0..=1.0).contains(&policy.high_floor)
            || policy.clarify_floor > policy.high_floor
        {
            return Err(HearthError::Configuration(format!(
                "policy floors must satisfy 0 <= clarify_floor ({}) <= high_floor ({}) <= 1",
                policy.clarify_floor, policy.high_floor
            )));
        }
        if !(1..=PolicyConfig::MAX_FAST_CONVERSATION_WINDOW_SECS)
            .contains(&policy.fast_conversation_window_secs)
        {
            return Err(HearthError::Configuration(format!(
                "policy.fast_conversation_window_secs must be in [1, {}], got {}",
                PolicyConfig::MAX_FAST_CONVERSATION_WINDOW_SECS,
                policy.fast_conversation_window_secs
            )));
        }
        if !(0..=PolicyConfig::MAX_COOLDOWN_MINUTES).contains(&policy.cooldown_minutes) {
            return Err(HearthError::Configuration(format!(
                "policy.cooldown_minutes must be in [0, {}], got {}",
                PolicyConfig::MAX_COOLDOWN_MINUTES,
                policy.cooldown_minutes
            )));
        }
        if !(0.0..=1.0).contains(&self.clarification.correction_confidence_floor) {
            return Err(HearthError::Configuration(format!(
                "clarification.correction_confidence_floor must be in [0, 1], got {}",
                self.clarification.correction_confidence_floor
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> HearthResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| HearthError::Configuration(format!("{} is not a valid number: '{}'", name, raw)))
}

/// Parse `HH:MM-HH:MM`, or `off` to disable.
fn parse_quiet_hours(raw: &str) -> HearthResult<QuietHours> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("off") {
        return Ok(QuietHours::disabled());
    }
    let invalid = || HearthError::Configuration(format!("invalid quiet hours '{}'", raw));
    let (start, end) = raw.split_once('-').ok_or_else(invalid)?;
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").map_err(|_| invalid())?;
    let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").map_err(|_| invalid())?;
    Ok(QuietHours {
        enabled: true,
        start,
        end,
    })
}

/// Builder for HearthConfig.
#[derive(Default)]
pub struct HearthConfigBuilder {
    config: HearthConfig,
}

impl HearthConfigBuilder {
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.config.timezone = timezone.into();
        self
    }

    pub fn ema(mut self, config: EmaConfig) -> Self {
        self.config.ema = config;
        self
    }

    pub fn alias(mut self, config: AliasConfig) -> Self {
        self.config.alias = config;
        self
    }

    pub fn clarification(mut self, config: ClarificationConfig) -> Self {
        self.config.clarification = config;
        self
    }

    pub fn policy(mut self, config: PolicyConfig) -> Self {
        self.config.policy = config;
        self
    }

    pub fn store(mut self, config: StoreConfig) -> Self {
        self.config.store = config;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> HearthResult<HearthConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
