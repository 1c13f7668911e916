//! Application configuration structures.

use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where and how queue times are scraped
    #[serde(default)]
    pub source: SourceConfig,

    /// Time-series store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Trend chart settings
    #[serde(default)]
    pub chart: ChartConfig,

    /// X (Twitter) publishing
    #[serde(default)]
    pub x: XConfig,

    /// Bluesky publishing
    #[serde(default)]
    pub bluesky: BlueskyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Load configuration and apply overrides from the process environment.
    pub fn from_path_and_env(path: impl AsRef<Path>) -> Self {
        let mut config = Self::load_or_default(path);
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Override secrets and deployment settings from a key lookup.
    ///
    /// Empty values are ignored so an unset variable in a deployment template
    /// does not wipe a value from the config file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("INFLUXDB_URL") {
            self.store.url = url;
        }
        if let Some(token) = get("INFLUXDB_TOKEN") {
            self.store.token = token;
        }
        if let Some(org) = get("INFLUXDB_ORG") {
            self.store.org = org;
        }
        if let Some(bucket) = get("INFLUXDB_BUCKET") {
            self.store.bucket = bucket;
        }
        if let Some(token) = get("X_ACCESS_TOKEN") {
            self.x.access_token = token;
        }
        if let Some(identifier) = get("BLUESKY_USERNAME") {
            self.bluesky.identifier = identifier;
        }
        if let Some(password) = get("BLUESKY_PASSWORD") {
            self.bluesky.password = password;
        }
        if let Some(tz) = get("DAABOT_TIMEZONE") {
            self.chart.timezone = tz;
        }
        if let Some(timeout) = get("DAABOT_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => self.source.timeout_secs = secs,
                Err(_) => log::warn!("Ignoring invalid DAABOT_TIMEOUT_SECS: {timeout}"),
            }
        }
    }

    /// Validate the settings a run cannot start without.
    ///
    /// Credentials are not checked here; see [`Config::credential_warnings`].
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.source.url)
            .map_err(|e| AppError::validation(format!("source.url: {e}")))?;
        for selector in [&self.source.container_selector, &self.source.value_selector] {
            scraper::Selector::parse(selector)
                .map_err(|e| AppError::selector(selector.as_str(), format!("{e:?}")))?;
        }

        self.store.validate()?;

        self.chart.timezone()?;
        self.chart.slots()?;
        if self.chart.width == 0 || self.chart.height == 0 {
            return Err(AppError::validation("chart.width and chart.height must be > 0"));
        }

        url::Url::parse(&self.x.api_base)
            .map_err(|e| AppError::validation(format!("x.api_base: {e}")))?;
        url::Url::parse(&self.bluesky.service)
            .map_err(|e| AppError::validation(format!("bluesky.service: {e}")))?;
        Ok(())
    }

    /// Missing credentials, one message each.
    ///
    /// These only fail the stage that needs them, so a run still goes ahead.
    pub fn credential_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.store.backend == StoreBackend::Influx {
            let missing = self.store.missing_influx_settings();
            if !missing.is_empty() {
                warnings.push(format!(
                    "influx store is missing: {} (readings will not be stored)",
                    missing.join(", ")
                ));
            }
        }
        if self.x.enabled && self.x.access_token.trim().is_empty() {
            warnings.push("x is enabled but no access token is set (X_ACCESS_TOKEN)".to_string());
        }
        if self.bluesky.enabled
            && (self.bluesky.identifier.trim().is_empty() || self.bluesky.password.is_empty())
        {
            warnings.push(
                "bluesky is enabled but BLUESKY_USERNAME/BLUESKY_PASSWORD are not set".to_string(),
            );
        }
        warnings
    }
}

/// Scraper settings for the airport page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page that carries the live security times
    #[serde(default = "defaults::source_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// CSS selector for the element holding both terminal times
    #[serde(default = "defaults::container_selector")]
    pub container_selector: String,

    /// CSS selector for each terminal's value inside the container
    #[serde(default = "defaults::value_selector")]
    pub value_selector: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::source_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            container_selector: defaults::container_selector(),
            value_selector: defaults::value_selector(),
        }
    }
}

/// Which store implementation backs readings and charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Influx,
    Local,
}

/// Time-series store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// InfluxDB base URL, e.g. `http://localhost:8086`
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub org: String,

    #[serde(default)]
    pub bucket: String,

    /// InfluxDB API token
    #[serde(default)]
    pub token: String,

    /// Measurement name for readings
    #[serde(default = "defaults::measurement")]
    pub measurement: String,

    /// File used by the local backend
    #[serde(default = "defaults::local_path")]
    pub local_path: String,

    /// Days of readings the local backend keeps
    #[serde(default = "defaults::retention_days")]
    pub retention_days: u32,
}

impl StoreConfig {
    fn validate(&self) -> Result<()> {
        if self.measurement.trim().is_empty() {
            return Err(AppError::validation("store.measurement is empty"));
        }
        if self.backend == StoreBackend::Local {
            if self.local_path.trim().is_empty() {
                return Err(AppError::validation("store.local_path is empty"));
            }
            if self.retention_days == 0 {
                return Err(AppError::validation("store.retention_days must be > 0"));
            }
        }
        Ok(())
    }

    /// Names of the InfluxDB settings that are blank.
    pub fn missing_influx_settings(&self) -> Vec<&'static str> {
        [
            ("url", &self.url),
            ("org", &self.org),
            ("bucket", &self.bucket),
            ("token", &self.token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: String::new(),
            org: String::new(),
            bucket: String::new(),
            token: String::new(),
            measurement: defaults::measurement(),
            local_path: defaults::local_path(),
            retention_days: defaults::retention_days(),
        }
    }
}

/// Trend chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Local `HH:MM` times at which a chart is attached
    #[serde(default = "defaults::schedule")]
    pub schedule: Vec<String>,

    /// IANA timezone used for wall-clock decisions and axis labels
    #[serde(default = "defaults::timezone")]
    pub timezone: String,

    #[serde(default = "defaults::chart_width")]
    pub width: u32,

    #[serde(default = "defaults::chart_height")]
    pub height: u32,
}

impl ChartConfig {
    /// Parse the configured timezone.
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::validation(format!("chart.timezone: {e}")))
    }

    /// Parse the configured schedule slots.
    pub fn slots(&self) -> Result<Vec<NaiveTime>> {
        self.schedule
            .iter()
            .map(|slot| {
                NaiveTime::parse_from_str(slot.trim(), "%H:%M").map_err(|e| {
                    AppError::validation(format!("chart.schedule entry '{slot}': {e}"))
                })
            })
            .collect()
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            schedule: defaults::schedule(),
            timezone: defaults::timezone(),
            width: defaults::chart_width(),
            height: defaults::chart_height(),
        }
    }
}

/// X API v2 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// OAuth 2.0 user-context access token
    #[serde(default)]
    pub access_token: String,

    #[serde(default = "defaults::x_api_base")]
    pub api_base: String,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            access_token: String::new(),
            api_base: defaults::x_api_base(),
        }
    }
}

/// Bluesky (AT Protocol) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Handle or DID used to log in
    #[serde(default)]
    pub identifier: String,

    /// App password
    #[serde(default)]
    pub password: String,

    /// PDS base URL
    #[serde(default = "defaults::bluesky_service")]
    pub service: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            identifier: String::new(),
            password: String::new(),
            service: defaults::bluesky_service(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn source_url() -> String {
        "https://www.dublinairport.com/flight-information/live-departures".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; daabot/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn container_selector() -> String {
        "div.sec-times".into()
    }
    pub fn value_selector() -> String {
        "strong".into()
    }

    // Store defaults
    pub fn measurement() -> String {
        "terminals".into()
    }
    pub fn local_path() -> String {
        "data/readings.json".into()
    }
    pub fn retention_days() -> u32 {
        7
    }

    // Chart defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn schedule() -> Vec<String> {
        vec!["12:00".into(), "00:00".into()]
    }
    pub fn timezone() -> String {
        "Europe/Dublin".into()
    }
    pub fn chart_width() -> u32 {
        1200
    }
    pub fn chart_height() -> u32 {
        800
    }

    // Platform defaults
    pub fn x_api_base() -> String {
        "https://api.x.com".into()
    }
    pub fn bluesky_service() -> String {
        "https://bsky.social".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn complete_config() -> Config {
        let mut config = Config::default();
        config.store.url = "http://localhost:8086".to_string();
        config.store.org = "daa".to_string();
        config.store.bucket = "security".to_string();
        config.store.token = "secret".to_string();
        config.x.access_token = "x-token".to_string();
        config.bluesky.identifier = "daa.bsky.social".to_string();
        config.bluesky.password = "app-pass".to_string();
        config
    }

    #[test]
    fn validate_complete_config_ok() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn default_config_validates_but_warns_about_credentials() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let warnings = config.credential_warnings();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("influx store is missing: url, org, bucket, token"));
        assert!(warnings[1].contains("X_ACCESS_TOKEN"));
        assert!(warnings[2].contains("BLUESKY_PASSWORD"));
    }

    #[test]
    fn complete_config_has_no_credential_warnings() {
        assert!(complete_config().credential_warnings().is_empty());
    }

    #[test]
    fn missing_platform_password_is_not_fatal() {
        let mut config = complete_config();
        config.bluesky.password.clear();

        assert!(config.validate().is_ok());
        assert_eq!(config.credential_warnings().len(), 1);
    }

    #[test]
    fn validate_rejects_bad_platform_url() {
        let mut config = complete_config();
        config.x.api_base = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = complete_config();
        config.source.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_schedule_slot() {
        let mut config = complete_config();
        config.chart.schedule = vec!["25:00".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_timezone() {
        let mut config = complete_config();
        config.chart.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_platform_needs_no_credentials() {
        let mut config = complete_config();
        config.bluesky.enabled = false;
        config.bluesky.password.clear();
        assert!(config.credential_warnings().is_empty());
    }

    #[test]
    fn local_backend_skips_influx_credentials() {
        let mut config = complete_config();
        config.store = StoreConfig {
            backend: StoreBackend::Local,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.credential_warnings().is_empty());
    }

    #[test]
    fn overrides_fill_secrets_and_skip_blanks() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("INFLUXDB_URL", "http://influx:8086"),
            ("INFLUXDB_TOKEN", "tok"),
            ("BLUESKY_USERNAME", "bot.bsky.social"),
            ("X_ACCESS_TOKEN", "   "),
            ("DAABOT_TIMEOUT_SECS", "15"),
        ]);
        let mut config = Config::default();
        config.x.access_token = "from-file".to_string();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.url, "http://influx:8086");
        assert_eq!(config.store.token, "tok");
        assert_eq!(config.bluesky.identifier, "bot.bsky.social");
        assert_eq!(config.x.access_token, "from-file");
        assert_eq!(config.source.timeout_secs, 15);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_str = r#"
            [store]
            backend = "local"
            local_path = "/tmp/readings.json"

            [chart]
            schedule = ["08:00"]

            [x]
            enabled = false
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Local);
        assert_eq!(config.store.measurement, "terminals");
        assert_eq!(config.chart.schedule, vec!["08:00".to_string()]);
        assert_eq!(config.chart.timezone, "Europe/Dublin");
        assert!(!config.x.enabled);
        assert!(config.bluesky.enabled);
        assert_eq!(config.source.timeout_secs, 10);
    }

    #[test]
    fn slots_parse_default_schedule() {
        let slots = ChartConfig::default().slots().unwrap();
        assert_eq!(
            slots,
            vec![
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(0, 0, 0).unwrap()
            ]
        );
    }
}
