use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::model::{Location, Unit};

/// Environment variable that takes precedence over the key stored on disk.
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

/// Base URLs of the remote services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub weather: String,
    pub geocoding: String,
    pub ip_lookup: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            weather: "https://api.openweathermap.org/data/2.5".to_string(),
            geocoding: "https://api.openweathermap.org/geo/1.0".to_string(),
            ip_lookup: "https://ipapi.co/json/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    /// Delay unit; the wait after failed attempt `n` is `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { interval_secs: 600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeolocationSettings {
    /// How long to wait for a device position fix.
    pub timeout_secs: u64,
    /// Oldest acceptable position fix.
    pub max_age_secs: u64,
}

impl Default for GeolocationSettings {
    fn default() -> Self {
        Self { timeout_secs: 10, max_age_secs: 300 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_unit = "imperial"
///
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    /// Unit used when no preference has been stored yet.
    pub default_unit: Unit,
    pub endpoints: Endpoints,
    pub retry: RetrySettings,
    pub refresh: RefreshSettings,
    pub geolocation: GeolocationSettings,
    /// Last resort of the location resolver.
    pub default_location: Location,
    /// Number of day cards in the short-range forecast.
    pub short_range_days: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            default_unit: Unit::Metric,
            endpoints: Endpoints::default(),
            retry: RetrySettings::default(),
            refresh: RefreshSettings::default(),
            geolocation: GeolocationSettings::default(),
            default_location: Location::new(40.7128, -74.0060, "New York", "US"),
            short_range_days: 5,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weatherdash", "weatherdash")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted preferences and snapshot.
    pub fn state_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("state.json"))
    }

    /// API key from the environment, falling back to the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        self.api_key.clone().filter(|k| !k.trim().is_empty())
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs.max(1))
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_secs(self.geolocation.timeout_secs)
    }

    pub fn geolocation_max_age(&self) -> Duration {
        Duration::from_secs(self.geolocation.max_age_secs)
    }
}
