//! Harness configuration.
//!
//! Loaded from YAML. Lookup order: explicit `--config FILE`, then
//! `./config/runebattle.yaml`, then `<config dir>/runebattle-e2e/config.yaml`,
//! then built-in defaults. Environment overrides are applied last.

use anyhow::{bail, Context, Result};
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/test/";
pub const LOCAL_CONFIG_PATH: &str = "config/runebattle.yaml";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub base_url: String,
    pub browser: CdpConfig,
    pub timings: Timings,
    pub policy: RunPolicy,
    /// Capture a screenshot when a scenario escalates.
    pub screenshot_on_failure: bool,
    pub artifacts_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            browser: CdpConfig::default(),
            timings: Timings::default(),
            policy: RunPolicy::default(),
            screenshot_on_failure: true,
            artifacts_dir: PathBuf::from("artifacts"),
        }
    }
}

/// Upper bounds for every wait. Accepts integer milliseconds or humantime
/// strings (`"1500ms"`, `"10s"`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timings {
    #[serde(with = "duration_repr")]
    pub network_idle_timeout: Duration,
    #[serde(with = "duration_repr")]
    pub battle_scene_timeout: Duration,
    #[serde(with = "duration_repr")]
    pub camp_timeout: Duration,
    /// Camp wait used by the quick repeated-battle plan.
    #[serde(with = "duration_repr")]
    pub quick_camp_timeout: Duration,
    #[serde(with = "duration_repr")]
    pub atb_charge: Duration,
    #[serde(with = "duration_repr")]
    pub settle: Duration,
    #[serde(with = "duration_repr")]
    pub recharge: Duration,
    #[serde(with = "duration_repr")]
    pub rest_settle: Duration,
    #[serde(with = "duration_repr")]
    pub shop_timeout: Duration,
    /// How long a fixed control may take to appear.
    #[serde(with = "duration_repr")]
    pub control_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            network_idle_timeout: Duration::from_millis(10_000),
            battle_scene_timeout: Duration::from_millis(10_000),
            camp_timeout: Duration::from_millis(15_000),
            quick_camp_timeout: Duration::from_millis(5_000),
            atb_charge: Duration::from_millis(5_000),
            settle: Duration::from_millis(3_000),
            recharge: Duration::from_millis(4_000),
            rest_settle: Duration::from_millis(1_000),
            shop_timeout: Duration::from_millis(5_000),
            control_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunPolicy {
    pub cast_budget: u32,
    pub max_attempts: u32,
    pub battles: u32,
    pub sessions: usize,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            cast_budget: 3,
            max_attempts: 15,
            battles: 10,
            sessions: 1,
        }
    }
}

impl HarnessConfig {
    /// Apply `RUNEBATTLE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("RUNEBATTLE_BASE_URL") {
            if !url.trim().is_empty() {
                info!(%url, "base url overridden from environment");
                self.base_url = url.trim().to_string();
            }
        }
        if let Ok(value) = env::var("RUNEBATTLE_HEADLESS") {
            let lower = value.to_ascii_lowercase();
            self.browser.headless = !matches!(lower.as_str(), "0" | "false" | "no" | "off");
        }
        if let Ok(path) = env::var("RUNEBATTLE_CHROME") {
            if !path.trim().is_empty() {
                self.browser.executable = PathBuf::from(path.trim());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url '{}'", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https" | "file") {
            bail!("base_url must be http(s) or file, got '{}'", url.scheme());
        }
        if self.policy.max_attempts == 0 {
            bail!("policy.max_attempts must be at least 1");
        }
        if self.policy.sessions == 0 {
            bail!("policy.sessions must be at least 1");
        }
        Ok(())
    }
}

pub struct LoadedConfig {
    pub config: HarnessConfig,
    pub path: PathBuf,
    pub from_file: bool,
}

/// Resolve and read the configuration. Validation is left to the caller so
/// `config validate` can report a bad file.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let explicit = config_path.is_some();
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path(),
    };

    let (mut config, from_file) = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let config: HarnessConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;
        info!("Loaded configuration from: {}", config_path.display());
        (config, true)
    } else if explicit {
        bail!("Config file not found: {}", config_path.display());
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        (HarnessConfig::default(), false)
    };

    config.apply_env_overrides();
    Ok(LoadedConfig {
        config,
        path: config_path,
        from_file,
    })
}

fn default_config_path() -> PathBuf {
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(dir) => dir.join("runebattle-e2e").join("config.yaml"),
        None => local,
    }
}

/// Parse a duration given as integer milliseconds or a humantime string.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    if let Ok(ms) = trimmed.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(trimmed).with_context(|| format!("invalid duration '{raw}'"))
}

pub fn write_config(path: &Path, config: &HarnessConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))
}

mod duration_repr {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}
