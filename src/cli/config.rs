use std::path::Path;

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;
use crate::config::{write_config, HarnessConfig};
use crate::report::{EXIT_FAILED, EXIT_PASSED};
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file, defaults and env overrides)
    Show,

    /// Get one value by dotted key, e.g. `timings.camp_timeout`
    Get {
        /// Configuration key
        key: String,
    },

    /// Set one value by dotted key in the configuration file
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,
    },

    /// Write the defaults to the configuration file
    Reset,

    /// Validate the configuration file
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<i32> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            let config = ctx.config();
            match ctx.output() {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(config)?),
                OutputFormat::Human => {
                    if ctx.from_file() {
                        println!("Current configuration ({}):", path.display());
                    } else {
                        println!("Current configuration (defaults; no file at {}):", path.display());
                    }
                    print!("{}", serde_yaml::to_string(config)?);
                }
            }
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config())?;
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => match ctx.output() {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
                    _ => print!("{}", serde_yaml::to_string(value)?),
                },
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Set { key, value } => {
            let config = load_config_file(&path).await?;
            let mut json = serde_json::to_value(&config)?;
            let segments = split_key(&key)?;
            set_json_value(&mut json, &segments, parse_cli_value(&value))?;
            let updated: HarnessConfig = serde_json::from_value(json)
                .with_context(|| format!("invalid value for {key}"))?;
            updated.validate()?;
            save_config_file(&path, &updated).await?;
            info!("Updated configuration key {}", key);
            println!("Saved configuration to {}", path.display());
        }
        ConfigAction::Reset => {
            save_config_file(&path, &HarnessConfig::default()).await?;
            println!(
                "Configuration reset to defaults and written to {}",
                path.display()
            );
        }
        ConfigAction::Validate => {
            if !fs::try_exists(&path).await? {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
                return Ok(EXIT_PASSED);
            }
            let config = load_config_file(&path).await?;
            if let Err(err) = config.validate() {
                println!("Configuration file {} is invalid: {err:#}", path.display());
                return Ok(EXIT_FAILED);
            }
            println!("Configuration file {} is valid", path.display());
        }
    }

    Ok(EXIT_PASSED)
}

async fn load_config_file(path: &Path) -> Result<HarnessConfig> {
    if fs::try_exists(path).await? {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config =
            serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    } else {
        Ok(HarnessConfig::default())
    }
}

async fn save_config_file(path: &Path, config: &HarnessConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    write_config(path, config)
}

/// JSON literals stay typed (`3`, `false`); anything else is a string.
fn parse_cli_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn set_json_value(target: &mut JsonValue, path: &[&str], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry((*segment).to_string())
            .or_insert(JsonValue::Null);
    }
    ensure_object(current, last)?.insert((*last).to_string(), value);
    Ok(())
}

fn ensure_object<'a>(
    value: &'a mut JsonValue,
    segment: &str,
) -> Result<&'a mut Map<String, JsonValue>> {
    if value.is_null() {
        *value = JsonValue::Object(Map::new());
    }
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => bail!(
            "{} resolves to a non-object value; cannot assign nested configuration",
            segment
        ),
    }
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_nested_keys() {
        let mut doc = serde_json::to_value(HarnessConfig::default()).unwrap();
        set_json_value(&mut doc, &["policy", "battles"], json!(4)).unwrap();
        set_json_value(&mut doc, &["timings", "settle"], json!("2s")).unwrap();
        assert_eq!(get_json_value(&doc, &["policy", "battles"]), Some(&json!(4)));

        let config: HarnessConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.policy.battles, 4);
        assert_eq!(config.timings.settle, std::time::Duration::from_secs(2));
    }

    #[test]
    fn scalar_parent_cannot_take_children() {
        let mut doc = json!({ "base_url": "http://localhost:3001/test/" });
        assert!(set_json_value(&mut doc, &["base_url", "host"], json!("x")).is_err());
        assert!(split_key("..").is_err());
    }

    #[test]
    fn cli_values_keep_json_types() {
        assert_eq!(parse_cli_value("3"), json!(3));
        assert_eq!(parse_cli_value("false"), json!(false));
        assert_eq!(parse_cli_value("http://x/"), json!("http://x/"));
    }
}
