//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults, nested tables merged).
//! 3. Apply environment variable overrides (highest priority).
//!
//! Arrays are replaced, not merged: a file that sets `security.rules` supplies
//! the whole ordered rule list.
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `BEAGLE_DEBUG` | `debug` |
//! | `BEAGLE_BIND_ADDRESS` | `bind_address` |
//! | `BEAGLE_LOG_LEVEL` | `log_level` |
//! | `BEAGLE_CSRF_ENABLED` | `security.csrf_enabled` |
//! | `BEAGLE_BCRYPT_COST` | `security.bcrypt_cost` |
//! | `BEAGLE_REALM` | `security.realm` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use beagle_core::settings_loader;
//!
//! let settings = settings_loader::from_path_with_env("config/beagle.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::BeagleError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, BeagleError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| BeagleError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, BeagleError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, BeagleError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| BeagleError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, BeagleError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a file, picking the format from its extension
/// (`.json` is JSON, anything else is TOML), then applies environment overrides.
pub fn from_path_with_env(path: impl AsRef<Path>) -> Result<Settings, BeagleError> {
    let path = path.as_ref();
    let mut settings = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => from_json_file(path)?,
        _ => from_toml_file(path)?,
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// Boolean values accept "true"/"1"/"yes"; anything else is `false`.
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("BEAGLE_DEBUG") {
        settings.debug = parse_bool(&val);
    }

    if let Ok(val) = std::env::var("BEAGLE_BIND_ADDRESS") {
        settings.bind_address = val;
    }

    if let Ok(val) = std::env::var("BEAGLE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("BEAGLE_CSRF_ENABLED") {
        settings.security.csrf_enabled = parse_bool(&val);
    }

    if let Ok(val) = std::env::var("BEAGLE_BCRYPT_COST") {
        if let Ok(cost) = val.parse::<u32>() {
            settings.security.bcrypt_cost = cost;
        }
    }

    if let Ok(val) = std::env::var("BEAGLE_REALM") {
        settings.security.realm = val;
    }
}

fn parse_bool(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn read_config(path: &Path, format: &str) -> Result<String, BeagleError> {
    std::fs::read_to_string(path).map_err(|e| {
        BeagleError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, BeagleError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        BeagleError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        BeagleError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value into the equivalent JSON value.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges `override_val` into `base`. Objects merge key by key; any
/// other value (arrays included) replaces the base value.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
