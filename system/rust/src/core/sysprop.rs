//! Structured access to system properties.
//!
//! Host builds have no property service, so each property can be overridden
//! from the environment: `bluetooth.core.le.max_advertising_sets` is read from
//! `BLUETOOTH_CORE_LE_MAX_ADVERTISING_SETS`.

use std::env;

use anyhow::{Context, Result};
use log::warn;

/// List of properties accessible to Rust. Add new ones here as they become
/// necessary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyI32 {
    // bluetooth.core.le
    LeMaxAdvertisingSets,
    LeMaxAdvertisingDataLength,

    // bluetooth.log
    LogLevel,
}

impl From<PropertyI32> for (&'static str, i32) {
    /// Convert the property into the property key name and a default value.
    fn from(prop: PropertyI32) -> Self {
        match prop {
            // Number of advertising sets the controller supports
            PropertyI32::LeMaxAdvertisingSets => ("bluetooth.core.le.max_advertising_sets", 16),

            // Maximum advertising data length for extended advertising PDUs
            PropertyI32::LeMaxAdvertisingDataLength => {
                ("bluetooth.core.le.max_advertising_data_length", 251)
            }

            // 0 = off, 1 = error, 2 = warn, 3 = info, 4 = debug, 5 = trace
            PropertyI32::LogLevel => ("bluetooth.log.level", 3),
        }
    }
}

/// List of boolean properties accessible to Rust.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyBool {
    // bluetooth.core.le
    LePrivacyEnabled,
}

impl From<PropertyBool> for (&'static str, bool) {
    /// Convert the property into the property key name and a default value.
    fn from(prop: PropertyBool) -> Self {
        match prop {
            PropertyBool::LePrivacyEnabled => ("bluetooth.core.le.privacy_enabled", true),
        }
    }
}

fn env_key(key: &str) -> String {
    key.to_ascii_uppercase().replace('.', "_")
}

fn lookup_env(key: &str) -> Option<String> {
    env::var(env_key(key)).ok()
}

fn parse_i32(key: &str, raw: &str) -> Result<i32> {
    let raw = raw.trim();
    let value = match raw.strip_prefix("0x") {
        Some(hex) => i32::from_str_radix(hex, 16),
        None => raw.parse::<i32>(),
    };
    value.with_context(|| format!("invalid value {raw:?} for sysprop {key}"))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" | "true" | "y" | "yes" | "on" => Ok(true),
        "0" | "false" | "n" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid value {other:?} for sysprop {key}"),
    }
}

fn resolve_i32(prop: PropertyI32, lookup: impl Fn(&str) -> Option<String>) -> i32 {
    let (key, default_value): (&str, i32) = prop.into();
    match lookup(key).map(|raw| parse_i32(key, &raw)) {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            warn!("{err:#}, using default {default_value}");
            default_value
        }
        None => default_value,
    }
}

fn resolve_bool(prop: PropertyBool, lookup: impl Fn(&str) -> Option<String>) -> bool {
    let (key, default_value): (&str, bool) = prop.into();
    match lookup(key).map(|raw| parse_bool(key, &raw)) {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            warn!("{err:#}, using default {default_value}");
            default_value
        }
        None => default_value,
    }
}

/// Get the i32 value for a system property.
pub fn get_i32(prop: PropertyI32) -> i32 {
    resolve_i32(prop, lookup_env)
}

/// Get the boolean value for a system property.
pub fn get_bool(prop: PropertyBool) -> bool {
    resolve_bool(prop, lookup_env)
}
