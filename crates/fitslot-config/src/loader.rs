// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./fitslot.toml` > `~/.config/fitslot/fitslot.toml` > `/etc/fitslot/fitslot.toml`
//! with environment variable overrides via `FITSLOT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FitslotConfig;

/// Config sections, in the order env var keys are matched against them.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "booking",
    "mpesa",
    "gateway",
    "prometheus",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/fitslot/fitslot.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "fitslot.toml";

/// Path of the per-user config file, if a config dir is known.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fitslot/fitslot.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/fitslot/fitslot.toml` (system-wide)
/// 3. `~/.config/fitslot/fitslot.toml` (user XDG config)
/// 4. `./fitslot.toml` (local directory)
/// 5. `FITSLOT_*` environment variables
pub fn load_config() -> Result<FitslotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<FitslotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FitslotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FitslotConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading config from explicit path");
    Figment::new()
        .merge(Serialized::defaults(FitslotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FitslotConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `FITSLOT_MPESA_CONSUMER_KEY` must map to `mpesa.consumer_key`,
/// not `mpesa.consumer.key`.
fn env_provider() -> Env {
    Env::prefixed("FITSLOT_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a prefix-stripped env var name to a dotted config path.
///
/// Figment hands over the name in its original case, so matching is done on
/// the lowercased form.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_first_section_only() {
        assert_eq!(map_env_key("mpesa_consumer_key"), "mpesa.consumer_key");
        assert_eq!(map_env_key("gateway_bearer_token"), "gateway.bearer_token");
        assert_eq!(
            map_env_key("booking_default_slot_capacity"),
            "booking.default_slot_capacity"
        );
    }

    #[test]
    fn env_keys_arrive_uppercase() {
        assert_eq!(map_env_key("GATEWAY_BEARER_TOKEN"), "gateway.bearer_token");
        assert_eq!(
            map_env_key("BOOKING_DEFAULT_GROUP_CAPACITY"),
            "booking.default_group_capacity"
        );
    }

    #[test]
    fn unknown_prefix_is_left_alone() {
        assert_eq!(map_env_key("mystery_key"), "mystery_key");
        // "services" is not "service" followed by an underscore.
        assert_eq!(map_env_key("services_x"), "services_x");
    }
}
