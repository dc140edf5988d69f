// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Covers constraints serde cannot express: non-empty paths, bind addresses,
//! positive capacities, and credentials required once M-Pesa is enabled.

use crate::diagnostic::ConfigError;
use crate::model::{FitslotConfig, MpesaConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure rather than stopping at the first.
pub fn validate_config(config: &FitslotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` must be one of: {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.booking.default_slot_capacity == 0 {
        errors.push(ConfigError::validation(
            "booking.default_slot_capacity must be at least 1",
        ));
    }
    if config.booking.default_group_capacity == 0 {
        errors.push(ConfigError::validation(
            "booking.default_group_capacity must be at least 1",
        ));
    }

    if config.gateway.enabled {
        let host = config.gateway.host.trim();
        if host.is_empty() {
            errors.push(ConfigError::validation("gateway.host must not be empty"));
        } else if !is_valid_host(host) {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
        if config.gateway.port == 0 {
            errors.push(ConfigError::validation("gateway.port must not be 0"));
        }
    }

    if config.mpesa.enabled {
        validate_mpesa(&config.mpesa, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_mpesa(mpesa: &MpesaConfig, errors: &mut Vec<ConfigError>) {
    let required = [
        ("consumer_key", &mpesa.consumer_key),
        ("consumer_secret", &mpesa.consumer_secret),
        ("passkey", &mpesa.passkey),
        ("callback_url", &mpesa.callback_url),
    ];
    for (key, value) in required {
        if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
            errors.push(ConfigError::validation(format!(
                "mpesa.{key} is required when mpesa.enabled = true"
            )));
        }
    }

    if mpesa.shortcode.is_empty() || !mpesa.shortcode.chars().all(|c| c.is_ascii_digit()) {
        errors.push(ConfigError::validation(format!(
            "mpesa.shortcode `{}` must be numeric",
            mpesa.shortcode
        )));
    }

    if mpesa.base_url.is_none() && !matches!(mpesa.environment.as_str(), "sandbox" | "production")
    {
        errors.push(ConfigError::validation(format!(
            "mpesa.environment `{}` must be `sandbox` or `production`",
            mpesa.environment
        )));
    }

    if let Some(url) = &mpesa.callback_url {
        if !url.starts_with("https://") && !url.starts_with("http://") {
            errors.push(ConfigError::validation(format!(
                "mpesa.callback_url `{url}` must be an http(s) URL"
            )));
        }
    }

    if mpesa.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "mpesa.timeout_secs must be at least 1",
        ));
    }
}

fn is_valid_host(host: &str) -> bool {
    host.parse::<std::net::IpAddr>().is_ok()
        || host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &FitslotConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&FitslotConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = FitslotConfig::default();
        config.storage.database_path = " ".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn zero_capacities_are_rejected() {
        let mut config = FitslotConfig::default();
        config.booking.default_slot_capacity = 0;
        config.booking.default_group_capacity = 0;
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn bad_host_is_rejected_only_when_gateway_enabled() {
        let mut config = FitslotConfig::default();
        config.gateway.host = "not a host!".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("gateway.host")));

        config.gateway.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn enabled_mpesa_requires_credentials() {
        let mut config = FitslotConfig::default();
        config.mpesa.enabled = true;
        let msgs = messages(&config);
        for key in ["consumer_key", "consumer_secret", "passkey", "callback_url"] {
            assert!(
                msgs.iter().any(|m| m.contains(&format!("mpesa.{key}"))),
                "missing error for {key}: {msgs:?}"
            );
        }
    }

    #[test]
    fn complete_mpesa_section_passes() {
        let mut config = FitslotConfig::default();
        config.mpesa.enabled = true;
        config.mpesa.consumer_key = Some("ck".into());
        config.mpesa.consumer_secret = Some("cs".into());
        config.mpesa.passkey = Some("pk".into());
        config.mpesa.callback_url = Some("https://studio.example/v1/mpesa/callback".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = FitslotConfig::default();
        config.service.log_level = "verbose".into();
        assert!(messages(&config).iter().any(|m| m.contains("log_level")));
    }
}
