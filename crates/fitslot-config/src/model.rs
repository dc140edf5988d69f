// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Fitslot booking service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Fitslot configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FitslotConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Booking policy settings.
    #[serde(default)]
    pub booking: BookingConfig,

    /// M-Pesa (Daraja) payment settings.
    #[serde(default)]
    pub mpesa: MpesaConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the studio, used in payment descriptions.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "fitslot".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long SQLite waits on a locked database before failing, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("fitslot").join("fitslot.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("fitslot.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

/// Booking policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BookingConfig {
    /// Capacity given to a time slot created without an explicit capacity.
    #[serde(default = "default_slot_capacity")]
    pub default_slot_capacity: u32,

    /// Capacity given to a session group created without an explicit capacity.
    #[serde(default = "default_group_capacity")]
    pub default_group_capacity: u32,

    /// Accept bookings that are not tied to a registered user.
    #[serde(default = "default_allow_guest_bookings")]
    pub allow_guest_bookings: bool,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            default_slot_capacity: default_slot_capacity(),
            default_group_capacity: default_group_capacity(),
            allow_guest_bookings: default_allow_guest_bookings(),
        }
    }
}

fn default_slot_capacity() -> u32 {
    20
}

fn default_group_capacity() -> u32 {
    10
}

fn default_allow_guest_bookings() -> bool {
    true
}

/// M-Pesa Daraja API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MpesaConfig {
    /// Enable payment initiation and verification.
    #[serde(default)]
    pub enabled: bool,

    /// Daraja environment: "sandbox" or "production".
    #[serde(default = "default_mpesa_environment")]
    pub environment: String,

    /// Explicit API base URL. Overrides `environment` when set.
    #[serde(default)]
    pub base_url: Option<String>,

    /// OAuth consumer key.
    #[serde(default)]
    pub consumer_key: Option<String>,

    /// OAuth consumer secret.
    #[serde(default)]
    pub consumer_secret: Option<String>,

    /// Paybill or till number receiving payments.
    #[serde(default = "default_shortcode")]
    pub shortcode: String,

    /// Lipa Na M-Pesa Online passkey.
    #[serde(default)]
    pub passkey: Option<String>,

    /// Publicly reachable URL of `/v1/mpesa/callback`.
    #[serde(default)]
    pub callback_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_mpesa_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a transient (429/500/503) response.
    #[serde(default = "default_mpesa_max_retries")]
    pub max_retries: u32,

    /// Delay between retries in milliseconds.
    #[serde(default = "default_mpesa_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            environment: default_mpesa_environment(),
            base_url: None,
            consumer_key: None,
            consumer_secret: None,
            shortcode: default_shortcode(),
            passkey: None,
            callback_url: None,
            timeout_secs: default_mpesa_timeout_secs(),
            max_retries: default_mpesa_max_retries(),
            retry_delay_ms: default_mpesa_retry_delay_ms(),
        }
    }
}

impl MpesaConfig {
    /// The API base URL implied by `base_url` or `environment`.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.environment == "production" => "https://api.safaricom.co.ke".to_string(),
            None => "https://sandbox.safaricom.co.ke".to_string(),
        }
    }
}

fn default_mpesa_environment() -> String {
    "sandbox".to_string()
}

fn default_shortcode() -> String {
    "174379".to_string()
}

fn default_mpesa_timeout_secs() -> u64 {
    30
}

fn default_mpesa_max_retries() -> u32 {
    1
}

fn default_mpesa_retry_delay_ms() -> u64 {
    1000
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP API.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. `None` rejects all authenticated routes.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3080
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and expose `/metrics`.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
