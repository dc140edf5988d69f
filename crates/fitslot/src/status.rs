// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fitslot status` command implementation.
//!
//! Queries the gateway's public `/health` endpoint. Falls back gracefully
//! when the service is not running.

use std::io::IsTerminal;
use std::time::Duration;

use fitslot_config::model::FitslotConfig;
use fitslot_core::FitslotError;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
    storage: String,
    payments: String,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub version: Option<String>,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub storage: Option<String>,
    pub payments: Option<String>,
    pub gateway_host: String,
    pub gateway_port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `fitslot status` command.
pub async fn run_status(
    config: &FitslotConfig,
    json: bool,
    plain: bool,
) -> Result<(), FitslotError> {
    let host = &config.gateway.host;
    let port = config.gateway.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| FitslotError::Internal(format!("failed to create HTTP client: {e}")))?;

    // A degraded service still answers, with 503 when storage is down.
    let health = match client.get(&url).send().await {
        Ok(resp) => resp.json::<HealthResponse>().await.ok(),
        Err(_) => None,
    };

    let status_resp = match health {
        Some(health) => StatusResponse {
            running: true,
            uptime_human: Some(format_uptime(health.uptime_secs)),
            status: health.status,
            version: Some(health.version),
            uptime_secs: Some(health.uptime_secs),
            storage: Some(health.storage),
            payments: Some(health.payments),
            gateway_host: host.clone(),
            gateway_port: port,
        },
        None => StatusResponse {
            running: false,
            status: "not running".to_string(),
            version: None,
            uptime_secs: None,
            uptime_human: None,
            storage: None,
            payments: None,
            gateway_host: host.clone(),
            gateway_port: port,
        },
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status_resp).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status_resp, use_color);
    }

    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  fitslot status");
    println!("  {}", "-".repeat(35));

    if !status.running {
        if use_color {
            use colored::Colorize;
            println!("    State:    {} {}", "✗".red(), "not running".red());
        } else {
            println!("    State:    [FAIL] not running");
        }
        println!(
            "    Endpoint: http://{}:{}/health",
            status.gateway_host, status.gateway_port
        );
        println!();
        println!("  Start with: fitslot serve");
        println!();
        return;
    }

    let uptime = status.uptime_human.as_deref().unwrap_or("?");
    let ok = status.status == "ok";
    if use_color {
        use colored::Colorize;
        let (mark, state) = if ok {
            ("✓".green(), status.status.green())
        } else {
            ("!".yellow(), status.status.yellow())
        };
        println!("    State:    {mark} {state} (uptime: {uptime})");
    } else {
        let tag = if ok { "[OK]" } else { "[WARN]" };
        println!("    State:    {tag} {} (uptime: {uptime})", status.status);
    }
    println!(
        "    Version:  {}",
        status.version.as_deref().unwrap_or("unknown")
    );
    println!(
        "    Storage:  {}",
        status.storage.as_deref().unwrap_or("unknown")
    );
    println!(
        "    Payments: {}",
        status.payments.as_deref().unwrap_or("unknown")
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uptime_minutes() {
        assert_eq!(format_uptime(120), "2m");
    }

    #[test]
    fn format_uptime_hours() {
        assert_eq!(format_uptime(3720), "1h 2m");
    }

    #[test]
    fn format_uptime_days() {
        assert_eq!(format_uptime(90060), "1d 1h 1m");
    }

    #[test]
    fn health_response_matches_gateway_body() {
        let health: HealthResponse = serde_json::from_str(
            r#"{"status":"degraded","version":"0.1.0","uptime_secs":61,
                "storage":"healthy","payments":"degraded: token request failed"}"#,
        )
        .unwrap();
        assert_eq!(health.status, "degraded");
        assert_eq!(format_uptime(health.uptime_secs), "1m");
        assert!(health.payments.starts_with("degraded"));
    }

    #[test]
    fn offline_status_serializes() {
        let resp = StatusResponse {
            running: false,
            status: "not running".to_string(),
            version: None,
            uptime_secs: None,
            uptime_human: None,
            storage: None,
            payments: None,
            gateway_host: "127.0.0.1".to_string(),
            gateway_port: 3080,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"running\":false"));
        assert!(json.contains("\"gateway_port\":3080"));
    }
}
