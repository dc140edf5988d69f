// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fitslot doctor` command implementation.
//!
//! Runs diagnostic checks against the configured environment: config,
//! database, M-Pesa credentials, gateway auth, and the health endpoint.
//! No check writes to the database.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use fitslot_config::model::FitslotConfig;
use fitslot_core::FitslotError;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `fitslot doctor` command.
///
/// With `--deep`, also runs SQLite's integrity check and looks for group
/// count drift.
pub async fn run_doctor(
    config: &FitslotConfig,
    config_path: Option<&Path>,
    deep: bool,
    plain: bool,
) -> Result<(), FitslotError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = vec![
        check_config(config_path),
        check_database(&config.storage.database_path).await,
        check_gateway_auth(config),
        check_mpesa(config).await,
        check_health_endpoint(config).await,
    ];

    if deep {
        results.push(check_db_integrity(&config.storage.database_path).await);
        results.push(check_group_drift(&config.storage.database_path).await);
        results.push(check_memory_baseline());
    }

    println!();
    println!("  fitslot doctor");
    println!("  {}", "-".repeat(50));

    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Check configuration loads without errors.
fn check_config(path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => fitslot_config::load_and_validate_path(path),
        None => fitslot_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database file exists and answers a query.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start);
        }
    };

    let counted = conn
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
        })
        .await;
    match counted {
        Ok(n) => CheckResult::new(
            "Database",
            CheckStatus::Pass,
            format!("connected ({n} bookings)"),
            start,
        ),
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("query failed: {e}"),
            start,
        ),
    }
}

/// Check the gateway can authenticate anyone at all.
fn check_gateway_auth(config: &FitslotConfig) -> CheckResult {
    let start = Instant::now();
    if !config.gateway.enabled {
        return CheckResult::new("Gateway auth", CheckStatus::Pass, "gateway disabled", start);
    }
    match config.gateway.bearer_token.as_deref() {
        Some(token) if token.len() >= 16 => {
            CheckResult::new("Gateway auth", CheckStatus::Pass, "bearer token set", start)
        }
        Some(_) => CheckResult::new(
            "Gateway auth",
            CheckStatus::Warn,
            "bearer token is shorter than 16 characters",
            start,
        ),
        None => CheckResult::new(
            "Gateway auth",
            CheckStatus::Fail,
            "gateway.bearer_token not set (serve will refuse to start)",
            start,
        ),
    }
}

/// Check M-Pesa credentials by requesting an OAuth token.
async fn check_mpesa(config: &FitslotConfig) -> CheckResult {
    let start = Instant::now();
    if !config.mpesa.enabled {
        return CheckResult::new(
            "M-Pesa",
            CheckStatus::Warn,
            "disabled (payments cannot be confirmed)",
            start,
        );
    }

    #[cfg(feature = "mpesa")]
    {
        use fitslot_core::{HealthStatus, PluginAdapter};

        let client = match fitslot_mpesa::MpesaClient::new(&config.mpesa) {
            Ok(client) => client,
            Err(e) => return CheckResult::new("M-Pesa", CheckStatus::Fail, e.to_string(), start),
        };
        match client.health_check().await {
            Ok(HealthStatus::Healthy) => CheckResult::new(
                "M-Pesa",
                CheckStatus::Pass,
                format!("token issued by {}", config.mpesa.resolved_base_url()),
                start,
            ),
            Ok(HealthStatus::Degraded(reason)) | Ok(HealthStatus::Unhealthy(reason)) => {
                CheckResult::new("M-Pesa", CheckStatus::Fail, reason, start)
            }
            Err(e) => CheckResult::new("M-Pesa", CheckStatus::Fail, e.to_string(), start),
        }
    }

    #[cfg(not(feature = "mpesa"))]
    {
        CheckResult::new(
            "M-Pesa",
            CheckStatus::Fail,
            "enabled in config but not compiled in",
            start,
        )
    }
}

/// Check gateway health endpoint.
async fn check_health_endpoint(config: &FitslotConfig) -> CheckResult {
    let start = Instant::now();
    let host = &config.gateway.host;
    let port = config.gateway.port;
    let url = format!("http://{host}:{port}/health");

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult::new(
                "Health endpoint",
                CheckStatus::Fail,
                format!("HTTP client error: {e}"),
                start,
            );
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            CheckResult::new("Health endpoint", CheckStatus::Pass, "reachable", start)
        }
        Ok(resp) => CheckResult::new(
            "Health endpoint",
            CheckStatus::Warn,
            format!("status {}", resp.status()),
            start,
        ),
        Err(_) => CheckResult::new(
            "Health endpoint",
            CheckStatus::Warn,
            format!("not reachable at {url} (service may not be running)"),
            start,
        ),
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "DB integrity",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new("DB integrity", CheckStatus::Fail, format!("open failed: {e}"), start);
        }
    };

    let result = conn
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await;

    match result {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

/// Deep check: stored group counts agree with active bookings.
///
/// Read-only; `fitslot reconcile` repairs what this finds.
async fn check_group_drift(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Group counts",
            CheckStatus::Warn,
            "database not found (skipped)",
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new("Group counts", CheckStatus::Fail, format!("open failed: {e}"), start);
        }
    };

    let drifted = conn
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM session_groups g
                 WHERE g.current_count != (
                     SELECT COUNT(*) FROM bookings b
                     WHERE b.group_id = g.id AND b.status IN ('booked', 'completed'))",
                [],
                |row| row.get(0),
            )
        })
        .await;

    match drifted {
        Ok(0) => CheckResult::new("Group counts", CheckStatus::Pass, "consistent", start),
        Ok(n) => CheckResult::new(
            "Group counts",
            CheckStatus::Warn,
            format!("{n} group(s) drifted; run `fitslot reconcile`"),
            start,
        ),
        Err(e) => CheckResult::new(
            "Group counts",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

/// Deep check: memory baseline via jemalloc.
fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);

        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_db() -> String {
        std::env::temp_dir()
            .join("nonexistent-fitslot-doctor-xyz.db")
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn plain_lines_carry_status_tags() {
        let result = CheckResult {
            name: "Database",
            status: CheckStatus::Warn,
            message: "not found".to_string(),
            duration: Duration::from_millis(5),
        };
        let line = format_line(&result, false);
        assert!(line.contains("[WARN]"));
        assert!(line.contains("not found (5ms)"));
    }

    #[tokio::test]
    async fn check_database_missing_warns() {
        let result = check_database(&missing_db()).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn deep_checks_skip_missing_database() {
        assert_eq!(check_db_integrity(&missing_db()).await.status, CheckStatus::Warn);
        assert_eq!(check_group_drift(&missing_db()).await.status, CheckStatus::Warn);
    }

    #[tokio::test]
    async fn disabled_mpesa_warns() {
        let config = FitslotConfig::default();
        let result = check_mpesa(&config).await;
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn missing_bearer_token_fails() {
        let mut config = FitslotConfig::default();
        assert_eq!(check_gateway_auth(&config).status, CheckStatus::Fail);
        config.gateway.bearer_token = Some("short".into());
        assert_eq!(check_gateway_auth(&config).status, CheckStatus::Warn);
        config.gateway.bearer_token = Some("a-long-enough-secret-token".into());
        assert_eq!(check_gateway_auth(&config).status, CheckStatus::Pass);
        config.gateway.enabled = false;
        config.gateway.bearer_token = None;
        assert_eq!(check_gateway_auth(&config).status, CheckStatus::Pass);
    }

    #[test]
    fn memory_baseline_reports() {
        let result = check_memory_baseline();
        assert!(result.status == CheckStatus::Pass || result.status == CheckStatus::Warn);
    }

    #[tokio::test]
    async fn fresh_database_is_consistent() {
        use fitslot_core::StorageAdapter;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doctor.db");
        let path = path.to_string_lossy().into_owned();
        let storage = fitslot_storage::SqliteStorage::new(fitslot_config::model::StorageConfig {
            database_path: path.clone(),
            ..Default::default()
        });
        storage.initialize().await.unwrap();

        assert_eq!(check_database(&path).await.status, CheckStatus::Pass);
        assert_eq!(check_db_integrity(&path).await.status, CheckStatus::Pass);
        assert_eq!(check_group_drift(&path).await.status, CheckStatus::Pass);
    }
}
