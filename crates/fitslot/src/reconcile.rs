// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fitslot reconcile` command implementation.

use fitslot_booking::BookingService;
use fitslot_config::model::FitslotConfig;
use fitslot_core::types::GroupDrift;
use fitslot_core::{FitslotError, StorageAdapter};

use crate::serve::open_storage;

/// Recompute every group's `current_count` and print what changed.
pub async fn run_reconcile(config: &FitslotConfig, json: bool) -> Result<(), FitslotError> {
    let storage = open_storage(config).await?;
    let service = BookingService::new(storage.clone(), config.booking.clone());
    let drift = service.reconcile().await?;
    storage.close().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&drift).unwrap_or_else(|_| "[]".to_string())
        );
    } else {
        print!("{}", render_drift(&drift));
    }
    Ok(())
}

fn render_drift(drift: &[GroupDrift]) -> String {
    if drift.is_empty() {
        return "All session group counts match their bookings.\n".to_string();
    }
    let mut out = format!("Corrected {} session group(s):\n", drift.len());
    for d in drift {
        out.push_str(&format!(
            "  {:<24} {} -> {}\n",
            d.group_id, d.recorded, d.actual
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_each_group() {
        let out = render_drift(&[GroupDrift {
            group_id: "grp-1".into(),
            recorded: 4,
            actual: 2,
        }]);
        assert!(out.starts_with("Corrected 1 session group(s)"));
        assert!(out.contains("4 -> 2"));
        assert!(render_drift(&[]).contains("match"));
    }

    #[tokio::test]
    async fn reconcile_on_fresh_database_succeeds() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = FitslotConfig::default();
        config.storage.database_path = dir.path().join("r.db").to_string_lossy().into_owned();
        run_reconcile(&config, true).await.unwrap();
    }
}
