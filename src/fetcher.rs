use std::path::Path;
use std::time::Duration;

use color_eyre::{eyre::Context, Result};
use log::{error, info};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;

use crate::api::AppState;
use crate::config::CONFIG;
use crate::model::{extract_payload, JobRecord};
use crate::normalize::JobTable;
use crate::{normalize, report, storage};

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build http client")
});

pub async fn fetch() -> Result<Vec<JobRecord>> {
    let payload: Value = CLIENT
        .get(&CONFIG.api_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .wrap_err("upstream returned invalid JSON")?;
    extract_payload(payload)
}

/// Fetch, normalize, persist and swap in one pass. Any failure leaves the
/// previous snapshot in place.
async fn refresh_once(state: &AppState) -> Result<usize> {
    info!("fetching job records from {}", CONFIG.api_url);
    let records = fetch().await?;
    let rows = normalize::normalize(&records);
    publish(state, rows, &CONFIG.storage_path, &CONFIG.report_path)
}

/// Persist the table and swap it in before rendering the report, so the
/// served table never lags the on-disk snapshot even when the report write
/// fails.
fn publish(
    state: &AppState,
    rows: JobTable,
    storage_path: &Path,
    report_path: &Path,
) -> Result<usize> {
    let count = rows.len();

    storage::write_new_snapshot(storage_path, &rows)?;
    state.replace_table(rows.clone());
    report::write_report(&rows, report_path)?;
    state.record_success(report_path);

    Ok(count)
}

/// Background task: refresh every `refresh_secs`, forever. Failures are
/// logged and retried on the next tick.
pub async fn refresh_loop(state: AppState) {
    loop {
        match refresh_once(&state).await {
            Ok(count) => info!("refresh complete: {count} rows"),
            Err(e) => {
                error!("refresh failed: {e:#}");
                state.record_error(&format!("{e:#}"));
            }
        }
        tokio::time::sleep(Duration::from_secs(CONFIG.refresh_secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobRecord;

    fn rows(job_no: &str) -> JobTable {
        normalize::normalize(&[JobRecord {
            job_no: Some(job_no.to_string()),
            ..Default::default()
        }])
    }

    #[test]
    fn publish_writes_snapshot_report_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.xlsx");
        let state = AppState::new(None);

        let count = publish(&state, rows("A"), dir.path(), &report).unwrap();
        assert_eq!(count, 1);
        assert!(report.exists());
        assert!(storage::load_latest_snapshot(dir.path()).unwrap().is_some());
        assert_eq!(state.status().last_report.as_deref(), report.to_str());
    }

    #[test]
    fn report_failure_still_swaps_table_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        // parent directory doesn't exist, so the report write fails
        let bad_report = dir.path().join("missing").join("report.xlsx");
        let state = AppState::new(None);

        assert!(publish(&state, rows("A"), dir.path(), &bad_report).is_err());

        let table = state.table().expect("table should be swapped in");
        assert_eq!(table[0].job_no, "A");
        let persisted = storage::load_latest_snapshot(dir.path()).unwrap().unwrap();
        assert_eq!(persisted, *table);
        assert!(state.status().last_report.is_none());
    }
}
