use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::CONFIG;
use crate::normalize::{JobRow, JobTable};

/// Outcome of the most recent refresh attempt, for `/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchStatus {
    pub last_run: Option<String>,
    pub last_report: Option<String>,
    pub error: Option<String>,
}

/// Shared between the refresh loop and the request handlers. The table is
/// swapped wholesale on every successful refresh; readers hold the previous
/// one until then.
#[derive(Clone)]
pub struct AppState {
    table: Arc<RwLock<Option<Arc<JobTable>>>>,
    status: Arc<Mutex<FetchStatus>>,
}

impl AppState {
    pub fn new(initial: Option<JobTable>) -> Self {
        Self {
            table: Arc::new(RwLock::new(initial.map(Arc::new))),
            status: Arc::new(Mutex::new(FetchStatus::default())),
        }
    }

    pub fn replace_table(&self, rows: JobTable) {
        *self.table.write().expect("table lock poisoned") = Some(Arc::new(rows));
    }

    pub(crate) fn table(&self) -> Option<Arc<JobTable>> {
        self.table.read().expect("table lock poisoned").clone()
    }

    pub fn record_success(&self, report_path: &Path) {
        let mut status = self.status.lock().expect("status lock poisoned");
        status.last_run = Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        status.last_report = Some(report_path.display().to_string());
        status.error = None;
    }

    /// Only a successful refresh stamps `last_run`, so a failure never pairs
    /// a fresh timestamp with a stale report.
    pub fn record_error(&self, error: &str) {
        let mut status = self.status.lock().expect("status lock poisoned");
        status.error = Some(error.to_string());
    }

    pub(crate) fn status(&self) -> FetchStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }
}

enum ApiError {
    NotFound(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::Unavailable(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/status", get(fetch_status))
        .route("/job/:job_no", get(job_lookup))
        .route("/container/:container_number", get(container_lookup))
        .route("/filter/:importer", get(filter_by_importer))
        .route("/search/:value", get(search))
        .route("/download-excel", get(download_report))
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({
        "message": "Job tracking API. Use /job/{job_no}, /container/{container_number}, \
                    /filter/{importer} and /search/{value} to query the latest snapshot."
    }))
}

async fn fetch_status(State(state): State<AppState>) -> Json<FetchStatus> {
    Json(state.status())
}

fn current_table(state: &AppState) -> Result<Arc<JobTable>, ApiError> {
    state
        .table()
        .ok_or_else(|| ApiError::Unavailable("snapshot not available yet".into()))
}

fn found(row: &JobRow) -> Json<Value> {
    Json(json!({ "message": "Record found", "data": row }))
}

async fn job_lookup(
    State(state): State<AppState>,
    UrlPath(job_no): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let table = current_table(&state)?;
    table
        .iter()
        .find(|row| row.job_no == job_no)
        .map(found)
        .ok_or_else(|| ApiError::NotFound(format!("No record found for job: {job_no}")))
}

async fn container_lookup(
    State(state): State<AppState>,
    UrlPath(container_number): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let table = current_table(&state)?;
    let needle = container_number.to_lowercase();
    table
        .iter()
        .find(|row| {
            row.container_numbers
                .iter()
                .any(|c| c.to_lowercase().contains(&needle))
        })
        .map(found)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No data found for container number: {container_number}"
            ))
        })
}

async fn filter_by_importer(
    State(state): State<AppState>,
    UrlPath(importer): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let table = current_table(&state)?;
    let needle = importer.trim().to_lowercase();

    let mut hits: Vec<&JobRow> = table
        .iter()
        .filter(|row| row.importer.trim().to_lowercase() == needle)
        .collect();
    if hits.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No records found for Importer: {importer}"
        )));
    }

    // Newest first; rows without a parseable job date sink to the bottom.
    hits.sort_by(|a, b| match (a.job_date, b.job_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    Ok(Json(
        json!({ "message": "Filtered data retrieved", "data": hits }),
    ))
}

/// Case-insensitive substring search across job number, container numbers,
/// invoice number, BE number and CTH number. Returns the first hit.
async fn search(
    State(state): State<AppState>,
    UrlPath(value): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let table = current_table(&state)?;
    let needle = value.to_lowercase();
    table
        .iter()
        .find(|row| {
            [&row.job_no, &row.invoice_number, &row.be_no, &row.cth_no]
                .into_iter()
                .chain(row.container_numbers.iter())
                .any(|key| key.to_lowercase().contains(&needle))
        })
        .map(found)
        .ok_or_else(|| ApiError::NotFound(format!("No record found for {value}")))
}

async fn download_report() -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&CONFIG.report_path)
        .await
        .map_err(|_| ApiError::NotFound("Excel file not found".into()))?;

    let filename = CONFIG
        .report_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.xlsx".into());

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, JobRecord};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn record(job_no: &str, importer: &str, job_date: &str, container: &str) -> JobRecord {
        JobRecord {
            job_no: Some(job_no.to_string()),
            importer: Some(importer.to_string()),
            job_date: Some(job_date.to_string()),
            invoice_number: Some(format!("INV-{job_no}")),
            container_nos: vec![Container {
                container_number: Some(container.to_string()),
                size: Some("40".into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn fixture_state() -> AppState {
        let records = vec![
            record("INC/00123/24-25", "Acme Imports", "2024-11-03", "TGHU1234567"),
            record("INC/00124/24-25", "Acme Imports", "2024-12-01", "MSKU7654321"),
            record("INC/00200/24-25", "Globex", "2024-10-10", "CAIU0001112"),
        ];
        AppState::new(Some(crate::normalize::normalize(&records)))
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn job_lookup_returns_exact_match() {
        let (status, body) = get_json(fixture_state(), "/job/INC%2F00123%2F24-25").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["job_no"], "INC/00123/24-25");
    }

    #[tokio::test]
    async fn job_lookup_misses_with_404() {
        let (status, body) = get_json(fixture_state(), "/job/NOPE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("NOPE"));
    }

    #[tokio::test]
    async fn container_lookup_is_case_insensitive_substring() {
        let (status, body) = get_json(fixture_state(), "/container/msku765").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["job_no"], "INC/00124/24-25");
    }

    #[tokio::test]
    async fn filter_sorts_newest_first() {
        let (status, body) = get_json(fixture_state(), "/filter/acme%20imports").await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["job_no"], "INC/00124/24-25");
        assert_eq!(data[1]["job_no"], "INC/00123/24-25");
    }

    #[tokio::test]
    async fn filter_misses_with_404() {
        let (status, _) = get_json(fixture_state(), "/filter/Initech").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_spans_all_keys() {
        // invoice number hit
        let (status, body) = get_json(fixture_state(), "/search/inv-inc%2F00200%2F24-25").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["job_no"], "INC/00200/24-25");

        // container hit
        let (status, body) = get_json(fixture_state(), "/search/caiu000").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["job_no"], "INC/00200/24-25");
    }

    #[tokio::test]
    async fn search_misses_with_404() {
        let (status, _) = get_json(fixture_state(), "/search/zzzzzz").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lookups_fail_with_500_before_first_snapshot() {
        let (status, body) = get_json(AppState::new(None), "/job/INC").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("snapshot"));
    }

    #[tokio::test]
    async fn replacing_the_table_drops_stale_rows() {
        let state = fixture_state();
        state.replace_table(crate::normalize::normalize(&[record(
            "NEW/1", "Acme Imports", "2025-01-01", "NEWU0000001",
        )]));

        let (status, _) = get_json(state.clone(), "/job/INC%2F00123%2F24-25").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json(state, "/job/NEW%2F1").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn download_excel_serves_the_report_or_404s() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.xlsx");
        // config is only read by this endpoint; pin it before first access
        std::env::set_var("API_URL", "http://localhost:9/api/download-report");
        std::env::set_var("REPORT_PATH", &report);

        let request = || {
            Request::builder()
                .uri("/download-excel")
                .body(Body::empty())
                .unwrap()
        };

        // no report rendered yet
        let response = router(fixture_state()).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        crate::report::write_report(&[], &report).unwrap();
        let response = router(fixture_state()).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("report.xlsx"));
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!body.is_empty());
    }

    #[tokio::test]
    async fn status_reflects_last_refresh() {
        let state = fixture_state();
        let (_, body) = get_json(state.clone(), "/status").await;
        assert_eq!(body["last_run"], Value::Null);

        state.record_error("connection refused");
        let (status, body) = get_json(state.clone(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "connection refused");
        // failed refreshes don't count as a run
        assert_eq!(body["last_run"], Value::Null);

        state.record_success(Path::new("report.xlsx"));
        let (_, body) = get_json(state, "/status").await;
        assert_eq!(body["error"], Value::Null);
        assert_eq!(body["last_report"], "report.xlsx");
        assert!(body["last_run"].is_string());
    }
}
