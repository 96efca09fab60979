//! Health and good-to-go endpoints.
//!
//! Both exercise a real write and read against the internal healthcheck
//! collection.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use super::AppState;
use crate::db::{Db, HEALTHCHECK_COLLECTION};
use crate::models::{Content, Resource};

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const SAMPLE_ID: &str = "cda5d6a9-cd25-4d76-8bad-9eaa35e85f4a";

fn sample_resource() -> Resource {
    let content = match json!({"foo": ["a", "b"], "bar": 10.4}) {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Resource::wrap(Content::Json(content), SAMPLE_ID, "application/json", None)
}

async fn check_writable(db: &Db) -> Result<(), String> {
    let connection = db
        .try_open()
        .map_err(|_| "Failed to establish connection to the document store".to_string())?;

    match tokio::time::timeout(
        CHECK_TIMEOUT,
        connection.write(HEALTHCHECK_COLLECTION, &sample_resource()),
    )
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("Failed to write data to the document store: {}", e)),
        Err(_) => Err("Writing to the document store timed out".to_string()),
    }
}

async fn check_readable(db: &Db) -> Result<(), String> {
    let connection = db
        .try_open()
        .map_err(|_| "Failed to establish connection to the document store".to_string())?;

    match tokio::time::timeout(
        CHECK_TIMEOUT,
        connection.read(HEALTHCHECK_COLLECTION, SAMPLE_ID),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(format!("Failed to read data from the document store: {}", e)),
        Err(_) => Err("Reading from the document store timed out".to_string()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResult {
    name: &'static str,
    ok: bool,
    severity: u8,
    business_impact: &'static str,
    technical_summary: &'static str,
    check_output: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HealthReport {
    system_code: &'static str,
    name: &'static str,
    description: &'static str,
    ok: bool,
    checks: Vec<CheckResult>,
}

/// Detailed health report
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let db = state.gateway.db();
    let (writable, readable) = tokio::join!(check_writable(db), check_readable(db));

    let checks = vec![
        CheckResult {
            name: "Write to the document store",
            ok: writable.is_ok(),
            severity: 1,
            business_impact: "Publishing won't work. Writing content to the native store is broken.",
            technical_summary: "Writing to the document store is broken. Check the database file, its disk space and permissions.",
            check_output: writable.err().unwrap_or_else(|| "OK".to_string()),
        },
        CheckResult {
            name: "Read from the document store",
            ok: readable.is_ok(),
            severity: 1,
            business_impact: "Reading content from the native store is broken.",
            technical_summary: "Reading from the document store is broken. Check the database file and its permissions.",
            check_output: readable.err().unwrap_or_else(|| "OK".to_string()),
        },
    ];

    Json(HealthReport {
        system_code: "native-store",
        name: "native-store",
        description: "Reads and writes raw content to the native store, in the received format",
        ok: checks.iter().all(|c| c.ok),
        checks,
    })
}

/// Good-to-go: 200 when both checks pass, 503 with the first failure otherwise
pub(super) async fn good_to_go(State(state): State<AppState>) -> impl IntoResponse {
    let db = state.gateway.db();
    let (readable, writable) = tokio::join!(check_readable(db), check_writable(db));

    match readable.and(writable) {
        Ok(()) => (StatusCode::OK, "OK".to_string()),
        Err(message) => {
            tracing::warn!(%message, "Not good to go");
            (StatusCode::SERVICE_UNAVAILABLE, message)
        }
    }
}
