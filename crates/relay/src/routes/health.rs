//! Liveness check.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Returns `{"ok": true}` while the process is up. Does not check the
/// payment provider or the stock store.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}
