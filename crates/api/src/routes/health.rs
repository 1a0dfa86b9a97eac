//! `GET /health`: liveness of the two things a song page depends on, the
//! catalogue database and the media store holding sheets and recordings.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency answers, otherwise `degraded`.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Whether uploaded files can be read and written.
    pub media_healthy: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db, media) = tokio::join!(cantus_db::health_check(&state.pool), state.blobs.check());

    if let Err(e) = &media {
        tracing::warn!(error = %e, "Media store unavailable");
    }
    let db_healthy = db.is_ok();
    let media_healthy = media.is_ok();

    Json(HealthResponse {
        status: if db_healthy && media_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        media_healthy,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
