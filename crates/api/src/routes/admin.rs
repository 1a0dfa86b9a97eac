//! Route definitions for `/admin` (staff moderation).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::moderation;
use crate::state::AppState;

/// Routes mounted at `/admin`. Every handler requires staff.
///
/// ```text
/// GET        /arrivals                         -> arrivals
/// GET, POST  /songs/{slug}                     -> edit_form, edit_song
/// POST       /songs/{slug}/upload-sheet        -> quick_upload_sheet
/// POST       /songs/{slug}/upload-audio        -> quick_upload_audio
/// POST       /songs/{slug}/upload-midi         -> quick_upload_midi
/// POST       /assets/{kind}/{id}/delete        -> delete_asset
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/arrivals", get(moderation::arrivals))
        .route(
            "/songs/{slug}",
            get(moderation::edit_form).post(moderation::edit_song),
        )
        .route("/songs/{slug}/upload-sheet", post(moderation::quick_upload_sheet))
        .route("/songs/{slug}/upload-audio", post(moderation::quick_upload_audio))
        .route("/songs/{slug}/upload-midi", post(moderation::quick_upload_midi))
        .route("/assets/{kind}/{id}/delete", post(moderation::delete_asset))
}
