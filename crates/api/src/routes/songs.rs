//! Route definitions for the `/songs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{library, songs};
use crate::state::AppState;

/// Routes mounted at `/songs`.
///
/// Static segments (`library`, `upload`, `mine`, `assets`) take precedence
/// over `{slug}`; slugs are 16 uppercase alphanumerics and never collide.
///
/// ```text
/// GET        /library                          -> list_library
/// GET, POST  /upload                           -> upload_form, submit_song
/// GET        /mine                             -> my_songs
/// GET        /assets/{kind}/{id}/download      -> download_asset
/// GET        /assets/{kind}/{id}/thumbnail     -> sheet_thumbnail
/// GET        /{slug}                           -> song_detail
/// GET, POST  /{slug}/edit                      -> edit_form, edit_song
/// POST       /{slug}/delete                    -> delete_song (staff)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/library", get(library::list_library))
        .route("/upload", get(songs::upload_form).post(songs::submit_song))
        .route("/mine", get(songs::my_songs))
        .route("/assets/{kind}/{id}/download", get(library::download_asset))
        .route("/assets/{kind}/{id}/thumbnail", get(library::sheet_thumbnail))
        .route("/{slug}", get(library::song_detail))
        .route("/{slug}/edit", get(songs::edit_form).post(songs::edit_song))
        .route("/{slug}/delete", post(songs::delete_song))
}
