pub mod accounts;
pub mod admin;
pub mod health;
pub mod songs;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the application route tree (everything except `/health`).
///
/// ```text
/// /                                           dashboard (public)
///
/// /accounts/login                             login (public)
/// /accounts/refresh                           refresh (public)
/// /accounts/logout                            logout (requires auth)
/// /accounts/register                          register (public)
///
/// /songs/library                              published listing (public)
/// /songs/upload                               form schema, submit (requires auth)
/// /songs/mine                                 caller's submissions (requires auth)
/// /songs/assets/{kind}/{id}/download          stream stored file (public)
/// /songs/assets/{kind}/{id}/thumbnail         stream sheet thumbnail (public)
/// /songs/{slug}                               detail (public)
/// /songs/{slug}/edit                          owner edit (requires auth)
/// /songs/{slug}/delete                        delete (staff only)
///
/// /admin/arrivals                             moderation queue (staff only)
/// /admin/songs/{slug}                         full edit (staff only)
/// /admin/songs/{slug}/upload-sheet            quick attach (staff only)
/// /admin/songs/{slug}/upload-audio            quick attach (staff only)
/// /admin/songs/{slug}/upload-midi             quick attach (staff only)
/// /admin/assets/{kind}/{id}/delete            asset delete (staff only)
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        .nest("/accounts", accounts::router())
        .nest("/songs", songs::router())
        .nest("/admin", admin::router())
}
