pub mod auth;
pub mod dashboard;
pub mod library;
pub mod moderation;
pub mod songs;

use cantus_core::assets::AssetKind;
use cantus_core::error::CoreError;
use cantus_db::models::song::Song;
use cantus_db::repositories::SongRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Load a song by slug or fail with 404.
pub(crate) async fn find_song(state: &AppState, slug: &str) -> AppResult<Song> {
    SongRepo::find_by_slug(&state.pool, slug)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundByKey {
                entity: "Song",
                key: slug.to_string(),
            })
        })
}

/// Parse an asset kind path segment. Unknown kinds are 404, not 422: the
/// path names a resource that does not exist.
pub(crate) fn parse_kind(code: &str) -> AppResult<AssetKind> {
    AssetKind::from_code(code).map_err(|_| {
        AppError::Core(CoreError::NotFoundByKey {
            entity: "Asset kind",
            key: code.to_string(),
        })
    })
}
