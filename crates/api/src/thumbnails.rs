//! Post-save thumbnail step for music sheets.
//!
//! Runs after the song's transaction commits. Every failure is logged at
//! `warn` and swallowed: a missing thumbnail never fails the request.

use cantus_core::storage::{Bucket, StorageError};
use cantus_core::thumbnail::{render_sheet_thumbnail, thumbnail_file_name, ThumbnailError};
use cantus_core::types::DbId;
use cantus_db::models::asset::SongAsset;
use cantus_db::repositories::SongAssetRepo;

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
enum ThumbnailStepError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Render(#[from] ThumbnailError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Generate thumbnails for every sheet of `song_id` that lacks one.
pub async fn generate_missing_thumbnails(state: &AppState, song_id: DbId) {
    let sheets = match SongAssetRepo::list_sheets_missing_thumbnail(&state.pool, song_id).await {
        Ok(sheets) => sheets,
        Err(e) => {
            tracing::warn!(song_id, error = %e, "Could not list sheets for thumbnails");
            return;
        }
    };

    for sheet in &sheets {
        match thumbnail_for(state, sheet).await {
            Ok(true) => tracing::info!(song_id, sheet_id = sheet.id, "Sheet thumbnail generated"),
            Ok(false) => {
                tracing::debug!(song_id, sheet_id = sheet.id, "Sheet changed while rendering")
            }
            Err(e) => tracing::warn!(
                song_id,
                sheet_id = sheet.id,
                error = %e,
                "Sheet thumbnail generation failed"
            ),
        }
    }
}

/// Render, store, and record one thumbnail. `Ok(false)` means the sheet was
/// changed concurrently and the fresh thumbnail was thrown away.
async fn thumbnail_for(state: &AppState, sheet: &SongAsset) -> Result<bool, ThumbnailStepError> {
    let source = state.blobs.read(&sheet.file_locator).await?;
    let jpeg = render_sheet_thumbnail(&sheet.original_name, source).await?;
    let locator = state
        .blobs
        .store(
            Bucket::MusicThumbnails,
            &thumbnail_file_name(&sheet.original_name),
            &jpeg,
        )
        .await?;

    let recorded =
        SongAssetRepo::set_thumbnail(&state.pool, sheet.id, &sheet.file_locator, &locator).await;
    match recorded {
        Ok(true) => Ok(true),
        Ok(false) => {
            state.blobs.delete(&locator).await?;
            Ok(false)
        }
        Err(e) => {
            if let Err(cleanup) = state.blobs.delete(&locator).await {
                tracing::warn!(%locator, error = %cleanup, "Failed to delete orphaned thumbnail");
            }
            Err(e.into())
        }
    }
}
