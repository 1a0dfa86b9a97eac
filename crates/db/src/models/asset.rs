//! Dependent asset model shared by `music_sheets`, `midi_files` and
//! `mp3_files`.

use cantus_core::assets::AssetKind;
use cantus_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One asset row. `kind` is selected as a literal so all three tables
/// decode into the same struct; `thumbnail_locator` is always `None`
/// outside `music_sheets`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SongAsset {
    pub id: DbId,
    pub song_id: DbId,
    #[sqlx(try_from = "String")]
    pub kind: AssetKind,
    #[serde(skip_serializing)]
    pub file_locator: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub version: String,
    #[serde(skip_serializing)]
    pub thumbnail_locator: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SongAsset {
    /// Every blob this row points at.
    pub fn locators(&self) -> Vec<String> {
        let mut locators = vec![self.file_locator.clone()];
        locators.extend(self.thumbnail_locator.clone());
        locators
    }
}

/// A blob already written to storage, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_locator: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// DTO for attaching a new asset to a song.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub kind: AssetKind,
    pub file: StoredFile,
    pub version: String,
}

/// One persisted change from a staff edit.
#[derive(Debug, Clone)]
pub enum AssetChange {
    Add(NewAsset),
    /// Set the version; swap the file (and drop any thumbnail) when given.
    Replace {
        kind: AssetKind,
        id: DbId,
        file: Option<StoredFile>,
        version: String,
    },
    Remove {
        kind: AssetKind,
        id: DbId,
    },
}
