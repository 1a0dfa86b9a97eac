//! Song aggregate model and DTOs.

use cantus_core::catalog::{MassPart, Season, SongStatus};
use cantus_core::submission::SongFields;
use cantus_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::asset::SongAsset;

/// A row from the `songs` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Song {
    pub id: DbId,
    pub slug: String,
    pub title: String,
    pub composer: String,
    pub arranged_by: String,
    #[sqlx(try_from = "String")]
    pub part_of_mass: MassPart,
    #[sqlx(try_from = "String")]
    pub season: Season,
    #[sqlx(try_from = "String")]
    pub status: SongStatus,
    pub mtn: bool,
    pub mtn_number: String,
    pub youtube_link: String,
    pub submitted_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Song {
    pub fn is_published(&self) -> bool {
        self.status == SongStatus::Published
    }

    /// Owners may edit their own submissions; staff may edit any song.
    pub fn editable_by(&self, user_id: DbId, is_staff: bool) -> bool {
        is_staff || self.submitted_by == Some(user_id)
    }
}

/// Values for a new song. The slug is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub fields: SongFields,
    pub status: SongStatus,
    pub submitted_by: Option<DbId>,
}

/// Replacement core fields for an existing song.
///
/// `status: None` keeps the current status (owner edits).
#[derive(Debug, Clone)]
pub struct UpdateSong {
    pub fields: SongFields,
    pub status: Option<SongStatus>,
}

/// A song with every dependent asset, grouped by kind.
#[derive(Debug, Clone, Serialize)]
pub struct SongDetail {
    pub song: Song,
    pub sheets: Vec<SongAsset>,
    pub midi_files: Vec<SongAsset>,
    pub mp3_files: Vec<SongAsset>,
}
