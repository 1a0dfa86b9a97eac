//! Member song workflows: submission, owner edit, the member's own list,
//! and staff delete.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use cantus_core::assets::AssetKind;
use cantus_core::browse::{resolve_page, PageInfo, TextQuery, MY_SONGS_PAGE_SIZE};
use cantus_core::catalog::{Choice, MassPart, Season, SongStatus};
use cantus_core::error::CoreError;
use cantus_core::moderation::purged_message;
use cantus_core::submission::{
    clean_song_fields, outcome_message, updated_message, validate_submission, SongFieldsInput,
    SubmissionInput,
};
use cantus_db::models::asset::NewAsset;
use cantus_db::models::song::{NewSong, Song, SongDetail, UpdateSong};
use cantus_db::repositories::SongRepo;
use serde::Serialize;

use super::find_song;
use crate::error::{AppError, AppResult};
use crate::middleware::body::ApiForm;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::response::{DataResponse, MessageOnly, MessageResponse};
use crate::state::AppState;
use crate::thumbnails::generate_missing_thumbnails;
use crate::uploads::{delete_blobs, read_multipart, FormPart, StagedBlobs};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Everything a client needs to render the submission form.
#[derive(Debug, Serialize)]
pub struct UploadSchema {
    pub mass_parts: Vec<Choice>,
    pub seasons: Vec<Choice>,
    pub assets: Vec<AssetSlotSchema>,
}

#[derive(Debug, Serialize)]
pub struct AssetSlotSchema {
    pub kind: AssetKind,
    pub file_field: &'static str,
    pub version_field: &'static str,
    pub accepted_extensions: &'static [&'static str],
}

/// Current values for the owner edit form.
#[derive(Debug, Serialize)]
pub struct EditForm {
    pub song: Song,
    pub mass_parts: Vec<Choice>,
    pub seasons: Vec<Choice>,
}

#[derive(Debug, Serialize)]
pub struct SongPage {
    pub songs: Vec<Song>,
    pub pagination: PageInfo,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /songs/upload
pub async fn upload_form(RequireAuth(_user): RequireAuth) -> Json<DataResponse<UploadSchema>> {
    let assets = AssetKind::ALL
        .into_iter()
        .map(|kind| AssetSlotSchema {
            kind,
            file_field: kind.file_field(),
            version_field: kind.version_field(),
            accepted_extensions: kind.allowed_extensions(),
        })
        .collect();

    Json(DataResponse {
        data: UploadSchema {
            mass_parts: MassPart::choices(),
            seasons: Season::choices(),
            assets,
        },
    })
}

/// POST /songs/upload (multipart)
///
/// Staff submissions publish immediately; everyone else's wait for review.
pub async fn submit_song(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MessageResponse<SongDetail>>)> {
    let input = submission_from_parts(read_multipart(multipart).await?);
    let clean = validate_submission(input)?;
    let status = SongStatus::for_submitter(user.is_staff);

    let mut staged = StagedBlobs::new();
    let mut assets = Vec::with_capacity(clean.uploads.len());
    for upload in &clean.uploads {
        match staged.store(&*state.blobs, upload.kind, &upload.file).await {
            Ok(file) => assets.push(NewAsset {
                kind: upload.kind,
                file,
                version: upload.version.clone(),
            }),
            Err(e) => {
                staged.discard(&*state.blobs).await;
                return Err(e);
            }
        }
    }

    let new_song = NewSong {
        fields: clean.fields,
        status,
        submitted_by: Some(user.user_id),
    };
    let detail = match SongRepo::create_with_assets(&state.pool, &new_song, &assets).await {
        Ok(detail) => detail,
        Err(e) => {
            staged.discard(&*state.blobs).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        song_id = detail.song.id,
        slug = %detail.song.slug,
        status = %detail.song.status,
        assets = assets.len(),
        user_id = user.user_id,
        "Song submitted"
    );

    if !detail.sheets.is_empty() {
        generate_missing_thumbnails(&state, detail.song.id).await;
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: outcome_message(&detail.song.title, detail.song.status),
            data: detail,
        }),
    ))
}

/// GET /songs/{slug}/edit
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> AppResult<Json<DataResponse<EditForm>>> {
    let song = find_song(&state, &slug).await?;
    ensure_editable(&song, user.user_id, user.is_staff)?;

    Ok(Json(DataResponse {
        data: EditForm {
            song,
            mass_parts: MassPart::choices(),
            seasons: Season::choices(),
        },
    }))
}

/// POST /songs/{slug}/edit (form-encoded core fields)
///
/// Status is never changed here; that is a moderation action.
pub async fn edit_song(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    ApiForm(input): ApiForm<SongFieldsInput>,
) -> AppResult<Json<MessageResponse<Song>>> {
    let song = find_song(&state, &slug).await?;
    ensure_editable(&song, user.user_id, user.is_staff)?;

    let fields = clean_song_fields(&input)?;
    let updated = SongRepo::update(&state.pool, song.id, &UpdateSong { fields, status: None })
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Song",
            id: song.id,
        }))?;

    tracing::info!(song_id = updated.id, user_id = user.user_id, "Song edited by owner");

    Ok(Json(MessageResponse {
        message: updated_message(&updated.title),
        data: updated,
    }))
}

/// POST /songs/{slug}/delete
///
/// Removes the song, every asset row (by cascade) and their blobs.
pub async fn delete_song(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(slug): Path<String>,
) -> AppResult<Json<MessageOnly>> {
    let song = find_song(&state, &slug).await?;
    let locators = SongRepo::delete(&state.pool, song.id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Song",
            id: song.id,
        }))?;

    delete_blobs(&*state.blobs, &locators).await;
    tracing::info!(
        song_id = song.id,
        slug = %song.slug,
        blobs = locators.len(),
        user_id = user.user_id,
        "Song deleted"
    );

    Ok(Json(MessageOnly::new(purged_message(&song.title))))
}

/// GET /songs/mine?page=
pub async fn my_songs(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<DataResponse<SongPage>>> {
    let query = TextQuery::from_pairs(&pairs);
    let total = SongRepo::count_by_submitter(&state.pool, user.user_id).await?;
    let pagination = resolve_page(query.page.as_deref(), total, MY_SONGS_PAGE_SIZE)?;
    let songs = SongRepo::list_by_submitter(
        &state.pool,
        user.user_id,
        MY_SONGS_PAGE_SIZE,
        pagination.offset(),
    )
    .await?;

    Ok(Json(DataResponse {
        data: SongPage { songs, pagination },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_editable(song: &Song, user_id: i64, is_staff: bool) -> AppResult<()> {
    if song.editable_by(user_id, is_staff) {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Forbidden(
            "You can only edit songs you submitted".into(),
        )))
    }
}

/// Route multipart parts onto the submission form. Unknown names are ignored.
fn submission_from_parts(parts: Vec<FormPart>) -> SubmissionInput {
    let mut input = SubmissionInput::default();
    for part in parts {
        match part {
            FormPart::Text { name, value } => {
                if input.fields.set_field(&name, value.clone()) {
                    continue;
                }
                if let Some(kind) = AssetKind::ALL
                    .into_iter()
                    .find(|k| k.version_field() == name)
                {
                    input.slot_mut(kind).version = Some(value);
                }
            }
            FormPart::File { name, file } => {
                if let Some(kind) = AssetKind::ALL.into_iter().find(|k| k.file_field() == name) {
                    input.slot_mut(kind).file = Some(file);
                }
            }
        }
    }
    input
}
