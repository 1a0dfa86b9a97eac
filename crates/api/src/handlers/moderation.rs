//! Staff moderation: the arrivals queue, full song edit with asset entries,
//! single-asset delete, and quick attach.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use cantus_core::assets::{check_upload, check_version_length, AssetKind, UploadedFile};
use cantus_core::browse::TextQuery;
use cantus_core::catalog::{Choice, MassPart, Season, SongStatus};
use cantus_core::error::CoreError;
use cantus_core::forms::{clean_text, FieldErrors};
use cantus_core::moderation::{
    edited_message, validate_moderation, AssetCommand, ExistingAssets, ModerationInput,
    ASSET_REMOVED_MESSAGE,
};
use cantus_core::types::DbId;
use cantus_db::models::asset::{AssetChange, NewAsset, SongAsset};
use cantus_db::models::song::{Song, SongDetail, UpdateSong};
use cantus_db::repositories::{SongAssetRepo, SongRepo};
use serde::Serialize;

use super::library::{find_asset, render_mode};
use super::{find_song, parse_kind};
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireStaff;
use crate::response::{DataResponse, MessageOnly, MessageResponse};
use crate::state::AppState;
use crate::thumbnails::generate_missing_thumbnails;
use crate::uploads::{delete_blobs, read_multipart, FormPart, StagedBlobs};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// The moderation queue. Full-page responses also carry the search echo
/// and the status vocabulary.
#[derive(Debug, Serialize)]
pub struct ArrivalsPage {
    pub songs: Vec<Song>,
    #[serde(flatten)]
    pub controls: Option<ArrivalControls>,
}

#[derive(Debug, Serialize)]
pub struct ArrivalControls {
    pub q: String,
    pub status_choices: Vec<Choice>,
}

/// Everything the staff edit form needs.
#[derive(Debug, Serialize)]
pub struct ModerationForm {
    #[serde(flatten)]
    pub detail: SongDetail,
    pub mass_parts: Vec<Choice>,
    pub seasons: Vec<Choice>,
    pub statuses: Vec<Choice>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /admin/arrivals?q=
///
/// Every song regardless of status, pending first.
pub async fn arrivals(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<DataResponse<ArrivalsPage>>> {
    let query = TextQuery::from_pairs(&pairs);
    let songs = SongRepo::list_for_moderation(&state.pool, &query.text).await?;

    let controls = (!render_mode(&headers).is_fragment()).then(|| ArrivalControls {
        q: query.text.clone(),
        status_choices: SongStatus::choices(),
    });

    Ok(Json(DataResponse {
        data: ArrivalsPage { songs, controls },
    }))
}

/// GET /admin/songs/{slug}
pub async fn edit_form(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Path(slug): Path<String>,
) -> AppResult<Json<DataResponse<ModerationForm>>> {
    let song = find_song(&state, &slug).await?;
    let detail = SongRepo::load_detail(&state.pool, song).await?;

    Ok(Json(DataResponse {
        data: ModerationForm {
            detail,
            mass_parts: MassPart::choices(),
            seasons: Season::choices(),
            statuses: SongStatus::choices(),
        },
    }))
}

/// POST /admin/songs/{slug} (multipart)
///
/// Core fields, status and every asset entry are validated together. Blobs
/// are written only after validation passes, and discarded if the
/// transaction fails.
pub async fn edit_song(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<MessageResponse<SongDetail>>> {
    let song = find_song(&state, &slug).await?;
    let input = moderation_from_parts(read_multipart(multipart).await?);
    let existing = existing_assets(&state, song.id).await?;
    let clean = validate_moderation(&input, song.status, &existing)?;

    let mut staged = StagedBlobs::new();
    let changes = match stage_commands(&state, &mut staged, clean.commands).await {
        Ok(changes) => changes,
        Err(e) => {
            staged.discard(&*state.blobs).await;
            return Err(e);
        }
    };

    let update = UpdateSong {
        fields: clean.fields,
        status: Some(clean.status),
    };
    let outcome = match SongRepo::apply_edit(&state.pool, song.id, &update, &changes).await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            staged.discard(&*state.blobs).await;
            return Err(AppError::Core(CoreError::NotFoundByKey {
                entity: "Song",
                key: slug,
            }));
        }
        Err(e) => {
            staged.discard(&*state.blobs).await;
            return Err(e.into());
        }
    };

    delete_blobs(&*state.blobs, &outcome.obsolete_locators).await;
    tracing::info!(
        song_id = outcome.song.id,
        status = %outcome.song.status,
        changes = changes.len(),
        removed_blobs = outcome.obsolete_locators.len(),
        user_id = user.user_id,
        "Song moderated"
    );

    generate_missing_thumbnails(&state, outcome.song.id).await;
    let detail = SongRepo::load_detail(&state.pool, outcome.song).await?;

    Ok(Json(MessageResponse {
        message: edited_message(&detail.song.title),
        data: detail,
    }))
}

/// POST /admin/assets/{kind}/{id}/delete
pub async fn delete_asset(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path((kind, id)): Path<(String, DbId)>,
) -> AppResult<Json<MessageOnly>> {
    let kind = parse_kind(&kind)?;
    // Resolve first so a missing asset is a 404 with the entity name.
    find_asset(&state, kind, id).await?;

    let removed = SongAssetRepo::delete(&state.pool, kind, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: kind.entity(),
            id,
        }))?;
    delete_blobs(&*state.blobs, &removed.locators()).await;

    tracing::info!(
        kind = kind.code(),
        asset_id = id,
        song_id = removed.song_id,
        user_id = user.user_id,
        "Asset removed"
    );

    Ok(Json(MessageOnly::new(ASSET_REMOVED_MESSAGE)))
}

/// POST /admin/songs/{slug}/upload-sheet
pub async fn quick_upload_sheet(
    state: State<AppState>,
    staff: RequireStaff,
    slug: Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MessageResponse<SongAsset>>)> {
    quick_upload(state, staff, slug, multipart, AssetKind::Sheet).await
}

/// POST /admin/songs/{slug}/upload-audio
pub async fn quick_upload_audio(
    state: State<AppState>,
    staff: RequireStaff,
    slug: Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MessageResponse<SongAsset>>)> {
    quick_upload(state, staff, slug, multipart, AssetKind::Audio).await
}

/// POST /admin/songs/{slug}/upload-midi
pub async fn quick_upload_midi(
    state: State<AppState>,
    staff: RequireStaff,
    slug: Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MessageResponse<SongAsset>>)> {
    quick_upload(state, staff, slug, multipart, AssetKind::Midi).await
}

/// Attach a single file of `kind` to an existing song.
async fn quick_upload(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(slug): Path<String>,
    multipart: Multipart,
    kind: AssetKind,
) -> AppResult<(StatusCode, Json<MessageResponse<SongAsset>>)> {
    let song = find_song(&state, &slug).await?;
    let (file, version) = validate_quick_upload(kind, read_multipart(multipart).await?)?;

    let mut staged = StagedBlobs::new();
    let stored = match staged.store(&*state.blobs, kind, &file).await {
        Ok(stored) => stored,
        Err(e) => {
            staged.discard(&*state.blobs).await;
            return Err(e);
        }
    };
    let new_asset = NewAsset {
        kind,
        file: stored,
        version,
    };
    let asset = match SongAssetRepo::create(&state.pool, song.id, &new_asset).await {
        Ok(asset) => asset,
        Err(e) => {
            staged.discard(&*state.blobs).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        kind = kind.code(),
        asset_id = asset.id,
        song_id = song.id,
        user_id = user.user_id,
        "Asset attached"
    );

    if kind == AssetKind::Sheet {
        generate_missing_thumbnails(&state, song.id).await;
    }
    // Re-read so a freshly generated thumbnail shows up in the response.
    let asset = SongAssetRepo::find_by_id(&state.pool, kind, asset.id)
        .await?
        .unwrap_or(asset);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: kind.attached_message().to_string(),
            data: asset,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Route multipart parts onto the moderation form. Unknown names are ignored.
fn moderation_from_parts(parts: Vec<FormPart>) -> ModerationInput {
    let mut input = ModerationInput::default();
    for part in parts {
        match part {
            FormPart::Text { name, value } => {
                input.set_text(&name, value);
            }
            FormPart::File { name, file } => {
                input.set_file(&name, file);
            }
        }
    }
    input
}

async fn existing_assets(state: &AppState, song_id: DbId) -> AppResult<ExistingAssets> {
    let mut existing = HashMap::new();
    for kind in AssetKind::ALL {
        let ids = SongAssetRepo::list_for_song(&state.pool, kind, song_id)
            .await?
            .into_iter()
            .map(|asset| asset.id)
            .collect();
        existing.insert(kind, ids);
    }
    Ok(existing)
}

/// Write the files named by `commands` and turn them into persistable changes.
async fn stage_commands(
    state: &AppState,
    staged: &mut StagedBlobs,
    commands: Vec<AssetCommand>,
) -> AppResult<Vec<AssetChange>> {
    let mut changes = Vec::with_capacity(commands.len());
    for command in commands {
        let change = match command {
            AssetCommand::Add {
                kind,
                file,
                version,
            } => AssetChange::Add(NewAsset {
                kind,
                file: staged.store(&*state.blobs, kind, &file).await?,
                version,
            }),
            AssetCommand::Replace {
                kind,
                id,
                file,
                version,
            } => {
                let file = match file {
                    Some(file) => Some(staged.store(&*state.blobs, kind, &file).await?),
                    None => None,
                };
                AssetChange::Replace {
                    kind,
                    id,
                    file,
                    version,
                }
            }
            AssetCommand::Remove { kind, id } => AssetChange::Remove { kind, id },
        };
        changes.push(change);
    }
    Ok(changes)
}

/// Pick the `file` part and the kind's version field out of a quick upload.
/// A blank version falls back to the kind's default label.
fn validate_quick_upload(
    kind: AssetKind,
    parts: Vec<FormPart>,
) -> Result<(UploadedFile, String), FieldErrors> {
    let mut file = None;
    let mut version = None;
    for part in parts {
        match part {
            FormPart::File { name, file: upload } if name == "file" => file = Some(upload),
            FormPart::Text { name, value } if name == kind.version_field() => {
                version = Some(value)
            }
            _ => {}
        }
    }

    let mut errors = FieldErrors::new();
    match &file {
        Some(upload) => check_upload(kind, upload, "file", &mut errors),
        None => errors.required("file"),
    }

    let version = match clean_text(version.as_deref()) {
        v if v.is_empty() => kind.default_version().to_string(),
        v => {
            check_version_length(&v, kind.version_field(), &mut errors);
            v
        }
    };

    match file {
        Some(file) if errors.is_empty() => Ok((file, version)),
        _ => Err(errors),
    }
}
