//! Public browsing: the published library, song detail, and file downloads.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cantus_core::assets::AssetKind;
use cantus_core::browse::{
    resolve_page, FilterChoice, LibraryQuery, PageInfo, RenderMode, FRAGMENT_HEADER, PAGE_SIZE,
};
use cantus_core::error::CoreError;
use cantus_core::types::DbId;
use cantus_db::models::asset::SongAsset;
use cantus_db::models::song::{Song, SongDetail};
use cantus_db::repositories::{SongAssetRepo, SongRepo};
use serde::Serialize;

use super::{find_song, parse_kind};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One page of the library. Fragment responses omit `controls`.
#[derive(Debug, Serialize)]
pub struct LibraryPage {
    pub songs: Vec<Song>,
    pub pagination: PageInfo,
    #[serde(flatten)]
    pub controls: Option<LibraryControls>,
}

/// Filter state echoed back on full-page responses.
#[derive(Debug, Serialize)]
pub struct LibraryControls {
    pub query: EchoedQuery,
    pub season_choices: Vec<FilterChoice>,
    pub part_choices: Vec<FilterChoice>,
}

#[derive(Debug, Serialize)]
pub struct EchoedQuery {
    pub q: String,
    pub seasons: Vec<&'static str>,
    pub parts: Vec<&'static str>,
}

pub(crate) fn render_mode(headers: &HeaderMap) -> RenderMode {
    RenderMode::from_header(headers.get(FRAGMENT_HEADER).and_then(|v| v.to_str().ok()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /songs/library?q=&season=&part=&page=
pub async fn list_library(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<DataResponse<LibraryPage>>> {
    let query = LibraryQuery::from_pairs(&pairs);
    let mode = render_mode(&headers);

    let total = SongRepo::count_published(&state.pool, &query).await?;
    let pagination = resolve_page(query.page.as_deref(), total, PAGE_SIZE)?;
    let songs =
        SongRepo::list_published(&state.pool, &query, PAGE_SIZE, pagination.offset()).await?;

    tracing::debug!(
        total,
        page = pagination.number,
        fragment = mode.is_fragment(),
        "Library page served"
    );

    let controls = (!mode.is_fragment()).then(|| LibraryControls {
        query: EchoedQuery {
            q: query.text.clone(),
            seasons: query.season_codes(),
            parts: query.part_codes(),
        },
        season_choices: query.season_choices(),
        part_choices: query.part_choices(),
    });

    Ok(Json(DataResponse {
        data: LibraryPage {
            songs,
            pagination,
            controls,
        },
    }))
}

/// GET /songs/{slug}
///
/// Any song is reachable by slug, published or not.
pub async fn song_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<DataResponse<SongDetail>>> {
    let song = find_song(&state, &slug).await?;
    let detail = SongRepo::load_detail(&state.pool, song).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// GET /songs/assets/{kind}/{id}/download
pub async fn download_asset(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, DbId)>,
) -> AppResult<Response> {
    let kind = parse_kind(&kind)?;
    let asset = find_asset(&state, kind, id).await?;
    let bytes = state.blobs.read(&asset.file_locator).await?;

    let content_type = HeaderValue::from_str(&asset.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&attachment_disposition(&asset.original_name))
        .map_err(|e| AppError::InternalError(format!("Invalid download header: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// GET /songs/assets/sheet/{id}/thumbnail
pub async fn sheet_thumbnail(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, DbId)>,
) -> AppResult<Response> {
    let kind = parse_kind(&kind)?;
    if kind != AssetKind::Sheet {
        return Err(AppError::Core(CoreError::NotFoundByKey {
            entity: "Thumbnail",
            key: format!("{kind}/{id}"),
        }));
    }
    let sheet = find_asset(&state, kind, id).await?;
    let locator = sheet.thumbnail_locator.ok_or_else(|| {
        AppError::Core(CoreError::NotFoundByKey {
            entity: "Thumbnail",
            key: format!("{kind}/{id}"),
        })
    })?;
    let bytes = state.blobs.read(&locator).await?;

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"))],
        Body::from(bytes),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) async fn find_asset(state: &AppState, kind: AssetKind, id: DbId) -> AppResult<SongAsset> {
    SongAssetRepo::find_by_id(&state.pool, kind, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: kind.entity(),
            id,
        }))
}

/// `attachment; filename="..."` with quotes, backslashes and control
/// characters replaced.
fn attachment_disposition(original_name: &str) -> String {
    let safe: String = original_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
