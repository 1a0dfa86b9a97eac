//! Landing page payload.

use axum::extract::State;
use axum::Json;
use cantus_core::browse::{LibraryQuery, DASHBOARD_RECENT_LIMIT};
use cantus_core::catalog::{Choice, MassPart, Season};
use cantus_db::models::song::Song;
use cantus_db::repositories::SongRepo;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub mass_parts: Vec<Choice>,
    pub seasons: Vec<Choice>,
    pub published_count: i64,
    pub recent_songs: Vec<Song>,
}

/// GET /
pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<DataResponse<Dashboard>>> {
    let published_count = SongRepo::count_published(&state.pool, &LibraryQuery::default()).await?;
    let recent_songs = SongRepo::list_recent_published(&state.pool, DASHBOARD_RECENT_LIMIT).await?;

    Ok(Json(DataResponse {
        data: Dashboard {
            mass_parts: MassPart::choices(),
            seasons: Season::choices(),
            published_count,
            recent_songs,
        },
    }))
}
