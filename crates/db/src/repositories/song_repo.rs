//! Repository for the `songs` table and whole-aggregate writes.

use cantus_core::assets::AssetKind;
use cantus_core::browse::LibraryQuery;
use cantus_core::catalog::SongStatus;
use cantus_core::error::CoreError;
use cantus_core::slug::{generate_slug, slug_space_exhausted, MAX_SLUG_ATTEMPTS};
use cantus_core::types::DbId;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgConnection, PgPool, Postgres};

use crate::models::asset::{AssetChange, NewAsset, SongAsset};
use crate::models::song::{NewSong, Song, SongDetail, UpdateSong};
use crate::repositories::SongAssetRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, slug, title, composer, arranged_by, part_of_mass, season, status, \
                        mtn, mtn_number, youtube_link, submitted_by, created_at, updated_at";

/// Newest first, with `id` breaking ties between same-instant inserts.
const NEWEST_FIRST: &str = "ORDER BY created_at DESC, id DESC";

/// Failure while inserting a new song.
#[derive(Debug, thiserror::Error)]
pub enum SongInsertError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Every slug candidate collided.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result of a staff edit.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub song: Song,
    /// Blobs no longer referenced by any row (replaced or removed files and
    /// their thumbnails).
    pub obsolete_locators: Vec<String>,
}

/// Escape `%`, `_` and `\` so user text matches literally inside ILIKE.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// WHERE clause and binds for the public library listing.
struct PublishedFilter {
    conditions: Vec<String>,
    text: Option<(String, Vec<String>, Vec<String>)>,
    seasons: Option<Vec<String>>,
    parts: Option<Vec<String>>,
    next_idx: u32,
}

impl PublishedFilter {
    fn new(query: &LibraryQuery) -> Self {
        let mut conditions = vec![format!("status = '{}'", SongStatus::Published.code())];
        let mut bind_idx = 1u32;

        let text = (!query.text.is_empty()).then(|| {
            conditions.push(format!(
                "(title ILIKE ${i} OR composer ILIKE ${i} \
                  OR season = ANY(${s}) OR part_of_mass = ANY(${p}))",
                i = bind_idx,
                s = bind_idx + 1,
                p = bind_idx + 2,
            ));
            bind_idx += 3;
            (
                like_pattern(&query.text),
                to_owned(query.text_season_codes()),
                to_owned(query.text_part_codes()),
            )
        });

        let seasons = (!query.seasons.is_empty()).then(|| {
            conditions.push(format!("season = ANY(${bind_idx})"));
            bind_idx += 1;
            to_owned(query.season_codes())
        });

        let parts = (!query.parts.is_empty()).then(|| {
            conditions.push(format!("part_of_mass = ANY(${bind_idx})"));
            bind_idx += 1;
            to_owned(query.part_codes())
        });

        Self {
            conditions,
            text,
            seasons,
            parts,
            next_idx: bind_idx,
        }
    }

    fn where_clause(&self) -> String {
        format!("WHERE {}", self.conditions.join(" AND "))
    }

    /// Bind parameters in the same order the conditions were built.
    fn bind<'q, O>(
        &self,
        mut q: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        if let Some((pattern, seasons, parts)) = &self.text {
            q = q.bind(pattern.clone()).bind(seasons.clone()).bind(parts.clone());
        }
        if let Some(seasons) = &self.seasons {
            q = q.bind(seasons.clone());
        }
        if let Some(parts) = &self.parts {
            q = q.bind(parts.clone());
        }
        q
    }
}

fn to_owned(codes: Vec<&'static str>) -> Vec<String> {
    codes.into_iter().map(str::to_string).collect()
}

/// Provides reads and aggregate writes for songs.
pub struct SongRepo;

impl SongRepo {
    /// Insert a song with its assets in one transaction.
    ///
    /// The slug is drawn from the CSPRNG and retried on collision, at most
    /// [`MAX_SLUG_ATTEMPTS`] times.
    pub async fn create_with_assets(
        pool: &PgPool,
        input: &NewSong,
        assets: &[NewAsset],
    ) -> Result<SongDetail, SongInsertError> {
        Self::create_with_assets_using(pool, input, assets, generate_slug).await
    }

    /// [`Self::create_with_assets`] with a caller-supplied slug source.
    pub async fn create_with_assets_using<F>(
        pool: &PgPool,
        input: &NewSong,
        assets: &[NewAsset],
        mut next_slug: F,
    ) -> Result<SongDetail, SongInsertError>
    where
        F: FnMut() -> String,
    {
        let mut tx = pool.begin().await?;

        let mut inserted = None;
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let candidate = next_slug();
            match Self::insert_with_slug(&mut tx, input, &candidate).await? {
                Some(song) => {
                    inserted = Some(song);
                    break;
                }
                None => {
                    tracing::warn!(attempt, slug = %candidate, "Slug collision, regenerating");
                }
            }
        }
        let song = inserted.ok_or_else(slug_space_exhausted)?;

        let mut detail = SongDetail {
            song,
            sheets: Vec::new(),
            midi_files: Vec::new(),
            mp3_files: Vec::new(),
        };
        for asset in assets {
            let row = SongAssetRepo::create_on(&mut tx, detail.song.id, asset).await?;
            push_asset(&mut detail, row);
        }

        tx.commit().await?;
        Ok(detail)
    }

    /// Insert a song row under `slug`.
    ///
    /// Returns `None` when the slug is already taken; the unique constraint
    /// is the final arbiter under concurrent inserts.
    pub async fn insert_with_slug(
        conn: &mut PgConnection,
        input: &NewSong,
        slug: &str,
    ) -> Result<Option<Song>, sqlx::Error> {
        let query = format!(
            "INSERT INTO songs \
                (slug, title, composer, arranged_by, part_of_mass, season, status, \
                 mtn, mtn_number, youtube_link, submitted_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT ON CONSTRAINT uq_songs_slug DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let fields = &input.fields;
        sqlx::query_as::<_, Song>(&query)
            .bind(slug)
            .bind(&fields.title)
            .bind(&fields.composer)
            .bind(&fields.arranged_by)
            .bind(fields.part_of_mass.code())
            .bind(fields.season.code())
            .bind(input.status.code())
            .bind(fields.mtn)
            .bind(&fields.mtn_number)
            .bind(&fields.youtube_link)
            .bind(input.submitted_by)
            .fetch_optional(conn)
            .await
    }

    /// Find a song by its public slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Song>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM songs WHERE slug = $1");
        sqlx::query_as::<_, Song>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Find a song by slug together with all of its assets.
    pub async fn find_detail_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<SongDetail>, sqlx::Error> {
        match Self::find_by_slug(pool, slug).await? {
            Some(song) => Ok(Some(Self::load_detail(pool, song).await?)),
            None => Ok(None),
        }
    }

    /// Attach every asset of `song`.
    pub async fn load_detail(pool: &PgPool, song: Song) -> Result<SongDetail, sqlx::Error> {
        Ok(SongDetail {
            sheets: SongAssetRepo::list_for_song(pool, AssetKind::Sheet, song.id).await?,
            midi_files: SongAssetRepo::list_for_song(pool, AssetKind::Midi, song.id).await?,
            mp3_files: SongAssetRepo::list_for_song(pool, AssetKind::Audio, song.id).await?,
            song,
        })
    }

    /// Replace a song's core fields. The slug never changes.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSong,
    ) -> Result<Option<Song>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::update_on(&mut conn, id, input).await
    }

    async fn update_on(
        conn: &mut PgConnection,
        id: DbId,
        input: &UpdateSong,
    ) -> Result<Option<Song>, sqlx::Error> {
        let query = format!(
            "UPDATE songs SET \
                title = $2, \
                composer = $3, \
                arranged_by = $4, \
                part_of_mass = $5, \
                season = $6, \
                status = COALESCE($7, status), \
                mtn = $8, \
                mtn_number = $9, \
                youtube_link = $10 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let fields = &input.fields;
        sqlx::query_as::<_, Song>(&query)
            .bind(id)
            .bind(&fields.title)
            .bind(&fields.composer)
            .bind(&fields.arranged_by)
            .bind(fields.part_of_mass.code())
            .bind(fields.season.code())
            .bind(input.status.map(|s| s.code()))
            .bind(fields.mtn)
            .bind(&fields.mtn_number)
            .bind(&fields.youtube_link)
            .fetch_optional(conn)
            .await
    }

    /// Apply a staff edit: core fields plus asset changes, atomically.
    ///
    /// Returns `None` if the song does not exist. A change naming an asset
    /// that is no longer attached to the song fails with `RowNotFound` and
    /// rolls everything back.
    pub async fn apply_edit(
        pool: &PgPool,
        id: DbId,
        update: &UpdateSong,
        changes: &[AssetChange],
    ) -> Result<Option<EditOutcome>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(song) = Self::update_on(&mut tx, id, update).await? else {
            return Ok(None);
        };

        let mut obsolete_locators = Vec::new();
        for change in changes {
            match change {
                AssetChange::Add(asset) => {
                    SongAssetRepo::create_on(&mut tx, id, asset).await?;
                }
                AssetChange::Replace {
                    kind,
                    id: asset_id,
                    file,
                    version,
                } => {
                    let current = SongAssetRepo::find_for_update_on(&mut tx, *kind, id, *asset_id)
                        .await?
                        .ok_or(sqlx::Error::RowNotFound)?;
                    if file.is_some() {
                        obsolete_locators.extend(current.locators());
                    }
                    SongAssetRepo::replace_on(&mut tx, *kind, *asset_id, file.as_ref(), version)
                        .await?;
                }
                AssetChange::Remove { kind, id: asset_id } => {
                    let current = SongAssetRepo::find_for_update_on(&mut tx, *kind, id, *asset_id)
                        .await?
                        .ok_or(sqlx::Error::RowNotFound)?;
                    SongAssetRepo::delete_on(&mut tx, *kind, *asset_id).await?;
                    obsolete_locators.extend(current.locators());
                }
            }
        }

        tx.commit().await?;
        Ok(Some(EditOutcome {
            song,
            obsolete_locators,
        }))
    }

    /// Delete a song; its assets cascade.
    ///
    /// Returns the blob locators of every removed asset, or `None` if the
    /// song did not exist.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<Option<Vec<String>>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let mut locators = Vec::new();
        for kind in AssetKind::ALL {
            for asset in SongAssetRepo::list_for_song_on(&mut tx, kind, id).await? {
                locators.extend(asset.locators());
            }
        }

        let result = sqlx::query("DELETE FROM songs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(locators))
    }

    /// Page of published songs matching `query`, newest first.
    pub async fn list_published(
        pool: &PgPool,
        query: &LibraryQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Song>, sqlx::Error> {
        let filter = PublishedFilter::new(query);
        let sql = format!(
            "SELECT {COLUMNS} FROM songs {where_clause} {NEWEST_FIRST} \
             LIMIT ${limit_idx} OFFSET ${offset_idx}",
            where_clause = filter.where_clause(),
            limit_idx = filter.next_idx,
            offset_idx = filter.next_idx + 1,
        );
        filter
            .bind(sqlx::query_as::<_, Song>(&sql))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Number of published songs matching `query`.
    pub async fn count_published(pool: &PgPool, query: &LibraryQuery) -> Result<i64, sqlx::Error> {
        let filter = PublishedFilter::new(query);
        let sql = format!("SELECT COUNT(*) FROM songs {}", filter.where_clause());
        let (count,): (i64,) = filter
            .bind(sqlx::query_as::<_, (i64,)>(&sql))
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Every song for the moderation queue: pending first, then newest.
    ///
    /// `text` filters title and composer case-insensitively.
    pub async fn list_for_moderation(pool: &PgPool, text: &str) -> Result<Vec<Song>, sqlx::Error> {
        if text.is_empty() {
            let query = format!(
                "SELECT {COLUMNS} FROM songs \
                 ORDER BY status ASC, created_at DESC, id DESC"
            );
            return sqlx::query_as::<_, Song>(&query).fetch_all(pool).await;
        }
        let query = format!(
            "SELECT {COLUMNS} FROM songs \
             WHERE title ILIKE $1 OR composer ILIKE $1 \
             ORDER BY status ASC, created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Song>(&query)
            .bind(like_pattern(text))
            .fetch_all(pool)
            .await
    }

    /// Page of a member's own submissions, newest first.
    pub async fn list_by_submitter(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Song>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM songs WHERE submitted_by = $1 {NEWEST_FIRST} \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Song>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Number of songs submitted by a member.
    pub async fn count_by_submitter(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs WHERE submitted_by = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Most recent published songs for the dashboard.
    pub async fn list_recent_published(pool: &PgPool, limit: i64) -> Result<Vec<Song>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM songs WHERE status = $1 {NEWEST_FIRST} LIMIT $2"
        );
        sqlx::query_as::<_, Song>(&query)
            .bind(SongStatus::Published.code())
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

fn push_asset(detail: &mut SongDetail, asset: SongAsset) {
    match asset.kind {
        AssetKind::Sheet => detail.sheets.push(asset),
        AssetKind::Midi => detail.midi_files.push(asset),
        AssetKind::Audio => detail.mp3_files.push(asset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ave"), "%ave%");
        assert_eq!(like_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }

    #[test]
    fn test_published_filter_numbering() {
        let query = LibraryQuery::from_pairs(&[
            ("q".to_string(), "gloria".to_string()),
            ("season".to_string(), "christmas".to_string()),
            ("part".to_string(), "gloria".to_string()),
        ]);
        let filter = PublishedFilter::new(&query);
        let clause = filter.where_clause();
        assert!(clause.starts_with("WHERE status = 'published'"));
        assert!(clause.contains("title ILIKE $1"));
        assert!(clause.contains("part_of_mass = ANY($3)"));
        assert!(clause.contains("season = ANY($4)"));
        assert!(clause.contains("part_of_mass = ANY($5)"));
        assert_eq!(filter.next_idx, 6);
    }

    #[test]
    fn test_empty_filter_is_status_only() {
        let filter = PublishedFilter::new(&LibraryQuery::default());
        assert_eq!(filter.where_clause(), "WHERE status = 'published'");
        assert_eq!(filter.next_idx, 1);
    }
}
