//! Repository for the `music_sheets`, `midi_files` and `mp3_files` tables.
//!
//! The three tables share one shape, so every query is built from the
//! table name on [`AssetKind`]. The `*_on` variants run on a caller-owned
//! connection so `SongRepo` can use them inside its transactions.

use cantus_core::assets::AssetKind;
use cantus_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::asset::{NewAsset, SongAsset, StoredFile};

/// Select list for `kind`. The kind is a literal and `thumbnail_locator`
/// is `NULL` outside the sheets table.
fn columns(kind: AssetKind) -> String {
    let thumbnail = match kind {
        AssetKind::Sheet => "thumbnail_locator",
        AssetKind::Midi | AssetKind::Audio => "NULL::TEXT AS thumbnail_locator",
    };
    format!(
        "id, song_id, '{code}' AS kind, file_locator, original_name, content_type, \
         size_bytes, version, {thumbnail}, created_at, updated_at",
        code = kind.code()
    )
}

/// Provides CRUD operations for dependent song assets.
pub struct SongAssetRepo;

impl SongAssetRepo {
    /// Attach a new asset to a song.
    pub async fn create(
        pool: &PgPool,
        song_id: DbId,
        input: &NewAsset,
    ) -> Result<SongAsset, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::create_on(&mut conn, song_id, input).await
    }

    pub(crate) async fn create_on(
        conn: &mut PgConnection,
        song_id: DbId,
        input: &NewAsset,
    ) -> Result<SongAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO {table} \
                (song_id, file_locator, original_name, content_type, size_bytes, version) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {columns}",
            table = input.kind.table(),
            columns = columns(input.kind),
        );
        sqlx::query_as::<_, SongAsset>(&query)
            .bind(song_id)
            .bind(&input.file.file_locator)
            .bind(&input.file.original_name)
            .bind(&input.file.content_type)
            .bind(input.file.size_bytes)
            .bind(&input.version)
            .fetch_one(conn)
            .await
    }

    /// Find one asset by kind and id.
    pub async fn find_by_id(
        pool: &PgPool,
        kind: AssetKind,
        id: DbId,
    ) -> Result<Option<SongAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {columns} FROM {table} WHERE id = $1",
            columns = columns(kind),
            table = kind.table(),
        );
        sqlx::query_as::<_, SongAsset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a song's assets of one kind, oldest first.
    pub async fn list_for_song(
        pool: &PgPool,
        kind: AssetKind,
        song_id: DbId,
    ) -> Result<Vec<SongAsset>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::list_for_song_on(&mut conn, kind, song_id).await
    }

    pub(crate) async fn list_for_song_on(
        conn: &mut PgConnection,
        kind: AssetKind,
        song_id: DbId,
    ) -> Result<Vec<SongAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {columns} FROM {table} WHERE song_id = $1 ORDER BY created_at, id",
            columns = columns(kind),
            table = kind.table(),
        );
        sqlx::query_as::<_, SongAsset>(&query)
            .bind(song_id)
            .fetch_all(conn)
            .await
    }

    /// Lock one asset of a song for update inside a transaction.
    pub(crate) async fn find_for_update_on(
        conn: &mut PgConnection,
        kind: AssetKind,
        song_id: DbId,
        id: DbId,
    ) -> Result<Option<SongAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {columns} FROM {table} WHERE id = $1 AND song_id = $2 FOR UPDATE",
            columns = columns(kind),
            table = kind.table(),
        );
        sqlx::query_as::<_, SongAsset>(&query)
            .bind(id)
            .bind(song_id)
            .fetch_optional(conn)
            .await
    }

    /// Set an asset's version and optionally swap its file.
    ///
    /// Swapping a sheet's file clears its thumbnail so it is regenerated.
    pub(crate) async fn replace_on(
        conn: &mut PgConnection,
        kind: AssetKind,
        id: DbId,
        file: Option<&StoredFile>,
        version: &str,
    ) -> Result<SongAsset, sqlx::Error> {
        let clear_thumbnail = match kind {
            AssetKind::Sheet => ", thumbnail_locator = CASE WHEN $3 IS NULL \
                                 THEN thumbnail_locator ELSE NULL END",
            AssetKind::Midi | AssetKind::Audio => "",
        };
        let query = format!(
            "UPDATE {table} SET \
                version = $2, \
                file_locator = COALESCE($3, file_locator), \
                original_name = COALESCE($4, original_name), \
                content_type = COALESCE($5, content_type), \
                size_bytes = COALESCE($6, size_bytes){clear_thumbnail} \
             WHERE id = $1 \
             RETURNING {columns}",
            table = kind.table(),
            columns = columns(kind),
        );
        sqlx::query_as::<_, SongAsset>(&query)
            .bind(id)
            .bind(version)
            .bind(file.map(|f| f.file_locator.as_str()))
            .bind(file.map(|f| f.original_name.as_str()))
            .bind(file.map(|f| f.content_type.as_str()))
            .bind(file.map(|f| f.size_bytes))
            .fetch_one(conn)
            .await
    }

    /// Delete one asset, returning the removed row so its blobs can be
    /// cleaned up. The parent song is never touched.
    pub async fn delete(
        pool: &PgPool,
        kind: AssetKind,
        id: DbId,
    ) -> Result<Option<SongAsset>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::delete_on(&mut conn, kind, id).await
    }

    pub(crate) async fn delete_on(
        conn: &mut PgConnection,
        kind: AssetKind,
        id: DbId,
    ) -> Result<Option<SongAsset>, sqlx::Error> {
        let query = format!(
            "DELETE FROM {table} WHERE id = $1 RETURNING {columns}",
            table = kind.table(),
            columns = columns(kind),
        );
        sqlx::query_as::<_, SongAsset>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Music sheets of a song that still lack a thumbnail.
    pub async fn list_sheets_missing_thumbnail(
        pool: &PgPool,
        song_id: DbId,
    ) -> Result<Vec<SongAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {columns} FROM music_sheets \
             WHERE song_id = $1 AND thumbnail_locator IS NULL \
             ORDER BY id",
            columns = columns(AssetKind::Sheet),
        );
        sqlx::query_as::<_, SongAsset>(&query)
            .bind(song_id)
            .fetch_all(pool)
            .await
    }

    /// Record a generated thumbnail, unless the sheet already has one or its
    /// file changed since rendering started.
    ///
    /// Returns `true` when the locator was stored.
    pub async fn set_thumbnail(
        pool: &PgPool,
        sheet_id: DbId,
        source_locator: &str,
        thumbnail_locator: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE music_sheets SET thumbnail_locator = $3 \
             WHERE id = $1 AND file_locator = $2 AND thumbnail_locator IS NULL",
        )
        .bind(sheet_id)
        .bind(source_locator)
        .bind(thumbnail_locator)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
