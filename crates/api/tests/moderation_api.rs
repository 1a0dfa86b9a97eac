//! HTTP-level tests for staff moderation: arrivals, full edit with asset
//! entries, single-asset delete, and quick attach.

mod common;

use axum::http::StatusCode;
use cantus_core::catalog::SongStatus;
use common::{
    body_json, create_song, create_user, get, get_auth, get_with_header, post_auth,
    post_multipart_auth, MultipartBody, TestApp, MIDI_BYTES, MP3_BYTES,
};
use serde_json::Value;
use sqlx::PgPool;

/// Submit a song through the API and return the created detail.
async fn submit(app: &TestApp, token: &str, form: MultipartBody) -> Value {
    let response = post_multipart_auth(app.app(), "/songs/upload", form, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// `(file_locator, thumbnail_locator)` of an asset row; locators are not
/// part of the JSON.
async fn locators(pool: &PgPool, table: &str, asset: &Value) -> (String, Option<String>) {
    let thumb = if table == "music_sheets" {
        "thumbnail_locator"
    } else {
        "NULL::TEXT"
    };
    let query = format!("SELECT file_locator, {thumb} FROM {table} WHERE id = $1");
    sqlx::query_as(&query)
        .bind(asset["id"].as_i64().unwrap())
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Arrivals
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_arrivals_pending_first(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    create_song(&pool, "Old Pending", SongStatus::PendingApproval, None).await;
    create_song(&pool, "Published", SongStatus::Published, None).await;
    create_song(&pool, "New Pending", SongStatus::PendingApproval, None).await;
    let app = common::build_test_app(pool);
    let token = app.token_for(&staff);

    let data = body_json(get_auth(app.app(), "/admin/arrivals", &token).await).await["data"].clone();
    let titles: Vec<&str> = data["songs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["New Pending", "Old Pending", "Published"]);
    assert_eq!(data["q"], "");
    assert_eq!(data["status_choices"][0]["code"], "pending_approval");

    let data = body_json(get_auth(app.app(), "/admin/arrivals?q=old", &token).await).await["data"]
        .clone();
    assert_eq!(data["songs"].as_array().unwrap().len(), 1);
    assert_eq!(data["q"], "old");

    let response =
        get_with_header(app.app(), "/admin/arrivals", Some(&token), "hx-request", "true").await;
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["songs"].as_array().unwrap().len(), 3);
    assert!(data.get("status_choices").is_none());
}

// ---------------------------------------------------------------------------
// Full edit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_edit_form_includes_assets_and_choices(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let song = create_song(&pool, "Magnificat", SongStatus::PendingApproval, None).await;
    let app = common::build_test_app(pool);

    let response = get_auth(
        app.app(),
        &format!("/admin/songs/{}", song.slug),
        &app.token_for(&staff),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["song"]["title"], "Magnificat");
    assert!(data["sheets"].is_array());
    assert_eq!(data["statuses"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_edit_applies_every_command(pool: PgPool) {
    let member = create_user(&pool, "member", false).await;
    let staff = create_user(&pool, "warden", true).await;
    let app = common::build_test_app(pool.clone());

    let created = submit(
        &app,
        &app.token_for(&member),
        MultipartBody::new()
            .song_fields("Regina Caeli")
            .file("midi_file", "rc.mid", "audio/midi", MIDI_BYTES)
            .text("midi_version", "Organ")
            .file("mp3_file", "rc-take1.mp3", "audio/mpeg", MP3_BYTES)
            .text("mp3_version", "Take 1"),
    )
    .await;
    let slug = created["song"]["slug"].as_str().unwrap().to_string();
    let midi = created["midi_files"][0].clone();
    let mp3 = created["mp3_files"][0].clone();
    let (old_midi, _) = locators(&pool, "midi_files", &midi).await;
    let (old_mp3, _) = locators(&pool, "mp3_files", &mp3).await;
    assert!(app.blob_path(&old_midi).exists());

    let form = MultipartBody::new()
        .song_fields("Regina Caeli (revised)")
        .text("status", "published")
        // Remove the MIDI file.
        .text("midi-0-id", &midi["id"].to_string())
        .text("midi-0-version", "Organ")
        .text("midi-0-DELETE", "on")
        // Swap the recording.
        .text("audio-0-id", &mp3["id"].to_string())
        .file("audio-0-file", "rc-take2.mp3", "audio/mpeg", MP3_BYTES)
        .text("audio-0-version", "Take 2")
        // Add a sheet.
        .file("sheet-0-file", "rc.png", "image/png", &common::png_bytes())
        .text("sheet-0-version", "SATB")
        // Blank extra entry is skipped.
        .text("sheet-1-id", "")
        .text("sheet-1-version", "");

    let response = post_multipart_auth(
        app.app(),
        &format!("/admin/songs/{slug}"),
        form,
        &app.token_for(&staff),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Manuscript 'Regina Caeli (revised)' updated successfully."
    );

    let data = &json["data"];
    assert_eq!(data["song"]["status"], "published");
    assert_eq!(data["song"]["slug"], slug.as_str());
    assert!(data["midi_files"].as_array().unwrap().is_empty());
    assert_eq!(data["mp3_files"][0]["id"], mp3["id"]);
    assert_eq!(data["mp3_files"][0]["version"], "Take 2");
    assert_eq!(data["mp3_files"][0]["original_name"], "rc-take2.mp3");
    assert_eq!(data["sheets"][0]["version"], "SATB");

    // Old blobs are gone, new ones exist.
    assert!(!app.blob_path(&old_midi).exists());
    assert!(!app.blob_path(&old_mp3).exists());
    let (new_mp3, _) = locators(&pool, "mp3_files", &data["mp3_files"][0]).await;
    assert_ne!(new_mp3, old_mp3);
    assert!(app.blob_path(&new_mp3).exists());
    let (sheet, thumbnail) = locators(&pool, "music_sheets", &data["sheets"][0]).await;
    assert!(app.blob_path(&sheet).exists());
    assert!(app.blob_path(&thumbnail.expect("sheet thumbnail generated")).exists());

    let library = body_json(get(app.app(), "/songs/library").await).await;
    assert_eq!(library["data"]["songs"][0]["slug"], slug.as_str());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_edit_rejects_foreign_asset(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let app = common::build_test_app(pool.clone());
    let token = app.token_for(&staff);

    let first = submit(
        &app,
        &token,
        MultipartBody::new()
            .song_fields("First")
            .file("mp3_file", "a.mp3", "audio/mpeg", MP3_BYTES)
            .text("mp3_version", "A"),
    )
    .await;
    let second = submit(&app, &token, MultipartBody::new().song_fields("Second")).await;
    let slug = second["song"]["slug"].as_str().unwrap();

    let form = MultipartBody::new()
        .song_fields("Second")
        .text("audio-0-id", &first["mp3_files"][0]["id"].to_string())
        .text("audio-0-DELETE", "on")
        .file("midi-0-file", "new.mid", "audio/midi", MIDI_BYTES)
        .text("midi-0-version", "");

    let response = post_multipart_auth(app.app(), &format!("/admin/songs/{slug}"), form, &token).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let fields = &body_json(response).await["fields"];
    assert!(fields["audio-0-id"].is_array());
    assert!(fields["midi-0-version"].is_array());

    // Nothing changed: the other song keeps its recording, no MIDI was stored.
    let (mp3s,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mp3_files")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mp3s, 1);
    assert!(!app.blob_path("midi_files").exists());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_edit_never_blanks_a_version(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let app = common::build_test_app(pool.clone());
    let token = app.token_for(&staff);

    let created = submit(
        &app,
        &token,
        MultipartBody::new()
            .song_fields("Salve Regina")
            .file("mp3_file", "salve.mp3", "audio/mpeg", MP3_BYTES)
            .text("mp3_version", "Take 1"),
    )
    .await;
    let slug = created["song"]["slug"].as_str().unwrap();
    let mp3_id = created["mp3_files"][0]["id"].as_i64().unwrap();

    let form = MultipartBody::new()
        .song_fields("Salve Regina")
        .text("audio-0-id", &mp3_id.to_string());
    let response = post_multipart_auth(app.app(), &format!("/admin/songs/{slug}"), form, &token).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let fields = &body_json(response).await["fields"];
    assert_eq!(fields["audio-0-version"][0], "This field is required.");

    let form = MultipartBody::new()
        .song_fields("Salve Regina")
        .text("audio-0-id", &mp3_id.to_string())
        .text("audio-0-version", &"x".repeat(300));
    let response = post_multipart_auth(app.app(), &format!("/admin/songs/{slug}"), form, &token).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (version,): (String,) = sqlx::query_as("SELECT version FROM mp3_files WHERE id = $1")
        .bind(mp3_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, "Take 1");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_edit_unknown_song(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let app = common::build_test_app(pool);

    let response = post_multipart_auth(
        app.app(),
        "/admin/songs/ZZZZZZZZZZZZZZZZ",
        MultipartBody::new().song_fields("Ghost"),
        &app.token_for(&staff),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Asset delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_asset_keeps_song(pool: PgPool) {
    let member = create_user(&pool, "member", false).await;
    let staff = create_user(&pool, "warden", true).await;
    let app = common::build_test_app(pool.clone());

    let created = submit(
        &app,
        &app.token_for(&member),
        MultipartBody::new()
            .song_fields("Keep Me")
            .file("mp3_file", "k.mp3", "audio/mpeg", MP3_BYTES)
            .text("mp3_version", "Live"),
    )
    .await;
    let slug = created["song"]["slug"].as_str().unwrap();
    let mp3 = created["mp3_files"][0].clone();
    let (mp3_blob, _) = locators(&pool, "mp3_files", &mp3).await;
    let uri = format!("/admin/assets/audio/{}/delete", mp3["id"]);

    let response = post_auth(app.app(), &uri, &app.token_for(&member)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_auth(app.app(), &uri, &app.token_for(&staff)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Asset removed from manuscript."
    );
    assert!(!app.blob_path(&mp3_blob).exists());

    let detail = body_json(get(app.app(), &format!("/songs/{slug}")).await).await;
    assert_eq!(detail["data"]["song"]["title"], "Keep Me");
    assert!(detail["data"]["mp3_files"].as_array().unwrap().is_empty());

    let response = post_auth(app.app(), &uri, &app.token_for(&staff)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_auth(app.app(), "/admin/assets/video/1/delete", &app.token_for(&staff)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Quick attach
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_quick_upload_sheet_defaults(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let song = create_song(&pool, "Quick", SongStatus::Published, None).await;
    let app = common::build_test_app(pool.clone());

    let response = post_multipart_auth(
        app.app(),
        &format!("/admin/songs/{}/upload-sheet", song.slug),
        MultipartBody::new().file("file", "q.png", "image/png", &common::png_bytes()),
        &app.token_for(&staff),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Folio manuscript added.");
    assert_eq!(json["data"]["version"], "Standard Folio");
    assert_eq!(json["data"]["song_id"], song.id);
    let (_, thumbnail) = locators(&pool, "music_sheets", &json["data"]).await;
    assert!(thumbnail.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_quick_upload_audio_and_midi(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let song = create_song(&pool, "Quick", SongStatus::Published, None).await;
    let app = common::build_test_app(pool);
    let token = app.token_for(&staff);

    let response = post_multipart_auth(
        app.app(),
        &format!("/admin/songs/{}/upload-audio", song.slug),
        MultipartBody::new()
            .file("file", "q.mp3", "audio/mpeg", MP3_BYTES)
            .text("mp3_version", "Cathedral Choir"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Audio asset synced.");
    assert_eq!(json["data"]["version"], "Cathedral Choir");

    let response = post_multipart_auth(
        app.app(),
        &format!("/admin/songs/{}/upload-midi", song.slug),
        MultipartBody::new().file("file", "q.mid", "audio/midi", MIDI_BYTES),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Midi sequence added.");
    assert_eq!(json["data"]["version"], "Synthesized Logic");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_quick_upload_requires_file(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let song = create_song(&pool, "Quick", SongStatus::Published, None).await;
    let app = common::build_test_app(pool);
    let token = app.token_for(&staff);

    let response = post_multipart_auth(
        app.app(),
        &format!("/admin/songs/{}/upload-midi", song.slug),
        MultipartBody::new().text("midi_version", "Lonely label"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["fields"]["file"][0],
        "This field is required."
    );

    let response = post_multipart_auth(
        app.app(),
        "/admin/songs/ZZZZZZZZZZZZZZZZ/upload-midi",
        MultipartBody::new().file("file", "q.mid", "audio/midi", MIDI_BYTES),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_quick_upload_rejects_overlong_version(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let song = create_song(&pool, "Quick", SongStatus::Published, None).await;
    let app = common::build_test_app(pool.clone());

    let response = post_multipart_auth(
        app.app(),
        &format!("/admin/songs/{}/upload-audio", song.slug),
        MultipartBody::new()
            .file("file", "q.mp3", "audio/mpeg", MP3_BYTES)
            .text("mp3_version", &"x".repeat(257)),
        &app.token_for(&staff),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["fields"]["mp3_version"].is_array());

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mp3_files")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
