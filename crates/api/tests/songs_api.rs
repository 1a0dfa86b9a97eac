//! HTTP-level tests for member song workflows: submission, owner edit,
//! "my songs", and staff delete.

mod common;

use axum::http::StatusCode;
use cantus_core::catalog::SongStatus;
use cantus_db::repositories::SongRepo;
use common::{
    body_bytes, body_json, create_song, create_user, get, get_auth, post_auth, post_form_auth,
    post_json_auth, post_multipart_auth, MultipartBody, MIDI_BYTES, MP3_BYTES,
};
use sqlx::PgPool;

/// Count files under one bucket of the media root.
fn bucket_len(app: &common::TestApp, bucket: &str) -> usize {
    std::fs::read_dir(app.blob_path(bucket))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Upload schema
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_form_schema(pool: PgPool) {
    let member = create_user(&pool, "member", false).await;
    let app = common::build_test_app(pool);

    let response = get(app.app(), "/songs/upload").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_auth(app.app(), "/songs/upload", &app.token_for(&member)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();

    assert_eq!(data["seasons"].as_array().unwrap().len(), 5);
    assert_eq!(data["assets"][0]["kind"], "sheet");
    assert_eq!(data["assets"][0]["file_field"], "music_sheet");
    assert_eq!(data["assets"][0]["version_field"], "ms_version");
    assert_eq!(
        data["assets"][0]["accepted_extensions"],
        serde_json::json!(["pdf", "png", "jpg", "jpeg"])
    );
    assert_eq!(data["assets"][2]["file_field"], "mp3_file");
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_member_submission_is_pending(pool: PgPool) {
    let member = create_user(&pool, "member", false).await;
    let app = common::build_test_app(pool);

    let form = MultipartBody::new()
        .song_fields("Salve Regina")
        .file("music_sheet", "salve.png", "image/png", &common::png_bytes())
        .text("ms_version", "SATB")
        .file("midi_file", "salve.mid", "audio/midi", MIDI_BYTES)
        .text("midi_version", "Organ")
        // A version without a file is ignored.
        .text("mp3_version", "Choir");

    let response =
        post_multipart_auth(app.app(), "/songs/upload", form, &app.token_for(&member)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Song \"Salve Regina\" uploaded successfully! It will be reviewed before publication."
    );
    let data = &json["data"];
    assert_eq!(data["song"]["status"], "pending_approval");
    assert_eq!(data["song"]["submitted_by"], member.id);
    let slug = data["song"]["slug"].as_str().unwrap();
    assert_eq!(slug.len(), 16);
    assert!(slug.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    assert_eq!(data["sheets"][0]["version"], "SATB");
    assert_eq!(data["sheets"][0]["original_name"], "salve.png");
    assert_eq!(data["midi_files"][0]["version"], "Organ");
    assert!(data["mp3_files"].as_array().unwrap().is_empty());

    // Pending songs stay out of the library.
    let library = body_json(get(app.app(), "/songs/library").await).await;
    assert!(library["data"]["songs"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_staff_submission_publishes_with_thumbnail(pool: PgPool) {
    let staff = create_user(&pool, "warden", true).await;
    let app = common::build_test_app(pool.clone());

    let form = MultipartBody::new()
        .song_fields("Te Deum")
        .file("music_sheet", "te-deum.png", "image/png", &common::png_bytes())
        .text("ms_version", "Unison")
        .file("mp3_file", "te-deum.mp3", "audio/mpeg", MP3_BYTES)
        .text("mp3_version", "Live");

    let response =
        post_multipart_auth(app.app(), "/songs/upload", form, &app.token_for(&staff)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Song \"Te Deum\" uploaded and published successfully!"
    );
    let slug = json["data"]["song"]["slug"].as_str().unwrap().to_string();
    let sheet_id = json["data"]["sheets"][0]["id"].as_i64().unwrap();

    let detail = SongRepo::find_detail_by_slug(&pool, &slug)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.song.status, SongStatus::Published);
    assert!(detail.sheets[0].thumbnail_locator.is_some());

    let response = get(
        app.app(),
        &format!("/songs/assets/sheet/{sheet_id}/thumbnail"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");
    let jpeg = body_bytes(response).await;
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let library = body_json(get(app.app(), "/songs/library").await).await;
    assert_eq!(library["data"]["songs"][0]["slug"], slug.as_str());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_invalid_submission_stores_nothing(pool: PgPool) {
    let member = create_user(&pool, "member", false).await;
    let app = common::build_test_app(pool.clone());

    let form = MultipartBody::new()
        .text("title", "   ")
        .text("composer", "Anon")
        .text("part_of_mass", "communion")
        .text("season", "pentecost")
        .text("mtn", "on")
        .file("midi_file", "tune.mid", "audio/midi", MIDI_BYTES)
        .file("mp3_file", "tune.wav", "audio/wav", MP3_BYTES)
        .text("mp3_version", "Live");

    let response =
        post_multipart_auth(app.app(), "/songs/upload", form, &app.token_for(&member)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Please correct the errors below.");
    let fields = &json["fields"];
    assert_eq!(fields["title"][0], "This field is required.");
    assert!(fields["season"].is_array());
    assert_eq!(
        fields["mtn_number"][0],
        "MTN number is required when MTN is selected."
    );
    assert_eq!(
        fields["midi_version"][0],
        "MIDI version is required when uploading a MIDI file."
    );
    assert!(fields["mp3_file"].is_array());

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(bucket_len(&app, "midi_files"), 0);
    assert_eq!(bucket_len(&app, "mp3_files"), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_submission_requires_auth(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_multipart_auth(
        app.app(),
        "/songs/upload",
        MultipartBody::new().song_fields("Anon"),
        "bogus",
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Owner edit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_owner_edit_keeps_status(pool: PgPool) {
    let owner = create_user(&pool, "owner", false).await;
    let song = create_song(&pool, "Draft", SongStatus::PendingApproval, Some(owner.id)).await;
    let app = common::build_test_app(pool.clone());
    let token = app.token_for(&owner);

    let response = get_auth(app.app(), &format!("/songs/{}/edit", song.slug), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let form = body_json(response).await;
    assert_eq!(form["data"]["song"]["title"], "Draft");

    let response = post_form_auth(
        app.app(),
        &format!("/songs/{}/edit", song.slug),
        &[
            ("title", "Final Title"),
            ("composer", "J. Doe"),
            ("part_of_mass", "entrance"),
            ("season", "advent"),
            ("mtn", "on"),
            ("mtn_number", "MTN 12"),
            // Owners cannot publish through this form.
            ("status", "published"),
        ],
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Song \"Final Title\" updated successfully!");
    assert_eq!(json["data"]["part_of_mass"], "entrance");
    assert_eq!(json["data"]["mtn"], true);
    assert_eq!(json["data"]["status"], "pending_approval");
    assert_eq!(json["data"]["slug"], song.slug.as_str());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_edit_forbidden_for_other_members(pool: PgPool) {
    let owner = create_user(&pool, "owner", false).await;
    let other = create_user(&pool, "other", false).await;
    let staff = create_user(&pool, "warden", true).await;
    let song = create_song(&pool, "Draft", SongStatus::PendingApproval, Some(owner.id)).await;
    let app = common::build_test_app(pool);
    let uri = format!("/songs/{}/edit", song.slug);

    let response = get_auth(app.app(), &uri, &app.token_for(&other)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_form_auth(
        app.app(),
        &uri,
        &[("title", "Hijack"), ("composer", "x"), ("part_of_mass", "gloria"), ("season", "lent")],
        &app.token_for(&other),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Staff may edit anyone's song.
    let response = get_auth(app.app(), &uri, &app.token_for(&staff)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_owner_edit_validation(pool: PgPool) {
    let owner = create_user(&pool, "owner", false).await;
    let song = create_song(&pool, "Draft", SongStatus::PendingApproval, Some(owner.id)).await;
    let app = common::build_test_app(pool);

    let response = post_form_auth(
        app.app(),
        &format!("/songs/{}/edit", song.slug),
        &[("title", ""), ("composer", "x"), ("part_of_mass", "gloria")],
        &app.token_for(&owner),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let fields = &body_json(response).await["fields"];
    assert!(fields["title"].is_array());
    assert!(fields["season"].is_array());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_owner_edit_rejects_non_form_body(pool: PgPool) {
    let owner = create_user(&pool, "owner", false).await;
    let song = create_song(&pool, "Draft", SongStatus::PendingApproval, Some(owner.id)).await;
    let app = common::build_test_app(pool);

    let response = post_json_auth(
        app.app(),
        &format!("/songs/{}/edit", song.slug),
        serde_json::json!({ "title": "Sneaky" }),
        &app.token_for(&owner),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"].is_string());
}

// ---------------------------------------------------------------------------
// My songs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_my_songs_lists_only_own(pool: PgPool) {
    let me = create_user(&pool, "me", false).await;
    let other = create_user(&pool, "other", false).await;
    for i in 0..11 {
        create_song(&pool, &format!("Mine {i:02}"), SongStatus::PendingApproval, Some(me.id)).await;
    }
    create_song(&pool, "Theirs", SongStatus::Published, Some(other.id)).await;
    let app = common::build_test_app(pool);
    let token = app.token_for(&me);

    let page1 = body_json(get_auth(app.app(), "/songs/mine", &token).await).await["data"].clone();
    assert_eq!(page1["songs"].as_array().unwrap().len(), 10);
    assert_eq!(page1["songs"][0]["title"], "Mine 10");
    assert_eq!(page1["pagination"]["total_items"], 11);

    let page2 =
        body_json(get_auth(app.app(), "/songs/mine?page=2", &token).await).await["data"].clone();
    assert_eq!(page2["songs"].as_array().unwrap().len(), 1);

    let response = get_auth(app.app(), "/songs/mine?page=3", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_staff_delete_removes_song_and_blobs(pool: PgPool) {
    let owner = create_user(&pool, "owner", false).await;
    let staff = create_user(&pool, "warden", true).await;
    let app = common::build_test_app(pool.clone());

    let form = MultipartBody::new()
        .song_fields("Doomed")
        .file("mp3_file", "doomed.mp3", "audio/mpeg", MP3_BYTES)
        .text("mp3_version", "Live");
    let json = body_json(
        post_multipart_auth(app.app(), "/songs/upload", form, &app.token_for(&owner)).await,
    )
    .await;
    let slug = json["data"]["song"]["slug"].as_str().unwrap().to_string();
    assert_eq!(bucket_len(&app, "mp3_files"), 1);

    let uri = format!("/songs/{slug}/delete");
    let response = post_auth(app.app(), &uri, &app.token_for(&owner)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_auth(app.app(), &uri, &app.token_for(&staff)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Manuscript 'Doomed' has been permanently purged from the registry."
    );

    assert_eq!(bucket_len(&app, "mp3_files"), 0);
    let (assets,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mp3_files")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(assets, 0);

    let response = get(app.app(), &format!("/songs/{slug}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
