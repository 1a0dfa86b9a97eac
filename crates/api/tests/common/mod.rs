#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use cantus_api::auth::jwt::{generate_access_token, JwtConfig};
use cantus_api::auth::password::hash_password;
use cantus_api::config::ServerConfig;
use cantus_api::router::build_app_router;
use cantus_api::state::AppState;
use cantus_core::catalog::{MassPart, Season, SongStatus};
use cantus_core::storage::LocalBlobStore;
use cantus_core::submission::SongFields;
use cantus_core::types::DbId;
use cantus_db::models::song::{NewSong, Song};
use cantus_db::models::user::{CreateUser, User};
use cantus_db::repositories::{SongRepo, UserRepo};

pub const TEST_PASSWORD: &str = "test_password_123!";

/// Build a test `ServerConfig` with safe defaults and the given media root.
pub fn test_config(media_root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        media_root: media_root.to_path_buf(),
        max_upload_mb: 10,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        bootstrap_admin: None,
    }
}

/// The router plus the pieces tests inspect directly.
///
/// Holding the `TempDir` keeps the media root alive for the test.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _media: TempDir,
}

impl TestApp {
    /// A fresh clone of the router, ready for one `oneshot` call.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Path of a stored blob on disk.
    pub fn blob_path(&self, locator: &str) -> std::path::PathBuf {
        self._media.path().join(locator)
    }

    pub fn token_for(&self, user: &User) -> String {
        generate_access_token(user.id, user.can_moderate(), &self.state.config.jwt)
            .expect("token generation should succeed")
    }
}

/// Build the full application router (same middleware stack as production)
/// over a temporary local blob store.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let media = tempfile::tempdir().expect("create media dir");
    let config = test_config(media.path());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        blobs: Arc::new(LocalBlobStore::new(media.path())),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        _media: media,
    }
}

/// Insert a user directly with [`TEST_PASSWORD`].
pub async fn create_user(pool: &PgPool, username: &str, is_staff: bool) -> User {
    let password_hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            password_hash,
            is_staff,
            is_superuser: false,
        },
    )
    .await
    .expect("user creation should succeed")
}

/// Insert a song with no assets directly through the repository.
pub async fn create_song(
    pool: &PgPool,
    title: &str,
    status: SongStatus,
    submitted_by: Option<DbId>,
) -> Song {
    let new_song = NewSong {
        fields: SongFields {
            title: title.to_string(),
            composer: "Test Composer".to_string(),
            arranged_by: String::new(),
            part_of_mass: MassPart::Communion,
            season: Season::Lent,
            mtn: false,
            mtn_number: String::new(),
            youtube_link: String::new(),
        },
        status,
        submitted_by,
    };
    SongRepo::create_with_assets(pool, &new_song, &[])
        .await
        .expect("song creation should succeed")
        .song
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_with_header(
    app: Router,
    uri: &str,
    token: Option<&str>,
    name: &str,
    value: &str,
) -> Response {
    let mut builder = Request::builder().uri(uri).header(name, value);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST with no body.
pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST `application/x-www-form-urlencoded` pairs.
pub async fn post_form_auth(app: Router, uri: &str, pairs: &[(&str, &str)], token: &str) -> Response {
    let body = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    form: MultipartBody,
    token: &str,
) -> Response {
    let (content_type, body) = form.finish();
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Multipart builder
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "cantus-test-boundary-7d1f";

/// Minimal `multipart/form-data` body builder.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// The core song fields with valid values.
    pub fn song_fields(self, title: &str) -> Self {
        self.text("title", title)
            .text("composer", "Test Composer")
            .text("arranged_by", "")
            .text("part_of_mass", "communion")
            .text("season", "lent")
            .text("youtube_link", "")
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={BOUNDARY}"), self.body)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A small valid PNG, usable as a sheet image.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(40, 60, image::Rgb([200, 180, 150]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub const MP3_BYTES: &[u8] = b"ID3\x03\x00\x00\x00\x00\x00\x00fake-audio";
pub const MIDI_BYTES: &[u8] = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x00\x60";
