//! Shared fixtures: a local stand-in for the APOD provider and a configured
//! application pointed at it.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_test::TestServer;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tempfile::TempDir;

use apod_proxy::{
    config::Config,
    web::{AppState, create_app},
};

pub const API_KEY: &str = "TEST_KEY";
pub const IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFFfake-jpeg";
/// Date the fake provider reports when asked for "today"
pub const PROVIDER_TODAY: &str = "2024-01-02";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    Ok,
    ServerError,
    Throttled,
    BadRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMode {
    Ok,
    NotFound,
}

#[derive(Clone)]
struct ProviderState {
    base_url: String,
    api_mode: Arc<Mutex<ApiMode>>,
    media_mode: Arc<Mutex<MediaMode>>,
    api_hits: Arc<AtomicUsize>,
    media_hits: Arc<AtomicUsize>,
    requested_dates: Arc<Mutex<Vec<Option<String>>>>,
}

/// Local HTTP server speaking the APOD API on `/planetary/apod` and serving
/// the referenced image on `/img.jpg`
pub struct FakeProvider {
    state: ProviderState,
}

impl FakeProvider {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = ProviderState {
            base_url: format!("http://{addr}"),
            api_mode: Arc::new(Mutex::new(ApiMode::Ok)),
            media_mode: Arc::new(Mutex::new(MediaMode::Ok)),
            api_hits: Arc::new(AtomicUsize::new(0)),
            media_hits: Arc::new(AtomicUsize::new(0)),
            requested_dates: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/planetary/apod", get(apod))
            .route("/img.jpg", get(image))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state }
    }

    pub fn api_url(&self) -> String {
        format!("{}/planetary/apod", self.state.base_url)
    }

    pub fn image_url(&self) -> String {
        format!("{}/img.jpg", self.state.base_url)
    }

    pub fn set_api_mode(&self, mode: ApiMode) {
        *self.state.api_mode.lock().unwrap() = mode;
    }

    pub fn set_media_mode(&self, mode: MediaMode) {
        *self.state.media_mode.lock().unwrap() = mode;
    }

    pub fn api_hits(&self) -> usize {
        self.state.api_hits.load(Ordering::SeqCst)
    }

    pub fn media_hits(&self) -> usize {
        self.state.media_hits.load(Ordering::SeqCst)
    }

    pub fn requested_dates(&self) -> Vec<Option<String>> {
        self.state.requested_dates.lock().unwrap().clone()
    }
}

async fn apod(
    State(state): State<ProviderState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.api_hits.fetch_add(1, Ordering::SeqCst);
    let date = params.get("date").cloned();
    state.requested_dates.lock().unwrap().push(date.clone());

    if params.get("api_key").map(String::as_str) != Some(API_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": "API_KEY_INVALID", "message": "An invalid api_key was supplied."}})),
        )
            .into_response();
    }

    let mode = *state.api_mode.lock().unwrap();
    match mode {
        ApiMode::Ok => Json(json!({
            "date": date.unwrap_or_else(|| PROVIDER_TODAY.to_string()),
            "title": "T",
            "explanation": "A picture of the sky.",
            "media_type": "image",
            "url": format!("{}/img.jpg", state.base_url),
            "service_version": "v1"
        }))
        .into_response(),
        ApiMode::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
        }
        ApiMode::Throttled => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "42")],
            Json(json!({"error": {"code": "OVER_RATE_LIMIT"}})),
        )
            .into_response(),
        ApiMode::BadRequest => (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": 400, "msg": "Date must be between Jun 16, 1995 and today."})),
        )
            .into_response(),
    }
}

async fn image(State(state): State<ProviderState>) -> Response {
    state.media_hits.fetch_add(1, Ordering::SeqCst);

    let mode = *state.media_mode.lock().unwrap();
    match mode {
        MediaMode::Ok => ([(header::CONTENT_TYPE, "image/jpeg")], IMAGE_BYTES).into_response(),
        MediaMode::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Application under test plus the directory backing its cache
pub struct TestApp {
    pub server: TestServer,
    pub cache_dir: TempDir,
}

pub fn test_config(provider: &FakeProvider, cache_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.apod.api_key = Some(API_KEY.to_string());
    config.apod.base_url = provider.api_url();
    config.storage.cache_path = cache_dir.path().to_path_buf();
    config.rate_limit.trust_forwarded_headers = true;
    config
}

pub fn spawn_app(provider: &FakeProvider) -> TestApp {
    spawn_app_with(provider, |_| {})
}

pub fn spawn_app_with(provider: &FakeProvider, customize: impl FnOnce(&mut Config)) -> TestApp {
    let cache_dir = TempDir::new().unwrap();
    let mut config = test_config(provider, &cache_dir);
    customize(&mut config);

    let state = AppState::from_config(config).unwrap();
    let server = TestServer::new(create_app(state)).unwrap();

    TestApp { server, cache_dir }
}
