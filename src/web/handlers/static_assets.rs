//! Static asset handlers
//!
//! Serves the embedded stylesheet and favicon

use axum::{
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::assets::StaticAssets;

const FAVICON_PATH: &str = "static/favicon.svg";

/// Serve a static asset by path
pub async fn serve_static_asset(Path(path): Path<String>) -> Response {
    serve_embedded(&format!("static/{path}"), "public, max-age=86400")
}

/// Serve the favicon for clients that ask for `/favicon.ico`
pub async fn serve_favicon() -> Response {
    serve_embedded(FAVICON_PATH, "public, max-age=604800")
}

fn serve_embedded(asset_path: &str, cache_control: &'static str) -> Response {
    match StaticAssets::get_asset(asset_path) {
        Some(file) => (
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(StaticAssets::get_content_type(asset_path)),
                ),
                (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
            ],
            file.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Asset not found").into_response(),
    }
}
