use rust_embed::RustEmbed;

/// Embedded static web assets (stylesheet, favicon)
#[derive(RustEmbed)]
#[folder = "static/"]
#[prefix = "static/"]
pub struct StaticAssets;

impl StaticAssets {
    /// Get a static asset by path
    pub fn get_asset(path: &str) -> Option<rust_embed::EmbeddedFile> {
        Self::get(path)
    }

    /// Get the content type for a given file extension
    pub fn get_content_type(path: &str) -> &'static str {
        match path.split('.').next_back() {
            Some("html") => "text/html; charset=utf-8",
            Some("css") => "text/css; charset=utf-8",
            Some("js") => "application/javascript; charset=utf-8",
            Some("json") => "application/json; charset=utf-8",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("svg") => "image/svg+xml; charset=utf-8",
            Some("ico") => "image/x-icon",
            Some("woff2") => "font/woff2",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            StaticAssets::get_content_type("style.css"),
            "text/css; charset=utf-8"
        );
        assert_eq!(
            StaticAssets::get_content_type("favicon.svg"),
            "image/svg+xml; charset=utf-8"
        );
        assert_eq!(StaticAssets::get_content_type("photo.jpg"), "image/jpeg");
        assert_eq!(StaticAssets::get_content_type("favicon.ico"), "image/x-icon");
        assert_eq!(
            StaticAssets::get_content_type("unknown"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_static_assets_exist() {
        assert!(StaticAssets::get_asset("static/style.css").is_some());
        assert!(StaticAssets::get_asset("static/favicon.svg").is_some());
        assert!(StaticAssets::get_asset("static/missing.css").is_none());
    }
}
