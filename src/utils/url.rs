//! URL utilities for logging and cache file naming

use url::Url;

/// Query parameters whose values never reach the logs
const SENSITIVE_PARAMS: &[&str] = &["api_key", "apikey", "key", "token"];

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Mask credential-bearing query values so URLs are safe to log
    ///
    /// ```rust
    /// use apod_proxy::utils::url::UrlUtils;
    ///
    /// assert_eq!(
    ///     UrlUtils::obfuscate_credentials("https://api.nasa.gov/planetary/apod?api_key=SECRET&hd=true"),
    ///     "https://api.nasa.gov/planetary/apod?api_key=****&hd=true"
    /// );
    /// ```
    pub fn obfuscate_credentials(url: &str) -> String {
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };

        if parsed.query().is_none() {
            return url.to_string();
        }

        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| {
                let value = if SENSITIVE_PARAMS.contains(&k.to_ascii_lowercase().as_str()) {
                    "****".to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), value)
            })
            .collect();

        parsed.query_pairs_mut().clear().extend_pairs(pairs);
        parsed.to_string()
    }

    /// Lowercase file extension of the URL path, if it looks like one
    pub fn file_extension(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let last_segment = parsed.path_segments()?.next_back()?;
        let (_, ext) = last_segment.rsplit_once('.')?;

        let ext = ext.to_ascii_lowercase();
        let plausible = !ext.is_empty()
            && ext.len() <= 5
            && ext.chars().all(|c| c.is_ascii_alphanumeric());
        plausible.then_some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_only_sensitive_values() {
        let masked = UrlUtils::obfuscate_credentials(
            "https://api.nasa.gov/planetary/apod?api_key=abc123&date=2024-01-01",
        );
        assert!(!masked.contains("abc123"));
        assert!(masked.contains("api_key=****"));
        assert!(masked.contains("date=2024-01-01"));
    }

    #[test]
    fn leaves_unparseable_and_query_less_urls_alone() {
        assert_eq!(UrlUtils::obfuscate_credentials("not a url"), "not a url");
        assert_eq!(
            UrlUtils::obfuscate_credentials("https://apod.nasa.gov/apod/image/x.jpg"),
            "https://apod.nasa.gov/apod/image/x.jpg"
        );
    }

    #[test]
    fn extracts_file_extensions() {
        assert_eq!(
            UrlUtils::file_extension("https://apod.nasa.gov/apod/image/2401/Moon_1024.JPG"),
            Some("jpg".to_string())
        );
        assert_eq!(
            UrlUtils::file_extension("http://x/img.jpg?size=large"),
            Some("jpg".to_string())
        );
        assert_eq!(UrlUtils::file_extension("https://www.youtube.com/embed/abc"), None);
        assert_eq!(UrlUtils::file_extension("http://x/archive.tar.gz-part1"), None);
    }
}
