//! APOD cache store with an in-memory index over JSON sidecars

use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::entry::CacheEntry;
use crate::errors::{StorageError, StorageResult};
use crate::models::{ApodRecord, DATE_FORMAT};
use crate::utils::UrlUtils;

const SIDECAR_EXTENSION: &str = "json";
/// Subdirectory of the cache holding media files only
const MEDIA_SUBDIR: &str = "media";
const FALLBACK_MEDIA_EXTENSION: &str = "bin";

/// Date-keyed cache store
///
/// Cloning is cheap; clones share the index and the write lock.
#[derive(Clone)]
pub struct ApodCacheStore {
    cache_dir: PathBuf,
    media_dir: PathBuf,
    /// Primary index: date -> entry
    index: Arc<RwLock<HashMap<NaiveDate, CacheEntry>>>,
    /// Serializes writers so two requests for one date produce one entry
    write_lock: Arc<Mutex<()>>,
}

impl ApodCacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            media_dir: cache_dir.join(MEDIA_SUBDIR),
            cache_dir,
            index: Arc::new(RwLock::new(HashMap::new())),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Directory holding downloaded media and nothing else; safe to serve
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Number of entries currently indexed in memory
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// Load every readable sidecar into the index.
    ///
    /// Lookups fall back to disk anyway, so this only warms the index at
    /// startup. A missing directory is not an error.
    pub async fn scan(&self) -> StorageResult<usize> {
        let mut dir = match fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Cache directory {:?} does not exist yet", self.cache_dir);
                return Ok(0);
            }
            Err(e) => return Err(StorageError::not_writable(&self.cache_dir, e)),
        };

        let start = std::time::Instant::now();
        let mut loaded = 0;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::not_writable(&self.cache_dir, e))?
        {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SIDECAR_EXTENSION) {
                continue;
            }
            let Some(date) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
            else {
                continue;
            };

            if let Some(entry) = self.read_sidecar(date).await {
                self.index.write().await.insert(date, entry);
                loaded += 1;
            }
        }

        info!(
            "Cache scan completed: {} entries in {:.2}s from {:?}",
            loaded,
            start.elapsed().as_secs_f64(),
            self.cache_dir
        );
        Ok(loaded)
    }

    /// Find the entry for `date`, consulting the sidecar on an index miss
    pub async fn lookup(&self, date: NaiveDate) -> Option<CacheEntry> {
        if let Some(entry) = self.index.read().await.get(&date) {
            return Some(entry.clone());
        }

        let entry = self.read_sidecar(date).await?;
        self.index.write().await.insert(date, entry.clone());
        Some(entry)
    }

    /// Store `record` (and its media, when given) under `date`.
    ///
    /// Writing a date that already has an entry returns the existing entry
    /// untouched.
    pub async fn write(
        &self,
        date: NaiveDate,
        record: &ApodRecord,
        media: Option<&[u8]>,
    ) -> StorageResult<CacheEntry> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.lookup(date).await {
            debug!("Cache entry for {} already present, keeping it", date);
            return Ok(existing);
        }

        self.ensure_cache_dir().await?;

        let mut entry = CacheEntry::new(record.clone());
        entry.date = date;
        if let Some(bytes) = media {
            let file_name = media_file_name(date, &record.media_url);
            self.write_atomic(&self.media_dir.join(&file_name), bytes).await?;
            entry.media_file = Some(file_name);
            entry.content_length = bytes.len() as u64;
        }

        self.write_sidecar(&entry).await?;
        self.index.write().await.insert(date, entry.clone());

        info!(
            "Cached APOD {} ({}, {} bytes of media)",
            date, entry.record.media_type, entry.content_length
        );
        Ok(entry)
    }

    /// Attach a media file to an existing entry that has none.
    ///
    /// Returns `None` when no entry exists for `date`; an entry that already
    /// has media is returned unchanged.
    pub async fn attach_media(
        &self,
        date: NaiveDate,
        media: &[u8],
    ) -> StorageResult<Option<CacheEntry>> {
        let _guard = self.write_lock.lock().await;

        let Some(mut entry) = self.lookup(date).await else {
            return Ok(None);
        };
        if entry.has_media() {
            return Ok(Some(entry));
        }

        self.ensure_cache_dir().await?;

        let file_name = media_file_name(date, &entry.record.media_url);
        self.write_atomic(&self.media_dir.join(&file_name), media).await?;
        entry.media_file = Some(file_name);
        entry.content_length = media.len() as u64;

        self.write_sidecar(&entry).await?;
        self.index.write().await.insert(date, entry.clone());

        info!("Attached {} bytes of media to cached APOD {}", media.len(), date);
        Ok(Some(entry))
    }

    async fn ensure_cache_dir(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| StorageError::not_writable(&self.media_dir, e))
    }

    async fn read_sidecar(&self, date: NaiveDate) -> Option<CacheEntry> {
        let path = self.cache_dir.join(sidecar_name(date));
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("Failed to read cache sidecar {:?}: {}", path, e);
                }
                return None;
            }
        };

        let mut entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable cache sidecar {:?}: {}", path, e);
                return None;
            }
        };

        // A sidecar pointing at a vanished file degrades to metadata only,
        // so the media can be attached again
        if let Some(file) = &entry.media_file
            && !self.media_dir.join(file).exists()
        {
            warn!("Media file {} for {} is missing", file, date);
            entry.media_file = None;
            entry.content_length = 0;
        }

        Some(entry)
    }

    async fn write_sidecar(&self, entry: &CacheEntry) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(entry)?;
        self.write_atomic(&self.cache_dir.join(sidecar_name(entry.date)), &json)
            .await
    }

    /// Write through a temp file and rename so readers never see a partial
    /// file. Temp files live in the cache root, outside the served media dir.
    async fn write_atomic(&self, final_path: &Path, data: &[u8]) -> StorageResult<()> {
        let file_name = final_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("entry");
        let tmp_path = self.cache_dir.join(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, data)
            .await
            .map_err(|e| StorageError::not_writable(&tmp_path, e))?;

        if let Err(e) = fs::rename(&tmp_path, final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::not_writable(final_path, e));
        }

        Ok(())
    }
}

fn sidecar_name(date: NaiveDate) -> String {
    format!("{}.{}", date.format(DATE_FORMAT), SIDECAR_EXTENSION)
}

fn media_file_name(date: NaiveDate, media_url: &str) -> String {
    let ext = UrlUtils::file_extension(media_url)
        .filter(|ext| ext != SIDECAR_EXTENSION && ext != "tmp")
        .unwrap_or_else(|| FALLBACK_MEDIA_EXTENSION.to_string());
    format!("{}.{}", date.format(DATE_FORMAT), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn record(media_url: &str, media_type: MediaType) -> ApodRecord {
        ApodRecord {
            date: date(),
            title: "T".to_string(),
            explanation: "E".to_string(),
            media_url: media_url.to_string(),
            media_type,
            hd_url: None,
            copyright: None,
        }
    }

    #[tokio::test]
    async fn write_then_lookup() {
        let dir = TempDir::new().unwrap();
        let store = ApodCacheStore::new(dir.path());

        assert!(store.lookup(date()).await.is_none());

        let entry = store
            .write(date(), &record("http://x/img.jpg", MediaType::Image), Some(b"jpeg"))
            .await
            .unwrap();

        assert_eq!(entry.media_file.as_deref(), Some("2024-01-01.jpg"));
        assert_eq!(entry.content_length, 4);
        assert_eq!(std::fs::read(dir.path().join("media/2024-01-01.jpg")).unwrap(), b"jpeg");
        assert!(dir.path().join("2024-01-01.json").exists());
        assert_eq!(store.lookup(date()).await, Some(entry));
    }

    #[tokio::test]
    async fn write_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ApodCacheStore::new(dir.path());

        let first = store
            .write(date(), &record("http://x/img.jpg", MediaType::Image), Some(b"one"))
            .await
            .unwrap();
        let mut changed = record("http://x/img.jpg", MediaType::Image);
        changed.title = "Other".to_string();
        let second = store.write(date(), &changed, Some(b"two")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.record.title, "T");
        assert_eq!(std::fs::read(dir.path().join("media/2024-01-01.jpg")).unwrap(), b"one");
        assert_eq!(store.len().await, 1);

        let sidecars = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .count();
        assert_eq!(sidecars, 1);
    }

    #[tokio::test]
    async fn entries_survive_a_new_store_instance() {
        let dir = TempDir::new().unwrap();
        ApodCacheStore::new(dir.path())
            .write(date(), &record("http://x/img.png", MediaType::Image), Some(b"png"))
            .await
            .unwrap();

        let reopened = ApodCacheStore::new(dir.path());
        assert!(reopened.is_empty().await);
        let entry = reopened.lookup(date()).await.unwrap();
        assert_eq!(entry.media_file.as_deref(), Some("2024-01-01.png"));
        assert_eq!(entry.record.title, "T");

        let scanned = ApodCacheStore::new(dir.path());
        assert_eq!(scanned.scan().await.unwrap(), 1);
        assert_eq!(scanned.len().await, 1);
    }

    #[tokio::test]
    async fn metadata_only_entry_can_get_media_attached_once() {
        let dir = TempDir::new().unwrap();
        let store = ApodCacheStore::new(dir.path());

        let entry = store
            .write(date(), &record("http://x/img.jpg", MediaType::Image), None)
            .await
            .unwrap();
        assert!(entry.needs_media());

        let attached = store.attach_media(date(), b"late").await.unwrap().unwrap();
        assert_eq!(attached.media_file.as_deref(), Some("2024-01-01.jpg"));
        assert_eq!(attached.content_length, 4);

        let again = store.attach_media(date(), b"later").await.unwrap().unwrap();
        assert_eq!(again, attached);
        assert_eq!(std::fs::read(dir.path().join("media/2024-01-01.jpg")).unwrap(), b"late");
    }

    #[tokio::test]
    async fn attach_without_entry_is_none() {
        let dir = TempDir::new().unwrap();
        let store = ApodCacheStore::new(dir.path());
        assert!(store.attach_media(date(), b"x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unwritable_location_is_a_storage_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A directory cannot be created underneath a regular file
        let store = ApodCacheStore::new(file.path().join("cache"));

        let result = store
            .write(date(), &record("http://x/img.jpg", MediaType::Image), Some(b"x"))
            .await;
        assert!(matches!(result, Err(StorageError::NotWritable { .. })));
        assert!(store.lookup(date()).await.is_none());
    }

    #[tokio::test]
    async fn vanished_media_file_is_dropped_from_the_entry() {
        let dir = TempDir::new().unwrap();
        ApodCacheStore::new(dir.path())
            .write(date(), &record("http://x/img.jpg", MediaType::Image), Some(b"x"))
            .await
            .unwrap();
        std::fs::remove_file(dir.path().join("media/2024-01-01.jpg")).unwrap();

        let entry = ApodCacheStore::new(dir.path()).lookup(date()).await.unwrap();
        assert!(entry.needs_media());
    }

    #[test]
    fn media_names_fall_back_to_bin() {
        assert_eq!(media_file_name(date(), "http://x/img.JPG"), "2024-01-01.jpg");
        assert_eq!(media_file_name(date(), "http://x/image"), "2024-01-01.bin");
        assert_eq!(media_file_name(date(), "http://x/meta.json"), "2024-01-01.bin");
    }

    #[tokio::test]
    async fn media_dir_holds_only_media() {
        let dir = TempDir::new().unwrap();
        let store = ApodCacheStore::new(dir.path());
        store
            .write(date(), &record("http://x/img.jpg", MediaType::Image), Some(b"jpeg"))
            .await
            .unwrap();

        let mut served: Vec<_> = std::fs::read_dir(store.media_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        served.sort();
        assert_eq!(served, vec!["2024-01-01.jpg".to_string()]);
        assert!(dir.path().join("2024-01-01.json").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writes_for_one_date_leave_one_entry() {
        let dir = TempDir::new().unwrap();
        let store = ApodCacheStore::new(dir.path());
        let first = record("http://x/img.jpg", MediaType::Image);
        let mut second = first.clone();
        second.title = "Other".to_string();

        let (a, b) = tokio::join!(
            store.write(date(), &first, Some(b"one")),
            store.write(date(), &second, Some(b"two")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);

        let sidecars: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .collect();
        assert_eq!(sidecars.len(), 1, "{sidecars:?}");

        let media = std::fs::read(dir.path().join("media/2024-01-01.jpg")).unwrap();
        let expected: &[u8] = if a.record.title == "T" { b"one" } else { b"two" };
        assert_eq!(media, expected);
    }
}
