//! Persisted record of the images handled in recent sessions
//!
//! Records are kept newest first and capped; the oldest record is evicted when
//! an add would overflow the capacity. Every mutation rewrites the whole JSON
//! document (temp file + rename), last write wins.

use crate::client::ImageKind;
use crate::config::StoreConfig;
use crate::error::{Result, StudioError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const STORE_VERSION: u32 = 1;

/// One image known to the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Identifier (the gallery id when the service assigned one)
    pub id: String,
    /// File name shown to the user
    pub filename: String,
    /// Role in the original → processed → edited lineage
    pub kind: ImageKind,
    /// Record this one was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Encoded size in bytes
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Free-form details (model, filters, background)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ImageRecord {
    /// New record stamped with the current time
    #[must_use]
    pub fn new<I: Into<String>, F: Into<String>>(id: I, filename: F, kind: ImageKind, size: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            filename: filename.into(),
            kind,
            parent_id: None,
            size,
            created_at: now,
            updated_at: now,
            metadata: serde_json::Value::Null,
        }
    }

    /// New record with a random v4 id
    #[must_use]
    pub fn with_generated_id<F: Into<String>>(filename: F, kind: ImageKind, size: u64) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), filename, kind, size)
    }

    #[must_use]
    pub fn with_parent<S: Into<String>>(mut self, parent_id: S) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Session store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStoreStats {
    /// Number of records held
    pub total_records: usize,
    /// Sum of record sizes in bytes
    pub total_size_bytes: u64,
    /// Records by kind
    pub records_by_kind: HashMap<ImageKind, usize>,
    /// Newest record timestamp
    pub newest: Option<DateTime<Utc>>,
    /// Oldest record timestamp
    pub oldest: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    records: Vec<ImageRecord>,
}

/// Bounded, persisted, newest-first list of [`ImageRecord`]s
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    capacity: usize,
    records: Vec<ImageRecord>,
}

impl SessionStore {
    /// Open the store at `path`, starting empty when the file is missing or unreadable
    ///
    /// # Errors
    /// - Capacity is zero
    /// - The file exists but cannot be read
    pub fn load_or_create<P: Into<PathBuf>>(path: P, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StudioError::config_value_error(
                "store capacity",
                capacity,
                "1 or more",
                Some(crate::config::DEFAULT_STORE_CAPACITY),
            ));
        }

        let path = path.into();
        let mut records = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|e| StudioError::file_io_error("read session store", &path, &e))?;
            match serde_json::from_str::<StoreDocument>(&contents) {
                Ok(document) => document.records,
                Err(e) => {
                    log::warn!(
                        "Session store {} is corrupt ({}), starting empty",
                        path.display(),
                        e
                    );
                    Vec::new()
                },
            }
        } else {
            Vec::new()
        };

        records.truncate(capacity);
        log::debug!("Loaded {} session record(s) from {}", records.len(), path.display());

        Ok(Self {
            path,
            capacity,
            records,
        })
    }

    /// Open the store described by `config`
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::load_or_create(&config.path, config.capacity)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or update a record and move it to the front
    ///
    /// Updating an existing id keeps its `created_at` and refreshes `updated_at`.
    /// Returns the record evicted to stay within capacity, if any.
    ///
    /// # Errors
    /// - Failed to persist the store
    pub fn add(&mut self, mut record: ImageRecord) -> Result<Option<ImageRecord>> {
        if let Some(position) = self.records.iter().position(|r| r.id == record.id) {
            let previous = self.records.remove(position);
            record.created_at = previous.created_at;
            record.updated_at = Utc::now();
        }

        self.records.insert(0, record);

        let evicted = if self.records.len() > self.capacity {
            self.records.pop()
        } else {
            None
        };
        if let Some(old) = &evicted {
            log::debug!("Evicted oldest session record {}", old.id);
        }

        self.save()?;
        Ok(evicted)
    }

    /// Remove a record by id
    ///
    /// # Errors
    /// - Failed to persist the store
    pub fn remove(&mut self, id: &str) -> Result<Option<ImageRecord>> {
        let Some(position) = self.records.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let removed = self.records.remove(position);
        self.save()?;
        Ok(Some(removed))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// All records, newest first
    #[must_use]
    pub fn list_all(&self) -> &[ImageRecord] {
        &self.records
    }

    /// Up to `n` newest records
    #[must_use]
    pub fn list_recent(&self, n: usize) -> &[ImageRecord] {
        self.records.get(..n.min(self.records.len())).unwrap_or(&[])
    }

    /// Records of one kind, newest first
    pub fn list_by_kind(&self, kind: ImageKind) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Drop records created longer ago than `horizon`
    ///
    /// # Returns
    /// Number of records removed
    ///
    /// # Errors
    /// - Horizon out of range
    /// - Failed to persist the store
    pub fn cleanup_older_than(&mut self, horizon: Duration) -> Result<usize> {
        let horizon = chrono::Duration::from_std(horizon).map_err(|e| {
            StudioError::invalid_config(format!("Cleanup horizon out of range: {}", e))
        })?;
        let cutoff = Utc::now() - horizon;

        let before = self.records.len();
        self.records.retain(|r| r.created_at >= cutoff);
        let removed = before - self.records.len();

        if removed > 0 {
            self.save()?;
            log::info!("Removed {} session record(s) older than {}", removed, cutoff);
        }
        Ok(removed)
    }

    /// Current store statistics
    #[must_use]
    pub fn stats(&self) -> SessionStoreStats {
        let mut records_by_kind = HashMap::new();
        for record in &self.records {
            *records_by_kind.entry(record.kind).or_insert(0) += 1;
        }

        SessionStoreStats {
            total_records: self.records.len(),
            total_size_bytes: self.records.iter().map(|r| r.size).sum(),
            records_by_kind,
            newest: self.records.iter().map(|r| r.updated_at).max(),
            oldest: self.records.iter().map(|r| r.updated_at).min(),
        }
    }

    /// Remove every record
    ///
    /// # Returns
    /// Number of records removed
    ///
    /// # Errors
    /// - Failed to persist the store
    pub fn clear(&mut self) -> Result<usize> {
        let count = self.records.len();
        self.records.clear();
        self.save()?;
        Ok(count)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StudioError::file_io_error("create session store directory", parent, &e))?;
        }

        let document = StoreDocument {
            version: STORE_VERSION,
            records: self.records.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .map_err(|e| StudioError::file_io_error("write session store", &temp_path, &e))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| StudioError::file_io_error("replace session store", &self.path, &e))?;
        Ok(())
    }
}

/// Format a byte count for display
///
/// # Examples
/// ```rust
/// use imgly_bgstudio::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS.get(unit_index).copied().unwrap_or("B");
    if unit_index == 0 {
        format!("{} {}", bytes, unit)
    } else {
        format!("{:.1} {}", size, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, capacity: usize) -> SessionStore {
        SessionStore::load_or_create(dir.path().join("session.json"), capacity).unwrap()
    }

    fn record(id: &str) -> ImageRecord {
        ImageRecord::new(id, format!("{}.png", id), ImageKind::Original, 1000)
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_add_is_newest_first_and_persisted() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, 10);
        store.add(record("a")).unwrap();
        store.add(record("b")).unwrap();

        let ids: Vec<&str> = store.list_all().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let reopened = store_in(&dir, 10);
        assert_eq!(reopened.list_all(), store.list_all());
    }

    #[test]
    fn test_upsert_moves_to_front_and_refreshes_updated_at() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, 10);

        let mut old = record("a");
        old.created_at = Utc::now() - chrono::Duration::hours(5);
        old.updated_at = old.created_at;
        let created = old.created_at;
        store.add(old).unwrap();
        store.add(record("b")).unwrap();

        store.add(record("a").with_metadata(serde_json::json!({"model": "silueta"}))).unwrap();
        assert_eq!(store.len(), 2);
        let front = &store.list_all()[0];
        assert_eq!(front.id, "a");
        assert_eq!(front.created_at, created);
        assert!(front.updated_at > created);
        assert_eq!(front.metadata["model"], "silueta");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, 3);
        for id in ["a", "b", "c"] {
            assert!(store.add(record(id)).unwrap().is_none());
        }
        let evicted = store.add(record("d")).unwrap().unwrap();
        assert_eq!(evicted.id, "a");
        assert_eq!(store.len(), 3);
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_remove_and_recent() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, 10);
        for id in ["a", "b", "c"] {
            store.add(record(id)).unwrap();
        }
        assert_eq!(store.remove("b").unwrap().map(|r| r.id), Some("b".to_string()));
        assert!(store.remove("zzz").unwrap().is_none());

        let recent: Vec<&str> = store.list_recent(1).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(recent, vec!["c"]);
        assert_eq!(store.list_recent(50).len(), 2);
    }

    #[test]
    fn test_cleanup_older_than() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, 10);

        let mut stale = record("stale");
        stale.created_at = Utc::now() - chrono::Duration::hours(200);
        store.add(stale).unwrap();
        store.add(record("fresh")).unwrap();

        let removed = store
            .cleanup_older_than(crate::config::DEFAULT_CLEANUP_HORIZON)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("fresh").is_some());
        assert!(store.get("stale").is_none());
    }

    #[test]
    fn test_cleanup_uses_creation_time_not_last_update() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, 10);

        let mut old = record("old");
        old.created_at = Utc::now() - chrono::Duration::hours(500);
        store.add(old).unwrap();
        // Upsert keeps created_at and refreshes updated_at
        store.add(record("old")).unwrap();
        let touched = store.get("old").unwrap();
        assert!(touched.updated_at > touched.created_at + chrono::Duration::hours(400));

        let removed = store
            .cleanup_older_than(crate::config::DEFAULT_CLEANUP_HORIZON)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("old").is_none());
    }

    #[test]
    fn test_stats_and_clear() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, 10);
        store.add(record("a")).unwrap();
        store
            .add(ImageRecord::new("b", "b_no_bg.png", ImageKind::Processed, 500).with_parent("a"))
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.total_size_bytes, 1500);
        assert_eq!(stats.records_by_kind[&ImageKind::Processed], 1);
        assert_eq!(store.list_by_kind(ImageKind::Original).count(), 1);

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store_in(&dir, 10).is_empty());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SessionStore::load_or_create(&path, 10).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(SessionStore::load_or_create(dir.path().join("s.json"), 0).is_err());
    }
}
