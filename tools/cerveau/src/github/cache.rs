use crate::errors::CerveauError;
use crate::logging::append_run_log;
use crate::runtime::{Clock, FileSystem};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    stored_at: u64,
    value: Value,
}

/// Lookup-by-key JSON cache with a time-based expiry.
pub struct ResponseCache<'a> {
    dir: PathBuf,
    ttl: Duration,
    fs: &'a dyn FileSystem,
    clock: &'a dyn Clock,
}

impl<'a> ResponseCache<'a> {
    pub fn new(
        dir: impl AsRef<Path>,
        ttl: Duration,
        fs: &'a dyn FileSystem,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            ttl,
            fs,
            clock,
        }
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name = digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();
        self.dir.join(format!("{name}.json"))
    }

    fn now_secs(&self) -> u64 {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    /// Expired, missing, and unreadable entries are all misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        if !self.fs.exists(&path) {
            append_run_log("debug", "cache.miss", json!({ "key": key, "reason": "absent" }));
            return None;
        }
        let entry = self
            .fs
            .read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<CacheEntry>(&text).ok());
        let Some(entry) = entry else {
            append_run_log("debug", "cache.miss", json!({ "key": key, "reason": "unreadable" }));
            return None;
        };
        let age = self.now_secs().saturating_sub(entry.stored_at);
        if entry.key != key || age > self.ttl.as_secs() {
            append_run_log(
                "debug",
                "cache.miss",
                json!({ "key": key, "reason": "expired", "age_secs": age }),
            );
            return None;
        }
        append_run_log("debug", "cache.hit", json!({ "key": key, "age_secs": age }));
        Some(entry.value)
    }

    pub fn put(&self, key: &str, value: &Value) -> Result<(), CerveauError> {
        self.fs.create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            key: key.to_string(),
            stored_at: self.now_secs(),
            value: value.clone(),
        };
        let text = serde_json::to_string_pretty(&entry)
            .map_err(|e| CerveauError::Cache(e.to_string()))?;
        self.fs.write_string(&self.entry_path(key), &text)
    }
}

#[cfg(test)]
mod tests {
    use super::ResponseCache;
    use crate::errors::CerveauError;
    use crate::runtime::{FakeClock, FakeFileSystem, FileSystem};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn entries_expire_after_ttl() {
        let fs = FakeFileSystem::default();
        let clock = FakeClock::default();
        let cache = ResponseCache::new("/cache", Duration::from_secs(60), &fs, &clock);

        assert!(cache.get("repos_me_30").is_none());
        cache.put("repos_me_30", &json!([1, 2])).expect("put");
        assert_eq!(cache.get("repos_me_30"), Some(json!([1, 2])));

        clock.advance(Duration::from_secs(60));
        assert!(cache.get("repos_me_30").is_some());
        clock.advance(Duration::from_secs(1));
        assert!(cache.get("repos_me_30").is_none());
    }

    #[test]
    fn keys_map_to_hashed_file_names() {
        let fs = FakeFileSystem::default();
        let clock = FakeClock::default();
        let cache = ResponseCache::new("/cache", Duration::from_secs(60), &fs, &clock);
        let path = cache.entry_path("repo_owner/name");
        let name = path.file_name().expect("name").to_string_lossy().to_string();
        assert_eq!(name.len(), 64 + ".json".len());
        assert!(!name.contains('/'));
        assert_ne!(path, cache.entry_path("repo_owner_name"));
    }

    #[test]
    fn corrupt_entries_are_misses() {
        let fs = FakeFileSystem::default();
        let clock = FakeClock::default();
        let cache = ResponseCache::new("/cache", Duration::from_secs(60), &fs, &clock);
        cache.put("k", &json!(1)).expect("put");
        let path = cache.entry_path("k");
        fs.write_string(&path, "{not json").expect("corrupt");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn write_failures_surface_from_put() {
        let fs = FakeFileSystem::default();
        let clock = FakeClock::default();
        let cache = ResponseCache::new("/cache", Duration::from_secs(60), &fs, &clock);
        fs.set_fail_next(CerveauError::Io("disk full".to_string()));
        assert!(cache.put("k", &json!(1)).is_err());
    }
}
