//! Session preferences behind a small key-value seam.
//!
//! The console persists the keys the device's web terminal keeps in
//! browser storage: baud rate, timestamp toggle, command history. Nothing
//! else depends on where they live.

use std::collections::BTreeMap;
use std::path::PathBuf;

pub const KEY_BAUD_RATE: &str = "baudRate";
pub const KEY_SHOW_TIMESTAMPS: &str = "showTimestamps";
pub const KEY_COMMAND_HISTORY: &str = "commandHistory";

pub trait PrefStore: Send + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

impl PrefStore for Box<dyn PrefStore> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        (**self).set(key, value)
    }
}

/// In-memory store, for sessions that run without a preference file.
#[derive(Debug, Default)]
pub struct MemPrefs(BTreeMap<String, String>);

impl PrefStore for MemPrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }
}

/// JSON file store. A missing or unreadable file starts empty; write
/// failures are logged and the session keeps its in-memory values.
#[derive(Debug)]
pub struct FilePrefs {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FilePrefs {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();
        Self { path, values }
    }

    fn persist(&self) {
        if let Some(dir) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                log::warn!("cannot create preference dir {}: {}", dir.display(), e);
                return;
            }
        }
        let data = match serde_json::to_string_pretty(&self.values) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("cannot serialize preferences: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, data) {
            log::warn!("cannot write {}: {}", self.path.display(), e);
        }
    }
}

impl PrefStore for FilePrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.persist();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_prefs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut prefs = FilePrefs::load(&path);
        assert_eq!(prefs.get(KEY_BAUD_RATE), None);
        prefs.set(KEY_BAUD_RATE, "9600");
        prefs.set(KEY_SHOW_TIMESTAMPS, "true");

        let reloaded = FilePrefs::load(&path);
        assert_eq!(reloaded.get(KEY_BAUD_RATE).as_deref(), Some("9600"));
        assert_eq!(reloaded.get(KEY_SHOW_TIMESTAMPS).as_deref(), Some("true"));
    }

    #[test]
    fn test_boxed_store_dispatches() {
        let mut prefs: Box<dyn PrefStore> = Box::new(MemPrefs::default());
        assert_eq!(prefs.get(KEY_BAUD_RATE), None);
        prefs.set(KEY_BAUD_RATE, "57600");
        assert_eq!(prefs.get(KEY_BAUD_RATE).as_deref(), Some("57600"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json at all").unwrap();

        let prefs = FilePrefs::load(&path);
        assert_eq!(prefs.get(KEY_BAUD_RATE), None);
    }

    #[test]
    fn test_missing_parent_dir_created_on_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut prefs = FilePrefs::load(&path);
        prefs.set(KEY_COMMAND_HISTORY, r#"["help"]"#);

        let reloaded = FilePrefs::load(&path);
        assert_eq!(
            reloaded.get(KEY_COMMAND_HISTORY).as_deref(),
            Some(r#"["help"]"#)
        );
    }
}
