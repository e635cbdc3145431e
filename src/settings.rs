//! Persisted key-value settings.
//!
//! Keys are slash-separated paths such as `playlistupdaters/<guid>/interval`.
//! Values are JSON values; the whole store is written as one pretty-printed
//! JSON object when [`Settings::sync`] is called.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;

/// Key-value settings store, optionally backed by a JSON file.
#[derive(Debug, Default)]
pub struct Settings {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, Value>>,
}

impl Settings {
    /// Create a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store backed by `path`.
    ///
    /// A missing file yields an empty store; the file is created on the first
    /// [`sync`](Self::sync).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let data = fs::read_to_string(&path)?;
            let values: BTreeMap<String, Value> = serde_json::from_str(&data)?;
            debug!("Loaded {} settings from {}", values.len(), path.display());
            values
        } else {
            info!("No settings at {}, starting empty", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    /// Get the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a raw value.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Get a boolean; strings "true"/"false" are accepted.
    pub fn bool_value(&self, key: &str) -> Option<bool> {
        match self.value(key)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        }
    }

    /// Get an unsigned integer; numeric strings are accepted.
    pub fn u64_value(&self, key: &str) -> Option<u64> {
        match self.value(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get a string; numbers and booleans are converted.
    pub fn string_value(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Set a value.
    pub fn set_value<V: Into<Value>>(&self, key: &str, value: V) {
        let value = value.into();
        debug!("settings: {} = {}", key, value);
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    /// Remove a value. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) {
        debug!("settings: remove {}", key);
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// All keys below `prefix/`.
    pub fn child_keys(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// Write the store to its file. In-memory stores do nothing.
    pub fn sync(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let data = {
            let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*values)?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        debug!("Settings written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let settings = Settings::in_memory();
        settings.set_value("a/autoupdate", true);
        settings.set_value("a/interval", 60_000u64);
        settings.set_value("a/xspfurl", "http://example.com/list.xspf");
        settings.set_value("b/interval", "1500");

        assert_eq!(settings.bool_value("a/autoupdate"), Some(true));
        assert_eq!(settings.u64_value("a/interval"), Some(60_000));
        assert_eq!(settings.u64_value("b/interval"), Some(1500));
        assert_eq!(
            settings.string_value("a/xspfurl").as_deref(),
            Some("http://example.com/list.xspf")
        );
        assert_eq!(settings.bool_value("missing"), None);
    }

    #[test]
    fn test_remove_and_child_keys() {
        let settings = Settings::in_memory();
        settings.set_value("updaters/x/interval", 1u64);
        settings.set_value("updaters/x/xspfurl", "u");
        settings.set_value("updaters/xy/interval", 2u64);

        let mut keys = settings.child_keys("updaters/x");
        keys.sort();
        assert_eq!(keys, vec!["updaters/x/interval", "updaters/x/xspfurl"]);

        settings.remove("updaters/x/interval");
        settings.remove("updaters/x/interval");
        assert!(settings.value("updaters/x/interval").is_none());
    }

    #[test]
    fn test_sync_and_reopen() {
        let path = std::env::temp_dir().join(format!(
            "cadenza-settings-{}.json",
            uuid::Uuid::new_v4()
        ));

        let settings = Settings::open(&path).unwrap();
        settings.set_value("p/autoupdate", false);
        settings.set_value("p/interval", 3_600_000u64);
        settings.sync().unwrap();

        let reopened = Settings::open(&path).unwrap();
        assert_eq!(reopened.bool_value("p/autoupdate"), Some(false));
        assert_eq!(reopened.u64_value("p/interval"), Some(3_600_000));

        let _ = fs::remove_file(&path);
    }
}
