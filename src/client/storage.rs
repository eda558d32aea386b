//!
//! # Session storage
//!
//! Durable key-value storage for the client's auth artifacts, standing in
//! for browser localStorage. The key names are a compatibility surface: an
//! existing deployment's clients persist under exactly these keys.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage key for the session token.
pub const TOKEN_KEY: &str = "token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the serialized user object.
pub const USER_KEY: &str = "user";

/// String key-value storage for session artifacts.
///
/// Values are opaque to the stores; only the three well-known keys above are
/// ever used.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Volatile storage for tests and short-lived embedders.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }
}

/// Storage backed by a JSON file, so a session survives process restart.
///
/// Every write rewrites the whole file; the map holds at most three small
/// entries. Write failures are logged and otherwise swallowed, matching how
/// a browser treats a full localStorage.
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn flush(&self, values: &HashMap<String, String>) {
        match serde_json::to_string_pretty(values) {
            Ok(contents) => {
                if let Err(e) = std::fs::write(&self.path, contents) {
                    log::warn!("failed to persist session storage: {}", e);
                }
            }
            Err(e) => log::warn!("failed to serialize session storage: {}", e),
        }
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock().unwrap();
        values.remove(key);
        self.flush(&values);
    }
}
