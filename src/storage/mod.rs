use std::collections::HashMap;
use std::path::PathBuf;

/// Key for the verbatim API credential.
pub const KEY_API_CREDENTIAL: &str = "gemini-api-key";
/// Key for the color theme ("light" or "dark").
pub const KEY_THEME: &str = "color-theme";
/// Key for the prompt history (JSON array of entries).
pub const KEY_HISTORY: &str = "prompt-history";

/// String-keyed persistent store. Values survive restarts; a missing key
/// reads as None. Failures to persist are logged, never surfaced.
pub trait Store {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// File-backed store: one file per key under the app's config directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open the store at the default location (`<config dir>/gazou/state`).
    pub fn open_default() -> anyhow::Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("gazou")
            .join("state");
        Ok(Self::at(dir))
    }

    /// Open the store rooted at an explicit directory.
    pub fn at(dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Could not create state directory: {}", e);
        }
        Self { dir }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Err(e) = std::fs::write(self.key_path(key), value) {
            tracing::warn!("Failed to persist '{}': {}", key, e);
        }
    }

    fn remove(&mut self, key: &str) {
        let _ = std::fs::remove_file(self.key_path(key));
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemStore {
    values: HashMap<String, String>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_store_roundtrip() {
        let mut store = MemStore::new();
        assert_eq!(store.get("missing"), None);

        store.set(KEY_THEME, "dark");
        assert_eq!(store.get(KEY_THEME), Some("dark".to_string()));

        store.set(KEY_THEME, "light");
        assert_eq!(store.get(KEY_THEME), Some("light".to_string()));

        store.remove(KEY_THEME);
        assert_eq!(store.get(KEY_THEME), None);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = FileStore::at(tmp.path().join("state"));

        assert_eq!(store.get(KEY_API_CREDENTIAL), None);

        store.set(KEY_API_CREDENTIAL, "sk-or-v1-abc");
        assert_eq!(store.get(KEY_API_CREDENTIAL), Some("sk-or-v1-abc".to_string()));

        // A second store over the same directory sees the value.
        let reopened = FileStore::at(tmp.path().join("state"));
        assert_eq!(reopened.get(KEY_API_CREDENTIAL), Some("sk-or-v1-abc".to_string()));

        store.remove(KEY_API_CREDENTIAL);
        assert_eq!(store.get(KEY_API_CREDENTIAL), None);
    }
}
