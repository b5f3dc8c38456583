use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use crate::config;
use crate::types::{clamp_font_size, DisplaySettings, ReadingPosition, RgbColor};

pub const KEY_TEXT_SIZE: &str = "text_size";
pub const KEY_TEXT_COLOR: &str = "text_color";
pub const KEY_BG_COLOR: &str = "bg_color";
pub const KEY_LAST_POSITION_PREFIX: &str = "last_position_";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no config dir")]
    NoConfigDir,
}

/// Durable integer key-value store. Writes are last-write-wins.
pub trait KeyValueStore {
    fn get(&self, key: &str, default: i64) -> i64;
    fn put(&self, key: &str, value: i64) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str, default: i64) -> i64 {
        (**self).get(key, default)
    }

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError> {
        (**self).put(key, value)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str, default: i64) -> i64 {
        (**self).get(key, default)
    }

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError> {
        (**self).put(key, value)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<String, i64> {
        self.values.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str, default: i64) -> i64 {
        self.values
            .lock()
            .ok()
            .and_then(|v| v.get(key).copied())
            .unwrap_or(default)
    }

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// Keeps every key in one pretty-printed JSON object on disk. Each `put`
/// reads the file, updates the key and writes it back.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `state.json` under the platform config directory.
    pub fn open_default() -> Result<Self, StoreError> {
        config::state_path()
            .map(Self::new)
            .ok_or(StoreError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, i64> {
        fs::read(&self.path)
            .ok()
            .and_then(|d| serde_json::from_slice(&d).ok())
            .unwrap_or_default()
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str, default: i64) -> i64 {
        self.load().get(key).copied().unwrap_or(default)
    }

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut values = self.load();
        values.insert(key.to_string(), value);
        let s = serde_json::to_string_pretty(&values)?;
        let mut f = fs::File::create(&self.path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }
}

/// Stable identity for a file: the first 16 hex digits of SHA-256 over its
/// absolute path.
pub fn file_identity(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

pub fn position_key(file_identity: &str) -> String {
    format!("{KEY_LAST_POSITION_PREFIX}{file_identity}")
}

pub fn load_position<S: KeyValueStore + ?Sized>(store: &S, file_identity: &str) -> ReadingPosition {
    let raw = store.get(&position_key(file_identity), 0);
    ReadingPosition {
        file_identity: file_identity.to_string(),
        page_index: usize::try_from(raw).unwrap_or(0),
    }
}

/// Fire-and-forget: a failed write is logged, never surfaced.
pub fn save_position<S: KeyValueStore + ?Sized>(store: &S, position: &ReadingPosition) {
    let value = i64::try_from(position.page_index).unwrap_or(i64::MAX);
    if let Err(e) = store.put(&position_key(&position.file_identity), value) {
        warn!(file = %position.file_identity, error = %e, "failed to save reading position");
    }
}

pub fn load_settings<S: KeyValueStore + ?Sized>(store: &S) -> DisplaySettings {
    let defaults = DisplaySettings::default();
    DisplaySettings {
        font_size_pt: clamp_font_size(store.get(KEY_TEXT_SIZE, defaults.font_size_pt as i64)),
        text_color: load_color(store, KEY_TEXT_COLOR, defaults.text_color),
        background_color: load_color(store, KEY_BG_COLOR, defaults.background_color),
    }
}

fn load_color<S: KeyValueStore + ?Sized>(store: &S, key: &str, default: RgbColor) -> RgbColor {
    let raw = store.get(key, default.packed() as i64);
    u32::try_from(raw & 0xFF_FFFF)
        .map(RgbColor::from_packed)
        .unwrap_or(default)
}

pub fn save_settings<S: KeyValueStore + ?Sized>(store: &S, settings: &DisplaySettings) {
    let entries = [
        (KEY_TEXT_SIZE, settings.font_size_pt as i64),
        (KEY_TEXT_COLOR, settings.text_color.packed() as i64),
        (KEY_BG_COLOR, settings.background_color.packed() as i64),
    ];
    for (key, value) in entries {
        if let Err(e) = store.put(key, value) {
            warn!(key, error = %e, "failed to save display settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_absent() {
        let store = MemoryStore::new();
        assert_eq!(load_settings(&store), DisplaySettings::default());
    }

    #[test]
    fn settings_round_trip_and_clamp() {
        let store = MemoryStore::new();
        let settings = DisplaySettings {
            font_size_pt: 20,
            text_color: RgbColor::BLUE,
            background_color: RgbColor::GREEN_TINT,
        };
        save_settings(&store, &settings);
        assert_eq!(load_settings(&store), settings);
        assert_eq!(store.get(KEY_TEXT_COLOR, 0), 0x0000FF);

        store.put(KEY_TEXT_SIZE, 40).expect("put");
        assert_eq!(load_settings(&store).font_size_pt, 24);
    }

    #[test]
    fn signed_argb_colors_are_accepted() {
        let store = MemoryStore::new();
        // 0xFFF5E6CA as a signed 32-bit value.
        store.put(KEY_BG_COLOR, -661_814).expect("put");
        assert_eq!(load_settings(&store).background_color, RgbColor::WARM);
    }

    #[test]
    fn position_defaults_to_zero() {
        let store = MemoryStore::new();
        let pos = load_position(&store, "abc");
        assert_eq!(pos.page_index, 0);
        save_position(
            &store,
            &ReadingPosition {
                file_identity: "abc".into(),
                page_index: 7,
            },
        );
        assert_eq!(load_position(&store, "abc").page_index, 7);
        assert_eq!(store.get("last_position_abc", 0), 7);

        store.put("last_position_abc", -3).expect("put");
        assert_eq!(load_position(&store, "abc").page_index, 0);
    }

    #[test]
    fn identity_is_stable_per_path() {
        let a = file_identity(Path::new("/books/a.txt"));
        assert_eq!(a, file_identity(Path::new("/books/a.txt")));
        assert_ne!(a, file_identity(Path::new("/books/b.txt")));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn json_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");
        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(KEY_TEXT_SIZE, 16), 16);
        store.put(KEY_TEXT_SIZE, 18).expect("put");
        store.put("last_position_x", 4).expect("put");

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get(KEY_TEXT_SIZE, 16), 18);
        assert_eq!(reopened.get("last_position_x", 0), 4);
    }

    #[test]
    fn corrupt_json_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").expect("write");
        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(KEY_TEXT_SIZE, 16), 16);
        store.put(KEY_TEXT_SIZE, 12).expect("put");
        assert_eq!(store.get(KEY_TEXT_SIZE, 16), 12);
    }
}
