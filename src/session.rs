use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::WorkflowState;

/// Synchronous string key-value transport.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// One `<key>.json` file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Written to a sibling temp file and renamed so a crash never leaves a
    /// half-written value.
    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let values = self
            .values
            .lock()
            .map_err(|e| AppError::Config(format!("store lock poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| AppError::Config(format!("store lock poisoned: {}", e)))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Serializes [`WorkflowState`] under a fixed key.
pub struct SessionStore {
    store: Box<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(store: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), "aiCookingState")
    }

    pub fn save(&self, state: &WorkflowState) -> Result<(), AppError> {
        let json = serde_json::to_string(state)?;
        self.store.set(&self.key, &json)?;
        debug!(key = %self.key, bytes = json.len(), "session saved");
        Ok(())
    }

    /// Never fails: a missing, unreadable or corrupt value means "no prior
    /// state". Missing or malformed fields fall back to their defaults.
    pub fn load(&self) -> Option<WorkflowState> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "could not read saved session");
                return None;
            }
        };
        let value = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding corrupt saved session");
                return None;
            }
        };
        let state = WorkflowState::from_stored(&value);
        if state.is_none() {
            warn!(key = %self.key, "saved session is not an object, ignoring it");
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Category, MenuCandidate, SelectedIngredient};

    fn sample_state() -> WorkflowState {
        WorkflowState {
            selected_ingredients: vec![SelectedIngredient {
                id: "tomato".into(),
                name: "トマト".into(),
                category: Category::Vegetables,
                original_selection: None,
            }],
            proposed_menus: vec![MenuCandidate {
                menu_name: "トマトスープ".into(),
                ..Default::default()
            }],
            selected_menu_index: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_and_load_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionStore::new(Box::new(FileStore::new(dir.path())), "aiCookingState");
        assert!(session.load().is_none());

        session.save(&sample_state()).unwrap();
        assert!(dir.path().join("aiCookingState.json").exists());
        assert_eq!(session.load().unwrap(), sample_state());
    }

    #[test]
    fn test_corrupt_value_is_no_state() {
        let store = MemoryStore::new();
        store.set("k", "{ definitely not json").unwrap();
        let session = SessionStore::new(Box::new(store), "k");
        assert!(session.load().is_none());
    }

    #[test]
    fn test_partial_value_defaults_missing_fields() {
        let store = MemoryStore::new();
        store
            .set(
                "k",
                r#"{"selectedIngredients":[{"id":"egg","name":"卵","category":"processed"}],"selectedMenuIndex":3}"#,
            )
            .unwrap();
        let state = SessionStore::new(Box::new(store), "k").load().unwrap();
        assert_eq!(state.selected_ingredients.len(), 1);
        assert!(state.proposed_menus.is_empty());
        // index past the (empty) menu list is dropped
        assert_eq!(state.selected_menu_index, None);
        assert_eq!(state.settings.season, "春");
    }

    #[test]
    fn test_malformed_fields_keep_the_rest() {
        let stored = [
            r#"{"selectedIngredients":[{"id":"egg","name":"卵","category":"processed"}],"proposedMenus":null}"#,
            r#"{"selectedIngredients":[{"id":"egg","name":"卵","category":"processed"},{"id":"tomato"}]}"#,
            r#"{"selectedIngredients":[{"id":"egg","name":"卵","category":"processed"}],"isDetailedStepsDisplayed":"true"}"#,
        ];
        for raw in stored {
            let store = MemoryStore::new();
            store.set("k", raw).unwrap();
            let state = SessionStore::new(Box::new(store), "k")
                .load()
                .unwrap_or_else(|| panic!("lost session for {}", raw));
            assert_eq!(state.selected_ingredients.len(), 1);
            assert_eq!(state.selected_ingredients[0].name, "卵");
            assert!(state.proposed_menus.is_empty());
            assert!(!state.is_detailed_steps_displayed);
        }
    }

    #[test]
    fn test_unreadable_entry_is_no_state() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be makes the read fail
        std::fs::create_dir_all(dir.path().join("k.json")).unwrap();
        let session = SessionStore::new(Box::new(FileStore::new(dir.path())), "k");
        assert!(session.load().is_none());
    }

    #[test]
    fn test_keys_are_sanitized() {
        let store = FileStore::new("/tmp/x");
        assert_eq!(store.path_for("../evil key"), PathBuf::from("/tmp/x/___evil_key.json"));
    }
}
