//! In-memory repository for testing.
//!
//! This adapter implements both repository ports without touching the file
//! system. Values are still encoded to MessagePack bytes so that a save/load
//! cycle exercises the same serde paths as the file-backed adapters.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Result,
    action_values::ActionValueTable,
    error::Error,
    ports::{ActionValueKey, ActionValueRepository, ResultRepository},
    selection::ResultBundle,
};

/// In-memory repository for testing.
///
/// # Examples
///
/// ```
/// use costometer::adapters::InMemoryRepository;
/// use costometer::ports::ResultRepository;
/// use costometer::selection::ResultBundle;
/// use std::path::Path;
///
/// let repo = InMemoryRepository::new();
/// repo.save(&ResultBundle::default(), Path::new("quest/mle_and_map.msgpack"))?;
/// assert_eq!(repo.count(), 1);
/// let loaded = repo.load(Path::new("quest/mle_and_map.msgpack"))?;
/// assert!(loaded.softmax.is_empty());
/// # Ok::<(), costometer::Error>(())
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    storage: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries of either kind.
    pub fn count(&self) -> usize {
        self.storage().len()
    }

    pub fn clear(&self) {
        self.storage().clear();
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.storage().contains_key(path)
    }

    fn storage(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put<T: Serialize>(&self, path: PathBuf, value: &T, what: &str) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(value).map_err(|e| Error::SerializationContext {
            operation: format!("serialize {what} for in-memory storage"),
            message: e.to_string(),
        })?;
        self.storage().insert(path, bytes);
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, path: &Path, what: &str) -> Result<Option<T>> {
        let storage = self.storage();
        let Some(bytes) = storage.get(path) else {
            return Ok(None);
        };
        rmp_serde::from_slice(bytes)
            .map(Some)
            .map_err(|e| Error::SerializationContext {
                operation: format!("deserialize {what} from in-memory storage"),
                message: e.to_string(),
            })
    }
}

impl ActionValueRepository for InMemoryRepository {
    fn save(&self, key: &ActionValueKey, table: &ActionValueTable) -> Result<PathBuf> {
        let path = PathBuf::from(key.file_name());
        self.put(path.clone(), table, "action-value table")?;
        Ok(path)
    }

    fn load(&self, key: &ActionValueKey) -> Result<ActionValueTable> {
        let path = PathBuf::from(key.file_name());
        self.get(&path, "action-value table")?
            .ok_or_else(|| Error::ActionValuesNotFound {
                path: path.display().to_string(),
            })
    }

    fn contains(&self, key: &ActionValueKey) -> bool {
        self.contains_path(Path::new(&key.file_name()))
    }
}

impl ResultRepository for InMemoryRepository {
    fn save(&self, bundle: &ResultBundle, path: &Path) -> Result<()> {
        self.put(path.to_path_buf(), bundle, "result bundle")
    }

    fn load(&self, path: &Path) -> Result<ResultBundle> {
        self.get(path, "result bundle")?.ok_or_else(|| Error::Io {
            operation: format!("load result bundle from in-memory storage at {path:?}"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "key not found in memory"),
        })
    }

    fn list(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        Ok(self
            .storage()
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(prefix))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Parameters;

    #[test]
    fn test_resave_overwrites() {
        let repo = InMemoryRepository::new();
        let key = ActionValueKey::new("toy", "linear_depth", Parameters::new().with("w", 1.0));
        let mut table = ActionValueTable::new();
        table.insert("root", 0, 0.0);

        ActionValueRepository::save(&repo, &key, &table).unwrap();
        table.insert("root", 1, 1.0);
        ActionValueRepository::save(&repo, &key, &table).unwrap();

        assert_eq!(repo.count(), 1);
        assert_eq!(ActionValueRepository::load(&repo, &key).unwrap(), table);
    }

    #[test]
    fn test_load_nonexistent_returns_error() {
        let repo = InMemoryRepository::new();
        let key = ActionValueKey::new("toy", "linear_depth", Parameters::new());
        assert!(matches!(
            ActionValueRepository::load(&repo, &key),
            Err(Error::ActionValuesNotFound { .. })
        ));
        assert!(ResultRepository::load(&repo, Path::new("missing")).is_err());
    }

    #[test]
    fn test_clone_shares_storage() {
        let repo1 = InMemoryRepository::new();
        let repo2 = repo1.clone();
        let path = Path::new("processed/quest/linear_depth/mle_and_map.msgpack");

        ResultRepository::save(&repo1, &ResultBundle::default(), path).unwrap();
        assert!(repo2.contains_path(path));
        assert_eq!(
            repo2
                .list(Path::new("processed/quest/linear_depth"), "mle_and_map")
                .unwrap(),
            vec![path.to_path_buf()]
        );

        repo2.clear();
        assert_eq!(repo1.count(), 0);
    }
}
