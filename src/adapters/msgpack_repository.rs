//! MessagePack implementations of the repository ports.
//!
//! Both adapters use rmp_serde for compact binary serialization. Result
//! bundles are addressed by path; action-value tables live as one file per
//! key inside a single directory.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Result,
    action_values::ActionValueTable,
    error::Error,
    ports::{ActionValueKey, ActionValueRepository, ResultRepository},
    selection::ResultBundle,
};

fn write_msgpack<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            operation: format!("create directory {parent:?}"),
            source,
        })?;
    }

    let file = File::create(path).map_err(|source| Error::Io {
        operation: format!("create file {path:?}"),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    rmp_serde::encode::write_named(&mut writer, value).map_err(|e| {
        Error::SerializationContext {
            operation: format!("serialize {what} to MessagePack"),
            message: e.to_string(),
        }
    })?;

    writer.flush().map_err(|source| Error::Io {
        operation: format!("write file {path:?}"),
        source,
    })
}

fn read_msgpack<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path).map_err(|source| Error::Io {
        operation: format!("open file {path:?}"),
        source,
    })?;

    rmp_serde::decode::from_read(&file).map_err(|e| Error::SerializationContext {
        operation: format!("deserialize {what} from MessagePack"),
        message: e.to_string(),
    })
}

/// MessagePack result-bundle repository.
///
/// # Examples
///
/// ```no_run
/// use costometer::adapters::MsgPackRepository;
/// use costometer::ports::ResultRepository;
/// use std::path::Path;
///
/// let repo = MsgPackRepository;
/// let bundle = repo.load(Path::new("data/processed/quest/linear_depth/mle_and_map.msgpack"))?;
/// repo.save(&bundle, Path::new("backup.msgpack"))?;
/// # Ok::<(), costometer::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackRepository;

impl MsgPackRepository {
    pub fn new() -> Self {
        Self
    }
}

impl ResultRepository for MsgPackRepository {
    fn save(&self, bundle: &ResultBundle, path: &Path) -> Result<()> {
        write_msgpack(bundle, path, "result bundle")
    }

    fn load(&self, path: &Path) -> Result<ResultBundle> {
        read_msgpack(path, "result bundle")
    }

    fn list(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir).map_err(|source| Error::Io {
            operation: format!("read directory {dir:?}"),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".msgpack"));
            if matches {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Directory of MessagePack action-value tables, one file per
/// [`ActionValueKey::file_name`].
#[derive(Debug, Clone)]
pub struct MsgPackActionValueStore {
    dir: PathBuf,
}

impl MsgPackActionValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ActionValueKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl ActionValueRepository for MsgPackActionValueStore {
    fn save(&self, key: &ActionValueKey, table: &ActionValueTable) -> Result<PathBuf> {
        let path = self.path_for(key);
        write_msgpack(table, &path, "action-value table")?;
        Ok(path)
    }

    fn load(&self, key: &ActionValueKey) -> Result<ActionValueTable> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(Error::ActionValuesNotFound {
                path: path.display().to_string(),
            });
        }
        read_msgpack(&path, "action-value table")
    }

    fn contains(&self, key: &ActionValueKey) -> bool {
        self.path_for(key).is_file()
    }
}
