//! durable key-value storage: one toml file per key under the project data
//! directory, replaced atomically on every write so a crashed write can never
//! clobber the previous record.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

/// serde default helper, alarms are enabled unless the file says otherwise
#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no project data directory available")]
    NoProjectDirs,
    #[error("couldn't read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("couldn't parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("couldn't serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("couldn't write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// where the durable keys live
#[derive(Debug, Clone)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    /// resolve the per-user data directory
    pub fn new() -> Result<Self, StorageError> {
        directories::ProjectDirs::from("", "", "scanwake")
            .map(|dirs| Self {
                data_dir: dirs.data_dir().to_path_buf(),
            })
            .ok_or(StorageError::NoProjectDirs)
    }

    /// use an explicit directory instead of the per-user one
    #[must_use]
    pub const fn at(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    #[must_use]
    pub fn key_file(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.toml"))
    }

    /// voice memos recorded by the user end up here
    #[must_use]
    pub fn recordings_dir(&self) -> PathBuf {
        self.data_dir.join("recordings")
    }
}

/// read and decode one key. a missing file is `None`, not an error.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| StorageError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
}

/// encode and durably replace one key. the write goes to a temp file in the
/// same directory first, then renames over the old record.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let contents = toml::to_string(value).map_err(|e| StorageError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StorageError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(temp.path(), contents).map_err(|e| StorageError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    temp.persist(path).map_err(|e| StorageError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// best-effort delete, used to retire legacy keys after migration
pub fn remove(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("couldn't remove {}: {e}", path.display());
        }
    }
}
