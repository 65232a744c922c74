use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Write {
            key: dir.display().to_string(),
            source,
        })?;

        debug!(dir = %dir.display(), "file storage opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key, error = %err, "failed to read stored collection");
                None
            }
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let staging = self.dir.join(format!(".{key}.json.tmp"));

        let to_error = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };

        fs::write(&staging, contents).map_err(to_error)?;
        fs::rename(&staging, &path).map_err(to_error)?;
        Ok(())
    }
}
