use dashmap::DashMap;

use crate::error::StorageError;
use crate::storage::Storage;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// Memory storage whose writes fail for chosen keys.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FlakyStorage {
    inner: MemoryStorage,
    broken: dashmap::DashSet<String>,
}

#[cfg(test)]
impl FlakyStorage {
    pub(crate) fn break_key(&self, key: &str) {
        self.broken.insert(key.to_string());
    }

    pub(crate) fn repair(&self) {
        self.broken.clear();
    }
}

#[cfg(test)]
impl Storage for FlakyStorage {
    fn read(&self, key: &str) -> Option<String> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), StorageError> {
        if self.broken.contains(key) {
            return Err(StorageError::Write {
                key: key.to_string(),
                source: std::io::Error::other("quota exceeded"),
            });
        }
        self.inner.write(key, contents)
    }
}
