//! Cache storage module
//!
//! This module provides persistent caching functionality using the system's
//! standard cache directory. Data is serialized to JSON format for storage.

use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to determine cache directory location
    #[error("Failed to determine cache directory location")]
    CacheDirectoryNotFound,

    /// Failed to create or access cache directory
    #[error("Failed to create cache directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read cached data
    #[error("Failed to read cache file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write cached data
    #[error("Failed to write cache file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize cached data
    #[error("Failed to deserialize cache file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize data for caching
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A generic cache storage for serializable data
///
/// This structure provides persistent caching of data that implements
/// `Serialize` and `Deserialize`. Data is stored as JSON files in the
/// system's standard cache directory. Entries older than the optional
/// time-to-live are treated as missing.
pub struct CacheStorage<T> {
    /// The directory where cached data is stored
    cache_dir: PathBuf,
    /// Maximum age of a cache entry
    ttl: Option<Duration>,
    /// Phantom data for the generic type
    _phantom: PhantomData<T>,
}

impl<T> CacheStorage<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Opens or creates a cache storage with the given name
    ///
    /// The cache will be stored in the system's standard cache directory
    /// under a subdirectory named after the application and the provided name.
    /// The name will be sanitized (lowercased, non-alphanumeric characters
    /// replaced with underscores).
    ///
    /// # Arguments
    ///
    /// * `name` - The name for this cache storage
    /// * `ttl` - Maximum age of an entry, `None` keeps entries forever
    ///
    /// # Returns
    ///
    /// A Result containing the CacheStorage or a CacheError
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let cache: CacheStorage<TVSeries> =
    ///     CacheStorage::open("metadata", Some(Duration::from_secs(24 * 60 * 60)))?;
    /// ```
    pub fn open(name: &str, ttl: Option<Duration>) -> Result<Self, CacheError> {
        // Get the cache directory for this application
        let proj_dirs = directories::ProjectDirs::from("de", "westhoffswelt", "tvrename")
            .ok_or(CacheError::CacheDirectoryNotFound)?;

        Self::open_in(&proj_dirs.cache_dir().join(sanitize_name(name)), ttl)
    }

    /// Opens or creates a cache storage in an explicit directory
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - The directory holding the cache entries
    /// * `ttl` - Maximum age of an entry, `None` keeps entries forever
    pub fn open_in(cache_dir: &Path, ttl: Option<Duration>) -> Result<Self, CacheError> {
        // Create the directory if it doesn't exist
        fs::create_dir_all(cache_dir).map_err(|e| CacheError::DirectoryCreationFailed {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            ttl,
            _phantom: PhantomData,
        })
    }

    fn entry_path(&self, identifier: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", sanitize_name(identifier)))
    }

    fn is_expired(&self, file_path: &Path) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };

        fs::metadata(file_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > ttl)
    }

    /// Loads cached data for the given identifier
    ///
    /// # Arguments
    ///
    /// * `identifier` - A unique identifier for the cached data
    ///
    /// # Returns
    ///
    /// An Option containing the cached data if it exists and is valid,
    /// or None if the data doesn't exist or has expired. Returns an error
    /// if the data exists but cannot be read or deserialized.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// if let Some(series) = cache.load("name_en_scrubs")? {
    ///     println!("Found cached series: {}", series.name);
    /// }
    /// ```
    pub fn load(&self, identifier: &str) -> Result<Option<T>, CacheError> {
        let file_path = self.entry_path(identifier);

        // If file doesn't exist or is too old, return None
        if !file_path.exists() || self.is_expired(&file_path) {
            return Ok(None);
        }

        // Read the file
        let content = fs::read_to_string(&file_path).map_err(|e| CacheError::ReadFailed {
            path: file_path.clone(),
            source: e,
        })?;

        // Deserialize the JSON
        let data =
            serde_json::from_str(&content).map_err(|e| CacheError::DeserializationFailed {
                path: file_path,
                source: e,
            })?;

        Ok(Some(data))
    }

    /// Stores data in the cache with the given identifier
    ///
    /// # Arguments
    ///
    /// * `identifier` - A unique identifier for the cached data
    /// * `data` - The data to cache
    ///
    /// # Returns
    ///
    /// A Result indicating success or failure
    ///
    /// # Examples
    ///
    /// ```ignore
    /// cache.store("name_en_scrubs", &series)?;
    /// ```
    pub fn store(&self, identifier: &str, data: &T) -> Result<(), CacheError> {
        let file_path = self.entry_path(identifier);

        // Serialize to JSON
        let content = serde_json::to_string_pretty(data)?;

        // Write to file
        fs::write(&file_path, content).map_err(|e| CacheError::WriteFailed {
            path: file_path,
            source: e,
        })?;

        Ok(())
    }

    /// Returns the path to the cache directory
    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }
}

/// Sanitizes a name for use in file paths
///
/// Converts to lowercase and replaces all characters that are not
/// a-z, 0-9, or hyphen with underscores.
fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Simple"), "simple");
        assert_eq!(sanitize_name("With Spaces"), "with_spaces");
        assert_eq!(sanitize_name("With-Hyphens"), "with-hyphens");
        assert_eq!(sanitize_name("Special!@#$%"), "special_____");
        assert_eq!(sanitize_name("Mixed123ABC"), "mixed123abc");
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStorage::<Vec<String>>::open_in(dir.path(), None).unwrap();

        assert_eq!(cache.load("Scrubs").unwrap(), None);

        cache.store("Scrubs", &vec!["My First Day".to_string()]).unwrap();
        assert_eq!(
            cache.load("Scrubs").unwrap(),
            Some(vec!["My First Day".to_string()])
        );
    }

    #[test]
    fn test_expired_entries_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStorage::<u32>::open_in(dir.path(), Some(Duration::ZERO)).unwrap();

        cache.store("entry", &1).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.load("entry").unwrap(), None);
    }

    #[test]
    fn test_corrupt_entry_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStorage::<u32>::open_in(dir.path(), None).unwrap();

        fs::write(dir.path().join("broken.json"), "not json").unwrap();
        assert!(matches!(
            cache.load("broken"),
            Err(CacheError::DeserializationFailed { .. })
        ));
    }
}
