//! Versioned on-disk cache.
//!
//! Each cache file is a JSON envelope `{ version, fingerprint, payload }`.
//! A file is only served when both the format version and the fingerprint
//! of the inputs it was computed from match; anything else is a miss, and
//! the caller regenerates and stores.

use kolrag_core::AppResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Hex SHA-256 over a sequence of byte strings.
///
/// Parts are length-prefixed so that `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fingerprint<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    fingerprint: String,
    payload: T,
}

/// Header of a cache file, read without trusting its payload.
#[derive(Debug, Deserialize)]
struct Header {
    version: u32,
    fingerprint: String,
}

/// One cache file.
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
    version: u32,
}

impl CacheFile {
    /// Cache file in `dir`, named after `kind` and a hash of `key`.
    pub fn new(dir: &Path, kind: &str, key: &str, version: u32) -> Self {
        let hash = fingerprint([key]);
        Self {
            path: dir.join(format!("{}-{}.json", kind, &hash[..16])),
            version,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Payload of the cache file if its version and fingerprint match.
    pub fn load<T: DeserializeOwned>(&self, fingerprint: &str) -> AppResult<Option<T>> {
        self.read(Some(fingerprint))
    }

    /// Payload of the cache file if its version matches, whatever it was
    /// computed from. Used when the inputs are no longer available.
    pub fn load_any<T: DeserializeOwned>(&self) -> AppResult<Option<T>> {
        self.read(None)
    }

    fn read<T: DeserializeOwned>(&self, fingerprint: Option<&str>) -> AppResult<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;

        let header: Header = match serde_json::from_str(&content) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache file {:?}: {}", self.path, e);
                return Ok(None);
            }
        };
        if header.version != self.version {
            tracing::debug!(
                "Cache {:?} has version {}, expected {}",
                self.path,
                header.version,
                self.version
            );
            return Ok(None);
        }
        if let Some(expected) = fingerprint {
            if header.fingerprint != expected {
                tracing::debug!("Cache {:?} is stale", self.path);
                return Ok(None);
            }
        }

        let envelope: Envelope<T> = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache payload in {:?}: {}", self.path, e);
                return Ok(None);
            }
        };
        tracing::debug!("Cache hit: {:?}", self.path);
        Ok(Some(envelope.payload))
    }

    /// Write `payload`, creating the cache directory if needed.
    pub fn store<T: Serialize>(&self, fingerprint: &str, payload: &T) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = Envelope {
            version: self.version,
            fingerprint: fingerprint.to_string(),
            payload,
        };
        fs::write(&self.path, serde_json::to_string(&envelope)?)?;

        tracing::debug!("Cache written: {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_is_stable_and_unambiguous() {
        assert_eq!(fingerprint(["a", "b"]), fingerprint(["a", "b"]));
        assert_ne!(fingerprint(["ab", "c"]), fingerprint(["a", "bc"]));
        assert_eq!(fingerprint(["x"]).len(), 64);
    }

    #[test]
    fn test_store_and_load() {
        let temp = TempDir::new().unwrap();
        let cache = CacheFile::new(&temp.path().join("cache"), "corpus", "/data/pages", 1);

        cache.store("fp-1", &vec!["a".to_string()]).unwrap();
        let hit: Option<Vec<String>> = cache.load("fp-1").unwrap();
        assert_eq!(hit, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_stale_fingerprint_misses() {
        let temp = TempDir::new().unwrap();
        let cache = CacheFile::new(temp.path(), "corpus", "key", 1);
        cache.store("old", &1u32).unwrap();

        assert_eq!(cache.load::<u32>("new").unwrap(), None);
        assert_eq!(cache.load_any::<u32>().unwrap(), Some(1));
    }

    #[test]
    fn test_version_mismatch_misses() {
        let temp = TempDir::new().unwrap();
        CacheFile::new(temp.path(), "corpus", "key", 1)
            .store("fp", &1u32)
            .unwrap();

        let newer = CacheFile::new(temp.path(), "corpus", "key", 2);
        assert_eq!(newer.load::<u32>("fp").unwrap(), None);
        assert_eq!(newer.load_any::<u32>().unwrap(), None);
    }

    #[test]
    fn test_garbage_file_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = CacheFile::new(temp.path(), "corpus", "key", 1);
        fs::write(cache.path(), "not json").unwrap();
        assert_eq!(cache.load::<u32>("fp").unwrap(), None);
    }

    #[test]
    fn test_mismatched_payload_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = CacheFile::new(temp.path(), "optimized", "key", 1);
        cache.store("fp", &"not a list").unwrap();

        assert_eq!(cache.load::<Vec<String>>("fp").unwrap(), None);
        assert_eq!(cache.load_any::<Vec<String>>().unwrap(), None);

        cache.store("fp", &vec!["a".to_string()]).unwrap();
        assert_eq!(
            cache.load::<Vec<String>>("fp").unwrap(),
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_missing_file_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = CacheFile::new(temp.path(), "corpus", "key", 1);
        assert_eq!(cache.load_any::<u32>().unwrap(), None);
    }
}
