// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    fmt::Debug,
    fs,
    io::{ErrorKind as IoErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use hashbrown::HashMap;
use objcache_common::error::{Error, Result};
use parking_lot::RwLock;
use tempfile::NamedTempFile;

/// Key/value store shared by every process that caches the same objects.
///
/// It only keeps the last invalidation timestamp of each invalidation key.
pub trait SharedStore: Send + Sync + 'static + Debug {
    /// Read the timestamp stored under `key`, `None` if the key has never been written.
    fn read_timestamp(&self, key: &str) -> Result<Option<u64>>;

    /// Store `timestamp` under `key`, replacing any previous value.
    fn write_timestamp(&self, key: &str, timestamp: u64) -> Result<()>;
}

/// In-memory [`SharedStore`].
///
/// Clones share the same storage, so coordinators built with clones of one store observe each other's invalidations.
#[derive(Debug, Clone, Default)]
pub struct MemorySharedStore {
    timestamps: Arc<RwLock<HashMap<String, u64>>>,
}

impl MemorySharedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of stored keys.
    pub fn len(&self) -> usize {
        self.timestamps.read().len()
    }

    /// Returns `true` if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SharedStore for MemorySharedStore {
    fn read_timestamp(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.timestamps.read().get(key).copied())
    }

    fn write_timestamp(&self, key: &str, timestamp: u64) -> Result<()> {
        self.timestamps.write().insert(key.to_string(), timestamp);
        Ok(())
    }
}

/// [`SharedStore`] backed by a directory, one file per key.
///
/// Files hold the timestamp as decimal text. Writes go through a temporary file and a rename, so readers never
/// observe a partially written value. Processes on the same host can share the directory.
#[derive(Debug, Clone)]
pub struct FileSharedStore {
    dir: PathBuf,
}

impl FileSharedStore {
    /// Open the store in `dir`, creating the directory if it does not exist.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::unavailable("create shared store directory failed", e).with_context("dir", dir.display())
        })?;
        Ok(Self { dir })
    }

    /// Directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(escape(key))
    }
}

impl SharedStore for FileSharedStore {
    fn read_timestamp(&self, key: &str) -> Result<Option<u64>> {
        let path = self.path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::unavailable("read shared store failed", e).with_context("key", key));
            }
        };
        let timestamp = text.trim().parse::<u64>().map_err(|e| {
            Error::unavailable("malformed timestamp in shared store", e)
                .with_context("key", key)
                .with_context("path", path.display())
        })?;
        Ok(Some(timestamp))
    }

    fn write_timestamp(&self, key: &str, timestamp: u64) -> Result<()> {
        // One temporary file per write. It is removed on drop unless persisted.
        let write = || -> std::io::Result<()> {
            let mut file = NamedTempFile::new_in(&self.dir)?;
            file.write_all(timestamp.to_string().as_bytes())?;
            file.as_file().sync_data()?;
            file.persist(self.path(key)).map_err(|e| e.error)?;
            Ok(())
        };
        write().map_err(|e| Error::unavailable("write shared store failed", e).with_context("key", key))
    }
}

/// Map a key to a file name. Alphanumerics, `-` and `_` are kept, every other byte becomes `%XX`.
fn escape(key: &str) -> String {
    let mut res = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => res.push(byte as char),
            _ => res.push_str(&format!("%{byte:02X}")),
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use objcache_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("cache-space_1"), "cache-space_1");
        assert_eq!(escape("cache-space:1/doc.txt"), "cache-space%3A1%2Fdoc%2Etxt");
        assert_eq!(escape(".."), "%2E%2E");
    }

    #[test]
    fn test_memory_store_shared_by_clones() {
        let store = MemorySharedStore::new();
        let other = store.clone();
        assert_eq!(store.read_timestamp("cache-k").unwrap(), None);

        other.write_timestamp("cache-k", 42).unwrap();
        assert_eq!(store.read_timestamp("cache-k").unwrap(), Some(42));
        other.write_timestamp("cache-k", 7).unwrap();
        assert_eq!(store.read_timestamp("cache-k").unwrap(), Some(7));
        assert_eq!(store.len(), 1);
    }

    #[test_log::test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSharedStore::open(dir.path().join("timestamps")).unwrap();

        assert_eq!(store.read_timestamp("cache-space:1").unwrap(), None);
        store.write_timestamp("cache-space:1", 1_700_000_000_000).unwrap();
        assert_eq!(store.read_timestamp("cache-space:1").unwrap(), Some(1_700_000_000_000));

        // Another handle on the same directory sees the value.
        let reopened = FileSharedStore::open(store.dir()).unwrap();
        reopened.write_timestamp("cache-space:1", 5).unwrap();
        assert_eq!(store.read_timestamp("cache-space:1").unwrap(), Some(5));

        let files = fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test_log::test]
    fn test_file_store_concurrent_writers() {
        const ROUNDS: u64 = 100;

        let dir = tempfile::tempdir().unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles = (0..2u64)
            .map(|i| {
                let store = FileSharedStore::open(dir.path()).unwrap();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        barrier.wait();
                        store.write_timestamp("cache-k", round * 2 + i + 1).unwrap();
                        barrier.wait();
                        let timestamp = store.read_timestamp("cache-k").unwrap().unwrap();
                        assert!([round * 2 + 1, round * 2 + 2].contains(&timestamp));
                        barrier.wait();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        // No temporary file is left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test_log::test]
    fn test_file_store_malformed_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSharedStore::open(dir.path()).unwrap();
        fs::write(dir.path().join(escape("cache-k")), "not a number").unwrap();

        let err = store.read_timestamp("cache-k").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    }
}
