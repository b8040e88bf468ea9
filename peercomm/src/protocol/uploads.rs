//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Upload tokens for data served on request.
//!
//! An endpoint registers data under a fresh [`UploadToken`] and hands the
//! token to a peer, usually inside a command result. The peer later sends a
//! download request with the token and receives the data over its data
//! channel. Tokens are single use and expire after a time-to-live.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Handle for registered upload data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadToken(Uuid);

impl UploadToken {
    /// Creates a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where registered upload data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// Data held in memory.
    Bytes(Vec<u8>),
    /// Data read from a file when it is downloaded.
    File(PathBuf),
}

impl UploadSource {
    /// Loads the data.
    pub async fn load(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::File(path) => tokio::fs::read(path).await,
        }
    }
}

struct Entry {
    source: UploadSource,
    registered_at: Instant,
}

/// Table of registered uploads.
///
/// # Examples
///
/// ```rust
/// use peercomm::protocol::{UploadRegistry, UploadSource};
/// use std::time::Duration;
///
/// let registry = UploadRegistry::new(Duration::from_secs(60));
/// let token = registry.register(UploadSource::Bytes(b"payload".to_vec()));
///
/// assert!(registry.take(&token).is_some());
/// assert!(registry.take(&token).is_none());
/// ```
pub struct UploadRegistry {
    entries: RwLock<HashMap<UploadToken, Entry>>,
    ttl: Duration,
}

impl UploadRegistry {
    /// Creates a registry whose tokens expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Registers data and returns its token.
    pub fn register(&self, source: UploadSource) -> UploadToken {
        self.evict_expired();
        let token = UploadToken::new();
        self.entries.write().insert(
            token,
            Entry {
                source,
                registered_at: Instant::now(),
            },
        );
        tracing::trace!(%token, "registered upload");
        token
    }

    /// Removes and returns the data for a token, unless it expired.
    pub fn take(&self, token: &UploadToken) -> Option<UploadSource> {
        let entry = self.entries.write().remove(token)?;
        if entry.registered_at.elapsed() > self.ttl {
            tracing::debug!(%token, "upload token expired");
            return None;
        }
        Some(entry.source)
    }

    /// Returns the data for a token without consuming it, unless it expired.
    #[must_use]
    pub fn get(&self, token: &UploadToken) -> Option<UploadSource> {
        self.entries
            .read()
            .get(token)
            .filter(|e| e.registered_at.elapsed() <= self.ttl)
            .map(|e| e.source.clone())
    }

    /// Returns `true` if a live entry exists for the token.
    #[must_use]
    pub fn contains(&self, token: &UploadToken) -> bool {
        self.entries
            .read()
            .get(token)
            .is_some_and(|e| e.registered_at.elapsed() <= self.ttl)
    }

    /// Drops expired entries and returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.registered_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    /// Number of registered entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for UploadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRegistry")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_single_use() {
        let registry = UploadRegistry::new(Duration::from_secs(60));
        let token = registry.register(UploadSource::Bytes(vec![1, 2, 3]));
        assert!(registry.contains(&token));
        assert_eq!(registry.take(&token), Some(UploadSource::Bytes(vec![1, 2, 3])));
        assert!(!registry.contains(&token));
        assert_eq!(registry.take(&token), None);
    }

    #[test]
    fn test_unknown_token() {
        let registry = UploadRegistry::new(Duration::from_secs(60));
        assert_eq!(registry.take(&UploadToken::new()), None);
        assert_eq!(registry.get(&UploadToken::new()), None);
    }

    #[test]
    fn test_get_does_not_consume() {
        let registry = UploadRegistry::new(Duration::from_secs(60));
        let token = registry.register(UploadSource::Bytes(vec![4, 5]));
        assert_eq!(registry.get(&token), Some(UploadSource::Bytes(vec![4, 5])));
        assert_eq!(registry.get(&token), Some(UploadSource::Bytes(vec![4, 5])));
        assert!(registry.take(&token).is_some());
        assert_eq!(registry.get(&token), None);
    }

    #[test]
    fn test_expired_tokens_are_evicted() {
        let registry = UploadRegistry::new(Duration::ZERO);
        let token = registry.register(UploadSource::Bytes(vec![1]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!registry.contains(&token));
        assert_eq!(registry.evict_expired(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"file contents").unwrap();
        let source = UploadSource::File(path);
        assert_eq!(source.load().await.unwrap(), b"file contents");
    }
}
