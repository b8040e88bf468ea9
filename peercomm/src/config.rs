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

//! Read-only key/value configuration seam.
//!
//! Hosting applications load configuration however they like (files,
//! environment, command line) and hand it to the endpoint through a
//! [`ConfigurationStore`]. [`EndpointConfig::from_store`] reads the
//! `peercomm.*` keys from it.
//!
//! [`EndpointConfig::from_store`]: crate::endpoint::EndpointConfig::from_store
//!
//! # Examples
//!
//! ```rust
//! use peercomm::config::{ConfigurationStore, ConfigurationStoreExt, MapConfiguration};
//!
//! let store = MapConfiguration::new()
//!     .with_value("peercomm.max_send_retries", 5)
//!     .with_value("peercomm.tcp.bind_address", "127.0.0.1:0");
//!
//! assert!(store.has_value_for("peercomm.max_send_retries"));
//! assert_eq!(store.value::<u32>("peercomm.max_send_retries").unwrap(), Some(5));
//! assert_eq!(store.value::<u32>("peercomm.missing").unwrap(), None);
//! ```

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;

/// Error raised when a configuration value has the wrong shape.
#[derive(Debug, Error)]
#[error("invalid configuration value for '{key}': {reason}")]
pub struct ConfigurationError {
    key: String,
    reason: String,
}

impl ConfigurationError {
    /// Creates a configuration error for a key.
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// The key whose value was rejected.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A read-only source of configuration values.
pub trait ConfigurationStore: Send + Sync {
    /// Returns `true` if the store holds a value for the key.
    fn has_value_for(&self, key: &str) -> bool;

    /// Returns the raw value stored for the key.
    fn raw_value(&self, key: &str) -> Option<serde_json::Value>;
}

/// Typed access on top of [`ConfigurationStore`].
pub trait ConfigurationStoreExt: ConfigurationStore {
    /// Returns the value for the key converted to `T`, `None` when absent.
    fn value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigurationError> {
        match self.raw_value(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw)
                .map(Some)
                .map_err(|e| ConfigurationError::new(key, e.to_string())),
        }
    }
}

impl<S: ConfigurationStore + ?Sized> ConfigurationStoreExt for S {}

/// In-memory [`ConfigurationStore`].
#[derive(Debug, Clone, Default)]
pub struct MapConfiguration {
    values: HashMap<String, serde_json::Value>,
}

impl MapConfiguration {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, replacing any previous value for the key.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigurationStore for MapConfiguration {
    fn has_value_for(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn raw_value(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let store = MapConfiguration::new()
            .with_value("a", 3)
            .with_value("b", "text")
            .with_value("c", true);
        assert_eq!(store.value::<u64>("a").unwrap(), Some(3));
        assert_eq!(store.value::<String>("b").unwrap(), Some("text".to_string()));
        assert_eq!(store.value::<bool>("c").unwrap(), Some(true));
    }

    #[test]
    fn test_wrong_type_is_error() {
        let store = MapConfiguration::new().with_value("a", "not a number");
        let error = store.value::<u32>("a").unwrap_err();
        assert_eq!(error.key(), "a");
    }

    #[test]
    fn test_dyn_store() {
        let store: Box<dyn ConfigurationStore> =
            Box::new(MapConfiguration::new().with_value("k", 1));
        assert!(store.has_value_for("k"));
        assert_eq!(store.value::<i32>("k").unwrap(), Some(1));
    }
}
