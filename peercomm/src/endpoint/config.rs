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

//! Configuration types for endpoints.

use crate::config::{ConfigurationError, ConfigurationStore, ConfigurationStoreExt};
use crate::discovery::{DISCOVERY_VERSION_V1, DiscoveryVersions};
use crate::id::Version;
use std::time::Duration;

/// Configuration for a [`CommunicationEndpoint`](crate::endpoint::CommunicationEndpoint).
///
/// # Examples
///
/// ```rust
/// use peercomm::endpoint::EndpointConfig;
/// use std::time::Duration;
///
/// let config = EndpointConfig::new()
///     .with_max_send_retries(5)
///     .with_response_timeout(Duration::from_secs(2));
/// assert_eq!(config.max_send_retries, 5);
/// assert_eq!(config.command_response_retries, 1);
/// ```
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Retries after the first attempt when a send fails.
    ///
    /// Default: 3
    pub max_send_retries: u32,

    /// Retries after the first attempt when a command response fails.
    ///
    /// Default: 1
    pub command_response_retries: u32,

    /// How long to wait for the response to a request.
    ///
    /// Default: 30 seconds
    pub response_timeout: Duration,

    /// How long to wait for the peer to answer a connect request.
    ///
    /// Default: 10 seconds
    pub handshake_timeout: Duration,

    /// How long a discovery query may take.
    ///
    /// Default: 5 seconds
    pub discovery_timeout: Duration,

    /// How long an upload token stays valid.
    ///
    /// Default: 5 minutes
    pub upload_token_ttl: Duration,

    /// Discovery and protocol versions hosted and used for negotiation.
    ///
    /// Default: discovery 1.0.0 offering protocol 1.0.0
    pub discovery_versions: Vec<DiscoveryVersions>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_send_retries: 3,
            command_response_retries: 1,
            response_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            discovery_timeout: Duration::from_secs(5),
            upload_token_ttl: Duration::from_secs(300),
            discovery_versions: vec![DiscoveryVersions::default()],
        }
    }
}

impl EndpointConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the send retry count.
    #[must_use]
    pub fn with_max_send_retries(mut self, retries: u32) -> Self {
        self.max_send_retries = retries;
        self
    }

    /// Sets the command response retry count.
    #[must_use]
    pub fn with_command_response_retries(mut self, retries: u32) -> Self {
        self.command_response_retries = retries;
        self
    }

    /// Sets the response timeout.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the discovery timeout.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Sets the upload token lifetime.
    #[must_use]
    pub fn with_upload_token_ttl(mut self, ttl: Duration) -> Self {
        self.upload_token_ttl = ttl;
        self
    }

    /// Replaces the discovery version sets.
    #[must_use]
    pub fn with_discovery_versions(mut self, versions: Vec<DiscoveryVersions>) -> Self {
        self.discovery_versions = versions;
        self
    }

    /// Reads `peercomm.*` keys, keeping defaults for absent keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use peercomm::config::MapConfiguration;
    /// use peercomm::endpoint::EndpointConfig;
    /// use std::time::Duration;
    ///
    /// let store = MapConfiguration::new().with_value("peercomm.response_timeout_ms", 1500);
    /// let config = EndpointConfig::from_store(&store).unwrap();
    /// assert_eq!(config.response_timeout, Duration::from_millis(1500));
    /// ```
    pub fn from_store(store: &dyn ConfigurationStore) -> Result<Self, ConfigurationError> {
        let mut config = Self::default();
        if let Some(retries) = store.value("peercomm.max_send_retries")? {
            config.max_send_retries = retries;
        }
        if let Some(retries) = store.value("peercomm.command_response_retries")? {
            config.command_response_retries = retries;
        }
        let durations: [(&str, &mut Duration); 4] = [
            ("peercomm.response_timeout_ms", &mut config.response_timeout),
            ("peercomm.handshake_timeout_ms", &mut config.handshake_timeout),
            ("peercomm.discovery_timeout_ms", &mut config.discovery_timeout),
            ("peercomm.upload_token_ttl_ms", &mut config.upload_token_ttl),
        ];
        for (key, slot) in durations {
            if let Some(ms) = store.value::<u64>(key)? {
                *slot = Duration::from_millis(ms);
            }
        }
        Ok(config)
    }

    /// Checks that every discovery version is one this crate implements and
    /// that every version set offers at least one protocol version.
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.discovery_versions.is_empty() {
            return Err(ConfigurationError::new(
                "discovery_versions",
                "at least one discovery version is required",
            ));
        }
        for versions in &self.discovery_versions {
            if !supported_discovery_version(&versions.discovery_version) {
                return Err(ConfigurationError::new(
                    "discovery_versions",
                    format!("unsupported discovery version {}", versions.discovery_version),
                ));
            }
            if versions.protocol_versions.is_empty() {
                return Err(ConfigurationError::new(
                    "discovery_versions",
                    format!("discovery version {} offers no protocol version", versions.discovery_version),
                ));
            }
        }
        Ok(())
    }
}

fn supported_discovery_version(version: &Version) -> bool {
    *version == DISCOVERY_VERSION_V1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfiguration;

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::default();
        assert_eq!(config.max_send_retries, 3);
        assert_eq!(config.command_response_retries, 1);
        assert_eq!(config.response_timeout, Duration::from_secs(30));
        assert_eq!(config.upload_token_ttl, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_store_reads_durations_and_retries() {
        let store = MapConfiguration::new()
            .with_value("peercomm.max_send_retries", 7)
            .with_value("peercomm.handshake_timeout_ms", 250)
            .with_value("peercomm.upload_token_ttl_ms", 1000);
        let config = EndpointConfig::from_store(&store).unwrap();
        assert_eq!(config.max_send_retries, 7);
        assert_eq!(config.handshake_timeout, Duration::from_millis(250));
        assert_eq!(config.upload_token_ttl, Duration::from_secs(1));
        assert_eq!(config.discovery_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_store_rejects_wrong_type() {
        let store = MapConfiguration::new().with_value("peercomm.max_send_retries", "many");
        let error = EndpointConfig::from_store(&store).unwrap_err();
        assert_eq!(error.key(), "peercomm.max_send_retries");
    }

    #[test]
    fn test_unknown_discovery_version_is_rejected() {
        let config = EndpointConfig::new().with_discovery_versions(vec![DiscoveryVersions::new(
            Version::new(2, 0, 0),
            [Version::new(1, 0, 0)],
        )]);
        assert!(config.validate().is_err());
        assert!(EndpointConfig::new().with_discovery_versions(Vec::new()).validate().is_err());
    }
}
