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

//! Binding configuration.

use crate::config::{ConfigurationError, ConfigurationStore, ConfigurationStoreExt};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration of the TCP binding.
///
/// # Examples
///
/// ```rust
/// use peercomm::transport::TcpConfig;
/// use std::time::Duration;
///
/// let config = TcpConfig::new()
///     .with_bind_address("127.0.0.1:4100".parse().unwrap())
///     .with_connect_timeout(Duration::from_secs(2));
/// assert_eq!(config.bind_address.port(), 4100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Address hosted endpoints listen on. Port `0` picks a free port.
    ///
    /// Default: `127.0.0.1:0`
    pub bind_address: SocketAddr,

    /// Time allowed for establishing an outgoing connection.
    ///
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Time allowed for one request/reply exchange on a channel.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl TcpConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[must_use]
    pub fn with_bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reads `peercomm.tcp.*` keys, keeping defaults for absent keys.
    pub fn from_store(store: &dyn ConfigurationStore) -> Result<Self, ConfigurationError> {
        let mut config = Self::default();
        if let Some(raw) = store.value::<String>("peercomm.tcp.bind_address")? {
            config.bind_address = raw
                .parse()
                .map_err(|e: std::net::AddrParseError| {
                    ConfigurationError::new("peercomm.tcp.bind_address", e.to_string())
                })?;
        }
        if let Some(ms) = store.value::<u64>("peercomm.tcp.connect_timeout_ms")? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = store.value::<u64>("peercomm.tcp.request_timeout_ms")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }
}
