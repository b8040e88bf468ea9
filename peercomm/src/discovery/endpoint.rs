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

//! Server side of discovery.

use crate::discovery::{ConnectionLookup, ProtocolInformation};
use crate::id::Version;
use crate::transport::DiscoveryService;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Answers discovery queries for one discovery version.
///
/// Protocol versions are kept unique and sorted; asking for a version that is
/// not served, or for no version at all, yields [`ConnectionLookup::NotFound`].
///
/// # Examples
///
/// ```rust
/// use peercomm::discovery::{ConnectionLookup, DiscoveryEndpoint, ProtocolInformation};
/// use peercomm::id::Version;
/// use peercomm::transport::DiscoveryService;
///
/// let v1 = ProtocolInformation {
///     version: Version::new(1, 0, 0),
///     message_address: "memory://a/message".parse().unwrap(),
///     data_address: None,
/// };
/// let endpoint = DiscoveryEndpoint::new(Version::new(1, 0, 0), [v1.clone()]);
///
/// assert_eq!(endpoint.protocol_versions(), vec![Version::new(1, 0, 0)]);
/// assert_eq!(
///     endpoint.connection_information_for_protocol(Some(&Version::new(1, 0, 0))),
///     ConnectionLookup::Found(v1)
/// );
/// assert_eq!(
///     endpoint.connection_information_for_protocol(None),
///     ConnectionLookup::NotFound
/// );
/// ```
#[derive(Debug)]
pub struct DiscoveryEndpoint {
    discovery_version: Version,
    protocols: RwLock<BTreeMap<Version, ProtocolInformation>>,
}

impl DiscoveryEndpoint {
    /// Creates an endpoint advertising the given protocols.
    ///
    /// When several entries share a version the last one wins.
    pub fn new(
        discovery_version: Version,
        protocols: impl IntoIterator<Item = ProtocolInformation>,
    ) -> Self {
        Self {
            discovery_version,
            protocols: RwLock::new(collect(protocols)),
        }
    }

    /// Replaces the advertised protocols.
    pub fn set_protocols(&self, protocols: impl IntoIterator<Item = ProtocolInformation>) {
        *self.protocols.write() = collect(protocols);
    }
}

fn collect(
    protocols: impl IntoIterator<Item = ProtocolInformation>,
) -> BTreeMap<Version, ProtocolInformation> {
    protocols
        .into_iter()
        .map(|info| (info.version, info))
        .collect()
}

impl DiscoveryService for DiscoveryEndpoint {
    fn discovery_version(&self) -> Version {
        self.discovery_version
    }

    fn protocol_versions(&self) -> Vec<Version> {
        self.protocols.read().keys().copied().collect()
    }

    fn connection_information_for_protocol(&self, version: Option<&Version>) -> ConnectionLookup {
        let Some(version) = version else {
            return ConnectionLookup::NotFound;
        };
        match self.protocols.read().get(version) {
            Some(info) => ConnectionLookup::Found(info.clone()),
            None => ConnectionLookup::NotFound,
        }
    }
}
