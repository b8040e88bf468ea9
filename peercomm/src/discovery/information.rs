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

//! Connection information exchanged through discovery.

use crate::id::{EndpointId, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

/// The protocol version this crate speaks.
pub const PROTOCOL_VERSION_V1: Version = Version::new(1, 0, 0);

/// The discovery protocol version this crate speaks.
pub const DISCOVERY_VERSION_V1: Version = Version::new(1, 0, 0);

/// Where and how to reach an endpoint for one protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolInformation {
    /// Protocol version served at these addresses.
    pub version: Version,
    /// Address of the message receiving endpoint.
    pub message_address: Url,
    /// Address of the data receiving endpoint, if the endpoint accepts data.
    pub data_address: Option<Url>,
}

/// Result of asking a discovery endpoint for connection information.
///
/// # Examples
///
/// ```rust
/// use peercomm::discovery::ConnectionLookup;
///
/// assert!(ConnectionLookup::NotFound.into_option().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionLookup {
    /// The endpoint serves the requested protocol version.
    Found(ProtocolInformation),
    /// The endpoint does not serve the requested version.
    NotFound,
}

impl ConnectionLookup {
    /// Converts into an `Option`.
    #[must_use]
    pub fn into_option(self) -> Option<ProtocolInformation> {
        match self {
            Self::Found(info) => Some(info),
            Self::NotFound => None,
        }
    }

    /// Returns `true` for [`ConnectionLookup::Found`].
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// A discovered endpoint whose protocol version has been negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInformation {
    /// Id of the endpoint.
    pub id: EndpointId,
    /// Address of its discovery endpoint.
    pub discovery_address: Url,
    /// Negotiated protocol connection information.
    pub protocol: ProtocolInformation,
}

/// Discovery and protocol versions an endpoint supports.
///
/// # Examples
///
/// ```rust
/// use peercomm::discovery::DiscoveryVersions;
/// use peercomm::id::Version;
///
/// let versions = DiscoveryVersions::default().with_protocol_version(Version::new(2, 0, 0));
/// assert_eq!(versions.protocol_versions.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryVersions {
    /// Discovery protocol version.
    pub discovery_version: Version,
    /// Supported wire protocol versions.
    pub protocol_versions: BTreeSet<Version>,
}

impl DiscoveryVersions {
    /// Creates a version set.
    pub fn new(discovery_version: Version, protocol_versions: impl IntoIterator<Item = Version>) -> Self {
        Self {
            discovery_version,
            protocol_versions: protocol_versions.into_iter().collect(),
        }
    }

    /// Adds a supported protocol version.
    #[must_use]
    pub fn with_protocol_version(mut self, version: Version) -> Self {
        self.protocol_versions.insert(version);
        self
    }
}

impl Default for DiscoveryVersions {
    fn default() -> Self {
        Self::new(DISCOVERY_VERSION_V1, [PROTOCOL_VERSION_V1])
    }
}
