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

//! Client side of discovery: protocol version negotiation.

use crate::discovery::{DiscoveryVersions, ProtocolInformation};
use crate::id::Version;
use crate::transport::{ChannelTemplate, DiscoveryChannel, TransportError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Reasons a discovery attempt produced no connection information.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The remote speaks a different discovery protocol version.
    #[error("remote discovery version {actual} does not match expected {expected}")]
    VersionMismatch {
        /// Version this translator speaks.
        expected: Version,
        /// Version the remote reported.
        actual: Version,
    },

    /// The two endpoints share no protocol version.
    #[error("no protocol version in common")]
    NoCommonVersion,

    /// The remote listed a version but returned no connection information.
    #[error("remote does not serve protocol version {version}")]
    NotServed {
        /// The negotiated version.
        version: Version,
    },

    /// The discovery exchange did not finish in time.
    #[error("discovery did not complete within {duration:?}")]
    Timeout {
        /// The discovery timeout.
        duration: Duration,
    },

    /// The discovery channel faulted.
    #[error("discovery channel fault: {0}")]
    Transport(#[from] TransportError),
}

/// Negotiates a protocol version with a remote discovery endpoint.
///
/// [`from_uri`](Self::from_uri) never fails loudly: every fault is logged and
/// reported as `None`, so callers can treat "no answer" and "broken answer"
/// alike.
pub struct DiscoveryChannelTranslator {
    versions: DiscoveryVersions,
    template: Arc<dyn ChannelTemplate>,
    timeout: Duration,
}

impl DiscoveryChannelTranslator {
    /// Creates a translator.
    pub fn new(versions: DiscoveryVersions, template: Arc<dyn ChannelTemplate>, timeout: Duration) -> Self {
        Self {
            versions,
            template,
            timeout,
        }
    }

    /// The discovery protocol version this translator speaks.
    #[must_use]
    pub fn discovery_version(&self) -> Version {
        self.versions.discovery_version
    }

    /// The protocol versions this translator can negotiate.
    #[must_use]
    pub fn protocol_versions(&self) -> &BTreeSet<Version> {
        &self.versions.protocol_versions
    }

    /// Picks the protocol version to use with a remote.
    ///
    /// Returns the lowest version present in both sets.
    #[must_use]
    pub fn select_version(&self, remote: &[Version]) -> Option<Version> {
        remote
            .iter()
            .filter(|v| self.versions.protocol_versions.contains(v))
            .min()
            .copied()
    }

    /// Returns the connection information for the negotiated protocol
    /// version of the discovery endpoint at `address`.
    pub async fn from_uri(&self, address: &Url) -> Option<ProtocolInformation> {
        let mut channel = match self.template.open_discovery_channel(address).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(%address, error = %e, "failed to open discovery channel");
                return None;
            }
        };

        let outcome = match tokio::time::timeout(self.timeout, self.negotiate(&mut *channel)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(DiscoveryError::Timeout {
                duration: self.timeout,
            }),
        };

        if let Err(e) = channel.close().await {
            debug!(%address, error = %e, "failed to close discovery channel");
        }

        match outcome {
            Ok(info) => {
                debug!(%address, version = %info.version, "negotiated protocol version");
                Some(info)
            }
            Err(e) => {
                warn!(%address, error = %e, "discovery failed");
                None
            }
        }
    }

    async fn negotiate(
        &self,
        channel: &mut dyn DiscoveryChannel,
    ) -> Result<ProtocolInformation, DiscoveryError> {
        let actual = channel.discovery_version().await?;
        if actual != self.versions.discovery_version {
            return Err(DiscoveryError::VersionMismatch {
                expected: self.versions.discovery_version,
                actual,
            });
        }

        let remote = channel.protocol_versions().await?;
        let version = self
            .select_version(&remote)
            .ok_or(DiscoveryError::NoCommonVersion)?;

        channel
            .connection_information_for_protocol(Some(version))
            .await?
            .into_option()
            .ok_or(DiscoveryError::NotServed { version })
    }
}

impl std::fmt::Debug for DiscoveryChannelTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryChannelTranslator")
            .field("versions", &self.versions)
            .field("template", &self.template.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
