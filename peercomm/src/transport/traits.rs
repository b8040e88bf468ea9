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

//! Channel binding abstractions.
//!
//! A binding is described by a [`ChannelTemplate`]. The template opens the
//! client half of message, data and discovery channels to remote addresses
//! and hosts the server half of an endpoint: its [`MessageSink`],
//! [`DataSink`] and one [`DiscoveryService`] per discovery version.
//!
//! Channels are unidirectional and disposable. Any error returned by a
//! channel marks it as faulted; callers drop it and open a new one.

use crate::discovery::ConnectionLookup;
use crate::id::{EndpointId, Version};
use crate::protocol::{DataTransfer, MessageData};
use crate::transport::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Client half of a message channel.
#[async_trait]
pub trait MessageChannel: Send {
    /// Delivers one message to the remote receiving endpoint.
    async fn accept_message(&mut self, message: MessageData) -> Result<(), TransportError>;

    /// Closes the channel.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Client half of a data channel.
#[async_trait]
pub trait DataChannel: Send {
    /// Delivers one block of data to the remote data receiving endpoint.
    async fn accept_data(&mut self, transfer: DataTransfer) -> Result<(), TransportError>;

    /// Closes the channel.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Client half of a discovery channel.
#[async_trait]
pub trait DiscoveryChannel: Send {
    /// The discovery protocol version spoken by the remote.
    async fn discovery_version(&mut self) -> Result<Version, TransportError>;

    /// The protocol versions the remote supports.
    async fn protocol_versions(&mut self) -> Result<Vec<Version>, TransportError>;

    /// Connection information for one protocol version.
    async fn connection_information_for_protocol(
        &mut self,
        version: Option<Version>,
    ) -> Result<ConnectionLookup, TransportError>;

    /// Closes the channel.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Server half of a message channel.
///
/// Sinks never report handler failures back to the sender; they are logged
/// on the receiving side.
pub trait MessageSink: Send + Sync {
    /// Accepts one incoming message.
    fn accept_message(&self, message: MessageData);
}

/// Server half of a data channel.
pub trait DataSink: Send + Sync {
    /// Accepts one incoming block of data.
    fn accept_data(&self, transfer: DataTransfer);
}

/// Server half of a discovery channel for one discovery version.
pub trait DiscoveryService: Send + Sync {
    /// The discovery protocol version this service speaks.
    fn discovery_version(&self) -> Version;

    /// Supported protocol versions, ascending and without duplicates.
    fn protocol_versions(&self) -> Vec<Version>;

    /// Connection information for one protocol version.
    fn connection_information_for_protocol(&self, version: Option<&Version>) -> ConnectionLookup;
}

/// Everything an endpoint exposes through a binding.
#[derive(Clone)]
pub struct HostHandlers {
    /// Receiver for messages.
    pub message: Arc<dyn MessageSink>,
    /// Receiver for data.
    pub data: Arc<dyn DataSink>,
    /// One service per supported discovery version.
    pub discovery: Vec<Arc<dyn DiscoveryService>>,
}

/// Address of a hosted discovery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryAddress {
    /// Discovery version served at the address.
    pub version: Version,
    /// The address.
    pub address: Url,
}

/// Addresses of a hosted endpoint.
///
/// Dropping the value stops hosting.
pub struct HostedEndpoint {
    /// Address of the message sink.
    pub message_address: Url,
    /// Address of the data sink.
    pub data_address: Url,
    /// Addresses of the discovery services.
    pub discovery: Vec<DiscoveryAddress>,
    closer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl HostedEndpoint {
    /// Creates the hosting record. `closer` runs once when hosting stops.
    pub fn new(
        message_address: Url,
        data_address: Url,
        discovery: Vec<DiscoveryAddress>,
        closer: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            message_address,
            data_address,
            discovery,
            closer: Some(Box::new(closer)),
        }
    }

    /// Address of the discovery service for a discovery version.
    #[must_use]
    pub fn discovery_address(&self, version: &Version) -> Option<&Url> {
        self.discovery
            .iter()
            .find(|d| &d.version == version)
            .map(|d| &d.address)
    }

    /// Stops hosting.
    pub fn close(mut self) {
        self.run_closer();
    }

    fn run_closer(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for HostedEndpoint {
    fn drop(&mut self) {
        self.run_closer();
    }
}

impl fmt::Debug for HostedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedEndpoint")
            .field("message_address", &self.message_address)
            .field("data_address", &self.data_address)
            .field("discovery", &self.discovery)
            .finish_non_exhaustive()
    }
}

/// Factory for the channels of one binding.
///
/// # Examples
///
/// ```rust
/// use peercomm::transport::{ChannelTemplate, MemoryChannelTemplate, MemoryNetwork};
/// use std::sync::Arc;
///
/// let template = MemoryChannelTemplate::new(Arc::new(MemoryNetwork::new()));
/// assert_eq!(template.name(), "memory");
/// ```
#[async_trait]
pub trait ChannelTemplate: Send + Sync {
    /// Short name of the binding, used in logs.
    fn name(&self) -> &'static str;

    /// Opens a message channel to a message receiving endpoint.
    async fn open_message_channel(&self, address: &Url) -> Result<Box<dyn MessageChannel>, TransportError>;

    /// Opens a data channel to a data receiving endpoint.
    async fn open_data_channel(&self, address: &Url) -> Result<Box<dyn DataChannel>, TransportError>;

    /// Opens a discovery channel to a discovery endpoint.
    async fn open_discovery_channel(
        &self,
        address: &Url,
    ) -> Result<Box<dyn DiscoveryChannel>, TransportError>;

    /// Hosts the server half of an endpoint.
    async fn host(
        &self,
        endpoint: &EndpointId,
        handlers: HostHandlers,
    ) -> Result<HostedEndpoint, TransportError>;
}
