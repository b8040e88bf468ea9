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

//! In-process channel binding.
//!
//! A [`MemoryNetwork`] is a registry of hosted sinks keyed by address.
//! Channels opened through a [`MemoryChannelTemplate`] deliver straight into
//! the hosted sink on the caller's task, which makes the binding cheap and
//! deterministic enough for tests and for several endpoints living in one
//! process.
//!
//! Addresses look like `memory://<host>/message`, `memory://<host>/data` and
//! `memory://<host>/discovery/<version>`, where `<host>` is generated per
//! hosted endpoint.

use crate::discovery::ConnectionLookup;
use crate::id::{EndpointId, Version};
use crate::protocol::{DataTransfer, MessageData};
use crate::transport::{
    ChannelTemplate, DataChannel, DataSink, DiscoveryAddress, DiscoveryChannel, DiscoveryService,
    HostHandlers, HostedEndpoint, MessageChannel, MessageSink, TransportError,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// URL scheme served by the memory binding.
pub const MEMORY_SCHEME: &str = "memory";

#[derive(Clone)]
enum HostedTarget {
    Message(Arc<dyn MessageSink>),
    Data(Arc<dyn DataSink>),
    Discovery(Arc<dyn DiscoveryService>),
}

/// Registry of endpoints hosted in this process.
#[derive(Default)]
pub struct MemoryNetwork {
    targets: RwLock<HashMap<String, HostedTarget>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if something is hosted at the address.
    #[must_use]
    pub fn is_hosted(&self, address: &Url) -> bool {
        self.targets.read().contains_key(address.as_str())
    }

    /// Number of hosted addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    /// Returns `true` if nothing is hosted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    fn insert(&self, address: &Url, target: HostedTarget) {
        self.targets.write().insert(address.to_string(), target);
    }

    fn remove(&self, addresses: &[Url]) {
        let mut targets = self.targets.write();
        for address in addresses {
            targets.remove(address.as_str());
        }
    }

    fn lookup(&self, address: &Url) -> Result<HostedTarget, TransportError> {
        self.targets
            .read()
            .get(address.as_str())
            .cloned()
            .ok_or_else(|| TransportError::EndpointNotHosted {
                address: address.to_string(),
            })
    }

    fn message_sink(&self, address: &Url) -> Result<Arc<dyn MessageSink>, TransportError> {
        match self.lookup(address)? {
            HostedTarget::Message(sink) => Ok(sink),
            _ => Err(wrong_kind(address, "message")),
        }
    }

    fn data_sink(&self, address: &Url) -> Result<Arc<dyn DataSink>, TransportError> {
        match self.lookup(address)? {
            HostedTarget::Data(sink) => Ok(sink),
            _ => Err(wrong_kind(address, "data")),
        }
    }

    fn discovery_service(&self, address: &Url) -> Result<Arc<dyn DiscoveryService>, TransportError> {
        match self.lookup(address)? {
            HostedTarget::Discovery(service) => Ok(service),
            _ => Err(wrong_kind(address, "discovery")),
        }
    }
}

fn wrong_kind(address: &Url, expected: &str) -> TransportError {
    TransportError::UnsupportedAddress {
        address: address.to_string(),
        reason: format!("not a {expected} endpoint"),
    }
}

fn check_scheme(address: &Url) -> Result<(), TransportError> {
    if address.scheme() == MEMORY_SCHEME {
        Ok(())
    } else {
        Err(TransportError::UnsupportedAddress {
            address: address.to_string(),
            reason: format!("expected the '{MEMORY_SCHEME}' scheme"),
        })
    }
}

fn memory_url(host: &str, path: &str) -> Result<Url, TransportError> {
    let raw = format!("{MEMORY_SCHEME}://{host}/{path}");
    Url::parse(&raw).map_err(|e| TransportError::UnsupportedAddress {
        address: raw,
        reason: e.to_string(),
    })
}

/// [`ChannelTemplate`] for a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryChannelTemplate {
    network: Arc<MemoryNetwork>,
}

impl MemoryChannelTemplate {
    /// Creates a template bound to a network.
    pub fn new(network: Arc<MemoryNetwork>) -> Self {
        Self { network }
    }

    /// The network this template delivers into.
    #[must_use]
    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }
}

#[async_trait]
impl ChannelTemplate for MemoryChannelTemplate {
    fn name(&self) -> &'static str {
        MEMORY_SCHEME
    }

    async fn open_message_channel(&self, address: &Url) -> Result<Box<dyn MessageChannel>, TransportError> {
        check_scheme(address)?;
        self.network.message_sink(address)?;
        Ok(Box::new(MemoryMessageChannel {
            network: self.network.clone(),
            address: address.clone(),
            closed: false,
        }))
    }

    async fn open_data_channel(&self, address: &Url) -> Result<Box<dyn DataChannel>, TransportError> {
        check_scheme(address)?;
        self.network.data_sink(address)?;
        Ok(Box::new(MemoryDataChannel {
            network: self.network.clone(),
            address: address.clone(),
            closed: false,
        }))
    }

    async fn open_discovery_channel(
        &self,
        address: &Url,
    ) -> Result<Box<dyn DiscoveryChannel>, TransportError> {
        check_scheme(address)?;
        self.network.discovery_service(address)?;
        Ok(Box::new(MemoryDiscoveryChannel {
            network: self.network.clone(),
            address: address.clone(),
            closed: false,
        }))
    }

    async fn host(
        &self,
        endpoint: &EndpointId,
        handlers: HostHandlers,
    ) -> Result<HostedEndpoint, TransportError> {
        let host = Uuid::new_v4().simple().to_string();
        let message_address = memory_url(&host, "message")?;
        let data_address = memory_url(&host, "data")?;

        let mut hosted = vec![message_address.clone(), data_address.clone()];
        let mut discovery = Vec::with_capacity(handlers.discovery.len());
        for service in &handlers.discovery {
            let version = service.discovery_version();
            let address = memory_url(&host, &format!("discovery/{version}"))?;
            self.network
                .insert(&address, HostedTarget::Discovery(service.clone()));
            hosted.push(address.clone());
            discovery.push(DiscoveryAddress { version, address });
        }
        self.network
            .insert(&message_address, HostedTarget::Message(handlers.message));
        self.network
            .insert(&data_address, HostedTarget::Data(handlers.data));

        tracing::debug!(endpoint = %endpoint, %message_address, "hosting endpoint in memory");

        let network = self.network.clone();
        let endpoint = endpoint.clone();
        Ok(HostedEndpoint::new(
            message_address,
            data_address,
            discovery,
            move || {
                network.remove(&hosted);
                tracing::debug!(endpoint = %endpoint, "stopped hosting endpoint in memory");
            },
        ))
    }
}

struct MemoryMessageChannel {
    network: Arc<MemoryNetwork>,
    address: Url,
    closed: bool,
}

#[async_trait]
impl MessageChannel for MemoryMessageChannel {
    async fn accept_message(&mut self, message: MessageData) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.network.message_sink(&self.address)?.accept_message(message);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

struct MemoryDataChannel {
    network: Arc<MemoryNetwork>,
    address: Url,
    closed: bool,
}

#[async_trait]
impl DataChannel for MemoryDataChannel {
    async fn accept_data(&mut self, transfer: DataTransfer) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.network.data_sink(&self.address)?.accept_data(transfer);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

struct MemoryDiscoveryChannel {
    network: Arc<MemoryNetwork>,
    address: Url,
    closed: bool,
}

impl MemoryDiscoveryChannel {
    fn service(&self) -> Result<Arc<dyn DiscoveryService>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.network.discovery_service(&self.address)
    }
}

#[async_trait]
impl DiscoveryChannel for MemoryDiscoveryChannel {
    async fn discovery_version(&mut self) -> Result<Version, TransportError> {
        Ok(self.service()?.discovery_version())
    }

    async fn protocol_versions(&mut self) -> Result<Vec<Version>, TransportError> {
        Ok(self.service()?.protocol_versions())
    }

    async fn connection_information_for_protocol(
        &mut self,
        version: Option<Version>,
    ) -> Result<ConnectionLookup, TransportError> {
        Ok(self
            .service()?
            .connection_information_for_protocol(version.as_ref()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::MessageId;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<MessageData>>,
        data: Mutex<Vec<DataTransfer>>,
    }

    impl MessageSink for Recorder {
        fn accept_message(&self, message: MessageData) {
            self.messages.lock().push(message);
        }
    }

    impl DataSink for Recorder {
        fn accept_data(&self, transfer: DataTransfer) {
            self.data.lock().push(transfer);
        }
    }

    struct FixedDiscovery;

    impl DiscoveryService for FixedDiscovery {
        fn discovery_version(&self) -> Version {
            Version::new(1, 0, 0)
        }

        fn protocol_versions(&self) -> Vec<Version> {
            vec![Version::new(1, 0, 0)]
        }

        fn connection_information_for_protocol(&self, _version: Option<&Version>) -> ConnectionLookup {
            ConnectionLookup::NotFound
        }
    }

    fn handlers(recorder: &Arc<Recorder>) -> HostHandlers {
        HostHandlers {
            message: recorder.clone(),
            data: recorder.clone(),
            discovery: vec![Arc::new(FixedDiscovery)],
        }
    }

    #[tokio::test]
    async fn test_message_delivery() {
        let network = Arc::new(MemoryNetwork::new());
        let template = MemoryChannelTemplate::new(network.clone());
        let recorder = Arc::new(Recorder::default());
        let hosted = template
            .host(&EndpointId::new("a"), handlers(&recorder))
            .await
            .unwrap();

        let mut channel = template
            .open_message_channel(&hosted.message_address)
            .await
            .unwrap();
        let message = MessageData::unknown(MessageId::next(), EndpointId::new("b"), MessageId::NONE);
        channel.accept_message(message.clone()).await.unwrap();
        assert_eq!(recorder.messages.lock().as_slice(), &[message]);

        channel.close().await.unwrap();
        assert!(matches!(
            channel
                .accept_message(MessageData::unknown(
                    MessageId::next(),
                    EndpointId::new("b"),
                    MessageId::NONE
                ))
                .await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_closing_host_unregisters_addresses() {
        let network = Arc::new(MemoryNetwork::new());
        let template = MemoryChannelTemplate::new(network.clone());
        let recorder = Arc::new(Recorder::default());
        let hosted = template
            .host(&EndpointId::new("a"), handlers(&recorder))
            .await
            .unwrap();
        assert_eq!(network.len(), 3);
        let address = hosted.message_address.clone();
        let mut channel = template.open_message_channel(&address).await.unwrap();

        hosted.close();
        assert!(network.is_empty());
        let result = channel
            .accept_message(MessageData::unknown(
                MessageId::next(),
                EndpointId::new("b"),
                MessageId::NONE,
            ))
            .await;
        assert!(matches!(result, Err(TransportError::EndpointNotHosted { .. })));
        assert!(template.open_message_channel(&address).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_kind_and_scheme() {
        let network = Arc::new(MemoryNetwork::new());
        let template = MemoryChannelTemplate::new(network);
        let recorder = Arc::new(Recorder::default());
        let hosted = template
            .host(&EndpointId::new("a"), handlers(&recorder))
            .await
            .unwrap();

        assert!(matches!(
            template.open_data_channel(&hosted.message_address).await,
            Err(TransportError::UnsupportedAddress { .. })
        ));
        let tcp = Url::parse("tcp://127.0.0.1:1/message").unwrap();
        assert!(matches!(
            template.open_message_channel(&tcp).await,
            Err(TransportError::UnsupportedAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_discovery_channel() {
        let network = Arc::new(MemoryNetwork::new());
        let template = MemoryChannelTemplate::new(network);
        let recorder = Arc::new(Recorder::default());
        let hosted = template
            .host(&EndpointId::new("a"), handlers(&recorder))
            .await
            .unwrap();
        let address = hosted.discovery_address(&Version::new(1, 0, 0)).unwrap().clone();
        assert!(address.path().ends_with("/discovery/1.0.0"));

        let mut channel = template.open_discovery_channel(&address).await.unwrap();
        assert_eq!(channel.discovery_version().await.unwrap(), Version::new(1, 0, 0));
        assert_eq!(
            channel.connection_information_for_protocol(None).await.unwrap(),
            ConnectionLookup::NotFound
        );
    }
}
