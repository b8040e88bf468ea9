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

//! Connection handshake between two endpoints.
//!
//! ```text
//! Unconnected -> DiscoveryPending -> VersionNegotiated -> CapabilityExchanged -> Connected
//!                                                   \-> Rejected        \-> Disconnected
//! ```
//!
//! Each side sends an [`EndpointConnect`] carrying its
//! [`CommunicationDescription`]. The receiver runs its [`ConnectionApprover`]
//! and answers `Success` or `Failure`. An endpoint is `Connected` once its
//! connect was accepted by the peer and the peer's connect was accepted
//! locally.

use crate::discovery::{
    DiscoveryChannelTranslator, DiscoveryEvent, DiscoverySource, EndpointInformation,
    ProtocolInformation,
};
use crate::id::EndpointId;
use crate::protocol::{
    CommunicationDescription, CommunicationMessage, ConnectionApprover, EndpointConnect,
    MessageKind, MessageProcessor, MessageType, ProtocolError, ProtocolLayer,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

const EVENT_CAPACITY: usize = 64;

/// Handshake progress with one remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Nothing is known or the last attempt failed.
    Unconnected,
    /// Discovery of the endpoint is running.
    DiscoveryPending,
    /// A protocol version was agreed; our connect is on its way.
    VersionNegotiated,
    /// One side has accepted the other.
    CapabilityExchanged,
    /// Both sides accepted each other.
    Connected,
    /// One side refused the connection.
    Rejected,
    /// The connection ended.
    Disconnected,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A remote endpoint that completed the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedEndpoint {
    /// Id of the endpoint.
    pub id: EndpointId,
    /// Where it receives messages and data.
    pub protocol: ProtocolInformation,
    /// What it offers.
    pub description: CommunicationDescription,
}

/// Outcome of handshakes, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The handshake with an endpoint completed.
    EndpointConnected(ConnectedEndpoint),
    /// One side refused the connection.
    EndpointRejected(EndpointId),
    /// A connected endpoint went away.
    EndpointDisconnected(EndpointId),
}

#[derive(Debug)]
struct Record {
    state: HandshakeState,
    connect_initiated: bool,
    accepted_by_remote: bool,
    accepted_locally: bool,
    protocol: Option<ProtocolInformation>,
    description: Option<CommunicationDescription>,
}

impl Record {
    fn new() -> Self {
        Self {
            state: HandshakeState::Unconnected,
            connect_initiated: false,
            accepted_by_remote: false,
            accepted_locally: false,
            protocol: None,
            description: None,
        }
    }

    fn reset(&mut self, state: HandshakeState) {
        *self = Self {
            state,
            ..Self::new()
        };
    }

    /// Moves to `Connected` when both sides accepted, returning the event to
    /// publish.
    fn try_complete(&mut self, id: &EndpointId) -> Option<ConnectionEvent> {
        if self.state == HandshakeState::Connected || !self.accepted_by_remote || !self.accepted_locally {
            return None;
        }
        let (Some(protocol), Some(description)) = (self.protocol.clone(), self.description.clone()) else {
            return None;
        };
        self.state = HandshakeState::Connected;
        Some(ConnectionEvent::EndpointConnected(ConnectedEndpoint {
            id: id.clone(),
            protocol,
            description,
        }))
    }
}

/// Drives handshakes for one local endpoint.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct HandshakeConductor {
    inner: Arc<Inner>,
}

struct Inner {
    layer: ProtocolLayer,
    translators: Vec<Arc<DiscoveryChannelTranslator>>,
    description: CommunicationDescription,
    approver: Arc<dyn ConnectionApprover>,
    handshake_timeout: Duration,
    records: Mutex<HashMap<EndpointId, Record>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl HandshakeConductor {
    /// Creates a conductor and registers its processors with `layer`.
    ///
    /// Discovery translators are tried newest discovery version first.
    pub fn new(
        layer: ProtocolLayer,
        mut translators: Vec<Arc<DiscoveryChannelTranslator>>,
        description: CommunicationDescription,
        approver: Arc<dyn ConnectionApprover>,
        handshake_timeout: Duration,
    ) -> Self {
        translators.sort_by(|a, b| b.discovery_version().cmp(&a.discovery_version()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let conductor = Self {
            inner: Arc::new(Inner {
                layer,
                translators,
                description,
                approver,
                handshake_timeout,
                records: Mutex::new(HashMap::new()),
                events,
            }),
        };
        let processor = Arc::new(HandshakeProcessor {
            conductor: Arc::downgrade(&conductor.inner),
        });
        conductor
            .inner
            .layer
            .register_processor(MessageType::EndpointConnect, processor.clone());
        conductor
            .inner
            .layer
            .register_processor(MessageType::EndpointDisconnect, processor);
        conductor
    }

    /// The protocol layer handshakes run over.
    #[must_use]
    pub fn layer(&self) -> &ProtocolLayer {
        &self.inner.layer
    }

    /// The description sent to peers.
    #[must_use]
    pub fn description(&self) -> &CommunicationDescription {
        &self.inner.description
    }

    /// Subscribes to handshake outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Current handshake state with `id`.
    #[must_use]
    pub fn state_of(&self, id: &EndpointId) -> HandshakeState {
        self.inner
            .records
            .lock()
            .get(id)
            .map_or(HandshakeState::Unconnected, |r| r.state)
    }

    /// Returns `true` if we accepted the connect of `id` and have not
    /// dropped it since.
    ///
    /// The peer may already consider itself connected while our own connect
    /// response is still in flight.
    #[must_use]
    pub fn has_accepted(&self, id: &EndpointId) -> bool {
        self.inner.records.lock().get(id).is_some_and(|r| {
            r.accepted_locally
                && matches!(r.state, HandshakeState::CapabilityExchanged | HandshakeState::Connected)
        })
    }

    /// Endpoints currently connected.
    #[must_use]
    pub fn connected_endpoints(&self) -> Vec<EndpointId> {
        self.inner
            .records
            .lock()
            .iter()
            .filter(|(_, r)| r.state == HandshakeState::Connected)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Description a connected endpoint sent us.
    #[must_use]
    pub fn remote_description(&self, id: &EndpointId) -> Option<CommunicationDescription> {
        self.inner
            .records
            .lock()
            .get(id)
            .filter(|r| r.state == HandshakeState::Connected)
            .and_then(|r| r.description.clone())
    }

    /// Discovers the endpoint behind `discovery_address` and connects to it.
    ///
    /// Returns the state reached. A failed discovery leaves the endpoint
    /// `Unconnected`.
    #[instrument(skip(self), fields(endpoint = %self.inner.layer.id()))]
    pub async fn on_endpoint_discovered(&self, id: EndpointId, discovery_address: Url) -> HandshakeState {
        if !self.transition_to_discovery(&id) {
            return self.state_of(&id);
        }
        for translator in &self.inner.translators {
            if let Some(protocol) = translator.from_uri(&discovery_address).await {
                return self
                    .on_endpoint_available(EndpointInformation {
                        id,
                        discovery_address,
                        protocol,
                    })
                    .await;
            }
        }
        warn!(remote = %id, %discovery_address, "discovery failed");
        self.set_state(&id, HandshakeState::Unconnected);
        HandshakeState::Unconnected
    }

    /// Connects to an endpoint whose protocol version is already negotiated.
    pub async fn on_endpoint_available(&self, info: EndpointInformation) -> HandshakeState {
        if &info.id == self.inner.layer.id() {
            return HandshakeState::Unconnected;
        }
        {
            let mut records = self.inner.records.lock();
            let record = records.entry(info.id.clone()).or_insert_with(Record::new);
            match record.state {
                HandshakeState::Connected | HandshakeState::CapabilityExchanged | HandshakeState::VersionNegotiated
                    if record.connect_initiated =>
                {
                    debug!(remote = %info.id, state = %record.state, "handshake already under way");
                    return record.state;
                }
                _ => {}
            }
            if record.state != HandshakeState::CapabilityExchanged {
                record.state = HandshakeState::VersionNegotiated;
            }
            record.protocol = Some(info.protocol.clone());
            record.connect_initiated = true;
        }
        self.send_connect(info.id, info.protocol).await
    }

    /// Handles an endpoint that went away without saying so.
    pub async fn on_endpoint_unavailable(&self, id: &EndpointId) {
        self.mark_disconnected(id).await;
    }

    /// Feeds events of `source` into the conductor until the source closes.
    pub fn watch(&self, source: &dyn DiscoverySource) -> JoinHandle<()> {
        let mut events = source.subscribe();
        let conductor = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(DiscoveryEvent::EndpointAvailable(info)) => {
                        let conductor = conductor.clone();
                        tokio::spawn(async move {
                            conductor.on_endpoint_available(info).await;
                        });
                    }
                    Ok(DiscoveryEvent::EndpointUnavailable(id)) => conductor.on_endpoint_unavailable(&id).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "discovery events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("discovery source closed");
        })
    }

    /// Tells `id` we are leaving and tears the session down.
    ///
    /// Disconnecting twice is a no-op.
    pub async fn disconnect_from(&self, id: &EndpointId) {
        let announce = matches!(
            self.state_of(id),
            HandshakeState::Connected | HandshakeState::CapabilityExchanged
        );
        if announce {
            let layer = &self.inner.layer;
            let message = CommunicationMessage::new(layer.id().clone(), MessageKind::EndpointDisconnect);
            if let Err(e) = layer.send_message_to(id, &message, layer.max_send_retries()).await {
                debug!(remote = %id, error = %e, "disconnect message not delivered");
            }
        }
        self.mark_disconnected(id).await;
    }

    /// Disconnects from every connected endpoint.
    pub async fn disconnect_all(&self) {
        for id in self.connected_endpoints() {
            self.disconnect_from(&id).await;
        }
    }

    fn transition_to_discovery(&self, id: &EndpointId) -> bool {
        let mut records = self.inner.records.lock();
        let record = records.entry(id.clone()).or_insert_with(Record::new);
        match record.state {
            HandshakeState::Unconnected | HandshakeState::Rejected | HandshakeState::Disconnected => {
                record.reset(HandshakeState::DiscoveryPending);
                true
            }
            _ => false,
        }
    }

    fn set_state(&self, id: &EndpointId, state: HandshakeState) {
        if let Some(record) = self.inner.records.lock().get_mut(id) {
            record.state = state;
        }
    }

    fn publish(&self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::EndpointConnected(c) => info!(endpoint = %self.inner.layer.id(), remote = %c.id, "endpoint connected"),
            ConnectionEvent::EndpointRejected(id) => info!(endpoint = %self.inner.layer.id(), remote = %id, "endpoint rejected"),
            ConnectionEvent::EndpointDisconnected(id) => info!(endpoint = %self.inner.layer.id(), remote = %id, "endpoint disconnected"),
        }
        if self.inner.events.send(event).is_err() {
            debug!("connection event dropped, no subscribers");
        }
    }

    async fn send_connect(&self, id: EndpointId, protocol: ProtocolInformation) -> HandshakeState {
        match self.exchange_connect(&id, protocol).await {
            Ok(MessageKind::Success) => {
                let event = {
                    let mut records = self.inner.records.lock();
                    let Some(record) = records.get_mut(&id) else {
                        return HandshakeState::Unconnected;
                    };
                    record.accepted_by_remote = true;
                    if record.state == HandshakeState::VersionNegotiated {
                        record.state = HandshakeState::CapabilityExchanged;
                    }
                    record.try_complete(&id)
                };
                if let Some(event) = event {
                    self.publish(event);
                }
                self.state_of(&id)
            }
            Ok(MessageKind::Failure { reason }) => {
                info!(remote = %id, %reason, "connection refused by remote");
                self.reject(&id).await;
                HandshakeState::Rejected
            }
            Ok(other) => {
                warn!(remote = %id, response = %other.message_type(), "unexpected connect response");
                self.abandon(&id).await;
                HandshakeState::Unconnected
            }
            Err(e) => {
                warn!(remote = %id, error = %e, "connect failed");
                self.abandon(&id).await;
                HandshakeState::Unconnected
            }
        }
    }

    async fn exchange_connect(&self, id: &EndpointId, protocol: ProtocolInformation) -> Result<MessageKind, ProtocolError> {
        let layer = &self.inner.layer;
        let local = layer.local_information().ok_or(ProtocolError::NotRunning)?;
        layer.open_session(id, protocol).await?;
        let message = CommunicationMessage::new(
            layer.id().clone(),
            MessageKind::EndpointConnect(EndpointConnect {
                discovery_address: local.discovery_address,
                protocol: local.protocol,
                description: self.inner.description.clone(),
            }),
        );
        let response = layer
            .send_message_and_wait_for_response(id, &message, layer.max_send_retries(), self.inner.handshake_timeout)
            .await?;
        Ok(response.into_kind())
    }

    async fn on_connect(&self, message: &CommunicationMessage, connect: &EndpointConnect) -> Result<(), ProtocolError> {
        let layer = &self.inner.layer;
        let remote = message.sender().clone();
        layer.open_session(&remote, connect.protocol.clone()).await?;

        if !self.inner.approver.is_endpoint_allowed_to_connect(&connect.description) {
            info!(%remote, subjects = ?connect.description.subjects, "refusing connection");
            let outcome = layer
                .respond(message, MessageKind::failure("no shared communication subject"), layer.max_send_retries())
                .await;
            self.reject(&remote).await;
            return outcome;
        }

        let (event, initiate) = {
            let mut records = self.inner.records.lock();
            let record = records.entry(remote.clone()).or_insert_with(Record::new);
            if record.state == HandshakeState::Connected {
                debug!(%remote, "connected endpoint connects again, restarting handshake");
                record.reset(HandshakeState::Unconnected);
            }
            record.accepted_locally = true;
            record.protocol = Some(connect.protocol.clone());
            record.description = Some(connect.description.clone());
            record.state = HandshakeState::CapabilityExchanged;
            let initiate = !record.connect_initiated;
            if initiate {
                record.connect_initiated = true;
            }
            (record.try_complete(&remote), initiate)
        };

        if let Err(e) = layer.respond(message, MessageKind::Success, layer.max_send_retries()).await {
            debug!(%remote, "connect response not delivered, abandoning handshake");
            {
                let mut records = self.inner.records.lock();
                if let Some(record) = records.get_mut(&remote) {
                    record.reset(HandshakeState::Unconnected);
                }
            }
            layer.close_session(&remote).await;
            return Err(e);
        }
        if let Some(event) = event {
            self.publish(event);
        }
        if initiate {
            let conductor = self.clone();
            let protocol = connect.protocol.clone();
            tokio::spawn(async move {
                conductor.send_connect(remote, protocol).await;
            });
        }
        Ok(())
    }

    async fn reject(&self, id: &EndpointId) {
        let changed = {
            let mut records = self.inner.records.lock();
            let record = records.entry(id.clone()).or_insert_with(Record::new);
            let changed = record.state != HandshakeState::Rejected;
            record.reset(HandshakeState::Rejected);
            changed
        };
        self.inner.layer.close_session(id).await;
        if changed {
            self.publish(ConnectionEvent::EndpointRejected(id.clone()));
        }
    }

    async fn abandon(&self, id: &EndpointId) {
        let close = {
            let mut records = self.inner.records.lock();
            match records.get_mut(id) {
                Some(record) if record.state != HandshakeState::Connected && record.state != HandshakeState::Rejected => {
                    record.reset(HandshakeState::Unconnected);
                    true
                }
                _ => false,
            }
        };
        if close {
            self.inner.layer.close_session(id).await;
        }
    }

    async fn mark_disconnected(&self, id: &EndpointId) {
        let was_connected = {
            let mut records = self.inner.records.lock();
            match records.get_mut(id) {
                Some(record) if record.state != HandshakeState::Disconnected => {
                    let was_connected = record.state == HandshakeState::Connected;
                    record.reset(HandshakeState::Disconnected);
                    Some(was_connected)
                }
                _ => None,
            }
        };
        let Some(was_connected) = was_connected else {
            return;
        };
        self.inner.layer.close_session(id).await;
        if was_connected {
            self.publish(ConnectionEvent::EndpointDisconnected(id.clone()));
        }
    }
}

impl fmt::Debug for HandshakeConductor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConductor")
            .field("endpoint", self.inner.layer.id())
            .field("records", &self.inner.records.lock().len())
            .finish_non_exhaustive()
    }
}

struct HandshakeProcessor {
    conductor: std::sync::Weak<Inner>,
}

#[async_trait]
impl MessageProcessor for HandshakeProcessor {
    async fn process(&self, _layer: &ProtocolLayer, message: CommunicationMessage) -> Result<(), ProtocolError> {
        let Some(inner) = self.conductor.upgrade() else {
            return Ok(());
        };
        let conductor = HandshakeConductor { inner };
        match message.kind() {
            MessageKind::EndpointConnect(connect) => conductor.on_connect(&message, connect).await,
            MessageKind::EndpointDisconnect => {
                debug!(remote = %message.sender(), "remote announced disconnect");
                conductor.mark_disconnected(message.sender()).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
