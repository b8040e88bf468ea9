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

//! The communication endpoint facade.

use crate::discovery::{DiscoveryChannelTranslator, DiscoverySource, EndpointInformation, ManualDiscoverySource};
use crate::endpoint::{EndpointConfig, EndpointEvent};
use crate::error::CommError;
use crate::id::EndpointId;
use crate::interaction::{
    CommandSetProxy, InteractionConnectionState, InteractionLayer, NotificationSetProxy,
};
use crate::protocol::{HandshakeConductor, HandshakeState, ProtocolLayer, UploadSource, UploadToken};
use crate::serialization::{ObjectSerializerRegistry, ObjectValue};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

const EVENT_CAPACITY: usize = 128;

/// A running local endpoint.
///
/// Owns the protocol layer, the handshake conductor and the interaction
/// layer of one endpoint. Create it with
/// [`CommunicationEndpointBuilder`](crate::endpoint::CommunicationEndpointBuilder).
pub struct CommunicationEndpoint {
    config: EndpointConfig,
    information: EndpointInformation,
    conductor: HandshakeConductor,
    interaction: InteractionLayer,
    translators: Vec<Arc<DiscoveryChannelTranslator>>,
    objects: Arc<ObjectSerializerRegistry>,
    events: broadcast::Sender<EndpointEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CommunicationEndpoint {
    pub(crate) fn new(
        config: EndpointConfig,
        information: EndpointInformation,
        conductor: HandshakeConductor,
        interaction: InteractionLayer,
        translators: Vec<Arc<DiscoveryChannelTranslator>>,
        objects: Arc<ObjectSerializerRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let connections = forward(conductor.subscribe(), events.clone());
        let interactions = forward(interaction.subscribe(), events.clone());
        Self {
            config,
            information,
            conductor,
            interaction,
            translators,
            objects,
            events,
            tasks: Mutex::new(vec![connections, interactions]),
        }
    }

    /// Id of this endpoint.
    #[must_use]
    pub fn id(&self) -> &EndpointId {
        &self.information.id
    }

    /// Where peers reach this endpoint.
    #[must_use]
    pub fn local_information(&self) -> &EndpointInformation {
        &self.information
    }

    /// The configuration the endpoint was built with.
    #[must_use]
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// The object serializers used for command and notification values.
    #[must_use]
    pub fn object_serializers(&self) -> &Arc<ObjectSerializerRegistry> {
        &self.objects
    }

    /// The protocol layer.
    #[must_use]
    pub fn protocol_layer(&self) -> &ProtocolLayer {
        self.conductor.layer()
    }

    /// The interaction layer.
    #[must_use]
    pub fn interaction_layer(&self) -> &InteractionLayer {
        &self.interaction
    }

    /// A discovery source that negotiates with the same discovery versions
    /// as this endpoint. Pass it to [`watch_discovery`](Self::watch_discovery).
    #[must_use]
    pub fn manual_discovery(&self) -> ManualDiscoverySource {
        ManualDiscoverySource::new(self.translators.clone())
    }

    /// Negotiates with the endpoint whose discovery endpoint is at
    /// `discovery_address` and starts the handshake.
    #[instrument(skip(self), fields(endpoint = %self.id()))]
    pub async fn connect_to(&self, id: EndpointId, discovery_address: Url) -> HandshakeState {
        self.conductor.on_endpoint_discovered(id, discovery_address).await
    }

    /// Follows `source`, connecting to endpoints it announces.
    pub fn watch_discovery(&self, source: &dyn DiscoverySource) {
        let task = self.conductor.watch(source);
        self.tasks.lock().push(task);
    }

    /// Disconnects from `id`.
    pub async fn disconnect_from(&self, id: &EndpointId) {
        self.conductor.disconnect_from(id).await;
    }

    /// Handshake state of `id`.
    #[must_use]
    pub fn handshake_state(&self, id: &EndpointId) -> HandshakeState {
        self.conductor.state_of(id)
    }

    /// Endpoints whose handshake completed.
    #[must_use]
    pub fn connected_endpoints(&self) -> Vec<EndpointId> {
        self.conductor.connected_endpoints()
    }

    /// Whether we want to interact with `id`, once decided.
    #[must_use]
    pub fn interaction_state(&self, id: &EndpointId) -> Option<InteractionConnectionState> {
        self.interaction.interaction_state(id)
    }

    /// Waits until we decided whether to interact with `id`.
    pub async fn wait_for_interaction(
        &self,
        id: &EndpointId,
        timeout: Duration,
    ) -> Result<InteractionConnectionState, CommError> {
        Ok(self.interaction.wait_for_interaction(id, timeout).await?)
    }

    /// A proxy for command set `P` on `id`.
    pub fn command_proxy<P: CommandSetProxy>(&self, id: &EndpointId) -> Result<P, CommError> {
        Ok(self.interaction.command_proxy(id)?)
    }

    /// A proxy for notification set `P` on `id`.
    pub fn notification_proxy<P: NotificationSetProxy>(&self, id: &EndpointId) -> Result<P, CommError> {
        Ok(self.interaction.notification_proxy(id)?)
    }

    /// Makes `source` downloadable by peers with the returned token.
    pub fn register_upload(&self, source: UploadSource) -> UploadToken {
        self.protocol_layer().register_upload(source)
    }

    /// Downloads the data `id` registered under `token`.
    ///
    /// Waits at most the configured response timeout.
    pub async fn download(&self, id: &EndpointId, token: UploadToken) -> Result<Vec<u8>, CommError> {
        Ok(self
            .protocol_layer()
            .download(id, token, self.config.response_timeout)
            .await?)
    }

    /// Checks that `id` still answers, returning its verification payload.
    pub async fn verify_connection(
        &self,
        id: &EndpointId,
        custom: Option<ObjectValue>,
    ) -> Result<Option<ObjectValue>, CommError> {
        Ok(self
            .protocol_layer()
            .verify_connection_is_active(id, self.config.response_timeout, custom)
            .await?)
    }

    /// Subscribes to connection and interaction events.
    pub fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.events.subscribe()
    }

    /// Disconnects from every peer and stops hosting.
    #[instrument(skip(self), fields(endpoint = %self.id()))]
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.conductor.disconnect_all().await;
        self.interaction.shutdown();
        self.protocol_layer().stop().await;
        info!("communication endpoint stopped");
    }
}

fn forward<E>(mut source: broadcast::Receiver<E>, sink: broadcast::Sender<EndpointEvent>) -> JoinHandle<()>
where
    E: Clone + Send + 'static,
    EndpointEvent: From<E>,
{
    tokio::spawn(async move {
        loop {
            match source.recv().await {
                Ok(event) => {
                    if sink.send(EndpointEvent::from(event)).is_err() {
                        debug!("endpoint event dropped, no subscribers");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "endpoint events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

impl Drop for CommunicationEndpoint {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CommunicationEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunicationEndpoint")
            .field("id", self.id())
            .field("information", &self.information)
            .field("connected", &self.conductor.connected_endpoints())
            .finish_non_exhaustive()
    }
}
