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

//! The protocol layer of one local endpoint.
//!
//! [`ProtocolLayer`] hosts the receiving side of the endpoint, owns one
//! [`ConnectionSession`] per remote endpoint and routes inbound messages:
//! responses complete the matching wait, everything else goes to the
//! [`MessageProcessor`] registered for its type.

use crate::discovery::{DISCOVERY_VERSION_V1, DiscoveryEndpoint, EndpointInformation, ProtocolInformation};
use crate::id::{EndpointId, Version};
use crate::protocol::receiving::HandlerError;
use crate::protocol::{
    CommunicationMessage, ConnectionSession, DataReceivingEndpoint, DataTransfer, MessageKind,
    MessageReceivingEndpoint, MessageTranslator, MessageType, ProtocolError, ResponseWaiter,
    UploadRegistry, UploadSource, UploadToken,
};
use crate::serialization::ObjectValue;
use crate::transport::{ChannelTemplate, HostHandlers, HostedEndpoint};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Handles inbound messages of one [`MessageType`].
///
/// Processors run on their own task. An error returned from
/// [`process`](Self::process) is logged by the layer.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Processes one inbound, non-response message.
    async fn process(&self, layer: &ProtocolLayer, message: CommunicationMessage) -> Result<(), ProtocolError>;
}

/// Produces the custom payload of a connection verification response.
pub trait VerificationResponder: Send + Sync {
    /// Returns the payload answering `custom` from `sender`.
    fn respond(&self, sender: &EndpointId, custom: Option<&ObjectValue>) -> Option<ObjectValue>;
}

/// Answers a verification with the payload it carried.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoResponder;

impl VerificationResponder for EchoResponder {
    fn respond(&self, _sender: &EndpointId, custom: Option<&ObjectValue>) -> Option<ObjectValue> {
        custom.cloned()
    }
}

/// Settings of a [`ProtocolLayer`].
#[derive(Debug, Clone)]
pub struct ProtocolLayerConfig {
    /// Retries for responses the layer sends on its own.
    pub max_send_retries: u32,
    /// Lifetime of upload tokens.
    pub upload_token_ttl: Duration,
    /// Discovery protocol version served.
    pub discovery_version: Version,
}

impl Default for ProtocolLayerConfig {
    fn default() -> Self {
        Self {
            max_send_retries: 3,
            upload_token_ttl: Duration::from_secs(300),
            discovery_version: DISCOVERY_VERSION_V1,
        }
    }
}

/// Protocol layer of one local endpoint.
///
/// Cheap to clone; clones share state.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::EndpointId;
/// use peercomm::protocol::{MessageTranslator, ProtocolLayer, ProtocolLayerConfig};
/// use peercomm::serialization::ObjectSerializerRegistry;
/// use peercomm::transport::{MemoryChannelTemplate, MemoryNetwork};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let template = Arc::new(MemoryChannelTemplate::new(Arc::new(MemoryNetwork::new())));
/// let translator = Arc::new(MessageTranslator::v1(Arc::new(ObjectSerializerRegistry::with_defaults())));
/// let layer = ProtocolLayer::new(EndpointId::new("a"), template, translator, ProtocolLayerConfig::default());
///
/// let local = layer.start().await?;
/// assert_eq!(local.id, EndpointId::new("a"));
/// layer.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProtocolLayer {
    inner: Arc<Inner>,
}

struct Inner {
    id: EndpointId,
    template: Arc<dyn ChannelTemplate>,
    translator: Arc<MessageTranslator>,
    config: ProtocolLayerConfig,
    sessions: RwLock<HashMap<EndpointId, Arc<ConnectionSession>>>,
    processors: RwLock<HashMap<MessageType, Arc<dyn MessageProcessor>>>,
    responses: ResponseWaiter<CommunicationMessage>,
    data: Arc<DataReceivingEndpoint>,
    uploads: UploadRegistry,
    verification: RwLock<Arc<dyn VerificationResponder>>,
    hosted: Mutex<Option<HostedEndpoint>>,
    local: RwLock<Option<EndpointInformation>>,
}

impl ProtocolLayer {
    /// Creates a stopped layer speaking the translator's protocol version.
    pub fn new(
        id: EndpointId,
        template: Arc<dyn ChannelTemplate>,
        translator: Arc<MessageTranslator>,
        config: ProtocolLayerConfig,
    ) -> Self {
        let uploads = UploadRegistry::new(config.upload_token_ttl);
        let layer = Self {
            inner: Arc::new(Inner {
                id,
                template,
                translator,
                config,
                sessions: RwLock::new(HashMap::new()),
                processors: RwLock::new(HashMap::new()),
                responses: ResponseWaiter::new(),
                data: Arc::new(DataReceivingEndpoint::new()),
                uploads,
                verification: RwLock::new(Arc::new(EchoResponder)),
                hosted: Mutex::new(None),
                local: RwLock::new(None),
            }),
        };
        layer.register_processor(MessageType::DownloadRequest, Arc::new(DownloadProcessor));
        layer.register_processor(MessageType::ConnectionVerification, Arc::new(VerificationProcessor));
        layer
    }

    /// Id of the local endpoint.
    #[must_use]
    pub fn id(&self) -> &EndpointId {
        &self.inner.id
    }

    /// Protocol version spoken by this layer.
    #[must_use]
    pub fn protocol_version(&self) -> Version {
        self.inner.translator.version()
    }

    /// The channel template used for outbound channels.
    #[must_use]
    pub fn template(&self) -> &Arc<dyn ChannelTemplate> {
        &self.inner.template
    }

    /// Default retry count for sends made by the layer itself.
    #[must_use]
    pub fn max_send_retries(&self) -> u32 {
        self.inner.config.max_send_retries
    }

    /// Local connection information, once started.
    #[must_use]
    pub fn local_information(&self) -> Option<EndpointInformation> {
        self.inner.local.read().clone()
    }

    /// The data receiving endpoint, for registering data handlers.
    #[must_use]
    pub fn data_endpoint(&self) -> &Arc<DataReceivingEndpoint> {
        &self.inner.data
    }

    /// Hosts the message, data and discovery endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::AlreadyRunning`] when called twice, or the
    /// binding's error when hosting fails.
    #[instrument(skip(self), fields(endpoint = %self.inner.id))]
    pub async fn start(&self) -> Result<EndpointInformation, ProtocolError> {
        if self.inner.hosted.lock().is_some() {
            return Err(ProtocolError::AlreadyRunning);
        }

        let receiver = MessageReceivingEndpoint::new(self.inner.translator.clone());
        let weak = Arc::downgrade(&self.inner);
        receiver.on_new_message(move |message: &CommunicationMessage| -> Result<(), HandlerError> {
            route(&weak, message.clone());
            Ok(())
        });

        let discovery_version = self.inner.config.discovery_version;
        let discovery = Arc::new(DiscoveryEndpoint::new(discovery_version, Vec::new()));
        let handlers = HostHandlers {
            message: Arc::new(receiver),
            data: self.inner.data.clone(),
            discovery: vec![discovery.clone()],
        };
        let hosted = self.inner.template.host(&self.inner.id, handlers).await?;

        let protocol = ProtocolInformation {
            version: self.protocol_version(),
            message_address: hosted.message_address.clone(),
            data_address: Some(hosted.data_address.clone()),
        };
        discovery.set_protocols([protocol.clone()]);
        let Some(discovery_address) = hosted.discovery_address(&discovery_version).cloned() else {
            return Err(ProtocolError::NotRunning);
        };
        let local = EndpointInformation {
            id: self.inner.id.clone(),
            discovery_address,
            protocol,
        };

        {
            let mut slot = self.inner.hosted.lock();
            if slot.is_some() {
                return Err(ProtocolError::AlreadyRunning);
            }
            *slot = Some(hosted);
        }
        *self.inner.local.write() = Some(local.clone());
        info!(discovery = %local.discovery_address, message = %local.protocol.message_address, "protocol layer started");
        Ok(local)
    }

    /// Closes every session and stops hosting. Outstanding waits are
    /// cancelled.
    pub async fn stop(&self) {
        let sessions: Vec<_> = self.inner.sessions.write().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close().await;
        }
        self.inner.responses.cancel_all();
        self.inner.local.write().take();
        if let Some(hosted) = self.inner.hosted.lock().take() {
            hosted.close();
            info!(endpoint = %self.inner.id, "protocol layer stopped");
        }
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.hosted.lock().is_some()
    }

    /// Opens the session to `remote`, replacing a session with different
    /// connection information.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedProtocolVersion`] when the remote
    /// was negotiated to a version this layer does not speak.
    pub async fn open_session(
        &self,
        remote: &EndpointId,
        protocol: ProtocolInformation,
    ) -> Result<Arc<ConnectionSession>, ProtocolError> {
        if protocol.version != self.protocol_version() {
            return Err(ProtocolError::UnsupportedProtocolVersion {
                version: protocol.version,
            });
        }
        let (session, replaced) = {
            let mut sessions = self.inner.sessions.write();
            if let Some(existing) = sessions.get(remote) {
                if existing.protocol() == &protocol {
                    return Ok(existing.clone());
                }
            }
            let session = Arc::new(ConnectionSession::new(
                remote.clone(),
                protocol,
                self.inner.template.clone(),
                self.inner.translator.clone(),
            ));
            let replaced = sessions.insert(remote.clone(), session.clone());
            (session, replaced)
        };
        if let Some(old) = replaced {
            old.close().await;
        }
        debug!(%remote, address = %session.protocol().message_address, "session opened");
        Ok(session)
    }

    /// The session to `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NoSession`] if none is open.
    pub fn session(&self, remote: &EndpointId) -> Result<Arc<ConnectionSession>, ProtocolError> {
        self.inner
            .sessions
            .read()
            .get(remote)
            .cloned()
            .ok_or_else(|| ProtocolError::NoSession {
                endpoint: remote.clone(),
            })
    }

    /// Returns `true` if a session to `remote` is open.
    #[must_use]
    pub fn has_session(&self, remote: &EndpointId) -> bool {
        self.inner.sessions.read().contains_key(remote)
    }

    /// Closes the session to `remote`. Closing a missing session is a no-op.
    pub async fn close_session(&self, remote: &EndpointId) {
        let session = self.inner.sessions.write().remove(remote);
        if let Some(session) = session {
            session.close().await;
            debug!(%remote, "session closed");
        }
    }

    /// Sends a message to `remote`.
    pub async fn send_message_to(
        &self,
        remote: &EndpointId,
        message: &CommunicationMessage,
        max_retries: u32,
    ) -> Result<(), ProtocolError> {
        self.session(remote)?.send_message(message, max_retries).await
    }

    /// Sends a message to `remote` and waits for the message answering it.
    ///
    /// # Errors
    ///
    /// Send failures are returned as is; no answer within `timeout` yields
    /// [`ProtocolError::Timeout`]. A response arriving later is dropped.
    #[instrument(skip(self, message), fields(endpoint = %self.inner.id, message_id = %message.id(), message_type = %message.message_type()))]
    pub async fn send_message_and_wait_for_response(
        &self,
        remote: &EndpointId,
        message: &CommunicationMessage,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<CommunicationMessage, ProtocolError> {
        let rx = self.inner.responses.register(message.id());
        if let Err(e) = self.send_message_to(remote, message, max_retries).await {
            self.inner.responses.cancel(message.id());
            return Err(e);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                trace!(response_type = %response.message_type(), "response received");
                Ok(response)
            }
            Ok(Err(_)) => Err(ProtocolError::ResponseCancelled),
            Err(_) => {
                self.inner.responses.cancel(message.id());
                debug!(?timeout, "response timed out");
                Err(ProtocolError::Timeout { duration: timeout })
            }
        }
    }

    /// Answers `request` with a message of `kind`.
    pub async fn respond(
        &self,
        request: &CommunicationMessage,
        kind: MessageKind,
        max_retries: u32,
    ) -> Result<(), ProtocolError> {
        let response = CommunicationMessage::response_to(request, self.inner.id.clone(), kind);
        self.send_message_to(request.sender(), &response, max_retries).await
    }

    /// Routes inbound messages of `message_type` to `processor`, replacing
    /// any previous processor.
    pub fn register_processor(&self, message_type: MessageType, processor: Arc<dyn MessageProcessor>) {
        self.inner.processors.write().insert(message_type, processor);
    }

    /// Replaces the responder for connection verification payloads.
    pub fn set_verification_responder(&self, responder: Arc<dyn VerificationResponder>) {
        *self.inner.verification.write() = responder;
    }

    /// Makes `source` downloadable with the returned token.
    pub fn register_upload(&self, source: UploadSource) -> UploadToken {
        self.inner.uploads.register(source)
    }

    /// The upload registry.
    #[must_use]
    pub fn uploads(&self) -> &UploadRegistry {
        &self.inner.uploads
    }

    /// Downloads the data `remote` registered under `token`.
    ///
    /// # Errors
    ///
    /// A remote that does not know the token sends nothing; the call then
    /// fails with [`ProtocolError::Timeout`].
    #[instrument(skip(self), fields(endpoint = %self.inner.id))]
    pub async fn download(
        &self,
        remote: &EndpointId,
        token: UploadToken,
        timeout: Duration,
    ) -> Result<Vec<u8>, ProtocolError> {
        let request = CommunicationMessage::new(self.inner.id.clone(), MessageKind::DownloadRequest { token });
        let rx = self.inner.data.expect_download(request.id());
        if let Err(e) = self
            .send_message_to(remote, &request, self.inner.config.max_send_retries)
            .await
        {
            self.inner.data.cancel_download(request.id());
            return Err(e);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(transfer)) => Ok(transfer.data),
            Ok(Err(_)) => Err(ProtocolError::ResponseCancelled),
            Err(_) => {
                self.inner.data.cancel_download(request.id());
                Err(ProtocolError::Timeout { duration: timeout })
            }
        }
    }

    /// Checks that `remote` answers, returning its verification payload.
    pub async fn verify_connection_is_active(
        &self,
        remote: &EndpointId,
        timeout: Duration,
        custom: Option<ObjectValue>,
    ) -> Result<Option<ObjectValue>, ProtocolError> {
        let request = CommunicationMessage::new(
            self.inner.id.clone(),
            MessageKind::ConnectionVerification(custom),
        );
        let response = self
            .send_message_and_wait_for_response(remote, &request, self.inner.config.max_send_retries, timeout)
            .await?;
        match response.into_kind() {
            MessageKind::ConnectionVerificationResponse(payload) => Ok(payload),
            other => Err(ProtocolError::UnexpectedResponse {
                expected: MessageType::ConnectionVerificationResponse,
                actual: other.message_type(),
            }),
        }
    }

    async fn dispatch(&self, message: CommunicationMessage) {
        let message_type = message.message_type();
        let processor = self.inner.processors.read().get(&message_type).cloned();
        let sender = message.sender().clone();
        let id = message.id();
        let outcome = match processor {
            Some(processor) => processor.process(self, message).await,
            None if message_type == MessageType::UnknownMessageType => {
                debug!(%sender, message_id = %id, "remote did not understand a message");
                Ok(())
            }
            None => {
                debug!(%sender, message_id = %id, %message_type, "no processor, answering with unknown message type");
                if self.has_session(&sender) {
                    self.respond(&message, MessageKind::UnknownMessageType, self.inner.config.max_send_retries)
                        .await
                } else {
                    Ok(())
                }
            }
        };
        if let Err(e) = outcome {
            warn!(endpoint = %self.inner.id, %sender, message_id = %id, %message_type, error = %e, "failed to process message");
        }
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }
}

/// Delivers one inbound message. Runs inside the message sink.
fn route(inner: &Weak<Inner>, message: CommunicationMessage) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if message.is_response() {
        let request = message.in_response_to();
        if !inner.responses.complete(request, message) {
            debug!(endpoint = %inner.id, %request, "dropping response nobody waits for");
        }
        return;
    }
    let layer = ProtocolLayer::from_inner(inner);
    tokio::spawn(async move { layer.dispatch(message).await });
}

impl std::fmt::Debug for ProtocolLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolLayer")
            .field("id", &self.inner.id)
            .field("version", &self.protocol_version())
            .field("sessions", &self.inner.sessions.read().len())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Streams registered uploads back to the requester.
struct DownloadProcessor;

#[async_trait]
impl MessageProcessor for DownloadProcessor {
    async fn process(&self, layer: &ProtocolLayer, message: CommunicationMessage) -> Result<(), ProtocolError> {
        let MessageKind::DownloadRequest { token } = message.kind() else {
            return Ok(());
        };
        let token = *token;
        // The token stays registered until the data was delivered.
        let Some(source) = layer.inner.uploads.get(&token) else {
            info!(sender = %message.sender(), %token, "download requested for unknown upload token");
            return Ok(());
        };
        let data = source
            .load()
            .await
            .map_err(|source| ProtocolError::UploadUnavailable { token, source })?;
        let transfer = DataTransfer {
            sender: layer.inner.id.clone(),
            receiver: message.sender().clone(),
            in_response_to: message.id(),
            token: Some(token),
            data,
        };
        layer
            .session(message.sender())?
            .send_data(transfer, layer.inner.config.max_send_retries)
            .await?;
        layer.inner.uploads.take(&token);
        debug!(receiver = %message.sender(), %token, "upload delivered");
        Ok(())
    }
}

/// Answers connection verification probes.
struct VerificationProcessor;

#[async_trait]
impl MessageProcessor for VerificationProcessor {
    async fn process(&self, layer: &ProtocolLayer, message: CommunicationMessage) -> Result<(), ProtocolError> {
        let MessageKind::ConnectionVerification(custom) = message.kind() else {
            return Ok(());
        };
        let responder = layer.inner.verification.read().clone();
        let payload = responder.respond(message.sender(), custom.as_ref());
        layer
            .respond(
                &message,
                MessageKind::ConnectionVerificationResponse(payload),
                layer.inner.config.max_send_retries,
            )
            .await
    }
}
