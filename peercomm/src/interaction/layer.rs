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

//! The interaction layer of one local endpoint.
//!
//! After a handshake completes, both sides exchange their subject groups and
//! decide whether they want to interact. Command and notification proxies
//! are only handed out for endpoints we decided to interact with.

use crate::id::{CommunicationSubject, EndpointId};
use crate::interaction::command::{CommandOutcome, LocalCommandCollection};
use crate::interaction::notification::{
    LocalNotificationCollection, NotificationForwarder, RemoteNotificationHub, SubscriptionHook,
};
use crate::interaction::{
    CommandError, CommandProxyHandle, CommandSet, CommandSetProxy, InteractionConnectionState,
    InteractionError, NotificationId, NotificationProxyHandle, NotificationSet,
    NotificationSetProxy, SubjectGroup, TypeFallback, evaluate_interaction,
};
use crate::protocol::{
    CommandInvocation, CommunicationDescription, CommunicationMessage, ConnectionEvent, HandshakeConductor, HandshakeState,
    MessageKind, MessageProcessor, MessageType, NotificationRaised, ProtocolError, ProtocolLayer,
};
use crate::serialization::{ObjectSerializerRegistry, ObjectValue};
use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Settings of an [`InteractionLayer`].
#[derive(Debug, Clone)]
pub struct InteractionConfig {
    /// Retries for invocations, subscriptions and forwarded notifications.
    pub max_send_retries: u32,
    /// Retries for command responses.
    pub command_response_retries: u32,
    /// How long a caller waits for a response.
    pub response_timeout: Duration,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            max_send_retries: 3,
            command_response_retries: 1,
            response_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of the interaction exchange with an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    /// We evaluated the subject groups of `endpoint`.
    Decided {
        /// The remote endpoint.
        endpoint: EndpointId,
        /// Whether we want to interact with it.
        state: InteractionConnectionState,
    },
    /// `endpoint` told us whether it wants to interact with us.
    RemoteDecided {
        /// The remote endpoint.
        endpoint: EndpointId,
        /// Its decision.
        state: InteractionConnectionState,
    },
}

#[derive(Debug, Default, Clone)]
struct Requirements {
    commands: Vec<TypeFallback>,
    notifications: Vec<TypeFallback>,
}

#[derive(Debug, Clone, Copy)]
enum SetKind {
    Commands,
    Notifications,
}

impl SetKind {
    fn provided_by(self, group: &SubjectGroup) -> &[TypeFallback] {
        match self {
            Self::Commands => &group.provided_commands,
            Self::Notifications => &group.provided_notifications,
        }
    }

    fn announced_by(self, description: &CommunicationDescription) -> &[TypeFallback] {
        match self {
            Self::Commands => &description.command_sets,
            Self::Notifications => &description.notification_sets,
        }
    }
}

#[derive(Debug, Default)]
struct RemoteInteraction {
    local: Option<InteractionConnectionState>,
    remote: Option<InteractionConnectionState>,
    groups: Vec<SubjectGroup>,
}

pub(crate) struct Shared {
    pub(crate) conductor: HandshakeConductor,
    pub(crate) objects: Arc<ObjectSerializerRegistry>,
    pub(crate) config: InteractionConfig,
    pub(crate) hub: RemoteNotificationHub,
    commands: LocalCommandCollection,
    notifications: LocalNotificationCollection,
    subjects: RwLock<BTreeMap<CommunicationSubject, Requirements>>,
    remotes: RwLock<HashMap<EndpointId, RemoteInteraction>>,
    changed: Notify,
    events: broadcast::Sender<InteractionEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
    weak: Weak<Shared>,
}

impl Shared {
    fn layer(&self) -> &ProtocolLayer {
        self.conductor.layer()
    }

    pub(crate) fn subscription_hook(&self, endpoint: EndpointId, notification: NotificationId) -> Arc<dyn SubscriptionHook> {
        Arc::new(RemoteSubscription {
            endpoint,
            notification,
            shared: self.weak.clone(),
        })
    }

    fn local_groups(&self) -> Vec<SubjectGroup> {
        self.subjects
            .read()
            .iter()
            .map(|(subject, required)| SubjectGroup {
                subject: subject.clone(),
                provided_commands: self.commands.provided_for(subject),
                required_commands: required.commands.clone(),
                provided_notifications: self.notifications.provided_for(subject),
                required_notifications: required.notifications.clone(),
            })
            .collect()
    }

    fn publish(&self, event: InteractionEvent) {
        self.changed.notify_waiters();
        if self.events.send(event).is_err() {
            debug!("interaction event dropped, no subscribers");
        }
    }

    async fn on_connected(self: Arc<Self>, endpoint: EndpointId) {
        let layer = self.layer();
        let request = CommunicationMessage::new(
            layer.id().clone(),
            MessageKind::EndpointInteractionInformation(self.local_groups()),
        );
        let response = layer
            .send_message_and_wait_for_response(
                &endpoint,
                &request,
                self.config.max_send_retries,
                self.config.response_timeout,
            )
            .await;
        match response.map(CommunicationMessage::into_kind) {
            Ok(MessageKind::EndpointInteractionInformationResponse(state)) => {
                debug!(remote = %endpoint, ?state, "remote decided about interaction");
                self.remotes.write().entry(endpoint.clone()).or_default().remote = Some(state);
                self.publish(InteractionEvent::RemoteDecided { endpoint, state });
            }
            Ok(other) => {
                warn!(remote = %endpoint, response = %other.message_type(), "unexpected interaction response");
            }
            Err(e) => warn!(remote = %endpoint, error = %e, "interaction exchange failed"),
        }
    }

    fn on_gone(&self, endpoint: &EndpointId) {
        self.remotes.write().remove(endpoint);
        self.notifications.remove_endpoint(endpoint);
        self.hub.remove_endpoint(endpoint);
        self.changed.notify_waiters();
    }

    fn check_available(
        &self,
        endpoint: &EndpointId,
        descriptor: &TypeFallback,
        set: SetKind,
    ) -> Result<(), InteractionError> {
        let not_available = || InteractionError::NotAvailable {
            endpoint: endpoint.clone(),
            type_name: descriptor.to_string(),
        };
        if self.conductor.state_of(endpoint) != HandshakeState::Connected {
            return Err(not_available());
        }
        let remotes = self.remotes.read();
        let remote = remotes.get(endpoint).ok_or_else(not_available)?;
        if remote.local != Some(InteractionConnectionState::Desired)
            || remote.remote == Some(InteractionConnectionState::NotDesired)
        {
            return Err(not_available());
        }
        let in_groups = remote
            .groups
            .iter()
            .any(|g| set.provided_by(g).iter().any(|p| p.matches(descriptor)));
        let in_description = self
            .conductor
            .remote_description(endpoint)
            .is_some_and(|d| set.announced_by(&d).iter().any(|p| p.matches(descriptor)));
        if in_groups || in_description {
            Ok(())
        } else {
            Err(not_available())
        }
    }

    /// Our decision about `endpoint`, waiting for its subject groups if they
    /// are still on the way.
    async fn local_decision(&self, endpoint: &EndpointId) -> Option<InteractionConnectionState> {
        let deadline = tokio::time::Instant::now() + self.config.response_timeout;
        loop {
            let changed = self.changed.notified();
            let decided = self.remotes.read().get(endpoint).and_then(|r| r.local);
            if decided.is_some() {
                return decided;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return None;
            }
        }
    }

    async fn dispatch_command(&self, message: &CommunicationMessage, invocation: &CommandInvocation) -> Result<(), ProtocolError> {
        let outcome = match self.commands.resolve(&invocation.command) {
            Ok(definition) => AssertUnwindSafe(definition.invoke(invocation.parameters.clone()))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(CommandError::failed("command panicked"))),
            Err(e) => {
                warn!(sender = %message.sender(), command = %invocation.command, error = %e, "cannot dispatch command");
                Err(CommandError::failed(e.to_string()))
            }
        };
        let kind = match outcome {
            Ok(CommandOutcome::Value(result)) => match self.objects.ensure_serializer_for(&result) {
                Ok(()) => MessageKind::CommandInvokedResponse { result },
                Err(e) => MessageKind::failure(e.to_string()),
            },
            Ok(CommandOutcome::Completed) => MessageKind::Success,
            Err(e) => MessageKind::failure(e.to_string()),
        };
        let is_failure = matches!(kind, MessageKind::Failure { .. });
        let layer = self.layer();
        match layer.respond(message, kind, self.config.command_response_retries).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if !is_failure {
                    let fallback = MessageKind::failure(format!("command response could not be delivered: {e}"));
                    if let Err(fallback_error) = layer.respond(message, fallback, 0).await {
                        debug!(remote = %message.sender(), error = %fallback_error, "failure response dropped");
                    }
                }
                Err(e)
            }
        }
    }

    async fn process(&self, message: CommunicationMessage) -> Result<(), ProtocolError> {
        let layer = self.layer();
        let sender = message.sender().clone();
        if !self.conductor.has_accepted(&sender) {
            debug!(%sender, message_type = %message.message_type(), "interaction message from endpoint that is not connected");
            if layer.has_session(&sender) {
                return layer
                    .respond(&message, MessageKind::UnknownMessageType, self.config.max_send_retries)
                    .await;
            }
            return Ok(());
        }
        let retries = self.config.max_send_retries;
        if !matches!(message.kind(), MessageKind::EndpointInteractionInformation(_)) {
            let decision = self.local_decision(&sender).await;
            if decision != Some(InteractionConnectionState::Desired) {
                debug!(%sender, message_type = %message.message_type(), ?decision, "interaction message from endpoint we do not interact with");
                return match message.kind() {
                    MessageKind::NotificationRaised(_) => Ok(()),
                    _ => {
                        layer
                            .respond(&message, MessageKind::failure("interaction not desired"), retries)
                            .await
                    }
                };
            }
        }
        match message.kind() {
            MessageKind::EndpointInteractionInformation(groups) => {
                let state = evaluate_interaction(&self.local_groups(), groups);
                {
                    let mut remotes = self.remotes.write();
                    let remote = remotes.entry(sender.clone()).or_default();
                    remote.local = Some(state);
                    remote.groups = groups.clone();
                }
                info!(remote = %sender, ?state, "interaction decided");
                let outcome = layer
                    .respond(&message, MessageKind::EndpointInteractionInformationResponse(state), retries)
                    .await;
                self.publish(InteractionEvent::Decided {
                    endpoint: sender,
                    state,
                });
                outcome
            }
            MessageKind::CommandInvoked(invocation) => self.dispatch_command(&message, invocation).await,
            MessageKind::RegisterForNotification(notification) => {
                let kind = match self.notifications.subscribe(&sender, notification.clone()) {
                    Ok(()) => MessageKind::Success,
                    Err(e) => MessageKind::failure(e.to_string()),
                };
                layer.respond(&message, kind, retries).await
            }
            MessageKind::UnregisterFromNotification(notification) => {
                let kind = match self.notifications.unsubscribe(&sender, notification) {
                    Ok(()) => MessageKind::Success,
                    Err(e) => MessageKind::failure(e.to_string()),
                };
                layer.respond(&message, kind, retries).await
            }
            MessageKind::NotificationRaised(raised) => {
                let delivered = self.hub.deliver(&sender, &raised.notification, &raised.arguments);
                if delivered == 0 {
                    debug!(%sender, notification = %raised.notification, "no local proxy for notification");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

struct InteractionProcessor {
    shared: Weak<Shared>,
}

#[async_trait]
impl MessageProcessor for InteractionProcessor {
    async fn process(&self, _layer: &ProtocolLayer, message: CommunicationMessage) -> Result<(), ProtocolError> {
        match self.shared.upgrade() {
            Some(shared) => shared.process(message).await,
            None => Ok(()),
        }
    }
}

struct Forwarding {
    shared: Weak<Shared>,
}

impl NotificationForwarder for Forwarding {
    fn forward(&self, subscribers: Vec<(EndpointId, NotificationId)>, args: ObjectValue) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if let Err(e) = shared.objects.ensure_serializer_for(&args) {
            warn!(error = %e, "cannot forward notification");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("notification raised outside a runtime, not forwarded");
            return;
        };
        runtime.spawn(async move {
            let layer = shared.layer();
            for (endpoint, notification) in subscribers {
                let message = CommunicationMessage::new(
                    layer.id().clone(),
                    MessageKind::NotificationRaised(NotificationRaised {
                        notification,
                        arguments: args.clone(),
                    }),
                );
                if let Err(e) = layer
                    .send_message_to(&endpoint, &message, shared.config.max_send_retries)
                    .await
                {
                    warn!(remote = %endpoint, error = %e, "failed to forward notification");
                }
            }
        });
    }
}

struct RemoteSubscription {
    endpoint: EndpointId,
    notification: NotificationId,
    shared: Weak<Shared>,
}

impl RemoteSubscription {
    fn send(&self, kind: MessageKind) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(remote = %self.endpoint, "subscription changed outside a runtime, remote not told");
            return;
        };
        let endpoint = self.endpoint.clone();
        runtime.spawn(async move {
            let layer = shared.layer();
            let message_type = kind.message_type();
            let request = CommunicationMessage::new(layer.id().clone(), kind);
            let response = layer
                .send_message_and_wait_for_response(
                    &endpoint,
                    &request,
                    shared.config.max_send_retries,
                    shared.config.response_timeout,
                )
                .await;
            match response.map(CommunicationMessage::into_kind) {
                Ok(MessageKind::Success) => debug!(remote = %endpoint, %message_type, "subscription updated"),
                Ok(MessageKind::Failure { reason }) => {
                    warn!(remote = %endpoint, %message_type, %reason, "subscription refused")
                }
                Ok(other) => warn!(remote = %endpoint, response = %other.message_type(), "unexpected subscription response"),
                Err(e) => warn!(remote = %endpoint, error = %e, "subscription update failed"),
            }
        });
    }
}

impl SubscriptionHook for RemoteSubscription {
    fn on_first_subscriber(&self) {
        self.send(MessageKind::RegisterForNotification(self.notification.clone()));
    }

    fn on_last_unsubscribed(&self) {
        self.send(MessageKind::UnregisterFromNotification(self.notification.clone()));
    }
}

/// Command and notification wiring of one local endpoint.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InteractionLayer {
    shared: Arc<Shared>,
}

impl InteractionLayer {
    /// Creates the layer, registers its processors and starts following
    /// handshake outcomes. Must be called inside a Tokio runtime.
    pub fn new(conductor: HandshakeConductor, objects: Arc<ObjectSerializerRegistry>, config: InteractionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| Shared {
            conductor,
            objects,
            config,
            hub: RemoteNotificationHub::default(),
            commands: LocalCommandCollection::new(),
            notifications: LocalNotificationCollection::new(Arc::new(Forwarding { shared: weak.clone() })),
            subjects: RwLock::new(BTreeMap::new()),
            remotes: RwLock::new(HashMap::new()),
            changed: Notify::new(),
            events,
            listener: Mutex::new(None),
            weak: weak.clone(),
        });

        let processor = Arc::new(InteractionProcessor {
            shared: Arc::downgrade(&shared),
        });
        for message_type in [
            MessageType::EndpointInteractionInformation,
            MessageType::CommandInvoked,
            MessageType::RegisterForNotification,
            MessageType::UnregisterFromNotification,
            MessageType::NotificationRaised,
        ] {
            shared.layer().register_processor(message_type, processor.clone());
        }

        let mut connections = shared.conductor.subscribe();
        let weak = Arc::downgrade(&shared);
        let listener = tokio::spawn(async move {
            loop {
                let event = match connections.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "connection events were dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                match event {
                    ConnectionEvent::EndpointConnected(connected) => {
                        tokio::spawn(shared.on_connected(connected.id));
                    }
                    ConnectionEvent::EndpointDisconnected(id) | ConnectionEvent::EndpointRejected(id) => {
                        shared.on_gone(&id);
                    }
                }
            }
        });
        *shared.listener.lock() = Some(listener);
        Self { shared }
    }

    /// The handshake conductor.
    #[must_use]
    pub fn conductor(&self) -> &HandshakeConductor {
        &self.shared.conductor
    }

    /// Declares a subject this endpoint participates in.
    pub fn add_subject(&self, subject: CommunicationSubject) {
        self.shared.subjects.write().entry(subject).or_default();
    }

    /// Offers `set` to peers sharing `subject`.
    pub fn register_command_set(&self, subject: CommunicationSubject, set: &dyn CommandSet) -> Result<(), InteractionError> {
        self.add_subject(subject.clone());
        self.shared.commands.register(subject, set)
    }

    /// Offers `set` to peers sharing `subject`.
    pub fn register_notification_set(
        &self,
        subject: CommunicationSubject,
        set: &dyn NotificationSet,
    ) -> Result<(), InteractionError> {
        self.add_subject(subject.clone());
        self.shared.notifications.register(subject, set)
    }

    /// Requires peers sharing `subject` to provide command set `set`.
    pub fn require_command_set(&self, subject: CommunicationSubject, set: TypeFallback) {
        self.shared.subjects.write().entry(subject).or_default().commands.push(set);
    }

    /// Requires peers sharing `subject` to provide notification set `set`.
    pub fn require_notification_set(&self, subject: CommunicationSubject, set: TypeFallback) {
        self.shared
            .subjects
            .write()
            .entry(subject)
            .or_default()
            .notifications
            .push(set);
    }

    /// Our subject groups as sent to peers.
    #[must_use]
    pub fn subject_groups(&self) -> Vec<SubjectGroup> {
        self.shared.local_groups()
    }

    /// Whether we want to interact with `endpoint`, once decided.
    #[must_use]
    pub fn interaction_state(&self, endpoint: &EndpointId) -> Option<InteractionConnectionState> {
        self.shared.remotes.read().get(endpoint).and_then(|r| r.local)
    }

    /// Whether `endpoint` wants to interact with us, once it told us.
    #[must_use]
    pub fn remote_interaction_state(&self, endpoint: &EndpointId) -> Option<InteractionConnectionState> {
        self.shared.remotes.read().get(endpoint).and_then(|r| r.remote)
    }

    /// Waits until we decided about `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::Timeout`] if no decision is made in time.
    pub async fn wait_for_interaction(
        &self,
        endpoint: &EndpointId,
        timeout: Duration,
    ) -> Result<InteractionConnectionState, InteractionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let changed = self.shared.changed.notified();
            if let Some(state) = self.interaction_state(endpoint) {
                return Ok(state);
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return Err(InteractionError::Timeout {
                    endpoint: endpoint.clone(),
                    duration: timeout,
                });
            }
        }
    }

    /// A proxy for command set `P` on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::NotAvailable`] unless the endpoint is
    /// connected, we want to interact with it and it provides the set.
    pub fn command_proxy<P: CommandSetProxy>(&self, endpoint: &EndpointId) -> Result<P, InteractionError> {
        let descriptor = P::descriptor();
        self.shared.check_available(
            endpoint,
            &descriptor,
            SetKind::Commands,
        )?;
        Ok(P::from_handle(CommandProxyHandle::new(
            endpoint.clone(),
            descriptor,
            self.shared.clone(),
        )))
    }

    /// A proxy for notification set `P` on `endpoint`.
    ///
    /// # Errors
    ///
    /// Same as [`command_proxy`](Self::command_proxy).
    pub fn notification_proxy<P: NotificationSetProxy>(&self, endpoint: &EndpointId) -> Result<P, InteractionError> {
        let descriptor = P::descriptor();
        self.shared.check_available(
            endpoint,
            &descriptor,
            SetKind::Notifications,
        )?;
        Ok(P::from_handle(NotificationProxyHandle::new(
            endpoint.clone(),
            descriptor,
            self.shared.clone(),
        )))
    }

    /// Subscribes to interaction decisions.
    pub fn subscribe(&self) -> broadcast::Receiver<InteractionEvent> {
        self.shared.events.subscribe()
    }

    /// Stops following handshake outcomes.
    pub fn shutdown(&self) {
        if let Some(listener) = self.shared.listener.lock().take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for InteractionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionLayer")
            .field("endpoint", self.shared.layer().id())
            .field("commands", &self.shared.commands)
            .field("notifications", &self.shared.notifications)
            .finish_non_exhaustive()
    }
}
