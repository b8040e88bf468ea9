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

//! Builder for communication endpoints.

use crate::config::ConfigurationError;
use crate::discovery::DiscoveryChannelTranslator;
use crate::endpoint::{CommunicationEndpoint, EndpointConfig};
use crate::error::CommError;
use crate::id::{CommunicationSubject, EndpointId};
use crate::interaction::{
    CommandSet, CommandSetProxy, InteractionConfig, InteractionLayer, NotificationSet,
    NotificationSetProxy, TypeFallback,
};
use crate::protocol::{
    CommunicationDescription, ConnectionApprover, HandshakeConductor, MessageTranslator,
    ProtocolLayer, ProtocolLayerConfig, SubjectApprover, VerificationResponder,
};
use crate::serialization::{ObjectSerializer, ObjectSerializerRegistry};
use crate::transport::{ChannelTemplate, MemoryChannelTemplate, MemoryNetwork, TcpChannelTemplate, TcpConfig};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Builder for a [`CommunicationEndpoint`].
///
/// Collects the subjects, command sets and notification sets of the
/// endpoint, then starts it with [`build`](Self::build).
///
/// # Examples
///
/// ```rust
/// use peercomm::endpoint::CommunicationEndpointBuilder;
/// use peercomm::transport::MemoryNetwork;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), peercomm::CommError> {
/// let network = Arc::new(MemoryNetwork::new());
/// let endpoint = CommunicationEndpointBuilder::new()
///     .with_id("node-a")
///     .with_memory_network(network)
///     .with_subject("chat")
///     .build()
///     .await?;
/// assert_eq!(endpoint.id().as_str(), "node-a");
/// endpoint.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct CommunicationEndpointBuilder {
    id: Option<EndpointId>,
    config: EndpointConfig,
    template: Option<Arc<dyn ChannelTemplate>>,
    subjects: Vec<CommunicationSubject>,
    command_sets: Vec<(CommunicationSubject, Arc<dyn CommandSet>)>,
    notification_sets: Vec<(CommunicationSubject, Arc<dyn NotificationSet>)>,
    required_commands: Vec<(CommunicationSubject, TypeFallback)>,
    required_notifications: Vec<(CommunicationSubject, TypeFallback)>,
    objects: Arc<ObjectSerializerRegistry>,
    verification: Option<Arc<dyn VerificationResponder>>,
    approver: Option<Arc<dyn ConnectionApprover>>,
}

impl Default for CommunicationEndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunicationEndpointBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            config: EndpointConfig::default(),
            template: None,
            subjects: Vec::new(),
            command_sets: Vec::new(),
            notification_sets: Vec::new(),
            required_commands: Vec::new(),
            required_notifications: Vec::new(),
            objects: Arc::new(ObjectSerializerRegistry::with_defaults()),
            verification: None,
            approver: None,
        }
    }

    /// Sets the endpoint id. Defaults to [`EndpointId::for_current_process`].
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EndpointId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the channel binding.
    #[must_use]
    pub fn with_channel_template(mut self, template: Arc<dyn ChannelTemplate>) -> Self {
        self.template = Some(template);
        self
    }

    /// Uses the in-memory binding on `network`.
    #[must_use]
    pub fn with_memory_network(self, network: Arc<MemoryNetwork>) -> Self {
        self.with_channel_template(Arc::new(MemoryChannelTemplate::new(network)))
    }

    /// Uses the TCP binding.
    #[must_use]
    pub fn with_tcp(self, config: TcpConfig) -> Self {
        self.with_channel_template(Arc::new(TcpChannelTemplate::new(config)))
    }

    /// Declares participation in `subject`.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<CommunicationSubject>) -> Self {
        self.subjects.push(subject.into());
        self
    }

    /// Offers `set` to peers sharing `subject`.
    #[must_use]
    pub fn with_command_set(
        mut self,
        subject: impl Into<CommunicationSubject>,
        set: impl CommandSet + 'static,
    ) -> Self {
        self.command_sets.push((subject.into(), Arc::new(set)));
        self
    }

    /// Requires peers sharing `subject` to provide command set `P`.
    #[must_use]
    pub fn require_command_set<P: CommandSetProxy>(mut self, subject: impl Into<CommunicationSubject>) -> Self {
        self.required_commands.push((subject.into(), P::descriptor()));
        self
    }

    /// Offers `set` to peers sharing `subject`.
    #[must_use]
    pub fn with_notification_set(
        mut self,
        subject: impl Into<CommunicationSubject>,
        set: impl NotificationSet + 'static,
    ) -> Self {
        self.notification_sets.push((subject.into(), Arc::new(set)));
        self
    }

    /// Requires peers sharing `subject` to provide notification set `P`.
    #[must_use]
    pub fn require_notification_set<P: NotificationSetProxy>(
        mut self,
        subject: impl Into<CommunicationSubject>,
    ) -> Self {
        self.required_notifications.push((subject.into(), P::descriptor()));
        self
    }

    /// Adds an object serializer for command and notification values.
    #[must_use]
    pub fn with_object_serializer(self, serializer: Arc<dyn ObjectSerializer>) -> Self {
        self.objects.register(serializer);
        self
    }

    /// Adds a JSON object serializer for `T`.
    #[must_use]
    pub fn with_object_type<T>(self) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.objects.register_type::<T>();
        self
    }

    /// Answers connection verification requests with `responder`.
    #[must_use]
    pub fn with_verification_responder(mut self, responder: Arc<dyn VerificationResponder>) -> Self {
        self.verification = Some(responder);
        self
    }

    /// Replaces the default approver, which admits peers sharing a subject.
    #[must_use]
    pub fn with_connection_approver(mut self, approver: Arc<dyn ConnectionApprover>) -> Self {
        self.approver = Some(approver);
        self
    }

    /// Starts the endpoint.
    ///
    /// # Errors
    ///
    /// Fails with [`CommError::Configuration`] for an invalid configuration
    /// or a missing binding, and with the binding's error when hosting fails.
    pub async fn build(self) -> Result<CommunicationEndpoint, CommError> {
        self.config.validate()?;
        let template = self
            .template
            .ok_or_else(|| ConfigurationError::new("channel_template", "no channel binding configured"))?;
        let id = self.id.unwrap_or_else(EndpointId::for_current_process);
        let config = self.config;

        let translator = Arc::new(MessageTranslator::v1(self.objects.clone()));
        let protocol_version = translator.version();
        if let Some(versions) = config
            .discovery_versions
            .iter()
            .find(|v| !v.protocol_versions.contains(&protocol_version))
        {
            return Err(ConfigurationError::new(
                "discovery_versions",
                format!(
                    "discovery version {} does not offer protocol version {}",
                    versions.discovery_version, protocol_version
                ),
            )
            .into());
        }

        let mut layer_config = ProtocolLayerConfig {
            max_send_retries: config.max_send_retries,
            upload_token_ttl: config.upload_token_ttl,
            ..ProtocolLayerConfig::default()
        };
        if let Some(versions) = config.discovery_versions.first() {
            layer_config.discovery_version = versions.discovery_version;
        }
        let layer = ProtocolLayer::new(id.clone(), template.clone(), translator, layer_config);
        if let Some(responder) = self.verification {
            layer.set_verification_responder(responder);
        }

        let translators: Vec<_> = config
            .discovery_versions
            .iter()
            .map(|versions| {
                Arc::new(DiscoveryChannelTranslator::new(
                    versions.clone(),
                    template.clone(),
                    config.discovery_timeout,
                ))
            })
            .collect();

        let subjects: BTreeSet<CommunicationSubject> = self
            .subjects
            .iter()
            .chain(self.command_sets.iter().map(|(s, _)| s))
            .chain(self.notification_sets.iter().map(|(s, _)| s))
            .chain(self.required_commands.iter().map(|(s, _)| s))
            .chain(self.required_notifications.iter().map(|(s, _)| s))
            .cloned()
            .collect();
        let mut description = CommunicationDescription::new(protocol_version, subjects.iter().cloned());
        description.command_sets = self.command_sets.iter().map(|(_, set)| set.descriptor()).collect();
        description.notification_sets = self
            .notification_sets
            .iter()
            .map(|(_, set)| set.descriptor())
            .collect();
        debug!(endpoint = %id, ?description, "communication description");

        let approver = self
            .approver
            .unwrap_or_else(|| Arc::new(SubjectApprover::new(subjects.iter().cloned())));
        let conductor = HandshakeConductor::new(
            layer.clone(),
            translators.clone(),
            description,
            approver,
            config.handshake_timeout,
        );
        let interaction = InteractionLayer::new(
            conductor.clone(),
            self.objects.clone(),
            InteractionConfig {
                max_send_retries: config.max_send_retries,
                command_response_retries: config.command_response_retries,
                response_timeout: config.response_timeout,
            },
        );
        for subject in subjects {
            interaction.add_subject(subject);
        }
        for (subject, set) in &self.command_sets {
            interaction.register_command_set(subject.clone(), set.as_ref())?;
        }
        for (subject, set) in &self.notification_sets {
            interaction.register_notification_set(subject.clone(), set.as_ref())?;
        }
        for (subject, set) in self.required_commands {
            interaction.require_command_set(subject, set);
        }
        for (subject, set) in self.required_notifications {
            interaction.require_notification_set(subject, set);
        }

        let information = match layer.start().await {
            Ok(information) => information,
            Err(e) => {
                interaction.shutdown();
                return Err(e.into());
            }
        };
        info!(endpoint = %id, binding = template.name(), discovery = %information.discovery_address, "communication endpoint started");
        Ok(CommunicationEndpoint::new(
            config,
            information,
            conductor,
            interaction,
            translators,
            self.objects,
        ))
    }
}

impl std::fmt::Debug for CommunicationEndpointBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunicationEndpointBuilder")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("subjects", &self.subjects)
            .field("command_sets", &self.command_sets.len())
            .field("notification_sets", &self.notification_sets.len())
            .finish_non_exhaustive()
    }
}
