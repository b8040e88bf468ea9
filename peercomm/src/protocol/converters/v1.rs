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

//! Protocol version 1.0.0 converters.
//!
//! The data type tag of every v1 message is its [`MessageType::name`]. The
//! payload is a JSON object whose schema is one of the private `*V1`
//! structs below; object values travel as [`SerializedObject`]s.

use crate::discovery::ProtocolInformation;
use crate::id::{CommunicationSubject, Version};
use crate::interaction::{
    CommandId, InteractionConnectionState, NotificationId, SubjectGroup, TypeFallback,
};
use crate::protocol::converters::{MessageConverter, unknown_data};
use crate::protocol::{
    CommandInvocation, CommunicationDescription, CommunicationMessage, ConversionError,
    EndpointConnect, MessageData, MessageHeader, MessageKind, MessageType, NotificationRaised,
    UploadToken,
};
use crate::serialization::{ObjectSerializerRegistry, SerializedObject};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// The protocol version these converters implement.
pub const VERSION: Version = Version::new(1, 0, 0);

/// All v1 converters.
#[must_use]
pub fn converters(objects: Arc<ObjectSerializerRegistry>) -> Vec<Arc<dyn MessageConverter>> {
    vec![
        converter::<EndpointConnectV1>(&objects),
        converter::<EndpointDisconnectV1>(&objects),
        converter::<SuccessV1>(&objects),
        converter::<FailureV1>(&objects),
        converter::<DownloadRequestV1>(&objects),
        converter::<CommandInvokedV1>(&objects),
        converter::<CommandInvokedResponseV1>(&objects),
        converter::<NotificationRaisedV1>(&objects),
        converter::<RegisterForNotificationV1>(&objects),
        converter::<UnregisterFromNotificationV1>(&objects),
        converter::<EndpointInteractionInformationV1>(&objects),
        converter::<EndpointInteractionInformationResponseV1>(&objects),
        converter::<ConnectionVerificationV1>(&objects),
        converter::<ConnectionVerificationResponseV1>(&objects),
        converter::<UnknownMessageTypeV1>(&objects),
    ]
}

fn converter<P: Payload>(objects: &Arc<ObjectSerializerRegistry>) -> Arc<dyn MessageConverter> {
    Arc::new(Converter::<P>::new(objects.clone()))
}

/// Schema of one v1 payload.
trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const MESSAGE_TYPE: MessageType;

    /// Builds the payload. Only called with kinds of `MESSAGE_TYPE`.
    fn from_kind(kind: &MessageKind, objects: &ObjectSerializerRegistry) -> Result<Self, ConversionError>;

    fn into_kind(self, objects: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError>;
}

struct Converter<P> {
    objects: Arc<ObjectSerializerRegistry>,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> Converter<P> {
    fn new(objects: Arc<ObjectSerializerRegistry>) -> Self {
        Self {
            objects,
            _payload: PhantomData,
        }
    }

    fn wrong_kind(kind: &MessageKind) -> ConversionError {
        ConversionError::UnknownMessageType {
            data_type: kind.message_type().name().to_string(),
            expected: P::MESSAGE_TYPE.name(),
        }
    }
}

impl<P: Payload> MessageConverter for Converter<P> {
    fn message_type(&self) -> MessageType {
        P::MESSAGE_TYPE
    }

    fn data_type(&self) -> &'static str {
        P::MESSAGE_TYPE.name()
    }

    fn to_message(&self, data: &MessageData) -> Result<CommunicationMessage, ConversionError> {
        if data.data_type != self.data_type() {
            return Err(ConversionError::UnknownMessageType {
                data_type: data.data_type.clone(),
                expected: self.data_type(),
            });
        }
        let payload: P = serde_json::from_value(data.payload.clone()).map_err(|source| {
            ConversionError::Payload {
                data_type: self.data_type(),
                source,
            }
        })?;
        let kind = payload.into_kind(&self.objects)?;
        Ok(CommunicationMessage::with_header(
            MessageHeader {
                id: data.id,
                sender: data.sender.clone(),
                in_response_to: data.in_response_to,
            },
            kind,
        ))
    }

    fn from_message(&self, message: &CommunicationMessage) -> MessageData {
        if message.message_type() != P::MESSAGE_TYPE {
            return unknown_data(message);
        }
        let payload = P::from_kind(message.kind(), &self.objects).and_then(|payload| {
            serde_json::to_value(&payload).map_err(|source| ConversionError::Payload {
                data_type: self.data_type(),
                source,
            })
        });
        match payload {
            Ok(payload) => MessageData {
                id: message.id(),
                sender: message.sender().clone(),
                in_response_to: message.in_response_to(),
                data_type: self.data_type().to_string(),
                payload,
            },
            Err(e) => {
                warn!(message_id = %message.id(), message_type = %P::MESSAGE_TYPE, error = %e, "sending message as unknown type");
                unknown_data(message)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct EndpointConnectV1 {
    discovery_address: Url,
    protocol_version: Version,
    message_address: Url,
    data_address: Option<Url>,
    subjects: Vec<CommunicationSubject>,
    command_sets: Vec<TypeFallback>,
    notification_sets: Vec<TypeFallback>,
}

impl Payload for EndpointConnectV1 {
    const MESSAGE_TYPE: MessageType = MessageType::EndpointConnect;

    fn from_kind(kind: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        let MessageKind::EndpointConnect(connect) = kind else {
            return Err(Converter::<Self>::wrong_kind(kind));
        };
        Ok(Self {
            discovery_address: connect.discovery_address.clone(),
            protocol_version: connect.protocol.version,
            message_address: connect.protocol.message_address.clone(),
            data_address: connect.protocol.data_address.clone(),
            subjects: connect.description.subjects.clone(),
            command_sets: connect.description.command_sets.clone(),
            notification_sets: connect.description.notification_sets.clone(),
        })
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::EndpointConnect(EndpointConnect {
            discovery_address: self.discovery_address,
            protocol: ProtocolInformation {
                version: self.protocol_version,
                message_address: self.message_address,
                data_address: self.data_address,
            },
            description: CommunicationDescription {
                protocol_version: self.protocol_version,
                subjects: self.subjects,
                command_sets: self.command_sets,
                notification_sets: self.notification_sets,
            },
        }))
    }
}

#[derive(Serialize, Deserialize)]
struct EndpointDisconnectV1;

impl Payload for EndpointDisconnectV1 {
    const MESSAGE_TYPE: MessageType = MessageType::EndpointDisconnect;

    fn from_kind(_: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        Ok(Self)
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::EndpointDisconnect)
    }
}

#[derive(Serialize, Deserialize)]
struct SuccessV1;

impl Payload for SuccessV1 {
    const MESSAGE_TYPE: MessageType = MessageType::Success;

    fn from_kind(_: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        Ok(Self)
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::Success)
    }
}

#[derive(Serialize, Deserialize)]
struct FailureV1 {
    reason: String,
}

impl Payload for FailureV1 {
    const MESSAGE_TYPE: MessageType = MessageType::Failure;

    fn from_kind(kind: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::Failure { reason } => Ok(Self {
                reason: reason.clone(),
            }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::Failure {
            reason: self.reason,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct DownloadRequestV1 {
    token: UploadToken,
}

impl Payload for DownloadRequestV1 {
    const MESSAGE_TYPE: MessageType = MessageType::DownloadRequest;

    fn from_kind(kind: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::DownloadRequest { token } => Ok(Self { token: *token }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::DownloadRequest { token: self.token })
    }
}

#[derive(Serialize, Deserialize)]
struct CommandInvokedV1 {
    command: CommandId,
    parameters: Vec<SerializedObject>,
}

impl Payload for CommandInvokedV1 {
    const MESSAGE_TYPE: MessageType = MessageType::CommandInvoked;

    fn from_kind(kind: &MessageKind, objects: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        let MessageKind::CommandInvoked(invocation) = kind else {
            return Err(Converter::<Self>::wrong_kind(kind));
        };
        let parameters = invocation
            .parameters
            .iter()
            .map(|p| objects.serialize(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            command: invocation.command.clone(),
            parameters,
        })
    }

    fn into_kind(self, objects: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        let parameters = self
            .parameters
            .iter()
            .map(|p| objects.deserialize(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MessageKind::CommandInvoked(CommandInvocation {
            command: self.command,
            parameters,
        }))
    }
}

#[derive(Serialize, Deserialize)]
struct CommandInvokedResponseV1 {
    result: SerializedObject,
}

impl Payload for CommandInvokedResponseV1 {
    const MESSAGE_TYPE: MessageType = MessageType::CommandInvokedResponse;

    fn from_kind(kind: &MessageKind, objects: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::CommandInvokedResponse { result } => Ok(Self {
                result: objects.serialize(result)?,
            }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, objects: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::CommandInvokedResponse {
            result: objects.deserialize(&self.result)?,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct NotificationRaisedV1 {
    notification: NotificationId,
    arguments: SerializedObject,
}

impl Payload for NotificationRaisedV1 {
    const MESSAGE_TYPE: MessageType = MessageType::NotificationRaised;

    fn from_kind(kind: &MessageKind, objects: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        let MessageKind::NotificationRaised(raised) = kind else {
            return Err(Converter::<Self>::wrong_kind(kind));
        };
        Ok(Self {
            notification: raised.notification.clone(),
            arguments: objects.serialize(&raised.arguments)?,
        })
    }

    fn into_kind(self, objects: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::NotificationRaised(NotificationRaised {
            notification: self.notification,
            arguments: objects.deserialize(&self.arguments)?,
        }))
    }
}

#[derive(Serialize, Deserialize)]
struct RegisterForNotificationV1 {
    notification: NotificationId,
}

impl Payload for RegisterForNotificationV1 {
    const MESSAGE_TYPE: MessageType = MessageType::RegisterForNotification;

    fn from_kind(kind: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::RegisterForNotification(notification) => Ok(Self {
                notification: notification.clone(),
            }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::RegisterForNotification(self.notification))
    }
}

#[derive(Serialize, Deserialize)]
struct UnregisterFromNotificationV1 {
    notification: NotificationId,
}

impl Payload for UnregisterFromNotificationV1 {
    const MESSAGE_TYPE: MessageType = MessageType::UnregisterFromNotification;

    fn from_kind(kind: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::UnregisterFromNotification(notification) => Ok(Self {
                notification: notification.clone(),
            }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::UnregisterFromNotification(self.notification))
    }
}

#[derive(Serialize, Deserialize)]
struct EndpointInteractionInformationV1 {
    groups: Vec<SubjectGroup>,
}

impl Payload for EndpointInteractionInformationV1 {
    const MESSAGE_TYPE: MessageType = MessageType::EndpointInteractionInformation;

    fn from_kind(kind: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::EndpointInteractionInformation(groups) => Ok(Self {
                groups: groups.clone(),
            }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::EndpointInteractionInformation(self.groups))
    }
}

#[derive(Serialize, Deserialize)]
struct EndpointInteractionInformationResponseV1 {
    state: InteractionConnectionState,
}

impl Payload for EndpointInteractionInformationResponseV1 {
    const MESSAGE_TYPE: MessageType = MessageType::EndpointInteractionInformationResponse;

    fn from_kind(kind: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::EndpointInteractionInformationResponse(state) => Ok(Self { state: *state }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::EndpointInteractionInformationResponse(self.state))
    }
}

#[derive(Serialize, Deserialize)]
struct ConnectionVerificationV1 {
    custom: Option<SerializedObject>,
}

impl Payload for ConnectionVerificationV1 {
    const MESSAGE_TYPE: MessageType = MessageType::ConnectionVerification;

    fn from_kind(kind: &MessageKind, objects: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::ConnectionVerification(custom) => Ok(Self {
                custom: custom.as_ref().map(|c| objects.serialize(c)).transpose()?,
            }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, objects: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::ConnectionVerification(
            self.custom
                .as_ref()
                .map(|c| objects.deserialize(c))
                .transpose()?,
        ))
    }
}

#[derive(Serialize, Deserialize)]
struct ConnectionVerificationResponseV1 {
    custom: Option<SerializedObject>,
}

impl Payload for ConnectionVerificationResponseV1 {
    const MESSAGE_TYPE: MessageType = MessageType::ConnectionVerificationResponse;

    fn from_kind(kind: &MessageKind, objects: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        match kind {
            MessageKind::ConnectionVerificationResponse(custom) => Ok(Self {
                custom: custom.as_ref().map(|c| objects.serialize(c)).transpose()?,
            }),
            _ => Err(Converter::<Self>::wrong_kind(kind)),
        }
    }

    fn into_kind(self, objects: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::ConnectionVerificationResponse(
            self.custom
                .as_ref()
                .map(|c| objects.deserialize(c))
                .transpose()?,
        ))
    }
}

#[derive(Serialize, Deserialize)]
struct UnknownMessageTypeV1;

impl Payload for UnknownMessageTypeV1 {
    const MESSAGE_TYPE: MessageType = MessageType::UnknownMessageType;

    fn from_kind(_: &MessageKind, _: &ObjectSerializerRegistry) -> Result<Self, ConversionError> {
        Ok(Self)
    }

    fn into_kind(self, _: &ObjectSerializerRegistry) -> Result<MessageKind, ConversionError> {
        Ok(MessageKind::UnknownMessageType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{EndpointId, MessageId};
    use crate::interaction::TypeIdentity;
    use crate::protocol::MessageTranslator;
    use crate::serialization::ObjectValue;

    fn objects() -> Arc<ObjectSerializerRegistry> {
        Arc::new(ObjectSerializerRegistry::with_defaults())
    }

    fn calculator() -> TypeFallback {
        TypeFallback::new(TypeIdentity::new("calc.Calculator", Version::new(1, 0, 0)))
    }

    #[test]
    fn test_every_message_type_has_a_converter() {
        let translator = MessageTranslator::v1(objects());
        for message_type in [
            MessageType::EndpointConnect,
            MessageType::EndpointDisconnect,
            MessageType::Success,
            MessageType::Failure,
            MessageType::DownloadRequest,
            MessageType::CommandInvoked,
            MessageType::CommandInvokedResponse,
            MessageType::NotificationRaised,
            MessageType::RegisterForNotification,
            MessageType::UnregisterFromNotification,
            MessageType::EndpointInteractionInformation,
            MessageType::EndpointInteractionInformationResponse,
            MessageType::ConnectionVerification,
            MessageType::ConnectionVerificationResponse,
            MessageType::UnknownMessageType,
        ] {
            assert!(translator.handles(message_type), "{message_type}");
        }
    }

    #[test]
    fn test_command_invocation_keeps_parameters() {
        let translator = MessageTranslator::v1(objects());
        let message = CommunicationMessage::new(
            EndpointId::new("a"),
            MessageKind::CommandInvoked(CommandInvocation {
                command: CommandId::new(calculator(), "add"),
                parameters: vec![ObjectValue::new(2i32), ObjectValue::new("x".to_string())],
            }),
        );
        let data = translator.from_message(&message);
        assert_eq!(data.data_type, "CommandInvoked");

        let back = translator.to_message(&data);
        let MessageKind::CommandInvoked(invocation) = back.kind() else {
            panic!("expected a command invocation, got {:?}", back.kind());
        };
        assert_eq!(invocation.command, CommandId::new(calculator(), "add"));
        assert_eq!(invocation.parameters[0].downcast_cloned::<i32>(), Some(2));
        assert_eq!(
            invocation.parameters[1].downcast_cloned::<String>(),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_payloadless_data_accepts_missing_payload() {
        let translator = MessageTranslator::v1(objects());
        let data = MessageData {
            id: MessageId::next(),
            sender: EndpointId::new("a"),
            in_response_to: MessageId::next(),
            data_type: "Success".to_string(),
            payload: serde_json::Value::Null,
        };
        assert_eq!(translator.to_message(&data).message_type(), MessageType::Success);
    }

    #[test]
    fn test_malformed_payload_becomes_unknown() {
        let translator = MessageTranslator::v1(objects());
        let data = MessageData {
            id: MessageId::next(),
            sender: EndpointId::new("a"),
            in_response_to: MessageId::NONE,
            data_type: "Failure".to_string(),
            payload: serde_json::json!({ "unexpected": 1 }),
        };
        let message = translator.to_message(&data);
        assert_eq!(message.message_type(), MessageType::UnknownMessageType);
        assert_eq!(message.id(), data.id);
    }

    #[test]
    fn test_interaction_state_round_trip() {
        let translator = MessageTranslator::v1(objects());
        let message = CommunicationMessage::new(
            EndpointId::new("a"),
            MessageKind::EndpointInteractionInformationResponse(
                InteractionConnectionState::NotDesired,
            ),
        );
        let back = translator.to_message(&translator.from_message(&message));
        assert!(matches!(
            back.kind(),
            MessageKind::EndpointInteractionInformationResponse(
                InteractionConnectionState::NotDesired
            )
        ));
    }
}
