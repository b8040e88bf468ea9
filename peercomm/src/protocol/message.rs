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

//! In-memory message taxonomy.
//!
//! A [`CommunicationMessage`] is a [`MessageHeader`] plus a [`MessageKind`].
//! Messages are translated to and from version specific
//! [`MessageData`](crate::protocol::MessageData) at the channel boundary, so
//! nothing in this module is tied to a wire format.

use crate::discovery::ProtocolInformation;
use crate::id::{EndpointId, MessageId};
use crate::interaction::{CommandId, InteractionConnectionState, NotificationId, SubjectGroup};
use crate::protocol::{CommunicationDescription, UploadToken};
use crate::serialization::ObjectValue;
use std::fmt;
use url::Url;

/// Header fields shared by every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Id of the message.
    pub id: MessageId,
    /// Endpoint that sent the message.
    pub sender: EndpointId,
    /// Id of the message this one answers, or [`MessageId::NONE`].
    pub in_response_to: MessageId,
}

/// Body of an endpoint connect message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConnect {
    /// Address of the sender's discovery endpoint.
    pub discovery_address: Url,
    /// Where the sender receives messages and data.
    pub protocol: ProtocolInformation,
    /// What the sender offers.
    pub description: CommunicationDescription,
}

/// Body of a command invocation.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    /// The command to run.
    pub command: CommandId,
    /// Positional parameters.
    pub parameters: Vec<ObjectValue>,
}

/// Body of a raised notification.
#[derive(Debug, Clone)]
pub struct NotificationRaised {
    /// The notification that fired.
    pub notification: NotificationId,
    /// Its arguments.
    pub arguments: ObjectValue,
}

/// Fieldless tag of a [`MessageKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    /// See [`MessageKind::EndpointConnect`].
    EndpointConnect,
    /// See [`MessageKind::EndpointDisconnect`].
    EndpointDisconnect,
    /// See [`MessageKind::Success`].
    Success,
    /// See [`MessageKind::Failure`].
    Failure,
    /// See [`MessageKind::DownloadRequest`].
    DownloadRequest,
    /// See [`MessageKind::CommandInvoked`].
    CommandInvoked,
    /// See [`MessageKind::CommandInvokedResponse`].
    CommandInvokedResponse,
    /// See [`MessageKind::NotificationRaised`].
    NotificationRaised,
    /// See [`MessageKind::RegisterForNotification`].
    RegisterForNotification,
    /// See [`MessageKind::UnregisterFromNotification`].
    UnregisterFromNotification,
    /// See [`MessageKind::EndpointInteractionInformation`].
    EndpointInteractionInformation,
    /// See [`MessageKind::EndpointInteractionInformationResponse`].
    EndpointInteractionInformationResponse,
    /// See [`MessageKind::ConnectionVerification`].
    ConnectionVerification,
    /// See [`MessageKind::ConnectionVerificationResponse`].
    ConnectionVerificationResponse,
    /// See [`MessageKind::UnknownMessageType`].
    UnknownMessageType,
}

impl MessageType {
    /// Name of the message type, also used as the v1 data type tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EndpointConnect => "EndpointConnect",
            Self::EndpointDisconnect => "EndpointDisconnect",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::DownloadRequest => "DownloadRequest",
            Self::CommandInvoked => "CommandInvoked",
            Self::CommandInvokedResponse => "CommandInvokedResponse",
            Self::NotificationRaised => "NotificationRaised",
            Self::RegisterForNotification => "RegisterForNotification",
            Self::UnregisterFromNotification => "UnregisterFromNotification",
            Self::EndpointInteractionInformation => "EndpointInteractionInformation",
            Self::EndpointInteractionInformationResponse => {
                "EndpointInteractionInformationResponse"
            }
            Self::ConnectionVerification => "ConnectionVerification",
            Self::ConnectionVerificationResponse => "ConnectionVerificationResponse",
            Self::UnknownMessageType => "UnknownMessageType",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body of a message.
#[derive(Debug, Clone)]
pub enum MessageKind {
    /// Asks the receiver to accept a connection.
    EndpointConnect(EndpointConnect),
    /// Tells the receiver the sender is going away.
    EndpointDisconnect,
    /// Generic positive response.
    Success,
    /// Generic negative response.
    Failure {
        /// Why the request failed.
        reason: String,
    },
    /// Asks the receiver to send the data registered under a token.
    DownloadRequest {
        /// Token of the upload.
        token: UploadToken,
    },
    /// Runs a command on the receiver.
    CommandInvoked(CommandInvocation),
    /// Result value of a command.
    CommandInvokedResponse {
        /// The returned value.
        result: ObjectValue,
    },
    /// A notification fired on the sender.
    NotificationRaised(NotificationRaised),
    /// Subscribes the sender to a notification of the receiver.
    RegisterForNotification(NotificationId),
    /// Unsubscribes the sender from a notification of the receiver.
    UnregisterFromNotification(NotificationId),
    /// The sender's subject groups.
    EndpointInteractionInformation(Vec<SubjectGroup>),
    /// The receiver's decision about interacting with the sender.
    EndpointInteractionInformationResponse(InteractionConnectionState),
    /// Liveness probe with an optional custom payload.
    ConnectionVerification(Option<ObjectValue>),
    /// Answer to a liveness probe.
    ConnectionVerificationResponse(Option<ObjectValue>),
    /// The receiver did not understand a message.
    UnknownMessageType,
}

impl MessageKind {
    /// The tag of this kind.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::EndpointConnect(_) => MessageType::EndpointConnect,
            Self::EndpointDisconnect => MessageType::EndpointDisconnect,
            Self::Success => MessageType::Success,
            Self::Failure { .. } => MessageType::Failure,
            Self::DownloadRequest { .. } => MessageType::DownloadRequest,
            Self::CommandInvoked(_) => MessageType::CommandInvoked,
            Self::CommandInvokedResponse { .. } => MessageType::CommandInvokedResponse,
            Self::NotificationRaised(_) => MessageType::NotificationRaised,
            Self::RegisterForNotification(_) => MessageType::RegisterForNotification,
            Self::UnregisterFromNotification(_) => MessageType::UnregisterFromNotification,
            Self::EndpointInteractionInformation(_) => MessageType::EndpointInteractionInformation,
            Self::EndpointInteractionInformationResponse(_) => {
                MessageType::EndpointInteractionInformationResponse
            }
            Self::ConnectionVerification(_) => MessageType::ConnectionVerification,
            Self::ConnectionVerificationResponse(_) => MessageType::ConnectionVerificationResponse,
            Self::UnknownMessageType => MessageType::UnknownMessageType,
        }
    }

    /// Shorthand for [`MessageKind::Failure`].
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }
}

/// A message between two endpoints.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::EndpointId;
/// use peercomm::protocol::{CommunicationMessage, MessageKind, MessageType};
///
/// let request = CommunicationMessage::new(EndpointId::new("a"), MessageKind::EndpointDisconnect);
/// assert!(!request.is_response());
///
/// let reply = CommunicationMessage::response_to(&request, EndpointId::new("b"), MessageKind::Success);
/// assert_eq!(reply.in_response_to(), request.id());
/// assert_eq!(reply.message_type(), MessageType::Success);
/// ```
#[derive(Debug, Clone)]
pub struct CommunicationMessage {
    header: MessageHeader,
    kind: MessageKind,
}

impl CommunicationMessage {
    /// Creates a message with a fresh id that answers nothing.
    #[must_use]
    pub fn new(sender: EndpointId, kind: MessageKind) -> Self {
        Self::with_header(
            MessageHeader {
                id: MessageId::next(),
                sender,
                in_response_to: MessageId::NONE,
            },
            kind,
        )
    }

    /// Creates a message with a fresh id answering `request`.
    #[must_use]
    pub fn response_to(request: &CommunicationMessage, sender: EndpointId, kind: MessageKind) -> Self {
        Self::with_header(
            MessageHeader {
                id: MessageId::next(),
                sender,
                in_response_to: request.id(),
            },
            kind,
        )
    }

    /// Creates a message from an explicit header.
    #[must_use]
    pub fn with_header(header: MessageHeader, kind: MessageKind) -> Self {
        Self { header, kind }
    }

    /// The header.
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// Id of the message.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.header.id
    }

    /// Endpoint that sent the message.
    #[must_use]
    pub fn sender(&self) -> &EndpointId {
        &self.header.sender
    }

    /// Id of the message this one answers.
    #[must_use]
    pub fn in_response_to(&self) -> MessageId {
        self.header.in_response_to
    }

    /// Returns `true` if this message answers another.
    #[must_use]
    pub fn is_response(&self) -> bool {
        !self.header.in_response_to.is_none()
    }

    /// The body.
    #[must_use]
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// Consumes the message, returning the body.
    #[must_use]
    pub fn into_kind(self) -> MessageKind {
        self.kind
    }

    /// Tag of the body.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.kind.message_type()
    }
}
