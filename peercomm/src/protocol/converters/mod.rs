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

//! Versioned message converters.
//!
//! Each wire protocol version has a set of [`MessageConverter`]s, one per
//! message type, bundled in a [`MessageTranslator`]. Converters are strict:
//! [`MessageConverter::to_message`] refuses data of another type. The
//! translator is forgiving: anything it cannot convert becomes an
//! "unknown message type" message or data object that keeps the header, so a
//! peer speaking a richer dialect never faults a channel.

pub mod v1;

use crate::id::Version;
use crate::protocol::{
    CommunicationMessage, ConversionError, MessageData, MessageHeader, MessageKind, MessageType,
};
use crate::serialization::ObjectSerializerRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Converts one message type between its in-memory and wire forms.
pub trait MessageConverter: Send + Sync {
    /// The message type handled.
    fn message_type(&self) -> MessageType;

    /// The wire data type tag handled.
    fn data_type(&self) -> &'static str;

    /// Converts wire data into a message.
    ///
    /// Data of any other type yields [`ConversionError::UnknownMessageType`].
    fn to_message(&self, data: &MessageData) -> Result<CommunicationMessage, ConversionError>;

    /// Converts a message into wire data.
    ///
    /// Messages of any other type, and messages whose content cannot be
    /// serialized, yield unknown message type data with the same header.
    fn from_message(&self, message: &CommunicationMessage) -> MessageData;
}

/// All converters of one protocol version.
pub struct MessageTranslator {
    version: Version,
    by_data_type: HashMap<&'static str, Arc<dyn MessageConverter>>,
    by_message_type: HashMap<MessageType, Arc<dyn MessageConverter>>,
}

impl MessageTranslator {
    /// Creates a translator from a converter set.
    pub fn new(version: Version, converters: Vec<Arc<dyn MessageConverter>>) -> Self {
        let mut by_data_type = HashMap::with_capacity(converters.len());
        let mut by_message_type = HashMap::with_capacity(converters.len());
        for converter in converters {
            by_data_type.insert(converter.data_type(), converter.clone());
            by_message_type.insert(converter.message_type(), converter);
        }
        Self {
            version,
            by_data_type,
            by_message_type,
        }
    }

    /// The translator for protocol version 1.0.0.
    #[must_use]
    pub fn v1(objects: Arc<ObjectSerializerRegistry>) -> Self {
        Self::new(v1::VERSION, v1::converters(objects))
    }

    /// The protocol version translated.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns `true` if a converter exists for the message type.
    #[must_use]
    pub fn handles(&self, message_type: MessageType) -> bool {
        self.by_message_type.contains_key(&message_type)
    }

    /// Converts wire data into a message, falling back to
    /// [`MessageKind::UnknownMessageType`].
    #[must_use]
    pub fn to_message(&self, data: &MessageData) -> CommunicationMessage {
        let Some(converter) = self.by_data_type.get(data.data_type.as_str()) else {
            warn!(data_type = %data.data_type, message_id = %data.id, "no converter for data type");
            return unknown_message(data);
        };
        match converter.to_message(data) {
            Ok(message) => message,
            Err(e) => {
                warn!(data_type = %data.data_type, message_id = %data.id, error = %e, "failed to convert message data");
                unknown_message(data)
            }
        }
    }

    /// Converts a message into wire data, falling back to unknown message
    /// type data.
    #[must_use]
    pub fn from_message(&self, message: &CommunicationMessage) -> MessageData {
        match self.by_message_type.get(&message.message_type()) {
            Some(converter) => converter.from_message(message),
            None => {
                warn!(message_type = %message.message_type(), version = %self.version, "no converter for message type");
                unknown_data(message)
            }
        }
    }
}

impl std::fmt::Debug for MessageTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTranslator")
            .field("version", &self.version)
            .field("converters", &self.by_data_type.len())
            .finish()
    }
}

/// Unknown message type message carrying the header of `data`.
#[must_use]
pub fn unknown_message(data: &MessageData) -> CommunicationMessage {
    CommunicationMessage::with_header(
        MessageHeader {
            id: data.id,
            sender: data.sender.clone(),
            in_response_to: data.in_response_to,
        },
        MessageKind::UnknownMessageType,
    )
}

/// Unknown message type data carrying the header of `message`.
#[must_use]
pub fn unknown_data(message: &CommunicationMessage) -> MessageData {
    MessageData::unknown(
        message.id(),
        message.sender().clone(),
        message.in_response_to(),
    )
}
