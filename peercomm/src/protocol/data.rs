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

//! Wire data objects handed to channels.
//!
//! [`MessageData`] is the per-version wire form of a
//! [`CommunicationMessage`](crate::protocol::CommunicationMessage);
//! [`DataTransfer`] carries raw bytes over data channels.

use crate::id::{EndpointId, MessageId};
use crate::protocol::UploadToken;
use serde::{Deserialize, Serialize};

/// Data type tag of [`MessageData`] produced for unknown or unconvertible
/// messages.
pub const UNKNOWN_MESSAGE_TYPE: &str = "UnknownMessageType";

/// Wire form of one message.
///
/// The header fields are always present; `data_type` selects the converter
/// and `payload` holds the version specific body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    /// Id of the message.
    pub id: MessageId,
    /// Endpoint that sent the message.
    pub sender: EndpointId,
    /// Id of the message this one answers, or [`MessageId::NONE`].
    pub in_response_to: MessageId,
    /// Converter selector.
    pub data_type: String,
    /// Version specific body.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl MessageData {
    /// Creates the "unknown message type" data for the given header.
    ///
    /// Only the header survives; the body of whatever could not be converted
    /// is dropped.
    #[must_use]
    pub fn unknown(id: MessageId, sender: EndpointId, in_response_to: MessageId) -> Self {
        Self {
            id,
            sender,
            in_response_to,
            data_type: UNKNOWN_MESSAGE_TYPE.to_string(),
            payload: serde_json::Value::Null,
        }
    }

    /// Returns `true` if this is unknown message type data.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.data_type == UNKNOWN_MESSAGE_TYPE
    }
}

/// A block of raw data sent over a data channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransfer {
    /// Endpoint that sent the data.
    pub sender: EndpointId,
    /// Endpoint the data is meant for.
    pub receiver: EndpointId,
    /// Id of the download request this answers.
    pub in_response_to: MessageId,
    /// Upload token that identified the data.
    pub token: Option<UploadToken>,
    /// The data itself.
    pub data: Vec<u8>,
}
