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

//! Protocol layer error types.

use crate::id::{EndpointId, Version};
use crate::protocol::{MessageType, UploadToken};
use crate::serialization::ObjectSerializationError;
use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while converting between messages and wire data.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The converter does not handle the given data type.
    #[error("converter for '{expected}' cannot convert data of type '{data_type}'")]
    UnknownMessageType {
        /// Data type that was offered.
        data_type: String,
        /// Data type the converter handles.
        expected: &'static str,
    },

    /// The payload does not match the data type's schema.
    #[error("malformed '{data_type}' payload: {source}")]
    Payload {
        /// Data type being converted.
        data_type: &'static str,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An object carried by the message could not be converted.
    #[error(transparent)]
    Object(#[from] ObjectSerializationError),
}

/// Errors raised by the protocol layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// All send attempts faulted.
    #[error("failed to send to {address} after {attempts} attempt(s): {source}")]
    FailedToSend {
        /// Address of the remote receiving endpoint.
        address: String,
        /// Number of attempts made.
        attempts: u32,
        /// Fault of the last attempt.
        #[source]
        source: TransportError,
    },

    /// No session exists for the endpoint.
    #[error("no connection session for endpoint {endpoint}")]
    NoSession {
        /// The endpoint.
        endpoint: EndpointId,
    },

    /// The endpoint does not accept data.
    #[error("endpoint {endpoint} has no data channel")]
    NoDataChannel {
        /// The endpoint.
        endpoint: EndpointId,
    },

    /// No translator exists for a protocol version.
    #[error("unsupported protocol version {version}")]
    UnsupportedProtocolVersion {
        /// The version.
        version: Version,
    },

    /// A response did not arrive in time.
    #[error("no response within {duration:?}")]
    Timeout {
        /// The response timeout.
        duration: Duration,
    },

    /// The remote answered with a message of an unexpected type.
    #[error("expected a {expected} response, received {actual}")]
    UnexpectedResponse {
        /// The response type that was expected.
        expected: MessageType,
        /// The response type that arrived.
        actual: MessageType,
    },

    /// Data registered for upload could not be read.
    #[error("upload {token} is not available: {source}")]
    UploadUnavailable {
        /// Token of the upload.
        token: UploadToken,
        /// The read failure.
        #[source]
        source: std::io::Error,
    },

    /// The wait for a response was abandoned.
    #[error("response wait was cancelled")]
    ResponseCancelled,

    /// The layer has not been started, or has been stopped.
    #[error("protocol layer is not running")]
    NotRunning,

    /// The layer was started twice.
    #[error("protocol layer is already running")]
    AlreadyRunning,

    /// A binding operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Returns `true` if the error is a send failure after exhausted retries.
    #[must_use]
    pub const fn is_failed_to_send(&self) -> bool {
        matches!(self, Self::FailedToSend { .. })
    }

    /// Returns `true` if the error is a response timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
