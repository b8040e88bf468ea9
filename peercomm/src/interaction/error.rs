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

//! Interaction layer error types.

use crate::id::EndpointId;
use crate::protocol::{MessageType, ProtocolError};
use crate::serialization::ObjectSerializationError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving or wiring command and notification sets.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// No registered set matches a type referenced by a message.
    #[error("unable to load proxy type '{type_name}'")]
    UnableToLoadProxyType {
        /// The unresolved type.
        type_name: String,
    },

    /// The set exists but has no such command.
    #[error("command set '{type_name}' has no command '{member}'")]
    UnknownCommand {
        /// The set.
        type_name: String,
        /// The missing member.
        member: String,
    },

    /// The set exists but has no such notification.
    #[error("notification set '{type_name}' has no notification '{member}'")]
    UnknownNotification {
        /// The set.
        type_name: String,
        /// The missing member.
        member: String,
    },

    /// A set with the same identity is already registered.
    #[error("'{type_name}' is already registered")]
    AlreadyRegistered {
        /// The duplicate type.
        type_name: String,
    },

    /// The endpoint is not connected, does not want to interact, or does
    /// not provide the set.
    #[error("'{type_name}' is not available from endpoint {endpoint}")]
    NotAvailable {
        /// The remote endpoint.
        endpoint: EndpointId,
        /// The requested set.
        type_name: String,
    },

    /// The interaction exchange did not finish in time.
    #[error("interaction with {endpoint} was not decided within {duration:?}")]
    Timeout {
        /// The remote endpoint.
        endpoint: EndpointId,
        /// How long we waited.
        duration: Duration,
    },

    /// A protocol operation failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failure of a command, as seen by the caller or raised by the command.
///
/// # Examples
///
/// ```rust
/// use peercomm::interaction::CommandError;
///
/// let error = CommandError::failed("division by zero");
/// assert_eq!(error.to_string(), "command failed: division by zero");
/// ```
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command ran and failed, locally or on the remote.
    #[error("command failed: {reason}")]
    Failed {
        /// Reason given by the command.
        reason: String,
    },

    /// A parameter is missing or of the wrong type.
    #[error("invalid argument {index}: {reason}")]
    InvalidArgument {
        /// Zero based parameter index.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The invocation could not be delivered.
    #[error("failed to send command: {0}")]
    FailedToSend(#[source] ProtocolError),

    /// No response arrived in time.
    #[error("no command response within {duration:?}")]
    Timeout {
        /// The response timeout.
        duration: Duration,
    },

    /// The remote answered with a message that is not a command response.
    #[error("unexpected command response {actual}")]
    UnexpectedResponse {
        /// Type of the response.
        actual: MessageType,
    },

    /// The result has another type than the caller expects.
    #[error("command returned '{actual}', expected '{expected}'")]
    UnexpectedResult {
        /// Type expected by the caller.
        expected: &'static str,
        /// Type returned.
        actual: &'static str,
    },

    /// The target endpoint is not connected.
    #[error("endpoint {endpoint} is not connected")]
    EndpointNotConnected {
        /// The endpoint.
        endpoint: EndpointId,
    },

    /// A parameter or result cannot be serialized.
    #[error(transparent)]
    Serialization(#[from] ObjectSerializationError),
}

impl CommandError {
    /// Shorthand for [`CommandError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure happened before the remote saw the
    /// invocation or while waiting for its answer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::FailedToSend(_) | Self::Timeout { .. })
    }
}

impl From<ProtocolError> for CommandError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Timeout { duration } => Self::Timeout { duration },
            other => Self::FailedToSend(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[test]
    fn test_protocol_timeout_maps_to_command_timeout() {
        let error: CommandError = ProtocolError::Timeout {
            duration: Duration::from_millis(5),
        }
        .into();
        assert!(matches!(error, CommandError::Timeout { .. }));
        assert!(error.is_transport());
    }

    #[test]
    fn test_send_exhaustion_maps_to_failed_to_send() {
        let error: CommandError = ProtocolError::FailedToSend {
            address: "memory://x/message".to_string(),
            attempts: 2,
            source: TransportError::Closed,
        }
        .into();
        assert!(matches!(error, CommandError::FailedToSend(_)));
        assert!(!CommandError::failed("x").is_transport());
    }
}
