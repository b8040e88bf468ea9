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

//! Top-level error type.
//!
//! Every layer reports its own error enum; [`CommError`] composes them for
//! callers that work through the
//! [`CommunicationEndpoint`](crate::endpoint::CommunicationEndpoint) facade.
//!
//! # Examples
//!
//! ```rust
//! use peercomm::CommError;
//! use peercomm::transport::TransportError;
//!
//! let error: CommError = TransportError::Closed.into();
//! assert!(error.is_transport_error());
//! ```

use crate::config::ConfigurationError;
use crate::interaction::{CommandError, InteractionError};
use crate::protocol::{ConversionError, ProtocolError};
use crate::serialization::ObjectSerializationError;
use crate::transport::TransportError;
use thiserror::Error;

/// Top-level error for endpoint operations.
#[derive(Debug, Error)]
pub enum CommError {
    /// A channel binding failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// An object value could not be serialized.
    #[error(transparent)]
    Serialization(#[from] ObjectSerializationError),

    /// The protocol layer failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The interaction layer failed.
    #[error(transparent)]
    Interaction(#[from] InteractionError),

    /// A command invocation failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The endpoint configuration is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl CommError {
    /// Returns `true` if the failure originates in a channel binding.
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Protocol(e) => matches!(e, ProtocolError::Transport(_) | ProtocolError::FailedToSend { .. }),
            Self::Interaction(InteractionError::Protocol(e)) => {
                matches!(e, ProtocolError::Transport(_) | ProtocolError::FailedToSend { .. })
            }
            Self::Command(e) => e.is_transport(),
            _ => false,
        }
    }

    /// Returns `true` if retrying the operation later may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Protocol(e) => e.is_timeout() || e.is_failed_to_send(),
            Self::Interaction(InteractionError::Timeout { .. } | InteractionError::NotAvailable { .. }) => true,
            Self::Command(e) => e.is_transport() || matches!(e, CommandError::Timeout { .. }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transport_classification() {
        let error = CommError::from(ProtocolError::FailedToSend {
            address: "memory://b/messages".to_string(),
            attempts: 2,
            source: TransportError::Closed,
        });
        assert!(error.is_transport_error());
        assert!(error.is_recoverable());

        let error = CommError::from(ConfigurationError::new("key", "bad"));
        assert!(!error.is_transport_error());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_command_timeout_is_recoverable() {
        let error = CommError::from(CommandError::Timeout {
            duration: Duration::from_secs(1),
        });
        assert!(error.is_recoverable());
        assert!(!error.is_transport_error());
    }
}
