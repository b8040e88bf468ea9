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

//! Channel binding error types.
//!
//! A [`TransportError`] means a single channel faulted. The protocol layer
//! reacts by discarding the channel and building a fresh one, so none of
//! these errors is fatal to an endpoint on its own.

use crate::serialization::CodecError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by channel bindings.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish a connection to the remote address.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// Address that was dialed.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An established connection was lost.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Description of the loss.
        reason: String,
        /// The underlying I/O error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// An operation exceeded its time limit.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// The limit that was exceeded.
        duration: Duration,
    },

    /// A binding was given an address it cannot serve.
    #[error("unsupported address '{address}': {reason}")]
    UnsupportedAddress {
        /// The rejected address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Nothing is hosted at the address.
    #[error("no endpoint is hosted at {address}")]
    EndpointNotHosted {
        /// The address that was looked up.
        address: String,
    },

    /// The channel has been closed.
    #[error("channel is closed")]
    Closed,

    /// Failed to bind a listener.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        /// The bind address.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The remote side reported a failure while handling the request.
    #[error("remote fault: {reason}")]
    Remote {
        /// Reason reported by the remote.
        reason: String,
    },

    /// The remote answered with a reply of the wrong kind.
    #[error("unexpected reply: expected {expected}")]
    UnexpectedReply {
        /// The reply that was expected.
        expected: &'static str,
    },

    /// Frame encoding or stream I/O failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// Returns `true` if retrying on a fresh channel may succeed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use peercomm::transport::TransportError;
    /// use std::time::Duration;
    ///
    /// assert!(TransportError::Timeout { duration: Duration::from_secs(1) }.is_recoverable());
    /// assert!(!TransportError::Closed.is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. }
            | TransportError::ConnectionLost { .. }
            | TransportError::Timeout { .. }
            | TransportError::EndpointNotHosted { .. }
            | TransportError::Remote { .. } => true,

            TransportError::Codec(CodecError::Io(source)) => !matches!(
                source.kind(),
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput
            ),

            TransportError::UnsupportedAddress { .. }
            | TransportError::Closed
            | TransportError::BindFailed { .. }
            | TransportError::UnexpectedReply { .. }
            | TransportError::Codec(_) => false,
        }
    }

    /// Shorthand for a [`TransportError::ConnectionLost`] without a source.
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        TransportError::ConnectionLost {
            reason: reason.into(),
            source: None,
        }
    }
}
