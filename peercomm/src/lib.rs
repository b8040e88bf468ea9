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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! PeerComm is organized into several layers:
//!
//! - **[`transport`]**: channel bindings (in-memory, TCP)
//! - **[`serialization`]**: frame encoding and the object serializer registry
//! - **[`discovery`]**: discovery endpoints and protocol version negotiation
//! - **[`protocol`]**: messages, versioned converters, restoring send
//!   endpoints, the protocol layer and the handshake
//! - **[`interaction`]**: subject groups, command sets and notification sets
//! - **[`endpoint`]**: the [`CommunicationEndpoint`] facade and its builder
//! - **[`config`]**: the configuration store seam

pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod id;
pub mod interaction;
pub mod protocol;
pub mod serialization;
pub mod transport;

#[cfg(feature = "derive")]
pub use peercomm_macros::{command_set, notification_set};

pub use async_trait::async_trait;

pub use endpoint::{CommunicationEndpoint, CommunicationEndpointBuilder, EndpointConfig, EndpointEvent};
pub use error::CommError;
pub use id::{CommunicationSubject, EndpointId, MessageId, Version};
pub use interaction::{CommandError, InteractionConnectionState, InteractionError, Notification};
pub use protocol::{HandshakeState, ProtocolError};
pub use transport::TransportError;
