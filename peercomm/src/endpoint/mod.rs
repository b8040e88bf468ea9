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

//! Endpoint layer for PeerComm.
//!
//! This module wires the protocol layer, the handshake conductor and the
//! interaction layer of one local endpoint into a single
//! [`CommunicationEndpoint`].
//!
//! # Overview
//!
//! - **[`CommunicationEndpointBuilder`]**: declares subjects, command sets and
//!   notification sets, then starts the endpoint
//! - **[`CommunicationEndpoint`]**: connects to peers and hands out proxies
//! - **[`EndpointConfig`]**: retries, timeouts and discovery versions
//! - **[`EndpointEvent`]**: connection and interaction events
//!
//! # Lifecycle
//!
//! ```text
//! build() ──> hosted ──connect_to / watch_discovery──> handshake
//!                                                        │
//!                       proxies <── interaction decided <┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use peercomm::endpoint::CommunicationEndpointBuilder;
//! use peercomm::transport::MemoryNetwork;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), peercomm::CommError> {
//! let network = Arc::new(MemoryNetwork::new());
//! let a = CommunicationEndpointBuilder::new()
//!     .with_id("a")
//!     .with_memory_network(network.clone())
//!     .with_subject("chat")
//!     .build()
//!     .await?;
//! let b = CommunicationEndpointBuilder::new()
//!     .with_id("b")
//!     .with_memory_network(network)
//!     .with_subject("chat")
//!     .build()
//!     .await?;
//!
//! let b_info = b.local_information().clone();
//! a.connect_to(b_info.id.clone(), b_info.discovery_address).await;
//! # a.shutdown().await;
//! # b.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
#[allow(clippy::module_inception)]
mod endpoint;
mod events;

pub use builder::CommunicationEndpointBuilder;
pub use config::EndpointConfig;
pub use endpoint::CommunicationEndpoint;
pub use events::EndpointEvent;
