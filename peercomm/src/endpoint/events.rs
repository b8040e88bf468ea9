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

//! Events raised by a communication endpoint.

use crate::id::EndpointId;
use crate::interaction::{InteractionConnectionState, InteractionEvent};
use crate::protocol::{ConnectedEndpoint, ConnectionEvent};

/// Something that happened to a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// The handshake with an endpoint completed.
    Connected(ConnectedEndpoint),
    /// An endpoint was refused, or refused us.
    Rejected(EndpointId),
    /// A connected endpoint went away.
    Disconnected(EndpointId),
    /// We decided whether to interact with an endpoint.
    InteractionDecided {
        /// The remote endpoint.
        endpoint: EndpointId,
        /// Our decision.
        state: InteractionConnectionState,
    },
    /// An endpoint told us whether it wants to interact with us.
    RemoteInteractionDecided {
        /// The remote endpoint.
        endpoint: EndpointId,
        /// Its decision.
        state: InteractionConnectionState,
    },
}

impl EndpointEvent {
    /// The remote endpoint the event is about.
    #[must_use]
    pub fn endpoint(&self) -> &EndpointId {
        match self {
            Self::Connected(connected) => &connected.id,
            Self::Rejected(id) | Self::Disconnected(id) => id,
            Self::InteractionDecided { endpoint, .. } | Self::RemoteInteractionDecided { endpoint, .. } => endpoint,
        }
    }
}

impl From<ConnectionEvent> for EndpointEvent {
    fn from(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::EndpointConnected(connected) => Self::Connected(connected),
            ConnectionEvent::EndpointRejected(id) => Self::Rejected(id),
            ConnectionEvent::EndpointDisconnected(id) => Self::Disconnected(id),
        }
    }
}

impl From<InteractionEvent> for EndpointEvent {
    fn from(event: InteractionEvent) -> Self {
        match event {
            InteractionEvent::Decided { endpoint, state } => Self::InteractionDecided { endpoint, state },
            InteractionEvent::RemoteDecided { endpoint, state } => {
                Self::RemoteInteractionDecided { endpoint, state }
            }
        }
    }
}
