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

//! Discovery sources.

use crate::discovery::{DiscoveryChannelTranslator, EndpointInformation};
use crate::id::EndpointId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use url::Url;

const EVENT_CAPACITY: usize = 64;

/// Change in the set of reachable endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// An endpoint became reachable and its protocol version is negotiated.
    EndpointAvailable(EndpointInformation),
    /// An endpoint is no longer reachable.
    EndpointUnavailable(EndpointId),
}

/// Something that finds endpoints and announces them.
pub trait DiscoverySource: Send + Sync {
    /// Subscribes to the events raised from now on.
    fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent>;
}

/// Discovery driven by explicit announcements.
///
/// The hosting application tells the source about endpoints it learned of
/// through other means. Announcements never fail: an endpoint that cannot be
/// negotiated with is simply not reported.
///
/// # Examples
///
/// ```rust,no_run
/// use peercomm::discovery::{DiscoverySource, ManualDiscoverySource};
/// use peercomm::id::EndpointId;
///
/// # async fn example(source: ManualDiscoverySource) {
/// let mut events = source.subscribe();
/// source
///     .recently_connected_endpoint(
///         EndpointId::new("node-b"),
///         "memory://b/discovery/1.0.0".parse().unwrap(),
///     )
///     .await;
/// let event = events.recv().await;
/// # }
/// ```
pub struct ManualDiscoverySource {
    translators: Vec<Arc<DiscoveryChannelTranslator>>,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl ManualDiscoverySource {
    /// Creates a source. Translators are tried in order, newest discovery
    /// version first.
    pub fn new(mut translators: Vec<Arc<DiscoveryChannelTranslator>>) -> Self {
        translators.sort_by(|a, b| b.discovery_version().cmp(&a.discovery_version()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            translators,
            events,
        }
    }

    /// Announces an endpoint reachable through the discovery endpoint at
    /// `address`.
    pub async fn recently_connected_endpoint(&self, id: EndpointId, address: Url) {
        for translator in &self.translators {
            if let Some(protocol) = translator.from_uri(&address).await {
                info!(endpoint = %id, version = %protocol.version, "endpoint available");
                self.publish(DiscoveryEvent::EndpointAvailable(EndpointInformation {
                    id,
                    discovery_address: address,
                    protocol,
                }));
                return;
            }
        }
        debug!(endpoint = %id, %address, "no translator could negotiate with announced endpoint");
    }

    /// Announces that an endpoint went away.
    pub fn recently_disconnected_endpoint(&self, id: EndpointId) {
        info!(endpoint = %id, "endpoint unavailable");
        self.publish(DiscoveryEvent::EndpointUnavailable(id));
    }

    fn publish(&self, event: DiscoveryEvent) {
        if self.events.send(event).is_err() {
            debug!("discovery event dropped, no subscribers");
        }
    }
}

impl DiscoverySource for ManualDiscoverySource {
    fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for ManualDiscoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualDiscoverySource")
            .field("translators", &self.translators)
            .finish_non_exhaustive()
    }
}
