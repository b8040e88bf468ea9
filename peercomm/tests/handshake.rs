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

//! Handshake integration tests over the in-memory binding.

mod common;

use common::{eventually, init_tracing, memory_builder};
use peercomm::discovery::ProtocolInformation;
use peercomm::id::EndpointId;
use peercomm::protocol::{CommunicationMessage, EndpointConnect, MessageKind};
use peercomm::transport::MemoryNetwork;
use peercomm::{EndpointEvent, HandshakeState, InteractionConnectionState};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[tokio::test]
async fn test_endpoints_sharing_a_subject_connect() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("calc").build().await.unwrap();
    let b = memory_builder(&network, "b")
        .with_subject("calc")
        .with_subject("log")
        .build()
        .await
        .unwrap();
    let mut events = b.subscribe();

    let info = b.local_information().clone();
    a.connect_to(info.id.clone(), info.discovery_address).await;

    assert!(eventually(Duration::from_secs(5), || a.handshake_state(b.id()) == HandshakeState::Connected).await);
    assert!(eventually(Duration::from_secs(5), || b.handshake_state(a.id()) == HandshakeState::Connected).await);
    assert_eq!(a.connected_endpoints(), vec![b.id().clone()]);
    assert_eq!(b.connected_endpoints(), vec![a.id().clone()]);

    let connected = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(EndpointEvent::Connected(c)) = events.recv().await {
                return c;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(&connected.id, a.id());

    let decided = a.wait_for_interaction(b.id(), Duration::from_secs(5)).await.unwrap();
    assert_eq!(decided, InteractionConnectionState::Desired);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_endpoint_without_shared_subject_is_rejected() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("calc").build().await.unwrap();
    let c = memory_builder(&network, "c").with_subject("other").build().await.unwrap();

    let info = a.local_information().clone();
    let state = c.connect_to(info.id.clone(), info.discovery_address).await;

    assert_eq!(state, HandshakeState::Rejected);
    assert_eq!(c.handshake_state(a.id()), HandshakeState::Rejected);
    assert_eq!(a.handshake_state(c.id()), HandshakeState::Rejected);
    assert!(a.connected_endpoints().is_empty());
    assert!(c.connected_endpoints().is_empty());
    assert!(c.interaction_state(a.id()).is_none());

    a.shutdown().await;
    c.shutdown().await;
}

#[tokio::test]
async fn test_unknown_discovery_address_leaves_endpoint_unconnected() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("calc").build().await.unwrap();

    let state = a
        .connect_to(EndpointId::new("ghost"), "memory://ghost/discovery/1.0.0".parse().unwrap())
        .await;

    assert_eq!(state, HandshakeState::Unconnected);
    assert_eq!(a.handshake_state(&EndpointId::new("ghost")), HandshakeState::Unconnected);
    a.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_notifies_the_remote() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("calc").build().await.unwrap();
    let b = memory_builder(&network, "b").with_subject("calc").build().await.unwrap();
    common::connect(&a, &b).await;

    a.disconnect_from(b.id()).await;

    assert_eq!(a.handshake_state(b.id()), HandshakeState::Disconnected);
    assert!(eventually(Duration::from_secs(5), || b.handshake_state(a.id()) == HandshakeState::Disconnected).await);
    assert!(b.connected_endpoints().is_empty());

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("calc").build().await.unwrap();
    let b = memory_builder(&network, "b").with_subject("calc").build().await.unwrap();
    common::connect(&a, &b).await;
    a.disconnect_from(b.id()).await;
    assert!(eventually(Duration::from_secs(5), || b.handshake_state(a.id()) == HandshakeState::Disconnected).await);

    common::connect(&a, &b).await;

    assert_eq!(a.handshake_state(b.id()), HandshakeState::Connected);
    assert!(eventually(Duration::from_secs(5), || b.handshake_state(a.id()) == HandshakeState::Connected).await);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_watched_discovery_source_connects() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("calc").build().await.unwrap();
    let b = memory_builder(&network, "b").with_subject("calc").build().await.unwrap();

    let source = a.manual_discovery();
    a.watch_discovery(&source);
    let info = b.local_information().clone();
    source
        .recently_connected_endpoint(info.id.clone(), info.discovery_address)
        .await;

    assert!(eventually(Duration::from_secs(5), || a.handshake_state(b.id()) == HandshakeState::Connected).await);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_undeliverable_connect_response_does_not_block_later_connects() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("calc").build().await.unwrap();
    let b = memory_builder(&network, "b").with_subject("calc").build().await.unwrap();
    let local = a.local_information().clone();
    a.protocol_layer()
        .open_session(b.id(), b.local_information().protocol.clone())
        .await
        .unwrap();

    // Announce a message address nobody hosts, so b cannot answer.
    let connect = CommunicationMessage::new(
        a.id().clone(),
        MessageKind::EndpointConnect(EndpointConnect {
            discovery_address: local.discovery_address.clone(),
            protocol: ProtocolInformation {
                version: local.protocol.version,
                message_address: Url::parse("memory://ghost/messages").unwrap(),
                data_address: None,
            },
            description: a.interaction_layer().conductor().description().clone(),
        }),
    );
    let unanswered = a
        .protocol_layer()
        .send_message_and_wait_for_response(b.id(), &connect, 0, Duration::from_millis(300))
        .await;
    assert!(unanswered.is_err());
    assert!(eventually(Duration::from_secs(2), || b.handshake_state(a.id()) == HandshakeState::Unconnected).await);

    a.connect_to(b.id().clone(), b.local_information().discovery_address.clone())
        .await;
    assert!(eventually(Duration::from_secs(5), || a.handshake_state(b.id()) == HandshakeState::Connected).await);
    assert!(eventually(Duration::from_secs(5), || b.handshake_state(a.id()) == HandshakeState::Connected).await);

    a.shutdown().await;
    b.shutdown().await;
}
