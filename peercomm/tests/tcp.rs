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

//! End-to-end tests over the TCP binding on the loopback interface.

mod common;

use common::{Calculator, CalculatorCommands, CalculatorProxy, CountingCalculator, connect, init_tracing, test_config};
use peercomm::discovery::{DiscoveryChannelTranslator, DiscoveryVersions};
use peercomm::protocol::UploadSource;
use peercomm::transport::{TCP_SCHEME, TcpChannelTemplate, TcpConfig};
use peercomm::{CommunicationEndpoint, CommunicationEndpointBuilder, HandshakeState};
use std::sync::Arc;
use std::time::Duration;

async fn tcp_endpoint(id: &str, builder: impl FnOnce(CommunicationEndpointBuilder) -> CommunicationEndpointBuilder) -> CommunicationEndpoint {
    let base = CommunicationEndpointBuilder::new()
        .with_id(id)
        .with_config(test_config())
        .with_tcp(TcpConfig::new().with_connect_timeout(Duration::from_secs(2)));
    builder(base).build().await.unwrap()
}

#[tokio::test]
async fn test_endpoints_are_hosted_on_tcp_addresses() {
    init_tracing();
    let endpoint = tcp_endpoint("tcp-a", |b| b.with_subject("calc")).await;
    let info = endpoint.local_information().clone();

    assert_eq!(info.discovery_address.scheme(), TCP_SCHEME);
    assert_eq!(info.protocol.message_address.scheme(), TCP_SCHEME);
    assert_ne!(info.discovery_address.port(), Some(0));

    let translator = DiscoveryChannelTranslator::new(
        DiscoveryVersions::default(),
        Arc::new(TcpChannelTemplate::new(TcpConfig::default())),
        Duration::from_secs(2),
    );
    assert_eq!(translator.from_uri(&info.discovery_address).await, Some(info.protocol.clone()));

    endpoint.shutdown().await;
    assert!(translator.from_uri(&info.discovery_address).await.is_none());
}

#[tokio::test]
async fn test_commands_over_tcp() {
    init_tracing();
    let server = tcp_endpoint("tcp-server", |b| {
        b.with_command_set("calc", CalculatorCommands::new(CountingCalculator::default()))
    })
    .await;
    let client = tcp_endpoint("tcp-client", |b| b.require_command_set::<CalculatorProxy>("calc")).await;
    connect(&client, &server).await;
    assert_eq!(client.handshake_state(server.id()), HandshakeState::Connected);

    let proxy: CalculatorProxy = client.command_proxy(server.id()).unwrap();
    assert_eq!(proxy.add(40, 2).await.unwrap(), 42);
    assert_eq!(proxy.describe(3).await.unwrap(), "value 3");
    assert!(proxy.divide(1, 0).await.is_err());
    proxy.clear().await.unwrap();

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_download_over_tcp() {
    init_tracing();
    let a = tcp_endpoint("tcp-a", |b| b.with_subject("files")).await;
    let b = tcp_endpoint("tcp-b", |b| b.with_subject("files")).await;
    connect(&a, &b).await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let token = b.register_upload(UploadSource::Bytes(payload.clone()));

    assert_eq!(a.download(b.id(), token).await.unwrap(), payload);

    a.shutdown().await;
    b.shutdown().await;
}
