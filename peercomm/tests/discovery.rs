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

//! Protocol version negotiation against hosted discovery endpoints.

mod common;

use common::init_tracing;
use peercomm::discovery::{DiscoveryChannelTranslator, DiscoveryEndpoint, DiscoveryVersions, ProtocolInformation};
use peercomm::id::{EndpointId, Version};
use peercomm::protocol::{DataReceivingEndpoint, MessageReceivingEndpoint, MessageTranslator};
use peercomm::serialization::ObjectSerializerRegistry;
use peercomm::transport::{
    ChannelTemplate, DiscoveryService, HostHandlers, HostedEndpoint, MemoryChannelTemplate, MemoryNetwork,
};
use std::sync::Arc;
use std::time::Duration;

fn v(major: u32) -> Version {
    Version::new(major, 0, 0)
}

fn info(major: u32) -> ProtocolInformation {
    ProtocolInformation {
        version: v(major),
        message_address: format!("memory://remote/message/{major}").parse().unwrap(),
        data_address: None,
    }
}

async fn host(template: &Arc<dyn ChannelTemplate>, discovery: Vec<DiscoveryEndpoint>) -> HostedEndpoint {
    let translator = Arc::new(MessageTranslator::v1(Arc::new(ObjectSerializerRegistry::with_defaults())));
    template
        .host(
            &EndpointId::new("remote"),
            HostHandlers {
                message: Arc::new(MessageReceivingEndpoint::new(translator)),
                data: Arc::new(DataReceivingEndpoint::new()),
                discovery: discovery.into_iter().map(|d| Arc::new(d) as Arc<dyn DiscoveryService>).collect(),
            },
        )
        .await
        .unwrap()
}

fn translator(template: &Arc<dyn ChannelTemplate>, discovery: u32, protocols: &[u32]) -> DiscoveryChannelTranslator {
    DiscoveryChannelTranslator::new(
        DiscoveryVersions::new(v(discovery), protocols.iter().map(|p| v(*p))),
        template.clone(),
        Duration::from_secs(2),
    )
}

fn memory() -> Arc<dyn ChannelTemplate> {
    Arc::new(MemoryChannelTemplate::new(Arc::new(MemoryNetwork::new())))
}

#[tokio::test]
async fn test_lowest_common_version_is_negotiated() {
    init_tracing();
    let template = memory();
    let hosted = host(&template, vec![DiscoveryEndpoint::new(v(1), [info(1), info(2), info(3)])]).await;
    let address = hosted.discovery_address(&v(1)).unwrap().clone();

    let negotiated = translator(&template, 1, &[2, 3, 4]).from_uri(&address).await.unwrap();

    assert_eq!(negotiated, info(2));
}

#[tokio::test]
async fn test_no_common_version_yields_nothing() {
    init_tracing();
    let template = memory();
    let hosted = host(&template, vec![DiscoveryEndpoint::new(v(1), [info(1)])]).await;
    let address = hosted.discovery_address(&v(1)).unwrap().clone();

    assert!(translator(&template, 1, &[2]).from_uri(&address).await.is_none());
}

#[tokio::test]
async fn test_discovery_version_mismatch_yields_nothing() {
    init_tracing();
    let template = memory();
    let hosted = host(&template, vec![DiscoveryEndpoint::new(v(2), [info(1)])]).await;
    let address = hosted.discovery_address(&v(2)).unwrap().clone();

    assert!(translator(&template, 1, &[1]).from_uri(&address).await.is_none());
}

#[tokio::test]
async fn test_each_discovery_version_is_hosted_separately() {
    init_tracing();
    let template = memory();
    let hosted = host(
        &template,
        vec![
            DiscoveryEndpoint::new(v(1), [info(1)]),
            DiscoveryEndpoint::new(v(2), [info(5)]),
        ],
    )
    .await;

    let old = hosted.discovery_address(&v(1)).unwrap().clone();
    let new = hosted.discovery_address(&v(2)).unwrap().clone();
    assert_ne!(old, new);
    assert_eq!(translator(&template, 1, &[1, 5]).from_uri(&old).await, Some(info(1)));
    assert_eq!(translator(&template, 2, &[1, 5]).from_uri(&new).await, Some(info(5)));
}

#[tokio::test]
async fn test_protocol_update_is_seen_by_later_negotiations() {
    init_tracing();
    let template = memory();
    let endpoint = Arc::new(DiscoveryEndpoint::new(v(1), [info(1)]));
    let translator_v1 = Arc::new(MessageTranslator::v1(Arc::new(ObjectSerializerRegistry::with_defaults())));
    let hosted = template
        .host(
            &EndpointId::new("remote"),
            HostHandlers {
                message: Arc::new(MessageReceivingEndpoint::new(translator_v1)),
                data: Arc::new(DataReceivingEndpoint::new()),
                discovery: vec![endpoint.clone() as Arc<dyn DiscoveryService>],
            },
        )
        .await
        .unwrap();
    let address = hosted.discovery_address(&v(1)).unwrap().clone();
    let client = translator(&template, 1, &[2]);
    assert!(client.from_uri(&address).await.is_none());

    endpoint.set_protocols([info(1), info(2)]);

    assert_eq!(client.from_uri(&address).await, Some(info(2)));
}

#[tokio::test]
async fn test_closed_host_yields_nothing() {
    init_tracing();
    let template = memory();
    let hosted = host(&template, vec![DiscoveryEndpoint::new(v(1), [info(1)])]).await;
    let address = hosted.discovery_address(&v(1)).unwrap().clone();
    hosted.close();

    assert!(translator(&template, 1, &[1]).from_uri(&address).await.is_none());
}
