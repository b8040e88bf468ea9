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

//! Integration tests for the restoring message sending endpoint.
//!
//! A faulted channel is dropped and rebuilt; the send is retried until it
//! succeeds or the retry budget is spent.

mod common;

use common::{FlakyTemplate, init_tracing};
use peercomm::id::EndpointId;
use peercomm::protocol::{
    CommunicationMessage, DataReceivingEndpoint, HandlerError, MessageKind, MessageReceivingEndpoint,
    MessageTranslator, ProtocolError, RestoringMessageSendingEndpoint,
};
use peercomm::serialization::ObjectSerializerRegistry;
use peercomm::transport::{ChannelTemplate, HostHandlers, HostedEndpoint, MemoryChannelTemplate, MemoryNetwork};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

struct Receiver {
    received: Arc<AtomicU32>,
    hosted: HostedEndpoint,
}

async fn host_receiver(template: &Arc<dyn ChannelTemplate>, translator: &Arc<MessageTranslator>) -> Receiver {
    let received = Arc::new(AtomicU32::new(0));
    let counter = received.clone();
    let sink = MessageReceivingEndpoint::new(translator.clone());
    sink.on_new_message(move |_message: &CommunicationMessage| -> Result<(), HandlerError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let hosted = template
        .host(
            &EndpointId::new("receiver"),
            HostHandlers {
                message: Arc::new(sink),
                data: Arc::new(DataReceivingEndpoint::new()),
                discovery: Vec::new(),
            },
        )
        .await
        .unwrap();
    Receiver { received, hosted }
}

fn setup(faults: u32) -> (Arc<FlakyTemplate>, Arc<dyn ChannelTemplate>, Arc<MessageTranslator>) {
    let memory: Arc<dyn ChannelTemplate> = Arc::new(MemoryChannelTemplate::new(Arc::new(MemoryNetwork::new())));
    let flaky = Arc::new(FlakyTemplate::new(memory.clone(), faults));
    let translator = Arc::new(MessageTranslator::v1(Arc::new(ObjectSerializerRegistry::with_defaults())));
    (flaky, memory, translator)
}

fn message() -> CommunicationMessage {
    CommunicationMessage::new(EndpointId::new("sender"), MessageKind::EndpointDisconnect)
}

#[tokio::test]
async fn test_single_fault_is_recovered_with_a_new_channel() {
    init_tracing();
    let (flaky, memory, translator) = setup(1);
    let receiver = host_receiver(&memory, &translator).await;
    let sender = RestoringMessageSendingEndpoint::new(
        receiver.hosted.message_address.clone(),
        flaky.clone(),
        translator.clone(),
    );

    sender.send(&message(), 1).await.unwrap();

    assert_eq!(flaky.opened(), 2);
    assert_eq!(receiver.received.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_persistent_fault_fails_after_retries() {
    init_tracing();
    let (flaky, memory, translator) = setup(u32::MAX);
    let receiver = host_receiver(&memory, &translator).await;
    let sender = RestoringMessageSendingEndpoint::new(
        receiver.hosted.message_address.clone(),
        flaky.clone(),
        translator.clone(),
    );

    let error = sender.send(&message(), 1).await.unwrap_err();

    match error {
        ProtocolError::FailedToSend { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(flaky.opened(), 2);
    assert_eq!(receiver.received.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_healthy_channel_is_reused() {
    init_tracing();
    let (flaky, memory, translator) = setup(0);
    let receiver = host_receiver(&memory, &translator).await;
    let sender = RestoringMessageSendingEndpoint::new(
        receiver.hosted.message_address.clone(),
        flaky.clone(),
        translator.clone(),
    );

    for _ in 0..3 {
        sender.send(&message(), 0).await.unwrap();
    }

    assert_eq!(flaky.opened(), 1);
    assert_eq!(receiver.received.load(Ordering::SeqCst), 3);
    sender.close().await;
}

#[tokio::test]
async fn test_unreachable_address_exhausts_retries() {
    init_tracing();
    let (flaky, _memory, translator) = setup(0);
    let sender = RestoringMessageSendingEndpoint::new(
        "memory://nobody/messages".parse().unwrap(),
        flaky.clone(),
        translator,
    );

    let error = sender.send(&message(), 2).await.unwrap_err();
    assert!(error.is_failed_to_send());
    assert_eq!(flaky.opened(), 3);
}
