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

//! Message conversion through the protocol 1.0.0 wire form.
//!
//! Messages are converted, encoded as JSON frames the way the TCP binding
//! does it, decoded and converted back.

use peercomm::id::{EndpointId, MessageId};
use peercomm::protocol::{CommunicationMessage, MessageData, MessageHeader, MessageKind, MessageTranslator, MessageType};
use peercomm::serialization::{JsonSerializer, ObjectSerializerRegistry, ObjectValue, Serializer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn translator() -> MessageTranslator {
    MessageTranslator::v1(Arc::new(ObjectSerializerRegistry::with_defaults()))
}

fn over_the_wire(translator: &MessageTranslator, message: &CommunicationMessage) -> CommunicationMessage {
    let serializer = JsonSerializer::new();
    let bytes = serializer.serialize(&translator.from_message(message)).unwrap();
    let data: MessageData = serializer.deserialize(&bytes).unwrap();
    translator.to_message(&data)
}

#[test]
fn test_command_response_survives_the_wire() {
    let translator = translator();
    let header = MessageHeader {
        id: MessageId::next(),
        sender: EndpointId::new("sendingEndpoint"),
        in_response_to: MessageId::next(),
    };
    let message = CommunicationMessage::with_header(
        header.clone(),
        MessageKind::CommandInvokedResponse {
            result: ObjectValue::new(10i32),
        },
    );

    let received = over_the_wire(&translator, &message);

    assert_eq!(received.header(), &header);
    assert_eq!(received.sender(), &EndpointId::new("sendingEndpoint"));
    match received.kind() {
        MessageKind::CommandInvokedResponse { result } => assert_eq!(result.downcast_ref::<i32>(), Some(&10)),
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_unregistered_result_type_degrades_to_unknown() {
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Private {
        secret: u32,
    }

    let translator = translator();
    let message = CommunicationMessage::new(
        EndpointId::new("sendingEndpoint"),
        MessageKind::CommandInvokedResponse {
            result: ObjectValue::new(Private { secret: 7 }),
        },
    );

    let data = translator.from_message(&message);
    assert!(data.is_unknown());
    assert_eq!(data.id, message.id());

    let received = translator.to_message(&data);
    assert_eq!(received.message_type(), MessageType::UnknownMessageType);
    assert_eq!(received.id(), message.id());
}

#[test]
fn test_registered_custom_type_round_trips() {
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    let objects = Arc::new(ObjectSerializerRegistry::with_defaults());
    objects.register_type::<Point>();
    let translator = MessageTranslator::v1(objects);
    let message = CommunicationMessage::new(
        EndpointId::new("sendingEndpoint"),
        MessageKind::ConnectionVerification(Some(ObjectValue::new(Point { x: 1, y: -2 }))),
    );

    let received = over_the_wire(&translator, &message);

    match received.kind() {
        MessageKind::ConnectionVerification(Some(value)) => {
            assert_eq!(value.downcast_ref::<Point>(), Some(&Point { x: 1, y: -2 }));
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_data_from_a_newer_dialect_is_unknown() {
    let translator = translator();
    let id = MessageId::next();
    let data = MessageData {
        id,
        sender: EndpointId::new("future"),
        in_response_to: MessageId::NONE,
        data_type: "TelepathyRequested".to_string(),
        payload: serde_json::json!({ "thought": 42 }),
    };

    let message = translator.to_message(&data);

    assert_eq!(message.message_type(), MessageType::UnknownMessageType);
    assert_eq!(message.id(), id);
    assert_eq!(message.sender(), &EndpointId::new("future"));
    assert!(!message.is_response());
}

#[test]
fn test_failure_reason_survives_the_wire() {
    let translator = translator();
    let request = CommunicationMessage::new(EndpointId::new("a"), MessageKind::EndpointDisconnect);
    let reply = CommunicationMessage::response_to(&request, EndpointId::new("b"), MessageKind::failure("nope"));

    let received = over_the_wire(&translator, &reply);

    assert_eq!(received.in_response_to(), request.id());
    assert!(matches!(received.kind(), MessageKind::Failure { reason } if reason == "nope"));
}
