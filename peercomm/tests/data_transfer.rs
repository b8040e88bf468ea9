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

//! Uploads, downloads and connection verification between endpoints.

mod common;

use common::{connect, eventually, init_tracing, memory_builder, test_config, transfer};
use parking_lot::Mutex;
use peercomm::id::EndpointId;
use peercomm::protocol::{
    DataReceivingEndpoint, DataTransfer, HandlerError, MessageReceivingEndpoint, MessageTranslator,
    RestoringDataTransferingEndpoint, UploadSource, UploadToken, VerificationResponder,
};
use peercomm::serialization::{ObjectSerializerRegistry, ObjectValue};
use peercomm::transport::{ChannelTemplate, HostHandlers, MemoryChannelTemplate, MemoryNetwork};
use peercomm::{CommError, CommunicationEndpoint, ProtocolError};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

async fn pair(network: &Arc<MemoryNetwork>) -> (CommunicationEndpoint, CommunicationEndpoint) {
    let a = memory_builder(network, "a").with_subject("files").build().await.unwrap();
    let b = memory_builder(network, "b").with_subject("files").build().await.unwrap();
    connect(&a, &b).await;
    (a, b)
}

#[tokio::test]
async fn test_registered_bytes_can_be_downloaded() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let (a, b) = pair(&network).await;
    let token = b.register_upload(UploadSource::Bytes(b"hello world".to_vec()));

    let data = a.download(b.id(), token).await.unwrap();

    assert_eq!(data, b"hello world");
    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_registered_file_is_read_on_download() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let (a, b) = pair(&network).await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"file contents").unwrap();
    file.flush().unwrap();
    let token = b.register_upload(UploadSource::File(file.path().to_path_buf()));

    let data = a.download(b.id(), token).await.unwrap();

    assert_eq!(data, b"file contents");
    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_unknown_token_times_out() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a")
        .with_subject("files")
        .with_config(test_config().with_response_timeout(Duration::from_millis(200)))
        .build()
        .await
        .unwrap();
    let b = memory_builder(&network, "b").with_subject("files").build().await.unwrap();
    connect(&a, &b).await;

    let error = a.download(b.id(), UploadToken::new()).await.unwrap_err();

    assert!(matches!(error, CommError::Protocol(ProtocolError::Timeout { .. })));
    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_failed_delivery_keeps_the_token() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a")
        .with_subject("files")
        .with_config(test_config().with_response_timeout(Duration::from_millis(200)))
        .build()
        .await
        .unwrap();
    let b = memory_builder(&network, "b").with_subject("files").build().await.unwrap();
    connect(&a, &b).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.bin");
    let token = b.register_upload(UploadSource::File(path.clone()));

    let error = a.download(b.id(), token).await.unwrap_err();
    assert!(matches!(error, CommError::Protocol(ProtocolError::Timeout { .. })));
    assert!(b.protocol_layer().uploads().contains(&token));

    std::fs::write(&path, b"written later").unwrap();
    let data = a.download(b.id(), token).await.unwrap();
    assert_eq!(data, b"written later");
    assert!(
        eventually(Duration::from_secs(2), || !b.protocol_layer().uploads().contains(&token)).await,
        "token should be consumed once delivered"
    );

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_download_from_unconnected_endpoint_fails() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("files").build().await.unwrap();

    let error = a.download(&EndpointId::new("nobody"), UploadToken::new()).await.unwrap_err();

    assert!(matches!(error, CommError::Protocol(ProtocolError::NoSession { .. })));
    a.shutdown().await;
}

#[tokio::test]
async fn test_verification_echoes_by_default() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let (a, b) = pair(&network).await;

    let echoed = a
        .verify_connection(b.id(), Some(ObjectValue::new("ping".to_string())))
        .await
        .unwrap();
    assert_eq!(echoed.unwrap().downcast_ref::<String>().map(String::as_str), Some("ping"));
    assert!(a.verify_connection(b.id(), None).await.unwrap().is_none());

    a.shutdown().await;
    b.shutdown().await;
}

struct Uptime;

impl VerificationResponder for Uptime {
    fn respond(&self, _sender: &EndpointId, _custom: Option<&ObjectValue>) -> Option<ObjectValue> {
        Some(ObjectValue::new(1234u64))
    }
}

#[tokio::test]
async fn test_custom_verification_responder() {
    init_tracing();
    let network = Arc::new(MemoryNetwork::new());
    let a = memory_builder(&network, "a").with_subject("files").build().await.unwrap();
    let b = memory_builder(&network, "b")
        .with_subject("files")
        .with_verification_responder(Arc::new(Uptime))
        .build()
        .await
        .unwrap();
    connect(&a, &b).await;

    let answer = a.verify_connection(b.id(), None).await.unwrap().unwrap();
    assert_eq!(answer.downcast_ref::<u64>(), Some(&1234));

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_data_endpoint_delivers_to_handlers() {
    init_tracing();
    let template: Arc<dyn ChannelTemplate> = Arc::new(MemoryChannelTemplate::new(Arc::new(MemoryNetwork::new())));
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = DataReceivingEndpoint::new();
    {
        let received = received.clone();
        sink.on_new_data(move |t: &DataTransfer| -> Result<(), HandlerError> {
            received.lock().push(t.data.clone());
            Ok(())
        });
    }
    sink.on_new_data(|_: &DataTransfer| -> Result<(), HandlerError> { Err("handler refuses".into()) });
    let translator = Arc::new(MessageTranslator::v1(Arc::new(ObjectSerializerRegistry::with_defaults())));
    let hosted = template
        .host(
            &EndpointId::new("sink"),
            HostHandlers {
                message: Arc::new(MessageReceivingEndpoint::new(translator)),
                data: Arc::new(sink),
                discovery: Vec::new(),
            },
        )
        .await
        .unwrap();
    let sender = RestoringDataTransferingEndpoint::new(hosted.data_address.clone(), template.clone());

    sender.send(transfer("source", "sink", b"one"), 0).await.unwrap();
    sender.send(transfer("source", "sink", b"two"), 0).await.unwrap();

    assert_eq!(*received.lock(), vec![b"one".to_vec(), b"two".to_vec()]);
    sender.close().await;
}
