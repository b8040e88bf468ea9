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

//! Shared helpers for the integration tests.

#![allow(dead_code)]

use peercomm::id::EndpointId;
use peercomm::interaction::{CommandError, Notification};
use peercomm::protocol::{DataTransfer, MessageData};
use peercomm::transport::{
    ChannelTemplate, DataChannel, DiscoveryChannel, HostHandlers, HostedEndpoint, MemoryNetwork,
    MessageChannel, TransportError,
};
use peercomm::{CommunicationEndpoint, CommunicationEndpointBuilder, EndpointConfig, command_set, notification_set};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use url::Url;

/// Installs a test subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("peercomm=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Short timeouts so failing tests fail fast.
pub fn test_config() -> EndpointConfig {
    EndpointConfig::new()
        .with_response_timeout(Duration::from_secs(2))
        .with_handshake_timeout(Duration::from_secs(2))
        .with_discovery_timeout(Duration::from_secs(2))
}

/// Builder for an in-memory endpoint with test timeouts.
pub fn memory_builder(network: &Arc<MemoryNetwork>, id: &str) -> CommunicationEndpointBuilder {
    CommunicationEndpointBuilder::new()
        .with_id(id)
        .with_config(test_config())
        .with_memory_network(network.clone())
}

/// Connects `from` to `to` and waits until both sides decided about
/// interacting.
pub async fn connect(from: &CommunicationEndpoint, to: &CommunicationEndpoint) {
    let target = to.local_information().clone();
    from.connect_to(target.id.clone(), target.discovery_address).await;
    from.wait_for_interaction(to.id(), Duration::from_secs(5))
        .await
        .expect("interaction decided on the connecting side");
    to.wait_for_interaction(from.id(), Duration::from_secs(5))
        .await
        .expect("interaction decided on the accepting side");
}

#[command_set(name = "test.Calculator", version = 2, fallback(name = "test.Calculator", version = 1))]
pub trait Calculator {
    async fn add(&self, a: i32, b: i32) -> Result<i32, CommandError>;
    async fn divide(&self, a: i32, b: i32) -> Result<i32, CommandError>;
    async fn describe(&self, value: i32) -> Result<String, CommandError>;
    async fn clear(&self) -> Result<(), CommandError>;
}

/// A calculator that counts the commands it ran.
#[derive(Default)]
pub struct CountingCalculator {
    pub invocations: AtomicU32,
}

#[peercomm::async_trait]
impl Calculator for CountingCalculator {
    async fn add(&self, a: i32, b: i32) -> Result<i32, CommandError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(a + b)
    }

    async fn divide(&self, a: i32, b: i32) -> Result<i32, CommandError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        a.checked_div(b).ok_or_else(|| CommandError::failed("division by zero"))
    }

    async fn describe(&self, value: i32) -> Result<String, CommandError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(format!("value {value}"))
    }

    async fn clear(&self) -> Result<(), CommandError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[notification_set(name = "test.Ticker", version = 1)]
pub trait Ticker {
    fn ticked(&self) -> &Notification<u64>;
    fn renamed(&self) -> &Notification<String>;
}

#[derive(Default)]
pub struct LocalTicker {
    pub ticked: Notification<u64>,
    pub renamed: Notification<String>,
}

impl Ticker for LocalTicker {
    fn ticked(&self) -> &Notification<u64> {
        &self.ticked
    }

    fn renamed(&self) -> &Notification<String> {
        &self.renamed
    }
}

/// Binding wrapper whose message channels fault a configurable number of
/// times before delivering.
pub struct FlakyTemplate {
    inner: Arc<dyn ChannelTemplate>,
    faults: Arc<AtomicU32>,
    opened: AtomicU32,
}

impl FlakyTemplate {
    /// Faults the next `faults` deliveries; `u32::MAX` faults forever.
    pub fn new(inner: Arc<dyn ChannelTemplate>, faults: u32) -> Self {
        Self {
            inner,
            faults: Arc::new(AtomicU32::new(faults)),
            opened: AtomicU32::new(0),
        }
    }

    /// Number of message channels opened so far.
    pub fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

struct FlakyChannel {
    inner: Box<dyn MessageChannel>,
    faults: Arc<AtomicU32>,
}

#[peercomm::async_trait]
impl MessageChannel for FlakyChannel {
    async fn accept_message(&mut self, message: MessageData) -> Result<(), TransportError> {
        let fault = self
            .faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| match remaining {
                0 => None,
                u32::MAX => Some(u32::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if fault {
            return Err(TransportError::ConnectionLost {
                reason: "injected fault".to_string(),
                source: None,
            });
        }
        self.inner.accept_message(message).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

#[peercomm::async_trait]
impl ChannelTemplate for FlakyTemplate {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn open_message_channel(&self, address: &Url) -> Result<Box<dyn MessageChannel>, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.open_message_channel(address).await?;
        Ok(Box::new(FlakyChannel {
            inner,
            faults: self.faults.clone(),
        }))
    }

    async fn open_data_channel(&self, address: &Url) -> Result<Box<dyn DataChannel>, TransportError> {
        self.inner.open_data_channel(address).await
    }

    async fn open_discovery_channel(&self, address: &Url) -> Result<Box<dyn DiscoveryChannel>, TransportError> {
        self.inner.open_discovery_channel(address).await
    }

    async fn host(&self, endpoint: &EndpointId, handlers: HostHandlers) -> Result<HostedEndpoint, TransportError> {
        self.inner.host(endpoint, handlers).await
    }
}

/// A data transfer addressed from `sender` to `receiver`.
pub fn transfer(sender: &str, receiver: &str, data: &[u8]) -> DataTransfer {
    DataTransfer {
        sender: EndpointId::new(sender),
        receiver: EndpointId::new(receiver),
        in_response_to: peercomm::MessageId::NONE,
        token: None,
        data: data.to_vec(),
    }
}
