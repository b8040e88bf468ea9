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

//! # Calculator Example
//!
//! Two endpoints on an in-memory network: one offers a calculator command
//! set on the `calc` subject, the other requires it.
//!
//! ## What This Example Shows
//!
//! - Declaring a command set with `#[command_set]`, including a fallback
//!   identity for older peers
//! - Building endpoints with `CommunicationEndpointBuilder`
//! - Connecting through the remote discovery address
//! - Waiting for the interaction decision and invoking commands through the
//!   generated proxy
//! - Command failures travelling back to the caller
//!
//! ## Running This Example
//!
//! ```bash
//! cargo run --example calculator
//! ```

use peercomm::interaction::CommandError;
use peercomm::transport::MemoryNetwork;
use peercomm::{CommunicationEndpointBuilder, command_set};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

#[command_set(name = "demo.Calculator", version = 2, fallback(name = "demo.Calculator", version = 1))]
pub trait Calculator {
    async fn add(&self, a: i64, b: i64) -> Result<i64, CommandError>;
    async fn divide(&self, a: i64, b: i64) -> Result<i64, CommandError>;
}

struct Arithmetic;

#[peercomm::async_trait]
impl Calculator for Arithmetic {
    async fn add(&self, a: i64, b: i64) -> Result<i64, CommandError> {
        a.checked_add(b).ok_or_else(|| CommandError::failed("overflow"))
    }

    async fn divide(&self, a: i64, b: i64) -> Result<i64, CommandError> {
        a.checked_div(b).ok_or_else(|| CommandError::failed("division by zero"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("peercomm=info")),
        )
        .init();

    println!("PeerComm Calculator Example\n");

    println!("Step 1: Creating endpoints");
    let network = Arc::new(MemoryNetwork::new());
    let server = CommunicationEndpointBuilder::new()
        .with_id("calculator-server")
        .with_memory_network(network.clone())
        .with_command_set("calc", CalculatorCommands::new(Arithmetic))
        .build()
        .await?;
    let client = CommunicationEndpointBuilder::new()
        .with_id("calculator-client")
        .with_memory_network(network)
        .require_command_set::<CalculatorProxy>("calc")
        .build()
        .await?;
    println!("   server discovery at {}", server.local_information().discovery_address);

    println!("\nStep 2: Connecting");
    let target = server.local_information().clone();
    let state = client.connect_to(target.id, target.discovery_address).await;
    println!("   handshake state after connect: {state}");
    let decision = client
        .wait_for_interaction(server.id(), Duration::from_secs(5))
        .await?;
    println!("   interaction decision: {decision:?}");

    println!("\nStep 3: Invoking commands");
    let calculator: CalculatorProxy = client.command_proxy(server.id())?;
    println!("   20 + 22 = {}", calculator.add(20, 22).await?);
    println!("   84 / 2  = {}", calculator.divide(84, 2).await?);
    match calculator.divide(1, 0).await {
        Ok(value) => println!("   1 / 0 = {value}?"),
        Err(e) => println!("   1 / 0 failed as expected: {e}"),
    }

    println!("\nStep 4: Shutting down");
    client.shutdown().await;
    server.shutdown().await;
    println!("   done");
    Ok(())
}
