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

//! # Ticker Over TCP
//!
//! A publisher raises a notification once per tick; a subscriber found
//! through a manual discovery source receives it over loopback TCP.
//!
//! ## Running This Example
//!
//! ```bash
//! cargo run --example tcp_ticker
//! ```

use peercomm::interaction::{Notification, NotificationSource};
use peercomm::transport::TcpConfig;
use peercomm::{CommunicationEndpointBuilder, EndpointEvent, notification_set};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

#[notification_set(name = "demo.Ticker", version = 1)]
pub trait Ticker {
    fn ticked(&self) -> &Notification<u64>;
}

#[derive(Default)]
struct Clock {
    ticked: Notification<u64>,
}

impl Ticker for Clock {
    fn ticked(&self) -> &Notification<u64> {
        &self.ticked
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

    let clock = Arc::new(Clock::default());
    let publisher = CommunicationEndpointBuilder::new()
        .with_id("ticker-publisher")
        .with_tcp(TcpConfig::new())
        .with_notification_set("time", TickerNotifications::from_arc(clock.clone()))
        .build()
        .await?;
    let subscriber = CommunicationEndpointBuilder::new()
        .with_id("ticker-subscriber")
        .with_tcp(TcpConfig::new())
        .require_notification_set::<TickerProxy>("time")
        .build()
        .await?;
    println!("publisher listening at {}", publisher.local_information().discovery_address);

    let mut events = subscriber.subscribe();
    let discovery = subscriber.manual_discovery();
    subscriber.watch_discovery(&discovery);
    let target = publisher.local_information().clone();
    discovery
        .recently_connected_endpoint(target.id, target.discovery_address)
        .await;

    while let Ok(event) = events.recv().await {
        println!("subscriber event: {event:?}");
        if matches!(event, EndpointEvent::InteractionDecided { .. }) {
            break;
        }
    }

    let ticker: TickerProxy = subscriber.notification_proxy(publisher.id())?;
    ticker.ticked().subscribe(|source: &NotificationSource, tick: &u64| {
        println!("tick {tick} from {source:?}");
    });
    // The remote registration is sent in the background.
    tokio::time::sleep(Duration::from_millis(200)).await;

    for tick in 1..=5 {
        clock.ticked.raise(tick);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    subscriber.shutdown().await;
    publisher.shutdown().await;
    Ok(())
}
