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

//! TCP channel binding.
//!
//! Every channel is one TCP connection carrying length-prefixed JSON frames
//! (see [`framing`](crate::serialization::framing)). The client sends one
//! request frame and waits for one reply frame, so a channel that returns
//! `Ok` knows the remote sink has taken the message.
//!
//! A hosted endpoint listens on a single socket and routes by request kind;
//! discovery requests carry the path of the address they were sent to so
//! several discovery versions can share the listener:
//!
//! ```text
//! tcp://127.0.0.1:4100/message
//! tcp://127.0.0.1:4100/data
//! tcp://127.0.0.1:4100/discovery/1.0.0
//! ```

use crate::discovery::ConnectionLookup;
use crate::id::{EndpointId, Version};
use crate::protocol::{DataTransfer, MessageData};
use crate::serialization::JsonSerializer;
use crate::serialization::framing::{read_message, write_message};
use crate::transport::{
    ChannelTemplate, DataChannel, DataSink, DiscoveryAddress, DiscoveryChannel, DiscoveryService,
    HostHandlers, HostedEndpoint, MessageChannel, MessageSink, TcpConfig, TransportError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// URL scheme served by the TCP binding.
pub const TCP_SCHEME: &str = "tcp";

#[derive(Debug, Serialize, Deserialize)]
enum Request {
    Message(MessageData),
    Data(DataTransfer),
    Discovery { path: String, query: DiscoveryQuery },
}

#[derive(Debug, Serialize, Deserialize)]
enum DiscoveryQuery {
    DiscoveryVersion,
    ProtocolVersions,
    ConnectionInformation(Option<Version>),
}

#[derive(Debug, Serialize, Deserialize)]
enum Reply {
    Accepted,
    DiscoveryVersion(Version),
    ProtocolVersions(Vec<Version>),
    ConnectionInformation(ConnectionLookup),
    Fault(String),
}

/// [`ChannelTemplate`] for TCP.
///
/// # Examples
///
/// ```rust,no_run
/// use peercomm::transport::{ChannelTemplate, TcpChannelTemplate, TcpConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let template = TcpChannelTemplate::new(TcpConfig::default());
/// let address = url::Url::parse("tcp://127.0.0.1:4100/discovery/1.0.0")?;
/// let mut channel = template.open_discovery_channel(&address).await?;
/// println!("remote speaks discovery {}", channel.discovery_version().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TcpChannelTemplate {
    config: TcpConfig,
}

impl TcpChannelTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    /// The binding configuration.
    #[must_use]
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    async fn connect(&self, address: &Url) -> Result<TcpConnection, TransportError> {
        TcpConnection::connect(address, &self.config).await
    }
}

#[async_trait]
impl ChannelTemplate for TcpChannelTemplate {
    fn name(&self) -> &'static str {
        TCP_SCHEME
    }

    async fn open_message_channel(&self, address: &Url) -> Result<Box<dyn MessageChannel>, TransportError> {
        Ok(Box::new(TcpMessageChannel {
            connection: self.connect(address).await?,
        }))
    }

    async fn open_data_channel(&self, address: &Url) -> Result<Box<dyn DataChannel>, TransportError> {
        Ok(Box::new(TcpDataChannel {
            connection: self.connect(address).await?,
        }))
    }

    async fn open_discovery_channel(
        &self,
        address: &Url,
    ) -> Result<Box<dyn DiscoveryChannel>, TransportError> {
        Ok(Box::new(TcpDiscoveryChannel {
            connection: self.connect(address).await?,
            path: address.path().to_string(),
        }))
    }

    #[instrument(skip(self, handlers), fields(bind = %self.config.bind_address))]
    async fn host(
        &self,
        endpoint: &EndpointId,
        handlers: HostHandlers,
    ) -> Result<HostedEndpoint, TransportError> {
        let bind = self.config.bind_address;
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|source| TransportError::BindFailed {
                address: bind.to_string(),
                source,
            })?;
        let local = listener
            .local_addr()
            .map_err(|source| TransportError::BindFailed {
                address: bind.to_string(),
                source,
            })?;
        let advertised = advertised_address(local);

        let message_address = tcp_url(advertised, "message")?;
        let data_address = tcp_url(advertised, "data")?;
        let mut discovery = Vec::with_capacity(handlers.discovery.len());
        let mut services = HashMap::with_capacity(handlers.discovery.len());
        for service in handlers.discovery {
            let version = service.discovery_version();
            let address = tcp_url(advertised, &format!("discovery/{version}"))?;
            services.insert(address.path().to_string(), service);
            discovery.push(DiscoveryAddress { version, address });
        }

        let routes = Arc::new(Routes {
            message: handlers.message,
            data: handlers.data,
            discovery: services,
        });
        let accept_loop = tokio::spawn(serve(listener, routes));
        info!(endpoint = %endpoint, address = %advertised, "hosting endpoint over tcp");

        let endpoint = endpoint.clone();
        Ok(HostedEndpoint::new(
            message_address,
            data_address,
            discovery,
            move || {
                accept_loop.abort();
                debug!(endpoint = %endpoint, "stopped hosting endpoint over tcp");
            },
        ))
    }
}

fn advertised_address(local: SocketAddr) -> SocketAddr {
    if local.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
    } else {
        local
    }
}

fn tcp_url(address: SocketAddr, path: &str) -> Result<Url, TransportError> {
    let raw = format!("{TCP_SCHEME}://{address}/{path}");
    Url::parse(&raw).map_err(|e| TransportError::UnsupportedAddress {
        address: raw,
        reason: e.to_string(),
    })
}

fn socket_target(address: &Url) -> Result<String, TransportError> {
    let unsupported = |reason: &str| TransportError::UnsupportedAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };
    if address.scheme() != TCP_SCHEME {
        return Err(unsupported("expected the 'tcp' scheme"));
    }
    let host = address.host().ok_or_else(|| unsupported("missing host"))?;
    let port = address.port().ok_or_else(|| unsupported("missing port"))?;
    Ok(format!("{host}:{port}"))
}

struct TcpConnection {
    stream: TcpStream,
    serializer: JsonSerializer,
    request_timeout: Duration,
}

impl TcpConnection {
    async fn connect(address: &Url, config: &TcpConfig) -> Result<Self, TransportError> {
        let target = socket_target(address)?;
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(&target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::ConnectionFailed {
                    address: target,
                    source,
                });
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    duration: config.connect_timeout,
                });
            }
        };
        stream
            .set_nodelay(true)
            .map_err(|source| TransportError::ConnectionFailed {
                address: target.clone(),
                source,
            })?;
        debug!(address = %target, "tcp channel connected");
        Ok(Self {
            stream,
            serializer: JsonSerializer::new(),
            request_timeout: config.request_timeout,
        })
    }

    async fn request(&mut self, request: &Request) -> Result<Reply, TransportError> {
        let exchange = async {
            write_message(&mut self.stream, &self.serializer, request).await?;
            read_message::<_, _, Reply>(&mut self.stream, &self.serializer).await
        };
        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(Ok(Reply::Fault(reason))) => Err(TransportError::Remote { reason }),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) if e.is_disconnect() => Err(TransportError::connection_lost(e.to_string())),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransportError::Timeout {
                duration: self.request_timeout,
            }),
        }
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| TransportError::Codec(e.into()))
    }
}

struct TcpMessageChannel {
    connection: TcpConnection,
}

#[async_trait]
impl MessageChannel for TcpMessageChannel {
    async fn accept_message(&mut self, message: MessageData) -> Result<(), TransportError> {
        match self.connection.request(&Request::Message(message)).await? {
            Reply::Accepted => Ok(()),
            _ => Err(TransportError::UnexpectedReply {
                expected: "accepted",
            }),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.connection.shutdown().await
    }
}

struct TcpDataChannel {
    connection: TcpConnection,
}

#[async_trait]
impl DataChannel for TcpDataChannel {
    async fn accept_data(&mut self, transfer: DataTransfer) -> Result<(), TransportError> {
        match self.connection.request(&Request::Data(transfer)).await? {
            Reply::Accepted => Ok(()),
            _ => Err(TransportError::UnexpectedReply {
                expected: "accepted",
            }),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.connection.shutdown().await
    }
}

struct TcpDiscoveryChannel {
    connection: TcpConnection,
    path: String,
}

impl TcpDiscoveryChannel {
    async fn query(&mut self, query: DiscoveryQuery) -> Result<Reply, TransportError> {
        let request = Request::Discovery {
            path: self.path.clone(),
            query,
        };
        self.connection.request(&request).await
    }
}

#[async_trait]
impl DiscoveryChannel for TcpDiscoveryChannel {
    async fn discovery_version(&mut self) -> Result<Version, TransportError> {
        match self.query(DiscoveryQuery::DiscoveryVersion).await? {
            Reply::DiscoveryVersion(version) => Ok(version),
            _ => Err(TransportError::UnexpectedReply {
                expected: "discovery version",
            }),
        }
    }

    async fn protocol_versions(&mut self) -> Result<Vec<Version>, TransportError> {
        match self.query(DiscoveryQuery::ProtocolVersions).await? {
            Reply::ProtocolVersions(versions) => Ok(versions),
            _ => Err(TransportError::UnexpectedReply {
                expected: "protocol versions",
            }),
        }
    }

    async fn connection_information_for_protocol(
        &mut self,
        version: Option<Version>,
    ) -> Result<ConnectionLookup, TransportError> {
        match self
            .query(DiscoveryQuery::ConnectionInformation(version))
            .await?
        {
            Reply::ConnectionInformation(lookup) => Ok(lookup),
            _ => Err(TransportError::UnexpectedReply {
                expected: "connection information",
            }),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.connection.shutdown().await
    }
}

struct Routes {
    message: Arc<dyn MessageSink>,
    data: Arc<dyn DataSink>,
    discovery: HashMap<String, Arc<dyn DiscoveryService>>,
}

impl Routes {
    fn dispatch(&self, request: Request) -> Reply {
        match request {
            Request::Message(message) => {
                self.message.accept_message(message);
                Reply::Accepted
            }
            Request::Data(transfer) => {
                self.data.accept_data(transfer);
                Reply::Accepted
            }
            Request::Discovery { path, query } => match self.discovery.get(&path) {
                None => Reply::Fault(format!("no discovery service at '{path}'")),
                Some(service) => match query {
                    DiscoveryQuery::DiscoveryVersion => {
                        Reply::DiscoveryVersion(service.discovery_version())
                    }
                    DiscoveryQuery::ProtocolVersions => {
                        Reply::ProtocolVersions(service.protocol_versions())
                    }
                    DiscoveryQuery::ConnectionInformation(version) => Reply::ConnectionInformation(
                        service.connection_information_for_protocol(version.as_ref()),
                    ),
                },
            },
        }
    }
}

async fn serve(listener: TcpListener, routes: Arc<Routes>) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted tcp channel");
                    connections.spawn(serve_connection(stream, peer, routes.clone()));
                }
                Err(e) => warn!(error = %e, "failed to accept tcp channel"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn serve_connection(mut stream: TcpStream, peer: SocketAddr, routes: Arc<Routes>) {
    let serializer = JsonSerializer::new();
    loop {
        let request = match read_message::<_, _, Request>(&mut stream, &serializer).await {
            Ok(request) => request,
            Err(e) if e.is_disconnect() => {
                debug!(%peer, "tcp channel closed by peer");
                return;
            }
            Err(e) => {
                warn!(%peer, error = %e, "dropping tcp channel after unreadable frame");
                return;
            }
        };
        let reply = routes.dispatch(request);
        if let Err(e) = write_message(&mut stream, &serializer, &reply).await {
            debug!(%peer, error = %e, "failed to reply on tcp channel");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_target() {
        let v4 = Url::parse("tcp://127.0.0.1:4100/message").unwrap();
        assert_eq!(socket_target(&v4).unwrap(), "127.0.0.1:4100");

        let v6 = Url::parse("tcp://[::1]:4100/message").unwrap();
        assert_eq!(socket_target(&v6).unwrap(), "[::1]:4100");

        let no_port = Url::parse("tcp://127.0.0.1/message").unwrap();
        assert!(socket_target(&no_port).is_err());

        let memory = Url::parse("memory://abc/message").unwrap();
        assert!(socket_target(&memory).is_err());
    }

    #[test]
    fn test_advertised_address_replaces_unspecified() {
        let any: SocketAddr = "0.0.0.0:4100".parse().unwrap();
        assert_eq!(advertised_address(any), "127.0.0.1:4100".parse().unwrap());
        let fixed: SocketAddr = "10.0.0.2:4100".parse().unwrap();
        assert_eq!(advertised_address(fixed), fixed);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let template = TcpChannelTemplate::default();
        let url = tcp_url(address, "message").unwrap();
        let result = template.open_message_channel(&url).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed { .. })));
    }
}
