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

//! Channel bindings.
//!
//! The protocol layer never touches sockets directly. It asks a
//! [`ChannelTemplate`] for message, data and discovery channels and asks it
//! to host the receiving side of an endpoint. Two bindings ship with the
//! crate:
//!
//! - [`MemoryChannelTemplate`]: in-process delivery through a shared
//!   [`MemoryNetwork`]
//! - [`TcpChannelTemplate`]: one TCP connection per channel carrying
//!   length-prefixed JSON frames
//!
//! Bindings report failures as [`TransportError`]s; a channel that returned
//! an error is considered faulted and is rebuilt by the caller.

mod config;
mod error;
mod memory;
mod tcp;
mod traits;

pub use self::config::TcpConfig;
pub use self::error::TransportError;
pub use self::memory::{MEMORY_SCHEME, MemoryChannelTemplate, MemoryNetwork};
pub use self::tcp::{TCP_SCHEME, TcpChannelTemplate};
pub use self::traits::{
    ChannelTemplate, DataChannel, DataSink, DiscoveryAddress, DiscoveryChannel, DiscoveryService,
    HostHandlers, HostedEndpoint, MessageChannel, MessageSink,
};
