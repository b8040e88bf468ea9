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

//! Endpoint discovery and protocol version negotiation.
//!
//! Every endpoint hosts a [`DiscoveryEndpoint`] per discovery protocol
//! version. It lists the wire protocol versions the endpoint speaks and where
//! to reach each of them. A remote uses a [`DiscoveryChannelTranslator`] to
//! query it and pick a common version; the outcome is a
//! [`ProtocolInformation`] or nothing.
//!
//! Discovery sources announce endpoints as [`DiscoveryEvent`]s. The
//! [`ManualDiscoverySource`] turns explicit announcements from the hosting
//! application into such events.

mod endpoint;
mod information;
mod source;
mod translator;

pub use self::endpoint::DiscoveryEndpoint;
pub use self::information::{
    ConnectionLookup, DISCOVERY_VERSION_V1, DiscoveryVersions, EndpointInformation,
    PROTOCOL_VERSION_V1, ProtocolInformation,
};
pub use self::source::{DiscoveryEvent, DiscoverySource, ManualDiscoverySource};
pub use self::translator::{DiscoveryChannelTranslator, DiscoveryError};
