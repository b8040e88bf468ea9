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

//! Protocol channel layer.
//!
//! This module sits between the channel bindings and the interaction layer:
//!
//! - [`CommunicationMessage`] and [`MessageKind`] model every message
//! - [`converters`] translate messages to and from versioned [`MessageData`]
//! - [`RestoringMessageSendingEndpoint`] and
//!   [`RestoringDataTransferingEndpoint`] send with retry and channel rebuild
//! - [`MessageReceivingEndpoint`] and [`DataReceivingEndpoint`] receive and
//!   isolate handler failures
//! - [`ProtocolLayer`] ties the endpoints of one local endpoint together and
//!   [`HandshakeConductor`] connects it to peers

mod approver;
pub mod converters;
mod data;
mod data_transfer;
mod description;
mod error;
mod handshake;
mod layer;
mod message;
mod receiving;
mod sending;
mod session;
mod uploads;
mod waiter;

pub use self::approver::{ConnectionApprover, SubjectApprover};
pub use self::converters::{MessageConverter, MessageTranslator};
pub use self::data::{DataTransfer, MessageData, UNKNOWN_MESSAGE_TYPE};
pub use self::data_transfer::{DataHandler, DataReceivingEndpoint, RestoringDataTransferingEndpoint};
pub use self::description::CommunicationDescription;
pub use self::error::{ConversionError, ProtocolError};
pub use self::handshake::{ConnectedEndpoint, ConnectionEvent, HandshakeConductor, HandshakeState};
pub use self::layer::{
    EchoResponder, MessageProcessor, ProtocolLayer, ProtocolLayerConfig, VerificationResponder,
};
pub use self::message::{
    CommandInvocation, CommunicationMessage, EndpointConnect, MessageHeader, MessageKind,
    MessageType, NotificationRaised,
};
pub use self::receiving::{HandlerError, MessageHandler, MessageReceivingEndpoint};
pub use self::sending::RestoringMessageSendingEndpoint;
pub use self::session::ConnectionSession;
pub use self::uploads::{UploadRegistry, UploadSource, UploadToken};
pub use self::waiter::ResponseWaiter;
