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

//! Per remote endpoint channel ownership.

use crate::discovery::ProtocolInformation;
use crate::id::EndpointId;
use crate::protocol::{
    CommunicationMessage, DataTransfer, MessageTranslator, ProtocolError,
    RestoringDataTransferingEndpoint, RestoringMessageSendingEndpoint,
};
use crate::transport::ChannelTemplate;
use std::sync::Arc;

/// The send side channels the protocol layer owns for one remote endpoint.
#[derive(Debug)]
pub struct ConnectionSession {
    remote: EndpointId,
    protocol: ProtocolInformation,
    messages: RestoringMessageSendingEndpoint,
    data: Option<RestoringDataTransferingEndpoint>,
}

impl ConnectionSession {
    /// Creates the session. Channels open on first use.
    pub fn new(
        remote: EndpointId,
        protocol: ProtocolInformation,
        template: Arc<dyn ChannelTemplate>,
        translator: Arc<MessageTranslator>,
    ) -> Self {
        let messages = RestoringMessageSendingEndpoint::new(
            protocol.message_address.clone(),
            template.clone(),
            translator,
        );
        let data = protocol
            .data_address
            .clone()
            .map(|address| RestoringDataTransferingEndpoint::new(address, template));
        Self {
            remote,
            protocol,
            messages,
            data,
        }
    }

    /// The remote endpoint.
    #[must_use]
    pub fn remote(&self) -> &EndpointId {
        &self.remote
    }

    /// Negotiated connection information of the remote endpoint.
    #[must_use]
    pub fn protocol(&self) -> &ProtocolInformation {
        &self.protocol
    }

    /// Sends a message to the remote endpoint.
    pub async fn send_message(&self, message: &CommunicationMessage, max_retries: u32) -> Result<(), ProtocolError> {
        self.messages.send(message, max_retries).await
    }

    /// Sends data to the remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NoDataChannel`] if the remote did not
    /// advertise a data address.
    pub async fn send_data(&self, transfer: DataTransfer, max_retries: u32) -> Result<(), ProtocolError> {
        match &self.data {
            Some(data) => data.send(transfer, max_retries).await,
            None => Err(ProtocolError::NoDataChannel {
                endpoint: self.remote.clone(),
            }),
        }
    }

    /// Closes the data channel, then the message channel.
    pub async fn close(&self) {
        if let Some(data) = &self.data {
            data.close().await;
        }
        self.messages.close().await;
    }
}
