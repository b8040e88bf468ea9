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

//! Message sending endpoint that rebuilds faulted channels.

use crate::protocol::{CommunicationMessage, MessageData, MessageTranslator, ProtocolError};
use crate::transport::{ChannelTemplate, MessageChannel, TransportError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

/// Sends messages to one remote message receiving endpoint.
///
/// The channel is opened lazily on the first send. A fault while opening or
/// sending discards the channel; the next attempt opens a fresh one. The
/// message is translated once, so every attempt carries the same id.
///
/// The channel lock is held for the whole send, which serializes channel
/// rebuilding per remote endpoint.
pub struct RestoringMessageSendingEndpoint {
    address: Url,
    template: Arc<dyn ChannelTemplate>,
    translator: Arc<MessageTranslator>,
    channel: Mutex<Option<Box<dyn MessageChannel>>>,
}

impl RestoringMessageSendingEndpoint {
    /// Creates an endpoint for the receiver at `address`.
    pub fn new(address: Url, template: Arc<dyn ChannelTemplate>, translator: Arc<MessageTranslator>) -> Self {
        Self {
            address,
            template,
            translator,
            channel: Mutex::new(None),
        }
    }

    /// Address of the remote receiving endpoint.
    #[must_use]
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Sends `message`, retrying up to `max_retries` times after a fault.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FailedToSend`] carrying the last fault once
    /// `1 + max_retries` attempts have faulted.
    #[instrument(skip(self, message), fields(address = %self.address, message_id = %message.id(), message_type = %message.message_type()))]
    pub async fn send(&self, message: &CommunicationMessage, max_retries: u32) -> Result<(), ProtocolError> {
        let data = self.translator.from_message(message);
        let mut guard = self.channel.lock().await;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self.attempt(&mut guard, data.clone()).await;
            match outcome {
                Ok(()) => {
                    debug!(attempts, "message sent");
                    return Ok(());
                }
                Err(e) => {
                    discard(&mut guard).await;
                    if attempts > max_retries {
                        warn!(attempts, error = %e, "giving up on message");
                        return Err(ProtocolError::FailedToSend {
                            address: self.address.to_string(),
                            attempts,
                            source: e,
                        });
                    }
                    debug!(attempts, error = %e, "send faulted, rebuilding channel");
                }
            }
        }
    }

    async fn attempt(
        &self,
        slot: &mut Option<Box<dyn MessageChannel>>,
        data: MessageData,
    ) -> Result<(), TransportError> {
        let channel = match slot.take() {
            Some(channel) => channel,
            None => self.template.open_message_channel(&self.address).await?,
        };
        slot.insert(channel).accept_message(data).await
    }

    /// Closes the current channel, if any.
    pub async fn close(&self) {
        discard(&mut *self.channel.lock().await).await;
    }
}

async fn discard(slot: &mut Option<Box<dyn MessageChannel>>) {
    if let Some(mut channel) = slot.take() {
        if let Err(e) = channel.close().await {
            debug!(error = %e, "ignoring fault while closing message channel");
        }
    }
}

impl std::fmt::Debug for RestoringMessageSendingEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoringMessageSendingEndpoint")
            .field("address", &self.address)
            .field("template", &self.template.name())
            .finish_non_exhaustive()
    }
}
