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

//! Data channel endpoints.
//!
//! Data moves in answer to a download request: the requester sends a
//! [`MessageKind::DownloadRequest`](crate::protocol::MessageKind) naming an
//! [`UploadToken`](crate::protocol::UploadToken), the owner of the token
//! answers with a [`DataTransfer`] over its data channel.

use crate::id::MessageId;
use crate::protocol::receiving::{HandlerError, run_handler};
use crate::protocol::{DataTransfer, ProtocolError, ResponseWaiter};
use crate::transport::{ChannelTemplate, DataChannel, DataSink, TransportError};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, instrument, trace, warn};
use url::Url;

/// Callback fired once per accepted block of data.
pub trait DataHandler: Send + Sync {
    /// Handles one block of data.
    fn on_data(&self, transfer: &DataTransfer) -> Result<(), HandlerError>;
}

impl<F> DataHandler for F
where
    F: Fn(&DataTransfer) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_data(&self, transfer: &DataTransfer) -> Result<(), HandlerError> {
        self(transfer)
    }
}

/// Sends data to one remote data receiving endpoint.
///
/// Same fault contract as
/// [`RestoringMessageSendingEndpoint`](crate::protocol::RestoringMessageSendingEndpoint).
pub struct RestoringDataTransferingEndpoint {
    address: Url,
    template: Arc<dyn ChannelTemplate>,
    channel: Mutex<Option<Box<dyn DataChannel>>>,
}

impl RestoringDataTransferingEndpoint {
    /// Creates an endpoint for the receiver at `address`.
    pub fn new(address: Url, template: Arc<dyn ChannelTemplate>) -> Self {
        Self {
            address,
            template,
            channel: Mutex::new(None),
        }
    }

    /// Address of the remote data receiving endpoint.
    #[must_use]
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Sends `transfer`, retrying up to `max_retries` times after a fault.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FailedToSend`] once every attempt faulted.
    #[instrument(skip(self, transfer), fields(address = %self.address, bytes = transfer.data.len()))]
    pub async fn send(&self, transfer: DataTransfer, max_retries: u32) -> Result<(), ProtocolError> {
        let mut guard = self.channel.lock().await;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(&mut guard, transfer.clone()).await {
                Ok(()) => {
                    debug!(attempts, "data sent");
                    return Ok(());
                }
                Err(e) => {
                    discard(&mut guard).await;
                    if attempts > max_retries {
                        warn!(attempts, error = %e, "giving up on data transfer");
                        return Err(ProtocolError::FailedToSend {
                            address: self.address.to_string(),
                            attempts,
                            source: e,
                        });
                    }
                    debug!(attempts, error = %e, "data send faulted, rebuilding channel");
                }
            }
        }
    }

    async fn attempt(
        &self,
        slot: &mut Option<Box<dyn DataChannel>>,
        transfer: DataTransfer,
    ) -> Result<(), TransportError> {
        let channel = match slot.take() {
            Some(channel) => channel,
            None => self.template.open_data_channel(&self.address).await?,
        };
        slot.insert(channel).accept_data(transfer).await
    }

    /// Closes the current channel, if any.
    pub async fn close(&self) {
        discard(&mut *self.channel.lock().await).await;
    }
}

async fn discard(slot: &mut Option<Box<dyn DataChannel>>) {
    if let Some(mut channel) = slot.take() {
        if let Err(e) = channel.close().await {
            debug!(error = %e, "ignoring fault while closing data channel");
        }
    }
}

impl std::fmt::Debug for RestoringDataTransferingEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoringDataTransferingEndpoint")
            .field("address", &self.address)
            .field("template", &self.template.name())
            .finish_non_exhaustive()
    }
}

/// Server half of a data channel.
///
/// Data answering a pending download goes to its waiter; every block is
/// also handed to the registered handlers.
#[derive(Default)]
pub struct DataReceivingEndpoint {
    downloads: ResponseWaiter<DataTransfer>,
    handlers: RwLock<Vec<Arc<dyn DataHandler>>>,
}

impl DataReceivingEndpoint {
    /// Creates an endpoint with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for new data.
    pub fn on_new_data(&self, handler: impl DataHandler + 'static) {
        self.handlers.write().push(Arc::new(handler));
    }

    /// Waits for the data answering the download request `request`.
    pub fn expect_download(&self, request: MessageId) -> oneshot::Receiver<DataTransfer> {
        self.downloads.register(request)
    }

    /// Stops waiting for the data answering `request`.
    pub fn cancel_download(&self, request: MessageId) {
        self.downloads.cancel(request);
    }
}

impl DataSink for DataReceivingEndpoint {
    fn accept_data(&self, transfer: DataTransfer) {
        trace!(sender = %transfer.sender, bytes = transfer.data.len(), "data received");
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            run_handler("data", || handler.on_data(&transfer));
        }
        let request = transfer.in_response_to;
        if !request.is_none() && !self.downloads.complete(request, transfer) {
            debug!(%request, "no download waiting for data");
        }
    }
}

impl std::fmt::Debug for DataReceivingEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReceivingEndpoint")
            .field("pending_downloads", &self.downloads.len())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EndpointId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transfer(in_response_to: MessageId) -> DataTransfer {
        DataTransfer {
            sender: EndpointId::new("a"),
            receiver: EndpointId::new("b"),
            in_response_to,
            token: None,
            data: b"payload".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_download_waiter_receives_data() {
        let endpoint = DataReceivingEndpoint::new();
        let request = MessageId::next();
        let rx = endpoint.expect_download(request);
        endpoint.accept_data(transfer(request));
        assert_eq!(rx.await.unwrap().data, b"payload");
    }

    #[test]
    fn test_handlers_see_unsolicited_data() {
        let endpoint = DataReceivingEndpoint::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        endpoint.on_new_data(|_: &DataTransfer| -> Result<(), HandlerError> { Err("broken".into()) });
        endpoint.on_new_data(move |t: &DataTransfer| -> Result<(), HandlerError> {
            assert_eq!(t.receiver, EndpointId::new("b"));
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        endpoint.accept_data(transfer(MessageId::NONE));
        endpoint.accept_data(transfer(MessageId::next()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
