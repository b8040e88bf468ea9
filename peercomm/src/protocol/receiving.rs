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

//! Message receiving endpoint.

use crate::protocol::{CommunicationMessage, MessageData, MessageTranslator};
use crate::transport::MessageSink;
use parking_lot::RwLock;
use std::error::Error;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{error, trace};

/// Error type returned by receive side handlers.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Callback fired once per accepted message.
///
/// Handlers run on the delivering task and must not block. Errors and panics
/// are logged by the endpoint and never reach the channel.
pub trait MessageHandler: Send + Sync {
    /// Handles one message.
    fn on_message(&self, message: &CommunicationMessage) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&CommunicationMessage) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_message(&self, message: &CommunicationMessage) -> Result<(), HandlerError> {
        self(message)
    }
}

/// Server half of a message channel for one protocol version.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::{EndpointId, MessageId};
/// use peercomm::protocol::{
///     CommunicationMessage, HandlerError, MessageData, MessageReceivingEndpoint, MessageTranslator,
/// };
/// use peercomm::serialization::ObjectSerializerRegistry;
/// use peercomm::transport::MessageSink;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let translator = Arc::new(MessageTranslator::v1(Arc::new(ObjectSerializerRegistry::with_defaults())));
/// let endpoint = MessageReceivingEndpoint::new(translator);
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = seen.clone();
/// endpoint.on_new_message(move |_: &CommunicationMessage| -> Result<(), HandlerError> {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// endpoint.accept_message(MessageData::unknown(MessageId::next(), EndpointId::new("a"), MessageId::NONE));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct MessageReceivingEndpoint {
    translator: Arc<MessageTranslator>,
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
}

impl MessageReceivingEndpoint {
    /// Creates an endpoint translating with `translator`.
    pub fn new(translator: Arc<MessageTranslator>) -> Self {
        Self {
            translator,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Adds a handler for new messages.
    pub fn on_new_message(&self, handler: impl MessageHandler + 'static) {
        self.handlers.write().push(Arc::new(handler));
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl MessageSink for MessageReceivingEndpoint {
    fn accept_message(&self, data: MessageData) {
        let message = self.translator.to_message(&data);
        trace!(message_id = %message.id(), message_type = %message.message_type(), sender = %message.sender(), "message received");
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            run_handler("message", || handler.on_message(&message));
        }
    }
}

impl std::fmt::Debug for MessageReceivingEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReceivingEndpoint")
            .field("version", &self.translator.version())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Runs a receive side handler, logging its error or panic.
pub(crate) fn run_handler(kind: &'static str, handler: impl FnOnce() -> Result<(), HandlerError>) {
    match catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(kind, error = %e, "receive handler failed"),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(kind, %reason, "receive handler panicked");
        }
    }
}
