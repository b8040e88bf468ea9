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

//! Tracking of messages awaiting a response.

use crate::id::MessageId;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Routes responses back to the task that sent the request.
///
/// Entries are keyed by the id of the request; a response is matched through
/// its `in_response_to` field. Completion is synchronous so it can run inside
/// a channel sink.
///
/// # Examples
///
/// ```rust
/// use peercomm::id::MessageId;
/// use peercomm::protocol::ResponseWaiter;
///
/// # async fn example() {
/// let waiter = ResponseWaiter::<&'static str>::new();
/// let request = MessageId::next();
/// let rx = waiter.register(request);
///
/// assert!(waiter.complete(request, "pong"));
/// assert_eq!(rx.await.unwrap(), "pong");
/// assert!(!waiter.complete(request, "late"));
/// # }
/// ```
#[derive(Debug)]
pub struct ResponseWaiter<T> {
    pending: Mutex<HashMap<MessageId, oneshot::Sender<T>>>,
}

impl<T> ResponseWaiter<T> {
    /// Creates an empty waiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Registers interest in the response to `request`.
    pub fn register(&self, request: MessageId) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request, tx);
        rx
    }

    /// Hands `response` to whoever waits for `request`.
    ///
    /// Returns `false` when nobody waits, e.g. after a timeout.
    pub fn complete(&self, request: MessageId, response: T) -> bool {
        match self.pending.lock().remove(&request) {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Drops the wait for `request`.
    pub fn cancel(&self, request: MessageId) -> bool {
        self.pending.lock().remove(&request).is_some()
    }

    /// Drops every wait. Receivers observe a closed channel.
    pub fn cancel_all(&self) {
        self.pending.lock().clear();
    }

    /// Number of outstanding waits.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl<T> Default for ResponseWaiter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_closes_receiver() {
        let waiter = ResponseWaiter::<u32>::new();
        let id = MessageId::next();
        let rx = waiter.register(id);
        assert_eq!(waiter.len(), 1);
        assert!(waiter.cancel(id));
        assert!(waiter.is_empty());
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_routed_by_id() {
        let waiter = ResponseWaiter::<u32>::new();
        let first = MessageId::next();
        let second = MessageId::next();
        let rx1 = waiter.register(first);
        let rx2 = waiter.register(second);

        assert!(waiter.complete(second, 2));
        assert!(waiter.complete(first, 1));
        assert_eq!(rx1.await.unwrap(), 1);
        assert_eq!(rx2.await.unwrap(), 2);
    }

    #[test]
    fn test_dropped_receiver_is_not_completed() {
        let waiter = ResponseWaiter::<u32>::new();
        let id = MessageId::next();
        drop(waiter.register(id));
        assert!(!waiter.complete(id, 5));
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let waiter = ResponseWaiter::<u32>::new();
        let rx = waiter.register(MessageId::next());
        waiter.cancel_all();
        assert!(rx.await.is_err());
    }
}
