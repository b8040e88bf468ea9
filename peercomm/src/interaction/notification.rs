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

//! Notifications: events that cross endpoint boundaries.

use crate::id::{CommunicationSubject, EndpointId};
use crate::interaction::layer::Shared;
use crate::interaction::{InteractionError, NotificationId, TypeFallback};
use crate::serialization::ObjectValue;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Where a notification came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationSource {
    /// Raised in this process.
    Local,
    /// Raised by a remote endpoint and delivered through a proxy.
    Remote {
        /// The raising endpoint.
        endpoint: EndpointId,
        /// The notification as we subscribed to it.
        notification: NotificationId,
    },
}

/// Handle returned by [`Notification::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

type Handler<A> = Arc<dyn Fn(&NotificationSource, &A) + Send + Sync>;
type Forwarder<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Reacts to the first subscription and the last unsubscription.
pub(crate) trait SubscriptionHook: Send + Sync {
    fn on_first_subscriber(&self);
    fn on_last_unsubscribed(&self);
}

/// An event with arguments of type `A`.
///
/// Handlers run synchronously on the raising task; a panicking handler is
/// logged and does not affect the others.
///
/// # Examples
///
/// ```rust
/// use peercomm::interaction::{Notification, NotificationSource};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI32, Ordering};
///
/// let computed = Notification::<i32>::new();
/// let total = Arc::new(AtomicI32::new(0));
/// let sink = total.clone();
/// let subscription = computed.subscribe(move |source: &NotificationSource, value: &i32| {
///     assert_eq!(source, &NotificationSource::Local);
///     sink.fetch_add(*value, Ordering::SeqCst);
/// });
///
/// computed.raise(5);
/// assert!(computed.unsubscribe(subscription));
/// computed.raise(7);
/// assert_eq!(total.load(Ordering::SeqCst), 5);
/// ```
pub struct Notification<A> {
    inner: Arc<NotificationInner<A>>,
}

struct NotificationInner<A> {
    handlers: RwLock<Vec<(SubscriptionId, Handler<A>)>>,
    forwarders: RwLock<Vec<Forwarder<A>>>,
    hook: Option<Arc<dyn SubscriptionHook>>,
}

impl<A> Notification<A>
where
    A: Send + Sync + 'static,
{
    /// Creates a notification with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hook(None)
    }

    pub(crate) fn with_hook(hook: Option<Arc<dyn SubscriptionHook>>) -> Self {
        Self {
            inner: Arc::new(NotificationInner {
                handlers: RwLock::new(Vec::new()),
                forwarders: RwLock::new(Vec::new()),
                hook,
            }),
        }
    }

    /// Adds a handler.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&NotificationSource, &A) + Send + Sync + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        let first = {
            let mut handlers = self.inner.handlers.write();
            handlers.push((id, Arc::new(handler)));
            handlers.len() == 1
        };
        if first {
            if let Some(hook) = &self.inner.hook {
                hook.on_first_subscriber();
            }
        }
        id
    }

    /// Removes a handler. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let (removed, last) = {
            let mut handlers = self.inner.handlers.write();
            let before = handlers.len();
            handlers.retain(|(id, _)| *id != subscription);
            (handlers.len() != before, handlers.is_empty())
        };
        if removed && last {
            if let Some(hook) = &self.inner.hook {
                hook.on_last_unsubscribed();
            }
        }
        removed
    }

    /// Number of subscribed handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.read().len()
    }

    /// Raises the notification locally and forwards it to subscribed
    /// remote endpoints.
    pub fn raise(&self, args: A) {
        self.inner.deliver(&NotificationSource::Local, &args);
        let forwarders = self.inner.forwarders.read().clone();
        for forward in forwarders {
            forward(&args);
        }
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedNotification>
    where
        A: Clone,
    {
        self.inner.clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn ErasedNotification>
    where
        A: Clone,
    {
        let weak: Weak<NotificationInner<A>> = Arc::downgrade(&self.inner);
        weak
    }
}

impl<A> NotificationInner<A> {
    fn deliver(&self, source: &NotificationSource, args: &A) {
        let handlers: Vec<_> = self.handlers.read().iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(source, args))).is_err() {
                error!(?source, "notification handler panicked");
            }
        }
    }
}

impl<A> Clone for Notification<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A> Default for Notification<A>
where
    A: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Notification<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("arguments", &std::any::type_name::<A>())
            .field("subscribers", &self.inner.handlers.read().len())
            .finish()
    }
}

/// Type erased view of a [`Notification`].
pub(crate) trait ErasedNotification: Send + Sync {
    /// Calls `forward` with every locally raised argument value.
    fn add_forwarder(&self, forward: Arc<dyn Fn(ObjectValue) + Send + Sync>);

    /// Runs the handlers. Returns `false` if `args` has the wrong type.
    fn deliver_erased(&self, source: &NotificationSource, args: &ObjectValue) -> bool;
}

impl<A> ErasedNotification for NotificationInner<A>
where
    A: Any + Clone + Send + Sync,
{
    fn add_forwarder(&self, forward: Arc<dyn Fn(ObjectValue) + Send + Sync>) {
        self.forwarders
            .write()
            .push(Arc::new(move |args: &A| forward(ObjectValue::new(args.clone()))));
    }

    fn deliver_erased(&self, source: &NotificationSource, args: &ObjectValue) -> bool {
        match args.downcast_ref::<A>() {
            Some(args) => {
                self.deliver(source, args);
                true
            }
            None => false,
        }
    }
}

/// One notification of a set.
#[derive(Clone)]
pub struct NotificationDefinition {
    member: String,
    notification: Arc<dyn ErasedNotification>,
}

impl NotificationDefinition {
    /// Creates a definition for `member`.
    pub fn new<A>(member: impl Into<String>, notification: &Notification<A>) -> Self
    where
        A: Any + Clone + Send + Sync,
    {
        Self {
            member: member.into(),
            notification: notification.erased(),
        }
    }

    /// Name of the notification.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }
}

impl fmt::Debug for NotificationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDefinition")
            .field("member", &self.member)
            .finish_non_exhaustive()
    }
}

/// A set of notifications offered to remote endpoints.
///
/// Usually generated by `#[notification_set]`.
pub trait NotificationSet: Send + Sync {
    /// Identity of the set, newest version first.
    fn descriptor(&self) -> TypeFallback;

    /// The notifications of the set.
    fn definitions(&self) -> Vec<NotificationDefinition>;
}

/// Sends locally raised notifications to their remote subscribers.
pub(crate) trait NotificationForwarder: Send + Sync {
    fn forward(&self, subscribers: Vec<(EndpointId, NotificationId)>, args: ObjectValue);
}

struct RegisteredNotifications {
    subject: CommunicationSubject,
    descriptor: TypeFallback,
    members: Vec<String>,
}

/// Notification sets this endpoint provides and who subscribed to them.
pub struct LocalNotificationCollection {
    inner: Arc<LocalInner>,
}

struct LocalInner {
    sets: RwLock<Vec<RegisteredNotifications>>,
    /// Keyed by our own id of the notification; values map each subscriber
    /// to the id it used when subscribing.
    subscriptions: RwLock<HashMap<NotificationId, HashMap<EndpointId, NotificationId>>>,
    forwarder: Arc<dyn NotificationForwarder>,
}

impl LocalInner {
    fn subscribers(&self, notification: &NotificationId) -> Vec<(EndpointId, NotificationId)> {
        self.subscriptions
            .read()
            .get(notification)
            .map(|s| s.iter().map(|(e, n)| (e.clone(), n.clone())).collect())
            .unwrap_or_default()
    }

    fn resolve(&self, requested: &NotificationId) -> Result<NotificationId, InteractionError> {
        let sets = self.sets.read();
        let set = sets
            .iter()
            .find(|s| s.descriptor.matches(&requested.declaring))
            .ok_or_else(|| InteractionError::UnableToLoadProxyType {
                type_name: requested.declaring.to_string(),
            })?;
        if !set.members.iter().any(|m| m == &requested.member) {
            return Err(InteractionError::UnknownNotification {
                type_name: set.descriptor.to_string(),
                member: requested.member.clone(),
            });
        }
        Ok(NotificationId::new(set.descriptor.clone(), requested.member.clone()))
    }
}

impl LocalNotificationCollection {
    pub(crate) fn new(forwarder: Arc<dyn NotificationForwarder>) -> Self {
        Self {
            inner: Arc::new(LocalInner {
                sets: RwLock::new(Vec::new()),
                subscriptions: RwLock::new(HashMap::new()),
                forwarder,
            }),
        }
    }

    /// Registers `set` under `subject` and starts forwarding its
    /// notifications.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::AlreadyRegistered`] if a set with the same
    /// newest identity is registered for the subject.
    pub fn register(&self, subject: CommunicationSubject, set: &dyn NotificationSet) -> Result<(), InteractionError> {
        let descriptor = set.descriptor();
        let definitions = set.definitions();
        {
            let mut sets = self.inner.sets.write();
            if sets
                .iter()
                .any(|s| s.subject == subject && s.descriptor.primary() == descriptor.primary())
            {
                return Err(InteractionError::AlreadyRegistered {
                    type_name: descriptor.to_string(),
                });
            }
            sets.push(RegisteredNotifications {
                subject: subject.clone(),
                descriptor: descriptor.clone(),
                members: definitions.iter().map(|d| d.member.clone()).collect(),
            });
        }
        for definition in definitions {
            let id = NotificationId::new(descriptor.clone(), definition.member.clone());
            let inner = Arc::downgrade(&self.inner);
            definition.notification.add_forwarder(Arc::new(move |args| {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                let subscribers = inner.subscribers(&id);
                if !subscribers.is_empty() {
                    inner.forwarder.forward(subscribers, args);
                }
            }));
        }
        debug!(%subject, set = %descriptor, "notification set registered");
        Ok(())
    }

    /// Subscribes `endpoint` to the notification it names.
    ///
    /// # Errors
    ///
    /// Fails when no registered set provides the notification.
    pub fn subscribe(&self, endpoint: &EndpointId, requested: NotificationId) -> Result<(), InteractionError> {
        let ours = self.inner.resolve(&requested)?;
        debug!(%endpoint, notification = %ours, "remote subscribed");
        self.inner
            .subscriptions
            .write()
            .entry(ours)
            .or_default()
            .insert(endpoint.clone(), requested);
        Ok(())
    }

    /// Unsubscribes `endpoint`. Unknown subscriptions are ignored.
    ///
    /// # Errors
    ///
    /// Fails when no registered set provides the notification.
    pub fn unsubscribe(&self, endpoint: &EndpointId, requested: &NotificationId) -> Result<(), InteractionError> {
        let ours = self.inner.resolve(requested)?;
        if let Some(subscribers) = self.inner.subscriptions.write().get_mut(&ours) {
            subscribers.remove(endpoint);
        }
        debug!(%endpoint, notification = %ours, "remote unsubscribed");
        Ok(())
    }

    /// Drops every subscription of `endpoint`.
    pub fn remove_endpoint(&self, endpoint: &EndpointId) {
        for subscribers in self.inner.subscriptions.write().values_mut() {
            subscribers.remove(endpoint);
        }
    }

    /// Endpoints subscribed to `notification`, named by our own id.
    #[must_use]
    pub fn subscribers_of(&self, notification: &NotificationId) -> Vec<EndpointId> {
        self.inner
            .subscribers(notification)
            .into_iter()
            .map(|(endpoint, _)| endpoint)
            .collect()
    }

    /// Sets registered for `subject`.
    #[must_use]
    pub fn provided_for(&self, subject: &CommunicationSubject) -> Vec<TypeFallback> {
        self.inner
            .sets
            .read()
            .iter()
            .filter(|s| &s.subject == subject)
            .map(|s| s.descriptor.clone())
            .collect()
    }

    /// Every registered set.
    #[must_use]
    pub fn descriptors(&self) -> Vec<TypeFallback> {
        self.inner.sets.read().iter().map(|s| s.descriptor.clone()).collect()
    }
}

impl fmt::Debug for LocalNotificationCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalNotificationCollection")
            .field("sets", &self.inner.sets.read().len())
            .field("subscriptions", &self.inner.subscriptions.read().len())
            .finish()
    }
}

/// Routes notifications raised by remote endpoints to local proxies.
#[derive(Default)]
pub(crate) struct RemoteNotificationHub {
    routes: RwLock<HashMap<(EndpointId, NotificationId), Vec<Weak<dyn ErasedNotification>>>>,
}

impl RemoteNotificationHub {
    pub(crate) fn add(&self, endpoint: EndpointId, notification: NotificationId, target: Weak<dyn ErasedNotification>) {
        self.routes
            .write()
            .entry((endpoint, notification))
            .or_default()
            .push(target);
    }

    /// Delivers to every live proxy notification; returns how many ran.
    pub(crate) fn deliver(&self, endpoint: &EndpointId, notification: &NotificationId, args: &ObjectValue) -> usize {
        let key = (endpoint.clone(), notification.clone());
        let targets: Vec<_> = {
            let mut routes = self.routes.write();
            let Some(targets) = routes.get_mut(&key) else {
                return 0;
            };
            targets.retain(|t| t.strong_count() > 0);
            targets.iter().filter_map(Weak::upgrade).collect()
        };
        let source = NotificationSource::Remote {
            endpoint: endpoint.clone(),
            notification: notification.clone(),
        };
        let mut delivered = 0;
        for target in targets {
            if target.deliver_erased(&source, args) {
                delivered += 1;
            } else {
                error!(%endpoint, %notification, actual = args.type_name(), "notification arguments have an unexpected type");
            }
        }
        delivered
    }

    pub(crate) fn remove_endpoint(&self, endpoint: &EndpointId) {
        self.routes.write().retain(|(e, _), _| e != endpoint);
    }
}

/// A typed proxy for a remote notification set.
///
/// Usually generated by `#[notification_set]`.
pub trait NotificationSetProxy: Send + Sync + Sized + 'static {
    /// Identity of the set, newest version first.
    fn descriptor() -> TypeFallback;

    /// Wraps a handle to the remote set.
    fn from_handle(handle: NotificationProxyHandle) -> Self;
}

/// Untyped access to a notification set on one remote endpoint.
#[derive(Clone)]
pub struct NotificationProxyHandle {
    endpoint: EndpointId,
    declaring: TypeFallback,
    shared: Arc<Shared>,
}

impl NotificationProxyHandle {
    pub(crate) fn new(endpoint: EndpointId, declaring: TypeFallback, shared: Arc<Shared>) -> Self {
        Self {
            endpoint,
            declaring,
            shared,
        }
    }

    /// The remote endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }

    /// A local notification mirroring `member` of the remote set.
    ///
    /// The first subscriber registers with the remote endpoint, the last
    /// unsubscribe unregisters.
    pub fn notification<A>(&self, member: &str) -> Notification<A>
    where
        A: Any + Clone + Send + Sync,
    {
        let id = NotificationId::new(self.declaring.clone(), member);
        let hook = self.shared.subscription_hook(self.endpoint.clone(), id.clone());
        let notification = Notification::with_hook(Some(hook));
        self.shared
            .hub
            .add(self.endpoint.clone(), id, notification.downgrade());
        notification
    }
}

impl fmt::Debug for NotificationProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationProxyHandle")
            .field("endpoint", &self.endpoint)
            .field("declaring", &self.declaring)
            .finish_non_exhaustive()
    }
}
