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

//! Interaction layer: commands and notifications between endpoints.
//!
//! Endpoints group what they offer and need by [`CommunicationSubject`]. Once
//! a handshake completes the two sides swap their [`SubjectGroup`]s and each
//! decides with [`evaluate_interaction`] whether it wants to interact.
//! Command sets are then invoked remotely through a [`CommandSetProxy`] and
//! notification sets are observed through a [`NotificationSetProxy`].
//!
//! Sets and proxies are usually generated with the `command_set` and
//! `notification_set` attribute macros.
//!
//! [`CommunicationSubject`]: crate::id::CommunicationSubject

mod command;
mod error;
mod ids;
mod layer;
mod notification;
mod subjects;

pub use self::command::{
    CommandDefinition, CommandFuture, CommandOutcome, CommandProxyHandle, CommandSet,
    CommandSetProxy, LocalCommandCollection, param,
};
pub use self::error::{CommandError, InteractionError};
pub use self::ids::{CommandId, NotificationId, TypeFallback, TypeIdentity};
pub use self::layer::{InteractionConfig, InteractionEvent, InteractionLayer};
pub use self::notification::{
    LocalNotificationCollection, Notification, NotificationDefinition, NotificationProxyHandle,
    NotificationSet, NotificationSetProxy, NotificationSource, SubscriptionId,
};
pub use self::subjects::{InteractionConnectionState, SubjectGroup, evaluate_interaction};
