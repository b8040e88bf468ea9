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

//! Command sets: local registration, dispatch and remote proxies.

use crate::id::{CommunicationSubject, EndpointId};
use crate::interaction::layer::Shared;
use crate::interaction::{CommandError, CommandId, InteractionError, TypeFallback};
use crate::protocol::{CommandInvocation, CommunicationMessage, MessageKind};
use crate::serialization::ObjectValue;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// What a command produced.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// A result value, answered with a command response.
    Value(ObjectValue),
    /// No meaningful result, answered with a success message.
    Completed,
}

impl CommandOutcome {
    /// Wraps a command's return value. `()` becomes [`CommandOutcome::Completed`].
    pub fn from_value<R>(value: R) -> Self
    where
        R: Any + Send + Sync,
    {
        if TypeId::of::<R>() == TypeId::of::<()>() {
            Self::Completed
        } else {
            Self::Value(ObjectValue::new(value))
        }
    }
}

/// Future returned by a command invoker.
pub type CommandFuture = BoxFuture<'static, Result<CommandOutcome, CommandError>>;

type Invoker = dyn Fn(Vec<ObjectValue>) -> CommandFuture + Send + Sync;

/// One invocable command of a set.
#[derive(Clone)]
pub struct CommandDefinition {
    member: String,
    invoker: Arc<Invoker>,
}

impl CommandDefinition {
    /// Creates a definition for `member`.
    pub fn new<F>(member: impl Into<String>, invoker: F) -> Self
    where
        F: Fn(Vec<ObjectValue>) -> CommandFuture + Send + Sync + 'static,
    {
        Self {
            member: member.into(),
            invoker: Arc::new(invoker),
        }
    }

    /// Name of the command.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Runs the command.
    pub fn invoke(&self, parameters: Vec<ObjectValue>) -> CommandFuture {
        (self.invoker)(parameters)
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("member", &self.member)
            .finish_non_exhaustive()
    }
}

/// A set of commands offered to remote endpoints.
///
/// Usually generated by `#[command_set]`.
pub trait CommandSet: Send + Sync {
    /// Identity of the set, newest version first.
    fn descriptor(&self) -> TypeFallback;

    /// The commands of the set.
    fn definitions(&self) -> Vec<CommandDefinition>;
}

/// Extracts parameter `index` as a `T`.
///
/// # Errors
///
/// Returns [`CommandError::InvalidArgument`] when the parameter is missing
/// or has another type.
///
/// # Examples
///
/// ```rust
/// use peercomm::interaction::param;
/// use peercomm::serialization::ObjectValue;
///
/// let params = vec![ObjectValue::new(4i32)];
/// assert_eq!(param::<i32>(&params, 0).unwrap(), 4);
/// assert!(param::<String>(&params, 0).is_err());
/// assert!(param::<i32>(&params, 1).is_err());
/// ```
pub fn param<T>(parameters: &[ObjectValue], index: usize) -> Result<T, CommandError>
where
    T: Any + Clone,
{
    let value = parameters.get(index).ok_or_else(|| CommandError::InvalidArgument {
        index,
        reason: "missing".to_string(),
    })?;
    value
        .downcast_cloned::<T>()
        .ok_or_else(|| CommandError::InvalidArgument {
            index,
            reason: format!("expected '{}', got '{}'", type_name::<T>(), value.type_name()),
        })
}

struct RegisteredCommands {
    subject: CommunicationSubject,
    descriptor: TypeFallback,
    commands: HashMap<String, CommandDefinition>,
}

/// Command sets this endpoint provides, grouped by subject.
#[derive(Default)]
pub struct LocalCommandCollection {
    sets: RwLock<Vec<RegisteredCommands>>,
}

impl LocalCommandCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `set` under `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::AlreadyRegistered`] if a set with the same
    /// newest identity is registered for the subject.
    pub fn register(&self, subject: CommunicationSubject, set: &dyn CommandSet) -> Result<(), InteractionError> {
        let descriptor = set.descriptor();
        let mut sets = self.sets.write();
        if sets
            .iter()
            .any(|s| s.subject == subject && s.descriptor.primary() == descriptor.primary())
        {
            return Err(InteractionError::AlreadyRegistered {
                type_name: descriptor.to_string(),
            });
        }
        let commands = set
            .definitions()
            .into_iter()
            .map(|d| (d.member.clone(), d))
            .collect();
        debug!(%subject, set = %descriptor, "command set registered");
        sets.push(RegisteredCommands {
            subject,
            descriptor,
            commands,
        });
        Ok(())
    }

    /// Finds the command a remote endpoint asked for.
    ///
    /// The declaring type is matched through its version fallback.
    ///
    /// # Errors
    ///
    /// [`InteractionError::UnableToLoadProxyType`] when no registered set
    /// matches, [`InteractionError::UnknownCommand`] when the set lacks the
    /// member.
    pub fn resolve(&self, command: &CommandId) -> Result<CommandDefinition, InteractionError> {
        let sets = self.sets.read();
        let set = sets
            .iter()
            .find(|s| s.descriptor.matches(&command.declaring))
            .ok_or_else(|| InteractionError::UnableToLoadProxyType {
                type_name: command.declaring.to_string(),
            })?;
        set.commands
            .get(&command.member)
            .cloned()
            .ok_or_else(|| InteractionError::UnknownCommand {
                type_name: set.descriptor.to_string(),
                member: command.member.clone(),
            })
    }

    /// Sets registered for `subject`.
    #[must_use]
    pub fn provided_for(&self, subject: &CommunicationSubject) -> Vec<TypeFallback> {
        self.sets
            .read()
            .iter()
            .filter(|s| &s.subject == subject)
            .map(|s| s.descriptor.clone())
            .collect()
    }

    /// Every registered set.
    #[must_use]
    pub fn descriptors(&self) -> Vec<TypeFallback> {
        self.sets.read().iter().map(|s| s.descriptor.clone()).collect()
    }
}

impl fmt::Debug for LocalCommandCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sets.read().iter().map(|s| (&s.subject, &s.descriptor)))
            .finish()
    }
}

/// A typed proxy for a remote command set.
///
/// Usually generated by `#[command_set]`.
pub trait CommandSetProxy: Send + Sync + Sized + 'static {
    /// Identity of the set, newest version first.
    fn descriptor() -> TypeFallback;

    /// Wraps a handle to the remote set.
    fn from_handle(handle: CommandProxyHandle) -> Self;
}

/// Untyped access to a command set on one remote endpoint.
#[derive(Clone)]
pub struct CommandProxyHandle {
    endpoint: EndpointId,
    declaring: TypeFallback,
    shared: Arc<Shared>,
}

impl CommandProxyHandle {
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

    /// Invokes `member` on the remote endpoint.
    ///
    /// Nothing is sent until the returned future is first polled. From then
    /// on the round trip runs on its own task, and dropping the future
    /// abandons the result but not the invocation.
    ///
    /// # Errors
    ///
    /// A [`CommandError`] describing what went wrong; see its variants.
    pub async fn invoke<R>(&self, member: &str, parameters: Vec<ObjectValue>) -> Result<R, CommandError>
    where
        R: Any + Clone + Send,
    {
        let handle = self.clone();
        let command = CommandId::new(self.declaring.clone(), member);
        let result = tokio::spawn(async move { handle.round_trip(command, parameters).await })
            .await
            .map_err(|e| CommandError::failed(format!("command task failed: {e}")))??;
        result
            .downcast_cloned::<R>()
            .ok_or_else(|| CommandError::UnexpectedResult {
                expected: type_name::<R>(),
                actual: result.type_name(),
            })
    }

    #[instrument(skip(self, parameters), fields(remote = %self.endpoint))]
    async fn round_trip(&self, command: CommandId, parameters: Vec<ObjectValue>) -> Result<ObjectValue, CommandError> {
        let shared = &self.shared;
        if !shared.conductor.has_accepted(&self.endpoint) {
            return Err(CommandError::EndpointNotConnected {
                endpoint: self.endpoint.clone(),
            });
        }
        for parameter in &parameters {
            shared.objects.ensure_serializer_for(parameter)?;
        }
        let layer = shared.conductor.layer();
        let request = CommunicationMessage::new(
            layer.id().clone(),
            MessageKind::CommandInvoked(CommandInvocation { command, parameters }),
        );
        let response = layer
            .send_message_and_wait_for_response(
                &self.endpoint,
                &request,
                shared.config.max_send_retries,
                shared.config.response_timeout,
            )
            .await?;
        match response.into_kind() {
            MessageKind::CommandInvokedResponse { result } => Ok(result),
            MessageKind::Success => Ok(ObjectValue::unit()),
            MessageKind::Failure { reason } => Err(CommandError::Failed { reason }),
            other => Err(CommandError::UnexpectedResponse {
                actual: other.message_type(),
            }),
        }
    }
}

impl fmt::Debug for CommandProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandProxyHandle")
            .field("endpoint", &self.endpoint)
            .field("declaring", &self.declaring)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Version;
    use crate::interaction::TypeIdentity;

    struct Echo;

    impl CommandSet for Echo {
        fn descriptor(&self) -> TypeFallback {
            TypeFallback::new(TypeIdentity::new("test.Echo", Version::new(2, 0, 0)))
                .with_fallback(TypeIdentity::new("test.Echo", Version::new(1, 0, 0)))
        }

        fn definitions(&self) -> Vec<CommandDefinition> {
            vec![CommandDefinition::new("echo", |params| {
                Box::pin(async move {
                    let text: String = param(&params, 0)?;
                    Ok(CommandOutcome::from_value(text))
                })
            })]
        }
    }

    fn old_echo() -> TypeFallback {
        TypeFallback::new(TypeIdentity::new("test.Echo", Version::new(1, 0, 0)))
    }

    #[tokio::test]
    async fn test_resolve_through_fallback() {
        let collection = LocalCommandCollection::new();
        collection.register("s".into(), &Echo).unwrap();

        let definition = collection
            .resolve(&CommandId::new(old_echo(), "echo"))
            .unwrap();
        let outcome = definition
            .invoke(vec![ObjectValue::new("hi".to_string())])
            .await
            .unwrap();
        let CommandOutcome::Value(value) = outcome else {
            panic!("expected a value");
        };
        assert_eq!(value.downcast_cloned::<String>(), Some("hi".to_string()));
    }

    #[test]
    fn test_resolve_errors() {
        let collection = LocalCommandCollection::new();
        collection.register("s".into(), &Echo).unwrap();

        let unknown_type = TypeFallback::new(TypeIdentity::new("test.Other", Version::new(1, 0, 0)));
        assert!(matches!(
            collection.resolve(&CommandId::new(unknown_type, "echo")),
            Err(InteractionError::UnableToLoadProxyType { .. })
        ));
        assert!(matches!(
            collection.resolve(&CommandId::new(old_echo(), "shout")),
            Err(InteractionError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration_per_subject() {
        let collection = LocalCommandCollection::new();
        collection.register("s".into(), &Echo).unwrap();
        assert!(matches!(
            collection.register("s".into(), &Echo),
            Err(InteractionError::AlreadyRegistered { .. })
        ));
        collection.register("t".into(), &Echo).unwrap();
        assert_eq!(collection.provided_for(&"t".into()).len(), 1);
        assert_eq!(collection.descriptors().len(), 2);
    }

    #[test]
    fn test_unit_outcome_is_completed() {
        assert!(matches!(CommandOutcome::from_value(()), CommandOutcome::Completed));
        assert!(matches!(CommandOutcome::from_value(3u8), CommandOutcome::Value(_)));
    }
}
