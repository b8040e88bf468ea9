//! Tests for macro expansion.
//!
//! These tests verify that `#[command_set]` and `#[notification_set]`
//! generate working dispatch tables and proxies.

use peercomm::id::Version;
use peercomm::interaction::{
    CommandError, CommandOutcome, CommandSet, CommandSetProxy, Notification, NotificationSet,
    NotificationSetProxy, NotificationSource, TypeIdentity,
};
use peercomm::serialization::ObjectValue;
use peercomm::{command_set, notification_set};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// A simple calculator command set for testing.
#[command_set(name = "calc.Calculator", version = 2, fallback(name = "calc.Calculator", version = 1))]
pub trait Calculator {
    async fn add(&self, a: i32, b: i32) -> Result<i32, CommandError>;
    async fn reset(&self) -> Result<(), CommandError>;
}

#[derive(Default)]
struct Adder {
    resets: AtomicI32,
}

#[peercomm::async_trait]
impl Calculator for Adder {
    async fn add(&self, a: i32, b: i32) -> Result<i32, CommandError> {
        a.checked_add(b).ok_or_else(|| CommandError::failed("overflow"))
    }

    async fn reset(&self) -> Result<(), CommandError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[notification_set(name = "calc.Events", version = "1.1.0")]
pub trait CalculatorEvents {
    fn computed(&self) -> &Notification<i32>;
}

#[derive(Default)]
struct Events {
    computed: Notification<i32>,
}

impl CalculatorEvents for Events {
    fn computed(&self) -> &Notification<i32> {
        &self.computed
    }
}

#[test]
fn test_command_descriptor() {
    let descriptor = CalculatorProxy::descriptor();
    let versions: Vec<_> = descriptor.entries().iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![Version::new(2, 0, 0), Version::new(1, 0, 0)]);
    assert_eq!(
        descriptor.primary(),
        &TypeIdentity::new("calc.Calculator", Version::new(2, 0, 0))
    );
    assert_eq!(CalculatorCommands::new(Adder::default()).descriptor(), descriptor);
}

#[tokio::test]
async fn test_dispatch_table_invokes_implementation() {
    let commands = CalculatorCommands::new(Adder::default());
    let definitions = commands.definitions();
    let members: Vec<_> = definitions.iter().map(|d| d.member().to_string()).collect();
    assert_eq!(members, vec!["add", "reset"]);

    let add = &definitions[0];
    let outcome = add
        .invoke(vec![ObjectValue::new(2i32), ObjectValue::new(3i32)])
        .await
        .unwrap();
    match outcome {
        CommandOutcome::Value(value) => assert_eq!(value.downcast_cloned::<i32>(), Some(5)),
        CommandOutcome::Completed => panic!("expected a value"),
    }

    let reset = &definitions[1];
    assert!(matches!(reset.invoke(Vec::new()).await.unwrap(), CommandOutcome::Completed));
}

#[tokio::test]
async fn test_dispatch_table_reports_bad_arguments() {
    let definitions = CalculatorCommands::new(Adder::default()).definitions();
    let error = definitions[0]
        .invoke(vec![ObjectValue::new("two".to_string())])
        .await
        .unwrap_err();
    assert!(matches!(error, CommandError::InvalidArgument { index: 0, .. }));

    let error = definitions[0]
        .invoke(vec![ObjectValue::new(i32::MAX), ObjectValue::new(1i32)])
        .await
        .unwrap_err();
    assert!(matches!(error, CommandError::Failed { .. }));
}

#[test]
fn test_notification_table_exposes_local_notifications() {
    let events = Arc::new(Events::default());
    let table = CalculatorEventsNotifications::from_arc(events.clone());
    assert_eq!(
        table.descriptor().primary(),
        &TypeIdentity::new("calc.Events", Version::new(1, 1, 0))
    );
    assert_eq!(CalculatorEventsProxy::descriptor(), table.descriptor());

    let definitions = table.definitions();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].member(), "computed");

    let seen = Arc::new(AtomicI32::new(0));
    let sink = seen.clone();
    events.computed().subscribe(move |source: &NotificationSource, value: &i32| {
        assert_eq!(source, &NotificationSource::Local);
        sink.store(*value, Ordering::SeqCst);
    });
    events.computed().raise(7);
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}
