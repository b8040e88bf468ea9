//! Procedural macros for the peercomm crate.
//!
//! This crate provides the `#[command_set]` and `#[notification_set]`
//! attribute macros that generate dispatch tables and remote proxies from
//! trait definitions.
//!
//! # Example
//!
//! ```ignore
//! use peercomm::interaction::{CommandError, Notification};
//! use peercomm::{command_set, notification_set};
//!
//! #[command_set(name = "calc.Calculator", version = 2, fallback(name = "calc.Calculator", version = 1))]
//! pub trait Calculator {
//!     async fn add(&self, a: i32, b: i32) -> Result<i32, CommandError>;
//! }
//!
//! #[notification_set(name = "calc.Events")]
//! pub trait CalculatorEvents {
//!     fn computed(&self) -> &Notification<i32>;
//! }
//! ```
//!
//! This will generate:
//! - `CalculatorProxy` and `CalculatorCommands<T>`
//! - `CalculatorEventsProxy` and `CalculatorEventsNotifications<T>`

use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemTrait, parse_macro_input};

mod generate;
mod parse;

/// Turns an async trait into a command set.
///
/// # Attributes
///
/// - `name`: wire name of the set, defaults to the trait name
/// - `version`: integer major version or `"major.minor.patch"`, defaults to 1
/// - `fallback(name = .., version = ..)`: an older identity this set still
///   answers to; may be repeated, newest first
///
/// # Method Signatures
///
/// Every method must be `async`, take `&self` plus owned parameters and
/// return `Result<T, CommandError>`:
///
/// ```ignore
/// async fn add(&self, a: i32, b: i32) -> Result<i32, CommandError>;
/// async fn reset(&self) -> Result<(), CommandError>;
/// ```
///
/// Parameter and result types need an object serializer registered with the
/// endpoint.
///
/// # Generated Items
///
/// - `<Trait>Proxy`: implements the trait by invoking a remote endpoint
/// - `<Trait>Commands<T>`: a `CommandSet` dispatching to a local `T: Trait`
///
/// Implementations of the trait are written with `#[peercomm::async_trait]`.
#[proc_macro_attribute]
pub fn command_set(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);

    let attributes = match parse::parse_attributes(&input, attr.into()) {
        Ok(attributes) => attributes,
        Err(err) => return err.to_compile_error().into(),
    };
    let set = match parse::parse_command_set(&input, attributes) {
        Ok(set) => set,
        Err(err) => return err.to_compile_error().into(),
    };

    let trait_def = generate::generate_command_trait(&input);
    let proxy = generate::generate_command_proxy(&set, &input.vis);
    let dispatch = generate::generate_command_dispatch(&set, &input.vis);

    let expanded = quote! {
        #trait_def

        #proxy

        #dispatch
    };

    TokenStream::from(expanded)
}

/// Turns a trait of notification accessors into a notification set.
///
/// Takes the same attributes as [`macro@command_set`]. Every method must look
/// like `fn name(&self) -> &Notification<A>`.
///
/// # Generated Items
///
/// - `<Trait>Proxy`: mirrors the notifications of a remote endpoint; the
///   first local subscriber registers with the remote
/// - `<Trait>Notifications<T>`: a `NotificationSet` exposing a local
///   `T: Trait`
#[proc_macro_attribute]
pub fn notification_set(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);

    let attributes = match parse::parse_attributes(&input, attr.into()) {
        Ok(attributes) => attributes,
        Err(err) => return err.to_compile_error().into(),
    };
    let set = match parse::parse_notification_set(&input, attributes) {
        Ok(set) => set,
        Err(err) => return err.to_compile_error().into(),
    };

    let proxy = generate::generate_notification_proxy(&set, &input.vis);
    let table = generate::generate_notification_table(&set, &input.vis);

    let expanded = quote! {
        #input

        #proxy

        #table
    };

    TokenStream::from(expanded)
}
