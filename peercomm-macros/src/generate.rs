//! Code generation for the `#[command_set]` and `#[notification_set]` macros.
//!
//! A command set trait `Calculator` produces:
//! - `CalculatorProxy`, implementing the trait by invoking a remote endpoint
//! - `CalculatorCommands<T>`, the dispatch table for a local implementation
//!
//! A notification set trait `Events` produces `EventsProxy` and
//! `EventsNotifications<T>` the same way.

use crate::parse::{CommandDef, CommandSetDef, Identity, NotificationSetDef, SetAttributes};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemTrait, Visibility};

fn identity_tokens(identity: &Identity) -> TokenStream {
    let name = &identity.name;
    let (major, minor, patch) = identity.version;
    quote! {
        ::peercomm::interaction::TypeIdentity::new(
            #name,
            ::peercomm::id::Version::new(#major, #minor, #patch),
        )
    }
}

/// Expression building the set's `TypeFallback`.
fn descriptor_tokens(attributes: &SetAttributes) -> TokenStream {
    let primary = identity_tokens(&attributes.primary);
    let fallbacks = attributes.fallbacks.iter().map(identity_tokens);
    quote! {
        ::peercomm::interaction::TypeFallback::new(#primary)
            #( .with_fallback(#fallbacks) )*
    }
}

/// Re-emits the trait as an `async_trait`.
pub fn generate_command_trait(trait_def: &ItemTrait) -> TokenStream {
    quote! {
        #[::peercomm::async_trait]
        #trait_def
    }
}

/// Generates `<Trait>Proxy`.
pub fn generate_command_proxy(set: &CommandSetDef, vis: &Visibility) -> TokenStream {
    let trait_name = &set.name;
    let proxy = format_ident!("{}Proxy", set.name);
    let descriptor = descriptor_tokens(&set.attributes);
    let methods = set.commands.iter().map(generate_proxy_method);
    let doc = format!("Remote proxy for [`{trait_name}`].");

    quote! {
        #[doc = #doc]
        #[derive(Debug, Clone)]
        #vis struct #proxy {
            handle: ::peercomm::interaction::CommandProxyHandle,
        }

        impl #proxy {
            /// The endpoint this proxy invokes.
            #[allow(dead_code)]
            pub fn endpoint(&self) -> &::peercomm::id::EndpointId {
                self.handle.endpoint()
            }
        }

        impl ::peercomm::interaction::CommandSetProxy for #proxy {
            fn descriptor() -> ::peercomm::interaction::TypeFallback {
                #descriptor
            }

            fn from_handle(handle: ::peercomm::interaction::CommandProxyHandle) -> Self {
                Self { handle }
            }
        }

        #[::peercomm::async_trait]
        impl #trait_name for #proxy {
            #( #methods )*
        }
    }
}

fn generate_proxy_method(command: &CommandDef) -> TokenStream {
    let name = &command.name;
    let member = name.to_string();
    let output = &command.output;
    let params = command.params.iter().map(|p| {
        let name = &p.name;
        let ty = &p.ty;
        quote! { #name: #ty }
    });
    let values = command.params.iter().map(|p| {
        let name = &p.name;
        quote! { ::peercomm::serialization::ObjectValue::new(#name) }
    });
    quote! {
        async fn #name(&self, #( #params ),*) -> #output {
            self.handle
                .invoke(#member, ::std::vec![#( #values ),*])
                .await
        }
    }
}

/// Generates `<Trait>Commands<T>`.
pub fn generate_command_dispatch(set: &CommandSetDef, vis: &Visibility) -> TokenStream {
    let trait_name = &set.name;
    let commands = format_ident!("{}Commands", set.name);
    let descriptor = descriptor_tokens(&set.attributes);
    let definitions = set.commands.iter().map(generate_definition);
    let doc = format!("Command dispatch table for a local [`{trait_name}`] implementation.");

    quote! {
        #[doc = #doc]
        #vis struct #commands<T: ?Sized>(::std::sync::Arc<T>);

        impl<T> #commands<T> {
            /// Wraps an implementation.
            #[allow(dead_code)]
            pub fn new(inner: T) -> Self {
                Self(::std::sync::Arc::new(inner))
            }
        }

        impl<T: ?Sized> #commands<T> {
            /// Wraps a shared implementation.
            #[allow(dead_code)]
            pub fn from_arc(inner: ::std::sync::Arc<T>) -> Self {
                Self(inner)
            }
        }

        impl<T: ?Sized> ::std::clone::Clone for #commands<T> {
            fn clone(&self) -> Self {
                Self(::std::sync::Arc::clone(&self.0))
            }
        }

        impl<T> ::peercomm::interaction::CommandSet for #commands<T>
        where
            T: ?Sized + #trait_name + ::std::marker::Send + ::std::marker::Sync + 'static,
        {
            fn descriptor(&self) -> ::peercomm::interaction::TypeFallback {
                #descriptor
            }

            fn definitions(&self) -> ::std::vec::Vec<::peercomm::interaction::CommandDefinition> {
                let mut definitions = ::std::vec::Vec::new();
                #( #definitions )*
                definitions
            }
        }
    }
}

fn generate_definition(command: &CommandDef) -> TokenStream {
    let name = &command.name;
    let member = name.to_string();
    let names: Vec<_> = command.params.iter().map(|p| &p.name).collect();
    let extracts = command.params.iter().enumerate().map(|(index, p)| {
        let name = &p.name;
        let ty = &p.ty;
        quote! {
            let #name: #ty = ::peercomm::interaction::param::<#ty>(&parameters, #index)?;
        }
    });
    quote! {
        {
            let target = ::std::sync::Arc::clone(&self.0);
            definitions.push(::peercomm::interaction::CommandDefinition::new(
                #member,
                move |parameters: ::std::vec::Vec<::peercomm::serialization::ObjectValue>|
                      -> ::peercomm::interaction::CommandFuture {
                    let target = ::std::sync::Arc::clone(&target);
                    ::std::boxed::Box::pin(async move {
                        let _ = &parameters;
                        #( #extracts )*
                        let value = target.#name(#( #names ),*).await?;
                        ::std::result::Result::<_, ::peercomm::interaction::CommandError>::Ok(
                            ::peercomm::interaction::CommandOutcome::from_value(value),
                        )
                    })
                },
            ));
        }
    }
}

/// Generates `<Trait>Proxy` for a notification set.
pub fn generate_notification_proxy(set: &NotificationSetDef, vis: &Visibility) -> TokenStream {
    let trait_name = &set.name;
    let proxy = format_ident!("{}Proxy", set.name);
    let descriptor = descriptor_tokens(&set.attributes);
    let fields = set.notifications.iter().map(|n| {
        let name = &n.name;
        let args = &n.args;
        quote! { #name: ::peercomm::interaction::Notification<#args> }
    });
    let inits = set.notifications.iter().map(|n| {
        let name = &n.name;
        let args = &n.args;
        let member = name.to_string();
        quote! { #name: handle.notification::<#args>(#member) }
    });
    let accessors = set.notifications.iter().map(|n| {
        let name = &n.name;
        let args = &n.args;
        quote! {
            fn #name(&self) -> &::peercomm::interaction::Notification<#args> {
                &self.#name
            }
        }
    });
    let doc = format!("Remote proxy for [`{trait_name}`].");

    quote! {
        #[doc = #doc]
        #[derive(Debug, Clone)]
        #vis struct #proxy {
            proxy_handle: ::peercomm::interaction::NotificationProxyHandle,
            #( #fields, )*
        }

        impl #proxy {
            /// The endpoint whose notifications this proxy mirrors.
            #[allow(dead_code)]
            pub fn endpoint(&self) -> &::peercomm::id::EndpointId {
                self.proxy_handle.endpoint()
            }
        }

        impl ::peercomm::interaction::NotificationSetProxy for #proxy {
            fn descriptor() -> ::peercomm::interaction::TypeFallback {
                #descriptor
            }

            fn from_handle(handle: ::peercomm::interaction::NotificationProxyHandle) -> Self {
                Self {
                    #( #inits, )*
                    proxy_handle: handle,
                }
            }
        }

        impl #trait_name for #proxy {
            #( #accessors )*
        }
    }
}

/// Generates `<Trait>Notifications<T>`.
pub fn generate_notification_table(set: &NotificationSetDef, vis: &Visibility) -> TokenStream {
    let trait_name = &set.name;
    let table = format_ident!("{}Notifications", set.name);
    let descriptor = descriptor_tokens(&set.attributes);
    let definitions = set.notifications.iter().map(|n| {
        let name = &n.name;
        let member = name.to_string();
        quote! {
            ::peercomm::interaction::NotificationDefinition::new(#member, self.0.#name())
        }
    });
    let doc = format!("Notification table for a local [`{trait_name}`] implementation.");

    quote! {
        #[doc = #doc]
        #vis struct #table<T: ?Sized>(::std::sync::Arc<T>);

        impl<T> #table<T> {
            /// Wraps an implementation.
            #[allow(dead_code)]
            pub fn new(inner: T) -> Self {
                Self(::std::sync::Arc::new(inner))
            }
        }

        impl<T: ?Sized> #table<T> {
            /// Wraps a shared implementation.
            #[allow(dead_code)]
            pub fn from_arc(inner: ::std::sync::Arc<T>) -> Self {
                Self(inner)
            }
        }

        impl<T> ::peercomm::interaction::NotificationSet for #table<T>
        where
            T: ?Sized + #trait_name + ::std::marker::Send + ::std::marker::Sync + 'static,
        {
            fn descriptor(&self) -> ::peercomm::interaction::TypeFallback {
                #descriptor
            }

            fn definitions(&self) -> ::std::vec::Vec<::peercomm::interaction::NotificationDefinition> {
                ::std::vec![#( #definitions ),*]
            }
        }
    }
}
