//! Parsing logic for the `#[command_set]` and `#[notification_set]` macros.
//!
//! Both macros take the same attribute arguments:
//!
//! ```ignore
//! #[command_set(name = "calc.Calculator", version = 2, fallback(name = "calc.Calculator", version = 1))]
//! ```
//!
//! `name` defaults to the trait name and `version` to `1.0.0`. A version is
//! either an integer major version or a `"major.minor.patch"` string.

use proc_macro2::Span;
use syn::{
    Error, Expr, ExprLit, FnArg, GenericArgument, Ident, ItemTrait, Lit, Meta, MetaList,
    MetaNameValue, Pat, PathArguments, Result, ReturnType, Token, TraitItem, TraitItemFn, Type,
    parse::Parser, punctuated::Punctuated,
};

/// A type identity as written in the attribute.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Wire name of the set.
    pub name: String,
    /// `(major, minor, patch)`.
    pub version: (u32, u32, u32),
}

/// Attribute arguments shared by both macros.
#[derive(Debug)]
pub struct SetAttributes {
    /// Newest identity.
    pub primary: Identity,
    /// Older identities, newest first.
    pub fallbacks: Vec<Identity>,
}

/// Parsed command set.
#[derive(Debug)]
pub struct CommandSetDef {
    /// Trait name.
    pub name: Ident,
    /// Identities of the set.
    pub attributes: SetAttributes,
    /// Commands in declaration order.
    pub commands: Vec<CommandDef>,
}

/// Parsed command.
#[derive(Debug)]
pub struct CommandDef {
    /// Method name, which is also the member name on the wire.
    pub name: Ident,
    /// Parameters excluding `self`.
    pub params: Vec<ParamDef>,
    /// The declared return type.
    pub output: Type,
}

/// Parsed parameter.
#[derive(Debug)]
pub struct ParamDef {
    /// Parameter name.
    pub name: Ident,
    /// Parameter type.
    pub ty: Type,
}

/// Parsed notification set.
#[derive(Debug)]
pub struct NotificationSetDef {
    /// Trait name.
    pub name: Ident,
    /// Identities of the set.
    pub attributes: SetAttributes,
    /// Notifications in declaration order.
    pub notifications: Vec<NotificationDef>,
}

/// Parsed notification accessor.
#[derive(Debug)]
pub struct NotificationDef {
    /// Accessor name, which is also the member name on the wire.
    pub name: Ident,
    /// Argument type `A` of `Notification<A>`.
    pub args: Type,
}

/// Parses the attribute arguments.
pub fn parse_attributes(trait_def: &ItemTrait, attr: proc_macro2::TokenStream) -> Result<SetAttributes> {
    let metas = Punctuated::<Meta, Token![,]>::parse_terminated.parse2(attr)?;
    let mut name = None;
    let mut version = None;
    let mut fallbacks = Vec::new();

    for meta in metas {
        match &meta {
            Meta::NameValue(MetaNameValue { path, value, .. }) if path.is_ident("name") => {
                name = Some(parse_name(value)?);
            }
            Meta::NameValue(MetaNameValue { path, value, .. }) if path.is_ident("version") => {
                version = Some(parse_version(value)?);
            }
            Meta::List(MetaList { path, tokens, .. }) if path.is_ident("fallback") => {
                let inner = Punctuated::<Meta, Token![,]>::parse_terminated.parse2(tokens.clone())?;
                fallbacks.push(parse_fallback(&meta, inner)?);
            }
            _ => {
                return Err(Error::new_spanned(
                    &meta,
                    "Unknown attribute. Supported: name, version, fallback(name, version)",
                ));
            }
        }
    }

    let primary = Identity {
        name: name.unwrap_or_else(|| trait_def.ident.to_string()),
        version: version.unwrap_or((1, 0, 0)),
    };
    for fallback in &fallbacks {
        if fallback.name == primary.name && fallback.version == primary.version {
            return Err(Error::new(
                Span::call_site(),
                "a fallback must differ from the primary identity",
            ));
        }
    }
    Ok(SetAttributes { primary, fallbacks })
}

fn parse_fallback(meta: &Meta, inner: Punctuated<Meta, Token![,]>) -> Result<Identity> {
    let mut name = None;
    let mut version = None;
    for item in inner {
        match &item {
            Meta::NameValue(MetaNameValue { path, value, .. }) if path.is_ident("name") => {
                name = Some(parse_name(value)?);
            }
            Meta::NameValue(MetaNameValue { path, value, .. }) if path.is_ident("version") => {
                version = Some(parse_version(value)?);
            }
            _ => return Err(Error::new_spanned(&item, "fallback supports name and version")),
        }
    }
    match (name, version) {
        (Some(name), Some(version)) => Ok(Identity { name, version }),
        _ => Err(Error::new_spanned(meta, "fallback requires both name and version")),
    }
}

fn parse_name(value: &Expr) -> Result<String> {
    match value {
        Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) if !s.value().is_empty() => Ok(s.value()),
        _ => Err(Error::new_spanned(value, "name must be a non-empty string literal")),
    }
}

fn parse_version(value: &Expr) -> Result<(u32, u32, u32)> {
    match value {
        Expr::Lit(ExprLit { lit: Lit::Int(i), .. }) => Ok((i.base10_parse()?, 0, 0)),
        Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => {
            let text = s.value();
            let parts: Vec<_> = text.split('.').map(str::parse::<u32>).collect();
            match parts.as_slice() {
                [Ok(major), Ok(minor), Ok(patch)] => Ok((*major, *minor, *patch)),
                _ => Err(Error::new_spanned(s, "version must look like \"1.2.3\"")),
            }
        }
        _ => Err(Error::new_spanned(
            value,
            "version must be an integer or a \"major.minor.patch\" string",
        )),
    }
}

/// Parses a command set trait.
pub fn parse_command_set(trait_def: &ItemTrait, attributes: SetAttributes) -> Result<CommandSetDef> {
    reject_generics(trait_def)?;
    let mut commands = Vec::new();
    for item in &trait_def.items {
        match item {
            TraitItem::Fn(method) => commands.push(parse_command(method)?),
            other => {
                return Err(Error::new_spanned(
                    other,
                    "command set traits may only contain methods",
                ));
            }
        }
    }
    if commands.is_empty() {
        return Err(Error::new_spanned(
            trait_def,
            "Command set trait must have at least one method",
        ));
    }
    Ok(CommandSetDef {
        name: trait_def.ident.clone(),
        attributes,
        commands,
    })
}

fn parse_command(method: &TraitItemFn) -> Result<CommandDef> {
    let sig = &method.sig;
    if sig.asyncness.is_none() {
        return Err(Error::new_spanned(sig, "commands must be async methods"));
    }
    if method.default.is_some() {
        return Err(Error::new_spanned(sig, "commands cannot have a default body"));
    }
    if !sig.generics.params.is_empty() {
        return Err(Error::new_spanned(&sig.generics, "commands cannot be generic"));
    }
    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => return Err(Error::new_spanned(sig, "commands must take &self")),
    }

    let mut params = Vec::new();
    for input in inputs {
        let FnArg::Typed(typed) = input else {
            return Err(Error::new_spanned(input, "unexpected receiver"));
        };
        let Pat::Ident(pat) = typed.pat.as_ref() else {
            return Err(Error::new_spanned(&typed.pat, "parameters must be plain identifiers"));
        };
        if matches!(typed.ty.as_ref(), Type::Reference(_)) {
            return Err(Error::new_spanned(
                &typed.ty,
                "command parameters must be owned values",
            ));
        }
        params.push(ParamDef {
            name: pat.ident.clone(),
            ty: (*typed.ty).clone(),
        });
    }

    let output = match &sig.output {
        ReturnType::Type(_, ty) if result_value_type(ty).is_some() => (**ty).clone(),
        _ => {
            return Err(Error::new_spanned(
                &sig.output,
                "commands must return Result<T, CommandError>",
            ));
        }
    };
    Ok(CommandDef {
        name: sig.ident.clone(),
        params,
        output,
    })
}

/// Extracts `T` from `Result<T, E>`.
pub fn result_value_type(ty: &Type) -> Option<&Type> {
    single_generic(ty, "Result", 2)
}

/// Parses a notification set trait.
pub fn parse_notification_set(trait_def: &ItemTrait, attributes: SetAttributes) -> Result<NotificationSetDef> {
    reject_generics(trait_def)?;
    let mut notifications = Vec::new();
    for item in &trait_def.items {
        let TraitItem::Fn(method) = item else {
            return Err(Error::new_spanned(
                item,
                "notification set traits may only contain accessors",
            ));
        };
        notifications.push(parse_notification(method)?);
    }
    if notifications.is_empty() {
        return Err(Error::new_spanned(
            trait_def,
            "Notification set trait must have at least one notification",
        ));
    }
    Ok(NotificationSetDef {
        name: trait_def.ident.clone(),
        attributes,
        notifications,
    })
}

fn parse_notification(method: &TraitItemFn) -> Result<NotificationDef> {
    let sig = &method.sig;
    let shape_error = || Error::new_spanned(sig, "notifications must look like `fn name(&self) -> &Notification<A>`");
    if sig.asyncness.is_some() || sig.inputs.len() != 1 || !sig.generics.params.is_empty() {
        return Err(shape_error());
    }
    if !matches!(sig.inputs.first(), Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none()) {
        return Err(shape_error());
    }
    let ReturnType::Type(_, ty) = &sig.output else {
        return Err(shape_error());
    };
    let Type::Reference(reference) = ty.as_ref() else {
        return Err(shape_error());
    };
    if reference.mutability.is_some() {
        return Err(shape_error());
    }
    let args = single_generic(&reference.elem, "Notification", 1).ok_or_else(shape_error)?;
    Ok(NotificationDef {
        name: sig.ident.clone(),
        args: args.clone(),
    })
}

fn single_generic<'a>(ty: &'a Type, ident: &str, arity: usize) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != ident {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != arity {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn reject_generics(trait_def: &ItemTrait) -> Result<()> {
    if trait_def.generics.params.is_empty() {
        Ok(())
    } else {
        Err(Error::new_spanned(&trait_def.generics, "set traits cannot be generic"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    fn trait_def(tokens: proc_macro2::TokenStream) -> ItemTrait {
        syn::parse2(tokens).unwrap()
    }

    #[test]
    fn test_defaults_to_trait_name() {
        let def = trait_def(quote! { trait Calculator { async fn add(&self, a: i32) -> Result<i32, CommandError>; } });
        let attributes = parse_attributes(&def, quote! {}).unwrap();
        assert_eq!(attributes.primary.name, "Calculator");
        assert_eq!(attributes.primary.version, (1, 0, 0));
        assert!(attributes.fallbacks.is_empty());
    }

    #[test]
    fn test_fallbacks_and_string_versions() {
        let def = trait_def(quote! { trait Calculator { async fn add(&self) -> Result<(), CommandError>; } });
        let attributes = parse_attributes(
            &def,
            quote! { name = "calc", version = "2.1.0", fallback(name = "calc", version = 1) },
        )
        .unwrap();
        assert_eq!(attributes.primary.version, (2, 1, 0));
        assert_eq!(attributes.fallbacks.len(), 1);
        assert_eq!(attributes.fallbacks[0].version, (1, 0, 0));
    }

    #[test]
    fn test_fallback_equal_to_primary_is_rejected() {
        let def = trait_def(quote! { trait Calculator { async fn add(&self) -> Result<(), CommandError>; } });
        assert!(parse_attributes(&def, quote! { version = 1, fallback(name = "Calculator", version = 1) }).is_err());
    }

    #[test]
    fn test_command_shape() {
        let def = trait_def(quote! {
            trait Calculator {
                async fn add(&self, a: i32, b: i32) -> Result<i32, CommandError>;
            }
        });
        let attributes = parse_attributes(&def, quote! {}).unwrap();
        let set = parse_command_set(&def, attributes).unwrap();
        assert_eq!(set.commands[0].params.len(), 2);

        let sync = trait_def(quote! { trait Calculator { fn add(&self) -> Result<i32, CommandError>; } });
        let attributes = parse_attributes(&sync, quote! {}).unwrap();
        assert!(parse_command_set(&sync, attributes).is_err());

        let borrowed = trait_def(quote! { trait Calculator { async fn echo(&self, s: &str) -> Result<String, CommandError>; } });
        let attributes = parse_attributes(&borrowed, quote! {}).unwrap();
        assert!(parse_command_set(&borrowed, attributes).is_err());
    }

    #[test]
    fn test_notification_shape() {
        let def = trait_def(quote! {
            trait Events {
                fn computed(&self) -> &Notification<i32>;
            }
        });
        let attributes = parse_attributes(&def, quote! {}).unwrap();
        let set = parse_notification_set(&def, attributes).unwrap();
        assert_eq!(set.notifications[0].name, "computed");

        let wrong = trait_def(quote! { trait Events { fn computed(&self) -> Notification<i32>; } });
        let attributes = parse_attributes(&wrong, quote! {}).unwrap();
        assert!(parse_notification_set(&wrong, attributes).is_err());
    }
}
