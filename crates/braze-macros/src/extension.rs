//! Implementation of the `#[extension]` attribute.
//!
//! Leaves the decorated struct unchanged (helper attributes stripped) and
//! appends a `#[distributed_slice]` static wiring an
//! `ExtensionRegistration` into the process-wide inventory, the same way
//! the framework's built-in factories register by hand. Construction,
//! sealing, and dependency bindings are emitted as non-capturing closures
//! so the whole registration stays a plain static.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Error, Fields, Ident, ItemStruct, LitInt, LitStr, Token, Type,
};

struct ActivateArgs {
    groups: Vec<String>,
    keys: Vec<String>,
    order: i32,
}

struct ExtensionArgs {
    of: Option<Type>,
    name: Option<LitStr>,
    wrapper: bool,
    adaptive: bool,
    activate: Option<ActivateArgs>,
}

pub fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = ExtensionArgs {
        of: None,
        name: None,
        wrapper: false,
        adaptive: false,
        activate: None,
    };
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("of") {
            args.of = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("name") {
            args.name = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("wrapper") {
            args.wrapper = true;
            Ok(())
        } else if meta.path.is_ident("adaptive") {
            args.adaptive = true;
            Ok(())
        } else if meta.path.is_ident("activate") {
            let mut activate = ActivateArgs {
                groups: Vec::new(),
                keys: Vec::new(),
                order: 0,
            };
            meta.parse_nested_meta(|nested| {
                if nested.path.is_ident("groups") {
                    let content;
                    syn::parenthesized!(content in nested.input);
                    let lits =
                        content.parse_terminated(<LitStr as syn::parse::Parse>::parse, Token![,])?;
                    activate.groups = lits.into_iter().map(|lit| lit.value()).collect();
                    Ok(())
                } else if nested.path.is_ident("keys") {
                    let content;
                    syn::parenthesized!(content in nested.input);
                    let lits =
                        content.parse_terminated(<LitStr as syn::parse::Parse>::parse, Token![,])?;
                    activate.keys = lits.into_iter().map(|lit| lit.value()).collect();
                    Ok(())
                } else if nested.path.is_ident("order") {
                    let order: LitInt = nested.value()?.parse()?;
                    activate.order = order.base10_parse()?;
                    Ok(())
                } else {
                    Err(nested.error("expected groups(…), keys(…), or order = N"))
                }
            })?;
            args.activate = Some(activate);
            Ok(())
        } else {
            Err(meta.error(
                "expected of = dyn Trait, name = \"…\", wrapper, adaptive, or activate(…)",
            ))
        }
    });
    parse_macro_input!(attr with parser);

    let mut item_struct = parse_macro_input!(item as ItemStruct);
    match expand_struct(&mut item_struct, args) {
        Ok(expanded) => expanded.into(),
        Err(error) => {
            let error = error.into_compile_error();
            quote! { #item_struct #error }.into()
        }
    }
}

fn expand_struct(item: &mut ItemStruct, args: ExtensionArgs) -> syn::Result<TokenStream2> {
    let Some(of) = args.of else {
        return Err(Error::new_spanned(
            &item.ident,
            "#[extension] requires of = dyn Trait",
        ));
    };
    if args.wrapper && args.adaptive {
        return Err(Error::new_spanned(
            &item.ident,
            "an extension cannot be both a wrapper and adaptive",
        ));
    }
    if !item.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &item.generics,
            "extension structs cannot be generic",
        ));
    }

    let struct_ident = item.ident.clone();
    let struct_name = struct_ident.to_string();
    let declared_name = args.name.map(|lit| lit.value()).unwrap_or_default();
    let bindings = harvest_bindings(item, &struct_ident)?;

    let seal = seal_tokens(&struct_ident, &of);
    let kind = if args.wrapper {
        quote! {
            ::braze::ProviderKind::Wrapper {
                wrap: |inner| {
                    let inner = ::braze::unpack::<#of>(&inner).ok_or_else(|| {
                        ::braze::BoxError::from(
                            "wrapper received an instance of a different extension point",
                        )
                    })?;
                    ::std::result::Result::Ok(::braze::ErasedInstance {
                        value: ::std::boxed::Box::new(
                            <#struct_ident as ::braze::ExtensionWrapper<#of>>::wrap(inner),
                        ),
                        seal: #seal,
                    })
                },
            }
        }
    } else {
        let variant = if args.adaptive {
            quote!(Adaptive)
        } else {
            quote!(Ordinary)
        };
        quote! {
            ::braze::ProviderKind::#variant {
                construct: |_env| {
                    ::std::result::Result::Ok(::braze::ErasedInstance {
                        value: ::std::boxed::Box::new(
                            <#struct_ident as ::std::default::Default>::default(),
                        ),
                        seal: #seal,
                    })
                },
            }
        }
    };

    let activate = match args.activate {
        Some(activate) => {
            let groups = activate.groups.iter();
            let keys = activate.keys.iter();
            let order = activate.order;
            quote! {
                ::std::option::Option::Some(::braze::ActivateMeta {
                    groups: &[#(#groups),*],
                    keys: &[#(#keys),*],
                    order: #order,
                })
            }
        }
        None => quote!(::std::option::Option::None),
    };

    let static_ident = format_ident!(
        "__BRAZE_EXTENSION_{}",
        struct_name.to_uppercase()
    );

    Ok(quote! {
        #item

        #[::braze::linkme::distributed_slice(::braze::EXTENSION_REGISTRATIONS)]
        #[linkme(crate = ::braze::linkme)]
        static #static_ident: ::braze::ExtensionRegistration = ::braze::ExtensionRegistration {
            point: ::std::any::TypeId::of::<#of>,
            concrete: ::std::any::TypeId::of::<#struct_ident>,
            path: concat!(module_path!(), "::", #struct_name),
            type_name: #struct_name,
            declared_name: #declared_name,
            kind: #kind,
            bindings: &[#(#bindings),*],
            activate: #activate,
        };
    })
}

fn seal_tokens(struct_ident: &Ident, of: &Type) -> TokenStream2 {
    quote! {
        |boxed| {
            let concrete = boxed.downcast::<#struct_ident>().map_err(|_| {
                ::braze::BoxError::from("erased instance had an unexpected concrete type")
            })?;
            ::std::result::Result::Ok(::std::sync::Arc::new(
                ::std::sync::Arc::new(*concrete) as ::std::sync::Arc<#of>,
            ) as ::braze::ObjectArc)
        }
    }
}

/// Strips `#[inject]` markers from the struct's fields and emits one
/// dependency binding per marked field.
fn harvest_bindings(
    item: &mut ItemStruct,
    struct_ident: &Ident,
) -> syn::Result<Vec<TokenStream2>> {
    let Fields::Named(fields) = &mut item.fields else {
        // Unit and tuple structs have nothing to inject.
        return Ok(Vec::new());
    };

    let mut bindings = Vec::new();
    for field in fields.named.iter_mut() {
        let before = field.attrs.len();
        field.attrs.retain(|attr| !attr.path().is_ident("inject"));
        if field.attrs.len() == before {
            continue;
        }

        let field_ident = field.ident.clone().ok_or_else(|| {
            Error::new_spanned(&*field, "#[inject] requires a named field")
        })?;
        let field_name = field_ident.to_string();
        let Some(dependency) = injected_dependency(&field.ty) else {
            return Err(Error::new_spanned(
                &field.ty,
                "#[inject] fields must have type Option<Arc<dyn Trait>>",
            ));
        };

        bindings.push(quote! {
            ::braze::InjectorBinding {
                property: #field_name,
                apply: |target, ctx| {
                    let ::std::option::Option::Some(this) =
                        target.downcast_mut::<#struct_ident>()
                    else {
                        return ::std::result::Result::Err(::braze::BoxError::from(
                            "unexpected injection target",
                        ));
                    };
                    match ctx.request::<#dependency>(#field_name) {
                        ::std::option::Option::Some(dependency) => {
                            this.#field_ident = ::std::option::Option::Some(dependency);
                            ::std::result::Result::Ok(true)
                        }
                        ::std::option::Option::None => ::std::result::Result::Ok(false),
                    }
                },
            }
        });
    }
    Ok(bindings)
}

/// Extracts `dyn Trait` from a field of type `Option<Arc<dyn Trait>>`.
fn injected_dependency(ty: &Type) -> Option<Type> {
    let path = match ty {
        Type::Path(type_path) if type_path.qself.is_none() => &type_path.path,
        _ => return None,
    };
    let option = path.segments.last()?;
    if option.ident != "Option" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(option_args) = &option.arguments else {
        return None;
    };
    let syn::GenericArgument::Type(Type::Path(arc_path)) = option_args.args.first()? else {
        return None;
    };
    let arc = arc_path.path.segments.last()?;
    if arc.ident != "Arc" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(arc_args) = &arc.arguments else {
        return None;
    };
    match arc_args.args.first()? {
        syn::GenericArgument::Type(dependency) => Some(dependency.clone()),
        _ => None,
    }
}
