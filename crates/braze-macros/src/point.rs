//! Implementation of the `#[extension_point]` attribute.
//!
//! Expands a trait into three pieces: the trait itself (helper attributes
//! stripped), an `ExtensionPoint` impl for `dyn Trait`, and — when at
//! least one method is marked `#[adaptive]` and every such method exposes
//! a URL — a hidden dispatcher struct implementing the trait by per-call
//! delegation. Missing URLs and missing adaptive methods are *runtime*
//! synthesis failures (surfaced and cached when `adaptive()` is first
//! requested), matching the loader's error model rather than failing the
//! build.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{
    parse_macro_input, Attribute, Error, FnArg, Ident, ItemTrait, LitStr, Meta, ReturnType,
    Signature, Token, TraitItem, TraitItemFn, Type,
};

pub fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut default_name: Option<LitStr> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("default") {
            default_name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported option, expected `default = \"…\"`"))
        }
    });
    parse_macro_input!(attr with parser);

    let mut item_trait = parse_macro_input!(item as ItemTrait);
    match expand_trait(&mut item_trait, default_name) {
        Ok(expanded) => expanded.into(),
        Err(error) => {
            let error = error.into_compile_error();
            quote! { #item_trait #error }.into()
        }
    }
}

// ─── Method plans ─────────────────────────────────────────────────────────────

/// Where the dispatcher finds the request URL in a method's arguments.
struct UrlLocation {
    ident: Ident,
    by_ref: bool,
    /// True when the parameter is a `UrlSource` rather than a `Url`.
    accessor: bool,
}

enum MethodPlan {
    Adaptive {
        sig: Signature,
        keys: Vec<String>,
        url: UrlLocation,
        invocation: Option<Ident>,
        forward: Vec<Ident>,
    },
    Unsupported {
        sig: Signature,
        returns_result: bool,
    },
}

fn expand_trait(
    original: &mut ItemTrait,
    default_name: Option<LitStr>,
) -> syn::Result<TokenStream2> {
    if !original.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &original.generics,
            "extension point traits cannot be generic",
        ));
    }

    let trait_ident = original.ident.clone();
    let trait_name = trait_ident.to_string();
    let default_value = default_name.map(|lit| lit.value()).unwrap_or_default();

    let mut plans: Vec<MethodPlan> = Vec::new();
    let mut adaptive_count = 0usize;
    let mut synthesis_error: Option<String> = None;

    for item in &mut original.items {
        let TraitItem::Fn(method) = item else {
            return Err(Error::new_spanned(
                &*item,
                "extension point traits may only contain methods",
            ));
        };
        let keys = take_adaptive_attr(&mut method.attrs)?;
        let url_marker = take_url_markers(method);

        match keys {
            Some(keys) => {
                adaptive_count += 1;
                match plan_adaptive(method, keys, url_marker)? {
                    Ok(plan) => plans.push(plan),
                    Err(detail) => {
                        if synthesis_error.is_none() {
                            synthesis_error = Some(detail);
                        }
                    }
                }
            }
            // Methods with a default body fall back to it on the
            // dispatcher; bodiless ones raise unsupported-operation.
            None if method.default.is_none() => plans.push(plan_unsupported(method)),
            None => {}
        }
    }

    let synthesize = if let Some(detail) = &synthesis_error {
        synthesize_failure(&trait_name, detail)
    } else if adaptive_count == 0 {
        synthesize_failure(&trait_name, "no adaptive methods declared")
    } else {
        let dispatcher_ident = dispatcher_ident(&trait_ident);
        quote! {
            fn synthesize(
                env: &::braze::Environment,
            ) -> ::std::result::Result<::std::sync::Arc<Self>, ::braze::ExtensionError> {
                ::std::result::Result::Ok(::std::sync::Arc::new(#dispatcher_ident {
                    env: env.downgrade(),
                }))
            }
        }
    };

    let dispatcher = if synthesis_error.is_none() && adaptive_count > 0 {
        let dispatcher_ident = dispatcher_ident(&trait_ident);
        let methods: Vec<TokenStream2> = plans
            .iter()
            .map(|plan| emit_method(&trait_ident, plan))
            .collect();
        quote! {
            #[doc(hidden)]
            struct #dispatcher_ident {
                env: ::braze::WeakEnvironment,
            }

            impl #trait_ident for #dispatcher_ident {
                #(#methods)*
            }
        }
    } else {
        TokenStream2::new()
    };

    Ok(quote! {
        #original

        impl ::braze::ExtensionPoint for dyn #trait_ident {
            const NAME: &'static str = #trait_name;
            const PATH: &'static str = concat!(module_path!(), "::", #trait_name);
            const DEFAULT_NAME: &'static str = #default_value;

            #synthesize
        }

        #dispatcher
    })
}

fn dispatcher_ident(trait_ident: &Ident) -> Ident {
    format_ident!("__{}AdaptiveDispatcher", trait_ident)
}

fn synthesize_failure(trait_name: &str, detail: &str) -> TokenStream2 {
    quote! {
        fn synthesize(
            _env: &::braze::Environment,
        ) -> ::std::result::Result<::std::sync::Arc<Self>, ::braze::ExtensionError> {
            ::std::result::Result::Err(::braze::ExtensionError::synthesis(#trait_name, #detail))
        }
    }
}

// ─── Attribute harvesting ─────────────────────────────────────────────────────

/// Removes `#[adaptive]` / `#[adaptive("key", …)]` from a method's
/// attributes, returning the declared keys when present.
fn take_adaptive_attr(attrs: &mut Vec<Attribute>) -> syn::Result<Option<Vec<String>>> {
    let mut found = None;
    let mut remaining = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if attr.path().is_ident("adaptive") {
            let keys = match &attr.meta {
                Meta::Path(_) => Vec::new(),
                Meta::List(_) => attr
                    .parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?
                    .into_iter()
                    .map(|lit| lit.value())
                    .collect(),
                Meta::NameValue(_) => {
                    return Err(Error::new_spanned(
                        attr,
                        "expected #[adaptive] or #[adaptive(\"key\", …)]",
                    ));
                }
            };
            found = Some(keys);
        } else {
            remaining.push(attr);
        }
    }
    *attrs = remaining;
    Ok(found)
}

/// Strips `#[url]` markers from the method's parameters, returning the
/// index of the first marked one.
fn take_url_markers(method: &mut TraitItemFn) -> Option<usize> {
    let mut marked = None;
    let mut index = 0usize;
    for input in method.sig.inputs.iter_mut() {
        if let FnArg::Typed(pat_type) = input {
            let before = pat_type.attrs.len();
            pat_type.attrs.retain(|attr| !attr.path().is_ident("url"));
            if pat_type.attrs.len() != before && marked.is_none() {
                marked = Some(index);
            }
            index += 1;
        }
    }
    marked
}

// ─── Planning ─────────────────────────────────────────────────────────────────

/// Builds the plan for an adaptive method. The outer `Err` is an author
/// error (bad signature); the inner `Err(String)` is a synthesis failure
/// deferred to runtime.
fn plan_adaptive(
    method: &TraitItemFn,
    keys: Vec<String>,
    url_marker: Option<usize>,
) -> syn::Result<Result<MethodPlan, String>> {
    let method_name = method.sig.ident.to_string();

    if !method.sig.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &method.sig.generics,
            "adaptive methods cannot be generic",
        ));
    }
    match method.sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(Error::new_spanned(
                &method.sig,
                "adaptive methods must take &self",
            ));
        }
    }
    if !returns_result(&method.sig) {
        return Err(Error::new_spanned(
            &method.sig.output,
            "adaptive methods must return Result<_, E> with E: From<ExtensionError>",
        ));
    }

    let (sig, idents) = renamed_signature(method, "__arg");

    let mut url = None;
    let mut invocation = None;
    let mut index = 0usize;
    for input in method.sig.inputs.iter() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let (by_ref, last) = peel(&pat_type.ty);
        if url.is_none() && last.as_deref() == Some("Url") {
            url = Some(UrlLocation {
                ident: idents[index].clone(),
                by_ref,
                accessor: false,
            });
        }
        if invocation.is_none() && last.as_deref() == Some("Invocation") {
            invocation = Some(idents[index].clone());
        }
        index += 1;
    }
    if url.is_none() {
        if let Some(marker) = url_marker {
            let by_ref = method
                .sig
                .inputs
                .iter()
                .filter_map(|input| match input {
                    FnArg::Typed(pat_type) => Some(peel(&pat_type.ty).0),
                    FnArg::Receiver(_) => None,
                })
                .nth(marker)
                .unwrap_or(false);
            url = Some(UrlLocation {
                ident: idents[marker].clone(),
                by_ref,
                accessor: true,
            });
        }
    }

    let Some(url) = url else {
        return Ok(Err(format!(
            "method '{method_name}' declares adaptive dispatch but exposes no URL-bearing argument"
        )));
    };

    Ok(Ok(MethodPlan::Adaptive {
        sig,
        keys,
        url,
        invocation,
        forward: idents,
    }))
}

fn plan_unsupported(method: &TraitItemFn) -> MethodPlan {
    // Leading single underscore keeps unused-parameter lints quiet.
    let (sig, _idents) = renamed_signature(method, "_arg");
    MethodPlan::Unsupported {
        sig,
        returns_result: returns_result(&method.sig),
    }
}

fn returns_result(sig: &Signature) -> bool {
    match &sig.output {
        ReturnType::Type(_, ty) => matches!(
            peel(ty).1.as_deref(),
            Some("Result")
        ),
        ReturnType::Default => false,
    }
}

/// Clones the signature with each typed parameter renamed to
/// `{prefix}{index}` and its attributes dropped.
fn renamed_signature(method: &TraitItemFn, prefix: &str) -> (Signature, Vec<Ident>) {
    let mut sig = method.sig.clone();
    let mut idents = Vec::new();
    let mut index = 0usize;
    for input in sig.inputs.iter_mut() {
        if let FnArg::Typed(pat_type) = input {
            pat_type.attrs.clear();
            let ident = format_ident!("{}{}", prefix, index);
            pat_type.pat = Box::new(syn::parse_quote!(#ident));
            idents.push(ident);
            index += 1;
        }
    }
    (sig, idents)
}

/// Strips one level of reference, returning whether one was stripped and
/// the final path segment's identifier.
fn peel(ty: &Type) -> (bool, Option<String>) {
    let (by_ref, inner) = match ty {
        Type::Reference(reference) => (true, reference.elem.as_ref()),
        other => (false, other),
    };
    let last = match inner {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    };
    (by_ref, last)
}

// ─── Code emission ────────────────────────────────────────────────────────────

fn emit_method(trait_ident: &Ident, plan: &MethodPlan) -> TokenStream2 {
    match plan {
        MethodPlan::Adaptive {
            sig,
            keys,
            url,
            invocation,
            forward,
        } => {
            let method_ident = &sig.ident;
            let key_lits = keys.iter();
            let url_ident = &url.ident;
            let url_expr = match (url.accessor, url.by_ref) {
                (false, true) => quote!(#url_ident),
                (false, false) => quote!(&#url_ident),
                (true, true) => quote!(::braze::UrlSource::url(#url_ident)),
                (true, false) => quote!(::braze::UrlSource::url(&#url_ident)),
            };
            let method_expr = match invocation {
                Some(ident) => quote!(::std::option::Option::Some(#ident.method_name())),
                None => quote!(::std::option::Option::None),
            };
            quote! {
                #sig {
                    const __KEYS: &[&str] = &[#(#key_lits),*];
                    let __env = self
                        .env
                        .upgrade()
                        .ok_or(::braze::ExtensionError::EnvironmentGone)?;
                    let __loader = __env.loader::<dyn #trait_ident>()?;
                    let __url: &::braze::Url = #url_expr;
                    let __method: ::std::option::Option<&str> = #method_expr;
                    let __default = __loader.default_name()?;
                    match ::braze::resolve_adaptive_name(
                        __url,
                        <dyn #trait_ident as ::braze::ExtensionPoint>::NAME,
                        __KEYS,
                        __method,
                        __default.as_deref(),
                    ) {
                        ::std::option::Option::Some(__name) => {
                            let __ext = __loader.extension(&__name)?;
                            __ext.#method_ident(#(#forward),*)
                        }
                        ::std::option::Option::None => {
                            let __tried: ::std::vec::Vec<::std::string::String> =
                                if __KEYS.is_empty() {
                                    ::std::vec![::braze::dispatch_key_for(
                                        <dyn #trait_ident as ::braze::ExtensionPoint>::NAME,
                                    )]
                                } else {
                                    __KEYS.iter().map(|__key| (*__key).to_string()).collect()
                                };
                            ::std::result::Result::Err(::std::convert::Into::into(
                                ::braze::ExtensionError::NameUnresolved {
                                    point: <dyn #trait_ident as ::braze::ExtensionPoint>::NAME,
                                    keys: __tried,
                                },
                            ))
                        }
                    }
                }
            }
        }
        MethodPlan::Unsupported {
            sig,
            returns_result,
        } => {
            let method_name = sig.ident.to_string();
            if *returns_result {
                quote! {
                    #sig {
                        ::std::result::Result::Err(::std::convert::Into::into(
                            ::braze::ExtensionError::Unsupported {
                                point: <dyn #trait_ident as ::braze::ExtensionPoint>::NAME,
                                method: #method_name,
                            },
                        ))
                    }
                }
            } else {
                quote! {
                    #sig {
                        ::std::panic!(
                            "method '{}' of extension point {} does not support adaptive dispatch",
                            #method_name,
                            <dyn #trait_ident as ::braze::ExtensionPoint>::NAME,
                        );
                    }
                }
            }
        }
    }
}
