//! Procedural macros for the Braze extension loader.
//!
//! Two attributes make up the public surface:
//!
//! - [`macro@extension_point`] marks a dyn-safe trait as an extension
//!   point, wiring it to its loader and synthesizing its adaptive
//!   dispatcher at compile time from the methods marked `#[adaptive(…)]`.
//! - [`macro@extension`] registers a concrete type (implementation,
//!   wrapper, or manual adaptive dispatcher) in the process-wide
//!   inventory, including its `#[inject]` dependency bindings.
//!
//! Both expand against the `braze` facade crate, which consumers are
//! expected to depend on.

mod extension;
mod point;

use proc_macro::TokenStream;

/// Marks a trait as an extension point.
///
/// ```rust,ignore
/// #[extension_point(default = "dubbo")]
/// pub trait Protocol: Send + Sync {
///     #[adaptive("protocol")]
///     fn refer(&self, service: &str, url: &Url) -> Result<String, ExtensionError>;
/// }
/// ```
///
/// The trait must be dyn-safe and `Send + Sync`. `default = "…"` declares
/// the default extension name (selected by the literal `"true"` and used
/// as the innermost adaptive fallback).
///
/// Methods marked `#[adaptive]` / `#[adaptive("key", …)]` are routed per
/// call by the synthesized dispatcher: the request URL is taken from a
/// `Url`-typed parameter (or a `#[url]`-marked parameter implementing
/// `UrlSource`), an `Invocation`-typed parameter switches lookups to
/// per-method URL parameters, and the resolved name selects the delegate.
/// Adaptive methods must take `&self` and return `Result<_, E>` with
/// `E: From<ExtensionError>`. Unmarked methods raise an
/// unsupported-operation error when called on the dispatcher.
#[proc_macro_attribute]
pub fn extension_point(attr: TokenStream, item: TokenStream) -> TokenStream {
    point::expand(attr, item)
}

/// Registers a struct as an extension of a point.
///
/// ```rust,ignore
/// #[extension(of = dyn Robot, name = "optimusPrime")]
/// #[derive(Default)]
/// pub struct OptimusPrime;
///
/// #[extension(of = dyn Robot, wrapper)]
/// pub struct LoggingRobot { inner: Arc<dyn Robot> }
///
/// #[extension(of = dyn Filter, name = "cache",
///             activate(groups("provider"), keys("cache"), order = 10))]
/// #[derive(Default)]
/// pub struct CacheFilter {
///     #[inject]
///     store: Option<Arc<dyn Store>>,
/// }
/// ```
///
/// Options:
/// - `of = dyn Trait` (required) — the extension point implemented.
/// - `name = "a,b"` — declared name/alias list; inferred from the type
///   name when omitted and not bound by the config line.
/// - `wrapper` — registers a decorator; the type must implement
///   `ExtensionWrapper<dyn Trait>` instead of `Default`.
/// - `adaptive` — registers a manual adaptive dispatcher.
/// - `activate(groups(…), keys(…), order = N)` — activation metadata.
///
/// Ordinary and adaptive extensions are constructed via `Default`.
/// Fields marked `#[inject]` must have type `Option<Arc<dyn Dep>>`; each
/// becomes a dependency binding resolved through the object factory under
/// the field's name.
#[proc_macro_attribute]
pub fn extension(attr: TokenStream, item: TokenStream) -> TokenStream {
    extension::expand(attr, item)
}
