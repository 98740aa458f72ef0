//! # Braze
//!
//! A config-driven service-provider and extension loader: discover
//! pluggable implementations of the traits your application declares,
//! wire them together, and pick one per request when you need to.
//!
//! ## Overview
//!
//! An *extension point* is a dyn-safe trait marked `#[extension_point]`.
//! Implementations register with `#[extension]` and are bound to short
//! names by line-oriented config resources on the scan path
//! (`name = dotted.type.path`). Given a name, the loader returns a cached
//! singleton — decorated by every registered wrapper, its `#[inject]`
//! dependencies resolved through the object-factory chain.
//!
//! ```text
//! ┌──────────────┐  loader::<dyn T>()  ┌──────────────────┐  extension(name)
//! │ Environment  │────────────────────▶│ ExtensionLoader  │──────────────────▶ Arc<dyn T>
//! └──────────────┘                     │  scan → classify │
//!        scan roots                    │  construct→inject│
//!        (META-INF/braze/…)            │  wrap → publish  │
//!                                      └──────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use braze::prelude::*;
//!
//! #[extension_point(default = "optimusPrime")]
//! pub trait Robot: Send + Sync {
//!     fn say_hello(&self) -> String;
//! }
//!
//! #[extension(of = dyn Robot, name = "optimusPrime")]
//! #[derive(Default)]
//! pub struct OptimusPrime;
//!
//! impl Robot for OptimusPrime {
//!     fn say_hello(&self) -> String {
//!         "Hello, I am Optimus Prime.".to_string()
//!     }
//! }
//!
//! // META-INF/braze/demo.Robot:
//! //   optimusPrime = demo.OptimusPrime
//!
//! let env = Environment::builder().scan_root("resources").build();
//! let robots = env.loader::<dyn Robot>()?;
//! println!("{}", robots.extension("optimusPrime")?.say_hello());
//! ```
//!
//! ## Adaptive dispatch
//!
//! Methods marked `#[adaptive("key", …)]` get a per-call dispatcher from
//! `loader.adaptive()`: the concrete extension is chosen from the request
//! [`Url`]'s parameters (or its protocol, for the special key
//! `protocol`), falling back to the point's declared default.
//!
//! ## Activation
//!
//! `#[extension(…, activate(groups(…), keys(…), order = N))]` extensions
//! participate in `loader.activate(url, requested, group)`: rule-based,
//! ordered selection of a subset, with `-name` removal and the `default`
//! placeholder controlling where caller-requested names land.

// Foundation types
pub use braze_core::{
    dispatch_key_for, resolve_adaptive_name, BoxError, ExtensionError, ExtensionResult,
    Invocation, Url, UrlSource,
};

// The loader
pub use braze_framework::{
    pack, resource_name, unpack, ActivateMeta, AdaptiveExtensionFactory, ConstructFn,
    Environment, EnvironmentBuilder, ErasedInstance, ExtensionFactory, ExtensionLoader,
    ExtensionPoint, ExtensionRegistration, ExtensionWrapper, InjectionContext,
    InjectorBinding, ObjectArc, ProviderKind, ScanConfig, SpiExtensionFactory,
    WeakEnvironment, WrapFn, EXTENSION_REGISTRATIONS, FRAMEWORK_DIRECTORY,
    INTERNAL_DIRECTORY, SEARCH_DIRECTORIES, SERVICES_DIRECTORY,
};

// Re-exported for macro-generated registrations.
pub use braze_framework::linkme;

// Attribute macros
pub use braze_macros::{extension, extension_point};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use braze::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{extension, extension_point};
    pub use crate::{
        Environment, ExtensionError, ExtensionLoader, ExtensionPoint, ExtensionWrapper,
        Invocation, Url, UrlSource,
    };
}
