//! # Braze Framework
//!
//! The extension loader itself: discovery, caching, wiring, activation,
//! and adaptive dispatch.
//!
//! ## Architecture
//!
//! Everything hangs off an [`Environment`], the explicit owner of what the
//! source system kept in process-wide statics:
//!
//! ```text
//! ┌──────────────┐   loader::<dyn T>()   ┌──────────────────────┐
//! │ Environment  │──────────────────────▶│ ExtensionLoader<T>   │
//! │  loader map  │                       │  registry (scan)     │
//! │  raw table   │                       │  instance holders    │
//! └──────────────┘                       │  adaptive slot       │
//!                                        └──────────────────────┘
//! ```
//!
//! A loader materialises an extension in four steps: resolve the name in
//! its classified registry, construct (or reuse) the raw instance shared
//! through the environment, inject declared dependencies via the object
//! factory, and compose every registered wrapper around the result. The
//! finished object is published once per name and returned by identity
//! from then on.
//!
//! ## Example
//!
//! ```rust,ignore
//! use braze_framework::Environment;
//!
//! let env = Environment::builder().scan_root("resources").build();
//! let robots = env.loader::<dyn Robot>()?;
//! let optimus = robots.extension("optimusPrime")?;
//! ```

pub mod activate;
pub mod config;
pub mod environment;
pub mod factory;
pub mod inject;
pub mod loader;
pub mod point;
pub mod registration;
pub(crate) mod registry;
pub mod scanner;

// Re-exported for macro-generated registrations.
pub use linkme;

pub use config::{EnvironmentBuilder, ScanConfig};
pub use environment::{Environment, WeakEnvironment};
pub use factory::{AdaptiveExtensionFactory, ExtensionFactory, SpiExtensionFactory};
pub use inject::InjectionContext;
pub use loader::ExtensionLoader;
pub use point::{pack, resource_name, unpack, ExtensionPoint, ExtensionWrapper, ObjectArc};
pub use registration::{
    ActivateMeta, ConstructFn, ErasedInstance, ExtensionRegistration, InjectorBinding,
    ProviderKind, WrapFn, EXTENSION_REGISTRATIONS,
};
pub use scanner::{
    FRAMEWORK_DIRECTORY, INTERNAL_DIRECTORY, SEARCH_DIRECTORIES, SERVICES_DIRECTORY,
};
