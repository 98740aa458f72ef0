//! # Braze Core
//!
//! Foundation types for the Braze extension loader.
//!
//! This crate holds the pieces of the loader that carry no policy of their
//! own and are shared by every other layer:
//!
//! - **Request model**: the opaque request descriptor [`Url`] (protocol,
//!   parameter map, per-method parameter lookup) and the call-site
//!   descriptor [`Invocation`].
//! - **Errors**: the unified [`ExtensionError`] enum used across the
//!   framework and by generated dispatchers.
//! - **Adaptive resolution**: the data half of adaptive dispatch —
//!   [`resolve_adaptive_name`] turns a key list, a request URL, and a
//!   declared default into the name of the extension to delegate to.
//!
//! The loader itself lives in `braze-framework`; the attribute macros that
//! feed it live in `braze-macros`.

pub mod adaptive;
pub mod error;
pub mod url;

pub use adaptive::{dispatch_key_for, resolve_adaptive_name};
pub use error::{BoxError, ExtensionError, ExtensionResult};
pub use url::{Invocation, Url, UrlSource};
