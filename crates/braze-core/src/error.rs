//! Unified error types for the Braze extension loader.
//!
//! Everything the loader can fail with funnels into [`ExtensionError`].
//! Per-binding injection failures are the one exception: those are logged
//! and swallowed by the injector, per the construction contract.

use thiserror::Error;

/// Boxed error used at the descriptor boundary (provider constructors and
/// injector bindings return it so concrete extension code can fail with
/// whatever error type it already has).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the framework.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Errors raised by extension loading, construction, and dispatch.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// A lookup was attempted with an empty name.
    #[error("extension name must not be empty")]
    EmptyName,

    /// No extension with the requested name is registered for the point.
    ///
    /// `detail` carries the joined load-time failures whose keys contain
    /// the requested name, so a typo and a broken provider read differently.
    #[error("no extension named '{name}' on extension point {point}{detail}")]
    NotFound {
        point: &'static str,
        name: String,
        detail: String,
    },

    /// `"true"` (or a default lookup) was used on a point that declares no
    /// default extension.
    #[error("extension point {point} declares no default extension")]
    NoDefault { point: &'static str },

    /// The discovered configuration for a point is inconsistent.
    #[error("invalid extension configuration on {point}: {detail}")]
    Configuration { point: &'static str, detail: String },

    /// A provider constructor or wrapper constructor failed.
    #[error("failed to construct extension '{name}' on {point}")]
    Construction {
        point: &'static str,
        name: String,
        #[source]
        source: BoxError,
    },

    /// No adaptive dispatcher can be assembled for the point.
    #[error("cannot assemble an adaptive dispatcher for {point}: {detail}")]
    Synthesis { point: &'static str, detail: String },

    /// A previous attempt to build the adaptive dispatcher failed; the
    /// recorded failure is re-raised without retrying.
    #[error("adaptive dispatcher for {point} previously failed: {detail}")]
    AdaptiveUnavailable { point: &'static str, detail: String },

    /// Adaptive resolution found no extension name: none of the lookup
    /// keys matched the request URL and the point declares no default.
    #[error(
        "unable to choose an extension of {point}: none of the keys {keys:?} \
         matched the request URL and no default is declared"
    )]
    NameUnresolved {
        point: &'static str,
        keys: Vec<String>,
    },

    /// A non-adaptive method was called on an adaptive dispatcher.
    #[error("method '{method}' of extension point {point} does not support adaptive dispatch")]
    Unsupported {
        point: &'static str,
        method: &'static str,
    },

    /// The owning [`Environment`] was dropped while a dispatcher or loader
    /// still held a handle to it.
    ///
    /// [`Environment`]: https://docs.rs/braze
    #[error("the extension environment has been dropped")]
    EnvironmentGone,

    /// A textual URL could not be parsed.
    #[error("invalid URL '{input}': {detail}")]
    InvalidUrl { input: String, detail: String },

    /// An erased instance did not carry the expected `Arc<dyn T>` payload.
    /// Indicates a hand-written registration pointing at the wrong point.
    #[error("type mismatch while materialising '{name}' on {point}")]
    TypeMismatch { point: &'static str, name: String },
}

impl ExtensionError {
    /// Convenience constructor for [`ExtensionError::Configuration`].
    pub fn configuration(point: &'static str, detail: impl Into<String>) -> Self {
        Self::Configuration {
            point,
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`ExtensionError::Synthesis`].
    pub fn synthesis(point: &'static str, detail: impl Into<String>) -> Self {
        Self::Synthesis {
            point,
            detail: detail.into(),
        }
    }

    /// Convenience constructor for [`ExtensionError::Construction`].
    pub fn construction(
        point: &'static str,
        name: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Construction {
            point,
            name: name.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_carries_detail() {
        let err = ExtensionError::NotFound {
            point: "Robot",
            name: "broken".to_string(),
            detail: "\n  demo.Broken: unresolved provider path".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("'broken'"));
        assert!(message.contains("demo.Broken"));
    }

    #[test]
    fn construction_preserves_cause_chain() {
        let cause: BoxError = "constructor exploded".into();
        let err = ExtensionError::construction("Robot", "optimus", cause);
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "constructor exploded");
    }
}
