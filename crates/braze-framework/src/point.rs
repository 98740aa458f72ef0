//! The extension-point contract and the erased-instance representation.
//!
//! An extension point is a dyn-safe trait marked with `#[extension_point]`;
//! the macro implements [`ExtensionPoint`] for `dyn Trait`, which is what
//! ties the trait to its loader, its config resources, and its synthesized
//! adaptive dispatcher.
//!
//! Instances cross the descriptor boundary type-erased: an [`ObjectArc`] is
//! an `Arc<dyn Any>` whose payload is the `Arc<dyn Trait>` itself, so a
//! generic loader can recover the typed handle with [`unpack`].

use std::any::Any;
use std::sync::Arc;

use braze_core::ExtensionError;

use crate::environment::Environment;

/// A type-erased extension instance. The payload is always an
/// `Arc<dyn Trait>` for the owning extension point.
pub type ObjectArc = Arc<dyn Any + Send + Sync>;

/// Implemented for `dyn Trait` by the `#[extension_point]` attribute.
///
/// Carries the identity of the point (its simple and qualified names), the
/// default-extension declaration, and the compile-time-synthesized adaptive
/// dispatcher.
pub trait ExtensionPoint: Send + Sync + 'static {
    /// Simple name of the point, e.g. `"Robot"`. Used in diagnostics and
    /// to derive the default adaptive lookup key.
    const NAME: &'static str;

    /// Qualified Rust path of the trait, e.g. `"demo::robot::Robot"`.
    /// Folded to dotted form to name the point's config resources.
    const PATH: &'static str;

    /// Raw default-extension declaration from the marker attribute; empty
    /// when the point declares none. Validated (single token) when the
    /// point's registry is built.
    const DEFAULT_NAME: &'static str;

    /// Builds the synthesized adaptive dispatcher for this point.
    ///
    /// Returns `Err(Synthesis)` when the trait has no adaptive methods or
    /// an adaptive method exposes no URL-bearing argument; the loader
    /// records and re-raises that failure on subsequent `adaptive()` calls.
    fn synthesize(env: &Environment) -> Result<Arc<Self>, ExtensionError>;
}

/// The config-resource name for an extension point: its qualified path
/// with `::` folded to `.` (`demo::robot::Robot` → `demo.robot.Robot`).
pub fn resource_name<T: ExtensionPoint + ?Sized>() -> String {
    T::PATH.replace("::", ".")
}

/// Erases a typed extension instance into an [`ObjectArc`].
pub fn pack<T>(value: Arc<T>) -> ObjectArc
where
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(value)
}

/// Recovers the typed handle from an [`ObjectArc`], or `None` when the
/// payload belongs to a different extension point.
pub fn unpack<T>(object: &ObjectArc) -> Option<Arc<T>>
where
    T: ?Sized + 'static,
{
    object.downcast_ref::<Arc<T>>().cloned()
}

/// Implemented by decorator extensions.
///
/// A wrapper takes the instance it decorates as its sole constructor
/// argument; the loader composes every registered wrapper around each
/// materialised instance.
pub trait ExtensionWrapper<T: ?Sized> {
    /// Wraps `inner`, returning the decorating instance.
    fn wrap(inner: Arc<T>) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Speaker: Send + Sync {
        fn speak(&self) -> &'static str;
    }

    struct Quiet;

    impl Speaker for Quiet {
        fn speak(&self) -> &'static str {
            "…"
        }
    }

    #[test]
    fn pack_unpack_round_trip() {
        let original: Arc<dyn Speaker> = Arc::new(Quiet);
        let erased = pack::<dyn Speaker>(original.clone());
        let recovered = unpack::<dyn Speaker>(&erased).expect("payload type");
        assert!(Arc::ptr_eq(&original, &recovered));
        assert_eq!(recovered.speak(), "…");
    }

    #[test]
    fn unpack_rejects_foreign_payload() {
        let erased: ObjectArc = Arc::new(42_u32);
        assert!(unpack::<dyn Speaker>(&erased).is_none());
    }
}
