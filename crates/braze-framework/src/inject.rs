//! Dependency injection for freshly constructed extensions.
//!
//! Extensions declare their dependencies as [`InjectorBinding`]s (the
//! `#[inject]` fields of an `#[extension]` struct). After construction —
//! and again for every wrapper layer — the loader applies each binding:
//! the binding asks the loader's object factory for
//! `(dependency point, property name)` and writes the result into the
//! not-yet-published instance. A binding that fails is logged and skipped;
//! the instance is still returned.
//!
//! The factory itself is resolved per loader at construction time
//! (`ExtensionFactory`'s adaptive instance). The loader for the factory
//! point carries no factory of its own, so factory extensions receive no
//! injection.

use std::any::{Any, TypeId};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::environment::Environment;
use crate::factory::ExtensionFactory;
use crate::point::{unpack, ExtensionPoint};
use crate::registration::InjectorBinding;

/// Resolution context handed to [`InjectorBinding::apply`].
pub struct InjectionContext<'a> {
    env: &'a Environment,
    factory: &'a Arc<dyn ExtensionFactory>,
}

impl<'a> InjectionContext<'a> {
    pub(crate) fn new(env: &'a Environment, factory: &'a Arc<dyn ExtensionFactory>) -> Self {
        Self { env, factory }
    }

    /// Resolves the dependency `property` of extension point `D`.
    ///
    /// The point's loader is touched first so the factory chain can find
    /// it, then the factory decides what (if anything) satisfies the
    /// request. `None` means the property stays unset.
    pub fn request<D>(&self, property: &str) -> Option<Arc<D>>
    where
        D: ExtensionPoint + ?Sized,
    {
        if let Err(error) = self.env.loader::<D>() {
            debug!(
                point = D::NAME,
                property,
                error = %error,
                "Dependency point has no usable loader"
            );
            return None;
        }
        let erased = self.factory.get(TypeId::of::<D>(), property)?;
        unpack::<D>(&erased)
    }
}

/// Applies every binding to a not-yet-published instance, logging and
/// swallowing individual failures.
pub(crate) fn apply_bindings(
    point: &'static str,
    name: &str,
    value: &mut (dyn Any + Send + Sync),
    bindings: &[InjectorBinding],
    ctx: &InjectionContext<'_>,
) {
    for binding in bindings {
        match (binding.apply)(value, ctx) {
            Ok(true) => {
                debug!(point, extension = name, property = binding.property, "Dependency injected");
            }
            Ok(false) => {}
            Err(error) => {
                warn!(
                    point,
                    extension = name,
                    property = binding.property,
                    error = %error,
                    "Skipping failed dependency injection"
                );
            }
        }
    }
}
