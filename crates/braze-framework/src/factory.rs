//! The object-factory extension point and its built-in implementations.
//!
//! Dependency injection resolves every request through the adaptive
//! instance of [`ExtensionFactory`] — itself an extension point, so hosts
//! can contribute additional factories (a DI-container bridge, say) through
//! ordinary config resources. The built-ins are bound by an embedded
//! internal resource:
//!
//! - [`SpiExtensionFactory`] answers requests for other extension points
//!   with their adaptive instance;
//! - [`AdaptiveExtensionFactory`] is the manual adaptive dispatcher that
//!   composes every registered factory, first non-empty answer wins.
//!
//! The factory point's own loader carries no object factory (the bootstrap
//! hole), so factory implementations receive no injection.

use std::any::{Any, TypeId};
use std::sync::Arc;

use braze_core::error::BoxError;
use braze_core::ExtensionError;
use linkme::distributed_slice;
use tracing::debug;

use crate::environment::{Environment, WeakEnvironment};
use crate::point::{ExtensionPoint, ObjectArc};
use crate::registration::{
    ErasedInstance, ExtensionRegistration, ProviderKind, EXTENSION_REGISTRATIONS,
};

/// Config resources compiled into the framework; consulted by the scanner
/// ahead of the on-disk internal directory.
pub(crate) const EMBEDDED_RESOURCES: &[(&str, &str)] = &[(
    "braze_framework.factory.ExtensionFactory",
    include_str!(
        "../resources/META-INF/braze/internal/braze_framework.factory.ExtensionFactory"
    ),
)];

/// Resolves dependencies for the injector.
///
/// `point` identifies the dependency's extension point (`TypeId` of the
/// `dyn Trait`); `property` is the declaring field's name. `None` means
/// this factory has nothing to offer and the next one is consulted.
pub trait ExtensionFactory: Send + Sync {
    /// Resolves `(point, property)` to an erased instance, or passes.
    fn get(&self, point: TypeId, property: &str) -> Option<ObjectArc>;
}

impl ExtensionPoint for dyn ExtensionFactory {
    const NAME: &'static str = "ExtensionFactory";
    const PATH: &'static str = concat!(module_path!(), "::", "ExtensionFactory");
    const DEFAULT_NAME: &'static str = "";

    fn synthesize(_env: &Environment) -> Result<Arc<Self>, ExtensionError> {
        Err(ExtensionError::synthesis(
            Self::NAME,
            "no adaptive methods declared",
        ))
    }
}

// ─── Built-in factories ───────────────────────────────────────────────────────

/// Manual adaptive dispatcher for the factory point: composes every
/// registered factory in name order, first answer wins.
pub struct AdaptiveExtensionFactory {
    factories: Vec<Arc<dyn ExtensionFactory>>,
}

impl AdaptiveExtensionFactory {
    fn from_environment(env: &Environment) -> Result<Self, ExtensionError> {
        let loader = env.loader::<dyn ExtensionFactory>()?;
        let mut factories = Vec::new();
        for name in loader.supported_names()? {
            factories.push(loader.extension(&name)?);
        }
        debug!(factories = factories.len(), "Composed object factory chain");
        Ok(Self { factories })
    }
}

impl ExtensionFactory for AdaptiveExtensionFactory {
    fn get(&self, point: TypeId, property: &str) -> Option<ObjectArc> {
        self.factories
            .iter()
            .find_map(|factory| factory.get(point, property))
    }
}

/// Answers a dependency request with the adaptive instance of the
/// requested extension point, when the point has a loader in this
/// environment.
pub struct SpiExtensionFactory {
    env: WeakEnvironment,
}

impl ExtensionFactory for SpiExtensionFactory {
    fn get(&self, point: TypeId, property: &str) -> Option<ObjectArc> {
        let env = self.env.upgrade()?;
        let loader = env.erased_loader(point)?;
        match loader.adaptive_erased() {
            Ok(instance) => Some(instance),
            Err(error) => {
                debug!(
                    property,
                    error = %error,
                    "Requested dependency point has no adaptive instance"
                );
                None
            }
        }
    }
}

// ─── Registrations ────────────────────────────────────────────────────────────

fn seal_factory<C>(boxed: Box<dyn Any + Send + Sync>) -> Result<ObjectArc, BoxError>
where
    C: ExtensionFactory + 'static,
{
    let concrete = boxed
        .downcast::<C>()
        .map_err(|_| BoxError::from("erased instance had an unexpected concrete type"))?;
    Ok(Arc::new(Arc::new(*concrete) as Arc<dyn ExtensionFactory>))
}

#[distributed_slice(EXTENSION_REGISTRATIONS)]
static ADAPTIVE_FACTORY: ExtensionRegistration = ExtensionRegistration {
    point: TypeId::of::<dyn ExtensionFactory>,
    concrete: TypeId::of::<AdaptiveExtensionFactory>,
    path: concat!(module_path!(), "::", "AdaptiveExtensionFactory"),
    type_name: "AdaptiveExtensionFactory",
    declared_name: "",
    kind: ProviderKind::Adaptive {
        construct: |env| {
            let factory = AdaptiveExtensionFactory::from_environment(env)?;
            Ok(ErasedInstance {
                value: Box::new(factory),
                seal: seal_factory::<AdaptiveExtensionFactory>,
            })
        },
    },
    bindings: &[],
    activate: None,
};

#[distributed_slice(EXTENSION_REGISTRATIONS)]
static SPI_FACTORY: ExtensionRegistration = ExtensionRegistration {
    point: TypeId::of::<dyn ExtensionFactory>,
    concrete: TypeId::of::<SpiExtensionFactory>,
    path: concat!(module_path!(), "::", "SpiExtensionFactory"),
    type_name: "SpiExtensionFactory",
    declared_name: "",
    kind: ProviderKind::Ordinary {
        construct: |env| {
            Ok(ErasedInstance {
                value: Box::new(SpiExtensionFactory {
                    env: env.downgrade(),
                }),
                seal: seal_factory::<SpiExtensionFactory>,
            })
        },
    },
    bindings: &[],
    activate: None,
};
