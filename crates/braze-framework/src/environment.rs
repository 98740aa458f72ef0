//! The loader registry.
//!
//! An [`Environment`] owns all process-wide loader state: the map from
//! extension-point `TypeId` to loader singleton and the raw-instance table
//! shared across loaders. Hosts construct one (usually via
//! [`Environment::builder`]) and hand out clones; everything else hangs off
//! it, so tests get full isolation by constructing their own.
//!
//! Loaders, synthesized dispatchers, and the SPI factory keep *weak*
//! back-references, so dropping the last `Environment` clone reclaims the
//! whole graph; a dispatcher outliving its environment surfaces
//! [`ExtensionError::EnvironmentGone`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use braze_core::ExtensionError;
use parking_lot::RwLock;

use crate::config::{EnvironmentBuilder, ScanConfig};
use crate::loader::ExtensionLoader;
use crate::point::{ExtensionPoint, ObjectArc};

/// Type-erased view of a loader, used by factories that only know the
/// point's `TypeId`.
pub(crate) trait ErasedLoader: Send + Sync {
    /// The point's adaptive instance, erased.
    fn adaptive_erased(&self) -> Result<ObjectArc, ExtensionError>;
}

#[derive(Clone)]
struct LoaderEntry {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn ErasedLoader>,
}

struct Shared {
    scan: ScanConfig,
    loaders: RwLock<HashMap<TypeId, LoaderEntry>>,
    /// Raw (pre-wrapper) instances keyed by concrete implementation type,
    /// shared across every loader in this environment.
    raw_instances: RwLock<HashMap<TypeId, ObjectArc>>,
}

/// Handle to a set of loaders and their shared instance tables.
///
/// Cheap to clone; all clones see the same state.
#[derive(Clone)]
pub struct Environment {
    shared: Arc<Shared>,
}

impl Environment {
    /// Creates an environment with no scan roots (inventory-only; useful
    /// with the test-only `register` operation).
    pub fn new() -> Self {
        Self::with_scan(ScanConfig::default())
    }

    /// Starts building an environment.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    pub(crate) fn with_scan(scan: ScanConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                scan,
                loaders: RwLock::new(HashMap::new()),
                raw_instances: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the loader singleton for extension point `T`, constructing
    /// and caching it on first use.
    ///
    /// Construction eagerly resolves the loader's object factory (the
    /// adaptive `ExtensionFactory`), except for the factory point itself —
    /// the bootstrap hole that keeps the recursion finite.
    pub fn loader<T>(&self) -> Result<Arc<ExtensionLoader<T>>, ExtensionError>
    where
        T: ExtensionPoint + ?Sized,
    {
        let point = TypeId::of::<T>();
        if let Some(entry) = self.shared.loaders.read().get(&point) {
            return downcast_entry::<T>(entry);
        }

        // Construct outside the map lock: the factory bootstrap re-enters
        // `loader::<dyn ExtensionFactory>()` from in here.
        let loader = Arc::new(ExtensionLoader::<T>::bootstrap(self)?);

        let mut loaders = self.shared.loaders.write();
        let entry = loaders.entry(point).or_insert_with(|| LoaderEntry {
            typed: loader.clone(),
            erased: loader,
        });
        downcast_entry::<T>(entry)
    }

    /// Weak handle for back-references held by loaders and dispatchers.
    pub fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub(crate) fn scan(&self) -> &ScanConfig {
        &self.shared.scan
    }

    pub(crate) fn erased_loader(&self, point: TypeId) -> Option<Arc<dyn ErasedLoader>> {
        self.shared
            .loaders
            .read()
            .get(&point)
            .map(|entry| Arc::clone(&entry.erased))
    }

    pub(crate) fn raw_instance(&self, concrete: TypeId) -> Option<ObjectArc> {
        self.shared.raw_instances.read().get(&concrete).cloned()
    }

    /// Publishes a raw instance, keeping an already-published one. Returns
    /// the winner.
    pub(crate) fn publish_raw_instance(&self, concrete: TypeId, instance: ObjectArc) -> ObjectArc {
        let mut instances = self.shared.raw_instances.write();
        Arc::clone(instances.entry(concrete).or_insert(instance))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast_entry<T>(entry: &LoaderEntry) -> Result<Arc<ExtensionLoader<T>>, ExtensionError>
where
    T: ExtensionPoint + ?Sized,
{
    entry
        .typed
        .clone()
        .downcast::<ExtensionLoader<T>>()
        .map_err(|_| ExtensionError::TypeMismatch {
            point: T::NAME,
            name: "loader".to_string(),
        })
}

/// Weak counterpart of [`Environment`].
#[derive(Clone)]
pub struct WeakEnvironment {
    shared: Weak<Shared>,
}

impl WeakEnvironment {
    /// Recovers the environment, or `None` when it has been dropped.
    pub fn upgrade(&self) -> Option<Environment> {
        self.shared.upgrade().map(|shared| Environment { shared })
    }
}
