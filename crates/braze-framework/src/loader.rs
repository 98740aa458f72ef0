//! The per-point extension loader.
//!
//! One [`ExtensionLoader`] exists per extension point per
//! [`Environment`]. It owns the point's classified registry (built lazily
//! from the first scan), the per-name instance holders, and the adaptive
//! singleton slot. All three layers publish with double-checked locking:
//! a fast lock-free read of the published value, then a private mutex for
//! the single unset→constructed transition.
//!
//! Materialisation runs construct → inject → wrap → publish: the raw
//! instance is shared across loaders through the environment's
//! raw-instance table, dependencies are injected through the loader's
//! object factory, and every registered wrapper is composed (and itself
//! injected) around the result.

use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use braze_core::ExtensionError;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::environment::{Environment, ErasedLoader, WeakEnvironment};
use crate::factory::{ExtensionFactory, EMBEDDED_RESOURCES};
use crate::inject::{apply_bindings, InjectionContext};
use crate::point::{pack, resource_name, unpack, ExtensionPoint, ObjectArc};
use crate::registration::{
    ExtensionRegistration, ProviderKind, EXTENSION_REGISTRATIONS,
};
use crate::registry::PointRegistry;
use crate::scanner;

// ─── Holders ──────────────────────────────────────────────────────────────────

struct InstanceHolder<T: ?Sized> {
    value: RwLock<Option<Arc<T>>>,
    /// Serialises the unset→constructed transition for this name only.
    build: Mutex<()>,
}

impl<T: ?Sized> InstanceHolder<T> {
    fn new() -> Self {
        Self {
            value: RwLock::new(None),
            build: Mutex::new(()),
        }
    }
}

struct AdaptiveSlot<T: ?Sized> {
    value: RwLock<Option<Arc<T>>>,
    build: Mutex<()>,
    /// Rendered terminal error from a failed build; re-raised fail-fast.
    failure: RwLock<Option<String>>,
}

impl<T: ?Sized> AdaptiveSlot<T> {
    fn new() -> Self {
        Self {
            value: RwLock::new(None),
            build: Mutex::new(()),
            failure: RwLock::new(None),
        }
    }
}

// ─── ExtensionLoader ──────────────────────────────────────────────────────────

/// Loader singleton for the extension point `T` (a `dyn Trait`).
///
/// Obtained from [`Environment::loader`]; all lookup, activation, and
/// adaptive-dispatch entry points live here.
pub struct ExtensionLoader<T: ExtensionPoint + ?Sized> {
    env: WeakEnvironment,
    /// Adaptive `ExtensionFactory` used for dependency injection; `None`
    /// only for the factory point's own loader (bootstrap hole).
    object_factory: Option<Arc<dyn ExtensionFactory>>,
    registry: RwLock<Option<Arc<PointRegistry>>>,
    registry_build: Mutex<()>,
    holders: RwLock<HashMap<String, Arc<InstanceHolder<T>>>>,
    adaptive: AdaptiveSlot<T>,
}

impl<T: ExtensionPoint + ?Sized> ExtensionLoader<T> {
    pub(crate) fn bootstrap(env: &Environment) -> Result<Self, ExtensionError> {
        let object_factory = if TypeId::of::<T>() == TypeId::of::<dyn ExtensionFactory>() {
            None
        } else {
            Some(env.loader::<dyn ExtensionFactory>()?.adaptive()?)
        };
        Ok(Self {
            env: env.downgrade(),
            object_factory,
            registry: RwLock::new(None),
            registry_build: Mutex::new(()),
            holders: RwLock::new(HashMap::new()),
            adaptive: AdaptiveSlot::new(),
        })
    }

    fn environment(&self) -> Result<Environment, ExtensionError> {
        self.env.upgrade().ok_or(ExtensionError::EnvironmentGone)
    }

    // ─── Registry ────────────────────────────────────────────────────────

    /// The classified registry for this point, scanning config resources
    /// on first use. A failed build is not cached; the next call retries.
    pub(crate) fn registry(&self) -> Result<Arc<PointRegistry>, ExtensionError> {
        if let Some(registry) = self.registry.read().as_ref() {
            return Ok(Arc::clone(registry));
        }
        let _guard = self.registry_build.lock();
        if let Some(registry) = self.registry.read().as_ref() {
            return Ok(Arc::clone(registry));
        }

        let env = self.environment()?;
        let resource = resource_name::<T>();
        let lines = scanner::scan(env.scan(), EMBEDDED_RESOURCES, &resource);
        let candidates: Vec<&'static ExtensionRegistration> = EXTENSION_REGISTRATIONS
            .iter()
            .filter(|registration| registration.is_for(TypeId::of::<T>()))
            .collect();
        let registry = Arc::new(PointRegistry::build(
            T::NAME,
            T::DEFAULT_NAME,
            lines,
            &candidates,
        )?);
        debug!(
            point = T::NAME,
            extensions = registry.names.len(),
            wrappers = registry.wrappers.len(),
            "Extension registry loaded"
        );
        *self.registry.write() = Some(Arc::clone(&registry));
        Ok(registry)
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    /// Returns the cached singleton for `name`, materialising it on first
    /// use. The literal `"true"` selects the point's default extension.
    pub fn extension(&self, name: &str) -> Result<Arc<T>, ExtensionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ExtensionError::EmptyName);
        }
        if name == "true" {
            return self
                .default_extension()?
                .ok_or(ExtensionError::NoDefault { point: T::NAME });
        }

        let holder = self.holder(name);
        if let Some(instance) = holder.value.read().as_ref() {
            return Ok(Arc::clone(instance));
        }
        let _guard = holder.build.lock();
        if let Some(instance) = holder.value.read().as_ref() {
            return Ok(Arc::clone(instance));
        }
        let instance = self.create(name)?;
        *holder.value.write() = Some(Arc::clone(&instance));
        debug!(point = T::NAME, extension = name, "Extension materialised");
        Ok(instance)
    }

    /// The already-materialised instance for `name`, without constructing.
    pub fn loaded(&self, name: &str) -> Option<Arc<T>> {
        self.holders
            .read()
            .get(name)
            .and_then(|holder| holder.value.read().clone())
    }

    /// Whether `name` is bound for this point.
    pub fn contains(&self, name: &str) -> Result<bool, ExtensionError> {
        Ok(self.registry()?.names.contains_key(name))
    }

    /// Every bound name (all aliases), sorted.
    pub fn supported_names(&self) -> Result<BTreeSet<String>, ExtensionError> {
        Ok(self.registry()?.names.keys().cloned().collect())
    }

    /// Every name with a materialised instance, sorted.
    pub fn loaded_names(&self) -> BTreeSet<String> {
        self.holders
            .read()
            .iter()
            .filter(|(_, holder)| holder.value.read().is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The validated default extension name, when the point declares one.
    pub fn default_name(&self) -> Result<Option<String>, ExtensionError> {
        Ok(self.registry()?.default_name.clone())
    }

    /// The default extension, when the point declares a usable default.
    pub fn default_extension(&self) -> Result<Option<Arc<T>>, ExtensionError> {
        match self.default_name()? {
            Some(name) if name != "true" => self.extension(&name).map(Some),
            _ => Ok(None),
        }
    }

    /// The canonical name `instance` was materialised under, or `None` for
    /// instances this loader never published.
    pub fn name_of(&self, instance: &Arc<T>) -> Option<String> {
        let registry = self.registry().ok()?;
        let holders = self.holders.read();
        for (name, holder) in holders.iter() {
            let Some(published) = holder.value.read().clone() else {
                continue;
            };
            if Arc::ptr_eq(&published, instance) {
                let canonical = registry
                    .names
                    .get(name)
                    .and_then(|registration| registry.canonical.get(&(registration.concrete)()))
                    .cloned();
                return canonical.or_else(|| Some(name.clone()));
            }
        }
        None
    }

    /// The canonical name under which the concrete type `C` was bound.
    pub fn canonical_name<C: 'static>(&self) -> Result<Option<String>, ExtensionError> {
        Ok(self.registry()?.canonical.get(&TypeId::of::<C>()).cloned())
    }

    // ─── Adaptive ────────────────────────────────────────────────────────

    /// The adaptive singleton: the manually registered adaptive
    /// implementation when one exists, otherwise the dispatcher
    /// synthesized for the trait. A failed build is recorded and re-raised
    /// on every subsequent call.
    pub fn adaptive(&self) -> Result<Arc<T>, ExtensionError> {
        if let Some(instance) = self.adaptive.value.read().as_ref() {
            return Ok(Arc::clone(instance));
        }
        if let Some(detail) = self.adaptive.failure.read().clone() {
            return Err(ExtensionError::AdaptiveUnavailable {
                point: T::NAME,
                detail,
            });
        }

        let _guard = self.adaptive.build.lock();
        if let Some(instance) = self.adaptive.value.read().as_ref() {
            return Ok(Arc::clone(instance));
        }
        if let Some(detail) = self.adaptive.failure.read().clone() {
            return Err(ExtensionError::AdaptiveUnavailable {
                point: T::NAME,
                detail,
            });
        }

        match self.create_adaptive() {
            Ok(instance) => {
                *self.adaptive.value.write() = Some(Arc::clone(&instance));
                Ok(instance)
            }
            Err(error) => {
                *self.adaptive.failure.write() = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn create_adaptive(&self) -> Result<Arc<T>, ExtensionError> {
        let registry = self.registry()?;
        let env = self.environment()?;
        match registry.adaptive {
            Some(registration) => {
                let ProviderKind::Adaptive { construct } = &registration.kind else {
                    return Err(ExtensionError::configuration(
                        T::NAME,
                        format!("{} is not an adaptive implementation", registration.path),
                    ));
                };
                let mut erased = construct(&env)
                    .map_err(|source| ExtensionError::construction(T::NAME, "adaptive", source))?;
                self.inject(&env, "adaptive", erased.value.as_mut(), registration.bindings);
                let sealed = (erased.seal)(erased.value)
                    .map_err(|source| ExtensionError::construction(T::NAME, "adaptive", source))?;
                unpack::<T>(&sealed).ok_or_else(|| ExtensionError::TypeMismatch {
                    point: T::NAME,
                    name: "adaptive".to_string(),
                })
            }
            None => {
                let instance = T::synthesize(&env)?;
                debug!(point = T::NAME, "Adaptive dispatcher synthesized");
                Ok(instance)
            }
        }
    }

    // ─── Materialisation ─────────────────────────────────────────────────

    fn holder(&self, name: &str) -> Arc<InstanceHolder<T>> {
        if let Some(holder) = self.holders.read().get(name) {
            return Arc::clone(holder);
        }
        let mut holders = self.holders.write();
        Arc::clone(
            holders
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(InstanceHolder::new())),
        )
    }

    fn create(&self, name: &str) -> Result<Arc<T>, ExtensionError> {
        let registry = self.registry()?;
        let Some(registration) = registry.names.get(name).copied() else {
            return Err(registry.not_found(T::NAME, name));
        };
        let env = self.environment()?;

        let raw = self.raw_instance(&env, name, registration)?;
        let mut instance = unpack::<T>(&raw).ok_or_else(|| ExtensionError::TypeMismatch {
            point: T::NAME,
            name: name.to_string(),
        })?;

        for wrapper in &registry.wrappers {
            instance = self.wrap_layer(&env, name, wrapper, instance)?;
        }
        Ok(instance)
    }

    /// The shared raw (pre-wrapper) instance for a registration,
    /// constructing and injecting it once per environment.
    fn raw_instance(
        &self,
        env: &Environment,
        name: &str,
        registration: &'static ExtensionRegistration,
    ) -> Result<ObjectArc, ExtensionError> {
        let concrete = (registration.concrete)();
        if let Some(existing) = env.raw_instance(concrete) {
            return Ok(existing);
        }

        let ProviderKind::Ordinary { construct } = &registration.kind else {
            return Err(ExtensionError::configuration(
                T::NAME,
                format!("'{name}' does not resolve to an ordinary implementation"),
            ));
        };
        let mut erased = construct(env)
            .map_err(|source| ExtensionError::construction(T::NAME, name, source))?;
        self.inject(env, name, erased.value.as_mut(), registration.bindings);
        let sealed = (erased.seal)(erased.value)
            .map_err(|source| ExtensionError::construction(T::NAME, name, source))?;
        Ok(env.publish_raw_instance(concrete, sealed))
    }

    fn wrap_layer(
        &self,
        env: &Environment,
        name: &str,
        registration: &'static ExtensionRegistration,
        inner: Arc<T>,
    ) -> Result<Arc<T>, ExtensionError> {
        let ProviderKind::Wrapper { wrap } = &registration.kind else {
            return Err(ExtensionError::configuration(
                T::NAME,
                format!("{} is not a wrapper", registration.path),
            ));
        };
        let mut erased = wrap(pack::<T>(inner))
            .map_err(|source| ExtensionError::construction(T::NAME, name, source))?;
        self.inject(env, name, erased.value.as_mut(), registration.bindings);
        let sealed = (erased.seal)(erased.value)
            .map_err(|source| ExtensionError::construction(T::NAME, name, source))?;
        unpack::<T>(&sealed).ok_or_else(|| ExtensionError::TypeMismatch {
            point: T::NAME,
            name: name.to_string(),
        })
    }

    fn inject(
        &self,
        env: &Environment,
        name: &str,
        value: &mut (dyn std::any::Any + Send + Sync),
        bindings: &'static [crate::registration::InjectorBinding],
    ) {
        let Some(factory) = &self.object_factory else {
            return;
        };
        let ctx = InjectionContext::new(env, factory);
        apply_bindings(T::NAME, name, value, bindings, &ctx);
    }

    // ─── Test-only mutation ──────────────────────────────────────────────

    /// Binds `registration` under `name` (ignored for wrappers and
    /// adaptive registrations). Rejects rebinding a name to a different
    /// provider. Intended for tests.
    pub fn register(
        &self,
        name: &str,
        registration: &'static ExtensionRegistration,
    ) -> Result<(), ExtensionError> {
        self.install(name, registration, false)
    }

    /// Like [`register`](Self::register), but overwrites an existing
    /// binding and discards the name's cached instance and the adaptive
    /// singleton. Intended for tests.
    pub fn replace(
        &self,
        name: &str,
        registration: &'static ExtensionRegistration,
    ) -> Result<(), ExtensionError> {
        self.install(name, registration, true)?;
        self.holders.write().remove(name);
        *self.adaptive.value.write() = None;
        *self.adaptive.failure.write() = None;
        Ok(())
    }

    fn install(
        &self,
        name: &str,
        registration: &'static ExtensionRegistration,
        replace: bool,
    ) -> Result<(), ExtensionError> {
        if !registration.is_for(TypeId::of::<T>()) {
            return Err(ExtensionError::configuration(
                T::NAME,
                format!(
                    "registration {} belongs to a different extension point",
                    registration.path
                ),
            ));
        }
        let current = self.registry()?;
        let mut updated = PointRegistry::clone(&current);
        updated.install(T::NAME, Some(name), registration, replace)?;
        *self.registry.write() = Some(Arc::new(updated));
        Ok(())
    }
}

impl<T: ExtensionPoint + ?Sized> ErasedLoader for ExtensionLoader<T> {
    fn adaptive_erased(&self) -> Result<ObjectArc, ExtensionError> {
        self.adaptive().map(pack::<T>)
    }
}
