//! The process-wide extension inventory.
//!
//! Every implementation, wrapper, and manual adaptive dispatcher announces
//! itself with an [`ExtensionRegistration`] contributed to the
//! [`EXTENSION_REGISTRATIONS`] distributed slice — normally by the
//! `#[extension]` attribute, occasionally by hand (the built-in factories,
//! tests). Config files then *bind names* to these registrations: a line's
//! provider path is matched against [`ExtensionRegistration::path`], and a
//! path with no matching registration is the load-failure analogue of an
//! unresolvable class.
//!
//! Registrations are plain statics built from fn pointers, so the whole
//! inventory is assembled at link time with no life-before-main.

use std::any::{Any, TypeId};

use braze_core::error::BoxError;
use linkme::distributed_slice;

use crate::inject::InjectionContext;
use crate::point::ObjectArc;

// ─── Inventory ────────────────────────────────────────────────────────────────

/// All extension registrations linked into the process.
#[distributed_slice]
pub static EXTENSION_REGISTRATIONS: [ExtensionRegistration];

// ─── Descriptor types ─────────────────────────────────────────────────────────

/// A freshly constructed, not-yet-published extension instance.
///
/// `value` is the concrete object (mutable, so injector bindings can still
/// write into it); `seal` converts it into the shared [`ObjectArc`] once
/// wiring is done.
pub struct ErasedInstance {
    /// The concrete instance, boxed for the injector.
    pub value: Box<dyn Any + Send + Sync>,
    /// Converts the finished instance into its erased published form.
    pub seal: fn(Box<dyn Any + Send + Sync>) -> Result<ObjectArc, BoxError>,
}

/// Constructor for ordinary and manual-adaptive providers.
pub type ConstructFn =
    fn(&crate::environment::Environment) -> Result<ErasedInstance, BoxError>;

/// Constructor for wrapper providers; receives the instance to decorate.
pub type WrapFn = fn(ObjectArc) -> Result<ErasedInstance, BoxError>;

/// How a registered implementation participates in loading.
#[derive(Debug)]
pub enum ProviderKind {
    /// A plain implementation, selected by name.
    Ordinary {
        /// No-argument construction.
        construct: ConstructFn,
    },
    /// A hand-written adaptive dispatcher; at most one per point.
    Adaptive {
        /// No-argument construction.
        construct: ConstructFn,
    },
    /// A decorator applied around every materialised instance.
    Wrapper {
        /// Single-argument construction from the decorated instance.
        wrap: WrapFn,
    },
}

/// One declared dependency of an extension, applied by the injector.
///
/// `apply` receives the un-sealed concrete instance and the injection
/// context; it returns `Ok(true)` when the dependency was resolved and
/// written, `Ok(false)` when the factory had nothing to offer (skip), and
/// `Err` on a failure the injector logs and swallows.
#[derive(Debug)]
pub struct InjectorBinding {
    /// Property name handed to the extension factory.
    pub property: &'static str,
    /// Resolves and writes the dependency.
    pub apply:
        fn(&mut (dyn Any + Send + Sync), &InjectionContext<'_>) -> Result<bool, BoxError>,
}

/// Activation metadata for rule-based selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivateMeta {
    /// Groups this extension activates in; empty matches every group.
    pub groups: &'static [&'static str],
    /// URL parameter keys that trigger activation; empty always triggers.
    pub keys: &'static [&'static str],
    /// Sort order within the auto-activated block.
    pub order: i32,
}

/// A statically registered extension implementation.
#[derive(Debug)]
pub struct ExtensionRegistration {
    /// `TypeId` of the extension point (`dyn Trait`) this implements.
    pub point: fn() -> TypeId,
    /// `TypeId` of the concrete implementation type; keys the raw-instance
    /// table shared across loaders.
    pub concrete: fn() -> TypeId,
    /// Qualified Rust path of the implementation, e.g.
    /// `"demo::robot::OptimusPrime"`. Config lines reference its dotted form.
    pub path: &'static str,
    /// Simple type name, used for name inference.
    pub type_name: &'static str,
    /// Explicit name declared at the registration site; empty when the
    /// name comes from the config line or from inference.
    pub declared_name: &'static str,
    /// Ordinary, adaptive, or wrapper.
    pub kind: ProviderKind,
    /// Declared dependencies, applied after construction.
    pub bindings: &'static [InjectorBinding],
    /// Activation metadata, when the extension is activatable.
    pub activate: Option<ActivateMeta>,
}

impl ExtensionRegistration {
    /// Whether this registration belongs to the given extension point.
    pub fn is_for(&self, point: TypeId) -> bool {
        (self.point)() == point
    }

    /// The dotted provider path config lines bind against.
    pub fn dotted_path(&self) -> String {
        self.path.replace("::", ".")
    }

    /// Whether a config-line literal references this registration. Both
    /// the dotted and the `::` form are accepted.
    pub fn matches_literal(&self, literal: &str) -> bool {
        self.path == literal || self.dotted_path() == literal
    }
}
