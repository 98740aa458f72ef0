//! Rule-based activation: ordered subsets of extensions selected by group
//! and request URL.
//!
//! The automatic block is drawn from the point's activation table (group
//! predicate, trigger-key URL predicate), sorted by declared order with
//! discovery order breaking ties. The caller's `requested` list is woven
//! in around it: `-name` removes, `-default` suppresses the automatic
//! block entirely, and the `default` placeholder splices the names listed
//! before it ahead of the automatic block.

use std::sync::Arc;

use braze_core::{ExtensionError, Url};

use crate::loader::ExtensionLoader;
use crate::point::ExtensionPoint;
use crate::registry::split_names;

const DEFAULT_TOKEN: &str = "default";
const REMOVE_DEFAULT: &str = "-default";
const REMOVE_PREFIX: char = '-';

/// Whether an activation declared for `groups` applies to the requested
/// `group`. An absent or empty request matches everything; an empty
/// declaration matches every group.
pub(crate) fn group_matches(group: Option<&str>, groups: &[&str]) -> bool {
    match group {
        None | Some("") => true,
        Some(group) => groups.is_empty() || groups.contains(&group),
    }
}

/// Whether the URL triggers an activation declared with `keys`: true when
/// `keys` is empty, or when any URL parameter named `key` (or suffixed
/// `.key`) carries a non-empty value.
pub(crate) fn triggered_by(url: &Url, keys: &[&str]) -> bool {
    if keys.is_empty() {
        return true;
    }
    url.parameters().iter().any(|(parameter, value)| {
        !value.is_empty()
            && keys.iter().any(|key| {
                parameter.as_str() == *key || parameter.ends_with(&format!(".{key}"))
            })
    })
}

impl<T: ExtensionPoint + ?Sized> ExtensionLoader<T> {
    /// Returns the activated extensions for `url`, in order: user names
    /// listed before the `default` placeholder, the automatic block, then
    /// the remaining user names.
    pub fn activate(
        &self,
        url: &Url,
        requested: &[&str],
        group: Option<&str>,
    ) -> Result<Vec<Arc<T>>, ExtensionError> {
        let registry = self.registry()?;
        let mut selected: Vec<Arc<T>> = Vec::new();

        if !requested.contains(&REMOVE_DEFAULT) {
            let mut auto: Vec<(i32, &str)> = Vec::new();
            for (name, meta) in &registry.activations {
                if !group_matches(group, meta.groups) {
                    continue;
                }
                if requested.iter().any(|token| {
                    *token == name.as_str()
                        || token.strip_prefix(REMOVE_PREFIX) == Some(name.as_str())
                }) {
                    continue;
                }
                if !triggered_by(url, meta.keys) {
                    continue;
                }
                auto.push((meta.order, name.as_str()));
            }
            // Stable sort: equal orders keep discovery order.
            auto.sort_by_key(|(order, _)| *order);
            for (_, name) in auto {
                selected.push(self.extension(name)?);
            }
        }

        let mut user: Vec<Arc<T>> = Vec::new();
        for &name in requested {
            if name.starts_with(REMOVE_PREFIX) {
                continue;
            }
            if requested
                .iter()
                .any(|token| token.strip_prefix(REMOVE_PREFIX) == Some(name))
            {
                continue;
            }
            if name == DEFAULT_TOKEN {
                if !user.is_empty() {
                    selected.splice(0..0, user.drain(..));
                }
            } else {
                user.push(self.extension(name)?);
            }
        }
        selected.extend(user);
        Ok(selected)
    }

    /// [`activate`](Self::activate) with the requested names read from the
    /// comma-separated URL parameter `key`.
    pub fn activate_by_key(
        &self,
        url: &Url,
        key: &str,
        group: Option<&str>,
    ) -> Result<Vec<Arc<T>>, ExtensionError> {
        let names = url.parameter(key).map(split_names).unwrap_or_default();
        let requested: Vec<&str> = names.iter().map(String::as_str).collect();
        self.activate(url, &requested, group)
    }

    /// [`activate`](Self::activate) with no requested names.
    pub fn activate_default(
        &self,
        url: &Url,
        group: Option<&str>,
    ) -> Result<Vec<Arc<T>>, ExtensionError> {
        self.activate(url, &[], group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::registration::{
        ActivateMeta, ErasedInstance, ExtensionRegistration, ProviderKind,
    };
    use braze_core::error::BoxError;
    use std::any::TypeId;

    trait Hook: Send + Sync {
        fn id(&self) -> &'static str;
    }

    impl ExtensionPoint for dyn Hook {
        const NAME: &'static str = "Hook";
        const PATH: &'static str = "activate_tests::Hook";
        const DEFAULT_NAME: &'static str = "";

        fn synthesize(_env: &Environment) -> Result<Arc<Self>, ExtensionError> {
            Err(ExtensionError::synthesis(
                Self::NAME,
                "no adaptive methods declared",
            ))
        }
    }

    macro_rules! hook {
        ($static_name:ident, $ty:ident, $id:literal, $activate:expr) => {
            struct $ty;

            impl Hook for $ty {
                fn id(&self) -> &'static str {
                    $id
                }
            }

            static $static_name: ExtensionRegistration = ExtensionRegistration {
                point: TypeId::of::<dyn Hook>,
                concrete: TypeId::of::<$ty>,
                path: concat!("activate_tests::", stringify!($ty)),
                type_name: stringify!($ty),
                declared_name: "",
                kind: ProviderKind::Ordinary {
                    construct: |_| {
                        Ok(ErasedInstance {
                            value: Box::new($ty),
                            seal: |boxed| {
                                let concrete = boxed
                                    .downcast::<$ty>()
                                    .map_err(|_| BoxError::from("unexpected type"))?;
                                Ok(Arc::new(Arc::new(*concrete) as Arc<dyn Hook>))
                            },
                        })
                    },
                },
                bindings: &[],
                activate: $activate,
            };
        };
    }

    hook!(
        FIRST,
        FirstHook,
        "first",
        Some(ActivateMeta {
            groups: &["provider"],
            keys: &[],
            order: 10,
        })
    );
    hook!(
        SECOND,
        SecondHook,
        "second",
        Some(ActivateMeta {
            groups: &["provider"],
            keys: &[],
            order: 20,
        })
    );
    hook!(
        CONSUMER,
        ConsumerHook,
        "consumer",
        Some(ActivateMeta {
            groups: &["consumer"],
            keys: &[],
            order: 5,
        })
    );
    hook!(
        KEYED,
        KeyedHook,
        "keyed",
        Some(ActivateMeta {
            groups: &[],
            keys: &["cache"],
            order: 30,
        })
    );
    hook!(CUSTOM, CustomHook, "custom", None);

    fn environment() -> (Environment, Arc<ExtensionLoader<dyn Hook>>) {
        let env = Environment::new();
        let loader = env.loader::<dyn Hook>().unwrap();
        // Registered out of order so the sort has work to do.
        loader.register("second", &SECOND).unwrap();
        loader.register("first", &FIRST).unwrap();
        loader.register("consumer", &CONSUMER).unwrap();
        loader.register("keyed", &KEYED).unwrap();
        loader.register("custom", &CUSTOM).unwrap();
        (env, loader)
    }

    fn ids(selected: &[Arc<dyn Hook>]) -> Vec<&'static str> {
        selected.iter().map(|hook| hook.id()).collect()
    }

    fn url(text: &str) -> Url {
        Url::parse(text).unwrap()
    }

    #[test]
    fn auto_block_sorts_by_order() {
        let (_env, loader) = environment();
        let selected = loader
            .activate_default(&url("test://h/p"), Some("provider"))
            .unwrap();
        assert_eq!(ids(&selected), vec!["first", "second"]);
    }

    #[test]
    fn group_mismatch_excludes() {
        let (_env, loader) = environment();
        let selected = loader
            .activate_default(&url("test://h/p"), Some("consumer"))
            .unwrap();
        assert_eq!(ids(&selected), vec!["consumer"]);
    }

    #[test]
    fn empty_group_matches_everything() {
        let (_env, loader) = environment();
        let selected = loader.activate_default(&url("test://h/p"), None).unwrap();
        assert_eq!(ids(&selected), vec!["consumer", "first", "second"]);
    }

    #[test]
    fn negated_name_is_removed() {
        let (_env, loader) = environment();
        let selected = loader
            .activate(&url("test://h/p"), &["-first"], Some("provider"))
            .unwrap();
        assert_eq!(ids(&selected), vec!["second"]);
    }

    #[test]
    fn minus_default_keeps_only_user_names() {
        let (_env, loader) = environment();
        let selected = loader
            .activate(&url("test://h/p"), &["custom", "-default"], Some("provider"))
            .unwrap();
        assert_eq!(ids(&selected), vec!["custom"]);

        let none = loader
            .activate(&url("test://h/p"), &["-default"], Some("provider"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn default_placeholder_splices_prefix_before_auto() {
        let (_env, loader) = environment();
        let selected = loader
            .activate(
                &url("test://h/p"),
                &["custom", "default"],
                Some("provider"),
            )
            .unwrap();
        assert_eq!(ids(&selected), vec!["custom", "first", "second"]);

        let trailing = loader
            .activate(&url("test://h/p"), &["custom"], Some("provider"))
            .unwrap();
        assert_eq!(ids(&trailing), vec!["first", "second", "custom"]);
    }

    #[test]
    fn trigger_keys_require_matching_url_parameter() {
        let (_env, loader) = environment();

        let without = loader
            .activate_default(&url("test://h/p"), Some("anything"))
            .unwrap();
        assert!(!ids(&without).contains(&"keyed"));

        let with = loader
            .activate_default(&url("test://h/p?cache=lru"), Some("anything"))
            .unwrap();
        assert!(ids(&with).contains(&"keyed"));

        let suffixed = loader
            .activate_default(&url("test://h/p?demo.cache=lru"), Some("anything"))
            .unwrap();
        assert!(ids(&suffixed).contains(&"keyed"));

        let empty_value = loader
            .activate_default(&url("test://h/p?cache="), Some("anything"))
            .unwrap();
        assert!(!ids(&empty_value).contains(&"keyed"));
    }

    #[test]
    fn activate_by_key_reads_comma_separated_names() {
        let (_env, loader) = environment();
        let selected = loader
            .activate_by_key(
                &url("test://h/p?hooks=custom,-first"),
                "hooks",
                Some("provider"),
            )
            .unwrap();
        assert_eq!(ids(&selected), vec!["second", "custom"]);
    }
}
