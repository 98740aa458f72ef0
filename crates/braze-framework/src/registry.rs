//! Per-point classification of discovered registrations.
//!
//! A [`PointRegistry`] is the immutable product of one scan: config lines
//! resolved against the inventory, each resolved registration classified
//! as ordinary (name-bound), adaptive (singleton slot), or wrapper.
//! Per-line resolution failures are captured — keyed by the offending
//! provider path — and only surface when a lookup actually names them.
//!
//! The registry is built at most once per point (on success); loaders hold
//! it behind a double-checked holder and swap whole copies for the
//! test-only `register`/`replace` operations.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::ptr;

use braze_core::ExtensionError;

use crate::registration::{ActivateMeta, ExtensionRegistration, ProviderKind};
use crate::scanner::ConfigLine;

/// Splits a comma-separated alias list, trimming and dropping blanks.
pub(crate) fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// The classified view of one extension point's configuration.
#[derive(Debug, Clone, Default)]
pub(crate) struct PointRegistry {
    /// Name (every alias) → registration.
    pub names: BTreeMap<String, &'static ExtensionRegistration>,
    /// Concrete type → canonical name (first alias).
    pub canonical: HashMap<TypeId, String>,
    /// Wrappers in discovery order.
    pub wrappers: Vec<&'static ExtensionRegistration>,
    /// The manual adaptive dispatcher, when one is registered.
    pub adaptive: Option<&'static ExtensionRegistration>,
    /// Activatable extensions (canonical name, metadata) in discovery order.
    pub activations: Vec<(String, ActivateMeta)>,
    /// Validated default extension name.
    pub default_name: Option<String>,
    /// Per-line load failures, keyed by provider path (or raw line).
    pub failures: BTreeMap<String, String>,
}

impl PointRegistry {
    /// Builds the registry for a point from its scanned config lines and
    /// the inventory registrations belonging to it.
    pub(crate) fn build(
        point_name: &'static str,
        default_raw: &str,
        lines: Vec<ConfigLine>,
        candidates: &[&'static ExtensionRegistration],
    ) -> Result<Self, ExtensionError> {
        let mut registry = Self {
            default_name: parse_default(point_name, default_raw)?,
            ..Self::default()
        };

        for line in lines {
            if line.literal.is_empty() {
                registry
                    .failures
                    .entry(line.raw)
                    .or_insert_with(|| format!("malformed config line ({})", line.origin));
                continue;
            }
            let Some(registration) = candidates
                .iter()
                .find(|candidate| candidate.matches_literal(&line.literal))
                .copied()
            else {
                registry.failures.entry(line.literal).or_insert_with(|| {
                    format!(
                        "provider path is not registered in the extension inventory ({})",
                        line.origin
                    )
                });
                continue;
            };
            registry.install(point_name, line.names.as_deref(), registration, false)?;
        }

        Ok(registry)
    }

    /// Classifies and records one registration. With `replace` set an
    /// existing binding under the same name is overwritten instead of
    /// rejected.
    pub(crate) fn install(
        &mut self,
        point_name: &'static str,
        names: Option<&str>,
        registration: &'static ExtensionRegistration,
        replace: bool,
    ) -> Result<(), ExtensionError> {
        match &registration.kind {
            ProviderKind::Adaptive { .. } => match self.adaptive {
                Some(existing) if !ptr::eq(existing, registration) && !replace => {
                    Err(ExtensionError::configuration(
                        point_name,
                        format!(
                            "more than one adaptive implementation: {} and {}",
                            existing.path, registration.path
                        ),
                    ))
                }
                _ => {
                    self.adaptive = Some(registration);
                    Ok(())
                }
            },
            ProviderKind::Wrapper { .. } => {
                if !self
                    .wrappers
                    .iter()
                    .any(|wrapper| ptr::eq(*wrapper, registration))
                {
                    self.wrappers.push(registration);
                }
                Ok(())
            }
            ProviderKind::Ordinary { .. } => {
                let list = match names {
                    Some(list) => list.to_string(),
                    None => infer_name(registration, point_name),
                };
                let tokens = split_names(&list);
                if tokens.is_empty() {
                    return Err(ExtensionError::configuration(
                        point_name,
                        format!("no usable name for provider {}", registration.path),
                    ));
                }
                for (index, token) in tokens.iter().enumerate() {
                    self.bind(point_name, token, registration, replace)?;
                    if index == 0 {
                        let concrete = (registration.concrete)();
                        if replace {
                            self.canonical.insert(concrete, token.clone());
                            self.activations.retain(|(name, _)| name != token);
                        } else {
                            self.canonical.entry(concrete).or_insert_with(|| token.clone());
                        }
                        if let Some(meta) = registration.activate {
                            if !self.activations.iter().any(|(name, _)| name == token) {
                                self.activations.push((token.clone(), meta));
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn bind(
        &mut self,
        point_name: &'static str,
        name: &str,
        registration: &'static ExtensionRegistration,
        replace: bool,
    ) -> Result<(), ExtensionError> {
        match self.names.get(name) {
            Some(existing) if ptr::eq(*existing, registration) => Ok(()),
            Some(existing) if !replace => Err(ExtensionError::configuration(
                point_name,
                format!(
                    "duplicate extension name '{name}': bound to {} and {}",
                    existing.path, registration.path
                ),
            )),
            _ => {
                self.names.insert(name.to_string(), registration);
                Ok(())
            }
        }
    }

    /// Composes the not-found diagnostic for `name`, joining every captured
    /// load failure whose key contains the name case-insensitively.
    pub(crate) fn not_found(&self, point_name: &'static str, name: &str) -> ExtensionError {
        let needle = name.to_lowercase();
        let mut detail = String::new();
        for (literal, message) in &self.failures {
            if literal.to_lowercase().contains(&needle) {
                detail.push_str("\n  ");
                detail.push_str(literal);
                detail.push_str(": ");
                detail.push_str(message);
            }
        }
        ExtensionError::NotFound {
            point: point_name,
            name: name.to_string(),
            detail,
        }
    }
}

fn parse_default(point_name: &'static str, raw: &str) -> Result<Option<String>, ExtensionError> {
    let tokens = split_names(raw);
    match tokens.len() {
        0 => Ok(None),
        1 => Ok(tokens.into_iter().next()),
        _ => Err(ExtensionError::configuration(
            point_name,
            format!("more than one default extension name: {tokens:?}"),
        )),
    }
}

fn infer_name(registration: &ExtensionRegistration, point_name: &str) -> String {
    if !registration.declared_name.is_empty() {
        return registration.declared_name.to_string();
    }
    let simple = registration.type_name;
    simple
        .strip_suffix(point_name)
        .filter(|stripped| !stripped.is_empty())
        .unwrap_or(simple)
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::{ErasedInstance, InjectorBinding};
    use braze_core::error::BoxError;

    fn unconstructible(
        _env: &crate::environment::Environment,
    ) -> Result<ErasedInstance, BoxError> {
        Err("not constructible in this test".into())
    }

    fn unwrappable(_inner: crate::point::ObjectArc) -> Result<ErasedInstance, BoxError> {
        Err("not constructible in this test".into())
    }

    const NO_BINDINGS: &[InjectorBinding] = &[];

    fn registration(
        path: &'static str,
        type_name: &'static str,
        declared_name: &'static str,
        kind: ProviderKind,
        activate: Option<ActivateMeta>,
    ) -> &'static ExtensionRegistration {
        Box::leak(Box::new(ExtensionRegistration {
            point: || TypeId::of::<()>(),
            concrete: TypeId::of::<()>,
            path,
            type_name,
            declared_name,
            kind,
            bindings: NO_BINDINGS,
            activate,
        }))
    }

    fn ordinary(path: &'static str, type_name: &'static str) -> &'static ExtensionRegistration {
        registration(
            path,
            type_name,
            "",
            ProviderKind::Ordinary {
                construct: unconstructible,
            },
            None,
        )
    }

    fn line(names: Option<&str>, literal: &str) -> ConfigLine {
        ConfigLine {
            raw: match names {
                Some(names) => format!("{names} = {literal}"),
                None => literal.to_string(),
            },
            names: names.map(String::from),
            literal: literal.to_string(),
            origin: "test".to_string(),
        }
    }

    #[test]
    fn binds_aliases_and_keeps_first_canonical() {
        let reg = ordinary("demo::Aliased", "Aliased");
        let registry = PointRegistry::build(
            "Robot",
            "",
            vec![line(Some("a, b"), "demo.Aliased")],
            &[reg],
        )
        .unwrap();
        assert!(registry.names.contains_key("a"));
        assert!(registry.names.contains_key("b"));
        assert_eq!(
            registry.canonical.get(&TypeId::of::<()>()).map(String::as_str),
            Some("a")
        );
    }

    #[test]
    fn duplicate_name_to_different_provider_is_an_error() {
        let first = ordinary("demo::First", "First");
        let second = ordinary("demo::Second", "Second");
        let result = PointRegistry::build(
            "Robot",
            "",
            vec![
                line(Some("x"), "demo.First"),
                line(Some("x"), "demo.Second"),
            ],
            &[first, second],
        );
        assert!(matches!(
            result,
            Err(ExtensionError::Configuration { .. })
        ));
    }

    #[test]
    fn rebinding_the_same_provider_is_idempotent() {
        let reg = ordinary("demo::First", "First");
        let registry = PointRegistry::build(
            "Robot",
            "",
            vec![line(Some("x"), "demo.First"), line(Some("x"), "demo.First")],
            &[reg],
        )
        .unwrap();
        assert_eq!(registry.names.len(), 1);
    }

    #[test]
    fn second_distinct_adaptive_is_an_error() {
        let first = registration(
            "demo::ManualA",
            "ManualA",
            "",
            ProviderKind::Adaptive {
                construct: unconstructible,
            },
            None,
        );
        let second = registration(
            "demo::ManualB",
            "ManualB",
            "",
            ProviderKind::Adaptive {
                construct: unconstructible,
            },
            None,
        );
        let result = PointRegistry::build(
            "Robot",
            "",
            vec![line(None, "demo.ManualA"), line(None, "demo.ManualB")],
            &[first, second],
        );
        assert!(matches!(result, Err(ExtensionError::Configuration { .. })));
    }

    #[test]
    fn wrappers_are_deduplicated_in_discovery_order() {
        let wrapper = registration(
            "demo::LogWrapper",
            "LogWrapper",
            "",
            ProviderKind::Wrapper { wrap: unwrappable },
            None,
        );
        let registry = PointRegistry::build(
            "Robot",
            "",
            vec![line(None, "demo.LogWrapper"), line(None, "demo.LogWrapper")],
            &[wrapper],
        )
        .unwrap();
        assert_eq!(registry.wrappers.len(), 1);
    }

    #[test]
    fn name_inference_strips_point_suffix_and_lowercases() {
        let reg = ordinary("demo::RandomLoadBalance", "RandomLoadBalance");
        let registry = PointRegistry::build(
            "LoadBalance",
            "",
            vec![line(None, "demo.RandomLoadBalance")],
            &[reg],
        )
        .unwrap();
        assert!(registry.names.contains_key("random"));
    }

    #[test]
    fn declared_name_wins_over_inference() {
        let reg = registration(
            "demo::Legacy",
            "Legacy",
            "old",
            ProviderKind::Ordinary {
                construct: unconstructible,
            },
            None,
        );
        let registry =
            PointRegistry::build("Robot", "", vec![line(None, "demo.Legacy")], &[reg]).unwrap();
        assert!(registry.names.contains_key("old"));
    }

    #[test]
    fn unresolved_literal_is_captured_not_fatal() {
        let healthy = ordinary("demo::Healthy", "Healthy");
        let registry = PointRegistry::build(
            "Robot",
            "",
            vec![
                line(Some("broken"), "demo.Broken"),
                line(Some("healthy"), "demo.Healthy"),
            ],
            &[healthy],
        )
        .unwrap();
        assert!(registry.names.contains_key("healthy"));
        assert!(registry.failures.contains_key("demo.Broken"));

        let err = registry.not_found("Robot", "broken");
        let message = err.to_string();
        assert!(message.contains("demo.Broken"));
        assert!(message.contains("extension inventory"));
    }

    #[test]
    fn multi_token_default_is_an_error() {
        let result = PointRegistry::build("Robot", "a,b", Vec::new(), &[]);
        assert!(matches!(result, Err(ExtensionError::Configuration { .. })));
    }

    #[test]
    fn default_name_is_trimmed_single_token() {
        let registry = PointRegistry::build("Robot", "  optimus  ", Vec::new(), &[]).unwrap();
        assert_eq!(registry.default_name.as_deref(), Some("optimus"));
    }

    #[test]
    fn activation_metadata_keys_on_first_alias() {
        let reg = registration(
            "demo::CacheFilter",
            "CacheFilter",
            "",
            ProviderKind::Ordinary {
                construct: unconstructible,
            },
            Some(ActivateMeta {
                groups: &["provider"],
                keys: &["cache"],
                order: 10,
            }),
        );
        let registry = PointRegistry::build(
            "Filter",
            "",
            vec![line(Some("cache, cacheAlias"), "demo.CacheFilter")],
            &[reg],
        )
        .unwrap();
        assert_eq!(registry.activations.len(), 1);
        assert_eq!(registry.activations[0].0, "cache");
    }
}
