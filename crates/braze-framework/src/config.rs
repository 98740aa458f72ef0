//! Environment configuration.
//!
//! The only configuration the loader needs from the host is *where to
//! scan*: a list of root directories, each of which may contain the three
//! config subdirectories (see [`scanner`](crate::scanner)). Roots can be
//! supplied programmatically through [`EnvironmentBuilder`], or loaded
//! from `braze.toml` / `BRAZE_*` environment variables via figment.

use std::path::PathBuf;

use braze_core::ExtensionError;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use tracing::debug;

use crate::environment::Environment;

/// Scan-path configuration for an [`Environment`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Root directories searched for extension config resources.
    pub roots: Vec<PathBuf>,
}

/// Builder for [`Environment`].
///
/// # Example
///
/// ```rust,ignore
/// let env = Environment::builder()
///     .scan_root("resources")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct EnvironmentBuilder {
    roots: Vec<PathBuf>,
}

impl EnvironmentBuilder {
    /// Creates a builder with no scan roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory to scan for extension config resources.
    pub fn scan_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(path.into());
        self
    }

    /// Adds the current working directory as a scan root.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.scan_root(cwd),
            Err(_) => self,
        }
    }

    /// Merges configuration from `braze.toml` (user config directory, then
    /// the working directory) and `BRAZE_*` environment variables.
    ///
    /// Later sources win; everything found is appended to the roots added
    /// programmatically.
    pub fn load_config(mut self) -> Result<Self, ExtensionError> {
        let mut figment = Figment::new();
        if let Some(config_dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(config_dir.join("braze").join("braze.toml")));
        }
        figment = figment
            .merge(Toml::file("braze.toml"))
            .merge(Env::prefixed("BRAZE_"));

        let config: ScanConfig =
            figment
                .extract()
                .map_err(|error| ExtensionError::Configuration {
                    point: "Environment",
                    detail: format!("failed to load scan configuration: {error}"),
                })?;
        debug!(roots = config.roots.len(), "Loaded scan configuration");
        self.roots.extend(config.roots);
        Ok(self)
    }

    /// Builds the environment.
    pub fn build(self) -> Environment {
        Environment::with_scan(ScanConfig { roots: self.roots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_roots_in_order() {
        let env = EnvironmentBuilder::new()
            .scan_root("/a")
            .scan_root("/b")
            .build();
        assert_eq!(
            env.scan().roots,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn scan_config_deserialises_with_defaults() {
        let config: ScanConfig = serde_json::from_str("{}").unwrap();
        assert!(config.roots.is_empty());
    }
}
