//! Config-resource discovery.
//!
//! For an extension point with resource name `demo.robot.Robot`, the
//! scanner visits, under every configured scan root and in this order
//! (highest precedence first):
//!
//! 1. `META-INF/braze/internal/demo.robot.Robot`
//! 2. `META-INF/braze/demo.robot.Robot`
//! 3. `META-INF/services/demo.robot.Robot`
//!
//! The internal directory is additionally backed by resources embedded in
//! this crate (the built-in factory bindings), consulted before anything
//! on disk.
//!
//! Resources are UTF-8, line oriented. `#` starts a comment running to end
//! of line; blank lines are skipped; effective lines are either
//! `names = provider.path` (`names` a comma-separated alias list) or a bare
//! `provider.path`. An unreadable resource is logged and skipped — a single
//! bad file never aborts the scan.

use std::io::ErrorKind;

use tracing::warn;

use crate::config::ScanConfig;

/// Highest-precedence directory; also backed by embedded resources.
pub const INTERNAL_DIRECTORY: &str = "META-INF/braze/internal";
/// Framework config directory.
pub const FRAMEWORK_DIRECTORY: &str = "META-INF/braze";
/// Compatibility directory shared with other service-provider schemes.
pub const SERVICES_DIRECTORY: &str = "META-INF/services";

/// All search directories, highest precedence first.
pub const SEARCH_DIRECTORIES: &[&str] =
    &[INTERNAL_DIRECTORY, FRAMEWORK_DIRECTORY, SERVICES_DIRECTORY];

/// One effective line of a config resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigLine {
    /// The line as written (comment stripped, trimmed); keys malformed-line
    /// failures.
    pub raw: String,
    /// The alias list left of `=`, when present.
    pub names: Option<String>,
    /// The provider path; empty on a malformed line.
    pub literal: String,
    /// Where the line came from, for diagnostics.
    pub origin: String,
}

/// Collects the effective lines for `resource` from the embedded resources
/// and every scan root, in precedence order.
pub(crate) fn scan(
    config: &ScanConfig,
    embedded: &[(&str, &str)],
    resource: &str,
) -> Vec<ConfigLine> {
    let mut lines = Vec::new();
    for directory in SEARCH_DIRECTORIES {
        if *directory == INTERNAL_DIRECTORY {
            for (name, content) in embedded {
                if *name == resource {
                    parse_resource(content, &format!("embedded:{name}"), &mut lines);
                }
            }
        }
        for root in &config.roots {
            let path = root.join(directory).join(resource);
            match std::fs::read_to_string(&path) {
                Ok(content) => parse_resource(&content, &path.display().to_string(), &mut lines),
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => {
                    warn!(
                        resource = %path.display(),
                        error = %error,
                        "Skipping unreadable extension resource"
                    );
                }
            }
        }
    }
    lines
}

/// Parses one resource body into `out`.
pub(crate) fn parse_resource(content: &str, origin: &str, out: &mut Vec<ConfigLine>) {
    for line in content.lines() {
        let effective = match line.split_once('#') {
            Some((before, _comment)) => before,
            None => line,
        };
        let effective = effective.trim();
        if effective.is_empty() {
            continue;
        }
        let (names, literal) = match effective.split_once('=') {
            Some((names, literal)) => (Some(names.trim().to_string()), literal.trim()),
            None => (None, effective),
        };
        out.push(ConfigLine {
            raw: effective.to_string(),
            names,
            literal: literal.to_string(),
            origin: origin.to_string(),
        });
    }
}
