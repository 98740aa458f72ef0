//! Request descriptors consumed by adaptive dispatch and activation.
//!
//! A [`Url`] is the opaque request handle the loader inspects when choosing
//! an extension at call time: a protocol string, an address, and a flat
//! parameter map with a per-method lookup convention
//! (`<method>.<key>` overrides `<key>`).
//!
//! [`Invocation`] is the companion call-site descriptor; when an adaptive
//! method takes one, the dispatcher uses its method name for the
//! per-method parameter lookup.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExtensionError;

// ─── Url ──────────────────────────────────────────────────────────────────────

/// An opaque request descriptor.
///
/// The loader never interprets a URL beyond its protocol and parameters;
/// hosts and paths are carried through for diagnostics and for the caller's
/// own use.
///
/// # Parameter conventions
///
/// - [`parameter`](Self::parameter) returns the raw value, including an
///   empty string if the key was bound to one. Adaptive resolution treats
///   empty values as absent.
/// - [`method_parameter`](Self::method_parameter) first consults
///   `<method>.<key>`, then falls back to the bare `<key>`.
///
/// # Example
///
/// ```
/// use braze_core::Url;
///
/// let url = Url::parse("rmi://registry.local:1099/demo?loadbalance=random").unwrap();
/// assert_eq!(url.protocol(), "rmi");
/// assert_eq!(url.parameter("loadbalance"), Some("random"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    protocol: String,
    host: String,
    port: Option<u16>,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl Url {
    /// Creates a URL from its parts, with an empty parameter map.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            path: path.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Parses a textual URL of the form
    /// `[protocol://][host[:port]]/path[?key=value&…]`.
    ///
    /// The protocol and the authority are both optional, so `"/context"`
    /// parses to a URL with an empty protocol — the shape adaptive dispatch
    /// relies on to fall back to a point's default extension.
    pub fn parse(input: &str) -> Result<Self, ExtensionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ExtensionError::InvalidUrl {
                input: input.to_string(),
                detail: "empty input".to_string(),
            });
        }

        let (head, query) = match trimmed.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (trimmed, None),
        };

        let mut parameters = BTreeMap::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                parameters.insert(key.to_string(), value.to_string());
            }
        }

        let (protocol, rest) = match head.split_once("://") {
            Some((protocol, rest)) => (protocol.to_string(), rest),
            None => (String::new(), head),
        };

        let (authority, path) = if protocol.is_empty() {
            // No scheme: the whole head is a path.
            ("", rest.trim_start_matches('/'))
        } else {
            match rest.split_once('/') {
                Some((authority, path)) => (authority, path),
                None => (rest, ""),
            }
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| ExtensionError::InvalidUrl {
                    input: input.to_string(),
                    detail: format!("invalid port '{port}': {e}"),
                })?;
                (host.to_string(), Some(port))
            }
            None => (authority.to_string(), None),
        };

        Ok(Self {
            protocol,
            host,
            port,
            path: path.to_string(),
            parameters,
        })
    }

    /// The protocol (scheme); empty when the URL was parsed without one.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The host; empty when the URL carries no authority.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port, if one was given.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The path, without its leading slash.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw parameter lookup.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Per-method parameter lookup: `<method>.<key>` first, then `<key>`.
    pub fn method_parameter(&self, method: &str, key: &str) -> Option<&str> {
        self.parameters
            .get(&format!("{method}.{key}"))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
            .or_else(|| self.parameter(key))
    }

    /// The full parameter map, in key order.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Returns a copy of this URL with `key` bound to `value`.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns a copy of this URL with a different protocol.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.protocol.is_empty() {
            write!(f, "{}://", self.protocol)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "/{}", self.path)?;
        let mut first = true;
        for (key, value) in &self.parameters {
            f.write_str(if first { "?" } else { "&" })?;
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

// ─── Invocation ───────────────────────────────────────────────────────────────

/// A call-site descriptor.
///
/// Adaptive dispatchers detect an `Invocation`-typed parameter and use
/// [`method_name`](Self::method_name) to switch parameter lookups over to
/// [`Url::method_parameter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    method_name: String,
    attachments: BTreeMap<String, String>,
}

impl Invocation {
    /// Creates a descriptor for a call to `method_name`.
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            attachments: BTreeMap::new(),
        }
    }

    /// The name of the invoked method.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// An attachment value, if present.
    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    /// Returns a copy of this invocation with `key` attached.
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }
}

// ─── UrlSource ────────────────────────────────────────────────────────────────

/// Implemented by request types that carry a [`Url`] without being one.
///
/// When an adaptive method has no `Url`-typed parameter, the dispatcher
/// falls back to a parameter marked `#[url]`, whose type must implement
/// this trait.
pub trait UrlSource {
    /// The request URL carried by this value.
    fn url(&self) -> &Url;
}

impl UrlSource for Url {
    fn url(&self) -> &Url {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url() {
        let url = Url::parse("dubbo://10.20.30.40:20880/demo/service?side=provider&timeout=500")
            .unwrap();
        assert_eq!(url.protocol(), "dubbo");
        assert_eq!(url.host(), "10.20.30.40");
        assert_eq!(url.port(), Some(20880));
        assert_eq!(url.path(), "demo/service");
        assert_eq!(url.parameter("side"), Some("provider"));
        assert_eq!(url.parameter("timeout"), Some("500"));
        assert_eq!(url.parameter("absent"), None);
    }

    #[test]
    fn parses_bare_path() {
        let url = Url::parse("/context").unwrap();
        assert_eq!(url.protocol(), "");
        assert_eq!(url.host(), "");
        assert_eq!(url.path(), "context");
    }

    #[test]
    fn rejects_empty_and_bad_port() {
        assert!(Url::parse("   ").is_err());
        assert!(Url::parse("rmi://host:notaport/x").is_err());
    }

    #[test]
    fn method_parameter_prefers_qualified_key() {
        let url = Url::parse("test://h/p?loadbalance=random&select.loadbalance=roundrobin")
            .unwrap();
        assert_eq!(
            url.method_parameter("select", "loadbalance"),
            Some("roundrobin")
        );
        assert_eq!(url.method_parameter("other", "loadbalance"), Some("random"));
    }

    #[test]
    fn empty_qualified_value_falls_back() {
        let url = Url::parse("test://h/p?select.loadbalance=&loadbalance=random").unwrap();
        assert_eq!(url.method_parameter("select", "loadbalance"), Some("random"));
    }

    #[test]
    fn display_round_trips() {
        let url = Url::parse("rmi://host:1099/demo?a=1&b=2").unwrap();
        let again = Url::parse(&url.to_string()).unwrap();
        assert_eq!(url, again);
    }
}
