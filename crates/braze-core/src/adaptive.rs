//! The data half of adaptive dispatch.
//!
//! Generated dispatchers do not interpret URLs themselves; they hand the
//! method's declared lookup keys, the request URL, and the extension
//! point's default name to [`resolve_adaptive_name`] and delegate to
//! whatever name comes back.
//!
//! The resolution rules mirror the nested-default chain of the source
//! system: keys are consulted left to right, each key's miss falling
//! through to the next, the innermost default being the point's declared
//! default extension. The key `protocol` is special and reads the URL's
//! protocol instead of its parameter map.

use crate::url::Url;

/// Derives the default lookup key for an extension point from its
/// camel-case simple name: `LoadBalance` → `load.balance`.
///
/// Used when an adaptive method declares no keys of its own.
pub fn dispatch_key_for(point_name: &str) -> String {
    let mut key = String::with_capacity(point_name.len() + 4);
    for (index, ch) in point_name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                key.push('.');
            }
            key.push(ch.to_ascii_lowercase());
        } else {
            key.push(ch);
        }
    }
    key
}

/// Resolves the extension name an adaptive method should delegate to.
///
/// - `keys` are consulted left to right; an empty list means the single
///   key derived from `point_name` by [`dispatch_key_for`].
/// - The special key `protocol` reads [`Url::protocol`]; an empty protocol
///   counts as a miss.
/// - When `method` is given (an `Invocation` was in scope at the call
///   site), lookups go through [`Url::method_parameter`]; otherwise plain
///   [`Url::parameter`].
/// - The innermost fallback is `default_name`; `None` (or blank) means the
///   chain can come up empty, in which case the caller reports the tried
///   keys.
///
/// Values are trimmed; blank values count as misses.
pub fn resolve_adaptive_name(
    url: &Url,
    point_name: &str,
    keys: &[&str],
    method: Option<&str>,
    default_name: Option<&str>,
) -> Option<String> {
    let derived;
    let derived_slot;
    let keys: &[&str] = if keys.is_empty() {
        derived = dispatch_key_for(point_name);
        derived_slot = [derived.as_str()];
        &derived_slot
    } else {
        keys
    };

    let mut chosen: Option<String> = non_blank(default_name);

    // Rightmost key is the innermost fallback, so walk the list backwards
    // and let earlier keys overwrite.
    for key in keys.iter().rev() {
        let found = if *key == "protocol" {
            non_blank(Some(url.protocol()))
        } else if let Some(method) = method {
            non_blank(url.method_parameter(method, key))
        } else {
            non_blank(url.parameter(key))
        };
        if found.is_some() {
            chosen = found;
        }
    }

    chosen
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str) -> Url {
        Url::parse(text).unwrap()
    }

    #[test]
    fn derives_dotted_key_from_camel_case() {
        assert_eq!(dispatch_key_for("LoadBalance"), "load.balance");
        assert_eq!(dispatch_key_for("Protocol"), "protocol");
        assert_eq!(dispatch_key_for("HttpBinder"), "http.binder");
    }

    #[test]
    fn first_key_wins() {
        let u = url("test://h/p?cluster=failover&loadbalance=random");
        let name = resolve_adaptive_name(
            &u,
            "Cluster",
            &["cluster", "loadbalance"],
            None,
            Some("failsafe"),
        );
        assert_eq!(name.as_deref(), Some("failover"));
    }

    #[test]
    fn missing_keys_fall_through_to_default() {
        let u = url("test://h/p");
        let name = resolve_adaptive_name(&u, "Cluster", &["cluster"], None, Some("failsafe"));
        assert_eq!(name.as_deref(), Some("failsafe"));
    }

    #[test]
    fn empty_key_list_uses_derived_key() {
        let u = url("test://h/p?load.balance=roundrobin");
        let name = resolve_adaptive_name(&u, "LoadBalance", &[], None, None);
        assert_eq!(name.as_deref(), Some("roundrobin"));
    }

    #[test]
    fn protocol_key_reads_scheme() {
        let with_scheme = url("rmi://h:1/p");
        assert_eq!(
            resolve_adaptive_name(&with_scheme, "Protocol", &["protocol"], None, Some("dubbo"))
                .as_deref(),
            Some("rmi")
        );

        let without_scheme = url("/p");
        assert_eq!(
            resolve_adaptive_name(
                &without_scheme,
                "Protocol",
                &["protocol"],
                None,
                Some("dubbo")
            )
            .as_deref(),
            Some("dubbo")
        );
    }

    #[test]
    fn protocol_in_non_terminal_position_defers_to_later_keys() {
        let u = url("/p?transporter=netty");
        let name = resolve_adaptive_name(
            &u,
            "Transporter",
            &["protocol", "transporter"],
            None,
            None,
        );
        assert_eq!(name.as_deref(), Some("netty"));
    }

    #[test]
    fn invocation_switches_to_method_parameters() {
        let u = url("test://h/p?loadbalance=random&select.loadbalance=roundrobin");
        let name = resolve_adaptive_name(
            &u,
            "LoadBalance",
            &["loadbalance"],
            Some("select"),
            None,
        );
        assert_eq!(name.as_deref(), Some("roundrobin"));
    }

    #[test]
    fn blank_values_count_as_misses() {
        let u = url("test://h/p?cluster=");
        let name = resolve_adaptive_name(&u, "Cluster", &["cluster"], None, Some("failsafe"));
        assert_eq!(name.as_deref(), Some("failsafe"));
    }

    #[test]
    fn unresolvable_chain_is_none() {
        let u = url("/p");
        assert_eq!(
            resolve_adaptive_name(&u, "LoadBalance", &[], None, None),
            None
        );
    }
}
