//! Adaptive-dispatch scenarios: protocol routing, derived keys,
//! per-method parameters, URL accessors, and synthesis failures.

use std::sync::Arc;

use braze::{
    extension, extension_point, resource_name, Environment, ExtensionError, ExtensionPoint,
    Invocation, Url, UrlSource, FRAMEWORK_DIRECTORY,
};

// ─── Protocol: explicit `protocol` key ───────────────────────────────────────

#[extension_point(default = "dubbo")]
pub trait Protocol: Send + Sync {
    #[adaptive("protocol")]
    fn refer(&self, service: &str, url: &Url) -> Result<String, ExtensionError>;

    fn destroy(&self) -> Result<(), ExtensionError>;
}

#[extension(of = dyn Protocol, name = "dubbo")]
#[derive(Default)]
pub struct DubboProtocol;

impl Protocol for DubboProtocol {
    fn refer(&self, service: &str, _url: &Url) -> Result<String, ExtensionError> {
        Ok(format!("dubbo:{service}"))
    }

    fn destroy(&self) -> Result<(), ExtensionError> {
        Ok(())
    }
}

#[extension(of = dyn Protocol, name = "rmi")]
#[derive(Default)]
pub struct RmiProtocol;

impl Protocol for RmiProtocol {
    fn refer(&self, service: &str, _url: &Url) -> Result<String, ExtensionError> {
        Ok(format!("rmi:{service}"))
    }

    fn destroy(&self) -> Result<(), ExtensionError> {
        Ok(())
    }
}

// ─── LoadBalance: derived key + invocation ───────────────────────────────────

#[extension_point(default = "random")]
pub trait LoadBalance: Send + Sync {
    #[adaptive]
    fn select(&self, url: &Url, invocation: &Invocation) -> Result<String, ExtensionError>;
}

#[extension(of = dyn LoadBalance, name = "random")]
#[derive(Default)]
pub struct RandomLoadBalance;

impl LoadBalance for RandomLoadBalance {
    fn select(&self, _url: &Url, _invocation: &Invocation) -> Result<String, ExtensionError> {
        Ok("random".to_string())
    }
}

#[extension(of = dyn LoadBalance, name = "roundrobin")]
#[derive(Default)]
pub struct RoundRobinLoadBalance;

impl LoadBalance for RoundRobinLoadBalance {
    fn select(&self, _url: &Url, _invocation: &Invocation) -> Result<String, ExtensionError> {
        Ok("roundrobin".to_string())
    }
}

// ─── Router: no default, unresolved names ────────────────────────────────────

#[extension_point]
pub trait Router: Send + Sync {
    #[adaptive("router")]
    fn route(&self, url: &Url) -> Result<String, ExtensionError>;
}

#[extension(of = dyn Router, name = "static")]
#[derive(Default)]
pub struct StaticRouter;

impl Router for StaticRouter {
    fn route(&self, _url: &Url) -> Result<String, ExtensionError> {
        Ok("static".to_string())
    }
}

// ─── Invoker: URL through an accessor parameter ──────────────────────────────

pub struct Request {
    url: Url,
}

impl Request {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl UrlSource for Request {
    fn url(&self) -> &Url {
        &self.url
    }
}

#[extension_point(default = "dubbo")]
pub trait Invoker: Send + Sync {
    #[adaptive("protocol")]
    fn invoke(&self, #[url] request: &Request) -> Result<String, ExtensionError>;
}

#[extension(of = dyn Invoker, name = "dubbo")]
#[derive(Default)]
pub struct DubboInvoker;

impl Invoker for DubboInvoker {
    fn invoke(&self, _request: &Request) -> Result<String, ExtensionError> {
        Ok("dubbo-invoker".to_string())
    }
}

#[extension(of = dyn Invoker, name = "rmi")]
#[derive(Default)]
pub struct RmiInvoker;

impl Invoker for RmiInvoker {
    fn invoke(&self, _request: &Request) -> Result<String, ExtensionError> {
        Ok("rmi-invoker".to_string())
    }
}

// ─── Broken: adaptive method with no URL-bearing argument ────────────────────

#[extension_point]
pub trait Broken: Send + Sync {
    #[adaptive]
    fn nope(&self) -> Result<(), ExtensionError>;
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn environment(resources: &[(String, &str)]) -> (tempfile::TempDir, Environment) {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join(FRAMEWORK_DIRECTORY);
    std::fs::create_dir_all(&parent).unwrap();
    for (resource, body) in resources {
        std::fs::write(parent.join(resource), body).unwrap();
    }
    let env = Environment::builder().scan_root(dir.path()).build();
    (dir, env)
}

fn url(text: &str) -> Url {
    Url::parse(text).unwrap()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn routes_by_url_protocol() {
    let (_dir, env) = environment(&[(
        resource_name::<dyn Protocol>(),
        "dubbo = adaptive.DubboProtocol\nrmi = adaptive.RmiProtocol\n",
    )]);
    let protocols = env.loader::<dyn Protocol>().unwrap();
    let adaptive = protocols.adaptive().unwrap();

    assert_eq!(
        adaptive.refer("cart", &url("rmi://host:1099/cart")).unwrap(),
        "rmi:cart"
    );
    assert_eq!(adaptive.refer("cart", &url("/cart")).unwrap(), "dubbo:cart");
    assert!(Arc::ptr_eq(&adaptive, &protocols.adaptive().unwrap()));
}

#[test]
fn adaptive_result_matches_direct_lookup() {
    let (_dir, env) = environment(&[(
        resource_name::<dyn Protocol>(),
        "dubbo = adaptive.DubboProtocol\nrmi = adaptive.RmiProtocol\n",
    )]);
    let protocols = env.loader::<dyn Protocol>().unwrap();

    let routed = protocols
        .adaptive()
        .unwrap()
        .refer("cart", &url("rmi://host:1099/cart"))
        .unwrap();
    let direct = protocols
        .extension("rmi")
        .unwrap()
        .refer("cart", &url("rmi://host:1099/cart"))
        .unwrap();
    assert_eq!(routed, direct);
}

#[test]
fn non_adaptive_methods_are_unsupported_on_the_dispatcher() {
    let (_dir, env) = environment(&[(
        resource_name::<dyn Protocol>(),
        "dubbo = adaptive.DubboProtocol\n",
    )]);
    let adaptive = env.loader::<dyn Protocol>().unwrap().adaptive().unwrap();

    let error = adaptive.destroy().unwrap_err();
    assert!(matches!(
        error,
        ExtensionError::Unsupported {
            method: "destroy",
            ..
        }
    ));
}

#[test]
fn empty_key_list_derives_a_dotted_key() {
    let (_dir, env) = environment(&[(
        resource_name::<dyn LoadBalance>(),
        "random = adaptive.RandomLoadBalance\nroundrobin = adaptive.RoundRobinLoadBalance\n",
    )]);
    let balancers = env.loader::<dyn LoadBalance>().unwrap();
    let adaptive = balancers.adaptive().unwrap();
    let invocation = Invocation::new("select");

    assert_eq!(
        adaptive
            .select(&url("test://h/p?load.balance=roundrobin"), &invocation)
            .unwrap(),
        "roundrobin"
    );
    assert_eq!(
        adaptive.select(&url("test://h/p"), &invocation).unwrap(),
        "random"
    );
}

#[test]
fn invocation_parameter_enables_per_method_keys() {
    let (_dir, env) = environment(&[(
        resource_name::<dyn LoadBalance>(),
        "random = adaptive.RandomLoadBalance\nroundrobin = adaptive.RoundRobinLoadBalance\n",
    )]);
    let adaptive = env.loader::<dyn LoadBalance>().unwrap().adaptive().unwrap();

    let selected = adaptive
        .select(
            &url("test://h/p?select.load.balance=roundrobin"),
            &Invocation::new("select"),
        )
        .unwrap();
    assert_eq!(selected, "roundrobin");
}

#[test]
fn unresolved_name_lists_the_tried_keys() {
    let (_dir, env) = environment(&[(
        resource_name::<dyn Router>(),
        "static = adaptive.StaticRouter\n",
    )]);
    let adaptive = env.loader::<dyn Router>().unwrap().adaptive().unwrap();

    let error = adaptive.route(&url("/p")).unwrap_err();
    match error {
        ExtensionError::NameUnresolved { point, keys } => {
            assert_eq!(point, <dyn Router as ExtensionPoint>::NAME);
            assert_eq!(keys, vec!["router".to_string()]);
        }
        other => panic!("expected NameUnresolved, got {other}"),
    }
}

#[test]
fn url_accessor_parameter_is_honoured() {
    let (_dir, env) = environment(&[(
        resource_name::<dyn Invoker>(),
        "dubbo = adaptive.DubboInvoker\nrmi = adaptive.RmiInvoker\n",
    )]);
    let adaptive = env.loader::<dyn Invoker>().unwrap().adaptive().unwrap();

    let request = Request::new(url("rmi://host:1099/echo"));
    assert_eq!(adaptive.invoke(&request).unwrap(), "rmi-invoker");

    let bare = Request::new(url("/echo"));
    assert_eq!(adaptive.invoke(&bare).unwrap(), "dubbo-invoker");
}

#[test]
fn missing_url_argument_is_a_cached_synthesis_failure() {
    let env = Environment::new();
    let loader = env.loader::<dyn Broken>().unwrap();

    assert!(matches!(
        loader.adaptive(),
        Err(ExtensionError::Synthesis { .. })
    ));
    assert!(matches!(
        loader.adaptive(),
        Err(ExtensionError::AdaptiveUnavailable { .. })
    ));
}
