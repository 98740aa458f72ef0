//! Braze robot demo.
//!
//! A minimal extension-point walkthrough: two robot implementations bound
//! by a config resource, a logging decorator wrapped around both, and the
//! `"true"` literal resolving to the declared default.
//!
//! # Running the demo
//!
//! ```bash
//! cargo run --package robot-demo
//! ```

use std::sync::Arc;

use anyhow::Result;
use braze::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[extension_point(default = "optimusPrime")]
pub trait Robot: Send + Sync {
    fn say_hello(&self) -> String;
}

#[extension(of = dyn Robot, name = "optimusPrime")]
#[derive(Default)]
pub struct OptimusPrime;

impl Robot for OptimusPrime {
    fn say_hello(&self) -> String {
        "Hello, I am Optimus Prime.".to_string()
    }
}

#[extension(of = dyn Robot)]
#[derive(Default)]
pub struct BumblebeeRobot;

impl Robot for BumblebeeRobot {
    fn say_hello(&self) -> String {
        "Hello, I am Bumblebee.".to_string()
    }
}

/// Decorates every robot with a greeting log line.
#[extension(of = dyn Robot, wrapper)]
pub struct LoggingRobot {
    inner: Arc<dyn Robot>,
}

impl ExtensionWrapper<dyn Robot> for LoggingRobot {
    fn wrap(inner: Arc<dyn Robot>) -> Self {
        Self { inner }
    }
}

impl Robot for LoggingRobot {
    fn say_hello(&self) -> String {
        info!("robot is about to greet");
        self.inner.say_hello()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let resources = concat!(env!("CARGO_MANIFEST_DIR"), "/resources");
    let env = Environment::builder().scan_root(resources).build();
    let robots = env.loader::<dyn Robot>()?;

    for name in robots.supported_names()? {
        let robot = robots.extension(&name)?;
        println!("{name}: {}", robot.say_hello());
    }

    let default_robot = robots.extension("true")?;
    println!("default: {}", default_robot.say_hello());

    Ok(())
}
