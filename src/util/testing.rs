//! Test helpers shared by unit and integration tests.

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TEST_SETUP: Once = Once::new();

/// Install a global tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`, defaulting to debug output for this crate only.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("saber=debug"));
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_test_writer()
                .with_target(true)
                .with_filter(env_filter),
        );
        if tracing::dispatcher::has_been_set() {
            debug!("tracing subscriber already set");
        } else if let Err(e) = subscriber.try_init() {
            eprintln!("Error: Failed to set up logging: {}", e);
        }
    });
}

/// Fixture sources used across test suites.
pub mod fixtures {
    /// Container with a failable, cached service bound to a protocol.
    pub const BOUND_CONTAINER: &str = "\
// @saber.container(AppContainer)
// @saber.scope(Singleton)
protocol AppContaining {}

protocol FooProtocol {}

// @saber.scope(Singleton)
// @saber.bindTo(FooProtocol)
// @saber.cached
class Foo: FooProtocol {
    init?() {}
}
";
}
