//! Shared helpers for herd's integration tests.

pub mod builders;
pub mod follower;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Install a test-captured tracing subscriber once per test binary.
///
/// Output only shows for failing tests unless run with `--nocapture`.
/// `RUST_LOG` overrides the default `herd=debug,warn` filter.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("herd=debug,warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Upper bound for a single lifecycle step in tests.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Await `f`, panicking if it takes longer than [`STEP_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(STEP_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test step timed out after {STEP_TIMEOUT:?}"))
}
