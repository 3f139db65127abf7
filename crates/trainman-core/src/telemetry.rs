//! Log output for the `trainman` command.
//!
//! Logs go to stderr so that tables and `--output json` reports on stdout can
//! be piped without filtering. The CLI maps `--verbose` to the level passed in
//! here and `--json` / `TRAINMAN_LOG_JSON` to the JSON formatter, which turns
//! the `event` fields emitted by [`crate::obs`] into queryable keys.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested level. Everything else logs warnings only.
const TRAINMAN_TARGETS: [&str; 2] = ["trainman_core", "trainman"];

/// Directives used when `RUST_LOG` is unset: `level` for trainman, `warn` for
/// dependencies such as tokio.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(TRAINMAN_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Install the process-wide subscriber for a `trainman` invocation.
///
/// `RUST_LOG` replaces [`default_directives`] entirely. Later calls, such as
/// a second run inside the same test binary, leave the first subscriber in place.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}
