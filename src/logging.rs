use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

static INIT: Once = Once::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        let subscriber = Registry::default().with(env_filter).with(stderr_layer);

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("A tracing subscriber was already installed");
        }
    });
}
