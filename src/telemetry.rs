use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Installs the global subscriber: fmt output filtered by `RUST_LOG`
/// (default `info`). `log` records, such as actix's request logger, are
/// forwarded to tracing.
pub fn init() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    Registry::default()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .try_init()
}
