pub(crate) const DEFAULT_LOG_FILTER: &str = "parley_core=debug,parley_api=info,info";

/// stderr logging via `tracing-subscriber`, filtered by `RUST_LOG` when set.
///
/// Called once at the start of `ParleyApp::new()`. Safe to call again (later calls are
/// no-ops), which keeps integration tests that build several apps happy.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_target(true)
        .try_init();
}
