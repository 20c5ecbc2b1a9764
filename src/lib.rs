pub mod config;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use config::GenerationConfig;
pub use pipeline::generation::{
    CancelFlag, FailureKind, GenerationFailure, GenerationOutcome, GenerationPipeline,
    GenerationRequest, ModelClient,
};

/// Install the fmt subscriber, honouring `RUST_LOG`.
///
/// Returns `false` when a global subscriber is already set (host application
/// or an earlier call).
pub fn init_tracing() -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} tracing initialised", config::APP_NAME, config::APP_VERSION);
    }
    installed
}
