use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::generation::bounds::CategoryBoundTable;
use crate::pipeline::generation::GenerationError;

/// Application-level constants
pub const APP_NAME: &str = "oqgen";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds to wait for the model collaborator before failing the request.
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 300;

/// Characters of raw response kept in the diagnostic preview.
pub const DEFAULT_PREVIEW_LEN: usize = 500;

pub const ENV_MODEL_TIMEOUT: &str = "OQGEN_MODEL_TIMEOUT_SECS";
pub const ENV_BOUNDS_FILE: &str = "OQGEN_BOUNDS_FILE";
pub const ENV_DUMP_DIR: &str = "OQGEN_DUMP_DIR";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "oqgen=info,warn"
}

/// Directory for diagnostic dumps, only when `OQGEN_DUMP_DIR` is set.
pub fn dump_dir() -> Option<PathBuf> {
    std::env::var_os(ENV_DUMP_DIR).map(PathBuf::from)
}

/// Per-pipeline configuration. Cloned into each request; never shared mutably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound on the model invocation.
    #[serde(with = "duration_secs")]
    pub model_timeout: Duration,
    /// Characters of raw response kept in the diagnostic preview.
    pub preview_len: usize,
    pub bounds: CategoryBoundTable,
    /// Diagnostic dump directory; `None` disables the dump.
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS),
            preview_len: DEFAULT_PREVIEW_LEN,
            bounds: CategoryBoundTable::standard(),
            dump_dir: None,
        }
    }
}

impl GenerationConfig {
    /// Build from environment:
    /// - `OQGEN_MODEL_TIMEOUT_SECS`: positive integer seconds
    /// - `OQGEN_BOUNDS_FILE`: JSON category bound table replacing the standard one
    /// - `OQGEN_DUMP_DIR`: enables the diagnostic dump
    pub fn from_env() -> Result<Self, GenerationError> {
        let mut config = Self {
            dump_dir: dump_dir(),
            ..Self::default()
        };

        if let Ok(raw) = std::env::var(ENV_MODEL_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                GenerationError::Config(format!("{ENV_MODEL_TIMEOUT} must be an integer, got '{raw}'"))
            })?;
            if secs == 0 {
                return Err(GenerationError::Config(format!(
                    "{ENV_MODEL_TIMEOUT} must be greater than zero"
                )));
            }
            config.model_timeout = Duration::from_secs(secs);
        }

        if let Some(path) = std::env::var_os(ENV_BOUNDS_FILE) {
            let path = PathBuf::from(path);
            config.bounds = CategoryBoundTable::from_file(&path)?;
            tracing::info!(path = %path.display(), "Loaded category bound table");
        }

        Ok(config)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
