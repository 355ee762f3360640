use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("tier {tier} at `{}` could not be opened", path.display())]
    Tier {
        tier: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn tier(tier: usize, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Tier {
            tier,
            path: path.into(),
            source,
        }
    }
}
