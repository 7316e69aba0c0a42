//! Tracing setup for the bench binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogLevel;
use crate::error::{BenchError, Result};

/// Installs a global subscriber at `level`. `RUST_LOG`, when set, wins.
///
/// Fails if a subscriber is already installed.
pub fn init(level: LogLevel) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| BenchError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_cleanly() {
        // whichever call comes first in this process wins
        let _ = init(LogLevel::Warn);
        assert!(matches!(init(LogLevel::Warn), Err(BenchError::Logging(_))));
    }
}
