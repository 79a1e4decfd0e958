use crate::config::ConfigError;

/// Driver-level error type.
///
/// The inspection core itself has no fatal error path: decode, parse, and
/// shape mismatches all degrade to empty output, because input originates
/// from uncontrolled upstream traffic. Only the outer driver — config loading
/// and stdio — can actually fail.
#[derive(Debug, thiserror::Error)]
pub enum LensError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
