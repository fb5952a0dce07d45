//! Process-level errors for the command-line driver. Pipeline diagnostics
//! are data, not errors; see [`crate::compiler::diag`].

use thiserror::Error;

/// Failures outside the pipeline contract.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read input file: {0}")]
    FileRead(String, #[source] std::io::Error),

    #[error("Failed to write output file: {0}")]
    FileWrite(String, #[source] std::io::Error),

    #[error("Unknown stage: `{0}`")]
    UnknownStage(String),
}
