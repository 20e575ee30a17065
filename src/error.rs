//! Error types for the fire sender

use thiserror::Error;

/// Main error type for the fire sender
#[derive(Error, Debug)]
pub enum FireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Execution reverted: {0}")]
    Revert(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Key store error: {0}")]
    Key(#[from] KeyError),

    #[error("Submission exhausted after {rounds} round(s) across {endpoints} endpoint(s)")]
    SubmissionExhausted { rounds: u32, endpoints: usize },

    #[error("Confirmation timed out for tx {tx_hash}; it may still be mined")]
    ConfirmationTimeout { tx_hash: String },
}

/// Failures of the key store collaborator. Always fatal for a run.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("No key found at {0}")]
    NotFound(String),

    #[error("Failed to decrypt key: {0}")]
    DecryptionFailed(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),
}

impl FireError {
    /// Build an error from a JSON-RPC error object, separating reverts from other failures
    pub fn from_rpc_error(code: i64, message: String) -> Self {
        // Geth and most clients report reverts with code 3 and an "execution reverted" message
        if code == 3 || message.to_lowercase().contains("revert") {
            FireError::Revert(message)
        } else {
            FireError::Rpc { code, message }
        }
    }
}

impl From<reqwest::Error> for FireError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FireError::Decode(err.to_string())
        } else {
            FireError::Transport(err.to_string())
        }
    }
}

/// Result type for fire sender operations
pub type FireResult<T> = Result<T, FireError>;
