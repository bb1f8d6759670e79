//! Error types

use crate::net::SecureSessionError;
use crate::protocol::pairing::PairingError;
use crate::protocol::pairing::store::StoreError;
use crate::types::config::ConfigError;

/// Main error type for bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A pairing handshake failed.
    #[error("pairing failed: {0}")]
    Pairing(#[from] PairingError),

    /// The identity store could not be read or written.
    #[error("identity store: {0}")]
    Store(#[from] StoreError),

    /// The secure session rejected a record.
    #[error("secure session: {0}")]
    Session(#[from] SecureSessionError),

    /// The bridge configuration is invalid.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Underlying transport I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
