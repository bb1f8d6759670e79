use thiserror::Error;

/// Cryptographic operation errors
///
/// Callers distinguish authentication failures from shape failures via
/// [`CryptoError::is_auth`]; the variants deliberately do not say which
/// specific check rejected.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid length: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("authentication failed")]
    AuthTagMismatch,

    #[error("authentication failed")]
    BadSignature,

    #[error("public value reduces to zero")]
    ZeroPoint,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("seal failed")]
    SealFailed,
}

impl CryptoError {
    /// True for proof, signature, and AEAD tag rejections.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthTagMismatch | Self::BadSignature)
    }
}
