//! Pairing protocol implementation
//!
//! Server side of the two handshakes a bridge speaks: the SRP-based
//! pair-setup that provisions a controller's long-term key, and the
//! X25519 pair-verify that establishes per-session transport keys.

pub mod setup;
pub mod store;
pub mod tlv;
pub mod verify;


pub use setup::PairSetupSession;
pub use store::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use tlv::{TlvDecoder, TlvEncoder, TlvError, TlvType};
pub use verify::PairVerifySession;

use crate::protocol::crypto::CryptoError;
use crate::protocol::pairing::store::StoreError;
use zeroize::Zeroize;

/// Pair-setup sequence numbers
pub mod setup_seq {
    pub const M1: u8 = 1;
    pub const M2: u8 = 2;
    pub const M3: u8 = 3;
    pub const M4: u8 = 4;
    pub const M5: u8 = 5;
    pub const M6: u8 = 6;
}

/// Pair-verify sequence numbers
pub mod verify_seq {
    pub const V1: u8 = 1;
    pub const V2: u8 = 2;
    pub const V3: u8 = 3;
    pub const V4: u8 = 4;
}

/// SRP username label for pair-setup
pub const PAIR_SETUP_USERNAME: &[u8] = b"Pair-Setup";

/// Directional transport keys established by pair-verify.
///
/// `encrypt_key` protects accessory-to-controller records,
/// `decrypt_key` opens controller-to-accessory records. Both nonce
/// counters start at zero and belong to the secure session that takes
/// ownership of these keys.
#[derive(Clone)]
pub struct SessionKeys {
    /// Key for records sent to the controller
    pub encrypt_key: [u8; 32],
    /// Key for records received from the controller
    pub decrypt_key: [u8; 32],
    /// Initial outbound nonce counter
    pub encrypt_nonce: u64,
    /// Initial inbound nonce counter
    pub decrypt_nonce: u64,
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.encrypt_key.zeroize();
        self.decrypt_key.zeroize();
    }
}

/// Pairing errors
///
/// The display strings for authentication failures deliberately do not
/// say which check rejected.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    /// Sequence number not valid in the current state. The connection
    /// is closed without a reply.
    #[error("unexpected sequence number {seq} in state {state}")]
    ProtocolOrder {
        /// State the session was in
        state: &'static str,
        /// Sequence number received
        seq: u8,
    },

    /// Malformed TLV payload. The connection is closed without a reply.
    #[error("malformed message: {0}")]
    Decode(#[from] TlvError),

    /// Proof, signature, or AEAD tag rejection.
    #[error("authentication failed")]
    CryptoAuth,

    /// Wrong-length public key or degenerate DH point.
    #[error("malformed cryptographic value")]
    CryptoShape,

    /// The claimed username has no stored pairing.
    #[error("unknown peer")]
    NoSuchPeer,

    /// The identity store failed.
    #[error("identity store: {0}")]
    Io(#[from] StoreError),

    /// The peer reported a non-zero status. Any such status fails the
    /// session.
    #[error("peer returned error: {code}")]
    Peer {
        /// Wire error code sent by the peer
        code: u8,
    },

    /// Unexpected internal failure.
    #[error("internal pairing failure")]
    Internal,
}

impl From<CryptoError> for PairingError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthTagMismatch | CryptoError::BadSignature => Self::CryptoAuth,
            CryptoError::BadLength { .. } | CryptoError::ZeroPoint
            | CryptoError::InvalidPublicKey => Self::CryptoShape,
            CryptoError::KeyDerivation | CryptoError::SealFailed => Self::Internal,
        }
    }
}
