//! # hap-bridge
//!
//! A pure Rust implementation of the accessory side of the `HomeKit`-style
//! pairing and secure-transport protocol: a bridge pairs with controllers
//! using SRP-6a, verifies returning controllers with an X25519 handshake,
//! and frames all subsequent traffic in ChaCha20-Poly1305 records.
//!
//! ## Features
//!
//! - Three-step pair-setup (SRP-6a verifier + authenticated key exchange)
//! - Two-step pair-verify handshake yielding per-session transport keys
//! - Durable, atomic identity storage for paired controllers
//! - Encrypted record framing with per-direction nonce counters
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hap_bridge::{BridgeConfig, FileIdentityStore, PairSetupSession};
//!
//! # fn example() -> Result<(), hap_bridge::BridgeError> {
//! let config = BridgeConfig::builder()
//!     .device_id("6E:D8:32:FB:11:A4")
//!     .setup_code("031-45-154")
//!     .store_dir("/var/lib/bridge")
//!     .build()?;
//!
//! let store = Arc::new(FileIdentityStore::open(&config.store_dir)?);
//! let mut setup = PairSetupSession::new(&config, store)?;
//!
//! // Feed inbound pairing TLV bodies, write the returned TLV back out.
//! // let reply = setup.handle(&inbound)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

pub mod net;
pub mod protocol;

// Re-exports
pub use error::BridgeError;
pub use net::SecureSession;
pub use protocol::pairing::store::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use protocol::pairing::{PairSetupSession, PairVerifySession, PairingError, SessionKeys};
pub use types::config::BridgeConfig;

#[cfg(feature = "tokio-runtime")]
pub use net::{SecureStream, wrap_connection};
