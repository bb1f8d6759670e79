//! Encrypted transport layer
//!
//! Record framing and the stream wrapper applied to a connection once
//! pair-verify completes.

mod secure;

#[cfg(feature = "tokio-runtime")]
mod stream;


pub use secure::{SecureSession, SecureSessionError, SessionState};

#[cfg(feature = "tokio-runtime")]
pub use stream::{SecureStream, TransportError, wrap_connection};
