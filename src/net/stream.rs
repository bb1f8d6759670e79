//! Secure stream wrapper for tokio connections
//!
//! Applies the record layer to a raw byte stream once pair-verify has
//! produced session keys: writes are sealed into records, reads are
//! de-framed and opened one record at a time.

use super::secure::{SecureSession, SecureSessionError, SessionState};
use crate::protocol::pairing::SessionKeys;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Errors from the secure stream
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record layer rejected a record; the connection is dead.
    #[error("secure session: {0}")]
    Session(#[from] SecureSessionError),
}

/// Wrap a raw connection in the secure record layer.
pub fn wrap_connection<S>(stream: S, keys: &SessionKeys) -> SecureStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    SecureStream {
        inner: stream,
        session: SecureSession::new(keys),
    }
}

/// An authenticated, encrypted byte stream.
///
/// One instance per live connection; dropped (and the session with it)
/// when the connection closes.
pub struct SecureStream<S> {
    inner: S,
    session: SecureSession,
}

impl<S> SecureStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Seal and send a plaintext payload.
    ///
    /// # Errors
    ///
    /// Returns error if sealing fails or the stream write fails.
    pub async fn send(&mut self, plaintext: &[u8]) -> Result<(), TransportError> {
        let framed = self.session.seal(plaintext)?;
        self.inner.write_all(&framed).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Receive and open the next record.
    ///
    /// # Errors
    ///
    /// Returns error if the stream read fails or the record does not
    /// verify; the session is closed on verification failure.
    pub async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.session.state() == SessionState::Closed {
            return Err(SecureSessionError::Closed.into());
        }

        let mut len_bytes = [0u8; 2];
        self.inner.read_exact(&mut len_bytes).await?;
        let len = u16::from_le_bytes(len_bytes) as usize;

        let mut rest = vec![0u8; len + 16];
        self.inner.read_exact(&mut rest).await?;

        let mut record = Vec::with_capacity(2 + rest.len());
        record.extend_from_slice(&len_bytes);
        record.extend_from_slice(&rest);

        let (plaintext, remainder) = self.session.open_record(&record)?;
        debug_assert!(remainder.is_empty());
        Ok(plaintext)
    }

    /// Access the underlying record layer state.
    #[must_use]
    pub fn session(&self) -> &SecureSession {
        &self.session
    }

    /// Shut down the underlying stream and close the session.
    ///
    /// # Errors
    ///
    /// Returns error if the stream shutdown fails.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.session.close();
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Unwrap, returning the raw stream.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }
}
