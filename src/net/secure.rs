//! Secure session record layer
//!
//! Every record on the wire after pair-verify is
//! `[len: u16 little-endian] [ciphertext] [tag: 16 bytes]`, with the
//! length bytes as AEAD associated data. Nonces are per-direction
//! 64-bit little-endian counters starting at zero.

use crate::protocol::pairing::SessionKeys;
use byteorder::{ByteOrder, LittleEndian};
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, Tag};
use thiserror::Error;

/// Maximum plaintext bytes per record
const MAX_RECORD_PLAINTEXT: usize = 1024;
/// Record overhead: 2-byte length prefix plus 16-byte tag
const RECORD_OVERHEAD: usize = 18;

/// Secure session errors
#[derive(Debug, Error)]
pub enum SecureSessionError {
    /// A record failed tag verification; the session is closed.
    #[error("record authentication failed")]
    Authentication,

    /// A nonce counter reached its limit; the session is closed.
    #[error("nonce space exhausted")]
    NonceExhausted,

    /// The session was already closed.
    #[error("session closed")]
    Closed,

    /// Input too short to hold a complete record.
    #[error("incomplete record")]
    Incomplete,
}

/// Secure session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Records can be sealed and opened
    Established,
    /// Torn down; no record is ever processed again
    Closed,
}

/// Record layer for one authenticated connection.
///
/// Both nonce counters are strictly monotonic; a failed open or an
/// exhausted counter closes the session permanently.
pub struct SecureSession {
    encrypt_cipher: ChaCha20Poly1305,
    decrypt_cipher: ChaCha20Poly1305,
    encrypt_count: u64,
    decrypt_count: u64,
    state: SessionState,
}

impl SecureSession {
    /// Create a session from the keys pair-verify produced.
    #[must_use]
    pub fn new(keys: &SessionKeys) -> Self {
        Self {
            encrypt_cipher: ChaCha20Poly1305::new(Key::from_slice(&keys.encrypt_key)),
            decrypt_cipher: ChaCha20Poly1305::new(Key::from_slice(&keys.decrypt_key)),
            encrypt_count: keys.encrypt_nonce,
            decrypt_count: keys.decrypt_nonce,
            state: SessionState::Established,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Outbound records sealed so far
    #[must_use]
    pub fn encrypt_count(&self) -> u64 {
        self.encrypt_count
    }

    /// Inbound records opened so far
    #[must_use]
    pub fn decrypt_count(&self) -> u64 {
        self.decrypt_count
    }

    /// Seal plaintext into one or more wire records.
    ///
    /// Plaintext longer than the record limit spans several records,
    /// each at most 1024 bytes of payload.
    ///
    /// # Errors
    ///
    /// Returns error if the session is closed or the outbound counter
    /// is exhausted.
    pub fn seal(&mut self, data: &[u8]) -> Result<Vec<u8>, SecureSessionError> {
        if self.state == SessionState::Closed {
            return Err(SecureSessionError::Closed);
        }

        let mut output =
            Vec::with_capacity(data.len() + (data.len() / MAX_RECORD_PLAINTEXT + 1) * RECORD_OVERHEAD);

        for chunk in data.chunks(MAX_RECORD_PLAINTEXT) {
            #[allow(clippy::cast_possible_truncation)]
            let len = chunk.len() as u16;
            let mut len_bytes = [0u8; 2];
            LittleEndian::write_u16(&mut len_bytes, len);

            let Some(next) = self.encrypt_count.checked_add(1) else {
                self.state = SessionState::Closed;
                return Err(SecureSessionError::NonceExhausted);
            };

            let mut nonce_bytes = [0u8; 12];
            LittleEndian::write_u64(&mut nonce_bytes[4..12], self.encrypt_count);
            let nonce = Nonce::from_slice(&nonce_bytes);

            let mut buffer = chunk.to_vec();
            let tag = self
                .encrypt_cipher
                .encrypt_in_place_detached(nonce, &len_bytes, &mut buffer)
                .map_err(|_| {
                    self.state = SessionState::Closed;
                    SecureSessionError::Closed
                })?;

            output.extend_from_slice(&len_bytes);
            output.extend_from_slice(&buffer);
            output.extend_from_slice(tag.as_slice());

            self.encrypt_count = next;
        }

        Ok(output)
    }

    /// Open a single record.
    ///
    /// Returns the plaintext and the unconsumed remainder of the input.
    /// Any verification failure closes the session; partial or replayed
    /// records are not recoverable.
    ///
    /// # Errors
    ///
    /// Returns error if the session is closed, the input is truncated,
    /// the tag does not verify, or the inbound counter is exhausted.
    pub fn open_record<'a>(
        &mut self,
        data: &'a [u8],
    ) -> Result<(Vec<u8>, &'a [u8]), SecureSessionError> {
        if self.state == SessionState::Closed {
            return Err(SecureSessionError::Closed);
        }

        if data.len() < RECORD_OVERHEAD {
            return Err(SecureSessionError::Incomplete);
        }

        let len = LittleEndian::read_u16(&data[0..2]) as usize;
        if data.len() < 2 + len + 16 {
            return Err(SecureSessionError::Incomplete);
        }

        let Some(next) = self.decrypt_count.checked_add(1) else {
            self.state = SessionState::Closed;
            return Err(SecureSessionError::NonceExhausted);
        };

        let mut nonce_bytes = [0u8; 12];
        LittleEndian::write_u64(&mut nonce_bytes[4..12], self.decrypt_count);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut buffer = data[2..2 + len].to_vec();
        let tag = Tag::from_slice(&data[2 + len..2 + len + 16]);

        if self
            .decrypt_cipher
            .decrypt_in_place_detached(nonce, &data[0..2], &mut buffer, tag)
            .is_err()
        {
            self.state = SessionState::Closed;
            return Err(SecureSessionError::Authentication);
        }

        self.decrypt_count = next;

        Ok((buffer, &data[2 + len + 16..]))
    }

    /// Open every record in the input, concatenating the plaintext.
    ///
    /// # Errors
    ///
    /// Returns error on the first record that fails; the session is
    /// closed at that point.
    pub fn open_all(&mut self, mut data: &[u8]) -> Result<Vec<u8>, SecureSessionError> {
        let mut output = Vec::with_capacity(data.len());
        while !data.is_empty() {
            let (plaintext, rest) = self.open_record(data)?;
            output.extend_from_slice(&plaintext);
            data = rest;
        }
        Ok(output)
    }

    /// Tear the session down; all later seal/open calls fail.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
