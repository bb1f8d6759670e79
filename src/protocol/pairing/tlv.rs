//! TLV8 encoding for the pairing protocol

use std::collections::HashMap;
use thiserror::Error;

/// TLV type codes used in pairing messages
///
/// These are wire-visible constants; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlvType {
    /// Pairing method (must be 0)
    Method = 0x00,
    /// Peer username
    Username = 0x01,
    /// Salt for SRP
    Salt = 0x02,
    /// Public key (SRP `B`/`A` or Curve25519)
    PublicKey = 0x03,
    /// Proof (M1/M2 in SRP)
    Proof = 0x04,
    /// Encrypted data with trailing auth tag
    EncryptedData = 0x05,
    /// Sequence number
    SequenceNumber = 0x06,
    /// Error code
    ErrorCode = 0x07,
    /// Ed25519 signature
    Signature = 0x0A,
}

/// TLV encoding errors
#[derive(Debug, Error)]
pub enum TlvError {
    #[error("buffer too small")]
    BufferTooSmall,

    #[error("missing required field: {0:?}")]
    MissingField(TlvType),

    #[error("invalid value for {0:?}")]
    InvalidValue(TlvType),

    #[error("value is not valid UTF-8")]
    InvalidString,
}

/// TLV encoder
pub struct TlvEncoder {
    buffer: Vec<u8>,
}

impl TlvEncoder {
    /// Create a new encoder
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Add a TLV item
    ///
    /// Values longer than 255 bytes are split into contiguous fragments
    /// carrying the same tag.
    #[must_use]
    pub fn add(mut self, tlv_type: TlvType, value: &[u8]) -> Self {
        for chunk in value.chunks(255) {
            self.buffer.push(tlv_type as u8);
            #[allow(clippy::cast_possible_truncation)]
            self.buffer.push(chunk.len() as u8);
            self.buffer.extend_from_slice(chunk);
        }

        // Handle empty value
        if value.is_empty() {
            self.buffer.push(tlv_type as u8);
            self.buffer.push(0);
        }

        self
    }

    /// Add a single byte value
    #[must_use]
    pub fn add_byte(self, tlv_type: TlvType, value: u8) -> Self {
        self.add(tlv_type, &[value])
    }

    /// Add a UTF-8 string value
    #[must_use]
    pub fn add_str(self, tlv_type: TlvType, value: &str) -> Self {
        self.add(tlv_type, value.as_bytes())
    }

    /// Add sequence number
    #[must_use]
    pub fn add_seq(self, seq: u8) -> Self {
        self.add_byte(TlvType::SequenceNumber, seq)
    }

    /// Add method value
    #[must_use]
    pub fn add_method(self, method: u8) -> Self {
        self.add_byte(TlvType::Method, method)
    }

    /// Add error code
    #[must_use]
    pub fn add_error(self, code: u8) -> Self {
        self.add_byte(TlvType::ErrorCode, code)
    }

    /// Build the encoded TLV data
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for TlvEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// TLV decoder
///
/// Unknown tags are preserved on decode and ignored on use.
pub struct TlvDecoder {
    items: HashMap<u8, Vec<u8>>,
}

impl TlvDecoder {
    /// Decode TLV data
    ///
    /// Contiguous fragments with the same tag are concatenated.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer ends inside a fragment header or value.
    pub fn decode(data: &[u8]) -> Result<Self, TlvError> {
        let mut items: HashMap<u8, Vec<u8>> = HashMap::new();
        let mut pos = 0;

        while pos < data.len() {
            if pos + 2 > data.len() {
                return Err(TlvError::BufferTooSmall);
            }

            let tlv_type = data[pos];
            let length = data[pos + 1] as usize;
            pos += 2;

            if pos + length > data.len() {
                return Err(TlvError::BufferTooSmall);
            }

            let value = &data[pos..pos + length];
            pos += length;

            items.entry(tlv_type).or_default().extend_from_slice(value);
        }

        Ok(Self { items })
    }

    /// Get a value by type
    #[must_use]
    pub fn get(&self, tlv_type: TlvType) -> Option<&[u8]> {
        self.items
            .get(&(tlv_type as u8))
            .map(std::vec::Vec::as_slice)
    }

    /// Get a single byte value
    #[must_use]
    pub fn get_u8(&self, tlv_type: TlvType) -> Option<u8> {
        self.get(tlv_type).and_then(|v| v.first().copied())
    }

    /// Get a required value
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing
    pub fn get_required(&self, tlv_type: TlvType) -> Result<&[u8], TlvError> {
        self.get(tlv_type).ok_or(TlvError::MissingField(tlv_type))
    }

    /// Get a required UTF-8 string value
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not valid UTF-8
    pub fn get_str(&self, tlv_type: TlvType) -> Result<&str, TlvError> {
        let value = self.get_required(tlv_type)?;
        std::str::from_utf8(value).map_err(|_| TlvError::InvalidString)
    }

    /// Get the sequence number
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not a single byte
    pub fn get_seq(&self) -> Result<u8, TlvError> {
        let value = self.get_required(TlvType::SequenceNumber)?;
        if value.len() != 1 {
            return Err(TlvError::InvalidValue(TlvType::SequenceNumber));
        }
        Ok(value[0])
    }

    /// Get error code (if present)
    #[must_use]
    pub fn get_error(&self) -> Option<u8> {
        self.get_u8(TlvType::ErrorCode)
    }

    /// Check if an error code is present
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.get(TlvType::ErrorCode).is_some()
    }
}

/// Wire error codes
pub mod errors {
    pub const UNKNOWN: u8 = 0x01;
    pub const AUTHENTICATION: u8 = 0x02;
    pub const BUSY: u8 = 0x03;
    pub const BACKOFF: u8 = 0x04;
    pub const MAX_PEERS: u8 = 0x05;
    pub const MAX_TRIES: u8 = 0x06;
    pub const UNAVAILABLE: u8 = 0x07;
}
