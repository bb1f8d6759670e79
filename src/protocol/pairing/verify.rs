//! Pair-verify server - ECDH handshake for returning controllers
//!
//! Two request/response steps: V1/V2 exchanges ephemeral X25519 keys
//! and proves the bridge identity, V3/V4 proves the controller identity
//! against the stored pairing. Success yields the two directional
//! transport keys for the secure session.

use super::store::IdentityStore;
use super::tlv::{TlvDecoder, TlvEncoder, TlvType, errors};
use super::{PairingError, SessionKeys, verify_seq};
use crate::protocol::crypto::{
    ChaCha20Poly1305Cipher, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, Nonce,
    X25519KeyPair, X25519PublicKey, derive_key,
};
use crate::types::config::BridgeConfig;
use std::sync::Arc;
use zeroize::Zeroize;

/// Pair-verify session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    /// Waiting for V1
    Idle,
    /// V1 answered, waiting for the finish request (V3)
    AwaitFinish,
    /// Verification complete; session keys available
    Done,
    /// Verification failed; all derived material wiped
    Failed,
}

impl VerifyState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AwaitFinish => "AwaitFinish",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

/// Server side of one pair-verify attempt.
///
/// Owned by the connection task; on success it hands its directional
/// keys to the secure session and is discarded.
pub struct PairVerifySession {
    state: VerifyState,
    device_id: String,
    identity: Ed25519KeyPair,
    store: Arc<dyn IdentityStore>,
    ephemeral: Option<X25519KeyPair>,
    peer_ephemeral: Option<[u8; 32]>,
    shared_secret: Option<[u8; 32]>,
    verify_key: Option<[u8; 32]>,
    session_keys: Option<SessionKeys>,
    last_error: Option<PairingError>,
}

impl PairVerifySession {
    /// Create a session for one transport establishment.
    ///
    /// # Errors
    ///
    /// Returns error if the bridge key cannot be loaded from the store.
    pub fn new(
        config: &BridgeConfig,
        store: Arc<dyn IdentityStore>,
    ) -> Result<Self, PairingError> {
        let identity = store.bridge_key()?;

        Ok(Self {
            state: VerifyState::Idle,
            device_id: config.device_id.clone(),
            identity,
            store,
            ephemeral: None,
            peer_ephemeral: None,
            shared_secret: None,
            verify_key: None,
            session_keys: None,
            last_error: None,
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> VerifyState {
        self.state
    }

    /// The failure recorded on the last transition to `Failed`, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&PairingError> {
        self.last_error.as_ref()
    }

    /// Take ownership of the established transport keys.
    ///
    /// Available exactly once after the session reaches `Done`.
    #[must_use]
    pub fn take_session_keys(&mut self) -> Option<SessionKeys> {
        self.session_keys.take()
    }

    /// Wipe all derived material and return to `Idle`.
    pub fn reset(&mut self) {
        self.clear_secrets();
        self.session_keys = None;
        self.state = VerifyState::Idle;
        self.last_error = None;
    }

    /// Process one inbound pair-verify TLV body.
    ///
    /// Same contract as [`super::PairSetupSession::handle`]: `Ok` is the
    /// outbound TLV (possibly carrying a wire error code), `Err` means
    /// close the connection without a reply.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::Decode`] for malformed TLV,
    /// [`PairingError::ProtocolOrder`] for sequence violations, and
    /// [`PairingError::CryptoShape`] for malformed key material; the
    /// session is wiped in every error case.
    pub fn handle(&mut self, body: &[u8]) -> Result<Vec<u8>, PairingError> {
        let tlv = match TlvDecoder::decode(body) {
            Ok(tlv) => tlv,
            Err(err) => return Err(self.fail(err.into())),
        };

        if let Some(method) = tlv.get_u8(TlvType::Method) {
            if method != 0 {
                return Err(self.fail(PairingError::Decode(
                    super::TlvError::InvalidValue(TlvType::Method),
                )));
            }
        }

        if let Some(code) = tlv.get_error() {
            return Err(self.fail(PairingError::Peer { code }));
        }

        let seq = match tlv.get_seq() {
            Ok(seq) => seq,
            Err(err) => return Err(self.fail(err.into())),
        };

        match (self.state, seq) {
            (VerifyState::Idle, verify_seq::V1) => self.handle_start(&tlv),
            (VerifyState::AwaitFinish, verify_seq::V3) => self.handle_finish(&tlv),
            (state, seq) => Err(self.fail(PairingError::ProtocolOrder {
                state: state.name(),
                seq,
            })),
        }
    }

    // V1 -> V2: ephemeral exchange plus signed bridge identity.
    fn handle_start(&mut self, tlv: &TlvDecoder) -> Result<Vec<u8>, PairingError> {
        tracing::debug!("pair-verify V1: ephemeral key exchange");

        let peer_public_bytes = match tlv.get_required(TlvType::PublicKey) {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(err.into())),
        };
        let peer_public = match X25519PublicKey::from_bytes(peer_public_bytes) {
            Ok(key) => key,
            Err(err) => return Err(self.fail(err.into())),
        };

        let ephemeral = X25519KeyPair::generate();
        let shared = ephemeral.diffie_hellman(&peer_public);

        let verify_key = match derive_key(
            b"Pair-Verify-Encrypt-Salt",
            shared.as_bytes(),
            b"Pair-Verify-Encrypt-Info",
        ) {
            Ok(key) => key,
            Err(err) => return Err(self.fail(err.into())),
        };

        // material = B || device id || A
        let our_public = ephemeral.public_key();
        let mut material = Vec::with_capacity(
            our_public.as_bytes().len() + self.device_id.len() + peer_public_bytes.len(),
        );
        material.extend_from_slice(our_public.as_bytes());
        material.extend_from_slice(self.device_id.as_bytes());
        material.extend_from_slice(peer_public_bytes);

        let signature = self.identity.sign(&material);

        let inner = TlvEncoder::new()
            .add_str(TlvType::Username, &self.device_id)
            .add(TlvType::Signature, &signature.to_bytes())
            .build();

        let cipher = match ChaCha20Poly1305Cipher::new(&verify_key) {
            Ok(cipher) => cipher,
            Err(err) => return Err(self.fail(err.into())),
        };
        let sealed = match cipher.seal(&Nonce::from_label(b"PV-Msg02"), &inner) {
            Ok(sealed) => sealed,
            Err(err) => return Err(self.fail(err.into())),
        };

        let response = TlvEncoder::new()
            .add_seq(verify_seq::V2)
            .add(TlvType::PublicKey, our_public.as_bytes())
            .add(TlvType::EncryptedData, &sealed)
            .build();

        let mut peer_arr = [0u8; 32];
        peer_arr.copy_from_slice(peer_public_bytes);

        self.ephemeral = Some(ephemeral);
        self.peer_ephemeral = Some(peer_arr);
        self.shared_secret = Some(*shared.as_bytes());
        self.verify_key = Some(verify_key);
        self.state = VerifyState::AwaitFinish;

        tracing::debug!("pair-verify V2: sent signed identity");
        Ok(response)
    }

    // V3 -> V4: prove the controller against its stored pairing.
    fn handle_finish(&mut self, tlv: &TlvDecoder) -> Result<Vec<u8>, PairingError> {
        tracing::debug!("pair-verify V3: checking controller identity");

        let encrypted = match tlv.get_required(TlvType::EncryptedData) {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(err.into())),
        };

        let our_ephemeral_public = self
            .ephemeral
            .as_ref()
            .map(|keypair| *keypair.public_key().as_bytes());
        let (
            Some(verify_key),
            Some(our_ephemeral_public),
            Some(peer_ephemeral),
            Some(shared_secret),
        ) = (
            self.verify_key,
            our_ephemeral_public,
            self.peer_ephemeral,
            self.shared_secret,
        ) else {
            return Err(self.fail(PairingError::Internal));
        };

        let cipher = match ChaCha20Poly1305Cipher::new(&verify_key) {
            Ok(cipher) => cipher,
            Err(err) => return Err(self.fail(err.into())),
        };

        let Ok(decrypted) = cipher.open(&Nonce::from_label(b"PV-Msg03"), encrypted) else {
            tracing::warn!("pair-verify V3: payload failed authentication");
            return Ok(self.auth_failure(PairingError::CryptoAuth));
        };

        let inner = match TlvDecoder::decode(&decrypted) {
            Ok(inner) => inner,
            Err(err) => return Err(self.fail(err.into())),
        };

        let (username, signature_bytes) = match (
            inner.get_str(TlvType::Username),
            inner.get_required(TlvType::Signature),
        ) {
            (Ok(username), Ok(signature)) => (username, signature),
            (Err(err), _) | (_, Err(err)) => return Err(self.fail(err.into())),
        };

        let stored_ltpk = match self.store.get(username) {
            Ok(Some(ltpk)) => ltpk,
            Ok(None) => {
                tracing::warn!(username, "pair-verify V3: unknown peer");
                return Ok(self.auth_failure(PairingError::NoSuchPeer));
            }
            Err(err) => {
                tracing::error!(error = %err, "pair-verify V3: identity store read failed");
                self.clear_secrets();
                self.state = VerifyState::Failed;
                self.last_error = Some(PairingError::Io(err));
                return Ok(TlvEncoder::new()
                    .add_seq(verify_seq::V4)
                    .add_error(errors::UNKNOWN)
                    .build());
            }
        };

        // material = A || username || B
        let mut material = Vec::with_capacity(
            peer_ephemeral.len() + username.len() + our_ephemeral_public.len(),
        );
        material.extend_from_slice(&peer_ephemeral);
        material.extend_from_slice(username.as_bytes());
        material.extend_from_slice(&our_ephemeral_public);

        let verified = Ed25519PublicKey::from_bytes(&stored_ltpk)
            .and_then(|ltpk| {
                Ed25519Signature::from_bytes(signature_bytes)
                    .and_then(|signature| ltpk.verify(&material, &signature))
            })
            .is_ok();
        if !verified {
            tracing::warn!(username, "pair-verify V3: signature rejected");
            return Ok(self.auth_failure(PairingError::CryptoAuth));
        }

        let decrypt_key = match derive_key(
            b"Control-Salt",
            &shared_secret,
            b"Control-Read-Encryption-Key",
        ) {
            Ok(key) => key,
            Err(err) => return Err(self.fail(err.into())),
        };
        let encrypt_key = match derive_key(
            b"Control-Salt",
            &shared_secret,
            b"Control-Write-Encryption-Key",
        ) {
            Ok(key) => key,
            Err(err) => return Err(self.fail(err.into())),
        };

        self.session_keys = Some(SessionKeys {
            encrypt_key,
            decrypt_key,
            encrypt_nonce: 0,
            decrypt_nonce: 0,
        });

        self.clear_secrets();
        self.state = VerifyState::Done;

        tracing::info!(username, "pair-verify complete");
        Ok(TlvEncoder::new().add_seq(verify_seq::V4).build())
    }

    // Auth failures answer with AuthError(2) and wipe the session.
    fn auth_failure(&mut self, err: PairingError) -> Vec<u8> {
        self.clear_secrets();
        self.state = VerifyState::Failed;
        self.last_error = Some(err);

        TlvEncoder::new()
            .add_seq(verify_seq::V4)
            .add_error(errors::AUTHENTICATION)
            .build()
    }

    // Order and decode violations wipe the session and close without reply.
    fn fail(&mut self, err: PairingError) -> PairingError {
        self.clear_secrets();
        self.state = VerifyState::Failed;
        err
    }

    fn clear_secrets(&mut self) {
        self.ephemeral = None;
        self.peer_ephemeral = None;
        if let Some(mut shared) = self.shared_secret.take() {
            shared.zeroize();
        }
        if let Some(mut key) = self.verify_key.take() {
            key.zeroize();
        }
    }
}

impl Drop for PairVerifySession {
    fn drop(&mut self) {
        self.clear_secrets();
    }
}
