//! Pair-setup server - SRP-based pairing that provisions a peer key
//!
//! Three request/response steps: M1/M2 starts the SRP exchange, M3/M4
//! verifies the password proof, M5/M6 exchanges signed long-term keys
//! under the derived session key. A successful run writes exactly one
//! peer record to the identity store.

use super::store::IdentityStore;
use super::tlv::{TlvDecoder, TlvEncoder, TlvType, errors};
use super::{PAIR_SETUP_USERNAME, PairingError, setup_seq};
use crate::protocol::crypto::{
    ChaCha20Poly1305Cipher, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, HkdfSha512, Nonce,
    SrpServer, SrpServerVerifier, derive_key,
};
use crate::types::config::BridgeConfig;
use std::sync::Arc;
use zeroize::Zeroize;

/// Pair-setup session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    /// Waiting for M1
    Idle,
    /// M1 answered, waiting for the SRP proof (M3)
    AwaitKeyVerify,
    /// M3 answered, waiting for the key exchange (M5)
    AwaitKeyExchange,
    /// Pairing complete
    Done,
    /// Pairing failed; all derived material wiped
    Failed,
}

impl SetupState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AwaitKeyVerify => "AwaitKeyVerify",
            Self::AwaitKeyExchange => "AwaitKeyExchange",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

/// Server side of one pair-setup attempt.
///
/// Owned by the connection task handling the attempt; not shared.
/// Advances strictly `M1 → M3 → M5`; any deviation wipes the session.
pub struct PairSetupSession {
    state: SetupState,
    device_id: String,
    setup_code: String,
    identity: Ed25519KeyPair,
    store: Arc<dyn IdentityStore>,
    srp: Option<SrpServer>,
    srp_verifier: Option<SrpServerVerifier>,
    setup_key: Option<[u8; 32]>,
    last_error: Option<PairingError>,
}

impl PairSetupSession {
    /// Create a session for one inbound pairing attempt.
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
            state: SetupState::Idle,
            device_id: config.device_id.clone(),
            setup_code: config.setup_code.clone(),
            identity,
            store,
            srp: None,
            srp_verifier: None,
            setup_key: None,
            last_error: None,
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SetupState {
        self.state
    }

    /// The failure recorded on the last transition to `Failed`, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&PairingError> {
        self.last_error.as_ref()
    }

    /// Wipe all derived material and return to `Idle`.
    pub fn reset(&mut self) {
        self.clear_secrets();
        self.state = SetupState::Idle;
        self.last_error = None;
    }

    /// Process one inbound pair-setup TLV body.
    ///
    /// `Ok` carries the outbound TLV, which may itself carry a wire
    /// error code for authentication failures. `Err` means the message
    /// was malformed or out of order: close the connection without a
    /// reply.
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

        // A method, when present, must announce plain pair-setup.
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
            (SetupState::Idle, setup_seq::M1) => self.handle_start(),
            (SetupState::AwaitKeyVerify, setup_seq::M3) => self.handle_srp_verify(&tlv),
            (SetupState::AwaitKeyExchange, setup_seq::M5) => self.handle_key_exchange(&tlv),
            (state, seq) => Err(self.fail(PairingError::ProtocolOrder {
                state: state.name(),
                seq,
            })),
        }
    }

    // M1 -> M2: start SRP, send salt and server public value.
    fn handle_start(&mut self) -> Result<Vec<u8>, PairingError> {
        tracing::debug!("pair-setup M1: starting SRP session");

        let srp = match SrpServer::start(PAIR_SETUP_USERNAME, self.setup_code.as_bytes()) {
            Ok(srp) => srp,
            Err(err) => return Err(self.fail(err.into())),
        };

        let response = TlvEncoder::new()
            .add_seq(setup_seq::M2)
            .add(TlvType::PublicKey, srp.public_key())
            .add(TlvType::Salt, srp.salt())
            .build();

        self.srp = Some(srp);
        self.state = SetupState::AwaitKeyVerify;

        tracing::debug!("pair-setup M2: sent salt and public value");
        Ok(response)
    }

    // M3 -> M4: finish SRP, check the client proof, answer with ours.
    fn handle_srp_verify(&mut self, tlv: &TlvDecoder) -> Result<Vec<u8>, PairingError> {
        tracing::debug!("pair-setup M3: verifying SRP proof");

        let client_public = match tlv.get_required(TlvType::PublicKey) {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(err.into())),
        };
        let client_proof = match tlv.get_required(TlvType::Proof) {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(err.into())),
        };

        let Some(srp) = self.srp.take() else {
            return Err(self.fail(PairingError::Internal));
        };

        let verifier = match srp.process_client(client_public) {
            Ok(verifier) => verifier,
            Err(err) => return Err(self.fail(err.into())),
        };

        let server_proof = match verifier.verify_client_proof(client_proof) {
            Ok(proof) => proof.to_vec(),
            Err(err) if err.is_auth() => {
                tracing::warn!("pair-setup M3: client proof rejected");
                return Ok(self.auth_failure(setup_seq::M4, errors::AUTHENTICATION));
            }
            Err(err) => return Err(self.fail(err.into())),
        };

        let setup_key = match derive_key(
            b"Pair-Setup-Encrypt-Salt",
            verifier.session_key(),
            b"Pair-Setup-Encrypt-Info",
        ) {
            Ok(key) => key,
            Err(err) => return Err(self.fail(err.into())),
        };

        let response = TlvEncoder::new()
            .add_seq(setup_seq::M4)
            .add(TlvType::Proof, &server_proof)
            .build();

        self.srp_verifier = Some(verifier);
        self.setup_key = Some(setup_key);
        self.state = SetupState::AwaitKeyExchange;

        tracing::debug!("pair-setup M4: proof accepted");
        Ok(response)
    }

    // M5 -> M6: exchange signed long-term keys, store the peer record.
    fn handle_key_exchange(&mut self, tlv: &TlvDecoder) -> Result<Vec<u8>, PairingError> {
        tracing::debug!("pair-setup M5: key exchange");

        let encrypted = match tlv.get_required(TlvType::EncryptedData) {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(err.into())),
        };

        let (Some(setup_key), Some(verifier)) = (self.setup_key, self.srp_verifier.as_ref())
        else {
            return Err(self.fail(PairingError::Internal));
        };

        let cipher = match ChaCha20Poly1305Cipher::new(&setup_key) {
            Ok(cipher) => cipher,
            Err(err) => return Err(self.fail(err.into())),
        };

        let Ok(decrypted) = cipher.open(&Nonce::from_label(b"PS-Msg05"), encrypted) else {
            tracing::warn!("pair-setup M5: payload failed authentication");
            return Ok(self.auth_failure(setup_seq::M6, errors::UNKNOWN));
        };

        let inner = match TlvDecoder::decode(&decrypted) {
            Ok(inner) => inner,
            Err(err) => return Err(self.fail(err.into())),
        };

        let (username, ltpk_bytes, signature_bytes) = match (
            inner.get_str(TlvType::Username),
            inner.get_required(TlvType::PublicKey),
            inner.get_required(TlvType::Signature),
        ) {
            (Ok(username), Ok(ltpk), Ok(signature)) => (username, ltpk, signature),
            (Err(err), _, _) | (_, Err(err), _) | (_, _, Err(err)) => {
                return Err(self.fail(err.into()));
            }
        };

        let ltpk = match Ed25519PublicKey::from_bytes(ltpk_bytes) {
            Ok(ltpk) => ltpk,
            Err(err) => return Err(self.fail(err.into())),
        };
        let signature = match Ed25519Signature::from_bytes(signature_bytes) {
            Ok(signature) => signature,
            Err(err) => return Err(self.fail(err.into())),
        };

        // H = HKDF(K), material = H || username || LTPK
        let controller_hash = match HkdfSha512::new(
            Some(b"Pair-Setup-Controller-Sign-Salt"),
            verifier.session_key(),
        )
        .expand_fixed::<32>(b"Pair-Setup-Controller-Sign-Info")
        {
            Ok(hash) => hash,
            Err(err) => return Err(self.fail(err.into())),
        };

        let mut material =
            Vec::with_capacity(controller_hash.len() + username.len() + ltpk_bytes.len());
        material.extend_from_slice(&controller_hash);
        material.extend_from_slice(username.as_bytes());
        material.extend_from_slice(ltpk_bytes);

        if ltpk.verify(&material, &signature).is_err() {
            tracing::warn!("pair-setup M5: peer signature rejected");
            return Ok(self.auth_failure(setup_seq::M6, errors::AUTHENTICATION));
        }

        // The peer record is written only after full verification and
        // before the response leaves, within one atomic store write.
        let mut ltpk_arr = [0u8; 32];
        ltpk_arr.copy_from_slice(ltpk_bytes);
        if let Err(err) = self.store.put(username, &ltpk_arr) {
            tracing::error!(error = %err, "pair-setup M5: identity store write failed");
            self.last_error = Some(PairingError::Io(err));
            self.clear_secrets();
            self.state = SetupState::Failed;
            return Ok(TlvEncoder::new()
                .add_seq(setup_seq::M6)
                .add_error(errors::UNKNOWN)
                .build());
        }
        tracing::info!(username, "pair-setup: stored peer long-term key");

        // H2 = HKDF(K), material = H2 || device id || bridge LTPK
        let accessory_hash = match HkdfSha512::new(
            Some(b"Pair-Setup-Accessory-Sign-Salt"),
            verifier.session_key(),
        )
        .expand_fixed::<32>(b"Pair-Setup-Accessory-Sign-Info")
        {
            Ok(hash) => hash,
            Err(err) => return Err(self.fail(err.into())),
        };

        let bridge_ltpk = self.identity.public_key();
        let mut material = Vec::with_capacity(
            accessory_hash.len() + self.device_id.len() + bridge_ltpk.as_bytes().len(),
        );
        material.extend_from_slice(&accessory_hash);
        material.extend_from_slice(self.device_id.as_bytes());
        material.extend_from_slice(bridge_ltpk.as_bytes());

        let bridge_signature = self.identity.sign(&material);

        let inner_response = TlvEncoder::new()
            .add_str(TlvType::Username, &self.device_id)
            .add(TlvType::PublicKey, bridge_ltpk.as_bytes())
            .add(TlvType::Signature, &bridge_signature.to_bytes())
            .build();

        let sealed = match cipher.seal(&Nonce::from_label(b"PS-Msg06"), &inner_response) {
            Ok(sealed) => sealed,
            Err(err) => return Err(self.fail(err.into())),
        };

        let response = TlvEncoder::new()
            .add_seq(setup_seq::M6)
            .add(TlvType::EncryptedData, &sealed)
            .build();

        self.clear_secrets();
        self.state = SetupState::Done;

        tracing::debug!("pair-setup M6: complete");
        Ok(response)
    }

    // Auth failures answer with a wire error code and wipe the session.
    fn auth_failure(&mut self, seq: u8, code: u8) -> Vec<u8> {
        self.clear_secrets();
        self.state = SetupState::Failed;
        self.last_error = Some(PairingError::CryptoAuth);

        TlvEncoder::new().add_seq(seq).add_error(code).build()
    }

    // Order and decode violations wipe the session and close without reply.
    fn fail(&mut self, err: PairingError) -> PairingError {
        self.clear_secrets();
        self.state = SetupState::Failed;
        err
    }

    fn clear_secrets(&mut self) {
        self.srp = None;
        self.srp_verifier = None;
        if let Some(mut key) = self.setup_key.take() {
            key.zeroize();
        }
    }
}

impl Drop for PairSetupSession {
    fn drop(&mut self) {
        self.clear_secrets();
        self.setup_code.zeroize();
    }
}
