use crate::protocol::pairing::store::{IdentityStore, MemoryIdentityStore};
use crate::protocol::pairing::tlv::{TlvDecoder, TlvEncoder, TlvType};
use crate::protocol::pairing::{PairSetupSession, PairingError, setup_seq, setup::SetupState};
use crate::types::config::BridgeConfig;
use std::sync::Arc;

fn test_config() -> BridgeConfig {
    BridgeConfig::builder()
        .device_id("6E:D8:32:FB:11:A4")
        .setup_code("001-02-003")
        .build()
        .unwrap()
}

fn test_session() -> (Arc<MemoryIdentityStore>, PairSetupSession) {
    let store = Arc::new(MemoryIdentityStore::new());
    let session = PairSetupSession::new(&test_config(), store.clone()).unwrap();
    (store, session)
}

#[test]
fn test_initial_state() {
    let (_store, session) = test_session();
    assert_eq!(session.state(), SetupState::Idle);
}

#[test]
fn test_m1_yields_salt_and_public_key() {
    let (_store, mut session) = test_session();

    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).add_method(0).build();
    let m2 = session.handle(&m1).unwrap();

    assert_eq!(session.state(), SetupState::AwaitKeyVerify);

    let tlv = TlvDecoder::decode(&m2).unwrap();
    assert_eq!(tlv.get_seq().unwrap(), setup_seq::M2);
    assert_eq!(tlv.get(TlvType::Salt).unwrap().len(), 16);
    assert_eq!(tlv.get(TlvType::PublicKey).unwrap().len(), 384);
    assert!(!tlv.has_error());
}

#[test]
fn test_m1_without_method_is_accepted() {
    let (_store, mut session) = test_session();

    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).build();
    assert!(session.handle(&m1).is_ok());
}

#[test]
fn test_nonzero_method_rejected() {
    let (_store, mut session) = test_session();

    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).add_method(1).build();
    let result = session.handle(&m1);

    assert!(matches!(result, Err(PairingError::Decode(_))));
    assert_eq!(session.state(), SetupState::Failed);
}

#[test]
fn test_out_of_order_m3_closes_without_reply() {
    let (_store, mut session) = test_session();

    let m3 = TlvEncoder::new()
        .add_seq(setup_seq::M3)
        .add(TlvType::PublicKey, &[0x01u8; 384])
        .add(TlvType::Proof, &[0u8; 64])
        .build();

    let result = session.handle(&m3);
    assert!(matches!(result, Err(PairingError::ProtocolOrder { .. })));
    assert_eq!(session.state(), SetupState::Failed);
}

#[test]
fn test_out_of_order_m5_closes_without_reply() {
    let (store, mut session) = test_session();

    let m5 = TlvEncoder::new()
        .add_seq(setup_seq::M5)
        .add(TlvType::EncryptedData, &[0xAAu8; 48])
        .build();

    let result = session.handle(&m5);
    assert!(matches!(result, Err(PairingError::ProtocolOrder { .. })));
    assert_eq!(session.state(), SetupState::Failed);
    assert_eq!(store.get("ABC").unwrap(), None);
}

#[test]
fn test_repeated_m1_rejected() {
    let (_store, mut session) = test_session();

    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).build();
    session.handle(&m1).unwrap();

    let result = session.handle(&m1);
    assert!(matches!(result, Err(PairingError::ProtocolOrder { .. })));
}

#[test]
fn test_wrong_proof_answers_auth_error() {
    let (store, mut session) = test_session();

    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).build();
    session.handle(&m1).unwrap();

    // A syntactically valid public value with a proof that cannot match
    let m3 = TlvEncoder::new()
        .add_seq(setup_seq::M3)
        .add(TlvType::PublicKey, &[0x01u8; 384])
        .add(TlvType::Proof, &[0u8; 64])
        .build();

    let m4 = session.handle(&m3).unwrap();
    let tlv = TlvDecoder::decode(&m4).unwrap();
    assert_eq!(tlv.get_seq().unwrap(), setup_seq::M4);
    assert_eq!(tlv.get_error(), Some(2));
    assert!(tlv.get(TlvType::Proof).is_none());

    assert_eq!(session.state(), SetupState::Failed);
    assert!(matches!(
        session.last_error(),
        Some(PairingError::CryptoAuth)
    ));
    assert_eq!(store.get("ABC").unwrap(), None);
}

#[test]
fn test_zero_public_value_closes_without_reply() {
    let (_store, mut session) = test_session();

    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).build();
    session.handle(&m1).unwrap();

    let m3 = TlvEncoder::new()
        .add_seq(setup_seq::M3)
        .add(TlvType::PublicKey, &[0u8; 384])
        .add(TlvType::Proof, &[0u8; 64])
        .build();

    let result = session.handle(&m3);
    assert!(matches!(result, Err(PairingError::CryptoShape)));
    assert_eq!(session.state(), SetupState::Failed);
}

#[test]
fn test_malformed_tlv_closes_without_reply() {
    let (_store, mut session) = test_session();

    // Header claims more bytes than present
    let result = session.handle(&[0x06, 0x05, 0x01]);
    assert!(matches!(result, Err(PairingError::Decode(_))));
    assert_eq!(session.state(), SetupState::Failed);
}

#[test]
fn test_missing_sequence_number_rejected() {
    let (_store, mut session) = test_session();

    let body = TlvEncoder::new().add_method(0).build();
    assert!(matches!(
        session.handle(&body),
        Err(PairingError::Decode(_))
    ));
}

#[test]
fn test_inbound_error_code_fails_session() {
    let (_store, mut session) = test_session();

    let body = TlvEncoder::new().add_seq(setup_seq::M1).add_error(2).build();
    let result = session.handle(&body);

    assert!(matches!(result, Err(PairingError::Peer { code: 2 })));
    assert_eq!(session.state(), SetupState::Failed);
}

#[test]
fn test_reset_returns_to_idle() {
    let (_store, mut session) = test_session();

    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).build();
    session.handle(&m1).unwrap();

    session.reset();
    assert_eq!(session.state(), SetupState::Idle);
    assert!(session.last_error().is_none());

    // A fresh attempt starts over cleanly
    session.handle(&m1).unwrap();
    assert_eq!(session.state(), SetupState::AwaitKeyVerify);
}

#[test]
fn test_failed_session_stays_failed() {
    let (_store, mut session) = test_session();

    let m5 = TlvEncoder::new()
        .add_seq(setup_seq::M5)
        .add(TlvType::EncryptedData, &[0u8; 32])
        .build();
    assert!(session.handle(&m5).is_err());

    // Even a well-formed M1 is refused after failure
    let m1 = TlvEncoder::new().add_seq(setup_seq::M1).build();
    assert!(matches!(
        session.handle(&m1),
        Err(PairingError::ProtocolOrder { .. })
    ));
}
