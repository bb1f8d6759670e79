use crate::protocol::crypto::{CryptoError, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

#[test]
fn test_sign_verify() {
    let keypair = Ed25519KeyPair::generate();
    let message = b"accessory identity material";

    let signature = keypair.sign(message);
    keypair.public_key().verify(message, &signature).unwrap();
}

#[test]
fn test_verify_rejects_wrong_message() {
    let keypair = Ed25519KeyPair::generate();
    let signature = keypair.sign(b"original");

    let result = keypair.public_key().verify(b"tampered", &signature);
    assert!(matches!(result, Err(CryptoError::BadSignature)));
}

#[test]
fn test_verify_rejects_wrong_key() {
    let keypair = Ed25519KeyPair::generate();
    let other = Ed25519KeyPair::generate();
    let signature = keypair.sign(b"message");

    assert!(other.public_key().verify(b"message", &signature).is_err());
}

#[test]
fn test_keypair_bytes_round_trip() {
    let keypair = Ed25519KeyPair::generate();
    let bytes = keypair.to_keypair_bytes();

    let restored = Ed25519KeyPair::from_keypair_bytes(&bytes).unwrap();
    assert_eq!(
        restored.public_key().as_bytes(),
        keypair.public_key().as_bytes()
    );

    let signature = restored.sign(b"message");
    keypair.public_key().verify(b"message", &signature).unwrap();
}

#[test]
fn test_seed_is_deterministic() {
    let a = Ed25519KeyPair::from_bytes(&[0u8; 32]).unwrap();
    let b = Ed25519KeyPair::from_bytes(&[0u8; 32]).unwrap();
    assert_eq!(a.public_key().as_bytes(), b.public_key().as_bytes());
}

#[test]
fn test_bad_lengths() {
    assert!(matches!(
        Ed25519PublicKey::from_bytes(&[0u8; 31]),
        Err(CryptoError::BadLength { expected: 32, actual: 31 })
    ));
    assert!(matches!(
        Ed25519Signature::from_bytes(&[0u8; 63]),
        Err(CryptoError::BadLength { expected: 64, actual: 63 })
    ));
    assert!(Ed25519KeyPair::from_keypair_bytes(&[0u8; 32]).is_err());
}
