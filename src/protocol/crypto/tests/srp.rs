use crate::protocol::crypto::{CryptoError, SrpServer, lengths};
use num_bigint::{BigUint, RandomBits};
use num_traits::Zero;
use rand::Rng;
use sha2::{Digest, Sha512};

/// Client half of the exchange, used to exercise the server.
struct TestSrpClient {
    n: BigUint,
    g: BigUint,
    k: BigUint,
    a: BigUint,
    public_key: Vec<u8>,
}

impl TestSrpClient {
    fn new() -> Self {
        let n = BigUint::parse_bytes(
            b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08\
              8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B\
              302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9\
              A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6\
              49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8\
              FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D\
              670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C\
              180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
              3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D\
              04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7D\
              B3970F85A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D226\
              1AD2EE6BF12FFA06D98A0864D87602733EC86A64521F2B18177B200C\
              BBE117577A615D6C770988C0BAD946E208E24FA074E5AB3143DB5BFC\
              E0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
            16,
        )
        .unwrap();
        let g = BigUint::from(5u32);

        let k = {
            let mut hasher = Sha512::new();
            hasher.update(n.to_bytes_be());
            hasher.update(pad(&g));
            BigUint::from_bytes_be(&hasher.finalize())
        };

        let mut rng = rand::thread_rng();
        let a: BigUint = rng.sample(RandomBits::new(256));
        let a = a % &n;
        let public_key = pad(&g.modpow(&a, &n));

        Self {
            n,
            g,
            k,
            a,
            public_key,
        }
    }

    /// Returns `(M1, K)` for the received salt and server public value.
    fn process_challenge(
        &self,
        username: &[u8],
        password: &[u8],
        salt: &[u8],
        server_public: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let b_pub = BigUint::from_bytes_be(server_public);

        // u = H(pad(A), pad(B))
        let u = {
            let mut hasher = Sha512::new();
            hasher.update(&self.public_key);
            hasher.update(server_public);
            BigUint::from_bytes_be(&hasher.finalize())
        };

        // x = H(salt, H(username, ":", password))
        let x = {
            let mut inner = Sha512::new();
            inner.update(username);
            inner.update(b":");
            inner.update(password);
            let h_up = inner.finalize();

            let mut outer = Sha512::new();
            outer.update(salt);
            outer.update(h_up);
            BigUint::from_bytes_be(&outer.finalize())
        };

        // S = (B - k * g^x) ^ (a + u * x) % n
        let g_x = self.g.modpow(&x, &self.n);
        let k_g_x = (&self.k * g_x) % &self.n;
        let base = if b_pub >= k_g_x {
            (&b_pub - &k_g_x) % &self.n
        } else {
            (&self.n - (&k_g_x - &b_pub) % &self.n) % &self.n
        };
        let exp = &self.a + (&u * x);
        let premaster = base.modpow(&exp, &self.n);

        let session_key = Sha512::digest(premaster.to_bytes_be()).to_vec();

        // M1 = H(H(N) ^ H(g), H(username), salt, A, B, K)
        let m1 = {
            let hn = Sha512::digest(self.n.to_bytes_be());
            let hg = Sha512::digest(self.g.to_bytes_be());
            let mut hn_xor_hg = [0u8; 64];
            for i in 0..64 {
                hn_xor_hg[i] = hn[i] ^ hg[i];
            }

            let mut hasher = Sha512::new();
            hasher.update(hn_xor_hg);
            hasher.update(Sha512::digest(username));
            hasher.update(salt);
            hasher.update(&self.public_key);
            hasher.update(server_public);
            hasher.update(&session_key);
            hasher.finalize().to_vec()
        };

        (m1, session_key)
    }

    fn expected_server_proof(&self, m1: &[u8], session_key: &[u8]) -> Vec<u8> {
        let mut hasher = Sha512::new();
        hasher.update(&self.public_key);
        hasher.update(m1);
        hasher.update(session_key);
        hasher.finalize().to_vec()
    }
}

fn pad(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut padded = vec![0u8; 384];
    padded[384 - bytes.len()..].copy_from_slice(&bytes);
    padded
}

#[test]
fn test_full_exchange_agrees() {
    let server = SrpServer::start(b"Pair-Setup", b"031-45-154").unwrap();
    assert_eq!(server.public_key().len(), lengths::SRP_PUBLIC_KEY);

    let client = TestSrpClient::new();
    let (m1, client_key) =
        client.process_challenge(b"Pair-Setup", b"031-45-154", server.salt(), server.public_key());

    let salt = *server.salt();
    let verifier = server.process_client(&client.public_key).unwrap();
    assert_eq!(verifier.session_key(), client_key.as_slice());

    let m2 = verifier.verify_client_proof(&m1).unwrap();
    assert_eq!(m2, client.expected_server_proof(&m1, &client_key));
    assert_eq!(salt.len(), 16);
}

#[test]
fn test_wrong_password_rejected() {
    let server = SrpServer::start(b"Pair-Setup", b"031-45-154").unwrap();

    let client = TestSrpClient::new();
    let (m1, _) =
        client.process_challenge(b"Pair-Setup", b"000-00-000", server.salt(), server.public_key());

    let verifier = server.process_client(&client.public_key).unwrap();
    assert!(matches!(
        verifier.verify_client_proof(&m1),
        Err(CryptoError::BadSignature)
    ));
}

#[test]
fn test_zero_public_value_rejected() {
    let server = SrpServer::start(b"Pair-Setup", b"031-45-154").unwrap();

    let zero = vec![0u8; lengths::SRP_PUBLIC_KEY];
    assert!(matches!(
        server.process_client(&zero),
        Err(CryptoError::ZeroPoint)
    ));
}

#[test]
fn test_modulus_multiple_rejected() {
    let server = SrpServer::start(b"Pair-Setup", b"031-45-154").unwrap();

    // A = N reduces to zero mod N
    let n = BigUint::parse_bytes(
        b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08\
          8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B\
          302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9\
          A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6\
          49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8\
          FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D\
          670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C\
          180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
          3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D\
          04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7D\
          B3970F85A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D226\
          1AD2EE6BF12FFA06D98A0864D87602733EC86A64521F2B18177B200C\
          BBE117577A615D6C770988C0BAD946E208E24FA074E5AB3143DB5BFC\
          E0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
        16,
    )
    .unwrap();
    assert!(!n.is_zero());

    let mut padded = vec![0u8; 384];
    let bytes = n.to_bytes_be();
    padded[384 - bytes.len()..].copy_from_slice(&bytes);

    assert!(matches!(
        server.process_client(&padded),
        Err(CryptoError::ZeroPoint)
    ));
}

#[test]
fn test_short_public_value_rejected() {
    let server = SrpServer::start(b"Pair-Setup", b"031-45-154").unwrap();
    assert!(matches!(
        server.process_client(&[0x01u8; 32]),
        Err(CryptoError::BadLength { .. })
    ));
}

#[test]
fn test_salt_is_fresh_per_session() {
    let a = SrpServer::start(b"Pair-Setup", b"031-45-154").unwrap();
    let b = SrpServer::start(b"Pair-Setup", b"031-45-154").unwrap();
    assert_ne!(a.salt(), b.salt());
    assert_ne!(a.public_key(), b.public_key());
}
