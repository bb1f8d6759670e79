use super::{CryptoError, lengths};
use num_bigint::{BigUint, RandomBits};
use num_traits::Zero;
use rand::Rng;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

/// SRP-6a server for the 3072-bit RFC-5054 group with SHA-512.
///
/// One instance serves one pairing attempt: it owns the salt, the secret
/// exponent `b`, and the password verifier, and produces the public value
/// `B` sent in the first response.
pub struct SrpServer {
    n: BigUint,
    g: BigUint,
    b: BigUint,
    verifier: BigUint,
    username: Vec<u8>,
    salt: [u8; 16],
    public_key: Vec<u8>,
}

impl SrpServer {
    /// Start an SRP session for the given identity and password.
    ///
    /// Generates a fresh 16-byte salt and secret exponent, derives the
    /// password verifier `v = g^x`, and computes `B = k·v + g^b`.
    pub fn start(username: &[u8], password: &[u8]) -> Result<Self, CryptoError> {
        let n = group_n()?;
        let g = BigUint::from(5u32);
        let k = multiplier(&n, &g);

        let mut rng = rand::thread_rng();
        let mut salt = [0u8; 16];
        rng.fill(&mut salt);

        // x = H(s | H(I | ":" | P)), v = g^x
        let x = private_x(username, password, &salt);
        let verifier = g.modpow(&x, &n);

        let b: BigUint = rng.sample(RandomBits::new(512));
        let b = b % &n;

        // B = (k*v + g^b) % N
        let b_pub = (&k * &verifier + g.modpow(&b, &n)) % &n;
        let public_key = pad_to_group(&b_pub);

        Ok(Self {
            n,
            g,
            b,
            verifier,
            username: username.to_vec(),
            salt,
            public_key,
        })
    }

    /// The session salt, sent alongside `B`.
    #[must_use]
    pub fn salt(&self) -> &[u8; 16] {
        &self.salt
    }

    /// The server public value `B`, padded to 384 bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Complete the exchange with the client public value `A`.
    ///
    /// Computes the premaster `S = (A · v^u)^b`, the session key
    /// `K = H(S)`, and both proofs. Rejects `A` of the wrong length and
    /// any `A` that reduces to zero mod N.
    pub fn process_client(self, client_public: &[u8]) -> Result<SrpServerVerifier, CryptoError> {
        if client_public.len() != lengths::SRP_PUBLIC_KEY {
            return Err(CryptoError::BadLength {
                expected: lengths::SRP_PUBLIC_KEY,
                actual: client_public.len(),
            });
        }

        let a_pub = BigUint::from_bytes_be(client_public);
        if (&a_pub % &self.n).is_zero() {
            return Err(CryptoError::ZeroPoint);
        }

        // u = H(pad(A), pad(B))
        let u = {
            let mut hasher = Sha512::new();
            hasher.update(client_public);
            hasher.update(&self.public_key);
            BigUint::from_bytes_be(&hasher.finalize())
        };

        // S = (A * v^u) ^ b % N
        let base = (&a_pub * self.verifier.modpow(&u, &self.n)) % &self.n;
        let premaster = base.modpow(&self.b, &self.n);

        // K = H(S)
        let session_key = Sha512::digest(premaster.to_bytes_be()).to_vec();

        // M1 = H(H(N) ^ H(g), H(I), s, A, B, K)
        let m1 = {
            let hn = Sha512::digest(self.n.to_bytes_be());
            let hg = Sha512::digest(self.g.to_bytes_be());
            let mut hn_xor_hg = [0u8; 64];
            for i in 0..64 {
                hn_xor_hg[i] = hn[i] ^ hg[i];
            }

            let h_user = Sha512::digest(&self.username);

            let mut hasher = Sha512::new();
            hasher.update(hn_xor_hg);
            hasher.update(h_user);
            hasher.update(self.salt);
            hasher.update(client_public);
            hasher.update(&self.public_key);
            hasher.update(&session_key);
            hasher.finalize().to_vec()
        };

        // M2 = H(A, M1, K)
        let m2 = {
            let mut hasher = Sha512::new();
            hasher.update(client_public);
            hasher.update(&m1);
            hasher.update(&session_key);
            hasher.finalize().to_vec()
        };

        Ok(SrpServerVerifier {
            session_key,
            m1,
            m2,
        })
    }
}

impl Drop for SrpServer {
    fn drop(&mut self) {
        // BigUint offers no in-place zeroing; the secret exponent and
        // verifier drop with the session.
        self.salt.zeroize();
    }
}

/// Completed SRP exchange: session key and both proofs.
pub struct SrpServerVerifier {
    session_key: Vec<u8>,
    m1: Vec<u8>,
    m2: Vec<u8>,
}

impl SrpServerVerifier {
    /// The 64-byte session key `K = H(S)`.
    #[must_use]
    pub fn session_key(&self) -> &[u8] {
        &self.session_key
    }

    /// Check the client proof; on success returns the server proof `M2`.
    pub fn verify_client_proof(&self, client_proof: &[u8]) -> Result<&[u8], CryptoError> {
        if client_proof.len() != lengths::SRP_PROOF {
            return Err(CryptoError::BadLength {
                expected: lengths::SRP_PROOF,
                actual: client_proof.len(),
            });
        }
        if client_proof != self.m1.as_slice() {
            return Err(CryptoError::BadSignature);
        }
        Ok(&self.m2)
    }
}

impl Drop for SrpServerVerifier {
    fn drop(&mut self) {
        self.session_key.zeroize();
        self.m1.zeroize();
        self.m2.zeroize();
    }
}

fn group_n() -> Result<BigUint, CryptoError> {
    BigUint::parse_bytes(
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
    .ok_or(CryptoError::KeyDerivation)
}

// k = H(N, pad(g))
fn multiplier(n: &BigUint, g: &BigUint) -> BigUint {
    let mut hasher = Sha512::new();
    hasher.update(n.to_bytes_be());
    hasher.update(pad_to_group(g));
    BigUint::from_bytes_be(&hasher.finalize())
}

// x = H(salt, H(username, ":", password))
fn private_x(username: &[u8], password: &[u8], salt: &[u8]) -> BigUint {
    let mut inner = Sha512::new();
    inner.update(username);
    inner.update(b":");
    inner.update(password);
    let h_up = inner.finalize();

    let mut outer = Sha512::new();
    outer.update(salt);
    outer.update(h_up);
    BigUint::from_bytes_be(&outer.finalize())
}

fn pad_to_group(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut padded = vec![0u8; lengths::SRP_PUBLIC_KEY];
    padded[lengths::SRP_PUBLIC_KEY - bytes.len()..].copy_from_slice(&bytes);
    padded
}
