//! Durable identity storage
//!
//! Maps peer usernames to their long-term Ed25519 public keys and holds
//! the bridge's own signing key pair. Backed by a content-addressed
//! directory: one file per peer named by the SHA-256 of the username,
//! plus reserved files for the bridge key halves.

use crate::protocol::crypto::{Ed25519KeyPair, lengths};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Reserved file for the bridge signing key (secret ‖ public, 64 bytes)
const BRIDGE_LTSK_FILE: &str = "bridge.ltsk";
/// Reserved file for the bridge verifying key (32 bytes)
const BRIDGE_LTPK_FILE: &str = "bridge.ltpk";

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt key record: {0}")]
    Corrupt(&'static str),
}

/// Durable mapping of peer usernames to long-term public keys.
///
/// Writers are serialized per store; readers may run concurrently and
/// observe either the pre-write or post-write state, never a partial
/// record.
pub trait IdentityStore: Send + Sync {
    /// Store a peer's long-term public key, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be written durably.
    fn put(&self, username: &str, ltpk: &[u8; 32]) -> Result<(), StoreError>;

    /// Load a peer's long-term public key. `None` means not paired.
    ///
    /// # Errors
    ///
    /// Returns error if the record exists but cannot be read.
    fn get(&self, username: &str) -> Result<Option<[u8; 32]>, StoreError>;

    /// Remove a peer. Removing an unknown peer is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be removed.
    fn delete(&self, username: &str) -> Result<(), StoreError>;

    /// The bridge's long-term signing key pair.
    ///
    /// Generated from the system RNG on first call and persisted; every
    /// later call returns the stored pair.
    ///
    /// # Errors
    ///
    /// Returns error if the key cannot be loaded or persisted.
    fn bridge_key(&self) -> Result<Ed25519KeyPair, StoreError>;
}

/// Filesystem-backed identity store.
///
/// Peer records live at `<dir>/<hex(sha256(username))>.pub` as the raw
/// 32-byte public key. Writes go to a `.tmp` sibling and are renamed
/// into place, so concurrent readers never see a torn record.
pub struct FileIdentityStore {
    dir: PathBuf,
    // Serializes writers; reads are lock-free.
    write_lock: Mutex<()>,
}

impl FileIdentityStore {
    /// Open a store rooted at an existing directory (mode 0700).
    ///
    /// # Errors
    ///
    /// Returns error if the path is not a directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("identity store directory missing: {}", dir.display()),
            )));
        }

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn peer_path(&self, username: &str) -> PathBuf {
        let digest = Sha256::digest(username.as_bytes());
        let mut name = String::with_capacity(digest.len() * 2 + 4);
        for byte in digest {
            use std::fmt::Write as _;
            let _ = write!(name, "{byte:02x}");
        }
        name.push_str(".pub");
        self.dir.join(name)
    }

    // Durable write: temp file in the same directory, fsync, rename.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_exact_file<const N: usize>(
        path: &Path,
        what: &'static str,
    ) -> Result<Option<[u8; N]>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let arr: [u8; N] = bytes.try_into().map_err(|_| StoreError::Corrupt(what))?;
        Ok(Some(arr))
    }
}

impl IdentityStore for FileIdentityStore {
    fn put(&self, username: &str, ltpk: &[u8; 32]) -> Result<(), StoreError> {
        let guard = self.write_lock.lock().map_err(|_| StoreError::Corrupt("store lock poisoned"))?;
        let result = self.write_atomic(&self.peer_path(username), ltpk);
        drop(guard);

        if result.is_ok() {
            tracing::debug!(username, "stored peer long-term public key");
        }
        result
    }

    fn get(&self, username: &str) -> Result<Option<[u8; 32]>, StoreError> {
        Self::read_exact_file::<32>(&self.peer_path(username), "peer public key")
    }

    fn delete(&self, username: &str) -> Result<(), StoreError> {
        let guard = self.write_lock.lock().map_err(|_| StoreError::Corrupt("store lock poisoned"))?;
        let result = match fs::remove_file(self.peer_path(username)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        };
        drop(guard);
        result
    }

    fn bridge_key(&self) -> Result<Ed25519KeyPair, StoreError> {
        let ltsk_path = self.dir.join(BRIDGE_LTSK_FILE);

        if let Some(bytes) =
            Self::read_exact_file::<{ lengths::ED25519_KEYPAIR }>(&ltsk_path, "bridge signing key")?
        {
            return Ed25519KeyPair::from_keypair_bytes(&bytes)
                .map_err(|_| StoreError::Corrupt("bridge signing key"));
        }

        let guard = self.write_lock.lock().map_err(|_| StoreError::Corrupt("store lock poisoned"))?;

        // Another task may have generated while we waited for the lock.
        if let Some(bytes) =
            Self::read_exact_file::<{ lengths::ED25519_KEYPAIR }>(&ltsk_path, "bridge signing key")?
        {
            drop(guard);
            return Ed25519KeyPair::from_keypair_bytes(&bytes)
                .map_err(|_| StoreError::Corrupt("bridge signing key"));
        }

        let keypair = Ed25519KeyPair::generate();
        self.write_atomic(&ltsk_path, &keypair.to_keypair_bytes())?;
        self.write_atomic(
            &self.dir.join(BRIDGE_LTPK_FILE),
            keypair.public_key().as_bytes(),
        )?;
        drop(guard);

        tracing::info!("generated bridge long-term key pair");
        Ok(keypair)
    }
}

/// In-memory identity store (non-persistent, for tests and hosts that
/// manage their own durability)
#[derive(Default)]
pub struct MemoryIdentityStore {
    peers: Mutex<HashMap<String, [u8; 32]>>,
    bridge: Mutex<Option<Ed25519KeyPair>>,
}

impl MemoryIdentityStore {
    /// Create a new in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn put(&self, username: &str, ltpk: &[u8; 32]) -> Result<(), StoreError> {
        self.peers
            .lock()
            .map_err(|_| StoreError::Corrupt("store lock poisoned"))?
            .insert(username.to_string(), *ltpk);
        Ok(())
    }

    fn get(&self, username: &str) -> Result<Option<[u8; 32]>, StoreError> {
        Ok(self
            .peers
            .lock()
            .map_err(|_| StoreError::Corrupt("store lock poisoned"))?
            .get(username)
            .copied())
    }

    fn delete(&self, username: &str) -> Result<(), StoreError> {
        self.peers
            .lock()
            .map_err(|_| StoreError::Corrupt("store lock poisoned"))?
            .remove(username);
        Ok(())
    }

    fn bridge_key(&self) -> Result<Ed25519KeyPair, StoreError> {
        let mut bridge = self
            .bridge
            .lock()
            .map_err(|_| StoreError::Corrupt("store lock poisoned"))?;
        Ok(bridge.get_or_insert_with(Ed25519KeyPair::generate).clone())
    }
}
