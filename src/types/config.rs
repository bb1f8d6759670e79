//! Bridge identity configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Device id is not 17-character colon-separated hex.
    #[error("invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// Setup code is not in `NNN-NN-NNN` form.
    #[error("invalid setup code")]
    InvalidSetupCode,

    /// Configuration file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Identity configuration for a bridge process.
///
/// The device id is a stable, MAC-style identifier (`"6E:D8:32:FB:11:A4"`);
/// the setup code is the eight-digit pairing password formatted
/// `NNN-NN-NNN`. Neither is key material: the long-term signing key lives
/// in the identity store and is generated from the system RNG.
#[derive(Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Stable device identifier, 17-character colon-separated hex.
    pub device_id: String,

    /// Pairing setup code, `NNN-NN-NNN`.
    pub setup_code: String,

    /// Directory holding the identity store (must exist, mode 0700).
    pub store_dir: PathBuf,
}

// Manual Debug keeps the setup code out of log output.
impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("device_id", &self.device_id)
            .field("setup_code", &"***-**-***")
            .field("store_dir", &self.store_dir)
            .finish()
    }
}

impl BridgeConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Validate device id and setup code formats.
    ///
    /// # Errors
    ///
    /// Returns error if either field is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_device_id(&self.device_id) {
            return Err(ConfigError::InvalidDeviceId(self.device_id.clone()));
        }
        if !is_setup_code(&self.setup_code) {
            return Err(ConfigError::InvalidSetupCode);
        }
        Ok(())
    }

    /// Generate a random setup code for first-run provisioning.
    #[must_use]
    pub fn random_setup_code() -> String {
        let mut rng = rand::thread_rng();
        format!(
            "{:03}-{:02}-{:03}",
            rng.gen_range(0..1000u16),
            rng.gen_range(0..100u8),
            rng.gen_range(0..1000u16)
        )
    }

    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable, malformed, or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;
        Ok(())
    }
}

/// Builder for [`BridgeConfig`]
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    device_id: Option<String>,
    setup_code: Option<String>,
    store_dir: Option<PathBuf>,
}

impl BridgeConfigBuilder {
    /// Set the device identifier
    #[must_use]
    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    /// Set the pairing setup code
    #[must_use]
    pub fn setup_code(mut self, code: impl Into<String>) -> Self {
        self.setup_code = Some(code.into());
        self
    }

    /// Set the identity store directory
    #[must_use]
    pub fn store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if a field is missing or malformed.
    pub fn build(self) -> Result<BridgeConfig, ConfigError> {
        let config = BridgeConfig {
            device_id: self
                .device_id
                .ok_or_else(|| ConfigError::InvalidDeviceId(String::new()))?,
            setup_code: self.setup_code.ok_or(ConfigError::InvalidSetupCode)?,
            store_dir: self.store_dir.unwrap_or_else(|| PathBuf::from(".")),
        };
        config.validate()?;
        Ok(config)
    }
}

fn is_device_id(id: &str) -> bool {
    if id.len() != 17 {
        return false;
    }
    id.bytes().enumerate().all(|(i, b)| {
        if i % 3 == 2 {
            b == b':'
        } else {
            b.is_ascii_hexdigit()
        }
    })
}

fn is_setup_code(code: &str) -> bool {
    if code.len() != 10 {
        return false;
    }
    code.bytes().enumerate().all(|(i, b)| {
        if i == 3 || i == 6 {
            b == b'-'
        } else {
            b.is_ascii_digit()
        }
    })
}
