use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{QrSealError, QrSealResult};
use crate::types::{CipherAlgorithm, ErrorCorrectionLevel, KdfAlgorithm, KdfParams};

pub const MIN_SALT_LENGTH: usize = 16;
pub const MAX_SALT_LENGTH: usize = 64;
/// Nonce sizes the AES-GCM implementation is instantiated for
pub const SUPPORTED_NONCE_LENGTHS: [usize; 2] = [12, 16];

pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;
pub const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

pub const MIN_ARGON2_ITERATIONS: u32 = 1;
pub const MAX_ARGON2_ITERATIONS: u32 = 16;
pub const MIN_ARGON2_MEMORY_KIB: u32 = 8192;
pub const MAX_ARGON2_MEMORY_KIB: u32 = 1_048_576;
pub const MAX_PARALLELISM: u32 = 16;

/// A payload may ask for at most this multiple of the local (or default,
/// whichever is higher) KDF cost.
pub const PAYLOAD_COST_FACTOR: u32 = 4;

/// One week
pub const MAX_LOCKOUT_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Top-level configuration (loaded from qrseal.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrSealConfig {
    pub encryption: EncryptionConfig,
    pub lockout: LockoutConfig,
    pub qr: QrConfig,
    pub decoy: DecoyConfig,
}

impl QrSealConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: QrSealConfig =
            toml::from_str(s).map_err(|e| anyhow::anyhow!("parsing qrseal config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
            Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("config {}: {e}", path.display()))
        } else {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> QrSealResult<()> {
        self.encryption.validate()?;
        self.lockout.validate()?;
        if self.decoy.rotation.iter().all(|d| d.trim().is_empty()) {
            return Err(QrSealError::Config(
                "decoy.rotation needs at least one non-empty entry".into(),
            ));
        }
        Ok(())
    }
}

/// Cipher and KDF settings for new payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub algorithm: CipherAlgorithm,
    pub kdf: KdfAlgorithm,
    /// PBKDF2 rounds, or Argon2id time cost
    pub iterations: u32,
    pub salt_length: usize,
    pub nonce_length: usize,
    /// Argon2id memory cost in KiB (ignored by PBKDF2)
    pub memory_cost_kib: u32,
    /// Argon2id lanes (ignored by PBKDF2)
    pub parallelism: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self::argon2id()
    }
}

impl EncryptionConfig {
    /// Argon2id with m=64 MiB, t=3, p=4.
    pub fn argon2id() -> Self {
        Self {
            algorithm: CipherAlgorithm::Aes256Gcm,
            kdf: KdfAlgorithm::Argon2id,
            iterations: 3,
            salt_length: 32,
            nonce_length: 12,
            memory_cost_kib: 65536,
            parallelism: 4,
        }
    }

    pub fn pbkdf2() -> Self {
        Self {
            algorithm: CipherAlgorithm::Aes256Gcm,
            kdf: KdfAlgorithm::Pbkdf2Sha256,
            iterations: DEFAULT_PBKDF2_ITERATIONS,
            salt_length: 32,
            nonce_length: 12,
            memory_cost_kib: 0,
            parallelism: 1,
        }
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            algorithm: self.kdf,
            iterations: self.iterations,
            memory_kib: self.memory_cost_kib,
            parallelism: self.parallelism,
        }
    }

    /// Rebuild the config a payload was written with.
    pub fn with_kdf_params(&self, params: KdfParams) -> Self {
        Self {
            kdf: params.algorithm,
            iterations: params.iterations,
            memory_cost_kib: params.memory_kib,
            parallelism: params.parallelism,
            ..self.clone()
        }
    }

    /// Reject configs below the documented minimums or above the cost ceilings.
    pub fn validate(&self) -> QrSealResult<()> {
        if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&self.salt_length) {
            return Err(QrSealError::validation(format!(
                "salt_length must be {MIN_SALT_LENGTH}..={MAX_SALT_LENGTH} bytes, got {}",
                self.salt_length
            )));
        }
        if !SUPPORTED_NONCE_LENGTHS.contains(&self.nonce_length) {
            return Err(QrSealError::validation(format!(
                "nonce_length must be one of {SUPPORTED_NONCE_LENGTHS:?} bytes, got {}",
                self.nonce_length
            )));
        }
        validate_kdf_params(&self.kdf_params())
    }

    /// Cost ceiling for KDF parameters read from a scanned payload.
    ///
    /// The reference cost is the local setting for the same KDF, or the
    /// built-in default when that is higher, so a cheaply configured reader
    /// still opens payloads sealed at default cost.
    pub fn check_payload_kdf(&self, params: &KdfParams) -> QrSealResult<()> {
        let default = match params.algorithm {
            KdfAlgorithm::Argon2id => Self::argon2id(),
            KdfAlgorithm::Pbkdf2Sha256 => Self::pbkdf2(),
        };
        let (iterations, memory_kib) = if self.kdf == params.algorithm {
            (
                self.iterations.max(default.iterations),
                self.memory_cost_kib.max(default.memory_cost_kib),
            )
        } else {
            (default.iterations, default.memory_cost_kib)
        };

        let max_iterations = iterations.saturating_mul(PAYLOAD_COST_FACTOR);
        if params.iterations > max_iterations {
            return Err(QrSealError::Malformed(format!(
                "payload asks for {} {} iterations, limit is {max_iterations}",
                params.iterations, params.algorithm
            )));
        }
        if params.algorithm == KdfAlgorithm::Argon2id {
            let max_memory = memory_kib.saturating_mul(PAYLOAD_COST_FACTOR);
            if params.memory_kib > max_memory {
                return Err(QrSealError::Malformed(format!(
                    "payload asks for {} KiB of Argon2id memory, limit is {max_memory}",
                    params.memory_kib
                )));
            }
        }
        Ok(())
    }
}

/// Bounds check shared by local configs and payload-supplied KDF parameters.
pub fn validate_kdf_params(params: &KdfParams) -> QrSealResult<()> {
    match params.algorithm {
        KdfAlgorithm::Pbkdf2Sha256 => {
            if !(MIN_PBKDF2_ITERATIONS..=MAX_PBKDF2_ITERATIONS).contains(&params.iterations) {
                return Err(QrSealError::validation(format!(
                    "PBKDF2 iterations must be {MIN_PBKDF2_ITERATIONS}..={MAX_PBKDF2_ITERATIONS}, got {}",
                    params.iterations
                )));
            }
        }
        KdfAlgorithm::Argon2id => {
            if !(MIN_ARGON2_ITERATIONS..=MAX_ARGON2_ITERATIONS).contains(&params.iterations) {
                return Err(QrSealError::validation(format!(
                    "Argon2id iterations must be {MIN_ARGON2_ITERATIONS}..={MAX_ARGON2_ITERATIONS}, got {}",
                    params.iterations
                )));
            }
            if !(MIN_ARGON2_MEMORY_KIB..=MAX_ARGON2_MEMORY_KIB).contains(&params.memory_kib) {
                return Err(QrSealError::validation(format!(
                    "Argon2id memory must be {MIN_ARGON2_MEMORY_KIB}..={MAX_ARGON2_MEMORY_KIB} KiB, got {}",
                    params.memory_kib
                )));
            }
            if !(1..=MAX_PARALLELISM).contains(&params.parallelism) {
                return Err(QrSealError::validation(format!(
                    "Argon2id parallelism must be 1..={MAX_PARALLELISM}, got {}",
                    params.parallelism
                )));
            }
        }
    }
    Ok(())
}

/// Brute-force throttling for decryption attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Consecutive failures before lockout (default: 3)
    pub threshold: u32,
    /// Lockout window in seconds (default: 30)
    pub duration_secs: u64,
    /// Upper bound on tracked identities (default: 10000)
    pub max_tracked_identities: usize,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            duration_secs: 30,
            max_tracked_identities: 10_000,
        }
    }
}

impl LockoutConfig {
    pub fn validate(&self) -> QrSealResult<()> {
        if self.threshold == 0 {
            return Err(QrSealError::Config("lockout.threshold must be >= 1".into()));
        }
        if !(1..=MAX_LOCKOUT_DURATION_SECS).contains(&self.duration_secs) {
            return Err(QrSealError::Config(format!(
                "lockout.duration_secs must be 1..={MAX_LOCKOUT_DURATION_SECS}, got {}",
                self.duration_secs
            )));
        }
        if self.max_tracked_identities == 0 {
            return Err(QrSealError::Config(
                "lockout.max_tracked_identities must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Requested error-correction level (default: M)
    pub error_correction: ErrorCorrectionLevel,
}

/// Decoy ("disguise") text settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoyConfig {
    /// Default decoys handed out round-robin when the caller gives none
    pub rotation: Vec<String>,
    /// Extra words rejected in decoy text, on top of the built-in list
    pub extra_denylist: Vec<String>,
}

impl Default for DecoyConfig {
    fn default() -> Self {
        Self {
            rotation: vec![
                "欢迎访问我们的官方网站".into(),
                "Thanks for visiting! See you again soon.".into(),
                "今日特价：全场商品八折优惠".into(),
                "Scan to view today's menu".into(),
                "感谢您的支持与关注".into(),
                "Wi-Fi: ask the front desk for details".into(),
            ],
            extra_denylist: Vec::new(),
        }
    }
}
