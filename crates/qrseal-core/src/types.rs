use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only payload format version this build reads and writes.
pub const PAYLOAD_VERSION: &str = "1.0";

/// Authenticated cipher used for the payload body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherAlgorithm {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl CipherAlgorithm {
    pub const ALL: &'static [CipherAlgorithm] = &[CipherAlgorithm::Aes256Gcm];

    /// Identifier written into the `algorithm` field.
    pub fn id(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes256Gcm => "AES-256-GCM",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.id() == id)
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Password stretching function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    /// Memory-hard, preferred for new payloads.
    #[serde(rename = "Argon2id")]
    Argon2id,
    /// PBKDF2-HMAC-SHA256, kept for payloads produced without Argon2id.
    #[serde(rename = "PBKDF2-SHA256")]
    Pbkdf2Sha256,
}

impl KdfAlgorithm {
    pub fn id(&self) -> &'static str {
        match self {
            KdfAlgorithm::Argon2id => "Argon2id",
            KdfAlgorithm::Pbkdf2Sha256 => "PBKDF2-SHA256",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        [KdfAlgorithm::Argon2id, KdfAlgorithm::Pbkdf2Sha256]
            .into_iter()
            .find(|k| k.id() == id)
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// KDF cost parameters as carried inside a payload.
///
/// `memory_kib` and `parallelism` only apply to Argon2id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    pub iterations: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}

/// QR error-correction level, ordered from weakest (L) to strongest (H).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ErrorCorrectionLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl ErrorCorrectionLevel {
    /// Strongest first.
    pub const BY_STRENGTH_DESC: [ErrorCorrectionLevel; 4] = [
        ErrorCorrectionLevel::H,
        ErrorCorrectionLevel::Q,
        ErrorCorrectionLevel::M,
        ErrorCorrectionLevel::L,
    ];

    /// Next weaker level (more data capacity), if any.
    pub fn weaker(&self) -> Option<Self> {
        match self {
            ErrorCorrectionLevel::H => Some(ErrorCorrectionLevel::Q),
            ErrorCorrectionLevel::Q => Some(ErrorCorrectionLevel::M),
            ErrorCorrectionLevel::M => Some(ErrorCorrectionLevel::L),
            ErrorCorrectionLevel::L => None,
        }
    }
}

impl fmt::Display for ErrorCorrectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCorrectionLevel::L => "L",
            ErrorCorrectionLevel::M => "M",
            ErrorCorrectionLevel::Q => "Q",
            ErrorCorrectionLevel::H => "H",
        };
        f.write_str(s)
    }
}

/// Decoded form of the string embedded in an encrypted QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub version: String,
    pub algorithm: CipherAlgorithm,
    /// `None` for payloads written without KDF parameters; the reader's
    /// configured KDF applies to those.
    pub kdf: Option<KdfParams>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    /// Ciphertext, with the GCM tag appended when `tag` is `None`.
    pub ciphertext: Vec<u8>,
    pub tag: Option<Vec<u8>>,
    pub decoy_text: String,
}

/// Why a decryption attempt produced no plaintext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureReason {
    WrongPasswordOrTampered { remaining_attempts: u32 },
    Malformed,
    UnsupportedVersion,
    UnsupportedAlgorithm,
    Locked { retry_after_seconds: u64 },
}

impl FailureReason {
    /// Message safe to show an end user. Wrong password and corrupted data
    /// share one message.
    pub fn user_message(&self) -> String {
        match self {
            FailureReason::WrongPasswordOrTampered { remaining_attempts } => format!(
                "Wrong password or damaged QR code ({remaining_attempts} attempts left)"
            ),
            FailureReason::Malformed => "This QR code does not contain an encrypted payload".into(),
            FailureReason::UnsupportedVersion => {
                "This QR code was created by an unsupported version".into()
            }
            FailureReason::UnsupportedAlgorithm => {
                "This QR code uses an unsupported encryption algorithm".into()
            }
            FailureReason::Locked {
                retry_after_seconds,
            } => format!("Too many failed attempts, try again in {retry_after_seconds}s"),
        }
    }
}

/// Result of `decrypt_qr_payload`. Plaintext exists only on success.
#[derive(Debug)]
pub enum DecryptionOutcome {
    Success {
        plaintext: SecretString,
        decoy_text: String,
    },
    Failure {
        reason: FailureReason,
    },
}

impl DecryptionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DecryptionOutcome::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            DecryptionOutcome::Success { .. } => None,
            DecryptionOutcome::Failure { reason } => Some(*reason),
        }
    }
}

/// Per-identity failure bookkeeping owned by the lockout guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub consecutive_failures: u32,
    /// Unix milliseconds
    pub last_failure_at: u64,
    /// Unix milliseconds
    pub locked_until: Option<u64>,
    /// Attempts admitted by the gate whose outcome is not recorded yet
    pub in_flight: u32,
}

/// Answer from the lockout guard before a decryption attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutStatus {
    pub allowed: bool,
    /// Zero while allowed.
    pub retry_after_seconds: u64,
    /// Failures left before lockout. Zero while locked.
    pub remaining_attempts: u32,
}

/// Non-blocking password improvements, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSuggestion {
    UseLongerPassword,
    AddUppercase,
    AddLowercase,
    AddDigit,
    AddSymbol,
}

impl fmt::Display for PasswordSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PasswordSuggestion::UseLongerPassword => "use at least 12 characters",
            PasswordSuggestion::AddUppercase => "add an uppercase letter",
            PasswordSuggestion::AddLowercase => "add a lowercase letter",
            PasswordSuggestion::AddDigit => "add a digit",
            PasswordSuggestion::AddSymbol => "add a symbol",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordStrengthResult {
    /// Hard gate. `false` blocks encryption.
    pub meets_minimum: bool,
    /// 0..=PasswordStrengthResult::MAX_SCORE
    pub score: u8,
    pub suggestions: Vec<PasswordSuggestion>,
}

impl PasswordStrengthResult {
    pub const MAX_SCORE: u8 = 6;
}

/// Password-free view of a scanned QR string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadInfo {
    pub is_encrypted: bool,
    pub version: Option<String>,
    pub algorithm: Option<String>,
    pub decoy_text: Option<String>,
    pub byte_size: usize,
}

/// A serialized payload ready for the QR encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedQrPayload {
    pub payload: String,
    /// Level the payload fits at; may be weaker than `requested_level`.
    pub error_correction: ErrorCorrectionLevel,
    pub requested_level: ErrorCorrectionLevel,
    pub byte_size: usize,
}

impl SealedQrPayload {
    pub fn fell_back(&self) -> bool {
        self.error_correction != self.requested_level
    }
}
