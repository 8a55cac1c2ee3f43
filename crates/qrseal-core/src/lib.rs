pub mod config;
pub mod error;
pub mod types;

pub use config::{EncryptionConfig, LockoutConfig, QrSealConfig};
pub use error::{QrSealError, QrSealResult};
pub use types::{
    CipherAlgorithm, DecryptionOutcome, EncryptedPayload, ErrorCorrectionLevel, FailureReason,
    FailureRecord, KdfAlgorithm, KdfParams, LockoutStatus, PasswordStrengthResult,
    PasswordSuggestion, PayloadInfo, SealedQrPayload, PAYLOAD_VERSION,
};
