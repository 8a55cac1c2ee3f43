//! qrseal: password-sealed QR payloads
//!
//! A payload carries a harmless-looking decoy text that any scanner shows,
//! plus AES-256-GCM ciphertext only the password holder can open:
//!
//! ```text
//! plaintext + password ──seal──▶ {"version","algorithm","kdf",…,"disguise"} ──▶ QR
//! QR ──scan──▶ payload ──lockout gate──▶ KDF ──▶ AES-GCM ──▶ plaintext
//! ```
//!
//! `EncryptionOrchestrator` is the entry point.

pub mod orchestrator;
pub mod provider;
pub mod render;

pub use orchestrator::{EncryptionOrchestrator, OrchestratorBuilder};
pub use provider::{ConfigProvider, DecoyTextStore, RotatingDecoyStore, StaticConfigProvider};
pub use render::{ModuleEncoder, QrDecode, QrEncode, QrMatrix};

pub use qrseal_core::{
    DecryptionOutcome, EncryptionConfig, ErrorCorrectionLevel, FailureReason, LockoutStatus,
    PasswordStrengthResult, PayloadInfo, QrSealConfig, QrSealError, QrSealResult,
    SealedQrPayload,
};
