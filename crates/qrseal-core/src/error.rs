use thiserror::Error;

pub type QrSealResult<T> = Result<T, QrSealError>;

/// Every failure the sealing pipeline can report.
///
/// Messages are fixed strings or caller-supplied context; errors raised by the
/// underlying cipher/KDF crates are mapped onto these variants and their text
/// is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrSealError {
    /// Bad config, password, decoy text or plaintext. Fixable by the caller.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Authenticated decryption cannot tell these two apart.
    #[error("wrong password or the payload has been tampered with")]
    WrongPasswordOrTampered,

    #[error("too many failed attempts, retry in {retry_after_seconds}s")]
    Locked { retry_after_seconds: u64 },

    #[error("payload is {size} bytes, {overage} bytes over the {limit}-byte QR limit")]
    CapacityExceeded {
        size: usize,
        limit: usize,
        overage: usize,
    },

    #[error("secure random source unavailable")]
    Entropy,

    #[error("config error: {0}")]
    Config(String),

    #[error("background task was cancelled")]
    Cancelled,
}

impl QrSealError {
    /// Whether retrying (with another password, or later) can succeed.
    ///
    /// Payload-level problems are permanent: no password will make a
    /// malformed or unsupported payload decrypt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QrSealError::WrongPasswordOrTampered | QrSealError::Locked { .. }
        )
    }

    /// True for errors caused by the scanned payload itself.
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            QrSealError::Malformed(_)
                | QrSealError::UnsupportedVersion(_)
                | QrSealError::UnsupportedAlgorithm(_)
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        QrSealError::Validation(msg.into())
    }
}
