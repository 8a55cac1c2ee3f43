//! Cryptographically secure randomness for salts and nonces

use qrseal_core::{QrSealError, QrSealResult};
use rand::rngs::OsRng;
use rand::RngCore;

pub trait SecureRandom: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> QrSealResult<()>;

    fn bytes(&self, len: usize) -> QrSealResult<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.fill(&mut out)?;
        Ok(out)
    }
}

/// Operating-system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecureRandom;

impl SecureRandom for OsSecureRandom {
    fn fill(&self, dest: &mut [u8]) -> QrSealResult<()> {
        OsRng.try_fill_bytes(dest).map_err(|e| {
            tracing::error!("OS random source failed: {e}");
            QrSealError::Entropy
        })
    }
}
