//! Byte-mode capacity of the largest QR symbol (version 40) per
//! error-correction level. Planning estimates: the QR encoder's own limits
//! win if they disagree.

use qrseal_core::{ErrorCorrectionLevel, QrSealError, QrSealResult};

pub const CAPACITY_L: usize = 2953;
pub const CAPACITY_M: usize = 2331;
pub const CAPACITY_Q: usize = 1663;
pub const CAPACITY_H: usize = 1273;

pub fn capacity(level: ErrorCorrectionLevel) -> usize {
    match level {
        ErrorCorrectionLevel::L => CAPACITY_L,
        ErrorCorrectionLevel::M => CAPACITY_M,
        ErrorCorrectionLevel::Q => CAPACITY_Q,
        ErrorCorrectionLevel::H => CAPACITY_H,
    }
}

pub fn fits_capacity(raw: &str, level: ErrorCorrectionLevel) -> bool {
    raw.len() <= capacity(level)
}

/// Strongest level at or below `requested` that holds `size` bytes.
///
/// Falls back toward L rather than failing; only a payload too large even
/// for L is an error.
pub fn select_level(
    size: usize,
    requested: ErrorCorrectionLevel,
) -> QrSealResult<ErrorCorrectionLevel> {
    let mut level = Some(requested);
    while let Some(current) = level {
        if size <= capacity(current) {
            if current != requested {
                tracing::debug!(
                    size,
                    requested = %requested,
                    chosen = %current,
                    "payload too large for requested error correction, falling back"
                );
            }
            return Ok(current);
        }
        level = current.weaker();
    }

    Err(QrSealError::CapacityExceeded {
        size,
        limit: CAPACITY_L,
        overage: size - CAPACITY_L,
    })
}
