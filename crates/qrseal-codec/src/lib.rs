//! qrseal-codec: the string embedded in an encrypted QR code
//!
//! A flat JSON object with base64 binary fields. `version` is checked before
//! anything else, then `algorithm`, and only then are the binary fields
//! decoded.

pub mod capacity;
pub mod payload;

pub use capacity::{capacity, fits_capacity, select_level};
pub use payload::{
    deserialize, estimate_sealed_size, estimate_serialized_size, inspect, is_encrypted_payload,
    serialize,
};
