//! qrseal-crypto: primitives behind an encrypted QR payload
//!
//! ```text
//! password ──(Argon2id | PBKDF2-HMAC-SHA256, salt)──▶ 256-bit key
//! key + random nonce + plaintext ──AES-256-GCM──▶ ciphertext, 128-bit tag
//! ```
//!
//! Each primitive sits behind a trait (`SecureRandom`, `KeyDerivation`,
//! `AeadCipher`) so the orchestration layer can be driven by another
//! platform's crypto or by deterministic fakes in tests.

pub mod aead;
pub mod kdf;
pub mod random;

pub use aead::{AeadCipher, AesGcmCipher, SealedBox};
pub use kdf::{DerivedKey, KeyDerivation, PasswordKdf};
pub use random::{OsSecureRandom, SecureRandom};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
