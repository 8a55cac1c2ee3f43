//! Key derivation: password + salt → 256-bit payload key
//!
//! Argon2id is the default; PBKDF2-HMAC-SHA256 stays available for payloads
//! whose producer could not run a memory-hard KDF. Cost parameters are chosen
//! so one derivation takes hundreds of milliseconds, which is the only brake
//! on offline guessing against a leaked QR code.

use argon2::{Algorithm, Argon2, Params, Version};
use qrseal_core::{EncryptionConfig, KdfAlgorithm, QrSealError, QrSealResult};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit derived key.
///
/// Zeroized on drop. This is best-effort: the compiler may leave copies in
/// registers or moved-from stack slots.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Deterministic password stretching.
///
/// Implementations must fail on an empty password or a salt whose length
/// differs from `config.salt_length`, and must never fall back to defaults.
pub trait KeyDerivation: Send + Sync {
    fn derive(
        &self,
        password: &SecretString,
        salt: &[u8],
        config: &EncryptionConfig,
    ) -> QrSealResult<DerivedKey>;
}

/// Dispatches on `config.kdf` to Argon2id or PBKDF2.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordKdf;

impl KeyDerivation for PasswordKdf {
    fn derive(
        &self,
        password: &SecretString,
        salt: &[u8],
        config: &EncryptionConfig,
    ) -> QrSealResult<DerivedKey> {
        let password = password.expose_secret();
        if password.is_empty() {
            return Err(QrSealError::Validation("password must not be empty".into()));
        }
        config.validate()?;
        if salt.len() != config.salt_length {
            return Err(QrSealError::Validation(format!(
                "salt is {} bytes, config requires {}",
                salt.len(),
                config.salt_length
            )));
        }

        let started = std::time::Instant::now();
        let key = match config.kdf {
            KdfAlgorithm::Argon2id => derive_argon2id(password.as_bytes(), salt, config)?,
            KdfAlgorithm::Pbkdf2Sha256 => {
                derive_pbkdf2(password.as_bytes(), salt, config.iterations)
            }
        };
        tracing::debug!(
            kdf = %config.kdf,
            iterations = config.iterations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "derived payload key"
        );
        Ok(key)
    }
}

fn derive_argon2id(
    password: &[u8],
    salt: &[u8],
    config: &EncryptionConfig,
) -> QrSealResult<DerivedKey> {
    let params = Params::new(
        config.memory_cost_kib,
        config.iterations,
        config.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|_| QrSealError::Validation("invalid Argon2id cost parameters".into()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_SIZE];
    if argon2.hash_password_into(password, salt, &mut key).is_err() {
        key.zeroize();
        return Err(QrSealError::Validation(
            "Argon2id rejected the password or salt".into(),
        ));
    }
    Ok(DerivedKey::from_bytes(key))
}

fn derive_pbkdf2(password: &[u8], salt: &[u8], iterations: u32) -> DerivedKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    DerivedKey::from_bytes(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrseal_core::config::{MIN_ARGON2_MEMORY_KIB, MIN_PBKDF2_ITERATIONS};

    fn fast_argon2() -> EncryptionConfig {
        EncryptionConfig {
            iterations: 1,
            memory_cost_kib: MIN_ARGON2_MEMORY_KIB,
            parallelism: 1,
            salt_length: 16,
            ..EncryptionConfig::argon2id()
        }
    }

    fn fast_pbkdf2() -> EncryptionConfig {
        EncryptionConfig {
            iterations: MIN_PBKDF2_ITERATIONS,
            salt_length: 16,
            ..EncryptionConfig::pbkdf2()
        }
    }

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("test-passphrase-123");
        let salt = [1u8; 16];

        for config in [fast_argon2(), fast_pbkdf2()] {
            let key1 = PasswordKdf.derive(&password, &salt, &config).unwrap();
            let key2 = PasswordKdf.derive(&password, &salt, &config).unwrap();
            assert_eq!(
                key1.as_bytes(),
                key2.as_bytes(),
                "{} must be deterministic",
                config.kdf
            );
        }
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = [1u8; 16];
        let config = fast_argon2();

        let key1 = PasswordKdf
            .derive(&SecretString::from("passphrase-a"), &salt, &config)
            .unwrap();
        let key2 = PasswordKdf
            .derive(&SecretString::from("passphrase-b"), &salt, &config)
            .unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "different passwords must produce different keys"
        );
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-passphrase");
        let config = fast_pbkdf2();

        let key1 = PasswordKdf.derive(&password, &[1u8; 16], &config).unwrap();
        let key2 = PasswordKdf.derive(&password, &[2u8; 16], &config).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_algorithms_differ() {
        let password = SecretString::from("same-passphrase");
        let salt = [7u8; 16];

        let a = PasswordKdf.derive(&password, &salt, &fast_argon2()).unwrap();
        let p = PasswordKdf.derive(&password, &salt, &fast_pbkdf2()).unwrap();

        assert_ne!(a.as_bytes(), p.as_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        let result = PasswordKdf.derive(&SecretString::from(""), &[0u8; 16], &fast_pbkdf2());
        assert!(matches!(result, Err(QrSealError::Validation(_))));
    }

    #[test]
    fn test_salt_length_mismatch_rejected() {
        let result = PasswordKdf.derive(
            &SecretString::from("password"),
            &[0u8; 15],
            &fast_pbkdf2(),
        );
        assert!(matches!(result, Err(QrSealError::Validation(_))));
    }

    #[test]
    fn test_weak_config_rejected() {
        let config = EncryptionConfig {
            iterations: 10,
            ..fast_pbkdf2()
        };
        let result = PasswordKdf.derive(&SecretString::from("password"), &[0u8; 16], &config);
        assert!(result.is_err(), "under-cost PBKDF2 must not derive");
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = DerivedKey::from_bytes([0xAA; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("170"));
    }
}
