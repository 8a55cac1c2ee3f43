//! AES-256-GCM encryption with a detached authentication tag
//!
//! Payload layout on the wire keeps the tag separate from the ciphertext:
//! ```text
//! iv: 12 or 16 random bytes   ciphertext: len(plaintext)   tag: 16 bytes
//! ```
//! 96-bit nonces use the standard GCM counter setup; 128-bit nonces go
//! through GHASH as GCM specifies for non-96-bit IVs.

use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{consts::U16, AeadCore, AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm};
use qrseal_core::{CipherAlgorithm, QrSealError, QrSealResult};
use zeroize::Zeroizing;

use crate::kdf::DerivedKey;
use crate::TAG_SIZE;

/// AES-256-GCM instantiated for 128-bit nonces
type Aes256Gcm128 = AesGcm<Aes256, U16>;

/// Ciphertext and its detached tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Authenticated encryption.
///
/// `decrypt` is all-or-nothing: the tag is verified before any plaintext is
/// produced, and failure yields `WrongPasswordOrTampered` with no output.
/// Nonces are supplied by the caller and must be fresh random bytes for
/// every `encrypt`.
pub trait AeadCipher: Send + Sync {
    fn algorithm(&self) -> CipherAlgorithm;

    fn encrypt(&self, key: &DerivedKey, nonce: &[u8], plaintext: &[u8])
        -> QrSealResult<SealedBox>;

    fn decrypt(
        &self,
        key: &DerivedKey,
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> QrSealResult<Zeroizing<Vec<u8>>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

impl AeadCipher for AesGcmCipher {
    fn algorithm(&self) -> CipherAlgorithm {
        CipherAlgorithm::Aes256Gcm
    }

    fn encrypt(
        &self,
        key: &DerivedKey,
        nonce: &[u8],
        plaintext: &[u8],
    ) -> QrSealResult<SealedBox> {
        match nonce.len() {
            12 => seal_detached::<Aes256Gcm>(key, nonce, plaintext),
            16 => seal_detached::<Aes256Gcm128>(key, nonce, plaintext),
            n => Err(unsupported_nonce(n)),
        }
    }

    fn decrypt(
        &self,
        key: &DerivedKey,
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> QrSealResult<Zeroizing<Vec<u8>>> {
        match nonce.len() {
            12 => open_detached::<Aes256Gcm>(key, nonce, ciphertext, tag),
            16 => open_detached::<Aes256Gcm128>(key, nonce, ciphertext, tag),
            n => Err(unsupported_nonce(n)),
        }
    }
}

fn unsupported_nonce(len: usize) -> QrSealError {
    QrSealError::Validation(format!("nonce must be 12 or 16 bytes, got {len}"))
}

fn seal_detached<C>(key: &DerivedKey, nonce: &[u8], plaintext: &[u8]) -> QrSealResult<SealedBox>
where
    C: AeadInPlace + KeyInit,
{
    debug_assert_eq!(nonce.len(), C::NonceSize::USIZE);
    let cipher = C::new_from_slice(key.as_bytes())
        .map_err(|_| QrSealError::Validation("invalid key length".into()))?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), &[], &mut buffer)
        .map_err(|_| QrSealError::Validation("plaintext too large for AES-GCM".into()))?;

    Ok(SealedBox {
        ciphertext: buffer,
        tag: tag.to_vec(),
    })
}

fn open_detached<C>(
    key: &DerivedKey,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> QrSealResult<Zeroizing<Vec<u8>>>
where
    C: AeadInPlace + KeyInit,
{
    if tag.len() != TAG_SIZE || tag.len() != <C as AeadCore>::TagSize::USIZE {
        return Err(QrSealError::Malformed(format!(
            "authentication tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }
    let cipher = C::new_from_slice(key.as_bytes())
        .map_err(|_| QrSealError::Validation("invalid key length".into()))?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            &[],
            buffer.as_mut_slice(),
            GenericArray::from_slice(tag),
        )
        .map_err(|_| QrSealError::WrongPasswordOrTampered)?;

    Ok(buffer)
}
