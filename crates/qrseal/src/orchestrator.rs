//! Encrypt/decrypt pipeline for QR payloads
//!
//! Sealing: password gate → decoy check → fresh salt + nonce → KDF → AES-GCM
//! → serialize → error-correction level selection.
//!
//! Opening: lockout gate → parse → KDF cost ceiling → KDF → AES-GCM. Only a failed
//! authentication counts toward the lockout; a payload that does not parse
//! means the user scanned the wrong kind of code, not that they guessed.

use std::sync::Arc;

use qrseal_codec::{self as codec, select_level};
use qrseal_core::{
    CipherAlgorithm, DecryptionOutcome, EncryptedPayload, EncryptionConfig,
    ErrorCorrectionLevel, FailureReason, LockoutStatus, PasswordStrengthResult, PayloadInfo,
    QrSealConfig, QrSealError, QrSealResult, SealedQrPayload, PAYLOAD_VERSION,
};
use qrseal_crypto::{
    AeadCipher, AesGcmCipher, KeyDerivation, OsSecureRandom, PasswordKdf, SecureRandom,
    TAG_SIZE,
};
use qrseal_guard::{Clock, DecoyValidator, LockoutGuard, PasswordPolicy, SystemClock};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::provider::{ConfigProvider, DecoyTextStore, RotatingDecoyStore, StaticConfigProvider};

/// Front door for sealing and opening payloads.
///
/// Holds no global state: every collaborator is injected, and the lockout map
/// belongs to this instance. Share it behind an `Arc` to use the async entry
/// points.
pub struct EncryptionOrchestrator {
    kdf: Arc<dyn KeyDerivation>,
    cipher: Arc<dyn AeadCipher>,
    rng: Arc<dyn SecureRandom>,
    config: Arc<dyn ConfigProvider>,
    decoys: Arc<dyn DecoyTextStore>,
    password_policy: PasswordPolicy,
    decoy_validator: DecoyValidator,
    lockout: LockoutGuard,
}

/// Collaborators not set here fall back to the production implementations.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: QrSealConfig,
    config_provider: Option<Arc<dyn ConfigProvider>>,
    decoys: Option<Arc<dyn DecoyTextStore>>,
    kdf: Option<Arc<dyn KeyDerivation>>,
    cipher: Option<Arc<dyn AeadCipher>>,
    rng: Option<Arc<dyn SecureRandom>>,
    clock: Option<Arc<dyn Clock>>,
    password_policy: PasswordPolicy,
}

impl OrchestratorBuilder {
    /// Used when no `config_provider` is given.
    pub fn config(mut self, config: QrSealConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.config_provider = Some(provider);
        self
    }

    pub fn decoy_store(mut self, store: Arc<dyn DecoyTextStore>) -> Self {
        self.decoys = Some(store);
        self
    }

    pub fn kdf(mut self, kdf: Arc<dyn KeyDerivation>) -> Self {
        self.kdf = Some(kdf);
        self
    }

    pub fn cipher(mut self, cipher: Arc<dyn AeadCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn rng(mut self, rng: Arc<dyn SecureRandom>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    /// Lockout and denylist settings are taken from the provider's config at
    /// this point and fixed for the orchestrator's lifetime.
    pub fn build(self) -> QrSealResult<EncryptionOrchestrator> {
        let provider: Arc<dyn ConfigProvider> = match self.config_provider {
            Some(provider) => provider,
            None => Arc::new(StaticConfigProvider::new(self.config)?),
        };
        let startup = provider.config();
        startup.validate()?;

        let decoys: Arc<dyn DecoyTextStore> = match self.decoys {
            Some(store) => store,
            None => Arc::new(RotatingDecoyStore::from_config(&startup.decoy)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(EncryptionOrchestrator {
            kdf: self.kdf.unwrap_or_else(|| Arc::new(PasswordKdf)),
            cipher: self.cipher.unwrap_or_else(|| Arc::new(AesGcmCipher)),
            rng: self.rng.unwrap_or_else(|| Arc::new(OsSecureRandom)),
            config: provider,
            decoys,
            password_policy: self.password_policy,
            decoy_validator: DecoyValidator::new(&startup.decoy.extra_denylist),
            lockout: LockoutGuard::with_clock(startup.lockout, clock),
        })
    }
}

impl EncryptionOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Production collaborators over a fixed config.
    pub fn new(config: QrSealConfig) -> QrSealResult<Self> {
        Self::builder().config(config).build()
    }

    // ── Sealing ──────────────────────────────────────────────────────────

    /// Encrypt `plaintext` into a payload string sized for a QR code.
    ///
    /// `decoy_text` defaults to the next entry of the decoy store. The
    /// returned level is `level` or the strongest weaker level the payload
    /// fits at.
    pub fn create_encrypted_qr_payload(
        &self,
        plaintext: &str,
        password: &SecretString,
        decoy_text: Option<&str>,
        config: &EncryptionConfig,
        level: ErrorCorrectionLevel,
    ) -> QrSealResult<SealedQrPayload> {
        if !self
            .password_policy
            .validate(password.expose_secret())
            .meets_minimum
        {
            return Err(QrSealError::Validation(format!(
                "password must be at least {} characters",
                self.password_policy.min_length
            )));
        }
        if plaintext.is_empty() {
            return Err(QrSealError::Validation("plaintext must not be empty".into()));
        }
        config.validate()?;
        if config.algorithm != self.cipher.algorithm() {
            return Err(QrSealError::Validation(format!(
                "configured algorithm {} is not available",
                config.algorithm
            )));
        }

        let decoy_text = match decoy_text {
            Some(text) => text.trim().to_string(),
            None => self.decoys.next_decoy(),
        };
        self.decoy_validator.validate(&decoy_text)?;

        // Fail before the slow KDF when nothing could hold the result.
        select_level(
            codec::estimate_sealed_size(plaintext.len(), &decoy_text, config)?,
            level,
        )?;

        let salt = self.rng.bytes(config.salt_length)?;
        let nonce = self.rng.bytes(config.nonce_length)?;
        let key = self.kdf.derive(password, &salt, config)?;
        let sealed = self.cipher.encrypt(&key, &nonce, plaintext.as_bytes())?;

        let payload = EncryptedPayload {
            version: PAYLOAD_VERSION.to_string(),
            algorithm: config.algorithm,
            kdf: Some(config.kdf_params()),
            salt,
            nonce,
            ciphertext: sealed.ciphertext,
            tag: Some(sealed.tag),
            decoy_text,
        };
        let raw = codec::serialize(&payload)?;
        let byte_size = raw.len();
        let chosen = select_level(byte_size, level)?;

        tracing::debug!(
            size = byte_size,
            level = %chosen,
            kdf = %config.kdf,
            "sealed payload"
        );
        Ok(SealedQrPayload {
            payload: raw,
            error_correction: chosen,
            requested_level: level,
            byte_size,
        })
    }

    /// `create_encrypted_qr_payload` with the provider's encryption config
    /// and error-correction level.
    pub fn seal(
        &self,
        plaintext: &str,
        password: &SecretString,
        decoy_text: Option<&str>,
    ) -> QrSealResult<SealedQrPayload> {
        let config = self.config.config();
        self.create_encrypted_qr_payload(
            plaintext,
            password,
            decoy_text,
            &config.encryption,
            config.qr.error_correction,
        )
    }

    // ── Opening ──────────────────────────────────────────────────────────

    /// Decrypt a scanned payload on behalf of `identity`.
    ///
    /// Never returns plaintext on failure. Wrong password and tampered data
    /// are reported identically.
    pub fn decrypt_qr_payload(
        &self,
        raw: &str,
        password: &SecretString,
        identity: &str,
    ) -> DecryptionOutcome {
        // Held until the outcome is known; dropping it unsettled frees the slot.
        let attempt = match self.lockout.begin_attempt(identity) {
            Ok(attempt) => attempt,
            Err(gate) => {
                tracing::debug!(identity, retry_after = gate.retry_after_seconds, "attempt while locked");
                return DecryptionOutcome::Failure {
                    reason: FailureReason::Locked {
                        retry_after_seconds: gate.retry_after_seconds,
                    },
                };
            }
        };

        let payload = match codec::deserialize(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(identity, error = %e, "rejected payload before decryption");
                return DecryptionOutcome::Failure {
                    reason: payload_failure(&e),
                };
            }
        };
        if payload.algorithm != self.cipher.algorithm() {
            return DecryptionOutcome::Failure {
                reason: FailureReason::UnsupportedAlgorithm,
            };
        }
        if let Some(params) = &payload.kdf {
            if let Err(e) = self.config.config().encryption.check_payload_kdf(params) {
                tracing::debug!(identity, error = %e, "payload KDF cost over the local ceiling");
                return DecryptionOutcome::Failure {
                    reason: payload_failure(&e),
                };
            }
        }

        match self.open(&payload, password) {
            Ok(bytes) => {
                attempt.succeeded();
                // Authentic but not text: the password was right, the producer was not.
                let Ok(text) = std::str::from_utf8(&bytes) else {
                    tracing::debug!(identity, "decrypted payload is not UTF-8 text");
                    return DecryptionOutcome::Failure {
                        reason: FailureReason::Malformed,
                    };
                };
                tracing::info!(identity, "payload unlocked");
                DecryptionOutcome::Success {
                    plaintext: SecretString::from(text.to_string()),
                    decoy_text: payload.decoy_text,
                }
            }
            Err(QrSealError::WrongPasswordOrTampered) => {
                let status = attempt.failed();
                DecryptionOutcome::Failure {
                    reason: FailureReason::WrongPasswordOrTampered {
                        remaining_attempts: status.remaining_attempts,
                    },
                }
            }
            Err(e) => {
                tracing::debug!(identity, error = %e, "payload failed structural checks");
                DecryptionOutcome::Failure {
                    reason: payload_failure(&e),
                }
            }
        }
    }

    /// KDF + authenticated decryption. Every failure a password guess can
    /// cause comes back as `WrongPasswordOrTampered`; a KDF that rejects the
    /// payload's own parameters makes it `Malformed`.
    fn open(
        &self,
        payload: &EncryptedPayload,
        password: &SecretString,
    ) -> QrSealResult<Zeroizing<Vec<u8>>> {
        let config = self.payload_config(payload);

        let (ciphertext, tag) = match &payload.tag {
            Some(tag) => (payload.ciphertext.as_slice(), tag.as_slice()),
            None => {
                let split = payload
                    .ciphertext
                    .len()
                    .checked_sub(TAG_SIZE)
                    .ok_or_else(|| QrSealError::Malformed("ciphertext shorter than tag".into()))?;
                payload.ciphertext.split_at(split)
            }
        };

        // An empty password is still a guess.
        if password.expose_secret().is_empty() {
            return Err(QrSealError::WrongPasswordOrTampered);
        }
        let key = self
            .kdf
            .derive(password, &payload.salt, &config)
            .map_err(|e| QrSealError::Malformed(format!("key derivation rejected payload: {e}")))?;
        self.cipher.decrypt(&key, &payload.nonce, ciphertext, tag)
    }

    /// Settings the payload was sealed with. Payloads without KDF parameters
    /// use the configured KDF.
    fn payload_config(&self, payload: &EncryptedPayload) -> EncryptionConfig {
        let base = self.config.config().encryption;
        let mut config = match payload.kdf {
            Some(params) => base.with_kdf_params(params),
            None => base,
        };
        config.algorithm = payload.algorithm;
        config.salt_length = payload.salt.len();
        config.nonce_length = payload.nonce.len();
        config
    }

    // ── Inspection and helpers ───────────────────────────────────────────

    /// Metadata for a scanned string. No password, no lockout interaction.
    pub fn peek_payload_info(&self, raw: &str) -> PayloadInfo {
        codec::inspect(raw)
    }

    pub fn validate_password(&self, password: &str) -> PasswordStrengthResult {
        self.password_policy.validate(password)
    }

    pub fn validate_decoy_text(&self, text: &str) -> QrSealResult<()> {
        self.decoy_validator.validate(text)
    }

    pub fn estimate_serialized_size(&self, payload: &EncryptedPayload) -> QrSealResult<usize> {
        codec::estimate_serialized_size(payload)
    }

    /// Exact payload size for `plaintext` before running the KDF.
    pub fn estimate_sealed_size(
        &self,
        plaintext: &str,
        decoy_text: &str,
        config: &EncryptionConfig,
    ) -> QrSealResult<usize> {
        codec::estimate_sealed_size(plaintext.len(), decoy_text.trim(), config)
    }

    pub fn supported_algorithms(&self) -> Vec<&'static str> {
        CipherAlgorithm::ALL.iter().map(CipherAlgorithm::id).collect()
    }

    /// Read-only; does not clear an elapsed lockout.
    pub fn lockout_status(&self, identity: &str) -> LockoutStatus {
        self.lockout.status(identity)
    }

    // ── Async entry points ───────────────────────────────────────────────

    /// Runs `create_encrypted_qr_payload` on the blocking pool.
    pub async fn create_encrypted_qr_payload_async(
        self: &Arc<Self>,
        plaintext: String,
        password: SecretString,
        decoy_text: Option<String>,
        config: EncryptionConfig,
        level: ErrorCorrectionLevel,
    ) -> QrSealResult<SealedQrPayload> {
        let this = Arc::clone(self);
        let plaintext = Zeroizing::new(plaintext);
        run_blocking(move || {
            this.create_encrypted_qr_payload(
                &plaintext,
                &password,
                decoy_text.as_deref(),
                &config,
                level,
            )
        })
        .await?
    }

    /// Runs `decrypt_qr_payload` on the blocking pool.
    pub async fn decrypt_qr_payload_async(
        self: &Arc<Self>,
        raw: String,
        password: SecretString,
        identity: String,
    ) -> QrSealResult<DecryptionOutcome> {
        let this = Arc::clone(self);
        run_blocking(move || this.decrypt_qr_payload(&raw, &password, &identity)).await
    }
}

async fn run_blocking<T, F>(f: F) -> QrSealResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(QrSealError::Cancelled),
    }
}

fn payload_failure(err: &QrSealError) -> FailureReason {
    match err {
        QrSealError::UnsupportedVersion(_) => FailureReason::UnsupportedVersion,
        QrSealError::UnsupportedAlgorithm(_) => FailureReason::UnsupportedAlgorithm,
        _ => FailureReason::Malformed,
    }
}
