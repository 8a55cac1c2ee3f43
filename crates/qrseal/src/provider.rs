//! Injected capabilities the orchestrator reads settings and default decoys from

use std::sync::RwLock;

use qrseal_core::config::DecoyConfig;
use qrseal_core::{QrSealConfig, QrSealError, QrSealResult};
use qrseal_guard::DecoyRotation;

/// Source of the current configuration.
///
/// Read on every `seal` and on every decryption of a payload that does not
/// carry its own KDF parameters, so a host can swap settings at runtime.
pub trait ConfigProvider: Send + Sync {
    fn config(&self) -> QrSealConfig;
}

/// Source of default decoy text when the caller supplies none.
pub trait DecoyTextStore: Send + Sync {
    fn next_decoy(&self) -> String;
}

/// Holds one validated config, replaceable through `update`.
#[derive(Debug)]
pub struct StaticConfigProvider {
    config: RwLock<QrSealConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: QrSealConfig) -> QrSealResult<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
        })
    }

    /// Replace the config. The old one stays in place if `config` is invalid.
    pub fn update(&self, config: QrSealConfig) -> QrSealResult<()> {
        config.validate()?;
        let mut current = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = config;
        tracing::debug!("config provider updated");
        Ok(())
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn config(&self) -> QrSealConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Round-robin over the `[decoy] rotation` list.
#[derive(Debug)]
pub struct RotatingDecoyStore {
    rotation: DecoyRotation,
}

impl RotatingDecoyStore {
    pub fn new(entries: Vec<String>) -> QrSealResult<Self> {
        let rotation = DecoyRotation::new(entries).ok_or_else(|| {
            QrSealError::Config("decoy rotation needs at least one non-empty entry".into())
        })?;
        Ok(Self { rotation })
    }

    pub fn from_config(config: &DecoyConfig) -> QrSealResult<Self> {
        Self::new(config.rotation.clone())
    }

    pub fn entries(&self) -> &[String] {
        self.rotation.entries()
    }
}

impl DecoyTextStore for RotatingDecoyStore {
    fn next_decoy(&self) -> String {
        self.rotation.next().to_string()
    }
}
