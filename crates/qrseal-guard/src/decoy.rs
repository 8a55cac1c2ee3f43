//! Decoy ("disguise") text
//!
//! The decoy is readable by anyone who scans the code, so it must look
//! harmless. Validation is a keyword filter: it can reject innocent text and
//! miss cleverly phrased sensitive text. It is advisory, not a boundary.

use std::sync::atomic::{AtomicUsize, Ordering};

use qrseal_core::{QrSealError, QrSealResult};

pub const MAX_DECOY_LENGTH: usize = 200;

/// Words that make a decoy look like it guards something. Matched
/// case-insensitively as substrings.
pub const BUILTIN_DENYLIST: &[&str] = &[
    "password",
    "passwd",
    "passphrase",
    "secret",
    "encrypt",
    "decrypt",
    "cipher",
    "private key",
    "confidential",
    "credential",
    "密码",
    "机密",
    "秘密",
    "加密",
    "解密",
    "私钥",
    "口令",
];

#[derive(Debug, Clone)]
pub struct DecoyValidator {
    denylist: Vec<String>,
}

impl Default for DecoyValidator {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl DecoyValidator {
    /// Built-in list plus `extra` words.
    pub fn new(extra: &[String]) -> Self {
        let denylist = BUILTIN_DENYLIST
            .iter()
            .map(|w| w.to_string())
            .chain(extra.iter().map(|w| w.trim().to_lowercase()))
            .filter(|w| !w.is_empty())
            .collect();
        Self { denylist }
    }

    pub fn validate(&self, text: &str) -> QrSealResult<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(QrSealError::Validation("decoy text must not be empty".into()));
        }
        let length = trimmed.chars().count();
        if length > MAX_DECOY_LENGTH {
            return Err(QrSealError::Validation(format!(
                "decoy text is {length} characters, limit is {MAX_DECOY_LENGTH}"
            )));
        }

        let lowered = trimmed.to_lowercase();
        if let Some(word) = self.denylist.iter().find(|w| lowered.contains(w.as_str())) {
            return Err(QrSealError::Validation(format!(
                "decoy text must not mention '{word}'"
            )));
        }
        Ok(())
    }
}

/// Validate against the built-in denylist only.
pub fn validate_decoy_text(text: &str) -> QrSealResult<()> {
    DecoyValidator::default().validate(text)
}

/// Round-robin over a fixed list of default decoys.
#[derive(Debug)]
pub struct DecoyRotation {
    entries: Vec<String>,
    cursor: AtomicUsize,
}

impl DecoyRotation {
    /// Blank entries are dropped. Returns `None` if nothing remains.
    pub fn new(entries: Vec<String>) -> Option<Self> {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if entries.is_empty() {
            return None;
        }
        Some(Self {
            entries,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn next(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.entries.len();
        &self.entries[i]
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
