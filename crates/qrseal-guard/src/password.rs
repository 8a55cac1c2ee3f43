//! Password strength policy
//!
//! Only the minimum length blocks encryption. Longer length and character
//! classes are reported as suggestions: short shared secrets are a
//! legitimate use, and the KDF cost does the heavy lifting against guessing.

use qrseal_core::{PasswordStrengthResult, PasswordSuggestion};

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const RECOMMENDED_PASSWORD_LENGTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Hard gate, in characters
    pub min_length: usize,
    /// Advisory, in characters
    pub recommended_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            recommended_length: RECOMMENDED_PASSWORD_LENGTH,
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> PasswordStrengthResult {
        let length = password.chars().count();
        let meets_minimum = length >= self.min_length;

        let checks = [
            (
                length >= self.recommended_length,
                PasswordSuggestion::UseLongerPassword,
            ),
            (
                password.chars().any(char::is_uppercase),
                PasswordSuggestion::AddUppercase,
            ),
            (
                password.chars().any(char::is_lowercase),
                PasswordSuggestion::AddLowercase,
            ),
            (
                password.chars().any(char::is_numeric),
                PasswordSuggestion::AddDigit,
            ),
            (
                password.chars().any(|c| !c.is_alphanumeric()),
                PasswordSuggestion::AddSymbol,
            ),
        ];

        let suggestions: Vec<PasswordSuggestion> = checks
            .iter()
            .filter(|(ok, _)| !ok)
            .map(|(_, s)| *s)
            .collect();
        let satisfied = checks.len() - suggestions.len();
        let score = u8::from(meets_minimum) + satisfied as u8;

        PasswordStrengthResult {
            meets_minimum,
            score,
            suggestions,
        }
    }
}

/// Validate against the default policy.
pub fn validate_password(password: &str) -> PasswordStrengthResult {
    PasswordPolicy::default().validate(password)
}
