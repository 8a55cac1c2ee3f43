//! qrseal-guard: checks that sit in front of the crypto
//!
//! - `password`: the single hard length gate plus advisory suggestions
//! - `decoy`: keeps the public decoy text from looking sensitive
//! - `lockout`: per-identity failure counting, attempt reservation and timed lockout

pub mod clock;
pub mod decoy;
pub mod lockout;
pub mod password;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decoy::{validate_decoy_text, DecoyRotation, DecoyValidator};
pub use lockout::{Attempt, LockoutGuard};
pub use password::{validate_password, PasswordPolicy};
