//! Core constants for PIN generation and keypad sequencing.
//!
//! These values describe the keypad of the device under test (DUT) and the
//! limits the generator enforces. Channel names produced here (`key0`..`key9`,
//! `unlock`) are the logical output names the hardware crate drives.
//!
//! # Usage
//!
//! ```
//! use lockbench_core::constants::*;
//!
//! fn length_allowed(length: usize) -> bool {
//!     (MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&length)
//! }
//!
//! assert!(length_allowed(6));
//! assert!(!length_allowed(17));
//! ```

// ============================================================================
// PIN Length Limits
// ============================================================================

/// Shortest PIN the generator will produce as a valid PIN.
pub const MIN_PIN_LENGTH: usize = 2;

/// Longest PIN the generator will produce as a valid PIN.
pub const MAX_PIN_LENGTH: usize = 16;

/// Shortest run accepted for a sequential invalid PIN.
pub const MIN_SEQUENTIAL_LENGTH: usize = 2;

/// Longest run accepted for a sequential invalid PIN.
///
/// A run cannot be longer than the ten decimal digits.
pub const MAX_SEQUENTIAL_LENGTH: usize = 10;

/// Number of random draws attempted before valid generation gives up.
pub const MAX_GENERATION_ATTEMPTS: usize = 500;

// ============================================================================
// Classification
// ============================================================================

/// Every decimal digit in ascending order.
pub const ASCENDING_DIGITS: &str = "0123456789";

/// Every decimal digit in descending order.
pub const DESCENDING_DIGITS: &str = "9876543210";

/// Reason reported for a PIN equal to the DUT's self-destruct PIN.
pub const REASON_SELF_DESTRUCT: &str = "matches Self-Destruct PIN";

/// Reason reported for a PIN whose digits are all identical.
pub const REASON_REPEATING: &str = "is repeating";

/// Reason reported for a PIN read from the ascending or descending digit run.
pub const REASON_SEQUENTIAL: &str = "is sequential";

/// Reason reported for a PIN that passes every rule.
pub const REASON_VALID: &str = "is valid";

// ============================================================================
// Keypad Channel Names
// ============================================================================

/// Prefix of the logical output name for a digit key (`key0`..`key9`).
pub const KEY_PREFIX: &str = "key";

/// Logical output name pressed after the digits to submit a PIN.
pub const UNLOCK_KEY: &str = "unlock";
