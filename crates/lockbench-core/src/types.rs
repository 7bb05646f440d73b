use crate::{
    Result,
    constants::{
        ASCENDING_DIGITS, DESCENDING_DIGITS, KEY_PREFIX, REASON_REPEATING, REASON_SELF_DESTRUCT,
        REASON_SEQUENTIAL, REASON_VALID, UNLOCK_KEY,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of checking a PIN against the DUT rules.
///
/// The variants are listed in evaluation order: a PIN matching the
/// self-destruct PIN reports `SelfDestruct` even if it is also repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinValidity {
    /// PIN passes every rule.
    Valid,
    /// PIN equals the self-destruct PIN currently configured on the DUT.
    SelfDestruct,
    /// Every digit of the PIN is the same.
    Repeating,
    /// PIN is a contiguous part of the ascending or descending digit run.
    Sequential,
}

impl PinValidity {
    /// Classify `pin` against the rules, given the DUT's current self-destruct PIN.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockbench_core::PinValidity;
    ///
    /// assert_eq!(PinValidity::classify("1234", Some("1234")), PinValidity::SelfDestruct);
    /// assert_eq!(PinValidity::classify("7777", Some("1234")), PinValidity::Repeating);
    /// assert_eq!(PinValidity::classify("4716", Some("1234")), PinValidity::Valid);
    /// ```
    #[must_use]
    pub fn classify(pin: &str, self_destruct_pin: Option<&str>) -> Self {
        if let Some(sdp) = self_destruct_pin
            && !sdp.is_empty()
            && sdp == pin
        {
            return Self::SelfDestruct;
        }

        let mut chars = pin.chars();
        if let Some(first) = chars.next()
            && chars.all(|c| c == first)
        {
            return Self::Repeating;
        }

        if ASCENDING_DIGITS.contains(pin) || DESCENDING_DIGITS.contains(pin) {
            return Self::Sequential;
        }

        Self::Valid
    }

    /// Whether the PIN was rejected by any rule.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        !matches!(self, Self::Valid)
    }

    /// Human-readable classification reason.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Valid => REASON_VALID,
            Self::SelfDestruct => REASON_SELF_DESTRUCT,
            Self::Repeating => REASON_REPEATING,
            Self::Sequential => REASON_SEQUENTIAL,
        }
    }
}

impl fmt::Display for PinValidity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Structured description of a PIN ready to be keyed into the DUT.
///
/// Field names follow the JSON shape consumed by the test scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDescriptor {
    /// The PIN digits.
    pub string: String,

    /// Key-press names, one `key<d>` per digit, terminated by `unlock`.
    pub sequence: Vec<String>,

    /// Number of digits.
    pub digit: usize,

    /// Whether the PIN passed classification.
    pub valid: bool,

    /// Classification reason (e.g. "is valid", "is repeating").
    pub reason: String,

    /// How many times each key name occurs in `sequence`.
    pub keypress: BTreeMap<String, usize>,
}

impl PinDescriptor {
    /// Classify `pin` and assemble its descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockbench_core::PinDescriptor;
    ///
    /// let info = PinDescriptor::describe("4291", None);
    /// assert!(info.valid);
    /// assert_eq!(info.sequence, ["key4", "key2", "key9", "key1", "unlock"]);
    /// assert_eq!(info.keypress["unlock"], 1);
    /// ```
    #[must_use]
    pub fn describe(pin: &str, self_destruct_pin: Option<&str>) -> Self {
        Self::with_validity(pin, PinValidity::classify(pin, self_destruct_pin))
    }

    pub(crate) fn with_validity(pin: &str, validity: PinValidity) -> Self {
        let sequence: Vec<String> = pin
            .chars()
            .map(key_name)
            .chain(std::iter::once(UNLOCK_KEY.to_string()))
            .collect();

        let mut keypress = BTreeMap::new();
        for key in &sequence {
            *keypress.entry(key.clone()).or_insert(0) += 1;
        }

        Self {
            string: pin.to_string(),
            digit: pin.chars().count(),
            valid: !validity.is_invalid(),
            reason: validity.reason().to_string(),
            sequence,
            keypress,
        }
    }
}

/// Logical output name of the keypad key for `digit`.
#[must_use]
pub fn key_name(digit: char) -> String {
    format!("{KEY_PREFIX}{digit}")
}

/// Kind of deliberately invalid PIN to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidPinKind {
    /// One digit repeated `length` times.
    Repeating,
    /// Consecutive ascending or descending digits.
    Sequential,
}

impl fmt::Display for InvalidPinKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Repeating => write!(f, "repeating"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

impl std::str::FromStr for InvalidPinKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "repeating" => Ok(Self::Repeating),
            "sequential" => Ok(Self::Sequential),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}

/// Direction of a sequential run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunDirection {
    Ascending,
    Descending,
}

/// Options for invalid PIN generation.
///
/// `direction` only applies to sequential PINs; `None` picks one at random.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidPinOptions {
    pub direction: Option<RunDirection>,
}

impl InvalidPinOptions {
    /// Force a direction for sequential runs.
    pub fn with_direction(mut self, direction: RunDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Equivalent of the `reverse` flag of the test scripts.
    pub fn reverse(reverse: bool) -> Self {
        Self::default().with_direction(if reverse {
            RunDirection::Descending
        } else {
            RunDirection::Ascending
        })
    }
}
