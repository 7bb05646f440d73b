//! Valid and deliberately invalid PIN generation.
//!
//! Every descriptor is classified against the self-destruct PIN the DUT
//! reports at the moment of the call. Nothing is cached between calls.

use crate::{
    InvalidPinKind, InvalidPinOptions, PinDescriptor, PinValidity, Result, RunDirection,
    constants::{
        MAX_GENERATION_ATTEMPTS, MAX_PIN_LENGTH, MAX_SEQUENTIAL_LENGTH, MIN_PIN_LENGTH,
        MIN_SEQUENTIAL_LENGTH,
    },
    dut::DutState,
    error::Error,
    source::{DigitSource, RandomDigits},
};
use tracing::{debug, warn};

/// How often each digit appeared in successfully generated valid PINs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigitUsage {
    counts: [u64; 10],
}

impl DigitUsage {
    /// Times `digit` (0-9) was used. Out-of-range digits report zero.
    #[must_use]
    pub fn count(&self, digit: u8) -> u64 {
        self.counts.get(usize::from(digit)).copied().unwrap_or(0)
    }

    /// Sum over all digits.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Digits sharing the lowest count, ascending.
    ///
    /// Test scripts use this to steer towards keys that have seen the
    /// fewest presses.
    #[must_use]
    pub fn least_used(&self) -> Vec<u8> {
        let min = self.counts.iter().copied().min().unwrap_or(0);
        (0u8..10)
            .filter(|&d| self.counts[usize::from(d)] == min)
            .collect()
    }

    fn record(&mut self, pin: &str) {
        for digit in pin.chars().filter_map(|c| c.to_digit(10)) {
            self.counts[digit as usize] += 1;
        }
    }
}

/// Generates PIN descriptors for exercising the DUT's access-control logic.
///
/// # Examples
///
/// ```
/// use lockbench_core::dut::DutModel;
/// use lockbench_core::generator::PinGenerator;
///
/// let dut = DutModel::with_self_destruct_pin("1234").unwrap();
/// let mut generator = PinGenerator::new(&dut);
///
/// let pin = generator.generate_valid(6).unwrap();
/// assert!(pin.valid);
/// assert_eq!(pin.digit, 6);
/// assert_eq!(pin.sequence.last().map(String::as_str), Some("unlock"));
/// ```
#[derive(Debug)]
pub struct PinGenerator<D, S = RandomDigits> {
    dut: D,
    source: S,
    usage: DigitUsage,
}

impl<D: DutState> PinGenerator<D, RandomDigits> {
    /// Generator drawing from an OS-seeded random source.
    pub fn new(dut: D) -> Self {
        Self::with_source(dut, RandomDigits::new())
    }
}

impl<D: DutState, S: DigitSource> PinGenerator<D, S> {
    /// Generator drawing from a caller-supplied digit source.
    pub fn with_source(dut: D, source: S) -> Self {
        Self {
            dut,
            source,
            usage: DigitUsage::default(),
        }
    }

    /// The DUT state this generator consults.
    pub fn dut(&self) -> &D {
        &self.dut
    }

    /// Digit usage accumulated over successful valid generations.
    pub fn digit_usage(&self) -> &DigitUsage {
        &self.usage
    }

    /// Classify `pin` against the DUT's current self-destruct PIN.
    pub fn classify(&self, pin: &str) -> PinValidity {
        let sdp = self.dut.self_destruct_pin();
        PinValidity::classify(pin, sdp.as_deref())
    }

    /// Classify `pin` and build its descriptor.
    pub fn describe(&self, pin: &str) -> PinDescriptor {
        PinDescriptor::with_validity(pin, self.classify(pin))
    }

    /// Generate a random PIN of `length` digits that classifies as valid.
    ///
    /// # Errors
    /// - `Error::InvalidLength` if `length` is outside 2-16.
    /// - `Error::GenerationExhausted` if no valid PIN turned up within the
    ///   attempt limit. Digit usage is left untouched in that case.
    pub fn generate_valid(&mut self, length: usize) -> Result<PinDescriptor> {
        if !(MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&length) {
            return Err(Error::InvalidLength {
                length,
                min: MIN_PIN_LENGTH,
                max: MAX_PIN_LENGTH,
            });
        }

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let candidate = self.source.numeral(length);
            let validity = self.classify(&candidate);
            if validity.is_invalid() {
                debug!("Rejected candidate PIN (attempt {}): {}", attempt, validity);
                continue;
            }

            self.usage.record(&candidate);
            debug!("Generated valid PIN of length {} after {} attempt(s)", length, attempt);
            return Ok(PinDescriptor::with_validity(&candidate, validity));
        }

        warn!(
            "Could not generate a valid PIN of length {} after {} attempts",
            length, MAX_GENERATION_ATTEMPTS
        );
        Err(Error::GenerationExhausted {
            length,
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    /// Generate a PIN of the requested invalid `kind`.
    ///
    /// The result is classified like any other PIN, so a request that
    /// happens to hit the self-destruct PIN reports that reason instead.
    ///
    /// # Errors
    /// - `Error::InvalidLength` for a zero-length repeating PIN or a
    ///   sequential PIN outside 2-10 digits.
    pub fn generate_invalid(
        &mut self,
        kind: InvalidPinKind,
        length: usize,
        options: InvalidPinOptions,
    ) -> Result<PinDescriptor> {
        let pin = match kind {
            InvalidPinKind::Repeating => self.repeating(length)?,
            InvalidPinKind::Sequential => self.sequential(length, options.direction)?,
        };
        debug!("Generated {} PIN candidate of length {}", kind, length);
        Ok(self.describe(&pin))
    }

    /// [`generate_invalid`](Self::generate_invalid) with the kind given by name.
    ///
    /// # Errors
    /// Returns `Error::UnknownKind` for anything but `"repeating"` or
    /// `"sequential"`, plus the errors of `generate_invalid`.
    pub fn generate_invalid_named(
        &mut self,
        kind: &str,
        length: usize,
        options: InvalidPinOptions,
    ) -> Result<PinDescriptor> {
        let kind: InvalidPinKind = kind.parse()?;
        self.generate_invalid(kind, length, options)
    }

    /// Descriptor of the self-destruct PIN, or `None` when the DUT has none.
    pub fn self_destruct_descriptor(&self) -> Option<PinDescriptor> {
        self.dut
            .self_destruct_pin()
            .map(|pin| self.describe(&pin))
    }

    fn repeating(&mut self, length: usize) -> Result<String> {
        if length == 0 {
            return Err(Error::InvalidLength {
                length,
                min: 1,
                max: usize::MAX,
            });
        }
        let digit = char::from(b'0' + self.source.digit_between(0, 9));
        Ok(std::iter::repeat_n(digit, length).collect())
    }

    fn sequential(&mut self, length: usize, direction: Option<RunDirection>) -> Result<String> {
        if !(MIN_SEQUENTIAL_LENGTH..=MAX_SEQUENTIAL_LENGTH).contains(&length) {
            return Err(Error::InvalidLength {
                length,
                min: MIN_SEQUENTIAL_LENGTH,
                max: MAX_SEQUENTIAL_LENGTH,
            });
        }

        let direction = direction.unwrap_or_else(|| {
            if self.source.coin_flip() {
                RunDirection::Descending
            } else {
                RunDirection::Ascending
            }
        });

        // length <= 10, so the bounds below stay within 0..=9
        let span = length as u8;
        let pin = match direction {
            RunDirection::Ascending => {
                let start = self.source.digit_between(0, 10 - span);
                (0..span).map(|i| char::from(b'0' + start + i)).collect()
            }
            RunDirection::Descending => {
                let start = self.source.digit_between(span - 1, 9);
                (0..span).map(|i| char::from(b'0' + start - i)).collect()
            }
        };
        Ok(pin)
    }
}
