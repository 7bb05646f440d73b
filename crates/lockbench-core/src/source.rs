//! Sources of random digits for the PIN generator.
//!
//! The generator draws every random value through [`DigitSource`], so tests
//! can substitute [`ScriptedDigits`] and get deterministic PINs.

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Supplier of the random choices the generator makes.
pub trait DigitSource {
    /// A digit uniformly drawn from `low..=high` (both within `0..=9`).
    fn digit_between(&mut self, low: u8, high: u8) -> u8;

    /// A fair coin flip.
    fn coin_flip(&mut self) -> bool;

    /// A numeral of `length` independently drawn digits.
    fn numeral(&mut self, length: usize) -> String {
        (0..length)
            .map(|_| char::from(b'0' + self.digit_between(0, 9)))
            .collect()
    }
}

impl<S: DigitSource + ?Sized> DigitSource for &mut S {
    fn digit_between(&mut self, low: u8, high: u8) -> u8 {
        (**self).digit_between(low, high)
    }

    fn coin_flip(&mut self) -> bool {
        (**self).coin_flip()
    }

    fn numeral(&mut self, length: usize) -> String {
        (**self).numeral(length)
    }
}

/// Uniform random digits backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct RandomDigits {
    rng: StdRng,
}

impl RandomDigits {
    /// Seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomDigits {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitSource for RandomDigits {
    fn digit_between(&mut self, low: u8, high: u8) -> u8 {
        self.rng.random_range(low..=high)
    }

    fn coin_flip(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }
}

/// Replays fixed digits and coin flips, cycling when exhausted.
///
/// Digits outside the requested range are clamped into it, so a script
/// can force the start of a sequential run directly.
///
/// # Examples
///
/// ```
/// use lockbench_core::source::{DigitSource, ScriptedDigits};
///
/// let mut source = ScriptedDigits::new([4, 7, 1, 6]);
/// assert_eq!(source.numeral(4), "4716");
/// assert_eq!(source.numeral(2), "47");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedDigits {
    digits: Vec<u8>,
    next_digit: usize,
    flips: Vec<bool>,
    next_flip: usize,
}

impl ScriptedDigits {
    pub fn new(digits: impl IntoIterator<Item = u8>) -> Self {
        Self {
            digits: digits.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Coin flips to replay; without any, every flip is `false`.
    pub fn with_flips(mut self, flips: impl IntoIterator<Item = bool>) -> Self {
        self.flips = flips.into_iter().collect();
        self
    }
}

impl DigitSource for ScriptedDigits {
    fn digit_between(&mut self, low: u8, high: u8) -> u8 {
        if self.digits.is_empty() {
            return low;
        }
        let digit = self.digits[self.next_digit % self.digits.len()];
        self.next_digit += 1;
        digit.clamp(low, high)
    }

    fn coin_flip(&mut self) -> bool {
        if self.flips.is_empty() {
            return false;
        }
        let flip = self.flips[self.next_flip % self.flips.len()];
        self.next_flip += 1;
        flip
    }
}
