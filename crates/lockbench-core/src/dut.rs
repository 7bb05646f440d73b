//! Device-under-test state consulted by the PIN generator.
//!
//! The generator never caches the self-destruct PIN: it asks a [`DutState`]
//! on every call, because a test script may reconfigure the DUT between
//! generations.

use crate::{Result, error::Error};
use std::sync::{Arc, PoisonError, RwLock};

/// Read access to the DUT state relevant to PIN generation.
pub trait DutState {
    /// Digits of the self-destruct PIN currently configured on the DUT.
    ///
    /// An empty list means no self-destruct PIN is set.
    fn self_destruct_digits(&self) -> Vec<char>;

    /// The self-destruct PIN as a string, or `None` when none is set.
    fn self_destruct_pin(&self) -> Option<String> {
        let digits = self.self_destruct_digits();
        if digits.is_empty() {
            None
        } else {
            Some(digits.into_iter().collect())
        }
    }
}

impl<T: DutState + ?Sized> DutState for &T {
    fn self_destruct_digits(&self) -> Vec<char> {
        (**self).self_destruct_digits()
    }
}

impl<T: DutState + ?Sized> DutState for Arc<T> {
    fn self_destruct_digits(&self) -> Vec<char> {
        (**self).self_destruct_digits()
    }
}

/// In-memory DUT model.
///
/// Shared between the test script (which updates it as it reconfigures the
/// device) and the generator (which reads it).
///
/// # Examples
///
/// ```
/// use lockbench_core::dut::{DutModel, DutState};
///
/// let dut = DutModel::new();
/// assert_eq!(dut.self_destruct_pin(), None);
///
/// dut.set_self_destruct_pin("1234").unwrap();
/// assert_eq!(dut.self_destruct_pin().as_deref(), Some("1234"));
/// ```
#[derive(Debug, Default)]
pub struct DutModel {
    self_destruct_pin: RwLock<Vec<char>>,
}

impl DutModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model with a self-destruct PIN already configured.
    ///
    /// # Errors
    /// Returns `Error::InvalidDigit` if `pin` contains a non-digit.
    pub fn with_self_destruct_pin(pin: &str) -> Result<Self> {
        let model = Self::new();
        model.set_self_destruct_pin(pin)?;
        Ok(model)
    }

    /// Replace the self-destruct PIN. An empty string clears it.
    ///
    /// # Errors
    /// Returns `Error::InvalidDigit` if `pin` contains a non-digit; the
    /// previous value is kept in that case.
    pub fn set_self_destruct_pin(&self, pin: &str) -> Result<()> {
        if let Some(bad) = pin.chars().find(|c| !c.is_ascii_digit()) {
            return Err(Error::InvalidDigit(bad));
        }
        let mut guard = self
            .self_destruct_pin
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = pin.chars().collect();
        Ok(())
    }

    /// Remove the self-destruct PIN.
    pub fn clear_self_destruct_pin(&self) {
        self.self_destruct_pin
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DutState for DutModel {
    fn self_destruct_digits(&self) -> Vec<char> {
        self.self_destruct_pin
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
