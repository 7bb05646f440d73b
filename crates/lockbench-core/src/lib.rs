//! PIN domain for the lockbench DUT test harness.
//!
//! Classifies PINs against the rules of the device under test, assembles
//! the key-press descriptors the hardware sequencer replays, and generates
//! valid or deliberately invalid PINs.

pub mod constants;
pub mod dut;
pub mod error;
pub mod generator;
pub mod source;
pub mod types;

pub use dut::{DutModel, DutState};
pub use error::{Error, Result};
pub use generator::{DigitUsage, PinGenerator};
pub use source::{DigitSource, RandomDigits, ScriptedDigits};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
