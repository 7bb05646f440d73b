//! Mock devices for testing and development.
//!
//! These stand in for the I/O board and the keyboard capture so the whole
//! harness runs without a fixture attached.

pub mod board;
pub mod keyboard;

pub use board::{BoardEvent, MockBoard, MockBoardHandle, MockChannel, SetupCall};
pub use keyboard::{MockKeyboard, MockKeyboardHandle};
