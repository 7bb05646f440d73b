//! Digital I/O layer for the lockbench DUT test harness.
//!
//! This crate drives the relay outputs and reads the digital inputs of the
//! test fixture through an I/O board, addressing every channel by a logical
//! name (`key3`, `lock`, `power_on`) instead of a device and index.
//!
//! # Design
//!
//! - **Configured, not discovered**: a [`ChannelMapConfig`] binds names to
//!   physical channels and [`DeviceConfigs`] hold per-board connection
//!   parameters, merged per key over built-in defaults.
//! - **Degrade, don't abort**: [`ChannelRegistry::open`] opens each physical
//!   channel once. A channel that fails to open is remembered as failed, and
//!   only operations on that name report it.
//! - **Always release**: timed presses turn their outputs off on every exit
//!   path, and the registry turns active outputs off and closes every
//!   channel when dropped.
//! - **Async waits, sync I/O**: board reads and writes are synchronous trait
//!   calls ([`DigitalChannel`]); holds, pulses and input polling use
//!   `tokio::time`, so tests run on a paused clock.
//!
//! # Driving outputs
//!
//! ```
//! use lockbench_hardware::config::{ChannelMapConfig, DeviceConfigs};
//! use lockbench_hardware::mock::MockBoard;
//! use lockbench_hardware::{ChannelRegistry, Step};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread", start_paused = true)]
//! async fn main() -> lockbench_hardware::Result<()> {
//!     let (mut board, handle) = MockBoard::new(-1);
//!     let mut registry =
//!         ChannelRegistry::open(&mut board, &ChannelMapConfig::default(), DeviceConfigs::defaults());
//!
//!     // Enter "12" and unlock.
//!     let steps = [Step::from("key1"), Step::from("key2"), Step::from("unlock")];
//!     registry
//!         .sequence(&steps, Duration::from_millis(100), Duration::from_millis(100))
//!         .await?;
//!
//!     assert_eq!(handle.output(11), Some(false));
//!     Ok(())
//! }
//! ```
//!
//! # Waiting for inputs
//!
//! ```no_run
//! use lockbench_hardware::traits::DigitalChannel;
//! use lockbench_hardware::{ChannelRegistry, Result};
//! use std::time::Duration;
//!
//! async fn power_cycle<C: DigitalChannel>(registry: &mut ChannelRegistry<C>) -> Result<bool> {
//!     registry.hold("connect", Duration::from_millis(500)).await?;
//!     registry
//!         .wait_for_input("power_on", true, Duration::from_secs(5), Duration::from_millis(50))
//!         .await
//! }
//! ```
//!
//! # Error Handling
//!
//! Operations return [`Result<T>`][error::Result] with [`HardwareError`].
//! Resolution errors tell a misconfigured name apart from a board that is
//! merely unplugged; board failures carry the vendor [`DeviceError`].

pub mod config;
pub mod error;
pub mod mock;
pub mod registry;
pub mod scanner;
pub mod sequencer;
pub mod traits;
pub mod types;

pub use config::{
    ChannelMapConfig, ChannelMapping, DeviceConfig, DeviceConfigPatch, DeviceConfigs,
    RegistryConfig,
};
pub use error::{DeviceError, DeviceResult, ErrorCode, HardwareError, Result};
pub use registry::ChannelRegistry;
pub use scanner::{
    BarcodeScanner, Keystroke, KeystrokeSource, ScanResult, ScanTrigger, ScannerConfig,
};
pub use sequencer::{PressTarget, Step, duration_from_ms, parse_steps};
pub use traits::{ChannelFactory, DigitalChannel};
pub use types::{ChannelDirection, LastKnownState, PhysicalKey};
