//! Common test utilities for integration tests.
//!
//! - [`LogCapture`] records formatted log lines so tests can assert on the
//!   exact wording of failure and timeout messages.
//! - `*_registry` builders open a [`ChannelRegistry`] on a [`MockBoard`].

#![allow(dead_code)]

use lockbench_hardware::config::{ChannelMapConfig, DeviceConfigs};
use lockbench_hardware::mock::{MockBoard, MockBoardHandle, MockChannel};
use lockbench_hardware::ChannelRegistry;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;

/// Serial number of the board used by the builders.
pub const BOARD_SERIAL: i32 = 4242;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captures log output on the current thread until dropped.
///
/// Install it before the code under test runs; `#[tokio::test]` uses a
/// current-thread runtime, so spawned tasks are captured too.
pub struct LogCapture {
    buffer: SharedBuffer,
    _guard: DefaultGuard,
}

impl LogCapture {
    pub fn install() -> Self {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self {
            buffer,
            _guard: guard,
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.0.lock().unwrap()).into_owned()
    }

    /// Number of captured lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.contents().lines().filter(|line| line.contains(needle)).count()
    }

    #[track_caller]
    pub fn assert_logged(&self, needle: &str) {
        let contents = self.contents();
        assert!(
            contents.contains(needle),
            "expected log line containing {needle:?}, captured:\n{contents}"
        );
    }

    #[track_caller]
    pub fn assert_not_logged(&self, needle: &str) {
        let contents = self.contents();
        assert!(
            !contents.contains(needle),
            "unexpected log line containing {needle:?}, captured:\n{contents}"
        );
    }
}

/// Registry over `map` on a fresh board.
pub fn registry_with(map: &ChannelMapConfig) -> (ChannelRegistry<MockChannel>, MockBoardHandle) {
    let (mut board, handle) = MockBoard::new(BOARD_SERIAL);
    let registry = ChannelRegistry::open(&mut board, map, DeviceConfigs::defaults());
    (registry, handle)
}

/// Two outputs (`out1` on 0, `out2` on 1) and one input (`sense` on 0).
pub fn small_registry() -> (ChannelRegistry<MockChannel>, MockBoardHandle) {
    let map = ChannelMapConfig::empty()
        .with_output("out1", "main_phidget", 0)
        .with_output("out2", "main_phidget", 1)
        .with_input("sense", "main_phidget", 0);
    registry_with(&map)
}

/// The standard fixture map.
pub fn fixture_registry() -> (ChannelRegistry<MockChannel>, MockBoardHandle) {
    registry_with(&ChannelMapConfig::default())
}
