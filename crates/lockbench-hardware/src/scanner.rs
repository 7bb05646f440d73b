//! Barcode scan helper.
//!
//! The fixture's scanner is triggered by a relay output and types what it
//! reads as keyboard input. [`BarcodeScanner`] holds the trigger output for
//! the whole scan window while capturing keystrokes, and accepts a scan only
//! when characters arrive in a fast burst terminated by Enter, so stray
//! manual typing is ignored.

#![allow(async_fn_in_trait)]

use crate::registry::ChannelRegistry;
use crate::traits::DigitalChannel;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, warn};

/// One key event from the keyboard capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    /// Printable character.
    Char(char),
    Enter,
    /// Any key without a character (shift, arrows, ...).
    Other,
}

/// Start/stop-able keyboard capture.
pub trait KeystrokeSource {
    /// Begin delivering keystrokes.
    async fn start(&mut self) -> Result<()>;

    /// Next keystroke, or `None` once capture has ended.
    async fn next_keystroke(&mut self) -> Option<Keystroke>;

    /// Stop capture and discard keystrokes not yet delivered.
    async fn stop(&mut self);
}

/// Drives the scanner's trigger output.
pub trait ScanTrigger {
    /// Hold `channel` active for `duration`.
    async fn trigger(&mut self, channel: &str, duration: Duration) -> Result<()>;
}

impl<C: DigitalChannel> ScanTrigger for ChannelRegistry<C> {
    async fn trigger(&mut self, channel: &str, duration: Duration) -> Result<()> {
        self.press(channel, duration).await
    }
}

impl<T: ScanTrigger + ?Sized> ScanTrigger for &mut T {
    async fn trigger(&mut self, channel: &str, duration: Duration) -> Result<()> {
        (**self).trigger(channel, duration).await
    }
}

/// A completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub data: String,
    pub scanned_at: DateTime<Utc>,
}

/// Scanner timing and retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Output that triggers the scanner.
    pub trigger_channel: String,

    /// Scan window; the trigger is held for all of it.
    pub timeout: Duration,

    /// Longest gap between keystrokes of one scan.
    pub keystroke_gap: Duration,

    /// Scans attempted by [`BarcodeScanner::scan_with_retries`].
    pub attempts: u32,

    /// Delay between failed attempts.
    pub retry_delay: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            trigger_channel: "barcode".to_string(),
            timeout: Duration::from_secs(1),
            keystroke_gap: Duration::from_millis(50),
            attempts: 3,
            retry_delay: Duration::from_secs(3),
        }
    }
}

impl ScannerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.attempts = attempts;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_trigger_channel(mut self, channel: impl Into<String>) -> Self {
        self.trigger_channel = channel.into();
        self
    }
}

/// Triggers the scanner and captures what it types.
///
/// # Examples
///
/// ```
/// use lockbench_hardware::config::{ChannelMapConfig, DeviceConfigs};
/// use lockbench_hardware::mock::{MockBoard, MockKeyboard};
/// use lockbench_hardware::scanner::{BarcodeScanner, ScannerConfig};
/// use lockbench_hardware::ChannelRegistry;
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread", start_paused = true)]
/// async fn main() {
///     let (mut board, _board_handle) = MockBoard::new(-1);
///     let mut registry =
///         ChannelRegistry::open(&mut board, &ChannelMapConfig::default(), DeviceConfigs::defaults());
///     let (keyboard, keys) = MockKeyboard::new();
///
///     tokio::spawn(async move {
///         tokio::time::sleep(Duration::from_millis(200)).await;
///         keys.scan("SN-0042", Duration::from_millis(5)).await.unwrap();
///     });
///
///     let mut scanner = BarcodeScanner::new(&mut registry, keyboard, ScannerConfig::default());
///     let scan = scanner.await_scan(Duration::from_secs(1)).await.unwrap();
///     assert_eq!(scan.data, "SN-0042");
/// }
/// ```
#[derive(Debug)]
pub struct BarcodeScanner<T, K> {
    trigger: T,
    keys: K,
    config: ScannerConfig,
}

impl<T: ScanTrigger, K: KeystrokeSource> BarcodeScanner<T, K> {
    pub fn new(trigger: T, keys: K, config: ScannerConfig) -> Self {
        Self {
            trigger,
            keys,
            config,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    /// Hold the trigger for `timeout` while capturing one scan.
    ///
    /// Returns when the trigger is released, so the call always lasts the
    /// full window. A trigger failure is logged and capture continues.
    pub async fn await_scan(&mut self, timeout: Duration) -> Option<ScanResult> {
        if let Err(e) = self.keys.start().await {
            error!("Could not start keyboard capture: {}", e);
            return None;
        }

        let Self {
            trigger,
            keys,
            config,
        } = self;
        let channel = config.trigger_channel.as_str();

        let press = async {
            if let Err(e) = trigger.trigger(channel, timeout).await {
                error!("Scanner trigger '{}' failed: {}", channel, e);
            }
        };
        let listen = tokio::time::timeout(timeout, capture(keys, config.keystroke_gap));
        let ((), captured) = tokio::join!(press, listen);

        debug!("Flushing keyboard buffer...");
        keys.stop().await;

        match captured {
            Ok(Some(data)) => {
                debug!("Scan captured data: '{}'", data);
                Some(ScanResult {
                    data,
                    scanned_at: Utc::now(),
                })
            }
            _ => {
                debug!("No data was captured from the barcode scan prompt (or it timed out).");
                None
            }
        }
    }

    /// Scan up to `attempts` times, waiting `retry_delay` after each miss.
    pub async fn scan_with_retries(&mut self) -> Option<ScanResult> {
        let attempts = self.config.attempts;
        let timeout = self.config.timeout;
        let delay = self.config.retry_delay;

        for attempt in 1..=attempts {
            if let Some(result) = self.await_scan(timeout).await {
                return Some(result);
            }
            if attempt < attempts {
                warn!(
                    "Barcode scan attempt {} failed. Retrying in {:.1}s...",
                    attempt,
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            } else {
                warn!("Barcode scan attempt {} failed. Scan did not return data.", attempt);
            }
        }
        None
    }
}

/// Collect characters until Enter ends a non-empty burst.
///
/// A gap longer than `max_gap` between keystrokes starts a new burst.
async fn capture<K: KeystrokeSource>(keys: &mut K, max_gap: Duration) -> Option<String> {
    let mut buffer = String::new();
    let mut last_key = Instant::now();

    while let Some(key) = keys.next_keystroke().await {
        let now = Instant::now();
        if now.duration_since(last_key) > max_gap {
            buffer.clear();
        }
        last_key = now;

        match key {
            Keystroke::Enter if !buffer.is_empty() => return Some(buffer),
            Keystroke::Enter => buffer.clear(),
            Keystroke::Char(c) => buffer.push(c),
            Keystroke::Other => {}
        }
    }
    None
}
