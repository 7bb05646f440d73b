//! Mock keyboard for barcode scan tests.
//!
//! A USB barcode scanner types its payload as keystrokes followed by Enter.
//! [`MockKeyboard`] delivers keystrokes sent through a [`MockKeyboardHandle`]
//! while capture is running.

use crate::scanner::{Keystroke, KeystrokeSource};
use crate::{HardwareError, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Mock keystroke source.
///
/// # Examples
///
/// ```
/// use lockbench_hardware::mock::MockKeyboard;
/// use lockbench_hardware::scanner::{Keystroke, KeystrokeSource};
///
/// #[tokio::main]
/// async fn main() -> lockbench_hardware::Result<()> {
///     let (mut keyboard, handle) = MockKeyboard::new();
///     keyboard.start().await?;
///
///     handle.send(Keystroke::Char('A')).await?;
///     assert_eq!(keyboard.next_keystroke().await, Some(Keystroke::Char('A')));
///
///     keyboard.stop().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockKeyboard {
    key_rx: mpsc::Receiver<Keystroke>,
    listening: bool,
    flushed: usize,
}

impl MockKeyboard {
    pub fn new() -> (Self, MockKeyboardHandle) {
        let (key_tx, key_rx) = mpsc::channel(256);
        let keyboard = Self {
            key_rx,
            listening: false,
            flushed: 0,
        };
        (keyboard, MockKeyboardHandle { key_tx })
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Keystrokes discarded by [`stop`](KeystrokeSource::stop) so far.
    pub fn flushed_count(&self) -> usize {
        self.flushed
    }

    fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.key_rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

impl KeystrokeSource for MockKeyboard {
    async fn start(&mut self) -> Result<()> {
        // Keys typed before capture started never reach a real listener.
        let stale = self.drain();
        if stale > 0 {
            debug!("Discarded {} keystrokes typed before capture", stale);
        }
        self.listening = true;
        Ok(())
    }

    async fn next_keystroke(&mut self) -> Option<Keystroke> {
        if !self.listening {
            return None;
        }
        self.key_rx.recv().await
    }

    async fn stop(&mut self) {
        self.listening = false;
        self.flushed += self.drain();
    }
}

/// Handle for typing on a [`MockKeyboard`].
#[derive(Debug, Clone)]
pub struct MockKeyboardHandle {
    key_tx: mpsc::Sender<Keystroke>,
}

impl MockKeyboardHandle {
    /// Send one keystroke.
    ///
    /// # Errors
    /// Returns an error if the keyboard has been dropped.
    pub async fn send(&self, key: Keystroke) -> Result<()> {
        self.key_tx
            .send(key)
            .await
            .map_err(|_| HardwareError::configuration("Keyboard input channel closed"))
    }

    /// Type `text` with `gap` between keystrokes, without pressing Enter.
    pub async fn type_text(&self, text: &str, gap: Duration) -> Result<()> {
        for (i, c) in text.chars().enumerate() {
            if i > 0 && !gap.is_zero() {
                tokio::time::sleep(gap).await;
            }
            self.send(Keystroke::Char(c)).await?;
        }
        Ok(())
    }

    /// Type `data` like a scanner does: fast keystrokes, then Enter.
    pub async fn scan(&self, data: &str, gap: Duration) -> Result<()> {
        self.type_text(data, gap).await?;
        if !gap.is_zero() {
            tokio::time::sleep(gap).await;
        }
        self.send(Keystroke::Enter).await
    }
}
