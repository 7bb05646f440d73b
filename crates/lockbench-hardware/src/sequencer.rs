//! Output and input sequencing on top of the [`ChannelRegistry`].
//!
//! Everything here resolves names through the registry on every call, so a
//! channel that detaches mid-run fails the next operation instead of
//! silently writing to a dead handle.
//!
//! Timed operations release what they pressed on every exit path: the off
//! write is always attempted, and a failing off write is logged rather than
//! returned so it never hides the error that interrupted the press.

use crate::registry::ChannelRegistry;
use crate::traits::DigitalChannel;
use crate::types::{ChannelDirection, LastKnownState, level};
use crate::{HardwareError, Result};
use lockbench_core::PinDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

/// Default press duration for [`ChannelRegistry::press`].
pub const DEFAULT_PRESS_MS: u64 = 100;

/// Default duration for [`ChannelRegistry::hold`].
pub const DEFAULT_HOLD_MS: u64 = 200;

/// Default pause between sequence steps.
pub const DEFAULT_PAUSE_MS: u64 = 100;

/// Default timeout for [`ChannelRegistry::wait_for_input`].
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default poll interval for [`ChannelRegistry::wait_for_input`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One press: a single output, or several outputs held together.
///
/// Deserializes from a JSON string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Single(String),
    Simultaneous(Vec<String>),
}

/// Argument accepted by [`ChannelRegistry::press`].
pub type PressTarget = Step;

impl From<&str> for Step {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

impl From<String> for Step {
    fn from(name: String) -> Self {
        Self::Single(name)
    }
}

impl From<Vec<String>> for Step {
    fn from(names: Vec<String>) -> Self {
        Self::Simultaneous(names)
    }
}

impl From<&[&str]> for Step {
    fn from(names: &[&str]) -> Self {
        Self::Simultaneous(names.iter().map(|name| name.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Step {
    fn from(names: [&str; N]) -> Self {
        Self::from(&names[..])
    }
}

impl TryFrom<&Value> for Step {
    type Error = HardwareError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::Single(name.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        HardwareError::invalid_argument(format!(
                            "Simultaneous press names must be strings, got {item}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Simultaneous),
            other => Err(HardwareError::invalid_argument(format!(
                "Press target must be a string or a list of strings, got {other}"
            ))),
        }
    }
}

/// Parse a JSON step list: an array of names and arrays of names.
///
/// # Errors
/// Returns `InvalidArgument` if `value` is not an array or any element is
/// not a name or a list of names.
pub fn parse_steps(value: &Value) -> Result<Vec<Step>> {
    let Value::Array(items) = value else {
        return Err(HardwareError::invalid_argument(format!(
            "Steps must be a list, got {value}"
        )));
    };
    items.iter().map(Step::try_from).collect()
}

/// Convert a millisecond count into a [`Duration`].
///
/// # Errors
/// Returns `InvalidArgument` for negative, NaN or infinite values.
pub fn duration_from_ms(ms: f64) -> Result<Duration> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(HardwareError::invalid_argument(format!(
            "Duration must be a non-negative number of milliseconds, got {ms}"
        )));
    }
    Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
}

impl<C: DigitalChannel> ChannelRegistry<C> {
    /// Set an output to `state`.
    ///
    /// # Errors
    /// Resolution errors, or `DeviceOperationFailed` if the board rejects
    /// the write.
    pub fn set_output(&mut self, name: &str, state: bool) -> Result<()> {
        let channel = self.resolve_mut(name, ChannelDirection::Output)?;
        channel.set_state(state).map_err(|e| {
            error!("Error setting output '{}': {}", name, e);
            HardwareError::device(name, "set_state", e)
        })?;
        debug!("Output '{}' set to {}.", name, if state { "ON" } else { "OFF" });
        Ok(())
    }

    pub fn on(&mut self, name: &str) -> Result<()> {
        self.set_output(name, true)
    }

    pub fn off(&mut self, name: &str) -> Result<()> {
        self.set_output(name, false)
    }

    /// Turn `name` on for `duration`, then off.
    ///
    /// The off write is attempted even when turning on failed, and also when
    /// the returned future is dropped mid-wait. Its own failure is logged and
    /// not returned.
    pub async fn hold(&mut self, name: &str, duration: Duration) -> Result<()> {
        debug!("Holding '{}' ON for {}ms.", name, duration.as_millis());

        let mut release = Release::new(self, "hold", [name]);
        let result = release.registry.on(name);
        if result.is_ok() {
            sleep(duration).await;
        }
        drop(release);
        result
    }

    /// Turn every name on in order, wait once, then turn every name off.
    ///
    /// Stops turning channels on at the first failure, but still attempts
    /// to turn all of them off, including when the future is dropped.
    pub async fn pulse_simultaneous<S: AsRef<str>>(
        &mut self,
        names: &[S],
        duration: Duration,
    ) -> Result<()> {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        debug!("Simultaneous press: {:?} for {}ms.", names, duration.as_millis());

        let mut release = Release::new(self, "simultaneous pulse", names.iter().copied());
        let mut result = Ok(());
        for name in &names {
            if let Err(e) = release.registry.on(name) {
                result = Err(e);
                break;
            }
        }
        if result.is_ok() {
            sleep(duration).await;
        }
        drop(release);
        result
    }

    /// Press a single output or several outputs together.
    ///
    /// ```
    /// # use lockbench_hardware::config::{ChannelMapConfig, DeviceConfigs};
    /// # use lockbench_hardware::mock::MockBoard;
    /// # use lockbench_hardware::ChannelRegistry;
    /// # use std::time::Duration;
    /// # #[tokio::main(flavor = "current_thread", start_paused = true)]
    /// # async fn main() -> lockbench_hardware::Result<()> {
    /// # let (mut board, _handle) = MockBoard::new(-1);
    /// let mut registry = ChannelRegistry::open(
    ///     &mut board,
    ///     &ChannelMapConfig::default(),
    ///     DeviceConfigs::defaults(),
    /// );
    ///
    /// registry.press("lock", Duration::from_millis(100)).await?;
    /// registry.press(["key1", "key2"], Duration::from_secs(3)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn press(&mut self, target: impl Into<PressTarget>, duration: Duration) -> Result<()> {
        self.run_step(&target.into(), duration).await
    }

    async fn run_step(&mut self, step: &Step, duration: Duration) -> Result<()> {
        match step {
            Step::Single(name) => self.hold(name, duration).await,
            Step::Simultaneous(names) => self.pulse_simultaneous(names, duration).await,
        }
    }

    /// Press each step in order, pausing between steps (not after the last).
    ///
    /// Stops at the first step that fails.
    pub async fn sequence(&mut self, steps: &[Step], press: Duration, pause: Duration) -> Result<()> {
        debug!(
            "Sequence: {:?} (Press: {}ms, Pause: {}ms)",
            steps,
            press.as_millis(),
            pause.as_millis()
        );

        for (i, step) in steps.iter().enumerate() {
            self.run_step(step, press).await?;

            if i + 1 < steps.len() && !pause.is_zero() {
                debug!("Pause {}ms.", pause.as_millis());
                sleep(pause).await;
            }
        }
        Ok(())
    }

    /// Key in a PIN: one press per digit key, then `unlock`.
    pub async fn enter_pin(&mut self, pin: &PinDescriptor, press: Duration, pause: Duration) -> Result<()> {
        debug!("Entering PIN '{}' ({})", pin.string, pin.reason);
        let steps: Vec<Step> = pin.sequence.iter().cloned().map(Step::Single).collect();
        self.sequence(&steps, press, pause).await
    }

    /// Run a JSON step list.
    ///
    /// All arguments are validated before any output is touched.
    ///
    /// # Errors
    /// `InvalidArgument` for malformed steps or durations, then anything
    /// [`sequence`](Self::sequence) returns.
    pub async fn run_sequence_json(&mut self, steps: &Value, press_ms: f64, pause_ms: f64) -> Result<()> {
        let steps = parse_steps(steps)?;
        let press = duration_from_ms(press_ms)?;
        let pause = duration_from_ms(pause_ms)?;
        self.sequence(&steps, press, pause).await
    }

    /// Read an input level.
    ///
    /// # Errors
    /// Resolution errors, or `DeviceOperationFailed` if the read fails.
    pub fn read_input(&self, name: &str) -> Result<bool> {
        let channel = self.resolve(name, ChannelDirection::Input)?;
        let state = channel.state().map_err(|e| {
            error!("Error reading input '{}': {}", name, e);
            HardwareError::device(name, "get_state", e)
        })?;
        info!("Input '{}' read as {}.", name, level(state));
        Ok(state)
    }

    fn poll_input(&self, name: &str) -> Result<bool> {
        let channel = self.resolve(name, ChannelDirection::Input)?;
        channel
            .state()
            .map_err(|e| HardwareError::device(name, "get_state", e))
    }

    /// Poll an input until it reads `expected` or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout. Detach and device errors are logged
    /// and polling continues.
    ///
    /// # Errors
    /// Configuration errors (undefined, failed init, wrong direction) abort
    /// the wait immediately.
    pub async fn wait_for_input(
        &self,
        name: &str,
        expected: bool,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool> {
        info!(
            "Waiting for input '{}' to be {} (timeout: {}s)...",
            name,
            level(expected),
            timeout.as_secs_f64()
        );

        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let start = Instant::now();
        while start.elapsed() < timeout {
            match self.poll_input(name) {
                Ok(state) if state == expected => {
                    info!("Input '{}' reached state {}.", name, level(expected));
                    return Ok(true);
                }
                Ok(_) => {}
                Err(e) if e.is_configuration_error() => {
                    error!("Cannot wait for '{}': {}", name, e);
                    return Err(e);
                }
                Err(e) if e.is_not_attached() => {
                    let serial = self
                        .channel(name)
                        .map(|channel| channel.device_serial_number().to_string())
                        .unwrap_or_else(|| "N/A".to_string());
                    warn!("Input '{}' detached. Retrying. (S/N {})", name, serial);
                }
                Err(e) => error!("Device error waiting for '{}': {}", name, e),
            }
            sleep(poll_interval).await;
        }

        warn!(
            "Timeout waiting for '{}' to be {}. Last state: {}.",
            name,
            level(expected),
            self.last_known_state(name)
        );
        Ok(false)
    }

    /// Best-effort level of an input for diagnostics.
    pub fn last_known_state(&self, name: &str) -> LastKnownState {
        match self.channel(name) {
            Some(channel) if channel.is_attached() => match channel.state() {
                Ok(true) => LastKnownState::High,
                Ok(false) => LastKnownState::Low,
                Err(_) => LastKnownState::Unknown,
            },
            Some(_) => LastKnownState::NotAttached,
            None => LastKnownState::Unknown,
        }
    }
}

/// Turns the listed outputs off when dropped.
///
/// Held across the wait of a timed press so a cancelled future still
/// releases its outputs.
struct Release<'a, C: DigitalChannel> {
    registry: &'a mut ChannelRegistry<C>,
    names: Vec<String>,
    context: &'static str,
}

impl<'a, C: DigitalChannel> Release<'a, C> {
    fn new<'n>(
        registry: &'a mut ChannelRegistry<C>,
        context: &'static str,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Self {
        Self {
            registry,
            names: names.into_iter().map(str::to_string).collect(),
            context,
        }
    }
}

impl<C: DigitalChannel> Drop for Release<'_, C> {
    fn drop(&mut self) {
        for name in &self.names {
            if let Err(e) = self.registry.off(name) {
                error!("Error turning off '{}' during {}: {}", name, self.context, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelMapConfig, DeviceConfigs};
    use crate::mock::{MockBoard, MockBoardHandle, MockChannel};
    use rstest::rstest;
    use serde_json::json;

    fn registry() -> (ChannelRegistry<MockChannel>, MockBoardHandle) {
        let (mut board, handle) = MockBoard::new(-1);
        let map = ChannelMapConfig::empty()
            .with_output("a", "main_phidget", 0)
            .with_output("b", "main_phidget", 1)
            .with_input("sense", "main_phidget", 0);
        let registry = ChannelRegistry::open(&mut board, &map, DeviceConfigs::defaults());
        (registry, handle)
    }

    #[rstest]
    #[case(json!("lock"), Step::Single("lock".into()))]
    #[case(json!(["key1", "key2"]), Step::Simultaneous(vec!["key1".into(), "key2".into()]))]
    #[case(json!([]), Step::Simultaneous(vec![]))]
    fn test_step_from_json(#[case] value: Value, #[case] expected: Step) {
        assert_eq!(Step::try_from(&value).unwrap(), expected);
    }

    #[rstest]
    #[case(json!(5))]
    #[case(json!(null))]
    #[case(json!({"name": "lock"}))]
    #[case(json!(["key1", 2]))]
    #[case(json!([["nested"]]))]
    fn test_step_from_json_rejects(#[case] value: Value) {
        assert!(matches!(
            Step::try_from(&value).unwrap_err(),
            HardwareError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_parse_steps() {
        let steps = parse_steps(&json!(["a", ["a", "b"]])).unwrap();
        assert_eq!(steps, vec![Step::from("a"), Step::from(["a", "b"])]);

        assert!(parse_steps(&json!("a")).is_err());
        assert!(parse_steps(&json!(["a", 1])).is_err());
    }

    #[test]
    fn test_step_deserializes_untagged() {
        let steps: Vec<Step> = serde_json::from_str(r#"["lock", ["key1", "key2"]]"#).unwrap();
        assert_eq!(steps[0], Step::from("lock"));
        assert_eq!(steps[1], Step::from(["key1", "key2"]));
    }

    #[rstest]
    #[case(0.0, Duration::ZERO)]
    #[case(150.0, Duration::from_millis(150))]
    #[case(2.5, Duration::from_micros(2500))]
    fn test_duration_from_ms(#[case] ms: f64, #[case] expected: Duration) {
        assert_eq!(duration_from_ms(ms).unwrap(), expected);
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_duration_from_ms_rejects(#[case] ms: f64) {
        assert!(duration_from_ms(ms).is_err());
    }

    #[test]
    fn test_set_output_on_input_is_wrong_type() {
        let (mut registry, _handle) = registry();
        assert!(matches!(
            registry.on("sense").unwrap_err(),
            HardwareError::WrongChannelType { .. }
        ));
    }

    #[test]
    fn test_set_output_propagates_device_failure() {
        let (mut registry, handle) = registry();
        handle.fail_set_state(0, true);
        let err = registry.on("a").unwrap_err();
        assert!(matches!(
            err,
            HardwareError::DeviceOperationFailed { operation: "set_state", .. }
        ));
    }

    #[test]
    fn test_read_input() {
        let (registry, handle) = registry();
        assert!(!registry.read_input("sense").unwrap());
        handle.set_input(0, true);
        assert!(registry.read_input("sense").unwrap());
        assert_eq!(registry.last_known_state("sense"), LastKnownState::High);

        handle.detach();
        assert!(registry.read_input("sense").unwrap_err().is_not_attached());
        assert_eq!(registry.last_known_state("sense"), LastKnownState::NotAttached);
        assert_eq!(registry.last_known_state("missing"), LastKnownState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_releases_output() {
        let (mut registry, handle) = registry();
        let start = Instant::now();
        registry.hold("a", Duration::from_millis(150)).await.unwrap();

        let events = handle.events_for(0);
        assert_eq!(events.len(), 2);
        assert!(events[0].1);
        assert!(!events[1].1);
        assert_eq!(events[1].0 - start, Duration::from_millis(150));
        assert_eq!(handle.output(0), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_hold_releases_output() {
        let (mut registry, handle) = registry();
        let start = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            registry.hold("a", Duration::from_secs(1)),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(handle.output(0), Some(false));
        let events = handle.events_for(0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0 - start, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_pulse_releases_outputs() {
        let (mut registry, handle) = registry();
        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            registry.pulse_simultaneous(&["a", "b"], Duration::from_secs(1)),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(handle.output(0), Some(false));
        assert_eq!(handle.output(1), Some(false));
        assert_eq!(handle.events_for(1).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_on_failure_skips_sleep_but_releases() {
        let (mut registry, handle) = registry();
        handle.fail_set_state(0, true);
        let start = Instant::now();

        let err = registry.hold("a", Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, HardwareError::DeviceOperationFailed { .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(handle.events_for(0), vec![(start, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_dispatch() {
        let (mut registry, handle) = registry();
        registry.press("a", Duration::from_millis(10)).await.unwrap();
        registry.press(["a", "b"], Duration::from_millis(10)).await.unwrap();

        assert_eq!(handle.events_for(0).len(), 4);
        assert_eq!(handle.events_for(1).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_without_pause() {
        let (mut registry, handle) = registry();
        let start = Instant::now();
        let steps = [Step::from("a"), Step::from("b")];
        registry
            .sequence(&steps, Duration::from_millis(40), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(80));
        assert_eq!(handle.events().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_stops_at_failing_step() {
        let (mut registry, handle) = registry();
        let steps = [Step::from("a"), Step::from("nope"), Step::from("b")];
        let err = registry
            .sequence(&steps, Duration::from_millis(10), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, HardwareError::UndefinedChannel { .. }));
        assert!(handle.events_for(1).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sequence_json_validates_first() {
        let (mut registry, handle) = registry();

        for (steps, press, pause) in [
            (json!("a"), 10.0, 10.0),
            (json!(["a", 3]), 10.0, 10.0),
            (json!(["a"]), -1.0, 10.0),
            (json!(["a"]), 10.0, f64::NAN),
        ] {
            let err = registry.run_sequence_json(&steps, press, pause).await.unwrap_err();
            assert!(matches!(err, HardwareError::InvalidArgument { .. }));
        }
        assert!(handle.events().is_empty());

        registry
            .run_sequence_json(&json!(["a", ["a", "b"]]), 10.0, 5.0)
            .await
            .unwrap();
        assert_eq!(handle.events().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_input_sees_change() {
        let (registry, handle) = registry();
        let driver = handle.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(120)).await;
            driver.set_input(0, true);
        });

        let start = Instant::now();
        let reached = registry
            .wait_for_input("sense", true, Duration::from_secs(1), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(reached);
        assert_eq!(start.elapsed(), Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_input_times_out() {
        let (registry, _handle) = registry();
        let start = Instant::now();
        let reached = registry
            .wait_for_input("sense", true, Duration::from_millis(200), DEFAULT_POLL_INTERVAL)
            .await
            .unwrap();
        assert!(!reached);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_input_rejects_configuration_errors() {
        let (registry, _handle) = registry();
        let start = Instant::now();

        let err = registry
            .wait_for_input("a", true, Duration::from_secs(1), DEFAULT_POLL_INTERVAL)
            .await
            .unwrap_err();
        assert!(matches!(err, HardwareError::WrongChannelType { .. }));

        let err = registry
            .wait_for_input("ghost", true, Duration::from_secs(1), DEFAULT_POLL_INTERVAL)
            .await
            .unwrap_err();
        assert!(matches!(err, HardwareError::UndefinedChannel { .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_input_tolerates_read_errors() {
        let (registry, handle) = registry();
        handle.fail_reads(ChannelDirection::Input, 0);
        let driver = handle.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            driver.clear_failures();
            driver.set_input(0, true);
        });

        let reached = registry
            .wait_for_input("sense", true, Duration::from_secs(1), DEFAULT_POLL_INTERVAL)
            .await
            .unwrap();
        assert!(reached);
    }
}
