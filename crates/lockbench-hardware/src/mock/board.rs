//! Mock digital I/O board for testing and development.
//!
//! [`MockBoard`] is a [`ChannelFactory`] whose channels share one in-memory
//! board. A [`MockBoardHandle`] drives inputs, detaches the board, injects
//! failures and inspects what the registry did to the outputs.

use crate::error::{DeviceError, DeviceResult, ErrorCode};
use crate::traits::{ChannelFactory, DigitalChannel};
use crate::types::ChannelDirection;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// One output transition observed by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardEvent {
    /// When the write reached the board (tokio clock, so paused tests see
    /// exact offsets).
    pub at: Instant,
    pub index: u32,
    pub state: bool,
}

/// Connection setup call made on a channel, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupCall {
    IsRemote(bool),
    IsHubPortDevice(bool),
    HubPort(i32),
    DeviceSerialNumber(i32),
    Channel(u32),
    Open(u32),
}

#[derive(Debug)]
struct BoardState {
    serial_number: i32,
    attached: bool,
    outputs: BTreeMap<u32, bool>,
    inputs: BTreeMap<u32, bool>,
    open_failures: HashSet<(ChannelDirection, u32)>,
    write_failures: HashSet<(u32, bool)>,
    read_failures: HashSet<(ChannelDirection, u32)>,
    events: Vec<BoardEvent>,
    setup_calls: Vec<SetupCall>,
    open_attempts: usize,
    open_count: usize,
    close_count: usize,
}

type SharedState = Arc<Mutex<BoardState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, BoardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock I/O board.
///
/// # Examples
///
/// ```
/// use lockbench_hardware::mock::MockBoard;
/// use lockbench_hardware::traits::{ChannelFactory, DigitalChannel};
/// use lockbench_hardware::ChannelDirection;
///
/// let (mut board, handle) = MockBoard::new(482031);
/// handle.set_input(1, true);
///
/// let mut input = board.create(ChannelDirection::Input);
/// input.set_channel(1).unwrap();
/// input.open_wait_for_attachment(1000).unwrap();
///
/// assert!(input.state().unwrap());
/// assert_eq!(input.device_serial_number(), 482031);
/// ```
#[derive(Debug, Clone)]
pub struct MockBoard {
    state: SharedState,
}

impl MockBoard {
    /// Create an attached board with the given serial number (-1 accepts
    /// any requested serial).
    pub fn new(serial_number: i32) -> (Self, MockBoardHandle) {
        let state = Arc::new(Mutex::new(BoardState {
            serial_number,
            attached: true,
            outputs: BTreeMap::new(),
            inputs: BTreeMap::new(),
            open_failures: HashSet::new(),
            write_failures: HashSet::new(),
            read_failures: HashSet::new(),
            events: Vec::new(),
            setup_calls: Vec::new(),
            open_attempts: 0,
            open_count: 0,
            close_count: 0,
        }));

        let board = Self {
            state: Arc::clone(&state),
        };
        (board, MockBoardHandle { state })
    }
}

impl ChannelFactory for MockBoard {
    type Channel = MockChannel;

    fn create(&mut self, direction: ChannelDirection) -> MockChannel {
        MockChannel {
            state: Arc::clone(&self.state),
            direction,
            index: None,
            requested_serial: -1,
            opened: false,
        }
    }
}

/// Channel on a [`MockBoard`].
#[derive(Debug)]
pub struct MockChannel {
    state: SharedState,
    direction: ChannelDirection,
    index: Option<u32>,
    requested_serial: i32,
    opened: bool,
}

impl MockChannel {
    fn record(&self, call: SetupCall) {
        lock(&self.state).setup_calls.push(call);
    }

    /// Index of an opened, attached channel.
    fn live_index(&self, board: &BoardState) -> DeviceResult<u32> {
        let index = match self.index {
            Some(index) if self.opened => index,
            _ => return Err(DeviceError::new(ErrorCode::Closed, "Channel closed")),
        };
        if !board.attached {
            return Err(DeviceError::not_attached());
        }
        Ok(index)
    }
}

impl DigitalChannel for MockChannel {
    fn set_is_remote(&mut self, is_remote: bool) -> DeviceResult<()> {
        self.record(SetupCall::IsRemote(is_remote));
        Ok(())
    }

    fn set_is_hub_port_device(&mut self, is_hub_port_device: bool) -> DeviceResult<()> {
        self.record(SetupCall::IsHubPortDevice(is_hub_port_device));
        Ok(())
    }

    fn set_hub_port(&mut self, hub_port: i32) -> DeviceResult<()> {
        self.record(SetupCall::HubPort(hub_port));
        Ok(())
    }

    fn set_device_serial_number(&mut self, serial_number: i32) -> DeviceResult<()> {
        self.record(SetupCall::DeviceSerialNumber(serial_number));
        self.requested_serial = serial_number;
        Ok(())
    }

    fn set_channel(&mut self, index: u32) -> DeviceResult<()> {
        self.record(SetupCall::Channel(index));
        self.index = Some(index);
        Ok(())
    }

    fn open_wait_for_attachment(&mut self, timeout_ms: u32) -> DeviceResult<()> {
        let mut board = lock(&self.state);
        board.setup_calls.push(SetupCall::Open(timeout_ms));
        board.open_attempts += 1;

        let Some(index) = self.index else {
            return Err(DeviceError::new(
                ErrorCode::InvalidArgument,
                "Channel index not set",
            ));
        };
        let serial_mismatch = self.requested_serial != -1
            && board.serial_number != -1
            && self.requested_serial != board.serial_number;
        if serial_mismatch
            || !board.attached
            || board.open_failures.contains(&(self.direction, index))
        {
            return Err(DeviceError::timeout());
        }

        if self.direction == ChannelDirection::Output {
            board.outputs.entry(index).or_insert(false);
        }
        board.open_count += 1;
        self.opened = true;
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.opened && lock(&self.state).attached
    }

    fn state(&self) -> DeviceResult<bool> {
        let board = lock(&self.state);
        let index = self.live_index(&board)?;
        if board.read_failures.contains(&(self.direction, index)) {
            return Err(DeviceError::new(ErrorCode::Unexpected, "Injected read failure"));
        }
        let levels = match self.direction {
            ChannelDirection::Output => &board.outputs,
            ChannelDirection::Input => &board.inputs,
        };
        Ok(levels.get(&index).copied().unwrap_or(false))
    }

    fn set_state(&mut self, state: bool) -> DeviceResult<()> {
        let mut board = lock(&self.state);
        let index = self.live_index(&board)?;
        if self.direction == ChannelDirection::Input {
            return Err(DeviceError::new(
                ErrorCode::InvalidArgument,
                "Cannot set the state of an input",
            ));
        }
        if board.write_failures.contains(&(index, state)) {
            return Err(DeviceError::new(ErrorCode::Unexpected, "Injected write failure"));
        }
        board.outputs.insert(index, state);
        board.events.push(BoardEvent {
            at: Instant::now(),
            index,
            state,
        });
        Ok(())
    }

    fn device_serial_number(&self) -> i32 {
        let board = lock(&self.state);
        if self.opened && board.serial_number != -1 {
            board.serial_number
        } else {
            self.requested_serial
        }
    }

    fn close(&mut self) -> DeviceResult<()> {
        lock(&self.state).close_count += 1;
        self.opened = false;
        Ok(())
    }
}

/// Handle for controlling a [`MockBoard`].
///
/// Cheap to clone; every clone controls the same board.
#[derive(Debug, Clone)]
pub struct MockBoardHandle {
    state: SharedState,
}

impl MockBoardHandle {
    /// Drive a digital input level.
    pub fn set_input(&self, index: u32, level: bool) {
        lock(&self.state).inputs.insert(index, level);
    }

    /// Current level of an opened output, `None` if it was never opened.
    pub fn output(&self, index: u32) -> Option<bool> {
        lock(&self.state).outputs.get(&index).copied()
    }

    /// Unplug the board; opened channels report not attached.
    pub fn detach(&self) {
        lock(&self.state).attached = false;
    }

    /// Plug the board back in.
    pub fn attach(&self) {
        lock(&self.state).attached = true;
    }

    /// Make opening this channel time out.
    pub fn fail_open(&self, direction: ChannelDirection, index: u32) {
        lock(&self.state).open_failures.insert((direction, index));
    }

    /// Make writing `state` to output `index` fail.
    pub fn fail_set_state(&self, index: u32, state: bool) {
        lock(&self.state).write_failures.insert((index, state));
    }

    /// Make reading this channel fail.
    pub fn fail_reads(&self, direction: ChannelDirection, index: u32) {
        lock(&self.state).read_failures.insert((direction, index));
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        let mut board = lock(&self.state);
        board.open_failures.clear();
        board.write_failures.clear();
        board.read_failures.clear();
    }

    /// Output transitions in write order.
    pub fn events(&self) -> Vec<BoardEvent> {
        lock(&self.state).events.clone()
    }

    /// Output transitions for one index, as `(instant, state)` pairs.
    pub fn events_for(&self, index: u32) -> Vec<(Instant, bool)> {
        lock(&self.state)
            .events
            .iter()
            .filter(|event| event.index == index)
            .map(|event| (event.at, event.state))
            .collect()
    }

    /// Connection setup calls across all channels, in call order.
    pub fn setup_calls(&self) -> Vec<SetupCall> {
        lock(&self.state).setup_calls.clone()
    }

    /// Open attempts, successful or not.
    pub fn open_attempts(&self) -> usize {
        lock(&self.state).open_attempts
    }

    /// Successful opens.
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).close_count
    }

    pub fn serial_number(&self) -> i32 {
        lock(&self.state).serial_number
    }
}
