//! Vendor device boundary.
//!
//! The registry talks to the I/O board only through these traits, so the
//! same registry code drives a real board binding or the in-process
//! [`MockBoard`](crate::mock::MockBoard).
//!
//! Device calls are synchronous: a state read or write is a single round
//! trip to the board, and closing must be possible from `Drop`. Anything
//! that waits (holds, pulses, input polling) lives in the sequencer and is
//! async.

use crate::error::DeviceResult;
use crate::types::ChannelDirection;

/// One digital output or digital input channel.
///
/// A channel is created unopened, configured with the connection setters,
/// then opened with [`open_wait_for_attachment`](Self::open_wait_for_attachment).
/// For input channels `set_state` is never called.
pub trait DigitalChannel: Send {
    /// Reach the device through the network server instead of USB.
    fn set_is_remote(&mut self, is_remote: bool) -> DeviceResult<()>;

    /// Mark the channel as a VINT hub port device.
    fn set_is_hub_port_device(&mut self, is_hub_port_device: bool) -> DeviceResult<()>;

    /// Hub port to bind to; -1 means any port.
    fn set_hub_port(&mut self, hub_port: i32) -> DeviceResult<()>;

    /// Device serial number to bind to; -1 means any device.
    fn set_device_serial_number(&mut self, serial_number: i32) -> DeviceResult<()>;

    /// Channel index on the device.
    fn set_channel(&mut self, index: u32) -> DeviceResult<()>;

    /// Open and block until attached or `timeout_ms` elapses.
    ///
    /// # Errors
    /// Returns a timeout error if no matching device attaches in time.
    fn open_wait_for_attachment(&mut self, timeout_ms: u32) -> DeviceResult<()>;

    /// Whether the device is attached right now.
    fn is_attached(&self) -> bool;

    /// Current logic level.
    fn state(&self) -> DeviceResult<bool>;

    /// Drive the output to `state`.
    fn set_state(&mut self, state: bool) -> DeviceResult<()>;

    /// Serial number of the attached device, or the configured one.
    fn device_serial_number(&self) -> i32;

    /// Release the channel. Valid whether or not it is attached.
    fn close(&mut self) -> DeviceResult<()>;
}

/// Creates unopened channels for the registry.
pub trait ChannelFactory {
    type Channel: DigitalChannel;

    /// New unopened channel of the given direction.
    fn create(&mut self, direction: ChannelDirection) -> Self::Channel;
}

impl<C: DigitalChannel + ?Sized> DigitalChannel for Box<C> {
    fn set_is_remote(&mut self, is_remote: bool) -> DeviceResult<()> {
        (**self).set_is_remote(is_remote)
    }

    fn set_is_hub_port_device(&mut self, is_hub_port_device: bool) -> DeviceResult<()> {
        (**self).set_is_hub_port_device(is_hub_port_device)
    }

    fn set_hub_port(&mut self, hub_port: i32) -> DeviceResult<()> {
        (**self).set_hub_port(hub_port)
    }

    fn set_device_serial_number(&mut self, serial_number: i32) -> DeviceResult<()> {
        (**self).set_device_serial_number(serial_number)
    }

    fn set_channel(&mut self, index: u32) -> DeviceResult<()> {
        (**self).set_channel(index)
    }

    fn open_wait_for_attachment(&mut self, timeout_ms: u32) -> DeviceResult<()> {
        (**self).open_wait_for_attachment(timeout_ms)
    }

    fn is_attached(&self) -> bool {
        (**self).is_attached()
    }

    fn state(&self) -> DeviceResult<bool> {
        (**self).state()
    }

    fn set_state(&mut self, state: bool) -> DeviceResult<()> {
        (**self).set_state(state)
    }

    fn device_serial_number(&self) -> i32 {
        (**self).device_serial_number()
    }

    fn close(&mut self) -> DeviceResult<()> {
        (**self).close()
    }
}
