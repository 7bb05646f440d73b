//! Channel registry: opens every configured channel once and resolves
//! logical names to live handles.
//!
//! Construction never fails as a whole. A channel that cannot be opened is
//! recorded as failed under its physical key, so every logical name that
//! aliases it resolves to [`HardwareError::ChannelInitFailed`] instead of
//! retrying the open. The registry closes everything when dropped.

use crate::config::{ChannelMapConfig, DeviceConfig, DeviceConfigs, RegistryConfig};
use crate::traits::{ChannelFactory, DigitalChannel};
use crate::types::{ChannelDirection, PhysicalKey};
use crate::{DeviceResult, HardwareError, Result};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Logical channel names bound to opened physical channels.
///
/// # Examples
///
/// ```
/// use lockbench_hardware::config::{ChannelMapConfig, DeviceConfigs};
/// use lockbench_hardware::mock::MockBoard;
/// use lockbench_hardware::ChannelRegistry;
///
/// let (mut board, handle) = MockBoard::new(-1);
/// let map = ChannelMapConfig::empty().with_output("lock", "main_phidget", 10);
/// let mut registry = ChannelRegistry::open(&mut board, &map, DeviceConfigs::defaults());
///
/// registry.on("lock").unwrap();
/// assert_eq!(handle.output(10), Some(true));
///
/// registry.close_all();
/// assert_eq!(handle.output(10), Some(false));
/// ```
pub struct ChannelRegistry<C: DigitalChannel> {
    channel_map: ChannelMapConfig,
    devices: DeviceConfigs,
    /// `None` marks a physical channel whose open failed.
    opened: BTreeMap<PhysicalKey, Option<C>>,
    channels: BTreeMap<String, PhysicalKey>,
    closed: bool,
}

impl<C: DigitalChannel> ChannelRegistry<C> {
    /// Open every channel declared in `channel_map`.
    ///
    /// `devices` should already contain the built-in defaults merged with
    /// any per-key overrides (see [`DeviceConfigs::merged`]).
    pub fn open<F>(factory: &mut F, channel_map: &ChannelMapConfig, devices: DeviceConfigs) -> Self
    where
        F: ChannelFactory<Channel = C>,
    {
        debug!("Using device configurations: {:?}", devices);

        let mut registry = Self {
            channel_map: channel_map.clone(),
            devices,
            opened: BTreeMap::new(),
            channels: BTreeMap::new(),
            closed: false,
        };

        for direction in [ChannelDirection::Output, ChannelDirection::Input] {
            for (name, mapping) in channel_map.group(direction) {
                let (Some(device_key), Some(index)) =
                    (mapping.device_key.as_deref(), mapping.physical_channel)
                else {
                    warn!("Skip '{}': missing device_key/physical_channel.", name);
                    continue;
                };

                let key = PhysicalKey::new(device_key, direction, index);
                if !registry.opened.contains_key(&key) {
                    let channel = registry.open_physical(factory, name, &key);
                    registry.opened.insert(key.clone(), channel);
                } else {
                    debug!("Channel '{}' shares {}", name, key);
                }

                if matches!(registry.opened.get(&key), Some(None)) {
                    warn!("Channel '{}' failed init.", name);
                }
                registry.channels.insert(name.clone(), key);
            }
        }

        info!(
            "Channel registry ready: {} channels, {} opened, {} failed",
            registry.channels.len(),
            registry.opened_count(),
            registry.failed_count()
        );
        registry
    }

    /// Open the channels of a loaded [`RegistryConfig`].
    pub fn from_config<F>(factory: &mut F, config: RegistryConfig) -> Self
    where
        F: ChannelFactory<Channel = C>,
    {
        Self::open(factory, &config.channels, config.devices)
    }

    fn open_physical<F>(&self, factory: &mut F, name: &str, key: &PhysicalKey) -> Option<C>
    where
        F: ChannelFactory<Channel = C>,
    {
        let Some(config) = self.devices.get(&key.device_key) else {
            error!(
                "No device configuration for DevKey '{}' ({} '{}').",
                key.device_key, key.direction, name
            );
            return None;
        };

        debug!(
            "Opening {} '{}' (DevKey: {}, PhysChan: {}) with timeout {}ms",
            key.direction, name, key.device_key, key.index, config.open_timeout_ms
        );

        let mut channel = factory.create(key.direction);
        match connect(&mut channel, key, config) {
            Ok(()) => {
                debug!(
                    "Opened '{}'. S/N: {}, Ch: {}, Remote: {}",
                    name,
                    channel.device_serial_number(),
                    key.index,
                    config.is_remote
                );
                Some(channel)
            }
            Err(e) => {
                let hint = if e.is_timeout() {
                    ". Check connection/settings."
                } else {
                    ""
                };
                error!(
                    "Error opening {} '{}' (DevKey {}, Ch {}): {}{}",
                    key.direction, name, key.device_key, key.index, e, hint
                );
                None
            }
        }
    }

    /// Whether `name` appears in the channel map, opened or not.
    pub fn is_declared(&self, name: &str) -> bool {
        self.channel_map.is_declared(name)
    }

    /// Whether `name` resolves to an opened, currently attached channel.
    pub fn is_available(&self, name: &str) -> bool {
        self.channel(name).is_some_and(|channel| channel.is_attached())
    }

    /// Logical names with a complete mapping, in sorted order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Number of physical channels opened successfully.
    pub fn opened_count(&self) -> usize {
        self.opened.values().filter(|slot| slot.is_some()).count()
    }

    /// Number of physical channels whose open failed.
    pub fn failed_count(&self) -> usize {
        self.opened.values().filter(|slot| slot.is_none()).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Effective device configurations after merging overrides.
    pub fn device_configs(&self) -> &DeviceConfigs {
        &self.devices
    }

    /// Direction of a resolved name, if it has a complete mapping.
    pub fn direction_of(&self, name: &str) -> Option<ChannelDirection> {
        self.channels.get(name).map(|key| key.direction)
    }

    /// Run the resolution checks in order: declared, opened, direction,
    /// attached.
    fn checked_key(&self, name: &str, expected: ChannelDirection) -> Result<&PhysicalKey> {
        let Some(key) = self.channels.get(name) else {
            return Err(if self.is_declared(name) && !self.closed {
                HardwareError::init_failed(name)
            } else {
                HardwareError::undefined(name)
            });
        };
        let Some(channel) = self.opened.get(key).and_then(Option::as_ref) else {
            return Err(HardwareError::init_failed(name));
        };
        if key.direction != expected {
            return Err(HardwareError::wrong_type(name, expected, key.direction));
        }
        if !channel.is_attached() {
            let serial_number = channel.device_serial_number();
            error!(
                "Channel '{}' (S/N {}, Ch {}) not attached.",
                name, serial_number, key.index
            );
            return Err(HardwareError::not_attached(name, serial_number));
        }
        Ok(key)
    }

    /// Resolve `name` to a live channel of the expected direction.
    ///
    /// # Errors
    /// `UndefinedChannel`, `ChannelInitFailed`, `WrongChannelType` or
    /// `ChannelNotAttached`, checked in that order.
    pub(crate) fn resolve(&self, name: &str, expected: ChannelDirection) -> Result<&C> {
        let key = self.checked_key(name, expected)?;
        self.opened
            .get(key)
            .and_then(Option::as_ref)
            .ok_or_else(|| HardwareError::init_failed(name))
    }

    /// Mutable variant of [`resolve`](Self::resolve).
    pub(crate) fn resolve_mut(&mut self, name: &str, expected: ChannelDirection) -> Result<&mut C> {
        let key = self.checked_key(name, expected)?.clone();
        self.opened
            .get_mut(&key)
            .and_then(Option::as_mut)
            .ok_or_else(|| HardwareError::init_failed(name))
    }

    /// The opened channel behind `name`, attached or not.
    pub(crate) fn channel(&self, name: &str) -> Option<&C> {
        self.channels
            .get(name)
            .and_then(|key| self.opened.get(key))
            .and_then(Option::as_ref)
    }

    /// Turn off active outputs and close every opened channel.
    ///
    /// Failures are logged and counted, never returned. Calling this again
    /// is a no-op.
    pub fn close_all(&mut self) {
        if self.closed {
            debug!("Channel registry already closed");
            return;
        }

        let mut closed = 0usize;
        let mut failed = 0usize;

        for (key, slot) in std::mem::take(&mut self.opened) {
            let Some(mut channel) = slot else {
                continue;
            };

            if channel.is_attached() {
                if key.direction == ChannelDirection::Output
                    && let Err(e) = release(&mut channel, &key)
                {
                    error!("Error turning off {} before close: {}", key, e);
                    failed += 1;
                }
            } else {
                debug!("{} not attached/already closed.", key);
            }

            match channel.close() {
                Ok(()) => closed += 1,
                Err(e) => {
                    error!("Error closing {}: {}", key, e);
                    failed += 1;
                }
            }
        }

        self.channels.clear();
        self.closed = true;
        info!("Channel close complete. Closed: {}, Errors: {}.", closed, failed);
    }
}

impl<C: DigitalChannel> Drop for ChannelRegistry<C> {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl<C: DigitalChannel> std::fmt::Debug for ChannelRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels.len())
            .field("opened", &self.opened_count())
            .field("failed", &self.failed_count())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Apply connection parameters in vendor order, then open.
fn connect<C: DigitalChannel>(
    channel: &mut C,
    key: &PhysicalKey,
    config: &DeviceConfig,
) -> DeviceResult<()> {
    channel.set_is_remote(config.is_remote)?;
    if !config.is_remote && config.is_hub_port_device {
        channel.set_is_hub_port_device(true)?;
        if config.hub_port == crate::config::ANY_HUB_PORT {
            debug!("Hub port for {} is any.", key.device_key);
        }
        channel.set_hub_port(config.hub_port)?;
        if config.parent_serial_number != -1 {
            debug!(
                "Parent S/N {} for {}.",
                config.parent_serial_number, key.device_key
            );
        }
    }
    channel.set_device_serial_number(config.serial_number)?;
    if config.serial_number == crate::config::ANY_SERIAL_NUMBER {
        debug!(
            "No S/N for {} '{}'. Will open any.",
            if config.is_remote { "remote" } else { "local" },
            key.device_key
        );
    }
    channel.set_channel(key.index)?;
    channel.open_wait_for_attachment(config.open_timeout_ms)
}

/// Force an active output off.
fn release<C: DigitalChannel>(
    channel: &mut C,
    key: &PhysicalKey,
) -> DeviceResult<()> {
    if channel.state()? {
        debug!("OFF output {} pre-close.", key);
        channel.set_state(false)?;
    }
    Ok(())
}
