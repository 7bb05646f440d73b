//! Channel map and device connection configuration.
//!
//! The channel map binds logical names (`key3`, `lock`, `power_on`) to a
//! device key and a physical channel index, split into `outputs` and
//! `inputs`. Device configurations hold the connection parameters for each
//! device key. Both have built-in defaults describing the standard DUT
//! fixture; callers override device parameters per key with a shallow merge.
//!
//! # Examples
//!
//! ```
//! use lockbench_hardware::config::RegistryConfig;
//!
//! let config = RegistryConfig::from_json_str(r#"{
//!     "channels": {
//!         "outputs": { "lock": { "phidget_id": "main_phidget", "physical_channel": 10 } },
//!         "inputs":  { "power_on": { "device_key": "main_phidget", "physical_channel": 1 } }
//!     },
//!     "devices": { "main_phidget": { "serial_number": 482031 } }
//! }"#).unwrap();
//!
//! let main = config.devices.get("main_phidget").unwrap();
//! assert_eq!(main.serial_number, 482031);
//! assert_eq!(main.open_timeout_ms, 5000);
//! ```

use crate::{ChannelDirection, HardwareError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Device key used by the built-in channel map.
pub const DEFAULT_DEVICE_KEY: &str = "main_phidget";

/// Default time to wait for a channel to attach when opening it.
pub const DEFAULT_OPEN_TIMEOUT_MS: u32 = 5000;

/// Serial number wildcard: open any matching device.
pub const ANY_SERIAL_NUMBER: i32 = -1;

/// Hub port wildcard: open the device on any port.
pub const ANY_HUB_PORT: i32 = -1;

/// Where one logical channel lives.
///
/// Both fields are optional so an incomplete entry can be reported and
/// skipped instead of failing the whole map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    /// Device configuration key.
    #[serde(default, alias = "phidget_id")]
    pub device_key: Option<String>,

    /// Channel index on that device.
    #[serde(default)]
    pub physical_channel: Option<u32>,
}

impl ChannelMapping {
    pub fn new(device_key: impl Into<String>, physical_channel: u32) -> Self {
        Self {
            device_key: Some(device_key.into()),
            physical_channel: Some(physical_channel),
        }
    }
}

/// Logical channel names grouped by direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapConfig {
    #[serde(default)]
    pub outputs: BTreeMap<String, ChannelMapping>,

    #[serde(default)]
    pub inputs: BTreeMap<String, ChannelMapping>,
}

impl ChannelMapConfig {
    /// A map with no channels.
    pub fn empty() -> Self {
        Self {
            outputs: BTreeMap::new(),
            inputs: BTreeMap::new(),
        }
    }

    /// Add an output channel.
    pub fn with_output(mut self, name: impl Into<String>, device_key: &str, channel: u32) -> Self {
        self.outputs
            .insert(name.into(), ChannelMapping::new(device_key, channel));
        self
    }

    /// Add an input channel.
    pub fn with_input(mut self, name: impl Into<String>, device_key: &str, channel: u32) -> Self {
        self.inputs
            .insert(name.into(), ChannelMapping::new(device_key, channel));
        self
    }

    /// Add an entry as-is, including incomplete ones.
    pub fn with_mapping(
        mut self,
        direction: ChannelDirection,
        name: impl Into<String>,
        mapping: ChannelMapping,
    ) -> Self {
        let group = match direction {
            ChannelDirection::Output => &mut self.outputs,
            ChannelDirection::Input => &mut self.inputs,
        };
        group.insert(name.into(), mapping);
        self
    }

    /// Entries of one direction.
    pub fn group(&self, direction: ChannelDirection) -> &BTreeMap<String, ChannelMapping> {
        match direction {
            ChannelDirection::Output => &self.outputs,
            ChannelDirection::Input => &self.inputs,
        }
    }

    /// Whether `name` appears in either group, complete or not.
    pub fn is_declared(&self, name: &str) -> bool {
        self.outputs.contains_key(name) || self.inputs.contains_key(name)
    }

    /// Parse a channel map from JSON.
    ///
    /// # Errors
    /// Returns `HardwareError::Json` if the text is not a valid channel map.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a channel map from a JSON file.
    ///
    /// # Errors
    /// Returns `HardwareError::Io` if the file cannot be read and
    /// `HardwareError::Json` if it cannot be parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl Default for ChannelMapConfig {
    /// Standard fixture wiring: keypad keys and control relays on outputs
    /// 0-15, product detection and power sense on inputs 0-1.
    fn default() -> Self {
        let mut map = Self::empty();
        for digit in 0..10u32 {
            map = map.with_output(format!("key{digit}"), DEFAULT_DEVICE_KEY, digit);
        }
        map.with_output("lock", DEFAULT_DEVICE_KEY, 10)
            .with_output("unlock", DEFAULT_DEVICE_KEY, 11)
            .with_output("hold", DEFAULT_DEVICE_KEY, 12)
            .with_output("connect", DEFAULT_DEVICE_KEY, 13)
            .with_output("usb3", DEFAULT_DEVICE_KEY, 14)
            .with_output("barcode", DEFAULT_DEVICE_KEY, 15)
            .with_input("prod_inserted", DEFAULT_DEVICE_KEY, 0)
            .with_input("power_on", DEFAULT_DEVICE_KEY, 1)
    }
}

/// Connection parameters for one device key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device serial number, or [`ANY_SERIAL_NUMBER`].
    pub serial_number: i32,

    /// How long to wait for attachment when opening a channel.
    pub open_timeout_ms: u32,

    /// Whether the device is reached over the network server.
    pub is_remote: bool,

    /// Whether the device is a VINT hub port device.
    pub is_hub_port_device: bool,

    /// Hub port, or [`ANY_HUB_PORT`].
    pub hub_port: i32,

    /// Serial number of the parent hub, or -1 for none.
    pub parent_serial_number: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial_number: ANY_SERIAL_NUMBER,
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            is_remote: false,
            is_hub_port_device: false,
            hub_port: ANY_HUB_PORT,
            parent_serial_number: -1,
        }
    }
}

/// Partial device configuration; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfigPatch {
    #[serde(default)]
    pub serial_number: Option<i32>,
    #[serde(default)]
    pub open_timeout_ms: Option<u32>,
    #[serde(default)]
    pub is_remote: Option<bool>,
    #[serde(default)]
    pub is_hub_port_device: Option<bool>,
    #[serde(default)]
    pub hub_port: Option<i32>,
    #[serde(default)]
    pub parent_serial_number: Option<i32>,
}

impl DeviceConfigPatch {
    /// Overwrite the fields of `config` that this patch sets.
    pub fn apply_to(&self, config: &mut DeviceConfig) {
        if let Some(v) = self.serial_number {
            config.serial_number = v;
        }
        if let Some(v) = self.open_timeout_ms {
            config.open_timeout_ms = v;
        }
        if let Some(v) = self.is_remote {
            config.is_remote = v;
        }
        if let Some(v) = self.is_hub_port_device {
            config.is_hub_port_device = v;
        }
        if let Some(v) = self.hub_port {
            config.hub_port = v;
        }
        if let Some(v) = self.parent_serial_number {
            config.parent_serial_number = v;
        }
    }

    pub fn serial_number(mut self, serial_number: i32) -> Self {
        self.serial_number = Some(serial_number);
        self
    }

    pub fn open_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.open_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn remote(mut self, is_remote: bool) -> Self {
        self.is_remote = Some(is_remote);
        self
    }

    pub fn hub_port(mut self, hub_port: i32) -> Self {
        self.is_hub_port_device = Some(true);
        self.hub_port = Some(hub_port);
        self
    }

    pub fn parent_serial_number(mut self, serial_number: i32) -> Self {
        self.parent_serial_number = Some(serial_number);
        self
    }
}

/// Device configurations keyed by device key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceConfigs(BTreeMap<String, DeviceConfig>);

impl DeviceConfigs {
    /// Built-in defaults: a single `main_phidget` matching any serial number.
    pub fn defaults() -> Self {
        let mut configs = BTreeMap::new();
        configs.insert(DEFAULT_DEVICE_KEY.to_string(), DeviceConfig::default());
        Self(configs)
    }

    /// No devices at all.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Shallow per-key merge: a patch for a known key updates only the
    /// fields it sets, a patch for a new key starts from [`DeviceConfig::default`].
    pub fn merged<K, I>(mut self, patches: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, DeviceConfigPatch)>,
    {
        for (key, patch) in patches {
            let config = self.0.entry(key.into()).or_default();
            patch.apply_to(config);
        }
        self
    }

    /// Insert or replace a full configuration.
    pub fn with_device(mut self, key: impl Into<String>, config: DeviceConfig) -> Self {
        self.0.insert(key.into(), config);
        self
    }

    pub fn get(&self, key: &str) -> Option<&DeviceConfig> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceConfig)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a registry needs, as loaded from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub channels: ChannelMapConfig,
    pub devices: DeviceConfigs,
}

#[derive(Deserialize)]
struct RawRegistryConfig {
    #[serde(default)]
    channels: Option<ChannelMapConfig>,
    #[serde(default)]
    devices: BTreeMap<String, DeviceConfigPatch>,
}

impl RegistryConfig {
    /// Parse a configuration; a missing `channels` section selects the
    /// default channel map and `devices` entries patch the default devices.
    ///
    /// # Errors
    /// Returns `HardwareError::Json` on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawRegistryConfig = serde_json::from_str(json)?;
        Ok(Self {
            channels: raw.channels.unwrap_or_default(),
            devices: DeviceConfigs::defaults().merged(raw.devices),
        })
    }

    /// Load a configuration file.
    ///
    /// # Errors
    /// Returns `HardwareError::Io` / `HardwareError::Json` on failure, and
    /// `HardwareError::ConfigurationError` if the file declares no channels.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        if config.channels.outputs.is_empty() && config.channels.inputs.is_empty() {
            return Err(HardwareError::configuration(format!(
                "{} declares no channels",
                path.display()
            )));
        }
        Ok(config)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            channels: ChannelMapConfig::default(),
            devices: DeviceConfigs::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_channel_map() {
        let map = ChannelMapConfig::default();
        assert_eq!(map.outputs.len(), 16);
        assert_eq!(map.inputs.len(), 2);
        assert_eq!(map.outputs["key7"], ChannelMapping::new("main_phidget", 7));
        assert_eq!(map.outputs["barcode"].physical_channel, Some(15));
        assert_eq!(map.inputs["power_on"].physical_channel, Some(1));
        assert!(map.is_declared("prod_inserted"));
        assert!(!map.is_declared("eject"));
    }

    #[test]
    fn test_mapping_accepts_legacy_key() {
        let map = ChannelMapConfig::from_json_str(
            r#"{ "outputs": { "lock": { "phidget_id": "board_a", "physical_channel": 4 } } }"#,
        )
        .unwrap();
        assert_eq!(map.outputs["lock"], ChannelMapping::new("board_a", 4));
        assert!(map.inputs.is_empty());
    }

    #[test]
    fn test_mapping_missing_fields_parse_as_none() {
        let map = ChannelMapConfig::from_json_str(
            r#"{ "inputs": { "door": { "device_key": "board_a" } } }"#,
        )
        .unwrap();
        assert_eq!(map.inputs["door"].physical_channel, None);
        assert_eq!(map.inputs["door"].device_key.as_deref(), Some("board_a"));
    }

    #[test]
    fn test_merge_known_key_is_shallow() {
        let configs = DeviceConfigs::defaults().merged([(
            "main_phidget",
            DeviceConfigPatch::default().serial_number(1234),
        )]);
        let main = configs.get("main_phidget").unwrap();
        assert_eq!(main.serial_number, 1234);
        assert_eq!(main.open_timeout_ms, DEFAULT_OPEN_TIMEOUT_MS);
        assert!(!main.is_remote);
    }

    #[test]
    fn test_merge_new_key_starts_from_defaults() {
        let configs = DeviceConfigs::defaults().merged([(
            "hub_relay",
            DeviceConfigPatch::default().hub_port(2).open_timeout_ms(1000),
        )]);
        assert_eq!(configs.len(), 2);
        let relay = configs.get("hub_relay").unwrap();
        assert!(relay.is_hub_port_device);
        assert_eq!(relay.hub_port, 2);
        assert_eq!(relay.open_timeout_ms, 1000);
        assert_eq!(relay.serial_number, ANY_SERIAL_NUMBER);
    }

    #[test]
    fn test_registry_config_defaults_channels() {
        let config = RegistryConfig::from_json_str(r#"{ "devices": {} }"#).unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_registry_config_rejects_bad_json() {
        let err = RegistryConfig::from_json_str(r#"{ "devices": [1, 2] }"#).unwrap_err();
        assert!(matches!(err, HardwareError::Json(_)));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = RegistryConfig::from_path("/nonexistent/lockbench.json").unwrap_err();
        assert!(matches!(err, HardwareError::Io(_)));
    }
}
