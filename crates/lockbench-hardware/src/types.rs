//! Common types shared by the registry, sequencer and device traits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a digital channel.
///
/// Resolved from the channel map group a name is declared in, so the
/// registry never has to inspect a live handle to know what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelDirection {
    /// Relay-style digital output.
    Output,
    /// Digital input.
    Input,
}

impl ChannelDirection {
    /// Name of the channel map group holding channels of this direction.
    pub fn group(&self) -> &'static str {
        match self {
            Self::Output => "outputs",
            Self::Input => "inputs",
        }
    }
}

impl fmt::Display for ChannelDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => write!(f, "output"),
            Self::Input => write!(f, "input"),
        }
    }
}

/// Identity of one physical channel on one board.
///
/// At most one handle is opened per key; logical names that map to the same
/// key share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalKey {
    /// Device configuration key (e.g. `main_phidget`).
    pub device_key: String,

    /// Channel direction (the channel map group).
    pub direction: ChannelDirection,

    /// Channel index on the device.
    pub index: u32,
}

impl PhysicalKey {
    pub fn new(device_key: impl Into<String>, direction: ChannelDirection, index: u32) -> Self {
        Self {
            device_key: device_key.into(),
            direction,
            index,
        }
    }
}

impl fmt::Display for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DevKey '{}', Type '{}', PhysCh {}",
            self.device_key,
            self.direction.group(),
            self.index
        )
    }
}

/// Logic level label used in log messages.
pub(crate) fn level(state: bool) -> &'static str {
    if state { "HIGH" } else { "LOW" }
}

/// Last observed state of an input, reported when a wait times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastKnownState {
    High,
    Low,
    NotAttached,
    Unknown,
}

impl fmt::Display for LastKnownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Low => write!(f, "LOW"),
            Self::NotAttached => write!(f, "NOT ATTACHED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
