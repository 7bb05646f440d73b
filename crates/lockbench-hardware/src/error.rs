//! Error types for channel and device operations.
//!
//! Two layers are modelled here. [`DeviceError`] is what the vendor I/O
//! layer reports (an error code plus a description). [`HardwareError`] is
//! what registry and sequencer operations return to callers, wrapping a
//! `DeviceError` when the failure came from the board itself.

use crate::types::ChannelDirection;
use std::fmt;

/// Result type alias for registry and sequencer operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Result type alias for vendor device calls.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Error codes reported by the I/O board.
///
/// Numeric values follow the vendor's `EPHIDGET_*` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// No matching device attached within the open timeout.
    Timeout,
    /// The channel is not (or no longer) attached.
    NotAttached,
    /// The channel was used before being opened.
    Closed,
    /// Invalid argument passed to the device.
    InvalidArgument,
    /// Unexpected failure inside the device layer.
    Unexpected,
    /// Any other vendor code.
    Other(u32),
}

impl ErrorCode {
    /// Numeric vendor code.
    pub fn code(&self) -> u32 {
        match self {
            Self::Timeout => 0x03,
            Self::InvalidArgument => 0x15,
            Self::Unexpected => 0x1c,
            Self::Closed => 0x31,
            Self::NotAttached => 0x34,
            Self::Other(code) => *code,
        }
    }

    /// Symbolic vendor name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timeout => "EPHIDGET_TIMEOUT",
            Self::NotAttached => "EPHIDGET_NOTATTACHED",
            Self::Closed => "EPHIDGET_CLOSED",
            Self::InvalidArgument => "EPHIDGET_INVALIDARG",
            Self::Unexpected => "EPHIDGET_UNEXPECTED",
            Self::Other(_) => "EPHIDGET_UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure reported by the vendor device layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{description} (Code {code}, {})", .code.name())]
pub struct DeviceError {
    /// Vendor error code.
    pub code: ErrorCode,

    /// Vendor description of the failure.
    pub description: String,
}

impl DeviceError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "Timed Out")
    }

    /// Create a not-attached error.
    pub fn not_attached() -> Self {
        Self::new(ErrorCode::NotAttached, "Device not Attached")
    }

    /// Whether the failure is a vendor timeout.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }
}

/// Errors returned by registry and sequencer operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Logical channel name never declared in the channel map.
    #[error("Channel '{name}' not defined.")]
    UndefinedChannel { name: String },

    /// Logical channel declared, but opening it failed.
    #[error("Channel '{name}' defined but failed init.")]
    ChannelInitFailed { name: String },

    /// Channel exists but has the wrong direction for the operation.
    #[error("Channel '{name}' is not an {expected} channel, found {found}.")]
    WrongChannelType {
        name: String,
        expected: ChannelDirection,
        found: ChannelDirection,
    },

    /// Channel was opened but the device is not attached now.
    #[error("Channel '{name}' (S/N {serial_number}) not attached.")]
    ChannelNotAttached { name: String, serial_number: i32 },

    /// The board rejected a state read or write.
    #[error("Device operation '{operation}' failed on '{name}': {source}")]
    DeviceOperationFailed {
        name: String,
        operation: &'static str,
        #[source]
        source: DeviceError,
    },

    /// Malformed press/sequence arguments.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Channel map or device configuration could not be loaded.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HardwareError {
    /// Create an undefined channel error.
    pub fn undefined(name: impl Into<String>) -> Self {
        Self::UndefinedChannel { name: name.into() }
    }

    /// Create an init failed error.
    pub fn init_failed(name: impl Into<String>) -> Self {
        Self::ChannelInitFailed { name: name.into() }
    }

    /// Create a wrong channel type error.
    pub fn wrong_type(
        name: impl Into<String>,
        expected: ChannelDirection,
        found: ChannelDirection,
    ) -> Self {
        Self::WrongChannelType {
            name: name.into(),
            expected,
            found,
        }
    }

    /// Create a not attached error.
    pub fn not_attached(name: impl Into<String>, serial_number: i32) -> Self {
        Self::ChannelNotAttached {
            name: name.into(),
            serial_number,
        }
    }

    /// Wrap a vendor failure raised while operating on `name`.
    pub fn device(name: impl Into<String>, operation: &'static str, source: DeviceError) -> Self {
        Self::DeviceOperationFailed {
            name: name.into(),
            operation,
            source,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Errors caused by the channel map rather than the board.
    ///
    /// Retrying cannot fix these.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UndefinedChannel { .. }
                | Self::ChannelInitFailed { .. }
                | Self::WrongChannelType { .. }
        )
    }

    /// Whether the failure means the device is currently detached.
    pub fn is_not_attached(&self) -> bool {
        match self {
            Self::ChannelNotAttached { .. } => true,
            Self::DeviceOperationFailed { source, .. } => source.code == ErrorCode::NotAttached,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display() {
        let error = DeviceError::timeout();
        assert_eq!(error.to_string(), "Timed Out (Code 3, EPHIDGET_TIMEOUT)");
        assert!(error.is_timeout());

        let error = DeviceError::not_attached();
        assert_eq!(
            error.to_string(),
            "Device not Attached (Code 52, EPHIDGET_NOTATTACHED)"
        );
    }

    #[test]
    fn test_resolution_error_display() {
        assert_eq!(
            HardwareError::undefined("nope").to_string(),
            "Channel 'nope' not defined."
        );
        assert_eq!(
            HardwareError::init_failed("lock").to_string(),
            "Channel 'lock' defined but failed init."
        );
        assert_eq!(
            HardwareError::wrong_type("power_on", ChannelDirection::Output, ChannelDirection::Input)
                .to_string(),
            "Channel 'power_on' is not an output channel, found input."
        );
        assert_eq!(
            HardwareError::not_attached("key1", 12345).to_string(),
            "Channel 'key1' (S/N 12345) not attached."
        );
    }

    #[test]
    fn test_classification() {
        assert!(HardwareError::undefined("a").is_configuration_error());
        assert!(HardwareError::init_failed("a").is_configuration_error());
        assert!(!HardwareError::not_attached("a", -1).is_configuration_error());

        assert!(HardwareError::not_attached("a", -1).is_not_attached());
        assert!(HardwareError::device("a", "get_state", DeviceError::not_attached()).is_not_attached());
        assert!(!HardwareError::device("a", "get_state", DeviceError::timeout()).is_not_attached());
        assert!(!HardwareError::invalid_argument("x").is_not_attached());
    }

    #[test]
    fn test_other_code() {
        let code = ErrorCode::Other(0x99);
        assert_eq!(code.code(), 0x99);
        assert_eq!(code.name(), "EPHIDGET_UNKNOWN");
    }
}
