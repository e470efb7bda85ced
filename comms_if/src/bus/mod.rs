//! # Bus
//!
//! The bus is a shared key/value store with publish/subscribe. Every value is a record serialised
//! with `serde_json` into the payload bytes. Processes read the latest value of a key with
//! [`Bus::get`], overwrite it with [`Bus::set`], and notify subscribers of a change with
//! [`Bus::publish`].
//!
//! The control software only depends on the [`Bus`] trait. A ZMQ client implements it for the
//! real bus server and [`MemBus`] implements it in memory for testing.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod frame;
mod mem;
pub mod records;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Serialize};

pub use mem::{MemBus, BusWrite, WriteOp};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Latest pose estimate of the rover, a [`records::PoseRecord`].
pub const KEY_POSE: &str = "rover_pose";

/// Latest velocity estimate of the rover, a [`records::PoseVelocityRecord`].
pub const KEY_POSE_VELOCITY: &str = "rover_pose_velocity";

/// Rover startup epoch in microseconds since the Unix epoch.
pub const KEY_STARTUP_TIMESTAMP: &str = "rover_startup_timestamp";

/// Wheel speed demands, a [`records::WheelVelocityCommand`].
pub const KEY_WHEEL_VELOCITY_COMMAND: &str = "rover_wheel_velocity_command";

/// Controller gains, a [`records::RoverParameters`].
pub const KEY_PARAMETERS: &str = "rover_parameters";

/// Point to point motion target, a [`records::MotionTarget`].
pub const KEY_MOTION_TARGET: &str = "rover_motion_target";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Access to the bus.
///
/// All calls are synchronous and must return within a bounded time, a call which cannot complete
/// in time returns [`BusError::Timeout`].
pub trait Bus {
    /// Get the latest payload stored under `key`, or `None` if the key has no value.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, BusError>;

    /// Store `payload` under `key`.
    fn set(&mut self, key: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Publish `payload` to the subscribers of `key`.
    fn publish(&mut self, key: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Subscribe to the messages published on `key`.
    fn subscribe(&mut self, key: &str) -> Result<(), BusError>;

    /// Return all messages received on subscribed keys since the last poll, oldest first.
    ///
    /// Never blocks.
    fn poll_subscribed(&mut self) -> Result<Vec<(String, Vec<u8>)>, BusError>;

    /// Get and deserialise the record stored under `key`.
    fn get_record<T>(&mut self, key: &str) -> Result<Option<T>, BusError>
    where
        Self: Sized,
        T: DeserializeOwned
    {
        match self.get(key)? {
            Some(payload) => decode(&payload).map(Some),
            None => Ok(None)
        }
    }

    /// Serialise a record, store it under `key` and publish it.
    fn set_and_publish<T>(&mut self, key: &str, record: &T) -> Result<(), BusError>
    where
        Self: Sized,
        T: Serialize
    {
        let payload = encode(record)?;
        self.set(key, &payload)?;
        self.publish(key, &payload)
    }
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by bus operations.
#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("The bus is not connected")]
    NotConnected,

    #[error("The bus did not respond in time")]
    Timeout,

    #[error("Could not send the request to the bus: {0}")]
    SendError(String),

    #[error("Could not receive the reply from the bus: {0}")]
    RecvError(String),

    #[error("The bus server rejected the request: {0}")]
    ServerError(String),

    #[error("Malformed reply from the bus: {0}")]
    MalformedReply(String),

    #[error("Could not serialize the record: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the record: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BusError {
    /// Returns true if the error is an I/O failure which may clear by itself, as opposed to bad
    /// data on the bus.
    pub fn is_transient(&self) -> bool {
        match self {
            BusError::NotConnected
            | BusError::Timeout
            | BusError::SendError(_)
            | BusError::RecvError(_)
            | BusError::ServerError(_)
            | BusError::MalformedReply(_) => true,
            BusError::SerializationError(_)
            | BusError::DeserializeError(_) => false
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Serialise a record into a bus payload.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, BusError> {
    serde_json::to_vec(record).map_err(BusError::SerializationError)
}

/// Deserialise a bus payload into a record.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, BusError> {
    serde_json::from_slice(payload).map_err(BusError::DeserializeError)
}

/// Parse the rover startup epoch payload.
///
/// The epoch is written by the rover as an integer, either as a bare JSON number or a quoted
/// string, in microseconds since the Unix epoch.
pub fn parse_startup_timestamp(payload: &[u8]) -> Result<i64, BusError> {
    let value: serde_json::Value = decode(payload)?;

    let epoch = match &value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None
    };

    match epoch {
        Some(e) if e > 0 => Ok(e),
        _ => Err(BusError::MalformedReply(format!(
            "{} is not a valid startup timestamp", value
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::records::*;

    #[test]
    fn test_parse_startup_timestamp() {
        assert_eq!(parse_startup_timestamp(b"1600000000000000").unwrap(), 1600000000000000);
        assert_eq!(parse_startup_timestamp(b"\"1600000000000000\"").unwrap(), 1600000000000000);
        assert!(parse_startup_timestamp(b"\"soon\"").is_err());
        assert!(parse_startup_timestamp(b"-5").is_err());
        assert!(parse_startup_timestamp(b"{").is_err());
    }

    #[test]
    fn test_record_helpers() {
        let mut bus = MemBus::new();

        assert!(bus.get_record::<WheelVelocityCommand>(KEY_WHEEL_VELOCITY_COMMAND)
            .unwrap()
            .is_none());

        let cmd = WheelVelocityCommand { timestamp: 12, velocity: [1, -2, 3, -4] };
        bus.set_and_publish(KEY_WHEEL_VELOCITY_COMMAND, &cmd).unwrap();

        let read: WheelVelocityCommand = bus.get_record(KEY_WHEEL_VELOCITY_COMMAND)
            .unwrap()
            .unwrap();
        assert_eq!(read, cmd);
        assert_eq!(bus.published(KEY_WHEEL_VELOCITY_COMMAND).len(), 1);
    }

    #[test]
    fn test_error_classes() {
        assert!(BusError::Timeout.is_transient());
        assert!(BusError::NotConnected.is_transient());

        let bad = decode::<PoseRecord>(b"{}").unwrap_err();
        assert!(!bad.is_transient());
    }
}
