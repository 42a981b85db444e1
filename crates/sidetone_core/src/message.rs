//! Message Types for Thread Communication
//!
//! Commands flow from the public API to the controller thread; each
//! state-changing command carries its own bounded(1) reply channel so the
//! caller gets a synchronous result with a timeout. Events flow from the
//! controller thread out to the shell.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use sidetone_host::{DeviceInfo, Direction, HostError};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::status::{EngineStatus, ErrorKind};

/// Reply channel for one synchronous operation.
pub(crate) type Reply<T> = Sender<EngineResult<T>>;

/// Commands processed by the controller thread.
pub(crate) enum Command {
    Initialize(EngineConfig, Reply<()>),

    Start(Reply<()>),

    Stop(Reply<()>),

    Uninitialize(Reply<()>),

    /// Compose a status snapshot.
    Status(Reply<EngineStatus>),

    /// Enumerate endpoints for one direction.
    ListDevices(Direction, Reply<Vec<DeviceInfo>>),

    /// Asynchronous failure reported by a stream's error callback.
    StreamFault(Direction, HostError),

    /// Terminate the controller thread.
    Shutdown,
}

/// Events sent from the engine to the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// The engine started or stopped streaming.
    StateChanged { running: bool },

    /// An error occurred.
    Error { kind: ErrorKind, message: String },

    /// A non-fatal condition worth surfacing (e.g. pro-audio scheduling
    /// unavailable). Streaming continues.
    Warning { message: String },

    /// A configured endpoint disappeared while streaming.
    DeviceDisconnected { id: String },
}

impl Event {
    /// Create an error event from any displayable error.
    pub fn error<E: std::fmt::Display>(kind: ErrorKind, err: E) -> Self {
        Event::Error {
            kind,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::StateChanged { running: true };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StateChanged"));

        let back: Event = serde_json::from_str(&json).unwrap();
        if let Event::StateChanged { running } = back {
            assert!(running);
        } else {
            panic!("Deserialization produced wrong variant");
        }
    }

    #[test]
    fn test_error_event() {
        let event = Event::error(ErrorKind::DeviceLost, "endpoint vanished");
        if let Event::Error { kind, message } = event {
            assert_eq!(kind, ErrorKind::DeviceLost);
            assert_eq!(message, "endpoint vanished");
        } else {
            panic!("Should be Error variant");
        }
    }

    #[test]
    fn test_disconnect_event_round_trip() {
        let event = Event::DeviceDisconnected {
            id: "usb-0001".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        if let Event::DeviceDisconnected { id } = back {
            assert_eq!(id, "usb-0001");
        } else {
            panic!("Wrong variant");
        }
    }
}
