//! Device Monitor
//!
//! Watches the host's endpoint lists for hot-plug changes. The controller
//! polls on its tick; the first poll primes the snapshot without raising
//! changes, so devices present at startup are not reported as additions.

use std::time::{Duration, Instant};

use sidetone_host::{AudioHost, DeviceInfo, Direction};

/// One observed change in the device population.
#[derive(Debug, Clone)]
pub(crate) enum DeviceChange {
    Added(Direction, DeviceInfo),
    Removed(Direction, String),
}

pub(crate) struct DeviceMonitor {
    interval: Duration,
    last_poll: Option<Instant>,
    known_capture: Vec<DeviceInfo>,
    known_playback: Vec<DeviceInfo>,
    primed: bool,
}

impl DeviceMonitor {
    pub fn new(interval: Duration) -> Self {
        DeviceMonitor {
            interval,
            last_poll: None,
            known_capture: Vec::new(),
            known_playback: Vec::new(),
            primed: false,
        }
    }

    /// Diff the host's current lists against the last snapshot. Returns
    /// nothing until `interval` has elapsed since the previous poll.
    pub fn poll<H: AudioHost>(&mut self, host: &H, now: Instant) -> Vec<DeviceChange> {
        if let Some(last) = self.last_poll {
            if now.duration_since(last) < self.interval {
                return Vec::new();
            }
        }
        self.last_poll = Some(now);

        let mut changes = Vec::new();
        for direction in [Direction::Capture, Direction::Playback] {
            // An enumeration failure is transient; keep the old snapshot
            // rather than reporting every device as removed.
            let current = match host.list_devices(direction) {
                Ok(devices) => devices,
                Err(_) => continue,
            };

            let known = match direction {
                Direction::Capture => &mut self.known_capture,
                Direction::Playback => &mut self.known_playback,
            };

            if self.primed {
                for device in &current {
                    if !known.iter().any(|k| k.id == device.id) {
                        changes.push(DeviceChange::Added(direction, device.clone()));
                    }
                }
                for device in known.iter() {
                    if !current.iter().any(|c| c.id == device.id) {
                        changes.push(DeviceChange::Removed(direction, device.id.clone()));
                    }
                }
            }

            *known = current;
        }
        self.primed = true;
        changes
    }
}
