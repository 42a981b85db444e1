//! Endpoint Resolution
//!
//! Small helpers over the host's enumeration capability. The controller
//! resolves the configured (possibly `None` = default) endpoint ids to
//! concrete devices at initialize time and remembers the resolved ids for
//! disconnect matching.

use sidetone_host::DeviceInfo;

/// Resolve an optional endpoint id against an enumeration snapshot.
///
/// `None` prefers the default-flagged device and falls back to the first
/// listed one, mirroring how the host itself routes unspecified clients.
pub(crate) fn resolve_endpoint<'a>(
    devices: &'a [DeviceInfo],
    id: Option<&str>,
) -> Option<&'a DeviceInfo> {
    match id {
        Some(id) => devices.iter().find(|d| d.id == id),
        None => devices
            .iter()
            .find(|d| d.is_default)
            .or_else(|| devices.first()),
    }
}
