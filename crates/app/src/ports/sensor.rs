//! Sensor source port — where device values come from.
//!
//! A source owns the devices it discovers only until it hands them to the
//! adapter. After that it refreshes them by id on every poll tick.

use mqthing_domain::device::Device;
use mqthing_domain::error::ThingError;
use mqthing_domain::time::Timestamp;

/// A pluggable producer of devices and their readings.
///
/// The adapter calls the methods in order:
///
/// 1. [`discover`](Self::discover) once, when the source is registered
/// 2. [`sample`](Self::sample) on every poll tick
pub trait SensorSource: Send + Sync {
    /// Unique name identifying this source (e.g. `"virtual"`).
    fn name(&self) -> &'static str;

    /// Build the devices this source feeds.
    ///
    /// # Errors
    ///
    /// Returns an error when a device definition is invalid.
    fn discover(&mut self) -> Result<Vec<Device>, ThingError>;

    /// Write fresh readings into the devices and queue any events.
    ///
    /// `devices` holds every registered device; sources look theirs up by id.
    ///
    /// # Errors
    ///
    /// Returns an error when a reading cannot be stored.
    fn sample(&mut self, devices: &mut [Device], now: Timestamp) -> Result<(), ThingError>;
}
