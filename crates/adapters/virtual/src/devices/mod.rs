//! Virtual device implementations — energy meter and relay.
//!
//! Each device keeps a fixed id so it stays stable across restarts.

mod meter;
mod relay;

pub use meter::{DEVICE_ID as METER_ID, VirtualMeter};
pub use relay::VirtualRelay;

/// Round a reading to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
