//! # mqthing-adapter-virtual
//!
//! Virtual/demo sensor source that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Id | Behaviour |
//! |--------|----|-----------|
//! | Virtual Energy Meter | `meter` | Noisy voltage/current/power readings, an energy counter, a `reset` action and an `overload` event |
//! | Virtual Relay | `relay` | Writable `on` switch that cuts the meter's load, writable `mode` enum |
//!
//! ## Dependency rule
//!
//! Depends on `mqthing-app` (port traits) and `mqthing-domain` only.

pub mod config;
mod devices;

pub use config::VirtualConfig;
pub use devices::{VirtualMeter, VirtualRelay};

use mqthing_app::ports::SensorSource;
use mqthing_domain::device::Device;
use mqthing_domain::error::ThingError;
use mqthing_domain::time::Timestamp;
use rand::SeedableRng;
use rand::rngs::StdRng;

use devices::METER_ID;

/// Sensor source feeding the simulated devices.
#[derive(Debug)]
pub struct VirtualSource {
    meter: VirtualMeter,
    relay: VirtualRelay,
    rng: StdRng,
}

impl VirtualSource {
    #[must_use]
    pub fn new(config: &VirtualConfig) -> Self {
        Self {
            meter: VirtualMeter::new(config.overload_threshold_w),
            relay: VirtualRelay::default(),
            rng: config
                .seed
                .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }
}

impl Default for VirtualSource {
    fn default() -> Self {
        Self::new(&VirtualConfig::default())
    }
}

impl SensorSource for VirtualSource {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn discover(&mut self) -> Result<Vec<Device>, ThingError> {
        Ok(vec![self.meter.device()?, self.relay.device()?])
    }

    fn sample(&mut self, devices: &mut [Device], now: Timestamp) -> Result<(), ThingError> {
        let load_on = self.relay.is_on();
        if let Some(meter) = devices.iter_mut().find(|d| d.id == METER_ID) {
            self.meter.sample(meter, load_on, now, &mut self.rng)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqthing_domain::value::Value;

    fn source() -> VirtualSource {
        VirtualSource::new(&VirtualConfig {
            seed: Some(1),
            ..VirtualConfig::default()
        })
    }

    #[test]
    fn should_return_virtual_as_name() {
        assert_eq!(source().name(), "virtual");
    }

    #[test]
    fn should_discover_meter_and_relay() {
        let devices = source().discover().unwrap();
        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["meter", "relay"]);
    }

    #[test]
    fn should_sample_meter_by_id() {
        let mut source = source();
        let mut devices = source.discover().unwrap();

        source.sample(&mut devices, mqthing_domain::time::now()).unwrap();

        let meter = &devices[0];
        assert!(meter.find_property("voltage").unwrap().has_changed());
    }

    #[test]
    fn should_cut_load_when_relay_is_switched_off() {
        let mut source = source();
        let mut devices = source.discover().unwrap();

        devices[1].set_property("on", Value::Boolean(false)).unwrap();
        source.sample(&mut devices, mqthing_domain::time::now()).unwrap();

        assert_eq!(
            devices[0].find_property("power").unwrap().value(),
            &Value::Number(0.0)
        );
    }

    #[test]
    fn should_ignore_missing_meter() {
        let mut source = source();
        let mut devices = Vec::new();
        assert!(source.sample(&mut devices, mqthing_domain::time::now()).is_ok());
    }
}
