//! Virtual energy meter — voltage, current, power and an energy counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mqthing_domain::action::{ActionDefinition, ActionHandler, ActionInstance};
use mqthing_domain::device::Device;
use mqthing_domain::error::ThingError;
use mqthing_domain::event::{EventDefinition, EventInstance};
use mqthing_domain::iot_schema::{IotDataType, IotSchema};
use mqthing_domain::property::Property;
use mqthing_domain::time::Timestamp;
use mqthing_domain::value::{DataType, Value};
use rand::Rng;

use super::round2;

/// Device id of the meter.
pub const DEVICE_ID: &str = "meter";

const NOMINAL_VOLTAGE: f64 = 230.0;
const BASE_CURRENT: f64 = 4.0;
/// Chance per sample of a short load spike.
const SPIKE_PROBABILITY: f64 = 0.05;
const SPIKE_FACTOR: f64 = 5.0;

/// Flags the energy counter for reset on the next sample.
struct ResetEnergy {
    requested: Arc<AtomicBool>,
}

impl ActionHandler for ResetEnergy {
    fn perform(&self, instance: &ActionInstance) {
        self.requested.store(true, Ordering::SeqCst);
        tracing::info!(instance = %instance.id(), "energy reset requested");
    }
}

/// A simulated single-phase energy meter.
#[derive(Debug)]
pub struct VirtualMeter {
    overload_threshold_w: f64,
    reset_requested: Arc<AtomicBool>,
    energy_wh: f64,
    last_sample: Option<Timestamp>,
    overloaded: bool,
}

impl VirtualMeter {
    #[must_use]
    pub fn new(overload_threshold_w: f64) -> Self {
        Self {
            overload_threshold_w,
            reset_requested: Arc::new(AtomicBool::new(false)),
            energy_wh: 0.0,
            last_sample: None,
            overloaded: false,
        }
    }

    #[must_use]
    pub fn energy_wh(&self) -> f64 {
        self.energy_wh
    }

    /// Produce the [`Device`] descriptor.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a builder fails.
    pub fn device(&self) -> Result<Device, ThingError> {
        let mut device = Device::builder(DEVICE_ID)
            .title("Virtual Energy Meter")
            .description("Simulated single-phase energy meter")
            .at_type("EnergyMonitor")
            .build()?;

        let readings = [
            ("voltage", IotSchema::new("VoltageMeasurement", IotDataType::Voltage)),
            ("current", IotSchema::new("CurrentMeasurement", IotDataType::ElectricCurrent)),
            ("power", IotSchema::new("ActivePowerMeasurement", IotDataType::ActivePower)),
            ("energy", IotSchema::new("ActiveEnergyImported", IotDataType::ActiveEnergy)),
        ];
        for (id, schema) in &readings {
            device.add_property(
                Property::builder(*id, DataType::Number)
                    .iot_schema(schema)
                    .read_only(true)
                    .build()?,
            )?;
        }

        device.add_action(
            ActionDefinition::builder(
                "reset",
                Arc::new(ResetEnergy {
                    requested: Arc::clone(&self.reset_requested),
                }),
            )
            .title("Reset energy")
            .description("Set the energy counter back to zero")
            .build()?,
        )?;

        let mut overload = IotSchema::new("ActivePowerMeasurement", IotDataType::ActivePower)
            .annotations();
        overload.description = Some("Active power above the configured limit".to_string());
        device.add_event(EventDefinition::new("overload", DataType::Number)?.with_annotations(overload))?;

        Ok(device)
    }

    /// Take one reading and store it in `device`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a reading does not fit its property.
    pub fn sample(
        &mut self,
        device: &mut Device,
        load_on: bool,
        now: Timestamp,
        rng: &mut impl Rng,
    ) -> Result<(), ThingError> {
        if self.reset_requested.swap(false, Ordering::SeqCst) {
            self.energy_wh = 0.0;
            tracing::info!("energy counter reset");
        }

        let voltage = NOMINAL_VOLTAGE + rng.gen_range(-2.0..2.0);
        let current = if load_on {
            let current = BASE_CURRENT + rng.gen_range(-0.5..0.5);
            if rng.gen_bool(SPIKE_PROBABILITY) {
                current * SPIKE_FACTOR
            } else {
                current
            }
        } else {
            0.0
        };
        let power = voltage * current;

        if let Some(last) = self.last_sample {
            let elapsed = (now - last).to_std().unwrap_or_default();
            self.energy_wh += power * elapsed.as_secs_f64() / 3_600.0;
        }
        self.last_sample = Some(now);

        device.set_property("voltage", Value::Number(round2(voltage)))?;
        device.set_property("current", Value::Number(round2(current)))?;
        device.set_property("power", Value::Number(round2(power)))?;
        device.set_property("energy", Value::Number(round2(self.energy_wh)))?;

        let overloaded = power > self.overload_threshold_w;
        if overloaded && !self.overloaded {
            tracing::warn!(power, threshold = self.overload_threshold_w, "overload");
            device.queue_event(EventInstance::new("overload", Value::Number(round2(power)), now));
        }
        self.overloaded = overloaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn ts(hour: u32) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn number(device: &Device, id: &str) -> f64 {
        match device.find_property(id).unwrap().value() {
            Value::Number(n) => *n,
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn should_describe_meter_capabilities() {
        let device = VirtualMeter::new(3_680.0).device().unwrap();
        let ids: Vec<&str> = device.properties().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["energy", "power", "current", "voltage"]);
        assert!(device.find_action("reset").is_some());
        assert!(device.find_event("overload").is_some());
        assert!(device.properties().all(|p| !p.is_writable()));
    }

    #[test]
    fn should_produce_plausible_readings() {
        let mut meter = VirtualMeter::new(1_000_000.0);
        let mut device = meter.device().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        meter.sample(&mut device, true, ts(0), &mut rng).unwrap();

        let voltage = number(&device, "voltage");
        assert!((228.0..=232.0).contains(&voltage));
        assert!(number(&device, "power") > 0.0);
        assert!(device.find_property("voltage").unwrap().has_changed());
    }

    #[test]
    fn should_draw_no_power_when_load_is_off() {
        let mut meter = VirtualMeter::new(3_680.0);
        let mut device = meter.device().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        meter.sample(&mut device, false, ts(0), &mut rng).unwrap();

        assert!(number(&device, "current").abs() < f64::EPSILON);
        assert!(number(&device, "power").abs() < f64::EPSILON);
    }

    #[test]
    fn should_integrate_energy_over_time() {
        let mut meter = VirtualMeter::new(1_000_000.0);
        let mut device = meter.device().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        meter.sample(&mut device, true, ts(0), &mut rng).unwrap();
        assert!(meter.energy_wh().abs() < f64::EPSILON);

        meter.sample(&mut device, true, ts(1), &mut rng).unwrap();
        let power = number(&device, "power");
        assert!((meter.energy_wh() - power).abs() < 0.01);
    }

    #[test]
    fn should_reset_energy_when_action_runs() {
        let mut meter = VirtualMeter::new(1_000_000.0);
        let mut device = meter.device().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        meter.sample(&mut device, true, ts(0), &mut rng).unwrap();
        meter.sample(&mut device, true, ts(1), &mut rng).unwrap();
        assert!(meter.energy_wh() > 0.0);

        device
            .request_action(&json!({"reset": {}}))
            .unwrap()
            .start(ts(1));
        meter.sample(&mut device, true, ts(1), &mut rng).unwrap();

        assert!(meter.energy_wh().abs() < f64::EPSILON);
    }

    #[test]
    fn should_raise_overload_once_per_excursion() {
        let mut meter = VirtualMeter::new(0.0);
        let mut device = meter.device().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        meter.sample(&mut device, true, ts(0), &mut rng).unwrap();
        meter.sample(&mut device, true, ts(1), &mut rng).unwrap();
        assert_eq!(device.take_new_events().len(), 1);

        meter.sample(&mut device, false, ts(2), &mut rng).unwrap();
        meter.sample(&mut device, true, ts(3), &mut rng).unwrap();
        let events = device.take_new_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "overload");
    }
}
