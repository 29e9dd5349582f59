//! Virtual relay — a writable switch in front of the meter's load.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mqthing_domain::device::Device;
use mqthing_domain::error::ThingError;
use mqthing_domain::property::Property;
use mqthing_domain::value::{DataType, Value};

/// Device id of the relay.
pub const DEVICE_ID: &str = "relay";

/// A simulated relay. Writes to `on` switch the shared state the meter reads.
#[derive(Debug, Clone)]
pub struct VirtualRelay {
    on: Arc<AtomicBool>,
}

impl Default for VirtualRelay {
    fn default() -> Self {
        Self {
            on: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl VirtualRelay {
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Produce the [`Device`] descriptor.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a builder fails.
    pub fn device(&self) -> Result<Device, ThingError> {
        let mut device = Device::builder(DEVICE_ID)
            .title("Virtual Relay")
            .description("Switches the load measured by the virtual meter")
            .at_type("OnOffSwitch")
            .build()?;

        let state = Arc::clone(&self.on);
        device.add_property(
            Property::builder("on", DataType::Boolean)
                .title("On/Off")
                .description("Whether the load is powered")
                .capability("SwitchStatus")
                .value(Value::Boolean(self.is_on()))
                .on_write(Arc::new(move |value: &Value| {
                    if let Value::Boolean(on) = value {
                        state.store(*on, Ordering::SeqCst);
                        tracing::info!(on, "relay switched");
                    }
                }))
                .build()?,
        )?;

        device.add_property(
            Property::builder("mode", DataType::String)
                .title("Mode")
                .enum_values(["auto", "manual"])
                .value(Value::Text("auto".to_string()))
                .on_write(Arc::new(|value: &Value| {
                    tracing::info!(?value, "relay mode changed");
                }))
                .build()?,
        )?;

        Ok(device)
    }
}
