//! iotschema.org presets for energy-metering data.
//!
//! A preset supplies the semantic `@type`, unit, title and description of a
//! property so device code only has to name the capability it belongs to.

use crate::schema::Annotations;

/// Measured quantity, each mapped to an iotschema.org data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IotDataType {
    Voltage,
    ActiveEnergy,
    ElectricCurrent,
    ActivePower,
    ReactivePower,
    /// Phase angle; not part of iotschema.org, carried for meters that report it.
    Angle,
}

impl IotDataType {
    #[must_use]
    pub fn at_type(self) -> &'static str {
        match self {
            Self::Voltage => "VoltageData",
            Self::ActiveEnergy => "ActiveEnergyData",
            Self::ElectricCurrent => "ElectricCurrentData",
            Self::ActivePower => "ActivePowerData",
            Self::ReactivePower => "ReactivePowerData",
            Self::Angle => "Angle",
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Voltage => "Volt",
            Self::ActiveEnergy => "WattHour",
            Self::ElectricCurrent => "Ampere",
            Self::ActivePower => "Watt",
            Self::ReactivePower => "VoltAmpereReactive",
            Self::Angle => "degree",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Voltage => "voltage",
            Self::ActiveEnergy => "energy",
            Self::ElectricCurrent => "electric current",
            Self::ActivePower => "power",
            Self::ReactivePower => "reactive power",
            Self::Angle => "angle",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Voltage => "Voltage(Volt)",
            Self::ActiveEnergy => "Energy(Wh)",
            Self::ElectricCurrent => "current in ampere",
            Self::ActivePower => "Power(W)",
            Self::ReactivePower => "Reactive power(VAR)",
            Self::Angle => "phase angle in degree",
        }
    }
}

/// An interaction pattern: a capability (e.g. `ActiveEnergyImported`) and
/// the kind of data it reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IotSchema {
    pub capability: String,
    pub data_type: IotDataType,
}

impl IotSchema {
    #[must_use]
    pub fn new(capability: impl Into<String>, data_type: IotDataType) -> Self {
        Self {
            capability: capability.into(),
            data_type,
        }
    }

    /// Annotations derived from the preset.
    #[must_use]
    pub fn annotations(&self) -> Annotations {
        Annotations {
            title: Some(self.data_type.title().to_string()),
            description: Some(self.data_type.description().to_string()),
            unit: Some(self.data_type.unit().to_string()),
            at_type: Some(format!("iot:{}", self.data_type.at_type())),
            ..Annotations::default()
        }
    }
}
