//! The symbolic command table.
//!
//! A closed [`Command`] enum maps every read command to its cache field and
//! every write command to the instrument resource path carrying the value.
//! Both directions are exhaustive matches, so adding a command without
//! wiring it up fails to compile.

use crate::acquisition::AcquisitionState;
use crate::cache::{ParameterCache, MAX_CHANNELS};
use crate::error::{RgaError, RgaResult};
use crate::protocol::endpoints::{ChannelMode, Filament};

/// Typed value carried by driver reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned integer.
    UInt(u32),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Text(String),
    /// Array of samples or axis points.
    FloatArray(Vec<f32>),
}

impl Value {
    /// Numeric view, if the value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::UInt(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) | Value::FloatArray(_) => None,
        }
    }

    /// Integer view, if the value is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::UInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(*v),
            Value::Float(_) | Value::Text(_) | Value::FloatArray(_) => None,
        }
    }

    /// String view, if the value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Every command the host framework can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Command {
    // Communication
    Ip,
    Mac,
    // Sensor info
    SensorName,
    SensorDescription,
    SensorSerial,
    // Device status
    SystemStatus,
    HardwareErrors,
    HardwareWarnings,
    PowerOnTime,
    EmissionOnTime,
    EmOnTime,
    EmCmlOnTime,
    EmPressTrips,
    FilamentCmlOnTime,
    FilamentPressTrips,
    // Diagnostic data
    BoxTemperature,
    AnodePotential,
    EmissionCurrent,
    FocusPotential,
    ElectronEnergy,
    FilamentPotential,
    FilamentCurrent,
    EmPotential,
    // Measurement
    TotalPressure,
    ScanData,
    MassAxis,
    LeakCheckValue,
    // Scan info
    FirstScan,
    LastScan,
    CurrentScan,
    PointsPerScan,
    ScanStatus,
    // Sensor detector
    EmVoltage,
    EmVoltageMax,
    EmVoltageMin,
    EmGain,
    EmGainMass,
    // Sensor filter
    MassMax,
    MassMin,
    DwellMax,
    DwellMin,
    RodPolarity,
    // Ion source
    FilamentSelected,
    EmissionLevel,
    OpticsType,
    SensitivityFactor,
    IonEnergy,
    // Scan setup
    ChannelMode,
    ChannelStartMass,
    ChannelStopMass,
    ChannelDwell,
    ChannelPpamu,
    ChannelEnabled,
    StartStopChannel,
    ScanCount,
    ScanStart,
    ScanStop,
    // Driver-level
    DriverState,
    MonitorStart,
    LeakCheckStart,
    AcquisitionStop,
}

fn filament(cache: &ParameterCache, index: usize) -> RgaResult<&Filament> {
    cache
        .status
        .filaments
        .get(index.wrapping_sub(1))
        .ok_or(RgaError::InvalidFilament(index))
}

fn check_channel(channel: usize) -> RgaResult<usize> {
    if channel == 0 || channel > MAX_CHANNELS {
        return Err(RgaError::InvalidChannel(channel));
    }
    Ok(channel)
}

/// Look up the cached value for a read command.
///
/// `channel` addresses channel- or filament-indexed commands and is ignored
/// otherwise. Write-only commands are rejected without touching the cache.
pub fn read_value(
    cache: &ParameterCache,
    state: AcquisitionState,
    command: Command,
    channel: usize,
) -> RgaResult<Value> {
    let value = match command {
        Command::Ip => Value::Text(cache.comm.ip.clone()),
        Command::Mac => Value::Text(cache.comm.mac.clone()),
        Command::SensorName => Value::Text(cache.sensor_info.name.clone()),
        Command::SensorDescription => Value::Text(cache.sensor_info.description.clone()),
        Command::SensorSerial => Value::UInt(cache.sensor_info.serial_number),
        Command::SystemStatus => Value::UInt(cache.status.system_status),
        Command::HardwareErrors => Value::UInt(cache.status.hardware_errors),
        Command::HardwareWarnings => Value::UInt(cache.status.hardware_warnings),
        Command::PowerOnTime => Value::Float(cache.status.power_on_time_hours),
        Command::EmissionOnTime => Value::Float(cache.status.emission_on_time_hours),
        Command::EmOnTime => Value::Float(cache.status.em_on_time_hours),
        Command::EmCmlOnTime => Value::Float(cache.status.em_cml_on_time_hours),
        Command::EmPressTrips => Value::UInt(cache.status.em_press_trips),
        Command::FilamentCmlOnTime => Value::Float(filament(cache, channel)?.cml_on_time_hours),
        Command::FilamentPressTrips => Value::UInt(filament(cache, channel)?.press_trips),
        Command::BoxTemperature => Value::Float(cache.diagnostics.box_temperature),
        Command::AnodePotential => Value::UInt(cache.diagnostics.anode_potential),
        Command::EmissionCurrent => Value::UInt(cache.diagnostics.emission_current),
        Command::FocusPotential => Value::UInt(cache.diagnostics.focus_potential),
        Command::ElectronEnergy => Value::UInt(cache.diagnostics.electron_energy),
        Command::FilamentPotential => Value::UInt(cache.diagnostics.filament_potential),
        Command::FilamentCurrent => Value::UInt(cache.diagnostics.filament_current),
        Command::EmPotential => Value::UInt(cache.diagnostics.em_potential),
        Command::TotalPressure => Value::Float(cache.total_pressure),
        Command::ScanData => Value::FloatArray(cache.scan.sample_slice().to_vec()),
        Command::MassAxis => Value::FloatArray(cache.scan.axis_slice().to_vec()),
        Command::LeakCheckValue => Value::Float(cache.leak_check_value),
        Command::FirstScan => Value::Int(i64::from(cache.scan_info.first_scan)),
        Command::LastScan => Value::Int(i64::from(cache.scan_info.last_scan)),
        Command::CurrentScan => Value::Int(i64::from(cache.scan_info.current_scan)),
        Command::PointsPerScan => Value::UInt(cache.scan_info.points_per_scan),
        Command::ScanStatus => Value::UInt(u32::from(cache.scan_info.scanning)),
        Command::EmVoltage => Value::UInt(cache.detector.em_voltage),
        Command::EmVoltageMax => Value::UInt(cache.detector.em_voltage_max),
        Command::EmVoltageMin => Value::UInt(cache.detector.em_voltage_min),
        Command::EmGain => Value::Float(cache.detector.em_gain),
        Command::EmGainMass => Value::UInt(cache.detector.em_gain_mass),
        Command::MassMax => Value::Float(cache.filter.mass_max),
        Command::MassMin => Value::Float(cache.filter.mass_min),
        Command::DwellMax => Value::UInt(cache.filter.dwell_max),
        Command::DwellMin => Value::UInt(cache.filter.dwell_min),
        Command::RodPolarity => Value::UInt(cache.filter.rod_polarity),
        Command::FilamentSelected => Value::UInt(cache.ion_source.filament_selected),
        Command::EmissionLevel => Value::Text(cache.ion_source.emission_level.as_str().to_owned()),
        Command::OpticsType => Value::Text(cache.ion_source.optics_type.as_str().to_owned()),
        Command::SensitivityFactor => Value::Float(cache.ion_source.sensitivity_factor),
        Command::IonEnergy => Value::UInt(cache.ion_source.ion_energy),
        Command::ChannelMode => Value::Text(cache.channel(channel)?.mode.as_str().to_owned()),
        Command::ChannelStartMass => Value::Float(cache.channel(channel)?.start_mass),
        Command::ChannelStopMass => Value::Float(cache.channel(channel)?.stop_mass),
        Command::ChannelDwell => Value::UInt(cache.channel(channel)?.dwell),
        Command::ChannelPpamu => Value::UInt(cache.channel(channel)?.ppamu),
        Command::ChannelEnabled => Value::UInt(u32::from(cache.channel(channel)?.enabled)),
        Command::DriverState => Value::UInt(state.code()),
        Command::StartStopChannel
        | Command::ScanCount
        | Command::ScanStart
        | Command::ScanStop
        | Command::MonitorStart
        | Command::LeakCheckStart
        | Command::AcquisitionStop => {
            return Err(RgaError::WriteOnly(format!("{command:?}")));
        }
    };
    Ok(value)
}

fn invalid(command: Command, reason: &str) -> RgaError {
    RgaError::InvalidValue {
        command: format!("{command:?}"),
        reason: reason.to_string(),
    }
}

fn uint_arg(command: Command, value: &Value) -> RgaResult<i64> {
    let v = value
        .as_i64()
        .ok_or_else(|| invalid(command, "expected an integer"))?;
    if v < 0 {
        return Err(invalid(command, "expected a non-negative integer"));
    }
    Ok(v)
}

/// Encode a write command into the instrument resource path carrying the
/// value as a query-style suffix.
///
/// Driver-level commands (monitor/leak-check start, acquisition stop) are
/// sequenced by the driver itself and rejected here; read commands are
/// rejected as read-only.
pub fn write_path(command: Command, channel: usize, value: &Value) -> RgaResult<String> {
    let path = match command {
        Command::ChannelMode => {
            let text = value
                .as_text()
                .ok_or_else(|| invalid(command, "expected a mode string"))?;
            let mode = ChannelMode::from_literal(text)
                .ok_or_else(|| invalid(command, "expected 'Sweep' or 'SingleMass'"))?;
            format!(
                "/mmsp/scanSetup/channel/{}/channelMode/set?{}",
                check_channel(channel)?,
                mode.as_str()
            )
        }
        Command::ChannelStartMass => {
            let mass = value
                .as_f64()
                .ok_or_else(|| invalid(command, "expected a mass"))?;
            format!(
                "/mmsp/scanSetup/channel/{}/startMass/set?{mass}",
                check_channel(channel)?
            )
        }
        Command::ChannelStopMass => {
            let mass = value
                .as_f64()
                .ok_or_else(|| invalid(command, "expected a mass"))?;
            format!(
                "/mmsp/scanSetup/channel/{}/stopMass/set?{mass}",
                check_channel(channel)?
            )
        }
        Command::ChannelDwell => {
            let dwell = uint_arg(command, value)?;
            format!(
                "/mmsp/scanSetup/channel/{}/dwell/set?{dwell}",
                check_channel(channel)?
            )
        }
        Command::ChannelPpamu => {
            let ppamu = uint_arg(command, value)?;
            format!(
                "/mmsp/scanSetup/channel/{}/ppamu/set?{ppamu}",
                check_channel(channel)?
            )
        }
        Command::ChannelEnabled => {
            let enabled = uint_arg(command, value)? != 0;
            format!(
                "/mmsp/scanSetup/channel/{}/enabled/set?{}",
                check_channel(channel)?,
                if enabled { "on" } else { "off" }
            )
        }
        Command::StartStopChannel => {
            let start = check_channel(channel)?;
            let stop = value
                .as_i64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| invalid(command, "expected a stop channel"))?;
            let stop = check_channel(stop)?;
            format!("/mmsp/scanSetup/set?startChannel={start}&stopChannel={stop}")
        }
        Command::ScanCount => {
            let count = value
                .as_i64()
                .ok_or_else(|| invalid(command, "expected a scan count"))?;
            format!("/mmsp/scanSetup/scanCount/set?{count}")
        }
        Command::ScanStart => "/mmsp/scanSetup/scanStart/set?1".to_string(),
        Command::ScanStop => {
            let mode = uint_arg(command, value)?;
            format!("/mmsp/scanSetup/scanStop/set?{mode}")
        }
        Command::MonitorStart | Command::LeakCheckStart | Command::AcquisitionStop => {
            return Err(RgaError::State(format!(
                "{command:?} is sequenced by the driver, not a raw resource write"
            )));
        }
        Command::Ip
        | Command::Mac
        | Command::SensorName
        | Command::SensorDescription
        | Command::SensorSerial
        | Command::SystemStatus
        | Command::HardwareErrors
        | Command::HardwareWarnings
        | Command::PowerOnTime
        | Command::EmissionOnTime
        | Command::EmOnTime
        | Command::EmCmlOnTime
        | Command::EmPressTrips
        | Command::FilamentCmlOnTime
        | Command::FilamentPressTrips
        | Command::BoxTemperature
        | Command::AnodePotential
        | Command::EmissionCurrent
        | Command::FocusPotential
        | Command::ElectronEnergy
        | Command::FilamentPotential
        | Command::FilamentCurrent
        | Command::EmPotential
        | Command::TotalPressure
        | Command::ScanData
        | Command::MassAxis
        | Command::LeakCheckValue
        | Command::FirstScan
        | Command::LastScan
        | Command::CurrentScan
        | Command::PointsPerScan
        | Command::ScanStatus
        | Command::EmVoltage
        | Command::EmVoltageMax
        | Command::EmVoltageMin
        | Command::EmGain
        | Command::EmGainMass
        | Command::MassMax
        | Command::MassMin
        | Command::DwellMax
        | Command::DwellMin
        | Command::RodPolarity
        | Command::FilamentSelected
        | Command::EmissionLevel
        | Command::OpticsType
        | Command::SensitivityFactor
        | Command::IonEnergy
        | Command::DriverState => {
            return Err(RgaError::ReadOnly(format!("{command:?}")));
        }
    };
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::endpoints::ChannelMode as Mode;

    fn populated_cache() -> ParameterCache {
        let mut cache = ParameterCache::new();
        cache.comm.ip = "192.168.1.100".to_string();
        cache.sensor_info.serial_number = 4711;
        cache.detector.em_gain_mass = 28;
        cache.total_pressure = 3.2e-8;
        cache.scan_info.last_scan = 5;
        cache.scan_info.scanning = true;
        cache.channels[1].start_mass = 12.5;
        cache.channels[1].mode = Mode::SingleMass;
        cache.status.filaments.push(crate::protocol::endpoints::Filament {
            id: 1,
            cml_on_time_hours: 2.0,
            press_trips: 1,
        });
        cache
    }

    #[test]
    fn test_read_values_from_cache() {
        let cache = populated_cache();
        let state = AcquisitionState::Monitoring;

        assert_eq!(
            read_value(&cache, state, Command::Ip, 0).unwrap(),
            Value::Text("192.168.1.100".to_string())
        );
        assert_eq!(
            read_value(&cache, state, Command::SensorSerial, 0).unwrap(),
            Value::UInt(4711)
        );
        assert_eq!(
            read_value(&cache, state, Command::EmGainMass, 0).unwrap(),
            Value::UInt(28)
        );
        assert_eq!(
            read_value(&cache, state, Command::ScanStatus, 0).unwrap(),
            Value::UInt(1)
        );
        assert_eq!(
            read_value(&cache, state, Command::ChannelStartMass, 2).unwrap(),
            Value::Float(12.5)
        );
        assert_eq!(
            read_value(&cache, state, Command::ChannelMode, 2).unwrap(),
            Value::Text("SingleMass".to_string())
        );
        assert_eq!(
            read_value(&cache, state, Command::DriverState, 0).unwrap(),
            Value::UInt(1)
        );
        assert_eq!(
            read_value(&cache, state, Command::FilamentCmlOnTime, 1).unwrap(),
            Value::Float(2.0)
        );
    }

    #[test]
    fn test_read_rejects_write_only_commands() {
        let cache = populated_cache();
        let err =
            read_value(&cache, AcquisitionState::Idle, Command::ScanStart, 0).unwrap_err();
        assert!(matches!(err, RgaError::WriteOnly(_)));
    }

    #[test]
    fn test_read_rejects_bad_indexes() {
        let cache = populated_cache();
        assert!(matches!(
            read_value(&cache, AcquisitionState::Idle, Command::ChannelMode, 0).unwrap_err(),
            RgaError::InvalidChannel(0)
        ));
        assert!(matches!(
            read_value(&cache, AcquisitionState::Idle, Command::ChannelMode, 6).unwrap_err(),
            RgaError::InvalidChannel(6)
        ));
        assert!(matches!(
            read_value(&cache, AcquisitionState::Idle, Command::FilamentCmlOnTime, 2)
                .unwrap_err(),
            RgaError::InvalidFilament(2)
        ));
    }

    #[test]
    fn test_write_paths() {
        assert_eq!(
            write_path(Command::ChannelStartMass, 2, &Value::Float(10.5)).unwrap(),
            "/mmsp/scanSetup/channel/2/startMass/set?10.5"
        );
        assert_eq!(
            write_path(
                Command::ChannelMode,
                1,
                &Value::Text("Sweep".to_string())
            )
            .unwrap(),
            "/mmsp/scanSetup/channel/1/channelMode/set?Sweep"
        );
        assert_eq!(
            write_path(Command::ChannelEnabled, 5, &Value::UInt(1)).unwrap(),
            "/mmsp/scanSetup/channel/5/enabled/set?on"
        );
        assert_eq!(
            write_path(Command::StartStopChannel, 1, &Value::Int(4)).unwrap(),
            "/mmsp/scanSetup/set?startChannel=1&stopChannel=4"
        );
        assert_eq!(
            write_path(Command::ScanCount, 0, &Value::Int(-1)).unwrap(),
            "/mmsp/scanSetup/scanCount/set?-1"
        );
        assert_eq!(
            write_path(Command::ScanStop, 0, &Value::Int(2)).unwrap(),
            "/mmsp/scanSetup/scanStop/set?2"
        );
    }

    #[test]
    fn test_write_rejects_read_only_and_bad_values() {
        assert!(matches!(
            write_path(Command::TotalPressure, 0, &Value::Float(1.0)).unwrap_err(),
            RgaError::ReadOnly(_)
        ));
        assert!(matches!(
            write_path(Command::ChannelMode, 1, &Value::Text("Analog".to_string()))
                .unwrap_err(),
            RgaError::InvalidValue { .. }
        ));
        assert!(matches!(
            write_path(Command::ChannelDwell, 1, &Value::Int(-3)).unwrap_err(),
            RgaError::InvalidValue { .. }
        ));
        assert!(matches!(
            write_path(Command::ChannelStartMass, 9, &Value::Float(1.0)).unwrap_err(),
            RgaError::InvalidChannel(9)
        ));
        assert!(matches!(
            write_path(Command::MonitorStart, 0, &Value::UInt(1)).unwrap_err(),
            RgaError::State(_)
        ));
    }
}
