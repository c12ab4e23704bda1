//! Typed endpoint structs and their JSON decoders.
//!
//! Every instrument document wraps its fields in a top-level `"data"`
//! object. Decoding is field-by-field into a scratch value; any missing or
//! mistyped field fails the whole decode, so a cache entry is either
//! replaced wholesale or left untouched.
//!
//! Enumerated-string fields are matched against the device's documented
//! literal values; an unknown string is a decode failure, never a default.

use serde_json::{Map, Value};

use crate::error::{RgaError, RgaResult};
use crate::protocol::splice::splice_status_document;
use crate::scan::{ScanBuffer, MAX_SCAN_SIZE};

/// Maximum number of filament records in a status document.
pub const MAX_FILAMENTS: usize = 3;

/// On-times arrive in seconds and are cached in hours.
const SECONDS_PER_HOUR: f64 = 3600.0;
/// `emGainMass` arrives scaled by 100.
const EM_GAIN_MASS_DIVISOR: u32 = 100;

// ---------------------------------------------------------------------------
// Field access helpers
// ---------------------------------------------------------------------------

fn parse_document(endpoint: &'static str, json: &str) -> RgaResult<Value> {
    serde_json::from_str(json).map_err(|e| RgaError::decode(endpoint, e.to_string()))
}

fn data_object<'a>(endpoint: &'static str, doc: &'a Value) -> RgaResult<&'a Map<String, Value>> {
    doc.get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| RgaError::decode(endpoint, "missing 'data' object"))
}

fn field<'a>(
    endpoint: &'static str,
    obj: &'a Map<String, Value>,
    key: &str,
) -> RgaResult<&'a Value> {
    obj.get(key)
        .ok_or_else(|| RgaError::decode(endpoint, format!("missing field '{key}'")))
}

fn field_str(endpoint: &'static str, obj: &Map<String, Value>, key: &str) -> RgaResult<String> {
    field(endpoint, obj, key)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| RgaError::decode(endpoint, format!("field '{key}' is not a string")))
}

fn field_u32(endpoint: &'static str, obj: &Map<String, Value>, key: &str) -> RgaResult<u32> {
    field(endpoint, obj, key)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            RgaError::decode(endpoint, format!("field '{key}' is not an unsigned integer"))
        })
}

fn field_i32(endpoint: &'static str, obj: &Map<String, Value>, key: &str) -> RgaResult<i32> {
    field(endpoint, obj, key)?
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| RgaError::decode(endpoint, format!("field '{key}' is not an integer")))
}

fn field_f64(endpoint: &'static str, obj: &Map<String, Value>, key: &str) -> RgaResult<f64> {
    field(endpoint, obj, key)?
        .as_f64()
        .ok_or_else(|| RgaError::decode(endpoint, format!("field '{key}' is not a number")))
}

fn field_bool(endpoint: &'static str, obj: &Map<String, Value>, key: &str) -> RgaResult<bool> {
    field(endpoint, obj, key)?
        .as_bool()
        .ok_or_else(|| RgaError::decode(endpoint, format!("field '{key}' is not a boolean")))
}

/// On/off flags arrive as the literal strings `"on"` / `"off"`.
fn field_on_off(endpoint: &'static str, obj: &Map<String, Value>, key: &str) -> RgaResult<bool> {
    match field_str(endpoint, obj, key)?.as_str() {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(RgaError::decode(
            endpoint,
            format!("field '{key}' has unexpected value '{other}'"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Enumerated string fields
// ---------------------------------------------------------------------------

/// Scan mode of a setup channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// Continuous sweep across the configured mass range.
    #[default]
    Sweep,
    /// Repeated sampling of a single mass.
    SingleMass,
}

impl ChannelMode {
    /// Literal used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelMode::Sweep => "Sweep",
            ChannelMode::SingleMass => "SingleMass",
        }
    }

    /// Parse a wire literal; anything outside the closed set is rejected.
    pub fn from_literal(s: &str) -> Option<Self> {
        match s {
            "Sweep" => Some(ChannelMode::Sweep),
            "SingleMass" => Some(ChannelMode::SingleMass),
            _ => None,
        }
    }
}

/// Emission level of the ion source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmissionLevel {
    /// Low emission.
    #[default]
    Lo,
    /// High emission.
    Hi,
}

impl EmissionLevel {
    /// Literal used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            EmissionLevel::Lo => "Lo",
            EmissionLevel::Hi => "Hi",
        }
    }

    fn from_literal(s: &str) -> Option<Self> {
        match s {
            "Lo" => Some(EmissionLevel::Lo),
            "Hi" => Some(EmissionLevel::Hi),
            _ => None,
        }
    }
}

/// Ion optics configuration of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpticsType {
    /// Optimized for linear response.
    #[default]
    Linearity,
    /// Optimized for sensitivity.
    Sensitivity,
}

impl OpticsType {
    /// Literal used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            OpticsType::Linearity => "Linearity",
            OpticsType::Sensitivity => "Sensitivity",
        }
    }

    fn from_literal(s: &str) -> Option<Self> {
        match s {
            "Linearity" => Some(OpticsType::Linearity),
            "Sensitivity" => Some(OpticsType::Sensitivity),
            _ => None,
        }
    }
}

fn field_enum<T>(
    endpoint: &'static str,
    obj: &Map<String, Value>,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> RgaResult<T> {
    let s = field_str(endpoint, obj, key)?;
    parse(&s).ok_or_else(|| {
        RgaError::decode(endpoint, format!("field '{key}' has unexpected value '{s}'"))
    })
}

// ---------------------------------------------------------------------------
// Endpoint structs and decoders
// ---------------------------------------------------------------------------

/// Network identity of the instrument (`/mmsp/communication/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommParams {
    /// IP address as reported by the instrument.
    pub ip: String,
    /// MAC address.
    pub mac: String,
}

/// Decode the communication endpoint.
pub fn decode_comm_params(json: &str) -> RgaResult<CommParams> {
    const EP: &str = "communication";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(CommParams {
        ip: field_str(EP, data, "ip")?,
        mac: field_str(EP, data, "mac")?,
    })
}

/// Sensor identity (`/mmsp/sensorInfo/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorInfo {
    /// Sensor name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Serial number.
    pub serial_number: u32,
}

/// Decode the sensor-info endpoint.
pub fn decode_sensor_info(json: &str) -> RgaResult<SensorInfo> {
    const EP: &str = "sensorInfo";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(SensorInfo {
        name: field_str(EP, data, "name")?,
        description: field_str(EP, data, "description")?,
        serial_number: field_u32(EP, data, "serialNumber")?,
    })
}

/// One filament record inside the status document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filament {
    /// Filament number.
    pub id: u32,
    /// Cumulative on-time in hours.
    pub cml_on_time_hours: f64,
    /// Pressure-trip count.
    pub press_trips: u32,
}

/// Device status (`/mmsp/status/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceStatus {
    /// System status word.
    pub system_status: u32,
    /// Hardware error bits.
    pub hardware_errors: u32,
    /// Hardware warning bits.
    pub hardware_warnings: u32,
    /// Power-on time in hours.
    pub power_on_time_hours: f64,
    /// Emission on-time in hours.
    pub emission_on_time_hours: f64,
    /// Electron-multiplier on-time in hours.
    pub em_on_time_hours: f64,
    /// Cumulative electron-multiplier on-time in hours.
    pub em_cml_on_time_hours: f64,
    /// Electron-multiplier pressure-trip count.
    pub em_press_trips: u32,
    /// Per-filament records, at most [`MAX_FILAMENTS`].
    pub filaments: Vec<Filament>,
}

/// Decode the status endpoint.
///
/// The raw document goes through [`splice_status_document`] first to drop
/// the malformed error-log region.
pub fn decode_device_status(raw: &str) -> RgaResult<DeviceStatus> {
    const EP: &str = "status";
    let spliced = splice_status_document(raw)?;
    let doc = parse_document(EP, &spliced)?;
    let data = data_object(EP, &doc)?;

    let entries = field(EP, data, "filaments")?
        .as_array()
        .ok_or_else(|| RgaError::decode(EP, "field 'filaments' is not an array"))?;
    if entries.len() > MAX_FILAMENTS {
        return Err(RgaError::decode(
            EP,
            format!("{} filament records, at most {MAX_FILAMENTS} expected", entries.len()),
        ));
    }

    let mut filaments = Vec::with_capacity(entries.len());
    for entry in entries {
        let obj = entry
            .as_object()
            .ok_or_else(|| RgaError::decode(EP, "filament record is not an object"))?;
        filaments.push(Filament {
            id: field_u32(EP, obj, "id")?,
            cml_on_time_hours: field_f64(EP, obj, "cmlOnTime")? / SECONDS_PER_HOUR,
            press_trips: field_u32(EP, obj, "pressTrips")?,
        });
    }

    Ok(DeviceStatus {
        system_status: field_u32(EP, data, "systemStatus")?,
        hardware_errors: field_u32(EP, data, "hardwareErrors")?,
        hardware_warnings: field_u32(EP, data, "hardwareWarnings")?,
        power_on_time_hours: field_f64(EP, data, "powerOnTime")? / SECONDS_PER_HOUR,
        emission_on_time_hours: field_f64(EP, data, "emissionOnTime")? / SECONDS_PER_HOUR,
        em_on_time_hours: field_f64(EP, data, "emOnTime")? / SECONDS_PER_HOUR,
        em_cml_on_time_hours: field_f64(EP, data, "emCmlOnTime")? / SECONDS_PER_HOUR,
        em_press_trips: field_u32(EP, data, "emPressTrips")?,
        filaments,
    })
}

/// Analog diagnostics (`/mmsp/diagnosticData/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticData {
    /// Electronics box temperature in °C.
    pub box_temperature: f64,
    /// Anode potential in volts.
    pub anode_potential: u32,
    /// Emission current in µA.
    pub emission_current: u32,
    /// Focus potential in volts.
    pub focus_potential: u32,
    /// Electron energy in eV.
    pub electron_energy: u32,
    /// Filament potential in volts.
    pub filament_potential: u32,
    /// Filament current in mA.
    pub filament_current: u32,
    /// Electron-multiplier potential in volts.
    pub em_potential: u32,
}

/// Decode the diagnostic-data endpoint.
pub fn decode_diag_data(json: &str) -> RgaResult<DiagnosticData> {
    const EP: &str = "diagnosticData";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(DiagnosticData {
        box_temperature: field_f64(EP, data, "internalBoxTemperature")?,
        anode_potential: field_u32(EP, data, "anodePotential")?,
        emission_current: field_u32(EP, data, "emissionCurrent")?,
        focus_potential: field_u32(EP, data, "focusPotential")?,
        electron_energy: field_u32(EP, data, "electronEnergy")?,
        filament_potential: field_u32(EP, data, "filamentPotential")?,
        filament_current: field_u32(EP, data, "filamentCurrent")?,
        em_potential: field_u32(EP, data, "emPotential")?,
    })
}

/// Scan bookkeeping (`/mmsp/scanInfo/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanInfo {
    /// Oldest scan retained by the instrument.
    pub first_scan: i32,
    /// Most recently completed scan.
    pub last_scan: i32,
    /// Scan currently being acquired.
    pub current_scan: i32,
    /// Points in one scan.
    pub points_per_scan: u32,
    /// True while a scan sequence is running.
    pub scanning: bool,
}

/// Decode the scan-info endpoint.
pub fn decode_scan_info(json: &str) -> RgaResult<ScanInfo> {
    const EP: &str = "scanInfo";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(ScanInfo {
        first_scan: field_i32(EP, data, "firstScan")?,
        last_scan: field_i32(EP, data, "lastScan")?,
        current_scan: field_i32(EP, data, "currentScan")?,
        points_per_scan: field_u32(EP, data, "pointsPerScan")?,
        scanning: field_bool(EP, data, "scanning")?,
    })
}

/// Electron-multiplier detector settings (`/mmsp/sensorDetector/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorDetector {
    /// Maximum EM voltage.
    pub em_voltage_max: u32,
    /// Minimum EM voltage.
    pub em_voltage_min: u32,
    /// Present EM voltage.
    pub em_voltage: u32,
    /// EM gain.
    pub em_gain: f64,
    /// Mass at which the gain was calibrated, in AMU.
    pub em_gain_mass: u32,
}

/// Decode the sensor-detector endpoint.
pub fn decode_sensor_detector(json: &str) -> RgaResult<SensorDetector> {
    const EP: &str = "sensorDetector";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(SensorDetector {
        em_voltage_max: field_u32(EP, data, "emVoltageMax")?,
        em_voltage_min: field_u32(EP, data, "emVoltageMin")?,
        em_voltage: field_u32(EP, data, "emVoltage")?,
        em_gain: field_f64(EP, data, "emGain")?,
        em_gain_mass: field_u32(EP, data, "emGainMass")? / EM_GAIN_MASS_DIVISOR,
    })
}

/// Quadrupole filter limits (`/mmsp/sensorFilter/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorFilter {
    /// Highest measurable mass in AMU.
    pub mass_max: f64,
    /// Lowest measurable mass in AMU.
    pub mass_min: f64,
    /// Maximum dwell per point in ms.
    pub dwell_max: u32,
    /// Minimum dwell per point in ms.
    pub dwell_min: u32,
    /// Rod polarity code.
    pub rod_polarity: u32,
}

/// Decode the sensor-filter endpoint.
pub fn decode_sensor_filter(json: &str) -> RgaResult<SensorFilter> {
    const EP: &str = "sensorFilter";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(SensorFilter {
        mass_max: field_f64(EP, data, "massMax")?,
        mass_min: field_f64(EP, data, "massMin")?,
        dwell_max: field_u32(EP, data, "dwellMax")?,
        dwell_min: field_u32(EP, data, "dwellMin")?,
        rod_polarity: field_u32(EP, data, "rodPolarity")?,
    })
}

/// Ion source configuration (`/mmsp/sensorIonSource/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IonSource {
    /// Selected filament.
    pub filament_selected: u32,
    /// Emission level.
    pub emission_level: EmissionLevel,
    /// Ion optics configuration.
    pub optics_type: OpticsType,
    /// Partial-pressure sensitivity factor.
    pub sensitivity_factor: f64,
    /// Ion energy code.
    pub ion_energy: u32,
}

/// Decode the ion-source endpoint.
pub fn decode_ion_source(json: &str) -> RgaResult<IonSource> {
    const EP: &str = "sensorIonSource";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(IonSource {
        filament_selected: field_u32(EP, data, "filamentSelected")?,
        emission_level: field_enum(EP, data, "emissionLevel", EmissionLevel::from_literal)?,
        optics_type: field_enum(EP, data, "opticsType", OpticsType::from_literal)?,
        sensitivity_factor: field_f64(EP, data, "sensitivityFactor")?,
        ion_energy: field_u32(EP, data, "ionEnergy")?,
    })
}

/// Configuration of one scan-setup channel
/// (`/mmsp/scanSetup/channel/{n}/get`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelScanSetup {
    /// Scan mode.
    pub mode: ChannelMode,
    /// First mass of the sweep in AMU.
    pub start_mass: f64,
    /// Last mass of the sweep in AMU.
    pub stop_mass: f64,
    /// Dwell per point in ms.
    pub dwell: u32,
    /// Points sampled per AMU.
    pub ppamu: u32,
    /// Whether the channel participates in the scan sequence.
    pub enabled: bool,
}

/// Decode one channel's scan-setup endpoint.
pub fn decode_channel_scan_setup(json: &str) -> RgaResult<ChannelScanSetup> {
    const EP: &str = "scanSetup";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;
    Ok(ChannelScanSetup {
        mode: field_enum(EP, data, "channelMode", ChannelMode::from_literal)?,
        start_mass: field_f64(EP, data, "startMass")?,
        stop_mass: field_f64(EP, data, "stopMass")?,
        dwell: field_u32(EP, data, "dwell")?,
        ppamu: field_u32(EP, data, "ppamu")?,
        enabled: field_on_off(EP, data, "enabled")?,
    })
}

/// Decode the total-pressure endpoint; the document's `data` field is the
/// bare value.
pub fn decode_pressure(json: &str) -> RgaResult<f64> {
    const EP: &str = "totalPressure";
    let doc = parse_document(EP, json)?;
    doc.get("data")
        .and_then(Value::as_f64)
        .ok_or_else(|| RgaError::decode(EP, "missing numeric 'data' value"))
}

/// Decode the latest-scan endpoint into `buffer`.
///
/// Sizes and samples are validated against a scratch vector before the
/// buffer is touched, so a bad document leaves the previous scan published.
pub fn decode_scan(json: &str, buffer: &mut ScanBuffer) -> RgaResult<()> {
    const EP: &str = "scan";
    let doc = parse_document(EP, json)?;
    let data = data_object(EP, &doc)?;

    let scan_size = field_u32(EP, data, "scansize")?;
    let actual_size = field_u32(EP, data, "actualScanSize")?;
    let scan_number = field_u32(EP, data, "scannum")?;

    if scan_size as usize > MAX_SCAN_SIZE {
        return Err(RgaError::decode(
            EP,
            format!("declared scan size {scan_size} exceeds maximum {MAX_SCAN_SIZE}"),
        ));
    }
    if actual_size > scan_size {
        return Err(RgaError::decode(
            EP,
            format!("{actual_size} samples received for declared scan size {scan_size}"),
        ));
    }

    let values = field(EP, data, "values")?
        .as_array()
        .ok_or_else(|| RgaError::decode(EP, "field 'values' is not an array"))?;
    if values.len() != actual_size as usize {
        return Err(RgaError::decode(
            EP,
            format!(
                "'values' holds {} samples, 'actualScanSize' says {actual_size}",
                values.len()
            ),
        ));
    }

    let mut scratch = Vec::with_capacity(values.len());
    for value in values {
        let sample = value
            .as_f64()
            .ok_or_else(|| RgaError::decode(EP, "non-numeric sample in 'values'"))?;
        scratch.push(sample as f32);
    }

    buffer.scan_size = scan_size;
    buffer.actual_size = actual_size;
    buffer.scan_number = i64::from(scan_number);
    buffer.samples[..scratch.len()].copy_from_slice(&scratch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_detector_with_scaled_gain_mass() {
        let json = r#"{"data":{"emVoltageMax":150,"emVoltageMin":10,"emVoltage":90,"emGain":3.5,"emGainMass":2800}}"#;
        let detector = decode_sensor_detector(json).unwrap();
        assert_eq!(detector.em_voltage_max, 150);
        assert_eq!(detector.em_voltage_min, 10);
        assert_eq!(detector.em_voltage, 90);
        assert!((detector.em_gain - 3.5).abs() < f64::EPSILON);
        assert_eq!(detector.em_gain_mass, 28);
    }

    #[test]
    fn test_missing_field_aborts_decode() {
        let json = r#"{"data":{"emVoltageMax":150,"emVoltageMin":10,"emVoltage":90,"emGain":3.5}}"#;
        let err = decode_sensor_detector(json).unwrap_err();
        assert!(err.to_string().contains("emGainMass"));
    }

    #[test]
    fn test_mistyped_field_aborts_decode() {
        let json = r#"{"data":{"ip":"10.0.0.5","mac":42}}"#;
        let err = decode_comm_params(json).unwrap_err();
        assert!(matches!(err, RgaError::Decode { .. }));
    }

    #[test]
    fn test_status_on_times_scaled_to_hours() {
        let json = r#"{"data":{"systemStatus":1,"hardwareErrors":0,"hardwareWarnings":2,
            "powerOnTime":36000,"emissionOnTime":7200,"emOnTime":3600,
            "emCmlOnTime":18000,"emPressTrips":3,
            "filaments":[{"id":1,"cmlOnTime":7200,"pressTrips":0},
                         {"id":2,"cmlOnTime":1800,"pressTrips":1}]}}"#;
        let status = decode_device_status(json).unwrap();
        assert!((status.power_on_time_hours - 10.0).abs() < 1e-9);
        assert!((status.emission_on_time_hours - 2.0).abs() < 1e-9);
        assert!((status.em_cml_on_time_hours - 5.0).abs() < 1e-9);
        assert_eq!(status.filaments.len(), 2);
        assert!((status.filaments[0].cml_on_time_hours - 2.0).abs() < 1e-9);
        assert!((status.filaments[1].cml_on_time_hours - 0.5).abs() < 1e-9);
        assert_eq!(status.filaments[1].press_trips, 1);
    }

    #[test]
    fn test_too_many_filaments_abort_status_decode() {
        let json = r#"{"data":{"systemStatus":1,"hardwareErrors":0,"hardwareWarnings":0,
            "powerOnTime":0,"emissionOnTime":0,"emOnTime":0,"emCmlOnTime":0,"emPressTrips":0,
            "filaments":[{"id":1,"cmlOnTime":0,"pressTrips":0},
                         {"id":2,"cmlOnTime":0,"pressTrips":0},
                         {"id":3,"cmlOnTime":0,"pressTrips":0},
                         {"id":4,"cmlOnTime":0,"pressTrips":0}]}}"#;
        let err = decode_device_status(json).unwrap_err();
        assert!(matches!(err, RgaError::Decode { endpoint: "status", .. }));
    }

    #[test]
    fn test_status_decode_survives_malformed_error_log() {
        let raw = concat!(
            r#"{"data":{"systemStatus":1,"hardwareErrors":0,"hardwareWarnings":0,"#,
            r#""powerOnTime":36000,"emissionOnTime":7200,"emOnTime":3600,"#,
            r#""emCmlOnTime":18000,"emPressTrips":0,"#,
            r#""errorLog":[filament 2 over temperature 0x2f],"#,
            r#""filaments":[{"id":1,"cmlOnTime":3600,"pressTrips":0}]}}"#,
        );
        let status = decode_device_status(raw).unwrap();
        assert_eq!(status.system_status, 1);
        assert_eq!(status.filaments.len(), 1);
        assert!((status.filaments[0].cml_on_time_hours - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_mode_closed_set() {
        let json = r#"{"data":{"channelMode":"Analog","startMass":1.0,"stopMass":50.0,"dwell":32,"ppamu":10,"enabled":"on"}}"#;
        let err = decode_channel_scan_setup(json).unwrap_err();
        assert!(err.to_string().contains("Analog"));
    }

    #[test]
    fn test_enabled_flag_closed_set() {
        let json = r#"{"data":{"channelMode":"Sweep","startMass":1.0,"stopMass":50.0,"dwell":32,"ppamu":10,"enabled":"yes"}}"#;
        assert!(decode_channel_scan_setup(json).is_err());

        let json = r#"{"data":{"channelMode":"Sweep","startMass":1.0,"stopMass":50.0,"dwell":32,"ppamu":10,"enabled":"off"}}"#;
        let setup = decode_channel_scan_setup(json).unwrap();
        assert!(!setup.enabled);
        assert_eq!(setup.mode, ChannelMode::Sweep);
    }

    #[test]
    fn test_ion_source_enums() {
        let json = r#"{"data":{"filamentSelected":1,"emissionLevel":"Hi","opticsType":"Sensitivity","sensitivityFactor":1.2e-4,"ionEnergy":2}}"#;
        let source = decode_ion_source(json).unwrap();
        assert_eq!(source.emission_level, EmissionLevel::Hi);
        assert_eq!(source.optics_type, OpticsType::Sensitivity);

        let json = r#"{"data":{"filamentSelected":1,"emissionLevel":"Medium","opticsType":"Sensitivity","sensitivityFactor":1.2e-4,"ionEnergy":2}}"#;
        assert!(decode_ion_source(json).is_err());
    }

    #[test]
    fn test_pressure_bare_value() {
        assert!((decode_pressure(r#"{"data":3.2e-8}"#).unwrap() - 3.2e-8).abs() < 1e-20);
        assert!(decode_pressure(r#"{"data":"high"}"#).is_err());
    }

    #[test]
    fn test_scan_decode_fills_prefix() {
        let mut buffer = ScanBuffer::new();
        let json = r#"{"data":{"scansize":3,"actualScanSize":3,"scannum":7,"values":[1.5e-9,2.5e-9,3.5e-9]}}"#;
        decode_scan(json, &mut buffer).unwrap();
        assert_eq!(buffer.scan_size, 3);
        assert_eq!(buffer.actual_size, 3);
        assert_eq!(buffer.scan_number, 7);
        assert_eq!(buffer.sample_slice().len(), 3);
        assert!((f64::from(buffer.samples[1]) - 2.5e-9).abs() < 1e-15);
    }

    #[test]
    fn test_scan_decode_rejects_inconsistent_sizes() {
        let mut buffer = ScanBuffer::new();

        let json = r#"{"data":{"scansize":2,"actualScanSize":3,"scannum":1,"values":[1.0,2.0,3.0]}}"#;
        assert!(decode_scan(json, &mut buffer).is_err());

        let json = r#"{"data":{"scansize":3,"actualScanSize":3,"scannum":1,"values":[1.0,2.0]}}"#;
        assert!(decode_scan(json, &mut buffer).is_err());

        // Nothing committed by the failed decodes.
        assert_eq!(buffer.scan_size, 0);
        assert_eq!(buffer.actual_size, 0);
    }

    #[test]
    fn test_scan_decode_rejects_oversized_scan() {
        let mut buffer = ScanBuffer::new();
        let json = format!(
            r#"{{"data":{{"scansize":{},"actualScanSize":0,"scannum":1,"values":[]}}}}"#,
            MAX_SCAN_SIZE + 1
        );
        assert!(decode_scan(&json, &mut buffer).is_err());
    }

    #[test]
    fn test_scan_decode_bad_sample_leaves_buffer_untouched() {
        let mut buffer = ScanBuffer::new();
        let good = r#"{"data":{"scansize":2,"actualScanSize":2,"scannum":4,"values":[1.0,2.0]}}"#;
        decode_scan(good, &mut buffer).unwrap();

        let before = buffer.clone();
        let bad = r#"{"data":{"scansize":2,"actualScanSize":2,"scannum":5,"values":[1.0,"x"]}}"#;
        assert!(decode_scan(bad, &mut buffer).is_err());
        assert_eq!(buffer, before);
    }
}
