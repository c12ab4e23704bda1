//! Last-known-value cache of instrument state.
//!
//! One instance of every endpoint struct plus the scan buffer, owned by the
//! driver core and refreshed in place by the poll loop. Each entry is
//! replaced wholesale on a successful decode and left untouched otherwise,
//! so readers always see a consistent snapshot of an endpoint.

use crate::error::{RgaError, RgaResult};
use crate::protocol::endpoints::{
    ChannelScanSetup, CommParams, DeviceStatus, DiagnosticData, IonSource, ScanInfo,
    SensorDetector, SensorFilter, SensorInfo,
};
use crate::scan::ScanBuffer;

/// Scan-setup channels on the instrument: four physical plus one reserved
/// for internal use.
pub const MAX_CHANNELS: usize = 5;

/// Typed last-known values for every endpoint.
#[derive(Debug, Default)]
pub struct ParameterCache {
    /// Network identity.
    pub comm: CommParams,
    /// Sensor identity.
    pub sensor_info: SensorInfo,
    /// Device status.
    pub status: DeviceStatus,
    /// Analog diagnostics.
    pub diagnostics: DiagnosticData,
    /// Scan bookkeeping.
    pub scan_info: ScanInfo,
    /// Detector settings.
    pub detector: SensorDetector,
    /// Filter limits.
    pub filter: SensorFilter,
    /// Ion source configuration.
    pub ion_source: IonSource,
    /// Per-channel scan setups, index 0 holds channel 1.
    pub channels: [ChannelScanSetup; MAX_CHANNELS],
    /// Total pressure in the instrument's configured unit.
    pub total_pressure: f64,
    /// Latest leak-check reading.
    pub leak_check_value: f64,
    /// Most recent scan with its derived mass axis.
    pub scan: ScanBuffer,
}

impl ParameterCache {
    /// Fresh cache with every entry at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// 1-indexed channel accessor.
    pub fn channel(&self, channel: usize) -> RgaResult<&ChannelScanSetup> {
        if channel == 0 || channel > MAX_CHANNELS {
            return Err(RgaError::InvalidChannel(channel));
        }
        Ok(&self.channels[channel - 1])
    }

    /// Mutable 1-indexed channel accessor.
    pub fn channel_mut(&mut self, channel: usize) -> RgaResult<&mut ChannelScanSetup> {
        if channel == 0 || channel > MAX_CHANNELS {
            return Err(RgaError::InvalidChannel(channel));
        }
        Ok(&mut self.channels[channel - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_bounds() {
        let cache = ParameterCache::new();
        assert!(cache.channel(0).is_err());
        assert!(cache.channel(MAX_CHANNELS + 1).is_err());
        for channel in 1..=MAX_CHANNELS {
            assert!(cache.channel(channel).is_ok());
        }
    }

    #[test]
    fn test_channel_mut_addresses_the_right_slot() {
        let mut cache = ParameterCache::new();
        cache.channel_mut(3).unwrap().start_mass = 12.0;
        assert!((cache.channels[2].start_mass - 12.0).abs() < f64::EPSILON);
        assert!((cache.channel(3).unwrap().start_mass - 12.0).abs() < f64::EPSILON);
    }
}
