//! Scan data buffer and the derived mass-axis computation.

use crate::error::{RgaError, RgaResult};

/// Hard upper bound on the number of samples in one scan.
pub const MAX_SCAN_SIZE: usize = 16384;

/// Buffer holding the most recent spectral scan.
///
/// The sample and axis arrays are allocated once at [`MAX_SCAN_SIZE`] and
/// reused for the driver lifetime; `scan_size` / `actual_size` describe the
/// populated prefix. Keeping both arrays at full length preserves the
/// invariant that they are always index-aligned, whatever the last decode
/// or axis computation did.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBuffer {
    /// Declared scan size from the instrument.
    pub scan_size: u32,
    /// Number of samples actually received.
    pub actual_size: u32,
    /// Scan sequence number reported by the instrument.
    pub scan_number: i64,
    /// Ion-current samples.
    pub samples: Vec<f32>,
    /// Mass axis in AMU, index-aligned with `samples`.
    pub axis: Vec<f32>,
}

impl ScanBuffer {
    /// Allocate an empty buffer.
    pub fn new() -> Self {
        Self {
            scan_size: 0,
            actual_size: 0,
            scan_number: 0,
            samples: vec![0.0; MAX_SCAN_SIZE],
            axis: vec![0.0; MAX_SCAN_SIZE],
        }
    }

    /// Zero the published data, keeping the allocations.
    pub fn clear(&mut self) {
        self.scan_size = 0;
        self.actual_size = 0;
        self.samples.fill(0.0);
        self.axis.fill(0.0);
    }

    /// Populated sample prefix.
    pub fn sample_slice(&self) -> &[f32] {
        &self.samples[..self.actual_size as usize]
    }

    /// Axis prefix matching [`Self::sample_slice`].
    pub fn axis_slice(&self) -> &[f32] {
        &self.axis[..self.actual_size as usize]
    }
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Recompute the mass axis for the populated scan.
///
/// `axis[i] = start_mass + i / ppamu` for `i` in `[0, scan_size)`. On a
/// precondition violation the axis is left untouched so the previously
/// published axis stays paired with whatever was published before.
pub fn compute_mass_axis(
    buffer: &mut ScanBuffer,
    start_mass: f64,
    stop_mass: f64,
    ppamu: u32,
) -> RgaResult<()> {
    if ppamu == 0 {
        return Err(RgaError::Validation(
            "points per AMU must be positive".to_string(),
        ));
    }
    if buffer.scan_size == 0 {
        return Err(RgaError::Validation(
            "scan size must be positive".to_string(),
        ));
    }
    if start_mass > stop_mass {
        return Err(RgaError::Validation(format!(
            "start mass {start_mass} exceeds stop mass {stop_mass}"
        )));
    }

    let step = 1.0 / f64::from(ppamu);
    for i in 0..buffer.scan_size as usize {
        buffer.axis[i] = (start_mass + i as f64 * step) as f32;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with_scan(scan_size: u32) -> ScanBuffer {
        let mut buffer = ScanBuffer::new();
        buffer.scan_size = scan_size;
        buffer.actual_size = scan_size;
        buffer
    }

    #[test]
    fn test_axis_from_start_mass_and_ppamu() {
        let mut buffer = buffer_with_scan(3);
        compute_mass_axis(&mut buffer, 10.0, 50.0, 10).unwrap();

        let expected = [10.0_f32, 10.1, 10.2];
        for (computed, expected) in buffer.axis_slice().iter().zip(expected) {
            assert!((computed - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_axis_covers_full_scan_size() {
        let mut buffer = buffer_with_scan(401);
        compute_mass_axis(&mut buffer, 1.0, 100.0, 4).unwrap();

        for i in 0..401 {
            let expected = 1.0 + i as f64 * 0.25;
            assert!((f64::from(buffer.axis[i]) - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_zero_ppamu_leaves_axis_untouched() {
        let mut buffer = buffer_with_scan(4);
        buffer.axis.fill(7.0);

        let err = compute_mass_axis(&mut buffer, 1.0, 10.0, 0).unwrap_err();
        assert!(matches!(err, RgaError::Validation(_)));
        assert!(buffer.axis.iter().all(|v| *v == 7.0));
    }

    #[test]
    fn test_zero_scan_size_leaves_axis_untouched() {
        let mut buffer = ScanBuffer::new();
        buffer.axis.fill(7.0);

        let err = compute_mass_axis(&mut buffer, 1.0, 10.0, 10).unwrap_err();
        assert!(matches!(err, RgaError::Validation(_)));
        assert!(buffer.axis.iter().all(|v| *v == 7.0));
    }

    #[test]
    fn test_inverted_mass_range_rejected() {
        let mut buffer = buffer_with_scan(4);
        buffer.axis.fill(7.0);

        let err = compute_mass_axis(&mut buffer, 50.0, 10.0, 10).unwrap_err();
        assert!(matches!(err, RgaError::Validation(_)));
        assert!(buffer.axis.iter().all(|v| *v == 7.0));
    }

    #[test]
    fn test_clear_keeps_allocations() {
        let mut buffer = buffer_with_scan(8);
        buffer.samples[..8].fill(1.0);
        compute_mass_axis(&mut buffer, 1.0, 10.0, 1).unwrap();

        buffer.clear();
        assert_eq!(buffer.scan_size, 0);
        assert_eq!(buffer.actual_size, 0);
        assert_eq!(buffer.samples.len(), MAX_SCAN_SIZE);
        assert_eq!(buffer.axis.len(), MAX_SCAN_SIZE);
        assert!(buffer.samples.iter().all(|v| *v == 0.0));
        assert!(buffer.axis.iter().all(|v| *v == 0.0));
    }
}
