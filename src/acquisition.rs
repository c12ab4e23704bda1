//! Acquisition state machine for monitor and leak-check scanning.
//!
//! The instrument runs at most one acquisition at a time. Start commands
//! are validated here before any device traffic happens; the driver core
//! performs the actual channel reconfiguration and scan start/stop
//! exchanges.

use crate::error::{RgaError, RgaResult};

/// Channel reconfigured for continuous-sweep monitoring.
pub const MONITOR_CHANNEL: usize = 1;
/// Internal channel used for single-mass leak checking.
pub const LEAKCHECK_CHANNEL: usize = 5;
/// Mass the leak-check channel is parked at (helium).
pub const LEAKCHECK_MASS: f64 = 4.0;

/// What the driver is currently acquiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    /// No acquisition in progress.
    #[default]
    Idle,
    /// Continuous sweep on the monitor channel.
    Monitoring,
    /// Single-mass sampling on the leak-check channel.
    LeakCheck,
}

impl AcquisitionState {
    /// Numeric code reported through the driver-state command.
    pub fn code(self) -> u32 {
        match self {
            AcquisitionState::Idle => 0,
            AcquisitionState::Monitoring => 1,
            AcquisitionState::LeakCheck => 2,
        }
    }
}

/// How a stop command terminates an active acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Let the current scan complete before stopping.
    AfterCurrentScan,
    /// Abort immediately.
    Immediate,
}

impl StopMode {
    /// Interpret the value carried by a stop command.
    pub fn from_value(value: i64) -> RgaResult<Self> {
        match value {
            1 => Ok(StopMode::AfterCurrentScan),
            2 => Ok(StopMode::Immediate),
            other => Err(RgaError::State(format!(
                "unknown stop mode {other} (1 = after current scan, 2 = immediate)"
            ))),
        }
    }

    /// Value passed to the scan-stop resource.
    pub fn wire_value(self) -> u32 {
        match self {
            StopMode::AfterCurrentScan => 1,
            StopMode::Immediate => 2,
        }
    }
}

/// Tracks the acquisition state and scan bookkeeping across poll cycles.
#[derive(Debug)]
pub struct Acquisition {
    state: AcquisitionState,
    just_entered: bool,
    last_polled_scan: i64,
}

impl Acquisition {
    /// Start idle with no scan history.
    pub fn new() -> Self {
        Self {
            state: AcquisitionState::Idle,
            just_entered: false,
            last_polled_scan: -1,
        }
    }

    /// Current state.
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// True while monitoring or leak checking.
    pub fn is_active(&self) -> bool {
        self.state != AcquisitionState::Idle
    }

    /// Precondition for entering an active state: the machine must be idle
    /// and the instrument must not already be scanning.
    pub fn check_start(&self, target: AcquisitionState, scanning: bool) -> RgaResult<()> {
        if self.state != AcquisitionState::Idle {
            return Err(RgaError::State(format!(
                "cannot start {target:?} while {:?}",
                self.state
            )));
        }
        if scanning {
            return Err(RgaError::State(
                "instrument is already scanning".to_string(),
            ));
        }
        Ok(())
    }

    /// Commit entry into an active state.
    pub fn enter(&mut self, target: AcquisitionState) {
        self.state = target;
        self.just_entered = true;
        self.last_polled_scan = -1;
    }

    /// Return to idle; errors if nothing is running.
    pub fn stop(&mut self) -> RgaResult<()> {
        if self.state == AcquisitionState::Idle {
            return Err(RgaError::State("no acquisition in progress".to_string()));
        }
        self.state = AcquisitionState::Idle;
        self.just_entered = false;
        Ok(())
    }

    /// True exactly once, on the first poll tick after entry.
    pub fn take_just_entered(&mut self) -> bool {
        std::mem::take(&mut self.just_entered)
    }

    /// True when the instrument reports a scan newer than the last pull.
    pub fn scan_pending(&self, last_scan: i64) -> bool {
        last_scan > self.last_polled_scan
    }

    /// Record that `scan_number` has been pulled and republished.
    pub fn advance(&mut self, scan_number: i64) {
        self.last_polled_scan = scan_number;
    }

    /// Most recently pulled scan number, −1 after state entry.
    pub fn last_polled_scan(&self) -> i64 {
        self.last_polled_scan
    }
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::new()
    }
}
