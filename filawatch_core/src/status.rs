//! Host-facing status snapshot types.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RunoutStatus {
    /// Debounced value: true = filament present.
    pub filament_present: bool,
    pub pin: u8,
    /// Whether this extruder already fired an action this print episode.
    pub triggered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MotionStatus {
    pub state: bool,
    pub pin: u8,
    /// Engine-timeline milliseconds of the last committed pulse.
    pub last_pulse_ms: u64,
    pub timed_out: bool,
    /// Pulses per second over the trailing 10 s window.
    pub rate_pps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtruderStatus {
    pub extruder: usize,
    pub runout: RunoutStatus,
    pub motion: MotionStatus,
}

/// Snapshot answered to status queries; only enabled extruders appear.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub is_printing: bool,
    pub is_paused: bool,
    pub current_extruder: usize,
    pub extruders: Vec<ExtruderStatus>,
}
