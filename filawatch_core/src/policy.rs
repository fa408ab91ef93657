//! Trigger arbitration: decides when a debounced state change or a motion
//! stall becomes an operator-visible event.

use crate::config::ExtruderCfg;
use crate::sensor::SensorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Runout,
    MotionTimeout,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Runout => "runout",
            TriggerKind::MotionTimeout => "motion_timeout",
        }
    }
}

/// Ephemeral outcome of a trigger check that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDecision {
    pub extruder: usize,
    pub kind: TriggerKind,
}

#[derive(Debug, Clone, Copy)]
struct PolicyCfg {
    enabled: bool,
    motion_timeout_ms: u64,
}

/// Per-extruder trigger rules.
///
/// The scan filter (disabled / non-active / already-triggered extruders)
/// lives one level up in the poll loop; these checks assume the extruder
/// passed it.
#[derive(Debug)]
pub struct TriggerPolicy {
    extruders: [PolicyCfg; 2],
}

impl TriggerPolicy {
    pub fn new(extruders: &[ExtruderCfg; 2]) -> Self {
        let to_policy = |e: &ExtruderCfg| PolicyCfg {
            enabled: e.enabled,
            motion_timeout_ms: e.motion_timeout_ms,
        };
        Self {
            extruders: [to_policy(&extruders[0]), to_policy(&extruders[1])],
        }
    }

    pub fn motion_timeout_ms(&self, extruder: usize) -> u64 {
        self.extruders
            .get(extruder)
            .map(|e| e.motion_timeout_ms)
            .unwrap_or(0)
    }

    /// Runout fires on the debounced transition into "no filament" while a
    /// print is active. Pause state is deliberately not consulted: runout is
    /// reported even while paused.
    pub fn check_runout(
        &self,
        extruder: usize,
        sensor: &SensorState,
        state_changed: bool,
        printing: bool,
    ) -> Option<TriggerDecision> {
        let cfg = self.extruders.get(extruder)?;
        if !cfg.enabled || !printing || !state_changed || sensor.stable_value() {
            return None;
        }
        Some(TriggerDecision {
            extruder,
            kind: TriggerKind::Runout,
        })
    }

    /// Motion timeout fires while printing and not paused, then rearms only
    /// after a full timeout has elapsed since the previous fire even though
    /// `last_pulse_ms` does not advance on its own.
    ///
    /// The trigger timestamp is stamped here, before the caller dispatches,
    /// so two near-simultaneous checks cannot both fire.
    pub fn check_motion(
        &self,
        extruder: usize,
        sensor: &mut SensorState,
        printing: bool,
        paused: bool,
        now_ms: u64,
    ) -> Option<TriggerDecision> {
        let cfg = self.extruders.get(extruder)?;
        if !cfg.enabled || !printing || paused {
            return None;
        }
        if !sensor.motion_timed_out(cfg.motion_timeout_ms, now_ms) {
            return None;
        }
        if let Some(last) = sensor.last_trigger_ms()
            && now_ms.saturating_sub(last) <= cfg.motion_timeout_ms
        {
            return None;
        }
        sensor.stamp_trigger(now_ms);
        Some(TriggerDecision {
            extruder,
            kind: TriggerKind::MotionTimeout,
        })
    }
}
