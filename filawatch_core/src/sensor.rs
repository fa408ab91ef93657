//! Per-pin debounced state tracking with motion-pulse history.

use std::collections::VecDeque;

/// Upper bound on retained motion pulse timestamps.
const PULSE_HISTORY_CAP: usize = 100;

/// Default trailing window for [`SensorState::motion_rate`], in milliseconds.
pub const RATE_WINDOW_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Filament presence switch; stable true = filament present.
    Runout,
    /// Extrusion motion encoder; pulses while filament moves.
    Motion,
}

/// Debounced boolean state for one logical GPIO channel.
///
/// All timestamps are milliseconds on the owning engine's epoch timeline,
/// computed once per poll tick and passed in. The debounce window is measured
/// from the last *accepted* change: a rejected sample overwrites the tracked
/// raw value but never advances the window.
#[derive(Debug, Clone)]
pub struct SensorState {
    pin: u8,
    kind: SensorKind,
    inverted: bool,
    debounce_ms: u64,
    current_raw: bool,
    stable_value: bool,
    last_change_ms: Option<u64>,
    last_trigger_ms: Option<u64>,
    pulse_history: VecDeque<u64>,
    last_pulse_ms: u64,
}

impl SensorState {
    pub fn new(pin: u8, kind: SensorKind, inverted: bool, debounce_ms: u64, now_ms: u64) -> Self {
        let cap = match kind {
            SensorKind::Motion => PULSE_HISTORY_CAP,
            SensorKind::Runout => 0,
        };
        Self {
            pin,
            kind,
            inverted,
            debounce_ms,
            current_raw: false,
            stable_value: false,
            last_change_ms: None,
            last_trigger_ms: None,
            pulse_history: VecDeque::with_capacity(cap),
            last_pulse_ms: now_ms,
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Debounced value: true = filament present / motion tick high.
    pub fn stable_value(&self) -> bool {
        self.stable_value
    }

    /// Timestamp of the most recent committed motion pulse (creation time
    /// until the first pulse arrives).
    pub fn last_pulse_ms(&self) -> u64 {
        self.last_pulse_ms
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    pub(crate) fn stamp_trigger(&mut self, now_ms: u64) {
        self.last_trigger_ms = Some(now_ms);
    }

    /// Feed one raw sample. Returns true when the debounced value committed a
    /// change on this sample.
    ///
    /// A sample arriving within `debounce_ms` of the last accepted change is
    /// recorded as the pending raw level but does not commit; the next
    /// accepted sample still measures its quiet period from the original
    /// change, not from the rejected one.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> bool {
        let value = if self.inverted { !raw } else { raw };
        if value == self.current_raw {
            return false;
        }
        if let Some(changed_at) = self.last_change_ms
            && now_ms.saturating_sub(changed_at) <= self.debounce_ms
        {
            self.current_raw = value;
            return false;
        }
        let previous = self.stable_value;
        self.stable_value = value;
        self.last_change_ms = Some(now_ms);
        if self.kind == SensorKind::Motion && value {
            if self.pulse_history.len() == PULSE_HISTORY_CAP {
                self.pulse_history.pop_front();
            }
            self.pulse_history.push_back(now_ms);
            self.last_pulse_ms = now_ms;
        }
        previous != self.stable_value
    }

    /// True when no motion pulse has been committed for longer than
    /// `timeout_ms`. Always false for runout sensors.
    pub fn motion_timed_out(&self, timeout_ms: u64, now_ms: u64) -> bool {
        if self.kind != SensorKind::Motion {
            return false;
        }
        now_ms.saturating_sub(self.last_pulse_ms) > timeout_ms
    }

    /// Pulses per second over the trailing `window_ms`.
    ///
    /// A decaying estimate, not an instantaneous rate; an empty window yields
    /// 0.0 rather than a division error.
    pub fn motion_rate(&self, window_ms: u64, now_ms: u64) -> f64 {
        if self.kind != SensorKind::Motion || window_ms == 0 {
            return 0.0;
        }
        let cutoff = now_ms.saturating_sub(window_ms);
        let pulses = self.pulse_history.iter().filter(|&&t| t >= cutoff).count();
        pulses as f64 / (window_ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion(debounce_ms: u64) -> SensorState {
        SensorState::new(1, SensorKind::Motion, false, debounce_ms, 0)
    }

    #[test]
    fn pulse_history_is_bounded() {
        let mut s = motion(0);
        let mut now = 0;
        for _ in 0..300 {
            now += 10;
            s.update(true, now);
            now += 10;
            s.update(false, now);
        }
        assert!(s.pulse_history.len() <= PULSE_HISTORY_CAP);
        // Oldest entries were evicted, so the rate window only sees the tail.
        assert_eq!(*s.pulse_history.front().unwrap(), now - 1990);
    }

    #[test]
    fn runout_kind_never_times_out_or_rates() {
        let s = SensorState::new(0, SensorKind::Runout, false, 100, 0);
        assert!(!s.motion_timed_out(1, 1_000_000));
        assert_eq!(s.motion_rate(RATE_WINDOW_MS, 1_000_000), 0.0);
    }
}
