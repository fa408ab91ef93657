//! Core-side configuration structs, mirrored from `filawatch_config` via
//! `From` conversions so the engine never depends on the TOML schema shape.

use crate::error::BuildError;

/// One debounced input channel.
#[derive(Debug, Clone, Copy)]
pub struct SensorCfg {
    /// Logical transport channel (0..=3).
    pub pin: u8,
    /// Flip raw polarity before debouncing.
    pub inverted: bool,
}

#[derive(Debug, Clone)]
pub struct ExtruderCfg {
    pub enabled: bool,
    pub runout: SensorCfg,
    pub motion: SensorCfg,
    /// Quiet period a raw transition must survive before it commits.
    pub debounce_ms: u64,
    /// No committed motion pulse for this long while printing counts as a
    /// stall.
    pub motion_timeout_ms: u64,
}

impl Default for ExtruderCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            runout: SensorCfg {
                pin: 0,
                inverted: false,
            },
            motion: SensorCfg {
                pin: 1,
                inverted: false,
            },
            debounce_ms: 500,
            motion_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorCfg {
    /// Base poll interval; the loop adapts around it (5 ms floor while
    /// printing, 100 ms ceiling while idle).
    pub base_interval_ms: u64,
    pub only_active_extruder: bool,
    pub notification_enabled: bool,
    /// Per-read transport timeout.
    pub read_timeout_ms: u64,
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            base_interval_ms: 10,
            only_active_extruder: true,
            notification_enabled: true,
            read_timeout_ms: 50,
        }
    }
}

/// Multi-line action scripts, one per trigger kind. Empty scripts fall back
/// to a plain pause at dispatch time.
#[derive(Debug, Clone, Default)]
pub struct ActionScripts {
    pub runout: String,
    pub motion_timeout: String,
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct WatchCfg {
    pub extruders: [ExtruderCfg; 2],
    pub monitor: MonitorCfg,
    pub scripts: ActionScripts,
}

impl Default for WatchCfg {
    fn default() -> Self {
        let e0 = ExtruderCfg::default();
        let e1 = ExtruderCfg {
            runout: SensorCfg {
                pin: 2,
                inverted: false,
            },
            motion: SensorCfg {
                pin: 3,
                inverted: false,
            },
            ..ExtruderCfg::default()
        };
        Self {
            extruders: [e0, e1],
            monitor: MonitorCfg::default(),
            scripts: ActionScripts::default(),
        }
    }
}

impl WatchCfg {
    /// Validate constraints the engine relies on (channel range, pin
    /// uniqueness, non-zero intervals).
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.monitor.base_interval_ms == 0 {
            return Err(BuildError::InvalidConfig("base poll interval must be > 0"));
        }
        if self.monitor.read_timeout_ms == 0 {
            return Err(BuildError::InvalidConfig(
                "transport read timeout must be > 0",
            ));
        }
        let mut used_pins: Vec<u8> = Vec::new();
        for ext in &self.extruders {
            if !ext.enabled {
                continue;
            }
            for pin in [ext.runout.pin, ext.motion.pin] {
                if pin > 3 {
                    return Err(BuildError::InvalidConfig(
                        "sensor pins must be one of channels 0..=3",
                    ));
                }
                if used_pins.contains(&pin) {
                    return Err(BuildError::InvalidConfig(
                        "a channel is assigned to more than one sensor",
                    ));
                }
                used_pins.push(pin);
            }
            if ext.motion_timeout_ms == 0 {
                return Err(BuildError::InvalidConfig("motion timeout must be > 0"));
            }
        }
        Ok(())
    }
}

impl From<&filawatch_config::Extruder> for ExtruderCfg {
    fn from(e: &filawatch_config::Extruder) -> Self {
        Self {
            enabled: e.enabled,
            runout: SensorCfg {
                pin: e.runout_pin,
                inverted: e.runout_inverted,
            },
            motion: SensorCfg {
                pin: e.motion_pin,
                inverted: e.motion_inverted,
            },
            debounce_ms: e.debounce_ms,
            motion_timeout_ms: e.motion_timeout_ms,
        }
    }
}

impl From<&filawatch_config::Config> for WatchCfg {
    fn from(cfg: &filawatch_config::Config) -> Self {
        Self {
            extruders: [(&cfg.e0).into(), (&cfg.e1).into()],
            monitor: MonitorCfg {
                base_interval_ms: cfg.poll.base_interval_ms,
                only_active_extruder: cfg.monitor.only_active_extruder,
                notification_enabled: cfg.monitor.notification_enabled,
                read_timeout_ms: cfg.transport.read_timeout_ms,
            },
            scripts: ActionScripts {
                runout: cfg.actions.runout_script.clone(),
                motion_timeout: cfg.actions.motion_timeout_script.clone(),
            },
        }
    }
}
