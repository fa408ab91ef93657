#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and validation for the filament watchdog.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every field carries a default mirroring a conservative dual-extruder
//!   setup (runout on channels 0/2, motion on 1/3), so a missing file or a
//!   partial section still yields a usable configuration.
use serde::Deserialize;

/// Transport selection and per-read timeout.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Transport {
    /// Force the simulated bridge even when real hardware is compiled in.
    pub simulated: bool,
    /// Max time to wait for one `read_all` bus transaction.
    pub read_timeout_ms: u64,
    /// BCM pin numbers backing logical channels 0..=3 (real bridge only).
    pub bcm_pins: [u8; 4],
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            simulated: false,
            read_timeout_ms: 50,
            bcm_pins: [17, 27, 22, 23],
        }
    }
}

/// Poll loop pacing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Poll {
    /// Base interval in ms; the loop clamps to 5 ms while printing and
    /// 100 ms while idle.
    pub base_interval_ms: u64,
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            base_interval_ms: 10,
        }
    }
}

/// Per-extruder sensor wiring and thresholds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Extruder {
    pub enabled: bool,
    pub runout_pin: u8,
    pub runout_inverted: bool,
    pub motion_pin: u8,
    pub motion_inverted: bool,
    /// No committed motion pulse for this long while printing counts as a
    /// stall.
    pub motion_timeout_ms: u64,
    /// Quiet period a raw transition must survive before it commits.
    pub debounce_ms: u64,
}

impl Default for Extruder {
    fn default() -> Self {
        Self {
            enabled: true,
            runout_pin: 0,
            runout_inverted: false,
            motion_pin: 1,
            motion_inverted: false,
            motion_timeout_ms: 30_000,
            debounce_ms: 500,
        }
    }
}

fn default_e1() -> Extruder {
    Extruder {
        runout_pin: 2,
        motion_pin: 3,
        ..Extruder::default()
    }
}

/// Scan-filter and notification switches.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Monitor {
    /// Only watch the extruder currently selected by the printer.
    pub only_active_extruder: bool,
    pub notification_enabled: bool,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            only_active_extruder: true,
            notification_enabled: true,
        }
    }
}

/// Multi-line action scripts, one per trigger kind.
///
/// `@pause` pauses the print, `;`-lines are logged comments, anything else is
/// sent to the printer verbatim. An empty script falls back to a plain pause.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Actions {
    pub runout_script: String,
    pub motion_timeout_script: String,
}

impl Default for Actions {
    fn default() -> Self {
        Self {
            runout_script: "M600\n; Filament runout detected\nM117 Insert filament and resume"
                .to_string(),
            motion_timeout_script: "@pause\n; No motion detected - possible jam\nM117 Check for filament jam"
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub transport: Transport,
    pub poll: Poll,
    pub e0: Extruder,
    pub e1: Extruder,
    pub monitor: Monitor,
    pub actions: Actions,
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            poll: Poll::default(),
            e0: Extruder::default(),
            e1: default_e1(),
            monitor: Monitor::default(),
            actions: Actions::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.poll.base_interval_ms == 0 {
            eyre::bail!("poll.base_interval_ms must be > 0");
        }
        if self.transport.read_timeout_ms == 0 {
            eyre::bail!("transport.read_timeout_ms must be > 0");
        }

        let mut used_pins: Vec<u8> = Vec::new();
        for (name, ext) in [("e0", &self.e0), ("e1", &self.e1)] {
            if !ext.enabled {
                continue;
            }
            for (kind, pin) in [("runout", ext.runout_pin), ("motion", ext.motion_pin)] {
                if pin > 3 {
                    eyre::bail!("{name}.{kind}_pin must be one of channels 0..=3, got {pin}");
                }
                if used_pins.contains(&pin) {
                    eyre::bail!("channel {pin} is assigned to more than one sensor");
                }
                used_pins.push(pin);
            }
            if ext.motion_timeout_ms == 0 {
                eyre::bail!("{name}.motion_timeout_ms must be > 0");
            }
        }
        Ok(())
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}
