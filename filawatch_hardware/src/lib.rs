pub mod error;

use error::HwError;
use filawatch_traits::{BoxError, GpioTransport, PinDirection};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Channel layout shared by both bridge variants: runout sensors on even
/// channels, motion sensors on odd channels.
pub const CHANNEL_COUNT: usize = 4;

/// Shared control surface for a [`SimulatedBridge`].
///
/// Tests and the CLI keep a clone and flip filament presence or motion
/// pulsing while the monitor owns the bridge itself.
#[derive(Debug, Clone)]
pub struct SimHandle {
    filament: [Arc<AtomicBool>; 2],
    pulsing: [Arc<AtomicBool>; 2],
    fail_reads: Arc<AtomicU32>,
}

impl SimHandle {
    /// Insert or remove filament on the given extruder's runout channel.
    pub fn set_filament(&self, extruder: usize, present: bool) {
        if let Some(flag) = self.filament.get(extruder) {
            flag.store(present, Ordering::Relaxed);
        }
    }

    /// Enable or freeze the motion channel's self-toggling pulses.
    pub fn set_pulsing(&self, extruder: usize, pulsing: bool) {
        if let Some(flag) = self.pulsing.get(extruder) {
            flag.store(pulsing, Ordering::Relaxed);
        }
    }

    /// Make the next `n` `read_all` calls fail with a bus error.
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::Relaxed);
    }
}

/// Simulated 4-channel bridge.
///
/// Channels 0/2 report the filament switches of E0/E1 (true = present);
/// channels 1/3 are their motion encoders and toggle on every read while
/// pulsing is enabled, so any polling rate observes pulse edges.
pub struct SimulatedBridge {
    handle: SimHandle,
    motion_level: [bool; 2],
}

impl SimulatedBridge {
    pub fn new() -> Self {
        Self {
            handle: SimHandle {
                filament: [Arc::new(AtomicBool::new(true)), Arc::new(AtomicBool::new(true))],
                pulsing: [Arc::new(AtomicBool::new(true)), Arc::new(AtomicBool::new(true))],
                fail_reads: Arc::new(AtomicU32::new(0)),
            },
            motion_level: [false; 2],
        }
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioTransport for SimulatedBridge {
    fn configure(&mut self, channel: u8, _direction: PinDirection) -> Result<(), BoxError> {
        if usize::from(channel) >= CHANNEL_COUNT {
            return Err(Box::new(HwError::Bridge(format!(
                "no such channel: {channel}"
            ))));
        }
        Ok(())
    }

    fn read_all(&mut self, _timeout: Duration) -> Result<[bool; 4], BoxError> {
        let pending = self.handle.fail_reads.load(Ordering::Relaxed);
        if pending > 0 {
            self.handle.fail_reads.store(pending - 1, Ordering::Relaxed);
            return Err(Box::new(HwError::Bridge("simulated bus error".into())));
        }
        for ext in 0..2 {
            if self.handle.pulsing[ext].load(Ordering::Relaxed) {
                self.motion_level[ext] = !self.motion_level[ext];
            }
        }
        Ok([
            self.handle.filament[0].load(Ordering::Relaxed),
            self.motion_level[0],
            self.handle.filament[1].load(Ordering::Relaxed),
            self.motion_level[1],
        ])
    }

    fn close(&mut self) {
        tracing::debug!("simulated bridge closed");
    }
}

/// Real bridge reading four GPIO input lines through rppal.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub struct GpioBridge {
    gpio: rppal::gpio::Gpio,
    bcm: [u8; 4],
    pins: [Option<rppal::gpio::InputPin>; 4],
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
impl GpioBridge {
    /// `bcm` maps the four logical channels to BCM pin numbers.
    pub fn new(bcm: [u8; 4]) -> error::Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| HwError::Bridge(e.to_string()))?;
        Ok(Self {
            gpio,
            bcm,
            pins: [None, None, None, None],
        })
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
impl GpioTransport for GpioBridge {
    fn configure(&mut self, channel: u8, direction: PinDirection) -> Result<(), BoxError> {
        let idx = usize::from(channel);
        if idx >= CHANNEL_COUNT {
            return Err(Box::new(HwError::Bridge(format!(
                "no such channel: {channel}"
            ))));
        }
        match direction {
            PinDirection::Input => {
                let pin = self
                    .gpio
                    .get(self.bcm[idx])
                    .map_err(|e| Box::new(HwError::Bridge(e.to_string())) as BoxError)?
                    .into_input_pullup();
                tracing::debug!(channel, bcm = self.bcm[idx], "channel configured as input");
                self.pins[idx] = Some(pin);
                Ok(())
            }
            PinDirection::Output => Err(Box::new(HwError::Bridge(
                "output channels are not used by this bridge".into(),
            ))),
        }
    }

    fn read_all(&mut self, _timeout: Duration) -> Result<[bool; 4], BoxError> {
        let mut levels = [false; 4];
        for (idx, slot) in self.pins.iter().enumerate() {
            match slot {
                Some(pin) => levels[idx] = pin.is_high(),
                None => {
                    return Err(Box::new(HwError::Bridge(format!(
                        "channel {idx} not configured"
                    ))));
                }
            }
        }
        Ok(levels)
    }

    fn close(&mut self) {
        for slot in &mut self.pins {
            *slot = None;
        }
        tracing::info!("gpio bridge closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_channels_toggle_between_reads() {
        let mut bridge = SimulatedBridge::new();
        let a = bridge.read_all(Duration::from_millis(10)).unwrap();
        let b = bridge.read_all(Duration::from_millis(10)).unwrap();
        assert_ne!(a[1], b[1]);
        assert_ne!(a[3], b[3]);
    }

    #[test]
    fn handle_controls_filament_presence() {
        let mut bridge = SimulatedBridge::new();
        let handle = bridge.handle();
        assert!(bridge.read_all(Duration::from_millis(10)).unwrap()[0]);
        handle.set_filament(0, false);
        assert!(!bridge.read_all(Duration::from_millis(10)).unwrap()[0]);
        assert!(bridge.read_all(Duration::from_millis(10)).unwrap()[2]);
    }
}
