//! Adaptive-rate poll scheduler owning the sensor bank and transport.
//!
//! One loop thread drives all sensor reads. Every tick takes the single
//! engine mutex, reads the full channel set in one bus transaction, feeds the
//! debouncers, runs the trigger checks, and releases the lock before
//! sleeping. Reconfiguration shares the same mutex, so it can never
//! interleave with an in-flight read.

use crate::actions::ActionDispatcher;
use crate::config::{ExtruderCfg, MonitorCfg, WatchCfg};
use crate::error::{Result, WatchError};
use crate::policy::TriggerPolicy;
use crate::sensor::{RATE_WINDOW_MS, SensorKind, SensorState};
use crate::session::PrintSessionContext;
use crate::status::{ExtruderStatus, MotionStatus, RunoutStatus, StatusSnapshot};
use filawatch_traits::{Clock, GpioTransport, PrinterControl};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Poll floor while actively printing (favors motion-pulse resolution).
const PRINTING_INTERVAL_FLOOR: Duration = Duration::from_millis(5);
/// Poll ceiling while idle or paused (conserves cycles).
const IDLE_INTERVAL_CEILING: Duration = Duration::from_millis(100);
/// Back-off after a transport read failure.
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// How long `stop` waits for the loop to observe the stop flag.
const STOP_JOIN_WAIT: Duration = Duration::from_secs(2);

pub type BoxedTransport = Box<dyn GpioTransport + Send>;
pub type BoxedPrinter = Box<dyn PrinterControl + Send>;

// Map any transport error to a typed WatchError, downcasting to the hardware
// crate's HwError when that feature is enabled.
fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> WatchError {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = e.downcast_ref::<filawatch_hardware::error::HwError>() {
        return match hw {
            filawatch_hardware::error::HwError::ReadTimeout => WatchError::Timeout,
            other => WatchError::Transport(other.to_string()),
        };
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        WatchError::Timeout
    } else {
        WatchError::Transport(s)
    }
}

struct ExtruderSensors {
    runout: SensorState,
    motion: SensorState,
}

/// Everything a poll tick touches, behind the single engine mutex.
struct Engine<T: GpioTransport, P: PrinterControl> {
    transport: T,
    extruders: [Option<ExtruderSensors>; 2],
    policy: TriggerPolicy,
    dispatcher: ActionDispatcher<P>,
    cfg: MonitorCfg,
    extruder_cfg: [ExtruderCfg; 2],
    session: Arc<PrintSessionContext>,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
}

impl<T: GpioTransport, P: PrinterControl> Engine<T, P> {
    fn build_sensors(cfg: &[ExtruderCfg; 2], now_ms: u64) -> [Option<ExtruderSensors>; 2] {
        let build = |c: &ExtruderCfg| {
            if !c.enabled {
                return None;
            }
            Some(ExtruderSensors {
                runout: SensorState::new(
                    c.runout.pin,
                    SensorKind::Runout,
                    c.runout.inverted,
                    c.debounce_ms,
                    now_ms,
                ),
                motion: SensorState::new(
                    c.motion.pin,
                    SensorKind::Motion,
                    c.motion.inverted,
                    c.debounce_ms,
                    now_ms,
                ),
            })
        };
        [build(&cfg[0]), build(&cfg[1])]
    }

    /// One full check: read all channels, debounce, arbitrate triggers.
    fn check_sensors(&mut self) -> std::result::Result<(), WatchError> {
        let timeout = Duration::from_millis(self.cfg.read_timeout_ms);
        let samples = self
            .transport
            .read_all(timeout)
            .map_err(|e| map_transport_error(&*e))?;
        let now = self.clock.ms_since(self.epoch);
        let printing = self.session.is_printing();
        let paused = self.session.is_paused();
        let active = self.session.current_extruder();

        for idx in 0..self.extruders.len() {
            // Scan filter: disabled, non-active, or already-triggered
            // extruders are skipped before any sensor is touched.
            if self.cfg.only_active_extruder && printing && idx != active {
                continue;
            }
            if printing && self.session.is_triggered(idx) {
                continue;
            }
            let Some(ext) = self.extruders[idx].as_mut() else {
                continue;
            };

            let runout_changed = ext.runout.update(samples[usize::from(ext.runout.pin())], now);
            let motion_changed = ext.motion.update(samples[usize::from(ext.motion.pin())], now);
            if runout_changed || motion_changed {
                tracing::debug!(
                    extruder = idx,
                    runout = ext.runout.stable_value(),
                    motion = ext.motion.stable_value(),
                    "sensor state change"
                );
            }

            if let Some(decision) = self
                .policy
                .check_runout(idx, &ext.runout, runout_changed, printing)
            {
                // The printer itself is the authority on whether a job is
                // still running; a stale session flag must not pause it.
                if self.dispatcher.printer().is_printing() {
                    self.session.mark_triggered(idx);
                    self.dispatcher.dispatch(&decision);
                }
            }

            // Motion timeouts are paced by the rearm guard alone: the stall
            // is re-announced every full timeout interval, so the extruder
            // is not latched into the triggered set.
            if let Some(decision) = self
                .policy
                .check_motion(idx, &mut ext.motion, printing, paused, now)
            {
                self.dispatcher.dispatch(&decision);
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> StatusSnapshot {
        let now = self.clock.ms_since(self.epoch);
        let extruders = self
            .extruders
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let ext = slot.as_ref()?;
                let timeout_ms = self.extruder_cfg[idx].motion_timeout_ms;
                Some(ExtruderStatus {
                    extruder: idx,
                    runout: RunoutStatus {
                        filament_present: ext.runout.stable_value(),
                        pin: ext.runout.pin(),
                        triggered: self.session.is_triggered(idx),
                    },
                    motion: MotionStatus {
                        state: ext.motion.stable_value(),
                        pin: ext.motion.pin(),
                        last_pulse_ms: ext.motion.last_pulse_ms(),
                        timed_out: ext.motion.motion_timed_out(timeout_ms, now),
                        rate_pps: ext.motion.motion_rate(RATE_WINDOW_MS, now),
                    },
                })
            })
            .collect();
        StatusSnapshot {
            is_printing: self.session.is_printing(),
            is_paused: self.session.is_paused(),
            current_extruder: self.session.current_extruder(),
            extruders,
        }
    }
}

/// Adaptive polling loop around the engine.
///
/// `start`/`stop` are idempotent. Reconfiguration stops the loop, rebuilds
/// the sensor bank under the engine mutex, and restarts it.
pub struct SensorMonitor {
    engine: Arc<Mutex<Engine<BoxedTransport, BoxedPrinter>>>,
    session: Arc<PrintSessionContext>,
    clock: Arc<dyn Clock + Send + Sync>,
    base_interval: Duration,
    active: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SensorMonitor {
    pub(crate) fn assemble(
        mut transport: BoxedTransport,
        printer: BoxedPrinter,
        cfg: WatchCfg,
        notifier: Option<Box<dyn filawatch_traits::Notifier + Send>>,
        session: Arc<PrintSessionContext>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        use eyre::WrapErr;

        for ext in cfg.extruders.iter().filter(|e| e.enabled) {
            for pin in [ext.runout.pin, ext.motion.pin] {
                transport
                    .configure(pin, filawatch_traits::PinDirection::Input)
                    .map_err(|e| eyre::Report::new(map_transport_error(&*e)))
                    .wrap_err("configuring transport channel")?;
            }
        }

        let epoch = clock.now();
        let now = clock.ms_since(epoch); // 0
        let dispatcher = ActionDispatcher::new(
            printer,
            cfg.scripts.clone(),
            notifier,
            cfg.monitor.notification_enabled,
        );
        let engine = Engine {
            transport,
            extruders: Engine::<BoxedTransport, BoxedPrinter>::build_sensors(&cfg.extruders, now),
            policy: TriggerPolicy::new(&cfg.extruders),
            dispatcher,
            cfg: cfg.monitor.clone(),
            extruder_cfg: cfg.extruders.clone(),
            session: Arc::clone(&session),
            clock: Arc::clone(&clock),
            epoch,
        };
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            session,
            clock,
            base_interval: Duration::from_millis(cfg.monitor.base_interval_ms),
            active: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    /// Shared print-session handle for host event callbacks.
    pub fn session(&self) -> Arc<PrintSessionContext> {
        Arc::clone(&self.session)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the poll loop. No-op while a loop thread is already alive.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.active.store(true, Ordering::Relaxed);
        let engine = Arc::clone(&self.engine);
        let session = Arc::clone(&self.session);
        let clock = Arc::clone(&self.clock);
        let active = Arc::clone(&self.active);
        let base = self.base_interval;
        self.handle = Some(std::thread::spawn(move || {
            tracing::info!("sensor poll loop started");
            while active.load(Ordering::Relaxed) {
                let interval = if session.is_printing() && !session.is_paused() {
                    base.min(PRINTING_INTERVAL_FLOOR)
                } else {
                    base.max(IDLE_INTERVAL_CEILING)
                };
                let result = match engine.lock() {
                    Ok(mut eng) => eng.check_sensors(),
                    // A poisoned mutex means another path already panicked
                    // while holding the engine; nothing left to monitor.
                    Err(_) => break,
                };
                if let Err(e) = result {
                    tracing::error!(error = %e, "sensor read failed, backing off");
                    clock.sleep(READ_ERROR_BACKOFF);
                    continue;
                }
                if !active.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(interval);
            }
            tracing::debug!("sensor poll loop exiting");
        }));
    }

    /// Signal the loop and wait up to 2 s for it to exit. A loop that does
    /// not come back in time is abandoned, never killed.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::Relaxed);
        let Some(handle) = self.handle.take() else {
            return;
        };
        let deadline = Instant::now() + STOP_JOIN_WAIT;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                tracing::warn!("poll loop thread panicked during shutdown");
            }
        } else {
            tracing::warn!("poll loop did not stop within 2s, abandoning thread");
        }
    }

    /// Run exactly one locked poll tick synchronously. Shares the engine
    /// mutex with the loop thread, so a tick never interleaves with one.
    pub fn poll_once(&self) -> Result<()> {
        let mut eng = self
            .engine
            .lock()
            .map_err(|_| eyre::Report::new(WatchError::State("engine mutex poisoned".into())))?;
        eng.check_sensors().map_err(eyre::Report::new)?;
        Ok(())
    }

    pub fn status(&self) -> Result<StatusSnapshot> {
        let eng = self
            .engine
            .lock()
            .map_err(|_| eyre::Report::new(WatchError::State("engine mutex poisoned".into())))?;
        Ok(eng.snapshot())
    }

    /// Replace sensors, policy, and scripts from a new configuration.
    /// The loop is stopped for the swap and restarted if it was running.
    pub fn reconfigure(&mut self, cfg: &WatchCfg) -> Result<()> {
        cfg.validate().map_err(eyre::Report::new)?;
        let was_running = self.is_running();
        self.stop();
        {
            let mut eng = self.engine.lock().map_err(|_| {
                eyre::Report::new(WatchError::State("engine mutex poisoned".into()))
            })?;
            for ext in cfg.extruders.iter().filter(|e| e.enabled) {
                for pin in [ext.runout.pin, ext.motion.pin] {
                    eng.transport
                        .configure(pin, filawatch_traits::PinDirection::Input)
                        .map_err(|e| eyre::Report::new(map_transport_error(&*e)))?;
                }
            }
            let now = eng.clock.ms_since(eng.epoch);
            eng.extruders =
                Engine::<BoxedTransport, BoxedPrinter>::build_sensors(&cfg.extruders, now);
            eng.policy = TriggerPolicy::new(&cfg.extruders);
            eng.dispatcher
                .reconfigure(cfg.scripts.clone(), cfg.monitor.notification_enabled);
            eng.cfg = cfg.monitor.clone();
            eng.extruder_cfg = cfg.extruders.clone();
        }
        self.base_interval = Duration::from_millis(cfg.monitor.base_interval_ms);
        if was_running {
            self.start();
        }
        tracing::info!("monitor reconfigured");
        Ok(())
    }

    /// Stop the loop, then close the transport (shutdown teardown order).
    pub fn shutdown(&mut self) {
        self.stop();
        if let Ok(mut eng) = self.engine.lock() {
            eng.transport.close();
        }
    }
}

impl Drop for SensorMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
