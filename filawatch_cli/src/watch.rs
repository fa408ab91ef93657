//! Watchdog assembly and the `watch`/`status`/`self-check` command bodies.

use crate::cli::RtLock;
use crate::rt::setup_rt_once;
use eyre::WrapErr;
use filawatch_config::Config;
use filawatch_core::monitor::BoxedTransport;
use filawatch_core::{ChannelNotifier, PrintEvent, SensorMonitor, WatchCfg};
use filawatch_hardware::SimulatedBridge;
use filawatch_traits::{BoxError, GpioTransport, PinDirection, PrinterControl};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Stand-in print-control collaborator: logs pauses and commands instead of
/// driving a real host. Deployments wire the host's own implementation here.
pub struct LogPrinter {
    printing: Arc<AtomicBool>,
}

impl LogPrinter {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let printing = Arc::new(AtomicBool::new(false));
        (
            Self {
                printing: Arc::clone(&printing),
            },
            printing,
        )
    }
}

impl PrinterControl for LogPrinter {
    fn pause(&mut self) -> Result<(), BoxError> {
        tracing::warn!("printer pause requested");
        Ok(())
    }

    fn send_command(&mut self, command: &str) -> Result<(), BoxError> {
        tracing::info!(command, "printer command");
        Ok(())
    }

    fn is_printing(&self) -> bool {
        self.printing.load(Ordering::Relaxed)
    }
}

/// Pick the transport: real hardware when compiled in and not overridden,
/// with a degraded-mode fallback to the simulated bridge instead of aborting.
fn build_transport(cfg: &Config, force_simulated: bool) -> BoxedTransport {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        if !force_simulated && !cfg.transport.simulated {
            match filawatch_hardware::GpioBridge::new(cfg.transport.bcm_pins) {
                Ok(bridge) => {
                    tracing::info!(pins = ?cfg.transport.bcm_pins, "gpio bridge initialized");
                    return Box::new(bridge);
                }
                Err(e) => {
                    tracing::error!(error = %e, "gpio bridge init failed, falling back to simulation");
                }
            }
        }
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    let _ = force_simulated;

    tracing::info!("using simulated bridge");
    Box::new(SimulatedBridge::new())
}

#[allow(clippy::too_many_arguments)]
pub fn run_watch(
    cfg: &Config,
    simulated: bool,
    simulate_print: bool,
    run_for: Option<u64>,
    rt: bool,
    rt_prio: Option<i32>,
    rt_lock: Option<RtLock>,
    rt_cpu: Option<usize>,
) -> eyre::Result<()> {
    setup_rt_once(rt, rt_prio, rt_lock.unwrap_or(RtLock::os_default()), rt_cpu);

    let transport = build_transport(cfg, simulated);
    let (printer, printing_flag) = LogPrinter::new();
    let (notifier, events) = ChannelNotifier::new(16);

    let mut monitor = SensorMonitor::builder()
        .with_transport(transport)
        .with_printer(printer)
        .with_config(WatchCfg::from(cfg))
        .with_notifier(notifier)
        .build()
        .wrap_err("building sensor monitor")?;
    let session = monitor.session();

    if simulate_print {
        printing_flag.store(true, Ordering::Relaxed);
        session.handle_event(PrintEvent::Started);
        tracing::info!("simulated print session started");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .wrap_err("installing ctrl-c handler")?;
    }

    monitor.start();
    tracing::info!("watchdog running, ctrl-c to stop");

    let deadline = run_for.map(|secs| Instant::now() + Duration::from_secs(secs));
    while !shutdown.load(Ordering::Relaxed) {
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            break;
        }
        // Drain fired-trigger notifications pushed by the poll loop.
        match events.recv_timeout(Duration::from_millis(250)) {
            Ok(note) => {
                tracing::warn!(kind = %note.kind, extruder = note.extruder, "{}", note.message);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    monitor.shutdown();
    tracing::info!("watchdog stopped");
    Ok(())
}

pub fn run_status(cfg: &Config, simulated: bool, json: bool) -> eyre::Result<()> {
    let transport = build_transport(cfg, simulated);
    let (printer, _printing) = LogPrinter::new();
    let monitor = SensorMonitor::builder()
        .with_transport(transport)
        .with_printer(printer)
        .with_config(WatchCfg::from(cfg))
        .build()
        .wrap_err("building sensor monitor")?;

    monitor.poll_once().wrap_err("sampling sensors")?;
    let snapshot = monitor.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!(
            "printing: {}  paused: {}  active extruder: E{}",
            snapshot.is_printing, snapshot.is_paused, snapshot.current_extruder
        );
        for ext in &snapshot.extruders {
            println!(
                "E{}: filament={} (pin {}) triggered={}  motion={} (pin {}) timed_out={} rate={:.2}/s",
                ext.extruder,
                ext.runout.filament_present,
                ext.runout.pin,
                ext.runout.triggered,
                ext.motion.state,
                ext.motion.pin,
                ext.motion.timed_out,
                ext.motion.rate_pps,
            );
        }
    }
    Ok(())
}

pub fn run_self_check(cfg: &Config, simulated: bool, json: bool) -> eyre::Result<()> {
    let mut transport = build_transport(cfg, simulated);
    for channel in 0..4u8 {
        transport
            .configure(channel, PinDirection::Input)
            .map_err(|e| eyre::eyre!("configuring channel {channel}: {e}"))?;
    }
    let levels = transport
        .read_all(Duration::from_millis(cfg.transport.read_timeout_ms))
        .map_err(|e| eyre::eyre!("reading channels: {e}"))?;
    transport.close();

    if json {
        println!("{}", serde_json::json!({ "channels": levels }));
    } else {
        for (channel, level) in levels.iter().enumerate() {
            println!("channel {channel}: {}", if *level { "high" } else { "low" });
        }
    }
    Ok(())
}
