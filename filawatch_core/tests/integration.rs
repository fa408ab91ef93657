//! End-to-end trigger scenarios driven deterministically through a manual
//! clock and `poll_once`, with the transport frame mutated between polls the
//! way a real bridge would see levels change.

use filawatch_core::config::WatchCfg;
use filawatch_core::mocks::{SharedTransport, SpyNotifier, SpyPrinter};
use filawatch_core::session::{PrintEvent, PrintSessionContext};
use filawatch_core::SensorMonitor;
use filawatch_traits::ManualClock;
use std::sync::{Arc, Mutex};

struct Harness {
    monitor: SensorMonitor,
    frame: Arc<Mutex<[bool; 4]>>,
    printer: SpyPrinter,
    notifier: SpyNotifier,
    clock: ManualClock,
    session: Arc<PrintSessionContext>,
}

fn harness(cfg: WatchCfg) -> Harness {
    // Filament present on both extruders, motion lines idle.
    let (transport, frame) = SharedTransport::new([true, false, true, false]);
    let printer = SpyPrinter::new(true);
    let notifier = SpyNotifier::new();
    let clock = ManualClock::new();
    let session = Arc::new(PrintSessionContext::new());
    let monitor = SensorMonitor::builder()
        .with_transport(transport)
        .with_printer(printer.clone())
        .with_config(cfg)
        .with_notifier(notifier.clone())
        .with_session(Arc::clone(&session))
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("build monitor");
    Harness {
        monitor,
        frame,
        printer,
        notifier,
        clock,
        session,
    }
}

impl Harness {
    fn set_channel(&self, channel: usize, level: bool) {
        if let Ok(mut f) = self.frame.lock() {
            f[channel] = level;
        }
    }

    /// Poll every `step_ms` until `span_ms` has elapsed.
    fn poll_span(&self, span_ms: u64, step_ms: u64) {
        let mut elapsed = 0;
        while elapsed < span_ms {
            self.clock.advance_ms(step_ms);
            self.monitor.poll_once().expect("poll");
            elapsed += step_ms;
        }
    }
}

#[test]
fn runout_held_past_debounce_dispatches_exactly_once() {
    // Default config: 500 ms debounce, empty scripts (pause fallback).
    let h = harness(WatchCfg::default());
    h.session.handle_event(PrintEvent::Started);

    // Filament present long enough to settle the debouncer.
    h.poll_span(1_000, 50);
    assert_eq!(h.printer.pauses(), 0);

    // Runout held for 600 ms: one pause, extruder marked as triggered.
    h.set_channel(0, false);
    h.poll_span(600, 50);
    assert_eq!(h.printer.pauses(), 1);
    assert!(h.session.is_triggered(0));

    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "runout");
    assert_eq!(events[0].1, 0);
}

#[test]
fn flapping_after_a_runout_fire_stays_silent_until_resume() {
    let h = harness(WatchCfg::default());
    h.session.handle_event(PrintEvent::Started);

    h.poll_span(1_000, 50);
    h.set_channel(0, false);
    h.poll_span(600, 50);
    assert_eq!(h.printer.pauses(), 1);

    // State flapping while triggered: the extruder is skipped outright.
    for _ in 0..3 {
        h.set_channel(0, true);
        h.poll_span(600, 50);
        h.set_channel(0, false);
        h.poll_span(600, 50);
    }
    assert_eq!(h.printer.pauses(), 1);

    // Resume resets the episode; a fresh insert + runout cycle fires again.
    h.session.handle_event(PrintEvent::Resumed);
    h.poll_span(600, 50); // filament still out: reconciles, no new transition
    assert_eq!(h.printer.pauses(), 1);

    h.set_channel(0, true);
    h.poll_span(600, 50); // filament re-inserted, commits present
    h.set_channel(0, false);
    h.poll_span(600, 50); // second genuine runout
    assert_eq!(h.printer.pauses(), 2);
}

#[test]
fn motion_silence_refires_once_per_full_timeout() {
    let mut cfg = WatchCfg::default();
    cfg.extruders[0].motion_timeout_ms = 30_000;
    let h = harness(cfg);
    h.session.handle_event(PrintEvent::Started);

    // 65 s without a single motion pulse, polled once a second: fires at the
    // first tick past 30 s, rearms, fires again one full timeout later.
    h.poll_span(65_000, 1_000);
    assert_eq!(h.printer.pauses(), 2);

    let kinds: Vec<String> = h.notifier.events().into_iter().map(|e| e.0).collect();
    assert_eq!(kinds, vec!["motion_timeout", "motion_timeout"]);
    // Motion stalls do not consume the once-per-episode runout latch.
    assert!(!h.session.is_triggered(0));
}

#[test]
fn motion_pulses_keep_the_timeout_at_bay() {
    let mut cfg = WatchCfg::default();
    cfg.extruders[0].motion_timeout_ms = 30_000;
    cfg.extruders[0].debounce_ms = 0;
    let h = harness(cfg);
    h.session.handle_event(PrintEvent::Started);

    // Toggle the motion line each poll for 60 s: every high commits a pulse.
    for _ in 0..60 {
        let level = h.frame.lock().map(|f| f[1]).unwrap_or(false);
        h.set_channel(1, !level);
        h.poll_span(1_000, 1_000);
    }
    assert_eq!(h.printer.pauses(), 0);
}

#[test]
fn inactive_extruder_is_skipped_while_printing() {
    let h = harness(WatchCfg::default());
    h.session.handle_event(PrintEvent::Started);
    h.session.observe_command("T1");

    h.poll_span(1_000, 50);

    // E0 runs out but tool 1 is selected: nothing fires for E0.
    h.set_channel(0, false);
    h.poll_span(600, 50);
    assert_eq!(h.printer.pauses(), 0);
    assert!(!h.session.is_triggered(0));

    // The active extruder is still armed.
    h.set_channel(2, false);
    h.poll_span(600, 50);
    assert_eq!(h.printer.pauses(), 1);
    assert!(h.session.is_triggered(1));
    assert_eq!(h.notifier.events()[0].1, 1);
}

#[test]
fn pause_blocks_motion_timeouts_but_not_runout() {
    let mut cfg = WatchCfg::default();
    cfg.extruders[0].motion_timeout_ms = 30_000;
    let h = harness(cfg);
    h.session.handle_event(PrintEvent::Started);
    h.poll_span(1_000, 50);
    h.session.handle_event(PrintEvent::Paused);

    // Paused through the whole stall window: motion stays quiet.
    h.poll_span(40_000, 1_000);
    assert_eq!(h.printer.pauses(), 0);

    // Runout is reported even while paused.
    h.set_channel(0, false);
    h.poll_span(600, 50);
    assert_eq!(h.printer.pauses(), 1);
    assert_eq!(h.notifier.events()[0].0, "runout");
}

#[test]
fn printer_disagreeing_about_printing_suppresses_runout() {
    let h = harness(WatchCfg::default());
    h.session.handle_event(PrintEvent::Started);
    // The print-control collaborator is the authority of record.
    h.printer.set_printing(false);

    h.poll_span(1_000, 50);
    h.set_channel(0, false);
    h.poll_span(600, 50);
    assert_eq!(h.printer.pauses(), 0);
    assert!(!h.session.is_triggered(0));
}

#[test]
fn status_snapshot_reflects_sensor_and_session_state() {
    let h = harness(WatchCfg::default());
    h.session.handle_event(PrintEvent::Started);
    h.poll_span(1_000, 50);
    h.set_channel(0, false);
    h.poll_span(600, 50);

    let snap = h.monitor.status().expect("snapshot");
    assert!(snap.is_printing);
    assert!(!snap.is_paused);
    assert_eq!(snap.extruders.len(), 2);
    assert_eq!(snap.current_extruder, 0);

    let e0 = &snap.extruders[0];
    assert!(!e0.runout.filament_present);
    assert!(e0.runout.triggered);
    assert_eq!(e0.runout.pin, 0);
    assert_eq!(e0.motion.pin, 1);
    assert!(!e0.motion.timed_out, "stall window has not elapsed yet");
}

#[test]
fn no_triggers_while_idle() {
    let h = harness(WatchCfg::default());
    // No print session: runout transitions and stalls are observed but never
    // dispatched.
    h.poll_span(1_000, 50);
    h.set_channel(0, false);
    h.poll_span(600, 50);
    h.poll_span(40_000, 1_000);
    assert_eq!(h.printer.pauses(), 0);
    assert!(h.notifier.events().is_empty());
}
