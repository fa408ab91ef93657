//! Print-session context shared between the poll loop and host callbacks.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Discrete print-lifecycle events delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintEvent {
    Started,
    Done,
    Failed,
    Cancelled,
    Paused,
    Resumed,
}

/// Process-wide print state.
///
/// Host callbacks write from their own thread; the poll loop reads on the
/// next tick. Each field write is individually atomic and a one-tick lag is
/// accepted, so no lock spans the whole struct.
#[derive(Debug, Default)]
pub struct PrintSessionContext {
    current_extruder: AtomicUsize,
    printing: AtomicBool,
    paused: AtomicBool,
    triggered: Mutex<HashSet<usize>>,
}

impl PrintSessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_printing(&self) -> bool {
        self.printing.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn current_extruder(&self) -> usize {
        self.current_extruder.load(Ordering::Relaxed)
    }

    /// Apply a print-lifecycle transition.
    ///
    /// The triggered set is cleared exactly on start and resume; terminal
    /// events only drop the printing/paused flags.
    pub fn handle_event(&self, event: PrintEvent) {
        match event {
            PrintEvent::Started => {
                self.printing.store(true, Ordering::Relaxed);
                self.paused.store(false, Ordering::Relaxed);
                self.clear_triggered();
                tracing::info!("print started, sensor triggers reset");
            }
            PrintEvent::Done | PrintEvent::Failed | PrintEvent::Cancelled => {
                self.printing.store(false, Ordering::Relaxed);
                self.paused.store(false, Ordering::Relaxed);
                tracing::info!(?event, "print ended, monitoring continues");
            }
            PrintEvent::Paused => {
                self.paused.store(true, Ordering::Relaxed);
                tracing::info!("print paused");
            }
            PrintEvent::Resumed => {
                self.paused.store(false, Ordering::Relaxed);
                self.clear_triggered();
                tracing::info!("print resumed, sensor triggers reset");
            }
        }
    }

    /// Track tool selects (`T0`, `T1`). Anything else, including malformed
    /// tool numbers, is ignored.
    pub fn observe_command(&self, command: &str) {
        let Some(word) = command.split_whitespace().next() else {
            return;
        };
        if let Some(rest) = word.strip_prefix('T')
            && let Ok(tool) = rest.parse::<usize>()
            && tool < 2
        {
            let previous = self.current_extruder.swap(tool, Ordering::Relaxed);
            if previous != tool {
                tracing::debug!(extruder = tool, "active extruder changed");
            }
        }
    }

    pub fn is_triggered(&self, extruder: usize) -> bool {
        self.triggered
            .lock()
            .map(|set| set.contains(&extruder))
            .unwrap_or(false)
    }

    pub fn mark_triggered(&self, extruder: usize) {
        if let Ok(mut set) = self.triggered.lock() {
            set.insert(extruder);
        }
    }

    /// Sorted list of extruders that already fired this episode (status
    /// reporting).
    pub fn triggered_extruders(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .triggered
            .lock()
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    fn clear_triggered(&self) {
        if let Ok(mut set) = self.triggered.lock() {
            set.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_resume_clear_triggers_terminal_events_do_not() {
        let session = PrintSessionContext::new();
        session.handle_event(PrintEvent::Started);
        session.mark_triggered(0);
        session.handle_event(PrintEvent::Done);
        assert!(session.is_triggered(0));
        assert!(!session.is_printing());

        session.handle_event(PrintEvent::Started);
        assert!(!session.is_triggered(0));

        session.mark_triggered(1);
        session.handle_event(PrintEvent::Paused);
        assert!(session.is_triggered(1));
        session.handle_event(PrintEvent::Resumed);
        assert!(!session.is_triggered(1));
    }

    #[test]
    fn tool_commands_move_the_active_extruder() {
        let session = PrintSessionContext::new();
        session.observe_command("T1");
        assert_eq!(session.current_extruder(), 1);
        session.observe_command("T0 ; back to the first tool");
        assert_eq!(session.current_extruder(), 0);
        // Out-of-range and malformed selects are ignored.
        session.observe_command("T7");
        session.observe_command("Tx");
        session.observe_command("G1 X10");
        assert_eq!(session.current_extruder(), 0);
    }
}
