//! Action script execution against the print-control collaborator.

use crate::config::ActionScripts;
use crate::policy::{TriggerDecision, TriggerKind};
use filawatch_traits::{BoxError, Notifier, PrinterControl};

/// Executes the configured multi-line action script for a fired trigger and
/// pushes a host notification.
///
/// Dispatch has no return value toward the sensor engine: collaborator
/// failures are logged per line and never propagate into the poll loop.
pub struct ActionDispatcher<P: PrinterControl> {
    printer: P,
    scripts: ActionScripts,
    notifier: Option<Box<dyn Notifier + Send>>,
    notifications_enabled: bool,
}

impl<P: PrinterControl> ActionDispatcher<P> {
    pub fn new(
        printer: P,
        scripts: ActionScripts,
        notifier: Option<Box<dyn Notifier + Send>>,
        notifications_enabled: bool,
    ) -> Self {
        Self {
            printer,
            scripts,
            notifier,
            notifications_enabled,
        }
    }

    pub fn printer(&self) -> &P {
        &self.printer
    }

    /// Swap scripts and the notification switch (reconfiguration path).
    pub(crate) fn reconfigure(&mut self, scripts: ActionScripts, notifications_enabled: bool) {
        self.scripts = scripts;
        self.notifications_enabled = notifications_enabled;
    }

    pub fn dispatch(&mut self, decision: &TriggerDecision) {
        let message = match decision.kind {
            TriggerKind::Runout => {
                format!("Filament runout detected on E{}", decision.extruder)
            }
            TriggerKind::MotionTimeout => {
                format!("Motion timeout detected on E{}", decision.extruder)
            }
        };
        tracing::warn!(
            extruder = decision.extruder,
            kind = decision.kind.as_str(),
            "{message}"
        );

        if self.notifications_enabled
            && let Some(notifier) = self.notifier.as_mut()
            && let Err(e) = notifier.notify(decision.kind.as_str(), decision.extruder, &message)
        {
            tracing::warn!(error = %e, "host notification failed");
        }

        let script = match decision.kind {
            TriggerKind::Runout => self.scripts.runout.clone(),
            TriggerKind::MotionTimeout => self.scripts.motion_timeout.clone(),
        };
        self.run_script(&script, decision.kind);
    }

    fn run_script(&mut self, script: &str, kind: TriggerKind) {
        let lines: Vec<&str> = script
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            if let Err(e) = self.printer.pause() {
                tracing::warn!(error = %e, "pause request failed");
            } else {
                tracing::info!(
                    kind = kind.as_str(),
                    "no action script configured, pausing print"
                );
            }
            return;
        }
        for line in lines {
            if line.starts_with('@') {
                if line.starts_with("@pause") {
                    if let Err(e) = self.printer.pause() {
                        tracing::warn!(error = %e, "pause request failed");
                    }
                } else {
                    tracing::debug!(action = line, "ignoring unknown action command");
                }
            } else if line.starts_with(';') {
                tracing::info!(kind = kind.as_str(), comment = line, "action script comment");
            } else if let Err(e) = self.printer.send_command(line) {
                tracing::warn!(error = %e, command = line, "printer rejected command");
            }
        }
    }
}

/// A fired-trigger notification as seen by the host channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: String,
    pub extruder: usize,
    pub message: String,
}

/// Notifier backed by a bounded crossbeam channel, drained by the host side.
///
/// `try_send` keeps the poll loop non-blocking; a full or disconnected
/// channel surfaces as a notify error, which the dispatcher logs and drops.
pub struct ChannelNotifier {
    tx: crossbeam_channel::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, crossbeam_channel::Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&mut self, kind: &str, extruder: usize, message: &str) -> Result<(), BoxError> {
        let note = Notification {
            kind: kind.to_string(),
            extruder,
            message: message.to_string(),
        };
        self.tx.try_send(note).map_err(|e| -> BoxError {
            match e {
                crossbeam_channel::TrySendError::Full(_) => {
                    Box::new(std::io::Error::other("notification channel full"))
                }
                crossbeam_channel::TrySendError::Disconnected(_) => {
                    Box::new(std::io::Error::other("notification channel disconnected"))
                }
            }
        })
    }
}
