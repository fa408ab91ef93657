//! Test and helper doubles for filawatch_core.

use filawatch_traits::{BoxError, GpioTransport, Notifier, PinDirection, PrinterControl};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A transport that always errors on read; useful when exercising the
/// loop's back-off path or when samples come from somewhere else entirely.
pub struct NoopTransport;

impl GpioTransport for NoopTransport {
    fn configure(&mut self, _channel: u8, _direction: PinDirection) -> Result<(), BoxError> {
        Ok(())
    }
    fn read_all(&mut self, _timeout: Duration) -> Result<[bool; 4], BoxError> {
        Err(Box::new(std::io::Error::other("noop transport")))
    }
    fn close(&mut self) {}
}

/// Transport reading whatever the shared frame currently holds; tests mutate
/// the frame between polls.
pub struct SharedTransport {
    frame: Arc<Mutex<[bool; 4]>>,
}

impl SharedTransport {
    pub fn new(initial: [bool; 4]) -> (Self, Arc<Mutex<[bool; 4]>>) {
        let frame = Arc::new(Mutex::new(initial));
        (
            Self {
                frame: Arc::clone(&frame),
            },
            frame,
        )
    }
}

impl GpioTransport for SharedTransport {
    fn configure(&mut self, channel: u8, _direction: PinDirection) -> Result<(), BoxError> {
        if channel > 3 {
            return Err(Box::new(std::io::Error::other("no such channel")));
        }
        Ok(())
    }
    fn read_all(&mut self, _timeout: Duration) -> Result<[bool; 4], BoxError> {
        self.frame
            .lock()
            .map(|f| *f)
            .map_err(|_| -> BoxError { Box::new(std::io::Error::other("frame poisoned")) })
    }
    fn close(&mut self) {}
}

#[derive(Debug, Default)]
pub struct SpyPrinterLog {
    pub pauses: usize,
    pub commands: Vec<String>,
    pub printing: bool,
    pub fail_commands: bool,
}

/// Records pause/command calls for assertions. Clones share the log.
#[derive(Debug, Default, Clone)]
pub struct SpyPrinter {
    inner: Arc<Mutex<SpyPrinterLog>>,
}

impl SpyPrinter {
    pub fn new(printing: bool) -> Self {
        let spy = Self::default();
        if let Ok(mut log) = spy.inner.lock() {
            log.printing = printing;
        }
        spy
    }

    pub fn log(&self) -> Arc<Mutex<SpyPrinterLog>> {
        Arc::clone(&self.inner)
    }

    pub fn set_printing(&self, printing: bool) {
        if let Ok(mut log) = self.inner.lock() {
            log.printing = printing;
        }
    }

    pub fn pauses(&self) -> usize {
        self.inner.lock().map(|l| l.pauses).unwrap_or(0)
    }

    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().map(|l| l.commands.clone()).unwrap_or_default()
    }
}

impl PrinterControl for SpyPrinter {
    fn pause(&mut self) -> Result<(), BoxError> {
        if let Ok(mut log) = self.inner.lock() {
            log.pauses += 1;
        }
        Ok(())
    }

    fn send_command(&mut self, command: &str) -> Result<(), BoxError> {
        let mut log = self
            .inner
            .lock()
            .map_err(|_| -> BoxError { Box::new(std::io::Error::other("spy poisoned")) })?;
        if log.fail_commands {
            return Err(Box::new(std::io::Error::other("printer rejected command")));
        }
        log.commands.push(command.to_string());
        Ok(())
    }

    fn is_printing(&self) -> bool {
        self.inner.lock().map(|l| l.printing).unwrap_or(false)
    }
}

/// Collects notifications in memory. Clones share the buffer.
#[derive(Debug, Default, Clone)]
pub struct SpyNotifier {
    events: Arc<Mutex<Vec<(String, usize, String)>>>,
}

impl SpyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, usize, String)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Notifier for SpyNotifier {
    fn notify(&mut self, kind: &str, extruder: usize, message: &str) -> Result<(), BoxError> {
        if let Ok(mut events) = self.events.lock() {
            events.push((kind.to_string(), extruder, message.to_string()));
        }
        Ok(())
    }
}
