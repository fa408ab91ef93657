#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Filament-sensor watchdog engine (hardware-agnostic).
//!
//! All hardware and printer interactions go through the
//! `filawatch_traits::GpioTransport` and `filawatch_traits::PrinterControl`
//! traits.
//!
//! ## Architecture
//!
//! - **Debouncing**: per-pin stable state with motion-pulse history
//!   (`sensor` module)
//! - **Arbitration**: runout and motion-timeout checks with once-per-episode
//!   semantics (`policy` module)
//! - **Session**: printing/paused/active-extruder flags mutated by host
//!   lifecycle events (`session` module)
//! - **Dispatch**: declarative action scripts against the printer
//!   (`actions` module)
//! - **Scheduling**: one adaptive-rate loop thread owning the sensor bank
//!   behind a single mutex (`monitor` module)
//!
//! ## Timeline
//!
//! The engine keeps every timestamp as integer milliseconds since its own
//! epoch, computed once per tick through `filawatch_traits::Clock`. Tests
//! drive the whole stack with a `ManualClock` and `poll_once()`.

pub mod actions;
pub mod config;
pub mod error;
pub mod mocks;
pub mod monitor;
pub mod policy;
pub mod sensor;
pub mod session;
pub mod status;

pub use actions::{ActionDispatcher, ChannelNotifier, Notification};
pub use config::{ActionScripts, ExtruderCfg, MonitorCfg, SensorCfg, WatchCfg};
pub use monitor::{BoxedPrinter, BoxedTransport, SensorMonitor};
pub use policy::{TriggerDecision, TriggerKind, TriggerPolicy};
pub use sensor::{RATE_WINDOW_MS, SensorKind, SensorState};
pub use session::{PrintEvent, PrintSessionContext};
pub use status::{ExtruderStatus, MotionStatus, RunoutStatus, StatusSnapshot};

use crate::error::{BuildError, Result};
use filawatch_traits::clock::{Clock, MonotonicClock};
use filawatch_traits::{GpioTransport, Notifier, PrinterControl};
use std::marker::PhantomData;
use std::sync::Arc;

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

/// Builder for [`SensorMonitor`]. Transport and printer advance the
/// type-state; everything else is optional with engine defaults. All
/// configuration is validated on `build()`.
pub struct MonitorBuilder<T, P> {
    transport: Option<BoxedTransport>,
    printer: Option<BoxedPrinter>,
    cfg: Option<WatchCfg>,
    notifier: Option<Box<dyn Notifier + Send>>,
    session: Option<Arc<PrintSessionContext>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _t: PhantomData<T>,
    _p: PhantomData<P>,
}

impl Default for MonitorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            transport: None,
            printer: None,
            cfg: None,
            notifier: None,
            session: None,
            clock: None,
            _t: PhantomData,
            _p: PhantomData,
        }
    }
}

impl SensorMonitor {
    /// Start building a monitor.
    pub fn builder() -> MonitorBuilder<Missing, Missing> {
        MonitorBuilder::default()
    }
}

/// Chainable setters that do not affect type-state
impl<T, P> MonitorBuilder<T, P> {
    pub fn with_config(mut self, cfg: WatchCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + Send + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    /// Share an existing session (host event callbacks keep the other Arc).
    pub fn with_session(mut self, session: Arc<PrintSessionContext>) -> Self {
        self.session = Some(session);
        self
    }

    /// Provide a custom clock implementation; defaults to MonotonicClock.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fallible build available in any type-state; returns a detailed
    /// BuildError for missing pieces.
    pub fn try_build(self) -> Result<SensorMonitor> {
        let MonitorBuilder {
            transport,
            printer,
            cfg,
            notifier,
            session,
            clock,
            _t: _,
            _p: _,
        } = self;

        let transport = transport.ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        let printer = printer.ok_or_else(|| eyre::Report::new(BuildError::MissingPrinter))?;
        let cfg = cfg.unwrap_or_default();
        cfg.validate().map_err(eyre::Report::new)?;

        let session = session.unwrap_or_else(|| Arc::new(PrintSessionContext::new()));
        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        SensorMonitor::assemble(transport, printer, cfg, notifier, session, clock)
    }
}

// Setters that advance type-state when providing mandatory components
impl<P> MonitorBuilder<Missing, P> {
    pub fn with_transport(
        self,
        transport: impl GpioTransport + Send + 'static,
    ) -> MonitorBuilder<Set, P> {
        let MonitorBuilder {
            transport: _,
            printer,
            cfg,
            notifier,
            session,
            clock,
            _t: _,
            _p: _,
        } = self;
        MonitorBuilder {
            transport: Some(Box::new(transport)),
            printer,
            cfg,
            notifier,
            session,
            clock,
            _t: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<T> MonitorBuilder<T, Missing> {
    pub fn with_printer(
        self,
        printer: impl PrinterControl + Send + 'static,
    ) -> MonitorBuilder<T, Set> {
        let MonitorBuilder {
            transport,
            printer: _,
            cfg,
            notifier,
            session,
            clock,
            _t: _,
            _p: _,
        } = self;
        MonitorBuilder {
            transport,
            printer: Some(Box::new(printer)),
            cfg,
            notifier,
            session,
            clock,
            _t: PhantomData,
            _p: PhantomData,
        }
    }
}

impl MonitorBuilder<Set, Set> {
    /// Validate and build the monitor. Only available once transport and
    /// printer are both set.
    pub fn build(self) -> Result<SensorMonitor> {
        self.try_build()
    }
}
