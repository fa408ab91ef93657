//! Optional real-time scheduling setup for the poll loop.
//!
//! The watch loop polls motion pulses at millisecond rates while printing;
//! SCHED_FIFO plus locked memory keeps jitter down on a busy host. Applied at
//! most once per process, and every failure degrades to a warning.

use crate::cli::RtLock;
use std::sync::Once;

static RT_INIT: Once = Once::new();

#[cfg(target_os = "linux")]
pub fn setup_rt_once(enabled: bool, prio: Option<i32>, lock: RtLock, cpu: Option<usize>) {
    if !enabled {
        return;
    }
    RT_INIT.call_once(|| {
        let prio = prio.unwrap_or(10);
        let param = libc::sched_param {
            sched_priority: prio,
        };
        // SAFETY: sched_setscheduler on the current process with a valid
        // sched_param; failure is reported via the return value.
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
            tracing::warn!(prio, "SCHED_FIFO not applied (insufficient privileges?)");
        } else {
            tracing::info!(prio, "SCHED_FIFO applied");
        }

        let cpu = cpu.unwrap_or(0);
        // SAFETY: cpu_set_t is a plain bitmask; CPU_ZERO/CPU_SET initialize
        // it fully before sched_setaffinity reads it.
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(cpu, &mut set);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                tracing::warn!(cpu, "CPU affinity not applied");
            } else {
                tracing::info!(cpu, "pinned to CPU");
            }
        }

        let flags = match lock {
            RtLock::None => 0,
            RtLock::Current => libc::MCL_CURRENT,
            RtLock::All => libc::MCL_CURRENT | libc::MCL_FUTURE,
        };
        // SAFETY: mlockall takes only flags and affects the current process.
        if flags != 0 && unsafe { libc::mlockall(flags) } != 0 {
            tracing::warn!(?lock, "mlockall failed (check memlock ulimit)");
        } else if flags != 0 {
            tracing::info!(?lock, "memory locked");
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(enabled: bool, _prio: Option<i32>, _lock: RtLock, _cpu: Option<usize>) {
    if !enabled {
        return;
    }
    RT_INIT.call_once(|| {
        tracing::warn!("real-time scheduling is not supported on this OS, continuing without it");
    });
}
