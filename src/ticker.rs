//! Owned background timer for limiters that refill or drain on a schedule.
//!
//! A [`Ticker`] runs one named thread that invokes a callback on absolute
//! deadlines spaced `cadence` apart. The thread sleeps on a condvar so that
//! [`Ticker::shutdown`] can wake it immediately; dropping the ticker shuts it
//! down and joins the thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{ensure_positive, ConfigError};
use crate::types::Uint;

const NANOS_PER_SECOND: Uint = 1_000_000_000;

/// Converts a per-second rate into the interval between two ticks.
pub(crate) fn cadence_for_rate(rate_per_second: Uint) -> Result<Duration, ConfigError> {
    ensure_positive("rate_per_second", rate_per_second)?;
    if rate_per_second > NANOS_PER_SECOND {
        return Err(ConfigError::RateTooHigh { rate_per_second });
    }
    // Bounded by NANOS_PER_SECOND, so the narrowing cannot truncate.
    Ok(Duration::from_nanos((NANOS_PER_SECOND / rate_per_second) as u64))
}

struct TickerSignal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

/// A background thread firing a callback every `cadence`, stoppable on demand.
pub(crate) struct Ticker {
    name: String,
    signal: Arc<TickerSignal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    /// Spawns the timer thread. The first tick fires one `cadence` from now.
    pub(crate) fn spawn<F>(name: &str, cadence: Duration, on_tick: F) -> std::io::Result<Ticker>
    where
        F: FnMut() + Send + 'static,
    {
        let signal = Arc::new(TickerSignal {
            stopped: Mutex::new(false),
            wakeup: Condvar::new(),
        });

        let thread_signal = signal.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&thread_signal, cadence, on_tick))?;

        debug!(ticker = name, ?cadence, "ticker started");

        Ok(Ticker {
            name: name.to_string(),
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been requested.
    pub(crate) fn is_stopped(&self) -> bool {
        *self.signal.stopped.lock()
    }

    /// Stops the timer and joins its thread. Safe to call repeatedly.
    ///
    /// When called from the ticker thread itself the join is skipped; the
    /// thread exits as soon as the current callback returns.
    pub(crate) fn shutdown(&self) {
        *self.signal.stopped.lock() = true;
        self.signal.wakeup.notify_all();

        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(ticker = %self.name, "ticker thread terminated by a panic");
        }
        debug!(ticker = %self.name, "ticker stopped");
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F: FnMut()>(signal: &TickerSignal, cadence: Duration, mut on_tick: F) {
    let mut deadline = Instant::now() + cadence;
    loop {
        {
            let mut stopped = signal.stopped.lock();
            while !*stopped && Instant::now() < deadline {
                signal.wakeup.wait_until(&mut stopped, deadline);
            }
            if *stopped {
                return;
            }
        }

        on_tick();

        // Stay on the absolute schedule; after a long stall, re-anchor instead
        // of firing a burst of catch-up ticks.
        deadline += cadence;
        let now = Instant::now();
        if deadline + cadence < now {
            deadline = now;
        }
    }
}
