/*!
Clock pacer: throttles instruction execution to a nominal frequency.

The pacer keeps a monotonic reference timestamp `t0` and a cycle counter.
The ideal wall-clock time of cycle `n` is `t0 + n / freq_hz`; when the
emulation thread runs ahead of that schedule, `wait_next_cycle` sleeps
the difference. Multi-cycle instructions account their extra cycles in
bulk through `advance`, which folds into the next sleep target instead
of sleeping per cycle.

When the host falls behind by more than `CATCH_UP_THRESHOLD` (a paused
debugger, a long GC on the host, ...), `t0` is rebased so the pacer does
not race through unbounded catch-up cycles.

The internal mutex guards the counters only; it is never held across the
sleep itself.
*/

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{EmuError, Result};

/// Falling behind schedule by more than this rebases the timeline.
pub const CATCH_UP_THRESHOLD: Duration = Duration::from_millis(100);

/// Wall-clock pacer for the emulation thread.
pub struct ClockPacer {
    inner: Mutex<Pacer>,
}

struct Pacer {
    freq_hz: u64,
    cycle_count: u64,
    t0: Instant,
}

impl Pacer {
    /// Ideal wall-clock instant of the current cycle count.
    fn target(&self) -> Instant {
        self.t0 + Duration::from_secs_f64(self.cycle_count as f64 / self.freq_hz as f64)
    }

    /// Move `t0` so the current cycle count maps to `now` (drops arrears).
    fn rebase(&mut self, now: Instant) {
        let ideal = Duration::from_secs_f64(self.cycle_count as f64 / self.freq_hz as f64);
        self.t0 = now - ideal;
    }
}

impl ClockPacer {
    /// Create a pacer for `freq_hz` cycles per second. `freq_hz` must be
    /// greater than zero.
    pub fn new(freq_hz: u64) -> Result<Self> {
        if freq_hz == 0 {
            return Err(EmuError::InvalidArgument("clock frequency must be > 0"));
        }
        Ok(Self {
            inner: Mutex::new(Pacer {
                freq_hz,
                cycle_count: 0,
                t0: Instant::now(),
            }),
        })
    }

    fn locked(&self) -> MutexGuard<'_, Pacer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically change the nominal frequency and restart the pacing
    /// timeline from now. The cycle counter restarts at zero.
    pub fn set_frequency(&self, freq_hz: u64) -> Result<()> {
        if freq_hz == 0 {
            return Err(EmuError::InvalidArgument("clock frequency must be > 0"));
        }
        let mut pacer = self.locked();
        pacer.freq_hz = freq_hz;
        pacer.cycle_count = 0;
        pacer.t0 = Instant::now();
        Ok(())
    }

    /// Current nominal frequency in Hz.
    pub fn frequency(&self) -> u64 {
        self.locked().freq_hz
    }

    /// Cycles accounted since the last reset / frequency change.
    pub fn cycles(&self) -> u64 {
        self.locked().cycle_count
    }

    /// Restart the timeline: cycle counter to zero, `t0` to now.
    pub fn reset(&self) {
        let mut pacer = self.locked();
        pacer.cycle_count = 0;
        pacer.t0 = Instant::now();
    }

    /// Account `n` cycles without sleeping. The debt is absorbed by the
    /// next `wait_next_cycle` target.
    pub fn advance(&self, n: u64) {
        let mut pacer = self.locked();
        pacer.cycle_count = pacer.cycle_count.wrapping_add(n);
    }

    /// Account one cycle and, if ahead of the nominal schedule, sleep
    /// until the schedule catches up. Returns immediately when behind.
    pub fn wait_next_cycle(&self) {
        let sleep_for = {
            let mut pacer = self.locked();
            pacer.cycle_count = pacer.cycle_count.wrapping_add(1);
            let now = Instant::now();
            let target = pacer.target();
            if target > now {
                Some(target - now)
            } else {
                if now - target > CATCH_UP_THRESHOLD {
                    pacer.rebase(now);
                }
                None
            }
        };
        // Sleep outside the lock so set_frequency never waits on a pace.
        if let Some(d) = sleep_for {
            thread::sleep(d);
        }
    }
}
