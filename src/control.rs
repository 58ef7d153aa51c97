/*!
Execution control shared between the emulation thread and host threads.

Two small state objects replace raw mutex/condvar plumbing at call sites:

- `InterruptLatches`: pending IRQ/NMI flags. Host threads set them at any
  time through `inject_irq`/`inject_nmi`; the CPU samples them at the top
  of every step. Both interrupts are level latches, so two injections of
  the same kind without an intervening step coalesce into one. NMI and
  IRQ can be pending simultaneously; the CPU services NMI first.

- `ExecControl`: the pause flag (with its condition variable) and the
  shutdown flag. The emulation thread parks in `wait_while_paused` at
  each step boundary; host threads flip the flags and notify.

Ordering guarantee: an injection or a pause that completes before a step
begins is observed by that step, because both sides synchronize on the
same mutexes.
*/

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe pending flags for IRQ and NMI.
#[derive(Default)]
pub struct InterruptLatches {
    inner: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    irq: bool,
    nmi: bool,
}

impl InterruptLatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a maskable interrupt request. Non-blocking.
    pub fn inject_irq(&self) {
        locked(&self.inner).irq = true;
    }

    /// Latch a non-maskable interrupt request. Non-blocking.
    pub fn inject_nmi(&self) {
        locked(&self.inner).nmi = true;
    }

    /// True when an IRQ is latched. Does not consume the latch; the CPU
    /// only takes it once the I flag allows servicing.
    pub fn irq_pending(&self) -> bool {
        locked(&self.inner).irq
    }

    /// True when an NMI is latched.
    pub fn nmi_pending(&self) -> bool {
        locked(&self.inner).nmi
    }

    /// Consume a latched NMI, returning whether one was pending.
    pub(crate) fn take_nmi(&self) -> bool {
        let mut pending = locked(&self.inner);
        std::mem::take(&mut pending.nmi)
    }

    /// Consume a latched IRQ, returning whether one was pending.
    pub(crate) fn take_irq(&self) -> bool {
        let mut pending = locked(&self.inner);
        std::mem::take(&mut pending.irq)
    }

    /// Drop both latches (reset path).
    pub fn clear(&self) {
        let mut pending = locked(&self.inner);
        pending.irq = false;
        pending.nmi = false;
    }
}

/// Pause/resume and shutdown signalling for the emulation thread.
#[derive(Default)]
pub struct ExecControl {
    state: Mutex<RunState>,
    cond: Condvar,
}

#[derive(Default)]
struct RunState {
    paused: bool,
    exit: bool,
}

impl ExecControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the emulation thread to park at the next step boundary.
    pub fn pause(&self) {
        locked(&self.state).paused = true;
        self.cond.notify_all();
    }

    /// Release a paused emulation thread.
    pub fn resume(&self) {
        locked(&self.state).paused = false;
        self.cond.notify_all();
    }

    /// True while the pause flag is set.
    pub fn is_paused(&self) -> bool {
        locked(&self.state).paused
    }

    /// Request shutdown. Wakes a paused emulation thread so it can exit.
    pub fn request_exit(&self) {
        locked(&self.state).exit = true;
        self.cond.notify_all();
    }

    /// True once shutdown has been requested.
    pub fn exit_requested(&self) -> bool {
        locked(&self.state).exit
    }

    /// Block while paused. Returns `false` when shutdown was requested,
    /// `true` when the caller should execute the next step.
    pub fn wait_while_paused(&self) -> bool {
        let mut state = locked(&self.state);
        while state.paused && !state.exit {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        !state.exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn latches_coalesce_and_clear() {
        let latches = InterruptLatches::new();
        latches.inject_irq();
        latches.inject_irq();
        assert!(latches.irq_pending());
        assert!(latches.take_irq());
        // Two injections without an intervening step collapse into one.
        assert!(!latches.take_irq());

        latches.inject_nmi();
        latches.inject_irq();
        latches.clear();
        assert!(!latches.nmi_pending());
        assert!(!latches.irq_pending());
    }

    #[test]
    fn take_nmi_consumes_latch() {
        let latches = InterruptLatches::new();
        assert!(!latches.take_nmi());
        latches.inject_nmi();
        assert!(latches.take_nmi());
        assert!(!latches.take_nmi());
    }

    #[test]
    fn wait_while_paused_runs_when_unpaused() {
        let ctl = ExecControl::new();
        assert!(ctl.wait_while_paused());
    }

    #[test]
    fn resume_releases_paused_thread() {
        let ctl = Arc::new(ExecControl::new());
        ctl.pause();
        let waiter = {
            let ctl = Arc::clone(&ctl);
            thread::spawn(move || ctl.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        ctl.resume();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn exit_wakes_paused_thread() {
        let ctl = Arc::new(ExecControl::new());
        ctl.pause();
        let waiter = {
            let ctl = Arc::clone(&ctl);
            thread::spawn(move || ctl.wait_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        ctl.request_exit();
        // Shutdown beats pause: the waiter returns false.
        assert!(!waiter.join().unwrap());
    }
}
