/*!
machine.rs - Host-facing control surface and the emulation thread.

`Machine` wires a `Cpu` to the cooperative threading model: one
emulation thread runs the step loop while host threads pause, resume,
inject interrupts, exchange serial bytes, and read register snapshots.

Locking model
=============
A single coarse mutex guards the CPU; the emulation thread takes it for
exactly one step at a time, so `reset`, `set_frequency`, manual `step`
and register snapshots interleave at step boundaries. Interrupt
injection and the serial queues bypass the CPU mutex entirely (they
synchronize on their own internal locks), so they never wait on an
in-flight instruction's pacing sleep.

Run-loop termination
====================
The loop ends when:
- the exit flag is raised (`stop`/drop): `RunExit::Stopped`;
- the guest executes an undocumented opcode: `RunExit::Fault`;
- trap detection is on and an instruction leaves PC unchanged (a
  jump-to-self, the idiom test ROMs use to signal completion):
  `RunExit::Trapped`.

An optional breakpoint predicate is consulted before each step; a hit
pauses the machine instead of ending the run.
*/

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{error, info};

use crate::control::{ExecControl, InterruptLatches};
use crate::cpu::{Cpu, Registers};
use crate::error::{EmuError, Result};
use crate::queue::ByteQueue;

/// Why the emulation thread ended.
#[derive(Debug)]
pub enum RunExit {
    /// The guest entered a jump-to-self trap at `pc`.
    Trapped { pc: u16 },
    /// The guest executed an invalid opcode (the error carries pc/byte).
    Fault(EmuError),
    /// The host requested shutdown.
    Stopped,
}

/// Predicate over the next instruction's PC; `true` pauses the machine.
pub type Breakpoint = Box<dyn Fn(u16) -> bool + Send>;

/// A complete emulated system: CPU, queues, latches, run control.
pub struct Machine {
    cpu: Arc<Mutex<Cpu>>,
    input: Arc<ByteQueue>,
    output: Arc<ByteQueue>,
    latches: Arc<InterruptLatches>,
    control: Arc<ExecControl>,
    breakpoint: Arc<Mutex<Option<Breakpoint>>>,
    stop_on_trap: Arc<AtomicBool>,
    thread: Option<JoinHandle<RunExit>>,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Machine {
    /// Build a machine with the default memory map at `freq_hz`.
    pub fn new(freq_hz: u64) -> Result<Self> {
        let cpu = Cpu::new(freq_hz)?;
        let input = cpu.input_queue();
        let output = cpu.output_queue();
        let latches = cpu.interrupt_latches();
        Ok(Self {
            cpu: Arc::new(Mutex::new(cpu)),
            input,
            output,
            latches,
            control: Arc::new(ExecControl::new()),
            breakpoint: Arc::new(Mutex::new(None)),
            stop_on_trap: Arc::new(AtomicBool::new(true)),
            thread: None,
        })
    }

    // ---------------------------------------------------------------------
    // Program loading
    // ---------------------------------------------------------------------

    /// Load a flat program image from disk at `base` and reset into it.
    pub fn load_file<P: AsRef<Path>>(&self, path: P, base: u16) -> Result<()> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EmuError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => EmuError::ReadFailed,
        })?;
        info!("loaded {} bytes from {} at {base:#06X}", bytes.len(), path.display());
        self.load_bytes(&bytes, base)
    }

    /// Load a program image already in memory.
    pub fn load_bytes(&self, bytes: &[u8], base: u16) -> Result<()> {
        locked(&self.cpu).load_program(bytes, base)
    }

    // ---------------------------------------------------------------------
    // Execution control
    // ---------------------------------------------------------------------

    /// Spawn the emulation thread. A second call while running is a
    /// no-op; after an exit, call `wait`/`stop` first to collect it.
    pub fn run(&mut self) {
        if self.thread.is_some() {
            return;
        }
        let cpu = Arc::clone(&self.cpu);
        let control = Arc::clone(&self.control);
        let breakpoint = Arc::clone(&self.breakpoint);
        let stop_on_trap = Arc::clone(&self.stop_on_trap);
        self.thread = Some(thread::spawn(move || {
            run_loop(&cpu, &control, &breakpoint, &stop_on_trap)
        }));
    }

    /// Park the emulation thread at the next step boundary.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Release a paused emulation thread.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// True while the pause flag is set.
    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// True while the emulation thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Execute one instruction from the host (typically while paused).
    pub fn step(&self) -> Result<u32> {
        locked(&self.cpu).step()
    }

    /// Reset the CPU; mutually exclusive with an in-flight step.
    pub fn reset(&self) {
        locked(&self.cpu).reset();
    }

    /// End the run loop when the guest parks in a jump-to-self trap
    /// (enabled by default; interactive hosts may turn it off).
    pub fn set_stop_on_trap(&self, enabled: bool) {
        self.stop_on_trap.store(enabled, Ordering::Relaxed);
    }

    /// Install or clear the breakpoint predicate.
    pub fn set_breakpoint(&self, bp: Option<Breakpoint>) {
        *locked(&self.breakpoint) = bp;
    }

    /// Request shutdown and collect the emulation thread.
    pub fn stop(&mut self) -> RunExit {
        self.control.request_exit();
        self.wait()
    }

    /// Wait for the emulation thread to end and return why it did.
    /// Returns `Stopped` when no thread was running.
    pub fn wait(&mut self) -> RunExit {
        match self.thread.take() {
            Some(handle) => handle.join().unwrap_or(RunExit::Stopped),
            None => RunExit::Stopped,
        }
    }

    // ---------------------------------------------------------------------
    // CPU state and I/O
    // ---------------------------------------------------------------------

    /// Snapshot the registers (interleaves at a step boundary).
    pub fn snapshot_registers(&self) -> Registers {
        locked(&self.cpu).registers()
    }

    /// Force the program counter.
    pub fn set_pc(&self, pc: u16) {
        locked(&self.cpu).set_pc(pc);
    }

    /// Change the nominal clock frequency; safe at any time.
    pub fn set_frequency(&self, freq_hz: u64) -> Result<()> {
        locked(&self.cpu).set_frequency(freq_hz)
    }

    /// Toggle the per-instruction trace.
    pub fn set_debug(&self, enabled: bool) {
        locked(&self.cpu).set_debug(enabled);
    }

    /// Latch an IRQ without touching the CPU lock.
    pub fn inject_irq(&self) {
        self.latches.inject_irq();
    }

    /// Latch an NMI without touching the CPU lock.
    pub fn inject_nmi(&self) {
        self.latches.inject_nmi();
    }

    /// Read one byte through the guest-visible path.
    pub fn read_byte(&self, addr: u16) -> u8 {
        locked(&self.cpu).read(addr)
    }

    /// Write one byte through the guest-visible path.
    pub fn write_byte(&self, addr: u16, value: u8) {
        locked(&self.cpu).write(addr, value);
    }

    /// Offer one byte to the serial input queue. `QueueFull` propagates
    /// to the producer; the guest never sees it.
    pub fn push_input(&self, b: u8) -> Result<()> {
        self.input.enqueue(b)
    }

    /// Take the next byte off the serial output queue, if any.
    pub fn pop_output(&self) -> Option<u8> {
        self.output.dequeue()
    }

    /// Serial input queue handle for a dedicated producer thread.
    pub fn input_queue(&self) -> Arc<ByteQueue> {
        Arc::clone(&self.input)
    }

    /// Serial output queue handle for a dedicated consumer thread.
    pub fn output_queue(&self) -> Arc<ByteQueue> {
        Arc::clone(&self.output)
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        // Threads must be joined before the machine goes away.
        self.control.request_exit();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(
    cpu: &Mutex<Cpu>,
    control: &ExecControl,
    breakpoint: &Mutex<Option<Breakpoint>>,
    stop_on_trap: &AtomicBool,
) -> RunExit {
    loop {
        if !control.wait_while_paused() {
            info!("emulation thread stopping");
            return RunExit::Stopped;
        }
        let mut cpu = locked(cpu);
        let pc = cpu.registers().pc;
        if let Some(bp) = locked(breakpoint).as_ref()
            && bp(pc)
        {
            info!("breakpoint hit at {pc:#06X}");
            control.pause();
            continue;
        }
        match cpu.step() {
            Ok(_) => {
                if stop_on_trap.load(Ordering::Relaxed) && cpu.registers().pc == pc {
                    info!("guest trapped at {pc:#06X}");
                    return RunExit::Trapped { pc };
                }
            }
            Err(e) => {
                error!("emulation halted: {e}");
                return RunExit::Fault(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TEST_HZ: u64 = 50_000_000;

    #[test]
    fn runs_to_trap_and_reports_pc() {
        // LDA #$42; JMP $0402 (jump-to-self trap).
        let mut machine = Machine::new(TEST_HZ).unwrap();
        machine
            .load_bytes(&[0xA9, 0x42, 0x4C, 0x02, 0x04], 0x0400)
            .unwrap();
        machine.run();
        match machine.wait() {
            RunExit::Trapped { pc } => assert_eq!(pc, 0x0402),
            other => panic!("unexpected exit {other:?}"),
        }
        assert_eq!(machine.snapshot_registers().a, 0x42);
    }

    #[test]
    fn faults_on_invalid_opcode() {
        let mut machine = Machine::new(TEST_HZ).unwrap();
        machine.load_bytes(&[0xEA, 0x02], 0x0400).unwrap();
        machine.run();
        match machine.wait() {
            RunExit::Fault(EmuError::InvalidOpcode { pc, opcode }) => {
                assert_eq!(pc, 0x0401);
                assert_eq!(opcode, 0x02);
            }
            other => panic!("unexpected exit {other:?}"),
        }
    }

    #[test]
    fn pause_and_manual_step() {
        let mut machine = Machine::new(TEST_HZ).unwrap();
        machine
            .load_bytes(&[0xE8, 0x4C, 0x01, 0x04], 0x0400)
            .unwrap();
        machine.pause();
        machine.run();
        std::thread::sleep(Duration::from_millis(20));
        // Paused before the first instruction: X is untouched.
        assert_eq!(machine.snapshot_registers().x, 0);
        machine.step().unwrap();
        assert_eq!(machine.snapshot_registers().x, 1);
        // Reset while paused rewinds to the vector and clears X.
        machine.reset();
        let r = machine.snapshot_registers();
        assert_eq!(r.pc, 0x0400);
        assert_eq!(r.x, 0);
        machine.stop();
    }

    #[test]
    fn serial_echo_end_to_end() {
        // Guest: LDA $D011; STA $D012; JMP $0400
        let mut machine = Machine::new(TEST_HZ).unwrap();
        machine
            .load_bytes(&[0xAD, 0x11, 0xD0, 0x8D, 0x12, 0xD0, 0x4C, 0x00, 0x04], 0x0400)
            .unwrap();
        for &b in b"Hi\r\n" {
            machine.push_input(b).unwrap();
        }
        machine.run();
        let mut echoed = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while echoed.len() < 4 && std::time::Instant::now() < deadline {
            match machine.pop_output() {
                // The guest writes every $D011 read back, including the
                // 0x00 it sees while the input queue is empty.
                Some(0x00) => {}
                Some(b) => echoed.push(b),
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        machine.stop();
        assert_eq!(echoed, b"Hi\r\n");
    }

    #[test]
    fn nmi_injection_reaches_handler() {
        // Main program spins on NOPs; NMI handler stores a marker and
        // parks in a trap.
        let mut machine = Machine::new(TEST_HZ).unwrap();
        machine
            .load_bytes(&[0xEA, 0x4C, 0x00, 0x04], 0x0400)
            .unwrap();
        // Handler at $0500: LDA #$99; STA $0200; JMP $0505
        machine.write_byte(0x0500, 0xA9);
        machine.write_byte(0x0501, 0x99);
        machine.write_byte(0x0502, 0x8D);
        machine.write_byte(0x0503, 0x00);
        machine.write_byte(0x0504, 0x02);
        machine.write_byte(0x0505, 0x4C);
        machine.write_byte(0x0506, 0x05);
        machine.write_byte(0x0507, 0x05);
        machine.write_byte(0xFFFA, 0x00);
        machine.write_byte(0xFFFB, 0x05);
        machine.run();
        machine.inject_nmi();
        match machine.wait() {
            RunExit::Trapped { pc } => assert_eq!(pc, 0x0505),
            other => panic!("unexpected exit {other:?}"),
        }
        assert_eq!(machine.read_byte(0x0200), 0x99);
    }

    #[test]
    fn breakpoint_pauses_instead_of_exiting() {
        let mut machine = Machine::new(TEST_HZ).unwrap();
        machine
            .load_bytes(&[0xE8, 0xE8, 0xE8, 0x4C, 0x03, 0x04], 0x0400)
            .unwrap();
        machine.set_breakpoint(Some(Box::new(|pc| pc == 0x0402)));
        machine.run();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !machine.is_paused() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(machine.is_paused());
        let r = machine.snapshot_registers();
        assert_eq!(r.pc, 0x0402);
        assert_eq!(r.x, 2);
        // Clearing the breakpoint and resuming runs to the trap.
        machine.set_breakpoint(None);
        machine.resume();
        match machine.wait() {
            RunExit::Trapped { pc } => assert_eq!(pc, 0x0403),
            other => panic!("unexpected exit {other:?}"),
        }
    }

    #[test]
    fn set_frequency_while_running() {
        let mut machine = Machine::new(TEST_HZ).unwrap();
        machine
            .load_bytes(&[0xEA, 0x4C, 0x00, 0x04], 0x0400)
            .unwrap();
        machine.set_stop_on_trap(false);
        machine.run();
        machine.set_frequency(1_000_000).unwrap();
        machine.set_frequency(TEST_HZ).unwrap();
        machine.stop();
    }
}
