/*!
cpu::mod - Public façade for the 6502 CPU core.

Multi-file structure:

```text
state.rs        - Architectural state (registers, flags, stack helpers).
addressing.rs   - Addressing-mode enum & operand resolution.
execute.rs      - Instruction semantics (ALU, BCD, stack, RMW, branch).
table.rs        - Static 256-entry opcode dispatch table.
dispatch.rs     - Orchestrates a single CPU step (interrupts + decode).
```

Only the stable public surface (`Cpu`, `Registers`, the flag constants)
is re-exported here; the submodule layout is an implementation detail.

`Cpu` binds the pure core to its collaborators: the address bus behind
the serial-intercepting view, the host I/O queues, the interrupt
latches, and the clock pacer. One instance is owned by the emulation
thread; hosts interact through the `Machine` wrapper or, for embedding,
through this type directly:

```ignore
let mut cpu = Cpu::new(1_000_000)?;
cpu.load_program(&program, 0x0400)?;
loop {
    cpu.step()?;
}
```
*/

pub mod state;

pub(crate) mod addressing;
pub(crate) mod dispatch;
pub(crate) mod execute;
pub(crate) mod table;

pub use state::{CpuState, Registers};

use std::sync::Arc;

use log::debug;

use crate::bus::{Bus, BusAccess, Device, MonitoredRam, RESET_VECTOR, SerialBus};
use crate::clock::ClockPacer;
use crate::control::InterruptLatches;
use crate::cpu::dispatch::INTERRUPT_CYCLES;
use crate::error::{EmuError, Result};
use crate::queue::ByteQueue;

/// Bus-integrated 6502 CPU with cycle pacing and serial MMIO.
pub struct Cpu {
    state: CpuState,
    bus: Bus,
    clock: ClockPacer,
    latches: Arc<InterruptLatches>,
    input: Arc<ByteQueue>,
    output: Arc<ByteQueue>,
    debug: bool,
}

impl Cpu {
    /// Create a CPU over the default memory map: one monitored 64 KiB
    /// RAM covering the whole address space, serial ports intercepted at
    /// $D011/$D012.
    pub fn new(freq_hz: u64) -> Result<Self> {
        let input = Arc::new(ByteQueue::new());
        let output = Arc::new(ByteQueue::new());
        let mut bus = Bus::new();
        bus.connect(
            Device::Monitored(MonitoredRam::new(Arc::clone(&output))),
            0x0000,
            0xFFFF,
        )?;
        Self::with_bus(bus, input, output, freq_hz)
    }

    /// Create a CPU over a caller-assembled bus. The routing table is
    /// treated as immutable from here on.
    pub fn with_bus(
        bus: Bus,
        input: Arc<ByteQueue>,
        output: Arc<ByteQueue>,
        freq_hz: u64,
    ) -> Result<Self> {
        Ok(Self {
            state: CpuState::new(),
            bus,
            clock: ClockPacer::new(freq_hz)?,
            latches: Arc::new(InterruptLatches::new()),
            input,
            output,
            debug: false,
        })
    }

    // ---------------------------------------------------------------------
    // Shared handles
    // ---------------------------------------------------------------------

    /// Serial input queue (host producers push keystrokes here).
    pub fn input_queue(&self) -> Arc<ByteQueue> {
        Arc::clone(&self.input)
    }

    /// Serial output queue (host consumers drain characters here).
    pub fn output_queue(&self) -> Arc<ByteQueue> {
        Arc::clone(&self.output)
    }

    /// Interrupt latches, for injection from host threads without
    /// touching the CPU itself.
    pub fn interrupt_latches(&self) -> Arc<InterruptLatches> {
        Arc::clone(&self.latches)
    }

    // ---------------------------------------------------------------------
    // Host control surface
    // ---------------------------------------------------------------------

    /// Snapshot the architectural registers.
    pub fn registers(&self) -> Registers {
        self.state.registers()
    }

    /// Force the program counter.
    pub fn set_pc(&mut self, pc: u16) {
        self.state.pc = pc;
    }

    /// Enable or disable the per-instruction trace (via `log::debug!`).
    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Change the nominal clock frequency; restarts the pacing timeline.
    pub fn set_frequency(&mut self, freq_hz: u64) -> Result<()> {
        self.clock.set_frequency(freq_hz)
    }

    /// Cycles accounted since the last reset.
    pub fn cycles(&self) -> u64 {
        self.clock.cycles()
    }

    /// Latch an IRQ; observed at the next step entry.
    pub fn inject_irq(&self) {
        self.latches.inject_irq();
    }

    /// Latch an NMI; observed at the next step entry.
    pub fn inject_nmi(&self) {
        self.latches.inject_nmi();
    }

    /// Read a byte the way the guest would (serial input intercepted).
    pub fn read(&mut self, addr: u16) -> u8 {
        SerialBus::new(&mut self.bus, &self.input, &self.output).read(addr)
    }

    /// Write a byte the way the guest would (serial output intercepted).
    pub fn write(&mut self, addr: u16, value: u8) {
        SerialBus::new(&mut self.bus, &self.input, &self.output).write(addr, value)
    }

    /// Direct bus access, bypassing serial interception (debugger pokes,
    /// test fixtures).
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    // ---------------------------------------------------------------------
    // Reset / load
    // ---------------------------------------------------------------------

    /// Reset: reload PC from $FFFC/$FFFD, reinitialize registers
    /// (`SP=0xFD`, `P=0x24`, `A=X=Y=0`), restart cycle accounting, and
    /// drop any latched interrupts. Costs 7 cycles of accounting.
    pub fn reset(&mut self) {
        let mut mem = SerialBus::new(&mut self.bus, &self.input, &self.output);
        self.state.reset(&mut mem);
        self.latches.clear();
        self.clock.reset();
        self.clock.advance(INTERRUPT_CYCLES as u64);
    }

    /// Copy a flat program image into memory at `base`, point the reset
    /// vector at it, and reset.
    ///
    /// Fails with `ReadFailed` on an empty image or when the vector does
    /// not read back (a device shadowing $FFFC/D would cause that), and
    /// with `MemoryOverflow` when the image exceeds the address space.
    pub fn load_program(&mut self, bytes: &[u8], base: u16) -> Result<()> {
        if bytes.is_empty() {
            return Err(EmuError::ReadFailed);
        }
        if bytes.len() > 0x1_0000 - base as usize {
            return Err(EmuError::MemoryOverflow {
                base,
                len: bytes.len(),
            });
        }
        for (i, &b) in bytes.iter().enumerate() {
            self.bus.write(base.wrapping_add(i as u16), b);
        }
        self.bus.write(RESET_VECTOR, base as u8);
        self.bus.write(RESET_VECTOR.wrapping_add(1), (base >> 8) as u8);
        self.reset();
        if self.state.pc != base {
            return Err(EmuError::ReadFailed);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Execute exactly one instruction (servicing a latched interrupt
    /// first), account its cycles, and pace against the nominal clock.
    ///
    /// Returns the cycles consumed, or `InvalidOpcode` for undocumented
    /// opcodes; in that case no state beyond the opcode fetch changed
    /// and the caller decides whether to halt or reset.
    pub fn step(&mut self) -> Result<u32> {
        let trace_pc = self.state.pc;
        let cycles = {
            let mut mem = SerialBus::new(&mut self.bus, &self.input, &self.output);
            dispatch::step(&mut self.state, &mut mem, &self.latches)?
        };
        if self.debug {
            // Decode against the raw bus so tracing never drains $D011.
            let (opcode, name) = dispatch::peek_op(&mut self.bus, trace_pc);
            let r = self.state.registers();
            debug!(
                "{trace_pc:04X}  {opcode:02X}  {name:<3} A={:02X} X={:02X} Y={:02X} SP={:02X} P={:02X} cyc={cycles}",
                r.a, r.x, r.y, r.sp, r.status
            );
        }
        self.clock.advance(cycles as u64 - 1);
        self.clock.wait_next_cycle();
        Ok(cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Ram, SERIAL_IN_ADDR, SERIAL_OUT_ADDR};

    // High enough that pacing sleeps are negligible in tests.
    const TEST_HZ: u64 = 50_000_000;

    fn cpu_with(program: &[u8], base: u16) -> Cpu {
        let mut cpu = Cpu::new(TEST_HZ).unwrap();
        cpu.load_program(program, base).unwrap();
        cpu
    }

    #[test]
    fn load_program_sets_vector_and_pc() {
        let cpu = cpu_with(&[0xEA, 0x00], 0x0400);
        let r = cpu.registers();
        assert_eq!(r.pc, 0x0400);
        assert_eq!(r.sp, 0xFD);
        assert_eq!(r.status, 0x24);
    }

    #[test]
    fn load_program_rejects_empty_and_overflow() {
        let mut cpu = Cpu::new(TEST_HZ).unwrap();
        assert!(matches!(
            cpu.load_program(&[], 0x0400),
            Err(EmuError::ReadFailed)
        ));
        let too_big = vec![0xEA; 0x201];
        assert!(matches!(
            cpu.load_program(&too_big, 0xFE00),
            Err(EmuError::MemoryOverflow { .. })
        ));
        // Exactly filling the tail of memory is fine.
        let fits = vec![0xEA; 0x200];
        assert!(cpu.load_program(&fits, 0xFE00).is_ok());
    }

    #[test]
    fn load_program_fails_when_vector_unmapped() {
        // A bus whose only RAM stops short of the vectors cannot read
        // the reset vector back.
        let input = Arc::new(ByteQueue::new());
        let output = Arc::new(ByteQueue::new());
        let mut bus = Bus::new();
        bus.connect(Device::Ram(Ram::new(0x8000).unwrap()), 0x0000, 0x7FFF)
            .unwrap();
        let mut cpu = Cpu::with_bus(bus, input, output, TEST_HZ).unwrap();
        assert!(matches!(
            cpu.load_program(&[0xEA], 0x0400),
            Err(EmuError::ReadFailed)
        ));
    }

    #[test]
    fn reset_reruns_vector_and_clears_cycles() {
        let mut cpu = cpu_with(&[0xA9, 0x01, 0x00], 0x0400);
        cpu.step().unwrap();
        assert_eq!(cpu.registers().a, 0x01);
        cpu.reset();
        let r = cpu.registers();
        assert_eq!(r.pc, 0x0400);
        assert_eq!(r.a, 0x00);
        assert_eq!(r.status, 0x24);
        // Reset accounts its 7-cycle entry cost.
        assert_eq!(cpu.cycles(), 7);
    }

    #[test]
    fn step_accounts_cycles_on_the_pacer() {
        let mut cpu = cpu_with(&[0xA9, 0x42, 0x8D, 0x00, 0x20], 0x0400);
        let base = cpu.cycles();
        assert_eq!(cpu.step().unwrap(), 2);
        assert_eq!(cpu.step().unwrap(), 4);
        assert_eq!(cpu.cycles() - base, 6);
    }

    #[test]
    fn serial_echo_program() {
        // Guest: LDA $D011; STA $D012; JMP $0400
        let mut cpu = cpu_with(&[0xAD, 0x11, 0xD0, 0x8D, 0x12, 0xD0, 0x4C, 0x00, 0x04], 0x0400);
        let input = cpu.input_queue();
        let output = cpu.output_queue();
        for &b in b"Hi\r\n" {
            input.enqueue(b).unwrap();
        }
        // Four round trips of LDA/STA/JMP echo the four bytes.
        for _ in 0..12 {
            cpu.step().unwrap();
        }
        let echoed: Vec<u8> = std::iter::from_fn(|| output.dequeue()).collect();
        assert_eq!(echoed, b"Hi\r\n");
    }

    #[test]
    fn serial_input_reads_zero_when_empty() {
        let mut cpu = cpu_with(&[0xAD, 0x11, 0xD0], 0x0400);
        cpu.step().unwrap();
        assert_eq!(cpu.registers().a, 0x00);
        assert!(cpu.registers().status & crate::cpu::state::ZERO != 0);
    }

    #[test]
    fn serial_output_does_not_touch_backing_ram() {
        let mut cpu = cpu_with(&[0x8D, 0x12, 0xD0], 0x0400);
        cpu.bus_mut().write(SERIAL_OUT_ADDR, 0x77);
        let r = cpu.registers();
        assert_eq!(r.pc, 0x0400);
        // Guest writes A=0 to $D012.
        cpu.step().unwrap();
        assert_eq!(cpu.output_queue().dequeue(), Some(0x00));
        // The backing byte still holds the host-written value.
        assert_eq!(cpu.bus_mut().read(SERIAL_OUT_ADDR), 0x77);
    }

    #[test]
    fn monitored_status_write_reaches_output_queue() {
        // LDA #$00; STA $6001
        let mut cpu = cpu_with(&[0xA9, 0x00, 0x8D, 0x01, 0x60], 0x0400);
        cpu.step().unwrap();
        cpu.step().unwrap();
        let out = cpu.output_queue();
        let msg: Vec<u8> = std::iter::from_fn(|| out.dequeue()).collect();
        assert_eq!(msg, b"6502 FUNCTIONAL TEST PASSED\r\n");
    }

    #[test]
    fn host_read_write_use_guest_paths() {
        let mut cpu = cpu_with(&[0xEA], 0x0400);
        cpu.write(0x0200, 0xAB);
        assert_eq!(cpu.read(0x0200), 0xAB);
        cpu.input_queue().enqueue(0x55).unwrap();
        assert_eq!(cpu.read(SERIAL_IN_ADDR), 0x55);
    }

    #[test]
    fn injected_nmi_serviced_on_next_step() {
        let mut cpu = cpu_with(&[0xEA, 0xEA, 0xEA], 0xC000);
        cpu.bus_mut().write(0xFFFA, 0x00);
        cpu.bus_mut().write(0xFFFB, 0x95);
        cpu.step().unwrap();
        cpu.inject_nmi();
        let cycles = cpu.step().unwrap();
        assert_eq!(cycles, 7);
        assert_eq!(cpu.registers().pc, 0x9500);
    }
}
