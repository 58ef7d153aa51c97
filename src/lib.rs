#![doc = r#"
term6502 library crate.

A cycle-aware MOS 6502 emulator with a 64 KiB monitored address space,
memory-mapped serial I/O, wall-clock pacing, and a thread-safe host
control surface.

Modules:
- bus: address routing, memory devices, monitored RAM, serial MMIO view
- clock: clock pacer throttling execution to a nominal frequency
- control: interrupt latches and pause/exit signalling
- cpu: 6502 core (registers, addressing modes, opcode table, dispatch)
- error: crate-wide error taxonomy
- machine: host control surface + emulation thread
- queue: bounded byte FIFOs backing the serial ports

Guest programs talk to the host through the memory map: reads of $D011
dequeue serial input, writes to $D012 enqueue serial output, and writes
to $6000/$6001/$6002 emit characters and test-status messages.
"#]

pub mod bus;
pub mod clock;
pub mod control;
pub mod cpu;
pub mod error;
pub mod machine;
pub mod queue;

// Re-export commonly used types at the crate root for convenience.
pub use bus::{Bus, Device, MonitoredRam, Ram};
pub use cpu::{Cpu, Registers};
pub use error::{EmuError, Result};
pub use machine::{Machine, RunExit};
pub use queue::ByteQueue;

// Shared test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;
