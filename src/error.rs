/*!
Error taxonomy for the emulator core.

All fallible public operations return `Result<T, EmuError>`. Bus-level
misses (no device mapped at an address) are deliberately NOT errors: reads
yield 0xFF and writes are dropped, matching the open-bus convention.

`InvalidOpcode` carries the address of the opcode byte so a host can report
exactly where the guest ran off the rails before deciding to reset.
*/

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum EmuError {
    /// A caller supplied an argument the core cannot work with
    /// (zero frequency, non-power-of-two RAM size, zero queue capacity).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Program image path does not exist.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Program image could not be read, was empty, or the reset vector
    /// did not read back after loading.
    #[error("program image read failed")]
    ReadFailed,

    /// Program image does not fit between the base address and 0xFFFF.
    #[error("program of {len} bytes does not fit at {base:#06X}")]
    MemoryOverflow { base: u16, len: usize },

    /// The guest executed an opcode outside the documented set.
    #[error("invalid opcode {opcode:#04X} at {pc:#06X}")]
    InvalidOpcode { pc: u16, opcode: u8 },

    /// A byte queue rejected an enqueue because it is at capacity.
    /// Surfaces only to host-side producers; the guest never observes it.
    #[error("byte queue full")]
    QueueFull,

    /// The bus routing table already holds the maximum number of devices.
    #[error("bus routing table full")]
    BusFull,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EmuError>;
