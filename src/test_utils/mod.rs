//! Shared test utilities for building program images and bare memories.
//!
//! These helpers de-duplicate fixture construction across the CPU, bus,
//! and machine test modules. `TestRam` is a flat 64 KiB store with no
//! MMIO wiring, for exercising addressing/execution semantics in
//! isolation; the program builders place code and reset vectors the way
//! `load_program` does.

#![allow(dead_code)]

use crate::bus::{BusAccess, RESET_VECTOR};
use crate::cpu::state::CpuState;

/// Flat 64 KiB memory with no side effects, for unit tests.
pub struct TestRam(Box<[u8; 0x1_0000]>);

impl TestRam {
    pub fn new() -> Self {
        Self(
            vec![0u8; 0x1_0000]
                .into_boxed_slice()
                .try_into()
                .unwrap_or_else(|_| unreachable!("allocation is exactly 64 KiB")),
        )
    }
}

impl Default for TestRam {
    fn default() -> Self {
        Self::new()
    }
}

impl BusAccess for TestRam {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.0[addr as usize]
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        self.0[addr as usize] = value;
    }
}

/// Fresh zeroed test memory.
pub fn bare_ram() -> TestRam {
    TestRam::new()
}

/// Copy `bytes` into `mem` starting at `base`.
pub fn load_at(mem: &mut TestRam, base: u16, bytes: &[u8]) {
    for (i, &b) in bytes.iter().enumerate() {
        mem.write(base.wrapping_add(i as u16), b);
    }
}

/// Point the reset vector at `target`.
pub fn set_reset_vector(mem: &mut TestRam, target: u16) {
    mem.write(RESET_VECTOR, target as u8);
    mem.write(RESET_VECTOR.wrapping_add(1), (target >> 8) as u8);
}

/// Build a memory holding `program` at `base` with the reset vector set,
/// plus a CPU state already reset through it.
pub fn ram_with_program(program: &[u8], base: u16) -> (CpuState, TestRam) {
    let mut mem = bare_ram();
    load_at(&mut mem, base, program);
    set_reset_vector(&mut mem, base);
    let mut st = CpuState::new();
    st.reset(&mut mem);
    (st, mem)
}
