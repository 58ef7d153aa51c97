/*!
execute.rs - 6502 instruction semantic helpers (ALU, flags, stack, RMW)

Centralizes the side-effect logic for instructions so the dispatcher
stays a thin composition of addressing mode + semantics. Every helper is
generic over `BusAccess`, keeping the same code path for the real serial
view and bare test memory.

Scope
=====
Register loads/transfers, logical ops, arithmetic (binary and decimal
mode), compares, increments/decrements, shifts/rotates (accumulator and
memory), stack operations, and the control-flow primitives (JSR/RTS,
BRK/RTI, branch commit).

Decimal mode
============
ADC/SBC honor the D flag with nibble-wise BCD and half-carry between
nibbles. The carry flag reflects the decimal carry/borrow out; Z and N
are taken from the binary-mode result byte, matching the NMOS 6502
rather than the 65C02. V keeps its binary-mode definition.

RMW note: memory read-modify-write helpers perform a single read and a
single write; per-instruction cycle totals are accounted in the table,
not by bus choreography.
*/

use crate::bus::BusAccess;
use crate::bus::IRQ_VECTOR;
use crate::cpu::state::{BREAK, CARRY, CpuState, DECIMAL, IRQ_DISABLE, NEGATIVE, OVERFLOW, UNUSED, ZERO};

// ---------------------------------------------------------------------------
// Loads / transfers
// ---------------------------------------------------------------------------

#[inline]
pub(crate) fn lda(st: &mut CpuState, v: u8) {
    st.a = v;
    st.update_zn(v);
}

#[inline]
pub(crate) fn ldx(st: &mut CpuState, v: u8) {
    st.x = v;
    st.update_zn(v);
}

#[inline]
pub(crate) fn ldy(st: &mut CpuState, v: u8) {
    st.y = v;
    st.update_zn(v);
}

#[inline]
pub(crate) fn tax(st: &mut CpuState) {
    st.x = st.a;
    st.update_zn(st.x);
}

#[inline]
pub(crate) fn tay(st: &mut CpuState) {
    st.y = st.a;
    st.update_zn(st.y);
}

#[inline]
pub(crate) fn txa(st: &mut CpuState) {
    st.a = st.x;
    st.update_zn(st.a);
}

#[inline]
pub(crate) fn tya(st: &mut CpuState) {
    st.a = st.y;
    st.update_zn(st.a);
}

#[inline]
pub(crate) fn tsx(st: &mut CpuState) {
    st.x = st.sp;
    st.update_zn(st.x);
}

/// TXS is the one transfer that leaves the flags untouched.
#[inline]
pub(crate) fn txs(st: &mut CpuState) {
    st.sp = st.x;
}

// ---------------------------------------------------------------------------
// Logical
// ---------------------------------------------------------------------------

#[inline]
pub(crate) fn and(st: &mut CpuState, v: u8) {
    st.a &= v;
    st.update_zn(st.a);
}

#[inline]
pub(crate) fn ora(st: &mut CpuState, v: u8) {
    st.a |= v;
    st.update_zn(st.a);
}

#[inline]
pub(crate) fn eor(st: &mut CpuState, v: u8) {
    st.a ^= v;
    st.update_zn(st.a);
}

/// BIT: Z from A & M; N and V copied from M bits 7 and 6.
#[inline]
pub(crate) fn bit(st: &mut CpuState, v: u8) {
    st.assign_flag(ZERO, (st.a & v) == 0);
    st.assign_flag(NEGATIVE, (v & 0x80) != 0);
    st.assign_flag(OVERFLOW, (v & 0x40) != 0);
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

pub(crate) fn adc(st: &mut CpuState, v: u8) {
    if st.is_flag_set(DECIMAL) {
        adc_decimal(st, v);
    } else {
        adc_binary(st, v);
    }
}

fn adc_binary(st: &mut CpuState, v: u8) {
    let a = st.a;
    let carry_in = st.is_flag_set(CARRY) as u16;
    let sum = a as u16 + v as u16 + carry_in;
    let result = sum as u8;
    st.assign_flag(CARRY, sum > 0xFF);
    st.assign_flag(OVERFLOW, (!(a ^ v) & (a ^ result) & 0x80) != 0);
    st.a = result;
    st.update_zn(result);
}

fn adc_decimal(st: &mut CpuState, v: u8) {
    let a = st.a;
    let carry_in = st.is_flag_set(CARRY) as u16;
    // Z, N and V follow the binary-mode result byte.
    let bin = (a as u16 + v as u16 + carry_in) as u8;
    let mut lo = (a & 0x0F) as u16 + (v & 0x0F) as u16 + carry_in;
    let mut hi = (a >> 4) as u16 + (v >> 4) as u16;
    if lo > 9 {
        lo -= 10;
        hi += 1;
    }
    let carry_out = hi > 9;
    if carry_out {
        hi -= 10;
    }
    st.a = ((hi << 4) | lo) as u8;
    st.assign_flag(CARRY, carry_out);
    st.assign_flag(OVERFLOW, (!(a ^ v) & (a ^ bin) & 0x80) != 0);
    st.update_zn(bin);
}

pub(crate) fn sbc(st: &mut CpuState, v: u8) {
    if st.is_flag_set(DECIMAL) {
        sbc_decimal(st, v);
    } else {
        // Binary SBC is ADC of the one's complement of the operand.
        adc_binary(st, v ^ 0xFF);
    }
}

fn sbc_decimal(st: &mut CpuState, v: u8) {
    let a = st.a;
    let borrow = !st.is_flag_set(CARRY) as u8;
    let bin = a.wrapping_sub(v).wrapping_sub(borrow);
    let mut lo = (a & 0x0F) as i16 - (v & 0x0F) as i16 - borrow as i16;
    let mut hi = (a >> 4) as i16 - (v >> 4) as i16;
    if lo < 0 {
        lo += 10;
        hi -= 1;
    }
    let carry_out = hi >= 0;
    if hi < 0 {
        hi += 10;
    }
    st.a = ((hi as u8) << 4) | lo as u8;
    st.assign_flag(CARRY, carry_out);
    st.assign_flag(OVERFLOW, ((a ^ v) & (a ^ bin) & 0x80) != 0);
    st.update_zn(bin);
}

/// CMP/CPX/CPY: carry = reg >= M, Z/N from reg - M.
#[inline]
pub(crate) fn compare(st: &mut CpuState, reg: u8, v: u8) {
    st.assign_flag(CARRY, reg >= v);
    st.update_zn(reg.wrapping_sub(v));
}

// ---------------------------------------------------------------------------
// Increments / decrements
// ---------------------------------------------------------------------------

#[inline]
pub(crate) fn inx(st: &mut CpuState) {
    st.x = st.x.wrapping_add(1);
    st.update_zn(st.x);
}

#[inline]
pub(crate) fn iny(st: &mut CpuState) {
    st.y = st.y.wrapping_add(1);
    st.update_zn(st.y);
}

#[inline]
pub(crate) fn dex(st: &mut CpuState) {
    st.x = st.x.wrapping_sub(1);
    st.update_zn(st.x);
}

#[inline]
pub(crate) fn dey(st: &mut CpuState) {
    st.y = st.y.wrapping_sub(1);
    st.update_zn(st.y);
}

pub(crate) fn inc_mem<M: BusAccess>(st: &mut CpuState, mem: &mut M, addr: u16) {
    let v = mem.read(addr).wrapping_add(1);
    mem.write(addr, v);
    st.update_zn(v);
}

pub(crate) fn dec_mem<M: BusAccess>(st: &mut CpuState, mem: &mut M, addr: u16) {
    let v = mem.read(addr).wrapping_sub(1);
    mem.write(addr, v);
    st.update_zn(v);
}

// ---------------------------------------------------------------------------
// Shifts / rotates
// ---------------------------------------------------------------------------
//
// Each helper computes the shifted value from the old byte plus the old
// carry, stores the shifted-out bit in C, and updates Z/N.

#[inline]
fn asl_value(st: &mut CpuState, v: u8) -> u8 {
    st.assign_flag(CARRY, (v & 0x80) != 0);
    let r = v << 1;
    st.update_zn(r);
    r
}

#[inline]
fn lsr_value(st: &mut CpuState, v: u8) -> u8 {
    st.assign_flag(CARRY, (v & 0x01) != 0);
    let r = v >> 1;
    st.update_zn(r);
    r
}

#[inline]
fn rol_value(st: &mut CpuState, v: u8) -> u8 {
    let carry_in = st.is_flag_set(CARRY) as u8;
    st.assign_flag(CARRY, (v & 0x80) != 0);
    let r = (v << 1) | carry_in;
    st.update_zn(r);
    r
}

#[inline]
fn ror_value(st: &mut CpuState, v: u8) -> u8 {
    let carry_in = (st.is_flag_set(CARRY) as u8) << 7;
    st.assign_flag(CARRY, (v & 0x01) != 0);
    let r = (v >> 1) | carry_in;
    st.update_zn(r);
    r
}

#[inline]
pub(crate) fn asl_acc(st: &mut CpuState) {
    st.a = asl_value(st, st.a);
}

#[inline]
pub(crate) fn lsr_acc(st: &mut CpuState) {
    st.a = lsr_value(st, st.a);
}

#[inline]
pub(crate) fn rol_acc(st: &mut CpuState) {
    st.a = rol_value(st, st.a);
}

#[inline]
pub(crate) fn ror_acc(st: &mut CpuState) {
    st.a = ror_value(st, st.a);
}

pub(crate) fn asl_mem<M: BusAccess>(st: &mut CpuState, mem: &mut M, addr: u16) {
    let v = mem.read(addr);
    let r = asl_value(st, v);
    mem.write(addr, r);
}

pub(crate) fn lsr_mem<M: BusAccess>(st: &mut CpuState, mem: &mut M, addr: u16) {
    let v = mem.read(addr);
    let r = lsr_value(st, v);
    mem.write(addr, r);
}

pub(crate) fn rol_mem<M: BusAccess>(st: &mut CpuState, mem: &mut M, addr: u16) {
    let v = mem.read(addr);
    let r = rol_value(st, v);
    mem.write(addr, r);
}

pub(crate) fn ror_mem<M: BusAccess>(st: &mut CpuState, mem: &mut M, addr: u16) {
    let v = mem.read(addr);
    let r = ror_value(st, v);
    mem.write(addr, r);
}

// ---------------------------------------------------------------------------
// Stack operations
// ---------------------------------------------------------------------------

#[inline]
pub(crate) fn pha<M: BusAccess>(st: &mut CpuState, mem: &mut M) {
    st.push_u8(mem, st.a);
}

#[inline]
pub(crate) fn pla<M: BusAccess>(st: &mut CpuState, mem: &mut M) {
    st.a = st.pop_u8(mem);
    st.update_zn(st.a);
}

/// PHP pushes with both B and UNUSED set.
#[inline]
pub(crate) fn php<M: BusAccess>(st: &mut CpuState, mem: &mut M) {
    let v = st.compose_status_for_push(true);
    st.push_u8(mem, v);
}

/// PLP masks B out of the pulled value and forces UNUSED on.
#[inline]
pub(crate) fn plp<M: BusAccess>(st: &mut CpuState, mem: &mut M) {
    let v = st.pop_u8(mem);
    st.status = (v | UNUSED) & !BREAK;
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

/// JSR: push the address of the last operand byte (PC-1), then jump.
#[inline]
pub(crate) fn jsr<M: BusAccess>(st: &mut CpuState, mem: &mut M, target: u16) {
    let ret = st.pc.wrapping_sub(1);
    st.push_u16(mem, ret);
    st.pc = target;
}

/// RTS: pull the return address and resume one byte past it.
#[inline]
pub(crate) fn rts<M: BusAccess>(st: &mut CpuState, mem: &mut M) {
    st.pc = st.pop_u16(mem).wrapping_add(1);
}

/// RTI: pull status (B cleared, UNUSED set), then pull PC verbatim.
#[inline]
pub(crate) fn rti<M: BusAccess>(st: &mut CpuState, mem: &mut M) {
    plp(st, mem);
    st.pc = st.pop_u16(mem);
}

/// BRK: skip the padding byte, push PC and P (with B and UNUSED set),
/// set I, and vector through $FFFE/F.
pub(crate) fn brk<M: BusAccess>(st: &mut CpuState, mem: &mut M) {
    let pc = st.pc.wrapping_add(1);
    st.push_u16(mem, pc);
    let status = st.compose_status_for_push(true);
    st.push_u8(mem, status);
    st.assign_flag(IRQ_DISABLE, true);
    st.pc = mem.read_word(IRQ_VECTOR);
}

/// Commit a branch to `target` if `take` holds. Returns the extra cycles:
/// 0 not taken, 1 taken, 2 taken across a page boundary.
#[inline]
pub(crate) fn branch(st: &mut CpuState, target: u16, crossed: bool, take: bool) -> u32 {
    if !take {
        return 0;
    }
    st.pc = target;
    1 + crossed as u32
}
