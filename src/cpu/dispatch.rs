/*!
dispatch.rs - Orchestrator for a single 6502 CPU step.

Coordinates one instruction:
1. Samples the interrupt latches: a pending NMI is serviced first; a
   pending IRQ is serviced only with the I flag clear. Interrupt entry
   pushes PC and status (B clear, UNUSED set), sets I, loads the vector,
   and costs 7 cycles.
2. Fetches and decodes the opcode through the static table; an
   `Invalid` row aborts with `InvalidOpcode` (PC has consumed only the
   opcode byte).
3. Resolves the addressing mode, then executes the instruction kind.
4. Returns the cycle total: base cost, +1 for a penalized page cross,
   plus branch extras.

Pacing is not done here; the `Cpu` façade feeds the returned cycle count
to the clock pacer.
*/

use crate::bus::{BusAccess, IRQ_VECTOR, NMI_VECTOR};
use crate::control::InterruptLatches;
use crate::cpu::addressing::{Operand, resolve};
use crate::cpu::execute;
use crate::cpu::state::{CARRY, CpuState, DECIMAL, IRQ_DISABLE, NEGATIVE, OVERFLOW, ZERO};
use crate::cpu::table::{Kind, OPCODES, Op};
use crate::error::{EmuError, Result};

/// Interrupt entry (RESET/IRQ/NMI/BRK) costs seven cycles.
pub(crate) const INTERRUPT_CYCLES: u32 = 7;

/// Execute one CPU step and return the cycles consumed.
pub(crate) fn step<M: BusAccess>(
    st: &mut CpuState,
    mem: &mut M,
    latches: &InterruptLatches,
) -> Result<u32> {
    // NMI wins over IRQ when both are latched.
    if latches.take_nmi() {
        service_interrupt(st, mem, NMI_VECTOR);
        return Ok(INTERRUPT_CYCLES);
    }
    if latches.irq_pending() && !st.is_flag_set(IRQ_DISABLE) {
        latches.take_irq();
        service_interrupt(st, mem, IRQ_VECTOR);
        return Ok(INTERRUPT_CYCLES);
    }

    let pc = st.pc;
    let opcode = st.fetch_u8(mem);
    let op = &OPCODES[opcode as usize];
    if op.kind == Kind::Invalid {
        return Err(EmuError::InvalidOpcode { pc, opcode });
    }

    let operand = resolve(st, mem, op.mode);
    let extra = execute_op(st, mem, op, operand);

    let mut cycles = op.base as u32 + extra;
    if op.penalty && operand.crossed() {
        cycles += 1;
    }
    Ok(cycles)
}

/// Decode the opcode at `pc` without executing (trace support).
pub(crate) fn peek_op<M: BusAccess>(mem: &mut M, pc: u16) -> (u8, &'static str) {
    let opcode = mem.read(pc);
    (opcode, OPCODES[opcode as usize].name)
}

/// Common interrupt entry: push PC and status with B clear, set I, load
/// the vector. The serviced latch is consumed by the caller.
fn service_interrupt<M: BusAccess>(st: &mut CpuState, mem: &mut M, vector: u16) {
    let pc = st.pc;
    st.push_u16(mem, pc);
    let status = st.compose_status_for_push(false);
    st.push_u8(mem, status);
    st.assign_flag(IRQ_DISABLE, true);
    st.pc = mem.read_word(vector);
}

/// Read the value an instruction consumes. Table rows guarantee that
/// value-consuming kinds always resolve to an address operand.
#[inline]
fn read_operand<M: BusAccess>(st: &CpuState, mem: &mut M, operand: Operand) -> u8 {
    match operand {
        Operand::Address { addr, .. } => mem.read(addr),
        Operand::Accumulator => st.a,
        Operand::None => 0,
    }
}

#[inline]
fn branch_on(st: &mut CpuState, operand: Operand, take: bool) -> u32 {
    match operand {
        Operand::Address { addr, crossed } => execute::branch(st, addr, crossed, take),
        _ => 0,
    }
}

/// Apply instruction semantics; returns branch extra cycles (0 otherwise).
fn execute_op<M: BusAccess>(st: &mut CpuState, mem: &mut M, op: &Op, operand: Operand) -> u32 {
    match op.kind {
        // Loads
        Kind::Lda => {
            let v = read_operand(st, mem, operand);
            execute::lda(st, v);
        }
        Kind::Ldx => {
            let v = read_operand(st, mem, operand);
            execute::ldx(st, v);
        }
        Kind::Ldy => {
            let v = read_operand(st, mem, operand);
            execute::ldy(st, v);
        }

        // Stores
        Kind::Sta => {
            if let Operand::Address { addr, .. } = operand {
                mem.write(addr, st.a);
            }
        }
        Kind::Stx => {
            if let Operand::Address { addr, .. } = operand {
                mem.write(addr, st.x);
            }
        }
        Kind::Sty => {
            if let Operand::Address { addr, .. } = operand {
                mem.write(addr, st.y);
            }
        }

        // Transfers
        Kind::Tax => execute::tax(st),
        Kind::Tay => execute::tay(st),
        Kind::Txa => execute::txa(st),
        Kind::Tya => execute::tya(st),
        Kind::Tsx => execute::tsx(st),
        Kind::Txs => execute::txs(st),

        // Stack
        Kind::Pha => execute::pha(st, mem),
        Kind::Pla => execute::pla(st, mem),
        Kind::Php => execute::php(st, mem),
        Kind::Plp => execute::plp(st, mem),

        // Increments / decrements
        Kind::Inx => execute::inx(st),
        Kind::Iny => execute::iny(st),
        Kind::Dex => execute::dex(st),
        Kind::Dey => execute::dey(st),
        Kind::Inc => {
            if let Operand::Address { addr, .. } = operand {
                execute::inc_mem(st, mem, addr);
            }
        }
        Kind::Dec => {
            if let Operand::Address { addr, .. } = operand {
                execute::dec_mem(st, mem, addr);
            }
        }

        // Logical
        Kind::And => {
            let v = read_operand(st, mem, operand);
            execute::and(st, v);
        }
        Kind::Ora => {
            let v = read_operand(st, mem, operand);
            execute::ora(st, v);
        }
        Kind::Eor => {
            let v = read_operand(st, mem, operand);
            execute::eor(st, v);
        }
        Kind::Bit => {
            let v = read_operand(st, mem, operand);
            execute::bit(st, v);
        }

        // Arithmetic / compares
        Kind::Adc => {
            let v = read_operand(st, mem, operand);
            execute::adc(st, v);
        }
        Kind::Sbc => {
            let v = read_operand(st, mem, operand);
            execute::sbc(st, v);
        }
        Kind::Cmp => {
            let v = read_operand(st, mem, operand);
            execute::compare(st, st.a, v);
        }
        Kind::Cpx => {
            let v = read_operand(st, mem, operand);
            execute::compare(st, st.x, v);
        }
        Kind::Cpy => {
            let v = read_operand(st, mem, operand);
            execute::compare(st, st.y, v);
        }

        // Shifts / rotates
        Kind::Asl => match operand {
            Operand::Accumulator => execute::asl_acc(st),
            Operand::Address { addr, .. } => execute::asl_mem(st, mem, addr),
            Operand::None => {}
        },
        Kind::Lsr => match operand {
            Operand::Accumulator => execute::lsr_acc(st),
            Operand::Address { addr, .. } => execute::lsr_mem(st, mem, addr),
            Operand::None => {}
        },
        Kind::Rol => match operand {
            Operand::Accumulator => execute::rol_acc(st),
            Operand::Address { addr, .. } => execute::rol_mem(st, mem, addr),
            Operand::None => {}
        },
        Kind::Ror => match operand {
            Operand::Accumulator => execute::ror_acc(st),
            Operand::Address { addr, .. } => execute::ror_mem(st, mem, addr),
            Operand::None => {}
        },

        // Flag manipulation
        Kind::Clc => st.assign_flag(CARRY, false),
        Kind::Sec => st.assign_flag(CARRY, true),
        Kind::Cli => st.assign_flag(IRQ_DISABLE, false),
        Kind::Sei => st.assign_flag(IRQ_DISABLE, true),
        Kind::Cld => st.assign_flag(DECIMAL, false),
        Kind::Sed => st.assign_flag(DECIMAL, true),
        Kind::Clv => st.assign_flag(OVERFLOW, false),

        // Branches
        Kind::Bpl => return branch_on(st, operand, !st.is_flag_set(NEGATIVE)),
        Kind::Bmi => return branch_on(st, operand, st.is_flag_set(NEGATIVE)),
        Kind::Bvc => return branch_on(st, operand, !st.is_flag_set(OVERFLOW)),
        Kind::Bvs => return branch_on(st, operand, st.is_flag_set(OVERFLOW)),
        Kind::Bcc => return branch_on(st, operand, !st.is_flag_set(CARRY)),
        Kind::Bcs => return branch_on(st, operand, st.is_flag_set(CARRY)),
        Kind::Bne => return branch_on(st, operand, !st.is_flag_set(ZERO)),
        Kind::Beq => return branch_on(st, operand, st.is_flag_set(ZERO)),

        // Control flow
        Kind::Jmp => {
            if let Operand::Address { addr, .. } = operand {
                st.pc = addr;
            }
        }
        Kind::Jsr => {
            if let Operand::Address { addr, .. } = operand {
                execute::jsr(st, mem, addr);
            }
        }
        Kind::Rts => execute::rts(st, mem),
        Kind::Rti => execute::rti(st, mem),
        Kind::Brk => execute::brk(st, mem),

        Kind::Nop => {}

        // Filtered out by the caller before execution.
        Kind::Invalid => {}
    }
    0
}
