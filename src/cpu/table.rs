/*!
table.rs - Static 256-entry opcode dispatch table.

Each entry pairs a mnemonic with its addressing mode, instruction kind,
base cycle cost, and whether the opcode pays the +1 page-cross penalty.
The table is built once at compile time; decode is a single index.

Coverage
========
All 151 documented opcodes, plus 0xEB as an alias for SBC #imm (the one
undocumented opcode common enough that test ROMs rely on it). Every
other slot holds `Kind::Invalid` and surfaces as an `InvalidOpcode`
error from the dispatcher.

Cycle notes
===========
Base costs exclude the dynamic penalties: +1 on an indexed read that
crosses a page (entries with `penalty = true`), +1 on a taken branch and
+2 on a taken branch that crosses a page (computed by the branch
helper). Stores and read-modify-write opcodes pay their indexing cost
unconditionally, so their `penalty` flag is false and the base already
includes it.
*/

use crate::cpu::addressing::AddrMode;

/// Instruction families keyed by mnemonic.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Kind {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    Invalid,
}

/// One decoded opcode row.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Op {
    pub name: &'static str,
    pub mode: AddrMode,
    pub kind: Kind,
    pub base: u8,
    pub penalty: bool,
}

impl Op {
    const fn new(name: &'static str, mode: AddrMode, kind: Kind, base: u8, penalty: bool) -> Self {
        Self {
            name,
            mode,
            kind,
            base,
            penalty,
        }
    }

    const fn invalid() -> Self {
        Self::new("???", AddrMode::Implied, Kind::Invalid, 0, false)
    }
}

pub(crate) static OPCODES: [Op; 256] = {
    use AddrMode::*;
    use Kind::*;
    let mut t = [Op::invalid(); 256];

    // Loads
    t[0xA9] = Op::new("LDA", Immediate, Lda, 2, false);
    t[0xA5] = Op::new("LDA", ZeroPage, Lda, 3, false);
    t[0xB5] = Op::new("LDA", ZeroPageX, Lda, 4, false);
    t[0xAD] = Op::new("LDA", Absolute, Lda, 4, false);
    t[0xBD] = Op::new("LDA", AbsoluteX, Lda, 4, true);
    t[0xB9] = Op::new("LDA", AbsoluteY, Lda, 4, true);
    t[0xA1] = Op::new("LDA", IndirectX, Lda, 6, false);
    t[0xB1] = Op::new("LDA", IndirectY, Lda, 5, true);
    t[0xA2] = Op::new("LDX", Immediate, Ldx, 2, false);
    t[0xA6] = Op::new("LDX", ZeroPage, Ldx, 3, false);
    t[0xB6] = Op::new("LDX", ZeroPageY, Ldx, 4, false);
    t[0xAE] = Op::new("LDX", Absolute, Ldx, 4, false);
    t[0xBE] = Op::new("LDX", AbsoluteY, Ldx, 4, true);
    t[0xA0] = Op::new("LDY", Immediate, Ldy, 2, false);
    t[0xA4] = Op::new("LDY", ZeroPage, Ldy, 3, false);
    t[0xB4] = Op::new("LDY", ZeroPageX, Ldy, 4, false);
    t[0xAC] = Op::new("LDY", Absolute, Ldy, 4, false);
    t[0xBC] = Op::new("LDY", AbsoluteX, Ldy, 4, true);

    // Stores
    t[0x85] = Op::new("STA", ZeroPage, Sta, 3, false);
    t[0x95] = Op::new("STA", ZeroPageX, Sta, 4, false);
    t[0x8D] = Op::new("STA", Absolute, Sta, 4, false);
    t[0x9D] = Op::new("STA", AbsoluteX, Sta, 5, false);
    t[0x99] = Op::new("STA", AbsoluteY, Sta, 5, false);
    t[0x81] = Op::new("STA", IndirectX, Sta, 6, false);
    t[0x91] = Op::new("STA", IndirectY, Sta, 6, false);
    t[0x86] = Op::new("STX", ZeroPage, Stx, 3, false);
    t[0x96] = Op::new("STX", ZeroPageY, Stx, 4, false);
    t[0x8E] = Op::new("STX", Absolute, Stx, 4, false);
    t[0x84] = Op::new("STY", ZeroPage, Sty, 3, false);
    t[0x94] = Op::new("STY", ZeroPageX, Sty, 4, false);
    t[0x8C] = Op::new("STY", Absolute, Sty, 4, false);

    // Transfers
    t[0xAA] = Op::new("TAX", Implied, Tax, 2, false);
    t[0xA8] = Op::new("TAY", Implied, Tay, 2, false);
    t[0x8A] = Op::new("TXA", Implied, Txa, 2, false);
    t[0x98] = Op::new("TYA", Implied, Tya, 2, false);
    t[0xBA] = Op::new("TSX", Implied, Tsx, 2, false);
    t[0x9A] = Op::new("TXS", Implied, Txs, 2, false);

    // Stack
    t[0x48] = Op::new("PHA", Implied, Pha, 3, false);
    t[0x68] = Op::new("PLA", Implied, Pla, 4, false);
    t[0x08] = Op::new("PHP", Implied, Php, 3, false);
    t[0x28] = Op::new("PLP", Implied, Plp, 4, false);

    // Register increments / decrements
    t[0xE8] = Op::new("INX", Implied, Inx, 2, false);
    t[0xC8] = Op::new("INY", Implied, Iny, 2, false);
    t[0xCA] = Op::new("DEX", Implied, Dex, 2, false);
    t[0x88] = Op::new("DEY", Implied, Dey, 2, false);

    // Memory increments / decrements
    t[0xE6] = Op::new("INC", ZeroPage, Inc, 5, false);
    t[0xF6] = Op::new("INC", ZeroPageX, Inc, 6, false);
    t[0xEE] = Op::new("INC", Absolute, Inc, 6, false);
    t[0xFE] = Op::new("INC", AbsoluteX, Inc, 7, false);
    t[0xC6] = Op::new("DEC", ZeroPage, Dec, 5, false);
    t[0xD6] = Op::new("DEC", ZeroPageX, Dec, 6, false);
    t[0xCE] = Op::new("DEC", Absolute, Dec, 6, false);
    t[0xDE] = Op::new("DEC", AbsoluteX, Dec, 7, false);

    // Logical
    t[0x29] = Op::new("AND", Immediate, And, 2, false);
    t[0x25] = Op::new("AND", ZeroPage, And, 3, false);
    t[0x35] = Op::new("AND", ZeroPageX, And, 4, false);
    t[0x2D] = Op::new("AND", Absolute, And, 4, false);
    t[0x3D] = Op::new("AND", AbsoluteX, And, 4, true);
    t[0x39] = Op::new("AND", AbsoluteY, And, 4, true);
    t[0x21] = Op::new("AND", IndirectX, And, 6, false);
    t[0x31] = Op::new("AND", IndirectY, And, 5, true);
    t[0x09] = Op::new("ORA", Immediate, Ora, 2, false);
    t[0x05] = Op::new("ORA", ZeroPage, Ora, 3, false);
    t[0x15] = Op::new("ORA", ZeroPageX, Ora, 4, false);
    t[0x0D] = Op::new("ORA", Absolute, Ora, 4, false);
    t[0x1D] = Op::new("ORA", AbsoluteX, Ora, 4, true);
    t[0x19] = Op::new("ORA", AbsoluteY, Ora, 4, true);
    t[0x01] = Op::new("ORA", IndirectX, Ora, 6, false);
    t[0x11] = Op::new("ORA", IndirectY, Ora, 5, true);
    t[0x49] = Op::new("EOR", Immediate, Eor, 2, false);
    t[0x45] = Op::new("EOR", ZeroPage, Eor, 3, false);
    t[0x55] = Op::new("EOR", ZeroPageX, Eor, 4, false);
    t[0x4D] = Op::new("EOR", Absolute, Eor, 4, false);
    t[0x5D] = Op::new("EOR", AbsoluteX, Eor, 4, true);
    t[0x59] = Op::new("EOR", AbsoluteY, Eor, 4, true);
    t[0x41] = Op::new("EOR", IndirectX, Eor, 6, false);
    t[0x51] = Op::new("EOR", IndirectY, Eor, 5, true);
    t[0x24] = Op::new("BIT", ZeroPage, Bit, 3, false);
    t[0x2C] = Op::new("BIT", Absolute, Bit, 4, false);

    // Arithmetic
    t[0x69] = Op::new("ADC", Immediate, Adc, 2, false);
    t[0x65] = Op::new("ADC", ZeroPage, Adc, 3, false);
    t[0x75] = Op::new("ADC", ZeroPageX, Adc, 4, false);
    t[0x6D] = Op::new("ADC", Absolute, Adc, 4, false);
    t[0x7D] = Op::new("ADC", AbsoluteX, Adc, 4, true);
    t[0x79] = Op::new("ADC", AbsoluteY, Adc, 4, true);
    t[0x61] = Op::new("ADC", IndirectX, Adc, 6, false);
    t[0x71] = Op::new("ADC", IndirectY, Adc, 5, true);
    t[0xE9] = Op::new("SBC", Immediate, Sbc, 2, false);
    t[0xE5] = Op::new("SBC", ZeroPage, Sbc, 3, false);
    t[0xF5] = Op::new("SBC", ZeroPageX, Sbc, 4, false);
    t[0xED] = Op::new("SBC", Absolute, Sbc, 4, false);
    t[0xFD] = Op::new("SBC", AbsoluteX, Sbc, 4, true);
    t[0xF9] = Op::new("SBC", AbsoluteY, Sbc, 4, true);
    t[0xE1] = Op::new("SBC", IndirectX, Sbc, 6, false);
    t[0xF1] = Op::new("SBC", IndirectY, Sbc, 5, true);
    // Undocumented alias kept by convention.
    t[0xEB] = Op::new("SBC", Immediate, Sbc, 2, false);

    // Compares
    t[0xC9] = Op::new("CMP", Immediate, Cmp, 2, false);
    t[0xC5] = Op::new("CMP", ZeroPage, Cmp, 3, false);
    t[0xD5] = Op::new("CMP", ZeroPageX, Cmp, 4, false);
    t[0xCD] = Op::new("CMP", Absolute, Cmp, 4, false);
    t[0xDD] = Op::new("CMP", AbsoluteX, Cmp, 4, true);
    t[0xD9] = Op::new("CMP", AbsoluteY, Cmp, 4, true);
    t[0xC1] = Op::new("CMP", IndirectX, Cmp, 6, false);
    t[0xD1] = Op::new("CMP", IndirectY, Cmp, 5, true);
    t[0xE0] = Op::new("CPX", Immediate, Cpx, 2, false);
    t[0xE4] = Op::new("CPX", ZeroPage, Cpx, 3, false);
    t[0xEC] = Op::new("CPX", Absolute, Cpx, 4, false);
    t[0xC0] = Op::new("CPY", Immediate, Cpy, 2, false);
    t[0xC4] = Op::new("CPY", ZeroPage, Cpy, 3, false);
    t[0xCC] = Op::new("CPY", Absolute, Cpy, 4, false);

    // Shifts / rotates
    t[0x0A] = Op::new("ASL", Accumulator, Asl, 2, false);
    t[0x06] = Op::new("ASL", ZeroPage, Asl, 5, false);
    t[0x16] = Op::new("ASL", ZeroPageX, Asl, 6, false);
    t[0x0E] = Op::new("ASL", Absolute, Asl, 6, false);
    t[0x1E] = Op::new("ASL", AbsoluteX, Asl, 7, false);
    t[0x4A] = Op::new("LSR", Accumulator, Lsr, 2, false);
    t[0x46] = Op::new("LSR", ZeroPage, Lsr, 5, false);
    t[0x56] = Op::new("LSR", ZeroPageX, Lsr, 6, false);
    t[0x4E] = Op::new("LSR", Absolute, Lsr, 6, false);
    t[0x5E] = Op::new("LSR", AbsoluteX, Lsr, 7, false);
    t[0x2A] = Op::new("ROL", Accumulator, Rol, 2, false);
    t[0x26] = Op::new("ROL", ZeroPage, Rol, 5, false);
    t[0x36] = Op::new("ROL", ZeroPageX, Rol, 6, false);
    t[0x2E] = Op::new("ROL", Absolute, Rol, 6, false);
    t[0x3E] = Op::new("ROL", AbsoluteX, Rol, 7, false);
    t[0x6A] = Op::new("ROR", Accumulator, Ror, 2, false);
    t[0x66] = Op::new("ROR", ZeroPage, Ror, 5, false);
    t[0x76] = Op::new("ROR", ZeroPageX, Ror, 6, false);
    t[0x6E] = Op::new("ROR", Absolute, Ror, 6, false);
    t[0x7E] = Op::new("ROR", AbsoluteX, Ror, 7, false);

    // Flag manipulation
    t[0x18] = Op::new("CLC", Implied, Clc, 2, false);
    t[0x38] = Op::new("SEC", Implied, Sec, 2, false);
    t[0x58] = Op::new("CLI", Implied, Cli, 2, false);
    t[0x78] = Op::new("SEI", Implied, Sei, 2, false);
    t[0xD8] = Op::new("CLD", Implied, Cld, 2, false);
    t[0xF8] = Op::new("SED", Implied, Sed, 2, false);
    t[0xB8] = Op::new("CLV", Implied, Clv, 2, false);

    // Branches
    t[0x10] = Op::new("BPL", Relative, Bpl, 2, false);
    t[0x30] = Op::new("BMI", Relative, Bmi, 2, false);
    t[0x50] = Op::new("BVC", Relative, Bvc, 2, false);
    t[0x70] = Op::new("BVS", Relative, Bvs, 2, false);
    t[0x90] = Op::new("BCC", Relative, Bcc, 2, false);
    t[0xB0] = Op::new("BCS", Relative, Bcs, 2, false);
    t[0xD0] = Op::new("BNE", Relative, Bne, 2, false);
    t[0xF0] = Op::new("BEQ", Relative, Beq, 2, false);

    // Jumps / subroutines / interrupts
    t[0x4C] = Op::new("JMP", Absolute, Jmp, 3, false);
    t[0x6C] = Op::new("JMP", Indirect, Jmp, 5, false);
    t[0x20] = Op::new("JSR", Absolute, Jsr, 6, false);
    t[0x60] = Op::new("RTS", Implied, Rts, 6, false);
    t[0x00] = Op::new("BRK", Implied, Brk, 7, false);
    t[0x40] = Op::new("RTI", Implied, Rti, 6, false);

    // NOP
    t[0xEA] = Op::new("NOP", Implied, Nop, 2, false);

    t
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_opcode_count() {
        let valid = OPCODES
            .iter()
            .filter(|op| op.kind != Kind::Invalid)
            .count();
        // 151 documented opcodes + the 0xEB SBC alias.
        assert_eq!(valid, 152);
    }

    #[test]
    fn every_valid_entry_has_cycles() {
        for (i, op) in OPCODES.iter().enumerate() {
            if op.kind != Kind::Invalid {
                assert!(op.base >= 2, "opcode {i:#04X} has base {}", op.base);
                assert!(op.base <= 7, "opcode {i:#04X} has base {}", op.base);
            }
        }
    }

    #[test]
    fn penalty_only_on_indexed_read_modes() {
        use AddrMode::*;
        for (i, op) in OPCODES.iter().enumerate() {
            if op.penalty {
                assert!(
                    matches!(op.mode, AbsoluteX | AbsoluteY | IndirectY),
                    "opcode {i:#04X} flags a penalty on mode {:?}",
                    op.mode
                );
                assert!(
                    matches!(
                        op.kind,
                        Kind::Adc
                            | Kind::And
                            | Kind::Cmp
                            | Kind::Eor
                            | Kind::Lda
                            | Kind::Ldx
                            | Kind::Ldy
                            | Kind::Ora
                            | Kind::Sbc
                    ),
                    "opcode {i:#04X} kind {:?} should not pay a page-cross penalty",
                    op.kind
                );
            }
        }
    }

    #[test]
    fn sbc_alias_matches_documented_immediate() {
        let alias = &OPCODES[0xEB];
        let canonical = &OPCODES[0xE9];
        assert_eq!(alias.kind, canonical.kind);
        assert_eq!(alias.mode, canonical.mode);
        assert_eq!(alias.base, canonical.base);
    }

    #[test]
    fn known_invalid_slots_stay_invalid() {
        for op in [0x02u8, 0x3F, 0x7F, 0xFF, 0x9E] {
            assert_eq!(OPCODES[op as usize].kind, Kind::Invalid, "opcode {op:#04X}");
        }
    }
}
