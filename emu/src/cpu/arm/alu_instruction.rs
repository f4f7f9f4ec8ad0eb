//! Data processing opcodes and the barrel shifter.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// The sixteen ALU operations encoded in bits 24-21 of a data processing
/// instruction.
///
/// The logical/arithmetic split matters for the carry flag: logical
/// operations take it from the barrel shifter, arithmetic operations from
/// the ALU itself.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstr {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl From<u32> for ArmModeAluInstr {
    fn from(alu_op_code: u32) -> Self {
        match alu_op_code {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Sub,
            0x3 => Self::Rsb,
            0x4 => Self::Add,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Rsc,
            0x8 => Self::Tst,
            0x9 => Self::Teq,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mov,
            0xE => Self::Bic,
            0xF => Self::Mvn,
            _ => unreachable!(),
        }
    }
}

/// Classification of ALU instructions for carry-flag handling.
#[derive(Eq, PartialEq, Debug)]
pub enum AIKind {
    Logical,
    Arithmetic,
}

pub trait Kind {
    fn kind(&self) -> AIKind;
}

impl Kind for ArmModeAluInstr {
    fn kind(&self) -> AIKind {
        match self {
            Self::And
            | Self::Eor
            | Self::Tst
            | Self::Teq
            | Self::Orr
            | Self::Mov
            | Self::Bic
            | Self::Mvn => AIKind::Logical,
            Self::Sub
            | Self::Rsb
            | Self::Add
            | Self::Adc
            | Self::Sbc
            | Self::Rsc
            | Self::Cmp
            | Self::Cmn => AIKind::Arithmetic,
        }
    }
}

/// Result of an ALU or shifter operation together with the flags it would
/// commit when the S bit is set.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Default)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// Performs a barrel shifter operation, returning the shifted value and the
/// carry-out. `overflow`, `sign` and `zero` are left untouched; committing
/// the carry to CPSR is the caller's decision.
///
/// Amount-zero encodings follow the data sheet:
/// - `LSL #0`: value unchanged, carry-out is the current carry
/// - `LSR #0`: encodes `LSR #32`, result 0, carry-out = bit 31
/// - `ASR #0`: encodes `ASR #32`, sign replication, carry-out = bit 31
/// - `ROR #0`: encodes RRX, rotate right one bit through the carry
#[must_use]
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    match kind {
        ShiftKind::Lsl => match shift_amount {
            0 => ArithmeticOpResult {
                result: rm,
                carry,
                ..ArithmeticOpResult::default()
            },
            // Shifting in u64 sidesteps Rust's modulo-32 shift semantics at
            // exactly 32.
            1..=32 => {
                let wide = (rm as u64) << shift_amount;
                ArithmeticOpResult {
                    result: wide as u32,
                    carry: wide.get_bit(32),
                    ..ArithmeticOpResult::default()
                }
            }
            _ => ArithmeticOpResult::default(),
        },
        ShiftKind::Lsr => {
            let shift_amount = if shift_amount == 0 { 32 } else { shift_amount };
            match shift_amount {
                1..=32 => {
                    let wide = rm as u64;
                    ArithmeticOpResult {
                        result: (wide >> shift_amount) as u32,
                        carry: wide.get_bit((shift_amount - 1) as u8),
                        ..ArithmeticOpResult::default()
                    }
                }
                _ => ArithmeticOpResult::default(),
            }
        }
        ShiftKind::Asr => match shift_amount {
            0 | 32.. => ArithmeticOpResult {
                result: ((rm as i32) >> 31) as u32,
                carry: rm.get_bit(31),
                ..ArithmeticOpResult::default()
            },
            1..=31 => ArithmeticOpResult {
                result: ((rm as i32) >> shift_amount) as u32,
                carry: rm.get_bit((shift_amount - 1) as u8),
                ..ArithmeticOpResult::default()
            },
        },
        ShiftKind::Ror => {
            // ROR by more than 32 behaves as ROR by n mod 32, with multiples
            // of 32 acting as ROR #32.
            let mut amount = shift_amount;
            if amount > 32 {
                amount %= 32;
                if amount == 0 {
                    amount = 32;
                }
            }

            match amount {
                0 => ArithmeticOpResult {
                    result: (rm >> 1) | ((carry as u32) << 31),
                    carry: rm.get_bit(0),
                    ..ArithmeticOpResult::default()
                },
                1..=31 => ArithmeticOpResult {
                    result: rm.rotate_right(amount),
                    carry: rm.get_bit((amount - 1) as u8),
                    ..ArithmeticOpResult::default()
                },
                _ => ArithmeticOpResult {
                    result: rm,
                    carry: rm.get_bit(31),
                    ..ArithmeticOpResult::default()
                },
            }
        }
    }
}

/// The PSR transfer operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrOpKind {
    /// MRS: copy the PSR into a register.
    Mrs { destination_register: u32 },
    /// MSR: copy a register into the whole PSR.
    Msr { source_register: u32 },
    /// MSR with field mask: write only the fields selected by bits 19-16.
    MsrFlg {
        operand: AluSecondOperandInfo,
        field_mask: u32,
    },
}

impl TryFrom<u32> for PsrOpKind {
    type Error = String;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(16..=21) == 0b00_1111
            && op_code.get_bits(0..=11) == 0
        {
            Ok(Self::Mrs {
                destination_register: op_code.get_bits(12..=15),
            })
        } else if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(12..=21) == 0b10_1001_1111
            && op_code.get_bits(4..=11) == 0
        {
            Ok(Self::Msr {
                source_register: op_code.get_bits(0..=3),
            })
        } else if op_code.get_bits(26..=27) == 0b00
            && op_code.get_bits(23..=24) == 0b10
            && op_code.get_bits(20..=21) == 0b10
            && op_code.get_bits(12..=15) == 0b1111
        {
            Ok(Self::MsrFlg {
                operand: if op_code.get_bit(25) {
                    AluSecondOperandInfo::Immediate {
                        base: op_code.get_bits(0..=7),
                        shift: op_code.get_bits(8..=11) * 2,
                    }
                } else {
                    AluSecondOperandInfo::Register {
                        shift_op: ShiftOperator::Immediate(0),
                        shift_kind: ShiftKind::Lsl,
                        register: op_code.get_bits(0..=3),
                    }
                },
                field_mask: op_code.get_bits(16..=19),
            })
        } else {
            Err(format!("invalid PSR transfer opcode: 0x{op_code:08X}"))
        }
    }
}

/// Which program status register a PSR transfer touches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value { Self::Spsr } else { Self::Cpsr }
    }
}

/// How the shift amount of a register operand is specified.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ShiftOperator {
    /// 5-bit immediate encoded in the instruction.
    Immediate(u32),
    /// Low byte of the named register.
    Register(u32),
}

/// The flexible second operand of a data processing instruction: either a
/// shifted register or an 8-bit immediate rotated right by an even amount.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: u32,
    },
    Immediate {
        base: u32,
        shift: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn alu_instruction_kind() {
        assert_eq!(ArmModeAluInstr::from(0x9).kind(), AIKind::Logical);
        assert_eq!(ArmModeAluInstr::from(0x2).kind(), AIKind::Arithmetic);
    }

    #[test]
    fn lsl_zero_keeps_value_and_carry() {
        let r = shift(ShiftKind::Lsl, 0, 0xDEAD_BEEF, true);
        assert_eq!(r.result, 0xDEAD_BEEF);
        assert!(r.carry);

        let r = shift(ShiftKind::Lsl, 0, 0xDEAD_BEEF, false);
        assert_eq!(r.result, 0xDEAD_BEEF);
        assert!(!r.carry);
    }

    #[test]
    fn lsl_carry_out() {
        let r = shift(ShiftKind::Lsl, 1, 0x8000_0001, false);
        assert_eq!(r.result, 2);
        assert!(r.carry);

        let r = shift(ShiftKind::Lsl, 32, 1, false);
        assert_eq!(r.result, 0);
        assert!(r.carry);

        let r = shift(ShiftKind::Lsl, 33, u32::MAX, true);
        assert_eq!(r.result, 0);
        assert!(!r.carry);
    }

    #[test]
    fn lsr_zero_encodes_lsr_32() {
        let r = shift(ShiftKind::Lsr, 0, 0x8000_0000, false);
        assert_eq!(r.result, 0);
        assert!(r.carry);
    }

    #[test]
    fn asr_zero_encodes_asr_32() {
        let r = shift(ShiftKind::Asr, 0, 0x8000_0000, false);
        assert_eq!(r.result, u32::MAX);
        assert!(r.carry);

        let r = shift(ShiftKind::Asr, 0, 0x7FFF_FFFF, true);
        assert_eq!(r.result, 0);
        assert!(!r.carry);
    }

    #[test]
    fn ror_zero_is_rrx() {
        let r = shift(ShiftKind::Ror, 0, 0b11, true);
        assert_eq!(r.result, 0x8000_0001);
        assert!(r.carry);
    }

    #[test]
    fn ror_32_keeps_value_sets_carry_from_bit_31() {
        let r = shift(ShiftKind::Ror, 32, 0x8000_0001, false);
        assert_eq!(r.result, 0x8000_0001);
        assert!(r.carry);
    }

    #[test]
    fn ror_wraps_over_32() {
        let a = shift(ShiftKind::Ror, 33, 0x12345678, false);
        let b = shift(ShiftKind::Ror, 1, 0x12345678, false);
        assert_eq!(a.result, b.result);
        assert_eq!(a.carry, b.carry);
    }

    #[test]
    fn decode_mrs() {
        // MRS R3, CPSR
        let op = PsrOpKind::try_from(0xE10F_3000).unwrap();
        assert_eq!(
            op,
            PsrOpKind::Mrs {
                destination_register: 3
            }
        );
    }

    #[test]
    fn decode_msr() {
        // MSR CPSR, R0
        let op = PsrOpKind::try_from(0xE129_F000).unwrap();
        assert_eq!(op, PsrOpKind::Msr { source_register: 0 });
    }

    #[test]
    fn decode_msr_flg_immediate() {
        // MSR CPSR_flg, #0xF0000000
        let op = PsrOpKind::try_from(0xE328_F4F0).unwrap();
        assert_eq!(
            op,
            PsrOpKind::MsrFlg {
                operand: AluSecondOperandInfo::Immediate {
                    base: 0xF0,
                    shift: 8
                },
                field_mask: 0b1000,
            }
        );
    }
}
