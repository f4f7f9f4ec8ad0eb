//! 32-bit instruction decoding.
//!
//! Bits 27-25 select the broad category; the `000`/`001` space is further
//! discriminated through the extended bit patterns of the data sheet (BX,
//! SWP, multiply, halfword transfer, PSR transfer). Overlapping encodings
//! are therefore tested most-specific first.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstr, PsrKind, PsrOpKind, ShiftOperator,
};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, Indexing, LoadStoreKind, Offsetting, OperandKind,
    ReadWriteKind, ShiftKind,
};

/// Load (LDR) or store (STR), from the L bit.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum SingleDataTransferKind {
    Ldr,
    Str,
}

impl From<u32> for SingleDataTransferKind {
    fn from(op_code: u32) -> Self {
        if op_code.get_bit(20) { Self::Ldr } else { Self::Str }
    }
}

/// Offset of a single data transfer: a 12-bit immediate or a register
/// shifted by an immediate amount.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: u32,
    },
}

/// The size of the halfword/signed transfer, from the SH bits.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum HalfwordTransferKind {
    UnsignedHalfwords,
    SignedByte,
    SignedHalfwords,
}

impl From<u8> for HalfwordTransferKind {
    fn from(value: u8) -> Self {
        match value {
            0b01 => Self::UnsignedHalfwords,
            0b10 => Self::SignedByte,
            0b11 => Self::SignedHalfwords,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyVariant {
    Mul,
    Mla,
}

impl From<u32> for ArmModeMultiplyVariant {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=24) {
            0b0000 => Self::Mul,
            0b0001 => Self::Mla,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl From<u32> for ArmModeMultiplyLongVariant {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=24) {
            0b0100 => Self::Umull,
            0b0101 => Self::Umlal,
            0b0110 => Self::Smull,
            0b0111 => Self::Smlal,
            _ => unreachable!(),
        }
    }
}

/// A fully decoded ARM instruction.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstr,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        variant: ArmModeMultiplyVariant,
        condition: Condition,
        should_set_codes: bool,
        rd_destination_register: u32,
        rn_accumulate_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    MultiplyLong {
        variant: ArmModeMultiplyLongVariant,
        condition: Condition,
        should_set_codes: bool,
        rdhi_destination_register: u32,
        rdlo_destination_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    PSRTransfer {
        condition: Condition,
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    SingleDataSwap {
        condition: Condition,
        byte: bool,
        rn: u32,
        rd: u32,
        rm: u32,
    },
    BranchAndExchange {
        condition: Condition,
        register: usize,
    },
    HalfwordDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        condition: Condition,
        kind: SingleDataTransferKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    },
    Branch {
        condition: Condition,
        link: bool,
        offset: u32,
    },
    /// Coprocessor forms: unused on this platform, kept distinct so the
    /// executor can halt with a diagnostic instead of guessing.
    Coprocessor,
    SoftwareInterrupt,
    Undefined,
}

impl From<u32> for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u32) -> Self {
        let condition = Condition::from(op_code.get_bits(28..=31) as u8);

        // Ordered by how many bits each pattern pins down.
        if op_code.get_bits(4..=27) == 0b0001_0010_1111_1111_1111_0001 {
            Self::BranchAndExchange {
                condition,
                register: op_code.get_bits(0..=3) as usize,
            }
        } else if op_code.get_bits(23..=27) == 0b00010
            && op_code.get_bits(20..=21) == 0b00
            && op_code.get_bits(4..=11) == 0b0000_1001
        {
            Self::SingleDataSwap {
                condition,
                byte: op_code.get_bit(22),
                rn: op_code.get_bits(16..=19),
                rd: op_code.get_bits(12..=15),
                rm: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(23..=27) == 0b00001 && op_code.get_bits(4..=7) == 0b1001 {
            Self::MultiplyLong {
                variant: ArmModeMultiplyLongVariant::from(op_code),
                condition,
                should_set_codes: op_code.get_bit(20),
                rdhi_destination_register: op_code.get_bits(16..=19),
                rdlo_destination_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(22..=27) == 0b000000 && op_code.get_bits(4..=7) == 0b1001 {
            Self::Multiply {
                variant: ArmModeMultiplyVariant::from(op_code),
                condition,
                should_set_codes: op_code.get_bit(20),
                rd_destination_register: op_code.get_bits(16..=19),
                rn_accumulate_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(25..=27) == 0b000 && op_code.get_bit(7) && op_code.get_bit(4) {
            let sh_bits = op_code.get_bits(5..=6);

            if sh_bits == 0b00 {
                // SWP shares the 1xx1 pattern with SH=00.
                Self::SingleDataSwap {
                    condition,
                    byte: op_code.get_bit(22),
                    rn: op_code.get_bits(16..=19),
                    rd: op_code.get_bits(12..=15),
                    rm: op_code.get_bits(0..=3),
                }
            } else {
                let operand_kind: OperandKind = op_code.get_bit(22).into();
                Self::HalfwordDataTransfer {
                    condition,
                    indexing: op_code.get_bit(24).into(),
                    offsetting: op_code.get_bit(23).into(),
                    write_back: op_code.get_bit(21),
                    load_store_kind: op_code.get_bit(20).into(),
                    offset_kind: if operand_kind == OperandKind::Register {
                        HalfwordDataTransferOffsetKind::Register {
                            register: op_code.get_bits(0..=3),
                        }
                    } else {
                        HalfwordDataTransferOffsetKind::Immediate {
                            offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                        }
                    },
                    base_register: op_code.get_bits(16..=19),
                    source_destination_register: op_code.get_bits(12..=15),
                    transfer_kind: (sh_bits as u8).into(),
                }
            }
        } else if op_code.get_bits(25..=27) == 0b011 && op_code.get_bit(4) {
            Self::Undefined
        } else if op_code.get_bits(24..=27) == 0b1111 {
            Self::SoftwareInterrupt
        } else if op_code.get_bits(25..=27) == 0b110 || op_code.get_bits(24..=27) == 0b1110 {
            Self::Coprocessor
        } else if op_code.get_bits(25..=27) == 0b100 {
            Self::BlockDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15),
            }
        } else if op_code.get_bits(25..=27) == 0b101 {
            Self::Branch {
                condition,
                link: op_code.get_bit(24),
                offset: op_code.get_bits(0..=23) << 2,
            }
        } else if op_code.get_bits(26..=27) == 0b01 {
            // The I bit meaning is inverted in single data transfer.
            let op_kind: OperandKind = (!op_code.get_bit(25)).into();

            let offset_info = match op_kind {
                OperandKind::Immediate => SingleDataTransferOffsetInfo::Immediate {
                    offset: op_code.get_bits(0..=11),
                },
                OperandKind::Register => SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: op_code.get_bits(7..=11),
                    shift_kind: op_code.get_bits(5..=6).into(),
                    reg_offset: op_code.get_bits(0..=3),
                },
            };

            Self::SingleDataTransfer {
                condition,
                kind: op_code.into(),
                quantity: op_code.into(),
                write_back: op_code.get_bit(21),
                indexing: op_code.get_bit(24).into(),
                rd: op_code.get_bits(12..=15),
                base_register: op_code.get_bits(16..=19),
                offset_info,
                offsetting: op_code.get_bit(23).into(),
            }
        } else if op_code.get_bits(26..=27) == 0b00 {
            let alu_instruction: ArmModeAluInstr = op_code.get_bits(21..=24).into();
            let set_conditions = op_code.get_bit(20);

            // TST/TEQ/CMP/CMN with S=0 are the PSR transfer encodings; any
            // pattern in that hole that is not a valid MRS/MSR is undefined.
            if !set_conditions
                && matches!(
                    alu_instruction,
                    ArmModeAluInstr::Tst
                        | ArmModeAluInstr::Teq
                        | ArmModeAluInstr::Cmp
                        | ArmModeAluInstr::Cmn
                )
            {
                return match PsrOpKind::try_from(op_code) {
                    Ok(kind) => Self::PSRTransfer {
                        condition,
                        psr_kind: PsrKind::from(op_code.get_bit(22)),
                        kind,
                    },
                    Err(_) => Self::Undefined,
                };
            }

            let op_kind: OperandKind = op_code.get_bit(25).into();
            let op2 = match op_kind {
                OperandKind::Immediate => AluSecondOperandInfo::Immediate {
                    base: op_code.get_bits(0..=7),
                    shift: op_code.get_bits(8..=11) * 2,
                },
                OperandKind::Register => {
                    let shift_op = if op_code.get_bit(4) {
                        ShiftOperator::Register(op_code.get_bits(8..=11))
                    } else {
                        ShiftOperator::Immediate(op_code.get_bits(7..=11))
                    };
                    AluSecondOperandInfo::Register {
                        shift_op,
                        shift_kind: op_code.get_bits(5..=6).into(),
                        register: op_code.get_bits(0..=3),
                    }
                }
            };

            Self::DataProcessing {
                condition,
                alu_instruction,
                set_conditions,
                op_kind,
                rn: op_code.get_bits(16..=19),
                destination: op_code.get_bits(12..=15),
                op2,
            }
        } else {
            Self::Undefined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        let output = ArmModeInstruction::from(0b1110_1011_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            output,
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: true,
                offset: 508,
            }
        );

        let output = ArmModeInstruction::from(0xEA00_0001);
        assert_eq!(
            output,
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: false,
                offset: 4,
            }
        );
    }

    #[test]
    fn decode_branch_and_exchange() {
        let output = ArmModeInstruction::from(0xE12F_FF13);
        assert_eq!(
            output,
            ArmModeInstruction::BranchAndExchange {
                condition: Condition::AL,
                register: 3,
            }
        );
    }

    #[test]
    fn decode_data_processing_immediate() {
        // MOVS R1, #0
        let output = ArmModeInstruction::from(0xE3B0_1000);
        assert_eq!(
            output,
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstr::Mov,
                set_conditions: true,
                op_kind: OperandKind::Immediate,
                rn: 0,
                destination: 1,
                op2: AluSecondOperandInfo::Immediate { base: 0, shift: 0 },
            }
        );
    }

    #[test]
    fn decode_mrs_as_psr_transfer() {
        // MRS R0, CPSR
        let output = ArmModeInstruction::from(0xE10F_0000);
        assert_eq!(
            output,
            ArmModeInstruction::PSRTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::Mrs {
                    destination_register: 0
                },
            }
        );
    }

    #[test]
    fn decode_msr_spsr() {
        // MSR SPSR, R2
        let output = ArmModeInstruction::from(0xE169_F002);
        assert_eq!(
            output,
            ArmModeInstruction::PSRTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Msr { source_register: 2 },
            }
        );
    }

    #[test]
    fn cmp_without_s_and_no_psr_pattern_is_undefined() {
        // CMP encoding with S=0 and junk in the PSR-reserved fields.
        let output = ArmModeInstruction::from(0xE140_0312);
        assert_eq!(output, ArmModeInstruction::Undefined);
    }

    #[test]
    fn decode_multiply() {
        // MLA R0, R1, R2, R3
        let output = ArmModeInstruction::from(0xE020_3291);
        assert_eq!(
            output,
            ArmModeInstruction::Multiply {
                variant: ArmModeMultiplyVariant::Mla,
                condition: Condition::AL,
                should_set_codes: false,
                rd_destination_register: 0,
                rn_accumulate_register: 3,
                rs_operand_register: 2,
                rm_operand_register: 1,
            }
        );
    }

    #[test]
    fn decode_multiply_long() {
        // UMULL R1, R2, R3, R4
        let output = ArmModeInstruction::from(0xE082_1493);
        assert_eq!(
            output,
            ArmModeInstruction::MultiplyLong {
                variant: ArmModeMultiplyLongVariant::Umull,
                condition: Condition::AL,
                should_set_codes: false,
                rdhi_destination_register: 2,
                rdlo_destination_register: 1,
                rs_operand_register: 4,
                rm_operand_register: 3,
            }
        );
    }

    #[test]
    fn decode_single_data_transfer() {
        // LDR R2, [R1, #4]
        let output = ArmModeInstruction::from(0xE591_2004);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataTransfer {
                condition: Condition::AL,
                kind: SingleDataTransferKind::Ldr,
                quantity: ReadWriteKind::Word,
                write_back: false,
                indexing: Indexing::Pre,
                rd: 2,
                base_register: 1,
                offset_info: SingleDataTransferOffsetInfo::Immediate { offset: 4 },
                offsetting: Offsetting::Up,
            }
        );
    }

    #[test]
    fn decode_halfword_transfer() {
        // LDRH R0, [R1, #2]
        let output = ArmModeInstruction::from(0xE1D1_00B2);
        assert_eq!(
            output,
            ArmModeInstruction::HalfwordDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store_kind: LoadStoreKind::Load,
                offset_kind: HalfwordDataTransferOffsetKind::Immediate { offset: 2 },
                base_register: 1,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfwords,
            }
        );
    }

    #[test]
    fn decode_swap() {
        // SWP R0, R1, [R2]
        let output = ArmModeInstruction::from(0xE102_0091);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataSwap {
                condition: Condition::AL,
                byte: false,
                rn: 2,
                rd: 0,
                rm: 1,
            }
        );
    }

    #[test]
    fn decode_block_data_transfer() {
        // STMFD R13!, {R0, R1, LR}
        let output = ArmModeInstruction::from(0xE92D_4003);
        assert_eq!(
            output,
            ArmModeInstruction::BlockDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Down,
                load_psr: false,
                write_back: true,
                load_store: LoadStoreKind::Store,
                rn: 13,
                register_list: 0x4003,
            }
        );
    }

    #[test]
    fn decode_software_interrupt() {
        let output = ArmModeInstruction::from(0xEF00_0006);
        assert_eq!(output, ArmModeInstruction::SoftwareInterrupt);
    }

    #[test]
    fn decode_coprocessor_forms() {
        // MRC p14, 0, R0, c0, c0, 0
        let output = ArmModeInstruction::from(0xEE10_0E10);
        assert_eq!(output, ArmModeInstruction::Coprocessor);
        // LDC p1, c0, [R0]
        let output = ArmModeInstruction::from(0xED90_0100);
        assert_eq!(output, ArmModeInstruction::Coprocessor);
    }

    #[test]
    fn decode_undefined() {
        let output = ArmModeInstruction::from(0xE7F0_00F0);
        assert_eq!(output, ArmModeInstruction::Undefined);
    }
}
