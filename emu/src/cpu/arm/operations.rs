//! Execution of the 32-bit instruction set.

use crate::bitwise::{Bits, sign_extend};
use crate::cpu::arm::alu_instruction::{
    AIKind, AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstr, Kind, PsrKind, PsrOpKind,
    shift,
};
use crate::cpu::arm::instructions::{
    ArmModeMultiplyLongVariant, ArmModeMultiplyVariant, HalfwordTransferKind,
    SingleDataTransferKind, SingleDataTransferOffsetInfo,
};
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, Indexing, LoadStoreKind, Offsetting, OperandKind,
    ReadWriteKind, ShiftKind,
};
use crate::cpu::psr::CpuState;
use crate::cpu::registers::REG_PC;

pub const SIZE_OF_INSTRUCTION: u32 = 4;

impl Arm7tdmi {
    pub fn data_processing(
        &mut self,
        op_code: &ArmModeOpcode,
        alu_instruction: ArmModeAluInstr,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
    ) {
        // Reading PC as the first operand needs an extra pipeline offset when
        // the shift amount comes from a register (the instruction takes one
        // more cycle, so PC reads as X+12 instead of X+8).
        let offset = match rn {
            REG_PC => Self::get_pc_offset_alu(op_kind, op_code.get_bit(4)),
            _ => 0,
        };
        let op1 = self
            .registers
            .register_at(rn as usize)
            .wrapping_add(offset);

        let op2 = self.get_operand(
            alu_instruction,
            set_conditions,
            op_kind,
            op_code.get_bits(0..=11),
        );

        let rd = destination as usize;
        match alu_instruction {
            ArmModeAluInstr::And => self.and(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Eor => self.eor(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Sub => self.sub(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Rsb => self.sub(rd, op2, op1, set_conditions),
            ArmModeAluInstr::Add => self.add(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Adc => self.adc(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Sbc => self.sbc(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Rsc => self.sbc(rd, op2, op1, set_conditions),
            ArmModeAluInstr::Tst => self.tst(op1, op2),
            ArmModeAluInstr::Teq => self.teq(op1, op2),
            ArmModeAluInstr::Cmp => self.cmp(op1, op2),
            ArmModeAluInstr::Cmn => self.cmn(op1, op2),
            ArmModeAluInstr::Orr => self.orr(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Mov => self.mov(rd, op2, set_conditions),
            ArmModeAluInstr::Bic => self.bic(rd, op1, op2, set_conditions),
            ArmModeAluInstr::Mvn => self.mvn(rd, op2, set_conditions),
        }

        let is_test_instruction = matches!(
            alu_instruction,
            ArmModeAluInstr::Tst | ArmModeAluInstr::Teq | ArmModeAluInstr::Cmp | ArmModeAluInstr::Cmn
        );

        if set_conditions && destination == REG_PC && !is_test_instruction {
            // SPSR is moved back into CPSR: this is the exception return
            // idiom, so the banked registers have to be swapped too.
            assert!(
                self.cpsr.mode() != Mode::User,
                "S=1 with Rd=R15 is unpredictable in User mode"
            );

            let current_spsr = self.spsr;
            self.swap_mode(current_spsr.mode());
            self.cpsr = current_spsr;
        }

        if !is_test_instruction && destination == REG_PC {
            self.reload_pipeline();
        }
    }

    pub fn psr_transfer(&mut self, op_kind: PsrOpKind, psr_kind: PsrKind) {
        // SPSR does not exist in User/System mode; reads fall back to CPSR.
        let psr_kind = if psr_kind == PsrKind::Spsr
            && matches!(self.cpsr.mode(), Mode::User | Mode::System)
        {
            tracing::debug!("SPSR access in User/System mode, using CPSR");
            PsrKind::Cpsr
        } else {
            psr_kind
        };

        match op_kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.spsr,
                };
                self.registers
                    .set_register_at(destination_register as usize, psr.into());
            }
            PsrOpKind::Msr { source_register } => {
                let value = self.registers.register_at(source_register as usize);
                self.write_psr(psr_kind, value, 0b1111);
            }
            PsrOpKind::MsrFlg {
                operand,
                field_mask,
            } => {
                let value = match operand {
                    AluSecondOperandInfo::Register { register, .. } => {
                        self.registers.register_at(register as usize)
                    }
                    AluSecondOperandInfo::Immediate { base, shift } => base.rotate_right(shift),
                };
                self.write_psr(psr_kind, value, field_mask);
            }
        }
    }

    /// Writes the masked fields of the selected PSR. In User mode only the
    /// flag field is writable; the control field is silently preserved.
    fn write_psr(&mut self, psr_kind: PsrKind, value: u32, field_mask: u32) {
        let old: u32 = match psr_kind {
            PsrKind::Cpsr => self.cpsr.into(),
            PsrKind::Spsr => self.spsr.into(),
        };

        let mut byte_mask: u32 = 0;
        if field_mask.get_bit(0) {
            byte_mask |= 0x0000_00FF;
        }
        if field_mask.get_bit(1) {
            byte_mask |= 0x0000_FF00;
        }
        if field_mask.get_bit(2) {
            byte_mask |= 0x00FF_0000;
        }
        if field_mask.get_bit(3) {
            byte_mask |= 0xFF00_0000;
        }

        if psr_kind == PsrKind::Cpsr && self.cpsr.mode() == Mode::User {
            byte_mask &= 0xFF00_0000;
        }

        let new = (old & !byte_mask) | (value & byte_mask);

        match psr_kind {
            PsrKind::Cpsr => {
                // A mode-field write switches banks for all later
                // instructions.
                if byte_mask & 0xFF != 0 {
                    if let Ok(new_mode) = Mode::try_from(new & 0b11111) {
                        self.swap_mode(new_mode);
                    } else {
                        tracing::warn!("MSR wrote invalid mode bits 0b{:05b}", new & 0b11111);
                    }
                }
                self.cpsr = new.into();
            }
            PsrKind::Spsr => self.spsr = new.into(),
        }
    }

    fn shift_operand(
        &mut self,
        alu_instruction: ArmModeAluInstr,
        s: bool,
        shift_kind: ShiftKind,
        shift_amount: u32,
        rm: u32,
    ) -> u32 {
        let result = shift(shift_kind, shift_amount, rm, self.cpsr.carry_flag());

        // Logical operations take the carry from the shifter.
        if s && alu_instruction.kind() == AIKind::Logical {
            self.cpsr.set_carry_flag(result.carry);
        }

        result.result
    }

    fn get_operand(
        &mut self,
        alu_instruction: ArmModeAluInstr,
        s: bool,
        i: OperandKind,
        op2: u32,
    ) -> u32 {
        match i {
            OperandKind::Register => {
                let rm = op2.get_bits(0..=3);
                let shift_by_register = op2.get_bit(4);
                let offset = match rm {
                    REG_PC => Self::get_pc_offset_alu(i, shift_by_register),
                    _ => 0,
                };
                let rm = self
                    .registers
                    .register_at(rm as usize)
                    .wrapping_add(offset);
                let shift_kind = op2.get_bits(5..=6).into();

                let shift_amount = if shift_by_register {
                    let rs = op2.get_bits(8..=11);
                    let rs = self.registers.register_at(rs as usize) & 0xFF;
                    // A register-specified amount of zero leaves the value
                    // and the carry untouched.
                    if rs == 0 {
                        return rm;
                    }
                    rs
                } else {
                    op2.get_bits(7..=11)
                };

                self.shift_operand(alu_instruction, s, shift_kind, shift_amount, rm)
            }
            OperandKind::Immediate => {
                let imm = op2.get_bits(0..=7);
                let rotate_amount = op2.get_bits(8..=11) * 2;

                if rotate_amount == 0 {
                    imm
                } else {
                    self.shift_operand(alu_instruction, s, ShiftKind::Ror, rotate_amount, imm)
                }
            }
        }
    }

    const fn get_pc_offset_alu(i: OperandKind, r: bool) -> u32 {
        if matches!(i, OperandKind::Register) && r {
            4
        } else {
            0
        }
    }

    pub(crate) fn add_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let wide = first_op as u64 + second_op as u64;
        let result = wide as u32;

        ArithmeticOpResult {
            result,
            carry: wide > u32::MAX as u64,
            overflow: ((first_op ^ result) & (second_op ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    pub(crate) fn sub_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let result = first_op.wrapping_sub(second_op);

        ArithmeticOpResult {
            result,
            // C is the inverted borrow.
            carry: first_op >= second_op,
            overflow: ((first_op ^ second_op) & (first_op ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    pub(crate) fn adc_inner_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
        let wide = first_op as u64 + second_op as u64 + carry_in as u64;
        let result = wide as u32;

        ArithmeticOpResult {
            result,
            carry: wide > u32::MAX as u64,
            overflow: ((first_op ^ result) & (second_op ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    fn set_logical_flags(&mut self, result: u32, s: bool) {
        if s {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    fn and(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn & op2;
        self.registers.set_register_at(rd, result);
        self.set_logical_flags(result, s);
    }

    fn eor(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn ^ op2;
        self.registers.set_register_at(rd, result);
        self.set_logical_flags(result, s);
    }

    fn sub(&mut self, rd: usize, first: u32, second: u32, s: bool) {
        let op_result = Self::sub_inner_op(first, second);
        self.registers.set_register_at(rd, op_result.result);
        if s {
            self.cpsr.set_flags(&op_result);
        }
    }

    fn add(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let op_result = Self::add_inner_op(rn, op2);
        self.registers.set_register_at(rd, op_result.result);
        if s {
            self.cpsr.set_flags(&op_result);
        }
    }

    fn adc(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let op_result = Self::adc_inner_op(rn, op2, self.cpsr.carry_flag());
        self.registers.set_register_at(rd, op_result.result);
        if s {
            self.cpsr.set_flags(&op_result);
        }
    }

    fn sbc(&mut self, rd: usize, first: u32, second: u32, s: bool) {
        // first - second - !C == first + !second + C
        let op_result = Self::adc_inner_op(first, !second, self.cpsr.carry_flag());
        self.registers.set_register_at(rd, op_result.result);
        if s {
            self.cpsr.set_flags(&op_result);
        }
    }

    fn tst(&mut self, rn: u32, op2: u32) {
        let result = rn & op2;
        self.set_logical_flags(result, true);
    }

    fn teq(&mut self, rn: u32, op2: u32) {
        let result = rn ^ op2;
        self.set_logical_flags(result, true);
    }

    fn cmp(&mut self, rn: u32, op2: u32) {
        let op_result = Self::sub_inner_op(rn, op2);
        self.cpsr.set_flags(&op_result);
    }

    fn cmn(&mut self, rn: u32, op2: u32) {
        let op_result = Self::add_inner_op(rn, op2);
        self.cpsr.set_flags(&op_result);
    }

    fn orr(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn | op2;
        self.registers.set_register_at(rd, result);
        self.set_logical_flags(result, s);
    }

    fn mov(&mut self, rd: usize, op2: u32, s: bool) {
        self.registers.set_register_at(rd, op2);
        self.set_logical_flags(op2, s);
    }

    fn bic(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn & !op2;
        self.registers.set_register_at(rd, result);
        self.set_logical_flags(result, s);
    }

    fn mvn(&mut self, rd: usize, op2: u32, s: bool) {
        let result = !op2;
        self.registers.set_register_at(rd, result);
        self.set_logical_flags(result, s);
    }

    pub fn branch_and_exchange(&mut self, register: usize) {
        let mut rn = self.registers.register_at(register);
        let state: CpuState = rn.get_bit(0).into();

        self.cpsr.set_cpu_state(state);

        match state {
            CpuState::Thumb => rn.set_bit_off(0),
            CpuState::Arm => {
                rn.set_bit_off(0);
                rn.set_bit_off(1);
            }
        }

        self.registers.set_program_counter(rn);
        self.reload_pipeline();
    }

    pub fn single_data_swap(&mut self, byte: bool, rn: u32, rd: u32, rm: u32) {
        let address = self.registers.register_at(rn as usize);
        let rm_value = self.registers.register_at(rm as usize);

        if byte {
            let old_value = self.bus.read_byte(address) as u32;
            self.bus.write_byte(address, rm_value as u8);
            self.registers.set_register_at(rd as usize, old_value);
        } else {
            let old_value = self.bus.read_word(address);
            self.bus.write_word(address, rm_value);
            self.registers.set_register_at(rd as usize, old_value);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        rd: u32,
        transfer_kind: HalfwordTransferKind,
    ) {
        let offset = match offset_kind {
            HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
            HalfwordDataTransferOffsetKind::Register { register } => {
                self.registers.register_at(register as usize)
            }
        };

        let base = self.registers.register_at(base_register as usize);
        let effective = match offsetting {
            Offsetting::Down => base.wrapping_sub(offset),
            Offsetting::Up => base.wrapping_add(offset),
        };

        // A store of the base register must see its pre-writeback value.
        let store_value = if load_store_kind == LoadStoreKind::Store {
            let mut v = self.registers.register_at(rd as usize);
            if rd == REG_PC {
                v = v.wrapping_add(4);
            }
            Some(v)
        } else {
            None
        };

        let address = match indexing {
            Indexing::Post => {
                self.registers
                    .set_register_at(base_register as usize, effective);
                base
            }
            Indexing::Pre => {
                if write_back {
                    self.registers
                        .set_register_at(base_register as usize, effective);
                }
                effective
            }
        };

        match load_store_kind {
            LoadStoreKind::Store => {
                self.bus.write_half_word(address, store_value.unwrap() as u16);
            }
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => self.read_half_word(address, false),
                    HalfwordTransferKind::SignedByte => {
                        sign_extend(self.bus.read_byte(address) as u32, 8)
                    }
                    HalfwordTransferKind::SignedHalfwords => self.read_half_word(address, true),
                };
                self.registers.set_register_at(rd as usize, value);
            }
        }

        if load_store_kind == LoadStoreKind::Load && rd == REG_PC {
            self.reload_pipeline();
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn single_data_transfer(
        &mut self,
        kind: SingleDataTransferKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) {
        let base = self.registers.register_at(base_register as usize);

        let amount = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                let value = self.registers.register_at(reg_offset as usize);
                shift(shift_kind, shift_amount, value, self.cpsr.carry_flag()).result
            }
        };

        let offset_address = match offsetting {
            Offsetting::Down => base.wrapping_sub(amount),
            Offsetting::Up => base.wrapping_add(amount),
        };

        let store_value = if kind == SingleDataTransferKind::Str {
            let mut v = self.registers.register_at(rd as usize);
            // STR of PC writes the current instruction + 12.
            if rd == REG_PC {
                v = v.wrapping_add(4);
            }
            Some(v)
        } else {
            None
        };

        let address = match indexing {
            Indexing::Post => {
                // Post-indexing always writes back.
                self.registers
                    .set_register_at(base_register as usize, offset_address);
                base
            }
            Indexing::Pre => {
                if write_back {
                    self.registers
                        .set_register_at(base_register as usize, offset_address);
                }
                offset_address
            }
        };

        match kind {
            SingleDataTransferKind::Ldr => {
                let value = match quantity {
                    ReadWriteKind::Byte => self.bus.read_byte(address) as u32,
                    ReadWriteKind::Word => self.bus.read_word(address),
                };
                self.registers.set_register_at(rd as usize, value);
            }
            SingleDataTransferKind::Str => {
                let v = store_value.unwrap();
                match quantity {
                    ReadWriteKind::Byte => self.bus.write_byte(address, v as u8),
                    ReadWriteKind::Word => self.bus.write_word(address, v),
                }
            }
        }

        if kind == SingleDataTransferKind::Ldr && rd == REG_PC {
            self.reload_pipeline();
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        reg_list: u32,
    ) {
        let base_register = rn as usize;
        let memory_base = self.registers.register_at(base_register);
        let mut address = memory_base;

        let is_empty_list = reg_list == 0;
        let r15_in_list = reg_list.get_bit(15) || is_empty_list;
        let use_user_bank = load_psr && !r15_in_list;

        let transfer = match (load_store, use_user_bank) {
            (LoadStoreKind::Store, false) => |arm: &mut Self, address: u32, reg: usize| {
                let mut value = arm.registers.register_at(reg);
                if reg == REG_PC as usize {
                    value = value.wrapping_add(4);
                }
                arm.bus.write_word(address, value);
            },
            (LoadStoreKind::Store, true) => |arm: &mut Self, address: u32, reg: usize| {
                let mut value = arm.read_user_register(reg);
                if reg == REG_PC as usize {
                    value = value.wrapping_add(4);
                }
                arm.bus.write_word(address, value);
            },
            (LoadStoreKind::Load, false) => |arm: &mut Self, address: u32, reg: usize| {
                let value = arm.bus.read_word(address);
                arm.registers.set_register_at(reg, value);
            },
            (LoadStoreKind::Load, true) => |arm: &mut Self, address: u32, reg: usize| {
                let value = arm.bus.read_word(address);
                arm.write_user_register(reg, value);
            },
        };

        // STM with writeback and the base in the list stores the original
        // base only when the base is the lowest-numbered listed register;
        // otherwise the written-back value is stored.
        let base_in_list = reg_list.get_bit(base_register as u8);
        let restore_base = if write_back
            && base_in_list
            && load_store == LoadStoreKind::Store
            && !is_empty_list
        {
            let final_address = match offsetting {
                Offsetting::Up => memory_base.wrapping_add(reg_list.count_ones() * 4),
                Offsetting::Down => memory_base.wrapping_sub(reg_list.count_ones() * 4),
            };

            let first_in_list = (0..=15).find(|&i| reg_list.get_bit(i)).unwrap() as usize;
            if first_in_list == base_register {
                None
            } else {
                self.registers.set_register_at(base_register, final_address);
                Some(memory_base)
            }
        } else {
            None
        };

        if is_empty_list {
            // Empty list transfers R15 and moves the base by 0x40.
            let transfer_address = match (indexing, offsetting) {
                (Indexing::Post, Offsetting::Up) => address,
                (Indexing::Post, Offsetting::Down) => address.wrapping_sub(0x3C),
                (Indexing::Pre, Offsetting::Up) => address.wrapping_add(4),
                (Indexing::Pre, Offsetting::Down) => address.wrapping_sub(0x40),
            };

            transfer(self, transfer_address, 15);

            address = match offsetting {
                Offsetting::Up => memory_base.wrapping_add(0x40),
                Offsetting::Down => memory_base.wrapping_sub(0x40),
            };
        } else {
            self.exec_data_transfer(reg_list, indexing, &mut address, offsetting, transfer);
        }

        if let Some(original_value) = restore_base {
            self.registers.set_register_at(base_register, original_value);
        }

        // On LDM the loaded value wins over the writeback when the base is
        // in the list.
        let skip_writeback = load_store == LoadStoreKind::Load && base_in_list;
        if write_back && !skip_writeback {
            self.registers.set_register_at(base_register, address);
        }

        // LDM with the S bit and R15 in the list restores SPSR (exception
        // return).
        if load_store == LoadStoreKind::Load && load_psr && r15_in_list {
            let current_spsr = self.spsr;
            self.swap_mode(current_spsr.mode());
            self.cpsr = current_spsr;
        }

        if load_store == LoadStoreKind::Load && r15_in_list {
            self.reload_pipeline();
        }
    }

    fn exec_data_transfer<F>(
        &mut self,
        reg_list: u32,
        indexing: Indexing,
        address: &mut u32,
        offsetting: Offsetting,
        transfer: F,
    ) where
        F: Fn(&mut Self, u32, usize),
    {
        let change_address = |address: u32| match offsetting {
            Offsetting::Down => address.wrapping_sub(4),
            Offsetting::Up => address.wrapping_add(4),
        };

        // The lowest register always lands at the lowest address, so a
        // descending transfer walks the list in reverse.
        let registers: Box<dyn Iterator<Item = u8>> = match offsetting {
            Offsetting::Down => Box::new((0..=15).rev()),
            Offsetting::Up => Box::new(0..=15),
        };

        for reg in registers {
            if reg_list.get_bit(reg) {
                if indexing == Indexing::Pre {
                    *address = change_address(*address);
                }

                transfer(self, *address, reg.into());

                if indexing == Indexing::Post {
                    *address = change_address(*address);
                }
            }
        }
    }

    pub fn branch(&mut self, is_link: bool, offset: u32) {
        let offset = sign_extend(offset, 26) as i32;
        let old_pc = self.registers.program_counter();

        if is_link {
            self.registers
                .set_register_at(14, old_pc.wrapping_sub(SIZE_OF_INSTRUCTION));
        }

        self.registers
            .set_program_counter(old_pc.wrapping_add(offset as u32));
        self.reload_pipeline();
    }

    pub fn multiply(
        &mut self,
        variant: ArmModeMultiplyVariant,
        set_condition_codes: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) {
        let does_accumulate = matches!(variant, ArmModeMultiplyVariant::Mla);
        let rm_value = self.registers.register_at(rm as usize);
        let rs_value = self.registers.register_at(rs as usize);

        let mut result = rm_value.wrapping_mul(rs_value);
        if does_accumulate {
            result = result.wrapping_add(self.registers.register_at(rn as usize));
        }

        self.registers.set_register_at(rd as usize, result);

        if set_condition_codes {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    pub fn multiply_long(
        &mut self,
        variant: ArmModeMultiplyLongVariant,
        set_condition_codes: bool,
        rdhi: u32,
        rdlo: u32,
        rs: u32,
        rm: u32,
    ) {
        let rm_value = self.registers.register_at(rm as usize);
        let rs_value = self.registers.register_at(rs as usize);

        let mut result = match variant {
            ArmModeMultiplyLongVariant::Umull | ArmModeMultiplyLongVariant::Umlal => {
                (rm_value as u64).wrapping_mul(rs_value as u64)
            }
            ArmModeMultiplyLongVariant::Smull | ArmModeMultiplyLongVariant::Smlal => {
                ((rm_value as i32) as i64).wrapping_mul((rs_value as i32) as i64) as u64
            }
        };

        if matches!(
            variant,
            ArmModeMultiplyLongVariant::Umlal | ArmModeMultiplyLongVariant::Smlal
        ) {
            let accumulator = ((self.registers.register_at(rdhi as usize) as u64) << 32)
                | self.registers.register_at(rdlo as usize) as u64;
            result = result.wrapping_add(accumulator);
        }

        self.registers
            .set_register_at(rdlo as usize, result as u32);
        self.registers
            .set_register_at(rdhi as usize, (result >> 32) as u32);

        if set_condition_codes {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(63));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_flags() {
        let r = Arm7tdmi::add_inner_op(u32::MAX, 1);
        assert_eq!(r.result, 0);
        assert!(r.carry);
        assert!(r.zero);
        assert!(!r.overflow);

        let r = Arm7tdmi::add_inner_op(0x7FFF_FFFF, 1);
        assert_eq!(r.result, 0x8000_0000);
        assert!(!r.carry);
        assert!(r.overflow);
        assert!(r.sign);
    }

    #[test]
    fn sub_flags() {
        // C is the inverted borrow.
        let r = Arm7tdmi::sub_inner_op(5, 5);
        assert!(r.zero);
        assert!(r.carry);

        let r = Arm7tdmi::sub_inner_op(0, 1);
        assert_eq!(r.result, u32::MAX);
        assert!(!r.carry);
        assert!(r.sign);

        let r = Arm7tdmi::sub_inner_op(0x8000_0000, 1);
        assert!(r.overflow);
        assert!(!r.sign);
    }

    #[test]
    fn adc_chains_carry() {
        let r = Arm7tdmi::adc_inner_op(0xFFFF_FFFE, 1, true);
        assert_eq!(r.result, 0);
        assert!(r.carry);
        assert!(r.zero);

        let r = Arm7tdmi::adc_inner_op(1, 2, false);
        assert_eq!(r.result, 3);
        assert!(!r.carry);
    }
}
