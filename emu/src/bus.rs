//! Memory bus connecting the CPU to memory and hardware.
//!
//! Addresses dispatch on their top byte:
//!
//! | Region | Range                 | Handler                 |
//! |--------|-----------------------|-------------------------|
//! | `0x00` | BIOS (read-protected) | [`InternalMemory`]      |
//! | `0x02` | EWRAM (mirrored)      | [`InternalMemory`]      |
//! | `0x03` | IWRAM (mirrored)      | [`InternalMemory`]      |
//! | `0x04` | MMIO (1 KiB)          | the register dispatch   |
//! | `0x05` | Palette RAM           | [`Lcd`] memory          |
//! | `0x06` | VRAM (96 KiB)         | [`Lcd`] memory          |
//! | `0x07` | OAM                   | [`Lcd`] memory          |
//! | `0x08..=0x0D` | Cart ROM (three waitstate aliases) | [`InternalMemory`] |
//! | `0x0E` | Cart SRAM/Flash       | [`InternalMemory`]      |
//! | other  | open bus: reads 0, writes dropped          |
//!
//! Halfword and word accesses are force-aligned and little-endian; MMIO
//! accesses wider than a byte decompose into sequential byte operations.
//! Misaligned word reads rotate the addressed byte into bits 7-0, as the
//! ARM7TDMI does.
//!
//! The bus also owns DMA execution: a write that flips a channel's enable
//! bit latches its registers, and pending channels drain here, highest
//! priority first, before control returns to the CPU.
//!
//! [`InternalMemory`]: crate::cpu::hardware::internal_memory::InternalMemory
//! [`Lcd`]: crate::cpu::hardware::lcd::Lcd

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::dma::{AddressControl, Dma, Timing};
use crate::cpu::hardware::internal_memory::InternalMemory;
use crate::cpu::hardware::interrupt_control::InterruptControl;
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::lcd::Lcd;
use crate::cpu::hardware::sound::{Fifo, Sound};

#[derive(Default, Serialize, Deserialize)]
pub struct Bus {
    pub internal_memory: InternalMemory,
    pub lcd: Lcd,
    pub sound: Sound,
    pub dma: Dma,
    pub keypad: Keypad,
    pub interrupt_control: InterruptControl,

    cycles_count: u128,

    /// Last opcode fetched from BIOS, for read protection.
    last_bios_opcode: u32,
    /// PC of the current fetch, for BIOS read protection.
    current_pc: u32,

    /// Set while a DMA transfer drains so a transfer that pokes DMA
    /// registers cannot preempt itself.
    #[serde(skip)]
    dma_in_flight: bool,
}

#[derive(PartialEq, Eq, Clone, Copy)]
pub(crate) enum IrqType {
    VBlank,
    HBlank,
    VCount,
    Dma0,
    Dma1,
    Dma2,
    Dma3,
}

impl IrqType {
    /// Bit index inside the interrupt request register.
    const fn bit_index(self) -> u8 {
        match self {
            Self::VBlank => 0,
            Self::HBlank => 1,
            Self::VCount => 2,
            Self::Dma0 => 8,
            Self::Dma1 => 9,
            Self::Dma2 => 10,
            Self::Dma3 => 11,
        }
    }

    const fn dma(channel_idx: usize) -> Self {
        match channel_idx {
            0 => Self::Dma0,
            1 => Self::Dma1,
            2 => Self::Dma2,
            _ => Self::Dma3,
        }
    }
}

impl Bus {
    #[must_use]
    pub fn with_memory(memory: InternalMemory) -> Self {
        Self {
            internal_memory: memory,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn read_byte(&self, address: u32) -> u8 {
        match address >> 24 {
            0x00 => {
                if self.current_pc > 0x3FFF {
                    // BIOS is only readable while executing inside it;
                    // outside, reads return the last fetched BIOS opcode.
                    self.last_bios_opcode.get_byte((address & 0b11) as u8)
                } else {
                    self.internal_memory.read_at(address)
                }
            }
            0x02 | 0x03 | 0x08..=0x0D | 0x0E => self.internal_memory.read_at(address),
            0x04 => self.io_read(address),
            0x05 => self.lcd.memory.palette_ram[(address & 0x3FF) as usize],
            0x06 => self.lcd.memory.video_ram[Lcd::vram_offset(address)],
            0x07 => self.lcd.memory.obj_attributes[(address & 0x3FF) as usize],
            _ => 0,
        }
    }

    fn write_raw(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x00 | 0x02 | 0x03 | 0x08..=0x0D | 0x0E => {
                self.internal_memory.write_at(address, value);
            }
            0x04 => self.io_write_byte(address, value),
            0x05 => self.lcd.memory.palette_ram[(address & 0x3FF) as usize] = value,
            0x06 => self.lcd.memory.video_ram[Lcd::vram_offset(address)] = value,
            0x07 => self.lcd.memory.obj_attributes[(address & 0x3FF) as usize] = value,
            _ => {
                tracing::debug!("write to unmapped address 0x{address:08X} dropped");
            }
        }
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        match address >> 24 {
            // OAM ignores byte writes.
            0x07 => {}
            // Byte writes to palette RAM and VRAM are duplicated into both
            // bytes of the addressed halfword.
            0x05 | 0x06 => {
                let aligned = address & !1;
                self.write_raw(aligned, value);
                self.write_raw(aligned + 1, value);
            }
            _ => self.write_raw(address, value),
        }
    }

    #[must_use]
    pub fn read_half_word(&self, address: u32) -> u16 {
        let aligned = address & !1;
        u16::from(self.read_byte(aligned)) | (u16::from(self.read_byte(aligned + 1)) << 8)
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) {
        let aligned = address & !1;
        self.write_raw(aligned, value.get_byte(0));
        self.write_raw(aligned + 1, value.get_byte(1));
    }

    /// A misaligned word read rotates the value so the addressed byte lands
    /// in bits 7-0.
    #[must_use]
    pub fn read_word(&self, address: u32) -> u32 {
        let aligned = address & !0b11;
        let value = u32::from(self.read_byte(aligned))
            | (u32::from(self.read_byte(aligned + 1)) << 8)
            | (u32::from(self.read_byte(aligned + 2)) << 16)
            | (u32::from(self.read_byte(aligned + 3)) << 24);

        value.rotate_right(8 * (address & 0b11))
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        let aligned = address & !0b11;
        for byte_nth in 0..4u8 {
            self.write_raw(aligned + u32::from(byte_nth), value.get_byte(byte_nth));
        }
    }

    fn io_read(&self, address: u32) -> u8 {
        let offset = address & 0x3FF;
        match offset {
            0x000..=0x057 => self.read_lcd_raw(offset),
            0x060..=0x0AF => self.read_sound_raw(offset),
            0x0B0..=0x0DF => self.read_dma_raw(offset),
            0x130 => self.keypad.key_input.get_byte(0),
            0x131 => self.keypad.key_input.get_byte(1),
            0x132 => self.keypad.key_interrupt_control.get_byte(0),
            0x133 => self.keypad.key_interrupt_control.get_byte(1),
            0x200 => self.interrupt_control.interrupt_enable.get_byte(0),
            0x201 => self.interrupt_control.interrupt_enable.get_byte(1),
            0x202 => self.interrupt_control.interrupt_request.get_byte(0),
            0x203 => self.interrupt_control.interrupt_request.get_byte(1),
            0x204 => self.interrupt_control.wait_state_control.get_byte(0),
            0x205 => self.interrupt_control.wait_state_control.get_byte(1),
            0x208 => self.interrupt_control.interrupt_master_enable.get_byte(0),
            0x209 => self.interrupt_control.interrupt_master_enable.get_byte(1),
            0x300 => self.interrupt_control.post_boot_flag.get_byte(0),
            _ => 0,
        }
    }

    fn read_lcd_raw(&self, offset: u32) -> u8 {
        let registers = &self.lcd.registers;
        match offset {
            0x000 => registers.dispcnt.get_byte(0),
            0x001 => registers.dispcnt.get_byte(1),
            0x002 => registers.green_swap.get_byte(0),
            0x003 => registers.green_swap.get_byte(1),
            0x004 => registers.dispstat.get_byte(0),
            0x005 => registers.dispstat.get_byte(1),
            0x006 => registers.vcount.get_byte(0),
            0x007 => registers.vcount.get_byte(1),
            0x008 => registers.bg0cnt.get_byte(0),
            0x009 => registers.bg0cnt.get_byte(1),
            0x00A => registers.bg1cnt.get_byte(0),
            0x00B => registers.bg1cnt.get_byte(1),
            0x00C => registers.bg2cnt.get_byte(0),
            0x00D => registers.bg2cnt.get_byte(1),
            0x00E => registers.bg3cnt.get_byte(0),
            0x00F => registers.bg3cnt.get_byte(1),
            0x048 => registers.winin.get_byte(0),
            0x049 => registers.winin.get_byte(1),
            0x04A => registers.winout.get_byte(0),
            0x04B => registers.winout.get_byte(1),
            0x050 => registers.bldcnt.get_byte(0),
            0x051 => registers.bldcnt.get_byte(1),
            0x052 => registers.bldalpha.get_byte(0),
            0x053 => registers.bldalpha.get_byte(1),
            // The scroll, affine, window and mosaic registers are
            // write-only.
            _ => 0,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn write_lcd_raw(&mut self, offset: u32, value: u8) {
        // DISPSTAT keeps its status bits; VCOUNT is read-only.
        if offset == 0x004 || offset == 0x005 {
            self.lcd.write_dispstat_byte((offset - 0x004) as u8, value);
            return;
        }
        if offset == 0x006 || offset == 0x007 {
            return;
        }

        let registers = &mut self.lcd.registers;
        match offset {
            0x000 => registers.dispcnt.set_byte(0, value),
            0x001 => registers.dispcnt.set_byte(1, value),
            0x002 => registers.green_swap.set_byte(0, value),
            0x003 => registers.green_swap.set_byte(1, value),
            0x008 => registers.bg0cnt.set_byte(0, value),
            0x009 => registers.bg0cnt.set_byte(1, value),
            0x00A => registers.bg1cnt.set_byte(0, value),
            0x00B => registers.bg1cnt.set_byte(1, value),
            0x00C => registers.bg2cnt.set_byte(0, value),
            0x00D => registers.bg2cnt.set_byte(1, value),
            0x00E => registers.bg3cnt.set_byte(0, value),
            0x00F => registers.bg3cnt.set_byte(1, value),
            0x010 => registers.bg0hofs.set_byte(0, value),
            0x011 => registers.bg0hofs.set_byte(1, value),
            0x012 => registers.bg0vofs.set_byte(0, value),
            0x013 => registers.bg0vofs.set_byte(1, value),
            0x014 => registers.bg1hofs.set_byte(0, value),
            0x015 => registers.bg1hofs.set_byte(1, value),
            0x016 => registers.bg1vofs.set_byte(0, value),
            0x017 => registers.bg1vofs.set_byte(1, value),
            0x018 => registers.bg2hofs.set_byte(0, value),
            0x019 => registers.bg2hofs.set_byte(1, value),
            0x01A => registers.bg2vofs.set_byte(0, value),
            0x01B => registers.bg2vofs.set_byte(1, value),
            0x01C => registers.bg3hofs.set_byte(0, value),
            0x01D => registers.bg3hofs.set_byte(1, value),
            0x01E => registers.bg3vofs.set_byte(0, value),
            0x01F => registers.bg3vofs.set_byte(1, value),
            0x020 => registers.bg2pa.set_byte(0, value),
            0x021 => registers.bg2pa.set_byte(1, value),
            0x022 => registers.bg2pb.set_byte(0, value),
            0x023 => registers.bg2pb.set_byte(1, value),
            0x024 => registers.bg2pc.set_byte(0, value),
            0x025 => registers.bg2pc.set_byte(1, value),
            0x026 => registers.bg2pd.set_byte(0, value),
            0x027 => registers.bg2pd.set_byte(1, value),
            0x028 => registers.bg2x.set_byte(0, value),
            0x029 => registers.bg2x.set_byte(1, value),
            0x02A => registers.bg2x.set_byte(2, value),
            0x02B => registers.bg2x.set_byte(3, value),
            0x02C => registers.bg2y.set_byte(0, value),
            0x02D => registers.bg2y.set_byte(1, value),
            0x02E => registers.bg2y.set_byte(2, value),
            0x02F => registers.bg2y.set_byte(3, value),
            0x030 => registers.bg3pa.set_byte(0, value),
            0x031 => registers.bg3pa.set_byte(1, value),
            0x032 => registers.bg3pb.set_byte(0, value),
            0x033 => registers.bg3pb.set_byte(1, value),
            0x034 => registers.bg3pc.set_byte(0, value),
            0x035 => registers.bg3pc.set_byte(1, value),
            0x036 => registers.bg3pd.set_byte(0, value),
            0x037 => registers.bg3pd.set_byte(1, value),
            0x038 => registers.bg3x.set_byte(0, value),
            0x039 => registers.bg3x.set_byte(1, value),
            0x03A => registers.bg3x.set_byte(2, value),
            0x03B => registers.bg3x.set_byte(3, value),
            0x03C => registers.bg3y.set_byte(0, value),
            0x03D => registers.bg3y.set_byte(1, value),
            0x03E => registers.bg3y.set_byte(2, value),
            0x03F => registers.bg3y.set_byte(3, value),
            0x040 => registers.win0h.set_byte(0, value),
            0x041 => registers.win0h.set_byte(1, value),
            0x042 => registers.win1h.set_byte(0, value),
            0x043 => registers.win1h.set_byte(1, value),
            0x044 => registers.win0v.set_byte(0, value),
            0x045 => registers.win0v.set_byte(1, value),
            0x046 => registers.win1v.set_byte(0, value),
            0x047 => registers.win1v.set_byte(1, value),
            0x048 => registers.winin.set_byte(0, value),
            0x049 => registers.winin.set_byte(1, value),
            0x04A => registers.winout.set_byte(0, value),
            0x04B => registers.winout.set_byte(1, value),
            0x04C => registers.mosaic.set_byte(0, value),
            0x04D => registers.mosaic.set_byte(1, value),
            0x050 => registers.bldcnt.set_byte(0, value),
            0x051 => registers.bldcnt.set_byte(1, value),
            0x052 => registers.bldalpha.set_byte(0, value),
            0x053 => registers.bldalpha.set_byte(1, value),
            0x054 => registers.bldy.set_byte(0, value),
            0x055 => registers.bldy.set_byte(1, value),
            _ => {
                tracing::debug!("write to unused LCD register 0x{offset:03X} dropped");
            }
        }
    }

    fn read_sound_raw(&self, offset: u32) -> u8 {
        match offset {
            0x080 => self.sound.control_stereo_volume.get_byte(0),
            0x081 => self.sound.control_stereo_volume.get_byte(1),
            0x082 => self.sound.control_mixing_dma.get_byte(0),
            0x083 => self.sound.control_mixing_dma.get_byte(1),
            0x084 => self.sound.control_sound_on_off.get_byte(0),
            0x085 => self.sound.control_sound_on_off.get_byte(1),
            // The FIFOs are write-only; everything else of the APU lives
            // outside the core.
            _ => 0,
        }
    }

    fn write_sound_raw(&mut self, offset: u32, value: u8) {
        match offset {
            0x080 => self.sound.control_stereo_volume.set_byte(0, value),
            0x081 => self.sound.control_stereo_volume.set_byte(1, value),
            0x082 => self.sound.control_mixing_dma.set_byte(0, value),
            0x083 => self.sound.control_mixing_dma.set_byte(1, value),
            0x084 => self.sound.control_sound_on_off.set_byte(0, value),
            0x085 => self.sound.control_sound_on_off.set_byte(1, value),
            0x0A0 => self.sound.fifo_a.set_byte(0, value),
            0x0A1 => self.sound.fifo_a.set_byte(1, value),
            0x0A2 => self.sound.fifo_a.set_byte(2, value),
            0x0A3 => self.sound.fifo_a.set_byte(3, value),
            0x0A4 => self.sound.fifo_b.set_byte(0, value),
            0x0A5 => self.sound.fifo_b.set_byte(1, value),
            0x0A6 => self.sound.fifo_b.set_byte(2, value),
            0x0A7 => self.sound.fifo_b.set_byte(3, value),
            _ => {
                tracing::debug!("write to unused sound register 0x{offset:03X} dropped");
            }
        }
    }

    fn read_dma_raw(&self, offset: u32) -> u8 {
        let channel_idx = ((offset - 0x0B0) / 12) as usize;
        let reg_offset = (offset - 0x0B0) % 12;
        let channel = &self.dma.channels[channel_idx];
        match reg_offset {
            0..=3 => channel.source_address.get_byte(reg_offset as u8),
            4..=7 => channel.destination_address.get_byte((reg_offset - 4) as u8),
            8 => channel.word_count.get_byte(0),
            9 => channel.word_count.get_byte(1),
            10 => channel.control.get_byte(0),
            11 => channel.control.get_byte(1),
            _ => unreachable!(),
        }
    }

    fn write_dma_raw(&mut self, offset: u32, value: u8) {
        let channel_idx = ((offset - 0x0B0) / 12) as usize;
        let reg_offset = (offset - 0x0B0) % 12;
        let channel = &mut self.dma.channels[channel_idx];
        match reg_offset {
            0..=3 => channel.source_address.set_byte(reg_offset as u8, value),
            4..=7 => channel
                .destination_address
                .set_byte((reg_offset - 4) as u8, value),
            8 => channel.word_count.set_byte(0, value),
            9 => channel.word_count.set_byte(1, value),
            10 => channel.control.set_byte(0, value),
            11 => {
                let was_enabled = channel.enabled();
                channel.control.set_byte(1, value);
                // An enable rising edge latches source, destination and
                // count, and schedules the channel per its timing field.
                if !was_enabled && channel.enabled() {
                    self.dma.latch(channel_idx);
                }
            }
            _ => unreachable!(),
        }

        self.service_dma();
    }

    fn io_write_byte(&mut self, address: u32, value: u8) {
        let offset = address & 0x3FF;
        match offset {
            0x000..=0x057 => self.write_lcd_raw(offset, value),
            0x060..=0x0AF => self.write_sound_raw(offset, value),
            0x0B0..=0x0DF => self.write_dma_raw(offset, value),
            // KEYINPUT is read-only; the front end owns it.
            0x130 | 0x131 => {}
            0x132 => self.keypad.key_interrupt_control.set_byte(0, value),
            0x133 => self.keypad.key_interrupt_control.set_byte(1, value),
            0x200 => self.interrupt_control.interrupt_enable.set_byte(0, value),
            0x201 => self.interrupt_control.interrupt_enable.set_byte(1, value),
            // Writing 1 to a request bit acknowledges (clears) it.
            0x202 => self.interrupt_control.interrupt_request &= !(value as u16),
            0x203 => self.interrupt_control.interrupt_request &= !((value as u16) << 8),
            0x204 => self.interrupt_control.wait_state_control.set_byte(0, value),
            0x205 => self.interrupt_control.wait_state_control.set_byte(1, value),
            0x208 => self
                .interrupt_control
                .interrupt_master_enable
                .set_byte(0, value),
            0x209 => self
                .interrupt_control
                .interrupt_master_enable
                .set_byte(1, value),
            0x300 => self.interrupt_control.post_boot_flag.set_byte(0, value),
            _ => {
                tracing::debug!("write to unmapped I/O 0x{offset:03X} dropped");
            }
        }
    }

    /// Drains pending DMA channels, highest priority first. A channel that
    /// becomes pending while another runs waits its turn: transfers are not
    /// preempted.
    fn service_dma(&mut self) {
        if self.dma_in_flight {
            return;
        }
        self.dma_in_flight = true;

        while let Some(channel_idx) = self.dma.next_pending() {
            self.dma.channels[channel_idx].pending = false;
            self.run_dma_channel(channel_idx);
        }

        self.dma_in_flight = false;
    }

    fn run_dma_channel(&mut self, channel_idx: usize) {
        let is_fifo = (channel_idx == 1 || channel_idx == 2)
            && self.dma.channels[channel_idx].timing() == Timing::Special;

        if is_fifo {
            // FIFO mode moves four words to the fixed FIFO address; the
            // destination control and word count are ignored.
            for _ in 0..4 {
                let source = self.dma.channels[channel_idx].internal_source & !0b11;
                let destination = self.dma.channels[channel_idx].internal_destination & !0b11;
                let value = self.read_word(source);
                self.write_word(destination, value);

                let channel = &mut self.dma.channels[channel_idx];
                channel.internal_source =
                    Self::advance_address(channel.internal_source, channel.source_control(), 4);
            }
        } else {
            let unit: u32 = if self.dma.channels[channel_idx].is_word_transfer() {
                4
            } else {
                2
            };

            while self.dma.channels[channel_idx].internal_count > 0 {
                let source = self.dma.channels[channel_idx].internal_source & !(unit - 1);
                let destination =
                    self.dma.channels[channel_idx].internal_destination & !(unit - 1);

                if unit == 4 {
                    let value = self.read_word(source);
                    self.write_word(destination, value);
                } else {
                    let value = self.read_half_word(source);
                    self.write_half_word(destination, value);
                }

                let channel = &mut self.dma.channels[channel_idx];
                channel.internal_source =
                    Self::advance_address(channel.internal_source, channel.source_control(), unit);
                channel.internal_destination = Self::advance_address(
                    channel.internal_destination,
                    channel.destination_control(),
                    unit,
                );
                channel.internal_count -= 1;
            }

            if self.dma.channels[channel_idx].repeat()
                && self.dma.channels[channel_idx].timing() != Timing::Immediate
            {
                self.dma.reload_for_repeat(channel_idx);
            } else {
                self.dma.channels[channel_idx].set_enabled(false);
            }
        }

        if self.dma.channels[channel_idx].irq_on_end() {
            self.request_interrupt(IrqType::dma(channel_idx));
        }
    }

    const fn advance_address(address: u32, control: AddressControl, unit: u32) -> u32 {
        match control {
            AddressControl::Increment | AddressControl::IncrementReload => {
                address.wrapping_add(unit)
            }
            AddressControl::Decrement => address.wrapping_sub(unit),
            AddressControl::Fixed => address,
        }
    }

    /// Front-end hook: the APU drained a FIFO and the matching special-mode
    /// channel should refill it.
    pub fn notify_fifo_drain(&mut self, fifo: Fifo) {
        for channel_idx in 1..=2 {
            let channel = &self.dma.channels[channel_idx];
            if channel.enabled()
                && channel.timing() == Timing::Special
                && (channel.internal_destination & !0b11) == fifo.address()
            {
                self.dma.on_fifo_refill(channel_idx);
            }
        }
        self.service_dma();
    }

    /// Advances the peripherals by one CPU cycle. Returns `true` when a
    /// frame just completed (VBlank entry).
    pub(crate) fn step(&mut self) -> bool {
        self.cycles_count += 1;

        // A dot takes four CPU cycles.
        if self.cycles_count % 4 != 0 {
            return false;
        }

        let output = self.lcd.step();

        if output.request_hblank_irq {
            self.request_interrupt(IrqType::HBlank);
        }
        if output.request_vblank_irq {
            self.request_interrupt(IrqType::VBlank);
        }
        if output.request_vcount_irq {
            self.request_interrupt(IrqType::VCount);
        }

        if output.hblank_entered {
            self.dma.on_hblank(self.lcd.registers.vcount);
        }
        if output.vblank_entered {
            self.dma.on_vblank();
        }
        self.service_dma();

        output.frame_ready
    }

    pub(crate) fn request_interrupt(&mut self, irq_type: IrqType) {
        self.interrupt_control
            .interrupt_request
            .set_bit(irq_type.bit_index(), true);
    }

    #[must_use]
    pub fn is_irq_pending(&self) -> bool {
        self.interrupt_control.pending()
    }

    pub(crate) const fn set_current_pc(&mut self, pc: u32) {
        self.current_pc = pc;
    }

    pub(crate) const fn set_last_bios_opcode(&mut self, opcode: u32) {
        self.last_bios_opcode = opcode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ram_byte_roundtrip() {
        let mut bus = Bus::default();
        for address in [0x0200_0000, 0x0200_1234, 0x0300_0000, 0x0300_7FFF] {
            bus.write_byte(address, 0xAB);
            assert_eq!(bus.read_byte(address), 0xAB);
        }
    }

    #[test]
    fn ram_is_little_endian() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0200_0010, 0x1122);
        assert_eq!(bus.read_byte(0x0200_0010), 0x22);
        assert_eq!(bus.read_byte(0x0200_0011), 0x11);
        assert_eq!(
            bus.read_half_word(0x0200_0010),
            (u16::from(bus.read_byte(0x0200_0011)) << 8) | u16::from(bus.read_byte(0x0200_0010))
        );
    }

    #[test]
    fn word_roundtrip() {
        let mut bus = Bus::default();
        bus.write_word(0x0300_0100, 0xDEAD_BEEF);
        assert_eq!(bus.read_word(0x0300_0100), 0xDEAD_BEEF);
    }

    #[test]
    fn misaligned_word_read_rotates() {
        let mut bus = Bus::default();
        bus.write_word(0x0300_0000, 0x1122_3344);
        assert_eq!(bus.read_word(0x0300_0001), 0x4411_2233);
        assert_eq!(bus.read_word(0x0300_0002), 0x3344_1122);
        assert_eq!(bus.read_word(0x0300_0003), 0x2233_4411);
    }

    #[test]
    fn unmapped_reads_zero_writes_dropped() {
        let mut bus = Bus::default();
        bus.write_byte(0x0100_0000, 0xFF);
        assert_eq!(bus.read_byte(0x0100_0000), 0);
        bus.write_byte(0xF000_0000, 0xFF);
        assert_eq!(bus.read_byte(0xF000_0000), 0);
    }

    #[test]
    fn oam_ignores_byte_writes() {
        let mut bus = Bus::default();
        bus.write_byte(0x0700_0000, 0x55);
        assert_eq!(bus.read_byte(0x0700_0000), 0);
        bus.write_half_word(0x0700_0000, 0x1234);
        assert_eq!(bus.read_half_word(0x0700_0000), 0x1234);
    }

    #[test]
    fn palette_byte_writes_duplicate() {
        let mut bus = Bus::default();
        bus.write_byte(0x0500_0003, 0x7F);
        assert_eq!(bus.read_half_word(0x0500_0002), 0x7F7F);
    }

    #[test]
    fn vram_mirrors_and_duplicates() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0601_8000, 0xBEEF);
        // 0x18000 mirrors down to 0x10000.
        assert_eq!(bus.read_half_word(0x0601_0000), 0xBEEF);

        bus.write_byte(0x0600_0000, 0x42);
        assert_eq!(bus.read_half_word(0x0600_0000), 0x4242);
    }

    #[test]
    fn mmio_register_byte_view() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0400_0000, 0x1234);
        assert_eq!(bus.read_byte(0x0400_0000), 0x34);
        assert_eq!(bus.read_byte(0x0400_0001), 0x12);
        assert_eq!(bus.lcd.registers.dispcnt, 0x1234);
    }

    #[test]
    fn vcount_is_read_only() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0400_0006, 0xFFFF);
        assert_eq!(bus.read_half_word(0x0400_0006), 0);
    }

    #[test]
    fn interrupt_ack_clears_bits() {
        let mut bus = Bus::default();
        bus.request_interrupt(IrqType::VBlank);
        bus.request_interrupt(IrqType::Dma0);
        assert_eq!(bus.read_half_word(0x0400_0202), 0x0101);

        bus.write_half_word(0x0400_0202, 0x0001);
        assert_eq!(bus.read_half_word(0x0400_0202), 0x0100);
    }

    #[test]
    fn keyinput_reads_idle_and_rejects_bus_writes() {
        let mut bus = Bus::default();
        assert_eq!(bus.read_half_word(0x0400_0130), 0x03FF);
        bus.write_half_word(0x0400_0130, 0);
        assert_eq!(bus.read_half_word(0x0400_0130), 0x03FF);
    }

    #[test]
    fn dma_immediate_transfer_runs_on_enable() {
        let mut bus = Bus::default();
        for i in 0..16u32 {
            bus.write_byte(0x0200_0000 + i, i as u8);
        }

        bus.write_word(0x0400_00B0, 0x0200_0000); // DMA0SAD
        bus.write_word(0x0400_00B4, 0x0300_0000); // DMA0DAD
        bus.write_half_word(0x0400_00B8, 4); // count
        // enable | word transfer, immediate timing
        bus.write_half_word(0x0400_00BA, (1 << 15) | (1 << 10));

        for i in 0..16u32 {
            assert_eq!(bus.read_byte(0x0300_0000 + i), i as u8);
        }
        assert!(!bus.dma.channels[0].enabled());
        // No IRQ requested without irq_on_end.
        assert_eq!(bus.read_half_word(0x0400_0202) & (1 << 8), 0);
    }

    #[test]
    fn dma_immediate_raises_irq_when_requested() {
        let mut bus = Bus::default();
        bus.write_word(0x0400_00B0, 0x0200_0000);
        bus.write_word(0x0400_00B4, 0x0300_0000);
        bus.write_half_word(0x0400_00B8, 1);
        bus.write_half_word(0x0400_00BA, (1 << 15) | (1 << 14));
        assert_ne!(bus.read_half_word(0x0400_0202) & (1 << 8), 0);
    }

    #[test]
    fn dma_decrement_and_fixed_addressing() {
        let mut bus = Bus::default();
        bus.write_word(0x0200_0000, 0x1111_1111);
        bus.write_word(0x0200_0004, 0x2222_2222);

        // Fixed source, decrementing destination.
        bus.write_word(0x0400_00B0, 0x0200_0000);
        bus.write_word(0x0400_00B4, 0x0300_0004);
        bus.write_half_word(0x0400_00B8, 2);
        bus.write_half_word(
            0x0400_00BA,
            (1 << 15) | (1 << 10) | (0b10 << 7) | (0b01 << 5),
        );

        assert_eq!(bus.read_word(0x0300_0004), 0x1111_1111);
        assert_eq!(bus.read_word(0x0300_0000), 0x1111_1111);
    }

    #[test]
    fn dma_vblank_timing_waits_for_vblank() {
        let mut bus = Bus::default();
        bus.write_word(0x0200_0000, 0xCAFE_F00D);

        bus.write_word(0x0400_00B0, 0x0200_0000);
        bus.write_word(0x0400_00B4, 0x0300_0000);
        bus.write_half_word(0x0400_00B8, 1);
        // enable | word | vblank timing
        bus.write_half_word(0x0400_00BA, (1 << 15) | (1 << 10) | (0b01 << 12));

        // Nothing moved yet.
        assert_eq!(bus.read_word(0x0300_0000), 0);

        // Step to VBlank entry (160 scanlines of 308 dots, 4 cycles each).
        for _ in 0..(308 * 160 * 4) {
            bus.step();
        }
        assert_eq!(bus.read_word(0x0300_0000), 0xCAFE_F00D);
    }

    #[test]
    fn fifo_dma_moves_four_words_and_stays_enabled() {
        let mut bus = Bus::default();
        for i in 0..4u32 {
            bus.write_word(0x0200_0000 + i * 4, 0x1010_1010 + i);
        }

        bus.write_word(0x0400_00BC, 0x0200_0000); // DMA1SAD
        bus.write_word(0x0400_00C0, 0x0400_00A0); // DMA1DAD = FIFO_A
        // enable | special timing | repeat | word
        bus.write_half_word(
            0x0400_00C6,
            (1 << 15) | (0b11 << 12) | (1 << 9) | (1 << 10),
        );

        bus.notify_fifo_drain(Fifo::A);
        assert!(bus.dma.channels[1].enabled());
        // The last word written is visible in the FIFO latch.
        assert_eq!(bus.sound.fifo_a, 0x1010_1013);
        // Source advanced by 16 bytes.
        assert_eq!(bus.dma.channels[1].internal_source, 0x0200_0010);
    }
}
