//! Raw byte storage for BIOS, work RAM, cartridge ROM and save memory.
//!
//! | Region | Range                   | Size   | Mirror mask |
//! |--------|-------------------------|--------|-------------|
//! | BIOS   | `0x0000_0000-0000_3FFF` | 16 KiB | `0x3FFF`    |
//! | EWRAM  | `0x0200_0000-0203_FFFF` | 256 KiB| `0x3_FFFF`  |
//! | IWRAM  | `0x0300_0000-0300_7FFF` | 32 KiB | `0x7FFF`    |
//! | ROM    | `0x0800_0000-0DFF_FFFF` | 32 MiB | three waitstate aliases |
//! | SRAM   | `0x0E00_0000-0E00_FFFF` | 64 KiB | `0xFFFF`    |
//!
//! Reads past the end of the loaded ROM return an address-derived open-bus
//! pattern: the cartridge bus multiplexes data and the low address lines, so
//! an unanswered read leaves `(addr >> 1) & 0xFFFF` on the bus.
//!
//! Save memory is either plain SRAM or a command-driven flash chip
//! ([`FlashState`]); GPIO registers for RTC carts sit at ROM offsets
//! `0xC4..=0xC9` and pass through to latches here.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cartridge::BackupKind;

/// Flash command state machine. Commands are sequences of magic writes to
/// offsets 0x5555 and 0x2AAA.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashState {
    #[default]
    Ready,
    /// Received 0xAA at 0x5555.
    Command1,
    /// Received 0x55 at 0x2AAA, waiting for the command byte.
    Command2,
    /// Reads return the manufacturer/device ID.
    IdMode,
    /// Received 0x80, waiting for the erase sequence.
    EraseCommand,
    EraseCommand1,
    EraseCommand2,
    /// Waiting for the bank number (128 KiB parts only).
    BankSelect,
    /// Next write programs a byte.
    WriteCommand,
}

#[derive(Serialize, Deserialize)]
pub struct InternalMemory {
    bios_system_rom: Vec<u8>,
    working_ram: Vec<u8>,
    working_iram: Vec<u8>,
    pub rom: Vec<u8>,
    sram: Vec<u8>,

    backup_kind: BackupKind,
    flash_state: FlashState,
    flash_bank: u8,

    /// GPIO latches at ROM offsets 0xC4 (data), 0xC6 (direction) and
    /// 0xC8 (control).
    gpio_data: u16,
    gpio_direction: u16,
    gpio_control: u16,
}

impl InternalMemory {
    #[must_use]
    pub fn new(bios: &[u8], rom: &[u8], backup_kind: BackupKind) -> Self {
        let sram_size = match backup_kind {
            BackupKind::Flash128K => 0x0002_0000,
            _ => 0x0001_0000,
        };

        Self {
            bios_system_rom: bios.to_vec(),
            working_ram: vec![0; 0x0004_0000],
            working_iram: vec![0; 0x0000_8000],
            rom: rom.to_vec(),
            // Erased state is all ones.
            sram: vec![0xFF; sram_size],
            backup_kind,
            flash_state: FlashState::Ready,
            flash_bank: 0,
            gpio_data: 0,
            gpio_direction: 0,
            gpio_control: 0,
        }
    }

    /// Zeroes the RAM regions; ROM, BIOS and save memory survive a reset.
    pub fn reset(&mut self) {
        self.working_ram.fill(0);
        self.working_iram.fill(0);
        self.flash_state = FlashState::Ready;
        self.flash_bank = 0;
    }

    #[must_use]
    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    pub fn load_sram(&mut self, data: &[u8]) {
        let len = data.len().min(self.sram.len());
        self.sram[..len].copy_from_slice(&data[..len]);
    }

    fn read_rom(&self, offset: u32) -> u8 {
        if (0xC4..=0xC9).contains(&offset) {
            // GPIO is only readable when the control latch allows it.
            if self.gpio_control & 1 == 0 {
                return 0;
            }
            return match offset {
                0xC4 => self.gpio_data.get_byte(0),
                0xC5 => self.gpio_data.get_byte(1),
                0xC6 => self.gpio_direction.get_byte(0),
                0xC7 => self.gpio_direction.get_byte(1),
                0xC8 => self.gpio_control.get_byte(0),
                0xC9 => self.gpio_control.get_byte(1),
                _ => unreachable!(),
            };
        }

        if (offset as usize) < self.rom.len() {
            self.rom[offset as usize]
        } else {
            (((offset >> 1) & 0xFFFF) as u16).get_byte((offset & 1) as u8)
        }
    }

    fn write_rom(&mut self, offset: u32, value: u8) {
        match offset {
            0xC4 => self.gpio_data.set_byte(0, value),
            0xC5 => self.gpio_data.set_byte(1, value),
            0xC6 => self.gpio_direction.set_byte(0, value),
            0xC7 => self.gpio_direction.set_byte(1, value),
            0xC8 => self.gpio_control.set_byte(0, value),
            0xC9 => self.gpio_control.set_byte(1, value),
            _ => {
                tracing::debug!("write to ROM offset 0x{offset:07X} ignored");
            }
        }
    }

    fn read_save(&self, offset: u32) -> u8 {
        if self.backup_kind == BackupKind::Sram || self.backup_kind == BackupKind::Eeprom {
            return self.sram[(offset & 0xFFFF) as usize];
        }

        if self.flash_state == FlashState::IdMode {
            // Panasonic MN63F805MNP for 64K, Sanyo LE26FV10N1TS for 128K.
            return match (offset & 0xFFFF, self.backup_kind) {
                (0, BackupKind::Flash64K) => 0x32,
                (1, BackupKind::Flash64K) => 0x1B,
                (0, BackupKind::Flash128K) => 0x62,
                (1, BackupKind::Flash128K) => 0x13,
                _ => 0xFF,
            };
        }

        let real_offset = self.flash_bank as usize * 0x10000 + (offset & 0xFFFF) as usize;
        self.sram.get(real_offset).copied().unwrap_or(0xFF)
    }

    fn write_save(&mut self, offset: u32, value: u8) {
        let offset = offset & 0xFFFF;

        if self.backup_kind == BackupKind::Sram || self.backup_kind == BackupKind::Eeprom {
            self.sram[offset as usize] = value;
            return;
        }

        match self.flash_state {
            FlashState::Ready => {
                if offset == 0x5555 && value == 0xAA {
                    self.flash_state = FlashState::Command1;
                }
            }
            FlashState::Command1 => {
                self.flash_state = if offset == 0x2AAA && value == 0x55 {
                    FlashState::Command2
                } else {
                    FlashState::Ready
                };
            }
            FlashState::Command2 => {
                self.flash_state = if offset == 0x5555 {
                    match value {
                        0x90 => FlashState::IdMode,
                        0x80 => FlashState::EraseCommand,
                        0xA0 => FlashState::WriteCommand,
                        0xB0 => FlashState::BankSelect,
                        _ => FlashState::Ready,
                    }
                } else {
                    FlashState::Ready
                };
            }
            FlashState::IdMode => {
                if value == 0xF0 {
                    self.flash_state = FlashState::Ready;
                } else if offset == 0x5555 && value == 0xAA {
                    self.flash_state = FlashState::Command1;
                }
            }
            FlashState::EraseCommand => {
                self.flash_state = if offset == 0x5555 && value == 0xAA {
                    FlashState::EraseCommand1
                } else {
                    FlashState::Ready
                };
            }
            FlashState::EraseCommand1 => {
                self.flash_state = if offset == 0x2AAA && value == 0x55 {
                    FlashState::EraseCommand2
                } else {
                    FlashState::Ready
                };
            }
            FlashState::EraseCommand2 => {
                if offset == 0x5555 && value == 0x10 {
                    self.sram.fill(0xFF);
                } else if value == 0x30 {
                    // 4 KiB sector erase.
                    let base = self.flash_bank as usize * 0x10000 + (offset & 0xF000) as usize;
                    let end = (base + 0x1000).min(self.sram.len());
                    self.sram[base..end].fill(0xFF);
                }
                self.flash_state = FlashState::Ready;
            }
            FlashState::BankSelect => {
                if offset == 0 && self.backup_kind == BackupKind::Flash128K {
                    self.flash_bank = value & 1;
                }
                self.flash_state = FlashState::Ready;
            }
            FlashState::WriteCommand => {
                let real_offset = self.flash_bank as usize * 0x10000 + offset as usize;
                if real_offset < self.sram.len() {
                    // Flash programming can only clear bits.
                    self.sram[real_offset] &= value;
                }
                self.flash_state = FlashState::Ready;
            }
        }
    }
}

impl Default for InternalMemory {
    /// Properly-sized empty regions; used by the tests.
    fn default() -> Self {
        Self::new(&[0; 0x4000], &[], BackupKind::Sram)
    }
}

impl InternalMemory {
    #[must_use]
    pub fn read_at(&self, address: u32) -> u8 {
        match address >> 24 {
            0x00 => self.bios_system_rom[(address & 0x3FFF) as usize],
            0x02 => self.working_ram[(address & 0x3_FFFF) as usize],
            0x03 => self.working_iram[(address & 0x7FFF) as usize],
            0x08..=0x0D => self.read_rom(address & 0x01FF_FFFF),
            0x0E => self.read_save(address),
            _ => unreachable!("internal memory read at 0x{address:08X}"),
        }
    }

    pub fn write_at(&mut self, address: u32, value: u8) {
        match address >> 24 {
            // BIOS is read-only.
            0x00 => {}
            0x02 => self.working_ram[(address & 0x3_FFFF) as usize] = value,
            0x03 => self.working_iram[(address & 0x7FFF) as usize] = value,
            0x08..=0x0D => self.write_rom(address & 0x01FF_FFFF, value),
            0x0E => self.write_save(address, value),
            _ => unreachable!("internal memory write at 0x{address:08X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn read_write_iram() {
        let mut im = InternalMemory::default();
        im.write_at(0x0300_0005, 5);
        assert_eq!(im.read_at(0x0300_0005), 5);
        im.write_at(0x0300_7FFF, 7);
        assert_eq!(im.read_at(0x0300_7FFF), 7);
    }

    #[test]
    fn bios_is_read_only() {
        let mut im = InternalMemory::default();
        let original = im.read_at(0x0000_01EC);
        im.write_at(0x0000_01EC, 10);
        assert_eq!(im.read_at(0x0000_01EC), original);
    }

    #[test]
    fn ram_mirrors() {
        let mut im = InternalMemory::default();

        im.write_at(0x0201_0003, 5);
        assert_eq!(im.read_at(0x0205_0003), 5);
        assert_eq!(im.read_at(0x02F5_0003), 5);

        im.write_at(0x0300_21FF, 9);
        assert_eq!(im.read_at(0x0300_A1FF), 9);
        assert_eq!(im.read_at(0x03FF_A1FF), 9);
    }

    #[test]
    fn rom_open_bus() {
        let im = InternalMemory::new(&[0; 0x4000], &[1, 2, 3, 4], BackupKind::Sram);
        assert_eq!(im.read_at(0x0800_0000), 1);
        // Waitstate aliases map to the same backing store.
        assert_eq!(im.read_at(0x0A00_0001), 2);
        assert_eq!(im.read_at(0x0C00_0003), 4);

        // Past end of image: low halfword of the halfword address.
        assert_eq!(im.read_at(0x09FF_FFFF), 0xFF);
        assert_eq!(im.read_at(0x09FF_FFEE), 0xF7);
    }

    #[test]
    fn sram_read_write() {
        let mut im = InternalMemory::default();
        im.write_at(0x0E00_1234, 0xAB);
        assert_eq!(im.read_at(0x0E00_1234), 0xAB);
    }

    #[test]
    fn flash_id_mode() {
        let mut im = InternalMemory::new(&[0; 0x4000], &[], BackupKind::Flash128K);
        im.write_at(0x0E00_5555, 0xAA);
        im.write_at(0x0E00_2AAA, 0x55);
        im.write_at(0x0E00_5555, 0x90);
        assert_eq!(im.read_at(0x0E00_0000), 0x62);
        assert_eq!(im.read_at(0x0E00_0001), 0x13);

        im.write_at(0x0E00_0000, 0xF0);
        assert_eq!(im.read_at(0x0E00_0000), 0xFF);
    }

    #[test]
    fn flash_program_clears_bits() {
        let mut im = InternalMemory::new(&[0; 0x4000], &[], BackupKind::Flash64K);
        im.write_at(0x0E00_5555, 0xAA);
        im.write_at(0x0E00_2AAA, 0x55);
        im.write_at(0x0E00_5555, 0xA0);
        im.write_at(0x0E00_0010, 0x0F);
        assert_eq!(im.read_at(0x0E00_0010), 0x0F);

        // Programming again can only clear bits.
        im.write_at(0x0E00_5555, 0xAA);
        im.write_at(0x0E00_2AAA, 0x55);
        im.write_at(0x0E00_5555, 0xA0);
        im.write_at(0x0E00_0010, 0xF3);
        assert_eq!(im.read_at(0x0E00_0010), 0x03);
    }

    #[test]
    fn gpio_latches() {
        let mut im = InternalMemory::new(&[0; 0x4000], &[0; 0x1000], BackupKind::Sram);
        // Disabled: reads return zero.
        assert_eq!(im.read_at(0x0800_00C4), 0);

        im.write_at(0x0800_00C8, 1);
        im.write_at(0x0800_00C4, 0x0A);
        assert_eq!(im.read_at(0x0800_00C4), 0x0A);
        assert_eq!(im.read_at(0x0800_00C8), 1);
    }
}
