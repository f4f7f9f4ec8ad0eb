//! The assembled system and its front-end boundary.
//!
//! [`Gba`] ties the ARM7TDMI to the bus and exposes what a front end needs:
//! construction from BIOS + ROM images, reset, stepping (per instruction or
//! per frame), raw bus access for a debugger, button input, audio FIFO
//! drain notifications and a structured state dump.

use serde::Serialize;

use crate::bus::Bus;
use crate::cartridge::CartridgeHeader;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::hardware::internal_memory::InternalMemory;
use crate::cpu::hardware::sound::Fifo;
use crate::cpu::psr::CpuState;

/// BIOS images are exactly 16 KiB.
pub const BIOS_SIZE: usize = 0x4000;

/// Cartridge images top out at 32 MiB.
pub const MAX_ROM_SIZE: usize = 0x0200_0000;

/// CPU cycles per displayed frame (308 dots x 228 lines x 4 cycles).
pub const CYCLES_PER_FRAME: u32 = 280_896;

/// A point-in-time view of the CPU and the interesting MMIO state, for the
/// debugger.
#[derive(Debug, Serialize)]
pub struct StateDump {
    pub registers: [u32; 16],
    pub cpsr: u32,
    pub spsr: u32,
    pub thumb_state: bool,
    pub prefetch: u32,
    pub dispcnt: u16,
    pub dispstat: u16,
    pub vcount: u16,
    pub interrupt_enable: u16,
    pub interrupt_request: u16,
    pub interrupt_master_enable: u16,
    pub dma_enabled: [bool; 4],
    pub halted: Option<String>,
}

pub struct Gba {
    pub cpu: Arm7tdmi,
    pub cartridge_header: CartridgeHeader,
}

impl Gba {
    /// Builds a system from raw BIOS and cartridge images. The BIOS must be
    /// exactly [`BIOS_SIZE`] bytes, the ROM at most [`MAX_ROM_SIZE`]. The
    /// returned system is already reset and about to fetch from the
    /// cartridge entry point.
    pub fn new(bios: &[u8], cartridge: &[u8]) -> Result<Self, String> {
        if bios.len() != BIOS_SIZE {
            return Err(format!(
                "BIOS must be exactly {BIOS_SIZE} bytes, got {}",
                bios.len()
            ));
        }
        if cartridge.len() > MAX_ROM_SIZE {
            return Err(format!(
                "ROM larger than {MAX_ROM_SIZE} bytes: {}",
                cartridge.len()
            ));
        }

        let cartridge_header = CartridgeHeader::new(cartridge)?;
        let memory = InternalMemory::new(bios, cartridge, cartridge_header.backup_kind);
        let bus = Bus::with_memory(memory);

        Ok(Self {
            cpu: Arm7tdmi::new(bus),
            cartridge_header,
        })
    }

    /// Back to the post-boot state; cartridge and save memory survive.
    pub fn reset(&mut self) {
        self.cpu.bus.internal_memory.reset();
        self.cpu.reset();
    }

    /// Executes one instruction. Returns `true` when a frame completed.
    pub fn step(&mut self) -> bool {
        self.cpu.step()
    }

    /// Steps until roughly `cycles` CPU cycles have elapsed or the core
    /// halts. Returns `true` if a frame completed in the window.
    pub fn run_until(&mut self, cycles: u32) -> bool {
        let mut frame_ready = false;
        // One instruction per cycle in this functional model.
        for _ in 0..cycles {
            if self.cpu.halted().is_some() {
                break;
            }
            frame_ready |= self.cpu.step();
        }
        frame_ready
    }

    /// Runs until the next completed frame (or a halt).
    pub fn step_frame(&mut self) {
        loop {
            if self.cpu.halted().is_some() {
                return;
            }
            if self.cpu.step() {
                return;
            }
        }
    }

    #[must_use]
    pub fn bus_read8(&self, address: u32) -> u8 {
        self.cpu.bus.read_byte(address)
    }

    #[must_use]
    pub fn bus_read16(&self, address: u32) -> u16 {
        self.cpu.bus.read_half_word(address)
    }

    #[must_use]
    pub fn bus_read32(&self, address: u32) -> u32 {
        self.cpu.bus.read_word(address)
    }

    pub fn bus_write8(&mut self, address: u32, value: u8) {
        self.cpu.bus.write_byte(address, value);
    }

    pub fn bus_write16(&mut self, address: u32, value: u16) {
        self.cpu.bus.write_half_word(address, value);
    }

    pub fn bus_write32(&mut self, address: u32, value: u32) {
        self.cpu.bus.write_word(address, value);
    }

    /// Front-end input hook: raw KEYINPUT value (active-low).
    pub fn set_key_input(&mut self, key_input: u16) {
        self.cpu.bus.keypad.key_input = key_input;
    }

    /// Front-end audio hook: a direct-sound FIFO ran low and its DMA
    /// channel should refill it.
    pub fn notify_fifo_drain(&mut self, fifo: Fifo) {
        self.cpu.bus.notify_fifo_drain(fifo);
    }

    #[must_use]
    pub fn halted(&self) -> Option<&str> {
        self.cpu.halted()
    }

    /// The cartridge save memory, for persistence.
    #[must_use]
    pub fn save_data(&self) -> &[u8] {
        self.cpu.bus.internal_memory.sram()
    }

    pub fn load_save_data(&mut self, data: &[u8]) {
        self.cpu.bus.internal_memory.load_sram(data);
    }

    #[must_use]
    pub fn state_dump(&self) -> StateDump {
        let bus = &self.cpu.bus;
        StateDump {
            registers: self.cpu.registers.as_array(),
            cpsr: self.cpu.cpsr.into(),
            spsr: self.cpu.spsr.into(),
            thumb_state: self.cpu.cpsr.cpu_state() == CpuState::Thumb,
            prefetch: self.cpu.prefetch(),
            dispcnt: bus.lcd.registers.dispcnt,
            dispstat: bus.lcd.registers.dispstat,
            vcount: bus.lcd.registers.vcount,
            interrupt_enable: bus.interrupt_control.interrupt_enable,
            interrupt_request: bus.interrupt_control.interrupt_request,
            interrupt_master_enable: bus.interrupt_control.interrupt_master_enable,
            dma_enabled: [
                bus.dma.channels[0].enabled(),
                bus.dma.channels[1].enabled(),
                bus.dma.channels[2].enabled(),
                bus.dma.channels[3].enabled(),
            ],
            halted: self.cpu.halted().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::cpu_modes::Mode;
    use pretty_assertions::assert_eq;

    fn test_rom() -> Vec<u8> {
        let mut rom = vec![0; 0xC0];
        // Entry point: branch-to-self.
        rom[0..4].copy_from_slice(&0xEAFF_FFFE_u32.to_le_bytes());
        rom[0xB2] = 0x96;
        let mut chk: u8 = 0;
        for byte in &rom[0xA0..=0xBC] {
            chk = chk.wrapping_sub(*byte);
        }
        rom[0xBD] = chk.wrapping_sub(0x19);
        rom
    }

    #[test]
    fn rejects_wrong_bios_size() {
        assert!(Gba::new(&[0; 0x100], &test_rom()).is_err());
        assert!(Gba::new(&[0; BIOS_SIZE + 1], &test_rom()).is_err());
    }

    #[test]
    fn reset_state_matches_boot() {
        let gba = Gba::new(&[0; BIOS_SIZE], &test_rom()).unwrap();

        let dump = gba.state_dump();
        // PC has already advanced one fetch past the entry point.
        assert_eq!(dump.registers[15], 0x0800_0004);
        for reg in 0..=14 {
            assert_eq!(dump.registers[reg], 0);
        }
        assert!(!dump.thumb_state);
        assert_eq!(gba.cpu.cpsr.mode(), Mode::System);
    }

    #[test]
    fn bus_accessors_round_trip() {
        let mut gba = Gba::new(&[0; BIOS_SIZE], &test_rom()).unwrap();

        gba.bus_write32(0x0200_0000, 0xAABB_CCDD);
        assert_eq!(gba.bus_read32(0x0200_0000), 0xAABB_CCDD);
        assert_eq!(gba.bus_read16(0x0200_0000), 0xCCDD);
        assert_eq!(gba.bus_read8(0x0200_0003), 0xAA);
    }

    #[test]
    fn key_input_reaches_keyinput_register() {
        let mut gba = Gba::new(&[0; BIOS_SIZE], &test_rom()).unwrap();
        // Press A (bit 0 goes low).
        gba.set_key_input(0x03FE);
        assert_eq!(gba.bus_read16(0x0400_0130), 0x03FE);
    }

    #[test]
    fn frame_completes_after_enough_steps() {
        let mut gba = Gba::new(&[0; BIOS_SIZE], &test_rom()).unwrap();
        // The test ROM spins on its entry point; a frame's worth of cycles
        // carries the LCD through VBlank entry.
        assert!(gba.run_until(CYCLES_PER_FRAME));
    }

    #[test]
    fn save_data_round_trip() {
        let mut gba = Gba::new(&[0; BIOS_SIZE], &test_rom()).unwrap();
        gba.bus_write8(0x0E00_0010, 0x5A);
        let saved = gba.save_data().to_vec();

        let mut other = Gba::new(&[0; BIOS_SIZE], &test_rom()).unwrap();
        other.load_save_data(&saved);
        assert_eq!(other.bus_read8(0x0E00_0010), 0x5A);
    }
}
