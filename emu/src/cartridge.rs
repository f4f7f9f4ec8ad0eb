//! Cartridge header parsing and backup-storage detection.

use serde::{Deserialize, Serialize};

/// The kind of save memory wired to the cartridge bus, inferred from ID
/// strings the library code embeds in the ROM image. The detection only
/// depends on the ROM bytes, so it is reproducible for a given image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupKind {
    #[default]
    Sram,
    Flash64K,
    Flash128K,
    Eeprom,
}

impl BackupKind {
    #[must_use]
    pub fn detect(rom: &[u8]) -> Self {
        // IDs are word-aligned in the image.
        for offset in (0..rom.len()).step_by(4) {
            if find_at(rom, offset, b"EEPROM_V") {
                return Self::Eeprom;
            }
            if find_at(rom, offset, b"SRAM_V") {
                return Self::Sram;
            }
            if find_at(rom, offset, b"FLASH1M_V") {
                return Self::Flash128K;
            }
            if find_at(rom, offset, b"FLASH512_V") || find_at(rom, offset, b"FLASH_V") {
                return Self::Flash64K;
            }
        }

        Self::Sram
    }
}

fn find_at(rom: &[u8], offset: usize, id: &[u8]) -> bool {
    rom.len() >= offset + id.len() && &rom[offset..offset + id.len()] == id
}

/// The fields of the 192-byte cartridge header the emulator cares about.
pub struct CartridgeHeader {
    /// Uppercase ASCII, up to 12 characters.
    pub game_title: String,
    /// Uppercase ASCII, 4 characters.
    pub game_code: String,
    /// Uppercase ASCII, 2 characters.
    pub maker_code: String,
    pub software_version: u8,
    pub complement_check: u8,
    pub backup_kind: BackupKind,
}

impl CartridgeHeader {
    pub fn new(data: &[u8]) -> Result<Self, String> {
        if data.len() < 0xC0 {
            return Err(format!(
                "ROM too small to contain a cartridge header: {} bytes",
                data.len()
            ));
        }

        // Must be 0x96 in a valid image.
        if data[0xB2] != 0x96 {
            return Err(format!("invalid fixed header byte: 0x{:02X}", data[0xB2]));
        }

        let complement_check = data[0xBD];
        let checksum = Self::compute_checksum(data);
        if checksum != complement_check {
            tracing::warn!(
                "header checksum mismatch: computed 0x{checksum:02X}, header says 0x{complement_check:02X}"
            );
        }

        Ok(Self {
            game_title: ascii_field(&data[0xA0..=0xAB]),
            game_code: ascii_field(&data[0xAC..=0xAF]),
            maker_code: ascii_field(&data[0xB0..=0xB1]),
            software_version: data[0xBC],
            complement_check,
            backup_kind: BackupKind::detect(data),
        })
    }

    fn compute_checksum(data: &[u8]) -> u8 {
        let mut chk: u8 = 0;
        for byte in &data[0xA0..=0xBC] {
            chk = chk.wrapping_sub(*byte);
        }
        chk.wrapping_sub(0x19)
    }
}

fn ascii_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| char::from(*b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header_with_title(title: &[u8]) -> Vec<u8> {
        let mut data = vec![0; 0xC0];
        data[0xA0..0xA0 + title.len()].copy_from_slice(title);
        data[0xB2] = 0x96;
        let mut chk: u8 = 0;
        for byte in &data[0xA0..=0xBC] {
            chk = chk.wrapping_sub(*byte);
        }
        data[0xBD] = chk.wrapping_sub(0x19);
        data
    }

    #[test]
    fn parse_header() {
        let mut data = header_with_title(b"TANGERINE");
        data.extend_from_slice(b"SRAM_V113\0\0\0");
        let header = CartridgeHeader::new(&data).unwrap();
        assert_eq!(header.game_title, "TANGERINE");
        assert_eq!(header.backup_kind, BackupKind::Sram);
    }

    #[test]
    fn reject_short_rom() {
        assert!(CartridgeHeader::new(&[0; 0x10]).is_err());
    }

    #[test]
    fn reject_bad_fixed_byte() {
        let mut data = header_with_title(b"X");
        data[0xB2] = 0;
        assert!(CartridgeHeader::new(&data).is_err());
    }

    #[test]
    fn detect_backup_kinds() {
        let mut rom = vec![0; 0x100];
        rom.extend_from_slice(b"FLASH1M_V102");
        assert_eq!(BackupKind::detect(&rom), BackupKind::Flash128K);

        let mut rom = vec![0; 0x100];
        rom.extend_from_slice(b"FLASH512_V10");
        assert_eq!(BackupKind::detect(&rom), BackupKind::Flash64K);

        let mut rom = vec![0; 0x100];
        rom.extend_from_slice(b"EEPROM_V1234");
        assert_eq!(BackupKind::detect(&rom), BackupKind::Eeprom);

        assert_eq!(BackupKind::detect(&[0; 0x100]), BackupKind::Sram);
    }
}
