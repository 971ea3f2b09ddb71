use std::fmt;
use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::error::CartridgeError;

const HEADER_END: usize = 0x150;
const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
}

/// Cartridge header fields at 0x0134-0x014D.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub cgb_flag: u8,
    pub cart_type: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    pub licensee: u8,
    pub version: u8,
    pub checksum: u8,
    pub checksum_ok: bool,
}

impl Header {
    fn parse(data: &[u8]) -> Self {
        let mut title = &data[0x0134..0x0143];
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }
        let computed = data[0x0134..=0x014C]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1));
        Self {
            title: String::from_utf8_lossy(title).trim().to_string(),
            cgb_flag: data[0x0143],
            cart_type: data[0x0147],
            rom_size_code: data[0x0148],
            ram_size_code: data[0x0149],
            licensee: data[0x014B],
            version: data[0x014C],
            checksum: data[0x014D],
            checksum_ok: computed == data[0x014D],
        }
    }

    /// ROM size in bytes declared by the header (32 KiB << code).
    pub fn rom_size(&self) -> usize {
        (32 * 1024usize).checked_shl(self.rom_size_code as u32).unwrap_or(0)
    }

    /// External RAM size in bytes declared by the header.
    pub fn ram_size(&self) -> usize {
        match self.ram_size_code {
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0,
        }
    }

    pub fn mbc_type(&self) -> Option<MbcType> {
        match self.cart_type {
            0x00 | 0x08 | 0x09 => Some(MbcType::NoMbc),
            0x01..=0x03 => Some(MbcType::Mbc1),
            _ => None,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Cartridge Header ---")?;
        writeln!(f, "Title:         {}", self.title)?;
        writeln!(f, "Type:          0x{:02X}", self.cart_type)?;
        writeln!(
            f,
            "ROM Size:      {} ({} KB)",
            self.rom_size_code,
            self.rom_size() / 1024
        )?;
        writeln!(f, "RAM Size Code: {}", self.ram_size_code)?;
        writeln!(f, "Version:       {}", self.version)?;
        write!(f, "Licensee:      0x{:02X}", self.licensee)
    }
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        ram_enable: bool,
        rom_bank: u8,
        upper: u8,
        mode: u8,
    },
}

#[derive(Debug)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    header: Header,
    mbc_state: MbcState,
}

impl Cartridge {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cart = Self::load(data)?;
        info!(
            "Loaded ROM: {} (type 0x{:02X}, {} KiB)",
            cart.header.title,
            cart.header.cart_type,
            cart.rom.len() / 1024
        );
        Ok(cart)
    }

    pub fn load(data: Vec<u8>) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_END {
            return Err(CartridgeError::TooSmall(data.len()));
        }
        let header = Header::parse(&data);
        if !header.checksum_ok {
            warn!(
                "Header checksum mismatch (stored 0x{:02X})",
                header.checksum
            );
        }

        let mbc_state = match header.mbc_type() {
            Some(MbcType::NoMbc) => MbcState::NoMbc,
            Some(MbcType::Mbc1) => MbcState::Mbc1 {
                ram_enable: false,
                rom_bank: 1,
                upper: 0,
                mode: 0,
            },
            None => {
                warn!(
                    "Unsupported cartridge type 0x{:02X}; mapping as ROM only",
                    header.cart_type
                );
                MbcState::NoMbc
            }
        };

        Ok(Self {
            rom: data,
            ram: vec![0; header.ram_size()],
            header,
            mbc_state,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn mbc(&self) -> MbcType {
        match self.mbc_state {
            MbcState::NoMbc => MbcType::NoMbc,
            MbcState::Mbc1 { .. } => MbcType::Mbc1,
        }
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn rom_at(&self, bank: usize, addr: u16) -> u8 {
        let offset = bank * ROM_BANK_SIZE + (addr as usize & (ROM_BANK_SIZE - 1));
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn ram_index(&self, addr: u16) -> Option<usize> {
        if self.ram.is_empty() {
            return None;
        }
        let bank = match self.mbc_state {
            MbcState::NoMbc => 0,
            MbcState::Mbc1 {
                ram_enable: false, ..
            } => return None,
            MbcState::Mbc1 { upper, mode, .. } => {
                if mode == 1 {
                    upper as usize
                } else {
                    0
                }
            }
        };
        Some((bank * RAM_BANK_SIZE + (addr as usize - 0xA000)) % self.ram.len())
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => {
                let bank = match self.mbc_state {
                    MbcState::Mbc1 {
                        upper, mode: 1, ..
                    } => ((upper as usize) << 5) % self.rom_bank_count(),
                    _ => 0,
                };
                self.rom_at(bank, addr)
            }
            0x4000..=0x7FFF => {
                let bank = match self.mbc_state {
                    MbcState::NoMbc => 1,
                    MbcState::Mbc1 {
                        rom_bank, upper, ..
                    } => {
                        let low = if rom_bank & 0x1F == 0 { 1 } else { rom_bank & 0x1F };
                        (((upper as usize) << 5) | low as usize) % self.rom_bank_count()
                    }
                };
                self.rom_at(bank, addr)
            }
            0xA000..=0xBFFF => self
                .ram_index(addr)
                .map(|idx| self.ram[idx])
                .unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => {
                if let MbcState::Mbc1 {
                    ram_enable,
                    rom_bank,
                    upper,
                    mode,
                } = &mut self.mbc_state
                {
                    match addr {
                        0x0000..=0x1FFF => *ram_enable = val & 0x0F == 0x0A,
                        0x2000..=0x3FFF => *rom_bank = val & 0x1F,
                        0x4000..=0x5FFF => *upper = val & 0x03,
                        _ => *mode = val & 0x01,
                    }
                }
            }
            0xA000..=0xBFFF => {
                if let Some(idx) = self.ram_index(addr) {
                    self.ram[idx] = val;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_image(cart_type: u8, banks: usize) -> Vec<u8> {
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        rom[0x0134..0x0139].copy_from_slice(b"TESTS");
        rom[0x0147] = cart_type;
        rom[0x0148] = (banks / 2).trailing_zeros() as u8;
        rom[0x0149] = 0x02;
        rom[0x014B] = 0x33;
        rom[0x014C] = 0x01;
        let sum = rom[0x0134..=0x014C]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1));
        rom[0x014D] = sum;
        for bank in 0..banks {
            rom[bank * ROM_BANK_SIZE + 0x200] = bank as u8;
        }
        rom
    }

    #[test]
    fn header_fields() {
        let cart = Cartridge::load(rom_image(0x01, 4)).unwrap();
        let header = cart.header();
        assert_eq!(header.title, "TESTS");
        assert_eq!(header.cart_type, 0x01);
        assert_eq!(header.rom_size(), 64 * 1024);
        assert_eq!(header.ram_size(), 0x2000);
        assert_eq!(header.licensee, 0x33);
        assert_eq!(header.version, 0x01);
        assert!(header.checksum_ok);
        assert_eq!(cart.mbc(), MbcType::Mbc1);
    }

    #[test]
    fn bad_checksum_is_reported_not_fatal() {
        let mut rom = rom_image(0x00, 2);
        rom[0x014D] ^= 0xFF;
        let cart = Cartridge::load(rom).unwrap();
        assert!(!cart.header().checksum_ok);
    }

    #[test]
    fn truncated_image_is_rejected() {
        let err = Cartridge::load(vec![0; 0x100]).unwrap_err();
        assert!(matches!(err, CartridgeError::TooSmall(0x100)));
    }

    #[test]
    fn mbc1_bank_zero_maps_to_one() {
        let mut cart = Cartridge::load(rom_image(0x01, 8)).unwrap();
        assert_eq!(cart.read(0x4200), 1);
        cart.write(0x2000, 0x00);
        assert_eq!(cart.read(0x4200), 1);
        cart.write(0x2000, 0x05);
        assert_eq!(cart.read(0x4200), 5);
        assert_eq!(cart.read(0x0200), 0);
    }

    #[test]
    fn mbc1_ram_requires_enable() {
        let mut cart = Cartridge::load(rom_image(0x03, 4)).unwrap();
        cart.write(0xA000, 0x42);
        assert_eq!(cart.read(0xA000), 0xFF);
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0x42);
        assert_eq!(cart.read(0xA000), 0x42);
        cart.write(0x0000, 0x00);
        assert_eq!(cart.read(0xA000), 0xFF);
    }

    #[test]
    fn rom_writes_do_not_modify_image() {
        let mut cart = Cartridge::load(rom_image(0x00, 2)).unwrap();
        let before = cart.read(0x0150);
        cart.write(0x0150, before.wrapping_add(1));
        assert_eq!(cart.read(0x0150), before);
    }
}
