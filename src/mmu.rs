use log::{debug, trace};

use crate::{cartridge::Cartridge, ppu::Ppu, timer::Timer};

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;
const OAM_DMA_LEN: u16 = 0xA0;

pub const INT_VBLANK: u8 = 0x01;
pub const INT_STAT: u8 = 0x02;
pub const INT_TIMER: u8 = 0x04;

/// The system bus. Owns every addressable component and routes CPU accesses
/// by address range.
pub struct Mmu {
    pub wram: [u8; WRAM_SIZE],
    pub hram: [u8; HRAM_SIZE],
    pub cart: Option<Cartridge>,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub ppu: Ppu,
    pub timer: Timer,
    sb: u8,
    sc: u8,
    dma: u8,
    serial_out: Vec<u8>,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            cart: None,
            if_reg: 0x01,
            ie_reg: 0x00,
            ppu: Ppu::new(),
            timer: Timer::new(),
            sb: 0,
            sc: 0,
            dma: 0xFF,
            serial_out: Vec::new(),
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    /// Interrupts both requested and enabled.
    pub fn pending_interrupts(&self) -> u8 {
        self.ie_reg & self.if_reg & 0x1F
    }

    /// Copy the PPU and timer request lines into IF and clear them.
    pub fn latch_interrupts(&mut self) {
        if self.ppu.vblank_interrupt {
            self.ppu.vblank_interrupt = false;
            self.if_reg |= INT_VBLANK;
        }
        if self.ppu.stat_interrupt {
            self.ppu.stat_interrupt = false;
            self.if_reg |= INT_STAT;
        }
        if self.timer.interrupt {
            self.timer.interrupt = false;
            self.if_reg |= INT_TIMER;
        }
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                self.cart.as_ref().map(|c| c.read(addr)).unwrap_or(0xFF)
            }
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            // echo RAM and the unusable gap are not mapped
            0xE000..=0xFDFF => 0xFF,
            0xFE00..=0xFE9F => self.ppu.read_oam(addr, false),
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => 0xFF,
            0xFF01 => self.sb,
            0xFF02 => self.sc | 0x7E,
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => 0xE0 | self.if_reg,
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.read_reg(addr),
            0xFF46 => self.dma,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
            _ => 0xFF,
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write(addr, val);
                }
            }
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => {}
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val, false),
            0xFEA0..=0xFEFF => {}
            0xFF01 => self.sb = val,
            0xFF02 => {
                if val & 0x80 != 0 {
                    debug!("Serial out: {:02X} ({:?})", self.sb, self.sb as char);
                    self.serial_out.push(self.sb);
                }
                // The transfer completes immediately.
                self.sc = val & 0x7F;
            }
            0xFF04..=0xFF07 => self.timer.write(addr, val),
            0xFF0F => self.if_reg = val & 0x1F,
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF46 => self.oam_dma(val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
            _ => {}
        }
    }

    /// Copy 160 bytes from `page << 8` into OAM.
    fn oam_dma(&mut self, page: u8) {
        self.dma = page;
        let src = (page as u16) << 8;
        trace!("OAM DMA from {src:04X}");
        for i in 0..OAM_DMA_LEN {
            let byte = self.dma_source(src.wrapping_add(i));
            self.ppu.write_oam(0xFE00 + i, byte, true);
        }
    }

    /// DMA reads VRAM regardless of PPU mode; pages 0xE0-0xFF read work RAM.
    fn dma_source(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0x9FFF => self.ppu.vram()[(addr - 0x8000) as usize],
            0xE000..=0xFFFF => self.wram[(addr - 0xE000) as usize],
            _ => self.read_byte(addr),
        }
    }

    /// Drain bytes written out through the serial port.
    pub fn take_serial(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.serial_out)
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
