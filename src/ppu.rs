use std::cmp::Reverse;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const FRAME_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// One completed frame of 2-bit shades, row-major.
pub type Frame = [u8; FRAME_SIZE];

// Dot timings within a 456-dot scanline
const DOTS_PER_LINE: u16 = 456;
const OAM_SCAN_DOT: u16 = 1;
const DRAW_DOT: u16 = 81;
const HBLANK_DOT: u16 = 253;

const VBLANK_LINE: u8 = 144;
const LAST_LINE: u8 = 153;

const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

const VRAM_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;

// VRAM-relative bases
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_0_BASE: usize = 0x0000;
const TILE_DATA_1_BASE: usize = 0x1000;

const WINDOW_X_MAX: u8 = 166;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Draw = 3,
}

/// A sprite selected during OAM scan, with raw OAM coordinates
/// (`y` is screen line + 16, `x` is screen column + 8).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sprite {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub flags: u8,
    pub oam_index: u8,
}

pub struct Ppu {
    vram: [u8; VRAM_SIZE],
    oam: [u8; OAM_SIZE],

    pub lcdc: u8,
    /// Only the interrupt-enable bits 3-6 are stored; mode and coincidence
    /// are derived on read.
    stat: u8,
    pub scy: u8,
    pub scx: u8,
    ly: u8,
    lyc: u8,
    pub wy: u8,
    pub wx: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,

    mode: Mode,
    dots: u16,
    lyc_eq_ly: bool,
    stat_line: bool,
    win_line_counter: u8,

    line_sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    /// Raw background/window color ids of the current line, for sprite priority.
    line_bg: [u8; SCREEN_WIDTH],

    back: Box<Frame>,
    front: Box<Frame>,
    frame_ready: bool,
    frame_count: u64,

    /// VBlank request line; cleared by the emulator loop once latched into IF.
    pub vblank_interrupt: bool,
    /// STAT request line; set on a rising edge of the combined STAT condition.
    pub stat_interrupt: bool,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            lcdc: 0x91,
            stat: 0x00,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            wy: 0,
            wx: 0,
            bgp: 0xFC,
            obp0: 0xFF,
            obp1: 0xFF,
            mode: Mode::VBlank,
            dots: 0,
            lyc_eq_ly: false,
            stat_line: false,
            win_line_counter: 0,
            line_sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            line_bg: [0; SCREEN_WIDTH],
            back: Box::new([0; FRAME_SIZE]),
            front: Box::new([0; FRAME_SIZE]),
            frame_ready: false,
            frame_count: 0,
            vblank_interrupt: false,
            stat_interrupt: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    /// Dot position within the current scanline (0-455).
    pub fn dots(&self) -> u16 {
        self.dots
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    pub fn window_line_counter(&self) -> u8 {
        self.win_line_counter
    }

    /// Sprites selected for the current scanline, in compositing order.
    pub fn sprite_buffer(&self) -> &[Sprite] {
        &self.line_sprites[..self.sprite_count]
    }

    pub fn vram(&self) -> &[u8; VRAM_SIZE] {
        &self.vram
    }

    pub fn oam(&self) -> &[u8; OAM_SIZE] {
        &self.oam
    }

    /// The most recently completed frame.
    pub fn frame(&self) -> &Frame {
        &self.front
    }

    /// Number of frames completed since power-up.
    pub fn frames(&self) -> u64 {
        self.frame_count
    }

    /// Return the completed frame once, if one was published since the last call.
    pub fn take_frame(&mut self) -> Option<&Frame> {
        if self.frame_ready {
            self.frame_ready = false;
            Some(&self.front)
        } else {
            None
        }
    }

    pub fn read_vram(&self, addr: u16) -> u8 {
        if self.mode == Mode::Draw {
            return 0xFF;
        }
        self.vram[(addr as usize - 0x8000) & (VRAM_SIZE - 1)]
    }

    pub fn write_vram(&mut self, addr: u16, val: u8) {
        if self.mode == Mode::Draw {
            return;
        }
        self.vram[(addr as usize - 0x8000) & (VRAM_SIZE - 1)] = val;
    }

    fn oam_blocked(&self, dma: bool) -> bool {
        !dma && matches!(self.mode, Mode::Draw | Mode::OamScan)
    }

    pub fn read_oam(&self, addr: u16, dma: bool) -> u8 {
        let idx = addr as usize - 0xFE00;
        if self.oam_blocked(dma) || idx >= OAM_SIZE {
            return 0xFF;
        }
        self.oam[idx]
    }

    pub fn write_oam(&mut self, addr: u16, val: u8, dma: bool) {
        let idx = addr as usize - 0xFE00;
        if self.oam_blocked(dma) || idx >= OAM_SIZE {
            return;
        }
        self.oam[idx] = val;
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let coincidence = if self.lyc_eq_ly { 0x04 } else { 0 };
                0x80 | (self.stat & 0x78) | coincidence | self.mode as u8
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                if was_on && !self.lcd_enabled() {
                    self.mode = Mode::HBlank;
                    self.dots = 0;
                    self.ly = 0;
                    self.win_line_counter = 0;
                    self.stat_line = false;
                    self.update_coincidence();
                } else if !was_on && self.lcd_enabled() {
                    self.update_coincidence();
                }
            }
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.update_coincidence();
            }
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    fn update_coincidence(&mut self) {
        self.lyc_eq_ly = self.ly == self.lyc;
    }

    /// Raise the STAT request on a 0->1 transition of the combined condition.
    fn update_stat_line(&mut self) {
        let line = (self.lyc_eq_ly && self.stat & 0x40 != 0)
            || (self.mode == Mode::OamScan && self.stat & 0x20 != 0)
            || (self.mode == Mode::VBlank && self.stat & 0x10 != 0)
            || (self.mode == Mode::HBlank && self.stat & 0x08 != 0);
        if line && !self.stat_line {
            self.stat_interrupt = true;
        }
        self.stat_line = line;
    }

    /// Advance by `cycles` M-cycles (four dots each).
    pub fn tick(&mut self, cycles: u32) {
        if !self.lcd_enabled() {
            return;
        }
        for _ in 0..cycles * 4 {
            self.tick_dot();
        }
    }

    /// Advance by a single dot.
    pub fn tick_dot(&mut self) {
        if !self.lcd_enabled() {
            return;
        }

        self.dots += 1;

        if self.ly < VBLANK_LINE {
            match self.dots {
                OAM_SCAN_DOT => {
                    self.mode = Mode::OamScan;
                    self.oam_scan();
                }
                DRAW_DOT => {
                    self.mode = Mode::Draw;
                    self.render_scanline();
                }
                HBLANK_DOT => self.mode = Mode::HBlank,
                _ => {}
            }
        } else if self.ly == VBLANK_LINE && self.dots == OAM_SCAN_DOT {
            self.mode = Mode::VBlank;
            self.vblank_interrupt = true;
            self.win_line_counter = 0;
        }

        if self.dots >= DOTS_PER_LINE {
            self.dots = 0;
            if self.ly == LAST_LINE {
                self.ly = 0;
                self.mode = Mode::OamScan;
                self.publish_frame();
            } else {
                self.ly += 1;
            }
            self.update_coincidence();
        }

        self.update_stat_line();
    }

    fn publish_frame(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
        self.frame_ready = true;
        self.frame_count += 1;
    }

    /// Collect up to 10 sprites covering the current line, ordered so the
    /// sprite that wins an overlap is composited last.
    fn oam_scan(&mut self) {
        let height: u16 = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        let line = self.ly as u16 + 16;
        self.sprite_count = 0;
        for i in 0..TOTAL_SPRITES {
            if self.sprite_count >= MAX_SPRITES_PER_LINE {
                break;
            }
            let base = i * 4;
            let y = self.oam[base] as u16;
            let x = self.oam[base + 1];
            if x == 0 || line < y || line >= y + height {
                continue;
            }
            self.line_sprites[self.sprite_count] = Sprite {
                y: self.oam[base],
                x,
                tile: self.oam[base + 2],
                flags: self.oam[base + 3],
                oam_index: i as u8,
            };
            self.sprite_count += 1;
        }
        self.line_sprites[..self.sprite_count]
            .sort_by_key(|s| (Reverse(s.x), Reverse(s.oam_index)));
    }

    #[inline(always)]
    fn dmg_shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    /// Color id (0-3) of pixel `(px, py)` of the BG/window tile at map slot `map_idx`.
    fn tile_pixel(&self, map_base: usize, map_idx: usize, px: usize, py: usize) -> u8 {
        let tile_index = self.vram[map_base + map_idx];
        let addr = if self.lcdc & 0x10 != 0 {
            TILE_DATA_0_BASE + tile_index as usize * 16
        } else {
            (TILE_DATA_1_BASE as isize + tile_index as i8 as isize * 16) as usize
        };
        let lo = self.vram[addr + py * 2];
        let hi = self.vram[addr + py * 2 + 1];
        let bit = 7 - px;
        (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1)
    }

    fn render_scanline(&mut self) {
        let ly = self.ly as usize;
        let row_start = ly * SCREEN_WIDTH;
        self.line_bg.fill(0);

        if self.lcdc & 0x01 != 0 {
            let bg_map = if self.lcdc & 0x08 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let win_map = if self.lcdc & 0x40 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let window_on =
                self.lcdc & 0x20 != 0 && self.ly >= self.wy && self.wx <= WINDOW_X_MAX;
            let bg_y = (ly + self.scy as usize) & 0xFF;
            let win_y = self.win_line_counter as usize;
            let mut window_drawn = false;

            for x in 0..SCREEN_WIDTH {
                let color_id = if window_on && x + 7 >= self.wx as usize {
                    window_drawn = true;
                    let win_x = x + 7 - self.wx as usize;
                    let map_idx = (win_y / 8) * 32 + win_x / 8;
                    self.tile_pixel(win_map, map_idx, win_x % 8, win_y % 8)
                } else {
                    let bg_x = (x + self.scx as usize) & 0xFF;
                    let map_idx = (bg_y / 8) * 32 + bg_x / 8;
                    self.tile_pixel(bg_map, map_idx, bg_x % 8, bg_y % 8)
                };
                self.line_bg[x] = color_id;
                self.back[row_start + x] = Self::dmg_shade(self.bgp, color_id);
            }

            if window_drawn {
                self.win_line_counter = self.win_line_counter.wrapping_add(1);
            }
        } else {
            let shade = Self::dmg_shade(self.bgp, 0);
            self.back[row_start..row_start + SCREEN_WIDTH].fill(shade);
        }

        if self.lcdc & 0x02 != 0 {
            self.render_sprites(ly);
        }
    }

    fn render_sprites(&mut self, ly: usize) {
        let height: usize = if self.lcdc & 0x04 != 0 { 16 } else { 8 };
        let row_start = ly * SCREEN_WIDTH;
        for i in 0..self.sprite_count {
            let s = self.line_sprites[i];
            let tile = if height == 16 { s.tile & 0xFE } else { s.tile };
            let mut row = ly + 16 - s.y as usize;
            if row >= height {
                continue;
            }
            if s.flags & 0x40 != 0 {
                row = height - 1 - row;
            }
            let addr = tile as usize * 16 + row * 2;
            let lo = self.vram[addr];
            let hi = self.vram[addr + 1];
            let palette = if s.flags & 0x10 != 0 {
                self.obp1
            } else {
                self.obp0
            };

            for px in 0..8 {
                let sx = s.x as isize - 8 + px as isize;
                if !(0..SCREEN_WIDTH as isize).contains(&sx) {
                    continue;
                }
                let sx = sx as usize;
                let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                let color_id = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
                if color_id == 0 {
                    continue;
                }
                if s.flags & 0x80 != 0 && self.line_bg[sx] != 0 {
                    continue;
                }
                self.back[row_start + sx] = Self::dmg_shade(palette, color_id);
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
