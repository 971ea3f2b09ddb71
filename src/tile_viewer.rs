//! Debug view of the 384 tiles in VRAM (0x8000-0x97FF).

use std::path::Path;

use crate::error::EmuError;
use crate::ppu::Ppu;
use crate::screen::{save_png, shades_to_rgb};

pub const TILE_COUNT: usize = 384;
pub const TILES_PER_ROW: usize = 16;
pub const SHEET_WIDTH: usize = TILES_PER_ROW * 8;
pub const SHEET_HEIGHT: usize = (TILE_COUNT / TILES_PER_ROW) * 8;

/// Render every tile as raw color ids (no palette), 16 tiles per row.
pub fn render_tile_sheet(ppu: &Ppu) -> Vec<u8> {
    let vram = ppu.vram();
    let mut sheet = vec![0u8; SHEET_WIDTH * SHEET_HEIGHT];
    for tile in 0..TILE_COUNT {
        let origin_x = (tile % TILES_PER_ROW) * 8;
        let origin_y = (tile / TILES_PER_ROW) * 8;
        for row in 0..8 {
            let lo = vram[tile * 16 + row * 2];
            let hi = vram[tile * 16 + row * 2 + 1];
            for col in 0..8 {
                let bit = 7 - col;
                let color_id = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
                sheet[(origin_y + row) * SHEET_WIDTH + origin_x + col] = color_id;
            }
        }
    }
    sheet
}

pub fn save_tile_sheet(ppu: &Ppu, path: &Path) -> Result<(), EmuError> {
    let sheet = render_tile_sheet(ppu);
    let img = shades_to_rgb(&sheet, SHEET_WIDTH as u32, SHEET_HEIGHT as u32);
    save_png(&img, path)
}
