use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::debug;

use crate::error::EmuError;
use crate::ppu::{Frame, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Classic DMG green shades, lightest first.
pub const DMG_PALETTE: [[u8; 3]; 4] = [
    [0x9B, 0xBC, 0x0F],
    [0x8B, 0xAC, 0x0F],
    [0x30, 0x62, 0x30],
    [0x0F, 0x38, 0x0F],
];

/// Receives each completed frame of 2-bit shades.
pub trait Screen {
    fn present(&mut self, frame: &Frame) -> Result<(), EmuError>;
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullScreen;

impl Screen for NullScreen {
    fn present(&mut self, _frame: &Frame) -> Result<(), EmuError> {
        Ok(())
    }
}

/// Convert a buffer of shade indices into an RGB image.
pub fn shades_to_rgb(shades: &[u8], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let shade = shades[(y * width + x) as usize] & 0x03;
        image::Rgb(DMG_PALETTE[shade as usize])
    })
}

pub fn save_png(img: &RgbImage, path: &Path) -> Result<(), EmuError> {
    img.save(path).map_err(|source| EmuError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes every `every`-th frame to `dir/frame_NNNNNN.png`.
pub struct PngDumper {
    dir: PathBuf,
    every: u64,
    seen: u64,
    written: u64,
}

impl PngDumper {
    pub fn new<P: Into<PathBuf>>(dir: P, every: u64) -> Result<Self, EmuError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            every: every.max(1),
            seen: 0,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Screen for PngDumper {
    fn present(&mut self, frame: &Frame) -> Result<(), EmuError> {
        let index = self.seen;
        self.seen += 1;
        if index % self.every != 0 {
            return Ok(());
        }
        let path = self.dir.join(format!("frame_{index:06}.png"));
        let img = shades_to_rgb(frame, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
        save_png(&img, &path)?;
        debug!("Wrote {}", path.display());
        self.written += 1;
        Ok(())
    }
}
