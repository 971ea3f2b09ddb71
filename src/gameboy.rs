use log::info;

use crate::{
    cartridge::Cartridge, cpu::Cpu, error::EmuError, mmu::Mmu, screen::Screen, trace::TraceLog,
};

/// M-cycles in one 154-line frame.
pub const CYCLES_PER_FRAME: u32 = 154 * 456 / 4;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    trace: Option<TraceLog>,
}

impl GameBoy {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            mmu: Mmu::new(),
            trace: None,
        }
    }

    pub fn with_cart(cart: Cartridge) -> Self {
        let mut gb = Self::new();
        gb.mmu.load_cart(cart);
        gb
    }

    /// Attach a trace log. The cartridge header is written first when present.
    pub fn set_trace(&mut self, mut trace: TraceLog) {
        if let Some(cart) = self.mmu.cart.as_ref() {
            trace.log_cart_header(cart.header());
        }
        self.trace = Some(trace);
    }

    pub fn trace(&self) -> Option<&TraceLog> {
        self.trace.as_ref()
    }

    /// Run one CPU step, then advance the PPU and timer by the cycles it took
    /// and latch their interrupt requests into IF. Returns the M-cycles used.
    pub fn step(&mut self) -> u8 {
        let cycles = self.cpu.step_traced(&mut self.mmu, self.trace.as_mut());
        self.mmu.ppu.tick(cycles as u32);
        self.mmu.timer.tick(cycles as u32);
        self.mmu.latch_interrupts();
        cycles
    }

    /// Step until the PPU publishes a frame, then hand it to `screen`.
    /// With the LCD off, a frame's worth of cycles presents the last frame again.
    pub fn run_frame(&mut self, screen: &mut dyn Screen) -> Result<(), EmuError> {
        let mut elapsed = 0u32;
        loop {
            elapsed += self.step() as u32;
            if let Some(frame) = self.mmu.ppu.take_frame() {
                screen.present(frame)?;
                break;
            }
            if !self.mmu.ppu.lcd_enabled() && elapsed >= CYCLES_PER_FRAME {
                screen.present(self.mmu.ppu.frame())?;
                break;
            }
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.check()?;
        }
        Ok(())
    }

    /// Run `max_frames` frames, or forever when `None`.
    pub fn run(&mut self, screen: &mut dyn Screen, max_frames: Option<u64>) -> Result<(), EmuError> {
        let mut frames = 0u64;
        while max_frames.is_none_or(|max| frames < max) {
            self.run_frame(screen)?;
            frames += 1;
        }
        info!("Stopped after {frames} frames ({} cycles)", self.cpu.cycles);
        Ok(())
    }

    /// Flush the trace log, if one is attached.
    pub fn finish(&mut self) -> Result<(), EmuError> {
        if let Some(trace) = self.trace.as_mut() {
            trace.finish()?;
        }
        Ok(())
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
