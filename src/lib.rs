//! Dot-accurate Sharp SM83 (DMG Game Boy) emulation core.
//!
//! The CPU executes one instruction per [`gameboy::GameBoy::step`] and reports
//! the M-cycles it used; the PPU and timer are then advanced by that amount and
//! their interrupt requests are latched into IF for the next step.

/// Cartridge header parsing and ROM-only/MBC1 mapping.
pub mod cartridge;

/// SM83 CPU core.
pub mod cpu;

/// Error types shared by the core and the binary.
pub mod error;

/// Emulator loop wiring the CPU and bus together.
pub mod gameboy;

/// Memory map and interrupt-flag routing.
pub mod mmu;

/// Opcode decode tables and mnemonics.
pub mod opcodes;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// CPU register file and flag bits.
pub mod registers;

/// Frame presentation backends.
pub mod screen;

/// VRAM tile sheet rendering for debugging.
pub mod tile_viewer;

/// Divider/timer unit.
pub mod timer;

/// Per-instruction CPU trace log.
pub mod trace;
