use std::fs;

use dotmatrix::cartridge::{Cartridge, MbcType};
use dotmatrix::error::{CartridgeError, EmuError};

fn write_rom(dir: &tempfile::TempDir, cart_type: u8) -> std::path::PathBuf {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0134..0x0138].copy_from_slice(b"DEMO");
    rom[0x0147] = cart_type;
    let path = dir.path().join("demo.gb");
    fs::write(&path, &rom).unwrap();
    path
}

#[test]
fn loads_rom_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cart = Cartridge::from_file(write_rom(&dir, 0x00)).unwrap();
    assert_eq!(cart.header().title, "DEMO");
    assert_eq!(cart.mbc(), MbcType::NoMbc);
    assert_eq!(cart.header().rom_size(), 0x8000);
}

#[test]
fn unsupported_mapper_falls_back_to_rom_only() {
    let dir = tempfile::tempdir().unwrap();
    let cart = Cartridge::from_file(write_rom(&dir, 0x13)).unwrap();
    assert_eq!(cart.header().mbc_type(), None);
    assert_eq!(cart.mbc(), MbcType::NoMbc);
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.gb");
    let err = Cartridge::from_file(&path).unwrap_err();
    match &err {
        CartridgeError::Io { path: p, .. } => assert_eq!(p, &path),
        other => panic!("unexpected error: {other}"),
    }
    let wrapped: EmuError = err.into();
    assert!(wrapped.to_string().contains("nope.gb"));
}

#[test]
fn header_display() {
    let dir = tempfile::tempdir().unwrap();
    let cart = Cartridge::from_file(write_rom(&dir, 0x01)).unwrap();
    let text = cart.header().to_string();
    assert!(text.starts_with("--- Cartridge Header ---\n"));
    assert!(text.contains("Title:         DEMO"));
    assert!(text.contains("Type:          0x01"));
    assert!(text.contains("ROM Size:      0 (32 KB)"));
}
