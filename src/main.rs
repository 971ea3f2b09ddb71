use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use dotmatrix::{
    cartridge::Cartridge,
    error::EmuError,
    gameboy::GameBoy,
    screen::{NullScreen, PngDumper, Screen},
    tile_viewer,
    trace::{DEFAULT_TRACE_PATH, TraceLog},
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Write a per-instruction CPU trace (default: cpu_trace.log)
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_TRACE_PATH)]
    trace: Option<PathBuf>,

    /// Save the VRAM tile sheet as PNG on exit
    #[arg(long)]
    tiles: Option<PathBuf>,

    /// Directory to dump frames into as PNG
    #[arg(long)]
    dump_frames: Option<PathBuf>,

    /// Dump every Nth frame
    #[arg(long, default_value_t = 60)]
    dump_every: u64,

    /// Number of frames to run before exiting
    #[arg(long)]
    frames: Option<u64>,

    /// Print serial output and CPU state every 60 frames
    #[arg(long)]
    debug: bool,
}

fn print_serial(bytes: &[u8]) {
    print!("[SERIAL] ");
    for b in bytes {
        if b.is_ascii_graphic() || *b == b' ' {
            print!("{}", *b as char);
        } else {
            print!("\\x{:02X}", b);
        }
    }
    println!();
}

fn run(gb: &mut GameBoy, args: &Args) -> Result<(), EmuError> {
    if let Some(path) = &args.trace {
        gb.set_trace(TraceLog::create(path)?);
        info!("Tracing CPU to {}", path.display());
    }

    let mut screen: Box<dyn Screen> = match &args.dump_frames {
        Some(dir) => Box::new(PngDumper::new(dir, args.dump_every)?),
        None => Box::new(NullScreen),
    };

    let mut frame_count = 0u64;
    while args.frames.is_none_or(|max| frame_count < max) {
        gb.run_frame(screen.as_mut())?;

        if args.debug && frame_count % 60 == 0 {
            let serial = gb.mmu.take_serial();
            if !serial.is_empty() {
                print_serial(&serial);
            }
            println!("{}", gb.cpu.debug_state());
        }

        frame_count += 1;
    }

    if let Some(path) = &args.tiles {
        tile_viewer::save_tile_sheet(&gb.mmu.ppu, path)?;
        info!("Wrote tile sheet to {}", path.display());
    }

    info!("Ran {frame_count} frames");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let cart = match Cartridge::from_file(&args.rom) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting emulator");
    let mut gb = GameBoy::with_cart(cart);

    let result = run(&mut gb, &args);
    let flushed = gb.finish();

    match result.and(flushed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Emulation stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
