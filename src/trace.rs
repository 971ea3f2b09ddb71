//! Per-instruction CPU trace log.
//!
//! The log is an explicit value owned by the emulator loop. Writes are
//! buffered; the first I/O error is kept and later writes are skipped so the
//! CPU never has to handle it mid-instruction. [`TraceLog::finish`] reports it.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::cartridge::Header;
use crate::registers::Registers;

pub const DEFAULT_TRACE_PATH: &str = "cpu_trace.log";

pub struct TraceLog {
    out: BufWriter<Box<dyn Write>>,
    error: Option<io::Error>,
    lines: u64,
}

impl TraceLog {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer<W: Write + 'static>(writer: W) -> Self {
        Self {
            out: BufWriter::new(Box::new(writer)),
            error: None,
            lines: 0,
        }
    }

    /// Returns whether the text reached the writer.
    fn emit(&mut self, args: fmt::Arguments<'_>) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.out.write_fmt(args) {
            Ok(()) => true,
            Err(e) => {
                self.error = Some(e);
                false
            }
        }
    }

    pub fn log_cart_header(&mut self, header: &Header) {
        self.emit(format_args!("{header}\n"));
    }

    /// Record one instruction; `regs` is the state before it executed.
    pub fn record(&mut self, regs: &Registers, opcode: u8, mnemonic: &dyn fmt::Display) {
        let written = self.emit(format_args!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} PC:{:04X} SP:{:04X} | OP:{:02X} -> {}\n",
            regs.a,
            regs.f(),
            regs.b,
            regs.c,
            regs.d,
            regs.e,
            regs.h,
            regs.l,
            regs.pc,
            regs.sp,
            opcode,
            mnemonic
        ));
        if written {
            self.lines += 1;
        }
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Return the first deferred write error, if any.
    pub fn check(&mut self) -> io::Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush buffered lines and surface any deferred error.
    pub fn finish(&mut self) -> io::Result<()> {
        self.check()?;
        self.out.flush()
    }
}

impl Drop for TraceLog {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}
