/// DIV/TIMA/TMA/TAC at 0xFF04-0xFF07.
///
/// Both counters are driven by the cycle counts handed to [`Timer::tick`].
/// Leftover cycles that do not fill a whole period are carried into the next
/// call so uneven step sizes never drift.
pub struct Timer {
    /// Divider register
    pub div: u8,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    /// Overflow request line; cleared by the emulator loop once latched into IF.
    pub interrupt: bool,
    div_remainder: u32,
    tima_remainder: u32,
}

const DIV_PERIOD: u32 = 64;

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0xAB,
            tima: 0,
            tma: 0,
            tac: 0,
            interrupt: false,
            div_remainder: 0,
            tima_remainder: 0,
        }
    }

    fn enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    /// Cycles per TIMA increment for the current clock select.
    pub fn tima_period(&self) -> u32 {
        match self.tac & 0x03 {
            0b00 => 1024,
            0b01 => 16,
            0b10 => 64,
            _ => 256,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => self.div,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF04 => {
                self.div = 0;
                self.div_remainder = 0;
            }
            0xFF05 => {
                self.tima = val;
                self.tima_remainder = 0;
            }
            0xFF06 => self.tma = val,
            0xFF07 => self.tac = val & 0x07,
            _ => {}
        }
    }

    /// Advance both counters by `cycles`.
    pub fn tick(&mut self, cycles: u32) {
        self.div_remainder += cycles;
        let div_steps = self.div_remainder / DIV_PERIOD;
        self.div_remainder %= DIV_PERIOD;
        self.div = self.div.wrapping_add(div_steps as u8);

        if !self.enabled() {
            return;
        }

        let period = self.tima_period();
        self.tima_remainder += cycles;
        while self.tima_remainder >= period {
            self.tima_remainder -= period;
            self.increment_tima();
        }
    }

    fn increment_tima(&mut self) {
        let (next, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            self.interrupt = true;
        } else {
            self.tima = next;
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
