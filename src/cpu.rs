use log::{trace, warn};

use crate::mmu::Mmu;
use crate::opcodes::{
    AluOp, CB, CbInstruction, Cond, Indirect, Instruction, PRIMARY, Pair, ShiftOp, StackPair,
    Target,
};
use crate::registers::{Reg16, Registers};
use crate::trace::TraceLog;

/// Interrupt vectors in priority order (bit 0 first).
const VECTORS: [u16; 5] = [0x0040, 0x0048, 0x0050, 0x0058, 0x0060];

pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    pub halted: bool,
    /// Total M-cycles executed since power-up.
    pub cycles: u64,
    ime_delay: u8,
    step_cycles: u8,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            ime: false,
            halted: false,
            cycles: 0,
            ime_delay: 0,
            step_cycles: 0,
        }
    }

    #[inline]
    fn tick(&mut self, m_cycles: u8) {
        self.step_cycles += m_cycles;
    }

    #[inline(always)]
    fn fetch8(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.tick(1);
        val
    }

    #[inline(always)]
    fn fetch16(&mut self, mmu: &Mmu) -> u16 {
        let lo = self.fetch8(mmu);
        let hi = self.fetch8(mmu);
        u16::from_le_bytes([lo, hi])
    }

    #[inline(always)]
    fn read8(&mut self, mmu: &Mmu, addr: u16) -> u8 {
        self.tick(1);
        mmu.read_byte(addr)
    }

    #[inline(always)]
    fn write8(&mut self, mmu: &mut Mmu, addr: u16, val: u8) {
        mmu.write_byte(addr, val);
        self.tick(1);
    }

    /// Return a formatted string of the current CPU state for debugging.
    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} CY:{}",
            self.regs.get16(Reg16::AF),
            self.regs.get16(Reg16::BC),
            self.regs.get16(Reg16::DE),
            self.regs.hl(),
            self.regs.pc,
            self.regs.sp,
            self.cycles
        )
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write8(mmu, self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write8(mmu, self.regs.sp, lo);
    }

    fn pop_stack(&mut self, mmu: &Mmu) -> u16 {
        let lo = self.read8(mmu, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read8(mmu, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    fn read_target(&mut self, mmu: &Mmu, target: Target) -> u8 {
        match target {
            Target::B => self.regs.b,
            Target::C => self.regs.c,
            Target::D => self.regs.d,
            Target::E => self.regs.e,
            Target::H => self.regs.h,
            Target::L => self.regs.l,
            Target::HlInd => self.read8(mmu, self.regs.hl()),
            Target::A => self.regs.a,
        }
    }

    fn write_target(&mut self, mmu: &mut Mmu, target: Target, val: u8) {
        match target {
            Target::B => self.regs.b = val,
            Target::C => self.regs.c = val,
            Target::D => self.regs.d = val,
            Target::E => self.regs.e = val,
            Target::H => self.regs.h = val,
            Target::L => self.regs.l = val,
            Target::HlInd => {
                let addr = self.regs.hl();
                self.write8(mmu, addr, val);
            }
            Target::A => self.regs.a = val,
        }
    }

    fn pair(&self, pair: Pair) -> u16 {
        match pair {
            Pair::BC => self.regs.get16(Reg16::BC),
            Pair::DE => self.regs.get16(Reg16::DE),
            Pair::HL => self.regs.hl(),
            Pair::SP => self.regs.sp,
        }
    }

    fn set_pair(&mut self, pair: Pair, val: u16) {
        match pair {
            Pair::BC => self.regs.set16(Reg16::BC, val),
            Pair::DE => self.regs.set16(Reg16::DE, val),
            Pair::HL => self.regs.set_hl(val),
            Pair::SP => self.regs.sp = val,
        }
    }

    fn stack_pair_reg(pair: StackPair) -> Reg16 {
        match pair {
            StackPair::BC => Reg16::BC,
            StackPair::DE => Reg16::DE,
            StackPair::HL => Reg16::HL,
            StackPair::AF => Reg16::AF,
        }
    }

    fn condition(&self, cond: Cond) -> bool {
        match cond {
            Cond::NZ => !self.regs.zero(),
            Cond::Z => self.regs.zero(),
            Cond::NC => !self.regs.carry(),
            Cond::C => self.regs.carry(),
            Cond::Always => true,
        }
    }

    /// Resolve the address of an `(rr)` operand, applying HL+/HL- side effects.
    fn indirect_addr(&mut self, ind: Indirect) -> u16 {
        match ind {
            Indirect::BC => self.regs.get16(Reg16::BC),
            Indirect::DE => self.regs.get16(Reg16::DE),
            Indirect::HlInc => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_add(1));
                hl
            }
            Indirect::HlDec => {
                let hl = self.regs.hl();
                self.regs.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    fn alu(&mut self, op: AluOp, val: u8) {
        let a = self.regs.a;
        let carry_in = self.regs.carry() as u8;
        match op {
            AluOp::Add | AluOp::Adc => {
                let c = if op == AluOp::Adc { carry_in } else { 0 };
                let sum = a as u16 + val as u16 + c as u16;
                let res = sum as u8;
                self.regs.set_flags(
                    res == 0,
                    false,
                    (a & 0x0F) + (val & 0x0F) + c > 0x0F,
                    sum > 0xFF,
                );
                self.regs.a = res;
            }
            AluOp::Sub | AluOp::Sbc | AluOp::Cp => {
                let c = if op == AluOp::Sbc { carry_in } else { 0 };
                let res = a.wrapping_sub(val).wrapping_sub(c);
                self.regs.set_flags(
                    res == 0,
                    true,
                    (a & 0x0F) < (val & 0x0F) + c,
                    (a as u16) < val as u16 + c as u16,
                );
                if op != AluOp::Cp {
                    self.regs.a = res;
                }
            }
            AluOp::And => {
                self.regs.a = a & val;
                self.regs.set_flags(self.regs.a == 0, false, true, false);
            }
            AluOp::Xor => {
                self.regs.a = a ^ val;
                self.regs.set_flags(self.regs.a == 0, false, false, false);
            }
            AluOp::Or => {
                self.regs.a = a | val;
                self.regs.set_flags(self.regs.a == 0, false, false, false);
            }
        }
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.regs.set_zero(res == 0);
        self.regs.set_subtract(false);
        self.regs.set_half_carry(val & 0x0F == 0x0F);
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.regs.set_zero(res == 0);
        self.regs.set_subtract(true);
        self.regs.set_half_carry(val & 0x0F == 0);
        res
    }

    /// CB-page rotate/shift. Z reflects the result.
    fn shift(&mut self, op: ShiftOp, val: u8) -> u8 {
        let carry_in = self.regs.carry();
        let (res, carry) = match op {
            ShiftOp::Rlc => (val.rotate_left(1), val & 0x80 != 0),
            ShiftOp::Rrc => (val.rotate_right(1), val & 0x01 != 0),
            ShiftOp::Rl => ((val << 1) | carry_in as u8, val & 0x80 != 0),
            ShiftOp::Rr => ((val >> 1) | ((carry_in as u8) << 7), val & 0x01 != 0),
            ShiftOp::Sla => (val << 1, val & 0x80 != 0),
            ShiftOp::Sra => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            ShiftOp::Swap => (val.rotate_left(4), false),
            ShiftOp::Srl => (val >> 1, val & 0x01 != 0),
        };
        self.regs.set_flags(res == 0, false, false, carry);
        res
    }

    /// RLCA/RRCA/RLA/RRA: same as the CB forms on A but Z is always cleared.
    fn rotate_a(&mut self, op: ShiftOp) {
        self.regs.a = self.shift(op, self.regs.a);
        self.regs.set_zero(false);
    }

    fn daa(&mut self) {
        let mut a = self.regs.a;
        let mut carry = self.regs.carry();
        if !self.regs.subtract() {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if self.regs.half_carry() || (a & 0x0F) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if self.regs.half_carry() {
                a = a.wrapping_sub(0x06);
            }
        }
        self.regs.a = a;
        self.regs.set_zero(a == 0);
        self.regs.set_half_carry(false);
        self.regs.set_carry(carry);
    }

    /// SP + signed immediate; flags come from the unsigned low-byte add.
    fn sp_plus_offset(&mut self, offset: u8) -> u16 {
        let sp = self.regs.sp;
        let res = sp.wrapping_add(offset as i8 as i16 as u16);
        self.regs.set_flags(
            false,
            false,
            (sp & 0x000F) + (offset as u16 & 0x000F) > 0x000F,
            (sp & 0x00FF) + offset as u16 > 0x00FF,
        );
        res
    }

    /// Service the highest-priority pending interrupt if IME allows it.
    /// Returns true when a vector was entered.
    fn handle_interrupts(&mut self, mmu: &mut Mmu) -> bool {
        let pending = mmu.pending_interrupts();
        if !self.ime || pending == 0 {
            return false;
        }

        let bit = pending.trailing_zeros() as usize;
        mmu.if_reg &= !(1u8 << bit);
        self.ime = false;
        self.halted = false;

        let pc = self.regs.pc;
        self.push_stack(mmu, pc);
        self.regs.pc = VECTORS[bit];
        self.tick(3);
        trace!("Servicing interrupt {bit} -> {:04X}", VECTORS[bit]);
        true
    }

    /// Execute one instruction, one halted cycle, or one interrupt dispatch.
    /// Returns the number of M-cycles consumed.
    pub fn step(&mut self, mmu: &mut Mmu) -> u8 {
        self.step_traced(mmu, None)
    }

    /// As [`Cpu::step`], recording the executed instruction to `trace`.
    pub fn step_traced(&mut self, mmu: &mut Mmu, trace: Option<&mut TraceLog>) -> u8 {
        self.step_cycles = 0;

        if self.ime_delay > 0 {
            self.ime_delay -= 1;
            if self.ime_delay == 0 {
                self.ime = true;
            }
        }

        if self.halted {
            if mmu.pending_interrupts() != 0 {
                self.halted = false;
            }
            self.tick(1);
        } else if !self.handle_interrupts(mmu) {
            let before = self.regs;
            let opcode = self.fetch8(mmu);
            let instr = PRIMARY[opcode as usize];
            if let Some(log) = trace {
                match instr {
                    // name the CB op without consuming it
                    Instruction::Prefix => {
                        let cb = CB[mmu.read_byte(self.regs.pc) as usize];
                        log.record(&before, opcode, &cb);
                    }
                    _ => log.record(&before, opcode, &instr),
                }
            }
            self.execute(mmu, instr);
        }

        self.cycles += self.step_cycles as u64;
        self.step_cycles
    }

    fn execute_cb(&mut self, mmu: &mut Mmu, instr: CbInstruction) {
        match instr {
            CbInstruction::Shift(op, target) => {
                let val = self.read_target(mmu, target);
                let res = self.shift(op, val);
                self.write_target(mmu, target, res);
            }
            CbInstruction::Bit(bit, target) => {
                let val = self.read_target(mmu, target);
                self.regs.set_zero(val & (1 << bit) == 0);
                self.regs.set_subtract(false);
                self.regs.set_half_carry(true);
            }
            CbInstruction::Res(bit, target) => {
                let val = self.read_target(mmu, target);
                self.write_target(mmu, target, val & !(1 << bit));
            }
            CbInstruction::Set(bit, target) => {
                let val = self.read_target(mmu, target);
                self.write_target(mmu, target, val | (1 << bit));
            }
        }
    }

    fn execute(&mut self, mmu: &mut Mmu, instr: Instruction) {
        match instr {
            Instruction::Nop => {}
            Instruction::Stop => {
                // STOP is two bytes; the second is ignored.
                self.fetch8(mmu);
            }
            Instruction::Halt => self.halted = true,
            Instruction::Di => {
                self.ime = false;
                self.ime_delay = 0;
            }
            Instruction::Ei => {
                if !self.ime && self.ime_delay == 0 {
                    self.ime_delay = 2;
                }
            }
            Instruction::Ld { dst, src } => {
                let val = self.read_target(mmu, src);
                self.write_target(mmu, dst, val);
            }
            Instruction::LdImm(target) => {
                let val = self.fetch8(mmu);
                self.write_target(mmu, target, val);
            }
            Instruction::LdPairImm(pair) => {
                let val = self.fetch16(mmu);
                self.set_pair(pair, val);
            }
            Instruction::StoreA(ind) => {
                let addr = self.indirect_addr(ind);
                self.write8(mmu, addr, self.regs.a);
            }
            Instruction::LoadA(ind) => {
                let addr = self.indirect_addr(ind);
                self.regs.a = self.read8(mmu, addr);
            }
            Instruction::StoreSp => {
                let addr = self.fetch16(mmu);
                let [hi, lo] = self.regs.sp.to_be_bytes();
                self.write8(mmu, addr, lo);
                self.write8(mmu, addr.wrapping_add(1), hi);
            }
            Instruction::LdhStore => {
                let offset = self.fetch8(mmu);
                self.write8(mmu, 0xFF00 | offset as u16, self.regs.a);
            }
            Instruction::LdhLoad => {
                let offset = self.fetch8(mmu);
                self.regs.a = self.read8(mmu, 0xFF00 | offset as u16);
            }
            Instruction::LdhStoreC => {
                self.write8(mmu, 0xFF00 | self.regs.c as u16, self.regs.a);
            }
            Instruction::LdhLoadC => {
                self.regs.a = self.read8(mmu, 0xFF00 | self.regs.c as u16);
            }
            Instruction::StoreAbs => {
                let addr = self.fetch16(mmu);
                self.write8(mmu, addr, self.regs.a);
            }
            Instruction::LoadAbs => {
                let addr = self.fetch16(mmu);
                self.regs.a = self.read8(mmu, addr);
            }
            Instruction::LdHlSpOffset => {
                let offset = self.fetch8(mmu);
                let res = self.sp_plus_offset(offset);
                self.regs.set_hl(res);
                self.tick(1);
            }
            Instruction::LdSpHl => {
                self.regs.sp = self.regs.hl();
                self.tick(1);
            }
            Instruction::Inc(target) => {
                let val = self.read_target(mmu, target);
                let res = self.inc8(val);
                self.write_target(mmu, target, res);
            }
            Instruction::Dec(target) => {
                let val = self.read_target(mmu, target);
                let res = self.dec8(val);
                self.write_target(mmu, target, res);
            }
            Instruction::IncPair(pair) => {
                let val = self.pair(pair).wrapping_add(1);
                self.set_pair(pair, val);
                self.tick(1);
            }
            Instruction::DecPair(pair) => {
                let val = self.pair(pair).wrapping_sub(1);
                self.set_pair(pair, val);
                self.tick(1);
            }
            Instruction::AddHl(pair) => {
                let hl = self.regs.hl();
                let val = self.pair(pair);
                self.regs.set_subtract(false);
                self.regs
                    .set_half_carry((hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF);
                self.regs.set_carry(hl as u32 + val as u32 > 0xFFFF);
                self.regs.set_hl(hl.wrapping_add(val));
                self.tick(1);
            }
            Instruction::AddSpOffset => {
                let offset = self.fetch8(mmu);
                self.regs.sp = self.sp_plus_offset(offset);
                self.tick(2);
            }
            Instruction::Alu(op, target) => {
                let val = self.read_target(mmu, target);
                self.alu(op, val);
            }
            Instruction::AluImm(op) => {
                let val = self.fetch8(mmu);
                self.alu(op, val);
            }
            Instruction::Rlca => self.rotate_a(ShiftOp::Rlc),
            Instruction::Rrca => self.rotate_a(ShiftOp::Rrc),
            Instruction::Rla => self.rotate_a(ShiftOp::Rl),
            Instruction::Rra => self.rotate_a(ShiftOp::Rr),
            Instruction::Daa => self.daa(),
            Instruction::Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.set_subtract(true);
                self.regs.set_half_carry(true);
            }
            Instruction::Scf => {
                self.regs.set_subtract(false);
                self.regs.set_half_carry(false);
                self.regs.set_carry(true);
            }
            Instruction::Ccf => {
                let carry = !self.regs.carry();
                self.regs.set_subtract(false);
                self.regs.set_half_carry(false);
                self.regs.set_carry(carry);
            }
            Instruction::Jr(cond) => {
                let offset = self.fetch8(mmu) as i8;
                if self.condition(cond) {
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                    self.tick(1);
                }
            }
            Instruction::Jp(cond) => {
                let addr = self.fetch16(mmu);
                if self.condition(cond) {
                    self.regs.pc = addr;
                    self.tick(1);
                }
            }
            Instruction::JpHl => self.regs.pc = self.regs.hl(),
            Instruction::Call(cond) => {
                let addr = self.fetch16(mmu);
                if self.condition(cond) {
                    self.tick(1);
                    let ret = self.regs.pc;
                    self.push_stack(mmu, ret);
                    self.regs.pc = addr;
                }
            }
            Instruction::Ret(Cond::Always) => {
                self.regs.pc = self.pop_stack(mmu);
                self.tick(1);
            }
            Instruction::Ret(cond) => {
                self.tick(1);
                if self.condition(cond) {
                    self.regs.pc = self.pop_stack(mmu);
                    self.tick(1);
                }
            }
            Instruction::Reti => {
                self.regs.pc = self.pop_stack(mmu);
                self.tick(1);
                self.ime = true;
                self.ime_delay = 0;
            }
            Instruction::Rst(vector) => {
                self.tick(1);
                let ret = self.regs.pc;
                self.push_stack(mmu, ret);
                self.regs.pc = vector;
            }
            Instruction::Push(pair) => {
                self.tick(1);
                let val = self.regs.get16(Self::stack_pair_reg(pair));
                self.push_stack(mmu, val);
            }
            Instruction::Pop(pair) => {
                let val = self.pop_stack(mmu);
                self.regs.set16(Self::stack_pair_reg(pair), val);
            }
            Instruction::Prefix => {
                let cb_op = self.fetch8(mmu);
                self.execute_cb(mmu, CB[cb_op as usize]);
            }
            Instruction::Illegal(opcode) => {
                warn!(
                    "Unknown opcode {opcode:#04X} at {:#06X}; treating as NOP",
                    self.regs.pc.wrapping_sub(1)
                );
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
