//! Opcode decoding for the SM83 instruction set.
//!
//! Every opcode byte maps to a tagged [`Instruction`] through a static table
//! built at compile time. The 0xCB-prefixed page decodes into
//! [`CbInstruction`] from its three bit fields (operand register, bit index,
//! operation class). Decoding follows the x/y/z octal layout described in
//! gbdev.io/gb-opcodes.

use std::fmt;

/// 8-bit operand selected by a 3-bit register field. `HlInd` is `(HL)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    B,
    C,
    D,
    E,
    H,
    L,
    HlInd,
    A,
}

impl Target {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Target::B,
            1 => Target::C,
            2 => Target::D,
            3 => Target::E,
            4 => Target::H,
            5 => Target::L,
            6 => Target::HlInd,
            _ => Target::A,
        }
    }
}

/// 16-bit register pair used by LD/INC/DEC/ADD HL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pair {
    BC,
    DE,
    HL,
    SP,
}

impl Pair {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Pair::BC,
            1 => Pair::DE,
            2 => Pair::HL,
            _ => Pair::SP,
        }
    }
}

/// 16-bit register pair used by PUSH/POP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackPair {
    BC,
    DE,
    HL,
    AF,
}

impl StackPair {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => StackPair::BC,
            1 => StackPair::DE,
            2 => StackPair::HL,
            _ => StackPair::AF,
        }
    }
}

/// Memory operand of the `LD (rr),A` / `LD A,(rr)` family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indirect {
    BC,
    DE,
    HlInc,
    HlDec,
}

impl Indirect {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Indirect::BC,
            1 => Indirect::DE,
            2 => Indirect::HlInc,
            _ => Indirect::HlDec,
        }
    }
}

/// Branch condition. `Always` is the unconditional form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    NZ,
    Z,
    NC,
    C,
    Always,
}

impl Cond {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Cond::NZ,
            1 => Cond::Z,
            2 => Cond::NC,
            _ => Cond::C,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl ShiftOp {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => ShiftOp::Rlc,
            1 => ShiftOp::Rrc,
            2 => ShiftOp::Rl,
            3 => ShiftOp::Rr,
            4 => ShiftOp::Sla,
            5 => ShiftOp::Sra,
            6 => ShiftOp::Swap,
            _ => ShiftOp::Srl,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    /// LD r,r'
    Ld { dst: Target, src: Target },
    /// LD r,n8
    LdImm(Target),
    /// LD rr,n16
    LdPairImm(Pair),
    /// LD (rr),A
    StoreA(Indirect),
    /// LD A,(rr)
    LoadA(Indirect),
    /// LD (a16),SP
    StoreSp,
    /// LDH (a8),A
    LdhStore,
    /// LDH A,(a8)
    LdhLoad,
    /// LD (C),A
    LdhStoreC,
    /// LD A,(C)
    LdhLoadC,
    /// LD (a16),A
    StoreAbs,
    /// LD A,(a16)
    LoadAbs,
    /// LD HL,SP+e8
    LdHlSpOffset,
    /// LD SP,HL
    LdSpHl,
    Inc(Target),
    Dec(Target),
    IncPair(Pair),
    DecPair(Pair),
    AddHl(Pair),
    /// ADD SP,e8
    AddSpOffset,
    Alu(AluOp, Target),
    AluImm(AluOp),
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr(Cond),
    Jp(Cond),
    JpHl,
    Call(Cond),
    Ret(Cond),
    Reti,
    Rst(u16),
    Push(StackPair),
    Pop(StackPair),
    /// 0xCB prefix; the next byte selects a [`CbInstruction`].
    Prefix,
    /// Unassigned encoding.
    Illegal(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CbInstruction {
    Shift(ShiftOp, Target),
    Bit(u8, Target),
    Res(u8, Target),
    Set(u8, Target),
}

/// Decode a primary-page opcode.
pub const fn decode(opcode: u8) -> Instruction {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let q = y & 0x01;

    match x {
        0 => match z {
            0 => match y {
                0 => Instruction::Nop,
                1 => Instruction::StoreSp,
                2 => Instruction::Stop,
                3 => Instruction::Jr(Cond::Always),
                _ => Instruction::Jr(Cond::from_bits(y - 4)),
            },
            1 => {
                if q == 0 {
                    Instruction::LdPairImm(Pair::from_bits(p))
                } else {
                    Instruction::AddHl(Pair::from_bits(p))
                }
            }
            2 => {
                if q == 0 {
                    Instruction::StoreA(Indirect::from_bits(p))
                } else {
                    Instruction::LoadA(Indirect::from_bits(p))
                }
            }
            3 => {
                if q == 0 {
                    Instruction::IncPair(Pair::from_bits(p))
                } else {
                    Instruction::DecPair(Pair::from_bits(p))
                }
            }
            4 => Instruction::Inc(Target::from_bits(y)),
            5 => Instruction::Dec(Target::from_bits(y)),
            6 => Instruction::LdImm(Target::from_bits(y)),
            _ => match y {
                0 => Instruction::Rlca,
                1 => Instruction::Rrca,
                2 => Instruction::Rla,
                3 => Instruction::Rra,
                4 => Instruction::Daa,
                5 => Instruction::Cpl,
                6 => Instruction::Scf,
                _ => Instruction::Ccf,
            },
        },
        1 => {
            if y == 6 && z == 6 {
                Instruction::Halt
            } else {
                Instruction::Ld {
                    dst: Target::from_bits(y),
                    src: Target::from_bits(z),
                }
            }
        }
        2 => Instruction::Alu(AluOp::from_bits(y), Target::from_bits(z)),
        _ => match z {
            0 => match y {
                0..=3 => Instruction::Ret(Cond::from_bits(y)),
                4 => Instruction::LdhStore,
                5 => Instruction::AddSpOffset,
                6 => Instruction::LdhLoad,
                _ => Instruction::LdHlSpOffset,
            },
            1 => {
                if q == 0 {
                    Instruction::Pop(StackPair::from_bits(p))
                } else {
                    match p {
                        0 => Instruction::Ret(Cond::Always),
                        1 => Instruction::Reti,
                        2 => Instruction::JpHl,
                        _ => Instruction::LdSpHl,
                    }
                }
            }
            2 => match y {
                0..=3 => Instruction::Jp(Cond::from_bits(y)),
                4 => Instruction::LdhStoreC,
                5 => Instruction::StoreAbs,
                6 => Instruction::LdhLoadC,
                _ => Instruction::LoadAbs,
            },
            3 => match y {
                0 => Instruction::Jp(Cond::Always),
                1 => Instruction::Prefix,
                6 => Instruction::Di,
                7 => Instruction::Ei,
                _ => Instruction::Illegal(opcode),
            },
            4 => {
                if y < 4 {
                    Instruction::Call(Cond::from_bits(y))
                } else {
                    Instruction::Illegal(opcode)
                }
            }
            5 => {
                if q == 0 {
                    Instruction::Push(StackPair::from_bits(p))
                } else if p == 0 {
                    Instruction::Call(Cond::Always)
                } else {
                    Instruction::Illegal(opcode)
                }
            }
            6 => Instruction::AluImm(AluOp::from_bits(y)),
            _ => Instruction::Rst((y as u16) * 8),
        },
    }
}

/// Decode a 0xCB-page opcode.
pub const fn decode_cb(opcode: u8) -> CbInstruction {
    let target = Target::from_bits(opcode);
    let bit = (opcode >> 3) & 0x07;
    match opcode >> 6 {
        0 => CbInstruction::Shift(ShiftOp::from_bits(bit), target),
        1 => CbInstruction::Bit(bit, target),
        2 => CbInstruction::Res(bit, target),
        _ => CbInstruction::Set(bit, target),
    }
}

const fn build_primary() -> [Instruction; 256] {
    let mut table = [Instruction::Nop; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode(i as u8);
        i += 1;
    }
    table
}

const fn build_cb() -> [CbInstruction; 256] {
    let mut table = [CbInstruction::Bit(0, Target::B); 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode_cb(i as u8);
        i += 1;
    }
    table
}

pub static PRIMARY: [Instruction; 256] = build_primary();
pub static CB: [CbInstruction; 256] = build_cb();

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Target::B => "B",
            Target::C => "C",
            Target::D => "D",
            Target::E => "E",
            Target::H => "H",
            Target::L => "L",
            Target::HlInd => "(HL)",
            Target::A => "A",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pair::BC => "BC",
            Pair::DE => "DE",
            Pair::HL => "HL",
            Pair::SP => "SP",
        })
    }
}

impl fmt::Display for StackPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StackPair::BC => "BC",
            StackPair::DE => "DE",
            StackPair::HL => "HL",
            StackPair::AF => "AF",
        })
    }
}

impl fmt::Display for Indirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Indirect::BC => "(BC)",
            Indirect::DE => "(DE)",
            Indirect::HlInc => "(HL+)",
            Indirect::HlDec => "(HL-)",
        })
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cond::NZ => "NZ,",
            Cond::Z => "Z,",
            Cond::NC => "NC,",
            Cond::C => "C,",
            Cond::Always => "",
        })
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AluOp::Add => "ADD A,",
            AluOp::Adc => "ADC A,",
            AluOp::Sub => "SUB A,",
            AluOp::Sbc => "SBC A,",
            AluOp::And => "AND A,",
            AluOp::Xor => "XOR A,",
            AluOp::Or => "OR A,",
            AluOp::Cp => "CP A,",
        })
    }
}

impl fmt::Display for ShiftOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShiftOp::Rlc => "RLC",
            ShiftOp::Rrc => "RRC",
            ShiftOp::Rl => "RL",
            ShiftOp::Rr => "RR",
            ShiftOp::Sla => "SLA",
            ShiftOp::Sra => "SRA",
            ShiftOp::Swap => "SWAP",
            ShiftOp::Srl => "SRL",
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Nop => write!(f, "NOP"),
            Instruction::Stop => write!(f, "STOP"),
            Instruction::Halt => write!(f, "HALT"),
            Instruction::Di => write!(f, "DI"),
            Instruction::Ei => write!(f, "EI"),
            Instruction::Ld { dst, src } => write!(f, "LD {dst},{src}"),
            Instruction::LdImm(t) => write!(f, "LD {t},n8"),
            Instruction::LdPairImm(p) => write!(f, "LD {p},n16"),
            Instruction::StoreA(i) => write!(f, "LD {i},A"),
            Instruction::LoadA(i) => write!(f, "LD A,{i}"),
            Instruction::StoreSp => write!(f, "LD (a16),SP"),
            Instruction::LdhStore => write!(f, "LDH (a8),A"),
            Instruction::LdhLoad => write!(f, "LDH A,(a8)"),
            Instruction::LdhStoreC => write!(f, "LD (C),A"),
            Instruction::LdhLoadC => write!(f, "LD A,(C)"),
            Instruction::StoreAbs => write!(f, "LD (a16),A"),
            Instruction::LoadAbs => write!(f, "LD A,(a16)"),
            Instruction::LdHlSpOffset => write!(f, "LD HL,SP+e8"),
            Instruction::LdSpHl => write!(f, "LD SP,HL"),
            Instruction::Inc(t) => write!(f, "INC {t}"),
            Instruction::Dec(t) => write!(f, "DEC {t}"),
            Instruction::IncPair(p) => write!(f, "INC {p}"),
            Instruction::DecPair(p) => write!(f, "DEC {p}"),
            Instruction::AddHl(p) => write!(f, "ADD HL,{p}"),
            Instruction::AddSpOffset => write!(f, "ADD SP,e8"),
            Instruction::Alu(op, t) => write!(f, "{op}{t}"),
            Instruction::AluImm(op) => write!(f, "{op}n8"),
            Instruction::Rlca => write!(f, "RLCA"),
            Instruction::Rrca => write!(f, "RRCA"),
            Instruction::Rla => write!(f, "RLA"),
            Instruction::Rra => write!(f, "RRA"),
            Instruction::Daa => write!(f, "DAA"),
            Instruction::Cpl => write!(f, "CPL"),
            Instruction::Scf => write!(f, "SCF"),
            Instruction::Ccf => write!(f, "CCF"),
            Instruction::Jr(c) => write!(f, "JR {c}e8"),
            Instruction::Jp(c) => write!(f, "JP {c}a16"),
            Instruction::JpHl => write!(f, "JP HL"),
            Instruction::Call(c) => write!(f, "CALL {c}a16"),
            Instruction::Ret(Cond::Always) => write!(f, "RET"),
            Instruction::Ret(c) => write!(f, "RET {}", c.to_string().trim_end_matches(',')),
            Instruction::Reti => write!(f, "RETI"),
            Instruction::Rst(v) => write!(f, "RST ${v:02X}"),
            Instruction::Push(p) => write!(f, "PUSH {p}"),
            Instruction::Pop(p) => write!(f, "POP {p}"),
            Instruction::Prefix => write!(f, "PREFIX CB"),
            Instruction::Illegal(op) => write!(f, "ILLEGAL ${op:02X}"),
        }
    }
}

impl fmt::Display for CbInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CbInstruction::Shift(op, t) => write!(f, "{op} {t}"),
            CbInstruction::Bit(b, t) => write!(f, "BIT {b},{t}"),
            CbInstruction::Res(b, t) => write!(f, "RES {b},{t}"),
            CbInstruction::Set(b, t) => write!(f, "SET {b},{t}"),
        }
    }
}
