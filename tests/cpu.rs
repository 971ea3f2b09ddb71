use dotmatrix::cpu::Cpu;
use dotmatrix::mmu::Mmu;
use dotmatrix::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, Reg16};

const CODE: u16 = 0xC000;

/// Place `program` in work RAM and point PC at it.
fn setup(program: &[u8]) -> (Cpu, Mmu) {
    let mut mmu = Mmu::new();
    mmu.if_reg = 0;
    for (i, &b) in program.iter().enumerate() {
        mmu.write_byte(CODE + i as u16, b);
    }
    let mut cpu = Cpu::new();
    cpu.regs.pc = CODE;
    cpu.regs.sp = 0xDFF0;
    (cpu, mmu)
}

fn run_one(program: &[u8], init: impl FnOnce(&mut Cpu, &mut Mmu)) -> (Cpu, Mmu, u8) {
    let (mut cpu, mut mmu) = setup(program);
    init(&mut cpu, &mut mmu);
    let cycles = cpu.step(&mut mmu);
    (cpu, mmu, cycles)
}

#[test]
fn inc_r8_flags() {
    let (cpu, _, _) = run_one(&[0x04], |cpu, _| {
        cpu.regs.b = 0x0F;
        cpu.regs.set_flags(false, true, false, true);
    });
    assert_eq!(cpu.regs.b, 0x10);
    assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);

    let (cpu, _, _) = run_one(&[0x3C], |cpu, _| {
        cpu.regs.a = 0xFF;
        cpu.regs.set_flags(false, false, false, false);
    });
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H);
}

#[test]
fn dec_r8_flags() {
    let (cpu, _, _) = run_one(&[0x05], |cpu, _| {
        cpu.regs.b = 0x10;
        cpu.regs.set_flags(false, false, false, false);
    });
    assert_eq!(cpu.regs.b, 0x0F);
    assert_eq!(cpu.regs.f(), FLAG_N | FLAG_H);

    let (cpu, _, _) = run_one(&[0x0D], |cpu, _| {
        cpu.regs.c = 0x01;
        cpu.regs.set_flags(false, false, false, true);
    });
    assert_eq!(cpu.regs.c, 0x00);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_N | FLAG_C);
}

#[test]
fn add_half_carry_is_source_independent() {
    // ADD A,B
    let (reg, _, _) = run_one(&[0x80], |cpu, _| {
        cpu.regs.a = 0x01;
        cpu.regs.b = 0x0F;
    });
    assert_eq!(reg.regs.a, 0x10);
    assert_eq!(reg.regs.f(), FLAG_H);

    // ADD A,(HL)
    let (ind, _, _) = run_one(&[0x86], |cpu, mmu| {
        cpu.regs.a = 0x01;
        cpu.regs.set_hl(0xC100);
        mmu.write_byte(0xC100, 0x0F);
    });
    // ADD A,n8
    let (imm, _, _) = run_one(&[0xC6, 0x0F], |cpu, _| cpu.regs.a = 0x01);

    for cpu in [&ind, &imm] {
        assert_eq!(cpu.regs.a, reg.regs.a);
        assert_eq!(cpu.regs.f(), reg.regs.f());
    }
}

#[test]
fn adc_and_sbc_use_carry_in() {
    let (cpu, _, _) = run_one(&[0x88], |cpu, _| {
        cpu.regs.a = 0xFE;
        cpu.regs.b = 0x01;
        cpu.regs.set_carry(true);
    });
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H | FLAG_C);

    let (cpu, _, _) = run_one(&[0x98], |cpu, _| {
        cpu.regs.a = 0x10;
        cpu.regs.b = 0x0F;
        cpu.regs.set_carry(true);
    });
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_N | FLAG_H);
}

#[test]
fn cp_leaves_a_untouched() {
    let (cpu, _, _) = run_one(&[0xFE, 0x42], |cpu, _| cpu.regs.a = 0x40);
    assert_eq!(cpu.regs.a, 0x40);
    assert_eq!(cpu.regs.f(), FLAG_N | FLAG_H | FLAG_C);
}

fn daa_after(a: u8, operand: u8, subtract: bool) -> Cpu {
    let op = if subtract { 0xD6 } else { 0xC6 };
    let (mut cpu, mut mmu) = setup(&[op, operand, 0x27]);
    cpu.regs.a = a;
    cpu.step(&mut mmu);
    cpu.step(&mut mmu);
    cpu
}

#[test]
fn daa_correction_vectors() {
    // (a, operand, subtract, expected a, expected carry)
    let vectors = [
        (0x09, 0x01, false, 0x10, false),
        (0x15, 0x27, false, 0x42, false),
        (0x45, 0x55, false, 0x00, true),
        (0x99, 0x01, false, 0x00, true),
        (0x90, 0x20, false, 0x10, true),
        (0x42, 0x15, true, 0x27, false),
        (0x10, 0x01, true, 0x09, false),
        (0x00, 0x01, true, 0x99, true),
    ];
    for (a, operand, subtract, want, carry) in vectors {
        let cpu = daa_after(a, operand, subtract);
        assert_eq!(cpu.regs.a, want, "{a:02X} {operand:02X} sub={subtract}");
        assert_eq!(cpu.regs.carry(), carry, "{a:02X} {operand:02X} sub={subtract}");
        assert_eq!(cpu.regs.zero(), want == 0);
        assert!(!cpu.regs.half_carry());
        assert_eq!(cpu.regs.subtract(), subtract);
    }
}

#[test]
fn add_hl_keeps_zero_flag() {
    let (cpu, _, cycles) = run_one(&[0x09], |cpu, _| {
        cpu.regs.set_hl(0x0FFF);
        cpu.regs.set16(Reg16::BC, 0x0001);
        cpu.regs.set_flags(true, true, false, false);
    });
    assert_eq!(cpu.regs.hl(), 0x1000);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H);
    assert_eq!(cycles, 2);

    let (cpu, _, _) = run_one(&[0x29], |cpu, _| {
        cpu.regs.set_hl(0x8000);
        cpu.regs.set_flags(false, false, false, false);
    });
    assert_eq!(cpu.regs.hl(), 0x0000);
    assert_eq!(cpu.regs.f(), FLAG_C);
}

#[test]
fn add_sp_signed_offset() {
    let (cpu, _, cycles) = run_one(&[0xE8, 0xFF], |cpu, _| cpu.regs.sp = 0x0001);
    assert_eq!(cpu.regs.sp, 0x0000);
    assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);
    assert_eq!(cycles, 4);

    let (cpu, _, cycles) = run_one(&[0xF8, 0x02], |cpu, _| cpu.regs.sp = 0xFFF8);
    assert_eq!(cpu.regs.hl(), 0xFFFA);
    assert_eq!(cpu.regs.sp, 0xFFF8);
    assert_eq!(cycles, 3);
}

#[test]
fn pop_af_masks_low_nibble() {
    let (mut cpu, mut mmu) = setup(&[0xC5, 0xF1]);
    cpu.regs.set16(Reg16::BC, 0x12FF);
    assert_eq!(cpu.step(&mut mmu), 4);
    assert_eq!(cpu.step(&mut mmu), 3);
    assert_eq!(cpu.regs.get16(Reg16::AF), 0x12F0);
}

#[test]
fn call_pushes_high_byte_first() {
    let (cpu, mmu, cycles) = run_one(&[0xCD, 0x34, 0x12], |_, _| {});
    assert_eq!(cycles, 6);
    assert_eq!(cpu.regs.pc, 0x1234);
    assert_eq!(cpu.regs.sp, 0xDFEE);
    assert_eq!(mmu.read_byte(0xDFEF), 0xC0);
    assert_eq!(mmu.read_byte(0xDFEE), 0x03);
}

#[test]
fn conditional_branch_timing() {
    // (program, zero flag, expected cycles)
    let cases: &[(&[u8], bool, u8)] = &[
        (&[0x20, 0x05], false, 3), // JR NZ taken
        (&[0x20, 0x05], true, 2),  // JR NZ not taken
        (&[0xCA, 0x00, 0xC1], true, 4),
        (&[0xCA, 0x00, 0xC1], false, 3),
        (&[0xC4, 0x00, 0xC1], false, 6),
        (&[0xC4, 0x00, 0xC1], true, 3),
        (&[0xC8], true, 5),
        (&[0xC8], false, 2),
    ];
    for &(program, zero, want) in cases {
        let (_, _, cycles) = run_one(program, |cpu, _| cpu.regs.set_zero(zero));
        assert_eq!(cycles, want, "{program:02X?} z={zero}");
    }
}

#[test]
fn instruction_timing() {
    let cases: &[(&[u8], u8)] = &[
        (&[0x00], 1),
        (&[0x06, 0x12], 2),
        (&[0x36, 0x12], 3),
        (&[0x01, 0x34, 0x12], 3),
        (&[0x08, 0x00, 0xC1], 5),
        (&[0xE0, 0x80], 3),
        (&[0xE2], 2),
        (&[0xEA, 0x00, 0xC1], 4),
        (&[0xF9], 2),
        (&[0x03], 2),
        (&[0x34], 3),
        (&[0xE9], 1),
        (&[0xC9], 4),
        (&[0xD9], 4),
        (&[0xFF], 4),
        (&[0x10, 0x00], 2),
        (&[0xCB, 0x37], 2),
        (&[0xCB, 0x46], 3),
        (&[0xCB, 0x06], 4),
        (&[0xCB, 0xC6], 4),
    ];
    for &(program, want) in cases {
        let (_, _, cycles) = run_one(program, |cpu, _| cpu.regs.set_hl(0xC100));
        assert_eq!(cycles, want, "{program:02X?}");
    }
}

#[test]
fn cb_ops_on_hl() {
    let (cpu, mmu, _) = run_one(&[0xCB, 0x36], |cpu, mmu| {
        cpu.regs.set_hl(0xC100);
        mmu.write_byte(0xC100, 0xA5);
    });
    assert_eq!(mmu.read_byte(0xC100), 0x5A);
    assert_eq!(cpu.regs.f(), 0);

    let (_, mmu, _) = run_one(&[0xCB, 0xFE], |cpu, _| cpu.regs.set_hl(0xC100));
    assert_eq!(mmu.read_byte(0xC100), 0x80);

    let (cpu, _, _) = run_one(&[0xCB, 0x7F], |cpu, _| {
        cpu.regs.a = 0x7F;
        cpu.regs.set_carry(true);
    });
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_H | FLAG_C);
}

#[test]
fn rotate_a_clears_zero() {
    let (cpu, _, _) = run_one(&[0x17], |cpu, _| {
        cpu.regs.a = 0x80;
        cpu.regs.set_flags(false, false, false, false);
    });
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(cpu.regs.f(), FLAG_C);
}

#[test]
fn interrupt_priority_and_dispatch() {
    let (mut cpu, mut mmu) = setup(&[0x00]);
    cpu.ime = true;
    mmu.ie_reg = 0x1F;
    mmu.if_reg = 0x1F;

    assert_eq!(cpu.step(&mut mmu), 5);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(mmu.if_reg, 0x1E);
    assert!(!cpu.ime);
    assert_eq!(mmu.read_byte(cpu.regs.sp.wrapping_add(1)), 0xC0);
    assert_eq!(mmu.read_byte(cpu.regs.sp), 0x00);

    // IME is still off, so the next step executes code instead of dispatching.
    cpu.step(&mut mmu);
    assert_eq!(mmu.if_reg, 0x1E);
    assert!(!cpu.ime);
}

#[test]
fn ei_takes_effect_after_next_instruction() {
    let (mut cpu, mut mmu) = setup(&[0xFB, 0x00, 0x00]);
    mmu.ie_reg = 0x04;
    mmu.if_reg = 0x04;

    cpu.step(&mut mmu);
    assert!(!cpu.ime);
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.pc, CODE + 2);
    assert_eq!(cpu.step(&mut mmu), 5);
    assert_eq!(cpu.regs.pc, 0x0050);
    assert_eq!(mmu.if_reg, 0x00);
}

#[test]
fn di_cancels_pending_ei() {
    let (mut cpu, mut mmu) = setup(&[0xFB, 0xF3, 0x00, 0x00]);
    mmu.ie_reg = 0x01;
    mmu.if_reg = 0x01;
    for _ in 0..4 {
        cpu.step(&mut mmu);
    }
    assert!(!cpu.ime);
    assert_eq!(cpu.regs.pc, CODE + 4);
}

#[test]
fn halt_waits_for_pending_interrupt() {
    let (mut cpu, mut mmu) = setup(&[0x76, 0x3C]);
    mmu.ie_reg = 0x04;

    cpu.step(&mut mmu);
    assert!(cpu.halted);
    assert_eq!(cpu.step(&mut mmu), 1);
    assert!(cpu.halted);
    assert_eq!(cpu.regs.pc, CODE + 1);

    mmu.if_reg = 0x04;
    assert_eq!(cpu.step(&mut mmu), 1);
    assert!(!cpu.halted);

    // IME is off: execution resumes after HALT without dispatching.
    let a = cpu.regs.a;
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.a, a.wrapping_add(1));
}

#[test]
fn illegal_opcode_is_a_one_cycle_nop() {
    let (cpu, _, cycles) = run_one(&[0xD3], |_, _| {});
    assert_eq!(cycles, 1);
    assert_eq!(cpu.regs.pc, CODE + 1);
}

#[test]
fn ld_hl_increment_and_decrement() {
    let (mut cpu, mut mmu) = setup(&[0x22, 0x3A]);
    cpu.regs.a = 0x77;
    cpu.regs.set_hl(0xC100);
    cpu.step(&mut mmu);
    assert_eq!(mmu.read_byte(0xC100), 0x77);
    assert_eq!(cpu.regs.hl(), 0xC101);
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.hl(), 0xC100);
    assert_eq!(cpu.regs.a, 0x00);
}
