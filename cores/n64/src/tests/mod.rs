// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Whole-system tests running small hand-assembled programs.

use std::sync::{Arc, Mutex};

use common::{
    testing::{self, TestStatus},
    Time, TimeS,
};

use crate::{
    cpu::{Cpu, Exception, Status, RESET_VECTOR},
    hw::Interrupt,
    scheduling::N64Event,
    BootError, ExecutionBackend, HostError, N64Config, Nintendo64, CPU_CLOCK,
};

/// Where test programs are placed, physically and in kseg0.
const PROGRAM: u32 = 0x1000;
const PROGRAM_VADDR: u64 = 0xFFFF_FFFF_8000_1000;

mod asm {
    pub const NOP: u32 = 0;
    pub const TLBWI: u32 = 0x4200_0002;

    pub fn imm(op: u32, rs: u32, rt: u32, imm: i16) -> u32 {
        (op << 26) | (rs << 21) | (rt << 16) | (imm as u16 as u32)
    }

    pub fn addiu(rt: u32, rs: u32, value: i16) -> u32 {
        imm(0x09, rs, rt, value)
    }

    pub fn lui(rt: u32, value: u16) -> u32 {
        imm(0x0F, 0, rt, value as i16)
    }

    pub fn ori(rt: u32, rs: u32, value: u16) -> u32 {
        imm(0x0D, rs, rt, value as i16)
    }

    pub fn lw(rt: u32, offset: i16, base: u32) -> u32 {
        imm(0x23, base, rt, offset)
    }

    pub fn sw(rt: u32, offset: i16, base: u32) -> u32 {
        imm(0x2B, base, rt, offset)
    }

    pub fn beq(rs: u32, rt: u32, offset: i16) -> u32 {
        imm(0x04, rs, rt, offset)
    }

    pub fn beql(rs: u32, rt: u32, offset: i16) -> u32 {
        imm(0x14, rs, rt, offset)
    }

    pub fn mtc0(rt: u32, rd: u32) -> u32 {
        (0x10 << 26) | (4 << 21) | (rt << 16) | (rd << 11)
    }

    pub fn cache(op: u32, offset: i16, base: u32) -> u32 {
        imm(0x2F, base, op, offset)
    }

    /// Spin forever.
    pub fn halt() -> [u32; 2] {
        [beq(0, 0, -1), NOP]
    }
}

/// A system in kernel mode with exceptions enabled, about to run `program`.
fn boot(program: &[u32]) -> Box<Nintendo64> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut n64 = Nintendo64::new(N64Config::default());
    for (i, inst) in program.iter().enumerate() {
        n64.write_physical::<u32>(PROGRAM + i as u32 * 4, *inst);
    }
    n64.cpu.cop0.status = Status::new();
    Cpu::status_changed(&mut n64);
    n64.cpu.pc = PROGRAM_VADDR;
    n64
}

fn step(n64: &mut Box<Nintendo64>) {
    Cpu::step(n64);
}

#[test]
fn kseg0_store_load() {
    let mut n64 = boot(&[
        asm::lui(1, 0xDEAD),
        asm::ori(1, 1, 0xBEEF),
        asm::lui(2, 0x8000),
        asm::sw(1, 0x100, 2),
        asm::lw(3, 0x100, 2),
        asm::halt()[0],
        asm::halt()[1],
    ]);
    testing::run_until(&mut n64, 20, step, |n64| {
        if n64.cpu.reg(3) == 0xFFFF_FFFF_DEAD_BEEF {
            TestStatus::Success
        } else {
            TestStatus::Running
        }
    });
    assert_eq!(n64.read_virtual::<u32>(0xFFFF_FFFF_8000_0100), 0xDEAD_BEEF);
}

#[test]
fn cache_is_transparent_until_written_back() {
    let mut n64 = boot(&[
        asm::lui(1, 0x1234),
        asm::lui(2, 0x8000),
        asm::sw(1, 0x200, 2),
        // Hit_Write_Back on the D-cache
        asm::cache(0b110_01, 0x200, 2),
        asm::halt()[0],
        asm::halt()[1],
    ]);
    for _ in 0..3 {
        Cpu::step(&mut n64);
    }
    // The store is only in the D-cache so far
    assert_eq!(n64.read_virtual::<u32>(0xFFFF_FFFF_8000_0200), 0x1234_0000);
    assert_eq!(n64.read_physical::<u32>(0x200), 0);
    assert_eq!(n64.read_virtual::<u32>(0xFFFF_FFFF_A000_0200), 0);

    Cpu::step(&mut n64);
    assert_eq!(n64.read_physical::<u32>(0x200), 0x1234_0000);
    assert_eq!(n64.read_virtual::<u32>(0xFFFF_FFFF_A000_0200), 0x1234_0000);
}

#[test]
fn kuseg_goes_through_tlb() {
    let mut n64 = boot(&[
        asm::mtc0(1, 10), // EntryHi
        asm::mtc0(2, 2),  // EntryLo0
        asm::mtc0(3, 3),  // EntryLo1
        asm::mtc0(0, 5),  // PageMask
        asm::mtc0(0, 0),  // Index
        asm::TLBWI,
        asm::sw(4, 4, 5),
        asm::lw(6, 4, 5),
        asm::sw(4, 0x1000, 5),
        asm::halt()[0],
        asm::halt()[1],
    ]);
    // 0x0040_0000 -> 0x0010_0000, 0x0040_1000 -> 0x0020_0000; dirty, valid, global
    n64.cpu.set_reg(1, 0x0040_0000);
    n64.cpu.set_reg(2, (0x100 << 6) | 0b010_1_1_1);
    n64.cpu.set_reg(3, (0x200 << 6) | 0b010_1_1_1);
    n64.cpu.set_reg(4, 0x5555_AAAA);
    n64.cpu.set_reg(5, 0x0040_0000);

    testing::run_until(&mut n64, 30, step, |n64| {
        if n64.cpu.exception_latched {
            TestStatus::FailedAt(format!("exception {}", n64.cpu.cop0.cause.exc_code()))
        } else if n64.cpu.reg(6) == 0x5555_AAAA && n64.cpu.pc == PROGRAM_VADDR + 0x24 {
            TestStatus::Success
        } else {
            TestStatus::Running
        }
    });
    assert_eq!(n64.read_physical::<u32>(0x0010_0004), 0x5555_AAAA);
    assert_eq!(n64.read_physical::<u32>(0x0020_0000), 0x5555_AAAA);
}

#[test]
fn tlb_refill_uses_refill_vector() {
    let mut n64 = boot(&[]);
    n64.cpu.current_pc = PROGRAM_VADDR;
    let _ = n64.read_virtual::<u32>(0x0080_0010);
    assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::TlbLoad as u8);
    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0000);
    assert_eq!(n64.cpu.cop0.bad_vaddr, 0x0080_0010);
    assert_eq!(n64.cpu.cop0.entry_hi & !0xFF, 0x0080_0000);
    assert_eq!(n64.cpu.cop0.epc, PROGRAM_VADDR);

    // Nested misses go to the general vector
    n64.cpu.exception_latched = false;
    n64.write_virtual::<u32>(0x0080_0010, 1);
    assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::TlbStore as u8);
    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0180);
}

#[test]
fn xtlb_refill_in_64bit_mode() {
    let mut n64 = boot(&[]);
    n64.cpu.cop0.status.set_kx(true);
    Cpu::status_changed(&mut n64);
    let _ = n64.read_virtual::<u32>(0x0000_0001_0000_0000);
    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0080);
}

#[test]
fn tlb_invalid_and_modified() {
    let mut n64 = boot(&[]);
    // Even page invalid, odd page valid but clean
    n64.cpu.tlb.entries[3].write(0, 0x0040_0000, 0b010_0_0_1, (0x200 << 6) | 0b010_0_1_1);

    let _ = n64.read_virtual::<u32>(0x0040_0000);
    assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::TlbLoad as u8);
    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0180);

    let mut n64 = boot(&[]);
    n64.cpu.tlb.entries[3].write(0, 0x0040_0000, 0b010_0_0_1, (0x200 << 6) | 0b010_0_1_1);
    assert_eq!(n64.read_virtual::<u32>(0x0040_1000), 0);
    assert!(!n64.cpu.exception_latched);
    n64.write_virtual::<u32>(0x0040_1000, 1);
    assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::TlbModified as u8);
    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0180);
    assert_eq!(n64.read_physical::<u32>(0x0020_0000), 0);
}

#[test]
fn masked_interrupt_waits_for_im() {
    let mut n64 = boot(&asm::halt());
    n64.cpu.cop0.status.set_ie(true);
    Cpu::status_changed(&mut n64);
    n64.raise_interrupt(Interrupt::Pi);
    n64.mi_write(crate::addr::MI_MASK, 1 << 9);
    assert_eq!(n64.cpu.cop0.cause.ip() & 4, 4);

    for _ in 0..10 {
        Cpu::step(&mut n64);
    }
    assert!(!n64.cpu.cop0.status.exl());

    // Unmask IP2 while the CPU sits in the branch
    let status = u32::from(n64.cpu.cop0.status) | 0x400;
    Cpu::set_cop0_reg(&mut n64, 12, status as u64);
    Cpu::step(&mut n64);
    assert!(n64.cpu.cop0.status.exl());
    assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::Interrupt as u8);
    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0184);
    // Either at the branch or in its delay slot, EPC points at the branch
    assert_eq!(n64.cpu.cop0.epc, PROGRAM_VADDR);

    // Not taken again while EXL is set
    Cpu::step(&mut n64);
    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0188);
}

#[test]
fn delay_slots_and_likely_branches() {
    let mut n64 = boot(&[
        asm::addiu(1, 0, 1),
        asm::beq(0, 0, 2),
        asm::addiu(2, 0, 2),
        asm::addiu(3, 0, 3),
        asm::beql(0, 1, 2),
        asm::addiu(4, 0, 4),
        asm::addiu(5, 0, 5),
        asm::halt()[0],
        asm::halt()[1],
    ]);
    testing::run_until(&mut n64, 20, step, |n64| match n64.cpu.reg(5) {
        5 => TestStatus::Success,
        _ => TestStatus::Running,
    });
    assert_eq!(n64.cpu.reg(2), 2);
    assert_eq!(n64.cpu.reg(3), 0);
    assert_eq!(n64.cpu.reg(4), 0);
}

#[test]
fn compare_fires_at_half_clock() {
    let mut n64 = boot(&asm::halt());
    let count = n64.cpu.count();
    Cpu::set_cop0_reg(&mut n64, 11, (count + 100) as u64);

    n64.run(150).unwrap();
    assert_eq!(n64.cpu.cop0.cause.ip() & 0x80, 0);
    n64.run(100).unwrap();
    assert_eq!(n64.cpu.cop0.cause.ip() & 0x80, 0x80);

    // Writing Compare acknowledges
    Cpu::set_cop0_reg(&mut n64, 11, 0);
    assert_eq!(n64.cpu.cop0.cause.ip() & 0x80, 0);
}

#[test]
fn run_reports_overrun() {
    let mut n64 = boot(&asm::halt());
    let before = n64.cpu.cycles;
    let overrun = n64.run(1000).unwrap();
    assert!(overrun >= 0);
    assert_eq!((n64.cpu.cycles - before) as TimeS, 1000 + overrun);
    assert!(!n64.scheduler.is_scheduled(N64Event::PauseEmulation));
}

#[test]
fn paused_system_does_not_run() {
    let mut n64 = boot(&asm::halt());
    n64.options.running = false;
    assert_eq!(n64.run(1000), Ok(0));
    assert_eq!(n64.cpu.cycles, 0);
}

fn mi_bit(n64: &mut Nintendo64, int: Interrupt) -> bool {
    n64.read_physical::<u32>(0x0430_0008) & (1 << int as u32) != 0
}

#[test]
fn device_dmas_raise_and_acknowledge() {
    let mut n64 = boot(&asm::halt());
    n64.insert_cart(vec![0x80; 0x2000]).unwrap();

    // PI: cart to RDRAM
    n64.write_physical::<u32>(0x0460_0000, 0x8000);
    n64.write_physical::<u32>(0x0460_0004, 0x1000_0000);
    n64.write_physical::<u32>(0x0460_000C, 0xFFF);
    // SI: PIF RAM to RDRAM
    n64.write_physical::<u32>(0x0480_0000, 0x9000);
    n64.write_physical::<u32>(0x0480_0004, 0x1FC0_07C0);
    // AI: a short buffer
    n64.write_physical::<u32>(0x0450_0010, 1000);
    n64.write_physical::<u32>(0x0450_0000, 0xA000);
    n64.write_physical::<u32>(0x0450_0004, 0x40);

    n64.run(200_000).unwrap();
    assert_eq!(n64.memory.rdram[0x8FFF], 0x80);
    assert!(mi_bit(&mut n64, Interrupt::Pi));
    assert!(mi_bit(&mut n64, Interrupt::Si));
    assert!(mi_bit(&mut n64, Interrupt::Ai));

    n64.write_physical::<u32>(0x0460_0010, 2);
    n64.write_physical::<u32>(0x0480_0018, 0);
    n64.write_physical::<u32>(0x0450_000C, 0);
    assert!(!mi_bit(&mut n64, Interrupt::Pi));
    assert!(!mi_bit(&mut n64, Interrupt::Si));
    assert!(!mi_bit(&mut n64, Interrupt::Ai));
}

#[test]
fn vi_interrupt_and_frames() {
    let mut n64 = boot(&asm::halt());
    n64.write_physical::<u32>(0x0440_000C, 0x100);
    // A bit more than one field
    n64.run(CPU_CLOCK / 60 + 10_000).unwrap();
    assert!(mi_bit(&mut n64, Interrupt::Vi));
    assert!(n64.take_frame_ready());
    assert!(!n64.take_frame_ready());

    n64.write_physical::<u32>(0x0440_0010, 0);
    assert!(!mi_bit(&mut n64, Interrupt::Vi));
}

#[test]
fn run_frame_stops_at_frame() {
    let mut n64 = boot(&asm::halt());
    n64.run_frame().unwrap();
    assert_eq!(n64.vi.frames, 1);
    assert!(!n64.vi.frame_ready);
}

#[cfg(feature = "serde")]
#[test]
fn save_state_round_trip() {
    let mut n64 = boot(&[asm::addiu(1, 1, 1), asm::beq(0, 0, -2), asm::NOP]);
    n64.run(5_000).unwrap();
    let state = n64.save_state().unwrap();

    n64.run(20_000).unwrap();
    let expected = (n64.cpu.reg(1), n64.cpu.pc, n64.cpu.cycles, n64.vi.v_current);

    n64.load_state(&state).unwrap();
    n64.run(20_000).unwrap();
    let actual = (n64.cpu.reg(1), n64.cpu.pc, n64.cpu.cycles, n64.vi.v_current);
    assert_eq!(expected, actual);
}

#[cfg(feature = "serde")]
#[test]
fn save_state_keeps_cart() {
    let mut n64 = boot(&asm::halt());
    n64.insert_cart(vec![1; 0x1000]).unwrap();
    let state = n64.save_state().unwrap();
    n64.load_state(&state).unwrap();
    assert_eq!(n64.memory.cart.len(), 0x1000);
    assert_eq!(n64.read_physical::<u8>(0x1000_0000), 1);
}

/// Fails every time it is asked to run.
struct FullBackend {
    invalidated: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl ExecutionBackend for FullBackend {
    fn run(&mut self, _n64: &mut Nintendo64, _budget: Time) -> Result<TimeS, HostError> {
        Err(HostError::OutOfCodeSpace {
            needed: 0x100,
            capacity: 0,
        })
    }

    fn invalidate(&mut self, paddr: u32, len: u32) {
        if let Ok(mut list) = self.invalidated.lock() {
            list.push((paddr, len));
        }
    }

    fn name(&self) -> &'static str {
        "Full"
    }
}

#[test]
fn backend_errors_stop_run() {
    let mut n64 = boot(&asm::halt());
    let invalidated = Arc::new(Mutex::new(Vec::new()));
    n64.set_backend(Box::new(FullBackend {
        invalidated: Arc::clone(&invalidated),
    }));
    assert_eq!(n64.backend_name(), "Full");
    assert_eq!(*invalidated.lock().unwrap(), vec![(0, 8 * 1024 * 1024)]);

    let result = n64.run(100);
    assert_eq!(
        result,
        Err(HostError::OutOfCodeSpace {
            needed: 0x100,
            capacity: 0
        })
    );
    assert!(!n64.scheduler.is_scheduled(N64Event::PauseEmulation));
    assert_eq!(n64.cpu.cycles, 0);
}

#[test]
fn reset_button_delivers_nmi() {
    let mut n64 = boot(&asm::halt());
    n64.press_reset();
    assert_eq!(n64.cpu.cop0.cause.ip() & 0x10, 0x10);
    assert_eq!(
        n64.scheduler.remaining(N64Event::Nmi),
        Some((CPU_CLOCK / 2) as TimeS)
    );

    n64.advance_clock(CPU_CLOCK / 2);
    assert_eq!(n64.cpu.pc, RESET_VECTOR);
    assert!(n64.cpu.cop0.status.erl());
    assert_eq!(n64.cpu.cop0.error_epc, PROGRAM_VADDR);
    assert_eq!(n64.cpu.cop0.cause.ip() & 0x10, 0);
}

#[test]
fn boot_inputs_are_checked() {
    let mut n64 = boot(&[]);
    assert_eq!(
        n64.load_pif_rom(&[0; 16]),
        Err(BootError::PifRomSize {
            expected: 0x7C0,
            got: 16
        })
    );
    assert_eq!(n64.insert_cart(vec![0; 16]), Err(BootError::CartTooSmall(16)));
    assert!(n64.memory.pif_rom.is_empty());
    assert!(!n64.options.rom_loaded);

    n64.load_pif_rom(&[0xAB; 0x7C0]).unwrap();
    assert_eq!(n64.read_physical::<u8>(0x1FC0_0010), 0xAB);
}

#[test]
fn reset_keeps_cart_and_memory() {
    let mut n64 = boot(&asm::halt());
    n64.insert_cart(vec![2; 0x1000]).unwrap();
    n64.run(100).unwrap();
    n64.reset();
    assert_eq!(n64.cpu.pc, RESET_VECTOR);
    assert_eq!(n64.memory.cart.len(), 0x1000);
    assert!(n64.options.rom_loaded);
    assert_eq!(n64.read_physical::<u32>(PROGRAM), asm::halt()[0]);
}

#[test]
fn skip_bootrom_sets_up_ipl_state() {
    let mut n64 = Nintendo64::new(N64Config::default());
    let mut rom = vec![0; 0x2000];
    rom[0..4].copy_from_slice(&[0x80, 0x37, 0x12, 0x40]);
    n64.insert_cart(rom).unwrap();
    n64.skip_bootrom();

    assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_A400_0040);
    assert_eq!(&n64.sp.mem[..4], &[0x80, 0x37, 0x12, 0x40]);
    assert_eq!(n64.read_physical::<u32>(0x318), 8 * 1024 * 1024);
    assert!(!n64.cpu.cop0.status.erl());
}

#[test]
fn controller_state_reaches_pif() {
    let mut n64 = boot(&asm::halt());
    n64.set_button(crate::Button::B, true);
    n64.set_stick(-1, 1);
    assert_eq!(n64.si.pif.buttons, 1 << 14);
    assert_eq!(n64.si.pif.stick, (-1, 1));
}
