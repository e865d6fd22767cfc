// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The VR4300 main CPU.

use common::{
    numutil::{NumExt, U32Ext},
    Time, TimeS,
};

pub use crate::cpu::{
    cop0::{Cause, Cop0, Status},
    cop1::Fpu,
    exception::Exception,
    inst::Inst,
};
use crate::{
    cache::{DCache, ICache},
    mmu::{Access, Tlb, TranslationMode},
    Nintendo64,
};

pub mod cop0;
mod cop1;
mod exception;
pub mod inst;
mod mnemonic;

/// Vector the CPU starts at after power-on, reset or NMI.
pub const RESET_VECTOR: u64 = 0xFFFF_FFFF_BFC0_0000;

/// Where the previous instruction left control flow.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BranchState {
    #[default]
    NoBranch,
    /// Executing the delay slot of a taken branch.
    DelaySlotTaken,
    /// Executing the delay slot of a branch that was not taken.
    DelaySlotNotTaken,
    /// The branch target becomes PC at the start of the next step.
    PerformPending,
}

impl BranchState {
    pub fn in_delay_slot(self) -> bool {
        matches!(self, Self::DelaySlotTaken | Self::DelaySlotNotTaken)
    }
}

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cpu {
    regs: [u64; 32],
    pub pc: u64,
    /// Address of the instruction currently executing.
    pub current_pc: u64,
    pub hi: u64,
    pub lo: u64,
    pub branch: BranchState,
    pub branch_target: u64,
    /// Set by LL, cleared by ERET; SC only succeeds while set.
    pub ll_bit: bool,

    pub cop0: Cop0,
    pub fpu: Fpu,
    /// Last value moved into COP2. The RCP has no COP2, but the
    /// bus still holds on to it.
    cop2_latch: u64,

    pub tlb: Tlb,
    pub icache: ICache,
    pub dcache: DCache,
    /// Translation strategy, cached from the status register.
    pub mode: TranslationMode,

    /// Set when the current instruction raised an exception.
    pub exception_latched: bool,
    /// An interrupt will be taken at the next instruction boundary.
    pub interrupt_pending: bool,
    /// Total CPU cycles executed since power-on.
    pub cycles: Time,
}

impl Cpu {
    /// Run instructions until at least `budget` cycles passed.
    /// Returns by how many cycles the budget was overrun.
    pub fn run(n64: &mut Nintendo64, budget: Time) -> TimeS {
        let target = n64.cpu.cycles + budget;
        while n64.cpu.cycles < target {
            Self::step(n64);
        }
        (n64.cpu.cycles - target) as TimeS
    }

    /// Execute a single instruction, or take a pending interrupt
    /// and execute the first instruction of the handler.
    pub fn step(n64: &mut Nintendo64) {
        if n64.cpu.branch == BranchState::PerformPending {
            n64.cpu.pc = n64.cpu.branch_target;
            n64.cpu.branch = BranchState::NoBranch;
        }

        n64.cpu.exception_latched = false;
        n64.cpu.current_pc = n64.cpu.pc;
        if n64.cpu.interrupt_pending {
            Self::exception_occurred(n64, Exception::Interrupt);
            n64.cpu.exception_latched = false;
            n64.cpu.current_pc = n64.cpu.pc;
        }

        n64.tick(1);
        n64.cpu.cop0.tick_random();

        let inst = Self::fetch(n64);
        if n64.cpu.exception_latched {
            return;
        }
        if n64.config.trace_instructions {
            log::trace!(
                "0x{:08X} {}",
                n64.cpu.current_pc as u32,
                Nintendo64::get_mnemonic(inst)
            );
        }

        let prev = n64.cpu.branch;
        n64.run_inst(inst);
        if n64.cpu.exception_latched {
            return;
        }

        match prev {
            BranchState::NoBranch | BranchState::PerformPending => {
                n64.cpu.pc = n64.cpu.pc.wrapping_add(4);
            }
            BranchState::DelaySlotTaken => n64.cpu.branch = BranchState::PerformPending,
            BranchState::DelaySlotNotTaken => {
                n64.cpu.branch = BranchState::NoBranch;
                n64.cpu.pc = n64.cpu.pc.wrapping_add(4);
            }
        }
    }

    /// Fetch the instruction at PC.
    fn fetch(n64: &mut Nintendo64) -> u32 {
        let pc = n64.cpu.pc;
        if pc & 3 != 0 {
            Self::address_error(n64, pc, Access::Fetch);
            return 0;
        }
        match Self::translate(n64, pc, Access::Fetch) {
            Some(t) if t.cached => n64.icache_fetch(t.paddr),
            Some(t) => n64.read_physical::<u32>(t.paddr),
            None => 0,
        }
    }

    /// Load a value from a virtual address. If this raises an exception,
    /// 0 is returned and the exception latch is set.
    pub fn read<T: NumExt>(n64: &mut Nintendo64, vaddr: u64) -> T {
        if vaddr & (T::WIDTH as u64 - 1) != 0 {
            Self::address_error(n64, vaddr, Access::Load);
            return T::default();
        }
        let Some(t) = Self::translate(n64, vaddr, Access::Load) else {
            return T::default();
        };
        if Self::check_watch(n64, t.paddr, Access::Load) {
            return T::default();
        }

        if t.cached {
            n64.dcache_read::<T>(t.paddr)
        } else {
            n64.read_physical::<T>(t.paddr)
        }
    }

    /// Store a value to a virtual address.
    pub fn write<T: NumExt>(n64: &mut Nintendo64, vaddr: u64, value: T) {
        if vaddr & (T::WIDTH as u64 - 1) != 0 {
            Self::address_error(n64, vaddr, Access::Store);
            return;
        }
        let Some(t) = Self::translate(n64, vaddr, Access::Store) else {
            return;
        };
        if Self::check_watch(n64, t.paddr, Access::Store) {
            return;
        }

        if t.cached {
            n64.dcache_write::<T>(t.paddr, value);
        } else {
            n64.write_physical::<T>(t.paddr, value);
        }
    }

    /// Raise WATCH if WatchLo matches a data access.
    fn check_watch(n64: &mut Nintendo64, paddr: u32, access: Access) -> bool {
        let watch = n64.cpu.cop0.watch_lo;
        let enabled = match access {
            Access::Load => watch.is_bit(1),
            Access::Store => watch.is_bit(0),
            Access::Fetch => false,
        };
        if enabled && (watch & !7) == (paddr & !7) && !n64.cpu.cop0.status.exl() {
            Self::exception_occurred(n64, Exception::Watch);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn reg(&self, idx: u32) -> u64 {
        self.regs[idx.us()]
    }

    #[inline]
    pub fn set_reg(&mut self, idx: u32, value: u64) {
        self.regs[idx.us()] = value;
        self.regs[0] = 0;
    }

    /// Set a register to a sign-extended 32-bit value.
    #[inline]
    pub fn set_reg32(&mut self, idx: u32, value: u32) {
        self.set_reg(idx, value.sext());
    }

    /// Reset the CPU to its power-on state.
    pub fn power_on(n64: &mut Nintendo64) {
        n64.cpu = Cpu::default();
        n64.cpu.cop0.power_on();
        n64.cpu.pc = RESET_VECTOR;
        Self::status_changed(n64);
        Self::reschedule_compare(n64);
    }

    /// Set up registers the way the IPL leaves them before jumping
    /// into the cartridge boot code in DMEM.
    pub fn skip_bootrom(n64: &mut Nintendo64) {
        let cpu = &mut n64.cpu;
        cpu.set_reg(11, 0xFFFF_FFFF_A400_0040);
        cpu.set_reg(20, 1);
        cpu.set_reg(22, n64.config.cic_seed.u64());
        cpu.set_reg(29, 0xFFFF_FFFF_A400_1FF0);
        cpu.set_reg(31, 0xFFFF_FFFF_A400_1550);
        cpu.cop0.status = Status::from(0x3400_0000);
        cpu.pc = 0xFFFF_FFFF_A400_0040;
        cpu.branch = BranchState::NoBranch;
        Self::status_changed(n64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::N64Config;

    #[test]
    fn r0_is_hardwired() {
        let mut cpu = Cpu::default();
        cpu.set_reg(0, 1234);
        assert_eq!(cpu.reg(0), 0);
        cpu.set_reg32(5, 0x8000_0000);
        assert_eq!(cpu.reg(5), 0xFFFF_FFFF_8000_0000);
    }

    #[test]
    fn power_on_state() {
        let n64 = Nintendo64::new(N64Config::default());
        assert_eq!(n64.cpu.pc, RESET_VECTOR);
        assert!(n64.cpu.cop0.status.erl());
        assert!(n64.cpu.cop0.status.bev());
        assert_eq!(n64.cpu.mode, TranslationMode::Kernel32);
    }

    #[test]
    fn misaligned_read_raises_adel() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.cpu.cop0.status = Status::new();
        Cpu::status_changed(&mut n64);
        let value = Cpu::read::<u32>(&mut n64, 0xFFFF_FFFF_8000_0002);
        assert_eq!(value, 0);
        assert!(n64.cpu.exception_latched);
        assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::AddressLoad as u8);
        assert_eq!(n64.cpu.cop0.bad_vaddr, 0xFFFF_FFFF_8000_0002);
    }
}
