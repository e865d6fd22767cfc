// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use crate::{
    cpu::{BranchState, Cpu, RESET_VECTOR},
    mmu::{Access, TlbFault},
    Nintendo64,
};

/// Exception codes, as written into Cause.ExcCode.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    Interrupt = 0,
    TlbModified = 1,
    TlbLoad = 2,
    TlbStore = 3,
    AddressLoad = 4,
    AddressStore = 5,
    BusFetch = 6,
    BusData = 7,
    Syscall = 8,
    Breakpoint = 9,
    ReservedInstruction = 10,
    CoprocessorUnusable = 11,
    Overflow = 12,
    Trap = 13,
    FloatingPoint = 15,
    Watch = 23,
}

impl Cpu {
    /// Raise an exception through the general vector.
    pub fn exception_occurred(n64: &mut Nintendo64, ex: Exception) {
        Self::raise(n64, ex, 0x180);
    }

    /// Raise an address error for an access to the given address.
    pub fn address_error(n64: &mut Nintendo64, vaddr: u64, access: Access) {
        let ex = match access {
            Access::Store => Exception::AddressStore,
            _ => Exception::AddressLoad,
        };
        if Self::raise(n64, ex, 0x180) {
            Self::set_fault_address(n64, vaddr);
        }
    }

    /// Raise the exception matching a failed TLB translation.
    pub fn tlb_exception(n64: &mut Nintendo64, vaddr: u64, access: Access, fault: TlbFault) {
        let ex = match (fault, access) {
            (TlbFault::Modified, _) => Exception::TlbModified,
            (_, Access::Store) => Exception::TlbStore,
            _ => Exception::TlbLoad,
        };
        // Refills get their own vectors, unless already handling an exception
        let offset = match fault {
            TlbFault::Miss if !n64.cpu.cop0.status.exl() => {
                if n64.cpu.mode.is_64bit() {
                    0x080
                } else {
                    0x000
                }
            }
            _ => 0x180,
        };
        if Self::raise(n64, ex, offset) {
            Self::set_fault_address(n64, vaddr);
        }
    }

    /// Raise a coprocessor unusable exception for the given coprocessor.
    pub fn coprocessor_unusable(n64: &mut Nintendo64, cop: u8) {
        if Self::raise(n64, Exception::CoprocessorUnusable, 0x180) {
            n64.cpu.cop0.cause.set_ce(cop);
        }
    }

    /// Take a non-maskable interrupt, after the reset button was pressed.
    pub fn nmi(n64: &mut Nintendo64) {
        log::debug!("Taking NMI at 0x{:08X}", n64.cpu.pc as u32);
        let c = &mut n64.cpu.cop0;
        c.error_epc = match n64.cpu.branch {
            // The delay slot already ran; resume at the branch target
            BranchState::PerformPending => n64.cpu.branch_target,
            b if b.in_delay_slot() => n64.cpu.pc.wrapping_sub(4),
            _ => n64.cpu.pc,
        };
        c.status.set_erl(true);
        c.status.set_bev(true);
        // Soft reset flag in the diagnostic status bits
        let ds = c.status.diagnostic() | 0x10;
        c.status.set_diagnostic(ds);
        n64.cpu.branch = BranchState::NoBranch;
        n64.cpu.pc = RESET_VECTOR;
        Self::status_changed(n64);
    }

    /// Enter the exception handler. Returns false if the current instruction
    /// already raised an exception, in which case nothing happens.
    fn raise(n64: &mut Nintendo64, ex: Exception, offset: u64) -> bool {
        if n64.cpu.exception_latched {
            return false;
        }
        n64.cpu.exception_latched = true;
        log::debug!(
            "Exception {ex:?} at 0x{:08X}",
            n64.cpu.current_pc as u32
        );

        let in_delay = n64.cpu.branch.in_delay_slot();
        let c = &mut n64.cpu.cop0;
        if !c.status.exl() {
            c.epc = if in_delay {
                n64.cpu.current_pc.wrapping_sub(4)
            } else {
                n64.cpu.current_pc
            };
            c.cause.set_bd(in_delay);
            c.status.set_exl(true);
        }
        c.cause.set_exc_code(ex as u8);
        c.cause.set_ce(0);

        let base = if c.status.bev() {
            0xFFFF_FFFF_BFC0_0200
        } else {
            0xFFFF_FFFF_8000_0000
        };
        n64.cpu.pc = base + offset;
        n64.cpu.branch = BranchState::NoBranch;
        Self::status_changed(n64);
        true
    }

    /// Record the faulting address of an address or TLB exception.
    fn set_fault_address(n64: &mut Nintendo64, vaddr: u64) {
        let c = &mut n64.cpu.cop0;
        c.bad_vaddr = vaddr;
        c.context = (c.context & !0x7F_FFF0) | ((vaddr >> 9) & 0x7F_FFF0);
        c.xcontext = (c.xcontext & !0x1_FFFF_FFF0)
            | ((vaddr >> 9) & 0x7FFF_FFF0)
            | (((vaddr >> 62) & 3) << 31);
        c.entry_hi = (c.entry_hi & 0xFF) | (vaddr & 0xC000_00FF_FFFF_E000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu::Status, N64Config};

    fn system() -> Box<Nintendo64> {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.cpu.cop0.status = Status::new();
        Cpu::status_changed(&mut n64);
        n64.cpu.current_pc = 0xFFFF_FFFF_8000_1000;
        n64
    }

    #[test]
    fn only_first_exception_counts() {
        let mut n64 = system();
        Cpu::exception_occurred(&mut n64, Exception::Syscall);
        Cpu::exception_occurred(&mut n64, Exception::Overflow);
        assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::Syscall as u8);
        assert_eq!(n64.cpu.cop0.epc, 0xFFFF_FFFF_8000_1000);
        assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0180);
        assert!(n64.cpu.cop0.status.exl());
    }

    #[test]
    fn delay_slot_points_epc_at_branch() {
        let mut n64 = system();
        n64.cpu.branch = BranchState::DelaySlotTaken;
        Cpu::exception_occurred(&mut n64, Exception::Breakpoint);
        assert_eq!(n64.cpu.cop0.epc, 0xFFFF_FFFF_8000_0FFC);
        assert!(n64.cpu.cop0.cause.bd());
        assert_eq!(n64.cpu.branch, BranchState::NoBranch);
    }

    #[test]
    fn exl_keeps_epc() {
        let mut n64 = system();
        n64.cpu.cop0.status.set_exl(true);
        n64.cpu.cop0.epc = 0x1234;
        Cpu::exception_occurred(&mut n64, Exception::Trap);
        assert_eq!(n64.cpu.cop0.epc, 0x1234);
        assert_eq!(n64.cpu.cop0.cause.exc_code(), Exception::Trap as u8);
    }

    #[test]
    fn bev_uses_boot_vectors() {
        let mut n64 = system();
        n64.cpu.cop0.status.set_bev(true);
        Cpu::tlb_exception(&mut n64, 0x1234_5000, Access::Load, TlbFault::Miss);
        assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_BFC0_0200);
    }

    #[test]
    fn tlb_miss_records_address() {
        let mut n64 = system();
        n64.cpu.cop0.entry_hi = 0x42;
        Cpu::tlb_exception(&mut n64, 0x0040_6123, Access::Store, TlbFault::Miss);
        let c = &n64.cpu.cop0;
        assert_eq!(c.cause.exc_code(), Exception::TlbStore as u8);
        assert_eq!(c.bad_vaddr, 0x0040_6123);
        assert_eq!(c.context & 0x7F_FFF0, (0x0040_6123 >> 13) << 4);
        assert_eq!(c.entry_hi, 0x0040_6000 | 0x42);
        assert_eq!(n64.cpu.pc, 0xFFFF_FFFF_8000_0000);
    }

    #[test]
    fn nmi_resumes_at_pending_branch_target() {
        let mut n64 = system();
        n64.cpu.pc = 0xFFFF_FFFF_8000_1008;
        n64.cpu.branch_target = 0xFFFF_FFFF_8000_2000;
        n64.cpu.branch = BranchState::PerformPending;
        Cpu::nmi(&mut n64);
        assert_eq!(n64.cpu.cop0.error_epc, 0xFFFF_FFFF_8000_2000);
        assert_eq!(n64.cpu.pc, RESET_VECTOR);
        assert_eq!(n64.cpu.branch, BranchState::NoBranch);
        assert!(n64.cpu.cop0.status.erl());

        // Outside of a branch, the interrupted instruction is retried
        let mut n64 = system();
        n64.cpu.pc = 0xFFFF_FFFF_8000_1008;
        Cpu::nmi(&mut n64);
        assert_eq!(n64.cpu.cop0.error_epc, 0xFFFF_FFFF_8000_1008);
    }

    #[test]
    fn coprocessor_unusable_sets_ce() {
        let mut n64 = system();
        Cpu::coprocessor_unusable(&mut n64, 1);
        assert_eq!(n64.cpu.cop0.cause.ce(), 1);
        assert_eq!(
            n64.cpu.cop0.cause.exc_code(),
            Exception::CoprocessorUnusable as u8
        );
    }
}
