// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::{
    numutil::{NumExt, U32Ext},
    Time,
};
use modular_bitfield::{bitfield, specifiers::*};

use crate::{
    cpu::{
        inst::{Inst, InstructionHandler},
        BranchState, Cpu,
    },
    mmu::TranslationMode,
    scheduling::N64Event,
    Nintendo64,
};

type CopLut = [InstructionHandler; 32];
const COP0: CopLut = Nintendo64::cop0_table();
const COP0_FUNC: [InstructionHandler; 64] = Nintendo64::cop0_func_table();

/// Processor revision of the VR4300.
const PRID: u32 = 0x0000_0B22;
const CONFIG_WRITABLE: u32 = 0x0F00_800F;

#[bitfield]
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Status {
    pub ie: bool,
    pub exl: bool,
    pub erl: bool,
    pub ksu: B2,
    pub ux: bool,
    pub sx: bool,
    pub kx: bool,
    pub im: u8,
    pub diagnostic: B6,
    pub bev: bool,
    #[skip]
    __: B2,
    pub re: bool,
    pub fr: bool,
    pub rp: bool,
    pub cu: B4,
}

#[bitfield]
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cause {
    #[skip]
    __: B2,
    pub exc_code: B5,
    #[skip]
    __: B1,
    pub ip: u8,
    #[skip]
    __: B12,
    pub ce: B2,
    #[skip]
    __: B1,
    pub bd: bool,
}

/// The system control coprocessor's register file.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cop0 {
    pub index: u32,
    pub random: u32,
    pub entry_lo0: u64,
    pub entry_lo1: u64,
    pub context: u64,
    pub page_mask: u32,
    pub wired: u32,
    pub bad_vaddr: u64,
    /// Count is derived from the CPU cycle counter; this is the difference.
    count_offset: u32,
    pub entry_hi: u64,
    pub compare: u32,
    pub status: Status,
    pub cause: Cause,
    pub epc: u64,
    pub config: u32,
    pub ll_addr: u32,
    pub watch_lo: u32,
    pub watch_hi: u32,
    pub xcontext: u64,
    pub parity_error: u32,
    pub tag_lo: u32,
    pub tag_hi: u32,
    pub error_epc: u64,
    /// Last value written to any register. Unimplemented registers read as it.
    latch: u64,
}

impl Cop0 {
    pub fn power_on(&mut self) {
        *self = Self {
            random: 31,
            config: 0x7006_E463,
            status: Status::new().with_erl(true).with_bev(true),
            ..Self::default()
        };
    }

    /// Random decrements every instruction, wrapping from Wired back to 31.
    #[inline]
    pub fn tick_random(&mut self) {
        if self.random <= self.wired || self.random == 0 {
            self.random = 31;
        } else {
            self.random -= 1;
        }
    }

    /// Is the CPU in kernel mode?
    pub fn is_kernel(&self) -> bool {
        self.status.ksu() == 0 || self.status.exl() || self.status.erl()
    }

    /// Is the given coprocessor usable by the current mode?
    pub fn cop_usable(&self, cop: u8) -> bool {
        self.status.cu() & (1 << cop) != 0 || (cop == 0 && self.is_kernel())
    }
}

impl Cpu {
    /// Current value of the Count register.
    pub fn count(&self) -> u32 {
        ((self.cycles >> 1) as u32).wrapping_add(self.cop0.count_offset)
    }

    /// Read a COP0 register by its index.
    pub fn cop0_reg(&self, idx: u32) -> u64 {
        let c = &self.cop0;
        match idx {
            0 => c.index.u64(),
            1 => c.random.u64(),
            2 => c.entry_lo0,
            3 => c.entry_lo1,
            4 => c.context,
            5 => c.page_mask.u64(),
            6 => c.wired.u64(),
            8 => c.bad_vaddr,
            9 => self.count().u64(),
            10 => c.entry_hi,
            11 => c.compare.u64(),
            12 => u32::from(c.status).u64(),
            13 => u32::from(c.cause).u64(),
            14 => c.epc,
            15 => PRID.u64(),
            16 => c.config.u64(),
            17 => c.ll_addr.u64(),
            18 => c.watch_lo.u64(),
            19 => c.watch_hi.u64(),
            20 => c.xcontext,
            26 => c.parity_error.u64(),
            27 => 0,
            28 => c.tag_lo.u64(),
            29 => c.tag_hi.u64(),
            30 => c.error_epc,
            _ => c.latch,
        }
    }

    /// Write a COP0 register by its index, with all side effects
    /// a MTC0 would have.
    pub fn set_cop0_reg(n64: &mut Nintendo64, idx: u32, value: u64) {
        let c = &mut n64.cpu.cop0;
        c.latch = value;
        match idx {
            0 => c.index = (value as u32) & 0x8000_003F,
            2 => c.entry_lo0 = value & 0x3FFF_FFFF,
            3 => c.entry_lo1 = value & 0x3FFF_FFFF,
            4 => c.context = (c.context & 0x7F_FFF0) | (value & !0x7F_FFFF),
            5 => c.page_mask = (value as u32) & 0x01FF_E000,
            6 => {
                c.wired = (value as u32) & 0x3F;
                c.random = 31;
            }
            9 => {
                let now = (n64.cpu.cycles >> 1) as u32;
                n64.cpu.cop0.count_offset = (value as u32).wrapping_sub(now);
                Self::reschedule_compare(n64);
            }
            10 => c.entry_hi = value & 0xC000_00FF_FFFF_E0FF,
            11 => {
                c.compare = value as u32;
                let ip = c.cause.ip() & !0x80;
                c.cause.set_ip(ip);
                Self::update_interrupts(n64);
                Self::reschedule_compare(n64);
            }
            12 => {
                c.status = Status::from((value as u32) & 0xFF57_FFFF);
                Self::status_changed(n64);
            }
            13 => {
                // Only the software interrupt bits are writable
                let ip = (c.cause.ip() & !3) | ((value >> 8) as u8 & 3);
                c.cause.set_ip(ip);
                Self::update_interrupts(n64);
            }
            14 => c.epc = value,
            16 => c.config = (c.config & !CONFIG_WRITABLE) | (value as u32 & CONFIG_WRITABLE),
            17 => c.ll_addr = value as u32,
            18 => c.watch_lo = (value as u32) & 0xFFFF_FFFB,
            19 => c.watch_hi = (value as u32) & 0xF,
            20 => c.xcontext = (c.xcontext & 0x1_FFFF_FFFF) | (value & !0x1_FFFF_FFFF),
            26 => c.parity_error = (value as u32) & 0xFF,
            28 => c.tag_lo = (value as u32) & 0x0FFF_FFC0,
            30 => c.error_epc = value,
            // Read-only, or unimplemented and only reflected by the latch
            _ => (),
        }
    }

    /// Re-derive everything that depends on the status register.
    pub fn status_changed(n64: &mut Nintendo64) {
        n64.cpu.mode = TranslationMode::from_status(n64.cpu.cop0.status);
        Self::update_interrupts(n64);
    }

    /// Recompute if an interrupt should be taken at the next
    /// instruction boundary.
    pub fn update_interrupts(n64: &mut Nintendo64) {
        let c = &n64.cpu.cop0;
        n64.cpu.interrupt_pending = c.status.ie()
            && !c.status.exl()
            && !c.status.erl()
            && (c.cause.ip() & c.status.im()) != 0;
    }

    /// Schedule the timer interrupt for when Count next equals Compare.
    pub(crate) fn reschedule_compare(n64: &mut Nintendo64) {
        let until = n64.cpu.cop0.compare.wrapping_sub(n64.cpu.count());
        let until = if until == 0 { 1 << 32 } else { until as Time };
        let cycles = until * 2 - (n64.cpu.cycles & 1);
        n64.scheduler.add_event(N64Event::CompareInterrupt, cycles);
    }

    /// Count reached Compare.
    pub(crate) fn compare_interrupt(n64: &mut Nintendo64) {
        let ip = n64.cpu.cop0.cause.ip() | 0x80;
        n64.cpu.cop0.cause.set_ip(ip);
        Self::update_interrupts(n64);
        Self::reschedule_compare(n64);
    }
}

impl Nintendo64 {
    const fn cop0_table() -> CopLut {
        let mut lut: CopLut = [Self::reserved_instruction; 32];
        lut[0x00] = Self::mfc0::<false>;
        lut[0x01] = Self::mfc0::<true>; // DMFC0
        lut[0x04] = Self::mtc0::<false>;
        lut[0x05] = Self::mtc0::<true>; // DMTC0
        let mut idx = 0x10;
        while idx < 0x20 {
            lut[idx] = Self::cop0_func;
            idx += 1;
        }
        lut
    }

    const fn cop0_func_table() -> [InstructionHandler; 64] {
        let mut lut = [Self::reserved_instruction as InstructionHandler; 64];
        lut[0x01] = Self::tlbr;
        lut[0x02] = Self::tlbwi;
        lut[0x06] = Self::tlbwr;
        lut[0x08] = Self::tlbp;
        lut[0x18] = Self::eret;
        lut
    }

    pub fn cop0(&mut self, inst: Inst) {
        if !self.cpu.cop0.cop_usable(0) {
            Cpu::coprocessor_unusable(self, 0);
            return;
        }
        let handler = COP0[inst.rs() as usize];
        handler(self, inst);
    }

    fn cop0_func(&mut self, inst: Inst) {
        let handler = COP0_FUNC[inst.funct() as usize];
        handler(self, inst);
    }

    fn mfc0<const DOUBLE: bool>(&mut self, inst: Inst) {
        let value = self.cpu.cop0_reg(inst.rd());
        let value = if DOUBLE {
            value
        } else {
            (value as u32).sext()
        };
        self.cpu.set_reg(inst.rt(), value);
    }

    fn mtc0<const DOUBLE: bool>(&mut self, inst: Inst) {
        let value = self.cpu.reg(inst.rt());
        let value = if DOUBLE {
            value
        } else {
            (value as u32).sext()
        };
        Cpu::set_cop0_reg(self, inst.rd(), value);
    }

    fn tlbr(&mut self, _inst: Inst) {
        let idx = (self.cpu.cop0.index & 0x1F) as usize;
        let entry = self.cpu.tlb.entries[idx];
        let c = &mut self.cpu.cop0;
        c.page_mask = entry.page_mask;
        c.entry_hi = entry.entry_hi;
        c.entry_lo0 = entry.entry_lo0 | entry.global as u64;
        c.entry_lo1 = entry.entry_lo1 | entry.global as u64;
    }

    fn tlbwi(&mut self, _inst: Inst) {
        let idx = (self.cpu.cop0.index & 0x1F) as usize;
        self.write_tlb(idx);
    }

    fn tlbwr(&mut self, _inst: Inst) {
        let idx = (self.cpu.cop0.random & 0x1F) as usize;
        self.write_tlb(idx);
    }

    fn write_tlb(&mut self, idx: usize) {
        let c = &self.cpu.cop0;
        self.cpu.tlb.entries[idx].write(c.page_mask, c.entry_hi, c.entry_lo0, c.entry_lo1);
        log::debug!("TLB entry {idx} written: {:X?}", self.cpu.tlb.entries[idx]);
    }

    fn tlbp(&mut self, _inst: Inst) {
        let entry_hi = self.cpu.cop0.entry_hi;
        self.cpu.cop0.index = match self.cpu.tlb.probe(entry_hi) {
            Some(idx) => idx as u32,
            None => 0x8000_0000,
        };
    }

    fn eret(&mut self, _inst: Inst) {
        let c = &mut self.cpu.cop0;
        let target = if c.status.erl() {
            c.status.set_erl(false);
            c.error_epc
        } else {
            c.status.set_exl(false);
            c.epc
        };
        self.cpu.ll_bit = false;
        Cpu::status_changed(self);
        // ERET has no delay slot; the jump happens before the next instruction
        self.cpu.branch_target = target;
        self.cpu.branch = BranchState::PerformPending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_layout() {
        let status = Status::from(0x3440_FF07);
        assert!(status.ie());
        assert!(status.exl());
        assert!(status.erl());
        assert_eq!(status.im(), 0xFF);
        assert!(status.bev());
        assert!(status.fr());
        assert_eq!(status.cu(), 0b0011);
        assert_eq!(u32::from(status), 0x3440_FF07);
    }

    #[test]
    fn cause_layout() {
        let cause = Cause::new()
            .with_exc_code(11)
            .with_ce(1)
            .with_ip(0x84)
            .with_bd(true);
        assert_eq!(u32::from(cause), 0x9000_842C);
    }

    #[test]
    fn random_wraps_at_wired() {
        let mut cop0 = Cop0::default();
        cop0.power_on();
        cop0.wired = 29;
        cop0.tick_random();
        cop0.tick_random();
        assert_eq!(cop0.random, 29);
        cop0.tick_random();
        assert_eq!(cop0.random, 31);
    }

    #[test]
    fn tlb_write_then_read_back() {
        let mut n64 = Nintendo64::new(crate::N64Config::default());
        let write = |n64: &mut Nintendo64, lo1: u64| {
            Cpu::set_cop0_reg(n64, 0, 7);
            Cpu::set_cop0_reg(n64, 5, 0x2000);
            Cpu::set_cop0_reg(n64, 10, 0xC000_00FF_C000_7005);
            Cpu::set_cop0_reg(n64, 2, 0x405F);
            Cpu::set_cop0_reg(n64, 3, lo1);
            n64.tlbwi(Inst(0x4200_0002));
            for reg in [2, 3, 5, 10] {
                Cpu::set_cop0_reg(n64, reg, 0);
            }
            n64.tlbr(Inst(0x4200_0001));
        };

        // Only one G bit set: the entry is not global
        write(&mut n64, 0x8016);
        assert_eq!(n64.cpu.cop0_reg(5), 0x6000);
        // VPN2 bits covered by the page mask read back as zero
        assert_eq!(n64.cpu.cop0_reg(10), 0xC000_00FF_C000_0005);
        assert_eq!(n64.cpu.cop0_reg(2), 0x405E);
        assert_eq!(n64.cpu.cop0_reg(3), 0x8016);

        write(&mut n64, 0x8017);
        assert_eq!(n64.cpu.cop0_reg(2), 0x405F);
        assert_eq!(n64.cpu.cop0_reg(3), 0x8017);
        // Global now, so any ASID matches
        assert!(n64.cpu.tlb.lookup(0xC000_00FF_C000_4009, 9, true, false).is_ok());
    }
}
