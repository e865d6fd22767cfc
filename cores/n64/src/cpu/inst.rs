// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::numutil::{NumExt, U32Ext};

use crate::{
    cpu::{BranchState, Cpu, Exception},
    mmu::Access,
    Nintendo64,
};

pub type InstructionHandler = fn(n64: &mut Nintendo64, inst: Inst);
type Lut = [InstructionHandler; 64];
type RegimmLut = [InstructionHandler; 32];

const PRIMARY: Lut = Nintendo64::primary_table();
const SPECIAL: Lut = Nintendo64::special_table();
const REGIMM: RegimmLut = Nintendo64::regimm_table();

/// Operations shared by several handlers, selected by const generic.
mod op {
    pub const ADD: u8 = 0;
    pub const ADDU: u8 = 1;
    pub const SUB: u8 = 2;
    pub const SUBU: u8 = 3;
    pub const DADD: u8 = 4;
    pub const DADDU: u8 = 5;
    pub const DSUB: u8 = 6;
    pub const DSUBU: u8 = 7;
    pub const AND: u8 = 8;
    pub const OR: u8 = 9;
    pub const XOR: u8 = 10;
    pub const NOR: u8 = 11;
    pub const SLT: u8 = 12;
    pub const SLTU: u8 = 13;
    pub const LUI: u8 = 14;

    pub const SLL: u8 = 0;
    pub const SRL: u8 = 1;
    pub const SRA: u8 = 2;
    pub const DSLL: u8 = 3;
    pub const DSRL: u8 = 4;
    pub const DSRA: u8 = 5;
    pub const DSLL32: u8 = 6;
    pub const DSRL32: u8 = 7;
    pub const DSRA32: u8 = 8;

    pub const TGE: u8 = 0;
    pub const TGEU: u8 = 1;
    pub const TLT: u8 = 2;
    pub const TLTU: u8 = 3;
    pub const TEQ: u8 = 4;
    pub const TNE: u8 = 5;

    pub const BEQ: u8 = 0;
    pub const BNE: u8 = 1;
    pub const BLEZ: u8 = 2;
    pub const BGTZ: u8 = 3;
    pub const BLTZ: u8 = 4;
    pub const BGEZ: u8 = 5;
}

impl Nintendo64 {
    pub fn run_inst(&mut self, inst: u32) {
        let handler = PRIMARY[inst.bits(26, 6).us()];
        handler(self, Inst(inst));
    }

    const fn primary_table() -> Lut {
        let mut lut: Lut = [Self::reserved_instruction; 64];
        lut[0x00] = Self::special;
        lut[0x01] = Self::regimm;
        lut[0x02] = Self::j;
        lut[0x03] = Self::jal;
        lut[0x04] = Self::branch::<{ op::BEQ }, false>;
        lut[0x05] = Self::branch::<{ op::BNE }, false>;
        lut[0x06] = Self::branch::<{ op::BLEZ }, false>;
        lut[0x07] = Self::branch::<{ op::BGTZ }, false>;

        lut[0x08] = Self::alu::<true, { op::ADD }>; // ADDI
        lut[0x09] = Self::alu::<true, { op::ADDU }>; // ADDIU
        lut[0x0A] = Self::alu::<true, { op::SLT }>; // SLTI
        lut[0x0B] = Self::alu::<true, { op::SLTU }>; // SLTIU
        lut[0x0C] = Self::alu::<true, { op::AND }>; // ANDI
        lut[0x0D] = Self::alu::<true, { op::OR }>; // ORI
        lut[0x0E] = Self::alu::<true, { op::XOR }>; // XORI
        lut[0x0F] = Self::alu::<true, { op::LUI }>; // LUI

        lut[0x10] = Self::cop0;
        lut[0x11] = Self::cop1;
        lut[0x12] = Self::cop2;
        lut[0x14] = Self::branch::<{ op::BEQ }, true>; // BEQL
        lut[0x15] = Self::branch::<{ op::BNE }, true>; // BNEL
        lut[0x16] = Self::branch::<{ op::BLEZ }, true>; // BLEZL
        lut[0x17] = Self::branch::<{ op::BGTZ }, true>; // BGTZL
        lut[0x18] = Self::alu::<true, { op::DADD }>; // DADDI
        lut[0x19] = Self::alu::<true, { op::DADDU }>; // DADDIU
        lut[0x1A] = Self::load_left::<u64>; // LDL
        lut[0x1B] = Self::load_right::<u64>; // LDR

        lut[0x20] = Self::load::<u8, true>; // LB
        lut[0x21] = Self::load::<u16, true>; // LH
        lut[0x22] = Self::load_left::<u32>; // LWL
        lut[0x23] = Self::load::<u32, true>; // LW
        lut[0x24] = Self::load::<u8, false>; // LBU
        lut[0x25] = Self::load::<u16, false>; // LHU
        lut[0x26] = Self::load_right::<u32>; // LWR
        lut[0x27] = Self::load::<u32, false>; // LWU
        lut[0x28] = Self::store::<u8>; // SB
        lut[0x29] = Self::store::<u16>; // SH
        lut[0x2A] = Self::store_left::<u32>; // SWL
        lut[0x2B] = Self::store::<u32>; // SW
        lut[0x2C] = Self::store_left::<u64>; // SDL
        lut[0x2D] = Self::store_right::<u64>; // SDR
        lut[0x2E] = Self::store_right::<u32>; // SWR
        lut[0x2F] = Self::cache;

        lut[0x30] = Self::load_linked::<u32>; // LL
        lut[0x31] = Self::lwc1;
        lut[0x32] = Self::cop2_memory; // LWC2
        lut[0x34] = Self::load_linked::<u64>; // LLD
        lut[0x35] = Self::ldc1;
        lut[0x36] = Self::cop2_memory; // LDC2
        lut[0x37] = Self::load::<u64, false>; // LD
        lut[0x38] = Self::store_conditional::<u32>; // SC
        lut[0x39] = Self::swc1;
        lut[0x3A] = Self::cop2_memory; // SWC2
        lut[0x3C] = Self::store_conditional::<u64>; // SCD
        lut[0x3D] = Self::sdc1;
        lut[0x3E] = Self::cop2_memory; // SDC2
        lut[0x3F] = Self::store::<u64>; // SD

        lut
    }

    const fn special_table() -> Lut {
        let mut lut: Lut = [Self::reserved_instruction; 64];
        lut[0x00] = Self::shift::<false, { op::SLL }>; // SLL
        lut[0x02] = Self::shift::<false, { op::SRL }>; // SRL
        lut[0x03] = Self::shift::<false, { op::SRA }>; // SRA
        lut[0x04] = Self::shift::<true, { op::SLL }>; // SLLV
        lut[0x06] = Self::shift::<true, { op::SRL }>; // SRLV
        lut[0x07] = Self::shift::<true, { op::SRA }>; // SRAV

        lut[0x08] = Self::jr;
        lut[0x09] = Self::jalr;
        lut[0x0C] = Self::syscall;
        lut[0x0D] = Self::break_;
        lut[0x0F] = Self::sync;

        lut[0x10] = Self::lohi_mov::<true, true>; // MFHI
        lut[0x11] = Self::lohi_mov::<false, true>; // MTHI
        lut[0x12] = Self::lohi_mov::<true, false>; // MFLO
        lut[0x13] = Self::lohi_mov::<false, false>; // MTLO
        lut[0x14] = Self::shift::<true, { op::DSLL }>; // DSLLV
        lut[0x16] = Self::shift::<true, { op::DSRL }>; // DSRLV
        lut[0x17] = Self::shift::<true, { op::DSRA }>; // DSRAV

        lut[0x18] = Self::mult::<true>; // MULT
        lut[0x19] = Self::mult::<false>; // MULTU
        lut[0x1A] = Self::div::<true>; // DIV
        lut[0x1B] = Self::div::<false>; // DIVU
        lut[0x1C] = Self::dmult::<true>; // DMULT
        lut[0x1D] = Self::dmult::<false>; // DMULTU
        lut[0x1E] = Self::ddiv::<true>; // DDIV
        lut[0x1F] = Self::ddiv::<false>; // DDIVU

        lut[0x20] = Self::alu::<false, { op::ADD }>; // ADD
        lut[0x21] = Self::alu::<false, { op::ADDU }>; // ADDU
        lut[0x22] = Self::alu::<false, { op::SUB }>; // SUB
        lut[0x23] = Self::alu::<false, { op::SUBU }>; // SUBU
        lut[0x24] = Self::alu::<false, { op::AND }>; // AND
        lut[0x25] = Self::alu::<false, { op::OR }>; // OR
        lut[0x26] = Self::alu::<false, { op::XOR }>; // XOR
        lut[0x27] = Self::alu::<false, { op::NOR }>; // NOR
        lut[0x2A] = Self::alu::<false, { op::SLT }>; // SLT
        lut[0x2B] = Self::alu::<false, { op::SLTU }>; // SLTU
        lut[0x2C] = Self::alu::<false, { op::DADD }>; // DADD
        lut[0x2D] = Self::alu::<false, { op::DADDU }>; // DADDU
        lut[0x2E] = Self::alu::<false, { op::DSUB }>; // DSUB
        lut[0x2F] = Self::alu::<false, { op::DSUBU }>; // DSUBU

        lut[0x30] = Self::trap::<false, { op::TGE }>; // TGE
        lut[0x31] = Self::trap::<false, { op::TGEU }>; // TGEU
        lut[0x32] = Self::trap::<false, { op::TLT }>; // TLT
        lut[0x33] = Self::trap::<false, { op::TLTU }>; // TLTU
        lut[0x34] = Self::trap::<false, { op::TEQ }>; // TEQ
        lut[0x36] = Self::trap::<false, { op::TNE }>; // TNE

        lut[0x38] = Self::shift::<false, { op::DSLL }>; // DSLL
        lut[0x3A] = Self::shift::<false, { op::DSRL }>; // DSRL
        lut[0x3B] = Self::shift::<false, { op::DSRA }>; // DSRA
        lut[0x3C] = Self::shift::<false, { op::DSLL32 }>; // DSLL32
        lut[0x3E] = Self::shift::<false, { op::DSRL32 }>; // DSRL32
        lut[0x3F] = Self::shift::<false, { op::DSRA32 }>; // DSRA32

        lut
    }

    const fn regimm_table() -> RegimmLut {
        let mut lut: RegimmLut = [Self::reserved_instruction; 32];
        lut[0x00] = Self::regimm_branch::<{ op::BLTZ }, false, false>; // BLTZ
        lut[0x01] = Self::regimm_branch::<{ op::BGEZ }, false, false>; // BGEZ
        lut[0x02] = Self::regimm_branch::<{ op::BLTZ }, true, false>; // BLTZL
        lut[0x03] = Self::regimm_branch::<{ op::BGEZ }, true, false>; // BGEZL

        lut[0x08] = Self::trap::<true, { op::TGE }>; // TGEI
        lut[0x09] = Self::trap::<true, { op::TGEU }>; // TGEIU
        lut[0x0A] = Self::trap::<true, { op::TLT }>; // TLTI
        lut[0x0B] = Self::trap::<true, { op::TLTU }>; // TLTIU
        lut[0x0C] = Self::trap::<true, { op::TEQ }>; // TEQI
        lut[0x0E] = Self::trap::<true, { op::TNE }>; // TNEI

        lut[0x10] = Self::regimm_branch::<{ op::BLTZ }, false, true>; // BLTZAL
        lut[0x11] = Self::regimm_branch::<{ op::BGEZ }, false, true>; // BGEZAL
        lut[0x12] = Self::regimm_branch::<{ op::BLTZ }, true, true>; // BLTZALL
        lut[0x13] = Self::regimm_branch::<{ op::BGEZ }, true, true>; // BGEZALL
        lut
    }
}

// Utility
impl Nintendo64 {
    fn addr_with_imm(&self, inst: Inst) -> u64 {
        self.cpu.reg(inst.rs()).wrapping_add(inst.imm16s())
    }

    /// Register a jump, unless already executing a delay slot.
    pub(super) fn jump_to(&mut self, taken: bool, target: u64) {
        if self.cpu.branch != BranchState::NoBranch {
            return;
        }
        if taken {
            self.cpu.branch_target = target;
            self.cpu.branch = BranchState::DelaySlotTaken;
        } else {
            self.cpu.branch = BranchState::DelaySlotNotTaken;
        }
    }

    /// Conditional PC-relative branch. Likely branches that are not taken
    /// skip their delay slot.
    pub(super) fn branch_if<const LIKELY: bool>(&mut self, cond: bool, inst: Inst) {
        let target = self
            .cpu
            .current_pc
            .wrapping_add(4)
            .wrapping_add(inst.imm16s() << 2);
        if LIKELY && !cond {
            if self.cpu.branch == BranchState::NoBranch {
                self.cpu.pc = self.cpu.pc.wrapping_add(4);
            }
        } else {
            self.jump_to(cond, target);
        }
    }

    fn link(&mut self, reg: u32) {
        self.cpu.set_reg(reg, self.cpu.current_pc.wrapping_add(8));
    }

    pub(super) fn reserved_instruction(&mut self, inst: Inst) {
        log::warn!(
            "Reserved instruction 0x{:08X} at 0x{:08X}",
            inst.0,
            self.cpu.current_pc as u32
        );
        Cpu::exception_occurred(self, Exception::ReservedInstruction);
    }
}

// Primary
impl Nintendo64 {
    fn special(&mut self, inst: Inst) {
        let handler = SPECIAL[inst.funct().us()];
        handler(self, inst);
    }

    fn regimm(&mut self, inst: Inst) {
        let handler = REGIMM[inst.rt().us()];
        handler(self, inst);
    }

    fn j(&mut self, inst: Inst) {
        let region = self.cpu.current_pc.wrapping_add(4) & !0x0FFF_FFFF;
        self.jump_to(true, region | (inst.imm26().u64() << 2));
    }

    fn jal(&mut self, inst: Inst) {
        self.link(31);
        self.j(inst);
    }

    fn branch<const OP: u8, const LIKELY: bool>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs());
        let b = self.cpu.reg(inst.rt());
        let cond = match OP {
            op::BEQ => a == b,
            op::BNE => a != b,
            op::BLEZ => (a as i64) <= 0,
            op::BGTZ => (a as i64) > 0,
            _ => unreachable!(),
        };
        self.branch_if::<LIKELY>(cond, inst);
    }

    fn regimm_branch<const OP: u8, const LIKELY: bool, const LINK: bool>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs()) as i64;
        let cond = match OP {
            op::BLTZ => a < 0,
            op::BGEZ => a >= 0,
            _ => unreachable!(),
        };
        if LINK {
            self.link(31);
        }
        self.branch_if::<LIKELY>(cond, inst);
    }

    fn alu<const IMM: bool, const OP: u8>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs());
        let b = match (IMM, OP) {
            (true, op::AND | op::OR | op::XOR) => inst.imm16().u64(),
            (true, _) => inst.imm16s(),
            (false, _) => self.cpu.reg(inst.rt()),
        };

        let value = match OP {
            op::ADD => match (a as i32).checked_add(b as i32) {
                Some(value) => (value as u32).sext(),
                None => return Cpu::exception_occurred(self, Exception::Overflow),
            },
            op::SUB => match (a as i32).checked_sub(b as i32) {
                Some(value) => (value as u32).sext(),
                None => return Cpu::exception_occurred(self, Exception::Overflow),
            },
            op::DADD => match (a as i64).checked_add(b as i64) {
                Some(value) => value as u64,
                None => return Cpu::exception_occurred(self, Exception::Overflow),
            },
            op::DSUB => match (a as i64).checked_sub(b as i64) {
                Some(value) => value as u64,
                None => return Cpu::exception_occurred(self, Exception::Overflow),
            },
            op::ADDU => (a as u32).wrapping_add(b as u32).sext(),
            op::SUBU => (a as u32).wrapping_sub(b as u32).sext(),
            op::DADDU => a.wrapping_add(b),
            op::DSUBU => a.wrapping_sub(b),
            op::AND => a & b,
            op::OR => a | b,
            op::XOR => a ^ b,
            op::NOR => !(a | b),
            op::SLT => ((a as i64) < (b as i64)) as u64,
            op::SLTU => (a < b) as u64,
            op::LUI => (inst.imm16().u32() << 16).sext(),
            _ => unreachable!(),
        };

        let reg = if IMM { inst.rt() } else { inst.rd() };
        self.cpu.set_reg(reg, value);
    }

    fn load<T: NumExt, const SIGNED: bool>(&mut self, inst: Inst) {
        let addr = self.addr_with_imm(inst);
        let value = Cpu::read::<T>(self, addr).u64();
        if self.cpu.exception_latched {
            return;
        }

        let value = match (T::WIDTH, SIGNED) {
            (1, true) => value as i8 as u64,
            (2, true) => value as i16 as u64,
            (4, true) => value as i32 as u64,
            _ => value,
        };
        self.cpu.set_reg(inst.rt(), value);
    }

    fn store<T: NumExt>(&mut self, inst: Inst) {
        let addr = self.addr_with_imm(inst);
        let value = T::from_u64(self.cpu.reg(inst.rt()));
        Cpu::write::<T>(self, addr, value);
    }

    /// LWL/LDL: load the high part of an unaligned value.
    fn load_left<T: NumExt>(&mut self, inst: Inst) {
        let addr = self.addr_with_imm(inst);
        let width = T::WIDTH.u64();
        let mem = Cpu::read::<T>(self, addr & !(width - 1)).u64();
        if self.cpu.exception_latched {
            return;
        }

        let shift = (addr & (width - 1)) * 8;
        let reg = self.cpu.reg(inst.rt());
        let value = if width == 4 {
            let value = (reg as u32 & !(u32::MAX << shift)) | ((mem as u32) << shift);
            value.sext()
        } else {
            (reg & !(u64::MAX << shift)) | (mem << shift)
        };
        self.cpu.set_reg(inst.rt(), value);
    }

    /// LWR/LDR: load the low part of an unaligned value.
    fn load_right<T: NumExt>(&mut self, inst: Inst) {
        let addr = self.addr_with_imm(inst);
        let width = T::WIDTH.u64();
        let mem = Cpu::read::<T>(self, addr & !(width - 1)).u64();
        if self.cpu.exception_latched {
            return;
        }

        let shift = (width - 1 - (addr & (width - 1))) * 8;
        let reg = self.cpu.reg(inst.rt());
        let value = if width == 4 {
            let value = (reg as u32 & !(u32::MAX >> shift)) | ((mem as u32) >> shift);
            value.sext()
        } else {
            (reg & !(u64::MAX >> shift)) | (mem >> shift)
        };
        self.cpu.set_reg(inst.rt(), value);
    }

    /// SWL/SDL: store the high part of an unaligned value.
    fn store_left<T: NumExt>(&mut self, inst: Inst) {
        let addr = self.addr_with_imm(inst);
        let width = T::WIDTH.u64();
        let shift = (addr & (width - 1)) * 8;
        let reg = self.cpu.reg(inst.rt());
        Cpu::modify::<T>(self, addr & !(width - 1), |mem| {
            let mem = mem.u64();
            if width == 4 {
                let mem = mem as u32;
                T::from_u32((mem & !(u32::MAX >> shift)) | ((reg as u32) >> shift))
            } else {
                T::from_u64((mem & !(u64::MAX >> shift)) | (reg >> shift))
            }
        });
    }

    /// SWR/SDR: store the low part of an unaligned value.
    fn store_right<T: NumExt>(&mut self, inst: Inst) {
        let addr = self.addr_with_imm(inst);
        let width = T::WIDTH.u64();
        let shift = (width - 1 - (addr & (width - 1))) * 8;
        let reg = self.cpu.reg(inst.rt());
        Cpu::modify::<T>(self, addr & !(width - 1), |mem| {
            let mem = mem.u64();
            if width == 4 {
                let mem = mem as u32;
                T::from_u32((mem & !(u32::MAX << shift)) | ((reg as u32) << shift))
            } else {
                T::from_u64((mem & !(u64::MAX << shift)) | (reg << shift))
            }
        });
    }

    fn load_linked<T: NumExt>(&mut self, inst: Inst) {
        self.load::<T, true>(inst);
        if self.cpu.exception_latched {
            return;
        }
        let addr = self.addr_with_imm(inst);
        if let Some(t) = Cpu::translate(self, addr, Access::Load) {
            self.cpu.cop0.ll_addr = t.paddr >> 4;
        }
        self.cpu.ll_bit = true;
    }

    fn store_conditional<T: NumExt>(&mut self, inst: Inst) {
        if self.cpu.ll_bit {
            self.store::<T>(inst);
            if self.cpu.exception_latched {
                return;
            }
        }
        self.cpu.set_reg(inst.rt(), self.cpu.ll_bit as u64);
    }

    fn cache(&mut self, inst: Inst) {
        if !self.cpu.cop0.cop_usable(0) {
            return Cpu::coprocessor_unusable(self, 0);
        }
        let addr = self.addr_with_imm(inst);
        self.cache_op(inst.rt(), addr);
    }

    fn cop2(&mut self, inst: Inst) {
        if !self.cpu.cop0.cop_usable(2) {
            return Cpu::coprocessor_unusable(self, 2);
        }
        match inst.rs() {
            0x00 => self.cpu.set_reg32(inst.rt(), self.cpu.cop2_latch as u32), // MFC2
            0x01 => self.cpu.set_reg(inst.rt(), self.cpu.cop2_latch),          // DMFC2
            0x02 => self.cpu.set_reg32(inst.rt(), self.cpu.cop2_latch as u32), // CFC2
            0x04..=0x06 => self.cpu.cop2_latch = self.cpu.reg(inst.rt()),     // MTC2, DMTC2, CTC2
            _ => self.reserved_instruction(inst),
        }
    }

    fn cop2_memory(&mut self, inst: Inst) {
        if !self.cpu.cop0.cop_usable(2) {
            return Cpu::coprocessor_unusable(self, 2);
        }
        self.reserved_instruction(inst);
    }
}

// Special
impl Nintendo64 {
    fn shift<const VAR: bool, const OP: u8>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rt());
        let amount = if VAR {
            self.cpu.reg(inst.rs()) as u32
        } else {
            inst.sa()
        };

        let value = match OP {
            op::SLL => ((a as u32) << (amount & 0x1F)).sext(),
            op::SRL => ((a as u32) >> (amount & 0x1F)).sext(),
            op::SRA => (((a as i64) >> (amount & 0x1F)) as u32).sext(),
            op::DSLL => a << (amount & 0x3F),
            op::DSRL => a >> (amount & 0x3F),
            op::DSRA => ((a as i64) >> (amount & 0x3F)) as u64,
            op::DSLL32 => a << (amount + 32),
            op::DSRL32 => a >> (amount + 32),
            op::DSRA32 => ((a as i64) >> (amount + 32)) as u64,
            _ => unreachable!(),
        };
        self.cpu.set_reg(inst.rd(), value);
    }

    fn jr(&mut self, inst: Inst) {
        let target = self.cpu.reg(inst.rs());
        self.jump_to(true, target);
    }

    fn jalr(&mut self, inst: Inst) {
        let target = self.cpu.reg(inst.rs());
        self.link(inst.rd());
        self.jump_to(true, target);
    }

    fn syscall(&mut self, _inst: Inst) {
        Cpu::exception_occurred(self, Exception::Syscall);
    }

    fn break_(&mut self, _inst: Inst) {
        Cpu::exception_occurred(self, Exception::Breakpoint);
    }

    fn sync(&mut self, _inst: Inst) {}

    fn lohi_mov<const TO_REG: bool, const HI: bool>(&mut self, inst: Inst) {
        match (TO_REG, HI) {
            (true, true) => self.cpu.set_reg(inst.rd(), self.cpu.hi),
            (true, false) => self.cpu.set_reg(inst.rd(), self.cpu.lo),
            (false, true) => self.cpu.hi = self.cpu.reg(inst.rs()),
            (false, false) => self.cpu.lo = self.cpu.reg(inst.rs()),
        }
    }

    fn mult<const SIGNED: bool>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs()) as u32;
        let b = self.cpu.reg(inst.rt()) as u32;
        let res = if SIGNED {
            (a as i32 as i64).wrapping_mul(b as i32 as i64) as u64
        } else {
            a.u64() * b.u64()
        };
        self.cpu.lo = (res as u32).sext();
        self.cpu.hi = ((res >> 32) as u32).sext();
        self.tick(4);
    }

    fn dmult<const SIGNED: bool>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs());
        let b = self.cpu.reg(inst.rt());
        let res = if SIGNED {
            (a as i64 as i128).wrapping_mul(b as i64 as i128) as u128
        } else {
            (a as u128) * (b as u128)
        };
        self.cpu.lo = res as u64;
        self.cpu.hi = (res >> 64) as u64;
        self.tick(7);
    }

    fn div<const SIGNED: bool>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs()) as u32;
        let b = self.cpu.reg(inst.rt()) as u32;
        let (lo, hi) = match (SIGNED, b) {
            (true, 0) if (a as i32) < 0 => (1, a),
            (true, 0) => (u32::MAX, a),
            (true, _) if a == 0x8000_0000 && b == u32::MAX => (a, 0),
            (true, _) => (
                ((a as i32) / (b as i32)) as u32,
                ((a as i32) % (b as i32)) as u32,
            ),
            (false, 0) => (u32::MAX, a),
            (false, _) => (a / b, a % b),
        };
        self.cpu.lo = lo.sext();
        self.cpu.hi = hi.sext();
        self.tick(36);
    }

    fn ddiv<const SIGNED: bool>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs());
        let b = self.cpu.reg(inst.rt());
        let (lo, hi) = match (SIGNED, b) {
            (true, 0) if (a as i64) < 0 => (1, a),
            (true, 0) => (u64::MAX, a),
            (true, _) if a == 1 << 63 && b == u64::MAX => (a, 0),
            (true, _) => (
                ((a as i64) / (b as i64)) as u64,
                ((a as i64) % (b as i64)) as u64,
            ),
            (false, 0) => (u64::MAX, a),
            (false, _) => (a / b, a % b),
        };
        self.cpu.lo = lo;
        self.cpu.hi = hi;
        self.tick(68);
    }

    fn trap<const IMM: bool, const OP: u8>(&mut self, inst: Inst) {
        let a = self.cpu.reg(inst.rs());
        let b = if IMM {
            inst.imm16s()
        } else {
            self.cpu.reg(inst.rt())
        };
        let cond = match OP {
            op::TGE => (a as i64) >= (b as i64),
            op::TGEU => a >= b,
            op::TLT => (a as i64) < (b as i64),
            op::TLTU => a < b,
            op::TEQ => a == b,
            op::TNE => a != b,
            _ => unreachable!(),
        };
        if cond {
            Cpu::exception_occurred(self, Exception::Trap);
        }
    }
}

impl Cpu {
    /// Read-modify-write a value at a virtual address, translated once
    /// as a store. Used by the unaligned store instructions.
    fn modify<T: NumExt>(n64: &mut Nintendo64, vaddr: u64, f: impl FnOnce(T) -> T) {
        let Some(t) = Self::translate(n64, vaddr, Access::Store) else {
            return;
        };
        if t.cached {
            let value = f(n64.dcache_read::<T>(t.paddr));
            n64.dcache_write::<T>(t.paddr, value);
        } else {
            let value = f(n64.read_physical::<T>(t.paddr));
            n64.write_physical::<T>(t.paddr, value);
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Inst(pub u32);

impl Inst {
    pub fn rs(self) -> u32 {
        self.0.bits(21, 5)
    }

    pub fn rt(self) -> u32 {
        self.0.bits(16, 5)
    }

    pub fn rd(self) -> u32 {
        self.0.bits(11, 5)
    }

    pub fn sa(self) -> u32 {
        self.0.bits(6, 5)
    }

    pub fn funct(self) -> u32 {
        self.0.bits(0, 6)
    }

    pub fn imm16(self) -> u16 {
        self.0.low()
    }

    /// Immediate, sign-extended to 64 bits.
    pub fn imm16s(self) -> u64 {
        self.0.low() as i16 as u64
    }

    pub fn imm26(self) -> u32 {
        self.0.bits(0, 26)
    }

    // COP1 operand fields
    pub fn fmt(self) -> u32 {
        self.rs()
    }

    pub fn ft(self) -> u32 {
        self.rt()
    }

    pub fn fs(self) -> u32 {
        self.rd()
    }

    pub fn fd(self) -> u32 {
        self.sa()
    }
}
