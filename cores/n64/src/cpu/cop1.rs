// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The floating-point unit, COP1.

use std::ops::{Add, Div, Mul, Sub};

use common::{
    numutil::{NumExt, U32Ext},
    Time,
};

use crate::{
    cpu::{inst::InstructionHandler, Cpu, Exception, Inst},
    Nintendo64,
};

type Lut = [InstructionHandler; 64];
type FmtLut = [InstructionHandler; 32];

const COP1: FmtLut = Nintendo64::cop1_table();
const FMT_S: Lut = Nintendo64::float_table::<f32>();
const FMT_D: Lut = Nintendo64::float_table::<f64>();
const FMT_W: Lut = Nintendo64::int_table::<false>();
const FMT_L: Lut = Nintendo64::int_table::<true>();

/// Implementation revision reported in FCR0.
const FCR0: u32 = 0x0000_0A00;
const FCR31_WRITABLE: u32 = 0x0183_FFFF;
/// Condition bit in FCR31.
const CONDITION: u16 = 23;
/// "Unimplemented operation" cause bit in FCR31.
const UNIMPLEMENTED: u16 = 17;

mod op {
    pub const ADD: u8 = 0;
    pub const SUB: u8 = 1;
    pub const MUL: u8 = 2;
    pub const DIV: u8 = 3;

    pub const SQRT: u8 = 0;
    pub const ABS: u8 = 1;
    pub const MOV: u8 = 2;
    pub const NEG: u8 = 3;

    /// Use the rounding mode in FCR31.
    pub const CURRENT: u8 = 0;
    pub const ROUND: u8 = 1;
    pub const TRUNC: u8 = 2;
    pub const CEIL: u8 = 3;
    pub const FLOOR: u8 = 4;
}

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Fpu {
    fpr: [u64; 32],
    pub fcr31: u32,
}

impl Fpu {
    /// Read the low word of a register. With FR clear, odd registers
    /// are the high half of the even register below.
    pub fn read_s(&self, idx: u32, fr: bool) -> u32 {
        if !fr && idx & 1 == 1 {
            (self.fpr[(idx & !1).us()] >> 32) as u32
        } else {
            self.fpr[idx.us()] as u32
        }
    }

    pub fn write_s(&mut self, idx: u32, fr: bool, value: u32) {
        if !fr && idx & 1 == 1 {
            let reg = &mut self.fpr[(idx & !1).us()];
            *reg = (*reg & 0xFFFF_FFFF) | (value.u64() << 32);
        } else {
            let reg = &mut self.fpr[idx.us()];
            *reg = (*reg & !0xFFFF_FFFF) | value.u64();
        }
    }

    /// Read a full register. With FR clear, only even registers are addressable.
    pub fn read_d(&self, idx: u32, fr: bool) -> u64 {
        let idx = if fr { idx } else { idx & !1 };
        self.fpr[idx.us()]
    }

    pub fn write_d(&mut self, idx: u32, fr: bool, value: u64) {
        let idx = if fr { idx } else { idx & !1 };
        self.fpr[idx.us()] = value;
    }

    fn condition(&self) -> bool {
        self.fcr31.is_bit(CONDITION)
    }

    fn set_condition(&mut self, cond: bool) {
        self.fcr31 = self.fcr31.set_bit(CONDITION, cond);
    }

    fn round(&self, value: f64, mode: u8) -> f64 {
        let mode = if mode == op::CURRENT {
            match self.fcr31 & 3 {
                0 => op::ROUND,
                1 => op::TRUNC,
                2 => op::CEIL,
                _ => op::FLOOR,
            }
        } else {
            mode
        };
        match mode {
            op::ROUND => value.round_ties_even(),
            op::TRUNC => value.trunc(),
            op::CEIL => value.ceil(),
            _ => value.floor(),
        }
    }
}

/// A floating-point format the FPU computes in.
trait Float:
    Copy + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self>
{
    const MUL_CYCLES: Time;
    const DIV_CYCLES: Time;

    fn read(fpu: &Fpu, idx: u32, fr: bool) -> Self;
    fn write(fpu: &mut Fpu, idx: u32, fr: bool, value: Self);
    fn sqrt(self) -> Self;
    fn abs(self) -> Self;
    fn neg(self) -> Self;
    fn is_nan(self) -> bool;
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Float for f32 {
    const MUL_CYCLES: Time = 4;
    const DIV_CYCLES: Time = 28;

    fn read(fpu: &Fpu, idx: u32, fr: bool) -> Self {
        f32::from_bits(fpu.read_s(idx, fr))
    }

    fn write(fpu: &mut Fpu, idx: u32, fr: bool, value: Self) {
        fpu.write_s(idx, fr, value.to_bits());
    }

    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    fn abs(self) -> Self {
        f32::abs(self)
    }

    fn neg(self) -> Self {
        -self
    }

    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Float for f64 {
    const MUL_CYCLES: Time = 7;
    const DIV_CYCLES: Time = 57;

    fn read(fpu: &Fpu, idx: u32, fr: bool) -> Self {
        f64::from_bits(fpu.read_d(idx, fr))
    }

    fn write(fpu: &mut Fpu, idx: u32, fr: bool, value: Self) {
        fpu.write_d(idx, fr, value.to_bits());
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn neg(self) -> Self {
        -self
    }

    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Nintendo64 {
    const fn cop1_table() -> FmtLut {
        let mut lut: FmtLut = [Self::reserved_instruction; 32];
        lut[0x00] = Self::mfc1::<false>;
        lut[0x01] = Self::mfc1::<true>; // DMFC1
        lut[0x02] = Self::cfc1;
        lut[0x04] = Self::mtc1::<false>;
        lut[0x05] = Self::mtc1::<true>; // DMTC1
        lut[0x06] = Self::ctc1;
        lut[0x08] = Self::bc1;
        lut[0x10] = Self::fmt_s;
        lut[0x11] = Self::fmt_d;
        lut[0x14] = Self::fmt_w;
        lut[0x15] = Self::fmt_l;
        lut
    }

    const fn float_table<F: Float>() -> Lut {
        let mut lut: Lut = [Self::unimplemented_float; 64];
        lut[0x00] = Self::float_arith::<F, { op::ADD }>;
        lut[0x01] = Self::float_arith::<F, { op::SUB }>;
        lut[0x02] = Self::float_arith::<F, { op::MUL }>;
        lut[0x03] = Self::float_arith::<F, { op::DIV }>;
        lut[0x04] = Self::float_unary::<F, { op::SQRT }>;
        lut[0x05] = Self::float_unary::<F, { op::ABS }>;
        lut[0x06] = Self::float_unary::<F, { op::MOV }>;
        lut[0x07] = Self::float_unary::<F, { op::NEG }>;

        lut[0x08] = Self::float_to_int::<F, true, { op::ROUND }>; // ROUND.L
        lut[0x09] = Self::float_to_int::<F, true, { op::TRUNC }>; // TRUNC.L
        lut[0x0A] = Self::float_to_int::<F, true, { op::CEIL }>; // CEIL.L
        lut[0x0B] = Self::float_to_int::<F, true, { op::FLOOR }>; // FLOOR.L
        lut[0x0C] = Self::float_to_int::<F, false, { op::ROUND }>; // ROUND.W
        lut[0x0D] = Self::float_to_int::<F, false, { op::TRUNC }>; // TRUNC.W
        lut[0x0E] = Self::float_to_int::<F, false, { op::CEIL }>; // CEIL.W
        lut[0x0F] = Self::float_to_int::<F, false, { op::FLOOR }>; // FLOOR.W

        lut[0x20] = Self::float_to_float::<F, f32>; // CVT.S
        lut[0x21] = Self::float_to_float::<F, f64>; // CVT.D
        lut[0x24] = Self::float_to_int::<F, false, { op::CURRENT }>; // CVT.W
        lut[0x25] = Self::float_to_int::<F, true, { op::CURRENT }>; // CVT.L

        let mut idx = 0x30;
        while idx < 0x40 {
            lut[idx] = Self::float_compare::<F>;
            idx += 1;
        }
        lut
    }

    const fn int_table<const LONG: bool>() -> Lut {
        let mut lut: Lut = [Self::unimplemented_float; 64];
        lut[0x20] = Self::int_to_float::<LONG, f32>; // CVT.S
        lut[0x21] = Self::int_to_float::<LONG, f64>; // CVT.D
        lut
    }

    fn fr(&self) -> bool {
        self.cpu.cop0.status.fr()
    }

    /// Check COP1 is usable, raising CpU if not.
    fn fpu_usable(&mut self) -> bool {
        let usable = self.cpu.cop0.cop_usable(1);
        if !usable {
            Cpu::coprocessor_unusable(self, 1);
        }
        usable
    }

    pub(super) fn cop1(&mut self, inst: Inst) {
        if self.fpu_usable() {
            let handler = COP1[inst.fmt().us()];
            handler(self, inst);
        }
    }

    fn fmt_s(&mut self, inst: Inst) {
        FMT_S[inst.funct().us()](self, inst);
    }

    fn fmt_d(&mut self, inst: Inst) {
        FMT_D[inst.funct().us()](self, inst);
    }

    fn fmt_w(&mut self, inst: Inst) {
        FMT_W[inst.funct().us()](self, inst);
    }

    fn fmt_l(&mut self, inst: Inst) {
        FMT_L[inst.funct().us()](self, inst);
    }

    fn unimplemented_float(&mut self, inst: Inst) {
        log::warn!("Unimplemented FPU operation 0x{:08X}", inst.0);
        self.cpu.fpu.fcr31 = self.cpu.fpu.fcr31.set_bit(UNIMPLEMENTED, true);
        Cpu::exception_occurred(self, Exception::FloatingPoint);
    }

    fn mfc1<const DOUBLE: bool>(&mut self, inst: Inst) {
        let fr = self.fr();
        if DOUBLE {
            let value = self.cpu.fpu.read_d(inst.fs(), fr);
            self.cpu.set_reg(inst.rt(), value);
        } else {
            let value = self.cpu.fpu.read_s(inst.fs(), fr);
            self.cpu.set_reg32(inst.rt(), value);
        }
    }

    fn mtc1<const DOUBLE: bool>(&mut self, inst: Inst) {
        let fr = self.fr();
        let value = self.cpu.reg(inst.rt());
        if DOUBLE {
            self.cpu.fpu.write_d(inst.fs(), fr, value);
        } else {
            self.cpu.fpu.write_s(inst.fs(), fr, value as u32);
        }
    }

    fn cfc1(&mut self, inst: Inst) {
        let value = match inst.fs() {
            0 => FCR0,
            31 => self.cpu.fpu.fcr31,
            _ => 0,
        };
        self.cpu.set_reg32(inst.rt(), value);
    }

    fn ctc1(&mut self, inst: Inst) {
        if inst.fs() == 31 {
            self.cpu.fpu.fcr31 = (self.cpu.reg(inst.rt()) as u32) & FCR31_WRITABLE;
        }
    }

    fn bc1(&mut self, inst: Inst) {
        let on_true = inst.rt().is_bit(0);
        let likely = inst.rt().is_bit(1);
        let cond = self.cpu.fpu.condition() == on_true;
        if likely {
            self.branch_if::<true>(cond, inst);
        } else {
            self.branch_if::<false>(cond, inst);
        }
    }

    fn float_arith<F: Float, const OP: u8>(&mut self, inst: Inst) {
        let fr = self.fr();
        let a = F::read(&self.cpu.fpu, inst.fs(), fr);
        let b = F::read(&self.cpu.fpu, inst.ft(), fr);
        let (value, cycles) = match OP {
            op::ADD => (a + b, 2),
            op::SUB => (a - b, 2),
            op::MUL => (a * b, F::MUL_CYCLES),
            op::DIV => (a / b, F::DIV_CYCLES),
            _ => unreachable!(),
        };
        F::write(&mut self.cpu.fpu, inst.fd(), fr, value);
        self.tick(cycles);
    }

    fn float_unary<F: Float, const OP: u8>(&mut self, inst: Inst) {
        let fr = self.fr();
        let a = F::read(&self.cpu.fpu, inst.fs(), fr);
        let value = match OP {
            op::SQRT => {
                self.tick(F::DIV_CYCLES);
                a.sqrt()
            }
            op::ABS => a.abs(),
            op::MOV => a,
            op::NEG => a.neg(),
            _ => unreachable!(),
        };
        F::write(&mut self.cpu.fpu, inst.fd(), fr, value);
    }

    fn float_to_float<F: Float, T: Float>(&mut self, inst: Inst) {
        let fr = self.fr();
        let a = F::read(&self.cpu.fpu, inst.fs(), fr);
        T::write(&mut self.cpu.fpu, inst.fd(), fr, T::from_f64(a.to_f64()));
    }

    fn float_to_int<F: Float, const LONG: bool, const MODE: u8>(&mut self, inst: Inst) {
        let fr = self.fr();
        let a = F::read(&self.cpu.fpu, inst.fs(), fr);
        let value = self.cpu.fpu.round(a.to_f64(), MODE);
        if LONG {
            self.cpu.fpu.write_d(inst.fd(), fr, value as i64 as u64);
        } else {
            self.cpu.fpu.write_s(inst.fd(), fr, value as i32 as u32);
        }
    }

    fn int_to_float<const LONG: bool, T: Float>(&mut self, inst: Inst) {
        let fr = self.fr();
        let value = if LONG {
            self.cpu.fpu.read_d(inst.fs(), fr) as i64 as f64
        } else {
            self.cpu.fpu.read_s(inst.fs(), fr) as i32 as f64
        };
        T::write(&mut self.cpu.fpu, inst.fd(), fr, T::from_f64(value));
    }

    fn float_compare<F: Float>(&mut self, inst: Inst) {
        let fr = self.fr();
        let a = F::read(&self.cpu.fpu, inst.fs(), fr);
        let b = F::read(&self.cpu.fpu, inst.ft(), fr);
        let cond = inst.funct();
        let result = if a.is_nan() || b.is_nan() {
            cond.is_bit(0)
        } else {
            (cond.is_bit(1) && a == b) || (cond.is_bit(2) && a < b)
        };
        self.cpu.fpu.set_condition(result);
    }

    pub(super) fn lwc1(&mut self, inst: Inst) {
        if !self.fpu_usable() {
            return;
        }
        let addr = self.cpu.reg(inst.rs()).wrapping_add(inst.imm16s());
        let value = Cpu::read::<u32>(self, addr);
        if !self.cpu.exception_latched {
            let fr = self.fr();
            self.cpu.fpu.write_s(inst.ft(), fr, value);
        }
    }

    pub(super) fn ldc1(&mut self, inst: Inst) {
        if !self.fpu_usable() {
            return;
        }
        let addr = self.cpu.reg(inst.rs()).wrapping_add(inst.imm16s());
        let value = Cpu::read::<u64>(self, addr);
        if !self.cpu.exception_latched {
            let fr = self.fr();
            self.cpu.fpu.write_d(inst.ft(), fr, value);
        }
    }

    pub(super) fn swc1(&mut self, inst: Inst) {
        if !self.fpu_usable() {
            return;
        }
        let addr = self.cpu.reg(inst.rs()).wrapping_add(inst.imm16s());
        let value = self.cpu.fpu.read_s(inst.ft(), self.fr());
        Cpu::write::<u32>(self, addr, value);
    }

    pub(super) fn sdc1(&mut self, inst: Inst) {
        if !self.fpu_usable() {
            return;
        }
        let addr = self.cpu.reg(inst.rs()).wrapping_add(inst.imm16s());
        let value = self.cpu.fpu.read_d(inst.ft(), self.fr());
        Cpu::write::<u64>(self, addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu::Status, N64Config};

    fn system(fr: bool) -> Box<Nintendo64> {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.cpu.cop0.status = Status::new().with_cu(0b0011).with_fr(fr);
        Cpu::status_changed(&mut n64);
        n64
    }

    fn fpu(fmt: u32, ft: u32, fs: u32, fd: u32, funct: u32) -> u32 {
        (0x11 << 26) | (fmt << 21) | (ft << 16) | (fs << 11) | (fd << 6) | funct
    }

    #[test]
    fn fr0_pairs_registers() {
        let mut fpu = Fpu::default();
        fpu.write_s(0, false, 0x1111_1111);
        fpu.write_s(1, false, 0x2222_2222);
        assert_eq!(fpu.read_d(0, false), 0x2222_2222_1111_1111);
        assert_eq!(fpu.read_d(1, false), 0x2222_2222_1111_1111);
        assert_eq!(fpu.read_s(1, true), 0);
    }

    #[test]
    fn single_arithmetic() {
        let mut n64 = system(true);
        f32::write(&mut n64.cpu.fpu, 2, true, 1.5);
        f32::write(&mut n64.cpu.fpu, 4, true, 2.0);
        let before = n64.cpu.cycles;
        n64.run_inst(fpu(0x10, 4, 2, 6, 0x02)); // MUL.S f6, f2, f4
        assert_eq!(f32::read(&n64.cpu.fpu, 6, true), 3.0);
        assert_eq!(n64.cpu.cycles - before, 4);
    }

    #[test]
    fn conversions_follow_rounding_mode() {
        let mut n64 = system(true);
        f64::write(&mut n64.cpu.fpu, 2, true, 2.5);
        n64.run_inst(fpu(0x11, 0, 2, 4, 0x24)); // CVT.W.D, nearest
        assert_eq!(n64.cpu.fpu.read_s(4, true), 2);
        n64.cpu.fpu.fcr31 = 2; // towards +inf
        n64.run_inst(fpu(0x11, 0, 2, 4, 0x24));
        assert_eq!(n64.cpu.fpu.read_s(4, true), 3);
        n64.run_inst(fpu(0x11, 0, 2, 4, 0x0D)); // TRUNC.W.D
        assert_eq!(n64.cpu.fpu.read_s(4, true), 2);

        n64.cpu.fpu.write_s(8, true, (-7i32) as u32);
        n64.run_inst(fpu(0x14, 0, 8, 10, 0x21)); // CVT.D.W
        assert_eq!(f64::read(&n64.cpu.fpu, 10, true), -7.0);
    }

    #[test]
    fn compare_sets_condition() {
        let mut n64 = system(true);
        f32::write(&mut n64.cpu.fpu, 0, true, 1.0);
        f32::write(&mut n64.cpu.fpu, 1, true, 2.0);
        n64.run_inst(fpu(0x10, 1, 0, 0, 0x3C)); // C.LT.S f0, f1
        assert!(n64.cpu.fpu.condition());
        n64.run_inst(fpu(0x10, 1, 0, 0, 0x32)); // C.EQ.S
        assert!(!n64.cpu.fpu.condition());
    }

    #[test]
    fn unusable_without_cu1() {
        let mut n64 = system(true);
        n64.cpu.cop0.status.set_cu(0);
        n64.run_inst(fpu(0x10, 0, 0, 0, 0));
        assert_eq!(
            n64.cpu.cop0.cause.exc_code(),
            Exception::CoprocessorUnusable as u8
        );
        assert_eq!(n64.cpu.cop0.cause.ce(), 1);
    }

    #[test]
    fn control_registers() {
        let mut n64 = system(true);
        n64.cpu.set_reg(1, 0xFFFF_FFFF);
        n64.run_inst((0x11 << 26) | (0x06 << 21) | (1 << 16) | (31 << 11)); // CTC1
        assert_eq!(n64.cpu.fpu.fcr31, FCR31_WRITABLE);
        n64.run_inst((0x11 << 26) | (0x02 << 21) | (2 << 16)); // CFC1 r2, FCR0
        assert_eq!(n64.cpu.reg(2), FCR0.u64());
    }
}
