// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! MIPS Interface: the interrupt aggregator between the RCP
//! and the CPU's IP2 line.

use common::numutil::NumExt;

use super::{apply_set_clear, RegisterFile};
use crate::{
    addr::{MI_INTERRUPT, MI_MASK, MI_MODE, MI_VERSION},
    cpu::Cpu,
    Nintendo64,
};

/// RCP interrupt sources, by their bit in MI_INTERRUPT.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interrupt {
    Sp = 0,
    Si = 1,
    Ai = 2,
    Vi = 3,
    Pi = 4,
    Dp = 5,
}

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MipsInterface {
    pub intr: u32,
    pub mask: u32,
    init_length: u32,
    init_mode: bool,
    ebus_test: bool,
    rdram_reg_mode: bool,
    regs: RegisterFile<4>,
}

impl MipsInterface {
    pub fn read_reg(&self, addr: u32) -> u32 {
        match addr & 0xF {
            MI_MODE => {
                self.init_length
                    | (self.init_mode as u32) << 7
                    | (self.ebus_test as u32) << 8
                    | (self.rdram_reg_mode as u32) << 9
            }
            MI_VERSION => 0x0202_0102,
            MI_INTERRUPT => self.intr,
            MI_MASK => self.mask,
            _ => self.regs[addr],
        }
    }

    /// Is the interrupt line to the CPU currently high?
    pub fn line(&self) -> bool {
        self.intr & self.mask != 0
    }
}

impl Nintendo64 {
    pub(crate) fn mi_write(&mut self, addr: u32, value: u32) {
        self.mi.regs[addr] = value;
        match addr & 0xF {
            MI_MODE => {
                let mi = &mut self.mi;
                mi.init_length = value & 0x7F;
                mi.init_mode = apply_set_clear(mi.init_mode as u32, value, 7, 1) != 0;
                mi.ebus_test = apply_set_clear(mi.ebus_test as u32, value, 9, 1) != 0;
                mi.rdram_reg_mode = apply_set_clear(mi.rdram_reg_mode as u32, value, 12, 1) != 0;
                if value.is_bit(11) {
                    self.clear_interrupt(Interrupt::Dp);
                }
            }
            MI_MASK => {
                self.mi.mask = apply_set_clear(self.mi.mask, value, 0, 6);
                self.update_mi_line();
            }
            _ => (),
        }
    }

    /// Raise an RCP interrupt. The bit stays set until acknowledged
    /// at the device that raised it.
    pub fn raise_interrupt(&mut self, int: Interrupt) {
        log::debug!("Raising MI interrupt {int:?}");
        self.mi.intr |= 1 << int as u32;
        self.update_mi_line();
    }

    /// Acknowledge an RCP interrupt.
    pub fn clear_interrupt(&mut self, int: Interrupt) {
        self.mi.intr &= !(1 << int as u32);
        self.update_mi_line();
    }

    fn update_mi_line(&mut self) {
        let line = self.mi.line();
        self.set_cpu_interrupt_line(2, line);
    }

    /// Set one of the CPU's external interrupt pins, IP2 through IP6.
    /// IP2 is driven by the MI, IP3 by the cartridge, IP4 by the
    /// reset button.
    pub fn set_cpu_interrupt_line(&mut self, line: u8, high: bool) {
        debug_assert!((2..=6).contains(&line));
        let bit = 1 << (line & 7);
        let cause = &mut self.cpu.cop0.cause;
        let ip = if high { cause.ip() | bit } else { cause.ip() & !bit };
        cause.set_ip(ip);
        Cpu::update_interrupts(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::N64Config;

    #[test]
    fn raise_sets_exactly_one_bit() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.raise_interrupt(Interrupt::Vi);
        assert_eq!(n64.mi.intr, 0b1000);
        n64.raise_interrupt(Interrupt::Si);
        assert_eq!(n64.mi.intr, 0b1010);
        n64.clear_interrupt(Interrupt::Vi);
        assert_eq!(n64.mi.intr, 0b0010);
    }

    #[test]
    fn mask_drives_ip2() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.raise_interrupt(Interrupt::Pi);
        assert_eq!(n64.cpu.cop0.cause.ip() & 4, 0);
        // Set PI mask
        n64.mi_write(MI_MASK, 1 << 9);
        assert_eq!(n64.mi.mask, 1 << 4);
        assert_eq!(n64.cpu.cop0.cause.ip() & 4, 4);
        // Clear it again
        n64.mi_write(MI_MASK, 1 << 8);
        assert_eq!(n64.cpu.cop0.cause.ip() & 4, 0);
    }

    #[test]
    fn mode_reads_back() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.mi_write(MI_MODE, 0x10F | (1 << 8));
        assert_eq!(n64.mi.read_reg(MI_MODE), 0x0F | 0x80);
        assert_eq!(n64.mi.read_reg(MI_VERSION), 0x0202_0102);
    }
}
