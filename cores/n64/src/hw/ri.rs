// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! RDRAM Interface and the RDRAM chips' own registers. Neither affects
//! timing; they only need to hold what the boot code writes.

use super::RegisterFile;
use crate::addr::{
    RI_CONFIG, RI_CURRENT_LOAD, RI_LATENCY, RI_MODE, RI_REFRESH, RI_RERROR, RI_SELECT, RI_WERROR,
};

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RdramInterface {
    regs: RegisterFile<8>,
    rdram_regs: RegisterFile<16>,
}

impl RdramInterface {
    pub fn read_reg(&self, addr: u32) -> u32 {
        match addr & 0x1F {
            RI_CURRENT_LOAD | RI_WERROR => 0,
            _ => self.regs[addr],
        }
    }

    pub fn write_reg(&mut self, addr: u32, value: u32) {
        let value = match addr & 0x1F {
            RI_MODE => value & 0xF,
            RI_CONFIG => value & 0x7F,
            RI_SELECT => value & 0xFF,
            RI_REFRESH => value & 0x7_FFFF,
            RI_LATENCY => value & 0xF,
            RI_RERROR => return,
            // Writing acknowledges errors; there never are any
            RI_WERROR => 0,
            _ => value,
        };
        self.regs[addr] = value;
    }

    pub fn read_rdram_reg(&self, addr: u32) -> u32 {
        self.rdram_regs[addr]
    }

    pub fn write_rdram_reg(&mut self, addr: u32, value: u32) {
        self.rdram_regs[addr] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_are_masked() {
        let mut ri = RdramInterface::default();
        ri.write_reg(RI_MODE, 0xFF);
        ri.write_reg(RI_SELECT, 0x1_0014);
        ri.write_reg(RI_CURRENT_LOAD, 5);
        ri.write_reg(RI_RERROR, 5);
        assert_eq!(ri.read_reg(RI_MODE), 0xF);
        assert_eq!(ri.read_reg(RI_SELECT), 0x14);
        assert_eq!(ri.read_reg(RI_CURRENT_LOAD), 0);
        assert_eq!(ri.read_reg(RI_RERROR), 0);
    }

    #[test]
    fn rdram_registers_hold_values() {
        let mut ri = RdramInterface::default();
        ri.write_rdram_reg(0x0C, 0xC0C0_C0C0);
        assert_eq!(ri.read_rdram_reg(0x0C), 0xC0C0_C0C0);
        // The window is broadcast to every chip
        assert_eq!(ri.read_rdram_reg(0x8_000C), 0xC0C0_C0C0);
    }
}
