// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Display Processor command registers. No rasterization is done:
//! command lists complete as soon as they are submitted.

use super::{apply_set_clear, Interrupt, RegisterFile};
use crate::{
    addr::{DP_CURRENT, DP_END, DP_START, DP_STATUS},
    Nintendo64,
};

/// Command buffer ready, which is always the case.
const STATUS_CBUF_READY: u32 = 1 << 7;

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DisplayProcessor {
    regs: RegisterFile<8>,
    start: u32,
    end: u32,
    current: u32,
    /// XBUS, freeze and flush bits.
    status: u32,
}

impl DisplayProcessor {
    pub fn read_reg(&self, addr: u32) -> u32 {
        match addr & 0x1F {
            DP_START => self.start,
            DP_END => self.end,
            DP_CURRENT => self.current,
            DP_STATUS => self.status | STATUS_CBUF_READY,
            _ => self.regs[addr],
        }
    }
}

impl Nintendo64 {
    pub(crate) fn dp_write(&mut self, addr: u32, value: u32) {
        self.dp.regs[addr] = value;
        match addr & 0x1F {
            DP_START => {
                self.dp.start = value & 0xFF_FFF8;
                self.dp.current = self.dp.start;
            }
            DP_END => {
                self.dp.end = value & 0xFF_FFF8;
                self.dp.current = self.dp.end;
                log::debug!(
                    "DP command list 0x{:06X}..0x{:06X} submitted",
                    self.dp.start,
                    self.dp.end
                );
                self.raise_interrupt(Interrupt::Dp);
            }
            DP_STATUS => self.dp.status = apply_set_clear(self.dp.status, value, 0, 3),
            _ => (),
        }
    }
}
