// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Serial Interface: DMA between RDRAM and PIF RAM.

use common::numutil::NumExt;

use super::{pif::Pif, Interrupt, RegisterFile};
use crate::{
    addr::{
        PIF_RAM_SIZE, SI_DRAM_ADDR, SI_PIF_AD_RD4B, SI_PIF_AD_RD64B, SI_PIF_AD_WR4B,
        SI_PIF_AD_WR64B, SI_STATUS,
    },
    scheduling::N64Event,
    Nintendo64,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct SiDma {
    to_rdram: bool,
    dram_addr: u32,
    pif_offset: usize,
    len: usize,
}

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SerialInterface {
    regs: RegisterFile<8>,
    dram_addr: u32,
    dma_busy: bool,
    queued: Option<SiDma>,
    pub pif: Pif,
}

impl SerialInterface {
    pub fn read_reg(n64: &mut Nintendo64, addr: u32) -> u32 {
        match addr & 0x1F {
            SI_DRAM_ADDR => n64.si.dram_addr,
            SI_STATUS => {
                let int = n64.mi.intr.is_bit(Interrupt::Si as u16);
                n64.si.dma_busy as u32 | (int as u32) << 12
            }
            _ => n64.si.regs[addr],
        }
    }

    fn start(n64: &mut Nintendo64, dma: SiDma) {
        log::debug!(
            "SI DMA of {} bytes, RDRAM 0x{:06X} {} PIF RAM",
            dma.len,
            dma.dram_addr,
            if dma.to_rdram { "<-" } else { "->" }
        );
        let start = dma.dram_addr as usize;
        let pif = dma.pif_offset..dma.pif_offset + dma.len;
        if dma.to_rdram {
            n64.si.pif.run_joybus();
            if let Some(dst) = n64.memory.rdram.get_mut(start..start + dma.len) {
                dst.copy_from_slice(&n64.si.pif.ram[pif]);
                n64.invalidate_code(dma.dram_addr, dma.len as u32);
            }
        } else if let Some(src) = n64.memory.rdram.get(start..start + dma.len) {
            n64.si.pif.ram[pif].copy_from_slice(src);
        }

        n64.si.dma_busy = true;
        let cycles = n64.config.si_dma_cycles.max(1);
        n64.scheduler.add_event(N64Event::SiDma, cycles);
    }

    /// The active transfer finished.
    pub(crate) fn dma_done(n64: &mut Nintendo64) {
        n64.si.dma_busy = false;
        n64.raise_interrupt(Interrupt::Si);
        if let Some(dma) = n64.si.queued.take() {
            Self::start(n64, dma);
        }
    }

    fn request(n64: &mut Nintendo64, to_rdram: bool, pif_addr: u32, len: usize) {
        let dma = SiDma {
            to_rdram,
            dram_addr: n64.si.dram_addr,
            pif_offset: (pif_addr as usize) & (PIF_RAM_SIZE - len),
            len,
        };
        if n64.si.dma_busy {
            n64.si.queued = Some(dma);
        } else {
            Self::start(n64, dma);
        }
    }
}

impl Nintendo64 {
    pub(crate) fn si_write(&mut self, addr: u32, value: u32) {
        self.si.regs[addr] = value;
        match addr & 0x1F {
            SI_DRAM_ADDR => self.si.dram_addr = value & 0xFF_FFF8,
            SI_PIF_AD_RD64B => SerialInterface::request(self, true, value, PIF_RAM_SIZE),
            SI_PIF_AD_WR64B => SerialInterface::request(self, false, value, PIF_RAM_SIZE),
            SI_PIF_AD_RD4B => SerialInterface::request(self, true, value, 4),
            SI_PIF_AD_WR4B => SerialInterface::request(self, false, value, 4),
            SI_STATUS => self.clear_interrupt(Interrupt::Si),
            _ => (),
        }
    }
}
