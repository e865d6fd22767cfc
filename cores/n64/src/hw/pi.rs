// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Peripheral Interface: DMA between RDRAM and the cartridge bus.

use common::{numutil::NumExt, Time};

use super::{Interrupt, RegisterFile};
use crate::{
    addr::*,
    config::PiDmaTiming,
    scheduling::N64Event,
    Nintendo64, CPU_CLOCK, RCP_CLOCK,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct PiDma {
    /// Cartridge to RDRAM, the usual direction.
    to_rdram: bool,
    dram_addr: u32,
    cart_addr: u32,
    len: u32,
}

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PeripheralInterface {
    regs: RegisterFile<16>,
    dram_addr: u32,
    cart_addr: u32,
    dma_busy: bool,
    /// Requested while another transfer was running.
    queued: Option<PiDma>,
}

impl PeripheralInterface {
    pub fn read_reg(n64: &mut Nintendo64, addr: u32) -> u32 {
        let pi = &n64.pi;
        match addr & 0x3F {
            PI_DRAM_ADDR => pi.dram_addr,
            PI_CART_ADDR => pi.cart_addr,
            PI_RD_LEN | PI_WR_LEN => 0x7F,
            PI_STATUS => {
                let int = n64.mi.intr.is_bit(Interrupt::Pi as u16);
                pi.dma_busy as u32 | (int as u32) << 3
            }
            _ => pi.regs[addr],
        }
    }

    /// Cost of a transfer in CPU cycles.
    fn dma_cycles(n64: &Nintendo64, cart_addr: u32, len: u32) -> Time {
        match n64.config.pi_dma_timing {
            PiDmaTiming::Flat { cycles_per_byte } => len as Time * cycles_per_byte,
            PiDmaTiming::Domain => {
                let base = if Self::is_domain2(cart_addr) {
                    PI_BSD_DOM2_LAT
                } else {
                    PI_BSD_DOM1_LAT
                };
                let regs = &n64.pi.regs;
                let latency = regs[base] as Time + 1;
                let pulse_width = regs[base + 4] as Time + 1;
                let page_size = 1 << (regs[base + 8] + 2);
                let release = regs[base + 12] as Time + 1;

                let pages = len.div_ceil(page_size) as Time;
                let halfwords = len.div_ceil(2) as Time;
                let rcp_cycles = pages * latency + halfwords * (pulse_width + release);
                rcp_cycles * CPU_CLOCK / RCP_CLOCK
            }
        }
    }

    fn is_domain2(cart_addr: u32) -> bool {
        matches!(
            cart_addr,
            CART_DOM2_ADDR1..=0x05FF_FFFF | CART_DOM2_ADDR2..=0x0FFF_FFFF
        )
    }

    fn start(n64: &mut Nintendo64, dma: PiDma) {
        log::debug!(
            "PI DMA of 0x{:X} bytes, RDRAM 0x{:06X} {} cart 0x{:08X}",
            dma.len,
            dma.dram_addr,
            if dma.to_rdram { "<-" } else { "->" },
            dma.cart_addr
        );
        if dma.to_rdram {
            for i in 0..dma.len {
                let byte = n64.read_physical::<u8>(dma.cart_addr.wrapping_add(i));
                if let Some(dst) = n64.memory.rdram.get_mut((dma.dram_addr + i).us()) {
                    *dst = byte;
                }
            }
            n64.invalidate_code(dma.dram_addr, dma.len);
        } else {
            for i in 0..dma.len {
                let byte = n64
                    .memory
                    .rdram
                    .get((dma.dram_addr + i).us())
                    .copied()
                    .unwrap_or(0);
                n64.write_physical::<u8>(dma.cart_addr.wrapping_add(i), byte);
            }
        }

        // Registers end up pointing past the transfer
        n64.pi.dram_addr = (dma.dram_addr + dma.len + 7) & 0xFF_FFF8;
        n64.pi.cart_addr = (dma.cart_addr + dma.len + 1) & !1;
        n64.pi.dma_busy = true;
        let cycles = Self::dma_cycles(n64, dma.cart_addr, dma.len).max(1);
        n64.scheduler.add_event(N64Event::PiDma, cycles);
    }

    /// The active transfer finished.
    pub(crate) fn dma_done(n64: &mut Nintendo64) {
        n64.pi.dma_busy = false;
        n64.raise_interrupt(Interrupt::Pi);
        if let Some(dma) = n64.pi.queued.take() {
            Self::start(n64, dma);
        }
    }

    fn request(n64: &mut Nintendo64, to_rdram: bool, len: u32) {
        let dma = PiDma {
            to_rdram,
            dram_addr: n64.pi.dram_addr,
            cart_addr: n64.pi.cart_addr,
            len,
        };
        if n64.pi.dma_busy {
            n64.pi.queued = Some(dma);
        } else {
            Self::start(n64, dma);
        }
    }
}

impl Nintendo64 {
    pub(crate) fn pi_write(&mut self, addr: u32, value: u32) {
        self.pi.regs[addr] = value;
        match addr & 0x3F {
            PI_DRAM_ADDR => self.pi.dram_addr = value & 0xFF_FFFE,
            PI_CART_ADDR => self.pi.cart_addr = value & !1,
            PI_RD_LEN => PeripheralInterface::request(self, false, (value & 0xFF_FFFF) + 1),
            PI_WR_LEN => PeripheralInterface::request(self, true, (value & 0xFF_FFFF) + 1),
            PI_STATUS => {
                if value.is_bit(0) {
                    self.scheduler.remove_event(N64Event::PiDma);
                    self.pi.dma_busy = false;
                    self.pi.queued = None;
                }
                if value.is_bit(1) {
                    self.clear_interrupt(Interrupt::Pi);
                }
            }
            PI_BSD_DOM1_PGS | PI_BSD_DOM2_PGS => self.pi.regs[addr] = value & 0xF,
            PI_BSD_DOM1_LAT..=PI_BSD_DOM2_RLS => self.pi.regs[addr] = value & 0xFF,
            _ => (),
        }
    }
}
