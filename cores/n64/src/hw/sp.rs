// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Signal Processor interface: DMEM/IMEM, its DMA engine and the control
//! registers of the RSP. Microcode itself runs on a [VectorUnit].

use std::mem;

use common::{numutil::NumExt, Time, TimeS};

use super::{apply_set_clear, Interrupt, RegisterFile};
use crate::{
    addr::{
        SP_DMA_BUSY, SP_DMA_FULL, SP_DRAM_ADDR, SP_MEM_ADDR, SP_MEM_SIZE, SP_PC_REGS, SP_RD_LEN,
        SP_REGS, SP_SEMAPHORE, SP_STATUS, SP_WR_LEN,
    },
    Nintendo64,
};

/// Offset of the SP_PC register inside the SP register window.
const PC_OFFSET: u32 = SP_PC_REGS - SP_REGS;

/// Why a [VectorUnit] stopped running.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RspExit {
    /// The cycle budget ran out; by how much it was exceeded.
    Budget(TimeS),
    /// Microcode executed BREAK.
    Break,
}

/// The RSP's execution unit. DMEM (first half) and IMEM (second half)
/// are shared with the CPU.
pub trait VectorUnit: Send {
    /// Run microcode starting at `pc` for about `cycles` RSP cycles.
    fn run(&mut self, pc: &mut u32, cycles: Time, mem: &mut [u8; SP_MEM_SIZE]) -> RspExit;
    /// Read a scalar register.
    fn read(&self, reg: u32) -> u32;
    /// Write a scalar register.
    fn write(&mut self, reg: u32, value: u32);
}

/// Unit used when no microcode implementation is attached.
/// Every task finishes immediately, as if it began with BREAK.
#[derive(Debug, Default, Clone)]
pub struct HaltingUnit {
    regs: [u32; 32],
}

impl VectorUnit for HaltingUnit {
    fn run(&mut self, _pc: &mut u32, _cycles: Time, _mem: &mut [u8; SP_MEM_SIZE]) -> RspExit {
        RspExit::Break
    }

    fn read(&self, reg: u32) -> u32 {
        self.regs[reg.us() & 31]
    }

    fn write(&mut self, reg: u32, value: u32) {
        if reg & 31 != 0 {
            self.regs[reg.us() & 31] = value;
        }
    }
}

fn default_unit() -> Box<dyn VectorUnit> {
    Box::<HaltingUnit>::default()
}

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SignalProcessor {
    #[cfg_attr(feature = "serde", serde(with = "serde_arrays"))]
    pub mem: [u8; SP_MEM_SIZE],
    regs: RegisterFile<8>,
    mem_addr: u32,
    dram_addr: u32,
    pub pc: u32,

    pub halted: bool,
    pub broke: bool,
    single_step: bool,
    intr_on_break: bool,
    signals: u32,
    semaphore: bool,
    /// RSP cycles the unit ran past its last budget.
    overrun: Time,

    #[cfg_attr(feature = "serde", serde(skip, default = "default_unit"))]
    pub unit: Box<dyn VectorUnit>,
}

impl SignalProcessor {
    pub fn read_reg(&mut self, addr: u32) -> u32 {
        if addr & !0x1F == PC_OFFSET {
            return self.pc;
        }
        match addr & 0x1F {
            SP_MEM_ADDR => self.mem_addr,
            SP_DRAM_ADDR => self.dram_addr,
            SP_RD_LEN | SP_WR_LEN => 0xFF8,
            SP_STATUS => {
                self.halted as u32
                    | (self.broke as u32) << 1
                    | (self.single_step as u32) << 5
                    | (self.intr_on_break as u32) << 6
                    | self.signals << 7
            }
            // Transfers are instant
            SP_DMA_FULL | SP_DMA_BUSY => 0,
            SP_SEMAPHORE => mem::replace(&mut self.semaphore, true) as u32,
            _ => self.regs[addr],
        }
    }

    /// Reset registers, keeping memory contents and the attached unit.
    pub fn power_on(&mut self) {
        let unit = mem::replace(&mut self.unit, default_unit());
        *self = Self {
            mem: self.mem,
            unit,
            ..Self::default()
        };
    }

    /// Take over the parts not contained in save states.
    pub fn restore_from(&mut self, old_self: Self) {
        self.unit = old_self.unit;
    }

    /// Let the vector unit run for the given amount of RSP cycles.
    pub fn run(n64: &mut Nintendo64, cycles: Time) {
        let sp = &mut n64.sp;
        if sp.halted {
            return;
        }
        let owed = mem::take(&mut sp.overrun);
        if owed >= cycles {
            sp.overrun = owed - cycles;
            return;
        }

        match sp.unit.run(&mut sp.pc, cycles - owed, &mut sp.mem) {
            RspExit::Budget(overrun) => sp.overrun = overrun.max(0) as Time,
            RspExit::Break => {
                sp.halted = true;
                sp.broke = true;
                if sp.intr_on_break {
                    n64.raise_interrupt(Interrupt::Sp);
                }
            }
        }
    }

    /// Copy rows between RDRAM and SP memory. Each row is `len` bytes, with
    /// `skip` bytes between rows in RDRAM.
    fn dma(n64: &mut Nintendo64, value: u32, to_rdram: bool) {
        let len = ((value & 0xFFF) | 7) + 1;
        let count = ((value >> 12) & 0xFF) + 1;
        let skip = (value >> 20) & 0xFF8;

        let sp = &mut n64.sp;
        let bank = sp.mem_addr & 0x1000;
        let mut mem_addr = sp.mem_addr & 0xFF8;
        let mut dram_addr = sp.dram_addr & 0xFF_FFF8;
        log::debug!(
            "SP DMA of {count}x0x{len:X} bytes, RDRAM 0x{dram_addr:06X} {} SP 0x{:04X}",
            if to_rdram { "<-" } else { "->" },
            bank | mem_addr
        );

        for _ in 0..count {
            for _ in 0..len / 8 {
                let sp_idx = (bank | mem_addr).us();
                let dram = n64.memory.rdram.get_mut(dram_addr.us()..dram_addr.us() + 8);
                match (dram, to_rdram) {
                    (Some(dram), true) => dram.copy_from_slice(&sp.mem[sp_idx..sp_idx + 8]),
                    (Some(dram), false) => sp.mem[sp_idx..sp_idx + 8].copy_from_slice(dram),
                    (None, _) => (),
                }
                mem_addr = (mem_addr + 8) & 0xFF8;
                dram_addr = (dram_addr + 8) & 0xFF_FFF8;
            }
            dram_addr = (dram_addr + skip) & 0xFF_FFF8;
        }

        if to_rdram {
            let start = sp.dram_addr & 0xFF_FFF8;
            n64.invalidate_code(start, dram_addr.wrapping_sub(start));
        }
        n64.sp.mem_addr = bank | mem_addr;
        n64.sp.dram_addr = dram_addr;
    }
}

impl Default for SignalProcessor {
    fn default() -> Self {
        Self {
            mem: [0; SP_MEM_SIZE],
            regs: RegisterFile::default(),
            mem_addr: 0,
            dram_addr: 0,
            pc: 0,
            halted: true,
            broke: false,
            single_step: false,
            intr_on_break: false,
            signals: 0,
            semaphore: false,
            overrun: 0,
            unit: default_unit(),
        }
    }
}

impl Nintendo64 {
    pub(crate) fn sp_write(&mut self, addr: u32, value: u32) {
        if addr & !0x1F == PC_OFFSET {
            self.sp.pc = value & 0xFFC;
            return;
        }
        self.sp.regs[addr] = value;
        match addr & 0x1F {
            SP_MEM_ADDR => self.sp.mem_addr = value & 0x1FF8,
            SP_DRAM_ADDR => self.sp.dram_addr = value & 0xFF_FFF8,
            SP_RD_LEN => SignalProcessor::dma(self, value, false),
            SP_WR_LEN => SignalProcessor::dma(self, value, true),
            SP_STATUS => self.sp_status_write(value),
            SP_SEMAPHORE => self.sp.semaphore = false,
            _ => (),
        }
    }

    fn sp_status_write(&mut self, value: u32) {
        let sp = &mut self.sp;
        sp.halted = apply_set_clear(sp.halted as u32, value, 0, 1) != 0;
        if value.is_bit(2) {
            sp.broke = false;
        }
        sp.single_step = apply_set_clear(sp.single_step as u32, value, 5, 1) != 0;
        sp.intr_on_break = apply_set_clear(sp.intr_on_break as u32, value, 7, 1) != 0;
        sp.signals = apply_set_clear(sp.signals, value, 9, 8);

        // Interrupt clear/set sit between, and go straight to the MI
        if value.is_bit(3) {
            self.clear_interrupt(Interrupt::Sp);
        }
        if value.is_bit(4) {
            self.raise_interrupt(Interrupt::Sp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::N64Config;

    /// Counts how long it was run for; breaks once it ran 100 cycles.
    #[derive(Default)]
    struct CountingUnit {
        ran: Time,
    }

    impl VectorUnit for CountingUnit {
        fn run(&mut self, pc: &mut u32, cycles: Time, mem: &mut [u8; SP_MEM_SIZE]) -> RspExit {
            self.ran += cycles;
            *pc = (*pc + 4) & 0xFFC;
            mem[0] = self.ran as u8;
            if self.ran >= 100 {
                RspExit::Break
            } else {
                RspExit::Budget(5)
            }
        }

        fn read(&self, _reg: u32) -> u32 {
            self.ran as u32
        }

        fn write(&mut self, _reg: u32, value: u32) {
            self.ran = value as Time;
        }
    }

    #[test]
    fn dma_to_dmem_and_back() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.memory.rdram[0x100..0x110].copy_from_slice(&[7; 16]);
        n64.sp_write(SP_MEM_ADDR, 0x1010);
        n64.sp_write(SP_DRAM_ADDR, 0x100);
        n64.sp_write(SP_RD_LEN, 0xF);
        assert_eq!(&n64.sp.mem[0x1010..0x1020], &[7; 16]);
        assert_eq!(n64.sp.read_reg(SP_MEM_ADDR), 0x1020);
        assert_eq!(n64.sp.read_reg(SP_DRAM_ADDR), 0x110);

        n64.sp_write(SP_MEM_ADDR, 0x1010);
        n64.sp_write(SP_DRAM_ADDR, 0x400);
        n64.sp_write(SP_WR_LEN, 0x7);
        assert_eq!(&n64.memory.rdram[0x400..0x408], &[7; 8]);
        assert_eq!(n64.take_invalidations(), vec![(0x400, 8)]);
    }

    #[test]
    fn dma_rows_skip_in_rdram() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.memory.rdram[0x200] = 1;
        n64.memory.rdram[0x210] = 2;
        n64.sp_write(SP_MEM_ADDR, 0);
        n64.sp_write(SP_DRAM_ADDR, 0x200);
        // Two rows of 8 bytes, 8 bytes skipped between them
        n64.sp_write(SP_RD_LEN, 8 << 20 | 1 << 12 | 7);
        assert_eq!(n64.sp.mem[0], 1);
        assert_eq!(n64.sp.mem[8], 2);
    }

    #[test]
    fn status_and_semaphore() {
        let mut n64 = Nintendo64::new(N64Config::default());
        assert_eq!(n64.sp.read_reg(SP_STATUS) & 1, 1);
        // Clear halt, set signal 0 and interrupt on break
        n64.sp_write(SP_STATUS, 1 | 1 << 8 | 1 << 10);
        assert_eq!(n64.sp.read_reg(SP_STATUS), 1 << 6 | 1 << 7);
        n64.sp_write(SP_STATUS, 1 << 4);
        assert_ne!(n64.mi.intr & 1, 0);
        n64.sp_write(SP_STATUS, 1 << 3);
        assert_eq!(n64.mi.intr & 1, 0);

        assert_eq!(n64.sp.read_reg(SP_SEMAPHORE), 0);
        assert_eq!(n64.sp.read_reg(SP_SEMAPHORE), 1);
        n64.sp_write(SP_SEMAPHORE, 0);
        assert_eq!(n64.sp.read_reg(SP_SEMAPHORE), 0);
    }

    #[test]
    fn default_unit_breaks() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.sp_write(SP_STATUS, 1 | 1 << 8);
        SignalProcessor::run(&mut n64, 10);
        assert!(n64.sp.halted && n64.sp.broke);
        assert_ne!(n64.mi.intr & 1, 0);

        let mut unit = HaltingUnit::default();
        unit.write(0, 5);
        unit.write(3, 5);
        assert_eq!((unit.read(0), unit.read(3)), (0, 5));
    }

    #[test]
    fn attached_unit_gets_time_and_pc() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.set_vector_unit(Box::<CountingUnit>::default());
        n64.sp_write(PC_OFFSET, 0x100);
        n64.sp_write(SP_STATUS, 1);
        SignalProcessor::run(&mut n64, 60);
        assert!(!n64.sp.halted);
        assert_eq!(n64.sp.read_reg(PC_OFFSET), 0x104);
        // The 5 cycles it went over are taken from the next slice
        SignalProcessor::run(&mut n64, 3);
        assert_eq!(n64.sp.unit.read(0), 60);
        SignalProcessor::run(&mut n64, 62);
        assert!(n64.sp.halted && n64.sp.broke);
        assert_eq!(n64.sp.mem[0], 120);
        // No interrupt unless requested
        assert_eq!(n64.mi.intr & 1, 0);
    }

    #[test]
    fn power_on_keeps_memory_and_unit() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.set_vector_unit(Box::<CountingUnit>::default());
        n64.sp.mem[5] = 5;
        n64.sp.unit.write(0, 77);
        n64.sp.pc = 0x40;
        n64.sp.power_on();
        assert_eq!(n64.sp.mem[5], 5);
        assert_eq!(n64.sp.pc, 0);
        assert_eq!(n64.sp.unit.read(0), 77);
    }
}
