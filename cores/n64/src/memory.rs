// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The physical address space. All accesses are big-endian.

use common::numutil::NumExt;

use crate::{
    addr::*,
    config::RdramSize,
    hw::{ai::AudioInterface, pi::PeripheralInterface, si::SerialInterface},
    Nintendo64,
};

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Memory {
    pub rdram: Vec<u8>,
    /// Cartridge ROM, big-endian.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cart: Vec<u8>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub pif_rom: Vec<u8>,
    /// Cartridge SRAM, in the second PI domain.
    pub sram: Vec<u8>,
}

impl Memory {
    pub fn new(size: RdramSize) -> Self {
        Self {
            rdram: vec![0; size.bytes()],
            sram: vec![0; SRAM_SIZE],
            ..Self::default()
        }
    }

    /// Take over the parts of memory not contained in save states.
    /// RAM is kept as well if there is none, as after a reset.
    pub fn restore_from(&mut self, old_self: Self) {
        self.cart = old_self.cart;
        self.pif_rom = old_self.pif_rom;
        if self.rdram.is_empty() {
            self.rdram = old_self.rdram;
            self.sram = old_self.sram;
        }
    }
}

impl Nintendo64 {
    /// Read a value from the physical address space.
    pub fn read_physical<T: NumExt>(&mut self, paddr: u32) -> T {
        match paddr {
            0..=RDRAM_END => read_be(&self.memory.rdram, paddr.us()),
            SP_MEM..=0x0403_FFFF => read_be(&self.sp.mem, (paddr & 0x1FFF).us()),
            CART_DOM2_ADDR2..=0x0FFF_FFFF => {
                read_be(&self.memory.sram, (paddr - CART_DOM2_ADDR2).us() % SRAM_SIZE)
            }
            CART_DOM1_ADDR2..=CART_DOM1_ADDR2_END => {
                let offset = (paddr - CART_DOM1_ADDR2).us();
                if offset + T::WIDTH.us() <= self.memory.cart.len() {
                    read_be(&self.memory.cart, offset)
                } else {
                    // Open bus repeats the low half of the address
                    let word = (paddr & 0xFFFF) << 16 | (paddr & 0xFFFF);
                    narrow(word, paddr)
                }
            }
            PIF_ROM..=0x1FC0_07BF => read_be(&self.memory.pif_rom, (paddr - PIF_ROM).us()),
            PIF_RAM..=PIF_RAM_END => read_be(&self.si.pif.ram, (paddr - PIF_RAM).us()),
            _ if T::WIDTH == 8 => {
                let hi = self.read_io(paddr).u64();
                let lo = self.read_io(paddr + 4).u64();
                T::from_u64(hi << 32 | lo)
            }
            _ => {
                let word = self.read_io(paddr & !3);
                narrow(word, paddr)
            }
        }
    }

    /// Write a value to the physical address space.
    pub fn write_physical<T: NumExt>(&mut self, paddr: u32, value: T) {
        match paddr {
            0..=RDRAM_END => write_be(&mut self.memory.rdram, paddr.us(), value),
            SP_MEM..=0x0403_FFFF => write_be(&mut self.sp.mem, (paddr & 0x1FFF).us(), value),
            CART_DOM2_ADDR2..=0x0FFF_FFFF => {
                let offset = (paddr - CART_DOM2_ADDR2).us() % SRAM_SIZE;
                write_be(&mut self.memory.sram, offset, value);
            }
            CART_DOM1_ADDR2..=CART_DOM1_ADDR2_END => {
                log::warn!("Write to cartridge ROM at 0x{paddr:08X}, ignoring");
            }
            PIF_RAM..=PIF_RAM_END => write_be(&mut self.si.pif.ram, (paddr - PIF_RAM).us(), value),
            // 64-bit stores only put their upper word on the bus
            _ if T::WIDTH == 8 => self.write_io(paddr, (value.u64() >> 32) as u32),
            _ => {
                let shift = (4 - T::WIDTH - (paddr & 3)) * 8;
                self.write_io(paddr & !3, value.u32() << shift);
            }
        }
    }

    fn read_io(&mut self, addr: u32) -> u32 {
        match addr {
            RDRAM_REGS..=0x03FF_FFFF => self.ri.read_rdram_reg(addr - RDRAM_REGS),
            SP_REGS..=0x040F_FFFF => self.sp.read_reg(addr - SP_REGS),
            DP_REGS..=0x041F_FFFF => self.dp.read_reg(addr - DP_REGS),
            MI_REGS..=0x043F_FFFF => self.mi.read_reg(addr - MI_REGS),
            VI_REGS..=0x044F_FFFF => self.vi.read_reg(addr - VI_REGS),
            AI_REGS..=0x045F_FFFF => AudioInterface::read_reg(self, addr - AI_REGS),
            PI_REGS..=0x046F_FFFF => PeripheralInterface::read_reg(self, addr - PI_REGS),
            RI_REGS..=0x047F_FFFF => self.ri.read_reg(addr - RI_REGS),
            SI_REGS..=0x048F_FFFF => SerialInterface::read_reg(self, addr - SI_REGS),
            _ => {
                log::warn!("Read from unmapped address 0x{addr:08X}, reading 0");
                0
            }
        }
    }

    fn write_io(&mut self, addr: u32, value: u32) {
        match addr {
            RDRAM_REGS..=0x03FF_FFFF => self.ri.write_rdram_reg(addr - RDRAM_REGS, value),
            SP_REGS..=0x040F_FFFF => self.sp_write(addr - SP_REGS, value),
            DP_REGS..=0x041F_FFFF => self.dp_write(addr - DP_REGS, value),
            MI_REGS..=0x043F_FFFF => self.mi_write(addr - MI_REGS, value),
            VI_REGS..=0x044F_FFFF => self.vi_write(addr - VI_REGS, value),
            AI_REGS..=0x045F_FFFF => self.ai_write(addr - AI_REGS, value),
            PI_REGS..=0x046F_FFFF => self.pi_write(addr - PI_REGS, value),
            RI_REGS..=0x047F_FFFF => self.ri.write_reg(addr - RI_REGS, value),
            SI_REGS..=0x048F_FFFF => self.si_write(addr - SI_REGS, value),
            _ => log::warn!("Write to unmapped address 0x{addr:08X} (0x{value:08X}), ignoring"),
        }
    }
}

/// Read from a byte array. Out-of-bounds reads return 0.
fn read_be<T: NumExt>(mem: &[u8], offset: usize) -> T {
    match mem.get(offset..offset + T::WIDTH.us()) {
        Some(slice) => T::from_be_slice(slice),
        None => T::default(),
    }
}

/// Write to a byte array. Out-of-bounds writes are dropped.
fn write_be<T: NumExt>(mem: &mut [u8], offset: usize, value: T) {
    if let Some(slice) = mem.get_mut(offset..offset + T::WIDTH.us()) {
        value.write_be_slice(slice);
    }
}

/// Extract a smaller access from the word it is part of.
fn narrow<T: NumExt>(word: u32, paddr: u32) -> T {
    if T::WIDTH >= 4 {
        T::from_u32(word)
    } else {
        let shift = (4 - T::WIDTH - (paddr & 3)) * 8;
        T::from_u32(word >> shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::N64Config;

    #[test]
    fn rdram_is_big_endian() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.write_physical::<u32>(0x100, 0x1122_3344);
        assert_eq!(n64.read_physical::<u8>(0x100), 0x11);
        assert_eq!(n64.read_physical::<u16>(0x102), 0x3344);
        assert_eq!(n64.memory.rdram[0x103], 0x44);
        n64.write_physical::<u64>(0x200, 0x0102_0304_0506_0708);
        assert_eq!(n64.read_physical::<u32>(0x204), 0x0506_0708);
    }

    #[test]
    fn rdram_beyond_installed_size() {
        let mut n64 = Nintendo64::new(N64Config {
            rdram_size: RdramSize::Four,
            ..N64Config::default()
        });
        n64.write_physical::<u32>(0x0050_0000, 5);
        assert_eq!(n64.read_physical::<u32>(0x0050_0000), 0);
    }

    #[test]
    fn cart_open_bus() {
        let mut n64 = Nintendo64::new(N64Config::default());
        let mut rom = vec![0; 0x1000];
        rom[0] = 0x80;
        n64.insert_cart(rom).unwrap();
        assert_eq!(n64.read_physical::<u8>(0x1000_0000), 0x80);
        assert_eq!(n64.read_physical::<u32>(0x1000_2004), 0x2004_2004);
    }

    #[test]
    fn unmapped_reads_zero() {
        let mut n64 = Nintendo64::new(N64Config::default());
        assert_eq!(n64.read_physical::<u32>(0x0490_0000), 0);
        n64.write_physical::<u32>(0x0490_0000, 1);
    }

    #[test]
    fn io_narrow_access() {
        let mut n64 = Nintendo64::new(N64Config::default());
        // MI_VERSION
        assert_eq!(n64.read_physical::<u32>(0x0430_0004), 0x0202_0102);
        assert_eq!(n64.read_physical::<u8>(0x0430_0007), 0x02);
        assert_eq!(n64.read_physical::<u16>(0x0430_0004), 0x0202);
    }

    #[test]
    fn sp_memory_mirrors() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.write_physical::<u32>(0x0400_1000, 0xCAFE_BABE);
        assert_eq!(n64.sp.mem[0x1000], 0xCA);
        assert_eq!(n64.read_physical::<u32>(0x0400_3000), 0xCAFE_BABE);
    }
}
