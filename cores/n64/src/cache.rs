// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The CPU's direct-mapped instruction and data caches.
//! Only RDRAM is ever cached.

use common::numutil::NumExt;

use crate::{
    cpu::Cpu,
    mmu::Access,
    Nintendo64,
};

const LINES: usize = 512;
const ICACHE_LINE: u32 = 32;
const DCACHE_LINE: u32 = 16;
const ICACHE_HIT_CYCLES: u64 = 1;
const DCACHE_HIT_CYCLES: u64 = 1;
const ICACHE_FILL_CYCLES: u64 = 7;
const DCACHE_FILL_CYCLES: u64 = 6;
const WRITEBACK_CYCLES: u64 = 6;

#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ICacheLine {
    data: [u8; ICACHE_LINE as usize],
    tag: u32,
    valid: bool,
}

#[derive(Debug, Default, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DCacheLine {
    data: [u8; DCACHE_LINE as usize],
    tag: u32,
    valid: bool,
    dirty: bool,
}

/// 16KiB instruction cache.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ICache {
    #[cfg_attr(feature = "serde", serde(with = "serde_arrays"))]
    lines: [ICacheLine; LINES],
}

/// 8KiB data cache, write-back.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DCache {
    #[cfg_attr(feature = "serde", serde(with = "serde_arrays"))]
    lines: [DCacheLine; LINES],
}

impl Default for ICache {
    fn default() -> Self {
        Self {
            lines: [ICacheLine::default(); LINES],
        }
    }
}

impl Default for DCache {
    fn default() -> Self {
        Self {
            lines: [DCacheLine::default(); LINES],
        }
    }
}

fn icache_index(addr: u64) -> usize {
    ((addr >> 5) as usize) & (LINES - 1)
}

fn dcache_index(addr: u64) -> usize {
    ((addr >> 4) as usize) & (LINES - 1)
}

fn tag(paddr: u32) -> u32 {
    paddr >> 12
}

/// Physical address of the first byte of a line.
fn line_base(tag: u32, idx: usize, line_size: u32) -> u32 {
    (tag << 12) | ((idx as u32 * line_size) & 0xFFF)
}

impl Nintendo64 {
    /// Fetch an instruction word through the I-cache.
    pub(crate) fn icache_fetch(&mut self, paddr: u32) -> u32 {
        let idx = icache_index(paddr.u64());
        let line = &self.cpu.icache.lines[idx];
        if line.valid && line.tag == tag(paddr) {
            self.tick(ICACHE_HIT_CYCLES);
        } else {
            self.icache_fill(idx, paddr);
        }
        let offset = (paddr % ICACHE_LINE).us();
        u32::from_be_slice(&self.cpu.icache.lines[idx].data[offset..])
    }

    /// Read a value through the D-cache.
    pub(crate) fn dcache_read<T: NumExt>(&mut self, paddr: u32) -> T {
        let idx = self.dcache_line(paddr);
        let offset = (paddr % DCACHE_LINE).us();
        T::from_be_slice(&self.cpu.dcache.lines[idx].data[offset..])
    }

    /// Write a value through the D-cache. Memory is only updated once
    /// the line is written back.
    pub(crate) fn dcache_write<T: NumExt>(&mut self, paddr: u32, value: T) {
        let idx = self.dcache_line(paddr);
        let offset = (paddr % DCACHE_LINE).us();
        let line = &mut self.cpu.dcache.lines[idx];
        value.write_be_slice(&mut line.data[offset..]);
        line.dirty = true;
    }

    /// Execute a CACHE instruction.
    pub(crate) fn cache_op(&mut self, op: u32, vaddr: u64) {
        let cache = op & 3;
        let kind = op >> 2;
        // Hit operations need the physical address to compare tags
        let paddr = if kind >= 3 && !(cache == 0 && kind == 3) {
            match Cpu::translate(self, vaddr, Access::Load) {
                Some(t) => t.paddr,
                None => return,
            }
        } else {
            vaddr as u32 & 0x1FFF_FFFF
        };

        match cache {
            0 => self.icache_op(kind, vaddr, paddr),
            1 => self.dcache_op(kind, vaddr, paddr),
            _ => log::warn!("CACHE on secondary cache (op 0x{op:X})"),
        }
    }

    fn icache_op(&mut self, kind: u32, vaddr: u64, paddr: u32) {
        let idx = icache_index(vaddr);
        let line = self.cpu.icache.lines[idx];
        let hit = line.valid && line.tag == tag(paddr);
        match kind {
            // Index_Invalidate
            0 => {
                self.cpu.icache.lines[idx].valid = false;
                self.invalidate_code(line_base(line.tag, idx, ICACHE_LINE), ICACHE_LINE);
            }
            // Index_Load_Tag
            1 => self.cpu.cop0.tag_lo = (line.tag << 8) | (line.valid as u32) << 7,
            // Index_Store_Tag
            2 => {
                let tag_lo = self.cpu.cop0.tag_lo;
                let line = &mut self.cpu.icache.lines[idx];
                line.tag = (tag_lo >> 8) & 0xF_FFFF;
                line.valid = tag_lo.is_bit(7);
            }
            // Hit_Invalidate
            4 if hit => {
                self.cpu.icache.lines[idx].valid = false;
                self.invalidate_code(line_base(line.tag, idx, ICACHE_LINE), ICACHE_LINE);
            }
            // Fill
            5 if self.is_cacheable(paddr, ICACHE_LINE) => self.icache_fill(idx, paddr),
            // Hit_Write_Back
            6 if hit => {
                let base = line_base(line.tag, idx, ICACHE_LINE).us();
                if let Some(mem) = self.memory.rdram.get_mut(base..base + ICACHE_LINE.us()) {
                    mem.copy_from_slice(&line.data);
                }
            }
            4..=6 => (),
            _ => log::warn!("Unknown I-cache operation {kind}"),
        }
    }

    fn dcache_op(&mut self, kind: u32, vaddr: u64, paddr: u32) {
        let idx = dcache_index(vaddr);
        let line = self.cpu.dcache.lines[idx];
        let hit = line.valid && line.tag == tag(paddr);
        match kind {
            // Index_Write_Back_Invalidate
            0 => {
                if line.valid && line.dirty {
                    self.dcache_writeback(idx);
                }
                self.cpu.dcache.lines[idx].valid = false;
            }
            // Index_Load_Tag
            1 => {
                self.cpu.cop0.tag_lo =
                    (line.tag << 8) | (line.valid as u32) << 7 | (line.dirty as u32) << 6
            }
            // Index_Store_Tag
            2 => {
                let tag_lo = self.cpu.cop0.tag_lo;
                let line = &mut self.cpu.dcache.lines[idx];
                line.tag = (tag_lo >> 8) & 0xF_FFFF;
                line.valid = tag_lo.is_bit(7);
                line.dirty = tag_lo.is_bit(6);
            }
            // Create_Dirty_Exclusive
            3 if self.is_cacheable(paddr, DCACHE_LINE) => {
                if !hit && line.valid && line.dirty {
                    self.dcache_writeback(idx);
                }
                let line = &mut self.cpu.dcache.lines[idx];
                line.tag = tag(paddr);
                line.valid = true;
                line.dirty = true;
            }
            // Hit_Invalidate
            4 if hit => self.cpu.dcache.lines[idx].valid = false,
            // Hit_Write_Back_Invalidate
            5 if hit => {
                if line.dirty {
                    self.dcache_writeback(idx);
                }
                self.cpu.dcache.lines[idx].valid = false;
            }
            // Hit_Write_Back
            6 if hit && line.dirty => self.dcache_writeback(idx),
            3..=6 => (),
            _ => log::warn!("Unknown D-cache operation {kind}"),
        }
    }

    /// Whether the line containing `paddr` lies entirely within RDRAM.
    fn is_cacheable(&self, paddr: u32, line_size: u32) -> bool {
        let base = (paddr & !(line_size - 1)).us();
        base + line_size.us() <= self.memory.rdram.len()
    }

    fn icache_fill(&mut self, idx: usize, paddr: u32) {
        let base = (paddr & !(ICACHE_LINE - 1)).us();
        let line = &mut self.cpu.icache.lines[idx];
        let Some(mem) = self.memory.rdram.get(base..base + ICACHE_LINE.us()) else {
            log::debug!("I-cache fill outside RDRAM at 0x{paddr:08X}");
            line.valid = false;
            return;
        };
        line.data.copy_from_slice(mem);
        line.tag = tag(paddr);
        line.valid = true;
        self.tick(ICACHE_FILL_CYCLES);
    }

    /// Find the line holding the given address, filling it if needed.
    fn dcache_line(&mut self, paddr: u32) -> usize {
        let idx = dcache_index(paddr.u64());
        let line = self.cpu.dcache.lines[idx];
        if line.valid && line.tag == tag(paddr) {
            self.tick(DCACHE_HIT_CYCLES);
            return idx;
        }
        if line.valid && line.dirty {
            self.dcache_writeback(idx);
        }

        let base = (paddr & !(DCACHE_LINE - 1)).us();
        let line = &mut self.cpu.dcache.lines[idx];
        match self.memory.rdram.get(base..base + DCACHE_LINE.us()) {
            Some(mem) => line.data.copy_from_slice(mem),
            None => line.data = [0; DCACHE_LINE as usize],
        }
        line.tag = tag(paddr);
        line.valid = true;
        line.dirty = false;
        self.tick(DCACHE_FILL_CYCLES);
        idx
    }

    fn dcache_writeback(&mut self, idx: usize) {
        let line = &mut self.cpu.dcache.lines[idx];
        let base = line_base(line.tag, idx, DCACHE_LINE).us();
        if let Some(mem) = self.memory.rdram.get_mut(base..base + DCACHE_LINE.us()) {
            mem.copy_from_slice(&line.data);
        }
        line.dirty = false;
        self.tick(WRITEBACK_CYCLES);
    }
}
