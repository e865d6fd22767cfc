// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Virtual address translation: the fixed segments of every
//! privilege mode, and the TLB.

use common::numutil::{NumExt, U32Ext};

use crate::{
    cpu::{Cpu, Status},
    Nintendo64,
};

/// Translation strategy, derived from the status register whenever it changes.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TranslationMode {
    #[default]
    Kernel32,
    Kernel64,
    Supervisor32,
    Supervisor64,
    User32,
    User64,
}

impl TranslationMode {
    pub fn from_status(status: Status) -> Self {
        if status.exl() || status.erl() {
            return if status.kx() {
                Self::Kernel64
            } else {
                Self::Kernel32
            };
        }
        match (status.ksu(), status.kx(), status.sx(), status.ux()) {
            (0, false, ..) => Self::Kernel32,
            (0, true, ..) => Self::Kernel64,
            (1, _, false, _) => Self::Supervisor32,
            (1, _, true, _) => Self::Supervisor64,
            (_, _, _, false) => Self::User32,
            (_, _, _, true) => Self::User64,
        }
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, Self::Kernel64 | Self::Supervisor64 | Self::User64)
    }
}

/// Kind of memory access being translated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    Fetch,
    Load,
    Store,
}

/// A successful translation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Translation {
    pub paddr: u32,
    /// If the access should go through the caches.
    pub cached: bool,
}

/// Reasons a TLB-mapped access can fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TlbFault {
    /// No entry matched.
    Miss,
    /// The matching page is not valid.
    Invalid,
    /// Store to a page that is not dirty.
    Modified,
}

/// Result of segment decoding, before the TLB gets involved.
enum Segment {
    Direct { paddr: u32, cached: bool },
    Mapped,
    Invalid,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TlbEntry {
    /// Page mask, with all bit pairs either fully set or clear.
    pub page_mask: u32,
    /// Region, VPN2 and ASID.
    pub entry_hi: u64,
    /// Even page, without the global bit.
    pub entry_lo0: u64,
    /// Odd page, without the global bit.
    pub entry_lo1: u64,
    pub global: bool,
    /// Bits of the virtual address compared against VPN2.
    compare_mask: u64,
    /// Bits of the virtual address that are the offset into a page.
    offset_mask: u64,
}

impl Default for TlbEntry {
    /// An entry that was never written, which matches no address.
    fn default() -> Self {
        Self {
            page_mask: 0,
            // xkphys is never mapped
            entry_hi: 0x8000_0000_0000_0000,
            entry_lo0: 0,
            entry_lo1: 0,
            global: false,
            compare_mask: u64::MAX,
            offset_mask: 0xFFF,
        }
    }
}

impl TlbEntry {
    /// Load this entry from the COP0 registers, like TLBWI/TLBWR.
    pub fn write(&mut self, page_mask: u32, entry_hi: u64, lo0: u64, lo1: u64) {
        self.page_mask = Self::normalize_mask(page_mask);
        self.offset_mask = ((self.page_mask | 0x1FFF) >> 1) as u64;
        self.compare_mask = 0xFF_FFFF_E000 & !(self.page_mask as u64);
        self.entry_hi = entry_hi & (0xC000_0000_0000_00FF | self.compare_mask);
        self.global = (lo0 & lo1 & 1) != 0;
        self.entry_lo0 = lo0 & 0x3FFF_FFFE;
        self.entry_lo1 = lo1 & 0x3FFF_FFFE;
    }

    /// Page masks are made of bit pairs. The highest pair with any bit set
    /// selects the page size, and every pair below it is set as well, so
    /// the mask stays contiguous.
    fn normalize_mask(mask: u32) -> u32 {
        let top = (0..6).rev().find(|pair| mask & (0b11 << (13 + pair * 2)) != 0);
        match top {
            Some(pair) => ((1 << (15 + pair * 2)) - 1) & !0x1FFF,
            None => 0,
        }
    }

    fn asid(&self) -> u8 {
        self.entry_hi as u8
    }

    fn matches(&self, vaddr: u64, asid: u8, check_region: bool) -> bool {
        (vaddr & self.compare_mask) == (self.entry_hi & self.compare_mask)
            && (self.global || self.asid() == asid)
            && (!check_region || (vaddr >> 62) == (self.entry_hi >> 62))
    }
}

/// The 32-entry, fully associative TLB.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Tlb {
    pub entries: [TlbEntry; 32],
}

impl Tlb {
    /// Translate a mapped address. Returns the physical address and the
    /// page's cache attribute.
    pub fn lookup(
        &self,
        vaddr: u64,
        asid: u8,
        is_64bit: bool,
        store: bool,
    ) -> Result<(u32, bool), TlbFault> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.matches(vaddr, asid, is_64bit))
            .ok_or(TlbFault::Miss)?;

        let odd = vaddr & (entry.offset_mask + 1) != 0;
        let lo = if odd { entry.entry_lo1 } else { entry.entry_lo0 };
        if !lo.is_bit(1) {
            return Err(TlbFault::Invalid);
        }
        if store && !lo.is_bit(2) {
            return Err(TlbFault::Modified);
        }

        let pfn = ((lo >> 6) & 0xF_FFFF) << 12;
        let paddr = (pfn & !entry.offset_mask) | (vaddr & entry.offset_mask);
        let cached = lo.bits(3, 3) != 2;
        Ok((paddr as u32, cached))
    }

    /// Find the entry matching the given EntryHi, like TLBP.
    pub fn probe(&self, entry_hi: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.matches(entry_hi, entry_hi as u8, true))
    }
}

impl Cpu {
    /// Translate a virtual address for the given access.
    /// On failure, the matching exception is raised and `None` returned.
    pub(crate) fn translate(n64: &mut Nintendo64, vaddr: u64, access: Access) -> Option<Translation> {
        let mode = n64.cpu.mode;
        let vaddr = if mode.is_64bit() {
            vaddr
        } else {
            (vaddr as u32).sext()
        };

        match Self::segment(mode, vaddr) {
            Segment::Direct { paddr, cached } => Some(Translation {
                paddr,
                cached: cached && (paddr as usize) < n64.memory.rdram.len(),
            }),

            Segment::Mapped => {
                let asid = n64.cpu.cop0.entry_hi as u8;
                let result =
                    n64.cpu
                        .tlb
                        .lookup(vaddr, asid, mode.is_64bit(), access == Access::Store);
                match result {
                    Ok((paddr, cached)) => Some(Translation {
                        paddr,
                        cached: cached && (paddr as usize) < n64.memory.rdram.len(),
                    }),
                    Err(fault) => {
                        Self::tlb_exception(n64, vaddr, access, fault);
                        None
                    }
                }
            }

            Segment::Invalid => {
                Self::address_error(n64, vaddr, access);
                None
            }
        }
    }

    fn segment(mode: TranslationMode, vaddr: u64) -> Segment {
        const USEG_64: u64 = 0x0000_00FF_FFFF_FFFF;
        const SSEG_64: u64 = 0x4000_0000_0000_0000;
        const KSEG_64: u64 = 0xC000_0000_0000_0000;
        const CKSEG0: u64 = 0xFFFF_FFFF_8000_0000;
        const CKSEG1: u64 = 0xFFFF_FFFF_A000_0000;
        const CKSSEG: u64 = 0xFFFF_FFFF_C000_0000;

        match mode {
            TranslationMode::Kernel32 | TranslationMode::Kernel64 => match vaddr {
                0..=USEG_64 if mode.is_64bit() => Segment::Mapped,
                0..=0x7FFF_FFFF => Segment::Mapped,
                SSEG_64..=0x4000_00FF_FFFF_FFFF if mode.is_64bit() => Segment::Mapped,
                0x8000_0000_0000_0000..=0xBFFF_FFFF_FFFF_FFFF if mode.is_64bit() => {
                    // xkphys: physical address and cache attribute in the address
                    if vaddr & 0x07FF_FFFF_0000_0000 != 0 {
                        Segment::Invalid
                    } else {
                        Segment::Direct {
                            paddr: vaddr as u32,
                            cached: vaddr.bits(59, 3) != 2,
                        }
                    }
                }
                KSEG_64..=0xC000_00FF_7FFF_FFFF if mode.is_64bit() => Segment::Mapped,
                CKSEG0..=0xFFFF_FFFF_9FFF_FFFF => Segment::Direct {
                    paddr: (vaddr as u32) & 0x1FFF_FFFF,
                    cached: true,
                },
                CKSEG1..=0xFFFF_FFFF_BFFF_FFFF => Segment::Direct {
                    paddr: (vaddr as u32) & 0x1FFF_FFFF,
                    cached: false,
                },
                CKSSEG..=u64::MAX => Segment::Mapped,
                _ => Segment::Invalid,
            },

            TranslationMode::Supervisor32 | TranslationMode::Supervisor64 => match vaddr {
                0..=USEG_64 if mode.is_64bit() => Segment::Mapped,
                0..=0x7FFF_FFFF => Segment::Mapped,
                SSEG_64..=0x4000_00FF_FFFF_FFFF if mode.is_64bit() => Segment::Mapped,
                CKSSEG..=0xFFFF_FFFF_DFFF_FFFF => Segment::Mapped,
                _ => Segment::Invalid,
            },

            TranslationMode::User32 | TranslationMode::User64 => match vaddr {
                0..=USEG_64 if mode.is_64bit() => Segment::Mapped,
                0..=0x7FFF_FFFF => Segment::Mapped,
                _ => Segment::Invalid,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mask: u32, hi: u64, lo0: u64, lo1: u64) -> TlbEntry {
        let mut entry = TlbEntry::default();
        entry.write(mask, hi, lo0, lo1);
        entry
    }

    #[test]
    fn mode_from_status() {
        let status = Status::new();
        assert_eq!(TranslationMode::from_status(status), TranslationMode::Kernel32);
        let status = Status::new().with_ksu(2).with_ux(true);
        assert_eq!(TranslationMode::from_status(status), TranslationMode::User64);
        let status = Status::new().with_ksu(1);
        assert_eq!(TranslationMode::from_status(status), TranslationMode::Supervisor32);
        // EXL forces kernel mode
        let status = Status::new().with_ksu(2).with_exl(true).with_kx(true);
        assert_eq!(TranslationMode::from_status(status), TranslationMode::Kernel64);
    }

    #[test]
    fn normalizes_page_mask_pairs() {
        let e = entry(0x2000, 0, 0, 0);
        assert_eq!(e.page_mask, 0x6000);
        let e = entry(0x0100_0000, 0, 0, 0);
        assert_eq!(e.page_mask, 0x01FF_E000);
        assert_eq!(e.offset_mask, 0xFF_FFFF);
        assert_eq!(e.compare_mask, 0xFF_FE00_0000);

        // Every derived field agrees with the page size
        for mask in [0, 0x6000, 0x1_E000, 0x7_E000, 0x1F_E000, 0x7F_E000, 0x01FF_E000] {
            let e = entry(mask, 0, 0, 0);
            assert_eq!(e.page_mask, mask);
            let page = (e.page_mask | 0x1FFF) >> 1;
            assert_eq!(e.offset_mask, page as u64);
            assert_eq!(e.compare_mask, 0xFF_FFFF_E000 & !(mask as u64));
            assert_eq!(e.compare_mask & (e.offset_mask << 1 | 1), 0);
        }
    }

    #[test]
    fn global_needs_both_bits() {
        assert!(entry(0, 0, 1, 1).global);
        assert!(!entry(0, 0, 1, 0).global);
    }

    #[test]
    fn lookup_even_and_odd_pages() {
        let mut tlb = Tlb::default();
        // VPN2 0x2000 >> 13 = 1; even page -> PFN 0x100, odd -> PFN 0x200
        tlb.entries[3] = entry(0, 0x2000 | 5, (0x100 << 6) | 0b110, (0x200 << 6) | 0b010);
        assert_eq!(tlb.lookup(0x2004, 5, false, false), Ok((0x10_0004, true)));
        assert_eq!(tlb.lookup(0x3008, 5, false, false), Ok((0x20_0008, true)));
        // Wrong ASID
        assert_eq!(tlb.lookup(0x2004, 6, false, false), Err(TlbFault::Miss));
        // Odd page is clean
        assert_eq!(tlb.lookup(0x3008, 5, false, true), Err(TlbFault::Modified));
    }

    #[test]
    fn lookup_invalid_and_uncached() {
        let mut tlb = Tlb::default();
        tlb.entries[0] = entry(0, 0x4000, (0x1 << 6) | (2 << 3) | 0b011, 0b001);
        assert_eq!(tlb.lookup(0x4010, 0, false, false), Ok((0x1010, false)));
        assert_eq!(tlb.lookup(0x5010, 0, false, false), Err(TlbFault::Invalid));
    }

    #[test]
    fn large_pages_use_mask() {
        let mut tlb = Tlb::default();
        // 16KiB pages
        tlb.entries[0] = entry(0x6000, 0x1_0000, (0x40 << 6) | 0b111, (0x80 << 6) | 0b111);
        assert_eq!(tlb.lookup(0x1_3FFC, 0, false, false), Ok((0x4_3FFC, true)));
        assert_eq!(tlb.lookup(0x1_4000, 0, false, false), Ok((0x8_0000, true)));
    }

    #[test]
    fn unwritten_entries_never_match() {
        let tlb = Tlb::default();
        assert_eq!(tlb.lookup(0, 0, false, false), Err(TlbFault::Miss));
        assert_eq!(tlb.lookup(0x1234, 0, true, false), Err(TlbFault::Miss));
        assert_eq!(tlb.probe(0), None);
    }

    #[test]
    fn probe_finds_entry() {
        let mut tlb = Tlb::default();
        tlb.entries[7] = entry(0, 0x8000 | 9, 0b10, 0b10);
        assert_eq!(tlb.probe(0x8000 | 9), Some(7));
        assert_eq!(tlb.probe(0x8000 | 8), None);
    }
}
