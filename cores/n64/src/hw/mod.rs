// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The RCP's register-mapped devices.

use std::ops::{Index, IndexMut};

pub mod ai;
pub mod dp;
pub mod mi;
pub mod pi;
pub mod pif;
pub mod ri;
pub mod si;
pub mod sp;
pub mod vi;

pub use mi::Interrupt;

/// Raw register storage of a device window, indexed by byte offset.
/// Offsets outside the block mirror around it. Registers a device does not
/// handle specially read back whatever was last written to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile<const N: usize> {
    #[cfg_attr(feature = "serde", serde(with = "serde_arrays"))]
    regs: [u32; N],
}

impl<const N: usize> RegisterFile<N> {
    #[inline]
    fn idx(offset: u32) -> usize {
        ((offset >> 2) as usize) % N
    }
}

impl<const N: usize> Default for RegisterFile<N> {
    fn default() -> Self {
        Self { regs: [0; N] }
    }
}

impl<const N: usize> Index<u32> for RegisterFile<N> {
    type Output = u32;

    fn index(&self, offset: u32) -> &Self::Output {
        &self.regs[Self::idx(offset)]
    }
}

impl<const N: usize> IndexMut<u32> for RegisterFile<N> {
    fn index_mut(&mut self, offset: u32) -> &mut Self::Output {
        &mut self.regs[Self::idx(offset)]
    }
}

/// Apply a register write made of clear/set bit pairs, starting at `first_bit`
/// of `value`, to `count` bits of `target`.
pub fn apply_set_clear(target: u32, value: u32, first_bit: u32, count: u32) -> u32 {
    let mut target = target;
    for bit in 0..count {
        let pair = value >> (first_bit + bit * 2);
        if pair & 1 != 0 {
            target &= !(1 << bit);
        }
        if pair & 2 != 0 {
            target |= 1 << bit;
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_file_mirrors() {
        let mut regs = RegisterFile::<4>::default();
        regs[0x4] = 0x1234;
        assert_eq!(regs[0x14], 0x1234);
        assert_eq!(regs[0x7], 0x1234);
    }

    #[test]
    fn set_clear_pairs() {
        // Clear bit 0, set bit 2
        assert_eq!(apply_set_clear(0b011, 0b10_00_01, 0, 3), 0b110);
        // Setting and clearing at once sets
        assert_eq!(apply_set_clear(0, 0b11, 0, 1), 1);
    }
}
