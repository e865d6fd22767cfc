// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use std::ops::BitAnd;

/// Trait for common number operations.
pub trait NumExt: BitAnd<Output = Self> + Copy + PartialEq + Default {
    /// Width in bytes.
    const WIDTH: u32;

    /// Is the given bit set?
    fn is_bit(&self, bit: u16) -> bool;
    /// Set the given bit.
    fn set_bit(self, bit: u16, state: bool) -> Self;
    /// Convert to u32
    fn u32(self) -> u32;
    /// Convert to u64
    fn u64(self) -> u64;
    /// Convert to usize
    fn us(self) -> usize;

    /// Convert from u32
    fn from_u32(from: u32) -> Self;
    /// Convert from u64, truncating
    fn from_u64(from: u64) -> Self;

    /// Get bits in a certain range
    fn bits(self, start: Self, len: Self) -> Self;

    /// Read a big-endian value from the start of the given slice.
    fn from_be_slice(slice: &[u8]) -> Self;
    /// Write this value big-endian to the start of the given slice.
    fn write_be_slice(self, slice: &mut [u8]);
}

macro_rules! num_ext_impl {
    ($ty:ident, $w:expr) => {
        impl NumExt for $ty {
            const WIDTH: u32 = $w;

            #[inline(always)]
            fn is_bit(&self, bit: u16) -> bool {
                (self & (1 << bit)) != 0
            }

            #[inline(always)]
            fn set_bit(self, bit: u16, state: bool) -> $ty {
                (self & ((1 << bit) ^ Self::MAX)) | ((state as $ty) << bit)
            }

            #[inline(always)]
            fn u32(self) -> u32 {
                self as u32
            }

            #[inline(always)]
            fn u64(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn us(self) -> usize {
                self as usize
            }

            #[inline(always)]
            fn from_u32(from: u32) -> Self {
                from as $ty
            }

            #[inline(always)]
            fn from_u64(from: u64) -> Self {
                from as $ty
            }

            #[inline(always)]
            fn bits(self, start: $ty, len: $ty) -> $ty {
                let mask = (1 as $ty).checked_shl(len as u32).unwrap_or(0);
                (self >> start) & mask.wrapping_sub(1)
            }

            #[inline(always)]
            fn from_be_slice(slice: &[u8]) -> Self {
                let mut bytes = [0; $w];
                bytes.copy_from_slice(&slice[..$w]);
                $ty::from_be_bytes(bytes)
            }

            #[inline(always)]
            fn write_be_slice(self, slice: &mut [u8]) {
                slice[..$w].copy_from_slice(&self.to_be_bytes());
            }
        }
    };
}

num_ext_impl!(u8, 1);
num_ext_impl!(u16, 2);
num_ext_impl!(u32, 4);
num_ext_impl!(u64, 8);

pub trait U32Ext {
    fn low(self) -> u16;
    /// Sign-extend to 64 bits.
    fn sext(self) -> u64;
}

impl U32Ext for u32 {
    #[inline(always)]
    fn low(self) -> u16 {
        self as u16
    }

    #[inline(always)]
    fn sext(self) -> u64 {
        self as i32 as i64 as u64
    }
}
