// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::Time;

/// Options that can be changed while the system is running.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EmulateOptions {
    /// If the system is running. Cleared to pause it.
    pub running: bool,
    /// If there is a ROM loaded / cartridge inserted.
    pub rom_loaded: bool,
    /// Multiplier applied to time given to [crate::Nintendo64::advance_delta].
    pub speed_multiplier: usize,
}

impl Default for EmulateOptions {
    fn default() -> Self {
        Self {
            running: true,
            rom_loaded: false,
            speed_multiplier: 1,
        }
    }
}

/// Configuration used when initializing the system.
/// These options don't change at runtime.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde_config", derive(serde::Deserialize, serde::Serialize))]
pub struct N64Config {
    /// Amount of RDRAM installed.
    pub rdram_size: RdramSize,
    /// If save states should be compressed.
    pub compress_savestates: bool,
    /// If the PIF boot ROM should be skipped by setting up the state it
    /// would leave behind.
    pub skip_bootrom: bool,
    /// How long PI DMA transfers take.
    pub pi_dma_timing: PiDmaTiming,
    /// How many CPU cycles a 64-byte SI DMA takes.
    pub si_dma_cycles: Time,
    /// Log every executed instruction at trace level.
    pub trace_instructions: bool,
    /// Seed reported by the CIC chip, used when skipping the boot ROM.
    pub cic_seed: u8,
}

impl Default for N64Config {
    fn default() -> Self {
        Self {
            rdram_size: RdramSize::Eight,
            compress_savestates: false,
            skip_bootrom: false,
            pi_dma_timing: PiDmaTiming::Domain,
            si_dma_cycles: 0x900,
            trace_instructions: false,
            // CIC-NUS-6102
            cic_seed: 0x3F,
        }
    }
}

/// Size of the installed RDRAM.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_config", derive(serde::Deserialize, serde::Serialize))]
pub enum RdramSize {
    /// Base system
    Four,
    /// With the Expansion Pak
    Eight,
}

impl RdramSize {
    pub fn bytes(self) -> usize {
        match self {
            Self::Four => 4 * 1024 * 1024,
            Self::Eight => 8 * 1024 * 1024,
        }
    }
}

/// Cost model for PI DMA transfers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_config", derive(serde::Deserialize, serde::Serialize))]
pub enum PiDmaTiming {
    /// A fixed amount of CPU cycles per transferred byte.
    Flat { cycles_per_byte: Time },
    /// Derived from the latency, pulse width, page size and release
    /// registers of the cartridge domain being accessed.
    Domain,
}
