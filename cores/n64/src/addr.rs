// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

// Physical memory map
pub const RDRAM_END: u32 = 0x03EF_FFFF;
pub const RDRAM_REGS: u32 = 0x03F0_0000;
pub const SP_MEM: u32 = 0x0400_0000;
pub const SP_REGS: u32 = 0x0404_0000;
pub const SP_PC_REGS: u32 = 0x0408_0000;
pub const DP_REGS: u32 = 0x0410_0000;
pub const MI_REGS: u32 = 0x0430_0000;
pub const VI_REGS: u32 = 0x0440_0000;
pub const AI_REGS: u32 = 0x0450_0000;
pub const PI_REGS: u32 = 0x0460_0000;
pub const RI_REGS: u32 = 0x0470_0000;
pub const SI_REGS: u32 = 0x0480_0000;
pub const CART_DOM2_ADDR1: u32 = 0x0500_0000;
pub const CART_DOM2_ADDR2: u32 = 0x0800_0000;
pub const CART_DOM1_ADDR2: u32 = 0x1000_0000;
pub const CART_DOM1_ADDR2_END: u32 = 0x1FBF_FFFF;
pub const PIF_ROM: u32 = 0x1FC0_0000;
pub const PIF_RAM: u32 = 0x1FC0_07C0;
pub const PIF_RAM_END: u32 = 0x1FC0_07FF;

pub const PIF_ROM_SIZE: usize = 0x7C0;
pub const PIF_RAM_SIZE: usize = 0x40;
pub const SP_MEM_SIZE: usize = 0x2000;
pub const SRAM_SIZE: usize = 0x8000;
pub const CART_HEADER_SIZE: usize = 0x1000;

// MI
pub const MI_MODE: u32 = 0x00;
pub const MI_VERSION: u32 = 0x04;
pub const MI_INTERRUPT: u32 = 0x08;
pub const MI_MASK: u32 = 0x0C;

// VI
pub const VI_ORIGIN: u32 = 0x04;
pub const VI_WIDTH: u32 = 0x08;
pub const VI_V_INTR: u32 = 0x0C;
pub const VI_V_CURRENT: u32 = 0x10;
pub const VI_V_SYNC: u32 = 0x18;

// AI
pub const AI_DRAM_ADDR: u32 = 0x00;
pub const AI_LENGTH: u32 = 0x04;
pub const AI_CONTROL: u32 = 0x08;
pub const AI_STATUS: u32 = 0x0C;
pub const AI_DACRATE: u32 = 0x10;
pub const AI_BITRATE: u32 = 0x14;

// PI
pub const PI_DRAM_ADDR: u32 = 0x00;
pub const PI_CART_ADDR: u32 = 0x04;
pub const PI_RD_LEN: u32 = 0x08;
pub const PI_WR_LEN: u32 = 0x0C;
pub const PI_STATUS: u32 = 0x10;
pub const PI_BSD_DOM1_LAT: u32 = 0x14;
pub const PI_BSD_DOM1_PWD: u32 = 0x18;
pub const PI_BSD_DOM1_PGS: u32 = 0x1C;
pub const PI_BSD_DOM1_RLS: u32 = 0x20;
pub const PI_BSD_DOM2_LAT: u32 = 0x24;
pub const PI_BSD_DOM2_PGS: u32 = 0x2C;
pub const PI_BSD_DOM2_RLS: u32 = 0x30;

// RI
pub const RI_MODE: u32 = 0x00;
pub const RI_CONFIG: u32 = 0x04;
pub const RI_CURRENT_LOAD: u32 = 0x08;
pub const RI_SELECT: u32 = 0x0C;
pub const RI_REFRESH: u32 = 0x10;
pub const RI_LATENCY: u32 = 0x14;
pub const RI_RERROR: u32 = 0x18;
pub const RI_WERROR: u32 = 0x1C;

// SI
pub const SI_DRAM_ADDR: u32 = 0x00;
pub const SI_PIF_AD_RD64B: u32 = 0x04;
pub const SI_PIF_AD_WR4B: u32 = 0x08;
pub const SI_PIF_AD_WR64B: u32 = 0x10;
pub const SI_PIF_AD_RD4B: u32 = 0x14;
pub const SI_STATUS: u32 = 0x18;

// SP
pub const SP_MEM_ADDR: u32 = 0x00;
pub const SP_DRAM_ADDR: u32 = 0x04;
pub const SP_RD_LEN: u32 = 0x08;
pub const SP_WR_LEN: u32 = 0x0C;
pub const SP_STATUS: u32 = 0x10;
pub const SP_DMA_FULL: u32 = 0x14;
pub const SP_DMA_BUSY: u32 = 0x18;
pub const SP_SEMAPHORE: u32 = 0x1C;

// DP
pub const DP_START: u32 = 0x00;
pub const DP_END: u32 = 0x04;
pub const DP_CURRENT: u32 = 0x08;
pub const DP_STATUS: u32 = 0x0C;
