// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Video Interface. Only scanout timing is modelled; the framebuffer
//! is left for the frontend to interpret.

use common::{Time, TimeS};

use super::{Interrupt, RegisterFile};
use crate::{
    addr::{VI_ORIGIN, VI_V_CURRENT, VI_V_INTR, VI_V_SYNC, VI_WIDTH},
    scheduling::N64Event,
    Nintendo64, CPU_CLOCK,
};

/// Halflines per field on NTSC, minus one.
const NTSC_V_SYNC: u32 = 0x20D;
/// CPU cycles per field.
const FRAME_CYCLES: Time = CPU_CLOCK / 60;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct VideoInterface {
    regs: RegisterFile<16>,
    /// Halfline currently being drawn.
    pub v_current: u32,
    /// Set when a field has been finished; taken by the frontend.
    pub frame_ready: bool,
    /// Fields finished since power-on.
    pub frames: u64,
}

impl VideoInterface {
    pub fn read_reg(&self, addr: u32) -> u32 {
        match addr & 0x3F {
            VI_V_CURRENT => self.v_current,
            _ => self.regs[addr],
        }
    }

    pub(crate) fn power_on(n64: &mut Nintendo64) {
        n64.vi = Self::default();
        n64.scheduler
            .add_event(N64Event::ViHalfline, n64.vi.halfline_cycles());
    }

    /// A halfline was drawn; move on to the next one.
    pub(crate) fn halfline(n64: &mut Nintendo64, late_by: TimeS) {
        let vi = &mut n64.vi;
        if vi.v_current >= vi.v_sync() {
            vi.v_current = 0;
            vi.frame_ready = true;
            vi.frames += 1;
        } else {
            vi.v_current += 1;
        }

        if vi.v_current == vi.regs[VI_V_INTR] {
            n64.raise_interrupt(Interrupt::Vi);
        }

        let next = n64.vi.halfline_cycles().saturating_sub(late_by as Time);
        n64.scheduler.add_event(N64Event::ViHalfline, next.max(1));
    }

    fn v_sync(&self) -> u32 {
        self.regs[VI_V_SYNC]
    }

    fn halfline_cycles(&self) -> Time {
        FRAME_CYCLES / (self.v_sync() as Time + 1)
    }
}

impl Default for VideoInterface {
    fn default() -> Self {
        let mut regs = RegisterFile::default();
        regs[VI_V_SYNC] = NTSC_V_SYNC;
        regs[VI_V_INTR] = 0x3FF;
        Self {
            regs,
            v_current: 0,
            frame_ready: false,
            frames: 0,
        }
    }
}

impl Nintendo64 {
    pub(crate) fn vi_write(&mut self, addr: u32, value: u32) {
        match addr & 0x3F {
            VI_ORIGIN => self.vi.regs[addr] = value & 0xFF_FFFF,
            VI_WIDTH | VI_V_INTR => self.vi.regs[addr] = value & 0x3FF,
            VI_V_CURRENT => self.clear_interrupt(Interrupt::Vi),
            VI_V_SYNC => {
                let value = value & 0x3FF;
                if value != self.vi.regs[addr] {
                    self.vi.regs[addr] = value;
                    self.vi.v_current = self.vi.v_current.min(value);
                    self.scheduler
                        .add_event(N64Event::ViHalfline, self.vi.halfline_cycles());
                }
            }
            _ => self.vi.regs[addr] = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::N64Config;

    fn advance(n64: &mut Nintendo64, cycles: Time) {
        n64.advance_clock(cycles);
    }

    #[test]
    fn interrupt_on_matching_line() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.vi_write(VI_V_INTR, 2);
        let line = n64.vi.halfline_cycles();
        advance(&mut n64, line);
        assert_eq!(n64.vi.v_current, 1);
        assert_eq!(n64.mi.intr & (1 << 3), 0);
        advance(&mut n64, line);
        assert_eq!(n64.vi.v_current, 2);
        assert_ne!(n64.mi.intr & (1 << 3), 0);

        // Any write to V_CURRENT acknowledges
        n64.vi_write(VI_V_CURRENT, 0);
        assert_eq!(n64.mi.intr & (1 << 3), 0);
        assert_eq!(n64.vi.read_reg(VI_V_CURRENT), 2);
    }

    #[test]
    fn field_wraps_at_v_sync() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.vi_write(VI_V_SYNC, 3);
        let line = n64.vi.halfline_cycles();
        assert_eq!(line, FRAME_CYCLES / 4);
        for _ in 0..3 {
            advance(&mut n64, line);
        }
        assert!(!n64.vi.frame_ready);
        advance(&mut n64, line);
        assert!(n64.take_frame_ready());
        assert_eq!(n64.vi.v_current, 0);
        assert_eq!(n64.vi.frames, 1);
    }

    #[test]
    fn v_sync_change_reschedules() {
        let mut n64 = Nintendo64::new(N64Config::default());
        let before = n64.scheduler.remaining(N64Event::ViHalfline);
        n64.vi_write(VI_V_SYNC, 99);
        let after = n64.scheduler.remaining(N64Event::ViHalfline);
        assert_ne!(before, after);
        assert_eq!(after, Some((FRAME_CYCLES / 100) as TimeS));
    }

    #[test]
    fn unhandled_registers_read_back() {
        let mut n64 = Nintendo64::new(N64Config::default());
        n64.vi_write(0x38, 0x1234_5678);
        assert_eq!(n64.vi.read_reg(0x38), 0x1234_5678);
        n64.vi_write(VI_ORIGIN, 0xFFFF_FFFF);
        assert_eq!(n64.vi.read_reg(VI_ORIGIN), 0xFF_FFFF);
    }
}
