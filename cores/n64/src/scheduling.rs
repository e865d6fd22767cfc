// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::{components::scheduler::Kind, TimeS};

use crate::{
    cpu::Cpu,
    hw::{ai::AudioInterface, pi::PeripheralInterface, si::SerialInterface, vi::VideoInterface},
    Nintendo64,
};

/// All scheduler events on the N64.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u16)]
pub enum N64Event {
    /// Pause the emulation. Used by `run` to advance by a certain amount.
    PauseEmulation,
    /// Count reached Compare.
    CompareInterrupt,
    /// The VI finished drawing a halfline.
    ViHalfline,
    /// The active AI DMA finished playing.
    AiDma,
    /// The active PI DMA finished.
    PiDma,
    /// The active SI DMA finished.
    SiDma,
    /// The reset button's NMI, some time after Pre-NMI was signalled.
    Nmi,
}

impl N64Event {
    /// Handle the event by delegating to the appropriate handler.
    pub fn dispatch(self, n64: &mut Nintendo64, late_by: TimeS) {
        match self {
            N64Event::PauseEmulation => {
                n64.ticking = false;
                n64.overrun = late_by;
            }
            N64Event::CompareInterrupt => Cpu::compare_interrupt(n64),
            N64Event::ViHalfline => VideoInterface::halfline(n64, late_by),
            N64Event::AiDma => AudioInterface::dma_done(n64),
            N64Event::PiDma => PeripheralInterface::dma_done(n64),
            N64Event::SiDma => SerialInterface::dma_done(n64),
            N64Event::Nmi => {
                n64.set_cpu_interrupt_line(4, false);
                Cpu::nmi(n64);
            }
        }
    }
}

impl Kind for N64Event {}

impl Default for N64Event {
    fn default() -> Self {
        Self::PauseEmulation
    }
}
