// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Audio Interface: plays back buffers of 16-bit stereo samples from RDRAM.

use arrayvec::ArrayVec;
use common::{numutil::NumExt, Time};

use super::{Interrupt, RegisterFile};
use crate::{
    addr::{AI_BITRATE, AI_CONTROL, AI_DACRATE, AI_DRAM_ADDR, AI_LENGTH, AI_STATUS},
    scheduling::N64Event,
    Nintendo64, CPU_CLOCK, VI_CLOCK,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct AiDma {
    addr: u32,
    len: u32,
    /// CPU cycles the buffer takes to play.
    duration: Time,
}

#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AudioInterface {
    regs: RegisterFile<8>,
    dram_addr: u32,
    /// The playing buffer first, then the one queued after it.
    queue: ArrayVec<AiDma, 2>,
    enabled: bool,
    dacrate: u32,
    /// Samples played since the frontend last took them.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub samples: Vec<i16>,
}

impl AudioInterface {
    pub fn read_reg(n64: &mut Nintendo64, addr: u32) -> u32 {
        let ai = &n64.ai;
        match addr & 0x1F {
            AI_LENGTH => match (ai.queue.first(), n64.scheduler.remaining(N64Event::AiDma)) {
                (Some(dma), Some(left)) => {
                    let left = left.max(0) as Time;
                    let bytes = dma.len as Time * left / dma.duration.max(1);
                    bytes as u32 & !7
                }
                _ => 0,
            },
            AI_STATUS => {
                let full = ai.queue.is_full();
                (full as u32) << 31
                    | (!ai.queue.is_empty() as u32) << 30
                    | (ai.enabled as u32) << 25
                    | 1 << 24
                    | 1 << 20
                    | full as u32
            }
            _ => ai.regs[addr],
        }
    }

    fn duration(&self, len: u32) -> Time {
        let sample_rate = (VI_CLOCK / (self.dacrate as Time + 1)).max(1);
        (len as Time / 4) * CPU_CLOCK / sample_rate
    }

    /// The playing buffer finished.
    pub(crate) fn dma_done(n64: &mut Nintendo64) {
        if n64.ai.queue.is_empty() {
            return;
        }
        let dma = n64.ai.queue.remove(0);
        if n64.ai.enabled {
            Self::collect_samples(n64, dma);
        }
        n64.raise_interrupt(Interrupt::Ai);

        if let Some(next) = n64.ai.queue.first() {
            n64.scheduler.add_event(N64Event::AiDma, next.duration.max(1));
        }
    }

    fn collect_samples(n64: &mut Nintendo64, dma: AiDma) {
        let start = dma.addr.us();
        let end = (start + dma.len.us()).min(n64.memory.rdram.len());
        if let Some(buffer) = n64.memory.rdram.get(start..end) {
            n64.ai.samples.extend(
                buffer
                    .chunks_exact(2)
                    .map(|s| u16::from_be_slice(s) as i16),
            );
        }
    }
}

impl Nintendo64 {
    pub(crate) fn ai_write(&mut self, addr: u32, value: u32) {
        self.ai.regs[addr] = value;
        match addr & 0x1F {
            AI_DRAM_ADDR => self.ai.dram_addr = value & 0xFF_FFF8,
            AI_LENGTH => {
                let len = value & 0x3_FFF8;
                if len == 0 {
                    return;
                }
                let dma = AiDma {
                    addr: self.ai.dram_addr,
                    len,
                    duration: self.ai.duration(len),
                };
                if self.ai.queue.try_push(dma).is_err() {
                    log::warn!("AI DMA queue is full, dropping buffer at 0x{:06X}", dma.addr);
                    return;
                }
                log::debug!("AI DMA of 0x{len:X} bytes from 0x{:06X} queued", dma.addr);
                if self.ai.queue.len() == 1 {
                    self.scheduler
                        .add_event(N64Event::AiDma, dma.duration.max(1));
                }
            }
            AI_CONTROL => self.ai.enabled = value.is_bit(0),
            AI_STATUS => self.clear_interrupt(Interrupt::Ai),
            AI_DACRATE => self.ai.dacrate = value & 0x3FFF,
            // Only affects the DAC's serial clock, which is not modelled
            AI_BITRATE => self.ai.regs[addr] = value & 0xF,
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::N64Config;

    fn setup() -> Box<Nintendo64> {
        let mut n64 = Nintendo64::new(N64Config::default());
        // 48 kHz or so
        n64.ai_write(AI_DACRATE, 1013);
        n64.ai_write(AI_CONTROL, 1);
        n64
    }

    #[test]
    fn duration_follows_dacrate() {
        let n64 = setup();
        let rate = VI_CLOCK / 1014;
        assert_eq!(n64.ai.duration(0x1000), 0x400 * CPU_CLOCK / rate);
    }

    #[test]
    fn queue_holds_two() {
        let mut n64 = setup();
        for _ in 0..3 {
            n64.ai_write(AI_DRAM_ADDR, 0x1000);
            n64.ai_write(AI_LENGTH, 0x100);
        }
        assert_eq!(n64.ai.queue.len(), 2);
        let status = AudioInterface::read_reg(&mut n64, AI_STATUS);
        assert!(status.is_bit(31) && status.is_bit(30) && status.is_bit(0));
    }

    #[test]
    fn completion_raises_and_starts_next() {
        let mut n64 = setup();
        n64.memory.rdram[0x1000..0x1004].copy_from_slice(&[0x12, 0x34, 0xFF, 0xFE]);
        n64.ai_write(AI_DRAM_ADDR, 0x1000);
        n64.ai_write(AI_LENGTH, 0x8);
        n64.ai_write(AI_DRAM_ADDR, 0x2000);
        n64.ai_write(AI_LENGTH, 0x100);

        let first = n64.ai.duration(0x8).max(1);
        n64.advance_clock(first);
        assert_ne!(n64.mi.intr & (1 << 2), 0);
        assert_eq!(n64.ai.queue.len(), 1);
        assert!(n64.scheduler.is_scheduled(N64Event::AiDma));
        assert_eq!(&n64.take_audio_samples()[..2], &[0x1234, -2]);

        n64.ai_write(AI_STATUS, 0);
        assert_eq!(n64.mi.intr & (1 << 2), 0);
    }

    #[test]
    fn length_counts_down() {
        let mut n64 = setup();
        n64.ai_write(AI_LENGTH, 0x4000);
        let full = n64.ai.duration(0x4000);
        assert_eq!(AudioInterface::read_reg(&mut n64, AI_LENGTH), 0x4000);
        n64.advance_clock(full / 2);
        let left = AudioInterface::read_reg(&mut n64, AI_LENGTH);
        assert!((0x1FF0..=0x2000).contains(&left));
    }
}
