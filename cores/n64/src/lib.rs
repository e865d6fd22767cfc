// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

#![allow(clippy::unused_self)]

use std::mem;

use common::{components::scheduler::Scheduler, numutil::NumExt, Time, TimeS};

pub use crate::{
    backend::{ExecutionBackend, Interpreter},
    config::{EmulateOptions, N64Config, PiDmaTiming, RdramSize},
    error::{BootError, HostError},
    hw::{
        pif::Button,
        sp::{HaltingUnit, RspExit, VectorUnit},
        Interrupt,
    },
};
use crate::{
    cpu::Cpu,
    hw::{
        ai::AudioInterface, dp::DisplayProcessor, mi::MipsInterface, pi::PeripheralInterface,
        ri::RdramInterface, si::SerialInterface, sp::SignalProcessor, vi::VideoInterface,
    },
    memory::Memory,
    scheduling::N64Event,
};

mod addr;
mod backend;
mod cache;
mod config;
pub mod cpu;
mod error;
mod hw;
mod memory;
mod mmu;
mod scheduling;
#[cfg(test)]
mod tests;

/// Clock of the VR4300, in Hz.
pub const CPU_CLOCK: Time = 93_750_000;
/// Clock of the RSP and RDP, in Hz.
pub const RCP_CLOCK: Time = 62_500_000;
/// Video DAC clock (NTSC), in Hz.
pub const VI_CLOCK: Time = 48_681_812;
/// Largest slice the run loop hands to the CPU at once.
const MAX_QUOTA: TimeS = 1024;

/// System state representing entire console.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Nintendo64 {
    pub cpu: Cpu,
    pub memory: Memory,
    pub mi: MipsInterface,
    pub vi: VideoInterface,
    pub ai: AudioInterface,
    pub pi: PeripheralInterface,
    pub si: SerialInterface,
    pub ri: RdramInterface,
    pub sp: SignalProcessor,
    pub dp: DisplayProcessor,
    scheduler: Scheduler<N64Event>,

    #[cfg_attr(feature = "serde", serde(skip))]
    #[cfg_attr(feature = "serde", serde(default = "backend::default_backend"))]
    backend: Box<dyn ExecutionBackend>,
    /// Physical ranges written to by something other than the CPU since
    /// the backend last ran, which a caching backend must drop.
    pending_invalidations: Vec<(u32, u32)>,
    /// RSP cycles owed from fractional conversions of CPU time.
    rsp_carry: Time,

    pub options: EmulateOptions,
    pub config: N64Config,
    ticking: bool,
    /// How far the last call to [Nintendo64::run] went past its budget.
    overrun: TimeS,
}

impl Nintendo64 {
    /// Create a powered-on system with no cartridge inserted.
    pub fn new(config: N64Config) -> Box<Self> {
        let mut n64 = Box::<Self>::default();
        n64.memory = Memory::new(config.rdram_size);
        n64.config = config;
        n64.power_on();
        n64
    }

    /// Run the system for roughly the given amount of CPU cycles.
    /// Returns by how many cycles the budget was exceeded.
    /// Guest software can not make this fail; only a host-side backend
    /// failure is reported as an error.
    pub fn run(&mut self, budget: Time) -> Result<TimeS, HostError> {
        if !self.options.running {
            return Ok(0);
        }

        self.scheduler.add_event(N64Event::PauseEmulation, budget);
        self.ticking = true;
        self.overrun = 0;
        while self.options.running && self.ticking {
            if let Err(err) = self.advance() {
                self.scheduler.remove_event(N64Event::PauseEmulation);
                self.ticking = false;
                return Err(err);
            }
        }
        Ok(self.overrun)
    }

    /// Advance the system clock by the given delta in seconds,
    /// scaled by the speed multiplier.
    pub fn advance_delta(&mut self, delta: f32) -> Result<TimeS, HostError> {
        let target = CPU_CLOCK as f32 * delta * self.options.speed_multiplier as f32;
        self.run(target as Time)
    }

    /// Run until the VI has finished the current frame.
    pub fn run_frame(&mut self) -> Result<(), HostError> {
        while self.options.running && !self.vi.frame_ready {
            self.advance()?;
        }
        self.vi.frame_ready = false;
        Ok(())
    }

    /// Run one iteration of the main loop: the CPU until the next event is due,
    /// then the RSP for the same amount of time, then the scheduler.
    pub fn advance(&mut self) -> Result<(), HostError> {
        let quota = self.scheduler.next_event_in().clamp(1, MAX_QUOTA);

        let mut backend = mem::replace(&mut self.backend, Box::new(Interpreter));
        let result = backend.run(self, quota as Time);
        self.backend = backend;
        let overrun = result?;

        let consumed = (quota + overrun).max(0) as Time;
        self.run_rsp(consumed);
        self.advance_clock(consumed);
        Ok(())
    }

    /// Advance the scheduler, which controls everything except the CPU.
    fn advance_clock(&mut self, cycles: Time) {
        self.scheduler.advance(cycles);
        while let Some(event) = self.scheduler.get_next_pending() {
            event.kind.dispatch(self, event.late_by);
        }
    }

    /// Give the RSP its share of the time the CPU just ran for.
    fn run_rsp(&mut self, cpu_cycles: Time) {
        let total = cpu_cycles * RCP_CLOCK + self.rsp_carry;
        self.rsp_carry = total % CPU_CLOCK;
        SignalProcessor::run(self, total / CPU_CLOCK);
    }

    /// Stop the current call to [Nintendo64::run] after the current iteration.
    pub fn stop(&mut self) {
        self.ticking = false;
    }

    /// Tick all components by the given amount of CPU cycles.
    #[inline]
    pub(crate) fn tick(&mut self, cycles: Time) {
        self.cpu.cycles += cycles;
        self.scheduler.tick(cycles);
    }

    /// Reinitialize all registers, caches, TLB and devices to the state
    /// they are in after power-on. Memory contents are left alone.
    pub fn power_on(&mut self) {
        self.scheduler = Scheduler::default();
        Cpu::power_on(self);
        self.mi = MipsInterface::default();
        self.ai = AudioInterface::default();
        self.pi = PeripheralInterface::default();
        self.si = SerialInterface::default();
        self.ri = RdramInterface::default();
        self.sp.power_on();
        self.dp = DisplayProcessor::default();
        VideoInterface::power_on(self);
        self.rsp_carry = 0;
        self.pending_invalidations.clear();

        if self.config.skip_bootrom {
            self.skip_bootrom();
        }
    }

    /// Reset the console, while keeping the current cartridge inserted.
    pub fn reset(&mut self) {
        let old_self = mem::take(self);
        self.restore_from(old_self);
        self.power_on();
    }

    /// Push the console's reset button. This raises the pre-NMI interrupt
    /// and resets the CPU shortly after.
    pub fn press_reset(&mut self) {
        self.set_cpu_interrupt_line(4, true);
        self.scheduler.add_event(N64Event::Nmi, CPU_CLOCK / 2);
    }

    /// Restore state after a savestate load. `old_self` should be the
    /// system state before the state was loaded.
    pub fn restore_from(&mut self, old_self: Self) {
        self.memory.restore_from(old_self.memory);
        self.sp.restore_from(old_self.sp);
        self.backend = old_self.backend;
        self.options = old_self.options;
        self.config = old_self.config;
    }

    /// Swap out the execution backend. Caches of the new backend
    /// start out empty.
    pub fn set_backend(&mut self, backend: Box<dyn ExecutionBackend>) {
        self.backend = backend;
        self.pending_invalidations.clear();
        let size = self.memory.rdram.len() as u32;
        self.backend.invalidate(0, size);
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Replace the unit running RSP microcode.
    pub fn set_vector_unit(&mut self, unit: Box<dyn VectorUnit>) {
        self.sp.unit = unit;
    }

    /// Note that a physical range was changed outside the CPU.
    pub(crate) fn invalidate_code(&mut self, paddr: u32, len: u32) {
        if len != 0 {
            self.pending_invalidations.push((paddr, len));
        }
    }

    /// Hand out ranges that were invalidated since the last call.
    pub fn take_invalidations(&mut self) -> Vec<(u32, u32)> {
        mem::take(&mut self.pending_invalidations)
    }

    /// Set the state of a controller button.
    pub fn set_button(&mut self, btn: Button, pressed: bool) {
        self.si.pif.set_button(btn, pressed);
    }

    /// Set the analog stick position of the controller.
    pub fn set_stick(&mut self, x: i8, y: i8) {
        self.si.pif.stick = (x, y);
    }

    /// Returns true once for every frame the VI finished.
    pub fn take_frame_ready(&mut self) -> bool {
        mem::take(&mut self.vi.frame_ready)
    }

    /// Take the audio samples played by the AI so far, interleaved stereo.
    pub fn take_audio_samples(&mut self) -> Vec<i16> {
        mem::take(&mut self.ai.samples)
    }

    /// Load the PIF boot ROM.
    pub fn load_pif_rom(&mut self, rom: &[u8]) -> Result<(), BootError> {
        if rom.len() != addr::PIF_ROM_SIZE {
            return Err(BootError::PifRomSize {
                expected: addr::PIF_ROM_SIZE,
                got: rom.len(),
            });
        }
        self.memory.pif_rom = rom.to_vec();
        Ok(())
    }

    /// Insert a cartridge. The ROM is expected to be in big-endian byte order.
    pub fn insert_cart(&mut self, rom: Vec<u8>) -> Result<(), BootError> {
        if rom.len() < addr::CART_HEADER_SIZE {
            return Err(BootError::CartTooSmall(rom.len()));
        }
        self.memory.cart = rom;
        self.options.rom_loaded = true;
        Ok(())
    }

    /// Set up the system the way the PIF boot code leaves it,
    /// for booting without a PIF ROM.
    pub fn skip_bootrom(&mut self) {
        // The IPL copies the first 4KiB of the cartridge to DMEM
        // and jumps into it.
        let len = self.memory.cart.len().min(0x1000);
        self.sp.mem[..len].copy_from_slice(&self.memory.cart[..len]);
        Cpu::skip_bootrom(self);
        let size = self.memory.rdram.len() as u32;
        // osMemSize, as set up by the boot code
        self.write_physical::<u32>(0x318, size);
        self.write_physical::<u32>(0x3F0, size);
    }

    /// Serialize the entire system state.
    #[cfg(feature = "serde")]
    pub fn save_state(&self) -> Result<Vec<u8>, error::StateError> {
        Ok(common::serialize::serialize(
            self,
            self.config.compress_savestates,
        )?)
    }

    /// Load a state made with [Nintendo64::save_state].
    /// The cartridge, PIF ROM and backends of the running system are kept.
    #[cfg(feature = "serde")]
    pub fn load_state(&mut self, state: &[u8]) -> Result<(), error::StateError> {
        let loaded: Self =
            common::serialize::deserialize(state, self.config.compress_savestates)?;
        let old_self = mem::replace(self, loaded);
        self.restore_from(old_self);
        let size = self.memory.rdram.len() as u32;
        self.backend.invalidate(0, size);
        Ok(())
    }

    /// Read a value from the virtual address space, like a load instruction would.
    /// If an exception is raised, 0 is returned and the CPU's exception latch
    /// is set.
    pub fn read_virtual<T: NumExt>(&mut self, vaddr: u64) -> T {
        Cpu::read::<T>(self, vaddr)
    }

    /// Write a value to the virtual address space, like a store instruction would.
    pub fn write_virtual<T: NumExt>(&mut self, vaddr: u64, value: T) {
        Cpu::write::<T>(self, vaddr, value)
    }
}

impl Default for Nintendo64 {
    fn default() -> Self {
        Self {
            cpu: Cpu::default(),
            memory: Memory::default(),
            mi: MipsInterface::default(),
            vi: VideoInterface::default(),
            ai: AudioInterface::default(),
            pi: PeripheralInterface::default(),
            si: SerialInterface::default(),
            ri: RdramInterface::default(),
            sp: SignalProcessor::default(),
            dp: DisplayProcessor::default(),
            scheduler: Scheduler::default(),
            backend: backend::default_backend(),
            pending_invalidations: Vec::new(),
            rsp_carry: 0,
            options: EmulateOptions::default(),
            config: N64Config::default(),
            ticking: false,
            overrun: 0,
        }
    }
}
