// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::{Time, TimeS};

use crate::{cpu::Cpu, error::HostError, Nintendo64};

/// A way of executing CPU instructions. Every backend must have the same
/// architectural effects and cycle accounting as the [Interpreter].
pub trait ExecutionBackend: Send {
    /// Execute instructions until at least `budget` cycles have passed.
    /// Returns by how many cycles the budget was exceeded.
    /// Errors are failures of the host, and stop the system.
    fn run(&mut self, n64: &mut Nintendo64, budget: Time) -> Result<TimeS, HostError>;

    /// Drop anything derived from the given physical range, since it was
    /// changed by something other than the CPU.
    fn invalidate(&mut self, paddr: u32, len: u32);

    /// Name shown to the user.
    fn name(&self) -> &'static str;
}

/// Plain interpreter stepping one instruction at a time.
#[derive(Debug, Default, Copy, Clone)]
pub struct Interpreter;

impl ExecutionBackend for Interpreter {
    fn run(&mut self, n64: &mut Nintendo64, budget: Time) -> Result<TimeS, HostError> {
        // Nothing is cached here, but the ranges should still be drained
        for (paddr, len) in n64.take_invalidations() {
            self.invalidate(paddr, len);
        }
        Ok(Cpu::run(n64, budget))
    }

    fn invalidate(&mut self, _paddr: u32, _len: u32) {}

    fn name(&self) -> &'static str {
        "Interpreter"
    }
}

pub fn default_backend() -> Box<dyn ExecutionBackend> {
    Box::new(Interpreter)
}
