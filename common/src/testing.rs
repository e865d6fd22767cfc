// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Small harness for tests that run a guest program until it reports
//! a result somewhere in system state.

pub type TestInspector<S> = fn(&mut S) -> TestStatus;

/// Step the system until the inspector reports success or failure,
/// panicking on failure or once `max_steps` have passed.
pub fn run_until<S>(
    system: &mut S,
    max_steps: usize,
    mut step: impl FnMut(&mut S),
    inspector: TestInspector<S>,
) {
    for _ in 0..max_steps {
        step(system);
        match (inspector)(system) {
            TestStatus::Running => continue,
            TestStatus::Success => return,
            TestStatus::Failed => panic!("Test failed!"),
            TestStatus::FailedAt(msg) => panic!("Test failed: {msg}!"),
        }
    }
    panic!("Test timed out!")
}

#[derive(Debug, PartialEq)]
pub enum TestStatus {
    Running,
    Success,
    Failed,
    FailedAt(String),
}
