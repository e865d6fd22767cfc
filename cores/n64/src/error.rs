// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use thiserror::Error;

/// Fatal failure of the host side of emulation. Guest software cannot
/// cause these; they indicate a misconfigured backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("execution backend ran out of code space ({needed} bytes needed, {capacity} available)")]
    OutOfCodeSpace { needed: usize, capacity: usize },
}

/// A boot input given to the system was malformed.
/// The system is left unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BootError {
    #[error("PIF ROM must be {expected} bytes, got {got}")]
    PifRomSize { expected: usize, got: usize },
    #[error("cartridge ROM is too small to contain a header ({0} bytes)")]
    CartTooSmall(usize),
}

/// Saving or loading a state failed.
#[cfg(feature = "serde")]
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to (de)serialize state: {0}")]
    Serialize(#[from] common::serialize::SerializeError),
}
