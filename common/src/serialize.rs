// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use std::io;

use thiserror::Error;

/// Error produced when (de)serializing a state fails.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The state could not be encoded or decoded.
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
    /// The compression stream failed.
    #[error("compression: {0}")]
    Io(#[from] io::Error),
}

/// Serialize an object that can be loaded with [deserialize].
/// It is (optionally zstd-compressed) bincode.
#[cfg(feature = "zstd")]
pub fn serialize<T: serde::Serialize>(
    thing: &T,
    with_zstd: bool,
) -> Result<Vec<u8>, SerializeError> {
    if with_zstd {
        let mut dest = vec![];
        let mut writer = zstd::stream::Encoder::new(&mut dest, 3)?;
        bincode::serialize_into(&mut writer, thing)?;
        writer.finish()?;
        Ok(dest)
    } else {
        Ok(bincode::serialize(thing)?)
    }
}

/// Deserialize an object that was made with [serialize].
/// It is (optionally zstd-compressed) bincode.
#[cfg(feature = "zstd")]
pub fn deserialize<T: serde::de::DeserializeOwned>(
    state: &[u8],
    with_zstd: bool,
) -> Result<T, SerializeError> {
    if with_zstd {
        let decoder = zstd::stream::Decoder::new(state)?;
        Ok(bincode::deserialize_from(decoder)?)
    } else {
        Ok(bincode::deserialize(state)?)
    }
}

/// Serialize an object that can be loaded with [deserialize].
/// Without the `zstd` feature, it is always uncompressed bincode.
#[cfg(not(feature = "zstd"))]
pub fn serialize<T: serde::Serialize>(
    thing: &T,
    _with_zstd: bool,
) -> Result<Vec<u8>, SerializeError> {
    Ok(bincode::serialize(thing)?)
}

/// Deserialize an object that was made with [serialize].
/// Without the `zstd` feature, it is always uncompressed bincode.
#[cfg(not(feature = "zstd"))]
pub fn deserialize<T: serde::de::DeserializeOwned>(
    state: &[u8],
    _with_zstd: bool,
) -> Result<T, SerializeError> {
    Ok(bincode::deserialize(state)?)
}
