// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The PIF and the joybus devices connected to it. Only a standard
//! controller on the first port is emulated.

use common::numutil::NumExt;

use crate::addr::PIF_RAM_SIZE;

/// Joybus channels: four controller ports and the cartridge EEPROM.
const CHANNELS: usize = 5;
/// Set in the receive length of a channel without a device.
const NO_DEVICE: u8 = 0x80;

/// Buttons of a standard controller, by their bit in the status word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Button {
    A = 15,
    B = 14,
    Z = 13,
    Start = 12,
    DUp = 11,
    DDown = 10,
    DLeft = 9,
    DRight = 8,
    L = 5,
    R = 4,
    CUp = 3,
    CDown = 2,
    CLeft = 1,
    CRight = 0,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Pif {
    #[cfg_attr(feature = "serde", serde(with = "serde_arrays"))]
    pub ram: [u8; PIF_RAM_SIZE],
    pub buttons: u16,
    pub stick: (i8, i8),
}

impl Pif {
    pub fn set_button(&mut self, btn: Button, pressed: bool) {
        self.buttons = self.buttons.set_bit(btn as u16, pressed);
    }

    /// Execute the joybus commands in PIF RAM, writing responses in place.
    pub fn run_joybus(&mut self) {
        let mut channel = 0;
        let mut i = 0;
        while i < PIF_RAM_SIZE - 1 && channel < CHANNELS {
            let tx = self.ram[i];
            match tx {
                // End of commands
                0xFE => break,
                // Padding
                0xFF | 0xFD => i += 1,
                // Skip this channel
                0x00 => {
                    channel += 1;
                    i += 1;
                }
                _ => {
                    let Some(&rx) = self.ram.get(i + 1) else { break };
                    if rx == 0xFE {
                        break;
                    }
                    let tx_len = (tx & 0x3F) as usize;
                    let rx_len = (rx & 0x3F) as usize;
                    let cmd_start = i + 2;
                    let rx_start = cmd_start + tx_len;
                    if rx_start + rx_len > PIF_RAM_SIZE - 1 {
                        log::warn!("Joybus command on channel {channel} overruns PIF RAM");
                        break;
                    }

                    if !self.controller_command(channel, cmd_start, rx_start, rx_len) {
                        self.ram[i + 1] |= NO_DEVICE;
                    }
                    channel += 1;
                    i = rx_start + rx_len;
                }
            }
        }
    }

    /// Returns false if there is no device to respond.
    fn controller_command(
        &mut self,
        channel: usize,
        cmd_start: usize,
        rx_start: usize,
        rx_len: usize,
    ) -> bool {
        if channel != 0 {
            return false;
        }
        let (response, response_len) = match self.ram[cmd_start] {
            // Info / reset: standard controller, nothing in the pak slot
            0x00 | 0xFF => ([0x05, 0x00, 0x02, 0x00], 3),
            0x01 => {
                let [hi, lo] = self.buttons.to_be_bytes();
                ([hi, lo, self.stick.0 as u8, self.stick.1 as u8], 4)
            }
            cmd => {
                log::warn!("Unhandled joybus command 0x{cmd:02X}");
                return false;
            }
        };
        let len = rx_len.min(response_len);
        self.ram[rx_start..rx_start + len].copy_from_slice(&response[..len]);
        true
    }
}

impl Default for Pif {
    fn default() -> Self {
        Self {
            ram: [0; PIF_RAM_SIZE],
            buttons: 0,
            stick: (0, 0),
        }
    }
}
