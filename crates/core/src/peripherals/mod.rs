// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod gpt;
pub mod port;
pub mod qsm;
pub mod sim;

pub use gpt::Gpt;
pub use port::Port;
pub use qsm::Qsm;
pub use sim::Sim;

/// Byte of a big-endian 16-bit register selected by the low address bit.
pub(crate) fn byte_lane(reg: u16, addr: u32) -> u8 {
    if addr & 1 == 0 {
        (reg >> 8) as u8
    } else {
        (reg & 0xFF) as u8
    }
}

/// Replace one byte lane of a 16-bit register.
pub(crate) fn with_byte_lane(reg: u16, addr: u32, value: u8) -> u16 {
    if addr & 1 == 0 {
        (reg & 0x00FF) | ((value as u16) << 8)
    } else {
        (reg & 0xFF00) | value as u16
    }
}
