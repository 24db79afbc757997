// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// 8-bit general purpose I/O port.
///
/// Firmware writes the output latch and the data direction register through
/// the owning block's registers. The embedder drives input pins and observes
/// outputs through this object.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Port {
    data: u8,
    /// 1 = output
    direction: u8,
    pins: u8,
    write_count: u64,
}

impl Port {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_data(&mut self, value: u8) {
        self.data = value;
        self.write_count += 1;
    }

    /// Output latch as last written by firmware.
    pub fn data(&self) -> u8 {
        self.data
    }

    pub fn set_direction(&mut self, value: u8) {
        self.direction = value;
    }

    pub fn direction(&self) -> u8 {
        self.direction
    }

    /// Drive the externally connected pins. Only input bits are visible to firmware.
    pub fn set_pins(&mut self, value: u8) {
        self.pins = value;
    }

    /// Firmware view: output bits come from the latch, input bits from the pins.
    pub fn read(&self) -> u8 {
        (self.data & self.direction) | (self.pins & !self.direction)
    }

    /// Levels currently driven by the MCU.
    pub fn outputs(&self) -> u8 {
        self.data & self.direction
    }

    /// Number of latch writes, so embedders can detect changes cheaply.
    pub fn write_count(&self) -> u64 {
        self.write_count
    }
}
