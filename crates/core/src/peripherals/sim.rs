// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{byte_lane, with_byte_lane, Port};
use crate::interrupt::InterruptController;
use crate::PeripheralBlock;

pub const SIM_BASE: u32 = 0xFF_FA00;
pub const SIM_SIZE: u32 = 0x80;

const SIMCR: u32 = 0x00;
const SYNCR: u32 = 0x04;
const RSR: u32 = 0x06;
const PORTE0: u32 = 0x10;
const PORTE1: u32 = 0x12;
const DDRE: u32 = 0x14;
const PEPAR: u32 = 0x16;
const PORTF0: u32 = 0x18;
const PORTF1: u32 = 0x1A;
const DDRF: u32 = 0x1C;
const PFPAR: u32 = 0x1E;
const SYPCR: u32 = 0x20;
const PICR: u32 = 0x22;
const PITR: u32 = 0x24;
const SWSR: u32 = 0x26;

/// CPU cycles per PIT count with a 32.768 kHz reference and a 16.78 MHz system clock.
pub const PIT_CYCLES_PER_COUNT: u32 = 2048;
/// Extra prescaler selected by PITR.PTP.
const PIT_PTP_PRESCALE: u32 = 512;
const PITR_PTP: u16 = 1 << 8;

/// Reset status: power-on reset.
const RSR_POW: u16 = 0x0080;

/// System Integration Module: configuration registers, Ports E/F and the
/// periodic interrupt timer.
#[derive(Debug, serde::Serialize)]
pub struct Sim {
    simcr: u16,
    syncr: u16,
    sypcr: u16,
    picr: u16,
    pitr: u16,
    pepar: u8,
    pfpar: u8,
    port_e: Port,
    port_f: Port,

    // PIT state
    pit_counter: u8,
    pit_acc: u32,
    pit_expirations: u64,
    total_cycles: u64,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Sim {
    pub fn new() -> Self {
        Self {
            simcr: 0x00CF,
            syncr: 0x3F00,
            sypcr: 0x0000,
            picr: 0x000F,
            pitr: 0x0000,
            pepar: 0xFF,
            pfpar: 0x00,
            port_e: Port::new(),
            port_f: Port::new(),
            pit_counter: 0,
            pit_acc: 0,
            pit_expirations: 0,
            total_cycles: 0,
        }
    }

    pub fn port_e(&self) -> &Port {
        &self.port_e
    }

    pub fn port_e_mut(&mut self) -> &mut Port {
        &mut self.port_e
    }

    pub fn port_f(&self) -> &Port {
        &self.port_f
    }

    pub fn port_f_mut(&mut self) -> &mut Port {
        &mut self.port_f
    }

    pub fn pit_expirations(&self) -> u64 {
        self.pit_expirations
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn pit_modulus(&self) -> u8 {
        (self.pitr & 0xFF) as u8
    }

    fn pit_period(&self) -> u32 {
        if self.pitr & PITR_PTP != 0 {
            PIT_CYCLES_PER_COUNT * PIT_PTP_PRESCALE
        } else {
            PIT_CYCLES_PER_COUNT
        }
    }

    fn pit_level(&self) -> u8 {
        ((self.picr >> 8) & 0x7) as u8
    }

    fn pit_vector(&self) -> u8 {
        (self.picr & 0xFF) as u8
    }

    fn read_reg(&self, offset: u32) -> u16 {
        match offset {
            SIMCR => self.simcr,
            SYNCR => self.syncr,
            RSR => RSR_POW,
            PORTE0 | PORTE1 => self.port_e.read() as u16,
            DDRE => self.port_e.direction() as u16,
            PEPAR => self.pepar as u16,
            PORTF0 | PORTF1 => self.port_f.read() as u16,
            DDRF => self.port_f.direction() as u16,
            PFPAR => self.pfpar as u16,
            SYPCR => self.sypcr,
            PICR => self.picr,
            PITR => self.pitr,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u16) {
        let lo = (value & 0xFF) as u8;
        match offset {
            SIMCR => self.simcr = value,
            // Synthesizer lock (SLOCK) always reads back as locked.
            SYNCR => self.syncr = (value & 0xFF87) | 0x0008,
            PORTE0 | PORTE1 => self.port_e.write_data(lo),
            DDRE => self.port_e.set_direction(lo),
            PEPAR => self.pepar = lo,
            PORTF0 | PORTF1 => self.port_f.write_data(lo),
            DDRF => self.port_f.set_direction(lo),
            PFPAR => self.pfpar = lo,
            SYPCR => self.sypcr = value & 0xFF,
            PICR => self.picr = value & 0x07FF,
            PITR => {
                self.pitr = value & 0x01FF;
                self.pit_counter = self.pit_modulus();
                self.pit_acc = 0;
            }
            SWSR => {} // watchdog service sequence is not modelled
            _ => {}
        }
    }
}

impl PeripheralBlock for Sim {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn is_in_range(&self, addr: u32) -> bool {
        (SIM_BASE..SIM_BASE + SIM_SIZE).contains(&addr)
    }

    fn read8(&mut self, addr: u32) -> u8 {
        byte_lane(self.read_reg(addr.wrapping_sub(SIM_BASE) & !1), addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        let offset = addr.wrapping_sub(SIM_BASE) & !1;
        match offset {
            // Byte-wide port registers sit in the odd lane; the even byte is unused.
            PORTE0 | PORTE1 | DDRE | PEPAR | PORTF0 | PORTF1 | DDRF | PFPAR => {
                if addr & 1 == 1 {
                    self.write_reg(offset, value as u16);
                }
            }
            _ => {
                let reg = with_byte_lane(self.read_reg(offset), addr, value);
                self.write_reg(offset, reg);
            }
        }
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.read_reg(addr.wrapping_sub(SIM_BASE) & !1)
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.write_reg(addr.wrapping_sub(SIM_BASE) & !1, value);
    }

    fn advance(&mut self, cycles: u32, irq: &mut InterruptController) {
        self.total_cycles += cycles as u64;

        if self.pit_modulus() == 0 {
            return;
        }

        let period = self.pit_period();
        self.pit_acc += cycles;
        while self.pit_acc >= period {
            self.pit_acc -= period;
            self.pit_counter = self.pit_counter.saturating_sub(1);
            if self.pit_counter > 0 {
                continue;
            }

            self.pit_counter = self.pit_modulus();
            self.pit_expirations += 1;

            let level = self.pit_level();
            let vector = self.pit_vector();
            if level != 0 && !irq.has_pending_interrupt(vector, level) {
                irq.inject_interrupt(vector, level);
            }
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
