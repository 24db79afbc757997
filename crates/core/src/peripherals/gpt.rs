// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{byte_lane, with_byte_lane, Port};
use crate::interrupt::InterruptController;
use crate::PeripheralBlock;

pub const GPT_BASE: u32 = 0xFF_F900;
pub const GPT_SIZE: u32 = 0x40;

const GPTMCR: u32 = 0x00;
const ICR: u32 = 0x04;
const DDRGP_PORTGP: u32 = 0x06;
const TCNT: u32 = 0x0A;
const TMSK: u32 = 0x20;
const TFLG: u32 = 0x22;

/// GPTMCR.STOP freezes the timer clock.
const MCR_STOP: u16 = 1 << 15;
/// TMSK2.TOI
const TMSK_TOI: u16 = 1 << 7;
const TMSK_CPR: u16 = 0x7;
/// TFLG2.TOF
const TFLG_TOF: u16 = 1 << 7;

/// Low nibble of the vector for a timer overflow request.
const TOF_SOURCE: u8 = 0x9;

/// General Purpose Timer: free-running TCNT with overflow interrupt and Port GP.
#[derive(Debug, serde::Serialize)]
pub struct Gpt {
    gptmcr: u16,
    icr: u16,
    tcnt: u16,
    tmsk: u16,
    tflg: u16,
    port_gp: Port,

    // Internal state
    prescaler_acc: u32,
    total_cycles: u64,
}

impl Default for Gpt {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpt {
    pub fn new() -> Self {
        Self {
            gptmcr: 0,
            icr: 0,
            tcnt: 0,
            tmsk: 0,
            tflg: 0,
            port_gp: Port::new(),
            prescaler_acc: 0,
            total_cycles: 0,
        }
    }

    pub fn port_gp(&self) -> &Port {
        &self.port_gp
    }

    pub fn port_gp_mut(&mut self) -> &mut Port {
        &mut self.port_gp
    }

    pub fn counter(&self) -> u16 {
        self.tcnt
    }

    /// Total CPU cycles this block has been advanced by.
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn irq_level(&self) -> u8 {
        ((self.icr >> 8) & 0x7) as u8
    }

    fn vector(&self, source: u8) -> u8 {
        (self.icr & 0xF0) as u8 | source
    }

    /// CPU cycles per TCNT increment, or `None` when clocked externally.
    fn divider(&self) -> Option<u32> {
        match self.tmsk & TMSK_CPR {
            7 => None,
            cpr => Some(4 << cpr),
        }
    }

    fn read_reg(&self, offset: u32) -> u16 {
        match offset {
            GPTMCR => self.gptmcr,
            ICR => self.icr,
            DDRGP_PORTGP => ((self.port_gp.direction() as u16) << 8) | self.port_gp.read() as u16,
            TCNT => self.tcnt,
            TMSK => self.tmsk,
            TFLG => self.tflg,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u16) {
        match offset {
            GPTMCR => self.gptmcr = value & 0xC08F,
            ICR => self.icr = value & 0xF7F0,
            DDRGP_PORTGP => {
                self.port_gp.set_direction((value >> 8) as u8);
                self.port_gp.write_data((value & 0xFF) as u8);
            }
            TCNT => {} // read-only
            TMSK => self.tmsk = value,
            // Flags are cleared by writing 0; writing 1 leaves them as they are.
            TFLG => self.tflg &= value,
            _ => {}
        }
    }

    fn request_overflow(&self, irq: &mut InterruptController) {
        let level = self.irq_level();
        if level == 0 {
            return;
        }
        let vector = self.vector(TOF_SOURCE);
        if !irq.has_pending_interrupt(vector, level) {
            irq.inject_interrupt(vector, level);
        }
    }
}

impl PeripheralBlock for Gpt {
    fn name(&self) -> &'static str {
        "gpt"
    }

    fn is_in_range(&self, addr: u32) -> bool {
        (GPT_BASE..GPT_BASE + GPT_SIZE).contains(&addr)
    }

    fn read8(&mut self, addr: u32) -> u8 {
        byte_lane(self.read_reg(addr.wrapping_sub(GPT_BASE) & !1), addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        let offset = addr.wrapping_sub(GPT_BASE) & !1;
        match offset {
            // Port GP: DDRGP and PORTGP are independent byte registers.
            DDRGP_PORTGP if addr & 1 == 0 => self.port_gp.set_direction(value),
            DDRGP_PORTGP => self.port_gp.write_data(value),
            // A byte write to TFLG only clears flags in its own lane.
            TFLG => self.write_reg(offset, with_byte_lane(0xFFFF, addr, value)),
            _ => {
                let reg = with_byte_lane(self.read_reg(offset), addr, value);
                self.write_reg(offset, reg);
            }
        }
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.read_reg(addr.wrapping_sub(GPT_BASE) & !1)
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.write_reg(addr.wrapping_sub(GPT_BASE) & !1, value);
    }

    fn advance(&mut self, cycles: u32, irq: &mut InterruptController) {
        self.total_cycles += cycles as u64;

        if self.gptmcr & MCR_STOP != 0 {
            return;
        }
        let Some(divider) = self.divider() else {
            return;
        };

        self.prescaler_acc += cycles;
        let ticks = self.prescaler_acc / divider;
        self.prescaler_acc %= divider;
        if ticks == 0 {
            return;
        }

        let next = self.tcnt as u32 + ticks;
        self.tcnt = (next & 0xFFFF) as u16;
        if next > 0xFFFF {
            self.tflg |= TFLG_TOF;
            if self.tmsk & TMSK_TOI != 0 {
                self.request_overflow(irq);
            }
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
