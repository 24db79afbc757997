// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{byte_lane, with_byte_lane, Port};
use crate::interrupt::InterruptController;
use crate::PeripheralBlock;
use std::collections::VecDeque;

pub const QSM_BASE: u32 = 0xFF_FC00;
pub const QSM_SIZE: u32 = 0x200;

const QSMCR: u32 = 0x00;
const QILR_QIVR: u32 = 0x04;
const SCCR0: u32 = 0x08;
const SCCR1: u32 = 0x0A;
const SCSR: u32 = 0x0C;
const SCDR: u32 = 0x0E;
const PORTQS: u32 = 0x14;
const PQSPAR_DDRQS: u32 = 0x16;
const SPCR0: u32 = 0x18;
const QSPI_RAM: u32 = 0x100;
const QSPI_RAM_SIZE: usize = 0x50;

bitflags::bitflags! {
    /// SCI control register 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Sccr1: u16 {
        const TIE = 1 << 7;
        const TCIE = 1 << 6;
        const RIE = 1 << 5;
        const ILIE = 1 << 4;
        const TE = 1 << 3;
        const RE = 1 << 2;
    }
}

bitflags::bitflags! {
    /// SCI status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Scsr: u16 {
        const TDRE = 1 << 8;
        const TC = 1 << 7;
        const RDRF = 1 << 6;
        const RAF = 1 << 5;
        const IDLE = 1 << 4;
        const OR = 1 << 3;
    }
}

/// Queued Serial Module: SCI with a captured transmit stream, Port QS, and
/// QSPI control registers and RAM kept as plain storage.
#[derive(Debug)]
pub struct Qsm {
    qsmcr: u16,
    qilr: u8,
    qivr: u8,
    sccr0: u16,
    sccr1: Sccr1,
    scsr: Scsr,
    rx_data: u8,
    pqspar: u8,
    port_qs: Port,
    spcr: [u16; 4],
    qspi_ram: [u8; QSPI_RAM_SIZE],

    // SCI state
    tx_busy: bool,
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    total_cycles: u64,
}

impl Default for Qsm {
    fn default() -> Self {
        Self::new()
    }
}

impl Qsm {
    pub fn new() -> Self {
        Self {
            qsmcr: 0x0080,
            qilr: 0x00,
            qivr: 0x0F,
            sccr0: 0x0004,
            sccr1: Sccr1::empty(),
            scsr: Scsr::TDRE | Scsr::TC,
            rx_data: 0,
            pqspar: 0,
            port_qs: Port::new(),
            spcr: [0x0104, 0x0404, 0x0000, 0x0000],
            qspi_ram: [0; QSPI_RAM_SIZE],
            tx_busy: false,
            tx: Vec::new(),
            rx: VecDeque::new(),
            total_cycles: 0,
        }
    }

    pub fn port_qs(&self) -> &Port {
        &self.port_qs
    }

    pub fn port_qs_mut(&mut self) -> &mut Port {
        &mut self.port_qs
    }

    /// Queue a byte on the SCI receive line.
    pub fn push_rx(&mut self, byte: u8) {
        self.rx.push_back(byte);
    }

    /// Bytes transmitted by firmware so far.
    pub fn transmitted(&self) -> &[u8] {
        &self.tx
    }

    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn sci_level(&self) -> u8 {
        self.qilr & 0x7
    }

    /// SCI requests use the even vector of the QIVR pair.
    fn sci_vector(&self) -> u8 {
        self.qivr & 0xFE
    }

    fn request_sci(&self, irq: &mut InterruptController) {
        let level = self.sci_level();
        let vector = self.sci_vector();
        if level != 0 && !irq.has_pending_interrupt(vector, level) {
            irq.inject_interrupt(vector, level);
        }
    }

    fn transmit(&mut self, value: u8) {
        if !self.sccr1.contains(Sccr1::TE) {
            return;
        }
        self.tx.push(value);
        self.scsr.remove(Scsr::TDRE | Scsr::TC);
        self.tx_busy = true;
    }

    fn read_reg(&mut self, offset: u32) -> u16 {
        match offset {
            QSMCR => self.qsmcr,
            QILR_QIVR => ((self.qilr as u16) << 8) | self.qivr as u16,
            SCCR0 => self.sccr0,
            SCCR1 => self.sccr1.bits(),
            SCSR => self.scsr.bits(),
            SCDR => {
                self.scsr.remove(Scsr::RDRF);
                self.rx_data as u16
            }
            PORTQS => self.port_qs.read() as u16,
            PQSPAR_DDRQS => ((self.pqspar as u16) << 8) | self.port_qs.direction() as u16,
            o if (SPCR0..SPCR0 + 8).contains(&o) => self.spcr[((o - SPCR0) / 2) as usize],
            o if (QSPI_RAM..QSPI_RAM + QSPI_RAM_SIZE as u32).contains(&o) => {
                let i = (o - QSPI_RAM) as usize;
                ((self.qspi_ram[i] as u16) << 8) | self.qspi_ram[i + 1] as u16
            }
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u16) {
        match offset {
            QSMCR => self.qsmcr = value & 0xC08F,
            QILR_QIVR => {
                self.qilr = ((value >> 8) & 0x3F) as u8;
                self.qivr = (value & 0xFF) as u8;
            }
            SCCR0 => self.sccr0 = value & 0x1FFF,
            SCCR1 => self.sccr1 = Sccr1::from_bits_retain(value & 0x7FFF),
            SCSR => {} // flags clear through the data register
            SCDR => self.transmit((value & 0xFF) as u8),
            PORTQS => self.port_qs.write_data((value & 0xFF) as u8),
            PQSPAR_DDRQS => {
                self.pqspar = (value >> 8) as u8;
                self.port_qs.set_direction((value & 0xFF) as u8);
            }
            o if (SPCR0..SPCR0 + 8).contains(&o) => self.spcr[((o - SPCR0) / 2) as usize] = value,
            o if (QSPI_RAM..QSPI_RAM + QSPI_RAM_SIZE as u32).contains(&o) => {
                let i = (o - QSPI_RAM) as usize;
                self.qspi_ram[i] = (value >> 8) as u8;
                self.qspi_ram[i + 1] = (value & 0xFF) as u8;
            }
            _ => {}
        }
    }
}

impl PeripheralBlock for Qsm {
    fn name(&self) -> &'static str {
        "qsm"
    }

    fn is_in_range(&self, addr: u32) -> bool {
        (QSM_BASE..QSM_BASE + QSM_SIZE).contains(&addr)
    }

    fn read8(&mut self, addr: u32) -> u8 {
        let offset = addr.wrapping_sub(QSM_BASE) & !1;
        // The high byte of SCDR only carries the ninth data bit; reading it
        // must not consume the received byte.
        if offset == SCDR && addr & 1 == 0 {
            return 0;
        }
        byte_lane(self.read_reg(offset), addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        let offset = addr.wrapping_sub(QSM_BASE) & !1;
        match offset {
            SCDR if addr & 1 == 0 => {}
            SCDR => self.transmit(value),
            PORTQS if addr & 1 == 1 => self.port_qs.write_data(value),
            PORTQS => {}
            PQSPAR_DDRQS if addr & 1 == 0 => self.pqspar = value,
            PQSPAR_DDRQS => self.port_qs.set_direction(value),
            _ => {
                let reg = with_byte_lane(self.read_reg(offset), addr, value);
                self.write_reg(offset, reg);
            }
        }
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.read_reg(addr.wrapping_sub(QSM_BASE) & !1)
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.write_reg(addr.wrapping_sub(QSM_BASE) & !1, value);
    }

    fn advance(&mut self, cycles: u32, irq: &mut InterruptController) {
        self.total_cycles += cycles as u64;

        let mut request = false;

        if self.tx_busy {
            self.tx_busy = false;
            self.scsr.insert(Scsr::TDRE | Scsr::TC);
            request |= self.sccr1.intersects(Sccr1::TIE | Sccr1::TCIE);
        }

        if self.sccr1.contains(Sccr1::RE) && !self.scsr.contains(Scsr::RDRF) {
            if let Some(byte) = self.rx.pop_front() {
                self.rx_data = byte;
                self.scsr.insert(Scsr::RDRF);
                request |= self.sccr1.contains(Sccr1::RIE);
            }
        }

        if request {
            self.request_sci(irq);
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "qsmcr": self.qsmcr,
            "qilr": self.qilr,
            "qivr": self.qivr,
            "sccr0": self.sccr0,
            "sccr1": self.sccr1.bits(),
            "scsr": self.scsr.bits(),
            "port_qs": self.port_qs,
            "tx_len": self.tx.len(),
            "rx_pending": self.rx.len(),
        })
    }
}
