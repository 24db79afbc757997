// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::interrupt::InterruptController;
use crate::memory::MemoryRegion;
use crate::peripherals::{Gpt, Qsm, Sim};
use crate::PeripheralBlock;
use anyhow::Context;
use mc68k_config::{SystemManifest, DEFAULT_PERIPHERAL_MASK};
use tracing::{trace, warn};

/// Dispatches masked peripheral-space accesses to the three on-chip blocks.
///
/// Ranges are tested in a fixed order (timer, system integration, serial
/// queue) and the first match wins. Addresses no block claims read as zero
/// and swallow writes.
#[derive(Debug)]
pub struct PeripheralRouter<T = Gpt, S = Sim, Q = Qsm> {
    pub mask: u32,
    pub timer: T,
    pub system: S,
    pub serial: Q,
}

impl Default for PeripheralRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralRouter {
    pub fn new() -> Self {
        Self::with_blocks(DEFAULT_PERIPHERAL_MASK, Gpt::new(), Sim::new(), Qsm::new())
    }
}

impl<T: PeripheralBlock, S: PeripheralBlock, Q: PeripheralBlock> PeripheralRouter<T, S, Q> {
    pub fn with_blocks(mask: u32, timer: T, system: S, serial: Q) -> Self {
        Self {
            mask,
            timer,
            system,
            serial,
        }
    }

    fn route(&mut self, addr: u32) -> Option<&mut dyn PeripheralBlock> {
        let addr = addr & self.mask;
        if self.timer.is_in_range(addr) {
            Some(&mut self.timer)
        } else if self.system.is_in_range(addr) {
            Some(&mut self.system)
        } else if self.serial.is_in_range(addr) {
            Some(&mut self.serial)
        } else {
            None
        }
    }

    /// Name of the block that would handle `addr`, if any.
    pub fn claimant(&self, addr: u32) -> Option<&'static str> {
        let addr = addr & self.mask;
        if self.timer.is_in_range(addr) {
            Some(self.timer.name())
        } else if self.system.is_in_range(addr) {
            Some(self.system.name())
        } else if self.serial.is_in_range(addr) {
            Some(self.serial.name())
        } else {
            None
        }
    }

    pub fn read8(&mut self, addr: u32) -> u8 {
        let masked = addr & self.mask;
        match self.route(addr) {
            Some(block) => block.read8(masked),
            None => {
                trace!("Unmapped peripheral read8 at {:#x}", addr);
                0
            }
        }
    }

    pub fn read16(&mut self, addr: u32) -> u16 {
        let masked = addr & self.mask;
        match self.route(addr) {
            Some(block) => block.read16(masked),
            None => {
                trace!("Unmapped peripheral read16 at {:#x}", addr);
                0
            }
        }
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        let masked = addr & self.mask;
        match self.route(addr) {
            Some(block) => block.write8(masked, value),
            None => trace!("Unmapped peripheral write8 at {:#x} <- {:#04x}", addr, value),
        }
    }

    pub fn write16(&mut self, addr: u32, value: u16) {
        let masked = addr & self.mask;
        match self.route(addr) {
            Some(block) => block.write16(masked, value),
            None => trace!("Unmapped peripheral write16 at {:#x} <- {:#06x}", addr, value),
        }
    }

    /// Advance all blocks by the same cycle delta, timer first.
    pub fn advance(&mut self, cycles: u32, irq: &mut InterruptController) {
        self.timer.advance(cycles, irq);
        self.system.advance(cycles, irq);
        self.serial.advance(cycles, irq);
    }

    pub fn block(&self, name: &str) -> Option<&dyn PeripheralBlock> {
        if self.timer.name() == name {
            Some(&self.timer)
        } else if self.system.name() == name {
            Some(&self.system)
        } else if self.serial.name() == name {
            Some(&self.serial)
        } else {
            None
        }
    }
}

/// What the execution core sees as memory: ROM/RAM regions in front of the
/// peripheral router.
#[derive(Debug)]
pub struct SystemBus<T = Gpt, S = Sim, Q = Qsm> {
    pub regions: Vec<MemoryRegion>,
    pub peripherals: PeripheralRouter<T, S, Q>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::with_router(PeripheralRouter::new())
    }

    pub fn from_config(manifest: &SystemManifest) -> anyhow::Result<Self> {
        let mut bus = Self::with_router(PeripheralRouter::with_blocks(
            manifest.peripheral_mask,
            Gpt::new(),
            Sim::new(),
            Qsm::new(),
        ));

        for m in &manifest.memory {
            let size = m.size_bytes()?;
            let size = usize::try_from(size)
                .with_context(|| format!("Memory region '{}' is too large", m.id))?;
            bus.add_region(MemoryRegion::new(m.id.clone(), m.base, size, m.read_only));
        }

        Ok(bus)
    }
}

impl<T: PeripheralBlock, S: PeripheralBlock, Q: PeripheralBlock> SystemBus<T, S, Q> {
    pub fn with_router(peripherals: PeripheralRouter<T, S, Q>) -> Self {
        Self {
            regions: Vec::new(),
            peripherals,
        }
    }

    pub fn add_region(&mut self, region: MemoryRegion) {
        self.regions.push(region);
    }

    pub fn region(&self, name: &str) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Copy an image into whichever region contains it, ignoring read-only
    /// protection. Returns false if no single region holds the whole image.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) -> bool {
        for region in &mut self.regions {
            if region.mem.load(addr, bytes) {
                return true;
            }
        }
        warn!(
            "Failed to load {} bytes at {:#x} - outside of memory map",
            bytes.len(),
            addr
        );
        false
    }

    pub fn read8(&mut self, addr: u32) -> u8 {
        for region in &self.regions {
            if let Some(val) = region.mem.read_u8(addr) {
                return val;
            }
        }
        self.peripherals.read8(addr)
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        if let Some(region) = self.regions.iter_mut().find(|r| r.mem.contains(addr)) {
            if region.read_only {
                warn!("Discarding write to read-only '{}' at {:#x}", region.name, addr);
            } else {
                region.mem.write_u8(addr, value);
            }
            return;
        }
        self.peripherals.write8(addr, value);
    }

    pub fn read16(&mut self, addr: u32) -> u16 {
        if self.word_touches_memory(addr) {
            let hi = self.read8(addr) as u16;
            let lo = self.read8(addr.wrapping_add(1)) as u16;
            return (hi << 8) | lo;
        }
        self.peripherals.read16(addr)
    }

    pub fn write16(&mut self, addr: u32, value: u16) {
        if self.word_touches_memory(addr) {
            self.write8(addr, (value >> 8) as u8);
            self.write8(addr.wrapping_add(1), (value & 0xFF) as u8);
            return;
        }
        self.peripherals.write16(addr, value);
    }

    pub fn read32(&mut self, addr: u32) -> u32 {
        let hi = self.read16(addr) as u32;
        let lo = self.read16(addr.wrapping_add(2)) as u32;
        (hi << 16) | lo
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        self.write16(addr, (value >> 16) as u16);
        self.write16(addr.wrapping_add(2), (value & 0xFFFF) as u16);
    }

    /// Which memory region or peripheral block claims `addr`.
    pub fn describe(&self, addr: u32) -> Option<&str> {
        self.regions
            .iter()
            .find(|r| r.mem.contains(addr))
            .map(|r| r.name.as_str())
            .or_else(|| self.peripherals.claimant(addr))
    }

    fn in_memory(&self, addr: u32) -> bool {
        self.regions.iter().any(|r| r.mem.contains(addr))
    }

    /// A word that straddles a region edge is split into byte accesses, each
    /// resolved on its own.
    fn word_touches_memory(&self, addr: u32) -> bool {
        self.in_memory(addr) || self.in_memory(addr.wrapping_add(1))
    }
}
