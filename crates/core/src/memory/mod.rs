// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// A simple flat memory storage
#[derive(Debug)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u32,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u32) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base_addr && ((addr - self.base_addr) as usize) < self.data.len()
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        if self.contains(addr) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        if self.contains(addr) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    /// Copy `bytes` in at `addr`. Nothing is written unless the whole image fits.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) -> bool {
        let end_addr = addr as u64 + bytes.len() as u64;
        let mem_end = self.base_addr as u64 + self.data.len() as u64;

        if addr >= self.base_addr && end_addr <= mem_end {
            let offset = (addr - self.base_addr) as usize;
            self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
            return true;
        }
        false
    }
}

/// Named ROM/RAM window on the system bus.
#[derive(Debug)]
pub struct MemoryRegion {
    pub name: String,
    pub read_only: bool,
    pub mem: LinearMemory,
}

impl MemoryRegion {
    pub fn new(name: impl Into<String>, base_addr: u32, size: usize, read_only: bool) -> Self {
        Self {
            name: name.into(),
            read_only,
            mem: LinearMemory::new(size, base_addr),
        }
    }

    pub fn base(&self) -> u32 {
        self.mem.base_addr
    }

    pub fn size(&self) -> usize {
        self.mem.data.len()
    }
}
