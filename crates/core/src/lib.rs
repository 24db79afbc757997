// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod cpu;
pub mod hooks;
pub mod interrupt;
pub mod machine;
pub mod memory;
pub mod peripherals;
pub mod signals;

use std::path::PathBuf;

mod tests;

pub use cpu::{CoreHost, CoreRegister, Disassembly, ExecutionCore, CPU_STATE_SIZE};
pub use hooks::{Hooks, IllegalInstructionAction};
pub use interrupt::{InterruptAck, InterruptController, AUTOVECTOR};
pub use machine::Mc68k;
pub use mc68k_config::CpuModel;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Illegal instruction {opcode:#06x} at {pc:#x}")]
    IllegalInstruction { opcode: u32, pc: u32 },
    #[error("Failed to write disassembly to {path:?}")]
    Dump {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait representing an on-chip peripheral module decoded from peripheral space.
///
/// Addresses handed to a block are already masked into peripheral space, so a
/// block compares them against its own absolute register window.
pub trait PeripheralBlock: std::fmt::Debug + Send {
    fn name(&self) -> &'static str;

    fn is_in_range(&self, addr: u32) -> bool;

    /// Reads take `&mut self` because some registers clear status on read.
    fn read8(&mut self, addr: u32) -> u8;
    fn write8(&mut self, addr: u32, value: u8);

    fn read16(&mut self, addr: u32) -> u16 {
        let hi = self.read8(addr) as u16;
        let lo = self.read8(addr.wrapping_add(1)) as u16;
        // Big Endian
        (hi << 8) | lo
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.write8(addr, (value >> 8) as u8);
        self.write8(addr.wrapping_add(1), (value & 0xFF) as u8);
    }

    /// Advance internal time by `cycles` CPU cycles. Blocks raise interrupts
    /// through `irq` and have no other path back into the system.
    fn advance(&mut self, cycles: u32, irq: &mut InterruptController);

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
