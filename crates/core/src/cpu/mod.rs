// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Boundary to the instruction decode/execute engine.
//!
//! The engine itself lives outside this crate. It sees memory, the interrupt
//! acknowledge cycle, and its other callbacks only through the [`CoreHost`]
//! passed into each call, so the host always resolves to the machine that is
//! currently stepping.

use crate::interrupt::InterruptAck;
use crate::signals::IplLine;

/// Upper bound, in bytes, for an execution core's internal state.
pub const CPU_STATE_SIZE: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreRegister {
    Pc,
    Sp,
    Sr,
    /// CPU model selector, see [`mc68k_config::CpuModel::code`].
    CpuType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disassembly {
    pub text: String,
    /// Encoded length in bytes. Zero if the engine could not decode anything.
    pub length: u32,
}

/// Callback surface the execution core calls back into while it runs.
pub trait CoreHost {
    fn read8(&mut self, addr: u32) -> u8;
    fn read16(&mut self, addr: u32) -> u16;
    fn write8(&mut self, addr: u32, value: u8);
    fn write16(&mut self, addr: u32, value: u16);

    fn read32(&mut self, addr: u32) -> u32 {
        let hi = self.read16(addr) as u32;
        let lo = self.read16(addr.wrapping_add(2)) as u32;
        (hi << 16) | lo
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.write16(addr, (value >> 16) as u16);
        self.write16(addr.wrapping_add(2), (value & 0xFFFF) as u16);
    }

    /// Instruction-stream fetch.
    fn read_imm16(&mut self, addr: u32) -> u16 {
        self.read16(addr)
    }

    /// Interrupt acknowledge cycle for `level`.
    fn interrupt_ack(&mut self, level: u8) -> InterruptAck;

    /// The core hit an opcode it cannot decode. The return value is handed
    /// back to the core's illegal-instruction path.
    fn illegal_instruction(&mut self, opcode: u32) -> u32;

    /// The core executed a RESET instruction.
    fn reset_instruction(&mut self);
}

/// Trait representing the opaque 680x0 execution engine.
pub trait ExecutionCore: Send + Sized {
    /// Size of the engine's internal state, checked against [`CPU_STATE_SIZE`]
    /// when a machine is built around it.
    const STATE_SIZE: usize = std::mem::size_of::<Self>();

    /// Attach the IPL pins. The core samples them at instruction boundaries.
    fn connect_irq(&mut self, line: IplLine);

    /// Execute exactly one instruction and return the cycles it consumed.
    fn execute(&mut self, host: &mut dyn CoreHost) -> u32;

    /// Pulse the RESET line: reload SSP/PC from the vector table.
    fn pulse_reset(&mut self, host: &mut dyn CoreHost);

    fn reg(&self, reg: CoreRegister) -> u32;
    fn set_reg(&mut self, reg: CoreRegister, value: u32);

    fn disassemble(&self, host: &mut dyn CoreHost, pc: u32) -> Disassembly;
}

pub(crate) struct StateBudget<C>(std::marker::PhantomData<C>);

impl<C: ExecutionCore> StateBudget<C> {
    pub(crate) const FITS: () = assert!(
        C::STATE_SIZE <= CPU_STATE_SIZE,
        "execution core state does not fit CPU_STATE_SIZE"
    );
}
