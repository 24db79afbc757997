// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use crate::cpu::{CoreHost, CoreRegister, Disassembly, ExecutionCore, StateBudget};
use crate::hooks::{Hooks, IllegalInstructionAction};
use crate::interrupt::{InterruptAck, InterruptController};
use crate::peripherals::{Gpt, Port, Qsm, Sim};
use crate::{PeripheralBlock, SimResult, SimulationError};
use mc68k_config::{CpuModel, ResetVector, SystemManifest};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, trace};

/// An MC68331-style microcontroller: execution core, interrupt controller and
/// peripheral bus stepped in lockstep.
pub struct Mc68k<C: ExecutionCore, T = Gpt, S = Sim, Q = Qsm> {
    core: C,
    bus: SystemBus<T, S, Q>,
    interrupts: InterruptController,
    hooks: Hooks,
    reset_vector: Option<ResetVector>,
    cycles: u64,
}

impl<C: ExecutionCore> Mc68k<C> {
    pub fn new(core: C) -> Self {
        Self::with_bus(core, SystemBus::new(), CpuModel::default())
    }

    pub fn from_config(core: C, manifest: &SystemManifest) -> anyhow::Result<Self> {
        let bus = SystemBus::from_config(manifest)?;
        let mut mcu = Self::with_bus(core, bus, manifest.cpu);
        mcu.reset_vector = manifest.reset;
        Ok(mcu)
    }

    pub fn gpt(&self) -> &Gpt {
        &self.bus.peripherals.timer
    }

    pub fn gpt_mut(&mut self) -> &mut Gpt {
        &mut self.bus.peripherals.timer
    }

    pub fn sim(&self) -> &Sim {
        &self.bus.peripherals.system
    }

    pub fn sim_mut(&mut self) -> &mut Sim {
        &mut self.bus.peripherals.system
    }

    pub fn qsm(&self) -> &Qsm {
        &self.bus.peripherals.serial
    }

    pub fn qsm_mut(&mut self) -> &mut Qsm {
        &mut self.bus.peripherals.serial
    }

    pub fn port_e(&mut self) -> &mut Port {
        self.sim_mut().port_e_mut()
    }

    pub fn port_f(&mut self) -> &mut Port {
        self.sim_mut().port_f_mut()
    }

    pub fn port_gp(&mut self) -> &mut Port {
        self.gpt_mut().port_gp_mut()
    }

    pub fn port_qs(&mut self) -> &mut Port {
        self.qsm_mut().port_qs_mut()
    }
}

impl<C, T, S, Q> Mc68k<C, T, S, Q>
where
    C: ExecutionCore,
    T: PeripheralBlock,
    S: PeripheralBlock,
    Q: PeripheralBlock,
{
    pub fn with_bus(mut core: C, bus: SystemBus<T, S, Q>, model: CpuModel) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = StateBudget::<C>::FITS;

        let interrupts = InterruptController::new();
        core.set_reg(CoreRegister::CpuType, model.code());
        core.connect_irq(interrupts.line());

        Self {
            core,
            bus,
            interrupts,
            hooks: Hooks::default(),
            reset_vector: None,
            cycles: 0,
        }
    }

    pub fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks = hooks;
    }

    pub fn set_reset_vector(&mut self, vector: Option<ResetVector>) {
        self.reset_vector = vector;
    }

    /// Execute one instruction and advance every peripheral by the cycles it took.
    pub fn exec(&mut self) -> SimResult<u32> {
        let pc = self.pc();
        let mut host = CoreBus::new(&mut self.bus, &mut self.interrupts, &mut self.hooks);
        let delta = self.core.execute(&mut host);
        let fault = host.fault;

        self.cycles += delta as u64;
        self.bus.peripherals.advance(delta, &mut self.interrupts);
        trace!("exec: {} cycles, total {}", delta, self.cycles);

        match fault {
            Some(opcode) => Err(SimulationError::IllegalInstruction { opcode, pc }),
            None => Ok(delta),
        }
    }

    /// Execute up to `max_steps` instructions; returns the cycles consumed.
    pub fn run(&mut self, max_steps: u64) -> SimResult<u64> {
        let start = self.cycles;
        for _ in 0..max_steps {
            self.exec()?;
        }
        Ok(self.cycles - start)
    }

    pub fn inject_interrupt(&mut self, vector: u8, level: u8) {
        self.interrupts.inject_interrupt(vector, level);
    }

    pub fn has_pending_interrupt(&self, vector: u8, level: u8) -> bool {
        self.interrupts.has_pending_interrupt(vector, level)
    }

    pub fn ipl(&self) -> u8 {
        self.interrupts.ipl()
    }

    pub fn reset(&mut self) {
        let mut host = CoreBus::new(&mut self.bus, &mut self.interrupts, &mut self.hooks);
        self.core.pulse_reset(&mut host);

        if let Some(vector) = self.reset_vector {
            self.core.set_reg(CoreRegister::Sp, vector.sp);
            self.core.set_reg(CoreRegister::Pc, vector.pc);
        }
        debug!("Reset, PC = {:#x}", self.pc());
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.core.set_reg(CoreRegister::Pc, pc);
    }

    pub fn pc(&self) -> u32 {
        self.core.reg(CoreRegister::Pc)
    }

    pub fn cpu_model(&self) -> Option<CpuModel> {
        CpuModel::from_code(self.core.reg(CoreRegister::CpuType))
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    pub fn bus(&self) -> &SystemBus<T, S, Q> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SystemBus<T, S, Q> {
        &mut self.bus
    }

    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    pub fn interrupts_mut(&mut self) -> &mut InterruptController {
        &mut self.interrupts
    }

    pub fn peek_peripheral(&self, name: &str) -> Option<serde_json::Value> {
        self.bus.peripherals.block(name).map(|p| p.snapshot())
    }

    pub fn disassemble(&mut self, pc: u32) -> Disassembly {
        let mut host = CoreBus::new(&mut self.bus, &mut self.interrupts, &mut self.hooks);
        self.core.disassemble(&mut host, pc)
    }

    /// Write a listing of `count` bytes starting at `first` to `path`.
    ///
    /// With `split_functions`, a blank line follows every return, branch-always
    /// and jump so basic blocks stand apart.
    pub fn dump_assembly(
        &mut self,
        path: impl AsRef<Path>,
        first: u32,
        count: u32,
        split_functions: bool,
    ) -> SimResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(dump_error(path))?;
        let mut out = BufWriter::new(file);

        let end = first as u64 + count as u64;
        let mut addr = first as u64;
        let mut lines = 0usize;
        while addr < end {
            let dis = self.disassemble(addr as u32);
            writeln!(out, "{:06x}: {}", addr, dis.text).map_err(dump_error(path))?;
            lines += 1;

            if split_functions && ends_basic_block(&dis.text) {
                writeln!(out).map_err(dump_error(path))?;
            }

            addr += dis.length.max(1) as u64;
        }

        out.flush().map_err(dump_error(path))?;
        debug!("Dumped {} instructions to {:?}", lines, path);
        Ok(())
    }
}

fn ends_basic_block(text: &str) -> bool {
    text.starts_with("rts") || text.starts_with("bra ") || text.starts_with("jmp ")
}

fn dump_error(path: &Path) -> impl Fn(std::io::Error) -> SimulationError + '_ {
    move |source| SimulationError::Dump {
        path: path.to_path_buf(),
        source,
    }
}

/// Host handed to the execution core for the duration of one call.
struct CoreBus<'a, T, S, Q> {
    bus: &'a mut SystemBus<T, S, Q>,
    interrupts: &'a mut InterruptController,
    hooks: &'a mut Hooks,
    fault: Option<u32>,
}

impl<'a, T, S, Q> CoreBus<'a, T, S, Q> {
    fn new(
        bus: &'a mut SystemBus<T, S, Q>,
        interrupts: &'a mut InterruptController,
        hooks: &'a mut Hooks,
    ) -> Self {
        Self {
            bus,
            interrupts,
            hooks,
            fault: None,
        }
    }
}

impl<T: PeripheralBlock, S: PeripheralBlock, Q: PeripheralBlock> CoreHost for CoreBus<'_, T, S, Q> {
    fn read8(&mut self, addr: u32) -> u8 {
        self.bus.read8(addr)
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.bus.read16(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.bus.write8(addr, value);
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.bus.write16(addr, value);
    }

    fn interrupt_ack(&mut self, level: u8) -> InterruptAck {
        self.interrupts.read_irq_user_vector(level)
    }

    fn illegal_instruction(&mut self, opcode: u32) -> u32 {
        match self.hooks.on_illegal_instruction(opcode) {
            IllegalInstructionAction::Resume(value) => {
                debug!("Illegal instruction {:#06x} resumed by hook", opcode);
                value
            }
            IllegalInstructionAction::Halt => {
                error!("Illegal instruction {:#06x}", opcode);
                if self.fault.is_none() {
                    self.fault = Some(opcode);
                }
                0
            }
        }
    }

    fn reset_instruction(&mut self) {
        debug!("RESET instruction");
        self.hooks.on_reset();
    }
}
