// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt;

/// What to do after the execution core reports an undecodable opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalInstructionAction {
    /// Stop: the current `exec()` returns `SimulationError::IllegalInstruction`.
    Halt,
    /// Hand this value back to the core and keep running.
    Resume(u32),
}

pub type ResetHook = Box<dyn FnMut() + Send>;
pub type IllegalInstructionHook = Box<dyn FnMut(u32) -> IllegalInstructionAction + Send>;

/// Embedder overrides for the execution core's callback surface.
#[derive(Default)]
pub struct Hooks {
    on_reset: Option<ResetHook>,
    on_illegal_instruction: Option<IllegalInstructionHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_reset(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_reset = Some(Box::new(hook));
        self
    }

    pub fn with_on_illegal_instruction(
        mut self,
        hook: impl FnMut(u32) -> IllegalInstructionAction + Send + 'static,
    ) -> Self {
        self.on_illegal_instruction = Some(Box::new(hook));
        self
    }

    /// RESET instruction executed by the core. No-op unless overridden.
    pub fn on_reset(&mut self) {
        if let Some(hook) = &mut self.on_reset {
            hook();
        }
    }

    pub fn on_illegal_instruction(&mut self, opcode: u32) -> IllegalInstructionAction {
        match &mut self.on_illegal_instruction {
            Some(hook) => hook(opcode),
            None => IllegalInstructionAction::Halt,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_reset", &self.on_reset.is_some())
            .field(
                "on_illegal_instruction",
                &self.on_illegal_instruction.is_some(),
            )
            .finish()
    }
}
