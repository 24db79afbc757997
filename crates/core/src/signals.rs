// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// The three IPL input pins of the CPU, shared between the interrupt
/// controller (driver) and the execution core (sampler).
///
/// The core samples the level at each instruction-fetch boundary, so a level
/// driven between two steps is always seen by the next instruction.
#[derive(Debug, Clone, Default)]
pub struct IplLine {
    level: Arc<AtomicU8>,
}

impl IplLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, level: u8) {
        self.level.store(level & 0x7, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.set(0);
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::SeqCst)
    }
}
