// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::IplLine;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Raw acknowledge value meaning "no user vector, take the autovector".
pub const AUTOVECTOR: u32 = 0xFFFF_FFFF;

/// Number of priority levels, including the unused level 0.
pub const LEVELS: usize = 8;

/// Outcome of an interrupt-acknowledge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAck {
    /// A peripheral supplied this vector number.
    Vector(u8),
    /// Nothing queued at the level; the core uses the level's autovector.
    Autovector,
}

impl InterruptAck {
    pub fn raw(self) -> u32 {
        match self {
            InterruptAck::Vector(v) => v as u32,
            InterruptAck::Autovector => AUTOVECTOR,
        }
    }
}

/// Priority-queued interrupt controller feeding the CPU's IPL pins.
///
/// Each level keeps a FIFO of pending vectors. Duplicates are queued
/// separately. The asserted IPL is always the highest non-empty level.
#[derive(Debug, Default)]
pub struct InterruptController {
    pending: [VecDeque<u8>; LEVELS],
    pin: IplLine,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the IPL pins, for connecting an execution core.
    pub fn line(&self) -> IplLine {
        self.pin.clone()
    }

    pub fn inject_interrupt(&mut self, vector: u8, level: u8) {
        let Some(queue) = self.pending.get_mut(level as usize) else {
            warn!(
                "Dropping interrupt vector {:#04x}: level {} out of range",
                vector, level
            );
            return;
        };
        queue.push_back(vector);
        debug!("IRQ inject vector {:#04x} level {}", vector, level);
        self.raise_ipl();
    }

    pub fn has_pending_interrupt(&self, vector: u8, level: u8) -> bool {
        self.pending
            .get(level as usize)
            .is_some_and(|queue| queue.contains(&vector))
    }

    /// Service an acknowledge cycle for `level`.
    pub fn read_irq_user_vector(&mut self, level: u8) -> InterruptAck {
        let Some(vector) = self
            .pending
            .get_mut(level as usize)
            .and_then(|queue| queue.pop_front())
        else {
            return InterruptAck::Autovector;
        };

        self.pin.clear();
        self.raise_ipl();

        debug!(
            "IRQ ack level {} -> vector {:#04x}, IPL now {}",
            level,
            vector,
            self.pin.level()
        );
        InterruptAck::Vector(vector)
    }

    /// Currently asserted priority level.
    pub fn ipl(&self) -> u8 {
        self.pin.level()
    }

    pub fn pending_count(&self, level: u8) -> usize {
        self.pending.get(level as usize).map_or(0, VecDeque::len)
    }

    fn raise_ipl(&self) {
        let level = (1..LEVELS)
            .rev()
            .find(|&l| !self.pending[l].is_empty())
            .unwrap_or(0);
        self.pin.set(level as u8);
    }
}
