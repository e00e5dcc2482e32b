// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity job table.
//!
//! Allocation is a first-fit scan for an empty slot; lookup scans active
//! slots only, so a retired record whose jid field still matches can never
//! be resurrected. Slot order is not part of the external contract, but the
//! pump relies on it being stable within a tick.

use crate::job::Job;
use gn_core::Jid;

pub struct JobTable {
    slots: Vec<Job>,
}

impl JobTable {
    /// Build a table of `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Job::empty()).collect(),
        }
    }

    /// Reset every slot to the empty form.
    pub fn init(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    /// First-fit allocation. Returns the slot index, or `None` when full.
    ///
    /// The slot is cleared but not populated; the caller either finishes
    /// spawning into it or resets it.
    pub fn allocate(&mut self) -> Option<usize> {
        let idx = self.slots.iter().position(|slot| !slot.is_active())?;
        self.slots[idx].reset();
        Some(idx)
    }

    /// Find the active slot with the given jid.
    pub fn find(&mut self, jid: Jid) -> Option<&mut Job> {
        self.slots
            .iter_mut()
            .find(|slot| slot.is_active() && slot.jid == jid)
    }

    /// True iff an active slot carries the given jid.
    pub fn contains(&self, jid: Jid) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.is_active() && slot.jid == jid)
    }

    /// True iff any slot holds an active job.
    pub fn any_active(&self) -> bool {
        self.slots.iter().any(|slot| slot.is_active())
    }

    pub fn slots(&self) -> &[Job] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Job] {
        &mut self.slots
    }

    /// Jids of active jobs, in slot order.
    pub fn active_jids(&self) -> Vec<Jid> {
        self.slots
            .iter()
            .filter(|slot| slot.is_active())
            .map(|slot| slot.jid)
            .collect()
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
