// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame-striping workload plan.
//!
//! Producers own residue classes of the frame ID modulo `stride`; the plan
//! records who owns what and validates incoming frames against it.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::LoadBalancing;
use crate::readout::FrameReadout;

#[derive(Debug, Error, PartialEq)]
pub enum WorkloadError {
    #[error("workload is missing its master identity")]
    MissingMaster,

    #[error("more producers ({producers}) than stride ({stride})")]
    TooManyProducers { producers: usize, stride: usize },

    #[error("producer '{uuid}' defines {got} slots, stride is {stride}")]
    BadSlotVector { uuid: String, got: usize, stride: usize },

    #[error("slot {slot} mod[{stride}] is owned by both '{first}' and '{second}'")]
    SlotConflict { slot: usize, stride: usize, first: String, second: String },

    #[error("no producer owns slot {slot} mod[{stride}]")]
    SlotUnassigned { slot: usize, stride: usize },

    #[error("frame has no producer identity")]
    EmptyProducer,

    #[error("unknown producer '{0}'")]
    UnknownProducer(String),

    #[error("producer '{uuid}' is not meant to produce slot {slot} mod[{stride}]")]
    UnownedSlot { uuid: String, slot: usize, stride: usize },
}

/// Assignment of frame slots to producers.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadBalance {
    pub fps: f64,
    pub stride: usize,
    /// Identity of the master's local producer.
    pub master_uuid: String,
    /// Producer identity to slot presence vector (length == stride).
    pub ids_by_uuid: HashMap<String, Vec<bool>>,
}

impl WorkloadBalance {
    /// Degenerate plan for a node with no slaves.
    pub fn single_node(fps: f64) -> Self {
        Self {
            fps,
            stride: 1,
            master_uuid: "single-node".to_string(),
            ids_by_uuid: HashMap::from([("single-node".to_string(), vec![true])]),
        }
    }

    /// Rebuild the plan from a propagated [`LoadBalancing`] descriptor.
    ///
    /// Only meaningful on the master, whose own identity is the descriptor's
    /// `self_uuid`.
    pub fn from_load_balancing(lb: &LoadBalancing, fps: f64) -> Result<Self, WorkloadError> {
        let stride = lb.assignments.len();
        let mut ids_by_uuid: HashMap<String, Vec<bool>> = HashMap::new();
        for (slot, uuid) in &lb.assignments {
            let slot = usize::try_from(*slot)
                .ok()
                .filter(|s| *s < stride)
                .ok_or(WorkloadError::SlotUnassigned { slot: stride, stride })?;
            ids_by_uuid.entry(uuid.clone()).or_insert_with(|| vec![false; stride])[slot] = true;
        }
        let wb = Self { fps, stride, master_uuid: lb.self_uuid.clone(), ids_by_uuid };
        wb.check()?;
        Ok(wb)
    }

    /// Slot of a frame ID under this plan.
    pub fn frame_slot(&self, frame_id: i64) -> usize {
        frame_id.rem_euclid(self.stride as i64) as usize
    }

    /// Validate plan consistency. Run once before merging starts.
    pub fn check(&self) -> Result<(), WorkloadError> {
        if self.master_uuid.is_empty() {
            return Err(WorkloadError::MissingMaster);
        }
        if self.ids_by_uuid.len() > self.stride {
            return Err(WorkloadError::TooManyProducers {
                producers: self.ids_by_uuid.len(),
                stride: self.stride,
            });
        }
        let mut owners: Vec<Option<&str>> = vec![None; self.stride];
        for (uuid, slots) in &self.ids_by_uuid {
            if slots.len() != self.stride {
                return Err(WorkloadError::BadSlotVector {
                    uuid: uuid.clone(),
                    got: slots.len(),
                    stride: self.stride,
                });
            }
            for (slot, set) in slots.iter().enumerate() {
                if !set {
                    continue;
                }
                match owners[slot] {
                    Some(first) => {
                        // Deterministic ordering for the error message
                        let (first, second) = if first < uuid.as_str() {
                            (first.to_string(), uuid.clone())
                        } else {
                            (uuid.clone(), first.to_string())
                        };
                        return Err(WorkloadError::SlotConflict {
                            slot,
                            stride: self.stride,
                            first,
                            second,
                        });
                    }
                    None => owners[slot] = Some(uuid),
                }
            }
        }
        if let Some(slot) = owners.iter().position(Option::is_none) {
            return Err(WorkloadError::SlotUnassigned { slot, stride: self.stride });
        }
        Ok(())
    }

    /// Validate a frame against the plan before the merger accepts it.
    pub fn check_frame(&self, readout: &FrameReadout) -> Result<(), WorkloadError> {
        if readout.producer_uuid.is_empty() {
            return Err(WorkloadError::EmptyProducer);
        }
        let slots = self
            .ids_by_uuid
            .get(&readout.producer_uuid)
            .ok_or_else(|| WorkloadError::UnknownProducer(readout.producer_uuid.clone()))?;
        if self.stride == 1 {
            return Ok(());
        }
        let slot = self.frame_slot(readout.frame_id);
        if !slots.get(slot).copied().unwrap_or(false) {
            return Err(WorkloadError::UnownedSlot {
                uuid: readout.producer_uuid.clone(),
                slot,
                stride: self.stride,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod tests;
