use crate::classifier::ClassLayout;
use perp_types::{ClassId, ReserveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per class, per seniority conversion rate from tranche units to perp
/// units, scaled by `YIELD_ONE`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct YieldTable {
    rows: BTreeMap<ClassId, Vec<u64>>,
}

impl YieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole row for the layout's class.
    pub fn set_yields(&mut self, layout: &ClassLayout, rates: Vec<u64>) -> Result<ClassId> {
        let class = layout.class_id();
        if rates.len() != layout.count() {
            return Err(ReserveError::YieldRowLengthMismatch {
                class,
                expected: layout.count(),
                got: rates.len(),
            });
        }
        self.rows.insert(class, rates);
        Ok(class)
    }

    /// Zero for anything not configured.
    pub fn yield_of(&self, class: &ClassId, seniority: usize) -> u64 {
        self.rows
            .get(class)
            .and_then(|row| row.get(seniority))
            .copied()
            .unwrap_or(0)
    }

    pub fn row(&self, class: &ClassId) -> Option<&[u64]> {
        self.rows.get(class).map(Vec::as_slice)
    }
}
