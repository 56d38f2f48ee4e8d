//! Tranche layout extraction and class identity.

use perp_types::{Address, BondInstance, ClassId, ReserveError, Result};
use serde::{Deserialize, Serialize};

/// The structural signature shared by interchangeable bonds: collateral
/// token and ordered tranche ratios.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    pub collateral: Address,
    pub ratios: Vec<u32>,
}

impl ClassLayout {
    pub fn count(&self) -> usize {
        self.ratios.len()
    }

    /// Order-sensitive: `[200, 800]` and `[800, 200]` are different classes.
    pub fn class_id(&self) -> ClassId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"perp.tranche-class.v1");
        hasher.update(self.collateral.as_bytes());
        hasher.update(&(self.ratios.len() as u32).to_le_bytes());
        for r in &self.ratios {
            hasher.update(&r.to_le_bytes());
        }
        ClassId(*hasher.finalize().as_bytes())
    }
}

/// A bond's layout plus its tranche token addresses, seniority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrancheData {
    pub layout: ClassLayout,
    pub tranches: Vec<Address>,
}

impl TrancheData {
    pub fn count(&self) -> usize {
        self.tranches.len()
    }

    pub fn class_id(&self) -> ClassId {
        self.layout.class_id()
    }
}

pub fn classify(bond: &BondInstance) -> TrancheData {
    let mut ratios = Vec::with_capacity(bond.tranches.len());
    let mut tranches = Vec::with_capacity(bond.tranches.len());
    for t in &bond.tranches {
        ratios.push(t.ratio);
        tranches.push(t.address);
    }
    TrancheData {
        layout: ClassLayout {
            collateral: bond.collateral,
            ratios,
        },
        tranches,
    }
}

pub fn class_of(bond: &BondInstance) -> ClassId {
    classify(bond).class_id()
}

pub fn seniority_of(data: &TrancheData, tranche: &Address) -> Result<usize> {
    data.tranches
        .iter()
        .position(|t| t == tranche)
        .ok_or(ReserveError::TrancheNotFound(*tranche))
}
