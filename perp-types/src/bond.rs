use crate::address::Address;
use crate::error::{ReserveError, Result};
use serde::{Deserialize, Serialize};

/// Tranche ratios across one bond always sum to this.
pub const TRANCHE_RATIO_GRANULARITY: u32 = 1000;

/// One seniority-ranked slice of a bond. Seniority is the position in
/// [`BondInstance::tranches`], most senior first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tranche {
    pub address: Address,
    pub ratio: u32,
}

/// A fixed-maturity bond as created by the external issuer. Immutable once
/// issued.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BondInstance {
    pub address: Address,
    pub collateral: Address,
    pub maturity: u64,
    pub tranches: Vec<Tranche>,
}

impl BondInstance {
    /// Builds a bond whose tranche tokens are derived from the bond address.
    pub fn issue(address: Address, collateral: Address, maturity: u64, ratios: &[u32]) -> Result<Self> {
        let tranches = ratios
            .iter()
            .enumerate()
            .map(|(i, &ratio)| Tranche {
                address: address.derive("tranche", i as u64),
                ratio,
            })
            .collect();
        let bond = Self {
            address,
            collateral,
            maturity,
            tranches,
        };
        bond.validate()?;
        Ok(bond)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tranches.is_empty() {
            return Err(ReserveError::InvalidBond("bond has no tranches"));
        }
        let total: u64 = self.tranches.iter().map(|t| t.ratio as u64).sum();
        if total != TRANCHE_RATIO_GRANULARITY as u64 {
            return Err(ReserveError::InvalidBond("tranche ratios must sum to 1000"));
        }
        for (i, t) in self.tranches.iter().enumerate() {
            if self.tranches[..i].iter().any(|o| o.address == t.address) {
                return Err(ReserveError::InvalidBond("duplicate tranche address"));
            }
        }
        Ok(())
    }

    pub fn contains_tranche(&self, tranche: &Address) -> bool {
        self.tranches.iter().any(|t| &t.address == tranche)
    }
}
