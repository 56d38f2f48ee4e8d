//! Tranche price strategies consulted for rollover value equivalence and
//! the deviation ratio.

use perp_types::fixed::PERC_ONE;
use perp_types::{Address, ClassId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PRICE_DECIMALS: u32 = 8;

/// Where a tranche sits: its bond, class and seniority.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TranchePosition {
    pub tranche: Address,
    pub bond: Address,
    pub class: ClassId,
    pub seniority: usize,
    pub maturity: u64,
}

pub trait PriceStrategy {
    /// Fixed-point decimals of the values returned by [`Self::price`].
    fn decimals(&self) -> u32;

    fn price(&self, position: &TranchePosition) -> u64;

    fn unit_price(&self) -> u64 {
        10u64.pow(self.decimals())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingConfig {
    /// Every tranche at par.
    #[default]
    Unit,
    /// Operator-set prices; unlisted tranches are at par.
    Table { prices: BTreeMap<Address, u64> },
    /// Par less a per-seniority discount in `PERC_ONE` units. Seniorities
    /// past the end of the list take the last entry.
    SeniorityDiscount { discounts: Vec<u64> },
}

impl PriceStrategy for PricingConfig {
    fn decimals(&self) -> u32 {
        PRICE_DECIMALS
    }

    fn price(&self, position: &TranchePosition) -> u64 {
        let par = self.unit_price();
        match self {
            PricingConfig::Unit => par,
            PricingConfig::Table { prices } => prices.get(&position.tranche).copied().unwrap_or(par),
            PricingConfig::SeniorityDiscount { discounts } => {
                let discount = discounts
                    .get(position.seniority)
                    .or(discounts.last())
                    .copied()
                    .unwrap_or(0)
                    .min(PERC_ONE as u64);
                (par as u128 * (PERC_ONE as u64 - discount) as u128 / PERC_ONE as u128) as u64
            }
        }
    }
}
