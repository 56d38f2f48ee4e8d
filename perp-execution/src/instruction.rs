use crate::classifier::ClassLayout;
use crate::fees::FeeSchedule;
use crate::pricing::PricingConfig;
use crate::state::AdvancePolicy;
use perp_types::{Address, BondInstance, ClassId};
use serde::{Deserialize, Serialize};

/// Every call the engine accepts. Configuration variants are privileged;
/// who may send them is decided by the host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ReserveInstruction {
    // ══════════════════════════════════════════════════════════════
    // Queue lifecycle
    // ══════════════════════════════════════════════════════════════
    AdvanceMintBond { bond: BondInstance },
    AdvanceBurnBond,

    // ══════════════════════════════════════════════════════════════
    // Mint / burn / rollover
    // ══════════════════════════════════════════════════════════════
    Deposit { tranche: Address, amount: u64 },
    Redeem { amount: u64 },
    Rollover {
        tranche_in: Address,
        tranche_out: Address,
        amount: u64,
    },

    // ══════════════════════════════════════════════════════════════
    // Configuration
    // ══════════════════════════════════════════════════════════════
    SetYields { layout: ClassLayout, rates: Vec<u64> },
    SetMintClass { layout: ClassLayout },
    SetMaturityWindow { min_secs: u64, max_secs: Option<u64> },
    SetAdvancePolicy { policy: AdvancePolicy },
    SetFeeSchedule { schedule: FeeSchedule },
    SetPricing { pricing: PricingConfig },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MintResult {
    pub tranche: Address,
    pub tranche_amount: u64,
    pub minted: u64,
    /// Positive is charged to the caller, negative paid to the caller.
    pub fee: i128,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RedeemedTranche {
    pub tranche: Address,
    pub amount: u64,
    /// Perp burned against this tranche.
    pub value: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BurnResult {
    pub requested: u64,
    pub burned: u64,
    pub fee: i128,
    pub redeemed: Vec<RedeemedTranche>,
    /// Part of the request the reserve could not cover.
    pub remainder: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RolloverResult {
    pub tranche_in: Address,
    pub tranche_out: Address,
    pub tranche_in_amount: u64,
    pub tranche_out_amount: u64,
    /// Perp-denominated value rolled.
    pub rollover_amount: u64,
    /// Positive is paid to the caller, negative charged to the caller.
    pub reward: i128,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdvanceMintResult {
    pub bond: Address,
    pub class: ClassId,
    pub previous_tail: Option<Address>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceBurnResult {
    pub dequeued: Vec<Address>,
    pub iceboxed: Vec<Address>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    AdvancedMint(AdvanceMintResult),
    AdvancedBurn(AdvanceBurnResult),
    Minted(MintResult),
    Burned(BurnResult),
    RolledOver(RolloverResult),
    Configured,
}
