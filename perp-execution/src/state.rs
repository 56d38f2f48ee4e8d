use crate::fees::FeePolicy;
use crate::pricing::{PricingConfig, TranchePosition};
use crate::yields::YieldTable;
use perp_types::fixed::DR_ONE;
use perp_types::{Address, BondInstance, BondQueue, ClassId, ReserveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Token addresses the engine works with.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReserveConfig {
    /// Account that holds reserve tranches and the fee/reward pool.
    pub reserve: Address,
    pub perp_token: Address,
    pub fee_token: Address,
    /// Target collateralization in `DR_ONE` units.
    pub target_ratio: i64,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        Self {
            reserve: Address::from_byte(0xee),
            perp_token: Address::from_byte(0xaa),
            fee_token: Address::from_byte(0xaa),
            target_ratio: DR_ONE,
        }
    }
}

/// Seconds-from-now bounds a mintable bond's maturity must fall in.
/// `min_secs` is the tolerable maturity window: once a queued bond matures
/// within it, it is stale.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaturityWindow {
    pub min_secs: u64,
    pub max_secs: Option<u64>,
}

impl MaturityWindow {
    pub fn new(min_secs: u64, max_secs: Option<u64>) -> Result<Self> {
        if let Some(max) = max_secs {
            if max < min_secs {
                return Err(ReserveError::InvalidMaturityWindow {
                    min_secs,
                    max_secs: max,
                });
            }
        }
        Ok(Self { min_secs, max_secs })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaturityBoundary {
    /// Stale at `maturity <= now + min_secs`.
    #[default]
    Inclusive,
    /// Stale at `maturity < now + min_secs`.
    Exclusive,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BurnAdvanceMode {
    /// Dequeue until the head is fresh or the queue is empty.
    #[default]
    UntilFresh,
    /// Dequeue at most one bond per call.
    SingleHead,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvancePolicy {
    pub boundary: MaturityBoundary,
    pub burn_mode: BurnAdvanceMode,
}

impl AdvancePolicy {
    /// Acceptance for minting is the exact complement, so a bond is never
    /// both mintable and stale.
    pub fn is_stale(&self, maturity: u64, now: u64, window: &MaturityWindow) -> bool {
        let threshold = now.saturating_add(window.min_secs);
        match self.boundary {
            MaturityBoundary::Inclusive => maturity <= threshold,
            MaturityBoundary::Exclusive => maturity < threshold,
        }
    }
}

/// Tranches dequeued with a residual balance. Redeemable and rollable,
/// never mintable. Iterates in insertion order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Icebox {
    order: Vec<Address>,
    members: BTreeSet<Address>,
}

impl Icebox {
    pub fn insert(&mut self, tranche: Address) -> bool {
        if !self.members.insert(tranche) {
            return false;
        }
        self.order.push(tranche);
        true
    }

    pub fn remove(&mut self, tranche: &Address) -> bool {
        if !self.members.remove(tranche) {
            return false;
        }
        self.order.retain(|t| t != tranche);
        true
    }

    pub fn contains(&self, tranche: &Address) -> bool {
        self.members.contains(tranche)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> + '_ {
        self.order.iter()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ReserveState {
    pub config: ReserveConfig,
    pub window: MaturityWindow,
    pub advance: AdvancePolicy,
    pub mint_class: Option<ClassId>,
    pub yields: YieldTable,
    pub fees: FeePolicy,
    pub pricing: PricingConfig,
    pub queue: BondQueue,
    /// Queued bonds only. A record is dropped when its bond is dequeued.
    pub bonds: BTreeMap<Address, BondInstance>,
    /// Tranches of queued bonds plus iced tranches not yet drained.
    pub positions: BTreeMap<Address, TranchePosition>,
    pub icebox: Icebox,
    /// Bonds that were dequeued. They may never be queued again.
    #[serde(default)]
    pub retired: BTreeSet<Address>,
}

impl ReserveState {
    pub fn new(config: ReserveConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// The tail bond, the only one accepting deposits.
    pub fn mintable_bond(&self) -> Option<&BondInstance> {
        self.queue.tail().and_then(|addr| self.bonds.get(&addr))
    }

    pub fn position(&self, tranche: &Address) -> Result<&TranchePosition> {
        self.positions
            .get(tranche)
            .ok_or(ReserveError::UnknownTranche(*tranche))
    }

    pub fn yield_of_tranche(&self, tranche: &Address) -> u64 {
        self.positions
            .get(tranche)
            .map(|p| self.yields.yield_of(&p.class, p.seniority))
            .unwrap_or(0)
    }

    /// Candidate reserve tranches in redemption order: icebox first, then
    /// queued bonds head to tail, each bond most senior first. Balances are
    /// not checked here.
    pub fn reserve_tranches(&self) -> Vec<Address> {
        let mut out: Vec<Address> = self.icebox.iter().copied().collect();
        for bond in self.queue.iter().filter_map(|b| self.bonds.get(b)) {
            out.extend(bond.tranches.iter().map(|t| t.address));
        }
        out
    }

    /// Forgets a dequeued bond. Tranches already in the icebox keep their
    /// position until [`Self::release_iced`] drops them.
    pub fn retire_bond(&mut self, bond: &Address) {
        if let Some(record) = self.bonds.remove(bond) {
            for t in &record.tranches {
                if !self.icebox.contains(&t.address) {
                    self.positions.remove(&t.address);
                }
            }
        }
        self.retired.insert(*bond);
    }

    /// Drops a drained tranche from the icebox along with its position.
    /// Tranches of queued bonds are left alone.
    pub fn release_iced(&mut self, tranche: &Address) {
        if self.icebox.remove(tranche) {
            self.positions.remove(tranche);
        }
    }

    /// blake3 over the bincode encoding.
    pub fn state_root(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        match bincode::serialize(self) {
            Ok(bytes) => {
                hasher.update(&bytes);
            }
            Err(e) => {
                tracing::error!("state serialization failed: {}", e);
            }
        }
        *hasher.finalize().as_bytes()
    }
}
