use anyhow::{Context, Result};
use perp_execution::{
    execute_instruction, AdvancePolicy, ClassLayout, ExecutionContext, FeeSchedule, InMemoryLedger, PricingConfig,
    ReserveConfig, ReserveInstruction, ReserveState, TokenLedger,
};
use perp_types::{Address, BondInstance};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DAY: u64 = 86_400;

/// Operator address used to apply genesis configuration.
pub const GENESIS_OPERATOR: Address = Address::from_byte(0x00);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct YieldRow {
    pub layout: ClassLayout,
    pub rates: Vec<u64>,
}

/// First mintable bond. Maturity is relative to `genesis_time`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SeedBond {
    pub address: Address,
    pub maturity_in_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenesisBalance {
    pub token: Address,
    pub owner: Address,
    pub amount: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GenesisConfig {
    pub genesis_time: u64,
    pub reserve: ReserveConfig,
    pub min_maturity_secs: u64,
    pub max_maturity_secs: Option<u64>,
    pub advance: AdvancePolicy,
    pub mint_class: ClassLayout,
    pub yields: Vec<YieldRow>,
    pub fees: FeeSchedule,
    pub pricing: PricingConfig,
    pub seed_bond: Option<SeedBond>,
    pub balances: Vec<GenesisBalance>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        let mint_class = ClassLayout {
            collateral: Address::from_byte(0xc0),
            ratios: vec![200, 800],
        };
        Self {
            genesis_time: 0,
            reserve: ReserveConfig::default(),
            min_maturity_secs: 7 * DAY,
            max_maturity_secs: Some(90 * DAY),
            advance: AdvancePolicy::default(),
            yields: vec![YieldRow {
                layout: mint_class.clone(),
                rates: vec![1_000_000, 1_000_000],
            }],
            mint_class,
            fees: FeeSchedule::default(),
            pricing: PricingConfig::default(),
            seed_bond: Some(SeedBond {
                address: Address::from_byte(0xb0),
                maturity_in_secs: 28 * DAY,
            }),
            balances: Vec::new(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<GenesisConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading genesis config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing genesis config {}", path.display()))
}

/// Builds the initial reserve by replaying the configuration as privileged
/// instructions, so genesis goes through the same validation as runtime
/// changes.
pub fn create_genesis_state(config: &GenesisConfig) -> Result<(ReserveState, InMemoryLedger)> {
    let mut state = ReserveState::new(config.reserve.clone());
    let mut ledger = InMemoryLedger::new();

    for b in &config.balances {
        ledger
            .mint(&b.token, &b.owner, b.amount)
            .with_context(|| format!("seeding balance of {} for {}", b.token, b.owner))?;
    }

    let mut setup = vec![
        ReserveInstruction::SetMaturityWindow {
            min_secs: config.min_maturity_secs,
            max_secs: config.max_maturity_secs,
        },
        ReserveInstruction::SetAdvancePolicy { policy: config.advance },
        ReserveInstruction::SetMintClass {
            layout: config.mint_class.clone(),
        },
        ReserveInstruction::SetFeeSchedule {
            schedule: config.fees.clone(),
        },
        ReserveInstruction::SetPricing {
            pricing: config.pricing.clone(),
        },
    ];
    setup.extend(config.yields.iter().map(|row| ReserveInstruction::SetYields {
        layout: row.layout.clone(),
        rates: row.rates.clone(),
    }));
    if let Some(seed) = &config.seed_bond {
        let bond = BondInstance::issue(
            seed.address,
            config.mint_class.collateral,
            config.genesis_time.saturating_add(seed.maturity_in_secs),
            &config.mint_class.ratios,
        )
        .context("issuing seed bond")?;
        setup.push(ReserveInstruction::AdvanceMintBond { bond });
    }

    let mut ctx = ExecutionContext {
        state: &mut state,
        ledger: &mut ledger,
        timestamp: config.genesis_time,
    };
    for ix in &setup {
        execute_instruction(ix, &GENESIS_OPERATOR, &mut ctx).with_context(|| format!("applying {ix:?}"))?;
    }
    tracing::info!(bonds = state.queue.len(), time = config.genesis_time, "genesis state created");
    Ok((state, ledger))
}
