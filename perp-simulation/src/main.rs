use anyhow::{bail, Context, Result};
use clap::Parser;
use perp_execution::{
    execute_instruction, reserve_value, ExecutionContext, ExecutionOutcome, FeeSchedule, InMemoryLedger,
    ReserveConfig, ReserveInstruction, ReserveState, TokenLedger,
};
use perp_genesis::{create_genesis_state, GenesisConfig};
use perp_types::fixed::PERC_ONE;
use perp_types::{Address, BondInstance};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

const DAY: u64 = 86_400;
const START_TIME: u64 = 1_700_000_000;
const FEE_TOKEN: Address = Address::from_byte(0xfe);

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Perpetual tranche reserve simulation runner")]
struct Args {
    /// Independent runs, executed in parallel.
    #[arg(long, default_value_t = 8)]
    runs: u64,
    /// Operations per run.
    #[arg(long, default_value_t = 2_000)]
    steps: usize,
    /// Run `i` is seeded with `seed + i`.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 16)]
    wallets: usize,
    /// Mint fee in 1e-8 units of 100%.
    #[arg(long, default_value_t = PERC_ONE / 200, allow_negative_numbers = true)]
    mint_fee_pct: i64,
    #[arg(long, default_value_t = -PERC_ONE / 400, allow_negative_numbers = true)]
    burn_fee_pct: i64,
    #[arg(long, default_value_t = PERC_ONE / 100, allow_negative_numbers = true)]
    rollover_reward_pct: i64,
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct RunReport {
    seed: u64,
    ok: u64,
    rejected: u64,
    minted: u64,
    burned: u64,
    /// Net fee token flow from users to the reserve, rollover rewards excluded.
    fees: i128,
    rewards: i128,
    remainder: u64,
    supply: u64,
    reserve_value: u64,
    bonds: usize,
    root: [u8; 32],
}

struct Sim {
    state: ReserveState,
    ledger: InMemoryLedger,
    wallets: Vec<Address>,
    now: u64,
    next_bond: u64,
    report: RunReport,
    mint_calls: u64,
}

impl Sim {
    fn new(args: &Args, seed: u64) -> Result<Self> {
        let wallets: Vec<Address> = (0..args.wallets as u64)
            .map(|i| Address::from_byte(0x51).derive("wallet", i))
            .collect();
        let reserve = ReserveConfig {
            fee_token: FEE_TOKEN,
            ..Default::default()
        };
        let mut balances: Vec<perp_genesis::GenesisBalance> = wallets
            .iter()
            .map(|w| perp_genesis::GenesisBalance {
                token: FEE_TOKEN,
                owner: *w,
                amount: 1_000_000,
            })
            .collect();
        balances.push(perp_genesis::GenesisBalance {
            token: FEE_TOKEN,
            owner: reserve.reserve,
            amount: 1_000_000,
        });
        let config = GenesisConfig {
            genesis_time: START_TIME,
            reserve,
            fees: FeeSchedule::Fixed {
                mint_fee_pct: args.mint_fee_pct,
                burn_fee_pct: args.burn_fee_pct,
                rollover_reward_pct: args.rollover_reward_pct,
            },
            balances,
            ..Default::default()
        };
        let (state, ledger) = create_genesis_state(&config)?;
        let mut sim = Sim {
            state,
            ledger,
            wallets,
            now: START_TIME,
            next_bond: 1,
            report: RunReport {
                seed,
                ..Default::default()
            },
            mint_calls: 0,
        };
        if let Some(bond) = sim.state.mintable_bond().cloned() {
            sim.fund(&bond)?;
        }
        Ok(sim)
    }

    /// Gives every wallet a stack of each tranche of `bond`.
    fn fund(&mut self, bond: &BondInstance) -> Result<()> {
        for w in &self.wallets {
            for t in &bond.tranches {
                self.ledger.mint(&t.address, w, 100_000)?;
            }
        }
        Ok(())
    }

    fn run(&mut self, caller: &Address, ix: ReserveInstruction) -> Option<ExecutionOutcome> {
        let mut ctx = ExecutionContext {
            state: &mut self.state,
            ledger: &mut self.ledger,
            timestamp: self.now,
        };
        match execute_instruction(&ix, caller, &mut ctx) {
            Ok(outcome) => {
                self.report.ok += 1;
                Some(outcome)
            }
            Err(_) => {
                self.report.rejected += 1;
                None
            }
        }
    }

    fn step(&mut self, rng: &mut StdRng) -> Result<()> {
        let caller = self.wallets[rng.gen_range(0..self.wallets.len())];
        match rng.gen_range(0..100) {
            0..=39 => {
                let Some(bond) = self.state.mintable_bond() else {
                    return Ok(());
                };
                let tranche = bond.tranches[rng.gen_range(0..bond.tranches.len())].address;
                let amount = rng.gen_range(1..2_000);
                if let Some(ExecutionOutcome::Minted(m)) = self.run(&caller, ReserveInstruction::Deposit { tranche, amount }) {
                    self.report.minted += m.minted;
                    self.report.fees += m.fee;
                    self.mint_calls += 1;
                }
            }
            40..=69 => {
                let held = self.ledger.balance_of(&self.state.config.perp_token, &caller);
                if held == 0 {
                    return Ok(());
                }
                let amount = rng.gen_range(1..=held);
                if let Some(ExecutionOutcome::Burned(b)) = self.run(&caller, ReserveInstruction::Redeem { amount }) {
                    self.report.burned += b.burned;
                    self.report.fees += b.fee;
                    self.report.remainder += b.remainder;
                }
            }
            70..=84 => {
                let Some(bond) = self.state.mintable_bond() else {
                    return Ok(());
                };
                let tail = bond.address;
                let tranche_in = bond.tranches[rng.gen_range(0..bond.tranches.len())].address;
                let reserve = self.state.config.reserve;
                let candidates: Vec<Address> = self
                    .state
                    .reserve_tranches()
                    .into_iter()
                    .filter(|t| self.state.positions.get(t).is_some_and(|p| p.bond != tail))
                    .filter(|t| self.ledger.balance_of(t, &reserve) > 0)
                    .collect();
                if candidates.is_empty() {
                    return Ok(());
                }
                let tranche_out = candidates[rng.gen_range(0..candidates.len())];
                let amount = rng.gen_range(1..2_000);
                let ix = ReserveInstruction::Rollover {
                    tranche_in,
                    tranche_out,
                    amount,
                };
                if let Some(ExecutionOutcome::RolledOver(r)) = self.run(&caller, ix) {
                    self.report.rewards += r.reward;
                }
            }
            85..=94 => {
                self.now += rng.gen_range(0..2 * DAY);
                self.run(&caller, ReserveInstruction::AdvanceBurnBond);
            }
            _ => {
                let tail_maturity = self.state.mintable_bond().map(|b| b.maturity).unwrap_or(self.now);
                let maturity = tail_maturity.max(self.now + 14 * DAY) + rng.gen_range(DAY..14 * DAY);
                let collateral = Address::from_byte(0xc0);
                let ratios = [200, 800];
                let bond = BondInstance::issue(
                    Address::from_byte(0xb0).derive("bond", self.next_bond),
                    collateral,
                    maturity,
                    &ratios,
                )?;
                self.next_bond += 1;
                let ix = ReserveInstruction::AdvanceMintBond { bond: bond.clone() };
                if self.run(&caller, ix).is_some() {
                    self.fund(&bond)?;
                }
            }
        }
        self.check()
    }

    fn check(&self) -> Result<()> {
        let perp = self.state.config.perp_token;
        let supply = self.ledger.total_supply(&perp);
        let net = self.report.minted.saturating_sub(self.report.burned);
        if supply > net {
            bail!("seed {}: perp supply {} exceeds minted minus burned {}", self.report.seed, supply, net);
        }
        // Each positive fee can lose at most one unit to truncation.
        if self.state.fees.schedule() != &FeeSchedule::default() && self.report.fees + (self.mint_calls as i128) < 0 {
            bail!("seed {}: fees paid out net {}", self.report.seed, self.report.fees);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<RunReport> {
        self.report.supply = self.ledger.total_supply(&self.state.config.perp_token);
        self.report.reserve_value = reserve_value(&self.state, &self.ledger)?;
        self.report.bonds = self.state.bonds.len();
        self.report.root = self.state.state_root();
        Ok(self.report)
    }
}

fn run_once(args: &Args, seed: u64) -> Result<RunReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sim = Sim::new(args, seed).with_context(|| format!("seed {seed}: genesis"))?;
    for _ in 0..args.steps {
        sim.step(&mut rng)?;
    }
    if sim.report.remainder > 0 {
        warn!(seed, remainder = sim.report.remainder, "redemptions left unmet");
    }
    sim.finish()
}

fn run_simulation(args: &Args) -> Result<Vec<RunReport>> {
    (0..args.runs)
        .into_par_iter()
        .map(|i| run_once(args, args.seed.wrapping_add(i)))
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(args.log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let start = Instant::now();
    let reports = run_simulation(&args)?;
    let elapsed = start.elapsed();

    println!("=== Perp reserve simulation ===");
    println!("runs: {}  steps/run: {}  elapsed: {:.2?}", args.runs, args.steps, elapsed);
    for r in &reports {
        println!(
            "seed {:>6}  ok {:>6}  rejected {:>6}  minted {:>10}  burned {:>10}  supply {:>10}  value {:>10}  fees {:>8}  rewards {:>8}  bonds {:>3}  root {}",
            r.seed,
            r.ok,
            r.rejected,
            r.minted,
            r.burned,
            r.supply,
            r.reserve_value,
            r.fees,
            r.rewards,
            r.bonds,
            &hex::encode(r.root)[..16],
        );
    }
    println!("all invariants held");
    Ok(())
}
