use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use perp_execution::{
    deviation_ratio, execute_instruction, reserve_value, ClassLayout, ExecutionContext, InMemoryLedger,
    ReserveInstruction, ReserveState, TokenLedger,
};
use perp_types::{Address, BondInstance};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const DAY: u64 = 86_400;

#[derive(Parser)]
#[command(author, version, about = "Perpetual tranche reserve: local operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// JSON snapshot holding reserve state and ledger.
    #[arg(short, long, default_value = "perp-state.json")]
    state_path: PathBuf,
    /// Caller address for user operations.
    #[arg(short, long, default_value = "0x0101010101010101010101010101010101010101010101010101010101010101")]
    caller: Address,
    /// Unix time to execute at. Defaults to the wall clock.
    #[arg(long)]
    now: Option<u64>,
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh snapshot from a genesis config
    Init {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing snapshot
        #[arg(long)]
        force: bool,
    },
    /// Show queue, icebox and reserve figures
    Status,
    /// Issue a bond of the given class and make it the mintable bond
    EnqueueBond {
        #[arg(long)]
        address: Address,
        #[arg(long)]
        collateral: Address,
        /// Tranche ratios, most senior first, e.g. 200,800
        #[arg(long, value_delimiter = ',')]
        ratios: Vec<u32>,
        #[arg(long)]
        maturity_in_days: u64,
    },
    /// Dequeue stale bonds
    AdvanceBurn,
    /// Deposit a tranche of the mintable bond and mint perps
    Deposit {
        #[arg(long)]
        tranche: Address,
        #[arg(long)]
        amount: u64,
    },
    /// Burn perps for reserve tranches
    Redeem {
        #[arg(long)]
        amount: u64,
    },
    /// Swap a fresh tranche for an older one held in reserve
    Rollover {
        #[arg(long)]
        tranche_in: Address,
        #[arg(long)]
        tranche_out: Address,
        #[arg(long)]
        amount: u64,
    },
    /// Replace the yield row of a class
    SetYields {
        #[arg(long)]
        collateral: Address,
        #[arg(long, value_delimiter = ',')]
        ratios: Vec<u32>,
        /// Yield per seniority, 1_000_000 = 1.0
        #[arg(long, value_delimiter = ',')]
        rates: Vec<u64>,
    },
    /// Mint test tokens into the local ledger
    Faucet {
        #[arg(long)]
        token: Address,
        #[arg(long)]
        owner: Option<Address>,
        #[arg(long)]
        amount: u64,
    },
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    state: ReserveState,
    ledger: InMemoryLedger,
}

impl Snapshot {
    fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {} (run `init` first?)", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn execute(&mut self, ix: ReserveInstruction, caller: &Address, now: u64) -> Result<()> {
        let mut ctx = ExecutionContext {
            state: &mut self.state,
            ledger: &mut self.ledger,
            timestamp: now,
        };
        let outcome = execute_instruction(&ix, caller, &mut ctx)
            .with_context(|| format!("{} failed", instruction_name(&ix)))?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        Ok(())
    }
}

fn instruction_name(ix: &ReserveInstruction) -> &'static str {
    match ix {
        ReserveInstruction::AdvanceMintBond { .. } => "enqueue-bond",
        ReserveInstruction::AdvanceBurnBond => "advance-burn",
        ReserveInstruction::Deposit { .. } => "deposit",
        ReserveInstruction::Redeem { .. } => "redeem",
        ReserveInstruction::Rollover { .. } => "rollover",
        ReserveInstruction::SetYields { .. } => "set-yields",
        _ => "configuration",
    }
}

fn wall_clock() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

fn print_status(snapshot: &Snapshot, now: u64) -> Result<()> {
    let state = &snapshot.state;
    let ledger = &snapshot.ledger;
    let cfg = &state.config;

    println!("time:          {}", now);
    println!("state root:    0x{}", hex::encode(state.state_root()));
    println!("perp supply:   {}", ledger.total_supply(&cfg.perp_token));
    println!("reserve value: {}", reserve_value(state, ledger)?);
    println!("deviation:     {}", deviation_ratio(state, ledger)?);
    println!("fee pool:      {}", ledger.balance_of(&cfg.fee_token, &cfg.reserve));
    println!("queue ({}):", state.queue.len());
    for (i, addr) in state.queue.iter().enumerate() {
        let Some(bond) = state.bonds.get(addr) else {
            continue;
        };
        let marker = if Some(*addr) == state.queue.tail() { " [mintable]" } else { "" };
        let stale = state.advance.is_stale(bond.maturity, now, &state.window);
        println!(
            "  #{i} {addr} maturity={} stale={stale}{marker}",
            bond.maturity
        );
        for t in &bond.tranches {
            println!(
                "      tranche {} ratio={} yield={} reserve={}",
                t.address,
                t.ratio,
                state.yield_of_tranche(&t.address),
                ledger.balance_of(&t.address, &cfg.reserve)
            );
        }
    }
    println!("icebox ({}):", state.icebox.len());
    for t in state.icebox.iter() {
        println!("  {} reserve={}", t, ledger.balance_of(t, &cfg.reserve));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(cli.log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let now = match cli.now {
        Some(t) => t,
        None => wall_clock()?,
    };

    let mut snapshot = match &cli.command {
        Commands::Init { config, force } => {
            if cli.state_path.exists() && !force {
                bail!("{} already exists, pass --force to overwrite", cli.state_path.display());
            }
            let mut genesis = match config {
                Some(path) => perp_genesis::load_config(path)?,
                None => perp_genesis::GenesisConfig::default(),
            };
            if genesis.genesis_time == 0 {
                genesis.genesis_time = now;
            }
            let (state, ledger) = perp_genesis::create_genesis_state(&genesis)?;
            let snapshot = Snapshot { state, ledger };
            snapshot.save(&cli.state_path)?;
            info!(path = %cli.state_path.display(), "snapshot initialized");
            snapshot
        }
        _ => Snapshot::load(&cli.state_path)?,
    };

    match cli.command {
        Commands::Init { .. } | Commands::Status => return print_status(&snapshot, now),
        Commands::EnqueueBond {
            address,
            collateral,
            ratios,
            maturity_in_days,
        } => {
            let bond = BondInstance::issue(address, collateral, now.saturating_add(maturity_in_days.saturating_mul(DAY)), &ratios)?;
            for t in &bond.tranches {
                println!("tranche {} ratio={}", t.address, t.ratio);
            }
            snapshot.execute(ReserveInstruction::AdvanceMintBond { bond }, &cli.caller, now)?;
        }
        Commands::AdvanceBurn => snapshot.execute(ReserveInstruction::AdvanceBurnBond, &cli.caller, now)?,
        Commands::Deposit { tranche, amount } => {
            snapshot.execute(ReserveInstruction::Deposit { tranche, amount }, &cli.caller, now)?
        }
        Commands::Redeem { amount } => snapshot.execute(ReserveInstruction::Redeem { amount }, &cli.caller, now)?,
        Commands::Rollover {
            tranche_in,
            tranche_out,
            amount,
        } => snapshot.execute(
            ReserveInstruction::Rollover {
                tranche_in,
                tranche_out,
                amount,
            },
            &cli.caller,
            now,
        )?,
        Commands::SetYields {
            collateral,
            ratios,
            rates,
        } => snapshot.execute(
            ReserveInstruction::SetYields {
                layout: ClassLayout { collateral, ratios },
                rates,
            },
            &cli.caller,
            now,
        )?,
        Commands::Faucet { token, owner, amount } => {
            let owner = owner.unwrap_or(cli.caller);
            snapshot.ledger.mint(&token, &owner, amount)?;
            println!("{} now holds {} of {}", owner, snapshot.ledger.balance_of(&token, &owner), token);
        }
    }

    snapshot.save(&cli.state_path)?;
    Ok(())
}
