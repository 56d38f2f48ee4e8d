pub mod classifier;
pub mod engine;
pub mod fees;
pub mod instruction;
pub mod ledger;
pub mod pricing;
pub mod state;
pub mod yields;

pub use classifier::{class_of, classify, seniority_of, ClassLayout, TrancheData};
pub use engine::{deviation_ratio, reserve_value, tranche_value, ReserveEngine};
pub use fees::{DeviationRange, FeePolicy, FeeSchedule};
pub use instruction::{
    AdvanceBurnResult, AdvanceMintResult, BurnResult, ExecutionOutcome, MintResult, RedeemedTranche, ReserveInstruction,
    RolloverResult,
};
pub use ledger::{commit, InMemoryLedger, LedgerOp, StagedLedger, TokenLedger};
pub use pricing::{PriceStrategy, PricingConfig, TranchePosition, PRICE_DECIMALS};
pub use state::{AdvancePolicy, BurnAdvanceMode, Icebox, MaturityBoundary, MaturityWindow, ReserveConfig, ReserveState};
pub use yields::YieldTable;

use perp_types::{Address, Result};
use tracing::debug;

pub struct ExecutionContext<'a, L: TokenLedger + ?Sized> {
    pub state: &'a mut ReserveState,
    pub ledger: &'a mut L,
    pub timestamp: u64,
}

/// Runs one instruction all-or-nothing. The engine works on a copy of the
/// state and a staged view of the ledger; both are written back only if
/// the instruction succeeds.
pub fn execute_instruction<L: TokenLedger + ?Sized>(
    ix: &ReserveInstruction,
    caller: &Address,
    ctx: &mut ExecutionContext<'_, L>,
) -> Result<ExecutionOutcome> {
    let mut next = ctx.state.clone();
    let (outcome, ops) = {
        let mut staged = StagedLedger::new(&*ctx.ledger);
        let outcome = ReserveEngine::new(&mut next, &mut staged, ctx.timestamp).execute(ix, caller)?;
        (outcome, staged.into_ops())
    };
    commit(&ops, ctx.ledger)?;
    *ctx.state = next;
    debug!(ops = ops.len(), timestamp = ctx.timestamp, "instruction committed");
    Ok(outcome)
}

#[cfg(test)]
mod tests;
