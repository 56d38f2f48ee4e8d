//! Reserve lifecycle and accounting.
//!
//! `ReserveEngine` mutates whatever state and ledger it is given directly.
//! Use [`crate::execute_instruction`] to get all-or-nothing calls.

use crate::classifier::{class_of, classify, seniority_of, ClassLayout};
use crate::fees::{DeviationRange, FeePolicy, FeeSchedule};
use crate::instruction::{
    AdvanceBurnResult, AdvanceMintResult, BurnResult, ExecutionOutcome, MintResult, RedeemedTranche, ReserveInstruction,
    RolloverResult,
};
use crate::ledger::TokenLedger;
use crate::pricing::{PriceStrategy, PricingConfig, TranchePosition};
use crate::state::{AdvancePolicy, BurnAdvanceMode, MaturityWindow, ReserveState};
use perp_types::fixed::{mul_div, to_amount, DR_ONE, YIELD_ONE};
use perp_types::{Address, BondInstance, ReserveError, Result};
use tracing::{debug, info, warn};

pub struct ReserveEngine<'a, L: TokenLedger + ?Sized> {
    state: &'a mut ReserveState,
    ledger: &'a mut L,
    now: u64,
}

impl<'a, L: TokenLedger + ?Sized> ReserveEngine<'a, L> {
    pub fn new(state: &'a mut ReserveState, ledger: &'a mut L, now: u64) -> Self {
        Self { state, ledger, now }
    }

    pub fn execute(&mut self, ix: &ReserveInstruction, caller: &Address) -> Result<ExecutionOutcome> {
        match ix {
            ReserveInstruction::AdvanceMintBond { bond } => {
                self.advance_mint_bond(bond.clone()).map(ExecutionOutcome::AdvancedMint)
            }
            ReserveInstruction::AdvanceBurnBond => self.advance_burn_bond().map(ExecutionOutcome::AdvancedBurn),
            ReserveInstruction::Deposit { tranche, amount } => {
                self.deposit(caller, tranche, *amount).map(ExecutionOutcome::Minted)
            }
            ReserveInstruction::Redeem { amount } => self.redeem(caller, *amount).map(ExecutionOutcome::Burned),
            ReserveInstruction::Rollover {
                tranche_in,
                tranche_out,
                amount,
            } => self
                .rollover(caller, tranche_in, tranche_out, *amount)
                .map(ExecutionOutcome::RolledOver),
            ReserveInstruction::SetYields { layout, rates } => {
                self.set_yields(layout, rates.clone())?;
                Ok(ExecutionOutcome::Configured)
            }
            ReserveInstruction::SetMintClass { layout } => {
                self.set_mint_class(layout);
                Ok(ExecutionOutcome::Configured)
            }
            ReserveInstruction::SetMaturityWindow { min_secs, max_secs } => {
                self.set_maturity_window(MaturityWindow::new(*min_secs, *max_secs)?);
                Ok(ExecutionOutcome::Configured)
            }
            ReserveInstruction::SetAdvancePolicy { policy } => {
                self.set_advance_policy(*policy);
                Ok(ExecutionOutcome::Configured)
            }
            ReserveInstruction::SetFeeSchedule { schedule } => {
                self.set_fee_schedule(schedule.clone())?;
                Ok(ExecutionOutcome::Configured)
            }
            ReserveInstruction::SetPricing { pricing } => {
                self.set_pricing(pricing.clone());
                Ok(ExecutionOutcome::Configured)
            }
        }
    }

    // ── queue lifecycle ────────────────────────────────────────────

    /// Enqueues `bond` as the new mintable tail.
    pub fn advance_mint_bond(&mut self, bond: BondInstance) -> Result<AdvanceMintResult> {
        bond.validate()?;
        if self.state.retired.contains(&bond.address) {
            return Err(ReserveError::BondRetired(bond.address));
        }
        let class = class_of(&bond);
        if self.state.mint_class != Some(class) {
            return Err(ReserveError::BondNotConfigured(bond.address));
        }

        let window = self.state.window;
        if self.state.advance.is_stale(bond.maturity, self.now, &window) {
            return Err(ReserveError::BondMaturesTooSoon {
                bond: bond.address,
                maturity: bond.maturity,
                threshold: self.now.saturating_add(window.min_secs),
            });
        }
        if let Some(max) = window.max_secs {
            let limit = self.now.saturating_add(max);
            if bond.maturity > limit {
                return Err(ReserveError::BondMaturesTooLate {
                    bond: bond.address,
                    maturity: bond.maturity,
                    limit,
                });
            }
        }

        let previous_tail = self.state.queue.tail();
        if let Some(tail) = previous_tail.and_then(|t| self.state.bonds.get(&t)) {
            if bond.maturity < tail.maturity {
                return Err(ReserveError::MaturityOutOfOrder {
                    bond: bond.address,
                    maturity: bond.maturity,
                    tail_maturity: tail.maturity,
                });
            }
        }
        for (seniority, t) in bond.tranches.iter().enumerate() {
            if let Some(p) = self.state.positions.get(&t.address) {
                if p.bond != bond.address || p.seniority != seniority {
                    return Err(ReserveError::InvalidBond("tranche registered to another bond"));
                }
            }
        }

        self.state.queue.enqueue(bond.address)?;
        for (seniority, t) in bond.tranches.iter().enumerate() {
            self.state.positions.insert(
                t.address,
                TranchePosition {
                    tranche: t.address,
                    bond: bond.address,
                    class,
                    seniority,
                    maturity: bond.maturity,
                },
            );
        }
        info!(
            bond = %bond.address,
            maturity = bond.maturity,
            queued = self.state.queue.len(),
            "mintable bond advanced"
        );
        let result = AdvanceMintResult {
            bond: bond.address,
            class,
            previous_tail,
        };
        self.state.bonds.insert(bond.address, bond);
        Ok(result)
    }

    /// Dequeues stale bonds from the head and ices their residual tranches.
    pub fn advance_burn_bond(&mut self) -> Result<AdvanceBurnResult> {
        let mut result = AdvanceBurnResult::default();
        let reserve = self.state.config.reserve;

        while let Some(head) = self.state.queue.head() {
            let bond = self.state.bonds.get(&head).ok_or(ReserveError::UnknownBond(head))?;
            if !self.state.advance.is_stale(bond.maturity, self.now, &self.state.window) {
                break;
            }
            let tranches: Vec<Address> = bond.tranches.iter().map(|t| t.address).collect();
            self.state.queue.dequeue()?;
            result.dequeued.push(head);

            for t in tranches {
                if self.ledger.balance_of(&t, &reserve) > 0 && self.state.icebox.insert(t) {
                    result.iceboxed.push(t);
                }
            }
            self.state.retire_bond(&head);
            if self.state.advance.burn_mode == BurnAdvanceMode::SingleHead {
                break;
            }
        }

        if !result.dequeued.is_empty() {
            info!(
                dequeued = result.dequeued.len(),
                iceboxed = result.iceboxed.len(),
                remaining = self.state.queue.len(),
                "stale bonds dequeued"
            );
        }
        Ok(result)
    }

    // ── mint / burn / rollover ─────────────────────────────────────

    pub fn deposit(&mut self, caller: &Address, tranche: &Address, amount: u64) -> Result<MintResult> {
        if amount == 0 {
            return Err(ReserveError::ZeroAmount);
        }
        let bond = self.state.mintable_bond().ok_or(ReserveError::NoMintableBond)?;
        let data = classify(bond);
        let seniority = seniority_of(&data, tranche).map_err(|_| ReserveError::TrancheNotMintable(*tranche))?;

        let rate = self.state.yields.yield_of(&data.class_id(), seniority);
        if rate == 0 {
            return Err(ReserveError::ZeroYield(*tranche));
        }
        let minted = mul_div(amount, rate, YIELD_ONE)?;
        if minted == 0 {
            return Err(ReserveError::NothingToMint);
        }

        let cfg = self.state.config.clone();
        let value_before = self.reserve_value()?;
        let supply_before = self.ledger.total_supply(&cfg.perp_token);
        let value_after = value_before
            .checked_add(self.tranche_value(tranche, amount)?)
            .ok_or(ReserveError::Overflow)?;
        let dr = DeviationRange {
            before: self.deviation_ratio_of(value_before, supply_before),
            after: self.deviation_ratio_of(value_after, supply_before.saturating_add(minted)),
        };
        let fee = self.state.fees.mint_fee(minted, dr)?;
        debug!(minted, %fee, dr_before = dr.before, dr_after = dr.after, "mint fee");

        self.ledger.transfer(tranche, caller, &cfg.reserve, amount)?;
        self.ledger.mint(&cfg.perp_token, caller, minted)?;
        self.settle(caller, fee)?;

        info!(caller = %caller, tranche = %tranche, amount, minted, %fee, "deposit");
        Ok(MintResult {
            tranche: *tranche,
            tranche_amount: amount,
            minted,
            fee,
        })
    }

    /// Burns up to `requested` perp against reserve tranches, icebox first.
    /// Whatever the reserve cannot cover comes back as `remainder`.
    pub fn redeem(&mut self, caller: &Address, requested: u64) -> Result<BurnResult> {
        if requested == 0 {
            return Ok(BurnResult::default());
        }
        let cfg = self.state.config.clone();
        let held = self.ledger.balance_of(&cfg.perp_token, caller);
        if held < requested {
            return Err(ReserveError::InsufficientBalance {
                token: cfg.perp_token,
                owner: *caller,
                needed: requested,
                available: held,
            });
        }

        let value_before = self.reserve_value()?;
        let supply_before = self.ledger.total_supply(&cfg.perp_token);

        let mut remaining = requested;
        let mut redeemed = Vec::new();
        let mut value_out: u64 = 0;
        for tranche in self.state.reserve_tranches() {
            if remaining == 0 {
                break;
            }
            let balance = self.ledger.balance_of(&tranche, &cfg.reserve);
            let rate = self.state.yield_of_tranche(&tranche);
            if balance == 0 || rate == 0 {
                continue;
            }
            let value = mul_div(balance, rate, YIELD_ONE)?;
            if value == 0 {
                continue;
            }
            let (amount, burnt) = if value <= remaining {
                (balance, value)
            } else {
                (mul_div(remaining, YIELD_ONE, rate)?, remaining)
            };
            if amount == 0 {
                continue;
            }
            debug!(tranche = %tranche, amount, burnt, "redeeming tranche");
            remaining -= burnt;
            value_out = value_out
                .checked_add(self.tranche_value(&tranche, amount)?)
                .ok_or(ReserveError::Overflow)?;
            redeemed.push(RedeemedTranche {
                tranche,
                amount,
                value: burnt,
            });
        }

        let burned = requested - remaining;
        let dr = DeviationRange {
            before: self.deviation_ratio_of(value_before, supply_before),
            after: self.deviation_ratio_of(value_before.saturating_sub(value_out), supply_before.saturating_sub(burned)),
        };
        let fee = self.state.fees.burn_fee(burned, dr)?;

        self.ledger.burn(&cfg.perp_token, caller, burned)?;
        for r in &redeemed {
            self.ledger.transfer(&r.tranche, &cfg.reserve, caller, r.amount)?;
            if self.ledger.balance_of(&r.tranche, &cfg.reserve) == 0 {
                self.state.release_iced(&r.tranche);
            }
        }
        self.settle(caller, fee)?;

        if remaining > 0 {
            warn!(requested, burned, remainder = remaining, "partial redemption");
        }
        info!(caller = %caller, burned, %fee, tranches = redeemed.len(), "redeem");
        Ok(BurnResult {
            requested,
            burned,
            fee,
            redeemed,
            remainder: remaining,
        })
    }

    /// Swaps a fresh tranche from the mintable bond for an older one held in
    /// reserve, at equal value, paying or charging the rollover reward.
    pub fn rollover(
        &mut self,
        caller: &Address,
        tranche_in: &Address,
        tranche_out: &Address,
        amount: u64,
    ) -> Result<RolloverResult> {
        if amount == 0 {
            return Err(ReserveError::ZeroAmount);
        }
        let bond = self.state.mintable_bond().ok_or(ReserveError::NoMintableBond)?;
        if !bond.contains_tranche(tranche_in) {
            return Err(ReserveError::TrancheNotMintable(*tranche_in));
        }
        let tail = bond.address;
        let cfg = self.state.config.clone();

        let out_pos = self
            .state
            .positions
            .get(tranche_out)
            .ok_or(ReserveError::TrancheNotInReserve(*tranche_out))?;
        if out_pos.bond == tail {
            return Err(ReserveError::RolloverFromMintableBond(*tranche_out));
        }
        let out_balance = self.ledger.balance_of(tranche_out, &cfg.reserve);
        if out_balance == 0 {
            return Err(ReserveError::TrancheNotInReserve(*tranche_out));
        }

        let unit_in = self.unit_value(tranche_in)?;
        let unit_out = self.unit_value(tranche_out)?;
        if unit_in == 0 || unit_out == 0 {
            return Err(ReserveError::NothingToRollover);
        }
        let value_in = (amount as u128).checked_mul(unit_in).ok_or(ReserveError::Overflow)?;
        let mut in_amount = amount;
        let mut out_amount = u64::try_from(value_in / unit_out).unwrap_or(u64::MAX);
        if out_amount > out_balance {
            out_amount = out_balance;
            let needed = (out_amount as u128 * unit_out).div_ceil(unit_in);
            in_amount = u64::try_from(needed).map_err(|_| ReserveError::Overflow)?.min(amount);
        }
        if out_amount == 0 {
            return Err(ReserveError::NothingToRollover);
        }

        let rolled = self.tranche_value(tranche_in, in_amount)?;
        let value_before = self.reserve_value()?;
        let value_after = value_before
            .saturating_add(rolled)
            .saturating_sub(self.tranche_value(tranche_out, out_amount)?);
        let supply = self.ledger.total_supply(&cfg.perp_token);
        let dr = DeviationRange {
            before: self.deviation_ratio_of(value_before, supply),
            after: self.deviation_ratio_of(value_after, supply),
        };
        let pool = self.ledger.balance_of(&cfg.fee_token, &cfg.reserve);
        let reward = self.state.fees.rollover_reward(rolled, pool, supply, dr)?;

        self.ledger.transfer(tranche_in, caller, &cfg.reserve, in_amount)?;
        self.ledger.transfer(tranche_out, &cfg.reserve, caller, out_amount)?;
        if self.ledger.balance_of(tranche_out, &cfg.reserve) == 0 {
            self.state.release_iced(tranche_out);
        }
        self.settle(caller, -reward)?;

        info!(
            caller = %caller,
            tranche_in = %tranche_in,
            tranche_out = %tranche_out,
            in_amount,
            out_amount,
            %reward,
            "rollover"
        );
        Ok(RolloverResult {
            tranche_in: *tranche_in,
            tranche_out: *tranche_out,
            tranche_in_amount: in_amount,
            tranche_out_amount: out_amount,
            rollover_amount: rolled,
            reward,
        })
    }

    // ── configuration ──────────────────────────────────────────────

    pub fn set_yields(&mut self, layout: &ClassLayout, rates: Vec<u64>) -> Result<()> {
        let class = self.state.yields.set_yields(layout, rates)?;
        info!(class = %class, "yield row replaced");
        Ok(())
    }

    pub fn set_mint_class(&mut self, layout: &ClassLayout) {
        let class = layout.class_id();
        self.state.mint_class = Some(class);
        info!(class = %class, "mint class set");
    }

    pub fn set_maturity_window(&mut self, window: MaturityWindow) {
        self.state.window = window;
        info!(min_secs = window.min_secs, max_secs = ?window.max_secs, "maturity window set");
    }

    pub fn set_advance_policy(&mut self, policy: AdvancePolicy) {
        self.state.advance = policy;
        info!(?policy, "advance policy set");
    }

    pub fn set_fee_schedule(&mut self, schedule: FeeSchedule) -> Result<()> {
        self.state.fees = FeePolicy::new(schedule)?;
        info!("fee schedule replaced");
        Ok(())
    }

    pub fn set_pricing(&mut self, pricing: PricingConfig) {
        self.state.pricing = pricing;
        info!("price strategy replaced");
    }

    // ── valuation ──────────────────────────────────────────────────

    pub fn reserve_value(&self) -> Result<u64> {
        reserve_value(&*self.state, &*self.ledger)
    }

    pub fn deviation_ratio(&self) -> Result<i64> {
        deviation_ratio(&*self.state, &*self.ledger)
    }

    fn deviation_ratio_of(&self, value: u64, supply: u64) -> i64 {
        ratio_of(self.state.config.target_ratio, value, supply)
    }

    fn unit_value(&self, tranche: &Address) -> Result<u128> {
        unit_value(&*self.state, tranche)
    }

    fn tranche_value(&self, tranche: &Address, amount: u64) -> Result<u64> {
        tranche_value(&*self.state, tranche, amount)
    }

    /// Moves a signed fee in the fee token: positive from caller to
    /// reserve, negative from reserve to caller.
    fn settle(&mut self, caller: &Address, fee: i128) -> Result<()> {
        let cfg = &self.state.config;
        let amount = to_amount(fee)?;
        if fee > 0 {
            self.ledger.transfer(&cfg.fee_token, caller, &cfg.reserve, amount)
        } else if fee < 0 {
            let available = self.ledger.balance_of(&cfg.fee_token, &cfg.reserve);
            if available < amount {
                return Err(ReserveError::InsufficientFeeReserve {
                    needed: amount,
                    available,
                });
            }
            self.ledger.transfer(&cfg.fee_token, &cfg.reserve, caller, amount)
        } else {
            Ok(())
        }
    }
}

/// Perp-denominated value of everything the reserve holds.
pub fn reserve_value<L: TokenLedger + ?Sized>(state: &ReserveState, ledger: &L) -> Result<u64> {
    let reserve = state.config.reserve;
    let mut total: u64 = 0;
    for t in state.reserve_tranches() {
        let balance = ledger.balance_of(&t, &reserve);
        if balance > 0 {
            total = total
                .checked_add(tranche_value(state, &t, balance)?)
                .ok_or(ReserveError::Overflow)?;
        }
    }
    Ok(total)
}

/// Reserve value per perp over the target ratio, in `DR_ONE` units.
pub fn deviation_ratio<L: TokenLedger + ?Sized>(state: &ReserveState, ledger: &L) -> Result<i64> {
    let supply = ledger.total_supply(&state.config.perp_token);
    Ok(ratio_of(state.config.target_ratio, reserve_value(state, ledger)?, supply))
}

fn ratio_of(target: i64, value: u64, supply: u64) -> i64 {
    if supply == 0 || target <= 0 {
        return DR_ONE;
    }
    let num = value as u128 * DR_ONE as u128 * DR_ONE as u128;
    let den = supply as u128 * target as u128;
    i64::try_from(num / den).unwrap_or(i64::MAX)
}

/// `yield * price` per tranche unit, unscaled.
fn unit_value(state: &ReserveState, tranche: &Address) -> Result<u128> {
    let position = state.position(tranche)?;
    let rate = state.yields.yield_of(&position.class, position.seniority);
    Ok(rate as u128 * state.pricing.price(position) as u128)
}

pub fn tranche_value(state: &ReserveState, tranche: &Address, amount: u64) -> Result<u64> {
    let scale = YIELD_ONE as u128 * state.pricing.unit_price() as u128;
    let v = (amount as u128)
        .checked_mul(unit_value(state, tranche)?)
        .ok_or(ReserveError::Overflow)?
        / scale;
    u64::try_from(v).map_err(|_| ReserveError::Overflow)
}
