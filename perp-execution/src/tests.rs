use super::*;
use perp_types::fixed::{DR_ONE, PERC_ONE, YIELD_ONE};
use perp_types::{BondInstance, LineSegment, PiecewiseCurve, ReserveError};

const DAY: u64 = 86_400;
const ALICE: Address = Address::from_byte(0x01);
const COLLATERAL: Address = Address::from_byte(0xc0);
const FEE: Address = Address::from_byte(0xfe);
const RESERVE: Address = Address::from_byte(0xee);
const PERP: Address = Address::from_byte(0xaa);

struct Harness {
    state: ReserveState,
    ledger: InMemoryLedger,
    now: u64,
}

impl Harness {
    /// Fresh reserve with a 10 day window, the 20/80 class configured and
    /// every tranche yielding 1.0.
    fn new() -> Self {
        let config = ReserveConfig {
            fee_token: FEE,
            ..Default::default()
        };
        let mut h = Harness {
            state: ReserveState::new(config),
            ledger: InMemoryLedger::new(),
            now: 1_000_000,
        };
        h.run(ReserveInstruction::SetMaturityWindow {
            min_secs: 10 * DAY,
            max_secs: None,
        })
        .unwrap();
        h.run(ReserveInstruction::SetMintClass { layout: layout() }).unwrap();
        h.set_yields(vec![YIELD_ONE, YIELD_ONE]);
        h
    }

    fn run(&mut self, ix: ReserveInstruction) -> Result<ExecutionOutcome> {
        let mut ctx = ExecutionContext {
            state: &mut self.state,
            ledger: &mut self.ledger,
            timestamp: self.now,
        };
        execute_instruction(&ix, &ALICE, &mut ctx)
    }

    fn set_yields(&mut self, rates: Vec<u64>) {
        self.run(ReserveInstruction::SetYields { layout: layout(), rates }).unwrap();
    }

    fn set_fees(&mut self, mint: i64, burn: i64, rollover: i64) {
        self.run(ReserveInstruction::SetFeeSchedule {
            schedule: FeeSchedule::Fixed {
                mint_fee_pct: mint,
                burn_fee_pct: burn,
                rollover_reward_pct: rollover,
            },
        })
        .unwrap();
    }

    /// Enqueues a bond maturing `days` from now and funds Alice with 1000 of
    /// each of its tranches.
    fn enqueue(&mut self, tag: u8, days: u64) -> BondInstance {
        let bond = bond(tag, self.now + days * DAY);
        self.run(ReserveInstruction::AdvanceMintBond { bond: bond.clone() }).unwrap();
        for t in &bond.tranches {
            self.ledger.mint(&t.address, &ALICE, 1000).unwrap();
        }
        bond
    }

    fn deposit(&mut self, tranche: Address, amount: u64) -> Result<MintResult> {
        match self.run(ReserveInstruction::Deposit { tranche, amount })? {
            ExecutionOutcome::Minted(r) => Ok(r),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn redeem(&mut self, amount: u64) -> Result<BurnResult> {
        match self.run(ReserveInstruction::Redeem { amount })? {
            ExecutionOutcome::Burned(r) => Ok(r),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn rollover(&mut self, tranche_in: Address, tranche_out: Address, amount: u64) -> Result<RolloverResult> {
        match self.run(ReserveInstruction::Rollover {
            tranche_in,
            tranche_out,
            amount,
        })? {
            ExecutionOutcome::RolledOver(r) => Ok(r),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// Mint 5% sliding to 0% across 0.9..1.0, burn 0% rising to 2%, rollover
    /// reward 10% sliding to 0%.
    fn set_curve_fees(&mut self) {
        let pct = PERC_ONE / 100;
        self.run(ReserveInstruction::SetFeeSchedule {
            schedule: FeeSchedule::Curve {
                mint: ramp(5 * pct, 0),
                burn: ramp(0, 2 * pct),
                rollover: ramp(10 * pct, 0),
                domain: (0, 2 * DR_ONE),
            },
        })
        .unwrap();
    }

    fn balance(&self, token: &Address, owner: &Address) -> u64 {
        self.ledger.balance_of(token, owner)
    }
}

fn layout() -> ClassLayout {
    ClassLayout {
        collateral: COLLATERAL,
        ratios: vec![200, 800],
    }
}

fn bond(tag: u8, maturity: u64) -> BondInstance {
    BondInstance::issue(Address::from_byte(tag), COLLATERAL, maturity, &[200, 800]).unwrap()
}

/// `below` up to a ratio of 0.9, linear to `above` at 1.0, flat after.
fn ramp(below: i64, above: i64) -> PiecewiseCurve {
    let (b1, b2) = (DR_ONE * 9 / 10, DR_ONE);
    PiecewiseCurve::new(
        LineSegment::flat(below),
        LineSegment::new(b1, below, b2, above).unwrap(),
        LineSegment::flat(above),
        (b1, b2),
    )
    .unwrap()
}

fn senior(bond: &BondInstance) -> Address {
    bond.tranches[0].address
}

fn junior(bond: &BondInstance) -> Address {
    bond.tranches[1].address
}

#[test]
fn test_queue_lifecycle() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    assert_eq!(h.state.queue.tail(), Some(a.address));
    h.deposit(senior(&a), 100).unwrap();

    let b = h.enqueue(0xb1, 40);
    assert_eq!(h.state.queue.tail(), Some(b.address));
    assert_eq!(h.state.queue.head(), Some(a.address));
    assert_eq!(h.state.queue.len(), 2);

    h.now += 25 * DAY;
    let out = match h.run(ReserveInstruction::AdvanceBurnBond).unwrap() {
        ExecutionOutcome::AdvancedBurn(r) => r,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(out.dequeued, vec![a.address]);
    // Only the tranche with a reserve balance is iced.
    assert_eq!(out.iceboxed, vec![senior(&a)]);
    assert_eq!(h.state.queue.head(), Some(b.address));
    assert!(h.state.icebox.contains(&senior(&a)));

    // Nothing else is stale yet.
    let again = h.run(ReserveInstruction::AdvanceBurnBond).unwrap();
    assert_eq!(again, ExecutionOutcome::AdvancedBurn(AdvanceBurnResult::default()));
}

#[test]
fn test_single_head_mode_dequeues_one_bond_per_call() {
    let mut h = Harness::new();
    h.run(ReserveInstruction::SetAdvancePolicy {
        policy: AdvancePolicy {
            burn_mode: BurnAdvanceMode::SingleHead,
            ..Default::default()
        },
    })
    .unwrap();
    let a = h.enqueue(0xa1, 20);
    let b = h.enqueue(0xb1, 25);
    h.enqueue(0xc1, 60);
    h.now += 20 * DAY;

    h.run(ReserveInstruction::AdvanceBurnBond).unwrap();
    assert_eq!(h.state.queue.head(), Some(b.address));
    assert!(!h.state.queue.contains(&a.address));
    h.run(ReserveInstruction::AdvanceBurnBond).unwrap();
    assert_eq!(h.state.queue.len(), 1);
}

#[test]
fn test_advance_mint_rejections() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);

    let err = h
        .run(ReserveInstruction::AdvanceMintBond { bond: a.clone() })
        .unwrap_err();
    assert_eq!(err, ReserveError::DuplicateItem(a.address));

    let soon = bond(0xb1, h.now + 10 * DAY);
    let err = h.run(ReserveInstruction::AdvanceMintBond { bond: soon.clone() }).unwrap_err();
    assert_eq!(
        err,
        ReserveError::BondMaturesTooSoon {
            bond: soon.address,
            maturity: soon.maturity,
            threshold: h.now + 10 * DAY,
        }
    );

    let earlier = bond(0xb2, h.now + 20 * DAY);
    let err = h.run(ReserveInstruction::AdvanceMintBond { bond: earlier }).unwrap_err();
    assert!(matches!(err, ReserveError::MaturityOutOfOrder { .. }));

    let other_class = BondInstance::issue(Address::from_byte(0xb3), COLLATERAL, h.now + 40 * DAY, &[500, 500]).unwrap();
    let err = h
        .run(ReserveInstruction::AdvanceMintBond {
            bond: other_class.clone(),
        })
        .unwrap_err();
    assert_eq!(err, ReserveError::BondNotConfigured(other_class.address));

    h.run(ReserveInstruction::SetMaturityWindow {
        min_secs: 10 * DAY,
        max_secs: Some(50 * DAY),
    })
    .unwrap();
    let late = bond(0xb4, h.now + 51 * DAY);
    let err = h.run(ReserveInstruction::AdvanceMintBond { bond: late }).unwrap_err();
    assert!(matches!(err, ReserveError::BondMaturesTooLate { .. }));
    assert_eq!(h.state.queue.len(), 1);
}

#[test]
fn test_exclusive_boundary_accepts_bond_at_threshold() {
    let mut h = Harness::new();
    h.run(ReserveInstruction::SetAdvancePolicy {
        policy: AdvancePolicy {
            boundary: MaturityBoundary::Exclusive,
            ..Default::default()
        },
    })
    .unwrap();
    let at = bond(0xa1, h.now + 10 * DAY);
    assert!(h.run(ReserveInstruction::AdvanceMintBond { bond: at }).is_ok());
}

#[test]
fn test_deposit_preconditions() {
    let mut h = Harness::new();
    assert_eq!(h.deposit(Address::from_byte(9), 10).unwrap_err(), ReserveError::NoMintableBond);

    let a = h.enqueue(0xa1, 30);
    assert_eq!(h.deposit(senior(&a), 0).unwrap_err(), ReserveError::ZeroAmount);

    h.enqueue(0xb1, 40);
    assert_eq!(
        h.deposit(senior(&a), 10).unwrap_err(),
        ReserveError::TrancheNotMintable(senior(&a))
    );
}

#[test]
fn test_zero_yield_and_nothing_to_mint() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.set_yields(vec![1, 0]);

    let err = h.deposit(junior(&a), 100).unwrap_err();
    assert_eq!(err, ReserveError::ZeroYield(junior(&a)));
    assert_eq!(err.kind(), perp_types::ErrorKind::Economic);

    // 100 * 1e-6 rounds to zero perp.
    assert_eq!(h.deposit(senior(&a), 100).unwrap_err(), ReserveError::NothingToMint);
    assert_eq!(h.balance(&senior(&a), &ALICE), 1000);
}

#[test]
fn test_zero_fee_round_trip() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.set_yields(vec![YIELD_ONE, YIELD_ONE / 2]);

    let minted = h.deposit(junior(&a), 101).unwrap();
    assert_eq!(minted.minted, 50);
    assert_eq!(minted.fee, 0);
    assert_eq!(h.balance(&PERP, &ALICE), 50);

    let burned = h.redeem(50).unwrap();
    assert_eq!(burned.remainder, 0);
    assert_eq!(burned.burned, 50);
    let back: u64 = burned.redeemed.iter().map(|r| r.amount).sum();
    assert!(101 - back <= 1, "returned {back} of 101");
    assert_eq!(h.ledger.total_supply(&PERP), 0);
}

#[test]
fn test_fee_pair_holds_under_repetition() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.set_fees(2 * PERC_ONE / 100, -PERC_ONE / 100, 0);
    h.ledger.mint(&FEE, &ALICE, 1000).unwrap();
    h.ledger.mint(&FEE, &RESERVE, 1000).unwrap();

    for _ in 0..5 {
        let m = h.deposit(senior(&a), 100).unwrap();
        assert_eq!(m.fee, 2);
        let b = h.redeem(m.minted).unwrap();
        assert_eq!(b.fee, -1);
    }
    assert_eq!(h.balance(&senior(&a), &ALICE), 1000);
    assert!(h.balance(&FEE, &ALICE) <= 1000 - 5);
}

#[test]
fn test_leaky_fee_pair_is_rejected() {
    let mut h = Harness::new();
    let err = h
        .run(ReserveInstruction::SetFeeSchedule {
            schedule: FeeSchedule::Fixed {
                mint_fee_pct: PERC_ONE / 100,
                burn_fee_pct: -2 * PERC_ONE / 100,
                rollover_reward_pct: 0,
            },
        })
        .unwrap_err();
    assert!(matches!(err, ReserveError::FeePairLeaksValue { .. }));
    assert_eq!(h.state.fees, FeePolicy::default());
}

#[test]
fn test_failed_call_leaves_state_and_ledger_untouched() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.set_fees(-PERC_ONE / 100, 2 * PERC_ONE / 100, 0);
    let root = h.state.state_root();
    let ledger = h.ledger.clone();

    // The rebate cannot be paid from an empty pool, so the whole deposit
    // is undone.
    let err = h.deposit(senior(&a), 100).unwrap_err();
    assert_eq!(err, ReserveError::InsufficientFeeReserve { needed: 1, available: 0 });
    assert_eq!(h.state.state_root(), root);
    assert_eq!(h.ledger, ledger);
}

#[test]
fn test_redeem_reports_remainder() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    h.ledger.mint(&PERP, &ALICE, 50).unwrap();

    let b = h.redeem(150).unwrap();
    assert_eq!(b.burned, 100);
    assert_eq!(b.remainder, 50);
    let value: u64 = b.redeemed.iter().map(|r| r.value).sum();
    assert_eq!(value + b.remainder, 150);
    assert_eq!(h.balance(&PERP, &ALICE), 50);
}

#[test]
fn test_redeem_edge_cases() {
    let mut h = Harness::new();
    assert_eq!(h.redeem(0).unwrap(), BurnResult::default());
    assert!(matches!(
        h.redeem(1).unwrap_err(),
        ReserveError::InsufficientBalance { needed: 1, available: 0, .. }
    ));
}

#[test]
fn test_redeem_drains_icebox_first() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    let b = h.enqueue(0xb1, 40);
    h.deposit(senior(&b), 100).unwrap();
    h.now += 25 * DAY;
    h.run(ReserveInstruction::AdvanceBurnBond).unwrap();

    let first = h.redeem(50).unwrap();
    assert_eq!(first.redeemed.len(), 1);
    assert_eq!(first.redeemed[0].tranche, senior(&a));

    let second = h.redeem(100).unwrap();
    let order: Vec<_> = second.redeemed.iter().map(|r| (r.tranche, r.amount)).collect();
    assert_eq!(order, vec![(senior(&a), 50), (senior(&b), 50)]);
    assert!(h.state.icebox.is_empty());
}

#[test]
fn test_rollover_swaps_at_equal_value_and_pays_reward() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    let b = h.enqueue(0xb1, 40);
    h.set_fees(0, 0, 10 * PERC_ONE / 100);
    h.ledger.mint(&FEE, &RESERVE, 1000).unwrap();

    let r = h.rollover(senior(&b), senior(&a), 60).unwrap();
    assert_eq!(r.tranche_in_amount, 60);
    assert_eq!(r.tranche_out_amount, 60);
    assert_eq!(r.rollover_amount, 60);
    // 10% of the 60/100 share of a 1000 pool.
    assert_eq!(r.reward, 60);
    assert_eq!(h.balance(&FEE, &ALICE), 60);
    assert_eq!(h.balance(&senior(&a), &RESERVE), 40);

    // Capped at what the reserve holds.
    let capped = h.rollover(senior(&b), senior(&a), 100).unwrap();
    assert_eq!(capped.tranche_out_amount, 40);
    assert_eq!(capped.tranche_in_amount, 40);
    assert_eq!(h.balance(&senior(&b), &RESERVE), 100);

    assert_eq!(
        h.rollover(senior(&b), senior(&a), 10).unwrap_err(),
        ReserveError::TrancheNotInReserve(senior(&a))
    );
}

#[test]
fn test_rollover_rejections() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();

    assert_eq!(
        h.rollover(junior(&a), senior(&a), 10).unwrap_err(),
        ReserveError::RolloverFromMintableBond(senior(&a))
    );

    let b = h.enqueue(0xb1, 40);
    assert_eq!(
        h.rollover(senior(&a), senior(&b), 10).unwrap_err(),
        ReserveError::TrancheNotMintable(senior(&a))
    );
    assert_eq!(
        h.rollover(senior(&b), senior(&a), 0).unwrap_err(),
        ReserveError::ZeroAmount
    );
}

#[test]
fn test_rollover_respects_prices() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    let b = h.enqueue(0xb1, 40);

    let mut prices = std::collections::BTreeMap::new();
    prices.insert(senior(&a), 50_000_000);
    h.run(ReserveInstruction::SetPricing {
        pricing: PricingConfig::Table { prices },
    })
    .unwrap();

    // One fresh unit buys two half-priced old units.
    let r = h.rollover(senior(&b), senior(&a), 30).unwrap();
    assert_eq!(r.tranche_out_amount, 60);
    assert_eq!(r.rollover_amount, 30);
}

#[test]
fn test_deviation_ratio_tracks_reserve_value() {
    let mut h = Harness::new();
    assert_eq!(deviation_ratio(&h.state, &h.ledger).unwrap(), perp_types::fixed::DR_ONE);

    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    assert_eq!(reserve_value(&h.state, &h.ledger).unwrap(), 100);
    assert_eq!(deviation_ratio(&h.state, &h.ledger).unwrap(), perp_types::fixed::DR_ONE);

    h.ledger.mint(&PERP, &ALICE, 100).unwrap();
    assert_eq!(deviation_ratio(&h.state, &h.ledger).unwrap(), perp_types::fixed::DR_ONE / 2);
}

#[test]
fn test_dequeued_bond_cannot_be_queued_again() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    h.now += 25 * DAY;
    h.run(ReserveInstruction::AdvanceBurnBond).unwrap();
    assert!(h.state.icebox.contains(&senior(&a)));

    // A shorter window would make the bond look fresh again.
    h.run(ReserveInstruction::SetMaturityWindow {
        min_secs: DAY,
        max_secs: None,
    })
    .unwrap();
    let err = h
        .run(ReserveInstruction::AdvanceMintBond { bond: a.clone() })
        .unwrap_err();
    assert_eq!(err, ReserveError::BondRetired(a.address));
    assert_eq!(err.kind(), perp_types::ErrorKind::Precondition);

    assert!(h.state.queue.is_empty());
    assert_eq!(h.state.reserve_tranches(), vec![senior(&a)]);
    assert_eq!(reserve_value(&h.state, &h.ledger).unwrap(), 100);
    assert_eq!(h.deposit(senior(&a), 10).unwrap_err(), ReserveError::NoMintableBond);
}

#[test]
fn test_bond_reusing_queued_tranches_is_rejected() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    let impostor = BondInstance {
        address: Address::from_byte(0xb1),
        maturity: h.now + 40 * DAY,
        ..a.clone()
    };
    let err = h
        .run(ReserveInstruction::AdvanceMintBond { bond: impostor })
        .unwrap_err();
    assert_eq!(err, ReserveError::InvalidBond("tranche registered to another bond"));
    assert_eq!(h.state.queue.len(), 1);
    assert_eq!(h.state.position(&senior(&a)).unwrap().bond, a.address);
}

#[test]
fn test_queued_bond_without_record_is_reported() {
    let mut h = Harness::new();
    let ghost = Address::from_byte(0x77);
    h.state.queue.enqueue(ghost).unwrap();
    assert_eq!(
        h.run(ReserveInstruction::AdvanceBurnBond).unwrap_err(),
        ReserveError::UnknownBond(ghost)
    );
}

#[test]
fn test_retired_bond_records_are_pruned_once_drained() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    h.now += 25 * DAY;
    h.run(ReserveInstruction::AdvanceBurnBond).unwrap();

    // The iced senior keeps its position for valuation; the empty junior
    // does not.
    assert!(!h.state.bonds.contains_key(&a.address));
    assert!(h.state.positions.contains_key(&senior(&a)));
    assert!(!h.state.positions.contains_key(&junior(&a)));
    assert!(h.state.retired.contains(&a.address));

    h.redeem(100).unwrap();
    assert!(h.state.icebox.is_empty());
    assert!(h.state.positions.is_empty());
    assert!(h.state.bonds.is_empty());
}

#[test]
fn test_curve_fees_follow_deviation_ratio() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    h.set_curve_fees();
    h.ledger.mint(&PERP, &ALICE, 100).unwrap();
    h.ledger.mint(&senior(&a), &ALICE, 1000).unwrap();
    h.ledger.mint(&FEE, &ALICE, 1000).unwrap();
    assert_eq!(deviation_ratio(&h.state, &h.ledger).unwrap(), DR_ONE / 2);

    // 0.5 -> 0.95 crosses the lower breakpoint: 5% over 0.4 of width and
    // 3.75% over 0.05 average to 4.861111%.
    let m = h.deposit(senior(&a), 1800).unwrap();
    assert_eq!(m.minted, 1800);
    assert_eq!(m.fee, 87);
    assert_eq!(deviation_ratio(&h.state, &h.ledger).unwrap(), DR_ONE * 95 / 100);
    assert_eq!(h.balance(&FEE, &RESERVE), 87);

    // 0.95 -> 0.9 stays on the middle segment, averaging 0.5%.
    let b = h.redeem(1000).unwrap();
    assert_eq!(b.burned, 1000);
    assert_eq!(b.fee, 5);
    assert_eq!(deviation_ratio(&h.state, &h.ledger).unwrap(), DR_ONE * 9 / 10);
    assert_eq!(h.balance(&FEE, &RESERVE), 92);
}

#[test]
fn test_curve_rollover_reward_reads_current_ratio() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 950).unwrap();
    h.ledger.mint(&PERP, &ALICE, 50).unwrap();
    let b = h.enqueue(0xb1, 40);
    h.set_curve_fees();
    h.ledger.mint(&FEE, &RESERVE, 1000).unwrap();

    // An equal-value swap leaves the ratio at 0.95, where the reward curve
    // sits at 5%. The share is 1000 * 100 / 1000.
    let r = h.rollover(senior(&b), senior(&a), 100).unwrap();
    assert_eq!(r.rollover_amount, 100);
    assert_eq!(r.reward, 5);
    assert_eq!(h.balance(&FEE, &ALICE), 5);
    assert_eq!(deviation_ratio(&h.state, &h.ledger).unwrap(), DR_ONE * 95 / 100);
}

#[test]
fn test_curve_range_across_both_breakpoints_aborts_deposit() {
    let mut h = Harness::new();
    let a = h.enqueue(0xa1, 30);
    h.deposit(senior(&a), 100).unwrap();
    h.ledger.mint(&PERP, &ALICE, 100).unwrap();
    let mut prices = std::collections::BTreeMap::new();
    prices.insert(junior(&a), 200_000_000);
    h.run(ReserveInstruction::SetPricing {
        pricing: PricingConfig::Table { prices },
    })
    .unwrap();
    h.set_curve_fees();
    h.ledger.mint(&FEE, &ALICE, 1000).unwrap();
    let root = h.state.state_root();
    let ledger = h.ledger.clone();

    // Double-priced juniors push the ratio from 0.5 to 1.75.
    let err = h.deposit(junior(&a), 1000).unwrap_err();
    assert_eq!(err, ReserveError::UnsupportedRange);
    assert_eq!(err.kind(), perp_types::ErrorKind::Precondition);
    assert_eq!(h.state.state_root(), root);
    assert_eq!(h.ledger, ledger);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn redeemed_value_plus_remainder_is_requested(
            deposits in proptest::collection::vec((any::<bool>(), 1u64..1_000), 1..8),
            junior_yield in 1u64..2_000_000,
            extra in 0u64..500,
            fraction in 1u64..=100,
        ) {
            let mut h = Harness::new();
            let a = h.enqueue(0xa1, 30);
            h.set_yields(vec![YIELD_ONE, junior_yield]);
            for (is_junior, amount) in deposits {
                let tranche = if is_junior { junior(&a) } else { senior(&a) };
                let _ = h.deposit(tranche, amount);
            }
            h.ledger.mint(&PERP, &ALICE, extra).unwrap();

            let held = h.balance(&PERP, &ALICE);
            let request = held * fraction / 100;
            let supply = h.ledger.total_supply(&PERP);
            let b = h.redeem(request).unwrap();
            let value: u64 = b.redeemed.iter().map(|r| r.value).sum();
            prop_assert_eq!(value + b.remainder, request);
            prop_assert_eq!(b.burned, value);
            prop_assert_eq!(h.ledger.total_supply(&PERP), supply - b.burned);
        }
    }
}
