#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use perp_execution::{
    execute_instruction, ClassLayout, ExecutionContext, ExecutionOutcome, FeeSchedule, InMemoryLedger, ReserveConfig,
    ReserveInstruction, ReserveState, TokenLedger,
};
use perp_types::{Address, BondInstance};

const DAY: u64 = 86_400;

#[derive(Arbitrary, Debug)]
enum Op {
    Deposit { junior: bool, amount: u32 },
    Redeem { amount: u32 },
    Rollover { junior_in: bool, amount: u32 },
    Warp { hours: u16 },
    NewBond { days: u8 },
}

#[derive(Arbitrary, Debug)]
struct Input {
    mint_fee_pct: i32,
    burn_fee_pct: i32,
    yields: [u32; 2],
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let user = Address::from_byte(1);
    let collateral = Address::from_byte(0xc0);
    let layout = ClassLayout {
        collateral,
        ratios: vec![300, 700],
    };
    let mut state = ReserveState::new(ReserveConfig {
        fee_token: Address::from_byte(0xfe),
        ..Default::default()
    });
    let mut ledger = InMemoryLedger::new();
    ledger.mint(&Address::from_byte(0xfe), &user, u32::MAX as u64).unwrap();
    ledger.mint(&Address::from_byte(0xfe), &state.config.reserve, u32::MAX as u64).unwrap();
    let mut now = 1_000_000u64;
    let mut bonds = 0u64;
    let (mut minted, mut burned) = (0u64, 0u64);

    let mut setup = vec![
        ReserveInstruction::SetMaturityWindow {
            min_secs: DAY,
            max_secs: None,
        },
        ReserveInstruction::SetMintClass { layout: layout.clone() },
        ReserveInstruction::SetYields {
            layout,
            rates: input.yields.iter().map(|y| *y as u64).collect(),
        },
    ];
    // Rejected pairs simply leave fees at zero.
    setup.push(ReserveInstruction::SetFeeSchedule {
        schedule: FeeSchedule::Fixed {
            mint_fee_pct: input.mint_fee_pct as i64,
            burn_fee_pct: input.burn_fee_pct as i64,
            rollover_reward_pct: 0,
        },
    });

    for op in &setup {
        let mut ctx = ExecutionContext {
            state: &mut state,
            ledger: &mut ledger,
            timestamp: now,
        };
        let _ = execute_instruction(op, &user, &mut ctx);
    }

    for op in input.ops {
        let tail = state.mintable_bond().cloned();
        let ix = match op {
            Op::Deposit { junior, amount } => match &tail {
                Some(b) => ReserveInstruction::Deposit {
                    tranche: b.tranches[junior as usize].address,
                    amount: amount as u64,
                },
                None => continue,
            },
            Op::Redeem { amount } => ReserveInstruction::Redeem { amount: amount as u64 },
            Op::Rollover { junior_in, amount } => {
                let Some(b) = &tail else { continue };
                let reserve = state.config.reserve;
                let Some(out) = state
                    .reserve_tranches()
                    .into_iter()
                    .find(|t| !b.contains_tranche(t) && ledger.balance_of(t, &reserve) > 0)
                else {
                    continue;
                };
                ReserveInstruction::Rollover {
                    tranche_in: b.tranches[junior_in as usize].address,
                    tranche_out: out,
                    amount: amount as u64,
                }
            }
            Op::Warp { hours } => {
                now += hours as u64 * 3600;
                ReserveInstruction::AdvanceBurnBond
            }
            Op::NewBond { days } => {
                bonds += 1;
                let floor = tail.as_ref().map(|b| b.maturity).unwrap_or(now);
                let maturity = floor.max(now) + (days as u64 + 1) * DAY;
                let bond = BondInstance::issue(Address::from_byte(0xb0).derive("bond", bonds), collateral, maturity, &[300, 700]).unwrap();
                for t in &bond.tranches {
                    ledger.mint(&t.address, &user, u32::MAX as u64).unwrap();
                }
                ReserveInstruction::AdvanceMintBond { bond }
            }
        };

        let before_state = state.clone();
        let before_ledger = ledger.clone();
        let result = {
            let mut ctx = ExecutionContext {
                state: &mut state,
                ledger: &mut ledger,
                timestamp: now,
            };
            execute_instruction(&ix, &user, &mut ctx)
        };
        match result {
            Ok(ExecutionOutcome::Minted(m)) => minted += m.minted,
            Ok(ExecutionOutcome::Burned(b)) => {
                burned += b.burned;
                let value: u64 = b.redeemed.iter().map(|r| r.value).sum();
                assert_eq!(value + b.remainder, b.requested);
            }
            Ok(_) => {}
            Err(_) => {
                assert_eq!(state, before_state);
                assert_eq!(ledger, before_ledger);
            }
        }
        assert_eq!(ledger.total_supply(&state.config.perp_token), minted - burned);
    }
});
