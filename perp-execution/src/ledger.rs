//! Fungible token primitive the engine moves tranches, perps and fees with.

use perp_types::{Address, ReserveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub trait TokenLedger {
    fn balance_of(&self, token: &Address, owner: &Address) -> u64;

    fn total_supply(&self, token: &Address) -> u64;

    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u64) -> Result<()>;

    fn mint(&mut self, token: &Address, to: &Address, amount: u64) -> Result<()>;

    fn burn(&mut self, token: &Address, from: &Address, amount: u64) -> Result<()>;
}

fn insufficient(token: &Address, owner: &Address, needed: u64, available: u64) -> ReserveError {
    ReserveError::InsufficientBalance {
        token: *token,
        owner: *owner,
        needed,
        available,
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryLedger {
    balances: BTreeMap<Address, BTreeMap<Address, u64>>,
    supplies: BTreeMap<Address, u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holders of `token` with a nonzero balance.
    pub fn holders(&self, token: &Address) -> impl Iterator<Item = (&Address, &u64)> + '_ {
        self.balances
            .get(token)
            .into_iter()
            .flat_map(|m| m.iter())
            .filter(|(_, b)| **b > 0)
    }

    fn set(&mut self, token: &Address, owner: &Address, value: u64) {
        self.balances.entry(*token).or_default().insert(*owner, value);
    }
}

impl TokenLedger for InMemoryLedger {
    fn balance_of(&self, token: &Address, owner: &Address) -> u64 {
        self.balances
            .get(token)
            .and_then(|m| m.get(owner))
            .copied()
            .unwrap_or(0)
    }

    fn total_supply(&self, token: &Address) -> u64 {
        self.supplies.get(token).copied().unwrap_or(0)
    }

    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u64) -> Result<()> {
        let from_bal = self.balance_of(token, from);
        if from_bal < amount {
            return Err(insufficient(token, from, amount, from_bal));
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_bal = self.balance_of(token, to).checked_add(amount).ok_or(ReserveError::Overflow)?;
        self.set(token, from, from_bal - amount);
        self.set(token, to, to_bal);
        Ok(())
    }

    fn mint(&mut self, token: &Address, to: &Address, amount: u64) -> Result<()> {
        let supply = self.total_supply(token).checked_add(amount).ok_or(ReserveError::Overflow)?;
        let bal = self.balance_of(token, to).checked_add(amount).ok_or(ReserveError::Overflow)?;
        self.supplies.insert(*token, supply);
        self.set(token, to, bal);
        Ok(())
    }

    fn burn(&mut self, token: &Address, from: &Address, amount: u64) -> Result<()> {
        let bal = self.balance_of(token, from);
        if bal < amount {
            return Err(insufficient(token, from, amount, bal));
        }
        let supply = self.total_supply(token).saturating_sub(amount);
        self.supplies.insert(*token, supply);
        self.set(token, from, bal - amount);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: u64,
    },
    Mint {
        token: Address,
        to: Address,
        amount: u64,
    },
    Burn {
        token: Address,
        from: Address,
        amount: u64,
    },
}

impl LedgerOp {
    pub fn apply<L: TokenLedger + ?Sized>(&self, ledger: &mut L) -> Result<()> {
        match self {
            LedgerOp::Transfer { token, from, to, amount } => ledger.transfer(token, from, to, *amount),
            LedgerOp::Mint { token, to, amount } => ledger.mint(token, to, *amount),
            LedgerOp::Burn { token, from, amount } => ledger.burn(token, from, *amount),
        }
    }
}

/// Write-buffering view over a ledger. Reads fall through to the inner
/// ledger unless overwritten; every write is balance-checked here and
/// recorded so it can be replayed with [`commit`] once the whole call has
/// succeeded.
pub struct StagedLedger<'a, L: TokenLedger + ?Sized> {
    inner: &'a L,
    balances: BTreeMap<(Address, Address), u64>,
    supplies: BTreeMap<Address, u64>,
    ops: Vec<LedgerOp>,
}

impl<'a, L: TokenLedger + ?Sized> StagedLedger<'a, L> {
    pub fn new(inner: &'a L) -> Self {
        Self {
            inner,
            balances: BTreeMap::new(),
            supplies: BTreeMap::new(),
            ops: Vec::new(),
        }
    }

    pub fn into_ops(self) -> Vec<LedgerOp> {
        self.ops
    }
}

impl<L: TokenLedger + ?Sized> TokenLedger for StagedLedger<'_, L> {
    fn balance_of(&self, token: &Address, owner: &Address) -> u64 {
        match self.balances.get(&(*token, *owner)) {
            Some(b) => *b,
            None => self.inner.balance_of(token, owner),
        }
    }

    fn total_supply(&self, token: &Address) -> u64 {
        match self.supplies.get(token) {
            Some(s) => *s,
            None => self.inner.total_supply(token),
        }
    }

    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u64) -> Result<()> {
        let from_bal = self.balance_of(token, from);
        if from_bal < amount {
            return Err(insufficient(token, from, amount, from_bal));
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_bal = self.balance_of(token, to).checked_add(amount).ok_or(ReserveError::Overflow)?;
        self.balances.insert((*token, *from), from_bal - amount);
        self.balances.insert((*token, *to), to_bal);
        self.ops.push(LedgerOp::Transfer {
            token: *token,
            from: *from,
            to: *to,
            amount,
        });
        Ok(())
    }

    fn mint(&mut self, token: &Address, to: &Address, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let supply = self.total_supply(token).checked_add(amount).ok_or(ReserveError::Overflow)?;
        let bal = self.balance_of(token, to).checked_add(amount).ok_or(ReserveError::Overflow)?;
        self.supplies.insert(*token, supply);
        self.balances.insert((*token, *to), bal);
        self.ops.push(LedgerOp::Mint {
            token: *token,
            to: *to,
            amount,
        });
        Ok(())
    }

    fn burn(&mut self, token: &Address, from: &Address, amount: u64) -> Result<()> {
        let bal = self.balance_of(token, from);
        if bal < amount {
            return Err(insufficient(token, from, amount, bal));
        }
        if amount == 0 {
            return Ok(());
        }
        let supply = self.total_supply(token).saturating_sub(amount);
        self.supplies.insert(*token, supply);
        self.balances.insert((*token, *from), bal - amount);
        self.ops.push(LedgerOp::Burn {
            token: *token,
            from: *from,
            amount,
        });
        Ok(())
    }
}

pub fn commit<L: TokenLedger + ?Sized>(ops: &[LedgerOp], ledger: &mut L) -> Result<()> {
    for op in ops {
        op.apply(ledger)?;
    }
    Ok(())
}
