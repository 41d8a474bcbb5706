use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::TransferError;

/// Post-transfer balances, for rendering back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    pub sender_balance: u64,
    pub receiver_balance: u64,
}

/// In-memory map of account id to balance.
///
/// Accounts are created implicitly on first credit and never deleted; an
/// unknown id reads as balance 0. Instances are constructed explicitly and
/// injected into the adapters that need them, so tests can build isolated
/// ledgers instead of sharing process-wide state.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    balances: HashMap<String, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger with a single pre-funded account.
    pub fn seeded(account_id: impl Into<String>, balance: u64) -> Self {
        let mut balances = HashMap::new();
        balances.insert(account_id.into(), balance);
        Self { balances }
    }

    pub fn balance(&self, account_id: &str) -> u64 {
        self.balances.get(account_id).copied().unwrap_or(0)
    }

    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    /// Adds `amount` to an account, creating it if needed. A credit that
    /// would overflow the balance is rejected rather than clamped, so no
    /// value is ever silently destroyed.
    pub fn credit(&mut self, account_id: &str, amount: u64) -> Result<u64, TransferError> {
        if amount == 0 {
            return Err(TransferError::InvalidAmount);
        }

        let balance = self
            .balance(account_id)
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow)?;
        self.balances.insert(account_id.to_owned(), balance);
        Ok(balance)
    }

    /// Removes `amount` from an account. The funds check runs before any
    /// mutation, so a failed debit leaves the ledger untouched.
    pub fn debit(&mut self, account_id: &str, amount: u64) -> Result<u64, TransferError> {
        if amount == 0 {
            return Err(TransferError::InvalidAmount);
        }

        let current = self.balance(account_id);
        if current < amount {
            return Err(TransferError::InsufficientFunds);
        }

        let balance = current - amount;
        self.balances.insert(account_id.to_owned(), balance);
        Ok(balance)
    }

    /// Moves `amount` from `sender_id` to `receiver_id` as one synchronous
    /// step. Preconditions are checked before any mutation (receiver
    /// capacity, positive amount, sender funds); once they pass, the
    /// debit+credit pair cannot fail and no intermediate state is
    /// observable through `&mut self`.
    pub fn transfer(
        &mut self,
        sender_id: &str,
        receiver_id: &str,
        amount: u64,
    ) -> Result<TransferOutcome, TransferError> {
        // Receiver capacity is checked against the pre-debit balance, which
        // only overstates it, so the credit below cannot fail after the
        // debit has gone through.
        if self.balance(receiver_id).checked_add(amount).is_none() {
            return Err(TransferError::BalanceOverflow);
        }

        let sender_balance = self.debit(sender_id, amount)?;
        let receiver_balance = self.credit(receiver_id, amount)?;

        Ok(TransferOutcome {
            // A self-transfer credits the account it just debited.
            sender_balance: if sender_id == receiver_id { receiver_balance } else { sender_balance },
            receiver_balance,
        })
    }
}

/// Handle shared between the gateway and HTTP adapters. Every operation
/// holds the lock for the full debit+credit pair, so no caller can observe
/// a transfer in a half-applied state.
#[derive(Clone, Debug, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self { inner: Arc::new(Mutex::new(ledger)) }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn balance(&self, account_id: &str) -> u64 {
        self.lock().balance(account_id)
    }

    pub fn account_count(&self) -> usize {
        self.lock().account_count()
    }

    pub fn credit(&self, account_id: &str, amount: u64) -> Result<u64, TransferError> {
        self.lock().credit(account_id, amount)
    }

    pub fn transfer(
        &self,
        sender_id: &str,
        receiver_id: &str,
        amount: u64,
    ) -> Result<TransferOutcome, TransferError> {
        self.lock().transfer(sender_id, receiver_id, amount)
    }
}
