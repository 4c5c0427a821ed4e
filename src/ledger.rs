//! Account ledger (C1)
//!
//! Process-wide mapping from user name to an [`Account`] holding balance and
//! inventory. Every account is guarded by its own lock so that two traders
//! never contend on each other's mutations; a separate, coarser lock guards
//! only the name→account map itself, taken just long enough to look up or
//! insert an entry.

use crate::core_types::{Amount, Quantity};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account ledger is full")]
    LedgerFull,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("insufficient inventory")]
    InsufficientInventory,
}

/// A single user's cash balance and inventory, behind its own lock.
///
/// `balance` and `inventory` are unsigned: underflow is rejected by the
/// mutators below rather than wrapping, per the non-negativity invariant.
#[derive(Debug, Default)]
pub struct Account {
    inner: Mutex<AccountState>,
}

#[derive(Debug, Default, Clone, Copy)]
struct AccountState {
    balance: Amount,
    inventory: Quantity,
}

/// Point-in-time view of an account, returned by [`AccountLedger::status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountStatus {
    pub balance: Amount,
    pub inventory: Quantity,
}

impl Account {
    /// Unconditional: a credit to an existing account cannot fail.
    pub fn credit_balance(&self, n: Amount) {
        let mut state = self.inner.lock().unwrap();
        state.balance = state
            .balance
            .checked_add(n)
            .expect("balance overflow is an internal invariant violation");
    }

    /// Succeeds only if `balance >= n`; on failure the account is left
    /// exactly as it was — this is the debit contract the exchange relies on.
    pub fn debit_balance(&self, n: Amount) -> Result<(), LedgerError> {
        let mut state = self.inner.lock().unwrap();
        if state.balance < n {
            return Err(LedgerError::InsufficientFunds);
        }
        state.balance -= n;
        Ok(())
    }

    pub fn credit_inventory(&self, n: Quantity) {
        let mut state = self.inner.lock().unwrap();
        state.inventory = state
            .inventory
            .checked_add(n)
            .expect("inventory overflow is an internal invariant violation");
    }

    pub fn debit_inventory(&self, n: Quantity) -> Result<(), LedgerError> {
        let mut state = self.inner.lock().unwrap();
        if state.inventory < n {
            return Err(LedgerError::InsufficientInventory);
        }
        state.inventory -= n;
        Ok(())
    }

    pub fn status(&self) -> AccountStatus {
        let state = self.inner.lock().unwrap();
        AccountStatus {
            balance: state.balance,
            inventory: state.inventory,
        }
    }
}

/// Process-wide account registry. Accounts are created on first lookup and
/// live until process shutdown; there is no explicit deletion.
pub struct AccountLedger {
    accounts: Mutex<HashMap<String, Arc<Account>>>,
    max_accounts: usize,
}

impl AccountLedger {
    pub fn new(max_accounts: usize) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            max_accounts,
        }
    }

    /// Returns the existing account for `name`, or atomically creates one
    /// with balance and inventory both zero. Fails only once the per-process
    /// account cap is reached and `name` is not already present.
    pub fn lookup(&self, name: &str) -> Result<Arc<Account>, LedgerError> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.get(name) {
            return Ok(Arc::clone(account));
        }
        if accounts.len() >= self.max_accounts {
            return Err(LedgerError::LedgerFull);
        }
        let account = Arc::new(Account::default());
        accounts.insert(name.to_string(), Arc::clone(&account));
        Ok(account)
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_creates_a_fresh_zeroed_account() {
        let ledger = AccountLedger::new(10);
        let acct = ledger.lookup("alice").unwrap();
        assert_eq!(acct.status(), AccountStatus::default());
    }

    #[test]
    fn lookup_is_idempotent_by_name() {
        let ledger = AccountLedger::new(10);
        let a = ledger.lookup("alice").unwrap();
        a.credit_balance(1000);
        let a_again = ledger.lookup("alice").unwrap();
        assert_eq!(a_again.status().balance, 1000);
    }

    #[test]
    fn ledger_full_once_cap_reached() {
        let ledger = AccountLedger::new(1);
        ledger.lookup("alice").unwrap();
        let err = ledger.lookup("bob").unwrap_err();
        assert!(matches!(err, LedgerError::LedgerFull));
    }

    #[test]
    fn debit_fails_closed_and_leaves_state_untouched() {
        let ledger = AccountLedger::new(10);
        let acct = ledger.lookup("alice").unwrap();
        acct.credit_balance(100);
        let err = acct.debit_balance(101).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));
        assert_eq!(acct.status().balance, 100);
    }

    #[test]
    fn deposit_then_withdraw_round_trips() {
        let ledger = AccountLedger::new(10);
        let acct = ledger.lookup("alice").unwrap();
        acct.credit_balance(1000);
        acct.debit_balance(1000).unwrap();
        assert_eq!(acct.status().balance, 0);
    }

    #[test]
    fn inventory_mirrors_balance_semantics() {
        let ledger = AccountLedger::new(10);
        let acct = ledger.lookup("bob").unwrap();
        acct.credit_inventory(10);
        assert!(acct.debit_inventory(11).is_err());
        acct.debit_inventory(10).unwrap();
        assert_eq!(acct.status().inventory, 0);
    }
}
