//! The ledger: cached balances reconciled against an append-only entry log.
//!
//! `debit` and `credit` are the only places a balance is ever written.
//! Each runs inside its own IMMEDIATE transaction, so concurrent
//! operations on one account serialize their read-modify-write instead of
//! interleaving. Operations on different accounts proceed in parallel.

use diesel::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::domain::entry::{replay, EntryKind, LedgerEntry};
use crate::domain::error::DomainError;
use crate::domain::id::{UserId, WagerId};
use crate::domain::money::Amount;
use crate::error::{Error, Result};
use crate::store::model::{parse_amount, EntryRow, NewEntryRow};
use crate::store::schema::{accounts, entries};
use crate::store::{with_immediate_tx, DbPool};

/// Load the current balance of an account, failing if it does not exist.
pub(crate) fn load_balance(conn: &mut SqliteConnection, user: &UserId) -> Result<Amount> {
    let raw: Option<String> = accounts::table
        .find(user.as_str())
        .select(accounts::balance)
        .first(conn)
        .optional()?;
    match raw {
        Some(raw) => parse_amount(&raw),
        None => Err(Error::NotFound {
            entity: "account",
            id: user.to_string(),
        }),
    }
}

fn ensure_positive(amount: Amount) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::NonPositiveAmount { amount }.into());
    }
    Ok(())
}

fn append_entry(
    conn: &mut SqliteConnection,
    user: &UserId,
    kind: EntryKind,
    signed_amount: Amount,
    balance_before: Amount,
    balance_after: Amount,
    description: &str,
    wager: Option<&WagerId>,
) -> Result<LedgerEntry> {
    diesel::update(accounts::table.find(user.as_str()))
        .set(accounts::balance.eq(balance_after.to_string()))
        .execute(conn)?;

    let row = NewEntryRow {
        user_id: user.to_string(),
        kind: kind.as_str().to_string(),
        amount: signed_amount.to_string(),
        balance_before: balance_before.to_string(),
        balance_after: balance_after.to_string(),
        description: description.to_string(),
        wager_id: wager.map(ToString::to_string),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    diesel::insert_into(entries::table)
        .values(&row)
        .execute(conn)?;

    let inserted: EntryRow = entries::table
        .filter(entries::user_id.eq(user.as_str()))
        .order(entries::id.desc())
        .first(conn)?;
    inserted.to_domain()
}

/// Debit within an already-open unit of work. Fails with
/// `InsufficientFunds` when the balance cannot cover the amount.
pub(crate) fn post_debit(
    conn: &mut SqliteConnection,
    user: &UserId,
    amount: Amount,
    kind: EntryKind,
    description: &str,
    wager: Option<&WagerId>,
) -> Result<LedgerEntry> {
    ensure_positive(amount)?;
    let balance = load_balance(conn, user)?;
    if balance < amount {
        return Err(Error::InsufficientFunds {
            available: balance,
            requested: amount,
        });
    }
    let entry = append_entry(
        conn,
        user,
        kind,
        -amount,
        balance,
        balance - amount,
        description,
        wager,
    )?;
    debug!(user = %user, %amount, kind = %kind, "posted debit");
    Ok(entry)
}

/// Credit within an already-open unit of work. Credits never fail for
/// funds reasons.
pub(crate) fn post_credit(
    conn: &mut SqliteConnection,
    user: &UserId,
    amount: Amount,
    kind: EntryKind,
    description: &str,
    wager: Option<&WagerId>,
) -> Result<LedgerEntry> {
    ensure_positive(amount)?;
    let balance = load_balance(conn, user)?;
    let entry = append_entry(
        conn,
        user,
        kind,
        amount,
        balance,
        balance + amount,
        description,
        wager,
    )?;
    debug!(user = %user, %amount, kind = %kind, "posted credit");
    Ok(entry)
}

/// The ledger service: the only component that mutates balances.
#[derive(Clone)]
pub struct Ledger {
    pool: DbPool,
    storage: StorageConfig,
}

impl Ledger {
    #[must_use]
    pub fn new(pool: DbPool, storage: StorageConfig) -> Self {
        Self { pool, storage }
    }

    /// Open an account, optionally posting an opening balance as a
    /// `ManualCredit` entry so the log replays from zero.
    pub fn open_account(&self, user: &UserId, opening_balance: Amount) -> Result<()> {
        if opening_balance < Decimal::ZERO {
            return Err(DomainError::NonPositiveAmount {
                amount: opening_balance,
            }
            .into());
        }
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            let exists: i64 = accounts::table
                .filter(accounts::user_id.eq(user.as_str()))
                .count()
                .get_result(conn)?;
            if exists > 0 {
                return Err(Error::AccountExists {
                    user_id: user.to_string(),
                });
            }
            diesel::insert_into(accounts::table)
                .values((
                    accounts::user_id.eq(user.as_str()),
                    accounts::balance.eq(Decimal::ZERO.to_string()),
                ))
                .execute(conn)?;
            if opening_balance > Decimal::ZERO {
                post_credit(
                    conn,
                    user,
                    opening_balance,
                    EntryKind::ManualCredit,
                    "opening balance",
                    None,
                )?;
            }
            Ok(())
        })?;
        info!(user = %user, %opening_balance, "opened ledger account");
        Ok(())
    }

    /// Atomically debit an account.
    pub fn debit(
        &self,
        user: &UserId,
        amount: Amount,
        kind: EntryKind,
        description: &str,
    ) -> Result<LedgerEntry> {
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            post_debit(conn, user, amount, kind, description, None)
        })
    }

    /// Atomically credit an account.
    pub fn credit(
        &self,
        user: &UserId,
        amount: Amount,
        kind: EntryKind,
        description: &str,
        wager: Option<&WagerId>,
    ) -> Result<LedgerEntry> {
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            post_credit(conn, user, amount, kind, description, wager)
        })
    }

    /// The current spendable balance. A pure read.
    pub fn balance(&self, user: &UserId) -> Result<Amount> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        load_balance(&mut conn, user)
    }

    /// The account's entry log, in creation order.
    pub fn history(&self, user: &UserId) -> Result<Vec<LedgerEntry>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<EntryRow> = entries::table
            .filter(entries::user_id.eq(user.as_str()))
            .order(entries::id.asc())
            .load(&mut conn)?;
        rows.iter().map(EntryRow::to_domain).collect()
    }

    /// Replay the entry log and verify it reconciles with the cached
    /// balance: the chain is intact and the signed amounts sum to it.
    pub fn audit(&self, user: &UserId) -> Result<bool> {
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            let balance = load_balance(conn, user)?;
            let rows: Vec<EntryRow> = entries::table
                .filter(entries::user_id.eq(user.as_str()))
                .order(entries::id.asc())
                .load(conn)?;
            let log = rows
                .iter()
                .map(EntryRow::to_domain)
                .collect::<Result<Vec<_>>>()?;
            Ok(replay(&log, Decimal::ZERO) == Some(balance))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::connection::memory_pool;
    use rust_decimal_macros::dec;

    fn ledger() -> Ledger {
        Ledger::new(memory_pool(), StorageConfig::default())
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    #[test]
    fn open_account_posts_opening_credit() {
        let ledger = ledger();
        ledger.open_account(&alice(), dec!(100.00)).unwrap();

        assert_eq!(ledger.balance(&alice()).unwrap(), dec!(100.00));
        let history = ledger.history(&alice()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, EntryKind::ManualCredit);
        assert_eq!(history[0].amount, dec!(100.00));
    }

    #[test]
    fn open_account_twice_fails() {
        let ledger = ledger();
        ledger.open_account(&alice(), dec!(10.00)).unwrap();
        let err = ledger.open_account(&alice(), dec!(10.00)).unwrap_err();
        assert!(matches!(err, Error::AccountExists { .. }));
        // Balance untouched by the failed open.
        assert_eq!(ledger.balance(&alice()).unwrap(), dec!(10.00));
    }

    #[test]
    fn debit_beyond_balance_fails_and_mutates_nothing() {
        let ledger = ledger();
        ledger.open_account(&alice(), dec!(10.00)).unwrap();

        let err = ledger
            .debit(&alice(), dec!(20.00), EntryKind::Stake, "wager placed")
            .unwrap_err();
        match err {
            Error::InsufficientFunds {
                available,
                requested,
            } => {
                assert_eq!(available, dec!(10.00));
                assert_eq!(requested, dec!(20.00));
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
        assert_eq!(ledger.balance(&alice()).unwrap(), dec!(10.00));
        assert_eq!(ledger.history(&alice()).unwrap().len(), 1);
    }

    #[test]
    fn debit_on_unknown_account_is_not_found() {
        let ledger = ledger();
        let err = ledger
            .debit(&alice(), dec!(5.00), EntryKind::Stake, "wager placed")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "account", .. }));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let ledger = ledger();
        ledger.open_account(&alice(), dec!(10.00)).unwrap();

        for amount in [dec!(0), dec!(-5.00)] {
            assert!(ledger
                .credit(&alice(), amount, EntryKind::ManualCredit, "x", None)
                .is_err());
            assert!(ledger
                .debit(&alice(), amount, EntryKind::ManualDebit, "x")
                .is_err());
        }
    }

    #[test]
    fn entry_chain_links_balances() {
        let ledger = ledger();
        ledger.open_account(&alice(), dec!(100.00)).unwrap();
        ledger
            .debit(&alice(), dec!(20.00), EntryKind::Stake, "wager placed")
            .unwrap();
        ledger
            .credit(
                &alice(),
                dec!(20.00),
                EntryKind::PrincipalRefund,
                "principal refund",
                None,
            )
            .unwrap();

        let history = ledger.history(&alice()).unwrap();
        assert_eq!(history.len(), 3);
        for pair in history.windows(2) {
            assert_eq!(pair[0].balance_after, pair[1].balance_before);
        }
        assert_eq!(history.last().unwrap().balance_after, dec!(100.00));
    }

    #[test]
    fn balance_equals_sum_of_signed_amounts() {
        let ledger = ledger();
        ledger.open_account(&alice(), dec!(50.00)).unwrap();
        ledger
            .debit(&alice(), dec!(12.34), EntryKind::Stake, "wager placed")
            .unwrap();
        ledger
            .credit(&alice(), dec!(7.66), EntryKind::ManualCredit, "top-up", None)
            .unwrap();
        ledger
            .debit(&alice(), dec!(0.32), EntryKind::ManualDebit, "adjustment")
            .unwrap();

        let total: Amount = ledger
            .history(&alice())
            .unwrap()
            .iter()
            .map(|e| e.amount)
            .sum();
        assert_eq!(ledger.balance(&alice()).unwrap(), total);
        assert!(ledger.audit(&alice()).unwrap());
    }

    #[test]
    fn accounts_are_independent() {
        let ledger = ledger();
        let bob = UserId::from("bob");
        ledger.open_account(&alice(), dec!(100.00)).unwrap();
        ledger.open_account(&bob, dec!(5.00)).unwrap();

        ledger
            .debit(&alice(), dec!(40.00), EntryKind::Stake, "wager placed")
            .unwrap();

        assert_eq!(ledger.balance(&alice()).unwrap(), dec!(60.00));
        assert_eq!(ledger.balance(&bob).unwrap(), dec!(5.00));
        assert_eq!(ledger.history(&bob).unwrap().len(), 1);
    }

    #[test]
    fn credit_records_related_wager() {
        let ledger = ledger();
        ledger.open_account(&alice(), dec!(0.00)).unwrap();
        let wager = WagerId::from("wager-1");
        let entry = ledger
            .credit(
                &alice(),
                dec!(20.00),
                EntryKind::PrincipalRefund,
                "principal refund",
                Some(&wager),
            )
            .unwrap();
        assert_eq!(entry.wager_id, Some(wager));
    }
}
