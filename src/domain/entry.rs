//! Append-only ledger entries.
//!
//! The entry log is the source of truth for an account; the cached balance
//! is a projection of it. For one account, replaying all entries in
//! creation order and summing the signed amounts must equal the current
//! balance, and each entry's `balance_after` must equal the next entry's
//! `balance_before`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{UserId, WagerId};
use super::money::Amount;

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Stake debited at placement.
    Stake,
    /// Principal returned on a winning wager.
    PrincipalRefund,
    /// Profit credited after fraud-review approval.
    ProfitCredit,
    /// Administrative credit (e.g. opening balance, top-up).
    ManualCredit,
    /// Administrative debit.
    ManualDebit,
    /// Stake returned on cancellation.
    Refund,
}

impl EntryKind {
    /// Whether this kind increases the balance. The stored amount is
    /// signed accordingly.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(
            self,
            Self::PrincipalRefund | Self::ProfitCredit | Self::ManualCredit | Self::Refund
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stake => "stake",
            Self::PrincipalRefund => "principal_refund",
            Self::ProfitCredit => "profit_credit",
            Self::ManualCredit => "manual_credit",
            Self::ManualDebit => "manual_debit",
            Self::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stake" => Some(Self::Stake),
            "principal_refund" => Some(Self::PrincipalRefund),
            "profit_credit" => Some(Self::ProfitCredit),
            "manual_credit" => Some(Self::ManualCredit),
            "manual_debit" => Some(Self::ManualDebit),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable, balance-affecting entry in an account's log.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Monotonic per-store id; also the total order within an account.
    pub id: i64,
    pub user_id: UserId,
    pub kind: EntryKind,
    /// Signed: negative for debits, positive for credits.
    pub amount: Amount,
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub description: String,
    pub wager_id: Option<WagerId>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether this single entry is internally consistent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.balance_before + self.amount == self.balance_after
    }
}

/// Replay a chain of entries for one account, verifying the balance
/// conservation invariant. Returns the final balance when the chain is
/// intact.
#[must_use]
pub fn replay(entries: &[LedgerEntry], opening: Amount) -> Option<Amount> {
    let mut balance = opening;
    for entry in entries {
        if entry.balance_before != balance || !entry.is_consistent() {
            return None;
        }
        balance = entry.balance_after;
    }
    Some(balance)
}
