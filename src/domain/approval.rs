//! Profit approvals: the fraud-review gate in front of winnings.
//!
//! Settlement returns principal immediately but withholds the profit
//! portion of a win behind a two-state review: `Pending → Approved`
//! credits it, `Pending → Rejected` forfeits it permanently. Both end
//! states are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ApprovalId, UserId, WagerId};
use super::money::{Amount, Price};

/// Review status of a withheld profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// Terminal once decided; no further transitions are legal.
    #[must_use]
    pub const fn is_decided(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A withheld profit awaiting manual fraud review. Created by settlement,
/// at most once per wager, only when the profit is positive.
#[derive(Debug, Clone)]
pub struct ProfitApproval {
    pub id: ApprovalId,
    pub user_id: UserId,
    pub wager_id: WagerId,
    /// Market discriminator of the source wager, for the review listing.
    pub market: String,
    /// The stake, already returned at settlement time.
    pub principal: Amount,
    /// The amount gated behind this review.
    pub profit: Amount,
    pub price_at_placement: Price,
    pub description: String,
    pub status: ApprovalStatus,
    pub reviewer_id: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
