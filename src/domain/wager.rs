//! Wagers: a stake placed against one selection at a captured price.
//!
//! The three selection kinds (match result, tournament champion, top
//! scorer) share one record and one settlement algorithm through the
//! tagged [`Selection`] variant and its `matches` capability.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{FinalOutcome, MatchPick, Outcome};
use super::id::{EventId, PlayerId, SectorId, UserId, WagerId};
use super::money::{potential_payout, Amount, Price};

/// What the user staked on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "market", rename_all = "snake_case")]
pub enum Selection {
    /// Home/draw/away result of a match.
    MatchResult { pick: MatchPick },
    /// A sector winning the tournament.
    Champion { sector: SectorId },
    /// A player scoring in the match.
    Scorer { player: PlayerId },
}

impl Selection {
    /// Market discriminator, one market per kind. The placement uniqueness
    /// constraint is keyed on this value.
    #[must_use]
    pub const fn market(&self) -> &'static str {
        match self {
            Self::MatchResult { .. } => "match_result",
            Self::Champion { .. } => "champion",
            Self::Scorer { .. } => "scorer",
        }
    }

    /// Decide this selection against a finalized outcome. Match and
    /// champion selections compare exactly; a scorer selection wins when
    /// the player is in the finalized scorer set.
    #[must_use]
    pub fn matches(&self, outcome: &FinalOutcome) -> bool {
        match self {
            Self::MatchResult { pick } => {
                matches!(&outcome.outcome, Outcome::MatchResult { result } if result == pick)
            }
            Self::Champion { sector } => {
                matches!(&outcome.outcome, Outcome::Champion { sector: winner } if winner == sector)
            }
            Self::Scorer { player } => outcome.scorers.contains(player),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchResult { pick } => write!(f, "match result: {pick}"),
            Self::Champion { sector } => write!(f, "champion: {sector}"),
            Self::Scorer { player } => write!(f, "scorer: {player}"),
        }
    }
}

/// Lifecycle status of a wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerStatus {
    Pending,
    Won,
    Lost,
    Cancelled,
    Refunded,
}

impl WagerStatus {
    /// A wager leaves `Pending` exactly once.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "won" => Some(Self::Won),
            "lost" => Some(Self::Lost),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

impl fmt::Display for WagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stake placed against a selection, capturing the price offered at
/// placement time.
#[derive(Debug, Clone)]
pub struct Wager {
    pub id: WagerId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub selection: Selection,
    pub stake: Amount,
    pub price_at_placement: Price,
    /// `stake * price_at_placement`, computed once at placement and
    /// immutable thereafter.
    pub potential_payout: Amount,
    pub status: WagerStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Wager {
    /// Build a new pending wager at the quoted price.
    #[must_use]
    pub fn place(
        user_id: UserId,
        event_id: EventId,
        selection: Selection,
        stake: Amount,
        price: Price,
    ) -> Self {
        Self {
            id: WagerId::generate(),
            user_id,
            event_id,
            selection,
            stake,
            price_at_placement: price,
            potential_payout: potential_payout(stake, price),
            status: WagerStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Payout in excess of the principal; the portion withheld for review.
    #[must_use]
    pub fn profit(&self) -> Amount {
        self.potential_payout - self.stake
    }
}
