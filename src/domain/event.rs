//! Events being wagered on: matches between two sectors and tournaments
//! with a champion market.
//!
//! An event walks a small status machine: `Scheduled → Live → Finished`,
//! with `Cancelled` reachable from either open state. Finishing stamps an
//! immutable [`Outcome`], and finished events are the sole trigger for
//! settlement.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{EventId, PlayerId, SectorId};
use super::money::Price;

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl EventStatus {
    /// True while the event still accepts new stakes.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Scheduled | Self::Live)
    }

    /// True once the event can never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Whether moving to `to` is a legal transition.
    #[must_use]
    pub const fn can_transition(self, to: EventStatus) -> bool {
        matches!(
            (self, to),
            (Self::Scheduled, Self::Live)
                | (Self::Scheduled, Self::Finished)
                | (Self::Live, Self::Finished)
                | (Self::Scheduled, Self::Cancelled)
                | (Self::Live, Self::Cancelled)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "live" => Some(Self::Live),
            "finished" => Some(Self::Finished),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three match-result selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPick {
    Home,
    Draw,
    Away,
}

impl fmt::Display for MatchPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Home => "home",
            Self::Draw => "draw",
            Self::Away => "away",
        };
        f.write_str(s)
    }
}

/// The three mutually recomputed prices of a match market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPrices {
    pub home: Price,
    pub draw: Price,
    pub away: Price,
}

impl MatchPrices {
    /// Validate that every price is a legal odds multiplier.
    pub fn try_new(home: Price, draw: Price, away: Price) -> Result<Self, DomainError> {
        for price in [home, draw, away] {
            if price < dec!(1.00) {
                return Err(DomainError::PriceBelowOne { price });
            }
        }
        Ok(Self { home, draw, away })
    }

    /// Price for one of the three picks.
    #[must_use]
    pub const fn for_pick(&self, pick: MatchPick) -> Price {
        match pick {
            MatchPick::Home => self.home,
            MatchPick::Draw => self.draw,
            MatchPick::Away => self.away,
        }
    }
}

/// The finalized outcome value stamped on a finished event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Home/draw/away result of a match.
    MatchResult { result: MatchPick },
    /// The sector that won a tournament.
    Champion { sector: SectorId },
}

/// Everything settlement needs to decide a wager: the stamped outcome plus
/// the finalized scorer set of the event.
#[derive(Debug, Clone)]
pub struct FinalOutcome {
    pub outcome: Outcome,
    pub scorers: HashSet<PlayerId>,
}

/// Kind-specific data carried by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A match between two sectors with a live score and a three-way market.
    Match {
        home: SectorId,
        away: SectorId,
        home_score: u32,
        away_score: u32,
        /// Prices set at creation; live recomputation always starts here.
        base_prices: MatchPrices,
        /// Currently offered prices (equal to base until a score arrives).
        live_prices: MatchPrices,
    },
    /// A tournament with a champion market priced per sector.
    Tournament,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Match { .. } => "match",
            Self::Tournament => "tournament",
        }
    }
}

/// The object being wagered on.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub status: EventStatus,
    pub kind: EventKind,
    /// Immutable once the event reaches `Finished`.
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Derive the match result from the current score, as stamped when a
    /// match is finished.
    #[must_use]
    pub fn result_from_score(home_score: u32, away_score: u32) -> MatchPick {
        if home_score > away_score {
            MatchPick::Home
        } else if away_score > home_score {
            MatchPick::Away
        } else {
            MatchPick::Draw
        }
    }

    /// Signed goal differential (home minus away) for a match, `None` for
    /// tournaments.
    #[must_use]
    pub fn goal_difference(&self) -> Option<i32> {
        match &self.kind {
            EventKind::Match {
                home_score,
                away_score,
                ..
            } => Some(*home_score as i32 - *away_score as i32),
            EventKind::Tournament => None,
        }
    }
}
