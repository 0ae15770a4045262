//! Odds engine: quote gating and in-play price recomputation.
//!
//! Live match prices are a pure, deterministic function of the *base*
//! prices captured at event creation and the signed goal differential.
//! A differential of zero therefore always returns the draw-neutral
//! baseline; updates never compound on top of earlier updates.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::event::{EventStatus, MatchPrices};
use crate::domain::money::Price;
use crate::error::{Error, Result};

/// No offered price ever drops below this floor.
#[must_use]
pub fn price_floor() -> Price {
    dec!(1.10)
}

/// A single offered price with its accepting flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub price: Price,
    pub is_active: bool,
}

impl Quote {
    /// The price offered right now, or `MarketClosed` if the quote has
    /// been deactivated.
    pub fn offered_price(&self) -> Result<Price> {
        if self.is_active {
            Ok(self.price)
        } else {
            Err(Error::MarketClosed {
                reason: "quote is no longer accepting stakes".to_string(),
            })
        }
    }
}

/// Fail with `MarketClosed` unless the event still accepts stakes.
pub fn ensure_open(status: EventStatus) -> Result<()> {
    if status.is_open() {
        Ok(())
    } else {
        Err(Error::MarketClosed {
            reason: format!("event is {status}"),
        })
    }
}

/// Recompute the three match prices for the given goal differential
/// (home minus away).
///
/// The favored side compresses linearly toward the floor (15% of base per
/// goal, never below half the base), the trailing side expands (30% per
/// goal, capped at 3x base) and the draw drifts out (20% per goal, capped
/// at 2.5x base). Every result is clamped to [`price_floor`].
#[must_use]
pub fn live_match_prices(base: &MatchPrices, goal_diff: i32) -> MatchPrices {
    let lead = Decimal::from(goal_diff.unsigned_abs());

    let compress = (dec!(1) - lead * dec!(0.15)).max(dec!(0.5));
    let expand = (dec!(1) + lead * dec!(0.30)).min(dec!(3.0));
    let drift = (dec!(1) + lead * dec!(0.20)).min(dec!(2.5));

    let (home_mult, draw_mult, away_mult) = match goal_diff {
        0 => (dec!(1), dec!(1), dec!(1)),
        d if d > 0 => (compress, drift, expand),
        _ => (expand, drift, compress),
    };

    let floor = price_floor();
    MatchPrices {
        home: (base.home * home_mult).max(floor),
        draw: (base.draw * draw_mult).max(floor),
        away: (base.away * away_mult).max(floor),
    }
}
