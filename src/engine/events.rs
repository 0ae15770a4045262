//! Event administration: the surface through which the surrounding
//! application creates events, moves them through their status machine,
//! maintains quotes, and records live scores.
//!
//! Finishing an event stamps its immutable outcome; the caller then
//! invokes settlement. Cancelling an event refunds every pending wager.

use std::collections::HashSet;

use chrono::Utc;
use diesel::prelude::*;
use rust_decimal_macros::dec;
use tracing::info;

use crate::config::StorageConfig;
use crate::domain::entry::EntryKind;
use crate::domain::error::DomainError;
use crate::domain::event::{
    Event, EventKind, EventStatus, FinalOutcome, MatchPrices, Outcome,
};
use crate::domain::id::{EventId, PlayerId, SectorId};
use crate::domain::money::Price;
use crate::domain::wager::WagerStatus;
use crate::error::{Error, Result};
use crate::ledger::post_credit;
use crate::odds;
use crate::store::model::{EventRow, ScorerQuoteRow, WagerRow};
use crate::store::schema::{champion_quotes, events, scorer_quotes, wagers};
use crate::store::{with_immediate_tx, DbPool};

/// Load an event inside an open unit of work.
pub(crate) fn load_event(conn: &mut SqliteConnection, id: &EventId) -> Result<Event> {
    let row: Option<EventRow> = events::table.find(id.as_str()).first(conn).optional()?;
    match row {
        Some(row) => row.to_domain(),
        None => Err(Error::NotFound {
            entity: "event",
            id: id.to_string(),
        }),
    }
}

/// Everything settlement needs to decide the event's wagers.
pub(crate) fn load_final_outcome(conn: &mut SqliteConnection, event: &Event) -> Result<FinalOutcome> {
    let outcome = event.outcome.clone().ok_or_else(|| Error::EventNotFinal {
        reason: "no outcome recorded".to_string(),
    })?;
    let scorer_ids: Vec<String> = scorer_quotes::table
        .filter(scorer_quotes::event_id.eq(event.id.as_str()))
        .filter(scorer_quotes::scored.eq(1))
        .select(scorer_quotes::player_id)
        .load(conn)?;
    Ok(FinalOutcome {
        outcome,
        scorers: scorer_ids.into_iter().map(PlayerId::from).collect::<HashSet<_>>(),
    })
}

fn update_event(conn: &mut SqliteConnection, event: &mut Event) -> Result<()> {
    event.updated_at = Utc::now();
    let row = EventRow::from_domain(event)?;
    diesel::update(events::table.find(event.id.as_str()))
        .set(&row)
        .execute(conn)?;
    Ok(())
}

fn transition(event: &mut Event, to: EventStatus) -> Result<()> {
    if !event.status.can_transition(to) {
        return Err(Error::InvalidTransition {
            entity: "event",
            from: event.status.to_string(),
            to: to.to_string(),
        });
    }
    event.status = to;
    Ok(())
}

/// Administrative operations on events and their quotes.
#[derive(Clone)]
pub struct EventAdmin {
    pool: DbPool,
    storage: StorageConfig,
}

impl EventAdmin {
    #[must_use]
    pub fn new(pool: DbPool, storage: StorageConfig) -> Self {
        Self { pool, storage }
    }

    /// Create a scheduled match with its three base prices.
    pub fn create_match(
        &self,
        name: &str,
        home: SectorId,
        away: SectorId,
        home_price: Price,
        draw_price: Price,
        away_price: Price,
    ) -> Result<Event> {
        let prices = MatchPrices::try_new(home_price, draw_price, away_price)?;
        let now = Utc::now();
        let event = Event {
            id: EventId::generate(),
            name: name.to_string(),
            status: EventStatus::Scheduled,
            kind: EventKind::Match {
                home,
                away,
                home_score: 0,
                away_score: 0,
                base_prices: prices,
                live_prices: prices,
            },
            outcome: None,
            created_at: now,
            updated_at: now,
        };
        let row = EventRow::from_domain(&event)?;
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            diesel::insert_into(events::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })?;
        info!(event = %event.id, name, "created match");
        Ok(event)
    }

    /// Create a scheduled tournament with a champion quote per sector.
    pub fn create_tournament(
        &self,
        name: &str,
        champion_prices: &[(SectorId, Price)],
    ) -> Result<Event> {
        for (_, price) in champion_prices {
            if *price < dec!(1.00) {
                return Err(DomainError::PriceBelowOne { price: *price }.into());
            }
        }
        let now = Utc::now();
        let event = Event {
            id: EventId::generate(),
            name: name.to_string(),
            status: EventStatus::Scheduled,
            kind: EventKind::Tournament,
            outcome: None,
            created_at: now,
            updated_at: now,
        };
        let row = EventRow::from_domain(&event)?;
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            diesel::insert_into(events::table)
                .values(&row)
                .execute(conn)?;
            for (sector, price) in champion_prices {
                diesel::insert_into(champion_quotes::table)
                    .values((
                        champion_quotes::event_id.eq(event.id.as_str()),
                        champion_quotes::sector_id.eq(sector.as_str()),
                        champion_quotes::price.eq(price.to_string()),
                        champion_quotes::is_active.eq(1),
                    ))
                    .execute(conn)?;
            }
            Ok(())
        })?;
        info!(event = %event.id, name, sectors = champion_prices.len(), "created tournament");
        Ok(event)
    }

    /// Offer a scorer quote on a match.
    pub fn add_scorer_quote(
        &self,
        event_id: &EventId,
        player: &PlayerId,
        price: Price,
    ) -> Result<()> {
        if price < dec!(1.00) {
            return Err(DomainError::PriceBelowOne { price }.into());
        }
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            let event = load_event(conn, event_id)?;
            if !matches!(event.kind, EventKind::Match { .. }) {
                return Err(DomainError::SelectionNotOffered {
                    selection: format!("scorer: {player}"),
                }
                .into());
            }
            odds::ensure_open(event.status)?;
            let row = ScorerQuoteRow {
                event_id: event_id.to_string(),
                player_id: player.to_string(),
                price: price.to_string(),
                is_active: 1,
                scored: 0,
                goals: 0,
            };
            diesel::insert_into(scorer_quotes::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
    }

    /// Stop a champion quote from accepting new stakes (or resume it).
    pub fn set_champion_quote_active(
        &self,
        event_id: &EventId,
        sector: &SectorId,
        is_active: bool,
    ) -> Result<()> {
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            let updated = diesel::update(
                champion_quotes::table
                    .filter(champion_quotes::event_id.eq(event_id.as_str()))
                    .filter(champion_quotes::sector_id.eq(sector.as_str())),
            )
            .set(champion_quotes::is_active.eq(i32::from(is_active)))
            .execute(conn)?;
            if updated == 0 {
                return Err(Error::NotFound {
                    entity: "champion quote",
                    id: format!("{event_id}/{sector}"),
                });
            }
            Ok(())
        })
    }

    /// Stop a scorer quote from accepting new stakes (or resume it).
    pub fn set_scorer_quote_active(
        &self,
        event_id: &EventId,
        player: &PlayerId,
        is_active: bool,
    ) -> Result<()> {
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            let updated = diesel::update(
                scorer_quotes::table
                    .filter(scorer_quotes::event_id.eq(event_id.as_str()))
                    .filter(scorer_quotes::player_id.eq(player.as_str())),
            )
            .set(scorer_quotes::is_active.eq(i32::from(is_active)))
            .execute(conn)?;
            if updated == 0 {
                return Err(Error::NotFound {
                    entity: "scorer quote",
                    id: format!("{event_id}/{player}"),
                });
            }
            Ok(())
        })
    }

    /// Move a scheduled event to live.
    pub fn set_live(&self, event_id: &EventId) -> Result<Event> {
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            let mut event = load_event(conn, event_id)?;
            transition(&mut event, EventStatus::Live)?;
            update_event(conn, &mut event)?;
            Ok(event)
        })
    }

    /// Record the live score of a match and recompute the offered prices
    /// from the base prices and the new goal differential.
    pub fn record_score(&self, event_id: &EventId, home_score: u32, away_score: u32) -> Result<Event> {
        let event = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let mut event = load_event(conn, event_id)?;
            if event.status != EventStatus::Live {
                return Err(Error::InvalidTransition {
                    entity: "event",
                    from: event.status.to_string(),
                    to: "score update".to_string(),
                });
            }
            match &mut event.kind {
                EventKind::Match {
                    home_score: hs,
                    away_score: aws,
                    base_prices,
                    live_prices,
                    ..
                } => {
                    *hs = home_score;
                    *aws = away_score;
                    let diff = home_score as i32 - away_score as i32;
                    *live_prices = odds::live_match_prices(base_prices, diff);
                }
                EventKind::Tournament => {
                    return Err(DomainError::SelectionNotOffered {
                        selection: "match score".to_string(),
                    }
                    .into())
                }
            }
            update_event(conn, &mut event)?;
            Ok(event)
        })?;
        info!(event = %event_id, home_score, away_score, "recorded score");
        Ok(event)
    }

    /// Record which players scored, and how many goals each.
    pub fn record_scorers(&self, event_id: &EventId, goals: &[(PlayerId, u32)]) -> Result<()> {
        with_immediate_tx(&self.pool, &self.storage, |conn| {
            let event = load_event(conn, event_id)?;
            odds::ensure_open(event.status)?;
            for (player, count) in goals {
                let updated = diesel::update(
                    scorer_quotes::table
                        .filter(scorer_quotes::event_id.eq(event_id.as_str()))
                        .filter(scorer_quotes::player_id.eq(player.as_str())),
                )
                .set((
                    scorer_quotes::scored.eq(i32::from(*count > 0)),
                    scorer_quotes::goals.eq(*count as i32),
                ))
                .execute(conn)?;
                if updated == 0 {
                    return Err(Error::NotFound {
                        entity: "scorer quote",
                        id: format!("{event_id}/{player}"),
                    });
                }
            }
            Ok(())
        })
    }

    /// Finish a match, deriving the result from the recorded score.
    pub fn finish_match(&self, event_id: &EventId) -> Result<Event> {
        let event = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let mut event = load_event(conn, event_id)?;
            let (home_score, away_score) = match &event.kind {
                EventKind::Match {
                    home_score,
                    away_score,
                    ..
                } => (*home_score, *away_score),
                EventKind::Tournament => {
                    return Err(DomainError::SelectionNotOffered {
                        selection: "match result".to_string(),
                    }
                    .into())
                }
            };
            transition(&mut event, EventStatus::Finished)?;
            event.outcome = Some(Outcome::MatchResult {
                result: Event::result_from_score(home_score, away_score),
            });
            update_event(conn, &mut event)?;
            Ok(event)
        })?;
        info!(event = %event_id, outcome = ?event.outcome, "finished match");
        Ok(event)
    }

    /// Finish a tournament by naming its champion.
    pub fn finish_tournament(&self, event_id: &EventId, champion: &SectorId) -> Result<Event> {
        let event = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let mut event = load_event(conn, event_id)?;
            if !matches!(event.kind, EventKind::Tournament) {
                return Err(DomainError::SelectionNotOffered {
                    selection: format!("champion: {champion}"),
                }
                .into());
            }
            let quoted: i64 = champion_quotes::table
                .filter(champion_quotes::event_id.eq(event_id.as_str()))
                .filter(champion_quotes::sector_id.eq(champion.as_str()))
                .count()
                .get_result(conn)?;
            if quoted == 0 {
                return Err(Error::NotFound {
                    entity: "champion quote",
                    id: format!("{event_id}/{champion}"),
                });
            }
            transition(&mut event, EventStatus::Finished)?;
            event.outcome = Some(Outcome::Champion {
                sector: champion.clone(),
            });
            update_event(conn, &mut event)?;
            Ok(event)
        })?;
        info!(event = %event_id, champion = %champion, "finished tournament");
        Ok(event)
    }

    /// Cancel an event and refund every pending wager on it. Returns the
    /// number of wagers refunded.
    pub fn cancel_event(&self, event_id: &EventId) -> Result<usize> {
        let refunded = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let mut event = load_event(conn, event_id)?;
            transition(&mut event, EventStatus::Cancelled)?;
            update_event(conn, &mut event)?;

            let pending: Vec<WagerRow> = wagers::table
                .filter(wagers::event_id.eq(event_id.as_str()))
                .filter(wagers::status.eq(WagerStatus::Pending.as_str()))
                .load(conn)?;
            let now = Utc::now().to_rfc3339();
            for row in &pending {
                let wager = row.to_domain()?;
                diesel::update(wagers::table.find(row.id.as_str()))
                    .set((
                        wagers::status.eq(WagerStatus::Refunded.as_str()),
                        wagers::resolved_at.eq(Some(now.as_str())),
                    ))
                    .execute(conn)?;
                post_credit(
                    conn,
                    &wager.user_id,
                    wager.stake,
                    EntryKind::Refund,
                    &format!("event cancelled: {}", event.name),
                    Some(&wager.id),
                )?;
            }
            Ok(pending.len())
        })?;
        info!(event = %event_id, refunded, "cancelled event");
        Ok(refunded)
    }

    /// Read an event. A pure read for display and settlement callers.
    pub fn get(&self, event_id: &EventId) -> Result<Event> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        load_event(&mut conn, event_id)
    }
}
