//! Wager placement and cancellation.
//!
//! Placing a wager quotes the price, debits the stake, and records the
//! wager in one unit of work, so a failure at any step leaves no trace.
//! The price written on the wager is the price at placement; later odds
//! movement never changes it.

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::{BettingConfig, StorageConfig};
use crate::domain::entry::EntryKind;
use crate::domain::error::DomainError;
use crate::domain::event::{Event, EventKind};
use crate::domain::id::{EventId, UserId, WagerId};
use crate::domain::money::{Amount, Price};
use crate::domain::wager::{Selection, Wager, WagerStatus};
use crate::error::{Error, Result};
use crate::ledger::{post_credit, post_debit};
use crate::odds;
use crate::store::model::{ChampionQuoteRow, ScorerQuoteRow, WagerRow};
use crate::store::schema::{champion_quotes, scorer_quotes, wagers};
use crate::store::{with_immediate_tx, DbPool};

use super::events::load_event;

/// Resolve the price currently offered for a selection on an event.
///
/// A selection the event does not carry at all is a domain error; a
/// selection that exists but has been switched off is a closed market.
fn quoted_price(
    conn: &mut SqliteConnection,
    event: &Event,
    selection: &Selection,
) -> Result<Price> {
    let not_offered = || -> Error {
        DomainError::SelectionNotOffered {
            selection: format!("{} on {}", selection.market(), event.name),
        }
        .into()
    };
    match (selection, &event.kind) {
        (Selection::MatchResult { pick }, EventKind::Match { live_prices, .. }) => {
            Ok(live_prices.for_pick(*pick))
        }
        (Selection::Champion { sector }, EventKind::Tournament) => {
            let row: Option<ChampionQuoteRow> = champion_quotes::table
                .filter(champion_quotes::event_id.eq(event.id.as_str()))
                .filter(champion_quotes::sector_id.eq(sector.as_str()))
                .first(conn)
                .optional()?;
            row.ok_or_else(not_offered)?.to_quote()?.offered_price()
        }
        (Selection::Scorer { player }, EventKind::Match { .. }) => {
            let row: Option<ScorerQuoteRow> = scorer_quotes::table
                .filter(scorer_quotes::event_id.eq(event.id.as_str()))
                .filter(scorer_quotes::player_id.eq(player.as_str()))
                .first(conn)
                .optional()?;
            row.ok_or_else(not_offered)?.to_quote()?.offered_price()
        }
        _ => Err(not_offered()),
    }
}

/// Accepts and cancels wagers.
#[derive(Clone)]
pub struct Placement {
    pool: DbPool,
    storage: StorageConfig,
    betting: BettingConfig,
}

impl Placement {
    #[must_use]
    pub fn new(pool: DbPool, storage: StorageConfig, betting: BettingConfig) -> Self {
        Self {
            pool,
            storage,
            betting,
        }
    }

    /// Place a wager: quote the price, debit the stake, record the wager.
    ///
    /// At most one pending wager per (user, event, market) is accepted;
    /// a second attempt fails with [`Error::DuplicateWager`].
    pub fn place_wager(
        &self,
        user: &UserId,
        event_id: &EventId,
        selection: Selection,
        stake: Amount,
    ) -> Result<Wager> {
        if stake <= Decimal::ZERO {
            return Err(DomainError::NonPositiveStake { stake }.into());
        }
        if stake < self.betting.minimum_stake {
            return Err(DomainError::StakeBelowMinimum {
                stake,
                minimum: self.betting.minimum_stake,
            }
            .into());
        }

        let wager = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let event = load_event(conn, event_id)?;
            odds::ensure_open(event.status)?;
            let price = quoted_price(conn, &event, &selection)?;

            let wager = Wager::place(
                user.clone(),
                event_id.clone(),
                selection.clone(),
                stake,
                price,
            );
            post_debit(
                conn,
                user,
                stake,
                EntryKind::Stake,
                &format!("stake on {}", event.name),
                Some(&wager.id),
            )?;
            let row = WagerRow::from_domain(&wager)?;
            diesel::insert_into(wagers::table)
                .values(&row)
                .execute(conn)
                .map_err(|err| match err {
                    diesel::result::Error::DatabaseError(
                        DatabaseErrorKind::UniqueViolation,
                        _,
                    ) => Error::DuplicateWager,
                    other => other.into(),
                })?;
            Ok(wager)
        })?;
        info!(
            user = %user,
            wager = %wager.id,
            event = %event_id,
            market = wager.selection.market(),
            stake = %stake,
            price = %wager.price_at_placement,
            "placed wager"
        );
        Ok(wager)
    }

    /// Cancel a pending wager, refunding its stake in full.
    pub fn cancel_wager(&self, wager_id: &WagerId) -> Result<Wager> {
        let wager = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let row: Option<WagerRow> = wagers::table
                .find(wager_id.as_str())
                .first(conn)
                .optional()?;
            let mut wager = row
                .ok_or_else(|| Error::NotFound {
                    entity: "wager",
                    id: wager_id.to_string(),
                })?
                .to_domain()?;

            // Once the event has left its open states the wager's fate is
            // settlement's to decide; a refund here would hand a losing
            // stake back.
            let event = load_event(conn, &wager.event_id)?;
            odds::ensure_open(event.status)?;

            let now = Utc::now();
            let updated = diesel::update(
                wagers::table
                    .find(wager_id.as_str())
                    .filter(wagers::status.eq(WagerStatus::Pending.as_str())),
            )
            .set((
                wagers::status.eq(WagerStatus::Refunded.as_str()),
                wagers::resolved_at.eq(Some(now.to_rfc3339())),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(Error::InvalidTransition {
                    entity: "wager",
                    from: wager.status.to_string(),
                    to: WagerStatus::Refunded.to_string(),
                });
            }

            post_credit(
                conn,
                &wager.user_id,
                wager.stake,
                EntryKind::Refund,
                "wager cancelled",
                Some(&wager.id),
            )?;
            wager.status = WagerStatus::Refunded;
            wager.resolved_at = Some(now);
            Ok(wager)
        })?;
        info!(wager = %wager_id, "cancelled wager");
        Ok(wager)
    }

    /// A user's wagers, newest first.
    pub fn wagers_for_user(&self, user: &UserId) -> Result<Vec<Wager>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<WagerRow> = wagers::table
            .filter(wagers::user_id.eq(user.as_str()))
            .order(wagers::created_at.desc())
            .load(&mut conn)?;
        rows.iter().map(WagerRow::to_domain).collect()
    }

    /// Read a single wager.
    pub fn get(&self, wager_id: &WagerId) -> Result<Wager> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<WagerRow> = wagers::table
            .find(wager_id.as_str())
            .first(&mut conn)
            .optional()?;
        match row {
            Some(row) => row.to_domain(),
            None => Err(Error::NotFound {
                entity: "wager",
                id: wager_id.to_string(),
            }),
        }
    }
}
