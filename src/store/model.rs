//! Database row types for Diesel ORM and their domain conversions.
//!
//! Monetary values are stored as TEXT and reparsed with `rust_decimal` so
//! that the balance invariant reconciles exactly; timestamps are RFC 3339
//! TEXT; selections and outcomes are tagged JSON.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::schema::{
    champion_quotes, entries, events, profit_approvals, scorer_quotes, wagers,
};
use crate::domain::approval::{ApprovalStatus, ProfitApproval};
use crate::domain::entry::{EntryKind, LedgerEntry};
use crate::domain::event::{Event, EventKind, EventStatus, MatchPrices, Outcome};
use crate::domain::id::{ApprovalId, EventId, SectorId, UserId, WagerId};
use crate::domain::wager::{Selection, Wager, WagerStatus};
use crate::error::{Error, Result};
use crate::odds::Quote;

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|e| Error::Parse(format!("bad decimal '{raw}': {e}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("bad timestamp '{raw}': {e}")))
}

fn parse_status<T>(raw: &str, parse: impl Fn(&str) -> Option<T>, what: &str) -> Result<T> {
    parse(raw).ok_or_else(|| Error::Parse(format!("unknown {what} '{raw}'")))
}

/// Database row for a ledger entry (insertable; the id is assigned by the
/// store).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = entries)]
pub struct NewEntryRow {
    pub user_id: String,
    pub kind: String,
    pub amount: String,
    pub balance_before: String,
    pub balance_after: String,
    pub description: String,
    pub wager_id: Option<String>,
    pub created_at: String,
}

/// Database row for a ledger entry (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EntryRow {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub amount: String,
    pub balance_before: String,
    pub balance_after: String,
    pub description: String,
    pub wager_id: Option<String>,
    pub created_at: String,
}

impl EntryRow {
    pub fn to_domain(&self) -> Result<LedgerEntry> {
        Ok(LedgerEntry {
            id: self.id,
            user_id: UserId::from(self.user_id.clone()),
            kind: parse_status(&self.kind, EntryKind::parse, "entry kind")?,
            amount: parse_amount(&self.amount)?,
            balance_before: parse_amount(&self.balance_before)?,
            balance_after: parse_amount(&self.balance_after)?,
            description: self.description.clone(),
            wager_id: self.wager_id.clone().map(WagerId::from),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Database row for an event.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EventRow {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub status: String,
    pub home_sector: Option<String>,
    pub away_sector: Option<String>,
    pub home_score: i32,
    pub away_score: i32,
    pub base_home: Option<String>,
    pub base_draw: Option<String>,
    pub base_away: Option<String>,
    pub live_home: Option<String>,
    pub live_draw: Option<String>,
    pub live_away: Option<String>,
    pub outcome: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn prices_from_columns(
    home: &Option<String>,
    draw: &Option<String>,
    away: &Option<String>,
) -> Result<MatchPrices> {
    let missing = || Error::Parse("match event is missing price columns".to_string());
    Ok(MatchPrices {
        home: parse_amount(home.as_deref().ok_or_else(missing)?)?,
        draw: parse_amount(draw.as_deref().ok_or_else(missing)?)?,
        away: parse_amount(away.as_deref().ok_or_else(missing)?)?,
    })
}

impl EventRow {
    pub fn from_domain(event: &Event) -> Result<Self> {
        let (home_sector, away_sector, home_score, away_score, base, live) = match &event.kind {
            EventKind::Match {
                home,
                away,
                home_score,
                away_score,
                base_prices,
                live_prices,
            } => (
                Some(home.to_string()),
                Some(away.to_string()),
                *home_score as i32,
                *away_score as i32,
                Some(*base_prices),
                Some(*live_prices),
            ),
            EventKind::Tournament => (None, None, 0, 0, None, None),
        };
        let outcome = event
            .outcome
            .as_ref()
            .map(|o| serde_json::to_string(o).map_err(|e| Error::Parse(e.to_string())))
            .transpose()?;

        Ok(Self {
            id: event.id.to_string(),
            kind: event.kind.as_str().to_string(),
            name: event.name.clone(),
            status: event.status.as_str().to_string(),
            home_sector,
            away_sector,
            home_score,
            away_score,
            base_home: base.map(|p| p.home.to_string()),
            base_draw: base.map(|p| p.draw.to_string()),
            base_away: base.map(|p| p.away.to_string()),
            live_home: live.map(|p| p.home.to_string()),
            live_draw: live.map(|p| p.draw.to_string()),
            live_away: live.map(|p| p.away.to_string()),
            outcome,
            created_at: event.created_at.to_rfc3339(),
            updated_at: event.updated_at.to_rfc3339(),
        })
    }

    pub fn to_domain(&self) -> Result<Event> {
        let kind = match self.kind.as_str() {
            "match" => {
                let missing = || Error::Parse("match event is missing sectors".to_string());
                EventKind::Match {
                    home: SectorId::from(self.home_sector.clone().ok_or_else(missing)?),
                    away: SectorId::from(self.away_sector.clone().ok_or_else(missing)?),
                    home_score: self.home_score as u32,
                    away_score: self.away_score as u32,
                    base_prices: prices_from_columns(
                        &self.base_home,
                        &self.base_draw,
                        &self.base_away,
                    )?,
                    live_prices: prices_from_columns(
                        &self.live_home,
                        &self.live_draw,
                        &self.live_away,
                    )?,
                }
            }
            "tournament" => EventKind::Tournament,
            other => return Err(Error::Parse(format!("unknown event kind '{other}'"))),
        };
        let outcome: Option<Outcome> = self
            .outcome
            .as_deref()
            .map(|raw| serde_json::from_str(raw).map_err(|e| Error::Parse(e.to_string())))
            .transpose()?;

        Ok(Event {
            id: EventId::from(self.id.clone()),
            name: self.name.clone(),
            status: parse_status(&self.status, EventStatus::parse, "event status")?,
            kind,
            outcome,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Database row for a champion quote.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = champion_quotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChampionQuoteRow {
    pub event_id: String,
    pub sector_id: String,
    pub price: String,
    pub is_active: i32,
}

impl ChampionQuoteRow {
    pub fn to_quote(&self) -> Result<Quote> {
        Ok(Quote {
            price: parse_amount(&self.price)?,
            is_active: self.is_active != 0,
        })
    }
}

/// Database row for a scorer quote, which doubles as the event's finalized
/// scorer record (`scored`, `goals`).
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = scorer_quotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScorerQuoteRow {
    pub event_id: String,
    pub player_id: String,
    pub price: String,
    pub is_active: i32,
    pub scored: i32,
    pub goals: i32,
}

impl ScorerQuoteRow {
    pub fn to_quote(&self) -> Result<Quote> {
        Ok(Quote {
            price: parse_amount(&self.price)?,
            is_active: self.is_active != 0,
        })
    }
}

/// Database row for a wager.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = wagers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WagerRow {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub market: String,
    pub selection: String,
    pub stake: String,
    pub price_at_placement: String,
    pub potential_payout: String,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl WagerRow {
    pub fn from_domain(wager: &Wager) -> Result<Self> {
        Ok(Self {
            id: wager.id.to_string(),
            user_id: wager.user_id.to_string(),
            event_id: wager.event_id.to_string(),
            market: wager.selection.market().to_string(),
            selection: serde_json::to_string(&wager.selection)
                .map_err(|e| Error::Parse(e.to_string()))?,
            stake: wager.stake.to_string(),
            price_at_placement: wager.price_at_placement.to_string(),
            potential_payout: wager.potential_payout.to_string(),
            status: wager.status.as_str().to_string(),
            created_at: wager.created_at.to_rfc3339(),
            resolved_at: wager.resolved_at.map(|t| t.to_rfc3339()),
        })
    }

    pub fn to_domain(&self) -> Result<Wager> {
        let selection: Selection =
            serde_json::from_str(&self.selection).map_err(|e| Error::Parse(e.to_string()))?;
        Ok(Wager {
            id: WagerId::from(self.id.clone()),
            user_id: UserId::from(self.user_id.clone()),
            event_id: EventId::from(self.event_id.clone()),
            selection,
            stake: parse_amount(&self.stake)?,
            price_at_placement: parse_amount(&self.price_at_placement)?,
            potential_payout: parse_amount(&self.potential_payout)?,
            status: parse_status(&self.status, WagerStatus::parse, "wager status")?,
            created_at: parse_timestamp(&self.created_at)?,
            resolved_at: self
                .resolved_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}

/// Database row for a profit approval.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = profit_approvals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ApprovalRow {
    pub id: String,
    pub user_id: String,
    pub wager_id: String,
    pub market: String,
    pub principal: String,
    pub profit: String,
    pub price_at_placement: String,
    pub description: String,
    pub status: String,
    pub reviewer_id: Option<String>,
    pub decided_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
}

impl ApprovalRow {
    pub fn from_domain(approval: &ProfitApproval) -> Self {
        Self {
            id: approval.id.to_string(),
            user_id: approval.user_id.to_string(),
            wager_id: approval.wager_id.to_string(),
            market: approval.market.clone(),
            principal: approval.principal.to_string(),
            profit: approval.profit.to_string(),
            price_at_placement: approval.price_at_placement.to_string(),
            description: approval.description.clone(),
            status: approval.status.as_str().to_string(),
            reviewer_id: approval.reviewer_id.as_ref().map(ToString::to_string),
            decided_at: approval.decided_at.map(|t| t.to_rfc3339()),
            rejection_reason: approval.rejection_reason.clone(),
            created_at: approval.created_at.to_rfc3339(),
        }
    }

    pub fn to_domain(&self) -> Result<ProfitApproval> {
        Ok(ProfitApproval {
            id: ApprovalId::from(self.id.clone()),
            user_id: UserId::from(self.user_id.clone()),
            wager_id: WagerId::from(self.wager_id.clone()),
            market: self.market.clone(),
            principal: parse_amount(&self.principal)?,
            profit: parse_amount(&self.profit)?,
            price_at_placement: parse_amount(&self.price_at_placement)?,
            description: self.description.clone(),
            status: parse_status(&self.status, ApprovalStatus::parse, "approval status")?,
            reviewer_id: self.reviewer_id.clone().map(UserId::from),
            decided_at: self.decided_at.as_deref().map(parse_timestamp).transpose()?,
            rejection_reason: self.rejection_reason.clone(),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
