//! Settlement: deciding every pending wager of a finished event.
//!
//! Each wager settles in its own unit of work, guarded by a conditional
//! status update, so re-invoking settlement (or two invocations racing)
//! decides a wager exactly once. A win credits the principal back right
//! away and files the profit for manual review; a loss touches nothing,
//! the stake having left the balance at placement.

use chrono::Utc;
use diesel::prelude::*;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::domain::approval::{ApprovalStatus, ProfitApproval};
use crate::domain::entry::EntryKind;
use crate::domain::event::{EventStatus, FinalOutcome};
use crate::domain::id::{ApprovalId, EventId, WagerId};
use crate::domain::report::{SettlementFailure, SettlementReport};
use crate::domain::wager::WagerStatus;
use crate::error::{Error, Result};
use crate::ledger::post_credit;
use crate::store::model::{ApprovalRow, WagerRow};
use crate::store::schema::{profit_approvals, wagers};
use crate::store::{with_immediate_tx, DbPool};

use super::events::{load_event, load_final_outcome};

enum Decision {
    Won,
    Lost,
    Skipped,
}

/// Decide a single wager inside an open unit of work.
fn settle_one(
    conn: &mut SqliteConnection,
    wager_id: &WagerId,
    outcome: &FinalOutcome,
) -> Result<Decision> {
    let row: Option<WagerRow> = wagers::table
        .find(wager_id.as_str())
        .first(conn)
        .optional()?;
    let wager = row
        .ok_or_else(|| Error::NotFound {
            entity: "wager",
            id: wager_id.to_string(),
        })?
        .to_domain()?;
    if wager.status.is_terminal() {
        return Ok(Decision::Skipped);
    }

    let won = wager.selection.matches(outcome);
    let next = if won {
        WagerStatus::Won
    } else {
        WagerStatus::Lost
    };

    // The status move is conditional on the wager still being pending, so
    // a concurrent settlement cannot decide the same wager twice.
    let updated = diesel::update(
        wagers::table
            .find(wager_id.as_str())
            .filter(wagers::status.eq(WagerStatus::Pending.as_str())),
    )
    .set((
        wagers::status.eq(next.as_str()),
        wagers::resolved_at.eq(Some(Utc::now().to_rfc3339())),
    ))
    .execute(conn)?;
    if updated == 0 {
        return Ok(Decision::Skipped);
    }

    if !won {
        return Ok(Decision::Lost);
    }

    post_credit(
        conn,
        &wager.user_id,
        wager.stake,
        EntryKind::PrincipalRefund,
        "principal refund",
        Some(&wager.id),
    )?;

    let profit = wager.profit();
    if profit > Decimal::ZERO {
        let approval = ProfitApproval {
            id: ApprovalId::generate(),
            user_id: wager.user_id.clone(),
            wager_id: wager.id.clone(),
            market: wager.selection.market().to_string(),
            principal: wager.stake,
            profit,
            price_at_placement: wager.price_at_placement,
            description: format!("profit on {}", wager.selection),
            status: ApprovalStatus::Pending,
            reviewer_id: None,
            decided_at: None,
            rejection_reason: None,
            created_at: Utc::now(),
        };
        diesel::insert_into(profit_approvals::table)
            .values(&ApprovalRow::from_domain(&approval))
            .execute(conn)?;
    }
    Ok(Decision::Won)
}

/// Settles the wagers of finished events.
#[derive(Clone)]
pub struct Settlement {
    pool: DbPool,
    storage: StorageConfig,
}

impl Settlement {
    #[must_use]
    pub fn new(pool: DbPool, storage: StorageConfig) -> Self {
        Self { pool, storage }
    }

    /// Settle every pending wager on a finished event.
    ///
    /// Idempotent: already-decided wagers are counted as skipped, and a
    /// failing wager is reported without aborting the rest of the batch.
    pub fn settle_event(&self, event_id: &EventId) -> Result<SettlementReport> {
        let (outcome, pending) = {
            let mut conn = self
                .pool
                .get()
                .map_err(|e| Error::Connection(e.to_string()))?;
            let event = load_event(&mut conn, event_id)?;
            if event.status != EventStatus::Finished {
                return Err(Error::EventNotFinal {
                    reason: format!("event is {}", event.status),
                });
            }
            let outcome = load_final_outcome(&mut conn, &event)?;
            let pending: Vec<String> = wagers::table
                .filter(wagers::event_id.eq(event_id.as_str()))
                .filter(wagers::status.eq(WagerStatus::Pending.as_str()))
                .order(wagers::created_at.asc())
                .select(wagers::id)
                .load(&mut conn)?;
            (outcome, pending)
        };

        let mut report = SettlementReport::default();
        for id in pending {
            let wager_id = WagerId::from(id);
            let result = with_immediate_tx(&self.pool, &self.storage, |conn| {
                settle_one(conn, &wager_id, &outcome)
            });
            match result {
                Ok(Decision::Won) => report.won += 1,
                Ok(Decision::Lost) => report.lost += 1,
                Ok(Decision::Skipped) => report.skipped += 1,
                Err(err) => {
                    warn!(wager = %wager_id, %err, "wager settlement failed");
                    report.failures.push(SettlementFailure {
                        wager_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            event = %event_id,
            won = report.won,
            lost = report.lost,
            skipped = report.skipped,
            failed = report.failures.len(),
            "settled event"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BettingConfig;
    use crate::domain::event::MatchPick;
    use crate::domain::id::{PlayerId, SectorId, UserId};
    use crate::domain::wager::Selection;
    use crate::engine::events::EventAdmin;
    use crate::engine::placement::Placement;
    use crate::ledger::Ledger;
    use crate::store::connection::memory_pool;
    use rust_decimal_macros::dec;

    struct Fixture {
        ledger: Ledger,
        events: EventAdmin,
        placement: Placement,
        settlement: Settlement,
    }

    fn fixture() -> Fixture {
        let pool = memory_pool();
        let storage = StorageConfig::default();
        Fixture {
            ledger: Ledger::new(pool.clone(), storage.clone()),
            events: EventAdmin::new(pool.clone(), storage.clone()),
            placement: Placement::new(pool.clone(), storage.clone(), BettingConfig::default()),
            settlement: Settlement::new(pool, storage),
        }
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    fn funded_match(fx: &Fixture) -> EventId {
        fx.ledger.open_account(&alice(), dec!(100.00)).unwrap();
        fx.events
            .create_match(
                "Engineering vs Sales",
                SectorId::from("engineering"),
                SectorId::from("sales"),
                dec!(3.00),
                dec!(3.20),
                dec!(2.40),
            )
            .unwrap()
            .id
    }

    fn pending_approvals(fx: &Fixture, user: &UserId) -> Vec<ProfitApproval> {
        let mut conn = fx.settlement.pool.get().unwrap();
        let rows: Vec<ApprovalRow> = profit_approvals::table
            .filter(profit_approvals::user_id.eq(user.as_str()))
            .load(&mut conn)
            .unwrap();
        rows.iter().map(|r| r.to_domain().unwrap()).collect()
    }

    #[test]
    fn winning_wager_gets_principal_back_and_profit_withheld() {
        let fx = fixture();
        let event_id = funded_match(&fx);
        let wager = fx
            .placement
            .place_wager(
                &alice(),
                &event_id,
                Selection::MatchResult {
                    pick: MatchPick::Home,
                },
                dec!(20.00),
            )
            .unwrap();
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(80.00));

        fx.events.set_live(&event_id).unwrap();
        fx.events.record_score(&event_id, 2, 0).unwrap();
        fx.events.finish_match(&event_id).unwrap();

        let report = fx.settlement.settle_event(&event_id).unwrap();
        assert_eq!(report.won, 1);
        assert_eq!(report.total(), 1);
        assert!(report.is_clean());

        // Principal back, profit still withheld.
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(100.00));
        let approvals = pending_approvals(&fx, &alice());
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].wager_id, wager.id);
        assert_eq!(approvals[0].principal, dec!(20.00));
        assert_eq!(approvals[0].profit, dec!(40.00));
        assert_eq!(approvals[0].status, ApprovalStatus::Pending);
        assert!(fx.ledger.audit(&alice()).unwrap());
    }

    #[test]
    fn losing_wager_moves_no_money() {
        let fx = fixture();
        let event_id = funded_match(&fx);
        fx.placement
            .place_wager(
                &alice(),
                &event_id,
                Selection::MatchResult {
                    pick: MatchPick::Away,
                },
                dec!(20.00),
            )
            .unwrap();

        fx.events.set_live(&event_id).unwrap();
        fx.events.record_score(&event_id, 2, 0).unwrap();
        fx.events.finish_match(&event_id).unwrap();

        let report = fx.settlement.settle_event(&event_id).unwrap();
        assert_eq!(report.lost, 1);
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(80.00));
        assert!(pending_approvals(&fx, &alice()).is_empty());
        // Stake debit plus opening credit, nothing else.
        assert_eq!(fx.ledger.history(&alice()).unwrap().len(), 2);
    }

    #[test]
    fn settling_twice_changes_nothing() {
        let fx = fixture();
        let event_id = funded_match(&fx);
        fx.placement
            .place_wager(
                &alice(),
                &event_id,
                Selection::MatchResult {
                    pick: MatchPick::Home,
                },
                dec!(20.00),
            )
            .unwrap();
        fx.events.set_live(&event_id).unwrap();
        fx.events.record_score(&event_id, 1, 0).unwrap();
        fx.events.finish_match(&event_id).unwrap();

        let first = fx.settlement.settle_event(&event_id).unwrap();
        assert_eq!(first.won, 1);
        let balance = fx.ledger.balance(&alice()).unwrap();
        let entries = fx.ledger.history(&alice()).unwrap().len();

        let second = fx.settlement.settle_event(&event_id).unwrap();
        assert_eq!(second.won, 0);
        assert_eq!(second.total(), 0, "no pending wagers remain to visit");
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), balance);
        assert_eq!(fx.ledger.history(&alice()).unwrap().len(), entries);
        assert_eq!(pending_approvals(&fx, &alice()).len(), 1);
    }

    #[test]
    fn unfinished_event_cannot_settle() {
        let fx = fixture();
        let event_id = funded_match(&fx);

        let err = fx.settlement.settle_event(&event_id).unwrap_err();
        assert!(matches!(err, Error::EventNotFinal { .. }));

        fx.events.set_live(&event_id).unwrap();
        let err = fx.settlement.settle_event(&event_id).unwrap_err();
        assert!(matches!(err, Error::EventNotFinal { .. }));
    }

    #[test]
    fn scorer_wagers_settle_from_the_recorded_scorer_set() {
        let fx = fixture();
        let event_id = funded_match(&fx);
        let carol = PlayerId::from("carol");
        let dave = PlayerId::from("dave");
        fx.events.add_scorer_quote(&event_id, &carol, dec!(5.00)).unwrap();
        fx.events.add_scorer_quote(&event_id, &dave, dec!(7.50)).unwrap();

        let bob = UserId::from("bob");
        fx.ledger.open_account(&bob, dec!(50.00)).unwrap();
        fx.placement
            .place_wager(
                &alice(),
                &event_id,
                Selection::Scorer {
                    player: carol.clone(),
                },
                dec!(10.00),
            )
            .unwrap();
        fx.placement
            .place_wager(
                &bob,
                &event_id,
                Selection::Scorer {
                    player: dave.clone(),
                },
                dec!(10.00),
            )
            .unwrap();

        fx.events.set_live(&event_id).unwrap();
        fx.events.record_score(&event_id, 1, 0).unwrap();
        fx.events.record_scorers(&event_id, &[(carol, 1)]).unwrap();
        fx.events.finish_match(&event_id).unwrap();

        let report = fx.settlement.settle_event(&event_id).unwrap();
        assert_eq!(report.won, 1);
        assert_eq!(report.lost, 1);

        // Carol scored: alice gets her principal back and a review entry.
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(100.00));
        assert_eq!(pending_approvals(&fx, &alice()).len(), 1);
        // Dave did not: bob keeps nothing.
        assert_eq!(fx.ledger.balance(&bob).unwrap(), dec!(40.00));
        assert!(pending_approvals(&fx, &bob).is_empty());
    }

    #[test]
    fn tournament_champion_settles_against_the_named_sector() {
        let fx = fixture();
        fx.ledger.open_account(&alice(), dec!(100.00)).unwrap();
        let cup = fx
            .events
            .create_tournament(
                "Office Cup",
                &[
                    (SectorId::from("engineering"), dec!(2.50)),
                    (SectorId::from("sales"), dec!(4.00)),
                ],
            )
            .unwrap();
        fx.placement
            .place_wager(
                &alice(),
                &cup.id,
                Selection::Champion {
                    sector: SectorId::from("sales"),
                },
                dec!(10.00),
            )
            .unwrap();

        fx.events
            .finish_tournament(&cup.id, &SectorId::from("sales"))
            .unwrap();
        let report = fx.settlement.settle_event(&cup.id).unwrap();
        assert_eq!(report.won, 1);
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(100.00));
        assert_eq!(pending_approvals(&fx, &alice())[0].profit, dec!(30.00));
    }

    #[test]
    fn even_money_win_files_no_approval() {
        let fx = fixture();
        fx.ledger.open_account(&alice(), dec!(100.00)).unwrap();
        let event = fx
            .events
            .create_match(
                "Engineering vs Sales",
                SectorId::from("engineering"),
                SectorId::from("sales"),
                dec!(1.00),
                dec!(3.20),
                dec!(2.40),
            )
            .unwrap();
        fx.placement
            .place_wager(
                &alice(),
                &event.id,
                Selection::MatchResult {
                    pick: MatchPick::Home,
                },
                dec!(20.00),
            )
            .unwrap();
        fx.events.set_live(&event.id).unwrap();
        fx.events.record_score(&event.id, 1, 0).unwrap();
        fx.events.finish_match(&event.id).unwrap();

        let report = fx.settlement.settle_event(&event.id).unwrap();
        assert_eq!(report.won, 1);
        // Payout equals stake at a 1.00 placement price: nothing to review.
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(100.00));
        assert!(pending_approvals(&fx, &alice()).is_empty());
    }
}
