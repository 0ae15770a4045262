//! Manual review of withheld profits.
//!
//! Approving credits the profit to the bettor; rejecting forfeits it and
//! keeps the reason on record. Either way the decision happens at most
//! once, and never by the bettor themselves.

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;

use crate::config::StorageConfig;
use crate::domain::approval::{ApprovalStatus, ProfitApproval};
use crate::domain::entry::EntryKind;
use crate::domain::id::{ApprovalId, UserId, WagerId};
use crate::error::{Error, Result};
use crate::ledger::post_credit;
use crate::store::model::ApprovalRow;
use crate::store::schema::profit_approvals;
use crate::store::{with_immediate_tx, DbPool};

fn load_approval(conn: &mut SqliteConnection, id: &ApprovalId) -> Result<ProfitApproval> {
    let row: Option<ApprovalRow> = profit_approvals::table
        .find(id.as_str())
        .first(conn)
        .optional()?;
    match row {
        Some(row) => row.to_domain(),
        None => Err(Error::NotFound {
            entity: "approval",
            id: id.to_string(),
        }),
    }
}

fn guard_reviewable(approval: &ProfitApproval, reviewer: &UserId) -> Result<()> {
    if approval.status.is_decided() {
        return Err(Error::AlreadyDecided {
            status: approval.status.to_string(),
        });
    }
    if &approval.user_id == reviewer {
        return Err(Error::SelfApprovalForbidden {
            reviewer_id: reviewer.to_string(),
        });
    }
    Ok(())
}

/// Decides withheld profits.
#[derive(Clone)]
pub struct Approvals {
    pool: DbPool,
    storage: StorageConfig,
}

impl Approvals {
    #[must_use]
    pub fn new(pool: DbPool, storage: StorageConfig) -> Self {
        Self { pool, storage }
    }

    /// Approve a withheld profit, crediting it to the bettor.
    pub fn approve(&self, approval_id: &ApprovalId, reviewer: &UserId) -> Result<ProfitApproval> {
        let approval = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let mut approval = load_approval(conn, approval_id)?;
            guard_reviewable(&approval, reviewer)?;

            let now = Utc::now();
            let updated = diesel::update(
                profit_approvals::table
                    .find(approval_id.as_str())
                    .filter(profit_approvals::status.eq(ApprovalStatus::Pending.as_str())),
            )
            .set((
                profit_approvals::status.eq(ApprovalStatus::Approved.as_str()),
                profit_approvals::reviewer_id.eq(Some(reviewer.as_str())),
                profit_approvals::decided_at.eq(Some(now.to_rfc3339())),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(Error::AlreadyDecided {
                    status: "decided".to_string(),
                });
            }

            post_credit(
                conn,
                &approval.user_id,
                approval.profit,
                EntryKind::ProfitCredit,
                "profit approved",
                Some(&approval.wager_id),
            )?;

            approval.status = ApprovalStatus::Approved;
            approval.reviewer_id = Some(reviewer.clone());
            approval.decided_at = Some(now);
            Ok(approval)
        })?;
        info!(
            approval = %approval_id,
            reviewer = %reviewer,
            profit = %approval.profit,
            "approved profit"
        );
        Ok(approval)
    }

    /// Reject a withheld profit, forfeiting it. No money moves.
    pub fn reject(
        &self,
        approval_id: &ApprovalId,
        reviewer: &UserId,
        reason: &str,
    ) -> Result<ProfitApproval> {
        let approval = with_immediate_tx(&self.pool, &self.storage, |conn| {
            let mut approval = load_approval(conn, approval_id)?;
            guard_reviewable(&approval, reviewer)?;

            let now = Utc::now();
            let updated = diesel::update(
                profit_approvals::table
                    .find(approval_id.as_str())
                    .filter(profit_approvals::status.eq(ApprovalStatus::Pending.as_str())),
            )
            .set((
                profit_approvals::status.eq(ApprovalStatus::Rejected.as_str()),
                profit_approvals::reviewer_id.eq(Some(reviewer.as_str())),
                profit_approvals::decided_at.eq(Some(now.to_rfc3339())),
                profit_approvals::rejection_reason.eq(Some(reason)),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(Error::AlreadyDecided {
                    status: "decided".to_string(),
                });
            }

            approval.status = ApprovalStatus::Rejected;
            approval.reviewer_id = Some(reviewer.clone());
            approval.decided_at = Some(now);
            approval.rejection_reason = Some(reason.to_string());
            Ok(approval)
        })?;
        info!(approval = %approval_id, reviewer = %reviewer, reason, "rejected profit");
        Ok(approval)
    }

    /// All undecided approvals, oldest first: the review queue.
    pub fn pending(&self) -> Result<Vec<ProfitApproval>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let rows: Vec<ApprovalRow> = profit_approvals::table
            .filter(profit_approvals::status.eq(ApprovalStatus::Pending.as_str()))
            .order(profit_approvals::created_at.asc())
            .load(&mut conn)?;
        rows.iter().map(ApprovalRow::to_domain).collect()
    }

    /// The approval filed for a wager, if any.
    pub fn for_wager(&self, wager_id: &WagerId) -> Result<Option<ProfitApproval>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<ApprovalRow> = profit_approvals::table
            .filter(profit_approvals::wager_id.eq(wager_id.as_str()))
            .first(&mut conn)
            .optional()?;
        row.map(|r| r.to_domain()).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BettingConfig;
    use crate::domain::event::MatchPick;
    use crate::domain::id::SectorId;
    use crate::domain::wager::Selection;
    use crate::engine::events::EventAdmin;
    use crate::engine::placement::Placement;
    use crate::engine::settlement::Settlement;
    use crate::ledger::Ledger;
    use crate::store::connection::memory_pool;
    use rust_decimal_macros::dec;

    struct Fixture {
        ledger: Ledger,
        events: EventAdmin,
        placement: Placement,
        settlement: Settlement,
        approvals: Approvals,
    }

    fn fixture() -> Fixture {
        let pool = memory_pool();
        let storage = StorageConfig::default();
        Fixture {
            ledger: Ledger::new(pool.clone(), storage.clone()),
            events: EventAdmin::new(pool.clone(), storage.clone()),
            placement: Placement::new(pool.clone(), storage.clone(), BettingConfig::default()),
            settlement: Settlement::new(pool.clone(), storage.clone()),
            approvals: Approvals::new(pool, storage),
        }
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    fn reviewer() -> UserId {
        UserId::from("mallory-the-reviewer")
    }

    /// Drive a won wager to the point where its profit awaits review.
    fn withheld_profit(fx: &Fixture) -> ProfitApproval {
        fx.ledger.open_account(&alice(), dec!(100.00)).unwrap();
        let event = fx
            .events
            .create_match(
                "Engineering vs Sales",
                SectorId::from("engineering"),
                SectorId::from("sales"),
                dec!(3.00),
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
        fx.events.record_score(&event.id, 2, 0).unwrap();
        fx.events.finish_match(&event.id).unwrap();
        fx.settlement.settle_event(&event.id).unwrap();

        let mut pending = fx.approvals.pending().unwrap();
        assert_eq!(pending.len(), 1);
        pending.remove(0)
    }

    #[test]
    fn approval_credits_the_profit() {
        let fx = fixture();
        let approval = withheld_profit(&fx);
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(100.00));

        let decided = fx.approvals.approve(&approval.id, &reviewer()).unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
        assert_eq!(decided.reviewer_id, Some(reviewer()));

        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(140.00));
        let entry = fx.ledger.history(&alice()).unwrap().pop().unwrap();
        assert_eq!(entry.kind, EntryKind::ProfitCredit);
        assert_eq!(entry.amount, dec!(40.00));
        assert!(fx.ledger.audit(&alice()).unwrap());
        assert!(fx.approvals.pending().unwrap().is_empty());
    }

    #[test]
    fn rejection_forfeits_the_profit() {
        let fx = fixture();
        let approval = withheld_profit(&fx);

        let decided = fx
            .approvals
            .reject(&approval.id, &reviewer(), "odds pattern flagged")
            .unwrap();
        assert_eq!(decided.status, ApprovalStatus::Rejected);
        assert_eq!(
            decided.rejection_reason.as_deref(),
            Some("odds pattern flagged")
        );

        // Profit stays withheld forever; only the principal was returned.
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(100.00));
        assert!(fx.approvals.pending().unwrap().is_empty());
    }

    #[test]
    fn bettors_cannot_review_their_own_winnings() {
        let fx = fixture();
        let approval = withheld_profit(&fx);

        let err = fx.approvals.approve(&approval.id, &alice()).unwrap_err();
        assert!(matches!(err, Error::SelfApprovalForbidden { .. }));
        let err = fx
            .approvals
            .reject(&approval.id, &alice(), "why not")
            .unwrap_err();
        assert!(matches!(err, Error::SelfApprovalForbidden { .. }));

        // Still pending, still uncredited.
        assert_eq!(fx.approvals.pending().unwrap().len(), 1);
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(100.00));
    }

    #[test]
    fn decisions_are_terminal() {
        let fx = fixture();
        let approval = withheld_profit(&fx);
        fx.approvals.approve(&approval.id, &reviewer()).unwrap();

        let err = fx.approvals.approve(&approval.id, &reviewer()).unwrap_err();
        assert!(matches!(err, Error::AlreadyDecided { .. }));
        let err = fx
            .approvals
            .reject(&approval.id, &reviewer(), "too late")
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyDecided { .. }));

        // The double decision must not have credited twice.
        assert_eq!(fx.ledger.balance(&alice()).unwrap(), dec!(140.00));
    }

    #[test]
    fn unknown_approval_is_not_found() {
        let fx = fixture();
        let err = fx
            .approvals
            .approve(&ApprovalId::from("no-such-approval"), &reviewer())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "approval", .. }));
    }

    #[test]
    fn for_wager_finds_the_filed_approval() {
        let fx = fixture();
        let approval = withheld_profit(&fx);

        let found = fx.approvals.for_wager(&approval.wager_id).unwrap().unwrap();
        assert_eq!(found.id, approval.id);
        assert!(fx
            .approvals
            .for_wager(&WagerId::from("unrelated"))
            .unwrap()
            .is_none());
    }
}
