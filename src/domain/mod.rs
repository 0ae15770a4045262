//! Pure domain types for the wagering ledger and settlement engine.
//!
//! Nothing in this module touches storage; invariants that require
//! atomicity (balance mutation, status check-and-set) live behind the
//! services in [`crate::ledger`] and [`crate::engine`].

pub mod approval;
pub mod entry;
pub mod error;
pub mod event;
pub mod id;
pub mod money;
pub mod report;
pub mod wager;

pub use approval::{ApprovalStatus, ProfitApproval};
pub use entry::{EntryKind, LedgerEntry};
pub use error::DomainError;
pub use event::{Event, EventKind, EventStatus, FinalOutcome, MatchPick, MatchPrices, Outcome};
pub use id::{ApprovalId, EventId, PlayerId, SectorId, UserId, WagerId};
pub use money::{potential_payout, Amount, Price};
pub use report::{SettlementFailure, SettlementReport};
pub use wager::{Selection, Wager, WagerStatus};
