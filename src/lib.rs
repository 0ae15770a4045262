//! A virtual-currency (C$) wagering ledger and settlement engine.
//!
//! Users hold ledger accounts whose every movement is an append-only
//! entry; the stored balance is a cached projection that can be replayed
//! and audited at any time. Stakes are placed against events (matches
//! between sectors, tournaments with a champion market) at the price
//! offered when the wager is accepted. Finishing an event triggers
//! settlement: winners get their principal back immediately, while the
//! profit portion is withheld behind a manual fraud review that someone
//! other than the bettor must decide.
//!
//! [`engine::Engine`] wires every service onto one SQLite database:
//!
//! ```no_run
//! use wagerbook::config::Config;
//! use wagerbook::engine::Engine;
//!
//! # fn main() -> wagerbook::error::Result<()> {
//! let engine = Engine::open("wagerbook.db", &Config::default())?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod odds;
pub mod store;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
pub use ledger::Ledger;
