//! Domain validation errors for core domain types.
//!
//! These errors are returned by `try_new` constructors and transition
//! methods that validate domain rules before any storage is touched.

use thiserror::Error;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    /// Stakes must be positive.
    #[error("stake must be positive, got {stake}")]
    NonPositiveStake {
        /// The invalid stake that was provided.
        stake: rust_decimal::Decimal,
    },

    /// The stake is below the configured placement floor.
    #[error("stake {stake} is below the minimum of {minimum}")]
    StakeBelowMinimum {
        stake: rust_decimal::Decimal,
        minimum: rust_decimal::Decimal,
    },

    /// Prices are multipliers on the stake and can never be below 1.00.
    #[error("price must be at least 1.00, got {price}")]
    PriceBelowOne {
        /// The invalid price that was provided.
        price: rust_decimal::Decimal,
    },

    /// Ledger amounts must be positive; direction is carried by the kind.
    #[error("amount must be positive, got {amount}")]
    NonPositiveAmount { amount: rust_decimal::Decimal },

    /// A match event was expected but the event is a tournament, or vice
    /// versa.
    #[error("selection {selection} is not offered by this event")]
    SelectionNotOffered { selection: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn messages_include_offending_values() {
        let err = DomainError::PriceBelowOne { price: dec!(0.95) };
        assert!(err.to_string().contains("0.95"));

        let err = DomainError::StakeBelowMinimum {
            stake: dec!(0.50),
            minimum: dec!(1.00),
        };
        assert!(err.to_string().contains("0.50"));
        assert!(err.to_string().contains("1.00"));
    }
}
