//! Monetary types for stake and price representation.

use rust_decimal::Decimal;

/// An amount of the virtual currency (C$), represented as a Decimal for
/// precision.
pub type Amount = Decimal;

/// A price (odds multiplier) applied to a stake, always >= 1.00.
pub type Price = Decimal;

/// Potential payout of a wager, fixed at placement time.
#[must_use]
pub fn potential_payout(stake: Amount, price: Price) -> Amount {
    stake * price
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payout_is_stake_times_price() {
        assert_eq!(potential_payout(dec!(20.00), dec!(3.00)), dec!(60.0000));
    }

    #[test]
    fn payout_keeps_decimal_precision() {
        assert_eq!(potential_payout(dec!(10.50), dec!(1.85)), dec!(19.4250));
    }
}
