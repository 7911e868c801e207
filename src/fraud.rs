use rust_decimal::Decimal;

/// Any transfer at or above this amount is flagged outright.
pub const SUSPICIOUS_FLAT_AMOUNT: i64 = 5_000;

/// A transfer of half the pre-debit balance or more is flagged, however
/// small. Stateless single-transaction heuristic; it never looks at history
/// and never blocks the transfer.
pub fn is_suspicious(amount: Decimal, balance_before_debit: Decimal) -> bool {
    amount >= Decimal::from(SUSPICIOUS_FLAT_AMOUNT)
        || amount * Decimal::from(2) >= balance_before_debit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn flat_threshold_triggers_regardless_of_balance() {
        // 5000 out of 100000 is only 5% of the balance; the flat rule alone
        // flags it, which is the OR semantics.
        assert!(is_suspicious(dec(5_000), dec(100_000)));
        assert!(is_suspicious(dec(5_000), dec(10_000)));
        assert!(is_suspicious(dec(80_000), dec(1_000_000)));
    }

    #[test]
    fn half_balance_triggers_for_small_amounts() {
        assert!(is_suspicious(dec(600), dec(1_000)));
        assert!(is_suspicious(dec(500), dec(1_000))); // exactly half
    }

    #[test]
    fn modest_transfers_pass() {
        assert!(!is_suspicious(dec(400), dec(10_000)));
        assert!(!is_suspicious(dec(4_999), dec(100_000)));
        assert!(!is_suspicious("499.99".parse().unwrap(), dec(1_000)));
    }
}
