use crate::TradeRecord;

/// Percent change of portfolio value between the oldest and newest record.
///
/// Records must be ordered oldest first. Returns 0.0 with fewer than two
/// records or when the starting value is not positive.
pub fn portfolio_change_pct(records: &[TradeRecord]) -> f64 {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return 0.0;
    };
    if records.len() < 2 {
        return 0.0;
    }

    let initial = first.portfolio_value();
    if initial <= 0.0 || !initial.is_finite() {
        return 0.0;
    }
    (last.portfolio_value() - initial) / initial * 100.0
}
