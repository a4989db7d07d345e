use chrono::{DateTime, Utc};

use crate::config::AlertThresholds;
use crate::models::{FinancialAlert, Protocol};

/// High-value stalled protocols plus any protocol with a recorded loss,
/// ordered by estimated value, largest first.
pub fn financial_exposure(
    protocols: &[Protocol],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<FinancialAlert> {
    let mut alerts: Vec<FinancialAlert> = protocols
        .iter()
        .filter(|protocol| {
            let high_value_stalled = protocol.estimated_value() > thresholds.financial_value
                && protocol.days_stalled(now) > thresholds.warning_days;
            high_value_stalled || protocol.recorded_loss() > 0.0
        })
        .map(|protocol| FinancialAlert {
            protocol_id: protocol.id.clone(),
            estimated_value: protocol.estimated_value(),
            pending_value: protocol.pending_value(),
            has_recorded_loss: protocol.recorded_loss() > 0.0,
        })
        .collect();

    alerts.sort_by(|a, b| b.estimated_value.total_cmp(&a.estimated_value));
    alerts
}

/// Sum of estimated value over every protocol stalled at least
/// `warning_days`, whatever its value. Not the same population as
/// `financial_exposure`.
pub fn total_stalled_value(
    protocols: &[Protocol],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> f64 {
    protocols
        .iter()
        .filter(|protocol| protocol.days_stalled(now) >= thresholds.warning_days)
        .map(Protocol::estimated_value)
        .sum()
}
