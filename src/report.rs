use std::collections::HashMap;
use std::fmt::Write;

use crate::config::AlertThresholds;
use crate::dashboard::AlertDashboard;
use crate::models::{AlertTier, OwnerAggregate, PersistedAlert, Protocol};
use crate::responsibility::is_bottleneck;

/// Formats an amount the way the practice reads it, e.g. `R$ 1.234,56`.
/// Non-finite input prints as zero; magnitudes past `u64::MAX` cents clamp
/// to that ceiling.
pub fn format_brl(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let cents = (value.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}R$ {grouped},{:02}", cents % 100)
}

pub fn tier_counts(dashboard: &AlertDashboard) -> Vec<(AlertTier, usize)> {
    [AlertTier::CriticalMax, AlertTier::Critical, AlertTier::Warning]
        .into_iter()
        .map(|tier| {
            let count = dashboard
                .time_alerts
                .iter()
                .filter(|alert| alert.tier == tier)
                .count();
            (tier, count)
        })
        .collect()
}

fn types_label(aggregate: &OwnerAggregate) -> String {
    aggregate
        .types_involved
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_report(
    dashboard: &AlertDashboard,
    protocols: &[Protocol],
    pending: &[PersistedAlert],
    thresholds: &AlertThresholds,
    limit: usize,
) -> String {
    let clients: HashMap<&str, &str> = protocols
        .iter()
        .map(|p| (p.id.as_str(), p.client.display_name.as_str()))
        .collect();
    let client_of = |id: &str| clients.get(id).copied().unwrap_or("unknown client");

    let mut output = String::new();

    let _ = writeln!(output, "# Protocol Alert Dashboard");
    let _ = writeln!(
        output,
        "Generated {} across {} protocols",
        dashboard.computed_at.format("%Y-%m-%d %H:%M UTC"),
        dashboard.protocol_count
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Stalled Protocols");

    if dashboard.time_alerts.is_empty() {
        let _ = writeln!(
            output,
            "No protocol stalled for {} days or more.",
            thresholds.warning_days
        );
    } else {
        for (tier, count) in tier_counts(dashboard) {
            let _ = writeln!(output, "- {tier}: {count}");
        }
        let _ = writeln!(output);
        for alert in dashboard.time_alerts.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} ({}) {} with {} days stalled",
                alert.protocol_id,
                client_of(&alert.protocol_id),
                alert.tier,
                alert.days_stalled
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Operational Risk");

    if dashboard.risk_alerts.is_empty() {
        let _ = writeln!(output, "No unassigned or overdue protocols.");
    } else {
        for alert in dashboard.risk_alerts.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} {} ({}): {}",
                alert.protocol_id, alert.kind, alert.magnitude, alert.suggested_action
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Financial Exposure");
    let _ = writeln!(
        output,
        "Total stalled value: {}",
        format_brl(dashboard.total_stalled_value)
    );

    if dashboard.financial_alerts.is_empty() {
        let _ = writeln!(output, "No high-value stalled protocols or recorded losses.");
    } else {
        for alert in dashboard.financial_alerts.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} ({}) estimated {}, pending {}{}",
                alert.protocol_id,
                client_of(&alert.protocol_id),
                format_brl(alert.estimated_value),
                format_brl(alert.pending_value),
                if alert.has_recorded_loss { ", loss recorded" } else { "" }
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Responsibility");

    if dashboard.owner_aggregates.is_empty() {
        let _ = writeln!(output, "No owner holds stalled protocols.");
    } else {
        for aggregate in dashboard.owner_aggregates.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {}{}: {} critical, avg {:.1} days stalled ({})",
                aggregate.display_name,
                if is_bottleneck(aggregate, thresholds) { " [bottleneck]" } else { "" },
                aggregate.critical_count,
                aggregate.running_average_stall_days,
                types_label(aggregate)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Pending Alerts");

    if pending.is_empty() {
        let _ = writeln!(output, "No pending alerts.");
    } else {
        for alert in pending.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} on {} since {}: {}",
                alert.id,
                alert.protocol_id,
                alert.created_at.date_naive(),
                alert.title
            );
        }
    }

    output
}
