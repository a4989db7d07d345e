use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AlertThresholds;
use crate::financial::{financial_exposure, total_stalled_value};
use crate::models::{FinancialAlert, OwnerAggregate, Protocol, RiskAlert, TimeAlert};
use crate::responsibility::aggregate_by_owner;
use crate::risk::detect_risks;
use crate::time_alerts::{classify_time_alerts, TimeAlertFilter};

/// The four alert views computed from one protocol snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDashboard {
    pub computed_at: DateTime<Utc>,
    pub protocol_count: usize,
    pub time_alerts: Vec<TimeAlert>,
    pub risk_alerts: Vec<RiskAlert>,
    pub financial_alerts: Vec<FinancialAlert>,
    pub total_stalled_value: f64,
    pub owner_aggregates: Vec<OwnerAggregate>,
}

impl AlertDashboard {
    /// Full recompute over the snapshot. Each view is independent of the others.
    pub fn compute(
        protocols: &[Protocol],
        filter: &TimeAlertFilter,
        thresholds: &AlertThresholds,
        now: DateTime<Utc>,
    ) -> Self {
        let dashboard = Self {
            computed_at: now,
            protocol_count: protocols.len(),
            time_alerts: classify_time_alerts(protocols, filter, thresholds, now),
            risk_alerts: detect_risks(protocols, now),
            financial_alerts: financial_exposure(protocols, thresholds, now),
            total_stalled_value: total_stalled_value(protocols, thresholds, now),
            owner_aggregates: aggregate_by_owner(protocols, thresholds, now),
        };
        tracing::debug!(
            protocols = dashboard.protocol_count,
            time = dashboard.time_alerts.len(),
            risk = dashboard.risk_alerts.len(),
            financial = dashboard.financial_alerts.len(),
            owners = dashboard.owner_aggregates.len(),
            "dashboard computed"
        );
        dashboard
    }

    pub fn empty(now: DateTime<Utc>) -> Self {
        Self::compute(&[], &TimeAlertFilter::default(), &AlertThresholds::default(), now)
    }
}

/// Holds the latest dashboard, keyed by the snapshot version it was computed
/// from. A result from an older snapshot never replaces a newer one, whatever
/// order the computations finish in.
#[derive(Debug, Default)]
pub struct VersionedDashboard {
    current: Option<(u64, AlertDashboard)>,
}

impl VersionedDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and drops `dashboard` when `version` is not newer than
    /// the one already held.
    pub fn apply(&mut self, version: u64, dashboard: AlertDashboard) -> bool {
        if let Some((held, _)) = &self.current {
            if version <= *held {
                tracing::debug!(version, held = *held, "discarding stale dashboard");
                return false;
            }
        }
        self.current = Some((version, dashboard));
        true
    }

    pub fn version(&self) -> Option<u64> {
        self.current.as_ref().map(|(version, _)| *version)
    }

    pub fn current(&self) -> Option<&AlertDashboard> {
        self.current.as_ref().map(|(_, dashboard)| dashboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PartyRef, ProtocolKind, ProtocolStatus};
    use chrono::Duration;

    fn sample_protocol(id: &str, days_ago: i64) -> Protocol {
        Protocol {
            id: id.to_string(),
            kind: ProtocolKind::SocialSecurity,
            status: ProtocolStatus::AwaitingDocuments,
            client: PartyRef::new("c-7", "Lucas Almeida"),
            owner: None,
            last_movement_at: Some(Utc::now() - Duration::days(days_ago)),
            sla_days: Some(15),
            financial: None,
        }
    }

    #[test]
    fn empty_snapshot_gives_empty_views() {
        let dashboard = AlertDashboard::empty(Utc::now());
        assert_eq!(dashboard.protocol_count, 0);
        assert!(dashboard.time_alerts.is_empty());
        assert!(dashboard.risk_alerts.is_empty());
        assert!(dashboard.financial_alerts.is_empty());
        assert!(dashboard.owner_aggregates.is_empty());
        assert_eq!(dashboard.total_stalled_value, 0.0);
    }

    #[test]
    fn computes_every_view() {
        let protocols = vec![sample_protocol("a", 50), sample_protocol("b", 3)];
        let dashboard = AlertDashboard::compute(
            &protocols,
            &TimeAlertFilter::default(),
            &AlertThresholds::default(),
            Utc::now(),
        );
        assert_eq!(dashboard.protocol_count, 2);
        assert_eq!(dashboard.time_alerts.len(), 1);
        assert_eq!(dashboard.risk_alerts.len(), 3);
        assert_eq!(dashboard.owner_aggregates.len(), 1);
    }

    #[test]
    fn stale_versions_are_discarded() {
        let now = Utc::now();
        let newer = AlertDashboard::compute(
            &[sample_protocol("a", 50)],
            &TimeAlertFilter::default(),
            &AlertThresholds::default(),
            now,
        );
        let mut state = VersionedDashboard::new();
        assert!(state.apply(2, newer.clone()));
        assert!(!state.apply(1, AlertDashboard::empty(now)));
        assert!(!state.apply(2, AlertDashboard::empty(now)));
        assert_eq!(state.version(), Some(2));
        assert_eq!(state.current(), Some(&newer));

        assert!(state.apply(3, AlertDashboard::empty(now)));
        assert_eq!(state.current().map(|d| d.protocol_count), Some(0));
    }
}
