use chrono::{DateTime, Utc};

use crate::config::AlertThresholds;
use crate::models::{AlertTier, Protocol, ProtocolKind, TimeAlert};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeAlertFilter {
    pub kind: Option<ProtocolKind>,
    pub owner_id: Option<String>,
    pub tier: Option<AlertTier>,
}

impl TimeAlertFilter {
    fn admits(&self, protocol: &Protocol, tier: AlertTier) -> bool {
        if self.kind.is_some_and(|kind| kind != protocol.kind) {
            return false;
        }
        if let Some(owner_id) = self.owner_id.as_deref() {
            if protocol.owner_id() != Some(owner_id) {
                return false;
            }
        }
        self.tier.map_or(true, |wanted| wanted == tier)
    }
}

/// Buckets stalled protocols into tiers, longest stall first.
///
/// Ties keep their input order. No business rule forces that, it just keeps
/// the output reproducible for a given snapshot.
pub fn classify_time_alerts(
    protocols: &[Protocol],
    filter: &TimeAlertFilter,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<TimeAlert> {
    let mut alerts: Vec<TimeAlert> = protocols
        .iter()
        .filter_map(|protocol| {
            let days_stalled = protocol.days_stalled(now);
            let tier = thresholds.tier_for(days_stalled)?;
            filter.admits(protocol, tier).then(|| TimeAlert {
                protocol_id: protocol.id.clone(),
                tier,
                days_stalled,
            })
        })
        .collect();

    alerts.sort_by(|a, b| b.days_stalled.cmp(&a.days_stalled));
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PartyRef, ProtocolStatus};
    use chrono::Duration;

    fn sample_protocol(id: &str, days_ago: i64, owner: Option<&str>) -> Protocol {
        Protocol {
            id: id.to_string(),
            kind: ProtocolKind::Dpvat,
            status: ProtocolStatus::InProgress,
            client: PartyRef::new("c-1", "Rafael Lima"),
            owner: owner.map(|id| PartyRef::new(id, "Owner")),
            last_movement_at: Some(Utc::now() - Duration::days(days_ago)),
            sla_days: None,
            financial: None,
        }
    }

    fn ids(alerts: &[TimeAlert]) -> Vec<&str> {
        alerts.iter().map(|a| a.protocol_id.as_str()).collect()
    }

    #[test]
    fn excludes_recent_movement() {
        let protocols = vec![sample_protocol("a", 29, None), sample_protocol("b", 0, None)];
        let alerts = classify_time_alerts(
            &protocols,
            &TimeAlertFilter::default(),
            &AlertThresholds::default(),
            Utc::now(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn tiers_follow_expected_bands() {
        let protocols = vec![
            sample_protocol("w", 30, None),
            sample_protocol("c", 45, None),
            sample_protocol("m", 60, None),
        ];
        let alerts = classify_time_alerts(
            &protocols,
            &TimeAlertFilter::default(),
            &AlertThresholds::default(),
            Utc::now(),
        );
        let tiers: Vec<AlertTier> = alerts.iter().map(|a| a.tier).collect();
        assert_eq!(
            tiers,
            vec![AlertTier::CriticalMax, AlertTier::Critical, AlertTier::Warning]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let protocols = vec![
            sample_protocol("first", 40, None),
            sample_protocol("top", 70, None),
            sample_protocol("second", 40, None),
            sample_protocol("third", 40, None),
        ];
        let alerts = classify_time_alerts(
            &protocols,
            &TimeAlertFilter::default(),
            &AlertThresholds::default(),
            Utc::now(),
        );
        assert_eq!(ids(&alerts), vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn never_moved_protocol_is_not_stalled() {
        let mut protocol = sample_protocol("x", 90, None);
        protocol.last_movement_at = None;
        let alerts = classify_time_alerts(
            &[protocol],
            &TimeAlertFilter::default(),
            &AlertThresholds::default(),
            Utc::now(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn filters_by_owner_kind_and_tier() {
        let mut labor = sample_protocol("labor", 50, Some("emp-1"));
        labor.kind = ProtocolKind::Labor;
        let protocols = vec![
            labor,
            sample_protocol("dpvat-1", 50, Some("emp-1")),
            sample_protocol("dpvat-2", 65, Some("emp-2")),
            sample_protocol("dpvat-3", 35, Some("emp-1")),
        ];
        let thresholds = AlertThresholds::default();
        let now = Utc::now();

        let by_owner = TimeAlertFilter {
            owner_id: Some("emp-1".to_string()),
            ..TimeAlertFilter::default()
        };
        assert_eq!(
            ids(&classify_time_alerts(&protocols, &by_owner, &thresholds, now)),
            vec!["labor", "dpvat-1", "dpvat-3"]
        );

        let by_kind = TimeAlertFilter {
            kind: Some(ProtocolKind::Labor),
            ..TimeAlertFilter::default()
        };
        assert_eq!(
            ids(&classify_time_alerts(&protocols, &by_kind, &thresholds, now)),
            vec!["labor"]
        );

        let by_tier = TimeAlertFilter {
            tier: Some(AlertTier::Critical),
            ..TimeAlertFilter::default()
        };
        assert_eq!(
            ids(&classify_time_alerts(&protocols, &by_tier, &thresholds, now)),
            vec!["labor", "dpvat-1"]
        );
    }

    #[test]
    fn empty_snapshot_yields_no_alerts() {
        let alerts = classify_time_alerts(
            &[],
            &TimeAlertFilter::default(),
            &AlertThresholds::default(),
            Utc::now(),
        );
        assert!(alerts.is_empty());
    }
}
