use chrono::{DateTime, Utc};

use crate::models::{Protocol, RiskAlert, RiskKind};

/// Flags missing ownership and SLA breaches. A protocol can raise both.
/// The combined list is ordered by magnitude, largest first, stable on ties.
pub fn detect_risks(protocols: &[Protocol], now: DateTime<Utc>) -> Vec<RiskAlert> {
    let mut alerts = Vec::new();

    for protocol in protocols {
        let days_stalled = protocol.days_stalled(now);

        if protocol.owner.is_none() {
            alerts.push(risk_alert(protocol, RiskKind::Unassigned, days_stalled));
        }

        if let Some(overdue) = sla_overrun(days_stalled, protocol.sla_days) {
            alerts.push(risk_alert(protocol, RiskKind::SlaBreach, overdue));
        }
    }

    alerts.sort_by(|a, b| b.magnitude.cmp(&a.magnitude));
    alerts
}

/// Days past the SLA, only when the SLA is strictly exceeded.
pub fn sla_overrun(days_stalled: i64, sla_days: Option<u32>) -> Option<i64> {
    let sla = i64::from(sla_days?);
    (days_stalled > sla).then(|| days_stalled - sla)
}

fn risk_alert(protocol: &Protocol, kind: RiskKind, magnitude: i64) -> RiskAlert {
    RiskAlert {
        protocol_id: protocol.id.clone(),
        kind,
        magnitude,
        suggested_action: kind.suggested_action().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PartyRef, ProtocolKind, ProtocolStatus};
    use chrono::Duration;

    fn sample_protocol(
        id: &str,
        days_ago: i64,
        owner: Option<&str>,
        sla_days: Option<u32>,
    ) -> Protocol {
        Protocol {
            id: id.to_string(),
            kind: ProtocolKind::LifeInsurance,
            status: ProtocolStatus::Open,
            client: PartyRef::new("c-9", "Beatriz Costa"),
            owner: owner.map(|id| PartyRef::new(id, "Owner")),
            last_movement_at: Some(Utc::now() - Duration::days(days_ago)),
            sla_days,
            financial: None,
        }
    }

    #[test]
    fn unassigned_and_breached_yields_two_alerts() {
        let protocols = vec![sample_protocol("p", 40, None, Some(20))];
        let alerts = detect_risks(&protocols, Utc::now());

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].kind, RiskKind::Unassigned);
        assert_eq!(alerts[0].magnitude, 40);
        assert_eq!(alerts[0].suggested_action, "assign an owner immediately");
        assert_eq!(alerts[1].kind, RiskKind::SlaBreach);
        assert_eq!(alerts[1].magnitude, 20);
        assert_eq!(alerts[1].suggested_action, "review urgently and update status");
    }

    #[test]
    fn sla_must_be_strictly_exceeded() {
        assert_eq!(sla_overrun(20, Some(20)), None);
        assert_eq!(sla_overrun(21, Some(20)), Some(1));
        assert_eq!(sla_overrun(500, None), None);
        assert_eq!(sla_overrun(1, Some(0)), Some(1));
    }

    #[test]
    fn owned_protocol_within_sla_is_quiet() {
        let protocols = vec![sample_protocol("p", 10, Some("emp-1"), Some(15))];
        assert!(detect_risks(&protocols, Utc::now()).is_empty());
    }

    #[test]
    fn unassigned_fires_even_without_stall() {
        let mut protocol = sample_protocol("fresh", 0, None, None);
        protocol.last_movement_at = None;
        let alerts = detect_risks(&[protocol], Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].magnitude, 0);
    }

    #[test]
    fn orders_across_protocols_by_magnitude() {
        let protocols = vec![
            sample_protocol("a", 12, Some("emp-1"), Some(10)),
            sample_protocol("b", 50, Some("emp-2"), Some(5)),
            sample_protocol("c", 30, None, None),
        ];
        let alerts = detect_risks(&protocols, Utc::now());
        let got: Vec<(&str, i64)> = alerts
            .iter()
            .map(|a| (a.protocol_id.as_str(), a.magnitude))
            .collect();
        assert_eq!(got, vec![("b", 45), ("c", 30), ("a", 2)]);
    }
}
