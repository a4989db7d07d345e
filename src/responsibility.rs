use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::config::AlertThresholds;
use crate::models::{OwnerAggregate, OwnerKey, Protocol};

const UNASSIGNED_LABEL: &str = "unassigned";

/// Folds one sample into a running mean without keeping history.
pub fn incremental_mean(average: f64, count_before: usize, sample: f64) -> f64 {
    let count = count_before as f64;
    (average * count + sample) / (count + 1.0)
}

/// Groups protocols stalled at least `warning_days` by owner, most loaded
/// owner first.
///
/// Owner-less protocols land in one `unassigned` group. Its average stays at
/// 0 unless `unassigned_average` is set.
pub fn aggregate_by_owner(
    protocols: &[Protocol],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<OwnerAggregate> {
    let groups = protocols
        .iter()
        .map(|protocol| (protocol, protocol.days_stalled(now)))
        .filter(|(_, days_stalled)| *days_stalled >= thresholds.warning_days)
        .fold(BTreeMap::<OwnerKey, OwnerAggregate>::new(), |mut groups, (protocol, days_stalled)| {
            let (key, display_name) = match &protocol.owner {
                Some(owner) => (OwnerKey::Owner(owner.id.clone()), owner.display_name.as_str()),
                None => (OwnerKey::Unassigned, UNASSIGNED_LABEL),
            };
            let fold_average = key != OwnerKey::Unassigned || thresholds.unassigned_average;

            let entry = groups.entry(key).or_insert_with_key(|key| OwnerAggregate {
                owner: key.clone(),
                display_name: display_name.to_string(),
                critical_count: 0,
                types_involved: BTreeSet::new(),
                running_average_stall_days: 0.0,
            });

            if fold_average {
                entry.running_average_stall_days = incremental_mean(
                    entry.running_average_stall_days,
                    entry.critical_count,
                    days_stalled as f64,
                );
            }
            entry.critical_count += 1;
            entry.types_involved.insert(protocol.kind);
            groups
        });

    let mut aggregates: Vec<OwnerAggregate> = groups.into_values().collect();
    aggregates.sort_by(|a, b| b.critical_count.cmp(&a.critical_count));
    aggregates
}

pub fn is_bottleneck(aggregate: &OwnerAggregate, thresholds: &AlertThresholds) -> bool {
    aggregate.critical_count >= thresholds.bottleneck_count
}

pub fn bottlenecks<'a>(
    aggregates: &'a [OwnerAggregate],
    thresholds: &AlertThresholds,
) -> Vec<&'a OwnerAggregate> {
    aggregates
        .iter()
        .filter(|aggregate| is_bottleneck(aggregate, thresholds))
        .collect()
}
