//! Grouping accepted samples by output destination

use crate::measurement::{Measurement, Payload};

/// Materialize each accepted measurement once and fan its payloads out to
/// every destination it lists. Destinations keep the order in which they
/// first appear.
pub fn group_by_destination(
    measurements: &mut [Measurement],
    accepted: &[usize],
    current_only: bool,
) -> Vec<(String, Vec<Payload>)> {
    let mut groups: Vec<(String, Vec<Payload>)> = Vec::new();
    for &index in accepted {
        let Some(measurement) = measurements.get_mut(index) else {
            continue;
        };
        let payloads = measurement.materialize_payloads(current_only);
        for destination in &measurement.policy.outputs {
            let slot = match groups.iter().position(|(name, _)| name == destination) {
                Some(slot) => slot,
                None => {
                    groups.push((destination.clone(), Vec::new()));
                    groups.len() - 1
                },
            };
            groups[slot].1.extend(payloads.iter().cloned());
        }
    }
    groups.retain(|(_, payloads)| !payloads.is_empty());
    groups
}
