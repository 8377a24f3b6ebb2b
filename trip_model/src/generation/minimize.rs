use std::collections::{BTreeMap, BTreeSet};

use map_model::IntersectionID;

use crate::TripID;

/// Finds trips whose coverage is already handled by other trips. This is a greedy set cover, not
/// an optimal one.
///
/// Trips are ordered by (coverage size, ID). Starting from the largest, a trip is redundant if
/// removing the coverage of every other trip not yet marked redundant (also starting from the
/// largest) leaves nothing.
pub fn find_redundant_trips(
    coverage: &BTreeMap<TripID, BTreeSet<IntersectionID>>,
) -> BTreeSet<TripID> {
    let mut order: Vec<TripID> = coverage.keys().cloned().collect();
    order.sort_by_key(|id| (coverage[id].len(), *id));

    let mut redundant = BTreeSet::new();
    for trip in order.iter().rev() {
        let mut remaining = coverage[trip].clone();
        for other in order.iter().rev() {
            if other == trip || redundant.contains(other) {
                continue;
            }
            for i in &coverage[other] {
                remaining.remove(i);
            }
            if remaining.is_empty() {
                break;
            }
        }
        if remaining.is_empty() {
            redundant.insert(*trip);
        }
    }
    redundant
}
