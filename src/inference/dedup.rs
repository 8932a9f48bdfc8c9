use std::collections::HashSet;

use crate::observation::Observation;

/// Drops row ids and removes exact duplicates, keeping the first occurrence
/// of every observation in input order.
pub fn deduplicate<T>(rows: impl IntoIterator<Item = T>) -> Vec<Observation>
where
    T: Into<Observation>,
{
    let mut seen = HashSet::new();
    rows.into_iter()
        .map(Into::<Observation>::into)
        .filter(|observation| seen.insert(observation.clone()))
        .collect()
}
