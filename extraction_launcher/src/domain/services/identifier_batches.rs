use std::collections::BTreeSet;
use std::num::NonZeroUsize;

/// Number of batches needed to hold `identifier_count` identifiers
///
/// Without a capacity, all the identifiers go into a single batch.
pub fn batch_count(identifier_count: usize, max_per_batch: Option<NonZeroUsize>) -> usize {
    match (identifier_count, max_per_batch) {
        (0, _) => 0,
        (_, None) => 1,
        (count, Some(max)) => count.div_ceil(max.get()),
    }
}

/// Splits the identifiers of a job into disjoint batches of at most `max_per_batch` identifiers
///
/// Batches follow the set order, only the last one can be partially filled.
/// No batch is produced for an empty set.
pub fn split_into_batches(
    identifiers: &BTreeSet<String>,
    max_per_batch: Option<NonZeroUsize>,
) -> Vec<Vec<String>> {
    if identifiers.is_empty() {
        return vec![];
    }

    let capacity = max_per_batch.map_or(identifiers.len(), NonZeroUsize::get);
    let mut batches = Vec::with_capacity(batch_count(identifiers.len(), max_per_batch));
    let mut current = Vec::with_capacity(capacity.min(identifiers.len()));

    for identifier in identifiers {
        current.push(identifier.clone());

        if current.len() == capacity {
            batches.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
