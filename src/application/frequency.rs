//! Deduplication and frequency counting
//!
//! Pure multiset accumulation: insertion order never matters and counts are
//! built in a single pass.

use std::collections::BTreeMap;

use crate::domain::report::entities::StackRecord;
use crate::domain::report::value_objects::{
    normalize_deps_list, Ecosystem, FrequencyMap, StackKey,
};

/// Count occurrences of each key in the input.
pub fn populate_key_count<I, S>(items: I) -> FrequencyMap
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut counts = FrequencyMap::new();
    for item in items {
        *counts.entry(item.into()).or_insert(0) += 1;
    }
    counts
}

/// Frequency maps computed per ecosystem from one batch of stack records
#[derive(Debug, Clone, Default)]
pub struct EcosystemFrequencies {
    /// Unique stacks (by [`StackKey`]) with recurrence counts
    pub stacks: FrequencyMap,
    /// Individual dependencies flattened across all stacks
    pub dependencies: FrequencyMap,
    /// Unknown dependencies flattened across all stacks
    pub unknown_dependencies: FrequencyMap,
}

/// Group records by ecosystem and build the three frequency maps for each.
///
/// Records with zero declared dependencies are skipped: not counted, not an
/// error.
pub fn count_frequencies(records: &[StackRecord]) -> BTreeMap<Ecosystem, EcosystemFrequencies> {
    let mut result: BTreeMap<Ecosystem, EcosystemFrequencies> = BTreeMap::new();

    for record in records {
        if record.dependencies.is_empty() {
            continue;
        }
        let entry = result.entry(record.ecosystem).or_default();

        let normalized = normalize_deps_list(&record.dependencies);
        let key = StackKey::from_normalized(&normalized);
        *entry.stacks.entry(key.into_string()).or_insert(0) += 1;

        for dep in normalized {
            *entry.dependencies.entry(dep).or_insert(0) += 1;
        }
        for dep in normalize_deps_list(&record.unknown_dependencies) {
            *entry.unknown_dependencies.entry(dep).or_insert(0) += 1;
        }
    }

    result
}

/// Dependency count for every unique stack key.
pub fn stack_deps_counts(stacks: &FrequencyMap) -> BTreeMap<String, usize> {
    stacks
        .keys()
        .map(|key| {
            let count = if key.is_empty() {
                0
            } else {
                key.split(',').count()
            };
            (key.clone(), count)
        })
        .collect()
}
