//! Trend selection

use crate::domain::report::value_objects::FrequencyMap;

/// Select the `n` highest-count entries from a frequency map.
///
/// Ties break deterministically: count descending, then key ascending. A map
/// with fewer than `n` entries comes back whole.
pub fn get_trending(counts: &FrequencyMap, n: usize) -> FrequencyMap {
    let mut entries: Vec<(&String, &u64)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(n)
        .map(|(key, count)| (key.clone(), *count))
        .collect()
}
