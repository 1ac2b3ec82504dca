// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;

use bio::data_structures::interval_tree::ArrayBackedIntervalTree;
use itertools::Itertools;

use super::GenomicInterval;

/// Static index over a fixed set of intervals, answering overlap queries with one
/// array backed interval tree per contig.
#[derive(Debug, Default)]
pub struct IntervalIndex {
    intervals: Vec<GenomicInterval>,
    trees: HashMap<String, ArrayBackedIntervalTree<u64, usize>>,
}

impl IntervalIndex {
    /// Build the index. Duplicate intervals are indexed once.
    pub fn build(intervals: impl IntoIterator<Item = GenomicInterval>) -> Self {
        let intervals = intervals.into_iter().sorted().dedup().collect_vec();

        let mut trees: HashMap<String, ArrayBackedIntervalTree<u64, usize>> = HashMap::new();
        for (id, interval) in intervals.iter().enumerate() {
            trees
                .entry(interval.contig().to_owned())
                .or_insert_with(ArrayBackedIntervalTree::new)
                // closed 1-based to half-open
                .insert(interval.start()..interval.end() + 1, id);
        }
        for tree in trees.values_mut() {
            tree.index();
        }

        IntervalIndex { intervals, trees }
    }

    /// All indexed intervals overlapping the query, ordered by contig, start and end.
    pub fn overlapping(&self, query: &GenomicInterval) -> Vec<GenomicInterval> {
        self.overlapping_ids(query)
            .into_iter()
            .map(|id| self.intervals[id].clone())
            .collect()
    }

    /// Like `overlapping`, but returning the positions of the intervals in the index.
    pub(crate) fn overlapping_ids(&self, query: &GenomicInterval) -> Vec<usize> {
        match self.trees.get(query.contig()) {
            Some(tree) => tree
                .find(query.start()..query.end() + 1)
                .into_iter()
                .map(|entry| *entry.data())
                .sorted()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn get(&self, id: usize) -> &GenomicInterval {
        &self.intervals[id]
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(contig: &str, start: u64, end: u64) -> GenomicInterval {
        GenomicInterval::new(contig, start, end).unwrap()
    }

    fn naive(
        intervals: &[GenomicInterval],
        query: &GenomicInterval,
    ) -> Vec<GenomicInterval> {
        intervals
            .iter()
            .filter(|i| i.overlaps(query))
            .cloned()
            .sorted()
            .dedup()
            .collect()
    }

    #[test]
    fn test_overlapping_matches_naive_scan() {
        let intervals = vec![
            iv("chr1", 1, 100),
            iv("chr1", 101, 200),
            iv("chr1", 50, 150),
            iv("chr1", 300, 300),
            iv("chr1", 1, 1000),
            iv("chr2", 1, 100),
            iv("chr1", 101, 200),
        ];
        let index = IntervalIndex::build(intervals.clone());
        assert_eq!(index.len(), 6);

        let queries = vec![
            iv("chr1", 100, 101),
            iv("chr1", 201, 299),
            iv("chr1", 300, 300),
            iv("chr1", 1001, 2000),
            iv("chr2", 100, 100),
            iv("chr3", 1, 10),
            iv("chr1", 1, 1),
        ];
        for query in &queries {
            assert_eq!(index.overlapping(query), naive(&intervals, query));
        }
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let index = IntervalIndex::build(vec![iv("chr1", 10, 20)]);
        assert_eq!(index.overlapping(&iv("chr1", 20, 30)).len(), 1);
        assert_eq!(index.overlapping(&iv("chr1", 1, 10)).len(), 1);
        assert!(index.overlapping(&iv("chr1", 21, 30)).is_empty());
        assert!(index.overlapping(&iv("chr1", 1, 9)).is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index = IntervalIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.overlapping(&iv("chr1", 1, 10)).is_empty());
    }
}
