// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Sharded overlap join between variant breakpoint windows and aligned contig fragments.
//!
//! Both sides are replicated into every shard they overlap, joined locally per shard and the
//! per-shard results are combined by variant identity. Since a pair that overlaps in several
//! shards is found in each of them, the combined fragment lists are deduplicated.

use std::collections::HashMap;

use anyhow::Result;
use derive_new::new;
use rayon::prelude::*;

use crate::contigs::AlignmentFragment;
use crate::intervals::{divide_into_shards, GenomicInterval, IntervalIndex};
use crate::io::SequenceDictionary;

/// Breakpoint windows of a variant, keyed by its identity.
#[derive(Debug, Clone, PartialEq, new)]
pub struct VariantWindows {
    pub identity: String,
    pub intervals: Vec<GenomicInterval>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct JoinStats {
    shards: usize,
    /// Number of (shard, variant window) entries.
    replicated_windows: usize,
    /// Number of (shard, fragment) entries.
    replicated_fragments: usize,
    /// Overlapping (window, fragment) pairs found over all shards, before deduplication.
    candidate_pairs: usize,
}

#[derive(Debug, Default)]
pub struct Join {
    /// Indices of the overlapping fragments per variant identity, sorted and unique.
    pub fragments: HashMap<String, Vec<usize>>,
    pub stats: JoinStats,
}

type ShardEntries = HashMap<usize, Vec<(usize, GenomicInterval)>>;

pub struct ShardedJoinEngine {
    shards: IntervalIndex,
}

impl ShardedJoinEngine {
    /// Partition the regions of interest into shards of at most `shard_size` bases.
    pub fn new(
        regions: &[GenomicInterval],
        shard_size: u64,
        dictionary: &dyn SequenceDictionary,
    ) -> Result<Self> {
        let mut boundaries = Vec::new();
        for region in regions {
            for shard in divide_into_shards(region, shard_size, 0, dictionary)? {
                boundaries.push(shard.interval().clone());
            }
        }
        Ok(ShardedJoinEngine {
            shards: IntervalIndex::build(boundaries),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shards the given interval is replicated into.
    pub fn shards_of(&self, interval: &GenomicInterval) -> Vec<&GenomicInterval> {
        self.shards
            .overlapping_ids(interval)
            .into_iter()
            .map(|id| self.shards.get(id))
            .collect()
    }

    pub fn join(&self, variants: &[VariantWindows], fragments: &[AlignmentFragment]) -> Join {
        let variant_entries = self.replicate(variants.par_iter().enumerate().flat_map_iter(
            |(i, variant)| variant.intervals.iter().map(move |interval| (i, interval.clone())),
        ));
        let fragment_entries = self.replicate(
            fragments
                .par_iter()
                .enumerate()
                .filter_map(|(i, fragment)| fragment.interval().map(|interval| (i, interval))),
        );

        let count = |entries: &ShardEntries| entries.values().map(|e| e.len()).sum::<usize>();
        let mut stats = JoinStats {
            shards: self.shards.len(),
            replicated_windows: count(&variant_entries),
            replicated_fragments: count(&fragment_entries),
            candidate_pairs: 0,
        };

        let empty = Vec::new();
        let (mut joined, candidate_pairs) = variant_entries
            .par_iter()
            .fold(
                || (HashMap::new(), 0),
                |(mut acc, mut pairs): (HashMap<String, Vec<usize>>, usize), (shard, windows)| {
                    let local = fragment_entries.get(shard).unwrap_or(&empty);
                    for (variant, window) in windows {
                        for (fragment, interval) in local {
                            if window.overlaps(interval) {
                                acc.entry(variants[*variant].identity.clone())
                                    .or_default()
                                    .push(*fragment);
                                pairs += 1;
                            }
                        }
                    }
                    (acc, pairs)
                },
            )
            .reduce(
                || (HashMap::new(), 0),
                |(mut a, a_pairs), (b, b_pairs)| {
                    for (identity, mut indices) in b {
                        a.entry(identity).or_default().append(&mut indices);
                    }
                    (a, a_pairs + b_pairs)
                },
            );
        stats.candidate_pairs = candidate_pairs;

        for indices in joined.values_mut() {
            indices.sort_unstable();
            indices.dedup();
        }

        info!(
            "Joined {} variant windows with {} contig fragments over {} shards ({} candidate pairs).",
            stats.replicated_windows,
            stats.replicated_fragments,
            stats.shards,
            stats.candidate_pairs
        );

        Join {
            fragments: joined,
            stats,
        }
    }

    /// Group (payload, interval) entries by every shard the interval overlaps.
    fn replicate<I>(&self, entries: I) -> ShardEntries
    where
        I: ParallelIterator<Item = (usize, GenomicInterval)>,
    {
        entries
            .fold(ShardEntries::new, |mut acc, (payload, interval)| {
                for shard in self.shards.overlapping_ids(&interval) {
                    acc.entry(shard)
                        .or_default()
                        .push((payload, interval.clone()));
                }
                acc
            })
            .reduce(ShardEntries::new, |mut a, b| {
                for (shard, mut entries) in b {
                    a.entry(shard).or_default().append(&mut entries);
                }
                a
            })
    }
}
