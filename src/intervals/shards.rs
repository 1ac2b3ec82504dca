// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;

use super::GenomicInterval;
use crate::errors::Error;
use crate::io::SequenceDictionary;

/// A bounded window of the reference used to partition the join workload.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct ShardBoundary {
    interval: GenomicInterval,
    /// Interval extended by the shard padding (clamped to the contig), used as index key.
    padded_interval: GenomicInterval,
}

impl ShardBoundary {
    pub fn new(interval: GenomicInterval, padding: u64, contig_len: u64) -> Result<Self> {
        let padded_interval = GenomicInterval::new(
            interval.contig().to_owned(),
            interval.start().saturating_sub(padding).max(1),
            interval.end().saturating_add(padding).min(contig_len.max(interval.end())),
        )?;
        Ok(ShardBoundary {
            interval,
            padded_interval,
        })
    }
}

/// Divide an interval into consecutive shards of at most `shard_size` bases.
pub fn divide_into_shards(
    interval: &GenomicInterval,
    shard_size: u64,
    padding: u64,
    dictionary: &dyn SequenceDictionary,
) -> Result<Vec<ShardBoundary>> {
    if shard_size == 0 {
        return Err(Error::InvalidShardSize.into());
    }
    let contig_len = dictionary
        .length_of(interval.contig())
        .ok_or_else(|| Error::UnknownContig {
            contig: interval.contig().to_owned(),
        })?;

    let mut shards = Vec::with_capacity((interval.len() / shard_size + 1) as usize);
    let mut start = interval.start();
    loop {
        let end = start.saturating_add(shard_size - 1).min(interval.end());
        shards.push(ShardBoundary::new(
            GenomicInterval::new(interval.contig().to_owned(), start, end)?,
            padding,
            contig_len,
        )?);
        if end >= interval.end() {
            break;
        }
        start = end + 1;
    }
    Ok(shards)
}
