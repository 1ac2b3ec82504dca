// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Genomic intervals, the static interval index and reference sharding.

use std::fmt;

use anyhow::Result;
use bio_types::genome;

use crate::errors::Error;
use crate::io::SequenceDictionary;

pub mod index;
pub mod shards;

pub use index::IntervalIndex;
pub use shards::{divide_into_shards, ShardBoundary};

/// A closed, 1-based range on a single contig.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Getters,
    CopyGetters,
)]
pub struct GenomicInterval {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    end: u64,
}

impl GenomicInterval {
    pub fn new(contig: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        let contig = contig.into();
        if start == 0 || start > end {
            return Err(Error::InvalidInterval { contig, start, end }.into());
        }
        Ok(GenomicInterval { contig, start, end })
    }

    /// Intervals on different contigs never overlap.
    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.contig == other.contig && self.start <= other.end && other.start <= self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Whole-contig interval for every sequence of the given dictionary.
    pub fn whole_reference(dictionary: &dyn SequenceDictionary) -> Result<Vec<Self>> {
        dictionary
            .contigs()
            .into_iter()
            .filter(|(_, len)| *len > 0)
            .map(|(name, len)| GenomicInterval::new(name, 1, len))
            .collect()
    }

    /// Parse a region given as `CHROM`, `CHROM:START` or `CHROM:START-END`.
    /// Missing bounds default to the contig boundaries, the end is clamped to the contig length.
    pub fn parse_region(spec: &str, dictionary: &dyn SequenceDictionary) -> Result<Self> {
        let invalid = || Error::InvalidRegion {
            spec: spec.to_owned(),
        };
        let (contig, range) = match spec.rfind(':') {
            Some(i) => (&spec[..i], Some(&spec[i + 1..])),
            None => (spec, None),
        };
        let len = dictionary
            .length_of(contig)
            .ok_or_else(|| Error::UnknownContig {
                contig: contig.to_owned(),
            })?;

        let parse_pos = |value: &str| -> Result<u64> {
            Ok(value.replace(',', "").parse::<u64>().map_err(|_| invalid())?)
        };
        let (start, end) = match range {
            None => (1, len),
            Some(range) => match range.split_once('-') {
                Some((start, end)) => (parse_pos(start)?, parse_pos(end)?),
                None => (parse_pos(range)?, len),
            },
        };
        if start > len {
            return Err(invalid().into());
        }
        GenomicInterval::new(contig, start, end.min(len))
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

impl From<&GenomicInterval> for genome::Interval {
    /// Zero-based, half-open representation.
    fn from(interval: &GenomicInterval) -> Self {
        genome::Interval::new(
            interval.contig.clone(),
            interval.start - 1..interval.end,
        )
    }
}
