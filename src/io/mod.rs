// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Collaborators of the composition pipeline: where alignments and candidate variants come
//! from, how the reference is laid out, and where the composed evidence goes.

use std::collections::HashMap;

use anyhow::Result;

use crate::compose::ComposedVariant;
use crate::contigs::AlignmentFragment;
use crate::intervals::GenomicInterval;
use crate::variants::CandidateRecord;

pub mod bam;
pub mod bcf;
pub mod memory;

pub use self::memory::{InMemoryAlignments, InMemoryVariants, VecSink};

/// Lengths and ordering of the reference sequences.
pub trait SequenceDictionary: Sync {
    fn length_of(&self, contig: &str) -> Option<u64>;

    /// Rank of the contig in the reference, used for coordinate sorting.
    fn ordering_of(&self, contig: &str) -> Option<usize>;

    /// All contigs with their lengths, in reference order.
    fn contigs(&self) -> Vec<(String, u64)>;
}

/// Source of aligned contig fragments. Implementations have to tolerate concurrent calls.
pub trait AlignmentSource: Sync {
    /// All fragments overlapping any of the given locations. A fragment overlapping several
    /// locations is returned once.
    fn fetch(&self, locations: &[GenomicInterval]) -> Result<Vec<AlignmentFragment>>;
}

/// Source of candidate variant records.
pub trait VariantSource {
    fn fetch(&self, regions: &[GenomicInterval]) -> Result<Vec<CandidateRecord>>;
}

/// Receiver of the composed evidence, in ascending coordinate order of the variants.
pub trait Sink {
    fn write(&mut self, composed: &ComposedVariant) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Plain sequence dictionary.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    sequences: Vec<(String, u64)>,
    ranks: HashMap<String, usize>,
}

impl Dictionary {
    pub fn new(sequences: Vec<(String, u64)>) -> Self {
        let ranks = sequences
            .iter()
            .enumerate()
            .map(|(rank, (name, _))| (name.clone(), rank))
            .collect();
        Dictionary { sequences, ranks }
    }
}

impl SequenceDictionary for Dictionary {
    fn length_of(&self, contig: &str) -> Option<u64> {
        self.ranks.get(contig).map(|rank| self.sequences[*rank].1)
    }

    fn ordering_of(&self, contig: &str) -> Option<usize> {
        self.ranks.get(contig).cloned()
    }

    fn contigs(&self) -> Vec<(String, u64)> {
        self.sequences.clone()
    }
}
