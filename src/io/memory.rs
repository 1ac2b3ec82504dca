// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory collaborators, used for testing and for embedding the pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use super::{AlignmentSource, Sink, VariantSource};
use crate::compose::ComposedVariant;
use crate::contigs::AlignmentFragment;
use crate::intervals::GenomicInterval;
use crate::variants::CandidateRecord;

#[derive(Debug, Default)]
pub struct InMemoryAlignments {
    fragments: Vec<AlignmentFragment>,
    fetches: AtomicUsize,
}

impl InMemoryAlignments {
    pub fn new(fragments: Vec<AlignmentFragment>) -> Self {
        InMemoryAlignments {
            fragments,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl AlignmentSource for InMemoryAlignments {
    fn fetch(&self, locations: &[GenomicInterval]) -> Result<Vec<AlignmentFragment>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .fragments
            .iter()
            .filter(|fragment| match fragment.interval() {
                Some(interval) => locations.iter().any(|location| location.overlaps(&interval)),
                None => false,
            })
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryVariants {
    records: Vec<CandidateRecord>,
}

impl InMemoryVariants {
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        InMemoryVariants { records }
    }
}

impl VariantSource for InMemoryVariants {
    /// Records overlapping any of the regions, or all records if no region is given.
    fn fetch(&self, regions: &[GenomicInterval]) -> Result<Vec<CandidateRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| regions.is_empty() || record.overlaps_any(regions))
            .cloned()
            .collect())
    }
}

/// Sink collecting the composed variants.
#[derive(Debug, Default, Getters)]
pub struct VecSink {
    #[getset(get = "pub")]
    composed: Vec<ComposedVariant>,
    #[getset(get = "pub")]
    finished: bool,
}

impl VecSink {
    pub fn into_inner(self) -> Vec<ComposedVariant> {
        self.composed
    }
}

impl Sink for VecSink {
    fn write(&mut self, composed: &ComposedVariant) -> Result<()> {
        self.composed.push(composed.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
