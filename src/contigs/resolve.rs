// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use itertools::Itertools;

use super::{merge_all, AlignmentFragment, AlternateAlignment};
use crate::errors;
use crate::intervals::GenomicInterval;
use crate::io::AlignmentSource;

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The contig did not carry hard clips.
    Unclipped(AlignmentFragment),
    /// Hard clips were resolved with fragments fetched from alternate alignments.
    Resolved(AlignmentFragment),
    /// Hard clips remained after the last attempt.
    GaveUp { name: String },
}

impl ResolveOutcome {
    pub fn into_contig(self) -> Option<AlignmentFragment> {
        match self {
            ResolveOutcome::Unclipped(contig) | ResolveOutcome::Resolved(contig) => Some(contig),
            ResolveOutcome::GaveUp { .. } => None,
        }
    }
}

/// Completes hard clipped contigs by fetching the fragments listed in their alternate
/// alignments.
pub struct SplitAlignmentResolver<'a> {
    source: &'a dyn AlignmentSource,
    max_attempts: usize,
}

impl<'a> SplitAlignmentResolver<'a> {
    /// With `max_attempts == 1`, only the alternate alignments of the contig itself are
    /// fetched. Further attempts follow alternate alignments of newly fetched fragments.
    pub fn new(source: &'a dyn AlignmentSource, max_attempts: usize) -> Self {
        SplitAlignmentResolver {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn resolve(&self, contig: AlignmentFragment) -> Result<ResolveOutcome> {
        if !contig.has_hard_clips() {
            return Ok(ResolveOutcome::Unclipped(contig));
        }
        self.resolve_pieces(vec![contig])
    }

    /// Complete a contig from pieces that leave gaps when merged on their own. The first piece
    /// anchors the merge.
    pub fn resolve_pieces(&self, pieces: Vec<AlignmentFragment>) -> Result<ResolveOutcome> {
        let (name, alignment) = match pieces.first() {
            Some(anchor) => (anchor.name().to_owned(), anchor.alignment_string()),
            None => return Err(errors::Error::EmptyMerge.into()),
        };
        let mut collected = pieces;
        let mut visited: Vec<GenomicInterval> = Vec::new();

        for attempt in 1..=self.max_attempts {
            let locations = pending_locations(&collected, &visited)?;
            if locations.is_empty() {
                debug!(
                    "No further alternate alignments to visit for contig {} (attempt {}).",
                    name, attempt
                );
                break;
            }
            visited.extend(locations.iter().cloned());

            for fragment in self.source.fetch(&locations)? {
                if fragment.name() == &name
                    && fragment.is_usable()
                    && !collected.contains(&fragment)
                {
                    collected.push(fragment);
                }
            }

            match combine(&collected) {
                Ok(combined) if !combined.has_hard_clips() => {
                    return Ok(ResolveOutcome::Resolved(combined));
                }
                Ok(_) => (),
                Err(err) if errors::is_recoverable(&err) => {
                    debug!("Contig {} still incomplete: {}", name, err);
                }
                Err(err) => return Err(err),
            }
        }

        warn!(
            "Contig {} {} {} gave up: hard clips could not be resolved after {} attempt(s).",
            name,
            alignment,
            AlternateAlignment::to_tag(collected[0].alternate_alignments()),
            self.max_attempts
        );
        Ok(ResolveOutcome::GaveUp { name })
    }
}

/// Locations of alternate alignments that are neither collected nor visited yet.
fn pending_locations(
    collected: &[AlignmentFragment],
    visited: &[GenomicInterval],
) -> Result<Vec<GenomicInterval>> {
    let mut locations = Vec::new();
    for alt in collected
        .iter()
        .flat_map(|fragment| fragment.alternate_alignments().iter())
        .filter(|alt| !collected.iter().any(|fragment| fragment.is_described_by(alt)))
    {
        let location = alt.interval()?;
        if !visited.contains(&location) {
            locations.push(location);
        }
    }
    Ok(locations.into_iter().sorted().dedup().collect())
}

/// Fold the contig (first element) with the fetched fragments. A fragment without hard clips
/// represents the whole contig, otherwise all usable fragments are merged at once.
fn combine(collected: &[AlignmentFragment]) -> Result<AlignmentFragment> {
    let (contig, fetched) = match collected.split_first() {
        Some(split) => split,
        None => return Err(errors::Error::EmptyMerge.into()),
    };
    let mut usable = fetched
        .iter()
        .filter(|fragment| fragment.is_usable())
        .sorted_by(|a, b| a.canonical_key().cmp(&b.canonical_key()))
        .collect_vec();
    usable.insert(0, contig);

    if let Some(full) = usable.iter().find(|fragment| !fragment.has_hard_clips()) {
        return Ok((*full).clone());
    }
    Ok(merge_all(&usable)?.into_fragment())
}
