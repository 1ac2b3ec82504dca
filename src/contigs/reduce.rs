// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use itertools::Itertools;

use super::{merge, AlignmentFragment};
use crate::errors;

/// Combine two fragments of the same contig.
///
/// Unmapped and secondary fragments are absorbed by the other one, a fragment without hard
/// clips already represents the whole contig, and two hard clipped fragments are merged.
pub fn reduce_pair(a: AlignmentFragment, b: AlignmentFragment) -> Result<AlignmentFragment> {
    if !b.is_usable() {
        Ok(a)
    } else if !a.is_usable() {
        Ok(b)
    } else if !a.has_hard_clips() {
        Ok(a)
    } else if !b.has_hard_clips() {
        Ok(b)
    } else {
        Ok(merge(&a, &b)?.into_fragment())
    }
}

/// Result of reducing the fragments attributed to one variant.
#[derive(Debug, Default)]
pub struct Reduction {
    /// One fragment per contig, ordered by name.
    pub contigs: Vec<AlignmentFragment>,
    /// Usable fragments of contigs that could not be reconciled by themselves, in canonical
    /// order. Their alternate alignments may name the missing pieces.
    pub incomplete: Vec<Vec<AlignmentFragment>>,
}

/// Reduce the fragments to one record per contig name.
///
/// Fragments of a contig are folded in canonical order, which makes the result independent
/// of the input order. Contigs whose fragments leave uncovered gaps are set aside as
/// incomplete, while mismatching bases abort the reduction.
pub fn reduce_fragments(fragments: Vec<AlignmentFragment>) -> Result<Reduction> {
    let mut reduction = Reduction::default();

    let groups = fragments
        .into_iter()
        .map(|fragment| (fragment.name().to_owned(), fragment))
        .into_group_map();

    for (name, mut group) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        group.sort_by(|a, b| a.canonical_key().cmp(&b.canonical_key()));
        let first = match group.first() {
            Some(first) => first.clone(),
            None => continue,
        };
        match group.iter().skip(1).cloned().try_fold(first, reduce_pair) {
            Ok(contig) => reduction.contigs.push(contig),
            Err(err) if errors::is_recoverable(&err) => {
                debug!("Contig {} is incomplete: {}", name, err);
                group.retain(|fragment| fragment.is_usable());
                reduction.incomplete.push(group);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(reduction)
}
