// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;

use anyhow::Result;
use itertools::Itertools;

use crate::errors::Error;
use crate::intervals::GenomicInterval;
use crate::utils::SimpleCounter;

pub mod breakpoints;

pub use breakpoints::breakpoint_intervals;

/// Kind of a supported structural variant, displayed as its symbolic allele.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum SvKind {
    #[strum(serialize = "<INS>")]
    Insertion,
    #[strum(serialize = "<DEL>")]
    Deletion,
}

impl SvKind {
    pub fn allele_display(self) -> &'static str {
        match self {
            SvKind::Insertion => "<INS>",
            SvKind::Deletion => "<DEL>",
        }
    }
}

/// A variant record as delivered by a `VariantSource`, before the supported kinds are
/// selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateRecord {
    pub contig: String,
    /// 1-based position.
    pub pos: u64,
    /// 1-based inclusive end position.
    pub end: u64,
    pub id: Option<String>,
    pub alt_alleles: Vec<Vec<u8>>,
    /// Signed SVLEN annotation.
    pub svlen: Option<i64>,
}

impl CandidateRecord {
    /// Whether the reference span of the record overlaps any of the regions. A negative SVLEN
    /// extends the span when END is missing.
    pub fn overlaps_any(&self, regions: &[GenomicInterval]) -> bool {
        let end = match self.svlen {
            Some(svlen) if svlen < 0 => self.end.max(self.pos.saturating_add(svlen.unsigned_abs())),
            _ => self.end.max(self.pos),
        };
        regions.iter().any(|region| {
            region.contig() == &self.contig && region.start() <= end && self.pos <= region.end()
        })
    }
}

#[derive(Hash, PartialEq, Eq, Clone, Copy, Display, Debug)]
pub enum SkipReason {
    #[strum(serialize = "records with more or less than one ALT allele")]
    AlleleCount,
    #[strum(serialize = "records with a non-symbolic ALT allele")]
    NonSymbolicAllele,
    #[strum(serialize = "records with a symbolic ALT allele other than <INS> or <DEL>")]
    UnsupportedSymbolicAllele,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct StructuralVariant {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    end: u64,
    #[getset(get_copy = "pub")]
    kind: SvKind,
    /// Signed length, negative for deletions.
    #[getset(get_copy = "pub")]
    length: i64,
    #[getset(get = "pub")]
    id: Option<String>,
}

impl StructuralVariant {
    pub fn new(
        contig: impl Into<String>,
        start: u64,
        end: u64,
        kind: SvKind,
        length: Option<i64>,
        id: Option<String>,
    ) -> Result<Self> {
        let contig = contig.into();
        let length = match length {
            Some(length) if length != 0 => length,
            _ => {
                return Err(Error::MissingSvLen {
                    contig,
                    pos: start,
                }
                .into())
            }
        };
        if start == 0 || end < start {
            return Err(Error::InvalidInterval { contig, start, end }.into());
        }
        Ok(StructuralVariant {
            contig,
            start,
            end,
            kind,
            length,
            id: id.filter(|id| !id.is_empty() && id != "."),
        })
    }

    /// Identifier used to merge evidence across shards. Variants without an explicit
    /// identifier are named after their allele and absolute length, which means that such
    /// variants at different loci share an identifier (see `IdCollisionPolicy`).
    pub fn identity(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!(
                "var_{}_{}",
                self.kind.allele_display(),
                self.length.unsigned_abs()
            ),
        }
    }

    fn locus_key(&self) -> (&str, u64, u64, SvKind, i64) {
        (&self.contig, self.start, self.end, self.kind, self.length)
    }
}

/// Select supported structural variants: exactly one symbolic `<INS>` or `<DEL>` allele.
/// Other records are counted as skipped. A supported record without SVLEN is an error.
pub fn collect_variant(
    record: &CandidateRecord,
    skips: &mut SimpleCounter<SkipReason>,
) -> Result<Option<StructuralVariant>> {
    if record.alt_alleles.len() != 1 {
        skips.incr(SkipReason::AlleleCount);
        return Ok(None);
    }
    let alt = &record.alt_alleles[0];
    if !(alt.len() > 2 && alt[0] == b'<' && alt[alt.len() - 1] == b'>') {
        skips.incr(SkipReason::NonSymbolicAllele);
        return Ok(None);
    }
    let kind = match alt.as_slice() {
        b"<INS>" => SvKind::Insertion,
        b"<DEL>" => SvKind::Deletion,
        _ => {
            skips.incr(SkipReason::UnsupportedSymbolicAllele);
            return Ok(None);
        }
    };

    Ok(Some(StructuralVariant::new(
        record.contig.clone(),
        record.pos,
        record.end.max(record.pos),
        kind,
        record.svlen,
        record.id.clone(),
    )?))
}

/// How to treat distinct variants that end up with the same identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IdCollisionPolicy {
    /// Merge their evidence under the shared identifier.
    Merge,
    /// Append the locus to the identifier of every colliding variant.
    Disambiguate,
    /// Abort with an error.
    Fail,
}

impl Default for IdCollisionPolicy {
    fn default() -> Self {
        IdCollisionPolicy::Merge
    }
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct IdAssignment {
    /// Identifier for each variant, in input order.
    #[getset(get = "pub")]
    ids: Vec<String>,
    /// Number of identifiers shared by variants at distinct loci.
    #[getset(get_copy = "pub")]
    collisions: usize,
}

/// Assign an identifier to each variant, applying the collision policy.
pub fn assign_identities(
    variants: &[StructuralVariant],
    policy: IdCollisionPolicy,
) -> Result<IdAssignment> {
    let mut ids = variants.iter().map(|v| v.identity()).collect_vec();

    let mut by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, id) in ids.iter().enumerate() {
        by_id.entry(id.as_str()).or_default().push(i);
    }

    let mut colliding = Vec::new();
    let mut collisions = 0;
    for (id, members) in by_id.iter().sorted_by_key(|(id, _)| **id) {
        let distinct = members
            .iter()
            .map(|i| variants[*i].locus_key())
            .unique()
            .count();
        if distinct > 1 {
            warn!(
                "Variant identifier {} is shared by {} variants at distinct loci.",
                id, distinct
            );
            if policy == IdCollisionPolicy::Fail {
                return Err(Error::VariantIdCollision {
                    id: id.to_string(),
                    count: distinct,
                }
                .into());
            }
            collisions += 1;
            colliding.extend(members.iter().cloned());
        }
    }
    if policy == IdCollisionPolicy::Disambiguate {
        for i in colliding {
            let variant = &variants[i];
            ids[i] = format!("{}_{}_{}", ids[i], variant.contig(), variant.start());
        }
    }

    Ok(IdAssignment { ids, collisions })
}
