// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Aligned assembly contigs and their reconciliation into canonical records.

use std::convert::TryFrom;
use std::fmt;

use anyhow::Result;
use bio::alphabets::dna;
use itertools::Itertools;
use rust_htslib::bam::record::{Cigar, CigarString};

use crate::errors::Error;
use crate::intervals::GenomicInterval;

pub mod merge;
pub mod reduce;
pub mod resolve;

pub use merge::{merge, merge_all, MergedContig};
pub use reduce::{reduce_fragments, reduce_pair};
pub use resolve::{ResolveOutcome, SplitAlignmentResolver};

/// Whether the operation consumes bases of the contig sequence stored in the record.
pub fn consumes_read_bases(op: &Cigar) -> bool {
    matches!(
        op,
        Cigar::Match(_) | Cigar::Ins(_) | Cigar::SoftClip(_) | Cigar::Equal(_) | Cigar::Diff(_)
    )
}

/// Whether the operation consumes reference positions.
pub fn consumes_reference(op: &Cigar) -> bool {
    matches!(
        op,
        Cigar::Match(_) | Cigar::Del(_) | Cigar::RefSkip(_) | Cigar::Equal(_) | Cigar::Diff(_)
    )
}

pub fn has_hard_clips(cigar: &[Cigar]) -> bool {
    cigar.iter().any(|op| matches!(op, Cigar::HardClip(_)))
}

/// Full length of the contig, including the hard clipped parts.
pub fn contig_length(cigar: &[Cigar]) -> usize {
    cigar
        .iter()
        .filter(|op| matches!(op, Cigar::HardClip(_)) || consumes_read_bases(op))
        .map(|op| op.len() as usize)
        .sum()
}

fn reference_length(cigar: &[Cigar]) -> u64 {
    cigar
        .iter()
        .filter(|op| consumes_reference(op))
        .map(|op| op.len() as u64)
        .sum()
}

fn mapped_interval(contig: &str, start: u64, cigar: &[Cigar]) -> Result<GenomicInterval> {
    let end = start + reference_length(cigar).max(1) - 1;
    GenomicInterval::new(contig.to_owned(), start, end)
}

/// One entry of the `SA` tag: an alignment of another part of the same contig.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct AlternateAlignment {
    #[getset(get = "pub")]
    contig: String,
    /// 1-based leftmost mapping position.
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    reverse: bool,
    #[getset(get = "pub")]
    cigar: CigarString,
    #[getset(get_copy = "pub")]
    mapq: u8,
    #[getset(get_copy = "pub")]
    edit_distance: u32,
}

impl AlternateAlignment {
    pub fn new(
        contig: impl Into<String>,
        start: u64,
        reverse: bool,
        cigar: CigarString,
        mapq: u8,
        edit_distance: u32,
    ) -> Self {
        AlternateAlignment {
            contig: contig.into(),
            start,
            reverse,
            cigar,
            mapq,
            edit_distance,
        }
    }

    /// Parse a single `contig,pos,strand,CIGAR,mapq,NM` entry.
    pub fn parse(entry: &str) -> Result<Self> {
        let invalid = || Error::InvalidAlternateAlignment {
            entry: entry.to_owned(),
        };
        let fields = entry.split(',').collect_vec();
        if fields.len() != 6 {
            return Err(invalid().into());
        }
        let start = fields[1].parse::<u64>().map_err(|_| invalid())?;
        if start == 0 {
            return Err(invalid().into());
        }
        let reverse = match fields[2] {
            "+" => false,
            "-" => true,
            _ => return Err(invalid().into()),
        };
        let cigar = CigarString::try_from(fields[3].as_bytes()).map_err(|_| invalid())?;
        let mapq = fields[4].parse::<u8>().map_err(|_| invalid())?;
        let edit_distance = fields[5].parse::<u32>().map_err(|_| invalid())?;

        Ok(AlternateAlignment::new(
            fields[0],
            start,
            reverse,
            cigar,
            mapq,
            edit_distance,
        ))
    }

    /// Parse the value of an `SA` tag (`;`-terminated entries).
    pub fn parse_tag(value: &str) -> Result<Vec<Self>> {
        value
            .split_terminator(';')
            .filter(|entry| !entry.is_empty())
            .map(AlternateAlignment::parse)
            .collect()
    }

    /// Render alternate alignments as `SA` tag value.
    pub fn to_tag(alignments: &[AlternateAlignment]) -> String {
        alignments.iter().map(|alt| format!("{};", alt)).join("")
    }

    pub fn interval(&self) -> Result<GenomicInterval> {
        mapped_interval(&self.contig, self.start, &self.cigar)
    }
}

impl fmt::Display for AlternateAlignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.contig,
            self.start,
            if self.reverse { '-' } else { '+' },
            self.cigar,
            self.mapq,
            self.edit_distance
        )
    }
}

/// An alignment record of (a part of) an assembled contig.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, TypedBuilder)]
pub struct AlignmentFragment {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,
    #[getset(get = "pub")]
    #[builder(setter(into))]
    contig: String,
    /// 1-based leftmost mapping position.
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    #[builder(default)]
    reverse: bool,
    #[getset(get = "pub")]
    cigar: CigarString,
    #[getset(get_copy = "pub")]
    #[builder(default)]
    mapq: u8,
    #[getset(get = "pub")]
    bases: Vec<u8>,
    #[getset(get = "pub")]
    #[builder(default)]
    qualities: Option<Vec<u8>>,
    #[getset(get_copy = "pub")]
    #[builder(default)]
    unmapped: bool,
    #[getset(get_copy = "pub")]
    #[builder(default)]
    secondary: bool,
    #[getset(get_copy = "pub")]
    #[builder(default)]
    supplementary: bool,
    #[getset(get = "pub")]
    #[builder(default)]
    alternate_alignments: Vec<AlternateAlignment>,
}

impl AlignmentFragment {
    /// Mapped reference interval, `None` for unmapped fragments.
    pub fn interval(&self) -> Option<GenomicInterval> {
        if self.unmapped {
            None
        } else {
            mapped_interval(&self.contig, self.start, &self.cigar).ok()
        }
    }

    pub fn has_hard_clips(&self) -> bool {
        has_hard_clips(&self.cigar)
    }

    pub fn contig_length(&self) -> usize {
        contig_length(&self.cigar)
    }

    /// Unmapped and secondary fragments never contribute to a reconciled contig.
    pub fn is_usable(&self) -> bool {
        !(self.unmapped || self.secondary)
    }

    /// Whether the alternate alignment describes this very fragment.
    pub fn is_described_by(&self, alt: &AlternateAlignment) -> bool {
        alt.contig == self.contig && alt.start == self.start && alt.reverse == self.reverse
    }

    /// Bases, qualities and cigar in the orientation of the original contig sequence.
    pub(crate) fn forward_oriented(&self) -> (Vec<u8>, Option<Vec<u8>>, Vec<Cigar>) {
        if self.reverse {
            let qualities = self
                .qualities
                .as_ref()
                .map(|qualities| qualities.iter().rev().cloned().collect());
            (
                dna::revcomp(&self.bases),
                qualities,
                self.cigar.iter().rev().cloned().collect(),
            )
        } else {
            (
                self.bases.clone(),
                self.qualities.clone(),
                self.cigar.iter().cloned().collect(),
            )
        }
    }

    /// Compact description for log messages.
    pub fn alignment_string(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.contig,
            self.start,
            if self.reverse { '-' } else { '+' },
            self.cigar,
            self.mapq
        )
    }

    /// Canonical order of fragments of the same contig: primary before supplementary
    /// alignments, then by position, strand and cigar.
    pub(crate) fn canonical_key(&self) -> (bool, bool, &str, u64, bool, String) {
        (
            !self.is_usable(),
            self.supplementary,
            &self.contig,
            self.start,
            self.reverse,
            self.cigar.to_string(),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn cigar(spec: &str) -> CigarString {
        CigarString::try_from(spec.as_bytes()).unwrap()
    }

    pub(crate) fn fragment(
        name: &str,
        start: u64,
        reverse: bool,
        cigar_spec: &str,
        bases: &[u8],
    ) -> AlignmentFragment {
        AlignmentFragment::builder()
            .name(name)
            .contig("chr1")
            .start(start)
            .reverse(reverse)
            .cigar(cigar(cigar_spec))
            .mapq(60)
            .bases(bases.to_vec())
            .build()
    }

    #[test]
    fn test_parse_sa_tag() {
        let alts = AlternateAlignment::parse_tag("chr1,1001,+,50H50M,60,0;chr2,20,-,30M70S,12,3;")
            .unwrap();
        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].contig(), "chr1");
        assert_eq!(alts[0].start(), 1001);
        assert!(!alts[0].reverse());
        assert!(alts[1].reverse());
        assert_eq!(alts[1].mapq(), 12);
        assert_eq!(alts[1].edit_distance(), 3);
        assert_eq!(
            alts[0].interval().unwrap(),
            GenomicInterval::new("chr1", 1001, 1050).unwrap()
        );
        assert_eq!(
            AlternateAlignment::to_tag(&alts),
            "chr1,1001,+,50H50M,60,0;chr2,20,-,30M70S,12,3;"
        );
    }

    #[test]
    fn test_parse_invalid_sa_entry() {
        assert!(AlternateAlignment::parse("chr1,1001,+,50H50M,60").is_err());
        assert!(AlternateAlignment::parse("chr1,0,+,50H50M,60,0").is_err());
        assert!(AlternateAlignment::parse("chr1,10,*,50H50M,60,0").is_err());
        assert!(AlternateAlignment::parse_tag("").unwrap().is_empty());
    }

    #[test]
    fn test_fragment_geometry() {
        let frag = fragment("ctg", 100, false, "10S20M5D10M50H", &[b'A'; 40]);
        assert_eq!(
            frag.interval().unwrap(),
            GenomicInterval::new("chr1", 100, 134).unwrap()
        );
        assert_eq!(frag.contig_length(), 90);
        assert!(frag.has_hard_clips());
        assert!(frag.is_usable());
    }

    #[test]
    fn test_forward_orientation() {
        let frag = fragment("ctg", 100, true, "2H4M", b"AACG");
        let (bases, _, cigar) = frag.forward_oriented();
        assert_eq!(bases, b"CGTT".to_vec());
        assert_eq!(cigar, vec![Cigar::Match(4), Cigar::HardClip(2)]);
    }
}
