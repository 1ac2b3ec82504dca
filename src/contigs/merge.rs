// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::ops::Range;

use anyhow::Result;
use bv::BitVec;
use rust_htslib::bam::record::{Cigar, CigarString};

use super::{consumes_read_bases, contig_length, AlignmentFragment, AlternateAlignment};
use crate::errors::Error;

/// A contig reconciled from several fragments.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct MergedContig {
    fragment: AlignmentFragment,
    /// Part of the contig covered by the merged fragments, in contig coordinates.
    coverage: Range<usize>,
    contig_length: usize,
}

impl MergedContig {
    pub fn into_fragment(self) -> AlignmentFragment {
        self.fragment
    }
}

impl From<MergedContig> for AlignmentFragment {
    fn from(merged: MergedContig) -> Self {
        merged.fragment
    }
}

/// Working buffer for the full contig sequence. A separate bitmap marks written positions,
/// so that no byte value is reserved as "unset".
struct MergeBuffer<'a> {
    name: &'a str,
    bases: Vec<u8>,
    qualities: Option<Vec<u8>>,
    written: BitVec,
    coverage_start: usize,
    coverage_end: usize,
}

impl<'a> MergeBuffer<'a> {
    fn new(name: &'a str, len: usize) -> Self {
        MergeBuffer {
            name,
            bases: vec![0; len],
            qualities: Some(vec![0; len]),
            written: BitVec::new_fill(false, len as u64),
            coverage_start: len,
            coverage_end: 0,
        }
    }

    fn len(&self) -> usize {
        self.bases.len()
    }

    fn write(&mut self, fragment: &AlignmentFragment) -> Result<()> {
        if fragment.name() != self.name {
            return Err(Error::ReadNameMismatch {
                left: self.name.to_owned(),
                right: fragment.name().to_owned(),
            }
            .into());
        }
        let (bases, qualities, cigar) = fragment.forward_oriented();
        let len = self.len();
        let fragment_len = contig_length(&cigar);
        if fragment_len != len {
            return Err(Error::ContigLengthMismatch {
                name: self.name.to_owned(),
                expected: len,
                found: fragment_len,
            }
            .into());
        }
        let qualities = qualities.filter(|qualities| qualities.len() == bases.len());
        if qualities.is_none() {
            self.qualities = None;
        }

        let mut offset = 0;
        let mut read_pos = 0;
        // claimed coverage, narrowed by leading and trailing hard clips
        let mut claim_start = 0;
        let mut claim_end = len;
        for op in &cigar {
            let op_len = op.len() as usize;
            match op {
                Cigar::HardClip(_) => {
                    if offset == 0 {
                        claim_start = op_len;
                    } else {
                        claim_end = len - op_len;
                    }
                    offset += op_len;
                }
                op if consumes_read_bases(op) => {
                    if read_pos + op_len > bases.len() {
                        return Err(Error::CigarExceedsBases {
                            name: self.name.to_owned(),
                        }
                        .into());
                    }
                    for i in 0..op_len {
                        self.write_base(offset + i, bases[read_pos + i])?;
                        if let (Some(merged), Some(qualities)) =
                            (self.qualities.as_mut(), qualities.as_ref())
                        {
                            merged[offset + i] = merged[offset + i].max(qualities[read_pos + i]);
                        }
                    }
                    offset += op_len;
                    read_pos += op_len;
                }
                _ => (),
            }
        }

        self.coverage_start = self.coverage_start.min(claim_start);
        self.coverage_end = self.coverage_end.max(claim_end);
        Ok(())
    }

    fn write_base(&mut self, pos: usize, base: u8) -> Result<()> {
        if self.written.get(pos as u64) {
            if self.bases[pos] != base {
                return Err(Error::MismatchingBases {
                    name: self.name.to_owned(),
                    offset: pos,
                }
                .into());
            }
        } else {
            self.bases[pos] = base;
            self.written.set(pos as u64, true);
        }
        Ok(())
    }

    /// Coverage range, checked to be fully written.
    fn coverage(&self) -> Result<Range<usize>> {
        let coverage = self.coverage_start..self.coverage_end.max(self.coverage_start);
        if let Some(first_gap) = coverage.clone().find(|pos| !self.written.get(*pos as u64)) {
            let gap_end = (first_gap..coverage.end)
                .find(|pos| self.written.get(*pos as u64))
                .unwrap_or(coverage.end);
            return Err(Error::UncoveredBases {
                name: self.name.to_owned(),
                start: first_gap,
                end: gap_end,
            }
            .into());
        }
        Ok(coverage)
    }
}

/// Cigar describing the covered part of the contig: `[H]? M [H]?`.
fn coverage_cigar(coverage: &Range<usize>, len: usize) -> CigarString {
    let mut ops = Vec::with_capacity(3);
    if coverage.start > 0 {
        ops.push(Cigar::HardClip(coverage.start as u32));
    }
    ops.push(Cigar::Match((coverage.end - coverage.start) as u32));
    if coverage.end < len {
        ops.push(Cigar::HardClip((len - coverage.end) as u32));
    }
    CigarString(ops)
}

/// Merge two fragments of the same contig.
pub fn merge(a: &AlignmentFragment, b: &AlignmentFragment) -> Result<MergedContig> {
    merge_all(&[a, b])
}

/// Merge fragments of the same contig into one record covering the union of their aligned
/// parts. The first fragment is the anchor: name, position and supplementary flag are taken
/// from it. Overlapping fragments have to agree on every base.
pub fn merge_all(fragments: &[&AlignmentFragment]) -> Result<MergedContig> {
    let anchor = match fragments.first() {
        Some(anchor) => *anchor,
        None => return Err(Error::EmptyMerge.into()),
    };
    let len = anchor.contig_length();

    let mut buffer = MergeBuffer::new(anchor.name(), len);
    for fragment in fragments {
        buffer.write(fragment)?;
    }
    let coverage = buffer.coverage()?;

    let alternate_alignments = fragments
        .iter()
        .flat_map(|fragment| fragment.alternate_alignments().iter())
        .filter(|alt| !fragments.iter().any(|fragment| fragment.is_described_by(alt)))
        .fold(Vec::<AlternateAlignment>::new(), |mut alts, alt| {
            if !alts.contains(alt) {
                alts.push(alt.clone());
            }
            alts
        });
    let mapq = fragments.iter().map(|fragment| fragment.mapq()).max().unwrap_or(0);
    let qualities = buffer
        .qualities
        .as_ref()
        .map(|qualities| qualities[coverage.clone()].to_vec());

    let fragment = AlignmentFragment::builder()
        .name(anchor.name().as_str())
        .contig(anchor.contig().as_str())
        .start(anchor.start())
        .cigar(coverage_cigar(&coverage, len))
        .mapq(mapq)
        .bases(buffer.bases[coverage.clone()].to_vec())
        .qualities(qualities)
        .supplementary(anchor.supplementary())
        .alternate_alignments(alternate_alignments)
        .build();

    debug!(
        "Merged {} fragments of contig {} into {} (covering {}..{} of {}).",
        fragments.len(),
        anchor.name(),
        fragment.alignment_string(),
        coverage.start,
        coverage.end,
        len
    );

    Ok(MergedContig {
        fragment,
        coverage,
        contig_length: len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contigs::tests::{cigar, fragment};

    const CONTIG: &[u8] = b"ACGTTGCAAGGCTTACCGATACGGATCCATGCAATTGCCGATAGGCTATCGACTTAGCCAATGCGTACGATCGGCTAAGCTTCGATCCGATTACGGCATG";

    #[test]
    fn test_complementary_fragments() {
        assert_eq!(CONTIG.len(), 100);
        let primary = fragment("ctg", 1000, false, "50M50H", &CONTIG[..50]);
        let supplementary = fragment("ctg", 5000, false, "50H50M", &CONTIG[50..]);

        let merged = merge(&primary, &supplementary).unwrap();
        assert_eq!(merged.coverage(), &(0..100));
        assert_eq!(merged.fragment().bases(), &CONTIG.to_vec());
        assert_eq!(merged.fragment().cigar(), &cigar("100M"));
        assert!(!merged.fragment().has_hard_clips());
        assert_eq!(merged.fragment().start(), 1000);

        // order of the arguments only changes the anchor
        let swapped = merge(&supplementary, &primary).unwrap();
        assert_eq!(swapped.fragment().bases(), merged.fragment().bases());
        assert_eq!(swapped.fragment().cigar(), merged.fragment().cigar());
    }

    #[test]
    fn test_reverse_strand_fragment() {
        let primary = fragment("ctg", 1000, false, "60M40H", &CONTIG[..60]);
        // the supplementary alignment maps the reverse complement of the contig
        let reversed = dna_revcomp(&CONTIG[40..]);
        let supplementary = fragment("ctg", 7000, true, "60M40H", &reversed);

        let merged = merge(&primary, &supplementary).unwrap();
        assert_eq!(merged.fragment().bases(), &CONTIG.to_vec());
        assert!(!merged.fragment().reverse());
    }

    #[test]
    fn test_mismatching_base() {
        let primary = fragment("ctg", 1000, false, "60M40H", &CONTIG[..60]);
        let mut bases = CONTIG[40..].to_vec();
        bases[5] = if bases[5] == b'A' { b'C' } else { b'A' };
        let supplementary = fragment("ctg", 5000, false, "40H60M", &bases);

        let err = merge(&primary, &supplementary).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::MismatchingBases {
                name: "ctg".to_owned(),
                offset: 45
            })
        );
    }

    #[test]
    fn test_zero_byte_is_a_regular_base() {
        let mut contig = CONTIG.to_vec();
        contig[55] = 0;
        let primary = fragment("ctg", 1000, false, "60M40H", &contig[..60]);
        let supplementary = fragment("ctg", 5000, false, "40H60M", &contig[40..]);
        let merged = merge(&primary, &supplementary).unwrap();
        assert_eq!(merged.fragment().bases(), &contig);

        let mut conflicting = contig[40..].to_vec();
        conflicting[15] = b'A';
        let supplementary = fragment("ctg", 5000, false, "40H60M", &conflicting);
        assert!(merge(&primary, &supplementary).is_err());
    }

    #[test]
    fn test_partial_coverage() {
        let first = fragment("ctg", 1000, false, "10H30M60H", &CONTIG[10..40]);
        let second = fragment("ctg", 3000, false, "40H20M40H", &CONTIG[40..60]);
        let merged = merge(&first, &second).unwrap();
        assert_eq!(merged.coverage(), &(10..60));
        assert_eq!(merged.fragment().cigar(), &cigar("10H50M40H"));
        assert!(merged.fragment().has_hard_clips());
        assert_eq!(merged.fragment().contig_length(), 100);
    }

    #[test]
    fn test_uncovered_gap() {
        let first = fragment("ctg", 1000, false, "30M70H", &CONTIG[..30]);
        let second = fragment("ctg", 3000, false, "50H50M", &CONTIG[50..]);
        let err = merge(&first, &second).unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert_eq!(
            err,
            &Error::UncoveredBases {
                name: "ctg".to_owned(),
                start: 30,
                end: 50
            }
        );
        assert!(err.is_recoverable());

        // the missing middle piece closes the gap
        let middle = fragment("ctg", 2000, false, "30H20M50H", &CONTIG[30..50]);
        let merged = merge_all(&[&first, &second, &middle]).unwrap();
        assert_eq!(merged.fragment().bases(), &CONTIG.to_vec());
    }

    #[test]
    fn test_length_and_name_mismatch() {
        let primary = fragment("ctg", 1000, false, "50M50H", &CONTIG[..50]);
        let shorter = fragment("ctg", 5000, false, "50H40M", &CONTIG[50..90]);
        assert!(merge(&primary, &shorter).is_err());
        let other = fragment("ctg2", 5000, false, "50H50M", &CONTIG[50..]);
        assert!(merge(&primary, &other).is_err());
    }

    #[test]
    fn test_soft_clips_and_insertions_consume_contig() {
        let primary = fragment("ctg", 1000, false, "5S40M5I50H", &CONTIG[..50]);
        let supplementary = fragment("ctg", 5000, false, "45H55M", &CONTIG[45..]);
        let merged = merge(&primary, &supplementary).unwrap();
        assert_eq!(merged.fragment().bases(), &CONTIG.to_vec());
    }

    #[test]
    fn test_alternate_alignments_and_mapq() {
        let mut primary = fragment("ctg", 1000, false, "50M50H", &CONTIG[..50]);
        let mut supplementary = fragment("ctg", 5000, false, "50H50M", &CONTIG[50..]);
        let third = AlternateAlignment::parse("chr2,300,-,70H30M,20,1").unwrap();
        primary = AlignmentFragment::builder()
            .name("ctg")
            .contig("chr1")
            .start(1000)
            .cigar(primary.cigar().clone())
            .mapq(20)
            .bases(primary.bases().clone())
            .qualities(Some(vec![30; 50]))
            .alternate_alignments(vec![
                AlternateAlignment::parse("chr1,5000,+,50H50M,60,0").unwrap(),
                third.clone(),
            ])
            .build();
        supplementary = AlignmentFragment::builder()
            .name("ctg")
            .contig("chr1")
            .start(5000)
            .cigar(supplementary.cigar().clone())
            .mapq(55)
            .bases(supplementary.bases().clone())
            .qualities(Some(vec![40; 50]))
            .supplementary(true)
            .alternate_alignments(vec![
                AlternateAlignment::parse("chr1,1000,+,50M50H,20,0").unwrap(),
                third.clone(),
            ])
            .build();

        let merged = merge(&primary, &supplementary).unwrap();
        assert_eq!(merged.fragment().alternate_alignments(), &vec![third]);
        assert_eq!(merged.fragment().mapq(), 55);
        assert!(!merged.fragment().supplementary());
        let mut qualities = vec![30; 50];
        qualities.extend(vec![40; 50]);
        assert_eq!(merged.fragment().qualities(), &Some(qualities));
    }

    fn dna_revcomp(seq: &[u8]) -> Vec<u8> {
        bio::alphabets::dna::revcomp(seq)
    }
}
