use std::convert::TryFrom;

use anyhow::Result;
use bio::alphabets::dna;
use rust_htslib::bam::record::CigarString;

use svcompose::contigs::{AlignmentFragment, AlternateAlignment};
use svcompose::io::{Dictionary, InMemoryAlignments, InMemoryVariants, VecSink};
use svcompose::variants::CandidateRecord;
use svcompose::{ComposeConfig, ComposeStats, ComposedVariant, Composer};

/// Sequence of all test contigs.
pub const CONTIG: &[u8] =
    b"GCTAAAGACAATTACATAACATACACGTCAGCACGAAACTTGTTGGCCCAGTGTGAATCGCTTAAGGGTTAAGTAAGTGTGATGCATACGCCTTTACTTG";

pub fn setup_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn dictionary() -> Dictionary {
    Dictionary::new(vec![
        ("chr1".to_owned(), 100_000),
        ("chr2".to_owned(), 50_000),
    ])
}

pub fn candidate(contig: &str, pos: u64, alt: &str, svlen: i64, id: Option<&str>) -> CandidateRecord {
    CandidateRecord {
        contig: contig.to_owned(),
        pos,
        end: if svlen < 0 { pos + svlen.unsigned_abs() } else { pos },
        id: id.map(|id| id.to_owned()),
        alt_alleles: vec![alt.as_bytes().to_vec()],
        svlen: Some(svlen),
    }
}

/// Aligned piece of `CONTIG`.
///
/// `cigar` and `alts` are given in reference orientation, `range` denotes the aligned bases
/// in contig orientation. Bases of reverse strand pieces are stored reverse complemented.
#[derive(Clone, Debug)]
pub struct Piece<'a> {
    pub name: &'a str,
    pub contig: &'a str,
    pub start: u64,
    pub reverse: bool,
    pub cigar: &'a str,
    pub range: std::ops::Range<usize>,
    pub alts: &'a [&'a str],
    pub supplementary: bool,
}

impl<'a> Piece<'a> {
    pub fn primary(name: &'a str, contig: &'a str, start: u64, cigar: &'a str) -> Self {
        Piece {
            name,
            contig,
            start,
            reverse: false,
            cigar,
            range: 0..CONTIG.len(),
            alts: &[],
            supplementary: false,
        }
    }

    pub fn build(&self) -> AlignmentFragment {
        let bases = &CONTIG[self.range.clone()];
        let bases = if self.reverse {
            dna::revcomp(bases)
        } else {
            bases.to_vec()
        };
        AlignmentFragment::builder()
            .name(self.name)
            .contig(self.contig)
            .start(self.start)
            .reverse(self.reverse)
            .cigar(CigarString::try_from(self.cigar.as_bytes()).unwrap())
            .mapq(60)
            .bases(bases)
            .supplementary(self.supplementary)
            .alternate_alignments(
                self.alts
                    .iter()
                    .map(|alt| AlternateAlignment::parse(alt).unwrap())
                    .collect(),
            )
            .build()
    }
}

pub fn compose(
    config: ComposeConfig,
    records: Vec<CandidateRecord>,
    fragments: Vec<AlignmentFragment>,
) -> Result<(Vec<ComposedVariant>, ComposeStats)> {
    setup_logger();
    let dictionary = dictionary();
    let variants = InMemoryVariants::new(records);
    let alignments = InMemoryAlignments::new(fragments);
    let mut sink = VecSink::default();
    let stats = Composer::builder()
        .config(config)
        .dictionary(&dictionary)
        .alignments(&alignments)
        .variants(&variants)
        .build()
        .compose(&mut sink)?;
    Ok((sink.into_inner(), stats))
}
