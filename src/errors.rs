// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("missing or zero SVLEN annotation in variant at {contig}:{pos}")]
    MissingSvLen { contig: String, pos: u64 },
    #[error("invalid interval {contig}:{start}-{end}: coordinates are 1-based and start must not exceed end")]
    InvalidInterval { contig: String, start: u64, end: u64 },
    #[error("invalid region {spec}: use CHROM, CHROM:START or CHROM:START-END syntax")]
    InvalidRegion { spec: String },
    #[error("contig {contig} not found in sequence dictionary")]
    UnknownContig { contig: String },
    #[error("breakpoint interval of variant at {contig}:{pos} lies outside of the contig (length {len})")]
    EmptyBreakpointInterval { contig: String, pos: u64, len: u64 },
    #[error("shard size must be greater than zero")]
    InvalidShardSize,
    #[error("the number of split alignment resolution attempts must be at least 1")]
    InvalidResolveAttempts,
    #[error("variant identifier {id} is shared by {count} variants at different loci")]
    VariantIdCollision { id: String, count: usize },
    #[error("invalid alternate alignment entry '{entry}': expected contig,pos,strand,CIGAR,mapq,NM")]
    InvalidAlternateAlignment { entry: String },
    #[error("mismatching bases while merging fragments of contig {name} at contig offset {offset}")]
    MismatchingBases { name: String, offset: usize },
    #[error("fragments of contig {name} disagree on the contig length ({expected} vs. {found})")]
    ContigLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("cannot merge fragments of different contigs ({left} and {right})")]
    ReadNameMismatch { left: String, right: String },
    #[error("cigar of contig {name} consumes more bases than the record holds")]
    CigarExceedsBases { name: String },
    #[error("merged fragments of contig {name} leave bases {start}..{end} uncovered")]
    UncoveredBases { name: String, start: usize, end: usize },
    #[error("nothing to merge")]
    EmptyMerge,
}

impl Error {
    /// Whether the error only invalidates a single contig, so that processing of the remaining
    /// evidence can continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::UncoveredBases { .. })
    }
}

/// Classify an arbitrary error returned by the reconciliation steps.
pub(crate) fn is_recoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Error>()
        .map_or(false, |err| err.is_recoverable())
}
