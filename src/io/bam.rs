// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! BAM/CRAM adapters: contig alignments in, cleaned contigs out.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use rust_htslib::bam;
use rust_htslib::bam::header::HeaderRecord;
use rust_htslib::bam::record::{Aux, CigarString};
use rust_htslib::bam::Read;

use super::{AlignmentSource, Dictionary, SequenceDictionary, Sink};
use crate::compose::ComposedVariant;
use crate::contigs::{AlignmentFragment, AlternateAlignment};
use crate::errors::Error;
use crate::intervals::GenomicInterval;

/// Read group of all written contigs.
pub const CONTIG_READ_GROUP: &str = "CTG";

impl Dictionary {
    pub fn from_bam_header(header: &bam::HeaderView) -> Self {
        Dictionary::new(
            header
                .target_names()
                .iter()
                .enumerate()
                .map(|(tid, name)| {
                    (
                        String::from_utf8_lossy(name).into_owned(),
                        header.target_len(tid as u32).unwrap_or(0),
                    )
                })
                .collect(),
        )
    }
}

/// Indexed BAM/CRAM file with aligned assembly contigs.
pub struct IndexedBamSource {
    reader: Mutex<bam::IndexedReader>,
    dictionary: Dictionary,
}

impl IndexedBamSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = bam::IndexedReader::from_path(path.as_ref())
            .context("Unable to read BAM/CRAM file.")?;
        let dictionary = Dictionary::from_bam_header(reader.header());
        Ok(IndexedBamSource {
            reader: Mutex::new(reader),
            dictionary,
        })
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }
}

impl AlignmentSource for IndexedBamSource {
    fn fetch(&self, locations: &[GenomicInterval]) -> Result<Vec<AlignmentFragment>> {
        let names = self.dictionary.contigs();
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| anyhow!("BAM reader is unusable after a panic in another thread"))?;

        let mut seen = HashSet::new();
        let mut fragments = Vec::new();
        for location in locations {
            let tid = self
                .dictionary
                .ordering_of(location.contig())
                .ok_or_else(|| Error::UnknownContig {
                    contig: location.contig().to_owned(),
                })?;
            reader.fetch((
                tid as i32,
                location.start() as i64 - 1,
                location.end() as i64,
            ))?;
            for record in reader.records() {
                let record = record?;
                let key = (
                    record.qname().to_vec(),
                    record.tid(),
                    record.pos(),
                    record.flags(),
                );
                if seen.insert(key) {
                    fragments.push(fragment_from_record(&record, &names)?);
                }
            }
        }
        Ok(fragments)
    }
}

pub(crate) fn fragment_from_record(
    record: &bam::Record,
    names: &[(String, u64)],
) -> Result<AlignmentFragment> {
    let contig = if record.tid() >= 0 {
        names
            .get(record.tid() as usize)
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    } else {
        String::new()
    };
    let alternate_alignments = match record.aux(b"SA") {
        Ok(Aux::String(value)) => AlternateAlignment::parse_tag(value)?,
        _ => Vec::new(),
    };
    // htslib fills missing qualities with 0xff
    let qualities = match record.qual().first() {
        None | Some(255) => None,
        Some(_) => Some(record.qual().to_vec()),
    };

    Ok(AlignmentFragment::builder()
        .name(String::from_utf8_lossy(record.qname()).into_owned())
        .contig(contig)
        .start((record.pos() + 1).max(0) as u64)
        .reverse(record.is_reverse())
        .cigar(CigarString(record.cigar().iter().cloned().collect()))
        .mapq(record.mapq())
        .bases(record.seq().as_bytes())
        .qualities(qualities)
        .unmapped(record.is_unmapped())
        .secondary(record.is_secondary())
        .supplementary(record.is_supplementary())
        .alternate_alignments(alternate_alignments)
        .build())
}

/// Coordinate sorted output header listing the reference sequences.
pub fn contig_header(dictionary: &dyn SequenceDictionary, command_line: &str) -> bam::Header {
    let mut header = bam::Header::new();
    header.push_record(
        HeaderRecord::new(b"HD")
            .push_tag(b"VN", "1.6")
            .push_tag(b"SO", "coordinate"),
    );
    for (name, len) in dictionary.contigs() {
        header.push_record(
            HeaderRecord::new(b"SQ")
                .push_tag(b"SN", &name)
                .push_tag(b"LN", len),
        );
    }
    header.push_record(HeaderRecord::new(b"RG").push_tag(b"ID", CONTIG_READ_GROUP));
    header.push_record(
        HeaderRecord::new(b"PG")
            .push_tag(b"ID", env!("CARGO_PKG_NAME"))
            .push_tag(b"PN", env!("CARGO_PKG_NAME"))
            .push_tag(b"VN", env!("CARGO_PKG_VERSION"))
            .push_tag(b"CL", command_line),
    );
    header
}

/// Unmapped record of a cleaned contig, placed at the variant position.
pub(crate) fn contig_record(
    composed: &ComposedVariant,
    contig: &AlignmentFragment,
    tid: i32,
) -> Result<bam::Record> {
    let variant = composed.variant();
    let name = format!(
        "var_{}_{}:{}",
        variant.contig(),
        variant.start(),
        contig.name()
    );
    let (bases, qualities, _) = contig.forward_oriented();
    let qualities = qualities.unwrap_or_else(|| vec![255; bases.len()]);

    let mut record = bam::Record::new();
    record.set(name.as_bytes(), None, &bases, &qualities);
    record.set_tid(tid);
    record.set_pos(variant.start() as i64 - 1);
    record.set_mtid(-1);
    record.set_mpos(-1);
    record.set_mapq(0);
    record.set_unmapped();
    record.push_aux(b"RG", Aux::String(CONTIG_READ_GROUP))?;
    Ok(record)
}

/// Writes the cleaned contigs of each variant as unmapped records.
pub struct BamSink {
    writer: bam::Writer,
    tids: HashMap<String, i32>,
}

impl BamSink {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        dictionary: &dyn SequenceDictionary,
        command_line: &str,
    ) -> Result<Self> {
        let header = contig_header(dictionary, command_line);
        let writer = bam::Writer::from_path(path.as_ref(), &header, bam::Format::Bam)
            .with_context(|| format!("Unable to write BAM file {}.", path.as_ref().display()))?;
        let tids = dictionary
            .contigs()
            .into_iter()
            .enumerate()
            .map(|(tid, (name, _))| (name, tid as i32))
            .collect();
        Ok(BamSink { writer, tids })
    }
}

impl Sink for BamSink {
    fn write(&mut self, composed: &ComposedVariant) -> Result<()> {
        let contig = composed.variant().contig();
        let tid = *self.tids.get(contig).ok_or_else(|| Error::UnknownContig {
            contig: contig.to_owned(),
        })?;
        for fragment in composed.contigs() {
            self.writer.write(&contig_record(composed, fragment, tid)?)?;
        }
        Ok(())
    }
}
