// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_htslib::bcf;
use rust_htslib::bcf::Read;

use super::VariantSource;
use crate::intervals::GenomicInterval;
use crate::variants::CandidateRecord;

/// VCF/BCF file with candidate structural variants.
#[derive(Debug, Clone)]
pub struct BcfVariantSource {
    path: PathBuf,
}

impl BcfVariantSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        BcfVariantSource {
            path: path.as_ref().to_owned(),
        }
    }
}

impl VariantSource for BcfVariantSource {
    fn fetch(&self, regions: &[GenomicInterval]) -> Result<Vec<CandidateRecord>> {
        let mut reader = bcf::Reader::from_path(&self.path).with_context(|| {
            format!("Unable to read VCF/BCF file {}.", self.path.display())
        })?;
        let mut records = Vec::new();
        for record in reader.records() {
            let mut record = record?;
            let candidate = candidate_from_record(&mut record)?;
            if regions.is_empty() || candidate.overlaps_any(regions) {
                records.push(candidate);
            }
        }
        Ok(records)
    }
}

fn candidate_from_record(record: &mut bcf::Record) -> Result<CandidateRecord> {
    let contig = match record.rid() {
        Some(rid) => String::from_utf8_lossy(record.header().rid2name(rid)?).into_owned(),
        None => String::new(),
    };
    let pos = record.pos() as u64 + 1;
    let id = String::from_utf8_lossy(&record.id()).into_owned();
    let alt_alleles = record
        .alleles()
        .iter()
        .skip(1)
        .map(|allele| allele.to_vec())
        .collect();
    let svlen = match record.info(b"SVLEN").integer() {
        Ok(Some(svlens)) => svlens.first().map(|svlen| *svlen as i64),
        _ => None,
    };
    let end = match record.info(b"END").integer() {
        Ok(Some(end)) => end.first().map(|end| *end as u64).unwrap_or(pos),
        _ => pos,
    };

    Ok(CandidateRecord {
        contig,
        pos,
        end,
        id: Some(id),
        alt_alleles,
        svlen,
    })
}
