// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use anyhow::Result;
use itertools::Itertools;
use structopt::StructOpt;

use crate::compose::{ComposeConfig, Composer};
use crate::io::bam::{BamSink, IndexedBamSource};
use crate::io::bcf::BcfVariantSource;
use crate::variants::IdCollisionPolicy;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "svcompose",
    about = "Compose structural variant candidates with the assembly contigs supporting them."
)]
#[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
pub struct Svcompose {
    #[structopt(
        long,
        parse(from_os_str),
        help = "Indexed BAM/CRAM file with assembly contigs aligned to the reference."
    )]
    pub contigs: PathBuf,
    #[structopt(
        long,
        parse(from_os_str),
        help = "VCF/BCF file with candidate structural variants (<INS> and <DEL> with SVLEN)."
    )]
    pub variants: PathBuf,
    #[structopt(
        long,
        parse(from_os_str),
        help = "BAM file that shall contain the cleaned contigs of each variant."
    )]
    pub output: PathBuf,
    #[structopt(
        long,
        parse(from_os_str),
        help = "JSON file with a base configuration. Command line options take precedence."
    )]
    pub config: Option<PathBuf>,
    #[structopt(long, help = "Maximum number of bases per shard of the overlap join [10000].")]
    pub shard_size: Option<u64>,
    #[structopt(long, help = "Bases added on both sides of each breakpoint [50].")]
    pub padding: Option<u64>,
    #[structopt(
        long,
        help = "Rounds of fetching alternate alignments for hard clipped contigs [1]."
    )]
    pub max_resolve_attempts: Option<usize>,
    #[structopt(
        long,
        possible_values = &["merge", "disambiguate", "fail"],
        help = "How to treat distinct variants sharing an identifier [merge]."
    )]
    pub id_collision_policy: Option<IdCollisionPolicy>,
    #[structopt(
        long = "region",
        number_of_values = 1,
        help = "Region of interest (CHROM, CHROM:START or CHROM:START-END). Can be given multiple times."
    )]
    pub regions: Vec<String>,
    #[structopt(long, help = "Number of threads to use.")]
    pub threads: Option<usize>,
    #[structopt(long, help = "Print debug messages.")]
    pub verbose: bool,
}

impl Svcompose {
    /// Configuration from the optional JSON file, overridden by the given options.
    pub fn compose_config(&self) -> Result<ComposeConfig> {
        let mut config = match self.config {
            Some(ref path) => ComposeConfig::from_json_file(path)?,
            None => ComposeConfig::default(),
        };
        if let Some(shard_size) = self.shard_size {
            config.shard_size = shard_size;
        }
        if let Some(padding) = self.padding {
            config.padding = padding;
        }
        if let Some(max_resolve_attempts) = self.max_resolve_attempts {
            config.max_resolve_attempts = max_resolve_attempts;
        }
        if let Some(policy) = self.id_collision_policy {
            config.id_collision_policy = policy;
        }
        if !self.regions.is_empty() {
            config.regions = self.regions.clone();
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn run(opt: Svcompose) -> Result<()> {
    let config = opt.compose_config()?;
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let alignments = IndexedBamSource::from_path(&opt.contigs)?;
    let variants = BcfVariantSource::from_path(&opt.variants);
    let command_line = std::env::args().join(" ");
    let mut sink = BamSink::from_path(&opt.output, alignments.dictionary(), &command_line)?;

    let stats = Composer::builder()
        .config(config)
        .dictionary(alignments.dictionary())
        .alignments(&alignments)
        .variants(&variants)
        .build()
        .compose(&mut sink)?;
    debug!("{:?}", stats);

    Ok(())
}
