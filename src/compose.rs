// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Composition of structural variant candidates with the assembly contigs supporting them.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use rayon::prelude::*;

use crate::contigs::{reduce_fragments, AlignmentFragment, ResolveOutcome, SplitAlignmentResolver};
use crate::errors::Error;
use crate::intervals::GenomicInterval;
use crate::io::{AlignmentSource, SequenceDictionary, Sink, VariantSource};
use crate::join::{JoinStats, ShardedJoinEngine, VariantWindows};
use crate::utils::SimpleCounter;
use crate::variants::{
    assign_identities, breakpoint_intervals, collect_variant, IdCollisionPolicy, SkipReason,
    StructuralVariant,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposeConfig {
    /// Maximum number of bases per shard of the overlap join.
    pub shard_size: u64,
    /// Bases added on both sides of each breakpoint.
    pub padding: u64,
    /// Rounds of fetching alternate alignments for contigs with hard clips.
    pub max_resolve_attempts: usize,
    pub id_collision_policy: IdCollisionPolicy,
    /// Regions of interest (`CHROM[:START[-END]]`), the whole reference if empty.
    pub regions: Vec<String>,
    /// Number of worker threads, the rayon default if unset.
    pub threads: Option<usize>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        ComposeConfig {
            shard_size: 10_000,
            padding: 50,
            max_resolve_attempts: 1,
            id_collision_policy: IdCollisionPolicy::default(),
            regions: Vec::new(),
            threads: None,
        }
    }
}

impl ComposeConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref()).with_context(|| {
            format!("unable to open configuration {}", path.as_ref().display())
        })?);
        let config = serde_json::from_reader(reader).with_context(|| {
            format!("invalid configuration {}", path.as_ref().display())
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shard_size == 0 {
            return Err(Error::InvalidShardSize.into());
        }
        if self.max_resolve_attempts == 0 {
            return Err(Error::InvalidResolveAttempts.into());
        }
        Ok(())
    }

    /// Parsed regions of interest, or one interval per reference sequence.
    pub fn regions_of_interest(
        &self,
        dictionary: &dyn SequenceDictionary,
    ) -> Result<Vec<GenomicInterval>> {
        if self.regions.is_empty() {
            GenomicInterval::whole_reference(dictionary)
        } else {
            self.regions
                .iter()
                .map(|spec| GenomicInterval::parse_region(spec, dictionary))
                .collect()
        }
    }
}

/// A variant together with the cleaned contigs supporting it.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct ComposedVariant {
    variant: StructuralVariant,
    /// Identity used to join the evidence, see `IdCollisionPolicy`.
    id: String,
    /// Hard clip free contigs, sorted by name.
    contigs: Vec<AlignmentFragment>,
}

impl ComposedVariant {
    pub fn new(variant: StructuralVariant, id: String, contigs: Vec<AlignmentFragment>) -> Self {
        ComposedVariant {
            variant,
            id,
            contigs,
        }
    }
}

#[derive(Debug, Clone, Default, Getters, CopyGetters)]
pub struct ComposeStats {
    /// Supported variants read from the variant source.
    #[getset(get_copy = "pub")]
    variants: usize,
    /// Composed variants handed to the sink, one per identity.
    #[getset(get_copy = "pub")]
    composed: usize,
    #[getset(get = "pub")]
    skipped: SimpleCounter<SkipReason>,
    #[getset(get_copy = "pub")]
    contigs_loaded: usize,
    #[getset(get_copy = "pub")]
    contigs_emitted: usize,
    /// Contigs whose fragments could not be completed or merged.
    #[getset(get_copy = "pub")]
    contigs_dropped: usize,
    /// Contigs completed via their alternate alignments.
    #[getset(get_copy = "pub")]
    contigs_resolved: usize,
    #[getset(get_copy = "pub")]
    id_collisions: usize,
    #[getset(get_copy = "pub")]
    join: JoinStats,
}

#[derive(Default)]
struct VariantOutcome {
    contigs: Vec<AlignmentFragment>,
    dropped: usize,
    resolved: usize,
}

#[derive(TypedBuilder)]
pub struct Composer<'a> {
    #[builder(default)]
    config: ComposeConfig,
    dictionary: &'a dyn SequenceDictionary,
    alignments: &'a dyn AlignmentSource,
    variants: &'a dyn VariantSource,
}

impl<'a> Composer<'a> {
    pub fn compose(&self, sink: &mut dyn Sink) -> Result<ComposeStats> {
        self.config.validate()?;
        let mut stats = ComposeStats::default();
        let regions = self.config.regions_of_interest(self.dictionary)?;

        let mut variants = Vec::new();
        for record in self.variants.fetch(&regions)? {
            if let Some(variant) = collect_variant(&record, &mut stats.skipped)? {
                variants.push(variant);
            }
        }
        for (reason, count) in stats.skipped.iter().sorted_by_key(|(_, count)| **count) {
            info!("Skipped {} {}.", count, reason);
        }
        stats.variants = variants.len();
        info!("Loaded {} structural variants.", variants.len());

        let assignment = assign_identities(&variants, self.config.id_collision_policy)?;
        stats.id_collisions = assignment.collisions();

        let windows = variants
            .iter()
            .zip(assignment.ids())
            .map(|(variant, id)| -> Result<_> {
                Ok(VariantWindows::new(
                    id.clone(),
                    breakpoint_intervals(variant, self.config.padding, self.dictionary)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let fragments = self.alignments.fetch(&regions)?;
        stats.contigs_loaded = fragments.len();
        info!("Loaded {} contig alignments.", fragments.len());

        let engine = ShardedJoinEngine::new(&regions, self.config.shard_size, self.dictionary)?;
        let join = engine.join(&windows, &fragments);
        stats.join = join.stats;

        // the first variant of each identity represents it
        let representatives = assignment
            .ids()
            .iter()
            .enumerate()
            .unique_by(|(_, id)| (*id).clone())
            .map(|(i, id)| (&variants[i], id))
            .collect_vec();

        let resolver =
            SplitAlignmentResolver::new(self.alignments, self.config.max_resolve_attempts);
        let fragments = &fragments;
        let joined = &join.fragments;
        let outcomes = representatives
            .par_iter()
            .map(|(variant, id)| -> Result<_> {
                let evidence = joined
                    .get(id.as_str())
                    .map(|indices| indices.iter().map(|i| fragments[*i].clone()).collect())
                    .unwrap_or_default();
                let outcome = reconcile(evidence, &resolver).with_context(|| {
                    format!(
                        "failed to reconcile contigs of variant {} at {}:{}",
                        id,
                        variant.contig(),
                        variant.start()
                    )
                })?;
                Ok((*variant, *id, outcome))
            })
            .collect::<Result<Vec<_>>>()?;

        let order = |variant: &StructuralVariant| {
            self.dictionary
                .ordering_of(variant.contig())
                .unwrap_or(usize::MAX)
        };
        for (variant, id, outcome) in outcomes
            .into_iter()
            .sorted_by(|(a, a_id, _), (b, b_id, _)| {
                (order(*a), a.start(), a_id).cmp(&(order(*b), b.start(), b_id))
            })
        {
            stats.contigs_emitted += outcome.contigs.len();
            stats.contigs_dropped += outcome.dropped;
            stats.contigs_resolved += outcome.resolved;
            stats.composed += 1;
            sink.write(&ComposedVariant::new(
                variant.clone(),
                id.clone(),
                outcome.contigs,
            ))?;
        }
        sink.finish()?;

        info!(
            "Composed {} variants with {} contigs ({} resolved via alternate alignments, {} dropped).",
            stats.composed, stats.contigs_emitted, stats.contigs_resolved, stats.contigs_dropped
        );
        if stats.id_collisions > 0 {
            warn!(
                "{} variant identifiers were shared by variants at distinct loci (policy: {}).",
                stats.id_collisions, self.config.id_collision_policy
            );
        }

        Ok(stats)
    }
}

/// Reduce the evidence of one variant to one record per contig and resolve remaining hard
/// clips.
fn reconcile(
    evidence: Vec<AlignmentFragment>,
    resolver: &SplitAlignmentResolver,
) -> Result<VariantOutcome> {
    let reduction = reduce_fragments(evidence)?;
    let mut outcome = VariantOutcome::default();
    let resolutions = reduction
        .contigs
        .into_iter()
        .map(|contig| resolver.resolve(contig))
        .chain(
            reduction
                .incomplete
                .into_iter()
                .map(|pieces| resolver.resolve_pieces(pieces)),
        );
    for resolution in resolutions {
        match resolution? {
            ResolveOutcome::Unclipped(contig) => outcome.contigs.push(contig),
            ResolveOutcome::Resolved(contig) => {
                outcome.resolved += 1;
                outcome.contigs.push(contig);
            }
            ResolveOutcome::GaveUp { .. } => outcome.dropped += 1,
        }
    }
    outcome.contigs.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contigs::tests::fragment;
    use crate::io::{Dictionary, InMemoryAlignments, InMemoryVariants, VecSink};
    use crate::variants::CandidateRecord;

    fn record(contig: &str, pos: u64, alt: &[u8], svlen: i64) -> CandidateRecord {
        CandidateRecord {
            contig: contig.to_owned(),
            pos,
            end: pos,
            id: None,
            alt_alleles: vec![alt.to_vec()],
            svlen: Some(svlen),
        }
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config: ComposeConfig = serde_json::from_str(r#"{"padding": 10}"#).unwrap();
        assert_eq!(config.padding, 10);
        assert_eq!(config.shard_size, 10_000);
        assert_eq!(config.max_resolve_attempts, 1);
        assert_eq!(config.id_collision_policy, IdCollisionPolicy::Merge);
        assert!(config.validate().is_ok());

        let config: ComposeConfig =
            serde_json::from_str(r#"{"id_collision_policy": "fail", "shard_size": 0}"#).unwrap();
        assert_eq!(config.id_collision_policy, IdCollisionPolicy::Fail);
        assert!(config.validate().is_err());
        assert!(serde_json::from_str::<ComposeConfig>(r#"{"shards": 1}"#).is_err());
    }

    #[test]
    fn test_regions_of_interest() {
        let dict = Dictionary::new(vec![("chr1".to_owned(), 1000), ("chr2".to_owned(), 500)]);
        let mut config = ComposeConfig::default();
        assert_eq!(config.regions_of_interest(&dict).unwrap().len(), 2);
        config.regions = vec!["chr2:100-200".to_owned()];
        assert_eq!(
            config.regions_of_interest(&dict).unwrap(),
            vec![GenomicInterval::new("chr2", 100, 200).unwrap()]
        );
    }

    #[test]
    fn test_output_is_sorted_by_reference_order() {
        let dict = Dictionary::new(vec![("chr2".to_owned(), 5000), ("chr1".to_owned(), 5000)]);
        let variants = InMemoryVariants::new(vec![
            record("chr1", 100, b"<INS>", 20),
            record("chr2", 3000, b"<DEL>", -40),
            record("chr2", 200, b"<INS>", 10),
            record("chr1", 150, b"A", 1),
        ]);
        let alignments = InMemoryAlignments::new(vec![fragment(
            "ctg1",
            90,
            false,
            "30M",
            &[b'G'; 30],
        )]);
        let composer = Composer::builder()
            .config(ComposeConfig {
                shard_size: 1000,
                ..Default::default()
            })
            .dictionary(&dict)
            .alignments(&alignments)
            .variants(&variants)
            .build();
        let mut sink = VecSink::default();
        let stats = composer.compose(&mut sink).unwrap();

        let loci = sink
            .composed()
            .iter()
            .map(|c| (c.variant().contig().as_str(), c.variant().start()))
            .collect_vec();
        assert_eq!(loci, vec![("chr2", 200), ("chr2", 3000), ("chr1", 100)]);
        assert!(*sink.finished());
        assert_eq!(stats.variants(), 3);
        assert_eq!(stats.skipped().count(&SkipReason::NonSymbolicAllele), 1);
        assert_eq!(stats.contigs_emitted(), 1);
        assert_eq!(sink.composed()[2].contigs()[0].name(), "ctg1");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dict = Dictionary::new(vec![("chr1".to_owned(), 5000)]);
        let variants = InMemoryVariants::default();
        let alignments = InMemoryAlignments::default();
        let composer = Composer::builder()
            .config(ComposeConfig {
                max_resolve_attempts: 0,
                ..Default::default()
            })
            .dictionary(&dict)
            .alignments(&alignments)
            .variants(&variants)
            .build();
        assert!(composer.compose(&mut VecSink::default()).is_err());
    }
}
