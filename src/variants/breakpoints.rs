// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;

use super::{StructuralVariant, SvKind};
use crate::errors::Error;
use crate::intervals::GenomicInterval;
use crate::io::SequenceDictionary;

/// Reference windows that should contain the evidence of the given variant.
///
/// Insertions yield a single window around the insertion site, deletions one window around
/// each of the two breakpoints. All windows are clamped to the contig.
pub fn breakpoint_intervals(
    variant: &StructuralVariant,
    padding: u64,
    dictionary: &dyn SequenceDictionary,
) -> Result<Vec<GenomicInterval>> {
    let contig_len = dictionary
        .length_of(variant.contig())
        .ok_or_else(|| Error::UnknownContig {
            contig: variant.contig().to_owned(),
        })?;

    let clamped = |start: u64, end: u64| -> Result<GenomicInterval> {
        let start = start.saturating_sub(padding).max(1);
        let end = end.saturating_add(padding).min(contig_len);
        if start > end {
            return Err(Error::EmptyBreakpointInterval {
                contig: variant.contig().to_owned(),
                pos: variant.start(),
                len: contig_len,
            }
            .into());
        }
        GenomicInterval::new(variant.contig().to_owned(), start, end)
    };

    let pos = variant.start();
    match variant.kind() {
        SvKind::Insertion => Ok(vec![clamped(pos, pos + 1)?]),
        SvKind::Deletion => {
            let len = variant.length().unsigned_abs();
            Ok(vec![clamped(pos, pos)?, clamped(pos + len, pos + len)?])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Dictionary;

    fn dictionary() -> Dictionary {
        Dictionary::new(vec![("chr1".to_owned(), 2000)])
    }

    fn variant(start: u64, kind: SvKind, len: i64) -> StructuralVariant {
        StructuralVariant::new("chr1", start, start, kind, Some(len), None).unwrap()
    }

    fn bounds(intervals: &[GenomicInterval]) -> Vec<(u64, u64)> {
        intervals.iter().map(|i| (i.start(), i.end())).collect()
    }

    #[test]
    fn test_insertion() {
        let intervals =
            breakpoint_intervals(&variant(1000, SvKind::Insertion, 120), 50, &dictionary())
                .unwrap();
        assert_eq!(bounds(&intervals), vec![(950, 1051)]);
    }

    #[test]
    fn test_deletion() {
        let intervals =
            breakpoint_intervals(&variant(1000, SvKind::Deletion, -300), 50, &dictionary())
                .unwrap();
        assert_eq!(bounds(&intervals), vec![(950, 1050), (1250, 1350)]);
    }

    #[test]
    fn test_clamping() {
        let dict = dictionary();
        let intervals =
            breakpoint_intervals(&variant(20, SvKind::Insertion, 10), 50, &dict).unwrap();
        assert_eq!(bounds(&intervals), vec![(1, 71)]);

        let intervals =
            breakpoint_intervals(&variant(1900, SvKind::Deletion, -80), 50, &dict).unwrap();
        assert_eq!(bounds(&intervals), vec![(1850, 1950), (1930, 2000)]);

        for start in (1..2000).step_by(97) {
            let intervals =
                breakpoint_intervals(&variant(start, SvKind::Deletion, -500), 50, &dict);
            // the second window starts past the contig end
            if start + 500 - 50 > 2000 {
                assert!(intervals.is_err(), "start {}", start);
                continue;
            }
            let intervals = intervals.unwrap();
            assert_eq!(intervals.len(), 2);
            for interval in intervals {
                assert!(interval.start() >= 1);
                assert!(interval.start() <= interval.end());
                assert!(interval.end() <= 2000);
            }
        }
    }

    #[test]
    fn test_outside_of_contig() {
        let dict = dictionary();
        assert!(breakpoint_intervals(&variant(2100, SvKind::Deletion, -10), 50, &dict).is_err());
        let unknown =
            StructuralVariant::new("chrX", 10, 10, SvKind::Insertion, Some(5), None).unwrap();
        assert!(breakpoint_intervals(&unknown, 50, &dict).is_err());
    }
}
