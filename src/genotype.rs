//! Genotype classification and read-depth estimation

use crate::{vcf, RepopResult};
use std::collections::HashMap;
use std::path::PathBuf;

/// Display code for one sample's genotype at one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenotypeClass {
    HomRef,
    NoCall,
    Het,
    HomVar,
}

impl GenotypeClass {
    /// Classify a genotype from its allele indices; `None` marks a missing
    /// allele call.
    ///
    /// Checked in order: no-call, heterozygous, homozygous-variant;
    /// everything else is homozygous-reference. Which alternate allele is
    /// carried is not tracked, so `1/2` classifies as heterozygous and `2/2`
    /// as homozygous-variant.
    pub fn classify(alleles: &[Option<u32>]) -> Self {
        let mut indices = Vec::with_capacity(alleles.len());
        for allele in alleles {
            match allele {
                Some(i) => indices.push(*i),
                None => return GenotypeClass::NoCall,
            }
        }
        if indices.is_empty() {
            return GenotypeClass::NoCall;
        }
        if indices.iter().any(|&i| i != indices[0]) {
            return GenotypeClass::Het;
        }
        if indices[0] > 0 {
            GenotypeClass::HomVar
        } else {
            GenotypeClass::HomRef
        }
    }

    /// The code written into the GT field.
    pub fn code(&self) -> &'static str {
        match self {
            GenotypeClass::HomRef => "0/0",
            GenotypeClass::NoCall => "./.",
            GenotypeClass::Het => "0/1",
            GenotypeClass::HomVar => "1/1",
        }
    }
}

/// Per-locus read-depth evidence accumulated from a cohort scan.
///
/// Serves floored-mean depth estimates for calls that carry no DP of their
/// own, most notably synthesized reference calls.
#[derive(Debug, Default)]
pub struct DepthIndex {
    depths: HashMap<String, HashMap<u32, (i64, u32)>>,
}

impl DepthIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample's total depth at a locus.
    pub fn record(&mut self, chrom: &str, pos: u32, depth: i32) {
        let entry = self
            .depths
            .entry(chrom.to_string())
            .or_default()
            .entry(pos)
            .or_insert((0, 0));
        entry.0 += i64::from(depth);
        entry.1 += 1;
    }

    /// Floored mean of the depths observed at a locus, if any were.
    pub fn estimate(&self, chrom: &str, pos: u32) -> Option<i32> {
        self.depths
            .get(chrom)
            .and_then(|by_pos| by_pos.get(&pos))
            .map(|&(sum, n)| (sum / i64::from(n)) as i32)
    }

    pub fn len(&self) -> usize {
        self.depths.values().map(|by_pos| by_pos.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

/// Accumulate per-locus depth evidence across a set of files.
pub fn build_depth_index(files: &[PathBuf]) -> RepopResult<DepthIndex> {
    let mut index = DepthIndex::new();
    for path in files {
        vcf::scan_records(path, |record| {
            if let Some(dp) = record.total_depth {
                index.record(&record.chrom, record.pos, dp);
            }
        })?;
    }
    log::debug!("depth evidence collected for {} loci", index.len());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_hom_ref() {
        assert_eq!(
            GenotypeClass::classify(&[Some(0), Some(0)]),
            GenotypeClass::HomRef
        );
    }

    #[test]
    fn test_classify_no_call() {
        assert_eq!(
            GenotypeClass::classify(&[None, None]),
            GenotypeClass::NoCall
        );
        assert_eq!(
            GenotypeClass::classify(&[Some(1), None]),
            GenotypeClass::NoCall
        );
        assert_eq!(GenotypeClass::classify(&[]), GenotypeClass::NoCall);
    }

    #[test]
    fn test_classify_het() {
        assert_eq!(
            GenotypeClass::classify(&[Some(0), Some(1)]),
            GenotypeClass::Het
        );
        assert_eq!(
            GenotypeClass::classify(&[Some(1), Some(0)]),
            GenotypeClass::Het
        );
    }

    #[test]
    fn test_classify_hom_var() {
        assert_eq!(
            GenotypeClass::classify(&[Some(1), Some(1)]),
            GenotypeClass::HomVar
        );
    }

    #[test]
    fn test_classify_collapses_multiallelic() {
        // Allele identity above index 1 is not tracked in the two-code scheme.
        assert_eq!(
            GenotypeClass::classify(&[Some(1), Some(2)]),
            GenotypeClass::Het
        );
        assert_eq!(
            GenotypeClass::classify(&[Some(2), Some(2)]),
            GenotypeClass::HomVar
        );
    }

    #[test]
    fn test_classify_haploid() {
        assert_eq!(GenotypeClass::classify(&[Some(0)]), GenotypeClass::HomRef);
        assert_eq!(GenotypeClass::classify(&[Some(1)]), GenotypeClass::HomVar);
    }

    #[test]
    fn test_codes() {
        assert_eq!(GenotypeClass::HomRef.code(), "0/0");
        assert_eq!(GenotypeClass::NoCall.code(), "./.");
        assert_eq!(GenotypeClass::Het.code(), "0/1");
        assert_eq!(GenotypeClass::HomVar.code(), "1/1");
    }

    #[test]
    fn test_depth_estimate_floored_mean() {
        let mut index = DepthIndex::new();
        index.record("chr1", 100, 30);
        index.record("chr1", 100, 31);

        assert_eq!(index.estimate("chr1", 100), Some(30));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_depth_estimate_single_observation() {
        let mut index = DepthIndex::new();
        index.record("chr2", 200, 42);

        assert_eq!(index.estimate("chr2", 200), Some(42));
    }

    #[test]
    fn test_depth_estimate_absent_locus() {
        let mut index = DepthIndex::new();
        index.record("chr1", 100, 30);

        assert_eq!(index.estimate("chr1", 101), None);
        assert_eq!(index.estimate("chr2", 100), None);
    }

    #[test]
    fn test_depth_index_empty() {
        let index = DepthIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.estimate("chr1", 1), None);
    }
}
