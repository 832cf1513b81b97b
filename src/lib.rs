//! # repop - Reference Call Repopulation Tool
//!
//! Rewrites a cohort of single-sample variant call files (VCF) so that every
//! sample carries an explicit genotype record at every site observed as
//! variant in at least one sample. Step 1 scans the cohort and catalogs all
//! observed variant sites; step 2 replays that catalog against each file,
//! emitting the file's own call where one exists and synthesizing a
//! homozygous-reference call where it does not.

pub mod backfill;
pub mod catalog;
pub mod genotype;
pub mod utils;
pub mod vcf;

use serde::{Deserialize, Serialize};

/// A variant site in the cohort-wide catalog.
///
/// `alt` is the comma-joined, deduplicated union of every alternate allele
/// observed at `(chrom, pos)` across the whole cohort. Within one catalog,
/// `(chrom, pos)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSite {
    pub chrom: String,
    pub pos: u32,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    pub alt: String,
}

impl CatalogSite {
    pub fn new(chrom: String, pos: u32, ref_allele: String, alt: String) -> Self {
        Self {
            chrom,
            pos,
            ref_allele,
            alt,
        }
    }
}

/// Error types for the repop library
#[derive(Debug, thiserror::Error)]
pub enum RepopError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("index file not found: {0}")]
    MissingIndex(String),

    #[error("multiple genotypes recorded in {0} where exactly one was expected")]
    MultipleGenotypes(String),

    #[error("step 2 requires a site catalog (--catalog)")]
    MissingCatalogArg,

    #[error("catalog file not found: {0}")]
    CatalogNotFound(String),

    #[error("output directory not found: {0}")]
    MissingOutputDir(String),

    #[error("output path is not a directory: {0}")]
    OutputNotADirectory(String),

    #[error("input is a directory but no output directory was given: {0}")]
    DirectoryInput(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTSlib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl RepopError {
    /// Process exit code for this failure. Every cause keeps its own code so
    /// callers can distinguish them without parsing stderr.
    pub fn exit_code(&self) -> i32 {
        match self {
            RepopError::Usage(_) => 1,
            RepopError::MissingIndex(_) => 2,
            RepopError::MultipleGenotypes(_) => 3,
            RepopError::MissingCatalogArg => 4,
            RepopError::CatalogNotFound(_) => 5,
            RepopError::MissingOutputDir(_) => 6,
            RepopError::OutputNotADirectory(_) => 7,
            RepopError::DirectoryInput(_) => 8,
            RepopError::InvalidCatalog(_) => 9,
            RepopError::Io(_) => 10,
            RepopError::Htslib(_) => 11,
            RepopError::Csv(_) => 12,
        }
    }
}

pub type RepopResult<T> = Result<T, RepopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            RepopError::Usage(String::new()),
            RepopError::MissingIndex(String::new()),
            RepopError::MultipleGenotypes(String::new()),
            RepopError::MissingCatalogArg,
            RepopError::CatalogNotFound(String::new()),
            RepopError::MissingOutputDir(String::new()),
            RepopError::OutputNotADirectory(String::new()),
            RepopError::DirectoryInput(String::new()),
            RepopError::InvalidCatalog(String::new()),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&c| c != 0));
    }
}
