//! Cohort-wide variant site catalog: accumulation, persistence, re-loading

use crate::{vcf, CatalogSite, RepopError, RepopResult};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SiteAlleles {
    ref_allele: String,
    alts: BTreeSet<String>,
}

/// Accumulates every variant site observed across a cohort of files.
///
/// One instance is threaded through the per-file recording steps; partial
/// accumulators built from disjoint file subsets combine with
/// [`CatalogAccumulator::merge`].
#[derive(Debug, Default)]
pub struct CatalogAccumulator {
    sites: BTreeMap<(String, u32), SiteAlleles>,
}

impl CatalogAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed variant. `alt` may itself be comma-joined; it is
    /// split into atomic alleles before insertion, so repeated collapsing
    /// cannot nest joined strings.
    pub fn observe(&mut self, chrom: &str, pos: u32, ref_allele: &str, alt: &str) {
        let parts: Vec<&str> = alt
            .split(',')
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();
        if parts.is_empty() {
            return;
        }

        let entry = self
            .sites
            .entry((chrom.to_string(), pos))
            .or_insert_with(|| SiteAlleles {
                ref_allele: ref_allele.to_string(),
                alts: BTreeSet::new(),
            });
        for part in parts {
            entry.alts.insert(part.to_string());
        }
    }

    /// Union with an accumulator built from another file subset. The
    /// receiver's reference allele wins on collision, matching the
    /// first-seen rule of the sequential fold.
    pub fn merge(mut self, other: CatalogAccumulator) -> CatalogAccumulator {
        for (key, site) in other.sites {
            match self.sites.entry(key) {
                Entry::Occupied(mut e) => {
                    e.get_mut().alts.extend(site.alts);
                }
                Entry::Vacant(e) => {
                    e.insert(site);
                }
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Flatten into site records sorted by chromosome then position, each
    /// alt set comma-joined in deterministic order.
    pub fn into_sites(self) -> Vec<CatalogSite> {
        self.sites
            .into_iter()
            .map(|((chrom, pos), site)| CatalogSite {
                chrom,
                pos,
                ref_allele: site.ref_allele,
                alt: site
                    .alts
                    .into_iter()
                    .collect::<Vec<_>>()
                    .join(","),
            })
            .collect()
    }
}

/// Fold one file's records into the accumulator.
pub fn record_file(
    mut acc: CatalogAccumulator,
    path: &Path,
) -> RepopResult<CatalogAccumulator> {
    vcf::scan_records(path, |record| {
        for alt in &record.alts {
            acc.observe(&record.chrom, record.pos, &record.ref_allele, alt);
        }
    })?;
    Ok(acc)
}

/// Build the catalog accumulator over every file of a cohort, in order.
pub fn build_catalog(files: &[PathBuf]) -> RepopResult<CatalogAccumulator> {
    let mut acc = CatalogAccumulator::new();
    let total = files.len();
    for (i, path) in files.iter().enumerate() {
        log::info!("{} of {}: {}", i + 1, total, path.display());
        acc = record_file(acc, path)?;
    }
    Ok(acc)
}

/// Catalog file name for a cohort directory, written to the working
/// directory.
pub fn catalog_file_name(input_dir: &Path) -> String {
    let base = input_dir
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cohort".to_string());
    format!("{base}.allObsVariants.step1")
}

/// Persist sites as a tab-separated table with the fixed four-column header.
pub fn write_catalog(sites: &[CatalogSite], path: &Path) -> RepopResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    writer.write_record(["chrom", "pos", "ref", "alt"])?;
    for site in sites {
        writer.write_record([
            site.chrom.as_str(),
            &site.pos.to_string(),
            &site.ref_allele,
            &site.alt,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a persisted catalog, validating the four-column shape, and return
/// the sites sorted by chromosome then numeric position.
pub fn load_catalog(path: &Path) -> RepopResult<Vec<CatalogSite>> {
    if !path.exists() {
        return Err(RepopError::CatalogNotFound(path.display().to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() != 4 {
        return Err(RepopError::InvalidCatalog(format!(
            "expected 4 columns (chrom, pos, ref, alt), found {}",
            headers.len()
        )));
    }

    let mut sites = Vec::new();
    for row in reader.deserialize() {
        let site: CatalogSite =
            row.map_err(|e| RepopError::InvalidCatalog(e.to_string()))?;
        sites.push(site);
    }

    sites.sort_by(|a, b| a.chrom.cmp(&b.chrom).then(a.pos.cmp(&b.pos)));
    Ok(sites)
}
