//! Indexed VCF access, record decoding, and header pass-through

use crate::genotype::GenotypeClass;
use crate::utils::is_gzipped;
use crate::{RepopError, RepopResult};
use flate2::read::MultiGzDecoder;
use rust_htslib::bcf::header::HeaderView;
use rust_htslib::bcf::record::GenotypeAllele;
use rust_htslib::bcf::{self, Read};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Two-part suffix every per-sample input file must carry.
pub const VCF_SUFFIX: &str = ".vcf.gz";

/// Suffix of the companion positional index expected next to each input.
pub const INDEX_SUFFIX: &str = ".tbi";

/// One sample's call evidence decoded from a single record. Transient:
/// created per record, formatted into one output line, then dropped.
#[derive(Debug, Clone)]
pub struct DecodedCall {
    pub ref_allele: String,
    pub alts: Vec<String>,
    pub qual: Option<f32>,
    pub filter: String,
    pub genotype: GenotypeClass,
    pub allelic_depths: Option<Vec<i32>>,
    pub total_depth: Option<i32>,
}

/// One record's identity and depth evidence streamed during a whole-file
/// scan.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub chrom: String,
    pub pos: u32,
    pub ref_allele: String,
    pub alts: Vec<String>,
    pub total_depth: Option<i32>,
}

/// Path of the companion tabix index, failing when it is absent.
pub fn index_path(path: &Path) -> RepopResult<PathBuf> {
    let mut name = path.as_os_str().to_owned();
    name.push(INDEX_SUFFIX);
    let index = PathBuf::from(name);
    if index.exists() {
        Ok(index)
    } else {
        Err(RepopError::MissingIndex(index.display().to_string()))
    }
}

/// Sample identifier derived from the file's own name: the base name with
/// the `.vcf.gz` suffix stripped.
pub fn sample_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(VCF_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

/// An indexed single-sample VCF opened for point lookups.
pub struct SampleVcf {
    reader: bcf::IndexedReader,
    header: HeaderView,
    pub sample_id: String,
}

impl SampleVcf {
    /// Open a file for indexed access. The companion `.tbi` must be present
    /// and the file must carry exactly one sample column.
    pub fn open<P: AsRef<Path>>(path: P) -> RepopResult<Self> {
        let path = path.as_ref();
        index_path(path)?;

        let reader = bcf::IndexedReader::from_path(path)?;
        let header = reader.header().clone();
        if header.sample_count() != 1 {
            return Err(RepopError::MultipleGenotypes(path.display().to_string()));
        }

        Ok(SampleVcf {
            reader,
            header,
            sample_id: sample_id_from_path(path),
        })
    }

    /// Look up the record at exactly `(chrom, pos)` (1-based position).
    ///
    /// A chromosome missing from this file's header means the sample has no
    /// call anywhere on it, so the lookup is a miss rather than an error.
    pub fn lookup(&mut self, chrom: &str, pos: u32) -> RepopResult<Option<DecodedCall>> {
        let rid = match self.header.name2rid(chrom.as_bytes()) {
            Ok(rid) => rid,
            Err(_) => return Ok(None),
        };

        let start = u64::from(pos.saturating_sub(1));
        if self.reader.fetch(rid, start, Some(start + 1)).is_err() {
            return Ok(None);
        }

        for record in self.reader.records() {
            let record = record?;
            if record.pos() == i64::from(pos) - 1 {
                return decode_call(&self.header, &record).map(Some);
            }
        }
        Ok(None)
    }
}

/// Decode the parts of a record that the fixed output layout carries.
pub fn decode_call(header: &HeaderView, record: &bcf::Record) -> RepopResult<DecodedCall> {
    let alleles = record.alleles();
    let ref_allele = alleles
        .first()
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .unwrap_or_else(|| "N".to_string());
    let alts: Vec<String> = alleles
        .iter()
        .skip(1)
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .collect();

    let qual = record.qual();
    let qual = if qual.is_nan() { None } else { Some(qual) };

    // Last recorded filter wins; an unfiltered record reads as PASS.
    let mut filter = String::from("PASS");
    for id in record.filters() {
        let name = String::from_utf8_lossy(&header.id_to_name(id)).into_owned();
        if name != "PASS" {
            filter = name;
        }
    }

    let genotypes = record.genotypes()?;
    let genotype = genotypes.get(0);
    let indices: Vec<Option<u32>> = genotype
        .iter()
        .map(|allele| match allele {
            GenotypeAllele::Unphased(i) | GenotypeAllele::Phased(i) if *i >= 0 => {
                Some(*i as u32)
            }
            _ => None,
        })
        .collect();
    let genotype = GenotypeClass::classify(&indices);

    let allelic_depths = match record.format(b"AD").integer() {
        Ok(values) => values
            .first()
            .map(|v| v.iter().copied().filter(|d| *d >= 0).collect::<Vec<i32>>())
            .filter(|v| !v.is_empty()),
        Err(_) => None,
    };

    let total_depth = total_depth_of(record);

    Ok(DecodedCall {
        ref_allele,
        alts,
        qual,
        filter,
        genotype,
        allelic_depths,
        total_depth,
    })
}

fn total_depth_of(record: &bcf::Record) -> Option<i32> {
    match record.format(b"DP").integer() {
        Ok(values) => values
            .first()
            .and_then(|v| v.first().copied())
            .filter(|d| *d >= 0),
        Err(_) => None,
    }
}

/// Stream every record of a file through `f`, enforcing the single-sample
/// invariant.
pub fn scan_records<P, F>(path: P, mut f: F) -> RepopResult<()>
where
    P: AsRef<Path>,
    F: FnMut(ScanRecord),
{
    let path = path.as_ref();
    let mut reader = bcf::Reader::from_path(path)?;
    let header = reader.header().clone();
    if header.sample_count() != 1 {
        return Err(RepopError::MultipleGenotypes(path.display().to_string()));
    }

    for record in reader.records() {
        let record = record?;
        let rid = match record.rid() {
            Some(rid) => rid,
            None => continue,
        };
        let chrom = String::from_utf8_lossy(header.rid2name(rid)?).into_owned();
        let pos = (record.pos() + 1) as u32;

        let alleles = record.alleles();
        let ref_allele = alleles
            .first()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .unwrap_or_else(|| "N".to_string());
        let alts: Vec<String> = alleles
            .iter()
            .skip(1)
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        let total_depth = total_depth_of(&record);

        f(ScanRecord {
            chrom,
            pos,
            ref_allele,
            alts,
            total_depth,
        });
    }
    Ok(())
}

/// Header metadata lines carried into backfilled output: the GT/AD/DP
/// FORMAT declarations, the AC/AF/AN INFO declarations, every FILTER and
/// contig declaration, and the caller's command-line and reference-genome
/// declarations.
pub fn extract_metadata_lines<P: AsRef<Path>>(path: P) -> RepopResult<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gzipped(path)? {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.starts_with('#') {
            break;
        }
        if keep_metadata_line(&line) {
            lines.push(line.trim_end().to_string());
        }
    }
    Ok(lines)
}

fn keep_metadata_line(line: &str) -> bool {
    if let Some(rest) = line.strip_prefix("##FORMAT=<ID=") {
        return ["GT,", "AD,", "DP,"].iter().any(|id| rest.starts_with(id));
    }
    if let Some(rest) = line.strip_prefix("##INFO=<ID=") {
        return ["AC,", "AF,", "AN,"].iter().any(|id| rest.starts_with(id));
    }
    if line.starts_with("##FILTER=")
        || line.starts_with("##contig=")
        || line.starts_with("##reference=")
    {
        return true;
    }
    // Callers record their invocation under vendor-specific keys, e.g.
    // ##DRAGENCommandLine= or ##GATKCommandLine=.
    if let Some(rest) = line.strip_prefix("##") {
        if let Some(key) = rest.split('=').next() {
            return key.ends_with("CommandLine");
        }
    }
    false
}
