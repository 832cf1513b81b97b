//! Ordered catalog replay and reference-call synthesis

use crate::genotype::{DepthIndex, GenotypeClass};
use crate::vcf::{self, DecodedCall, SampleVcf};
use crate::{CatalogSite, RepopResult};
use flate2::write::GzEncoder;
use flate2::Compression;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// FILTER value marking a synthesized homozygous-reference call.
pub const REF_CALL_FILTER: &str = "REF_CALL";

/// Sentinel pair written when allelic depths are unknown.
pub const AD_SENTINEL: &str = "-1,-1";

/// Sentinel written when total depth is unknown.
pub const DP_SENTINEL: i32 = -1;

/// Suffix substituted for `.vcf.gz` on backfilled outputs.
pub const BACKFILLED_SUFFIX: &str = ".backfilled.vcf.gz";

/// Output file name for one input, with the per-sample suffix replaced.
pub fn backfilled_name(input_name: &str) -> String {
    match input_name.strip_suffix(vcf::VCF_SUFFIX) {
        Some(stem) => format!("{stem}{BACKFILLED_SUFFIX}"),
        None => format!("{input_name}{BACKFILLED_SUFFIX}"),
    }
}

/// QUAL column text: `.` when absent, otherwise the score with trailing
/// zeros trimmed.
fn format_qual(qual: Option<f32>) -> String {
    match qual {
        None => ".".to_string(),
        Some(q) => {
            let text = format!("{q:.2}");
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    }
}

/// Data line for a site the file called itself, reformatted to the fixed
/// nine-plus-one-sample layout.
fn own_call_line(chrom: &str, pos: u32, call: &DecodedCall, depths: &DepthIndex) -> String {
    let alt = if call.alts.is_empty() {
        ".".to_string()
    } else {
        call.alts.join(",")
    };
    let ad = match &call.allelic_depths {
        Some(values) => values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(","),
        None => AD_SENTINEL.to_string(),
    };
    let dp = call
        .total_depth
        .or_else(|| depths.estimate(chrom, pos))
        .unwrap_or(DP_SENTINEL);

    format!(
        "{}\t{}\t.\t{}\t{}\t{}\t{}\t.\tGT:AD:DP\t{}:{}:{}",
        chrom,
        pos,
        call.ref_allele,
        alt,
        format_qual(call.qual),
        call.filter,
        call.genotype.code(),
        ad,
        dp
    )
}

/// Synthesized homozygous-reference line for a site the file never saw.
/// REF and ALT come from the catalog's collapsed site.
fn ref_call_line(site: &CatalogSite, depths: &DepthIndex) -> String {
    let dp = depths
        .estimate(&site.chrom, site.pos)
        .unwrap_or(DP_SENTINEL);

    format!(
        "{}\t{}\t.\t{}\t{}\t.\t{}\t.\tGT:AD:DP\t{}:{}:{}",
        site.chrom,
        site.pos,
        site.ref_allele,
        site.alt,
        REF_CALL_FILTER,
        GenotypeClass::HomRef.code(),
        AD_SENTINEL,
        dp
    )
}

fn write_header<W: Write>(
    out: &mut W,
    metadata: &[String],
    provenance: &str,
    sample_id: &str,
) -> RepopResult<()> {
    writeln!(out, "##fileformat=VCFv4.2")?;
    for line in metadata {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "##repopCmd={provenance}")?;
    writeln!(
        out,
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{sample_id}"
    )?;
    Ok(())
}

/// Replay the catalog against one open file: exactly one record per catalog
/// site, in catalog order. Returns the number of records emitted.
pub fn backfill_file<W: Write>(
    catalog: &[CatalogSite],
    sample: &mut SampleVcf,
    depths: &DepthIndex,
    metadata: &[String],
    provenance: &str,
    out: &mut W,
) -> RepopResult<usize> {
    write_header(out, metadata, provenance, &sample.sample_id)?;

    let mut seen: HashSet<(&str, u32)> = HashSet::new();
    let mut emitted = 0usize;
    for site in catalog {
        if !seen.insert((site.chrom.as_str(), site.pos)) {
            continue;
        }
        let line = match sample.lookup(&site.chrom, site.pos)? {
            Some(call) => own_call_line(&site.chrom, site.pos, &call, depths),
            None => ref_call_line(site, depths),
        };
        writeln!(out, "{line}")?;
        emitted += 1;
    }
    Ok(emitted)
}

/// Backfill every file of a cohort directory, writing one compressed output
/// per input. Files are disjoint units of work, so they fan out across the
/// rayon pool; the catalog, depth aggregate, and copied metadata are shared
/// read-only.
pub fn backfill_directory(
    catalog: &[CatalogSite],
    files: &[PathBuf],
    depths: &DepthIndex,
    metadata: &[String],
    provenance: &str,
    output_dir: &Path,
) -> RepopResult<()> {
    files
        .par_iter()
        .map(|path| {
            let mut sample = SampleVcf::open(path)?;
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let out_path = output_dir.join(backfilled_name(&name));

            let file = File::create(&out_path)?;
            let mut writer =
                GzEncoder::new(BufWriter::new(file), Compression::default());
            let emitted = backfill_file(
                catalog,
                &mut sample,
                depths,
                metadata,
                provenance,
                &mut writer,
            )?;
            writer.try_finish()?;

            log::info!(
                "{}: {} records written to {}",
                sample.sample_id,
                emitted,
                out_path.display()
            );
            Ok(())
        })
        .collect::<RepopResult<Vec<()>>>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(chrom: &str, pos: u32, ref_allele: &str, alt: &str) -> CatalogSite {
        CatalogSite::new(
            chrom.to_string(),
            pos,
            ref_allele.to_string(),
            alt.to_string(),
        )
    }

    #[test]
    fn test_backfilled_name() {
        assert_eq!(
            backfilled_name("patient42.vcf.gz"),
            "patient42.backfilled.vcf.gz"
        );
    }

    #[test]
    fn test_format_qual() {
        assert_eq!(format_qual(None), ".");
        assert_eq!(format_qual(Some(30.0)), "30");
        assert_eq!(format_qual(Some(12.34)), "12.34");
        assert_eq!(format_qual(Some(2.5)), "2.5");
        assert_eq!(format_qual(Some(0.0)), "0");
    }

    #[test]
    fn test_ref_call_line_without_depth_evidence() {
        let depths = DepthIndex::new();
        let line = ref_call_line(&site("chr1", 100, "A", "T,G"), &depths);
        assert_eq!(
            line,
            "chr1\t100\t.\tA\tT,G\t.\tREF_CALL\t.\tGT:AD:DP\t0/0:-1,-1:-1"
        );
    }

    #[test]
    fn test_ref_call_line_with_estimated_depth() {
        let mut depths = DepthIndex::new();
        depths.record("chr1", 100, 30);
        depths.record("chr1", 100, 30);

        let line = ref_call_line(&site("chr1", 100, "A", "T,G"), &depths);
        assert_eq!(
            line,
            "chr1\t100\t.\tA\tT,G\t.\tREF_CALL\t.\tGT:AD:DP\t0/0:-1,-1:30"
        );
    }

    #[test]
    fn test_ref_call_line_never_carries_variant_alleles() {
        let depths = DepthIndex::new();
        let line = ref_call_line(&site("chr7", 5, "C", "G"), &depths);
        let sample_column = line.rsplit('\t').next().unwrap();
        assert!(sample_column.starts_with("0/0:"));
    }

    #[test]
    fn test_own_call_line_full_evidence() {
        let depths = DepthIndex::new();
        let call = DecodedCall {
            ref_allele: "A".to_string(),
            alts: vec!["T".to_string()],
            qual: Some(48.0),
            filter: "PASS".to_string(),
            genotype: GenotypeClass::Het,
            allelic_depths: Some(vec![12, 18]),
            total_depth: Some(30),
        };

        let line = own_call_line("chr1", 100, &call, &depths);
        assert_eq!(line, "chr1\t100\t.\tA\tT\t48\tPASS\t.\tGT:AD:DP\t0/1:12,18:30");
    }

    #[test]
    fn test_own_call_line_missing_depths_fall_back_to_sentinels() {
        let depths = DepthIndex::new();
        let call = DecodedCall {
            ref_allele: "G".to_string(),
            alts: vec!["C".to_string(), "A".to_string()],
            qual: None,
            filter: "LowQual".to_string(),
            genotype: GenotypeClass::HomVar,
            allelic_depths: None,
            total_depth: None,
        };

        let line = own_call_line("chr2", 200, &call, &depths);
        assert_eq!(
            line,
            "chr2\t200\t.\tG\tC,A\t.\tLowQual\t.\tGT:AD:DP\t1/1:-1,-1:-1"
        );
    }

    #[test]
    fn test_own_call_line_estimates_missing_total_depth() {
        let mut depths = DepthIndex::new();
        depths.record("chr2", 200, 20);
        depths.record("chr2", 200, 25);

        let call = DecodedCall {
            ref_allele: "G".to_string(),
            alts: vec!["C".to_string()],
            qual: Some(10.5),
            filter: "PASS".to_string(),
            genotype: GenotypeClass::Het,
            allelic_depths: Some(vec![10, 12]),
            total_depth: None,
        };

        let line = own_call_line("chr2", 200, &call, &depths);
        assert!(line.ends_with("0/1:10,12:22"));
    }

    #[test]
    fn test_write_header_block() {
        let metadata = vec![
            "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">".to_string(),
            "##contig=<ID=chr1,length=248956422>".to_string(),
        ];
        let mut out = Vec::new();
        write_header(
            &mut out,
            &metadata,
            "repop -s 2 -r sites.step1 -i cohort -o out",
            "patient42",
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "##fileformat=VCFv4.2");
        assert_eq!(lines[1], metadata[0]);
        assert_eq!(lines[2], metadata[1]);
        assert_eq!(lines[3], "##repopCmd=repop -s 2 -r sites.step1 -i cohort -o out");
        assert_eq!(
            lines[4],
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tpatient42"
        );
    }
}
