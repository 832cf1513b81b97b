//! CLI for repop - builds the cohort site catalog (step 1) and backfills
//! reference calls (step 2)

use clap::Parser;
use env_logger::Env;
use repop_rs::{
    backfill, catalog, genotype,
    utils::{discover_inputs, validate_file_exists, Timer},
    vcf::{self, SampleVcf},
    RepopError, RepopResult,
};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "repop")]
#[command(about = "repop - cohort-wide reference-call backfill for single-sample VCFs")]
#[command(long_about = "
repop makes a cohort of single-sample VCF files jointly analyzable by giving
every sample an explicit genotype record at every site that is variant in at
least one sample of the cohort.

Step 1 scans a directory of indexed .vcf.gz files and writes a sorted site
catalog (<directory-basename>.allObsVariants.step1) to the working
directory, collapsing the alternate alleles observed for each locus across
the cohort into one deduplicated set.

Step 2 replays that catalog, in chromosome/position order, against a single
file (output to stdout) or against every file of a directory (one
compressed .backfilled.vcf.gz per input, written to --output-dir). Sites
the sample called itself are reformatted to a fixed GT:AD:DP layout; sites
it never saw become synthesized homozygous-reference records flagged
REF_CALL, with read depth estimated from the cohort where evidence exists.

Every input file must be accompanied by a tabix index (.vcf.gz.tbi).
")]
struct Args {
    /// Processing step: 1 builds the site catalog, 2 backfills reference calls
    #[arg(short, long)]
    step: Option<u8>,

    /// Input path: a directory of .vcf.gz files, or a single file (step 2)
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Site catalog written by step 1 (required for step 2)
    #[arg(short = 'r', long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Directory for backfilled outputs (step 2 directory mode)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn run() -> RepopResult<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    validate_file_exists(&args.input)?;

    match args.step {
        Some(1) => run_step1(&args),
        Some(2) => run_step2(&args),
        Some(other) => Err(RepopError::Usage(format!(
            "unknown step: {other} (expected 1 or 2)"
        ))),
        None => Err(RepopError::Usage(
            "no processing step given (--step 1|2)".to_string(),
        )),
    }
}

fn run_step1(args: &Args) -> RepopResult<()> {
    let _timer = Timer::new("step 1: site catalog");

    if !args.input.is_dir() {
        return Err(RepopError::Usage(format!(
            "step 1 input must be a directory of {} files: {}",
            vcf::VCF_SUFFIX,
            args.input.display()
        )));
    }

    let files = discover_inputs(&args.input)?;
    log::info!(
        "source folder: {} ({} files)",
        args.input.display(),
        files.len()
    );
    if files.is_empty() {
        log::warn!("no {} files found in {}", vcf::VCF_SUFFIX, args.input.display());
    }
    for path in &files {
        vcf::index_path(path)?;
    }

    let acc = catalog::build_catalog(&files)?;
    let sites = acc.into_sites();
    let out_name = catalog::catalog_file_name(&args.input);
    catalog::write_catalog(&sites, Path::new(&out_name))?;
    log::info!("{} sites written to {}", sites.len(), out_name);
    Ok(())
}

fn run_step2(args: &Args) -> RepopResult<()> {
    let _timer = Timer::new("step 2: reference backfill");

    let catalog_path = args.catalog.as_ref().ok_or(RepopError::MissingCatalogArg)?;
    let sites = catalog::load_catalog(catalog_path)?;
    log::info!(
        "{} catalog sites loaded from {}",
        sites.len(),
        catalog_path.display()
    );

    let provenance = provenance_line(args);

    if args.input.is_dir() {
        let output_dir = match &args.output_dir {
            Some(dir) => dir,
            None => {
                return Err(RepopError::DirectoryInput(
                    args.input.display().to_string(),
                ))
            }
        };
        if !output_dir.exists() {
            return Err(RepopError::MissingOutputDir(
                output_dir.display().to_string(),
            ));
        }
        if !output_dir.is_dir() {
            return Err(RepopError::OutputNotADirectory(
                output_dir.display().to_string(),
            ));
        }

        let files = discover_inputs(&args.input)?;
        for path in &files {
            vcf::index_path(path)?;
        }

        let metadata = match files.first() {
            Some(first) => vcf::extract_metadata_lines(first)?,
            None => Vec::new(),
        };
        let depths = genotype::build_depth_index(&files)?;
        backfill::backfill_directory(
            &sites,
            &files,
            &depths,
            &metadata,
            &provenance,
            output_dir,
        )?;
    } else {
        vcf::index_path(&args.input)?;
        let metadata = vcf::extract_metadata_lines(&args.input)?;
        let depths = genotype::build_depth_index(std::slice::from_ref(&args.input))?;
        let mut sample = SampleVcf::open(&args.input)?;

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let emitted = backfill::backfill_file(
            &sites,
            &mut sample,
            &depths,
            &metadata,
            &provenance,
            &mut out,
        )?;
        out.flush()?;
        log::info!("{}: {} records written to stdout", sample.sample_id, emitted);
    }
    Ok(())
}

/// Reconstructed invocation, recorded in each output's header block.
fn provenance_line(args: &Args) -> String {
    let mut parts = vec!["repop".to_string(), "-s".to_string(), "2".to_string()];
    if let Some(catalog) = &args.catalog {
        parts.push("-r".to_string());
        parts.push(catalog.display().to_string());
    }
    parts.push("-i".to_string());
    parts.push(args.input.display().to_string());
    if let Some(dir) = &args.output_dir {
        parts.push("-o".to_string());
        parts.push(dir.display().to_string());
    }
    parts.join(" ")
}

/// Translate a failure into a user-facing message and its exit code.
fn handle_error(error: RepopError) -> ! {
    match &error {
        RepopError::Usage(msg) => {
            eprintln!("Error: {msg}");
            eprintln!("Run with --help for the full set of options.");
        }
        RepopError::MissingIndex(path) => {
            eprintln!("Error: companion index not found: {path}");
            eprintln!("Each input needs a tabix index next to it (bgzip + tabix -p vcf).");
        }
        RepopError::MultipleGenotypes(path) => {
            eprintln!("Error: {path} carries more than one sample column.");
            eprintln!("Inputs must be single-sample VCF files.");
        }
        RepopError::MissingCatalogArg => {
            eprintln!("Error: step 2 requires the site catalog from step 1 (--catalog).");
        }
        RepopError::CatalogNotFound(path) => {
            eprintln!("Error: catalog file not found: {path}");
        }
        RepopError::MissingOutputDir(path) => {
            eprintln!("Error: output directory not found: {path}");
        }
        RepopError::OutputNotADirectory(path) => {
            eprintln!("Error: output path is not a directory: {path}");
        }
        RepopError::DirectoryInput(path) => {
            eprintln!("Error: {path} is a directory; without --output-dir step 2 expects a single file.");
        }
        RepopError::InvalidCatalog(msg) => {
            eprintln!("Error: invalid catalog: {msg}");
            eprintln!("Expected the tab-separated chrom/pos/ref/alt table written by step 1.");
        }
        RepopError::Io(e) => {
            eprintln!("Error: I/O error: {e}");
        }
        RepopError::Htslib(e) => {
            eprintln!("Error: VCF processing error: {e}");
            eprintln!("Check that the inputs are valid bgzip-compressed, indexed VCF files.");
        }
        RepopError::Csv(e) => {
            eprintln!("Error: table processing error: {e}");
        }
    }
    std::process::exit(error.exit_code());
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
