//! Run photometric completeness and PSF ellipticity QA over a data set
//!
//! Usage:
//! ```
//! cargo run --bin pipe-qa -- --data visit_data.json --output-dir qa
//! ```
//!
//! Each analysis writes its figures and a `summary.json` into
//! `<output-dir>/<analysis>.<visit>/`.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use pipe_qa::analysis::{AnalysisRun, QaAnalysis};
use pipe_qa::json_data::JsonDataSource;
use pipe_qa::{CompletenessQa, DataId, FluxType, PsfEllipticityQa, QaConfig, QaData, TestSet};
use shared::SensorKey;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Analysis {
    Completeness,
    PsfEllipticity,
    All,
}

/// Pipeline QA for focal-plane mosaic cameras
#[derive(Parser, Debug)]
#[command(name = "pipe-qa")]
#[command(about = "Photometric completeness and PSF ellipticity QA")]
#[command(version)]
struct Args {
    /// JSON data set with camera layout and per-visit catalogs
    #[arg(long)]
    data: PathBuf,

    /// Visit to analyse (all visits when omitted)
    #[arg(long)]
    visit: Option<String>,

    /// Restrict to one raft (requires --ccd)
    #[arg(long, requires = "ccd")]
    raft: Option<String>,

    /// Restrict to one CCD (requires --raft)
    #[arg(long, requires = "raft")]
    ccd: Option<String>,

    /// Directory that receives test sets and figures
    #[arg(long, default_value = "qa_output")]
    output_dir: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analyses to run
    #[arg(long, value_enum, default_value_t = Analysis::All)]
    analysis: Analysis,

    /// Flux measurement for completeness (overrides the config)
    #[arg(long, value_enum)]
    flux_type: Option<FluxType>,

    /// Refine completeness depths with an arctan model fit
    #[arg(long, conflicts_with = "no_fit")]
    fit: bool,

    /// Use interpolated completeness depths only
    #[arg(long)]
    no_fit: bool,

    /// Compute tests only, skip figures
    #[arg(long, default_value_t = false)]
    no_plots: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<QaConfig> {
    let mut config = match &args.config {
        Some(path) => QaConfig::load_from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => QaConfig::default(),
    };
    if let Some(flux_type) = args.flux_type {
        config.completeness.flux_type = flux_type;
    }
    if args.fit {
        config.completeness.use_fitter = true;
    }
    if args.no_fit {
        config.completeness.use_fitter = false;
    }
    Ok(config)
}

fn run_analysis<A: QaAnalysis>(
    analysis: &A,
    data: &dyn QaData,
    id: &DataId,
    output_dir: &Path,
    plots: bool,
) -> Result<TestSet> {
    let run = analysis
        .test(data, id, output_dir)
        .with_context(|| format!("{} test for {id}", analysis.name()))?;
    let test_set = if plots {
        analysis
            .plot(data, run)
            .with_context(|| format!("{} plots for {id}", analysis.name()))?
    } else {
        run.into_test_set()
    };
    test_set.write_summary()?;
    Ok(test_set)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(&args)?;
    if let Some(path) = &args.dump_config {
        config.save_to_file(path)?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let data = JsonDataSource::load_from_file(&args.data)
        .with_context(|| format!("loading data set {}", args.data.display()))?;

    let visits: Vec<String> = match &args.visit {
        Some(v) => vec![v.clone()],
        None => data.visits().map(str::to_string).collect(),
    };
    if visits.is_empty() {
        bail!("data set '{}' contains no visits", data.data_name());
    }

    let completeness = CompletenessQa::from_config(&config)?;
    let ellipticity = PsfEllipticityQa::from_config(&config);
    let plots = !args.no_plots;

    let mut failed = 0;
    for visit in &visits {
        let mut id = DataId::visit(visit.clone());
        if let (Some(raft), Some(ccd)) = (&args.raft, &args.ccd) {
            id = id.with_sensor(SensorKey::new(raft.clone(), ccd.clone()));
        }
        info!("Running QA for {id}");

        let mut sets = Vec::new();
        if matches!(args.analysis, Analysis::Completeness | Analysis::All) {
            sets.push(run_analysis(&completeness, &data, &id, &args.output_dir, plots)?);
        }
        if matches!(args.analysis, Analysis::PsfEllipticity | Analysis::All) {
            sets.push(run_analysis(&ellipticity, &data, &id, &args.output_dir, plots)?);
        }
        failed += sets.iter().map(|s| s.counts().fail).sum::<usize>();
    }

    if failed > 0 {
        warn!("{failed} test(s) outside their limits");
    } else {
        info!("All defined tests passed");
    }
    Ok(())
}
