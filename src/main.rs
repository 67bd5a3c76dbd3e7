//! vetune - VE table correction from ECU lambda logs
//!
//! Reads a base VE table and a JSON file of sample sources, bins the
//! mixture error into the table, optionally fills unmeasured cells and
//! writes the corrected table.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use vetune::analysis::airflow::AirflowModel;
use vetune::analysis::pipeline::{
    CorrectionOptions, CorrectionPipeline, CorrectionSummary, ExtrapolationMode, Extrapolator,
};
use vetune::engine::{EngineProfile, EngineProfileStore};
use vetune::settings::TuningSettings;
use vetune::table::format::{load_table, save_table, unique_table_path};
use vetune::table::VeTable;
use vetune::telemetry::{ChannelMapping, SampleSource};
use vetune::units::FuelType;

#[derive(Parser, Debug)]
#[command(version, about = "Correct a VE table from logged lambda error")]
struct Args {
    /// Base VE table (label row of RPM breakpoints, one row per load)
    #[arg(long)]
    table: PathBuf,

    /// JSON array of sample sources (logs with named channels)
    #[arg(long)]
    samples: PathBuf,

    /// Output file; defaults to <table name>_fuel_ve_map.csv next to the input
    #[arg(long)]
    output: Option<PathBuf>,

    /// Minimum samples per cell (defaults to the saved tuning settings)
    #[arg(long)]
    min_samples: Option<usize>,

    /// Fuel used to convert AFR readings (gasoline, e85, methanol)
    #[arg(long)]
    fuel: Option<FuelType>,

    /// Fill cells below the sample threshold (shape, ratio, idw)
    #[arg(long)]
    fill: Option<ExtrapolationMode>,

    /// Engine profile name from the profile store (for shape fills)
    #[arg(long)]
    engine: Option<String>,

    /// Record hit counts and errors without changing VE
    #[arg(long)]
    bins_only: bool,

    #[arg(long)]
    rpm_channel: Option<String>,

    #[arg(long)]
    load_channel: Option<String>,

    #[arg(long)]
    target_channel: Option<String>,

    #[arg(long)]
    measured_channel: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn channel_mapping(&self, saved: &ChannelMapping) -> ChannelMapping {
        let pick = |arg: &Option<String>, saved: &String| {
            arg.clone().unwrap_or_else(|| saved.clone())
        };
        ChannelMapping {
            rpm: pick(&self.rpm_channel, &saved.rpm),
            load: pick(&self.load_channel, &saved.load),
            target: pick(&self.target_channel, &saved.target),
            measured: pick(&self.measured_channel, &saved.measured),
        }
    }
}

fn engine_profile(name: Option<&str>) -> Result<EngineProfile> {
    let Some(name) = name else {
        return Ok(EngineProfile::default());
    };
    let store = EngineProfileStore::open_default()?;
    match store.get(name) {
        Some(profile) => Ok(profile),
        None => bail!(
            "engine profile '{}' not found (known: {})",
            name,
            store.names().join(", ")
        ),
    }
}

fn print_summary(summary: &CorrectionSummary, filled: Option<usize>) {
    println!("Samples:   {}", summary.total_samples);
    println!(
        "Cells:     {}/{} ({:.0}%)",
        summary.cells_with_data,
        summary.total_cells,
        summary.coverage * 100.0
    );
    match summary.max_abs_error {
        Some(e) => println!("Max err:   {:.1}%", e),
        None => println!("Max err:   -"),
    }
    match summary.mean_correction {
        Some(c) => println!("Avg corr:  {:.3}", c),
        None => println!("Avg corr:  -"),
    }
    if let Some(filled) = filled {
        println!("Filled:    {} cells", filled);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let settings = TuningSettings::load();

    let table = load_table(&args.table)?;
    let sources: Vec<SampleSource> = serde_json::from_str(
        &fs::read_to_string(&args.samples)
            .with_context(|| format!("reading {}", args.samples.display()))?,
    )
    .with_context(|| format!("parsing {}", args.samples.display()))?;

    let mut options = settings.correction_options();
    if let Some(min_samples) = args.min_samples {
        options = CorrectionOptions {
            min_samples: min_samples.max(1),
            ..options
        };
    }
    if args.bins_only {
        options = options.bins_only();
    }

    let fuel = args.fuel.unwrap_or(settings.fuel);
    let mapping = args.channel_mapping(&settings.channels);
    let pipeline = CorrectionPipeline::new(&table, fuel);
    let mut run = pipeline.calculate_sources(&sources, &mapping, options)?;

    let filled = match args.fill {
        Some(mode) => {
            let engine = args.engine.as_deref().or(settings.engine_profile.as_deref());
            let mut model = AirflowModel::new(engine_profile(engine)?);
            match mode {
                ExtrapolationMode::ShapeModel => {
                    pipeline.fit_shape(&mut model, &run.grids, options.min_samples);
                }
                ExtrapolationMode::CorrectionRatio => {
                    pipeline.fit_ratios(&mut model, &run.grids, options.min_samples);
                }
                ExtrapolationMode::Scattered => {}
            }
            println!("Fit:       {}", model.fit_quality_description());

            let scattered = pipeline.scattered_interpolator(&run.grids, options.min_samples);
            let extrapolator = Extrapolator::select(mode, &model, &scattered);
            Some(pipeline.fill_empty_cells(&mut run.grids, options.min_samples, &extrapolator)?)
        }
        None => None,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run.summary)?);
    } else {
        print_summary(&run.summary, filled);
    }

    let corrected = VeTable::new(
        table.rpm_axis().clone(),
        table.load_axis().clone(),
        table.load_type(),
        run.grids.corrected.clone(),
    )?;

    let output = match args.output {
        Some(path) => path,
        None => {
            let dir = args
                .table
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = args
                .table
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("corrected");
            unique_table_path(&dir, name)
        }
    };
    save_table(&output, &corrected)?;
    println!("Saved:     {}", output.display());

    Ok(())
}
