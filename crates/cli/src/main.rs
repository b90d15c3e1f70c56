//! Fieldchip CLI - chip extraction and label rasterization

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use fieldchip_algorithms::chip::{extract_chip, ChipConfig};
use fieldchip_algorithms::label::{rasterize_label, LabelConfig};
use fieldchip_algorithms::resample::ResampleMethod;
use fieldchip_core::catalog::{filter_catalog, load_catalog, write_catalog, GroupPolicy};
use fieldchip_core::{CatalogRow, ColumnSpec, FieldCollection, CRS};
use fieldchip_parallel::{failures, run_batch, successes, ProcessingMode, RowOutcome};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fieldchip")]
#[command(author, version, about = "Training chips and labels from satellite imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract image chips for every catalog row
    Chips {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[command(flatten)]
        chips: ChipArgs,

        #[command(flatten)]
        workers: WorkerArgs,

        /// Overwrite chips that already exist
        #[arg(long)]
        overwrite: bool,

        /// Write the augmented catalog (with chip names) to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rasterize three-class labels for every catalog row
    Labels {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[command(flatten)]
        labels: LabelArgs,

        #[command(flatten)]
        workers: WorkerArgs,

        /// Overwrite labels that already exist
        #[arg(long)]
        overwrite: bool,

        /// Write the augmented catalog (with label names) to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run both passes: chips, then labels aligned to them
    Run {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[command(flatten)]
        chips: ChipArgs,

        #[command(flatten)]
        labels: LabelArgs,

        #[command(flatten)]
        workers: WorkerArgs,

        /// Overwrite chips and labels that already exist
        #[arg(long)]
        overwrite: bool,

        /// Write the fully augmented catalog to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Filter the master catalog by class and quality metric
    Filter {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Classes to keep in full (repeatable, comma-separated)
        #[arg(long, value_delimiter = ',')]
        whole: Vec<String>,

        /// Classes to keep best-per-site from (repeatable, comma-separated)
        #[arg(long, value_delimiter = ',')]
        best: Vec<String>,

        /// Quality metric column used by --best
        #[arg(long, default_value = "Rscore")]
        metric: String,

        /// Output file for the filtered catalog
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct CatalogArgs {
    /// Catalog file (JSON array of assignment records)
    #[arg(long)]
    catalog: PathBuf,

    /// Catalog column holding the acquisition date
    #[arg(long, default_value = "date")]
    date_col: String,

    /// Catalog column holding the source image name
    #[arg(long, default_value = "source_image")]
    src_col: String,
}

#[derive(Args)]
struct ChipArgs {
    /// Directory holding the source images
    #[arg(long)]
    src_dir: PathBuf,

    /// Directory to write chips to
    #[arg(long)]
    dst_dir: PathBuf,

    /// Half-width of the target box in CRS units
    #[arg(long, default_value = "0.0025")]
    w: f64,

    /// Output chip height in pixels
    #[arg(long, default_value = "256")]
    rows: usize,

    /// Output chip width in pixels
    #[arg(long, default_value = "256")]
    cols: usize,

    /// CRS of the output grid
    #[arg(long, default_value = "epsg:4326")]
    crs: String,

    /// Decimal places for bounding-box rounding
    #[arg(long, default_value = "4")]
    decimals: u32,

    /// Resampling kernel: nearest, bilinear, cubic
    #[arg(long, default_value = "cubic")]
    resample: String,
}

#[derive(Args)]
struct LabelArgs {
    /// Directory containing image chips
    #[arg(long)]
    chip_dir: Option<PathBuf>,

    /// Directory to write labels to
    #[arg(long)]
    label_dir: PathBuf,

    /// Field polygons (GeoJSON FeatureCollection with assignment_id)
    #[arg(long)]
    fields: PathBuf,
}

#[derive(Args)]
struct WorkerArgs {
    /// Number of worker threads (default: all cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Run rows sequentially (useful for debugging)
    #[arg(long)]
    sequential: bool,
}

impl WorkerArgs {
    fn mode(&self) -> ProcessingMode {
        if self.sequential {
            ProcessingMode::Sequential
        } else {
            match self.workers {
                Some(n) => ProcessingMode::ParallelWith(n),
                None => ProcessingMode::Parallel,
            }
        }
    }
}

// ─── Entry point ────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let start = Instant::now();
    match cli.command {
        Commands::Chips {
            catalog,
            chips,
            workers,
            overwrite,
            output,
        } => {
            let rows = read_rows(&catalog)?;
            let cfg = chip_config(&chips, overwrite)?;
            let outcomes = run_with_progress(&rows, workers.mode(), "chips", |row| {
                extract_chip(row, &cfg)
            });
            report(&outcomes);
            if let Some(path) = output {
                write_catalog(&successes(&outcomes), &path)?;
            }
        }
        Commands::Labels {
            catalog,
            labels,
            workers,
            overwrite,
            output,
        } => {
            let rows = read_rows(&catalog)?;
            let chip_dir = labels
                .chip_dir
                .clone()
                .context("--chip-dir is required for labels")?;
            let fields = FieldCollection::from_geojson_file(&labels.fields)
                .context("Failed to read field polygons")?;
            info!("Loaded {} field polygons", fields.len());

            let mut cfg = LabelConfig::new(chip_dir, labels.label_dir.clone());
            cfg.overwrite = overwrite;

            let outcomes = run_with_progress(&rows, workers.mode(), "labels", |row| {
                rasterize_label(row, &cfg, &fields)
            });
            report(&outcomes);
            if let Some(path) = output {
                write_catalog(&successes(&outcomes), &path)?;
            }
        }
        Commands::Run {
            catalog,
            chips,
            labels,
            workers,
            overwrite,
            output,
        } => {
            let rows = read_rows(&catalog)?;
            let chip_cfg = chip_config(&chips, overwrite)?;
            let fields = FieldCollection::from_geojson_file(&labels.fields)
                .context("Failed to read field polygons")?;
            info!("Loaded {} field polygons", fields.len());

            let chip_outcomes = run_with_progress(&rows, workers.mode(), "chips", |row| {
                extract_chip(row, &chip_cfg)
            });
            report(&chip_outcomes);

            // Labels align to the chips produced above; failed rows drop out
            let chipped = successes(&chip_outcomes);
            let chip_dir = labels.chip_dir.clone().unwrap_or(chips.dst_dir.clone());
            let mut label_cfg = LabelConfig::new(chip_dir, labels.label_dir.clone());
            label_cfg.overwrite = overwrite;

            let label_outcomes = run_with_progress(&chipped, workers.mode(), "labels", |row| {
                rasterize_label(row, &label_cfg, &fields)
            });
            report(&label_outcomes);
            if let Some(path) = output {
                write_catalog(&successes(&label_outcomes), &path)?;
            }
        }
        Commands::Filter {
            catalog,
            whole,
            best,
            metric,
            output,
        } => {
            let rows = read_rows(&catalog)?;
            let mut groups = Vec::new();
            if !whole.is_empty() {
                groups.push(GroupPolicy::Whole(whole));
            }
            if !best.is_empty() {
                groups.push(GroupPolicy::Best(best));
            }
            if groups.is_empty() {
                bail!("Provide at least one of --whole or --best");
            }

            let filtered = filter_catalog(&rows, &groups, &metric);
            info!("Filtered catalog: {} of {} rows kept", filtered.len(), rows.len());
            write_catalog(&filtered, &output)?;
        }
    }

    info!("Done in {:.1?}", start.elapsed());
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn read_rows(args: &CatalogArgs) -> Result<Vec<CatalogRow>> {
    let columns = ColumnSpec {
        date_col: args.date_col.clone(),
        src_col: args.src_col.clone(),
    };
    let rows = load_catalog(&args.catalog, &columns)
        .with_context(|| format!("Failed to read catalog {}", args.catalog.display()))?;
    info!("Loaded catalog with {} rows", rows.len());
    Ok(rows)
}

fn chip_config(args: &ChipArgs, overwrite: bool) -> Result<ChipConfig> {
    let mut cfg = ChipConfig::new(
        args.src_dir.clone(),
        args.dst_dir.clone(),
        args.rows,
        args.cols,
    );
    cfg.w = args.w;
    cfg.crs = CRS::parse(&args.crs)?;
    cfg.decimals = args.decimals;
    cfg.overwrite = overwrite;
    cfg.resample = args.resample.parse::<ResampleMethod>()?;
    Ok(cfg)
}

fn run_with_progress<F>(
    rows: &[CatalogRow],
    mode: ProcessingMode,
    stage: &str,
    row_fn: F,
) -> Vec<RowOutcome>
where
    F: Fn(&CatalogRow) -> fieldchip_core::Result<CatalogRow> + Sync + Send,
{
    let bar = ProgressBar::new(rows.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(stage.to_string());

    let outcomes = run_batch(rows, mode, |row| {
        let result = row_fn(row);
        bar.inc(1);
        result
    });
    bar.finish_and_clear();
    outcomes
}

fn report(outcomes: &[RowOutcome]) {
    let failed = failures(outcomes);
    for (name, message) in &failed {
        warn!("{name} failed: {message}");
    }
    info!(
        "{} rows succeeded, {} failed",
        outcomes.len() - failed.len(),
        failed.len()
    );
}
