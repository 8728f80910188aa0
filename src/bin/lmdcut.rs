//! lmdcut - laser microdissection shape preparation.
//!
//! Usage:
//! ```text
//! lmdcut expand  -i cells.geojson -o expanded.geojson --radius 3 --pixel-size 0.25
//! lmdcut export  -i expanded.geojson -o slide.xml --collector collector.json
//! lmdcut mirror  -i cells.geojson -o mirrored.geojson --width 2048 --height 2048 --horizontal
//! lmdcut convert -i cells.geojson -o cells.geojson --to detection
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use lmdcut::config::{
    CollectorConfig, DifferentClassPolicy, ExpansionOptions, ExportOptions, SameClassPolicy,
};
use lmdcut::export::{ExportLmd, ExportScope, FeatureCollection};
use lmdcut::geometry::ShapeKind;
use lmdcut::operations::{ConvertShapes, ExpandShapes, MirrorShapes};
use lmdcut::store::{ShapeHierarchy, ShapeStore};
use lmdcut::Result;

#[derive(Parser)]
#[command(name = "lmdcut")]
#[command(about = "Prepare cell shapes for laser microdissection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand every detection and resolve the resulting overlaps
    Expand {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// JSON file with expansion options; flags below override it
        #[arg(long)]
        options: Option<PathBuf>,
        /// Expansion radius in microns (pixels without --pixel-size)
        #[arg(short, long)]
        radius: Option<f64>,
        #[arg(long)]
        pixel_size: Option<f64>,
        /// Keep one random shape of an overlapping same-class pair instead of merging
        #[arg(long)]
        discard_one: bool,
        /// Class ranking for different-class overlaps, highest first
        #[arg(long, value_delimiter = ',', value_name = "CLASS")]
        priority: Vec<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write cutting instructions for every detection
    Export {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// JSON file with export options
        #[arg(long)]
        options: Option<PathBuf>,
        /// JSON collector table; overrides the one in --options
        #[arg(long)]
        collector: Option<PathBuf>,
        /// Keep file order instead of optimising the cutting path
        #[arg(long)]
        keep_order: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Mirror all shapes within the image bounds
    Mirror {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
        #[arg(long)]
        horizontal: bool,
        #[arg(long)]
        vertical: bool,
    },
    /// Convert all area shapes to annotations or detections
    Convert {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_enum)]
        to: Kind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Annotation,
    Detection,
}

impl From<Kind> for ShapeKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Annotation => ShapeKind::Annotation,
            Kind::Detection => ShapeKind::Detection,
        }
    }
}

fn main() -> ExitCode {
    // Default: WARN for everything, INFO for lmdcut.
    // Override with RUST_LOG env var (e.g. RUST_LOG=lmdcut=debug).
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        .add_directive("lmdcut=info".parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Expand {
            input,
            output,
            options,
            radius,
            pixel_size,
            discard_one,
            priority,
            seed,
        } => {
            let mut opts = match options {
                Some(path) => ExpansionOptions::load(&path)?,
                None => ExpansionOptions::default(),
            };
            if let Some(radius) = radius {
                opts.radius_microns = radius;
            }
            if pixel_size.is_some() {
                opts.pixel_size_microns = pixel_size;
            }
            if discard_one {
                opts.same_class = SameClassPolicy::DiscardOne;
            }
            if !priority.is_empty() {
                opts.different_class = DifferentClassPolicy::Priority(priority);
            }
            if seed.is_some() {
                opts.seed = seed;
            }

            let mut store = load(&input)?;
            store.select_all();
            let report = ExpandShapes::new(&opts).execute(&mut store)?;
            info!(
                merges = report.merges,
                eliminated = report.eliminated,
                "expanded {} shapes into {}",
                report.expanded,
                report.output.len()
            );
            save(&store, &output)
        }
        Commands::Export {
            input,
            output,
            options,
            collector,
            keep_order,
            seed,
        } => {
            let mut opts = match options {
                Some(path) => ExportOptions::load(&path)?,
                None => ExportOptions::default(),
            };
            if let Some(path) = collector {
                opts.collector = CollectorConfig::load(&path)?;
            }
            if keep_order {
                opts.optimize_order = false;
            }
            if seed.is_some() {
                opts.seed = seed;
            }

            let store = load(&input)?;
            let report = ExportLmd::new(&opts)
                .with_scope(ExportScope::All)
                .execute(&store, &output)?;
            if let Some(summary) = &report.summary_path {
                info!(summary = %summary.display(), "wrote export summary");
            }
            Ok(())
        }
        Commands::Mirror {
            input,
            output,
            width,
            height,
            horizontal,
            vertical,
        } => {
            let store = load(&input)?;
            let mirrored = MirrorShapes::new(horizontal, vertical, width, height).execute(&store);
            save(&mirrored, &output)
        }
        Commands::Convert { input, output, to } => {
            let mut store = load(&input)?;
            store.select_all();
            let converted = ConvertShapes::new(to.into()).execute(&mut store)?;
            info!(count = converted.len(), "converted shapes");
            save(&store, &output)
        }
    }
}

fn load(path: &Path) -> Result<ShapeStore> {
    let store = FeatureCollection::read(path)?.into_store()?;
    info!(shapes = store.len(), path = %path.display(), "loaded shapes");
    Ok(store)
}

fn save<H: ShapeHierarchy>(hierarchy: &H, path: &Path) -> Result<()> {
    FeatureCollection::from_hierarchy(hierarchy).write(path)
}
