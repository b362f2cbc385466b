//! `scmtiff` — the command-line driver over the library's store, sampler,
//! and post-processing passes. One sub-command per operation; flags follow
//! the single-letter conventions of the lineage this tool continues: `-n`
//! page side, `-d` depth, `-b` channel-depth override, `-g` signed samples,
//! `-o` output path.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::{Parser, Subcommand};

use scmtiff::algebra::{self, PageIndex};
use scmtiff::codec::SampleKind;
use scmtiff::error::Result;
use scmtiff::passes::{border, combine, mipmap, normal, prune, rectify, sample};
use scmtiff::progress::{Context, Progress};
use scmtiff::sampler::projection::convert;
use scmtiff::sampler::{Checkerboard, SolidColor};
use scmtiff::store::{Params, Store};
use scmtiff::vector::Vector3;

#[derive(Parser)]
#[command(name = "scmtiff", about = "Sparse cube-mapped-sphere page store toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log per-command timing at the end of the run.
    #[arg(short = 'T', long, global = true)]
    timing: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Render a synthetic source into a fresh cube-mapped-sphere store.
    Convert {
        /// `solid:v0,v1,...` or `checkerboard:bands` — there is no decoder
        /// for a real image format wired in; see DESIGN.md.
        source: String,
        out: PathBuf,
        /// Page interior side length.
        #[arg(short = 'n', default_value_t = 64)]
        side: usize,
        /// Fixed subdivision depth — pages are only ever rendered at this
        /// depth; a later `mipmap` pass builds the rest of the pyramid.
        #[arg(short = 'd', default_value_t = 6)]
        depth: i32,
        /// Sample storage bit depth.
        #[arg(short = 'b', default_value_t = 8)]
        bits: u8,
        /// Store samples as signed.
        #[arg(short = 'g')]
        signed: bool,
        /// Latitude blend center/range — accepted, not yet applied (see DESIGN.md).
        #[arg(short = 'E')]
        lat_blend: Option<f64>,
        /// Longitude blend center/range — accepted, not yet applied.
        #[arg(short = 'L')]
        lon_blend: Option<f64>,
        /// Blend falloff range — accepted, not yet applied.
        #[arg(short = 'P')]
        blend_range: Option<f64>,
        /// Normalization factor — accepted, not yet applied.
        #[arg(short = 'N')]
        normalize: Option<f64>,
    },

    /// Flatten a store back into an equirectangular raster.
    Rectify {
        store: PathBuf,
        out: PathBuf,
        #[arg(short = 'n', default_value_t = 512)]
        width: usize,
        #[arg(short = 'd', default_value_t = 256)]
        height: usize,
        #[arg(long)]
        max_depth: Option<i32>,
        /// Source radius range, `near,far` — accepted, not yet applied.
        #[arg(short = 'R')]
        radius_range: Option<String>,
    },

    /// Merge two stores of identical parameters into one.
    Combine {
        a: PathBuf,
        b: PathBuf,
        #[arg(short = 'o')]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = CombineModeArg::Average)]
        mode: CombineModeArg,
    },

    /// Downsample every non-leaf page from its children.
    Mipmap {
        input: PathBuf,
        #[arg(short = 'o')]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = ReduceModeArg::Average)]
        mode: ReduceModeArg,
    },

    /// Stitch the one-pixel halo of every page from its neighbors.
    Border {
        input: PathBuf,
        #[arg(short = 'o')]
        out: PathBuf,
    },

    /// Write the page-index/offset catalog and min/max extrema into a store.
    Finish {
        store: PathBuf,
        #[arg(short = 'd', default_value_t = 0)]
        depth: i32,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Point a LibTIFF-compatible head directory at the first page's strips.
    Polish { store: PathBuf },

    /// Drop constant subtrees that add no detail beyond their parent.
    Prune {
        input: PathBuf,
        #[arg(short = 'o')]
        out: PathBuf,
        #[arg(long, default_value_t = 1.0 / 255.0)]
        tolerance: f32,
    },

    /// Derive a surface-normal map from a single-channel elevation store.
    Normal {
        input: PathBuf,
        #[arg(short = 'o')]
        out: PathBuf,
    },

    /// Point-query a store at a given latitude/longitude.
    Sample {
        store: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(short = 'd')]
        depth: Option<i32>,
    },

    /// Report the min/max extrema `finish` would compute, without writing them.
    Extrema {
        store: PathBuf,
        #[arg(short = 'd', default_value_t = 0)]
        depth: i32,
    },

    /// List the page indices and directory offsets in a store's catalog.
    Catalog { store: PathBuf },

    /// Relink a store's directory chain into ascending page-index order.
    Relink { store: PathBuf },

    /// Report the page algebra (level, face, row, col, parent, children) for an index.
    Query { index: PageIndex },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ReduceModeArg {
    Sum,
    Max,
    Average,
    MaxPixel,
}

impl From<ReduceModeArg> for scmtiff::passes::ReduceMode {
    fn from(value: ReduceModeArg) -> Self {
        match value {
            ReduceModeArg::Sum => Self::Sum,
            ReduceModeArg::Max => Self::Max,
            ReduceModeArg::Average => Self::Average,
            ReduceModeArg::MaxPixel => Self::MaxPixel,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CombineModeArg {
    Sum,
    Max,
    Average,
    Alpha,
}

impl From<CombineModeArg> for combine::CombineMode {
    fn from(value: CombineModeArg) -> Self {
        match value {
            CombineModeArg::Sum => Self::Sum,
            CombineModeArg::Max => Self::Max,
            CombineModeArg::Average => Self::Average,
            CombineModeArg::Alpha => Self::Alpha,
        }
    }
}

/// A `Progress` that logs start/finish at info level and progress every
/// 64 steps at debug level, for use by the CLI only; library callers get
/// `NullProgress` or write their own.
#[derive(Debug, Default)]
struct LoggingProgress {
    done: AtomicU64,
    total: AtomicU64,
}

impl Progress for LoggingProgress {
    fn start(&self, label: &str, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        log::info!("{label}: {total} pages");
    }

    fn step(&self, count: u64) {
        let done = self.done.fetch_add(count, Ordering::Relaxed) + count;
        if done % 64 == 0 {
            log::debug!("{done}/{} pages", self.total.load(Ordering::Relaxed));
        }
    }

    fn finish(&self) {
        log::info!("done ({} pages)", self.done.load(Ordering::Relaxed));
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let start = std::time::Instant::now();

    let result = run(cli.command);
    if cli.timing {
        log::info!("elapsed: {:?}", start.elapsed());
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    let progress = LoggingProgress::default();
    let ctx = Context::new(&progress, 0);

    match command {
        Command::Convert { source, out, side, depth, bits, signed, .. } => {
            let params = Params { side, channels: source_channels(&source)?, kind: SampleKind { bits, signed } };
            let mut store = Store::create(&out, params)?;
            match parse_source(&source)? {
                Parsed::Solid(values) => convert(&SolidColor::new(values), &mut store, depth, &ctx)?,
                Parsed::Checker(bands) => convert(&Checkerboard { bands }, &mut store, depth, &ctx)?,
            }
            store.finish("", depth)?;
            Ok(())
        }

        Command::Rectify { store, out, width, height, max_depth, .. } => {
            let mut store = Store::open(store)?;
            rectify::rectify(&mut store, out, width, height, max_depth, &ctx)
        }

        Command::Combine { a, b, out, mode } => {
            let mut store_a = Store::open(a)?;
            let mut store_b = Store::open(b)?;
            let mut output = Store::create(out, store_a.params())?;
            combine::combine(&mut store_a, &mut store_b, &mut output, mode.into(), &ctx)
        }

        Command::Mipmap { input, out, mode } => {
            let mut input = Store::open(input)?;
            let mut output = Store::create(out, input.params())?;
            mipmap::mipmap(&mut input, &mut output, mode.into(), &ctx)
        }

        Command::Border { input, out } => {
            let mut input = Store::open(input)?;
            let mut output = Store::create(out, input.params())?;
            border::border(&mut input, &mut output, &ctx)
        }

        Command::Finish { store, depth, description } => {
            let mut store = Store::open(store)?;
            store.finish(&description, depth)
        }

        Command::Polish { store } => {
            let mut store = Store::open(store)?;
            store.polish()
        }

        Command::Prune { input, out, tolerance } => {
            let mut input = Store::open(input)?;
            let mut output = Store::create(out, input.params())?;
            prune::prune(&mut input, &mut output, tolerance, &ctx)
        }

        Command::Normal { input, out } => {
            let mut input = Store::open(input)?;
            let normal_params = Params { channels: 3, ..input.params() };
            let mut output = Store::create(out, normal_params)?;
            normal::normal(&mut input, &mut output, &ctx)
        }

        Command::Sample { store, lat, lon, depth } => {
            let mut store = Store::open(store)?;
            store.scan_catalog()?;
            let direction = Vector3::new(lat.cos() * lon.cos(), lat.sin(), lat.cos() * lon.sin());
            let value = sample::sample(&mut store, direction, depth)?;
            println!("{value:?}");
            Ok(())
        }

        Command::Extrema { store, depth } => {
            let mut store = Store::open(store)?;
            if let Some((yv, min_values, max_values)) = store.compute_extrema(depth)? {
                let channels = store.params().channels;
                for (i, &x) in yv.iter().enumerate() {
                    let min = &min_values[i * channels..(i + 1) * channels];
                    let max = &max_values[i * channels..(i + 1) * channels];
                    println!("{x}: min={min:?} max={max:?}");
                }
            }
            Ok(())
        }

        Command::Catalog { store } => {
            let mut store = Store::open(store)?;
            store.scan_catalog()?;
            for i in 0..store.catalog.len() {
                println!("{}\t{}", store.catalog.index(i), store.catalog.offset(i));
            }
            Ok(())
        }

        Command::Relink { store } => {
            let mut store = Store::open(store)?;
            store.relink()
        }

        Command::Query { index } => {
            let face = algebra::root(index);
            let level = algebra::level(index);
            println!("face={} level={level} row={} col={}", face.0, algebra::row(index), algebra::col(index));
            if level > 0 {
                println!("parent={}", algebra::parent(index));
            }
            println!(
                "children={},{},{},{}",
                algebra::child(index, 0),
                algebra::child(index, 1),
                algebra::child(index, 2),
                algebra::child(index, 3)
            );
            Ok(())
        }
    }
}

enum Parsed {
    Solid(Vec<f32>),
    Checker(i32),
}

fn source_channels(source: &str) -> Result<usize> {
    Ok(match parse_source(source)? {
        Parsed::Solid(values) => values.len(),
        Parsed::Checker(_) => 1,
    })
}

fn parse_source(source: &str) -> Result<Parsed> {
    if let Some(values) = source.strip_prefix("solid:") {
        let channels = values.split(',').map(|v| v.parse::<f32>().unwrap_or(0.0)).collect();
        Ok(Parsed::Solid(channels))
    } else if let Some(bands) = source.strip_prefix("checkerboard:") {
        Ok(Parsed::Checker(bands.parse().unwrap_or(8)))
    } else {
        Err(scmtiff::error::Error::not_our_format(source))
    }
}
