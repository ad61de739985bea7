use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use lh_synth::{
    build_segments, overlapping_pairs, parse_gpx_segments, LegBounds, LegacyRandom, LhError,
    LocationHistory, Metric, MillisSuffix, Params, RunConfig, TimeWindow, TrackSegment,
    ZeroMillis,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "GPX to location-history converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert the GPX files listed in a run config into a location-history JSON file
    Convert(ConvertArgs),
    /// Report per-segment statistics for a run config as CSV
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct SynthesisArgs {
    /// Run config JSON listing GPX files and tracking windows
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Distance metric between waypoints
    #[arg(long, value_enum, default_value_t = MetricOpt::Geodesic)]
    metric: MetricOpt,

    /// Skip the final leg when measuring distance and emitting markers, like the legacy converter
    #[arg(long, action = ArgAction::SetTrue)]
    legacy_bounds: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    synthesis: SynthesisArgs,

    /// Output JSON path (`-` for stdout)
    #[arg(short, long, default_value = "LocationHistory.json", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Text appended to epoch seconds in `timestampMs`
    #[arg(long, value_enum, default_value_t = SuffixOpt::Zero)]
    suffix: SuffixOpt,

    /// Seed for `--suffix legacy-random`
    #[arg(long)]
    seed: Option<u64>,

    /// Log and drop segments that fail instead of aborting
    #[arg(long, action = ArgAction::SetTrue)]
    skip_invalid: bool,

    /// Pretty-print the JSON output
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[command(flatten)]
    synthesis: SynthesisArgs,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MetricOpt {
    Geodesic,
    Haversine,
}

impl From<MetricOpt> for Metric {
    fn from(value: MetricOpt) -> Self {
        match value {
            MetricOpt::Geodesic => Metric::Geodesic,
            MetricOpt::Haversine => Metric::Haversine,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SuffixOpt {
    /// `000`: real milliseconds
    Zero,
    /// Unpadded random 0..999, as the legacy converter wrote
    LegacyRandom,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Convert(args) => args.synthesis.verbose,
        Command::Inspect(args) => args.synthesis.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Convert(args) => handle_convert(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn params_from(args: &SynthesisArgs) -> Params {
    let mut params = Params::default();
    params.metric = args.metric.into();
    params.leg_bounds = if args.legacy_bounds {
        LegBounds::Legacy
    } else {
        LegBounds::Full
    };
    params
}

/// Segment outcomes of one config entry.
struct LoadedFile {
    source: PathBuf,
    window: TimeWindow,
    input_points: Vec<usize>,
    results: Vec<Result<TrackSegment, LhError>>,
}

fn load_inputs(config: &RunConfig, params: &Params) -> Result<Vec<LoadedFile>> {
    let mut loaded: Vec<(usize, LoadedFile)> = config
        .entries
        .par_iter()
        .enumerate()
        .map(|(entry_id, entry)| -> Result<(usize, LoadedFile)> {
            let path = &entry.source_file;
            let data =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let tracks = parse_gpx_segments(&data)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let input_points = tracks.iter().map(Vec::len).collect();
            let results = build_segments(tracks, entry, params);
            Ok((
                entry_id,
                LoadedFile {
                    source: path.clone(),
                    window: entry.window,
                    input_points,
                    results,
                },
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    // Restore original ordering by entry id
    loaded.sort_by_key(|(id, _)| *id);
    Ok(loaded.into_iter().map(|(_, file)| file).collect())
}

fn collect_segments(files: Vec<LoadedFile>, skip_invalid: bool) -> Result<Vec<TrackSegment>> {
    let mut segments = Vec::new();
    for file in files {
        debug!(
            "{}: {} segment(s) in window {}",
            file.source.display(),
            file.results.len(),
            file.window
        );
        for result in file.results {
            match result {
                Ok(segment) => segments.push(segment),
                Err(err) if skip_invalid => warn!("Skipping {}", err),
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(segments)
}

fn report_overlaps(segments: &[TrackSegment]) -> usize {
    let windows: Vec<TimeWindow> = segments.iter().map(|s| s.window()).collect();
    let pairs = overlapping_pairs(&windows);
    for &(a, b) in &pairs {
        warn!(
            "Segments {} {} and {} {} have overlapping tracking windows",
            a, windows[a], b, windows[b]
        );
    }
    pairs.len()
}

fn handle_convert(args: ConvertArgs) -> Result<()> {
    let params = params_from(&args.synthesis);
    let config = RunConfig::load(&args.synthesis.input)
        .with_context(|| format!("failed to load {}", args.synthesis.input.display()))?;

    let t_load = Instant::now();
    let files = load_inputs(&config, &params)?;
    let segments = collect_segments(files, args.skip_invalid)?;
    if segments.is_empty() {
        return Err(anyhow!("no usable track segments found"));
    }
    if args.profile || args.synthesis.verbose {
        info!(
            "Synthesis stage: {:.1} ms ({} segments)",
            t_load.elapsed().as_secs_f64() * 1000.0,
            segments.len()
        );
    }

    let overlaps = report_overlaps(&segments);

    let mut suffix: Box<dyn MillisSuffix> = match args.suffix {
        SuffixOpt::Zero => Box::new(ZeroMillis),
        SuffixOpt::LegacyRandom => Box::new(LegacyRandom::new(args.seed)),
    };
    let history = LocationHistory::from_segments(&segments, suffix.as_mut())?;

    let t_write = Instant::now();
    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        history.write_json(&mut handle, args.pretty)?;
        handle.flush()?;
    } else {
        write_history(&history, &args.output, args.pretty)?;
        info!("Wrote location history: {}", args.output.display());
    }
    if args.profile || args.synthesis.verbose {
        info!(
            "Write stage: {:.1} ms ({} locations)",
            t_write.elapsed().as_secs_f64() * 1000.0,
            history.locations.len()
        );
    }

    info!(
        "Converted {} segments into {} locations ({} overlapping window pairs)",
        segments.len(),
        history.locations.len(),
        overlaps
    );
    Ok(())
}

fn write_history(history: &LocationHistory, path: &Path, pretty: bool) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    history.write_json(&mut writer, pretty)?;
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let params = params_from(&args.synthesis);
    let config = RunConfig::load(&args.synthesis.input)
        .with_context(|| format!("failed to load {}", args.synthesis.input.display()))?;
    let files = load_inputs(&config, &params)?;

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_inspect_rows(&files, &params, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_inspect_rows(&files, &params, &mut writer)?;
        info!("Wrote segment report: {}", args.output.display());
    }

    let segments: Vec<TrackSegment> = files
        .into_iter()
        .flat_map(|f| f.results.into_iter().filter_map(|r| r.ok()))
        .collect();
    report_overlaps(&segments);
    Ok(())
}

fn write_inspect_rows<W: Write>(
    files: &[LoadedFile],
    params: &Params,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record([
        "file",
        "segment",
        "status",
        "points_in",
        "points_out",
        "path_distance_m",
        "window_start",
        "window_end",
        "mean_velocity_mps",
        "activity",
        "markers",
    ])?;

    for file in files {
        let source = file.source.display().to_string();
        for (index, result) in file.results.iter().enumerate() {
            let points_in = file.input_points.get(index).copied().unwrap_or(0);
            let row = match result {
                Ok(segment) => vec![
                    source.clone(),
                    index.to_string(),
                    "ok".to_string(),
                    points_in.to_string(),
                    segment.points().len().to_string(),
                    format!("{:.1}", segment.path_distance(&params.metric)),
                    segment.window().start().to_string(),
                    segment.window().end().to_string(),
                    format!("{:.3}", segment.mean_velocity()),
                    segment.activity_type().to_string(),
                    segment.marker_count().to_string(),
                ],
                Err(err) => {
                    warn!("{}", err);
                    vec![
                        source.clone(),
                        index.to_string(),
                        error_cause(err),
                        points_in.to_string(),
                        String::new(),
                        String::new(),
                        file.window.start().to_string(),
                        file.window.end().to_string(),
                        String::new(),
                        String::new(),
                        String::new(),
                    ]
                }
            };
            writer.write_record(&row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn error_cause(err: &LhError) -> String {
    match err {
        LhError::Segment { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
