//! slice-render: render every 2-D slice of a volume to PNG.
//!
//! `render` loads a `.json` or `.npy` volume, `demo` renders a random one,
//! and the hidden `worker` subcommand is the child side of fresh-mode
//! worker processes.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use renderer::{parse_size, Colormap, Interpolation, RenderConfig};
use slice_common::{load_volume, TitlePattern, Volume};
use slice_pipeline::{serve_worker, PipelineConfig, RenderReport, SliceRenderPipeline, SpawnMode};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Every slice written.
const EXIT_OK: u8 = 0;
/// The run finished but at least one slice failed.
const EXIT_PARTIAL: u8 = 1;
/// The run could not start.
const EXIT_SETUP: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "slice-render", version, about)]
struct Cli {
    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every slice of a .json or .npy volume.
    Render(RenderArgs),
    /// Render a volume of uniform random samples.
    Demo(DemoArgs),
    /// Serve tasks from stdin as a fresh-mode worker process.
    #[command(hide = true)]
    Worker,
}

/// Pool and figure options shared by `render` and `demo`.
#[derive(Parser, Debug)]
struct PoolArgs {
    /// Worker count [default: host parallelism].
    #[arg(long)]
    workers: Option<usize>,

    /// How workers are created: inherit (threads) or fresh (processes).
    #[arg(long, value_parser = parse_mode)]
    mode: Option<SpawnMode>,

    /// Built-in colormap name or path to a colormap JSON file.
    #[arg(long, env = "SLICE_RENDER_COLORMAP", default_value = "viridis")]
    colormap: String,

    /// Lower color limit [default: slice minimum].
    #[arg(long, allow_hyphen_values = true)]
    vmin: Option<f32>,

    /// Upper color limit [default: slice maximum].
    #[arg(long, allow_hyphen_values = true)]
    vmax: Option<f32>,

    /// Resampling used to fit the grid into the plot area.
    #[arg(long, value_parser = parse_interpolation, default_value = "nearest")]
    interpolation: Interpolation,

    /// Title and file stem pattern, e.g. `level_{index:03}`.
    #[arg(long)]
    title_pattern: Option<String>,

    /// Per-slice deadline in seconds.
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Figure size in pixels.
    #[arg(long, default_value = "640x480")]
    size: String,

    /// Draw a colorbar next to the plot.
    #[arg(long)]
    colorbar: bool,

    /// Also write the run report as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Volume file (.json or .npy).
    #[arg(long)]
    input: PathBuf,

    /// Directory the PNGs are written to; created if missing.
    #[arg(long)]
    output_dir: PathBuf,

    #[command(flatten)]
    pool: PoolArgs,
}

#[derive(Parser, Debug)]
struct DemoArgs {
    #[arg(long, default_value_t = 10)]
    depth: usize,

    #[arg(long, default_value_t = 1000)]
    rows: usize,

    #[arg(long, default_value_t = 1000)]
    cols: usize,

    /// Seed for reproducible samples.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "/tmp/figs")]
    output_dir: PathBuf,

    #[command(flatten)]
    pool: PoolArgs,
}

fn parse_mode(s: &str) -> Result<SpawnMode, String> {
    SpawnMode::from_str(s).ok_or_else(|| format!("unknown mode '{}', expected inherit or fresh", s))
}

fn parse_interpolation(s: &str) -> Result<Interpolation, String> {
    Interpolation::from_str(s)
        .ok_or_else(|| format!("unknown interpolation '{}', expected nearest or bilinear", s))
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let result = match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Demo(args) => cmd_demo(args),
        Command::Worker => cmd_worker(),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_SETUP)
        }
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<u8> {
    let volume = load_volume(&args.input)
        .with_context(|| format!("failed to load volume from {}", args.input.display()))?;
    run(volume, &args.output_dir, &args.pool)
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<u8> {
    info!(
        depth = args.depth,
        rows = args.rows,
        cols = args.cols,
        seed = ?args.seed,
        "Generating random volume"
    );
    let volume = Volume::random(args.depth, args.rows, args.cols, args.seed);
    run(volume, &args.output_dir, &args.pool)
}

fn cmd_worker() -> anyhow::Result<u8> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve_worker(stdin.lock(), stdout.lock()).context("worker loop failed")?;
    Ok(EXIT_OK)
}

fn pipeline_config(args: &PoolArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env();
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(pattern) = &args.title_pattern {
        config.title_pattern = TitlePattern::parse(pattern)?;
    }
    if let Some(secs) = args.timeout_secs {
        if !(secs > 0.0 && secs.is_finite()) {
            anyhow::bail!("--timeout-secs must be a positive number, got {}", secs);
        }
        config.task_timeout = Some(Duration::from_secs_f64(secs));
    }
    Ok(config)
}

fn render_config(args: &PoolArgs) -> anyhow::Result<RenderConfig> {
    let (width, height) = parse_size(&args.size)?;
    let colormap = Colormap::resolve(&args.colormap)
        .with_context(|| format!("failed to load colormap '{}'", args.colormap))?;
    Ok(RenderConfig {
        width,
        height,
        colormap,
        vmin: args.vmin,
        vmax: args.vmax,
        interpolation: args.interpolation,
        colorbar: args.colorbar,
        ..RenderConfig::default()
    })
}

fn run(volume: Volume, output_dir: &Path, args: &PoolArgs) -> anyhow::Result<u8> {
    let pipeline = SliceRenderPipeline::new(pipeline_config(args)?, render_config(args)?)?;

    let report = pipeline.render_all_report(volume, output_dir, None)?;

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }

    if report.is_success() {
        println!(
            "{}/{} slices written to {} in {:.2}s",
            report.written.len(),
            report.total,
            output_dir.display(),
            report.elapsed.as_secs_f64()
        );
        Ok(EXIT_OK)
    } else {
        eprintln!("{}", report.failure_report());
        Ok(EXIT_PARTIAL)
    }
}

fn write_report(report: &RenderReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_flags_parse() {
        let cli = Cli::try_parse_from([
            "slice-render",
            "render",
            "--input",
            "vol.npy",
            "--output-dir",
            "out",
            "--workers",
            "3",
            "--mode",
            "fresh",
            "--vmin",
            "-1.5",
            "--size",
            "320x240",
        ])
        .unwrap();

        let Command::Render(args) = cli.cmd else {
            panic!("expected render subcommand");
        };
        assert_eq!(args.pool.workers, Some(3));
        assert_eq!(args.pool.mode, Some(SpawnMode::Fresh));
        assert_eq!(args.pool.vmin, Some(-1.5));

        let config = render_config(&args.pool).unwrap();
        assert_eq!((config.width, config.height), (320, 240));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let parsed = Cli::try_parse_from(["slice-render", "demo", "--mode", "fork"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_nonpositive_timeout_is_rejected() {
        let cli = Cli::try_parse_from(["slice-render", "demo", "--timeout-secs", "0"]).unwrap();
        let Command::Demo(args) = cli.cmd else {
            panic!("expected demo subcommand");
        };
        assert!(pipeline_config(&args.pool).is_err());
    }
}
