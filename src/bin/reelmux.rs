use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

use reelmux::{
    Canvas, CodecId, FileSink, Fps, FrameIndex, FrameSource as _, MovingBoxSource, Mp4Track,
    OutputSink as _, Pipeline, PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "reelmux", version)]
struct Cli {
    /// Log at DEBUG instead of INFO.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the moving-box animation into an MP4 file.
    Render(RenderArgs),
    /// Render a single frame of the animation as a PNG.
    Frame(FrameArgs),
    /// Print the video track index of an MP4 file as JSON.
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Output MP4 path.
    #[arg(long, default_value = "animation.mp4")]
    out: PathBuf,

    /// Pipeline config JSON. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second (integer).
    #[arg(long)]
    fps: Option<u32>,

    /// Duration in seconds; frame count is `floor(duration * fps)`.
    #[arg(long, conflicts_with = "frames")]
    duration: Option<f64>,

    /// Exact frame count.
    #[arg(long)]
    frames: Option<u64>,

    /// Target bitrate in bits per second.
    #[arg(long)]
    bitrate: Option<u32>,

    /// Codec.
    #[arg(long, value_enum)]
    codec: Option<CodecChoice>,

    /// Frames the encoder may hold before `submit` blocks.
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Encoder worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Write the index after the sample data.
    #[arg(long)]
    no_fast_start: bool,

    /// Refuse to replace an existing output file.
    #[arg(long)]
    no_overwrite: bool,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Frame index (0-based).
    #[arg(long)]
    index: u64,

    /// Frames in the whole animation.
    #[arg(long, default_value_t = 1800)]
    frames: u64,

    /// Frame width in pixels.
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Input MP4 path.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecChoice {
    Mjpeg,
    Raw,
}

impl From<CodecChoice> for CodecId {
    fn from(c: CodecChoice) -> Self {
        match c {
            CodecChoice::Mjpeg => CodecId::Mjpeg,
            CodecChoice::Raw => CodecId::Raw,
        }
    }
}

const DEFAULT_WIDTH: u32 = 720;
const DEFAULT_HEIGHT: u32 = 1280;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_DURATION_SECS: f64 = 60.0;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn build_config(args: &RenderArgs) -> anyhow::Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::for_duration(
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            Fps::integer(DEFAULT_FPS)?,
            DEFAULT_DURATION_SECS,
        )?,
    };

    if let Some(w) = args.width {
        cfg.width = w;
    }
    if let Some(h) = args.height {
        cfg.height = h;
    }
    let fps_changed = args.fps.is_some();
    if let Some(fps) = args.fps {
        cfg.fps = Fps::integer(fps).context("invalid --fps")?;
    }
    match (args.frames, args.duration) {
        (Some(n), _) => cfg.frame_count = n,
        (None, Some(secs)) => {
            cfg.frame_count =
                PipelineConfig::for_duration(cfg.width, cfg.height, cfg.fps, secs)?.frame_count;
        }
        (None, None) if fps_changed && args.config.is_none() => {
            cfg.frame_count = cfg.fps.secs_to_frames_floor(DEFAULT_DURATION_SECS);
        }
        (None, None) => {}
    }
    if let Some(b) = args.bitrate {
        cfg.bitrate = b;
    }
    if let Some(c) = args.codec {
        cfg.codec = c.into();
    }
    if let Some(q) = args.queue_depth {
        cfg.encoder.queue_depth = q;
    }
    if let Some(w) = args.workers {
        cfg.encoder.workers = Some(w);
    }
    if args.no_fast_start {
        cfg.fast_start = false;
    }
    Ok(cfg)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = build_config(&args)?;
    let pipeline = Pipeline::new(cfg.clone())?;
    let mut source = MovingBoxSource::new(
        Canvas {
            width: cfg.width,
            height: cfg.height,
        },
        cfg.frame_count,
    );

    let out = pipeline
        .run(&mut source)
        .with_context(|| format!("render '{}'", args.out.display()))?;
    FileSink::new(&args.out)
        .with_overwrite(!args.no_overwrite)
        .accept(out.buffer)?;

    println!(
        "wrote {} ({} frames, {} bytes)",
        args.out.display(),
        out.stats.chunks_muxed,
        out.stats.bytes
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut source = MovingBoxSource::new(
        Canvas {
            width: args.width,
            height: args.height,
        },
        args.frames,
    );
    let frame = source.frame(FrameIndex(args.index))?;
    reelmux::output::sink::ensure_parent_dir(&args.out)?;
    image::save_buffer(
        &args.out,
        frame.data(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgba8,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let buf = std::fs::read(&args.in_path)
        .with_context(|| format!("read '{}'", args.in_path.display()))?;
    let track = Mp4Track::parse(&buf)
        .with_context(|| format!("parse '{}'", args.in_path.display()))?;
    let json = serde_json::to_string_pretty(&track).context("serialize track index")?;
    println!("{json}");
    Ok(())
}
