use clap::{Parser, Subcommand};
use squeeze::compress::{CompressError, CompressReport, conversion_note, convert_quality};
use squeeze::config::{self, Config};
use squeeze::imaging::{
    CropArea, EncodeRequest, Format, PRINT_DPI, Quality, ResizeMethod, ResizeParams, RustBackend,
    Unit, output_file_name, parse_byte_size, resolve_dimensions, target_advice, to_pixels_at,
};
use squeeze::live::{LiveCommand, LiveCompressor};
use squeeze::output::{self, CompressSummary, InfoSummary};
use squeeze::session::{Session, SessionError};
use squeeze::source::SourceImage;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output file flag shared by commands that write an image.
#[derive(clap::Args, Clone)]
struct OutputArgs {
    /// Output file (default: input name with the output format's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn version_string() -> &'static str {
    let on_tag = env!("SQUEEZE_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("SQUEEZE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "squeeze")]
#[command(about = "Compress, convert, and resize images")]
#[command(long_about = "\
Compress, convert, and resize images

Compression works in two modes:

  squeeze compress photo.jpg --quality 60        # fixed quality (1-100)
  squeeze compress photo.jpg --quality high      # preset quality
  squeeze compress photo.jpg --target-size 200KB # best quality under a size

Quality presets: maximum (100), high (95), good (85), medium (75), low (60).

Target sizes accept plain bytes or B/KB/MB/GB suffixes (1024-based).
PNG output is lossless: quality is ignored and a target size is advisory.

Run 'squeeze gen-config' to generate a documented squeeze.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./squeeze.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print a JSON report instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode at a quality or under a target file size
    Compress {
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        /// Output format: jpeg, png, webp (default: config, then input format)
        #[arg(long)]
        format: Option<Format>,
        /// Quality 1-100 (clamped) or a preset: maximum, high, good, medium, low
        #[arg(long, conflicts_with = "target_size")]
        quality: Option<Quality>,
        /// Largest acceptable output, e.g. 150KB
        #[arg(long, value_parser = parse_byte_size)]
        target_size: Option<u64>,
    },
    /// Convert to another format
    Convert {
        input: PathBuf,
        #[arg(long)]
        format: Format,
        #[command(flatten)]
        out: OutputArgs,
        /// Quality for lossy formats, number or preset (default: convert.lossy_quality)
        #[arg(long)]
        quality: Option<Quality>,
    },
    /// Resize, then encode
    Resize {
        input: PathBuf,
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
        /// px, %, mm, cm, in (96 DPI)
        #[arg(long, default_value = "px")]
        unit: Unit,
        /// exact, fit, fill, crop
        #[arg(long, default_value = "fit")]
        method: ResizeMethod,
        /// Derive the other dimension from the original aspect ratio; give
        /// only one of --width and --height
        #[arg(long)]
        keep_aspect: bool,
        #[arg(long)]
        format: Option<Format>,
        #[arg(long)]
        quality: Option<Quality>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Cut a region of the output's aspect ratio and scale it to the output size
    Crop {
        input: PathBuf,
        /// Output width
        #[arg(long)]
        width: f64,
        /// Output height
        #[arg(long)]
        height: f64,
        /// px, %, mm, cm, in (physical units at 300 DPI)
        #[arg(long, default_value = "mm")]
        unit: Unit,
        /// Left edge of the region in source pixels (default: centered)
        #[arg(long, allow_negative_numbers = true)]
        x: Option<i64>,
        /// Top edge of the region in source pixels (default: centered)
        #[arg(long, allow_negative_numbers = true)]
        y: Option<i64>,
        #[arg(long)]
        format: Option<Format>,
        #[arg(long)]
        quality: Option<Quality>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Show dimensions, format, size, and the sensible target-size range
    Info { input: PathBuf },
    /// Read settings from stdin ("quality 60", "target 150KB", "format webp")
    /// and re-encode after each pause
    Live {
        input: PathBuf,
        #[arg(long)]
        format: Option<Format>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Print a stock squeeze.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref(), &std::env::current_dir()?)?;
    let mut session = Session::new(RustBackend::new(), config.cache.capacity);

    match cli.command {
        Command::Compress {
            input,
            out,
            format,
            quality,
            target_size,
        } => {
            let source = session.open(&input)?;
            let format = format
                .or(config.compress.format)
                .or(source.format())
                .unwrap_or(Format::Jpeg);
            let request = match target_size {
                Some(bytes) => {
                    if let Some(advice) = target_advice(bytes, source.original_size()) {
                        eprintln!("{}", output::format_advice(&advice));
                    }
                    EncodeRequest::target_bytes(format, bytes)
                }
                None => {
                    EncodeRequest::quality(format, quality.unwrap_or(config.compress.quality()))
                }
            };
            let report = compress_or_exit(&session, request)?;
            finish(&input, out.output, &source, &report, cli.json)?;
        }
        Command::Convert {
            input,
            format,
            out,
            quality,
        } => {
            let source = session.open(&input)?;
            if let Some(note) = conversion_note(source.format(), format) {
                eprintln!("Note: {note}");
            }
            let quality =
                quality.unwrap_or_else(|| convert_quality(format, config.convert.lossy_quality()));
            let report = compress_or_exit(&session, EncodeRequest::quality(format, quality))?;
            finish(&input, out.output, &source, &report, cli.json)?;
        }
        Command::Resize {
            input,
            width,
            height,
            unit,
            method,
            keep_aspect,
            format,
            quality,
            out,
        } => {
            let original = session.open(&input)?;
            let (width, height) = resolve_dimensions(
                (original.width(), original.height()),
                width,
                height,
                unit,
                keep_aspect,
            )?;
            let params = ResizeParams {
                width,
                height,
                unit,
                method,
            };
            let source = session
                .resize(&params)
                .ok_or("no image loaded to resize")?;
            let format = format
                .or(config.compress.format)
                .or(source.format())
                .unwrap_or(Format::Jpeg);
            let quality =
                quality.unwrap_or_else(|| convert_quality(format, config.convert.lossy_quality()));
            let report = compress_or_exit(&session, EncodeRequest::quality(format, quality))?;
            finish(&input, out.output, &source, &report, cli.json)?;
        }
        Command::Crop {
            input,
            width,
            height,
            unit,
            x,
            y,
            format,
            quality,
            out,
        } => {
            let original = session.open(&input)?;
            let image = (original.width(), original.height());
            let output = (
                to_pixels_at(width, unit, image.0, PRINT_DPI),
                to_pixels_at(height, unit, image.1, PRINT_DPI),
            );
            let centered = CropArea::centered(image, output);
            let area = centered.moved_to(
                x.unwrap_or(centered.x as i64),
                y.unwrap_or(centered.y as i64),
                image,
            );
            let source = session
                .crop(&area, output)
                .ok_or("no image loaded to crop")?;
            let format = format
                .or(config.compress.format)
                .or(source.format())
                .unwrap_or(Format::Jpeg);
            let quality =
                quality.unwrap_or_else(|| convert_quality(format, config.convert.lossy_quality()));
            let report = compress_or_exit(&session, EncodeRequest::quality(format, quality))?;
            finish(&input, out.output, &source, &report, cli.json)?;
        }
        Command::Info { input } => {
            let source = session.open(&input)?;
            if cli.json {
                output::print_json(&InfoSummary::new(&source))?;
            } else {
                output::print_info(&source);
            }
        }
        Command::Live { input, format, out } => {
            let source = session.open(&input)?;
            let format = format
                .or(config.compress.format)
                .or(source.format())
                .unwrap_or(Format::Jpeg);
            run_live(&session, source, format, &config, out.output, cli.json)?;
        }
        Command::GenConfig => unreachable!("handled before config loading"),
    }

    Ok(())
}

/// Compress the session's source; an unreachable budget prints guidance and
/// exits instead of returning an error.
fn compress_or_exit(
    session: &Session<RustBackend>,
    request: EncodeRequest,
) -> Result<CompressReport, SessionError> {
    match session.try_compress(request) {
        Err(SessionError::Compress(CompressError::BudgetUnreachable {
            target_bytes,
            smallest,
        })) => {
            for line in output::format_budget_unreachable(target_bytes, smallest) {
                eprintln!("{line}");
            }
            std::process::exit(1);
        }
        other => other,
    }
}

/// Write the encoded image and report it.
fn finish(
    input: &Path,
    output: Option<PathBuf>,
    source: &SourceImage,
    report: &CompressReport,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = output.unwrap_or_else(|| default_output_path(input, report.result.format()));
    std::fs::write(&path, report.result.bytes())?;
    let output_name = path.display().to_string();
    if json {
        output::print_json(&CompressSummary::new(report, source, Some(output_name)))?;
    } else {
        output::print_compress_report(report, source, &output_name);
    }
    Ok(())
}

/// `photo.png` → `photo.webp`; never the input file itself.
fn default_output_path(input: &Path, format: Format) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let candidate = input.with_file_name(output_file_name(&name, format));
    if candidate != input {
        return candidate;
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}-squeezed.{}", format.extension()))
}

fn run_live(
    session: &Session<RustBackend>,
    source: Arc<SourceImage>,
    format: Format,
    config: &Config,
    output_path: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener_source = Arc::clone(&source);
    let live = LiveCompressor::start_with_listener(
        Arc::clone(session.backend()),
        source,
        config.live.debounce(),
        move |ticket, outcome| match (json, outcome) {
            (true, Ok(report)) => {
                let summary = CompressSummary::new(report, &listener_source, None);
                match serde_json::to_string(&summary) {
                    Ok(line) => println!("{line}"),
                    Err(e) => log::error!("live #{}: {e}", ticket.value()),
                }
            }
            _ => println!("{}", output::format_live_event(ticket, outcome)),
        },
    );

    let mut request = EncodeRequest::quality(format, config.compress.quality());
    live.update(request)?;
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<LiveCommand>() {
            Ok(command) => {
                request = command.apply(request);
                live.update(request)?;
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    let latest = live.finish();
    if let Some(path) = output_path {
        match latest.as_deref() {
            Some(Ok(report)) => {
                std::fs::write(&path, report.result.bytes())?;
                eprintln!("Wrote {} ({})", path.display(), report.size_label());
            }
            _ => eprintln!("No result to write"),
        }
    }
    Ok(())
}
