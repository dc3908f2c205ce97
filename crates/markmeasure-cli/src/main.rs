//! markmeasure CLI: measure objects in frames against a printed marker.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use markmeasure::marker::{render_marker_with_quiet_zone, DictionarySpec};
use markmeasure::{
    draw_overlay, FrameReport, MarkerDictionary, MeasureConfig, Measurer, PhysicalSize,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "markmeasure")]
#[command(about = "Measure object width and height using a fiducial marker of known size")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure objects in one or more frames, in order.
    Measure(CliMeasureArgs),

    /// Render a dictionary marker as a PNG for printing.
    Marker {
        /// Marker id.
        #[arg(long, default_value = "0")]
        id: usize,

        /// Marker side length in pixels (outer black edge).
        #[arg(long, default_value = "600")]
        size: u32,

        /// White quiet zone around the marker, pixels.
        #[arg(long, default_value = "60")]
        margin: u32,

        /// Output PNG path.
        #[arg(long)]
        out: PathBuf,

        /// Custom dictionary JSON (`{"bits_per_side": 4, "codes": [...]}`).
        #[arg(long)]
        dictionary: Option<PathBuf>,
    },

    /// Print marker dictionary statistics.
    DictionaryInfo {
        /// Custom dictionary JSON.
        #[arg(long)]
        dictionary: Option<PathBuf>,
    },

    /// Match a data word against the marker dictionary.
    DecodeTest {
        /// Observed word (hex, e.g. 0xB532).
        #[arg(long)]
        word: String,

        /// Custom dictionary JSON.
        #[arg(long)]
        dictionary: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct CliMeasureArgs {
    /// Frames to process; the scale ratio carries over from frame to frame.
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// JSON configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Custom dictionary JSON.
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Expected reference marker id.
    #[arg(long)]
    marker_id: Option<usize>,

    /// Physical side length of the reference marker.
    #[arg(long)]
    marker_size: Option<f64>,

    /// Minimum object contour area in px².
    #[arg(long)]
    min_area: Option<f64>,

    /// Adaptive threshold window for segmentation (odd).
    #[arg(long)]
    block_size: Option<u32>,

    /// Adaptive threshold bias for segmentation.
    #[arg(long)]
    bias: Option<f64>,

    /// Unit label used when printing sizes.
    #[arg(long, default_value = "cm")]
    unit: String,

    /// Write all frame reports as a JSON array.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write an annotated PNG per frame into this directory.
    #[arg(long)]
    overlay_dir: Option<PathBuf>,
}

impl CliMeasureArgs {
    fn build_config(&self) -> CliResult<MeasureConfig> {
        let mut config = match &self.config {
            Some(path) => MeasureConfig::from_json_file(path)?,
            None => MeasureConfig::default(),
        };
        if let Some(path) = &self.dictionary {
            config.dictionary = Some(load_dictionary_spec(path)?);
        }
        if let Some(id) = self.marker_id {
            config.calibration.expected_id = id;
        }
        if let Some(size) = self.marker_size {
            config.calibration.side_length = size;
        }
        if let Some(area) = self.min_area {
            config.segment.min_area_px = area;
        }
        if let Some(block) = self.block_size {
            config.segment.block_size = block;
        }
        if let Some(bias) = self.bias {
            config.segment.bias = bias;
        }
        config.validate()?;
        Ok(config)
    }
}

fn load_dictionary_spec(path: &Path) -> CliResult<DictionarySpec> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("Failed to read {}: {}", path.display(), e).into() })?;
    Ok(serde_json::from_str(&data)?)
}

fn load_dictionary(path: Option<&Path>) -> CliResult<MarkerDictionary> {
    match path {
        Some(p) => MarkerDictionary::from_json_file(p),
        None => Ok(MarkerDictionary::aruco_4x4()),
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Measure(args) => run_measure(&args),
        Commands::Marker {
            id,
            size,
            margin,
            out,
            dictionary,
        } => run_marker(id, size, margin, &out, dictionary.as_deref()),
        Commands::DictionaryInfo { dictionary } => run_dictionary_info(dictionary.as_deref()),
        Commands::DecodeTest { word, dictionary } => {
            run_decode_test(&word, dictionary.as_deref())
        }
    }
}

// ── dictionary-info ────────────────────────────────────────────────────

fn run_dictionary_info(path: Option<&Path>) -> CliResult<()> {
    let dict = load_dictionary(path)?;
    let bits = dict.bits_per_side();
    let digits = ((bits * bits + 3) / 4) as usize;

    println!("markmeasure marker dictionary");
    println!("  grid:                 {}x{} data cells + border", bits, bits);
    println!("  number of markers:    {}", dict.len());
    println!("  min rotated Hamming:  {}", dict.min_distance());
    println!("  correctable bits:     {}", dict.max_correction_bits());
    if let (Some(first), Some(last)) = (dict.codeword(0), dict.codeword(dict.len().saturating_sub(1))) {
        println!("  first codeword:       0x{:0width$X}", first, width = digits);
        println!("  last codeword:        0x{:0width$X}", last, width = digits);
    }
    Ok(())
}

// ── decode-test ────────────────────────────────────────────────────────

fn run_decode_test(word_str: &str, path: Option<&Path>) -> CliResult<()> {
    let dict = load_dictionary(path)?;
    let word_str = word_str
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    let word = u64::from_str_radix(word_str, 16)
        .map_err(|e| -> CliError { format!("invalid hex word: {}", e).into() })?;

    let total = dict.bits_per_side() * dict.bits_per_side();
    if total < 64 && word >> total != 0 {
        return Err(format!("word 0x{:X} has more than {} bits", word, total).into());
    }

    let m = dict.best_match(word);
    println!("Input word:   0x{:X} (binary: {:0width$b})", word, word, width = total as usize);
    println!("Best match:");
    println!("  id:         {}", m.id);
    println!("  codeword:   0x{:X}", dict.codeword(m.id).unwrap_or(0));
    println!("  rotation:   {} quarter turns clockwise", m.rotation);
    println!("  distance:   {} bits", m.distance);
    println!(
        "  accepted:   {} (correctable: {} bits)",
        u32::from(m.distance) <= dict.max_correction_bits(),
        dict.max_correction_bits()
    );
    Ok(())
}

// ── marker ─────────────────────────────────────────────────────────────

fn run_marker(id: usize, size: u32, margin: u32, out: &Path, path: Option<&Path>) -> CliResult<()> {
    let dict = load_dictionary(path)?;
    let img = render_marker_with_quiet_zone(&dict, id, size, margin).ok_or_else(|| -> CliError {
        format!(
            "cannot render marker {}: dictionary has {} ids, size must be at least {} px",
            id,
            dict.len(),
            dict.bits_per_side() + 2
        )
        .into()
    })?;
    img.save(out)?;
    tracing::info!("Marker {} written to {}", id, out.display());
    Ok(())
}

// ── measure ────────────────────────────────────────────────────────────

fn format_size(size: &PhysicalSize, unit: &str) -> String {
    if size.calibrated {
        format!("W: {:.2} {unit}, H: {:.2} {unit}", size.width, size.height)
    } else {
        "W: 0.00 (uncalibrated), H: 0.00 (uncalibrated)".to_string()
    }
}

fn print_report(path: &Path, report: &FrameReport, unit: &str) {
    let scale = match report.scale {
        Some(s) if report.scale_fresh => format!("{}", s),
        Some(s) => format!("{} (stale)", s),
        None => "uncalibrated".to_string(),
    };
    println!(
        "[{}] {}: {} | scale {}",
        report.frame_index,
        path.display(),
        report.marker,
        scale
    );
    for object in &report.objects {
        println!(
            "    at ({:.1}, {:.1}) angle {:.1}°  {}",
            object.rect.center[0],
            object.rect.center[1],
            object.rect.angle_deg,
            format_size(&object.size, unit)
        );
    }
}

fn run_measure(args: &CliMeasureArgs) -> CliResult<()> {
    let config = args.build_config()?;
    tracing::info!(
        "Reference marker id {} with side {} {}",
        config.calibration.expected_id,
        config.calibration.side_length,
        args.unit
    );
    let mut measurer = Measurer::new(config)?;

    if let Some(dir) = &args.overlay_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut reports = Vec::with_capacity(args.frames.len());
    for path in &args.frames {
        let frame = image::open(path)
            .map_err(|e| -> CliError {
                format!("Failed to open frame {}: {}", path.display(), e).into()
            })?
            .to_rgb8();

        let report = measurer.process_frame(&frame);
        print_report(path, &report, &args.unit);

        if let Some(dir) = &args.overlay_dir {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("frame{}", report.frame_index));
            let out = dir.join(format!("{}_overlay.png", stem));
            draw_overlay(&frame, &report).save(&out)?;
            tracing::debug!("Overlay written to {}", out.display());
        }
        reports.push(report);
    }

    let calibrated = reports.iter().filter(|r| r.scale_fresh).count();
    tracing::info!(
        "Processed {} frames ({} with the reference marker)",
        reports.len(),
        calibrated
    );

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(out, &json)?;
        tracing::info!("Results written to {}", out.display());
    }

    Ok(())
}
