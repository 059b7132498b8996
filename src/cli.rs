//! Background removal CLI
//!
//! Command-line interface over the library pipeline: one input image in,
//! one PNG cut-out written.

use crate::{
    config::{BackendKind, ExecutionProvider, RemovalConfig},
    models::{model_is_provisioned, resolve_model_path, MODEL_DIR_ENV, MODEL_FILE_NAME},
    processor::{default_output_path, BackgroundRemover},
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Background removal CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "u2net-bgremove")]
pub struct Cli {
    /// Input image file (JPEG, PNG)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file [default: {input stem}_nobg.png next to the input]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Directory holding u2net.onnx, overriding U2NET_HOME and the platform cache
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Inference backend (auto, native, bridged)
    #[arg(short, long, default_value_t = BackendKind::Auto)]
    pub backend: BackendKind,

    /// Execution provider for the native backend (auto, cpu, cuda, coreml)
    #[arg(short = 'p', long, default_value_t = ExecutionProvider::Auto)]
    pub provider: ExecutionProvider,

    /// Flatten the cut-out onto a solid background color (RRGGBB, e.g. ffffff)
    #[arg(long, value_name = "RRGGBB")]
    pub background: Option<String>,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose).context("Failed to initialize tracing")?;

    let config = build_config(&cli).context("Invalid CLI arguments")?;

    info!("Starting background removal");
    info!("Input: {}", cli.input.display());
    info!(
        "Backend: {}, Provider: {}",
        config.backend, config.execution_provider
    );

    // Fail with provisioning instructions before any session work
    let model_path = resolve_model_path(&config).context("Failed to resolve model path")?;
    if !model_is_provisioned(&config) {
        print_provisioning_help(&model_path);
        anyhow::bail!("model weights not found at {}", model_path.display());
    }
    info!("🤖 Model: {}", model_path.display());

    let start_time = Instant::now();

    let remover =
        BackgroundRemover::new(config).context("Failed to create background remover")?;
    let result = remover
        .process_file(&cli.input)
        .context("Failed to remove background")?;

    // Show detailed timing breakdown
    let timings = &result.timings;
    debug!("📊 Processing breakdown for {}:", cli.input.display());
    debug!("  ├─ Tensor Encode: {}ms", timings.encode_ms);
    debug!("  ├─ Inference: {}ms", timings.inference_ms);
    debug!("  ├─ Mask Decode: {}ms", timings.mask_ms);
    debug!("  ├─ Composite: {}ms", timings.composite_ms);
    debug!(
        "  └─ Total: {}ms ({:.2}s)",
        timings.total_ms,
        timings.total_ms as f64 / 1000.0
    );
    if let Ok(json) = serde_json::to_string(timings) {
        debug!("timings: {json}");
    }

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    result
        .write_png(&output_path)
        .context("Failed to save result")?;

    let total_time = start_time.elapsed();
    println!(
        "✅ Saved {} in {:.2}s",
        output_path.display(),
        total_time.as_secs_f64()
    );

    Ok(())
}

/// Initialize tracing based on verbosity level
fn init_tracing(verbose_count: u8) -> Result<()> {
    TracingConfig::new()
        .with_verbosity(verbose_count)
        .with_format(TracingFormat::Console)
        .init()
        .context("Failed to initialize tracing subscriber")
}

/// Convert CLI arguments to the library configuration
fn build_config(cli: &Cli) -> Result<RemovalConfig> {
    let mut builder = RemovalConfig::builder()
        .backend(cli.backend)
        .execution_provider(cli.provider)
        .debug(cli.verbose >= 2)
        .num_threads(cli.threads);

    if let Some(dir) = &cli.model_dir {
        builder = builder.model_path(dir.join(MODEL_FILE_NAME));
    }

    if let Some(hex) = &cli.background {
        let color = parse_hex_color(hex)
            .with_context(|| format!("invalid --background value '{hex}'"))?;
        builder = builder.background(color);
    }

    Ok(builder.build()?)
}

/// Parse an RRGGBB hex color, with or without a leading '#'
fn parse_hex_color(value: &str) -> Result<[u8; 3]> {
    let hex = value.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("expected six hex digits (RRGGBB), got '{value}'");
    }
    let r = u8::from_str_radix(&hex[0..2], 16)?;
    let g = u8::from_str_radix(&hex[2..4], 16)?;
    let b = u8::from_str_radix(&hex[4..6], 16)?;
    Ok([r, g, b])
}

/// Tell the user how to provision the weights; this tool never downloads
fn print_provisioning_help(expected_path: &Path) {
    println!("❌ Model weights not found");
    println!("   Expected location: {}", expected_path.display());
    println!();
    println!("💡 Provision the u2net model manually:");
    println!("   1. Download the weights (about 176 MB):");
    println!("      https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx");
    println!("   2. Move the file to the expected location above, or point");
    println!("      {MODEL_DIR_ENV} at the directory that holds it:");
    println!("      export {MODEL_DIR_ENV}=/path/to/models");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_with_and_without_hash() {
        assert_eq!(parse_hex_color("ffffff").unwrap(), [255, 255, 255]);
        assert_eq!(parse_hex_color("#000000").unwrap(), [0, 0, 0]);
        assert_eq!(parse_hex_color("1a2B3c").unwrap(), [0x1a, 0x2b, 0x3c]);

        assert!(parse_hex_color("fff").is_err());
        assert!(parse_hex_color("gggggg").is_err());
        assert!(parse_hex_color("#1234567").is_err());
    }

    #[test]
    fn cli_arguments_map_onto_the_config() {
        let cli = Cli::parse_from([
            "u2net-bgremove",
            "photo.jpg",
            "--backend",
            "native",
            "--provider",
            "cpu",
            "--background",
            "00ff00",
            "--model-dir",
            "/opt/models",
            "-t",
            "4",
        ]);

        let config = build_config(&cli).unwrap();
        assert_eq!(config.backend, BackendKind::Native);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.background, Some([0, 255, 0]));
        assert_eq!(
            config.model_path,
            Some(PathBuf::from("/opt/models").join("u2net.onnx"))
        );
        assert_eq!(config.intra_threads, 4);
        assert_eq!(config.inter_threads, 2);
    }

    #[test]
    fn defaults_leave_resolution_to_the_library() {
        let cli = Cli::parse_from(["u2net-bgremove", "photo.jpg"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config, RemovalConfig::default());
        assert!(cli.output.is_none());
    }

    #[test]
    fn invalid_background_is_rejected_with_the_offending_value() {
        let cli = Cli::parse_from(["u2net-bgremove", "photo.jpg", "--background", "red"]);
        let err = build_config(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("'red'"));
    }
}
