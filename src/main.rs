use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use medextract_lib::config::{self, PipelineConfig};
use medextract_lib::pipeline::processor::DocumentProcessor;
use medextract_lib::pipeline::structuring::DocumentKind;

#[derive(Parser, Debug)]
#[command(
    name = "medextract",
    version,
    about = "Extract structured fields from scanned prescriptions and patient-intake forms"
)]
struct Cli {
    /// Document schema: prescription or patient_details
    #[arg(long, default_value = "prescription")]
    kind: DocumentKind,

    /// Page files of one document, in page order (PNG, JPEG, TIFF, BMP or plain text)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write intermediate artifacts under this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Skip the clinical knowledge analysis
    #[arg(long, default_value_t = false)]
    no_analysis: bool,

    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() {
    medextract_lib::init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "extraction failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let mut pipeline_config = match &cli.config {
        Some(path) => {
            let mut loaded = PipelineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            loaded.apply_env();
            loaded
        }
        None => PipelineConfig::from_env(),
    };
    if let Some(dir) = cli.dump_dir {
        pipeline_config.dump_dir = Some(dir);
    }
    if cli.no_analysis {
        pipeline_config.analysis_enabled = false;
    }

    let processor = DocumentProcessor::from_config(&pipeline_config)
        .context("initializing document processor")?;
    if !processor.ocr_available() {
        tracing::warn!("OCR engine unavailable, image pages will yield placeholder fields");
    }
    let record = processor
        .process_files(&cli.files, cli.kind)
        .with_context(|| format!("processing {} page file(s)", cli.files.len()))?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&record)?
    } else {
        serde_json::to_string(&record)?
    };
    println!("{json}");
    Ok(())
}
