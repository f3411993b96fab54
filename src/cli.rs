use crate::qr::DEFAULT_QR_SIZE;
use crate::sentinel::MarkerScope;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "report-pipeline")]
#[command(about = "Render report artifacts from named datasets, with on-disk job status markers")]
#[command(version)]
pub struct CliArgs {
    /// Config file (default: $REPORT_PIPELINE_CONFIG, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render a report and write it to <OUT_DIR>/<NAME>.<EXT>
    Generate(GenerateArgs),
    /// Fetch a QR code image and print it as base64 PNG
    Qr(QrArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Directory the artifact and its status markers are written to
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Artifact base name (file name without extension)
    #[arg(long)]
    pub name: String,

    /// Output extension; "xls" selects the Excel renderer, anything else is passed through
    #[arg(long, default_value = "pdf")]
    pub ext: String,

    /// Template name, resolved in the templates directory
    #[arg(long)]
    pub template: String,

    /// Dataset bound by name, loaded from a JSON array of objects
    /// Can specify multiple: --dataset Items=items.json Totals=totals.json
    #[arg(long = "dataset", value_name = "NAME=FILE", num_args = 1..)]
    pub datasets: Vec<String>,

    /// Report parameter
    #[arg(long = "param", value_name = "NAME=VALUE", num_args = 1..)]
    pub params: Vec<String>,

    /// Fetch a QR code for VALUE and store it as base64 PNG in DATASET's COLUMN
    /// The dataset is created if no --dataset of that name was given
    #[arg(long, value_name = "DATASET.COLUMN=VALUE")]
    pub qr: Vec<String>,

    /// Pixel size of QR codes fetched with --qr
    #[arg(long, default_value_t = DEFAULT_QR_SIZE)]
    pub qr_size: u32,

    /// Override the configured templates directory
    #[arg(long, value_name = "DIR")]
    pub templates_dir: Option<PathBuf>,

    /// Override the configured render program
    #[arg(long, value_name = "PROGRAM")]
    pub renderer: Option<PathBuf>,

    /// Render timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub render_timeout: Option<u64>,

    /// Fail marker scope: "job" or "directory"
    #[arg(long, value_name = "SCOPE")]
    pub marker_scope: Option<MarkerScope>,

    /// Leave a fail marker for render and write failures too, not just contention
    #[arg(long)]
    pub record_all_failures: bool,

    /// Seconds to wait for another run of the same job
    #[arg(long, value_name = "SECS")]
    pub lock_timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct QrArgs {
    /// Value to encode
    pub value: String,

    #[arg(long, default_value_t = DEFAULT_QR_SIZE)]
    pub width: u32,

    #[arg(long, default_value_t = DEFAULT_QR_SIZE)]
    pub height: u32,

    /// Override the configured chart service URL
    #[arg(long, value_name = "URL")]
    pub chart_url: Option<String>,

    /// Also write the PNG to this file
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// A `--qr` request, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCell {
    pub dataset: String,
    pub column: String,
    pub value: String,
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        CliArgs::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Generate(args) => {
                for arg in &args.datasets {
                    parse_assignment(arg)?;
                }
                for arg in &args.params {
                    parse_assignment(arg)?;
                }
                for arg in &args.qr {
                    parse_qr_cell(arg)?;
                }
                if args.datasets.is_empty() && args.qr.is_empty() {
                    return Err("At least one --dataset (or --qr) is required".to_string());
                }
                if !args.qr.is_empty() && args.qr_size == 0 {
                    return Err("--qr-size must be greater than zero".to_string());
                }
            }
            Command::Qr(args) => {
                if args.width == 0 || args.height == 0 {
                    return Err("--width and --height must be greater than zero".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Split `NAME=VALUE` at the first '='
pub fn parse_assignment(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("Expected NAME=VALUE, got '{}'", arg)),
    }
}

/// Parse `DATASET.COLUMN=VALUE`
pub fn parse_qr_cell(arg: &str) -> Result<QrCell, String> {
    let (target, value) = parse_assignment(arg)?;
    match target.split_once('.') {
        Some((dataset, column)) if !dataset.is_empty() && !column.is_empty() => {
            Ok(QrCell { dataset: dataset.to_string(), column: column.to_string(), value })
        }
        _ => Err(format!("Expected DATASET.COLUMN=VALUE, got '{}'", arg)),
    }
}
