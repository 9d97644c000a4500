//! Landmark Warping Tool
//!
//! Loads a landmark file, moves every landmark through a bUnwarpJ raw
//! displacement field and saves the warped landmarks in both CSV and TXT
//! layouts.
//!
//! Usage:
//! ```bash
//! cargo run --example warp_landmarks -- \
//!   --landmarks data/case_01/moving.csv \
//!   --field data/case_01/raw_transform.txt \
//!   --output output/case_01/warped
//! ```

use benchmark_io::{create_dir, load_landmarks, save_landmarks, warp_points, IoConfig};
use clap::Parser;
use flexi_logger::{detailed_format, Duplicate, FileSpec, Logger};
use log::info;
use std::path::PathBuf;

/// Landmark warping tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Landmark file (.csv or .txt)
    #[arg(short = 'l', long)]
    landmarks: PathBuf,

    /// bUnwarpJ raw displacement field
    #[arg(short = 'f', long)]
    field: PathBuf,

    /// Output path, the extension is replaced by .csv and .txt
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Optional YAML file with path resolution settings
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Also write logs to the "logs" folder
    #[arg(long, default_value_t = false)]
    log_file: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _logger = if cli.log_file {
        let handle = Logger::try_with_str("info")?
            .log_to_file(
                FileSpec::default()
                    .directory("logs")
                    .suppress_timestamp()
                    .suffix("log"),
            )
            .duplicate_to_stdout(Duplicate::All)
            .format_for_files(detailed_format)
            .start()?;
        Some(handle)
    } else {
        env_logger::init();
        None
    };

    let config = match &cli.config {
        Some(path) => IoConfig::load_from_yaml(path)?,
        None => IoConfig::default(),
    };

    let landmarks_path = config.resolve(&cli.landmarks);
    let field_path = config.resolve(&cli.field);
    info!("Loading landmarks from: {}", landmarks_path.display());
    let points = load_landmarks(&landmarks_path)?;

    info!("Warping {} landmarks with: {}", points.len(), field_path.display());
    let warped = warp_points(&field_path, &points)?;

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    save_landmarks(&cli.output, &warped)?;

    for (before, after) in points.iter().zip(&warped) {
        println!(
            "({:.2}, {:.2}) -> ({:.2}, {:.2})",
            before.x, before.y, after.x, after.y
        );
    }
    println!("Saved {} warped landmarks to {}", warped.len(), cli.output.display());
    Ok(())
}
