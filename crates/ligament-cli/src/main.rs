//! ligament: command-line interface for ligament network analysis.
//!
//! Loads a binary volume (image slice directory or extended XYZ file),
//! extracts its skeleton network and writes diameter and length statistics.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=ligament_net=info` - Stage summaries
//! - `RUST_LOG=ligament_net=debug` - Intermediate counts
//! - `RUST_LOG=ligament_net::timing=debug` - Performance timing
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Analyze a slice stack with 2.5 nm isotropic voxels
//! ligament analyze slices/ --pixel-size 2.5 2.5 2.5 -o results.txt
//!
//! # Reconstruct node volumes and export masks
//! RUST_LOG=ligament_net=info ligament analyze atoms.xyz --node-mask sphere --masks-dir masks/
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{analyze, config, info};

/// ligament - Measure ligament networks in binary 3D volumes.
///
/// Thins the volume to a skeleton, splits it into nodes and ligaments and
/// reports ligament diameters and lengths.
#[derive(Parser)]
#[command(name = "ligament")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Node volume reconstruction strategy.
#[derive(Clone, Copy, ValueEnum)]
pub enum NodeMaskMethod {
    /// Union of balls sized by the distance field
    Sphere,
    /// Grow nodes until they reach the background
    Dilation,
}

/// Options shared by every command that loads a volume.
#[derive(clap::Args)]
pub struct InputArgs {
    /// Slice directory (PNG/TIFF/BMP) or extended XYZ file
    input: PathBuf,

    /// Physical voxel size along x, y and z; anisotropic sizes are resampled
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    pixel_size: Option<Vec<String>>,

    /// Swap foreground and background after loading
    #[arg(long)]
    invert: bool,

    /// Scale factor applied to XYZ positions before rasterizing
    #[arg(long, default_value_t = ligament_net::io::DEFAULT_LATTICE_SCALE)]
    lattice_scale: f64,

    /// Keep at most this many voxels along each axis
    #[arg(long)]
    max_extent: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the ligament network and report measurements
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Write the text report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML configuration file (see `ligament config`)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reconstruct node volumes with this strategy
        #[arg(long)]
        node_mask: Option<NodeMaskMethod>,

        /// Treat the input as an existing skeleton
        #[arg(long)]
        prethinned: bool,

        /// Stop thinning after this many passes (0 = until stable)
        #[arg(long)]
        max_passes: Option<usize>,

        /// Export skeleton, node and ligament masks as PNG slices here
        #[arg(long)]
        masks_dir: Option<PathBuf>,
    },

    /// Display volume dimensions and foreground fraction
    Info {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Write the default analysis configuration
    Config {
        /// Output file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "ligament_net=info,ligament_skel=info",
            2 => "ligament_net=debug,ligament_skel=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Analyze {
            input,
            output,
            config,
            node_mask,
            prethinned,
            max_passes,
            masks_dir,
        } => analyze::run(
            input,
            &analyze::AnalyzeOptions {
                report: output.as_deref(),
                config: config.as_deref(),
                node_mask: *node_mask,
                prethinned: *prethinned,
                max_passes: *max_passes,
                masks_dir: masks_dir.as_deref(),
            },
            &cli,
        ),
        Commands::Info { input } => info::run(input, &cli),
        Commands::Config { output } => config::run(output.as_deref(), &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            eprintln!("{}: {}", "Error".red().bold(), e);
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {}", "Caused by".yellow(), cause);
            }
            // Context wrappers still downcast to the library error underneath
            if let Some(err) = e.downcast_ref::<ligament_net::LigamentError>() {
                eprintln!("  {}: {}", "Code".cyan(), err.code());
                eprintln!("  {}: {}", "Suggestion".green(), err.recovery_suggestion());
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "ligament",
            "analyze",
            "slices/",
            "--pixel-size",
            "1",
            "1",
            "2.5",
            "--node-mask",
            "dilation",
            "-o",
            "out.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                input,
                output,
                node_mask,
                ..
            } => {
                assert_eq!(input.pixel_size.unwrap(), vec!["1", "1", "2.5"]);
                assert_eq!(output.unwrap(), PathBuf::from("out.txt"));
                assert!(matches!(node_mask, Some(NodeMaskMethod::Dilation)));
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_pixel_size_needs_three_values() {
        assert!(
            Cli::try_parse_from(["ligament", "info", "a.xyz", "--pixel-size", "1", "2"]).is_err()
        );
    }
}
