//! ligament info command - summarize a volume without analyzing it.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::output;
use crate::{Cli, InputArgs, OutputFormat};

#[derive(Serialize)]
struct VolumeInfo {
    input: String,
    dims: [usize; 3],
    voxels: usize,
    foreground_voxels: usize,
    foreground_fraction: f64,
    pixel_size: f64,
    warnings: Vec<String>,
}

pub fn run(input: &InputArgs, cli: &Cli) -> Result<()> {
    let ingested = super::load(input, cli)?;
    let volume = &ingested.volume;
    let [nx, ny, nz] = volume.dims();

    let info = VolumeInfo {
        input: input.input.display().to_string(),
        dims: [nx, ny, nz],
        voxels: nx * ny * nz,
        foreground_voxels: volume.foreground_voxels(),
        foreground_fraction: volume.foreground_fraction(),
        pixel_size: volume.pixel_size(),
        warnings: ingested.warnings.iter().map(|w| w.to_string()).collect(),
    };

    match cli.format {
        OutputFormat::Json => output::print_json(&info, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            println!("{}", "Volume Info".bold().underline());
            println!("  {}: {}", "Input".cyan(), info.input);
            println!("  {}: {} x {} x {}", "Dimensions".cyan(), nx, ny, nz);
            println!("  {}: {}", "Voxels".cyan(), info.voxels);
            println!(
                "  {}: {} ({:.2}%)",
                "Foreground".cyan(),
                info.foreground_voxels,
                100.0 * info.foreground_fraction
            );
            println!("  {}: {}", "Pixel size".cyan(), info.pixel_size);
            if info.foreground_voxels == 0 {
                output::warning("volume has no foreground voxels", cli.quiet);
            }
        }
    }

    Ok(())
}
