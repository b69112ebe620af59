//! Subcommand implementations.

pub mod analyze;
pub mod config;
pub mod info;

use anyhow::{Context, Result};
use ligament_net::io::{Ingested, LoadOptions, load_volume};

use crate::{Cli, InputArgs, output};

/// Load the volume named by `args`, printing recoverable warnings.
pub fn load(args: &InputArgs, cli: &Cli) -> Result<Ingested> {
    let pixel_sizes = match &args.pixel_size {
        Some(values) => Some(
            <[String; 3]>::try_from(values.clone())
                .map_err(|v| anyhow::anyhow!("expected 3 pixel sizes, got {}", v.len()))?,
        ),
        None => None,
    };
    let options = LoadOptions {
        invert: args.invert,
        pixel_sizes,
        lattice_scale: args.lattice_scale,
        max_extent: args.max_extent,
    };

    output::info(
        &format!("Loading {}", args.input.display()),
        cli.format,
        cli.quiet,
    );
    let ingested = load_volume(&args.input, &options)
        .with_context(|| format!("Failed to load volume from {:?}", args.input))?;
    for warning in &ingested.warnings {
        output::warning(
            &format!("{} ({})", warning, warning.recovery_suggestion()),
            cli.quiet,
        );
    }
    Ok(ingested)
}
