//! ligament config command - write the default analysis configuration.

use std::path::Path;

use anyhow::{Context, Result};
use ligament_net::AnalysisParams;
use tracing::debug;

use crate::output;
use crate::{Cli, OutputFormat};

pub fn run(output_path: Option<&Path>, cli: &Cli) -> Result<()> {
    let params = AnalysisParams::default();

    match output_path {
        Some(path) => {
            params
                .save_toml(path)
                .with_context(|| format!("Failed to write configuration to {:?}", path))?;
            debug!(path = %path.display(), "Wrote default configuration");
            output::success(
                &format!("Configuration written to {}", path.display()),
                cli.format,
                cli.quiet,
            );
        }
        None => match cli.format {
            OutputFormat::Json => output::print_json(&params, cli.quiet),
            OutputFormat::Text => {
                if !cli.quiet {
                    print!("{}", params.to_toml()?);
                }
            }
        },
    }

    Ok(())
}
