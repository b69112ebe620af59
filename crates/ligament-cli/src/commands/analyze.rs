//! ligament analyze command - extract the network and report measurements.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use ligament_net::io::write_slice_stack;
use ligament_net::{
    AnalysisParams, BoolGrid, NetworkAnalysis, NoOpObserver, NodeMaskParams, ProgressObserver,
    Statistic, Summary, VolumeModel,
};
use serde::Serialize;
use tracing::debug;

use crate::output::{self, TerminalProgress};
use crate::{Cli, InputArgs, NodeMaskMethod, OutputFormat};

/// Analysis options beyond the input.
pub struct AnalyzeOptions<'a> {
    pub report: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub node_mask: Option<NodeMaskMethod>,
    pub prethinned: bool,
    pub max_passes: Option<usize>,
    pub masks_dir: Option<&'a Path>,
}

#[derive(Serialize)]
struct AnalyzeResult {
    input: String,
    dims: [usize; 3],
    pixel_size: f64,
    skeleton_voxels: usize,
    node_voxels: usize,
    ligaments: u32,
    terminal_ligaments: usize,
    elapsed_ms: u128,
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    masks: Vec<String>,
}

/// Merge the configuration file and command-line overrides.
fn resolve_params(options: &AnalyzeOptions<'_>) -> Result<AnalysisParams> {
    let mut params = match options.config {
        Some(path) => AnalysisParams::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => AnalysisParams::default(),
    };

    if let Some(method) = options.node_mask {
        let max_radius = params.node_mask.max_radius;
        params.node_mask = match method {
            NodeMaskMethod::Sphere => NodeMaskParams::sphere_convolution(),
            NodeMaskMethod::Dilation => NodeMaskParams::iterative_dilation(),
        };
        params.node_mask.max_radius = max_radius;
    }
    if options.prethinned {
        params.thinning.prethinned = true;
    }
    if let Some(passes) = options.max_passes {
        params.thinning.max_passes = passes;
    }
    params.validate()?;
    debug!(?params, "Resolved analysis parameters");
    Ok(params)
}

pub fn run(input: &InputArgs, options: &AnalyzeOptions<'_>, cli: &Cli) -> Result<()> {
    let params = resolve_params(options)?;
    let ingested = super::load(input, cli)?;
    let volume = ingested.volume;

    output::info(
        &format!(
            "Volume {:?}, pixel size {}, {:.1}% foreground",
            volume.dims(),
            volume.pixel_size(),
            100.0 * volume.foreground_fraction()
        ),
        cli.format,
        cli.quiet,
    );

    let model = VolumeModel::with_volume(volume, ligament_skel::standard_pipeline(params));
    let observer: Arc<dyn ProgressObserver> =
        if cli.quiet || matches!(cli.format, OutputFormat::Json) {
            Arc::new(NoOpObserver)
        } else {
            Arc::new(TerminalProgress::new())
        };
    let analysis = model
        .run_blocking(observer)
        .with_context(|| format!("Analysis of {:?} failed", input.input))?;

    let report = match options.report {
        Some(path) => {
            analysis
                .measurements
                .write_report(path)
                .with_context(|| format!("Failed to write report to {:?}", path))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let masks = match options.masks_dir {
        Some(dir) => export_masks(&analysis, dir)?,
        None => Vec::new(),
    };

    let result = AnalyzeResult {
        input: input.input.display().to_string(),
        dims: analysis.skeleton.dims(),
        pixel_size: analysis.pixel_size,
        skeleton_voxels: analysis.skeleton.count(),
        node_voxels: analysis.node_count(),
        ligaments: analysis.ligament_count,
        terminal_ligaments: analysis.terminal_count(),
        elapsed_ms: analysis.elapsed.as_millis(),
        summary: analysis.measurements.summary(),
        report,
        masks,
    };

    match cli.format {
        OutputFormat::Json => output::print_json(&result, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                print_text(&result);
                if result.report.is_none() {
                    println!();
                    print!("{}", analysis.measurements.to_report());
                }
            }
        }
    }

    Ok(())
}

/// Write every mask of the analysis under `dir`, one subdirectory per mask.
fn export_masks(analysis: &NetworkAnalysis, dir: &Path) -> Result<Vec<String>> {
    let mut masks: Vec<(&str, &BoolGrid)> = vec![
        ("skeleton", &analysis.skeleton),
        ("nodes", &analysis.nodes),
        ("connected", &analysis.terminal.connected),
        ("terminal", &analysis.terminal.terminal),
    ];
    if let Some(node_mask) = &analysis.node_mask {
        masks.push(("node_mask", node_mask));
    }

    let mut written = Vec::with_capacity(masks.len());
    for (name, mask) in masks {
        let target = dir.join(name);
        write_slice_stack(mask, &target, name)
            .with_context(|| format!("Failed to export {} mask to {:?}", name, target))?;
        written.push(target.display().to_string());
    }
    Ok(written)
}

fn print_statistic(label: &str, value: &Statistic, unit: &str) {
    match value.value() {
        Some(_) => println!("  {}: {}{}", label.cyan(), value, unit),
        None => println!("  {}: {}", label.cyan(), "undefined".dimmed()),
    }
}

fn print_text(result: &AnalyzeResult) {
    println!("{}", "Ligament Network".bold().underline());
    println!("  {}: {}", "Input".cyan(), result.input);
    println!(
        "  {}: {} x {} x {}",
        "Dimensions".cyan(),
        result.dims[0],
        result.dims[1],
        result.dims[2]
    );
    println!("  {}: {}", "Pixel size".cyan(), result.pixel_size);
    println!("  {}: {}", "Skeleton voxels".cyan(), result.skeleton_voxels);
    println!("  {}: {}", "Node voxels".cyan(), result.node_voxels);
    println!(
        "  {}: {} ({} terminal)",
        "Ligaments".cyan(),
        result.ligaments,
        result.terminal_ligaments
    );

    let s = &result.summary;
    print_statistic("Mean diameter", &s.all_diameter, "");
    print_statistic("Mean connected diameter", &s.connected_diameter, "");
    print_statistic("Mean terminal diameter", &s.terminal_diameter, "");
    print_statistic("Mean node diameter", &s.node_diameter, "");
    print_statistic("Mean length", &s.length, "");
    print_statistic("Terminal share", &s.percent_terminal, "%");
    println!("  {}: {} ms", "Elapsed".cyan(), result.elapsed_ms);

    if let Some(path) = &result.report {
        output::success(
            &format!("Report written to {}", path),
            OutputFormat::Text,
            false,
        );
    }
    for path in &result.masks {
        output::success(
            &format!("Mask written to {}", path),
            OutputFormat::Text,
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligament_net::NodeMaskStrategy;

    fn options<'a>() -> AnalyzeOptions<'a> {
        AnalyzeOptions {
            report: None,
            config: None,
            node_mask: None,
            prethinned: false,
            max_passes: None,
            masks_dir: None,
        }
    }

    #[test]
    fn test_defaults() {
        let params = resolve_params(&options()).unwrap();
        assert_eq!(params, AnalysisParams::default());
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        std::fs::write(
            &path,
            "[node_mask]\nenabled = false\nmax_radius = 12\n\n[thinning]\nmax_passes = 3\n",
        )
        .unwrap();

        let params = resolve_params(&AnalyzeOptions {
            config: Some(&path),
            node_mask: Some(NodeMaskMethod::Dilation),
            max_passes: Some(9),
            ..options()
        })
        .unwrap();
        assert!(params.node_mask.enabled);
        assert_eq!(params.node_mask.max_radius, 12);
        assert!(matches!(
            params.node_mask.strategy,
            NodeMaskStrategy::IterativeDilation { .. }
        ));
        assert_eq!(params.thinning.max_passes, 9);
    }

    #[test]
    fn test_missing_config_fails() {
        let err = resolve_params(&AnalyzeOptions {
            config: Some(Path::new("/nonexistent/analysis.toml")),
            ..options()
        })
        .unwrap_err();
        assert!(err.downcast_ref::<ligament_net::LigamentError>().is_some());
    }
}
