//! Collected measurements and the text report.
//!
//! The report starts with six summary lines (means rounded to two decimals,
//! `nan` when undefined), two blank lines, then one section per measurement
//! list: a header line, one raw value per line and a blank line.
//!
//! Values use the shortest text that round-trips. Magnitudes below `1e-4` or
//! from `1e16` up are written in scientific form with a signed two-digit
//! exponent (`1e-05`).

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LigamentError, LigamentResult};
use crate::metrics::{self, MeasurementCategory};

/// A summary value that may be undefined for an empty measurement set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Value(f64),
    Undefined { category: MeasurementCategory },
}

impl Statistic {
    /// Convert a metric result, mapping an empty set to [`Statistic::Undefined`].
    ///
    /// Any other error is propagated.
    pub fn from_result(result: LigamentResult<f64>) -> LigamentResult<Self> {
        match result {
            Ok(value) => Ok(Statistic::Value(value)),
            Err(LigamentError::EmptyDiameterSet { category }) => {
                Ok(Statistic::Undefined { category })
            }
            Err(other) => Err(other),
        }
    }

    /// Mean of `values`, undefined when the list is empty.
    pub fn mean(values: &[f64], category: MeasurementCategory) -> Self {
        match metrics::mean(values, category) {
            Ok(value) => Statistic::Value(value),
            Err(_) => Statistic::Undefined { category },
        }
    }

    /// The value, if defined.
    pub fn value(&self) -> Option<f64> {
        match self {
            Statistic::Value(v) => Some(*v),
            Statistic::Undefined { .. } => None,
        }
    }

    /// Whether the statistic has a value.
    pub fn is_defined(&self) -> bool {
        matches!(self, Statistic::Value(_))
    }

    /// Convert back to a result; undefined values become `EmptyDiameterSet`.
    pub fn into_result(self) -> LigamentResult<f64> {
        match self {
            Statistic::Value(v) => Ok(v),
            Statistic::Undefined { category } => Err(LigamentError::empty_diameter_set(category)),
        }
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statistic::Value(v) => f.write_str(&format_value(round2(*v))),
            Statistic::Undefined { .. } => write!(f, "nan"),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Shortest round-trip text of `value`, with a signed two-digit exponent in
/// scientific form (`1e-05`, `2.5e+16`) and lowercase `nan`.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let text = format!("{:?}", value);
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

/// Means of every measurement list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub all_diameter: Statistic,
    pub connected_diameter: Statistic,
    pub terminal_diameter: Statistic,
    pub node_diameter: Statistic,
    pub length: Statistic,
    pub percent_terminal: Statistic,
}

/// Measurement lists of one analysis run, in physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    /// Diameters along the whole skeleton.
    pub all_diameters: Vec<f64>,
    /// Diameters along the skeleton without terminal ligaments.
    pub connected_diameters: Vec<f64>,
    /// Diameters along terminal ligaments.
    pub terminal_diameters: Vec<f64>,
    /// Diameters at node voxels.
    pub node_diameters: Vec<f64>,
    /// Lengths of connected ligaments.
    pub lengths: Vec<f64>,
    /// Lengths of every ligament, terminal ones included.
    pub all_lengths: Vec<f64>,
    /// Share of terminal diameter measurements, in percent.
    pub percent_terminal: Statistic,
}

impl Measurements {
    /// Assemble measurements, deriving the terminal percentage.
    pub fn new(
        all_diameters: Vec<f64>,
        connected_diameters: Vec<f64>,
        terminal_diameters: Vec<f64>,
        node_diameters: Vec<f64>,
        lengths: Vec<f64>,
        all_lengths: Vec<f64>,
    ) -> Self {
        let percent_terminal = match metrics::percent_terminal(&terminal_diameters, &all_diameters) {
            Ok(value) => Statistic::Value(value),
            Err(_) => Statistic::Undefined {
                category: MeasurementCategory::PercentTerminal,
            },
        };
        Self {
            all_diameters,
            connected_diameters,
            terminal_diameters,
            node_diameters,
            lengths,
            all_lengths,
            percent_terminal,
        }
    }

    /// Measurements of an empty structure.
    pub fn empty() -> Self {
        Self::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    /// Means of every list.
    pub fn summary(&self) -> Summary {
        Summary {
            all_diameter: Statistic::mean(&self.all_diameters, MeasurementCategory::AllDiameters),
            connected_diameter: Statistic::mean(
                &self.connected_diameters,
                MeasurementCategory::ConnectedDiameters,
            ),
            terminal_diameter: Statistic::mean(
                &self.terminal_diameters,
                MeasurementCategory::TerminalDiameters,
            ),
            node_diameter: Statistic::mean(&self.node_diameters, MeasurementCategory::NodeDiameters),
            length: Statistic::mean(&self.lengths, MeasurementCategory::Lengths),
            percent_terminal: self.percent_terminal,
        }
    }

    /// Render the text report.
    pub fn to_report(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();

        let _ = writeln!(out, "Average of all ligament diameters: {}", summary.all_diameter);
        let _ = writeln!(out, "Average connected ligament diameter: {}", summary.connected_diameter);
        let _ = writeln!(out, "Average terminal ligament diameter: {}", summary.terminal_diameter);
        let _ = writeln!(out, "Average node point diameter: {}", summary.node_diameter);
        let _ = writeln!(
            out,
            "Average ligament length (node to node) (NOT ACCURATE): {}",
            summary.length
        );
        let _ = writeln!(
            out,
            "Percent terminal ligaments (linear length): {}%",
            summary.percent_terminal
        );
        out.push_str("\n\n");

        let sections: [(&str, &[f64]); 5] = [
            ("All diameter measurements", &self.all_diameters),
            ("Connected ligament diameter measurements", &self.connected_diameters),
            ("Terminal ligament diameter measurements", &self.terminal_diameters),
            ("Node point diameter measurements", &self.node_diameters),
            ("Ligament length measurements", &self.lengths),
        ];
        for (header, values) in sections {
            out.push_str(header);
            out.push('\n');
            let lines: Vec<String> = values.iter().map(|&v| format_value(v)).collect();
            out.push_str(&lines.join("\n"));
            out.push_str("\n\n");
        }
        out
    }

    /// Write the text report to `path`.
    pub fn write_report(&self, path: impl AsRef<Path>) -> LigamentResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_report()).map_err(|source| LigamentError::IoWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize lists and summary to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Document<'a> {
            summary: Summary,
            measurements: &'a Measurements,
        }
        serde_json::to_string_pretty(&Document {
            summary: self.summary(),
            measurements: self,
        })
    }
}
