//! Output formatting for CLI commands.
//!
//! This module renders chart snapshots in both human-readable text and
//! JSON for programmatic use.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers (semantic colors, badges)
//! - [`tree`]: Pedigree tree rendering with ASCII/Unicode connectors

pub mod color;
pub mod tree;

use crate::coi::CoiValue;
use crate::domain::{ChartTheme, DisplayOptions, DogNode};
use crate::graph::AncestorSlot;
use crate::session::ChartSnapshot;
use serde::Serialize;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};
pub use tree::print_pedigree_tree;

use color::{bold, champion_badge, colorize_coi, colorize_id, dimmed, health_badge, sex_icon};

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use ASCII-only icons instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
    /// Color palette requested by the chart's display options.
    pub theme: ChartTheme,
}

impl OutputConfig {
    /// Create an OutputConfig with explicit values and the classic palette.
    pub fn new(use_ascii: bool, use_colors: bool) -> Self {
        Self {
            use_ascii,
            use_colors,
            theme: ChartTheme::Classic,
        }
    }

    /// Replace the color palette.
    pub fn with_theme(mut self, theme: ChartTheme) -> Self {
        self.theme = theme;
        self
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `STUDBOOK_ASCII`: Set to "1" or "true" for ASCII-only icons (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `STUDBOOK_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        let use_ascii = match env::var("STUDBOOK_ASCII") {
            Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Ok(v) => {
                tracing::warn!(
                    env_var = "STUDBOOK_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            Err(_) => false,
        };

        // Respect NO_COLOR standard (https://no-color.org/)
        // Also support STUDBOOK_COLOR for explicit control
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("STUDBOOK_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            use_ascii,
            use_colors,
            theme: ChartTheme::Classic,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_ascii: false,
            use_colors: true,
            theme: ChartTheme::Classic,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print the coefficient of inbreeding for a chart's root dog.
pub fn print_coi(snapshot: &ChartSnapshot, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env().with_theme(snapshot.display.theme);

    match mode {
        OutputMode::Text => print_coi_text(&mut handle, snapshot, &config),
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(&coi_to_json(snapshot))
                .map_err(io::Error::other)?;
            writeln!(handle, "{}", json)
        }
    }
}

/// Print the column-per-generation chart layout.
pub fn print_chart(snapshot: &ChartSnapshot, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env().with_theme(snapshot.display.theme);

    match mode {
        OutputMode::Text => print_chart_text(&mut handle, snapshot, &config),
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(&chart_to_json(snapshot))
                .map_err(io::Error::other)?;
            writeln!(handle, "{}", json)
        }
    }
}

/// Print a simple message
pub fn print_message(msg: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", msg)
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{}", json)
}

// ============================================================================
// Text Formatting
// ============================================================================

/// One-line label for a dog: name, sex, ID, plus badges and optional
/// fields per the display options.
pub(crate) fn dog_label(
    node: &DogNode,
    display: &DisplayOptions,
    config: &OutputConfig,
) -> String {
    let mut label = format!(
        "{} {} {}",
        sex_icon(node.sex, config),
        colorize_id(node.id.as_str(), config),
        node.name
    );
    if display.show_champions && node.champion {
        label.push(' ');
        label.push_str(&champion_badge(config));
    }
    if display.show_health_tests && node.health_tested {
        label.push(' ');
        label.push_str(&health_badge(config));
    }
    if display.show_dates {
        if let Some(dob) = node.date_of_birth {
            label.push_str(&format!(" {}", dimmed(&dob.format("%Y-%m-%d").to_string(), config)));
        }
    }
    if display.show_owners {
        if let Some(owner) = &node.owner_name {
            label.push_str(&format!(" {}", dimmed(&format!("({owner})"), config)));
        }
    }
    label
}

/// Text for a non-dog ancestor slot.
pub(crate) fn placeholder_label(slot: &AncestorSlot, config: &OutputConfig) -> String {
    match slot {
        AncestorSlot::Dog(id) => colorize_id(id.as_str(), config),
        AncestorSlot::Unknown => dimmed("(unknown)", config),
        AncestorSlot::Truncated => dimmed("(beyond depth)", config),
    }
}

fn print_coi_text<W: Write>(
    w: &mut W,
    snapshot: &ChartSnapshot,
    config: &OutputConfig,
) -> io::Result<()> {
    let root_label = snapshot
        .nodes
        .get(&snapshot.root)
        .map(|n| dog_label(n, &snapshot.display, config))
        .unwrap_or_else(|| colorize_id(snapshot.root.as_str(), config));

    match &snapshot.coi.value {
        CoiValue::Coefficient(f) => {
            writeln!(
                w,
                "{} {}",
                bold("Coefficient of inbreeding:", config),
                colorize_coi(*f, config)
            )?;
            writeln!(w, "  {}", root_label)?;

            if snapshot.coi.contributions.is_empty() {
                writeln!(w)?;
                writeln!(
                    w,
                    "{}",
                    dimmed("No ancestor is shared between the sire and dam lineages.", config)
                )?;
            } else {
                writeln!(w)?;
                writeln!(
                    w,
                    "{} ({}):",
                    bold("Contributing paths", config),
                    snapshot.coi.contributions.len()
                )?;
                for contribution in &snapshot.coi.contributions {
                    let label = snapshot
                        .nodes
                        .get(&contribution.ancestor)
                        .map(|n| dog_label(n, &snapshot.display, config))
                        .unwrap_or_else(|| {
                            colorize_id(contribution.ancestor.as_str(), config)
                        });
                    writeln!(
                        w,
                        "  {}  {}  {}",
                        label,
                        colorize_coi(contribution.contribution, config),
                        dimmed(
                            &format!(
                                "(via {} sire / {} dam steps)",
                                contribution.sire_path_len, contribution.dam_path_len
                            ),
                            config
                        )
                    )?;
                }
            }
            if snapshot.coi.depth_truncated {
                writeln!(w)?;
                writeln!(
                    w,
                    "{}",
                    warning(
                        "Some lineages were cut off at the generation bound; the true coefficient may be higher.",
                        config
                    )
                )?;
            }
        }
        CoiValue::InsufficientData => {
            writeln!(w, "{}", bold("Coefficient of inbreeding:", config))?;
            writeln!(w, "  {}", root_label)?;
            writeln!(
                w,
                "  {}",
                warning(
                    "insufficient data: the sire or dam is unrecorded or beyond the generation bound",
                    config
                )
            )?;
        }
    }

    print_warnings_text(w, snapshot, config)
}

fn print_chart_text<W: Write>(
    w: &mut W,
    snapshot: &ChartSnapshot,
    config: &OutputConfig,
) -> io::Result<()> {
    for (k, column) in snapshot.columns.iter().enumerate() {
        if k == 0 {
            writeln!(w, "{}", bold("Subject", config))?;
        } else {
            writeln!(w)?;
            writeln!(w, "{}", bold(&format!("Generation {k}"), config))?;
        }
        for slot in column {
            let label = match slot {
                AncestorSlot::Dog(id) => snapshot
                    .nodes
                    .get(id)
                    .map(|n| dog_label(n, &snapshot.display, config))
                    .unwrap_or_else(|| colorize_id(id.as_str(), config)),
                other => placeholder_label(other, config),
            };
            writeln!(w, "  {label}")?;
        }
    }

    match &snapshot.coi.value {
        CoiValue::Coefficient(f) => {
            writeln!(w)?;
            writeln!(
                w,
                "{} {}",
                bold("Coefficient of inbreeding:", config),
                colorize_coi(*f, config)
            )?;
        }
        CoiValue::InsufficientData => {
            writeln!(w)?;
            writeln!(
                w,
                "{} {}",
                bold("Coefficient of inbreeding:", config),
                dimmed("insufficient data", config)
            )?;
        }
    }

    print_warnings_text(w, snapshot, config)
}

/// Append the snapshot's warnings, if any.
fn print_warnings_text<W: Write>(
    w: &mut W,
    snapshot: &ChartSnapshot,
    config: &OutputConfig,
) -> io::Result<()> {
    if snapshot.warnings.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "{} ({}):", bold("Warnings", config), snapshot.warnings.len())?;
    for w_item in &snapshot.warnings {
        writeln!(w, "  {}", warning(&w_item.to_string(), config))?;
    }
    Ok(())
}

// ============================================================================
// JSON Formatting
// ============================================================================

fn coi_to_json(snapshot: &ChartSnapshot) -> serde_json::Value {
    let value = match &snapshot.coi.value {
        CoiValue::Coefficient(f) => serde_json::json!(f),
        CoiValue::InsufficientData => serde_json::Value::Null,
    };
    serde_json::json!({
        "dog": snapshot.root.as_str(),
        "coefficient": value,
        "insufficient_data": matches!(snapshot.coi.value, CoiValue::InsufficientData),
        "depth_truncated": snapshot.coi.depth_truncated,
        "contributing_paths": snapshot.coi.contributions.iter().map(|c| {
            serde_json::json!({
                "ancestor": c.ancestor.as_str(),
                "sire_path_len": c.sire_path_len,
                "dam_path_len": c.dam_path_len,
                "contribution": c.contribution,
            })
        }).collect::<Vec<_>>(),
        "warnings": snapshot.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    })
}

fn chart_to_json(snapshot: &ChartSnapshot) -> serde_json::Value {
    let columns: Vec<serde_json::Value> = snapshot
        .columns
        .iter()
        .map(|column| {
            column
                .iter()
                .map(|slot| match slot {
                    AncestorSlot::Dog(id) => serde_json::json!(id.as_str()),
                    AncestorSlot::Unknown => serde_json::json!("unknown"),
                    AncestorSlot::Truncated => serde_json::json!("truncated"),
                })
                .collect::<Vec<_>>()
                .into()
        })
        .collect();

    let dogs: serde_json::Map<String, serde_json::Value> = snapshot
        .nodes
        .values()
        .map(|n| {
            (
                n.id.as_str().to_string(),
                serde_json::json!({
                    "name": n.name,
                    "sex": n.sex,
                    "breed": n.breed,
                    "date_of_birth": n.date_of_birth,
                    "champion": n.champion,
                    "health_tested": n.health_tested,
                }),
            )
        })
        .collect();

    serde_json::json!({
        "root": snapshot.root.as_str(),
        "revision": snapshot.revision,
        "generated_at": snapshot.generated_at,
        "generations": columns,
        "dogs": dogs,
        "warnings": snapshot.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    })
}
