//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success/Low:   green   (low inbreeding, completed actions)
//!   - Warning/Mid:   yellow  (elevated inbreeding, champion badge)
//!   - Error/High:    red     (high inbreeding, failures)
//!   - Info/Reference: cyan   (dog IDs, root chart node)
//!   - Muted:         dimmed  (field labels, connectors, placeholders)
//!   - Emphasis:      bold    (section headers)
//!
//! The dark theme swaps every semantic color for its bright variant so
//! charts stay legible on dark terminal backgrounds.

use crate::domain::{ChartTheme, Sex};
use colored::{Color, Colorize};

use super::OutputConfig;

/// Coefficient at or above which a pedigree is flagged as elevated.
const COI_ELEVATED: f64 = 0.0625;

/// Coefficient at or above which a pedigree is flagged as high.
const COI_HIGH: f64 = 0.125;

/// Resolve a semantic color under the active theme.
fn themed(color: Color, config: &OutputConfig) -> Color {
    if config.theme != ChartTheme::Dark {
        return color;
    }
    match color {
        Color::Green => Color::BrightGreen,
        Color::Yellow => Color::BrightYellow,
        Color::Red => Color::BrightRed,
        Color::Cyan => Color::BrightCyan,
        Color::Blue => Color::BrightBlue,
        Color::Magenta => Color::BrightMagenta,
        other => other,
    }
}

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.color(themed(Color::Green, config)).to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.color(themed(Color::Red, config)).to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.color(themed(Color::Yellow, config)).to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.color(themed(Color::Cyan, config)).to_string()
}

/// Colorize a dog ID (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.color(themed(Color::Cyan, config)).to_string()
}

/// Format and colorize a coefficient of inbreeding as a percentage.
///
/// Green below 6.25%, yellow up to 12.5%, red above.
pub(crate) fn colorize_coi(coefficient: f64, config: &OutputConfig) -> String {
    let text = format!("{:.2}%", coefficient * 100.0);
    if !config.use_colors {
        return text;
    }
    if coefficient >= COI_HIGH {
        text.color(themed(Color::Red, config)).bold().to_string()
    } else if coefficient >= COI_ELEVATED {
        text.color(themed(Color::Yellow, config)).to_string()
    } else {
        text.color(themed(Color::Green, config)).to_string()
    }
}

/// Get a colored sex icon, with ASCII fallback support.
pub(crate) fn sex_icon(sex: Sex, config: &OutputConfig) -> String {
    let icon = if config.use_ascii {
        match sex {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    } else {
        match sex {
            Sex::Male => "♂",
            Sex::Female => "♀",
        }
    };

    if !config.use_colors {
        return icon.to_string();
    }
    match sex {
        Sex::Male => icon.color(themed(Color::Blue, config)).to_string(),
        Sex::Female => icon.color(themed(Color::Magenta, config)).to_string(),
    }
}

/// Championship badge, shown next to titled dogs.
pub(crate) fn champion_badge(config: &OutputConfig) -> String {
    let icon = if config.use_ascii { "*" } else { "★" };
    if !config.use_colors {
        return icon.to_string();
    }
    icon.color(themed(Color::Yellow, config)).to_string()
}

/// Health-tested marker.
pub(crate) fn health_badge(config: &OutputConfig) -> String {
    let icon = if config.use_ascii { "+" } else { "✚" };
    if !config.use_colors {
        return icon.to_string();
    }
    icon.color(themed(Color::Green, config)).to_string()
}

/// Apply dimmed style to text (for labels/field names/placeholders).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}
