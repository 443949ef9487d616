use console::style;

use crate::analysis::{ComplexityBand, Feasibility};

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Green for Low, yellow for Medium, red above.
pub fn styled_band(band: ComplexityBand, score: u32) -> console::StyledObject<String> {
    let text = format!("{band} ({score} points)");
    match band {
        ComplexityBand::Low => bright_green(text),
        ComplexityBand::Medium => bright_yellow(text),
        ComplexityBand::High | ComplexityBand::VeryHigh => bright_red(text),
    }
}

pub fn styled_feasibility(feasibility: Feasibility) -> console::StyledObject<String> {
    match feasibility {
        Feasibility::High => bright_green(feasibility),
        Feasibility::Medium => bright_yellow(feasibility),
        Feasibility::Low => bright_red(feasibility),
    }
}
