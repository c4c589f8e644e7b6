//! Icons and colours used by the step output.

use crossterm::style::Color;

/// Spinner animation frames, one per tick.
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Visual vocabulary of the step output
#[derive(Debug, Clone)]
pub struct Theme {
    /// Step headers
    pub header: Color,
    /// Completed steps
    pub success: Color,
    /// Warnings and hints
    pub warning: Color,
    /// Failures and diagnostics
    pub error: Color,
    /// Secondary details such as applied variables
    pub secondary: Color,
    /// Completed step icon (✓)
    pub success_icon: &'static str,
    /// Failed step icon (✗)
    pub error_icon: &'static str,
    /// Warning icon (⚠)
    pub warning_icon: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            secondary: Color::DarkGrey,
            success_icon: "✓",
            error_icon: "✗",
            warning_icon: "⚠",
        }
    }
}

/// Frame shown at `tick`, wrapping around.
pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}
