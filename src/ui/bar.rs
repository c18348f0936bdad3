//! Fixed-width textual progress bar

use serde::{Deserialize, Serialize};

pub const DEFAULT_WIDTH: usize = 50;
pub const DEFAULT_LABEL: &str = "Executing tasks";

/// Renders a progress value in [0, 1] as a single line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBar {
    pub width: usize,
    pub label: String,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl ProgressBar {
    pub fn new(width: usize, label: impl Into<String>) -> Self {
        Self {
            width,
            label: label.into(),
        }
    }

    /// Number of `=` segments drawn for `progress`
    pub fn filled(&self, progress: f64) -> usize {
        let width = self.width as f64;
        (width * progress).round().clamp(0.0, width) as usize
    }

    pub fn render(&self, progress: f64) -> String {
        let filled = self.filled(progress);
        format!(
            "{} [{}{}] {:.1}% complete",
            self.label,
            "=".repeat(filled),
            " ".repeat(self.width - filled),
            progress * 100.0
        )
    }
}
