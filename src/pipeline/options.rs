//! Pipeline options and configuration.

use std::env;

use serde::{Deserialize, Serialize};

use super::header::DEFAULT_STRIP_HEIGHT;
use crate::error::{Error, Result};

/// Environment variable holding the watermark marker by default.
pub const MARKER_ENV_VAR: &str = "PDFMEND_MARKER";

/// Options shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Where the watermark marker text comes from
    pub marker: MarkerSource,

    /// When pages get rewritten by the normalizer
    pub rotation_policy: RotationPolicy,

    /// Height in points of the header strip copied from the original
    pub strip_height: f64,

    /// Line drawn between the two pages of a merged page
    pub divider: DividerStyle,

    /// Error handling mode for unreadable page content
    pub error_mode: ErrorMode,

    /// Delete the translated input after a successful run
    pub remove_input: bool,
}

impl PipelineOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a literal marker string.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = MarkerSource::Literal(marker.into());
        self
    }

    /// Set the marker source.
    pub fn with_marker_source(mut self, source: MarkerSource) -> Self {
        self.marker = source;
        self
    }

    /// Set the rotation policy.
    pub fn with_rotation_policy(mut self, policy: RotationPolicy) -> Self {
        self.rotation_policy = policy;
        self
    }

    /// Set the header strip height in points.
    pub fn with_strip_height(mut self, height: f64) -> Self {
        self.strip_height = height;
        self
    }

    /// Set the divider style.
    pub fn with_divider(mut self, divider: DividerStyle) -> Self {
        self.divider = divider;
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (skip unreadable page content).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Delete the translated input once both outputs exist.
    pub fn with_remove_input(mut self, remove: bool) -> Self {
        self.remove_input = remove;
        self
    }

    /// Check values that no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if !self.strip_height.is_finite() || self.strip_height <= 0.0 {
            return Err(Error::Config(format!(
                "strip height must be a positive number, got {}",
                self.strip_height
            )));
        }
        if !self.divider.width.is_finite() || self.divider.width < 0.0 {
            return Err(Error::Config(format!(
                "divider width must not be negative, got {}",
                self.divider.width
            )));
        }
        if !(0.0..=1.0).contains(&self.divider.gray) {
            return Err(Error::Config(format!(
                "divider gray must be within 0..=1, got {}",
                self.divider.gray
            )));
        }
        Ok(())
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            marker: MarkerSource::Environment(MARKER_ENV_VAR.to_string()),
            rotation_policy: RotationPolicy::Conditional,
            strip_height: DEFAULT_STRIP_HEIGHT,
            divider: DividerStyle::default(),
            error_mode: ErrorMode::Strict,
            remove_input: false,
        }
    }
}

/// Where the watermark marker text is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerSource {
    /// A fixed string
    Literal(String),
    /// The value of an environment variable, read once per run
    Environment(String),
}

impl MarkerSource {
    /// Produce the marker text. Missing or blank markers are a configuration error.
    pub fn resolve(&self) -> Result<String> {
        let marker = match self {
            MarkerSource::Literal(s) => s.clone(),
            MarkerSource::Environment(var) => env::var(var).map_err(|_| {
                Error::Config(format!("watermark marker not set (environment variable {var})"))
            })?,
        };
        if marker.trim().is_empty() {
            return Err(Error::Config("watermark marker is empty".to_string()));
        }
        Ok(marker)
    }
}

/// When the normalizer rewrites a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationPolicy {
    /// Rewrite only when some page is problematic; otherwise copy unchanged
    #[default]
    Conditional,
    /// Always rewrite, even when every page is already normalized
    Always,
}

/// Error handling mode for page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail on any error
    #[default]
    Strict,
    /// Skip unreadable pages and continue
    Lenient,
}

/// Stroke style of the divider line on merged pages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividerStyle {
    /// Gray level, 0 is black and 1 is white
    pub gray: f64,
    /// Line width in points (0 disables the divider)
    pub width: f64,
}

impl Default for DividerStyle {
    fn default() -> Self {
        Self {
            gray: 0.6,
            width: 1.5,
        }
    }
}
