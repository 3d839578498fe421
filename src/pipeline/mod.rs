//! The repair pipeline.
//!
//! A run takes an original PDF and its machine translation through these
//! stages:
//!
//! 1. [`PageNormalizer`] flattens page geometry of both documents.
//! 2. [`WatermarkRedactor`] removes the translation service's watermark text.
//! 3. [`HeaderPatcher`] restores the original's header strip and writes the
//!    `_single` output.
//! 4. [`PageComposer`] writes the side-by-side `_merged` output.
//!
//! [`Orchestrator`] sequences them and owns cleanup.

mod compose;
mod header;
mod naming;
mod normalize;
mod options;
mod orchestrator;
mod redact;
mod workspace;

pub use compose::{ComposeReport, Layout, Orientation, PageComposer};
pub use header::{HeaderPatcher, HeaderReport, StripArtifact, DEFAULT_STRIP_HEIGHT};
pub use naming::{resolve_languages, LanguageResolution, OutputNames, AUTO_LANGUAGE};
pub use normalize::{verify_normalized, NormalizeReport, PageNormalizer};
pub use options::{
    DividerStyle, ErrorMode, MarkerSource, PipelineOptions, RotationPolicy, MARKER_ENV_VAR,
};
pub use orchestrator::{
    process_batch, process_batch_observed, Job, Orchestrator, Outcome, Stage, StageObserver,
};
pub use redact::{RedactionReport, WatermarkRedactor};
pub use workspace::{remove_logged, Workspace};
