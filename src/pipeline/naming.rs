//! Language codes and output file names derived from the translated file name.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Source language used when the file name does not state one.
pub const AUTO_LANGUAGE: &str = "auto";

fn translated_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?P<stem>.+)_(?P<src>[a-z]{2})\.(?P<dst>[a-z]{2})(?:_[^.]+)?\.pdf$")
            .expect("valid regex")
    })
}

/// The parts that make up output file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputNames {
    /// Base name shared by both outputs
    pub stem: String,
    /// Source language code, or `auto`
    pub src: String,
    /// Target language code
    pub dst: String,
}

impl OutputNames {
    pub fn new(stem: impl Into<String>, src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            src: src.into(),
            dst: dst.into(),
        }
    }

    /// `<stem>_<src>.<dst>_single.pdf`
    pub fn single_name(&self) -> String {
        format!("{}_{}.{}_single.pdf", self.stem, self.src, self.dst)
    }

    /// `<stem>_<src>.<dst>_merged.pdf`
    pub fn merged_name(&self) -> String {
        format!("{}_{}.{}_merged.pdf", self.stem, self.src, self.dst)
    }

    pub fn single_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.single_name())
    }

    pub fn merged_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.merged_name())
    }
}

/// Outcome of reading language codes from a file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "names", rename_all = "lowercase")]
pub enum LanguageResolution {
    /// The file name carried both codes
    Parsed(OutputNames),
    /// The file name did not match; the original's stem, `auto` and the
    /// caller's target language are used instead
    Fallback(OutputNames),
}

impl LanguageResolution {
    pub fn names(&self) -> &OutputNames {
        match self {
            LanguageResolution::Parsed(names) | LanguageResolution::Fallback(names) => names,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LanguageResolution::Fallback(_))
    }
}

/// Derive output names from the translated file name.
///
/// Accepts `<stem>_<src>.<dst>.pdf` and `<stem>_<src>.<dst>_<variant>.pdf`,
/// case-insensitively, and lower-cases the codes.
pub fn resolve_languages(translated: &Path, original: &Path, target_lang: &str) -> LanguageResolution {
    let file_name = translated
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(caps) = translated_name_pattern().captures(&file_name) {
        return LanguageResolution::Parsed(OutputNames::new(
            &caps["stem"],
            caps["src"].to_lowercase(),
            caps["dst"].to_lowercase(),
        ));
    }

    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    log::warn!(
        "Could not read language codes from '{}'; using '{}' with {}.{}",
        file_name,
        stem,
        AUTO_LANGUAGE,
        target_lang
    );
    LanguageResolution::Fallback(OutputNames::new(
        stem,
        AUTO_LANGUAGE,
        target_lang.to_lowercase(),
    ))
}
