//! Sequencing the stages of one run, and running many.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::compose::{ComposeReport, PageComposer};
use super::header::{HeaderPatcher, HeaderReport};
use super::naming::{resolve_languages, LanguageResolution};
use super::normalize::{NormalizeReport, PageNormalizer};
use super::options::PipelineOptions;
use super::redact::{RedactionReport, WatermarkRedactor};
use super::workspace::{remove_logged, Workspace};
use crate::error::{Error, Result};
use crate::model::PdfDocument;

/// One unit of work: an original, its translation and the target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub original: PathBuf,
    pub translated: PathBuf,
    /// Target language used when the translated file name carries none
    #[serde(alias = "lang")]
    pub target_lang: String,
}

impl Job {
    pub fn new(
        original: impl Into<PathBuf>,
        translated: impl Into<PathBuf>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            original: original.into(),
            translated: translated.into(),
            target_lang: target_lang.into(),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Patched translation
    pub single: PathBuf,
    /// Side-by-side comparison
    pub merged: PathBuf,
    pub languages: LanguageResolution,
    pub original_geometry: NormalizeReport,
    pub translated_geometry: NormalizeReport,
    pub redaction: RedactionReport,
    pub header: HeaderReport,
    pub compose: ComposeReport,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Normalize,
    Redact,
    PatchHeader,
    Compose,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Validate,
        Stage::Normalize,
        Stage::Redact,
        Stage::PatchHeader,
        Stage::Compose,
        Stage::Cleanup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Normalize => "normalize",
            Stage::Redact => "redact",
            Stage::PatchHeader => "patch header",
            Stage::Compose => "compose",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Notified when a run enters a stage.
pub trait StageObserver: Sync {
    fn on_stage(&self, job: &Job, stage: Stage);
}

impl<F> StageObserver for F
where
    F: Fn(&Job, Stage) + Sync,
{
    fn on_stage(&self, job: &Job, stage: Stage) {
        self(job, stage)
    }
}

struct Silent;

impl StageObserver for Silent {
    fn on_stage(&self, _job: &Job, _stage: Stage) {}
}

/// Runs the whole repair pipeline for jobs.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    options: PipelineOptions,
}

impl Orchestrator {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run one job.
    pub fn run(&self, job: &Job) -> Result<Outcome> {
        self.run_observed(job, &Silent)
    }

    /// Run one job, reporting stage transitions to `observer`.
    ///
    /// Inputs are validated before anything is written. On failure the
    /// outputs this run wrote are removed; files at those paths from earlier
    /// runs are not touched. The workspace is released in all cases.
    pub fn run_observed(&self, job: &Job, observer: &dyn StageObserver) -> Result<Outcome> {
        let started = Instant::now();

        observer.on_stage(job, Stage::Validate);
        self.options.validate()?;
        let marker = self.options.marker.resolve()?;
        let redactor = WatermarkRedactor::new(&marker, self.options.error_mode)?;
        PdfDocument::open(&job.original)?;
        PdfDocument::open(&job.translated)?;

        let languages = resolve_languages(&job.translated, &job.original, &job.target_lang);
        let out_dir = output_dir(&job.translated);
        let single = languages.names().single_path(&out_dir);
        let merged = languages.names().merged_path(&out_dir);

        let workspace = Workspace::create()?;
        let mut written = Vec::new();
        let result = self.run_stages(
            job,
            observer,
            &workspace,
            &redactor,
            (single.as_path(), merged.as_path()),
            &mut written,
        );

        observer.on_stage(job, Stage::Cleanup);
        workspace.release();

        let stages = match result {
            Ok(stages) => stages,
            Err(e) => {
                for path in &written {
                    remove_logged(path);
                }
                log::error!("{} failed: {}", job.translated.display(), e);
                return Err(e);
            }
        };

        if self.options.remove_input {
            remove_input(&job.translated, &[&single, &merged]);
        }

        let (original_geometry, translated_geometry, redaction, header, compose) = stages;
        Ok(Outcome {
            single,
            merged,
            languages,
            original_geometry,
            translated_geometry,
            redaction,
            header,
            compose,
            finished_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    #[allow(clippy::type_complexity)]
    fn run_stages(
        &self,
        job: &Job,
        observer: &dyn StageObserver,
        workspace: &Workspace,
        redactor: &WatermarkRedactor,
        (single, merged): (&Path, &Path),
        written: &mut Vec<PathBuf>,
    ) -> Result<(
        NormalizeReport,
        NormalizeReport,
        RedactionReport,
        HeaderReport,
        ComposeReport,
    )> {
        observer.on_stage(job, Stage::Normalize);
        let normalizer = PageNormalizer::new(self.options.rotation_policy);
        let original_path = workspace.artifact("original_normalized.pdf");
        let translated_path = workspace.artifact("translated_normalized.pdf");
        let original_geometry = normalizer
            .normalize_file(&job.original, &original_path)
            .map_err(|e| e.in_stage("normalize"))?;
        let translated_geometry = normalizer
            .normalize_file(&job.translated, &translated_path)
            .map_err(|e| e.in_stage("normalize"))?;

        let original = PdfDocument::open(&original_path).map_err(|e| e.in_stage("normalize"))?;
        let mut translated =
            PdfDocument::open(&translated_path).map_err(|e| e.in_stage("normalize"))?;

        observer.on_stage(job, Stage::Redact);
        let redaction = redactor
            .redact(&mut translated)
            .map_err(|e| e.in_stage("redact"))?;

        observer.on_stage(job, Stage::PatchHeader);
        let header = HeaderPatcher::new(self.options.strip_height)
            .patch(&original, &mut translated, workspace, single)
            .map_err(|e| e.in_stage("patch header"))?;
        written.push(single.to_path_buf());

        observer.on_stage(job, Stage::Compose);
        let compose = PageComposer::new(self.options.divider)
            .compose(&original, &translated, merged)
            .map_err(|e| e.in_stage("compose"))?;
        written.push(merged.to_path_buf());

        Ok((
            original_geometry,
            translated_geometry,
            redaction,
            header,
            compose,
        ))
    }
}

/// Outputs go next to the translated file.
fn output_dir(translated: &Path) -> PathBuf {
    match translated.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn remove_input(translated: &Path, outputs: &[&Path]) {
    if outputs.iter().any(|o| same_file(o, translated)) {
        log::warn!(
            "Not removing {}: it is also an output",
            translated.display()
        );
        return;
    }
    remove_logged(translated);
}

/// Whether two paths name the same file, however they are spelled.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Run many jobs on a thread pool. Results come back in job order.
///
/// `threads == 0` lets rayon pick the number of threads.
pub fn process_batch(jobs: &[Job], options: &PipelineOptions, threads: usize) -> Vec<Result<Outcome>> {
    process_batch_observed(jobs, options, threads, &Silent)
}

/// [`process_batch`] with stage notifications.
pub fn process_batch_observed(
    jobs: &[Job],
    options: &PipelineOptions,
    threads: usize,
    observer: &dyn StageObserver,
) -> Vec<Result<Outcome>> {
    let orchestrator = Orchestrator::new(options.clone());
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            let reason = e.to_string();
            return jobs
                .iter()
                .map(|_| Err(Error::Other(format!("thread pool: {}", reason))))
                .collect();
        }
    };

    log::info!("Processing {} jobs on {} threads", jobs.len(), pool.current_num_threads());
    pool.install(|| {
        jobs.par_iter()
            .map(|job| orchestrator.run_observed(job, observer))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_job_manifest_accepts_lang_alias() {
        let jobs: Vec<Job> = serde_json::from_str(
            r#"[{"original": "a.pdf", "translated": "a_fr.en.pdf", "lang": "en"},
                {"original": "b.pdf", "translated": "b_x.pdf", "target_lang": "de"}]"#,
        )
        .unwrap();
        assert_eq!(jobs[0], Job::new("a.pdf", "a_fr.en.pdf", "en"));
        assert_eq!(jobs[1].target_lang, "de");
    }

    #[test]
    fn test_missing_input_fails_before_any_stage() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new(
            dir.path().join("missing.pdf"),
            dir.path().join("missing_fr.en.pdf"),
            "en",
        );
        let seen = Mutex::new(Vec::new());
        let observer = |_: &Job, stage: Stage| seen.lock().unwrap().push(stage);

        let err = Orchestrator::new(PipelineOptions::new().with_marker("wm"))
            .run_observed(&job, &observer)
            .unwrap_err();

        assert!(matches!(err, Error::InputNotFound(_)));
        assert_eq!(*seen.lock().unwrap(), vec![Stage::Validate]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_blank_marker_is_config_error() {
        let job = Job::new("a.pdf", "b.pdf", "en");
        let err = Orchestrator::new(PipelineOptions::new().with_marker(""))
            .run(&job)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_remove_input_refuses_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_single.pdf");
        std::fs::write(&path, b"x").unwrap();
        remove_input(&path, &[&path]);
        assert!(path.exists());
    }

    #[test]
    fn test_remove_input_refuses_output_spelled_differently() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let output = dir.path().join("x_de.en_single.pdf");
        std::fs::write(&output, b"x").unwrap();

        let translated = dir.path().join("sub").join("..").join("x_de.en_single.pdf");
        assert_ne!(translated, output);
        remove_input(&translated, &[&output]);
        assert!(output.exists());

        let other = dir.path().join("x_de.en.pdf");
        std::fs::write(&other, b"x").unwrap();
        remove_input(&other, &[&output]);
        assert!(!other.exists());
    }

    #[test]
    fn test_output_dir_of_bare_name() {
        assert_eq!(output_dir(Path::new("doc_fr.en.pdf")), PathBuf::from("."));
        assert_eq!(output_dir(Path::new("/a/b.pdf")), PathBuf::from("/a"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ALL.len(), 6);
        assert_eq!(Stage::PatchHeader.to_string(), "patch header");
    }
}
