//! pdfmend CLI - repair and compare machine-translated PDFs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfmend::pipeline::{process_batch_observed, resolve_languages, MARKER_ENV_VAR};
use pdfmend::{Job, Orchestrator, Outcome, PdfDocument, PipelineOptions, RotationPolicy, Stage};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "pdfmend")]
#[command(version)]
#[command(about = "Repair machine-translated PDFs and compose them with their originals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair a translated PDF and write the _single and _merged outputs
    Process {
        /// Original (source-language) PDF
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        /// Machine-translated PDF
        #[arg(value_name = "TRANSLATED")]
        translated: PathBuf,

        /// Target language used when the file name carries none
        #[arg(short, long, default_value = "en")]
        lang: String,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Delete the translated input after a successful run
        #[arg(long)]
        remove_input: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process a JSON manifest of jobs in parallel
    Batch {
        /// JSON array of {"original", "translated", "target_lang"} objects
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long, default_value = "0")]
        jobs: usize,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Print the run reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show page geometry and text blocks of a PDF
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Also list text blocks per page
        #[arg(long)]
        blocks: bool,
    },

    /// Show the output names a translated file resolves to
    Names {
        /// Translated PDF file name
        #[arg(value_name = "TRANSLATED")]
        translated: PathBuf,

        /// Original PDF, used when the name carries no language codes
        #[arg(short, long, value_name = "ORIGINAL", default_value = "document.pdf")]
        original: PathBuf,

        /// Target language used when the name carries none
        #[arg(short, long, default_value = "en")]
        lang: String,
    },

    /// Show version information
    Version,
}

#[derive(clap::Args)]
struct PipelineArgs {
    /// Watermark marker text
    #[arg(short, long, env = MARKER_ENV_VAR, hide_env_values = true)]
    marker: Option<String>,

    /// Height in points of the header strip copied from the original
    #[arg(long)]
    strip_height: Option<f64>,

    /// Rewrite every page, not only rotated or cropped ones
    #[arg(long)]
    always_rewrite: bool,

    /// Skip pages whose content cannot be decoded instead of failing
    #[arg(long)]
    lenient: bool,
}

impl PipelineArgs {
    fn options(&self) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
        let marker = self.marker.as_deref().ok_or_else(|| {
            format!(
                "no watermark marker given; pass --marker or set {}",
                MARKER_ENV_VAR
            )
        })?;

        let mut options = PipelineOptions::new().with_marker(marker);
        if let Some(height) = self.strip_height {
            options = options.with_strip_height(height);
        }
        if self.always_rewrite {
            options = options.with_rotation_policy(RotationPolicy::Always);
        }
        if self.lenient {
            options = options.lenient();
        }
        options.validate()?;
        Ok(options)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process {
            original,
            translated,
            lang,
            pipeline,
            remove_input,
            json,
        } => cmd_process(&original, &translated, &lang, &pipeline, remove_input, json),
        Commands::Batch {
            manifest,
            jobs,
            pipeline,
            json,
        } => cmd_batch(&manifest, jobs, &pipeline, json),
        Commands::Info { input, blocks } => cmd_info(&input, blocks),
        Commands::Names {
            translated,
            original,
            lang,
        } => {
            cmd_names(&translated, &original, &lang);
            Ok(())
        }
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn stage_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn cmd_process(
    original: &Path,
    translated: &Path,
    lang: &str,
    pipeline: &PipelineArgs,
    remove_input: bool,
    json: bool,
) -> CmdResult {
    let options = pipeline.options()?.with_remove_input(remove_input);
    let job = Job::new(original, translated, lang);

    let pb = ProgressBar::new(Stage::ALL.len() as u64);
    pb.set_style(stage_style());
    pb.enable_steady_tick(Duration::from_millis(100));
    let observer = |_: &Job, stage: Stage| {
        pb.set_message(format!("{}...", stage));
        pb.inc(1);
    };

    let result = Orchestrator::new(options).run_observed(&job, &observer);
    pb.finish_and_clear();
    let outcome = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// `Single:` and `Merged:` lines are read by callers from stdout.
fn print_outcome(outcome: &Outcome) {
    if outcome.languages.is_fallback() {
        eprintln!(
            "{} language codes not found in file name, using {}",
            "Warning:".yellow(),
            outcome.single.display()
        );
    }
    eprintln!(
        "{} {} page(s) merged ({:?}), {} watermark block(s) removed",
        "Done!".green().bold(),
        outcome.compose.pages,
        outcome.compose.orientation,
        outcome.redaction.blocks_removed
    );
    println!("Single: {}", file_name(&outcome.single));
    println!("Merged: {}", file_name(&outcome.merged));
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn cmd_batch(manifest: &Path, threads: usize, pipeline: &PipelineArgs, json: bool) -> CmdResult {
    let options = pipeline.options()?;
    let data = fs::read_to_string(manifest)?;
    let jobs: Vec<Job> = serde_json::from_str(&data)
        .map_err(|e| format!("Invalid manifest {}: {}", manifest.display(), e))?;

    let overall = ProgressBar::new((jobs.len() * Stage::ALL.len()) as u64);
    overall.set_style(stage_style());
    overall.set_message(format!("{} jobs", jobs.len()));
    let observer = |job: &Job, stage: Stage| {
        overall.set_message(format!("{}: {}", file_name(&job.translated), stage));
        overall.inc(1);
    };

    let results = process_batch_observed(&jobs, &options, threads, &observer);
    overall.finish_and_clear();

    let mut failed = 0;
    let mut reports = Vec::new();
    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(outcome) => {
                if !json {
                    println!("{} {}", "✓".green(), job.translated.display());
                    println!("  Single: {}", file_name(&outcome.single));
                    println!("  Merged: {}", file_name(&outcome.merged));
                }
                reports.push(serde_json::json!({ "job": job, "outcome": outcome }));
            }
            Err(e) => {
                failed += 1;
                if !json {
                    println!("{} {}: {}", "✗".red(), job.translated.display(), e);
                }
                reports.push(serde_json::json!({ "job": job, "error": e.to_string() }));
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!(
            "\n{} {} succeeded, {} failed",
            "Batch:".cyan().bold(),
            jobs.len() - failed,
            failed
        );
    }

    if failed > 0 {
        return Err(format!("{} of {} jobs failed", failed, jobs.len()).into());
    }
    Ok(())
}

fn cmd_info(input: &Path, blocks: bool) -> CmdResult {
    let header = pdfmend::check_input(input)?;
    let doc = PdfDocument::open(input)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), header);
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!(
        "{}: {}",
        "Encrypted".bold(),
        if doc.inner().is_encrypted() { "Yes" } else { "No" }
    );

    println!();
    println!("{}", "Page Geometry".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    for page in doc.pages() {
        let g = &page.geometry;
        let flag = if page.is_problematic() {
            "needs normalization".yellow()
        } else {
            "ok".green()
        };
        println!(
            "{} {}: {}x{} rotate {} [{}]",
            "Page".bold(),
            page.index + 1,
            pdfmend::model::fmt_num(page.width()),
            pdfmend::model::fmt_num(page.height()),
            g.rotation.degrees(),
            flag
        );
        if g.crop_box != g.media_box {
            println!(
                "  {} media {} crop {}",
                "├─".dimmed(),
                g.media_box,
                g.crop_box
            );
        }

        if blocks {
            match doc.text_blocks(page.index) {
                Ok(found) => {
                    for block in found {
                        println!(
                            "  {} ({}, {}) {}",
                            "└─".dimmed(),
                            pdfmend::model::fmt_num(block.rect.x0),
                            pdfmend::model::fmt_num(block.rect.y1),
                            block.text.replace('\n', " / ")
                        );
                    }
                }
                Err(e) => println!("  {} {}", "└─".dimmed(), e.to_string().red()),
            }
        }
    }

    Ok(())
}

fn cmd_names(translated: &Path, original: &Path, lang: &str) {
    let resolution = resolve_languages(translated, original, lang);
    let names = resolution.names();
    let kind = if resolution.is_fallback() {
        "fallback".yellow()
    } else {
        "parsed".green()
    };

    println!("{}: {}", "Resolution".bold(), kind);
    println!("{}: {}", "Stem".bold(), names.stem);
    println!("{}: {} -> {}", "Languages".bold(), names.src, names.dst);
    println!("Single: {}", names.single_name());
    println!("Merged: {}", names.merged_name());
}

fn cmd_version() {
    println!("{} {}", "pdfmend".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Repair and compare machine-translated PDFs");
    println!();
    println!("License: MIT");
}
