//! CLI binary for doc2tex.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use doc2tex::{
    convert_to_dir, CompileState, ConversionConfig, ConversionOutput, MetadataOverrides,
    RunOutcome, TemplateRegistry,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Convert office documents (TXT, DOCX, PDF) to formatted LaTeX/PDF.
#[derive(Parser, Debug)]
#[command(name = "doc2tex", version, about, long_about = None)]
struct Cli {
    /// Input document (.txt, .docx, .pdf)
    #[arg(required_unless_present = "list_templates")]
    input: Option<PathBuf>,

    /// Output project directory
    #[arg(short, long, default_value = "doc2tex-out")]
    out: PathBuf,

    /// Build the PDF with the external compiler after assembly
    #[arg(long)]
    build: bool,

    /// Force a specific template (overrides classification)
    #[arg(short, long)]
    template: Option<String>,

    /// Override the document title / subject
    #[arg(long)]
    title: Option<String>,

    /// Override the document author / signatory
    #[arg(long)]
    author: Option<String>,

    /// Override the issuing department
    #[arg(long)]
    department: Option<String>,

    /// Override the classification label (Public, Restricted, ...)
    #[arg(long)]
    classification: Option<String>,

    /// Override the file number
    #[arg(long)]
    file_no: Option<String>,

    /// Override the document date
    #[arg(long)]
    date: Option<String>,

    /// External LaTeX compiler binary
    #[arg(long, default_value = "pdflatex")]
    compiler: String,

    /// Per-pass compile timeout in seconds
    #[arg(long, default_value_t = 30)]
    compile_timeout: u64,

    /// Remote model for classification/enhancement (needs OPENAI_API_KEY)
    #[arg(long, env = "DOC2TEX_MODEL")]
    model: Option<String>,

    /// Disable the remote content-enhancement tier
    #[arg(long)]
    no_enhance: bool,

    /// List the registered templates and exit
    #[arg(long)]
    list_templates: bool,

    /// Verbose logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list_templates {
        print_templates();
        return Ok(());
    }

    let Some(input) = cli.input.clone() else {
        bail!("an input document is required");
    };
    let config = build_config(&cli)?;

    let spinner = make_spinner();
    spinner.set_message(format!("Converting {}…", input.display()));

    let result = convert_to_dir(&input, &cli.out, &config).await;
    spinner.finish_and_clear();

    let output = result.with_context(|| format!("conversion of '{}' failed", input.display()))?;

    print_summary(&cli, &output);

    if cli.build && output.outcome() == RunOutcome::SourceOnly {
        // Source exists but the PDF does not: exit nonzero so scripts notice.
        bail!("compilation did not produce a PDF (see {}/compile.log)", cli.out.display());
    }
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "doc2tex=info",
        _ => "doc2tex=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .compile(cli.build)
        .compiler(&cli.compiler)
        .compile_timeout_secs(cli.compile_timeout)
        .enhancement(!cli.no_enhance)
        .overrides(MetadataOverrides {
            title: cli.title.clone(),
            author: cli.author.clone(),
            department: cli.department.clone(),
            classification: cli.classification.clone(),
            file_no: cli.file_no.clone(),
            date: cli.date.clone(),
        });

    if let Some(ref template) = cli.template {
        builder = builder.template_override(template);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }

    Ok(builder.build()?)
}

fn make_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_templates() {
    let registry = TemplateRegistry::builtin();
    println!("{}", bold("Registered templates:"));
    for spec in registry.iter() {
        println!(
            "  {}  {}",
            cyan(&format!("{:<24}", spec.id)),
            dim(&format!("{} — {}", spec.name, spec.description))
        );
    }
}

fn print_summary(cli: &Cli, output: &ConversionOutput) {
    let a = &output.analysis;

    println!("{}", bold("Document analysis"));
    println!("  Type        {}", cyan(a.document_type.as_str()));
    println!("  Confidence  {:.2}", a.confidence_score);
    if !a.title.is_empty() {
        println!("  Title       {}", a.title);
    }
    if !a.department.is_empty() {
        println!("  Department  {}", a.department);
    }
    println!("  Template    {}", cyan(&output.bound.template_id));
    println!(
        "  Tier        {}",
        if output.stats.remote_classified {
            "remote"
        } else {
            "rules"
        }
    );
    if output.stats.enhanced {
        println!("  Enhanced    yes");
    }

    println!();
    println!(
        "{} {}",
        green("✓"),
        bold(&format!("LaTeX source: {}/main.tex", cli.out.display()))
    );

    match (&output.compilation, output.outcome()) {
        (Some(c), RunOutcome::Complete) => {
            println!(
                "{} {}",
                green("✓"),
                bold(&format!(
                    "PDF: {}/main.pdf  ({} passes, {} ms)",
                    cli.out.display(),
                    c.passes,
                    c.duration_ms
                ))
            );
        }
        (Some(c), RunOutcome::SourceOnly) => {
            let verdict = match c.state {
                CompileState::TimedOut => yellow("compilation timed out"),
                _ => red("compilation failed"),
            };
            println!("{} {}", red("✗"), verdict);
            // Show the tail of the captured log for a fast diagnosis.
            for line in c.log.lines().rev().take(8).collect::<Vec<_>>().into_iter().rev() {
                println!("    {}", dim(line));
            }
            println!(
                "    {}",
                dim(&format!("full log: {}/compile.log", cli.out.display()))
            );
        }
        (None, _) => {
            println!("{}", dim("  (compilation skipped — pass --build to produce a PDF)"));
        }
    }

    println!(
        "{}",
        dim(&format!(
            "  {} paragraphs · extract {} ms · classify {} ms · total {} ms",
            output.stats.paragraphs,
            output.stats.extract_ms,
            output.stats.classify_ms,
            output.stats.total_ms
        ))
    );
}
