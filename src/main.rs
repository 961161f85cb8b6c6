mod blocks;
mod config;
mod error;
mod export;
mod parser;
mod source;
mod store;
mod supabase;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::SourceError;
use crate::parser::DocumentResult;
use crate::source::SourceDocument;

const DOCUMENT_CHUNK: usize = 32;

#[derive(Parser)]
#[command(
    name = "control_states",
    about = "Extract NABCA control-states sales, category and commentary data from analysed reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract documents, write JSON, store in SQLite and optionally upload
    Run {
        /// Months to process as YYYY-MM (default: every document found)
        #[arg(value_parser = source::parse_month_arg)]
        months: Vec<(i32, u32)>,
        /// Directory holding analysis dumps
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Directory for the JSON export
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Skip the SQLite store
        #[arg(long)]
        no_store: bool,
        /// Upload to Supabase after extraction
        #[arg(long)]
        upload: bool,
    },
    /// List input documents and their derived months
    List {
        /// Directory holding analysis dumps
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Show per-month record counts from the SQLite store
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(settings_loaded = ?settings, msg = "Starting control states pipeline");

    let result = match cli.command {
        Commands::Run {
            months,
            input,
            output_dir,
            no_store,
            upload,
        } => {
            let input = input.unwrap_or_else(|| settings.input_dir.clone());
            let output_dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
            let targets: Option<HashSet<(i32, u32)>> =
                (!months.is_empty()).then(|| months.into_iter().collect());

            let docs = source::list_documents(&input, targets.as_ref())?;
            if docs.is_empty() {
                println!("No documents found in {:?} for the requested months.", input);
                print_documents(&source::list_documents(&input, None)?);
                bail!("Nothing to process");
            }

            println!("Processing {} documents...", docs.len());
            let (results, failures) = process_documents(&docs);
            for (name, e) in &failures {
                warn!("{}: {}", name, e);
            }

            ensure_extracted(&results, failures.len())?;
            let sales: usize = results.iter().map(|r| r.sales.len()).sum();
            let brands: usize = results.iter().map(|r| r.brands.len()).sum();
            let commentary = results.iter().filter(|r| r.commentary.is_some()).count();
            println!(
                "Total records: {} sales, {} brand/category, {} commentary",
                sales, brands, commentary
            );

            export::write_json(&output_dir, &results)?;

            if no_store {
                println!("--no-store set, skipping SQLite.");
            } else {
                let conn = store::connect(&settings.db_path)?;
                store::init_schema(&conn)?;
                let saved = store::replace_months(&conn, &results)?;
                println!(
                    "Stored {} months: {} sales, {} brand/category, {} commentary rows in {:?}",
                    saved.months, saved.sales, saved.brands, saved.commentary, settings.db_path
                );
            }

            if upload {
                let uploader = supabase::Uploader::from_settings(&settings)?;
                println!("Uploading to Supabase...");
                let counts = uploader.upload(&results).await;
                println!("Uploaded {} rows, {} failed.", counts.uploaded, counts.failed);
            }

            print_summary(&results, &failures);
            Ok(())
        }
        Commands::List { input } => {
            let input = input.unwrap_or_else(|| settings.input_dir.clone());
            let docs = source::list_documents(&input, None)?;
            if docs.is_empty() {
                println!("No documents in {:?}.", input);
                return Ok(());
            }
            print_documents(&docs);
            Ok(())
        }
        Commands::Stats => {
            let conn = store::connect(&settings.db_path)?;
            store::init_schema(&conn)?;
            let stats = store::month_stats(&conn)?;
            if stats.is_empty() {
                println!("No data stored. Run 'run' first.");
                return Ok(());
            }
            println!("{:<8} | {:>6} | {:>6} | {:>10}", "Month", "Sales", "Brands", "Commentary");
            println!("{}", "-".repeat(40));
            for s in &stats {
                println!(
                    "{}-{:02} | {:>6} | {:>6} | {:>10}",
                    s.year, s.month, s.sales, s.brands, s.commentary
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn extract(doc: &SourceDocument) -> Result<DocumentResult, SourceError> {
    let key = doc.key.ok_or_else(|| SourceError::Undated(doc.name.clone()))?;
    let blocks = source::load_blocks(&doc.path)?;
    Ok(parser::process_document(key, &doc.name, &blocks))
}

/// Extract every document in parallel. A failing document is reported
/// by name and never stops the others.
fn process_documents(docs: &[SourceDocument]) -> (Vec<DocumentResult>, Vec<(String, SourceError)>) {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(docs.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for chunk in docs.chunks(DOCUMENT_CHUNK) {
        let extracted: Vec<_> = chunk.par_iter().map(extract).collect();
        for (doc, outcome) in chunk.iter().zip(extracted) {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => failures.push((doc.name.clone(), e)),
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    (results, failures)
}

/// A run with no successfully extracted document has nothing to write.
/// Documents that succeed without records still count.
fn ensure_extracted(results: &[DocumentResult], failed: usize) -> anyhow::Result<()> {
    if results.is_empty() {
        bail!("No data extracted ({} documents failed)", failed);
    }
    Ok(())
}

fn print_documents(docs: &[SourceDocument]) {
    println!("Available documents:");
    for d in docs {
        let month = d
            .key
            .map(|k| k.label())
            .unwrap_or_else(|| "(could not parse date)".into());
        println!("  {:<40} {}", d.name, month);
    }
}

fn print_summary(results: &[DocumentResult], failures: &[(String, SourceError)]) {
    println!("\n{:<8} | {:<36} | {:>6} | {:>6} | {:<10}", "Month", "Document", "Sales", "Brands", "Commentary");
    println!("{}", "-".repeat(80));
    for r in results {
        println!(
            "{:<8} | {:<36} | {:>6} | {:>6} | {:<10}",
            r.key.label(),
            truncate(&r.name, 36),
            r.sales.len(),
            r.brands.len(),
            if r.commentary.is_some() { "yes" } else { "no" }
        );
    }
    if !failures.is_empty() {
        println!("\n--- Failed ({}) ---", failures.len());
        for (name, e) in failures {
            println!("  {}: {}", name, e);
        }
    }
    println!("\n{} documents extracted, {} failed.", results.len(), failures.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
