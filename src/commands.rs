//! CLI command implementations.
//!
//! Each `run_*` function backs one `ragbox` subcommand and prints its
//! human-readable result to stdout. Logs go to stderr via `tracing`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::context::RagContext;
use crate::extract::Extractor;
use crate::models::{filename_of, ordinal_of, IngestionReport, Metadata};
use crate::store::{IndexBackend, SqliteBackend};
use crate::uploads::{list_uploads, read_upload};

/// Create the store schema and the upload sandbox.
pub async fn run_init(config: &Config) -> Result<()> {
    let backend = SqliteBackend::new(&config.store.path);
    backend.init().await?;
    std::fs::create_dir_all(&config.uploads.dir).with_context(|| {
        format!(
            "failed to create upload directory {}",
            config.uploads.dir.display()
        )
    })?;
    println!("initialized");
    println!("  store: {}", backend.db_path().display());
    println!("  uploads: {}", config.uploads.dir.display());
    Ok(())
}

/// Stage and ingest each file. Ends with `ok` only when at least one chunk
/// was indexed; documents without text are reported, not treated as failures.
pub async fn run_ingest(
    ctx: &RagContext,
    files: &[PathBuf],
    collection: Option<String>,
    name: Option<String>,
) -> Result<()> {
    if name.is_some() && files.len() > 1 {
        bail!("--name can only be used with a single file");
    }
    let collection = collection.unwrap_or_else(|| ctx.config.retrieval.default_collection.clone());

    let mut total_chunks = 0usize;
    for path in files {
        let declared = match &name {
            Some(name) => name.clone(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let report = ctx
            .pipeline
            .ingest_upload(&ctx.config.uploads.dir, &declared, file, &collection)
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        print_report(&report);
        total_chunks += report.chunks;
    }

    println!("total chunks: {}", total_chunks);
    if total_chunks > 0 {
        println!("ok");
    } else {
        println!("nothing indexed");
    }
    Ok(())
}

fn print_report(report: &IngestionReport) {
    let extraction = &report.extraction;
    println!("ingest {}", report.filename);
    if let Some(saved_as) = &report.saved_as {
        println!("  saved as: {}", saved_as);
    }
    println!("  bytes: {}", report.bytes);
    println!("  collection: {}", report.collection);
    println!(
        "  extension: {}",
        if extraction.ext.is_empty() { "(none)" } else { extraction.ext.as_str() }
    );
    println!("  engine: {}", extraction.engine);
    if let Some(pages) = extraction.pages {
        println!("  pages: {}", pages);
    }
    if let Some(encoding) = &extraction.encoding {
        println!("  encoding: {}", encoding);
    }
    if !extraction.note.is_empty() {
        println!("  note: {}", extraction.note);
    }
    println!("  chars extracted: {}", report.chars_extracted);
    println!("  chunks: {}", report.chunks);
    if let Some(diagnostic) = &report.diagnostic {
        println!("  diagnostic: {}", diagnostic);
    }
    if !report.preview.is_empty() {
        println!("  preview: \"{}\"", report.preview.replace('\n', " "));
    }
}

fn source_label(metadata: &Metadata) -> String {
    match filename_of(metadata) {
        Some(name) => format!("{} #{}", name, ordinal_of(metadata)),
        None => "(no filename)".to_string(),
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let mut chars = flat.chars();
    let head: String = chars.by_ref().take(240).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim())
    } else {
        head.trim().to_string()
    }
}

pub async fn run_query(
    ctx: &RagContext,
    text: &str,
    collection: Option<String>,
    k: Option<usize>,
) -> Result<()> {
    let result = ctx.query.search(text, collection.as_deref(), k).await?;
    if result.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in result.hits.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.distance, source_label(&hit.metadata));
        println!("    excerpt: \"{}\"", excerpt(&hit.text));
        println!("    id: {}", hit.id);
        println!();
    }
    Ok(())
}

pub async fn run_recent(ctx: &RagContext, collection: Option<String>, k: Option<usize>) -> Result<()> {
    let chunks = ctx.query.recent(collection.as_deref(), k).await?;
    if chunks.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for chunk in &chunks {
        println!("[{}]", source_label(&chunk.metadata));
        println!("{}", chunk.text);
        println!();
    }
    Ok(())
}

pub async fn run_uploads(config: &Config) -> Result<()> {
    let entries = list_uploads(&config.uploads.dir).await?;
    if entries.is_empty() {
        println!("No uploads.");
        return Ok(());
    }
    for entry in entries {
        let modified = entry
            .modified
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{:>10}  {}  {}", entry.bytes, modified, entry.name);
    }
    Ok(())
}

/// Copy a staged upload to `output`, or to stdout when none is given.
pub async fn run_upload_get(config: &Config, saved_as: &str, output: Option<&Path>) -> Result<()> {
    let bytes = read_upload(&config.uploads.dir, saved_as).await?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Print extraction capabilities, embedding selection and collections.
pub async fn run_diag(ctx: &RagContext) -> Result<()> {
    println!("extraction engines:");
    for cap in ctx.extractor.capabilities() {
        let formats = cap
            .formats
            .iter()
            .map(|f| format!("{:?}", f).to_lowercase())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {:<12} {:<10} {}",
            cap.engine,
            if cap.available { "available" } else { "missing" },
            formats
        );
    }
    if !Extractor::compiled_in("lopdf") {
        println!("  (rebuild with --features pdf for PDF support)");
    }

    println!("embedding:");
    let selection = ctx.store.embeddings();
    match &selection.provider {
        Some(provider) => println!(
            "  active: {} (model {}, {} dims)",
            provider.provider_name(),
            provider.model_name(),
            provider.dims()
        ),
        None => println!("  active: none"),
    }
    for failure in &selection.failures {
        println!("  skipped {}: {}", failure.provider, failure.reason);
    }

    println!("collections:");
    let backend = ctx.store.backend();
    let collections = backend.list_collections().await?;
    if collections.is_empty() {
        println!("  (none)");
    }
    for info in collections {
        let count = backend.count(&info.name).await?;
        println!(
            "  {} ({} records, model {}, {} dims)",
            info.name, count, info.embedding_model, info.dims
        );
    }
    Ok(())
}
