//! Seeder - Writes the dashboard documents into the document store
//!
//! Usage:
//!   # Seed both documents with the built-in data:
//!   cargo run --bin seeder
//!
//!   # Replace one document with the content of a JSON file:
//!   cargo run --bin seeder -- --document phone-cases --from-file phone-cases.json

use aggregator::{logging, DashboardDocument, DocumentPath, DocumentStore, StoreConfig};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "seeder", about = "Seeds dashboard documents into the document store")]
struct Args {
    /// Document to write: main, phone-cases or all
    #[arg(long, default_value = "all")]
    document: String,

    /// JSON file to write instead of the built-in data (single document only)
    #[arg(long)]
    from_file: Option<PathBuf>,

    /// Dry run - validate and print only
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, default_value = "false")]
    verbose: bool,
}

fn targets(document: &str) -> Result<Vec<DashboardDocument>> {
    if document == "all" {
        return Ok(DashboardDocument::ALL.to_vec());
    }
    let doc = document.parse::<DashboardDocument>().map_err(anyhow::Error::msg)?;
    Ok(vec![doc])
}

/// Content to write for each target, in order.
async fn load_documents(
    targets: &[DashboardDocument],
    from_file: Option<&PathBuf>,
) -> Result<Vec<(DashboardDocument, Value)>> {
    let Some(path) = from_file else {
        return targets
            .iter()
            .map(|&doc| -> Result<(DashboardDocument, Value)> {
                let data = doc
                    .default_data()
                    .with_context(|| format!("Built-in data for {} is invalid", doc))?;
                Ok((doc, data))
            })
            .collect();
    };

    let [doc] = targets else {
        anyhow::bail!("--from-file needs a single --document (main or phone-cases)");
    };

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !data.is_object() {
        anyhow::bail!("{} must contain a JSON object", path.display());
    }
    Ok(vec![(*doc, data)])
}

async fn seed(store: &dyn DocumentStore, documents: &[(DashboardDocument, Value)]) -> Result<()> {
    for (doc, data) in documents {
        let path = DocumentPath::dashboard(*doc);
        store
            .put(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path))?;
        info!(%path, backend = store.backend_tag(), "document seeded");
        println!("  ✓ {}", path);
    }
    Ok(())
}

fn describe(data: &Value) -> String {
    let units = data["summary"]["total_units"].as_i64().unwrap_or(0);
    let devices = data["devices_comparison"].as_array().map_or(0, Vec::len);
    format!("{} units, {} devices", units, devices)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.verbose);

    println!("=== Dashboard Seeder ===");
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let targets = targets(&args.document)?;
    let documents = load_documents(&targets, args.from_file.as_ref()).await?;

    for (doc, data) in &documents {
        println!("  {} -> {}", doc, describe(data));
    }

    if args.dry_run {
        println!("\nDry run - nothing written");
        return Ok(());
    }

    let config = StoreConfig::from_env().context("Invalid document store configuration")?;
    let store = config.open().await.context("Failed to open document store")?;
    println!("\nWriting to {} store:", store.backend_tag());

    seed(store.as_ref(), &documents).await?;

    println!("\nSeeded {} document(s)", documents.len());
    Ok(())
}
