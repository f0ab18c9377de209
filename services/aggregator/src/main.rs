//! Aggregator CLI - Turns a sales export into the dashboard document
//!
//! Usage:
//!   # Aggregate an upload and cache it as the active dashboard:
//!   cargo run --bin aggregator -- ingest --file Sales_Jan2026.csv
//!
//!   # Build the phone-case view and publish it to the document store:
//!   cargo run --bin aggregator -- ingest --file sales.csv --phone-cases --publish
//!
//!   # Inspect / reset / export the active dashboard:
//!   cargo run --bin aggregator -- show --json
//!   cargo run --bin aggregator -- clear
//!   cargo run --bin aggregator -- export --list devices --out devices.csv

use aggregator::aggregate::aggregate_run;
use aggregator::cache::ActiveDashboard;
use aggregator::model::ComparisonRow;
use aggregator::{
    logging, period_label, AggregateOptions, AggregateResult, CachedDashboard, DashboardCache,
    DashboardDocument, DocumentPath, StoreConfig,
};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "aggregator", about = "Aggregates sales exports into dashboard documents")]
struct Args {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate a CSV sales export
    Ingest {
        /// Path to the sales export (.csv)
        #[arg(long)]
        file: PathBuf,

        /// Period label (default: taken from the file name)
        #[arg(long)]
        period: Option<String>,

        /// Keep only phone-case product types
        #[arg(long, default_value = "false")]
        phone_cases: bool,

        /// Write the result to the document store
        #[arg(long, default_value = "false")]
        publish: bool,

        /// Don't replace the cached dashboard
        #[arg(long, default_value = "false")]
        no_cache: bool,

        /// Dry run - aggregate and print only
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
    /// Print the active dashboard (cached upload or built-in data)
    Show {
        /// Print the full record as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Forget the cached upload and go back to the built-in data
    Clear,
    /// Write one comparison list of the active dashboard as CSV
    Export {
        #[arg(long, value_enum)]
        list: ComparisonList,

        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ComparisonList {
    ProductTypes,
    Devices,
    DesignParents,
    DesignChildren,
}

impl ComparisonList {
    fn label_column(self) -> &'static str {
        match self {
            ComparisonList::ProductTypes => "product_type",
            ComparisonList::Devices => "device",
            ComparisonList::DesignParents => "design_parent",
            ComparisonList::DesignChildren => "design_child",
        }
    }

    fn rows(self, result: &AggregateResult) -> Vec<&dyn ComparisonRow> {
        fn erase<T: ComparisonRow>(rows: &[T]) -> Vec<&dyn ComparisonRow> {
            rows.iter().map(|r| r as &dyn ComparisonRow).collect()
        }

        match self {
            ComparisonList::ProductTypes => erase(&result.product_types_comparison),
            ComparisonList::Devices => erase(&result.devices_comparison),
            ComparisonList::DesignParents => erase(&result.design_parents_comparison),
            ComparisonList::DesignChildren => erase(&result.design_children_comparison),
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

struct IngestArgs {
    file: PathBuf,
    period: Option<String>,
    phone_cases: bool,
    publish: bool,
    no_cache: bool,
    dry_run: bool,
}

async fn ingest(args: IngestArgs, cache: &DashboardCache) -> Result<()> {
    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .context("Input path has no file name")?
        .to_string();

    if !file_name.ends_with(".csv") {
        anyhow::bail!("Please upload a CSV file (got '{}')", file_name);
    }

    println!("=== Sales Aggregator ===");
    println!("File: {}", args.file.display());
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let raw = fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    println!("Content size: {} bytes", raw.len());
    // Invalid UTF-8 sequences decode to U+FFFD
    let content = String::from_utf8_lossy(&raw);

    let (options, document) = if args.phone_cases {
        (AggregateOptions::phone_cases(), DashboardDocument::PhoneCases)
    } else {
        (AggregateOptions::default(), DashboardDocument::Main)
    };

    let run = aggregate_run(&content, &options)?;
    let date_range = period_label(args.period.as_deref(), &file_name);

    println!("Successfully loaded {} rows", run.stats.rows_read);
    if run.stats.rows_filtered > 0 {
        println!("Filtered out {} non-phone-case rows", run.stats.rows_filtered);
    }
    let unresolved: Vec<String> = run.mapping.unresolved().map(|r| r.to_string()).collect();
    if !unresolved.is_empty() {
        println!("Columns not found: {}", unresolved.join(", "));
    }
    println!();
    print_summary(&run.result, &date_range);

    if args.dry_run {
        println!("\nDry run - nothing cached or published");
        return Ok(());
    }

    if !args.no_cache {
        let record = CachedDashboard::new(run.result.clone(), date_range, Utc::now());
        cache
            .save(&record)
            .await
            .with_context(|| format!("Failed to cache dashboard at {}", cache.path().display()))?;
        println!("\nCached dashboard: {}", cache.path().display());
    }

    if args.publish {
        let store = StoreConfig::from_env()?
            .open()
            .await
            .context("Failed to open document store")?;
        let path = DocumentPath::dashboard(document);
        let data = serde_json::to_value(&run.result)?;
        store
            .put(&path, &data)
            .await
            .with_context(|| format!("Failed to publish {}", path))?;
        info!(%path, backend = store.backend_tag(), "dashboard published");
        println!("Published to {} ({})", path, store.backend_tag());
    }

    Ok(())
}

async fn show(cache: &DashboardCache, json: bool) -> Result<()> {
    let active = cache.active().await.context("Failed to load dashboard")?;

    if json {
        let body = match &active {
            ActiveDashboard::Cached(record) => serde_json::to_string_pretty(record)?,
            ActiveDashboard::Default(result) => serde_json::to_string_pretty(result)?,
        };
        println!("{}", body);
        return Ok(());
    }

    if !active.is_cached() {
        println!("Using default data");
    }
    print_summary(active.aggregate(), active.date_range());
    Ok(())
}

async fn clear(cache: &DashboardCache) -> Result<()> {
    let removed = cache
        .clear()
        .await
        .with_context(|| format!("Failed to clear {}", cache.path().display()))?;
    if removed {
        info!(path = %cache.path().display(), "cached dashboard removed");
    }
    println!("Using default data");
    Ok(())
}

async fn export(cache: &DashboardCache, list: ComparisonList, out: Option<&Path>) -> Result<()> {
    let active = cache.active().await.context("Failed to load dashboard")?;

    let mut buf = Vec::new();
    write_export(list, active.aggregate(), &mut buf)?;

    match out {
        Some(path) => {
            fs::write(path, &buf)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} rows to {}", list.rows(active.aggregate()).len(), path.display());
        }
        None => std::io::stdout().write_all(&buf)?,
    }
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn write_export<W: Write>(list: ComparisonList, result: &AggregateResult, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["rank", list.label_column(), "UK", "US", "total"])?;
    for (i, row) in list.rows(result).into_iter().enumerate() {
        writer.write_record([
            (i + 1).to_string(),
            row.label().to_string(),
            row.uk().to_string(),
            row.us().to_string(),
            row.total().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_summary(result: &AggregateResult, date_range: &str) {
    let s = &result.summary;
    println!("Period: {}", date_range);
    println!("Total units: {}", s.total_units);
    println!("  UK: {} units, GBP {}", s.uk_units, s.uk_sales);
    println!("  US: {} units, USD {}", s.us_units, s.us_sales);
    println!(
        "Unique SKUs: {} | devices: {} | designs: {}",
        s.unique_skus, s.unique_devices, s.unique_designs
    );

    println!("\nTop devices:");
    for (i, row) in result.devices_comparison.iter().take(5).enumerate() {
        println!("  [{}] {} | UK {} | US {} | total {}", i + 1, row.device, row.uk, row.us, row.total);
    }
    if result.devices_comparison.len() > 5 {
        println!("  ... and {} more", result.devices_comparison.len() - 5);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.verbose);

    let cache = DashboardCache::from_env();

    match args.command {
        Command::Ingest {
            file,
            period,
            phone_cases,
            publish,
            no_cache,
            dry_run,
        } => {
            ingest(
                IngestArgs {
                    file,
                    period,
                    phone_cases,
                    publish,
                    no_cache,
                    dry_run,
                },
                &cache,
            )
            .await
        }
        Command::Show { json } => show(&cache, json).await,
        Command::Clear => clear(&cache).await,
        Command::Export { list, out } => export(&cache, list, out.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator::aggregate;

    const SAMPLE: &str = "\
country,units,sales,product_type,device,design_parent,design_child
UK,5,100,HTPCR,iPhone 15,Floral,FL-01
US,3,50,HTPCR,iPhone 15,Floral,FL-02
US,7,70,HC,Galaxy S24,Abstract,AB-01
";

    fn ingest_args(file: PathBuf) -> IngestArgs {
        IngestArgs {
            file,
            period: None,
            phone_cases: false,
            publish: false,
            no_cache: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_export_devices_csv() {
        let result = aggregate(SAMPLE, &AggregateOptions::default()).unwrap();
        let mut buf = Vec::new();
        write_export(ComparisonList::Devices, &result, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "rank,device,UK,US,total\n1,iPhone 15,5,3,8\n2,Galaxy S24,0,7,7\n");
    }

    #[test]
    fn test_export_quotes_labels_with_commas() {
        let csv = "country,units,design_child\nUK,2,\"Red, Blue\"\n";
        let result = aggregate(csv, &AggregateOptions::default()).unwrap();
        let mut buf = Vec::new();
        write_export(ComparisonList::DesignChildren, &result, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "rank,design_child,UK,US,total\n1,\"Red, Blue\",2,0,2\n");
    }

    #[test]
    fn test_comparison_list_label_columns() {
        assert_eq!(ComparisonList::ProductTypes.label_column(), "product_type");
        assert_eq!(ComparisonList::DesignParents.label_column(), "design_parent");
    }

    #[tokio::test]
    async fn test_ingest_caches_with_period_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Sales_Jan2026.csv");
        std::fs::write(&file, SAMPLE).unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));

        ingest(ingest_args(file), &cache).await.unwrap();

        let record = cache.load().await.unwrap().unwrap();
        assert_eq!(record.date_range, "Jan2026");
        assert_eq!(record.aggregate.summary.total_units, 15);
    }

    #[tokio::test]
    async fn test_ingest_accepts_invalid_utf8_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Sales_Feb2026.csv");
        let mut bytes = b"country,units,device\nUK,2,Caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\nUS,3,Plain\n");
        std::fs::write(&file, bytes).unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));

        ingest(ingest_args(file), &cache).await.unwrap();

        let record = cache.load().await.unwrap().unwrap();
        assert_eq!(record.aggregate.summary.uk_units, 2);
        assert_eq!(record.aggregate.summary.us_units, 3);
        assert_eq!(record.aggregate.devices_comparison[1].device, "Caf\u{fffd}");
    }

    #[tokio::test]
    async fn test_ingest_dry_run_leaves_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sales.csv");
        std::fs::write(&file, SAMPLE).unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));

        let mut args = ingest_args(file);
        args.dry_run = true;
        ingest(args, &cache).await.unwrap();

        assert!(cache.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sales.xlsx");
        std::fs::write(&file, SAMPLE).unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));

        let err = ingest(ingest_args(file), &cache).await.unwrap_err();
        assert!(err.to_string().contains("Please upload a CSV file"));
    }

    #[tokio::test]
    async fn test_ingest_malformed_file_keeps_previous_cache() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("Sales_Jan2026.csv");
        let bad = dir.path().join("empty.csv");
        std::fs::write(&good, SAMPLE).unwrap();
        std::fs::write(&bad, "country,units\n").unwrap();
        let cache = DashboardCache::new(dir.path().join("dashboardData.json"));

        ingest(ingest_args(good), &cache).await.unwrap();
        let err = ingest(ingest_args(bad), &cache).await.unwrap_err();
        assert!(err.to_string().starts_with("Error parsing CSV"));

        let record = cache.load().await.unwrap().unwrap();
        assert_eq!(record.date_range, "Jan2026");
    }
}
