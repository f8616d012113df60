use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use review_scraper::apis::google_play::GooglePlayClient;
use review_scraper::cleaner::Cleaner;
use review_scraper::collector::{Collector, CollectorReport};
use review_scraper::config::{self, Config};
use review_scraper::constants;
use review_scraper::logging;
use review_scraper::types::{BankTarget, FetchParams};

#[derive(Parser)]
#[command(name = "review_scraper")]
#[command(about = "Google Play review scraper and preprocessor for banking apps")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct CollectorArgs {
    /// Reviews to request per bank
    #[arg(long, default_value_t = 450)]
    count: usize,
    /// Review language filter
    #[arg(long, default_value = "en")]
    lang: String,
    /// Marketplace country (two-letter code)
    #[arg(long, default_value = "us")]
    country: String,
    /// Raw CSV output path
    #[arg(long, default_value = constants::DEFAULT_RAW_OUTPUT)]
    output: PathBuf,
    /// JSON file mapping bank names to Play Store app ids
    #[arg(long)]
    banks_file: Option<PathBuf>,
    /// Minimum unique reviews expected per bank
    #[arg(long, default_value_t = 400)]
    min_per_bank: usize,
}

#[derive(clap::Args, Clone)]
struct CleanerArgs {
    /// Clean CSV output path
    #[arg(long, default_value = constants::DEFAULT_CLEAN_OUTPUT)]
    output: PathBuf,
    /// Minimum reviews expected per bank post-cleaning
    #[arg(long, default_value_t = 400)]
    min_per_bank: usize,
    /// Warn when any column exceeds this missing percentage
    #[arg(long, default_value_t = 5.0)]
    max_missing_pct: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape reviews for each configured bank and write the raw CSV
    Collector {
        #[command(flatten)]
        args: CollectorArgs,
    },
    /// Clean a raw review CSV: normalize, dedupe, report data quality
    Cleaner {
        /// Raw CSV input path
        #[arg(long, default_value = constants::DEFAULT_RAW_OUTPUT)]
        input: PathBuf,
        #[command(flatten)]
        args: CleanerArgs,
    },
    /// Run collector then cleaner sequentially
    Run {
        #[command(flatten)]
        collector: CollectorArgs,
        /// Clean CSV output path
        #[arg(long, default_value = constants::DEFAULT_CLEAN_OUTPUT)]
        clean_output: PathBuf,
        /// Warn when any column exceeds this missing percentage
        #[arg(long, default_value_t = 5.0)]
        max_missing_pct: f64,
    },
    /// Search the Play Store for candidate app ids for a bank
    FindApps {
        /// Search query, e.g. "Dashen Bank"
        #[arg(long)]
        query: String,
        /// Maximum candidates to keep
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output JSON path (defaults to data/<query>_apps.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_targets(banks_file: Option<&Path>) -> Result<Vec<BankTarget>, Box<dyn std::error::Error>> {
    match banks_file {
        Some(path) => Ok(config::load_bank_targets(path)?),
        None => Ok(config::default_bank_targets()),
    }
}

async fn run_collector(
    config: &Config,
    args: &CollectorArgs,
) -> Result<CollectorReport, Box<dyn std::error::Error>> {
    let targets = load_targets(args.banks_file.as_deref())?;
    let params = FetchParams {
        lang: args.lang.clone(),
        country: args.country.clone(),
        count: args.count,
    };

    println!("🔄 Running collector for {} targets...", targets.len());
    let api = GooglePlayClient::new(config.google_play.clone())?;
    let collector = Collector::new(Box::new(api), config.google_play.delay_ms);
    let report = collector
        .run(&targets, &params, args.min_per_bank, &args.output)
        .await?;

    println!("\n📊 Collector results:");
    println!("   Total fetched: {}", report.total_fetched);
    println!("   Unique records: {}", report.unique_records);
    println!("   Duplicates dropped: {}", report.duplicates_dropped);
    for (bank, count) in &report.per_bank {
        println!("   {}: {} reviews", bank, count);
    }
    println!("   Output file: {}", report.output_file);

    if !report.shortfalls.is_empty() {
        println!("\n⚠️  Targets below the minimum of {}:", args.min_per_bank);
        for shortfall in &report.shortfalls {
            println!(
                "   - {}: {} unique reviews",
                shortfall.bank, shortfall.unique_reviews
            );
        }
    }
    Ok(report)
}

fn run_cleaner(input: &Path, args: &CleanerArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧹 Running cleaner on {}...", input.display());
    let cleaner = Cleaner::new(args.min_per_bank, args.max_missing_pct);
    let report = cleaner.run(input, &args.output)?;

    println!("\n📊 Cleaner results:");
    println!("   Rows in: {}", report.rows_in);
    println!("   Rows out: {}", report.rows_out);
    println!("   Empty-text rows dropped: {}", report.empty_text_dropped);
    println!("   Duplicate rows dropped: {}", report.duplicates_dropped);
    for (bank, count) in &report.per_bank {
        println!("   {}: {} reviews", bank, count);
    }
    println!("   Output file: {}", report.output_file);
    Ok(())
}

async fn run_find_apps(
    config: &Config,
    query: &str,
    limit: usize,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let api = GooglePlayClient::new(config.google_play.clone())?;
    let candidates = api.search_apps(query, "en", "us", limit).await?;
    let found = candidates.len();

    let out_path = output.unwrap_or_else(|| {
        PathBuf::from("data").join(format!("{}_apps.json", query.replace(' ', "_")))
    });
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let document = serde_json::json!({ "query": query, "candidates": candidates });
    fs::write(&out_path, serde_json::to_string_pretty(&document)?)?;
    println!("✅ Wrote {} candidates to {}", found, out_path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Collector { args } => {
            let report = run_collector(&config, &args).await?;
            if report.all_targets_short() {
                error!("No target reached the minimum review count");
                return Err("no target reached the minimum review count".into());
            }
        }
        Commands::Cleaner { input, args } => {
            run_cleaner(&input, &args)?;
        }
        Commands::Run {
            collector,
            clean_output,
            max_missing_pct,
        } => {
            println!("🚀 Running full pipeline (collector + cleaner)...\n");
            let report = run_collector(&config, &collector).await?;
            if report.all_targets_short() {
                error!("No target reached the minimum review count");
                return Err("no target reached the minimum review count".into());
            }
            let cleaner = CleanerArgs {
                output: clean_output,
                min_per_bank: collector.min_per_bank,
                max_missing_pct,
            };
            println!();
            run_cleaner(&collector.output, &cleaner)?;
            info!("Full pipeline completed");
            println!("\n✅ Full pipeline completed");
        }
        Commands::FindApps {
            query,
            limit,
            output,
        } => {
            run_find_apps(&config, &query, limit, output).await?;
        }
    }
    Ok(())
}
