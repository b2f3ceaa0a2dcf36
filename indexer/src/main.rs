use adcore::feed::{load_into_catalog, save_records, FeedRecord};
use adcore::{AdQuery, IndexHandle, InMemoryCatalog, ItemCreate, RankingEngine, ScoringWeights, Winner};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect the ad targeting index offline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the demo line-item catalog as JSONL
    Seed {
        /// Output feed file
        #[arg(long, default_value = "./sample_data/line_items.jsonl")]
        output: PathBuf,
    },
    /// Build the index from feed files and print its statistics
    Stats {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
    },
    /// Build the index and run one ranking query against it
    Rank {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        placement: String,
        #[arg(long, default_value = "")]
        keyword: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value_t = 4)]
        limit: usize,
        #[arg(long, default_value_t = 5.0)]
        keyword_weight: f64,
        #[arg(long, default_value_t = 5.0)]
        category_weight: f64,
        #[arg(long, default_value_t = 5.0)]
        param_weight: f64,
        #[arg(long, default_value_t = 6.0)]
        bid_weight: f64,
    },
}

#[derive(Serialize)]
struct RankOutput<'a> {
    epoch: u64,
    query: &'a AdQuery,
    winners: Vec<Winner>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Seed { output } => seed(&output),
        Commands::Stats { input } => {
            let (_, handle) = load(&input)?;
            let stats = handle.current().stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Rank { input, placement, keyword, category, limit, keyword_weight, category_weight, param_weight, bid_weight } => {
            let weights = ScoringWeights { keyword: keyword_weight, category: category_weight, param: param_weight, bid: bid_weight };
            let (catalog, handle) = load(&input)?;
            let index = handle.current();
            let query = AdQuery::new(placement, limit).keyword(keyword).category(category);
            let winners = RankingEngine::new(weights).rank(&index, &catalog, &query);
            let out = RankOutput { epoch: index.epoch(), query: &query, winners };
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
    }
}

fn load(input: &Path) -> Result<(InMemoryCatalog, IndexHandle)> {
    if !input.exists() {
        bail!("input path {} does not exist", input.display());
    }
    let catalog = InMemoryCatalog::new();
    load_into_catalog(&catalog, input)?;
    let handle = IndexHandle::default();
    handle.rebuild(catalog.snapshot());
    Ok((catalog, handle))
}

fn seed(output: &Path) -> Result<()> {
    let records: Vec<FeedRecord> = demo_line_items().into_iter().map(FeedRecord::Create).collect();
    save_records(output, &records)?;
    tracing::info!(count = records.len(), output = %output.display(), "demo catalog written");
    Ok(())
}

fn line_item(name: &str, advertiser_id: &str, bid: f64, budget: f64, placement: &str, categories: &[&str], keywords: &[&str]) -> ItemCreate {
    ItemCreate {
        name: name.into(),
        advertiser_id: advertiser_id.into(),
        bid,
        budget,
        placement: placement.into(),
        categories: categories.iter().map(|s| s.to_string()).collect(),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
    }
}

fn demo_line_items() -> Vec<ItemCreate> {
    vec![
        line_item("Summer Sale Banner", "adv123", 2.5, 3000.0, "homepage_top", &["electronics", "sports"], &["summer", "discount"]),
        line_item("Winter Clearance Promo", "adv456", 3.0, 7000.0, "video_preroll", &["fashion", "beauty"], &["clearance", "deal"]),
        line_item("Travel Deals Campaign", "adv789", 1.8, 5000.0, "article_inline_1", &["travel", "food"], &["exclusive", "trending"]),
        line_item("Gaming Weekend Blast", "adv321", 0.2, 8000.0, "homepage_top", &["gaming", "electronics"], &["sale", "new"]),
        line_item("Home Essentials Discount", "adv654", 2.2, 10000.0, "video_preroll", &["home", "sports"], &["deal", "discount"]),
        line_item("Back to School Deals", "adv111", 3.5, 4000.0, "article_inline_1", &["electronics", "fashion"], &["exclusive", "sale"]),
        line_item("Spring Fashion Promo", "adv222", 1.9, 9000.0, "homepage_top", &["fashion", "beauty"], &["trending", "new"]),
        line_item("Holiday Travel Specials", "adv333", 2.7, 6000.0, "video_preroll", &["travel", "food"], &["deal", "exclusive"]),
        line_item("Fitness Gear Discount", "adv444", 2.3, 3000.0, "article_inline_1", &["sports", "home"], &["discount", "sale"]),
        line_item("Luxury Beauty Sale", "adv555", 4.5, 7000.0, "homepage_top", &["beauty", "fashion"], &["clearance", "exclusive"]),
        line_item("Gadget Madness", "adv666", 3.1, 5000.0, "video_preroll", &["electronics", "gaming"], &["trending", "new"]),
        line_item("Healthy Living Promo", "adv777", 2.6, 8000.0, "article_inline_1", &["food", "home"], &["deal", "sale"]),
        line_item("Weekend Getaway Deals", "adv888", 1.7, 9000.0, "homepage_top", &["travel", "sports"], &["exclusive", "discount"]),
        line_item("Clearance Electronics", "adv999", 3.8, 1000.0, "video_preroll", &["electronics", "home"], &["clearance", "deal"]),
        line_item("Gaming Console Offer", "adv112", 4.0, 6000.0, "article_inline_1", &["gaming", "electronics"], &["new", "sale"]),
        line_item("Cozy Home Sale", "adv113", 2.4, 2000.0, "homepage_top", &["home", "fashion"], &["discount", "exclusive"]),
        line_item("Fashion Week Promo", "adv114", 2.9, 3000.0, "video_preroll", &["fashion", "beauty"], &["trending", "sale"]),
        line_item("Sports Gear Blowout", "adv115", 3.3, 5000.0, "article_inline_1", &["sports", "gaming"], &["deal", "clearance"]),
        line_item("Smart Home Specials", "adv116", 2.1, 7000.0, "homepage_top", &["electronics", "home"], &["exclusive", "new"]),
        line_item("Travel Light Promo", "adv117", 1.5, 4000.0, "video_preroll", &["travel", "fashion"], &["discount", "sale"]),
        line_item("Run of Site Footer", "adv118", 0.8, 2500.0, "footer_banner", &[], &[]),
        line_item("Homepage House Ad", "adv119", 0.5, 1500.0, "homepage_top", &[], &[]),
    ]
}
