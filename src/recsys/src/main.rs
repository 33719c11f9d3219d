//! Recsys demo runner: loads configuration and a JSON fixture of products
//! and behaviors into the in-memory store, runs one recommendation request
//! and prints the response as JSON.

use clap::Parser;
use recsys_core::config::AppConfig;
use recsys_core::types::{Product, UserBehavior};
use recsys_core::InMemoryStore;
use recsys_engine::{RecommendationAlgorithm, RecommendationEngine, RecommendationRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "recsys")]
#[command(about = "Hybrid product recommendation engine demo runner")]
#[command(version)]
struct Cli {
    /// Optional TOML config file (environment `RECSYS__*` overrides it)
    #[arg(long, env = "RECSYS_CONFIG")]
    config: Option<String>,

    /// JSON fixture with `products` and `behaviors` arrays
    #[arg(long, default_value = "demos/fixture.json")]
    fixtures: String,

    /// User to recommend for
    #[arg(long)]
    user: String,

    /// Target product (similar-items mode)
    #[arg(long)]
    product: Option<String>,

    /// Restrict results to one category
    #[arg(long)]
    category: Option<String>,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// hybrid, collaborative, item_based, content_based, popular or trending
    #[arg(long)]
    algorithm: Option<String>,

    /// Run the item-based precompute before serving
    #[arg(long, default_value_t = false)]
    precompute: bool,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    behaviors: Vec<UserBehavior>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recsys=info,recsys_engine=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    let raw = std::fs::read_to_string(&cli.fixtures)?;
    let fixture: Fixture = serde_json::from_str(&raw)?;

    let store = Arc::new(InMemoryStore::new());
    for product in fixture.products {
        store.insert_product(product);
    }
    let behavior_count = fixture.behaviors.len();
    for behavior in fixture.behaviors {
        store.insert_behavior(behavior);
    }
    info!(
        products = store.product_count(),
        behaviors = behavior_count,
        "Fixture loaded"
    );

    let engine = RecommendationEngine::new(config.recommendation, store.clone(), store);
    if cli.precompute {
        engine.precompute_item_similarities().await?;
    }

    let mut request = RecommendationRequest::new(cli.user, cli.limit);
    if let Some(product) = cli.product {
        request = request.with_product(product);
    }
    if let Some(category) = cli.category {
        request = request.with_category(category);
    }
    if let Some(algorithm) = cli.algorithm {
        request = request.with_algorithm(algorithm.parse::<RecommendationAlgorithm>()?);
    }

    let response = engine.get_recommendations(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
