use adcore::ScoringWeights;
use anyhow::Result;
use clap::Parser;
use server::events::run_event_log;
use server::{build_app, build_state, spawn_index_refresh, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Line-item feed to load at startup (file or directory)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Base URL winners' serve URLs are built from
    #[arg(long, default_value = adcore::ranking::DEFAULT_SERVE_BASE_URL)]
    serve_base_url: String,
    /// Winners returned when a request gives no limit
    #[arg(long, default_value_t = 4)]
    default_limit: usize,
    #[arg(long, default_value_t = 5.0)]
    keyword_weight: f64,
    #[arg(long, default_value_t = 5.0)]
    category_weight: f64,
    /// Bonus once every tag of an item matched
    #[arg(long, default_value_t = 5.0)]
    param_weight: f64,
    /// Bonus for the highest bidder among candidates
    #[arg(long, default_value_t = 6.0)]
    bid_weight: f64,
    /// Rebuild the index from the catalog every N seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    refresh_secs: u64,
    /// Tracking events buffered before requests are refused
    #[arg(long, default_value_t = 1024)]
    event_buffer: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = ServerConfig {
        catalog_path: args.catalog,
        serve_base_url: args.serve_base_url,
        default_limit: args.default_limit,
        weights: ScoringWeights {
            keyword: args.keyword_weight,
            category: args.category_weight,
            param: args.param_weight,
            bid: args.bid_weight,
        },
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
        event_buffer: args.event_buffer,
    };
    let (state, events_rx) = build_state(config)?;
    tokio::spawn(run_event_log(events_rx));
    if args.refresh_secs > 0 {
        spawn_index_refresh(state.clone(), Duration::from_secs(args.refresh_secs));
    }

    let app = build_app(state);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
