use clap::{Parser, Subcommand};
use model_gateway::catalog::Region;
use model_gateway::retrieval::SearchMode;
use model_gateway::routing::QualityPreference;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the model gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:3001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway status and circuit breaker states
    Health,
    /// List the backend catalog
    Models,
    /// Show which backend a request would be routed to (nothing is invoked)
    Route {
        #[arg(short, long)]
        message: String,
        #[arg(short, long, value_enum, default_value_t = QualityPreference::Auto)]
        quality: QualityPreference,
        /// Prefer self-hosted backends
        #[arg(long)]
        local: bool,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Hard cost cap in USD
        #[arg(long)]
        max_cost: Option<f64>,
        /// Restrict to a region
        #[arg(long, value_enum)]
        region: Option<Region>,
    },
    /// Query the retrieval store
    Rag {
        #[arg(short, long)]
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long, value_enum, default_value_t = SearchMode::Hybrid)]
        search_type: SearchMode,
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Models => client.get(format!("{}/models", base)).send().await?,
        Commands::Route {
            message,
            quality,
            local,
            max_tokens,
            max_cost,
            region,
        } => {
            let body = json!({
                "messages": [{ "role": "user", "content": message }],
                "quality": quality,
                "prefer_local": local,
                "max_tokens": max_tokens,
                "max_cost": max_cost,
                "region": region,
            });
            client.post(format!("{}/route", base)).json(&body).send().await?
        }
        Commands::Rag {
            query,
            limit,
            search_type,
            threshold,
        } => {
            let body = json!({
                "query": query,
                "limit": limit,
                "search_type": search_type,
                "threshold": threshold,
            });
            client.post(format!("{}/rag/query", base)).json(&body).send().await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
