use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use edge_gateway::auth::token::{now_secs, sign};
use edge_gateway::auth::Claims;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the edge gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a signed development token
    Token {
        #[arg(long, env = "GATEWAY_JWT_SECRET")]
        secret: String,
        #[arg(long)]
        sub: String,
        #[arg(long)]
        username: Option<String>,
        /// Comma-separated roles
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,
    },
    /// Check gateway status
    Status,
    /// List circuit breaker states
    Breakers,
    /// Show rate limiter classes and bucket count
    RateLimits,
    /// List registered services
    Services,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = match cli.command {
        Commands::Token {
            secret,
            sub,
            username,
            roles,
            ttl,
        } => {
            let now = now_secs();
            let mut claims = Claims::new(sub, now + ttl).with_roles(roles).issued_at(now);
            if let Some(username) = username {
                claims = claims.with_username(username);
            }
            println!("{}", sign(&claims, secret.as_bytes())?);
            return Ok(());
        }
        Commands::Status => "status",
        Commands::Breakers => "breakers",
        Commands::RateLimits => "rate-limits",
        Commands::Services => "services",
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = reqwest::Client::new()
        .get(format!("{}/admin/{}", cli.url, path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if res.status().is_success() {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        eprintln!("Error: {} - {}", res.status(), res.text().await?);
    }
    Ok(())
}
