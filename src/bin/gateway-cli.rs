use clap::{Parser, Subcommand};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway health
    Health,
    /// Show version and route table
    Info,
    /// Mint an HS256 token for testing protected routes
    Token {
        /// Signing secret; falls back to GATEWAY_JWT_SECRET
        #[arg(long, env = "GATEWAY_JWT_SECRET")]
        secret: String,
        #[arg(long)]
        subject: String,
        /// Lifetime in seconds; 0 omits the exp claim
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/actuator/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Info => {
            let res = client.get(format!("{}/actuator/info", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Token { secret, subject, ttl_secs } => {
            let now = chrono::Utc::now().timestamp();
            let mut claims = json!({ "sub": subject, "iat": now });
            if ttl_secs > 0 {
                claims["exp"] = json!(now + ttl_secs);
            }
            let token = encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(secret.as_bytes()),
            )?;
            println!("{}", token);
        }
    }

    Ok(())
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
