use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";

#[derive(Parser)]
#[command(name = "imds-cli")]
#[command(about = "IMDSv2-aware client for a running metadata mock", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:1338")]
    url: Url,

    /// TTL requested for the session token
    #[arg(short, long, default_value_t = 21600)]
    ttl: u64,

    /// Skip the token request (IMDSv1)
    #[arg(long)]
    v1: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a metadata path, e.g. latest/meta-data/instance-id
    Get { path: String },
    /// Request a session token and print it
    Token,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;

    match cli.command {
        Commands::Token => {
            let token = fetch_token(&client, &cli.url, cli.ttl).await?;
            println!("{}", token);
        }
        Commands::Get { path } => {
            let mut headers = HeaderMap::new();
            if !cli.v1 {
                let token = fetch_token(&client, &cli.url, cli.ttl).await?;
                headers.insert(TOKEN_HEADER, HeaderValue::from_str(&token)?);
            }

            let url = cli.url.join(path.trim_start_matches('/'))?;
            let res = client.get(url).headers(headers).send().await?;
            let status = res.status();
            let body = res.text().await?;
            if !status.is_success() {
                eprintln!("Error: metadata service returned status {}", status);
                std::process::exit(1);
            }
            println!("{}", body);
        }
    }

    Ok(())
}

async fn fetch_token(
    client: &reqwest::Client,
    base: &Url,
    ttl: u64,
) -> Result<String, Box<dyn std::error::Error>> {
    let res = client
        .put(base.join("latest/api/token")?)
        .header(TOKEN_TTL_HEADER, ttl.to_string())
        .send()
        .await?;
    let status = res.status();
    if !status.is_success() {
        return Err(format!("token request returned status {}", status).into());
    }
    Ok(res.text().await?)
}
