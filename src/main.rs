mod config;
mod fetch;
mod gemini;
mod report;
mod research;
mod search;
mod settings;
mod status;

pub const USER_AGENT: &str = concat!("quarry/", env!("CARGO_PKG_VERSION"));

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use reqwest::Client;
use tracing::{info, warn};

use config::Config;
use fetch::HttpFetcher;
use gemini::GeminiClient;
use report::render::{ViewMode, render};
use research::{ResearchError, ResearchRequest};
use search::{ProviderClient, SearchProvider, SerperClient, TavilyClient};
use settings::{SearchSettings, SourceType, TimeRange, default_source_types};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 5;

#[derive(Parser)]
#[command(name = "quarry", version, about = "Web research with structured AI summaries")]
struct Cli {
    /// Debug logging for quarry on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search, extract, and summarize a topic
    Research(ResearchArgs),
    /// Check which search and model APIs respond
    Status,
}

#[derive(Args)]
struct ResearchArgs {
    query: String,

    /// Primary search provider; the other one is the fallback
    #[arg(long, value_enum, default_value_t = SearchProvider::Serper)]
    api: SearchProvider,

    /// Results to request (5-20) [default: MAX_SEARCH_RESULTS or 10]
    #[arg(long)]
    max_results: Option<u8>,

    #[arg(long, value_enum, default_value_t = TimeRange::Month)]
    time_range: TimeRange,

    /// Pages to fetch in full (1-5) [default: DEFAULT_SEARCH_DEPTH or 3]
    #[arg(long)]
    depth: Option<u8>,

    /// Preferred source types [default: news,academic]
    #[arg(long, value_enum, value_delimiter = ',')]
    sources: Vec<SourceType>,

    #[arg(long, value_enum, default_value_t = ViewMode::Dashboard)]
    view: ViewMode,

    /// Use search snippets only, without fetching pages
    #[arg(long)]
    no_fetch: bool,

    /// Fail instead of producing an offline report when every provider fails
    #[arg(long, conflicts_with = "offline")]
    strict: bool,

    /// Skip search and produce an offline report
    #[arg(long)]
    offline: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "quarry=debug" } else { "quarry=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(config.request_timeout)
        .redirect(fetch::redirect_policy(MAX_REDIRECTS))
        .build()?;

    match cli.command {
        Command::Research(args) => run_research(&config, http, args).await,
        Command::Status => run_status(&config, http).await,
    }
}

async fn run_research(
    config: &Config,
    http: Client,
    args: ResearchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if !args.offline && !config.has_search_key() {
        return Err(ResearchError::NoProviderConfigured.into());
    }

    let clients = search_clients(config, &http);
    let gemini = gemini_client(config, &http);
    if gemini.is_none() {
        warn!("GEMINI_API_KEY not set, reports will use basic analysis");
    }
    let fetcher = HttpFetcher::new(http, config.request_timeout);

    let settings = SearchSettings {
        search_api: args.api,
        max_results: args.max_results.unwrap_or(config.max_search_results),
        time_range: args.time_range,
        depth: args.depth.unwrap_or(config.default_search_depth),
        sources: if args.sources.is_empty() {
            default_source_types()
        } else {
            args.sources
        },
    };

    let result = research::conduct(
        &clients,
        gemini.as_ref(),
        &fetcher,
        ResearchRequest {
            query: &args.query,
            settings,
            fetch_pages: !args.no_fetch,
            allow_offline: !args.strict,
            force_offline: args.offline,
        },
    )
    .await?;

    let rendered = render(&result, args.view)?;
    match args.output {
        Some(path) => {
            tokio::fs::write(&path, rendered).await?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn run_status(config: &Config, http: Client) -> Result<(), Box<dyn std::error::Error>> {
    let clients = search_clients(config, &http);
    let gemini = gemini_client(config, &http);

    let mut statuses = status::probe_search(&clients).await;
    statuses.push(status::probe_gemini(gemini.as_ref()).await);
    print!("{}", status::format_status(&statuses));
    Ok(())
}

fn search_clients(config: &Config, http: &Client) -> Vec<ProviderClient> {
    let mut clients = Vec::new();
    if let Some(key) = &config.serper_api_key {
        clients.push(ProviderClient::Serper(SerperClient::new(http.clone(), key.clone())));
    }
    if let Some(key) = &config.tavily_api_key {
        clients.push(ProviderClient::Tavily(TavilyClient::new(http.clone(), key.clone())));
    }
    clients
}

fn gemini_client(config: &Config, http: &Client) -> Option<GeminiClient> {
    config.gemini_api_key.as_ref().map(|key| {
        GeminiClient::new(
            http.clone(),
            key.clone(),
            &config.gemini_model,
            config.request_timeout,
        )
    })
}
