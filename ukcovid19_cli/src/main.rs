mod output;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ukcovid19_api::{Cov19Api, Filters, Structure};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "ukcovid19")]
#[command(about = "Query the UK Coronavirus (COVID-19) Dashboard API")]
struct Cli {
    /// Metric filter as KEY=VALUE (repeatable), e.g. areaType=nation
    #[arg(long = "filter", value_name = "KEY=VALUE", global = true)]
    filters: Vec<String>,

    /// Response field as NAME=METRIC (repeatable), e.g. newCases=newCasesByPublishDate
    #[arg(long = "field", value_name = "NAME=METRIC", global = true)]
    fields: Vec<String>,

    /// Aggregate to the latest value of this metric
    #[arg(long, global = true)]
    latest_by: Option<String>,

    /// Override the API endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Abort a fetch that walks more than this many pages
    #[arg(long, global = true)]
    max_pages: Option<u32>,

    /// Output format: table or json
    #[arg(long, default_value = "json", global = true)]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the structured data set
    Get,
    /// Fetch the merged XML document
    Xml,
    /// Print the response headers of the base query
    Headers,
    /// Print the API's self-description document
    Options,
    /// Print when the upstream data was last released
    LastUpdate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ukcovid19=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "table" => OutputFormat::Table,
        _ => OutputFormat::Json,
    };

    let api = build_client(&cli)?;

    match &cli.command {
        Commands::Get => {
            let resp = api.get::<serde_json::Value>().await?;
            match format {
                OutputFormat::Json => output::print_json(&resp)?,
                OutputFormat::Table => output::print_table(&resp),
            }
        }
        Commands::Xml => {
            println!("{}", api.get_xml().await?);
        }
        Commands::Headers => {
            for (name, value) in api.head().await?.iter() {
                println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
        }
        Commands::Options => {
            println!("{}", serde_json::to_string_pretty(&api.options().await?)?);
        }
        Commands::LastUpdate => match api.last_update().await? {
            Some(stamp) => println!("{}", stamp.to_rfc3339()),
            None => println!("unknown"),
        },
    }

    Ok(())
}

fn build_client(cli: &Cli) -> Result<Cov19Api> {
    let mut filters = Filters::new();
    for pair in &cli.filters {
        let (key, value) = split_pair(pair)?;
        filters = filters.add(key, value);
    }

    let mut structure = Structure::new();
    for pair in &cli.fields {
        let (name, metric) = split_pair(pair)?;
        structure = structure.field(name, metric);
    }

    let mut api = Cov19Api::new(filters, structure);
    if let Some(metric) = &cli.latest_by {
        api = api.with_latest_by(metric);
    }
    if let Some(endpoint) = &cli.endpoint {
        api = api.with_endpoint(endpoint);
    }
    if let Some(max_pages) = cli.max_pages {
        api = api.with_max_pages(max_pages);
    }
    Ok(api)
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("expected KEY=VALUE, got '{}'", pair),
    }
}
