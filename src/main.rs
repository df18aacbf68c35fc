use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kubegraph::collect::AssetCollector;
use kubegraph::config::{load_config, AppConfig};
use kubegraph::error::{KubeGraphError, KubeGraphResult};
use kubegraph::model::asset::AssetKind;
use kubegraph::model::graph::PropertyMap;
use kubegraph::query::QueryService;
use kubegraph::server::run_http_server;
use kubegraph::store::Channel;

/// KubeGraph: Kubernetes asset graph for attack-path analysis
#[derive(Parser)]
#[command(name = "kubegraph")]
#[command(
    about = "Collects Kubernetes assets, infers their relationships, and syncs them into a Neo4j graph."
)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "KUBEGRAPH_CONFIG")]
    config: Option<PathBuf>,
    /// Serve the built-in demo inventory instead of a live cluster
    #[arg(long, global = true)]
    demo: bool,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect assets from the cluster
    Collect {
        /// Only collect one kind (e.g. pods, clusterRoles)
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Collect assets and print the inferred relationships
    Relationships,
    /// Replace the graph with a fresh collection
    Import {
        #[arg(long, default_value = "rest")]
        channel: String,
    },
    /// Delete every node and relationship
    Clear {
        #[arg(long, default_value = "rest")]
        channel: String,
    },
    /// Run a Cypher statement
    Query {
        #[arg(long, default_value = "rest")]
        channel: String,
        #[arg(short, long)]
        statement: String,
        /// Parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },
    /// Find the shortest path between two named assets
    AttackPath {
        #[arg(long, default_value = "rest")]
        channel: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Run the fixed vulnerability pattern
    Vulnerabilities {
        #[arg(long, default_value = "rest")]
        channel: String,
    },
    /// Count nodes per kind and relationships
    Stats {
        #[arg(long, default_value = "rest")]
        channel: String,
    },
    /// Check the cluster and both graph channels
    Health,
    /// Start the HTTP API
    Serve,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kubegraph=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn print_json<T: Serialize>(value: &T) -> KubeGraphResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_params(raw: Option<&str>) -> KubeGraphResult<PropertyMap> {
    match raw {
        None => Ok(PropertyMap::new()),
        Some(raw) => match serde_json::from_str::<serde_json::Value>(raw)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(KubeGraphError::InvalidRequest(
                "--params must be a JSON object".into(),
            )),
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn graph_service(config: &AppConfig) -> Result<QueryService> {
    QueryService::from_config(&config.store).context("Failed to configure graph store")
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.demo {
        config.cluster.demo = true;
    }

    match cli.command {
        Commands::Serve => Ok(run_http_server(config).await?),
        Commands::Collect { kind } => {
            let collector = AssetCollector::from_config(&config.cluster).await?;
            match kind {
                Some(kind) => {
                    let kind: AssetKind = kind.parse()?;
                    print_json(&collector.collect_kind(kind).await)?
                }
                None => print_json(&collector.collect_all_assets().await)?,
            }
            Ok(())
        }
        Commands::Relationships => {
            let collector = AssetCollector::from_config(&config.cluster).await?;
            Ok(print_json(&collector.collect_asset_relationships().await)?)
        }
        Commands::Import { channel } => {
            let channel: Channel = channel.parse()?;
            let collector = AssetCollector::from_config(&config.cluster).await?;
            let service = graph_service(&config)?;
            let snapshot = collector.collect_snapshot().await;
            Ok(print_json(&service.import(channel, &snapshot).await?)?)
        }
        Commands::Clear { channel } => {
            let channel: Channel = channel.parse()?;
            graph_service(&config)?.clear(channel).await?;
            println!("Graph cleared via {} channel", channel);
            Ok(())
        }
        Commands::Query {
            channel,
            statement,
            params,
        } => {
            let channel: Channel = channel.parse()?;
            let params = parse_params(params.as_deref())?;
            let service = graph_service(&config)?;
            Ok(print_json(&service.execute(channel, Some(&statement), params).await?)?)
        }
        Commands::AttackPath { channel, from, to } => {
            let channel: Channel = channel.parse()?;
            let service = graph_service(&config)?;
            let paths = service.shortest_path(channel, Some(&from), Some(&to)).await?;
            if paths.is_empty() {
                println!("No path between '{}' and '{}'", from, to);
                return Ok(());
            }
            for path in &paths {
                println!("{}", path.node_names().join(" -> "));
            }
            Ok(())
        }
        Commands::Vulnerabilities { channel } => {
            let channel: Channel = channel.parse()?;
            let service = graph_service(&config)?;
            Ok(print_json(&service.vulnerabilities(channel).await?)?)
        }
        Commands::Stats { channel } => {
            let channel: Channel = channel.parse()?;
            let service = graph_service(&config)?;
            Ok(print_json(&service.stats(channel).await?)?)
        }
        Commands::Health => {
            let collector = AssetCollector::from_config(&config.cluster).await?;
            let cluster = match collector.health_check().await {
                Ok(()) => "connected".to_string(),
                Err(e) => format!("unreachable: {}", e),
            };
            println!("Cluster ({}): {}", collector.source_name(), cluster);
            let health = graph_service(&config)?.health().await;
            Ok(print_json(&health)?)
        }
    }
}
