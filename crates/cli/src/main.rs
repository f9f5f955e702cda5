use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use nodemap_api::{ComputeClient, Credential};
use nodemap_engine::{InventoryQuery, QueryOrchestrator, load_mapping};
use nodemap_types::NodeSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Map GCE instances to host-registry nodes.
#[derive(Debug, Parser)]
#[command(name = "nodemap", version, about)]
struct Args {
    /// Project to list instances from.
    #[arg(long, short = 'p')]
    project: String,

    /// Mapping file (YAML, JSON or .properties). Defaults to $NODEMAP_MAPPING_PATH,
    /// then the per-user mapping.yaml, then the built-in mapping.
    #[arg(long, short = 'm')]
    mapping: Option<String>,

    /// Instance filter as key=value; repeat to AND several.
    #[arg(long = "filter", short = 'f', value_name = "KEY=VALUE")]
    filters: Vec<String>,

    /// Include instances that are not RUNNING.
    #[arg(long)]
    all_states: bool,

    /// Instances requested per page.
    #[arg(long)]
    page_size: Option<u32>,

    /// Access token; defaults to GOOGLE_OAUTH_ACCESS_TOKEN or CLOUDSDK_AUTH_ACCESS_TOKEN.
    #[arg(long)]
    access_token: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

impl Args {
    fn inventory_query(&self) -> InventoryQuery {
        InventoryQuery {
            filters: self.filters.clone(),
            running_only: !self.all_states,
            page_size: self.page_size,
            ..InventoryQuery::new(&self.project)
        }
    }

    fn credential(&self) -> Result<Credential> {
        match self.access_token.as_deref().filter(|token| !token.trim().is_empty()) {
            Some(token) => Ok(Credential::bearer(token.trim())),
            None => Credential::from_env().context("No credential for the Compute API"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let rules = load_mapping(args.mapping.as_deref())?;
    let client = ComputeClient::new(&args.credential()?).context("Failed to build the Compute API client")?;
    let orchestrator = QueryOrchestrator::new(Arc::new(client), rules, args.inventory_query());

    let handle = orchestrator.spawn();
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling query");
            cancel.cancel();
        }
    });

    let nodes = handle.wait().await.context("Inventory query did not complete")?;
    info!(project = %args.project, nodes = nodes.len(), "query finished");
    println!("{}", render(&nodes, args.format)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn render(nodes: &NodeSet, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(nodes)?,
        OutputFormat::Json => serde_json::to_string_pretty(nodes)?,
    };
    Ok(rendered.trim_end().to_string())
}
