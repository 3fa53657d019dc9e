//! Runs a set of nodes on an in-process bus and pings every peer through
//! the federated catalog.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use sop_core::{ExecutionResult, OperationFilter, Properties};
use sop_server::service::ping::PING_PATH;
use sop_server::{LoopbackBus, SopConfig, SopNode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sop-node")]
#[command(version)]
#[command(about = "Federated operation registry demo on a loopback bus")]
struct Cli {
    /// Comma-separated node idents; each gets its own queue.
    #[arg(long, value_delimiter = ',', default_value = "alpha,beta")]
    nodes: Vec<String>,

    /// Registry topic shared by all nodes.
    #[arg(long, env = "SOP_TOPIC", default_value = "sop.registry")]
    topic: String,

    /// Interval between catalog synchronizations.
    #[arg(long, env = "SOP_SYNC_INTERVAL_MS", default_value = "60000")]
    sync_interval_ms: u64,

    /// Give up on a remote reply after this many milliseconds.
    #[arg(long, env = "SOP_REPLY_TIMEOUT_MS")]
    reply_timeout_ms: Option<u64>,

    /// Deny executions when no authorization service is installed.
    #[arg(long)]
    strict: bool,

    /// Emit logs and ping reports as JSON.
    #[arg(long)]
    json: bool,

    /// Keep the nodes running until Ctrl-C.
    #[arg(long)]
    serve: bool,
}

#[derive(Serialize)]
struct PingReport<'a> {
    from: &'a str,
    target: String,
    result: ExecutionResult,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn config_for(cli: &Cli, node_id: &str) -> SopConfig {
    let mut config = SopConfig::for_node(node_id);
    config.sync_interval_ms = cli.sync_interval_ms;
    config.local.relaxed = !cli.strict;
    config.federation.topic.clone_from(&cli.topic);
    config.federation.reply_timeout = cli.reply_timeout_ms.map(Duration::from_millis);
    config
}

async fn ping_peers(node: &SopNode, json: bool) -> Result<()> {
    let filter = OperationFilter::new(PING_PATH)?;
    let provider_name = &node.config().federation.provider_name;
    for descriptor in node.api().find(&filter) {
        if descriptor.provider() != provider_name {
            continue;
        }
        let result = node
            .api()
            .execute_descriptor(&descriptor, &Properties::new())
            .await?;
        let report = PingReport {
            from: &node.config().node_id,
            target: descriptor.address().to_string(),
            result,
        };
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            let values = report
                .result
                .values()
                .map(serde_json::to_string)
                .transpose()?
                .unwrap_or_default();
            println!(
                "{} -> {}: rc={} {}",
                report.from,
                report.target,
                report.result.return_code(),
                values
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let bus = Arc::new(LoopbackBus::new());
    let mut nodes = Vec::with_capacity(cli.nodes.len());
    for id in &cli.nodes {
        let mut node = SopNode::new(config_for(&cli, id), bus.clone(), None);
        node.start().await?;
        nodes.push(node);
    }
    info!(nodes = nodes.len(), topic = %cli.topic, "nodes running");

    for node in &nodes {
        if let Err(e) = ping_peers(node, cli.json).await {
            warn!(node = %node.config().node_id, error = %e, "ping round failed");
        }
    }

    if cli.serve {
        tokio::signal::ctrl_c().await?;
        info!("shutdown requested");
    }

    for node in &mut nodes {
        node.stop().await;
    }
    Ok(())
}
