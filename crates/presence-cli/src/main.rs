use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use presence_core::cloud::DEFAULT_HTTP_TIMEOUT;
use presence_core::{
    check_connection, shared_instance, Bridge, BridgeConfig, CloudClient, ConfigStore, Connection, FileConfigStore,
    HookTable, InstanceStatus, MemoryTree, NetatmoClient, Node, NodeId, NodeKind, NodeRepository, TcpProbe,
};
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod server;

type PresenceBridge = Bridge<NetatmoClient, TcpProbe, MemoryTree>;

#[derive(Debug, Parser)]
#[command(name = "presenced")]
#[command(about = "Netatmo Presence bridge: mirrors cloud cameras into a local object tree")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = "./data/config.json")]
    config: PathBuf,

    #[arg(long, default_value = "./data/tree.json")]
    tree: PathBuf,

    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Public base URL of this daemon; used as the default callback url.
    #[arg(long)]
    connect_url: Option<String>,

    #[arg(long, default_value = "1")]
    instance_id: String,

    #[arg(long, default_value_t = 3600)]
    poll_interval_secs: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    Run {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Check {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Once {
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    Tree {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Unregister,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let connect_url = cli
        .connect_url
        .clone()
        .unwrap_or_else(|| format!("http://{}", cli.listen));
    let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(
        cli.config.clone(),
        BridgeConfig::with_connect_url(connect_url),
    ));
    let hooks = HookTable::new();

    match cli.command {
        Command::Run { format } => {
            let mut bridge = build_bridge(&cli, Arc::clone(&store), hooks.clone())?;
            let state = server::AppState {
                hooks,
                instance: bridge.instance(),
                status: bridge.status(),
            };
            let startup = store.load()?.has_credentials();
            let poll_interval = Duration::from_secs(cli.poll_interval_secs);
            run_loop(&mut bridge, state, cli.listen, poll_interval, startup, format).await?;
            bridge.shutdown().await;
        }
        Command::Check { format } => {
            let client = NetatmoClient::new(DEFAULT_HTTP_TIMEOUT)?;
            let mut connection = Connection::new(client, TcpProbe::default(), cli.instance_id.clone());
            let status = check_connection(&mut connection, store.as_ref(), &hooks).await;
            print_status(&status, format)?;
        }
        Command::Once { format } => {
            let mut bridge = build_bridge(&cli, Arc::clone(&store), hooks.clone())?;
            if let Err(err) = bridge.tick().await {
                warn!(error = %err, "poll cycle failed");
            }
            print_status(&bridge.status().current(), format)?;
            bridge.shutdown().await;
        }
        Command::Tree { format } => {
            let tree = MemoryTree::load(&cli.tree)
                .with_context(|| format!("loading tree from {}", cli.tree.display()))?;
            print_tree(&tree, format)?;
        }
        Command::Unregister => {
            let config = store.load()?;
            let mut client = NetatmoClient::new(DEFAULT_HTTP_TIMEOUT)?;
            client.connect(&config.credentials()).await?;
            let ack = client.drop_webhook().await?;
            println!("dropwebhook: {}", ack.status.as_deref().unwrap_or("no status"));
        }
    }

    Ok(())
}

fn build_bridge(cli: &Cli, store: Arc<dyn ConfigStore>, hooks: HookTable) -> Result<PresenceBridge> {
    let tree = MemoryTree::open(cli.tree.clone())
        .with_context(|| format!("opening tree at {}", cli.tree.display()))?;
    let client = NetatmoClient::new(DEFAULT_HTTP_TIMEOUT)?;
    let connection = Connection::new(client, TcpProbe::default(), cli.instance_id.clone());
    Ok(Bridge::new(connection, store, Arc::new(hooks), shared_instance(tree)))
}

async fn run_loop(
    bridge: &mut PresenceBridge,
    state: server::AppState,
    listen: SocketAddr,
    poll_interval: Duration,
    startup: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut server = tokio::spawn(server::serve(listen, state));

    // an instance with credentials is updated right away
    let first = if startup {
        Instant::now()
    } else {
        Instant::now() + poll_interval
    };
    let mut ticker = interval_at(first, poll_interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping");
                break;
            }
            joined = &mut server => {
                joined.context("hook server task")??;
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = bridge.tick().await {
                    warn!(error = %err, "poll cycle failed");
                }
                let status = bridge.status().current();
                print_status(&status, format)?;
                info!(code = status.code, cameras = status.cameras, hook = %bridge.hook_path(), "tick");
            }
        }
    }

    server.abort();
    Ok(())
}

fn print_status(status: &InstanceStatus, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(status)?);
        }
        OutputFormat::Human => {
            println!("=== Presence Status ===");
            println!("Code:       {} ({})", status.code, status.label);
            if let Some(checked_at) = status.checked_at {
                println!("Checked:    {}", checked_at.to_rfc3339());
            }
            println!("Cameras:    {}", status.cameras);
            if let Some(detail) = &status.detail {
                println!("Detail:     {detail}");
            }
        }
    }

    Ok(())
}

fn print_tree(tree: &MemoryTree, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let nodes: Vec<&Node> = tree.nodes().collect();
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
        OutputFormat::Human => print_subtree(tree, tree.root(), 0),
    }

    Ok(())
}

fn print_subtree(tree: &MemoryTree, id: NodeId, depth: usize) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);

    match &node.kind {
        NodeKind::Category { kind: Some(kind) } => println!("{indent}{} [{}] ({kind})", node.name, node.ident),
        NodeKind::Category { kind: None } => println!("{indent}{} [{}]", node.name, node.ident),
        NodeKind::Leaf { value, .. } => println!("{indent}{} = {value}", node.name),
        NodeKind::Image(image) => println!("{indent}{} -> {}", node.name, image.url),
    }

    for child in tree.children(id) {
        print_subtree(tree, child, depth + 1);
    }
}
