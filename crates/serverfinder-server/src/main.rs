//! Serverfinder - lease-based service discovery over etcd

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serverfinder_server::{
    api,
    observability::{init_metrics, init_tracing, shutdown_tracing, TracingConfig},
    parse_endpoints, DiscoveryConfig, EtcdStore, Filter, LeaseStore, PullWorker, PushWorker,
    ServerIndex,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "serverfinder")]
#[command(about = "Advertise servers with expiring leases and discover live ones")]
struct Cli {
    /// etcd endpoints (comma-separated)
    #[arg(long, env = "ETCD_ENDPOINTS", global = true)]
    etcd_endpoints: Option<String>,

    /// Lease key prefix token
    #[arg(long, env = "LEASE_KEY_PREFIX", global = true)]
    key_prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep a lease for this server alive until interrupted
    Advertise {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        port: u16,
        /// Repeat for several tags
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Lease TTL in seconds
        #[arg(long)]
        ttl: Option<u64>,
        /// Renewal interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Keep a live server index and serve it over HTTP until interrupted
    Watch {
        /// HTTP listen address; overrides BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
        /// Refresh interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Fetch once and print matching servers as JSON
    List {
        #[arg(long = "name")]
        names: Vec<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

impl Cli {
    fn config(&self) -> DiscoveryConfig {
        let mut config = DiscoveryConfig::from_env();
        if let Some(endpoints) = &self.etcd_endpoints {
            config.store.endpoints = parse_endpoints(endpoints);
        }
        if let Some(prefix) = &self.key_prefix {
            config.pull.key_prefix = prefix.clone();
            config.push.key_prefix = prefix.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(TracingConfig::from_env()).map_err(|e| anyhow::anyhow!(e))?;

    let cli = Cli::parse();
    let mut config = cli.config();

    let store: Arc<dyn LeaseStore> = Arc::new(
        EtcdStore::connect(&config.store)
            .await
            .context("Failed to connect to lease store")?,
    );

    let result = match cli.command {
        Commands::Advertise {
            name,
            address,
            port,
            tags,
            ttl,
            interval,
        } => {
            if let Some(secs) = ttl {
                config.push.ttl = Duration::from_secs(secs);
            }
            if let Some(secs) = interval {
                config.push.interval = Duration::from_secs(secs);
            }
            run_advertise(store, config, name, address, port, tags).await
        }
        Commands::Watch { bind, interval } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(secs) = interval {
                config.pull.interval = Duration::from_secs(secs);
            }
            run_watch(store, config).await
        }
        Commands::List { names, tags } => run_list(store, config, names, tags).await,
    };

    shutdown_tracing();
    result
}

async fn run_advertise(
    store: Arc<dyn LeaseStore>,
    config: DiscoveryConfig,
    name: String,
    address: String,
    port: u16,
    tags: Vec<String>,
) -> anyhow::Result<()> {
    let worker = tags.into_iter().fold(
        PushWorker::new(store, config.push)
            .name(name)
            .address(address, port),
        |worker, tag| worker.tag(tag),
    );

    let handle = worker.start().await;
    info!(key = %handle.lease_key(), "Advertising; press Ctrl-C to deregister");

    tokio::signal::ctrl_c().await?;
    handle.stop().await;
    Ok(())
}

async fn run_watch(store: Arc<dyn LeaseStore>, config: DiscoveryConfig) -> anyhow::Result<()> {
    let mut state = api::AppState::new(Arc::new(ServerIndex::new()));
    match init_metrics() {
        Ok(metrics_state) => state = state.with_metrics(metrics_state),
        Err(e) => warn!(error = %e, "Metrics disabled"),
    }

    let handle = PullWorker::new(store, config.pull)
        .with_index(state.index.clone())
        .start()
        .await;
    info!(servers = handle.index().len(), "Initial snapshot loaded");

    let app = api::create_router(state);
    info!("Starting API server on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await?;

    handle.stop().await;
    Ok(())
}

async fn run_list(
    store: Arc<dyn LeaseStore>,
    config: DiscoveryConfig,
    names: Vec<String>,
    tags: Vec<String>,
) -> anyhow::Result<()> {
    let index = ServerIndex::new();
    serverfinder_server::fetch_once(store.as_ref(), &index, &config.pull.key_prefix).await?;

    let filters: Vec<Filter> = names
        .into_iter()
        .map(Filter::Name)
        .chain(tags.into_iter().map(Filter::Tag))
        .collect();
    let servers = if filters.is_empty() {
        index.all()
    } else {
        index.query(&filters)
    };

    println!("{}", serde_json::to_string_pretty(&servers)?);
    Ok(())
}
