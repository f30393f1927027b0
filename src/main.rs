//! `route-probe`: resolve URLs against a router configuration.
//!
//! Mounts every configured router on an in-memory history, pushes each
//! URL and prints what every instance resolved to, one JSON object per
//! URL.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use scoped_router::config::{self, ConfigUpdate, ConfigWatcher, RouterConfig};
use scoped_router::location::UrlParser;
use scoped_router::observability::logging;
use scoped_router::{History, MemoryHistory, Registry, RouterInstance};

/// How long to wait for an instance to settle after a push.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "route-probe")]
#[command(about = "Resolve URLs against a scoped router configuration", long_about = None)]
struct Cli {
    /// Router configuration file.
    #[arg(short, long, default_value = "routes.toml")]
    config: PathBuf,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and exit
    Check,
    /// Push each URL and print the resolved routes
    Resolve {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Read URLs from stdin, reloading routes when the config changes
    Watch,
}

struct Mounted {
    history: Arc<dyn History>,
    registry: Registry,
    instances: Vec<(String, Arc<RouterInstance>)>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::load_config(&cli.config)?;
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    logging::init_tracing(&config.observability);

    tracing::info!(
        path = ?cli.config,
        routers = config.routers.len(),
        strict_query = config.query.strict,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Check => {
            println!("{}: ok ({} routers)", cli.config.display(), config.routers.len());
        }
        Commands::Resolve { urls } => {
            let mounted = mount(&config)?;
            for url in &urls {
                let report = probe(&mounted, url).await?;
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Commands::Watch => watch(&cli.config, config).await?,
    }

    Ok(())
}

fn mount(config: &RouterConfig) -> Result<Mounted, Box<dyn std::error::Error>> {
    let history: Arc<dyn History> = Arc::new(MemoryHistory::new(&config.origin)?);
    let registry = Registry::new(history.clone());

    let mut instances = Vec::new();
    for router in &config.routers {
        let instance = config::build_instance(router, &config.query, history.clone())?;
        instance.mount(&registry)?;
        instances.push((router.label().to_string(), instance));
    }

    Ok(Mounted {
        history,
        registry,
        instances,
    })
}

/// Wait until no instance is mid-transition.
async fn wait_idle(mounted: &Mounted) {
    let busy = || {
        mounted
            .instances
            .iter()
            .any(|(_, i)| mounted.registry.is_processing(i.id()))
    };
    let _ = tokio::time::timeout(SETTLE_TIMEOUT, async {
        while busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

async fn probe(mounted: &Mounted, url: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    wait_idle(mounted).await;

    let mut receivers: Vec<_> = mounted
        .instances
        .iter()
        .map(|(_, i)| i.last_outcome().subscribe())
        .collect();
    mounted.history.push(url)?;

    let location = UrlParser::default().split(&mounted.history.location())?;
    for ((label, instance), rx) in mounted.instances.iter().zip(receivers.iter_mut()) {
        if !instance.accepts(&location) {
            continue;
        }
        if tokio::time::timeout(SETTLE_TIMEOUT, rx.changed()).await.is_err() {
            tracing::warn!(router = %label, url = %url, "Router did not settle");
        }
    }
    wait_idle(mounted).await;

    let routers: Vec<_> = mounted
        .instances
        .iter()
        .map(|(label, instance)| {
            let outcome = instance.last_outcome().get();
            json!({
                "router": label,
                "base_path": instance.base_path(),
                "in_scope": instance.accepts(&location),
                "outcome": outcome.as_ref().map(|o| o.label()),
                "status": outcome.as_ref().and_then(|o| o.status()),
                "current": instance.current().get(),
            })
        })
        .collect();

    Ok(json!({
        "url": mounted.history.location().as_str(),
        "path": location.path,
        "query": location.query,
        "routers": routers,
    }))
}

async fn watch(path: &Path, config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mounted = mount(&config)?;
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let _watcher = watcher.run()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let url = line.trim();
                if url.is_empty() {
                    continue;
                }
                match probe(&mounted, url).await {
                    Ok(report) => println!("{}", serde_json::to_string(&report)?),
                    Err(e) => tracing::error!(url = %url, error = %e, "Probe failed"),
                }
            }
            Some(update) = updates.recv() => reload(&mounted, &update).await,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Swap route tables in place. Routers are matched by mode and base path; adding
/// or removing routers needs a restart.
async fn reload(mounted: &Mounted, update: &ConfigUpdate) {
    for (label, instance) in &mounted.instances {
        match update.table_for(instance.settings().mode, instance.base_path()) {
            Some((router, table)) => {
                if instance.set_routes(table).await {
                    tracing::info!(router = %label, routes = router.routes.len(), "Routes reloaded");
                }
            }
            None => {
                tracing::warn!(router = %label, "Router missing from reloaded config, keeping routes")
            }
        }
    }
}
