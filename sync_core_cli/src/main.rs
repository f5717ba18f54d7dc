mod config;

use argh::FromArgs;
use config::CliConfig;
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::app::{App, AppConfig};
use sync_core::crypto::MasterKey;
use sync_core::settings::test_support::InMemorySettingsStore;
use sync_core::settings::SettingsStore;
use sync_core::tenant::Tenant;
use tracing::{error, info};

#[derive(FromArgs)]
/// Synchronization core: keeps local business entities and a remote ERP
/// in sync over JSON-RPC/XML-RPC.
struct TopLevel {
    #[argh(option, default = "PathBuf::from(\"sync_core.toml\")")]
    /// path to the TOML bootstrap config
    config: PathBuf,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Daemon(DaemonArgs),
    Stats(StatsArgs),
}

#[derive(FromArgs)]
/// Run the polling loop against every configured tenant and serve the
/// webhook receiver.
#[argh(subcommand, name = "daemon")]
struct DaemonArgs {}

#[derive(FromArgs)]
/// Print per-tenant, per-module queue stats and exit.
#[argh(subcommand, name = "stats")]
struct StatsArgs {
    #[argh(option)]
    /// restrict output to a single tenant
    tenant: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args: TopLevel = argh::from_env();

    fdlimit::raise_fd_limit();
    proctitle::set_title("sync_core_cli");

    let _sentry_guard = sentry::init(sentry::ClientOptions {
        release: sentry::release_name!(),
        ..Default::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(args))
}

async fn run(args: TopLevel) -> anyhow::Result<()> {
    let config = CliConfig::load(&args.config)?;

    let app_config = AppConfig {
        database_url: config.database_url.clone(),
        master_key: MasterKey::from_bytes(config.master_key_bytes()?),
        pagerduty_routing_key: config.pagerduty_routing_key.clone(),
    };

    // A real deployment supplies its own `SettingsStore` backed by whatever
    // key/value store the (out-of-scope) admin UI writes to. This process
    // only ever reads through the trait, so wiring a different backend in
    // is a one-line change here.
    let settings: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());

    let app = App::connect(app_config, settings).await?;

    match args.command {
        Command::Daemon(_) => run_daemon(app, config).await,
        Command::Stats(stats_args) => print_stats(app, config, stats_args).await,
    }
}

async fn run_daemon(app: App, config: CliConfig) -> anyhow::Result<()> {
    let engine = Arc::new(app.engine());
    let tenants: Vec<Tenant> = config.tenants.iter().map(|t| Tenant::new(t.clone())).collect();

    let webhook_router = app.webhook_router();
    let webhook_addr: std::net::SocketAddr = config.webhook_addr().parse()?;

    info!(addr = %webhook_addr, "starting webhook receiver");
    let webhook_handle = tokio::spawn(async move {
        if let Err(e) = axum::Server::bind(&webhook_addr)
            .serve(webhook_router.into_make_service())
            .await
        {
            error!(error = %e, "webhook server exited");
        }
    });

    let poll_interval = config.poll_interval();
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for tenant in &tenants {
                    match engine.run_once(tenant).await {
                        Ok(report) => info!(tenant = tenant.as_str(), ?report, "poll cycle complete"),
                        Err(e) => error!(tenant = tenant.as_str(), error = %e, "poll cycle failed"),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                webhook_handle.abort();
                return Ok(());
            }
        }
    }
}

async fn print_stats(app: App, config: CliConfig, args: StatsArgs) -> anyhow::Result<()> {
    use prettytable::{row, Table};

    let tenants: Vec<String> = match args.tenant {
        Some(t) => vec![t],
        None => config.tenants.clone(),
    };

    let mut table = Table::new();
    table.add_row(row!["tenant", "module", "pending", "processing", "failed", "last synced"]);

    for tenant_id in &tenants {
        let tenant = Tenant::new(tenant_id.clone());

        for module_id in app.modules.module_ids() {
            let stats = app.modules.stats(&tenant, module_id).await?;

            table.add_row(row![
                tenant_id,
                module_id,
                stats.pending,
                stats.processing,
                stats.failed,
                stats
                    .last_synced_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            ]);
        }
    }

    table.printstd();

    Ok(())
}
