use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use timevault_table::{
    scheduler, Api, AuditSink, JsonlAuditLog, SchedulerConfig, Session, VaultTableConfig,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = VaultTableConfig::from_env();
    if let Err(err) = config.round.validate() {
        anyhow::bail!("invalid round config: {err}");
    }
    if config.seed.is_some() {
        warn!("VAULT_TABLE_SEED set; round outcomes are reproducible");
    }

    let audit = match &config.audit_path {
        Some(path) => {
            let audit = JsonlAuditLog::start(path, config.audit_buffer)
                .with_context(|| format!("start audit log at {}", path.display()))?;
            info!(path = %path.display(), "audit log enabled");
            Some(Arc::new(audit))
        }
        None => None,
    };
    let session = match &audit {
        Some(audit) => {
            let sink: Arc<dyn AuditSink> = audit.clone();
            Session::with_audit(config.seed, sink)
        }
        None => Session::new(config.seed),
    };

    let rounds = tokio::spawn(scheduler::run(
        Arc::clone(&session),
        SchedulerConfig {
            base: config.round.clone(),
            events_path: Some(config.events_path.clone()),
            cooldown: config.cooldown,
        },
    ));

    let app = Api::new(Arc::clone(&session)).router();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen addr")?;
    info!(%addr, "vault table service listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("shutting down");
    rounds.abort();
    // Resolve the round in flight so accepted bets are settled and recorded.
    if let Some(round) = session.current_round().await {
        if let Err(err) = round.end_round().await {
            warn!(%err, "failed to resolve round on shutdown");
        }
    }
    if let Some(audit) = audit {
        audit.close().await;
    }
    Ok(())
}
