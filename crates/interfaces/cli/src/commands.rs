use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::info;

use lettavault_config::AppConfig;
use lettavault_remote::{HttpRemoteClient, RemoteClient};
use lettavault_sync::{
    BlockResolver, Bootstrapper, ConnectError, ConsentPolicy, DEFAULT_MAX_ATTEMPTS, Reconciler,
    SaveOutcome, Session, UploadRateLimiter, VaultDir, spawn_periodic_sync, spawn_sync_worker,
    watch_vault,
};

use crate::prompts::TerminalPrompts;

/// A bound session plus what is needed to act on it.
pub(crate) struct Connected {
    pub client: Arc<dyn RemoteClient>,
    pub session: Session,
}

pub(crate) async fn connect(config: &AppConfig, prompts: &TerminalPrompts) -> Result<Connected> {
    let client: Arc<dyn RemoteClient> = Arc::new(
        HttpRemoteClient::new(
            config.remote.endpoint.trim(),
            config.remote.credential().map(str::to_string),
        )
        .context("could not build the HTTP client")?,
    );
    let bootstrapper = Bootstrapper::new(client.clone(), config.remote.clone())
        .with_consent(ConsentPolicy::from(&config.sync));

    let session = match bootstrapper.connect(prompts, DEFAULT_MAX_ATTEMPTS).await {
        Ok(session) => session,
        Err(err @ ConnectError::UserCancelled(_)) => {
            return Err(err).context("connect cancelled (pass --yes to accept the defaults)");
        }
        Err(err) => {
            return Err(err).with_context(|| format!("could not connect to {}", config.remote.endpoint));
        }
    };
    if !session.source_attached() {
        eprintln!(
            "warning: source `{}` is not attached to agent `{}`; the agent cannot see the vault",
            session.source.name, session.agent.name
        );
    }
    Ok(Connected { client, session })
}

fn reconciler(config: &AppConfig, client: Arc<dyn RemoteClient>) -> Result<(VaultDir, Reconciler)> {
    let vault = VaultDir::from_config(&config.sync).context("invalid [sync] settings")?;
    let limiter = Arc::new(UploadRateLimiter::per_minute(
        config.sync.max_uploads_per_minute,
    ));
    let reconciler = Reconciler::new(client, Arc::new(vault.clone())).with_rate_limit(limiter);
    Ok((vault, reconciler))
}

/// Writes a config file with every default spelled out.  Credentials are
/// left empty; supply them via `LETTA_API_KEY`.
pub(crate) fn run_init(path: &str, force: bool) -> Result<()> {
    if std::path::Path::new(path).exists() && !force {
        bail!("{path} already exists (pass --force to overwrite)");
    }
    AppConfig::default().save_to(path)?;
    println!("wrote {path}");
    Ok(())
}

pub(crate) async fn run_connect(config: &AppConfig, prompts: &TerminalPrompts) -> Result<()> {
    let Connected { session, .. } = connect(config, prompts).await?;
    println!("── connected ────────────────────────────────────────");
    println!("  endpoint : {}", config.remote.endpoint);
    println!("  source   : {} ({})", session.source.name, session.source.id);
    println!("  agent    : {} ({})", session.agent.name, session.agent.id);
    println!(
        "  attached : {}",
        if session.source_attached() { "yes" } else { "no" }
    );
    Ok(())
}

pub(crate) async fn run_sync(config: &AppConfig, prompts: &TerminalPrompts) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let (vault, reconciler) = reconciler(config, client)?;

    let report = reconciler
        .full_sync(session.source_id())
        .await
        .with_context(|| format!("full sync of {} failed", vault.root().display()))?;

    println!(
        "sync complete: {} uploaded, {} up to date, {} failed",
        report.uploaded,
        report.skipped,
        report.failed.len()
    );
    for failure in &report.failed {
        eprintln!("  {}: {}", failure.path, failure.error);
    }
    if !report.is_clean() {
        bail!("{} file(s) failed to sync", report.failed.len());
    }
    Ok(())
}

pub(crate) async fn run_sync_file(
    config: &AppConfig,
    prompts: &TerminalPrompts,
    path: &str,
) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let (_, reconciler) = reconciler(config, client)?;
    reconciler
        .sync_file(path, session.source_id())
        .await
        .with_context(|| format!("could not sync {path}"))?;
    println!("synced {path}");
    Ok(())
}

/// Watches the vault until Ctrl-C, feeding changes through the sync queue.
pub(crate) async fn run_watch(config: &AppConfig, prompts: &TerminalPrompts) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let (vault, reconciler) = reconciler(config, client)?;
    let (queue, worker) = spawn_sync_worker(Arc::new(reconciler), session.source_id().to_string());

    if config.sync.sync_on_startup {
        queue.request_full_sync();
    }
    let watcher = watch_vault(vault, queue.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let periodic = (config.sync.periodic_sync_minutes > 0).then(|| {
        spawn_periodic_sync(
            queue.clone(),
            Duration::from_secs(config.sync.periodic_sync_minutes * 60),
            shutdown_rx,
        )
    });

    println!("watching {} (Ctrl-C to stop)", config.sync.vault_path);
    tokio::signal::ctrl_c()
        .await
        .context("could not listen for Ctrl-C")?;
    info!("shutting down watcher");

    let _ = shutdown_tx.send(true);
    drop(watcher);
    if let Some(periodic) = periodic {
        let _ = periodic.await;
    }
    drop(queue);
    let stats = worker.await.context("sync worker panicked")?;
    println!(
        "stopped: {} job(s) processed, {} failed",
        stats.processed, stats.failed
    );
    Ok(())
}

pub(crate) async fn run_blocks_list(config: &AppConfig, prompts: &TerminalPrompts) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let resolver = BlockResolver::new(client, &session);
    let blocks = resolver.list().await?;

    println!("── memory blocks ({}) ─────────────────────────────────", session.agent.name);
    for block in &blocks {
        let limit = block
            .character_limit
            .map(|limit| limit.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<16} {:>6}/{:<6}{}",
            block.label,
            block.value.chars().count(),
            limit,
            if block.read_only { "  read-only" } else { "" }
        );
    }
    println!("  ({} blocks total)", blocks.len());
    Ok(())
}

pub(crate) async fn run_blocks_show(
    config: &AppConfig,
    prompts: &TerminalPrompts,
    label: &str,
) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let mut resolver = BlockResolver::new(client, &session);
    let editor = resolver.open(label).await?;
    println!("{}", editor.base);
    Ok(())
}

pub(crate) async fn run_blocks_edit(
    config: &AppConfig,
    prompts: &TerminalPrompts,
    label: &str,
    text: String,
) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let mut resolver = BlockResolver::new(client, &session);
    resolver.open(label).await?;
    resolver.edit(label, text)?;

    match resolver.save(label, prompts).await? {
        SaveOutcome::Unchanged => println!("block `{label}` unchanged"),
        SaveOutcome::Saved => println!("block `{label}` saved"),
        SaveOutcome::Overwritten => println!("block `{label}` overwritten"),
        SaveOutcome::KeptServer => println!("block `{label}` kept the server value"),
        SaveOutcome::Cancelled => {
            bail!("block `{label}` changed on the server; save cancelled")
        }
    }
    Ok(())
}

pub(crate) async fn run_files_open(
    config: &AppConfig,
    prompts: &TerminalPrompts,
    path: &str,
) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let (_, reconciler) = reconciler(config, client.clone())?;
    let file = reconciler.remote_file(path, session.source_id()).await?;
    client.open_file(session.agent_id(), &file.id).await?;
    println!("opened {path} for {}", session.agent.name);
    Ok(())
}

pub(crate) async fn run_files_close(
    config: &AppConfig,
    prompts: &TerminalPrompts,
    path: &str,
) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    let (_, reconciler) = reconciler(config, client.clone())?;
    let file = reconciler.remote_file(path, session.source_id()).await?;
    client.close_file(session.agent_id(), &file.id).await?;
    println!("closed {path}");
    Ok(())
}

pub(crate) async fn run_files_close_all(
    config: &AppConfig,
    prompts: &TerminalPrompts,
) -> Result<()> {
    let Connected { client, session } = connect(config, prompts).await?;
    client.close_all_files(session.agent_id()).await?;
    println!("closed all files for {}", session.agent.name);
    Ok(())
}
