use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use tripledger::config::Config;
use tripledger::driver;
use tripledger::ledger::Ledger;
use tripledger::notify::NotifyHub;
use tripledger::store::JournaledStore;
use tripledger::sweeper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Responses go to stdout; keep logs on stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    tripledger::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let journal_path = config.journal_path();
    let store = Arc::new(JournaledStore::open(journal_path.clone(), Arc::new(NotifyHub::new()))?);
    let ledger = Ledger::new(store.clone());

    info!("tripledger ready");
    info!("  journal: {}", journal_path.display());
    info!("  compact_threshold: {}", config.compact_threshold);
    info!("  sweep_interval: {:?}", config.sweep_interval);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    tokio::spawn(sweeper::run_completion_sweeper(store.clone(), config.sweep_interval));
    tokio::spawn(sweeper::run_compactor(store.clone(), config.compact_threshold));

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = driver::handle_line(&ledger, &line).await;
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                stdout.write_all(&out).await?;
                stdout.flush().await?;
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("tripledger stopped");
    Ok(())
}
