use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use mai_config::MaiConfig;
use mai_store::SqliteStore;
use mai_thinking::{FlowRegistry, IdleHook, TaskExecutor};

pub(super) async fn cmd_start(config: MaiConfig, status_interval: u64) -> mai_core::Result<()> {
    println!("Mai v{}", env!("CARGO_PKG_VERSION"));
    println!("   Database: {}", config.database.sqlite_path.display());
    println!(
        "   Cadence: engaged {}s, focused {}s, window {}",
        config.thinking.engaged_interval_secs,
        config.thinking.focused_interval_secs,
        config.thinking.observation_window_size
    );
    println!();

    let store = Arc::new(SqliteStore::open(&config.database.sqlite_path)?);
    let registry = FlowRegistry::new(
        store,
        TaskExecutor::current(),
        Arc::new(IdleHook),
        &config.thinking,
    )?;
    let restored = registry.initialize()?;
    println!(
        "   Restored {} streams ({} skipped). Press Ctrl-C to stop.",
        restored.restored, restored.skipped
    );

    let mut status = tokio::time::interval(Duration::from_secs(status_interval.max(1)));
    status.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
                }
                break;
            }
            _ = status.tick() => {
                let counts = registry.state_counts();
                info!(
                    total = counts.total,
                    dormant = counts.dormant,
                    engaged = counts.engaged,
                    focused = counts.focused,
                    "flow states"
                );
            }
        }
    }

    let report = registry.shutdown().await;
    println!(
        "Stopped {} flows, flushed {}, {} failures.",
        report.stopped, report.flushed, report.failures
    );
    Ok(())
}
