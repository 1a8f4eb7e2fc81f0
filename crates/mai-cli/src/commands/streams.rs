use mai_config::MaiConfig;
use mai_core::StreamStore;
use mai_store::SqliteStore;

pub(super) fn cmd_streams(config: &MaiConfig, json: bool) -> mai_core::Result<()> {
    let store = SqliteStore::open(&config.database.sqlite_path)?;
    let records = store.load_streams()?;

    if json {
        let rows: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "state": r.state,
                    "last_active_at": r.last_active_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No interaction streams yet.");
        return Ok(());
    }

    println!("{:<16} {:<10} LAST ACTIVE", "STREAM", "STATE");
    for r in &records {
        println!(
            "{:<16} {:<10} {}",
            r.id,
            r.state.as_deref().unwrap_or("-"),
            r.last_active_at.as_deref().unwrap_or("never")
        );
    }
    println!("\n{} streams", records.len());
    Ok(())
}
