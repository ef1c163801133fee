//! `slamchat status`: a quick look at the local installation.

use anyhow::Result;
use sqlx::Row;

use crate::state::AppState;

/// Row counts of the chat tables.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub rooms: i64,
    pub active_memberships: i64,
    pub messages: i64,
}

pub async fn store_counts(state: &AppState) -> Result<StoreCounts> {
    let row = sqlx::query(
        r#"SELECT
             (SELECT COUNT(*) FROM rooms WHERE deleted = 0) AS rooms,
             (SELECT COUNT(*) FROM memberships WHERE status = 'active') AS active_memberships,
             (SELECT COUNT(*) FROM messages) AS messages"#,
    )
    .fetch_one(&state.db_pool.reader)
    .await?;

    Ok(StoreCounts {
        rooms: row.try_get("rooms")?,
        active_memberships: row.try_get("active_memberships")?,
        messages: row.try_get("messages")?,
    })
}

/// Print the status report.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let counts = store_counts(state).await?;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "cache": state.cache.backend(),
            "cache_connected": state.cache.is_connected(),
            "cache_window": state.config.cache.window,
            "rooms": counts.rooms,
            "active_memberships": counts.active_memberships,
            "messages": counts.messages,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  SlamChat v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Data dir:     {}", state.data_dir.display());
    let connection = if state.cache.is_connected() { "" } else { ", unreachable" };
    println!(
        "  Cache:        {} (window {}{connection})",
        state.cache.backend(),
        state.config.cache.window
    );
    println!("  Rooms:        {}", counts.rooms);
    println!("  Memberships:  {} active", counts.active_memberships);
    println!("  Messages:     {}", counts.messages);
    println!();

    Ok(())
}
