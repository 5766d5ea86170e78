use crate::db::DbConnection;
use crate::AppState;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use std::time::Duration;
use tokio::time::interval;

/// Periodically deletes command rows older than the configured retention.
/// Displays consume commands from change events and never read the rows back.
pub async fn run(state: AppState) {
    let mut tick = interval(Duration::from_secs(5 * 60));
    let retention = chrono::Duration::hours(state.config.commands.retention_hours);

    loop {
        tick.tick().await;

        let pool = state.db.clone();
        let cutoff = Utc::now().naive_utc() - retention;
        let result = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut conn = pool.get()?;
            Ok(prune_commands(&mut conn, cutoff)?)
        })
        .await;

        match result {
            Ok(Ok(0)) => {}
            Ok(Ok(count)) => tracing::info!("Pruned {} expired command(s)", count),
            Ok(Err(e)) => tracing::error!("Command pruning failed: {}", e),
            Err(e) => tracing::error!("Command pruning task panic: {}", e),
        }
    }
}

pub fn prune_commands(
    conn: &mut DbConnection,
    cutoff: NaiveDateTime,
) -> Result<usize, diesel::result::Error> {
    use crate::schema::commands::dsl;

    diesel::delete(dsl::commands.filter(dsl::created_at.lt(cutoff))).execute(conn)
}
