//! Persistence operations over the `status` table.

use std::collections::HashSet;

use sqlx::sqlite::SqlitePool;
use sqlx::{Executor, Sqlite};
use tracing::{debug, info};

use super::models::{StatusRecord, TargetKind};

/// Inserts or updates the stored state for one target.
pub async fn update_status<'e, E>(
    executor: E,
    kind: TargetKind,
    address: &str,
    is_down: bool,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(kind = %kind, address, is_down, "updating stored status");
    sqlx::query(
        "INSERT INTO status (kind, address, down)
         VALUES (?, ?, ?)
         ON CONFLICT(kind, address) DO UPDATE
           SET down = excluded.down",
    )
    .bind(kind.as_str())
    .bind(address)
    .bind(is_down)
    .execute(executor)
    .await?;
    Ok(())
}

/// Returns the stored down flag for a target.
///
/// A target with no record has never been seen and is not considered down.
pub async fn is_down<'e, E>(
    executor: E,
    kind: TargetKind,
    address: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stored: Option<bool> =
        sqlx::query_scalar("SELECT down FROM status WHERE kind = ? AND address = ?")
            .bind(kind.as_str())
            .bind(address)
            .fetch_optional(executor)
            .await?;
    Ok(stored.unwrap_or(false))
}

/// Deletes records for targets that are no longer configured.
///
/// Each kind is pruned against its own current set: an empty IP set removes
/// every IP record and leaves URL records alone, and vice versa.
pub async fn remove_stale(
    pool: &SqlitePool,
    current_ips: &HashSet<String>,
    current_urls: &HashSet<String>,
) -> Result<(), sqlx::Error> {
    info!("pruning stale status records");
    let ips = remove_stale_kind(pool, TargetKind::Ip, current_ips).await?;
    let urls = remove_stale_kind(pool, TargetKind::Url, current_urls).await?;
    if ips + urls > 0 {
        debug!(removed_ips = ips, removed_urls = urls, "stale records removed");
    }
    Ok(())
}

async fn remove_stale_kind(
    pool: &SqlitePool,
    kind: TargetKind,
    current: &HashSet<String>,
) -> Result<u64, sqlx::Error> {
    if current.is_empty() {
        let result = sqlx::query("DELETE FROM status WHERE kind = ?")
            .bind(kind.as_str())
            .execute(pool)
            .await?;
        return Ok(result.rows_affected());
    }
    let placeholders = vec!["?"; current.len()].join(", ");
    let sql = format!("DELETE FROM status WHERE kind = ? AND address NOT IN ({placeholders})");
    let mut query = sqlx::query(&sql).bind(kind.as_str());
    for address in current {
        query = query.bind(address);
    }
    Ok(query.execute(pool).await?.rows_affected())
}

/// All stored records, oldest first.
pub async fn all_records(pool: &SqlitePool) -> Result<Vec<StatusRecord>, sqlx::Error> {
    sqlx::query_as::<_, StatusRecord>("SELECT id, kind, address, down FROM status ORDER BY id")
        .fetch_all(pool)
        .await
}
