use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::analyze::{count_rows_for_plan, open_database, resolve_db_path, run_lock_state};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_deref());

    info!(cache_root = %args.cache_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = open_database(&db_path)?;
    let plan_ids = match &args.plan_id {
        Some(plan_id) => vec![plan_id.clone()],
        None => list_plan_ids(&connection)?,
    };

    if plan_ids.is_empty() {
        warn!(path = %db_path.display(), "no analyzed plans");
    }

    for plan_id in plan_ids {
        let pages = count_rows_for_plan(
            &connection,
            "SELECT COUNT(*) FROM page_records WHERE plan_id = ?1",
            &plan_id,
        )?;
        let auto_links = count_rows_for_plan(
            &connection,
            "SELECT COUNT(*) FROM page_links WHERE plan_id = ?1 AND is_auto = 1",
            &plan_id,
        )?;
        let manual_links = count_rows_for_plan(
            &connection,
            "SELECT COUNT(*) FROM page_links WHERE plan_id = ?1 AND is_auto = 0",
            &plan_id,
        )?;
        let lock = run_lock_state(&connection, &plan_id)?;

        info!(
            plan_id = %plan_id,
            pages,
            auto_links,
            manual_links,
            analysis_in_progress = lock.as_ref().map(|state| state.in_progress).unwrap_or(false),
            lock_version = lock.as_ref().map(|state| state.version).unwrap_or(0),
            last_run = %lock.and_then(|state| state.run_id).unwrap_or_default(),
            "plan status"
        );
    }

    Ok(())
}

fn list_plan_ids(connection: &Connection) -> Result<Vec<String>> {
    let mut statement = connection
        .prepare("SELECT DISTINCT plan_id FROM page_records ORDER BY plan_id")
        .context("failed to list plans")?;
    let rows = statement.query_map([], |row| row.get::<_, String>(0))?;

    let mut plan_ids = Vec::new();
    for row in rows {
        plan_ids.push(row?);
    }
    Ok(plan_ids)
}
