use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RevisionsArgs;
use crate::commands::analyze::{load_page_records, open_database, resolve_db_path};
use crate::detect::{derive_revisions, group_revisions, normalize_sheet_ref};

pub fn run(args: RevisionsArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_deref());
    let connection = open_database(&db_path)?;
    let records = load_page_records(&connection, &args.plan_id)?;
    if records.is_empty() {
        warn!(plan_id = %args.plan_id, "plan has no indexed pages");
    }

    let wanted = args.sheet.as_deref().map(normalize_sheet_ref);
    let groups = group_revisions(&derive_revisions(&args.plan_id, &records))
        .into_iter()
        .filter(|group| wanted.as_ref().map(|key| &group.sheet_key == key).unwrap_or(true))
        .collect::<Vec<_>>();

    if args.json {
        let payload =
            serde_json::to_string_pretty(&groups).context("failed to serialize revisions")?;
        println!("{payload}");
        return Ok(());
    }

    for group in &groups {
        let chain = group
            .revisions
            .iter()
            .map(|revision| {
                let marker = if revision.is_current.unwrap_or(false) { "*" } else { "" };
                format!("p{} {}{}", revision.target_page, revision.revision_label, marker)
            })
            .collect::<Vec<String>>()
            .join(" > ");
        info!(sheet = %group.sheet_key, revisions = group.revisions.len(), chain = %chain, "revision group");
    }
    info!(plan_id = %args.plan_id, groups = groups.len(), "revisions listed");

    Ok(())
}
