use super::*;

pub(crate) fn upsert_page_record(connection: &Connection, record: &PageRecord) -> Result<()> {
    connection
        .execute(
            "
            INSERT INTO page_records(
              plan_id, page_number, sheet_number, page_title, discipline, description,
              revision_label, updated_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(plan_id, page_number) DO UPDATE SET
              sheet_number=excluded.sheet_number,
              page_title=excluded.page_title,
              discipline=excluded.discipline,
              description=excluded.description,
              revision_label=excluded.revision_label,
              updated_at=excluded.updated_at
            ",
            params![
                &record.plan_id,
                record.page_number,
                &record.sheet_number,
                &record.page_title,
                &record.discipline,
                &record.description,
                &record.revision_label,
                now_utc_string(),
            ],
        )
        .with_context(|| {
            format!(
                "failed to save page record {} for plan {}",
                record.page_number, record.plan_id
            )
        })?;
    Ok(())
}

pub(crate) fn load_page_records(connection: &Connection, plan_id: &str) -> Result<Vec<PageRecord>> {
    let mut statement = connection.prepare(
        "
        SELECT plan_id, page_number, sheet_number, page_title, discipline, description, revision_label
        FROM page_records
        WHERE plan_id = ?1
        ORDER BY page_number
        ",
    )?;

    let rows = statement.query_map([plan_id], |row| {
        Ok(PageRecord {
            plan_id: row.get(0)?,
            page_number: row.get(1)?,
            sheet_number: row.get(2)?,
            page_title: row.get(3)?,
            discipline: row.get(4)?,
            description: row.get(5)?,
            revision_label: row.get(6)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Deletes the plan's automatic links and inserts `links` in one transaction.
/// Manual links are never deleted, and an existing row with the same dedup
/// key wins over the new one.
pub(crate) fn replace_auto_links(
    connection: &mut Connection,
    plan_id: &str,
    links: &[PageLink],
) -> Result<usize> {
    let tx = connection.transaction()?;
    let now = now_utc_string();
    let mut inserted = 0usize;

    tx.execute(
        "DELETE FROM page_links WHERE plan_id = ?1 AND is_auto = 1",
        [plan_id],
    )
    .with_context(|| format!("failed to clear automatic links for plan {plan_id}"))?;

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO page_links(
              plan_id, source_page, target_page, reference_text, target_sheet_number,
              target_title, x_norm, y_norm, width_norm, height_norm, confidence, is_auto,
              dedup_key, created_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(plan_id, dedup_key) DO NOTHING
            ",
        )?;

        for link in links {
            inserted += statement.execute(params![
                plan_id,
                link.source_page,
                link.target_page,
                &link.reference_text,
                &link.target_sheet_number,
                &link.target_title,
                link.x_norm,
                link.y_norm,
                link.width_norm,
                link.height_norm,
                link.confidence,
                link.is_auto,
                &link.dedup_key,
                &now,
            ])?;
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit links for plan {plan_id}"))?;
    Ok(inserted)
}

pub(crate) fn load_links(connection: &Connection, plan_id: &str) -> Result<Vec<PageLink>> {
    let mut statement = connection.prepare(
        "
        SELECT id, plan_id, source_page, target_page, reference_text, target_sheet_number,
               target_title, x_norm, y_norm, width_norm, height_norm, confidence, is_auto,
               dedup_key
        FROM page_links
        WHERE plan_id = ?1
        ORDER BY source_page, id
        ",
    )?;

    let rows = statement.query_map([plan_id], |row| {
        Ok(PageLink {
            id: row.get(0)?,
            plan_id: row.get(1)?,
            source_page: row.get(2)?,
            target_page: row.get(3)?,
            reference_text: row.get(4)?,
            target_sheet_number: row.get(5)?,
            target_title: row.get(6)?,
            x_norm: row.get(7)?,
            y_norm: row.get(8)?,
            width_norm: row.get(9)?,
            height_norm: row.get(10)?,
            confidence: row.get(11)?,
            is_auto: row.get(12)?,
            dedup_key: row.get(13)?,
        })
    })?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

pub(crate) fn count_rows_for_plan(connection: &Connection, sql: &str, plan_id: &str) -> Result<i64> {
    connection
        .query_row(sql, [plan_id], |row| row.get(0))
        .with_context(|| format!("failed count query: {sql}"))
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunLockState {
    pub in_progress: bool,
    pub version: i64,
    pub run_id: Option<String>,
}

/// Flips the plan from idle to in-progress and returns the new lock version.
/// Fails when another run holds the plan.
pub(crate) fn acquire_run_lock(connection: &Connection, plan_id: &str, run_id: &str) -> Result<i64> {
    let now = now_utc_string();
    connection.execute(
        "INSERT INTO plan_analysis_state(plan_id, in_progress, version, run_id, updated_at)
         VALUES(?1, 0, 0, NULL, ?2)
         ON CONFLICT(plan_id) DO NOTHING",
        params![plan_id, &now],
    )?;

    let changed = connection.execute(
        "UPDATE plan_analysis_state
         SET in_progress = 1, version = version + 1, run_id = ?2, updated_at = ?3
         WHERE plan_id = ?1 AND in_progress = 0",
        params![plan_id, run_id, &now],
    )?;

    if changed == 0 {
        let holder = run_lock_state(connection, plan_id)?
            .and_then(|state| state.run_id)
            .unwrap_or_else(|| "unknown".to_string());
        bail!("analysis already in progress for plan {plan_id} (run {holder})");
    }

    connection
        .query_row(
            "SELECT version FROM plan_analysis_state WHERE plan_id = ?1",
            [plan_id],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to read lock version for plan {plan_id}"))
}

/// Releases the lock only if it still carries `version`.
pub(crate) fn release_run_lock(connection: &Connection, plan_id: &str, version: i64) -> Result<bool> {
    let changed = connection.execute(
        "UPDATE plan_analysis_state
         SET in_progress = 0, updated_at = ?3
         WHERE plan_id = ?1 AND version = ?2 AND in_progress = 1",
        params![plan_id, version, now_utc_string()],
    )?;
    Ok(changed == 1)
}

pub(crate) fn clear_run_lock(connection: &Connection, plan_id: &str) -> Result<()> {
    connection.execute(
        "UPDATE plan_analysis_state SET in_progress = 0, updated_at = ?2 WHERE plan_id = ?1",
        params![plan_id, now_utc_string()],
    )?;
    Ok(())
}

pub(crate) fn run_lock_state(connection: &Connection, plan_id: &str) -> Result<Option<RunLockState>> {
    connection
        .query_row(
            "SELECT in_progress, version, run_id FROM plan_analysis_state WHERE plan_id = ?1",
            [plan_id],
            |row| {
                Ok(RunLockState {
                    in_progress: row.get(0)?,
                    version: row.get(1)?,
                    run_id: row.get(2)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to read lock state for plan {plan_id}"))
}
