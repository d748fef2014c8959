use super::*;

pub(crate) fn resolve_db_path(cache_root: &Path, db_path: Option<&Path>) -> PathBuf {
    db_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_root.join("sheetlinks.sqlite"))
}

pub(crate) fn open_database(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub(crate) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS page_records (
          plan_id TEXT NOT NULL,
          page_number INTEGER NOT NULL,
          sheet_number TEXT,
          page_title TEXT,
          discipline TEXT,
          description TEXT,
          revision_label TEXT,
          updated_at TEXT NOT NULL,
          PRIMARY KEY (plan_id, page_number)
        );

        CREATE TABLE IF NOT EXISTS page_links (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          plan_id TEXT NOT NULL,
          source_page INTEGER NOT NULL,
          target_page INTEGER NOT NULL,
          reference_text TEXT NOT NULL,
          target_sheet_number TEXT,
          target_title TEXT,
          x_norm REAL NOT NULL CHECK (x_norm BETWEEN 0 AND 1),
          y_norm REAL NOT NULL CHECK (y_norm BETWEEN 0 AND 1),
          width_norm REAL NOT NULL CHECK (width_norm BETWEEN 0 AND 1),
          height_norm REAL NOT NULL CHECK (height_norm BETWEEN 0 AND 1),
          confidence REAL,
          is_auto INTEGER NOT NULL DEFAULT 0,
          dedup_key TEXT NOT NULL,
          created_at TEXT NOT NULL,
          UNIQUE (plan_id, dedup_key),
          CHECK (source_page <> target_page)
        );

        CREATE TABLE IF NOT EXISTS plan_analysis_state (
          plan_id TEXT PRIMARY KEY,
          in_progress INTEGER NOT NULL DEFAULT 0,
          version INTEGER NOT NULL DEFAULT 0,
          run_id TEXT,
          updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_page_links_plan_source ON page_links(plan_id, source_page);
        CREATE INDEX IF NOT EXISTS idx_page_links_plan_auto ON page_links(plan_id, is_auto);
        ",
        )
        .context("failed to initialize schema")?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}
