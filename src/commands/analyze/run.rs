use super::*;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_deref());
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.cache_root.join("manifests").join(format!(
            "analysis_run_{}_{}.json",
            sanitize_for_filename(&args.plan_id),
            utc_compact_string(started_ts)
        ))
    });

    info!(plan_id = %args.plan_id, run_id = %run_id, db = %db_path.display(), "starting analysis");

    let mut connection = open_database(&db_path)?;

    if args.if_unindexed {
        let indexed = count_rows_for_plan(
            &connection,
            "SELECT COUNT(*) FROM page_records WHERE plan_id = ?1",
            &args.plan_id,
        )?;
        if indexed > 0 {
            info!(plan_id = %args.plan_id, pages = indexed, "plan already indexed; skipping analysis");
            return Ok(());
        }
    }

    if args.force_unlock {
        warn!(plan_id = %args.plan_id, "clearing analysis lock before run");
        clear_run_lock(&connection, &args.plan_id)?;
    }

    let (provider, source_sha256): (Box<dyn TextLayerProvider>, Option<String>) =
        match (&args.text_layer, &args.pdf) {
            (Some(path), _) => (Box::new(JsonTextLayer::open(path)?), Some(sha256_file(path)?)),
            (None, Some(path)) => (Box::new(PdftohtmlTextLayer::new(path)?), Some(sha256_file(path)?)),
            (None, None) => bail!("either --text-layer or --pdf is required"),
        };

    let metadata = match &args.page_metadata {
        Some(path) => load_page_metadata(path, &args.plan_id)?,
        None => BTreeMap::new(),
    };

    let config = DetectionConfig {
        pairing: args.pairing,
        extra_sheet_patterns: args.sheet_patterns.clone(),
        unresolved_limit: args.unresolved_limit,
        ..DetectionConfig::default()
    };
    let analyzer = Analyzer::new(config)?;
    info!(
        pairing = args.pairing.as_str(),
        extra_patterns = args.sheet_patterns.len(),
        render_scale = args.render_scale,
        "detection configured"
    );
    let options = PlanRunOptions {
        render_scale: args.render_scale,
        max_pages: args.max_pages,
    };

    let (lock_version, outcome) =
        with_run_lock(&mut connection, &args.plan_id, &run_id, |connection, version| {
            let outcome = execute_plan_run(
                connection,
                &args.plan_id,
                provider.as_ref(),
                &metadata,
                &analyzer,
                &options,
            )?;
            Ok((version, outcome))
        })?;

    let manifest = AnalysisRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        plan_id: args.plan_id.clone(),
        status: if outcome.warnings.is_empty() {
            "completed".to_string()
        } else {
            "completed_with_warnings".to_string()
        },
        started_at,
        updated_at: now_utc_string(),
        lock_version,
        source_sha256,
        paths: AnalysisPaths {
            db_path: db_path.display().to_string(),
            text_layer_source: provider.describe(),
            page_metadata_path: args
                .page_metadata
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        counts: outcome.counts.clone(),
        unresolved: outcome.unresolved.clone(),
        warnings: outcome.warnings.clone(),
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote analysis run manifest");
    info!(
        plan_id = %args.plan_id,
        pages = outcome.counts.page_count,
        links = outcome.counts.links_persisted,
        unresolved = outcome.counts.unresolved_count,
        warnings = outcome.warnings.len(),
        "analysis completed"
    );

    Ok(())
}

#[derive(Debug, Clone)]
pub(crate) struct PlanRunOptions {
    pub render_scale: f64,
    pub max_pages: Option<usize>,
}

impl Default for PlanRunOptions {
    fn default() -> Self {
        Self {
            render_scale: 1.0,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PlanRunOutcome {
    pub counts: AnalysisCounts,
    pub unresolved: Vec<UnresolvedReference>,
    pub warnings: Vec<String>,
}

/// Runs `body` while holding the plan's analysis lock.
pub(crate) fn with_run_lock<T>(
    connection: &mut Connection,
    plan_id: &str,
    run_id: &str,
    body: impl FnOnce(&mut Connection, i64) -> Result<T>,
) -> Result<T> {
    let version = acquire_run_lock(connection, plan_id, run_id)?;
    let outcome = body(connection, version);

    match release_run_lock(connection, plan_id, version) {
        Ok(true) => {}
        Ok(false) => warn!(plan_id, version, "analysis lock changed hands before release"),
        Err(error) => warn!(plan_id, version, error = %error, "failed to release analysis lock"),
    }

    outcome
}

/// Extracts every page (saving its record as soon as it is known), then
/// resolves references across the whole plan and replaces the automatic links.
pub(crate) fn execute_plan_run(
    connection: &mut Connection,
    plan_id: &str,
    provider: &dyn TextLayerProvider,
    metadata: &BTreeMap<u32, PageRecord>,
    analyzer: &Analyzer,
    options: &PlanRunOptions,
) -> Result<PlanRunOutcome> {
    let mut outcome = PlanRunOutcome::default();

    let mut total = provider.page_count()?;
    if let Some(max_pages) = options.max_pages {
        total = total.min(u32::try_from(max_pages).unwrap_or(u32::MAX));
    }
    outcome.counts.page_count = total as usize;

    let mut pages = Vec::with_capacity(total as usize);
    let mut records = Vec::with_capacity(total as usize);

    for page_number in 1..=total {
        let page_text = match provider.load_page(page_number) {
            Ok(layer) => {
                outcome.counts.pages_extracted += 1;
                let mut page_text = extract_text_boxes(&layer, options.render_scale);
                page_text.page_number = page_number;
                page_text
            }
            Err(error) => {
                warn!(plan_id, page = page_number, error = %error, "page text extraction failed");
                outcome
                    .warnings
                    .push(format!("page {page_number}: text extraction failed: {error}"));
                outcome.counts.pages_failed += 1;
                PageText {
                    page_number,
                    ..PageText::default()
                }
            }
        };

        let blob = page_text_blob(&page_text);
        let inferred = analyzer.fallback_record(plan_id, &page_text, &blob);
        let record = merge_page_record(metadata.get(&page_number), inferred);
        upsert_page_record(connection, &record)?;

        outcome.counts.text_boxes += page_text.boxes.len();
        info!(
            plan_id,
            page = page_number,
            total,
            boxes = page_text.boxes.len(),
            sheet = %record.sheet_number.as_deref().unwrap_or("-"),
            "extracted page"
        );

        pages.push(page_text);
        records.push(record);
    }

    let analysis = analyzer.analyze_plan(plan_id, &pages, &records);
    outcome.counts.candidates_detected = analysis.candidates_detected;
    outcome.counts.links_built = analysis.links.len();
    outcome.counts.unresolved_count = analysis.unresolved.len();
    outcome.counts.revision_groups = analysis.revisions.len();
    outcome.unresolved = analysis.unresolved;

    match replace_auto_links(connection, plan_id, &analysis.links) {
        Ok(inserted) => outcome.counts.links_persisted = inserted,
        Err(error) => {
            warn!(plan_id, error = %error, "failed to write automatic links; rerun analysis to repair");
            outcome
                .warnings
                .push(format!("automatic link write failed: {error}"));
        }
    }

    for unresolved in &outcome.unresolved {
        debug!(
            page = unresolved.source_page,
            reference = %unresolved.reference_text,
            kind = unresolved.kind.as_str(),
            "unresolved reference"
        );
    }

    Ok(outcome)
}

fn sanitize_for_filename(value: &str) -> String {
    value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || character == '-' {
                character
            } else {
                '_'
            }
        })
        .collect()
}
