use super::*;

/// Loads externally produced page metadata (titles, disciplines, sheet numbers)
/// for `plan_id`. Entries without a plan id are taken as belonging to it.
pub(crate) fn load_page_metadata(path: &Path, plan_id: &str) -> Result<BTreeMap<u32, PageRecord>> {
    let entries: Vec<PageRecord> = read_json(path)?;
    Ok(index_page_metadata(entries, plan_id))
}

pub(crate) fn index_page_metadata(
    entries: Vec<PageRecord>,
    plan_id: &str,
) -> BTreeMap<u32, PageRecord> {
    let mut indexed = BTreeMap::new();
    for mut entry in entries {
        if entry.plan_id.is_empty() {
            entry.plan_id = plan_id.to_string();
        }
        if entry.plan_id != plan_id {
            warn!(
                page = entry.page_number,
                entry_plan = %entry.plan_id,
                plan_id,
                "ignoring page metadata for another plan"
            );
            continue;
        }
        if entry.page_number == 0 {
            warn!(plan_id, "ignoring page metadata without a page number");
            continue;
        }
        indexed.insert(entry.page_number, entry);
    }
    indexed
}

/// Metadata wins field by field; whatever it leaves empty comes from the
/// record inferred from the page text.
pub(crate) fn merge_page_record(known: Option<&PageRecord>, inferred: PageRecord) -> PageRecord {
    let Some(known) = known else {
        return inferred;
    };

    PageRecord {
        plan_id: inferred.plan_id,
        page_number: inferred.page_number,
        sheet_number: non_blank(&known.sheet_number).or(inferred.sheet_number),
        page_title: non_blank(&known.page_title).or(inferred.page_title),
        discipline: non_blank(&known.discipline).or(inferred.discipline),
        description: non_blank(&known.description).or(inferred.description),
        revision_label: non_blank(&known.revision_label).or(inferred.revision_label),
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
