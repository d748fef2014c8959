use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;

use super::normalize_sheet_ref;
use crate::model::{PageRecord, PageRevision, RevisionGroup};

const ORIGINAL_REVISION_LABEL: &str = "Original";

/// Finds the newest revision marker ("REV 3", "REVISION B", "REV. NO. 2") in a
/// page's uppercase text blob.
///
/// A letter revision needs a separator after `REV`/`REVISION`, so the heading
/// "REVISIONS" never reads as revision S. Digits may follow directly ("REV3").
#[derive(Debug, Clone)]
pub struct RevisionLabelDetector {
    pattern: Regex,
}

impl RevisionLabelDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(
                r"\bREV(?:ISION)?(?:[.#]?\s*(?:NO\.?\s*)?([0-9]{1,3})|(?:\.\s*|#\s*|\s+)(?:NO\.?\s*)?([A-Z]))\b",
            )
            .context("failed to compile revision label regex")?,
        })
    }

    pub fn detect(&self, blob: &str) -> Option<String> {
        self.pattern
            .captures_iter(blob)
            .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
            .map(|value| format!("REV {}", value.as_str()))
            .max_by_key(|label| revision_sort_value(label).unwrap_or(i64::MIN))
    }
}

/// Numeric revisions sort by value, single-letter revisions by alphabet position.
pub fn revision_sort_value(label: &str) -> Option<i64> {
    let token = label
        .trim()
        .rsplit(|character: char| character.is_whitespace())
        .next()?
        .trim_start_matches(['.', '#']);

    if !token.is_empty() && token.chars().all(|character| character.is_ascii_digit()) {
        return token.parse::<i64>().ok();
    }

    let mut characters = token.chars();
    match (characters.next(), characters.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Some(i64::from(letter.to_ascii_uppercase() as u8 - b'A') + 1)
        }
        _ => None,
    }
}

fn sheet_key_for(sheet_number: Option<&str>, page_number: u32) -> String {
    sheet_number
        .map(normalize_sheet_ref)
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| format!("PAGE{page_number}"))
}

/// Builds one revision row per page. Within each sheet key the row with the
/// highest (sort, page) is current.
pub fn derive_revisions(plan_id: &str, records: &[PageRecord]) -> Vec<PageRevision> {
    let mut rows = records
        .iter()
        .map(|record| {
            let (revision_label, revision_sort) = match record.revision_label.as_deref() {
                Some(label) if !label.trim().is_empty() => {
                    (label.trim().to_string(), revision_sort_value(label))
                }
                _ => (ORIGINAL_REVISION_LABEL.to_string(), Some(0)),
            };

            PageRevision {
                id: format!("{}:{}", plan_id, record.page_number),
                plan_id: plan_id.to_string(),
                target_page: record.page_number,
                sheet_number: record.sheet_number.clone(),
                sheet_key: sheet_key_for(record.sheet_number.as_deref(), record.page_number),
                revision_label,
                revision_sort,
                is_current: Some(false),
            }
        })
        .collect::<Vec<PageRevision>>();

    let mut newest = BTreeMap::<String, usize>::new();
    for (index, row) in rows.iter().enumerate() {
        let replace = match newest.get(&row.sheet_key) {
            Some(current) => {
                let current = &rows[*current];
                (row.revision_sort.unwrap_or(i64::MIN), row.target_page)
                    > (current.revision_sort.unwrap_or(i64::MIN), current.target_page)
            }
            None => true,
        };
        if replace {
            newest.insert(row.sheet_key.clone(), index);
        }
    }
    for index in newest.into_values() {
        rows[index].is_current = Some(true);
    }

    rows
}

/// Groups revision rows by sheet key; rows without a key fall back to
/// `PAGE<n>`. Each group lists the newest/current revision first.
pub fn group_revisions(rows: &[PageRevision]) -> Vec<RevisionGroup> {
    let mut groups = BTreeMap::<String, Vec<PageRevision>>::new();
    for row in rows {
        let key = if row.sheet_key.trim().is_empty() {
            sheet_key_for(row.sheet_number.as_deref(), row.target_page)
        } else {
            row.sheet_key.clone()
        };
        groups.entry(key).or_default().push(row.clone());
    }

    groups
        .into_iter()
        .map(|(sheet_key, mut revisions)| {
            revisions.sort_by(compare_revisions);
            RevisionGroup {
                sheet_key,
                revisions,
            }
        })
        .collect()
}

fn compare_revisions(left: &PageRevision, right: &PageRevision) -> Ordering {
    right
        .revision_sort
        .unwrap_or(i64::MIN)
        .cmp(&left.revision_sort.unwrap_or(i64::MIN))
        .then_with(|| {
            right
                .is_current
                .unwrap_or(false)
                .cmp(&left.is_current.unwrap_or(false))
        })
        .then_with(|| right.target_page.cmp(&left.target_page))
}
