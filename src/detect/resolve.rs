use std::collections::{BTreeMap, HashMap, HashSet};

use super::SheetRefDetector;
use crate::model::{
    CandidateKind, PageRecord, PageText, ReferenceCandidate, UnresolvedReference,
};
use crate::util::condense_whitespace;

const PREFERRED_TITLE_KEYWORDS: [&str; 4] = ["SCHEDULE", "EQUIPMENT", "LEGEND", "DETAIL"];

#[derive(Debug, Clone, PartialEq)]
pub struct SheetTarget {
    pub page_number: u32,
    pub sheet_number: Option<String>,
    pub title: Option<String>,
}

impl SheetTarget {
    fn from_record(record: &PageRecord) -> Self {
        Self {
            page_number: record.page_number,
            sheet_number: record.sheet_number.clone(),
            title: record.page_title.clone(),
        }
    }
}

/// Normalized sheet key to destination page.
///
/// Declared sheet numbers are indexed before sheet numbers found inside
/// titles, and the first page to claim a key keeps it.
#[derive(Debug, Default)]
pub struct SheetIndex {
    entries: HashMap<String, SheetTarget>,
}

impl SheetIndex {
    pub fn build(records: &[PageRecord], detector: &SheetRefDetector) -> Self {
        let mut ordered = records.iter().collect::<Vec<&PageRecord>>();
        ordered.sort_by_key(|record| record.page_number);

        let mut entries = HashMap::<String, SheetTarget>::new();
        for record in &ordered {
            let Some(sheet_number) = record.sheet_number.as_deref() else {
                continue;
            };
            let key = super::normalize_sheet_ref(sheet_number);
            if key.is_empty() {
                continue;
            }
            entries
                .entry(key)
                .or_insert_with(|| SheetTarget::from_record(record));
        }

        for record in &ordered {
            let Some(title) = record.page_title.as_deref() else {
                continue;
            };
            for key in detector.sheet_keys_in(&title.to_uppercase()) {
                entries
                    .entry(key)
                    .or_insert_with(|| SheetTarget::from_record(record));
            }
        }

        Self { entries }
    }

    pub fn lookup(&self, key: &str) -> Option<&SheetTarget> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Uppercased, whitespace-condensed text of a whole page.
pub fn page_text_blob(page: &PageText) -> String {
    let joined = page
        .boxes
        .iter()
        .map(|text_box| text_box.text.as_str())
        .collect::<Vec<&str>>()
        .join(" ");
    condense_whitespace(&joined).to_uppercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCandidate {
    pub candidate: ReferenceCandidate,
    pub target: SheetTarget,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub resolved: Vec<ResolvedCandidate>,
    pub unresolved: Vec<UnresolvedReference>,
}

pub struct TargetResolver<'a> {
    index: SheetIndex,
    records: BTreeMap<u32, &'a PageRecord>,
    blobs: BTreeMap<u32, &'a str>,
    unresolved_limit: usize,
}

impl<'a> TargetResolver<'a> {
    /// `blobs` must hold every page's text before resolution starts; symbol
    /// tags fall back to searching other pages' text.
    pub fn new(
        records: &'a [PageRecord],
        blobs: &'a BTreeMap<u32, String>,
        detector: &SheetRefDetector,
        unresolved_limit: usize,
    ) -> Self {
        Self {
            index: SheetIndex::build(records, detector),
            records: records
                .iter()
                .map(|record| (record.page_number, record))
                .collect(),
            blobs: blobs
                .iter()
                .map(|(page, blob)| (*page, blob.as_str()))
                .collect(),
            unresolved_limit,
        }
    }

    pub fn index(&self) -> &SheetIndex {
        &self.index
    }

    pub fn resolve(&self, candidates: Vec<ReferenceCandidate>) -> Resolution {
        let mut resolution = Resolution::default();
        let mut unresolved_seen = HashSet::<(u32, String)>::new();

        for candidate in candidates {
            if candidate.normalized_ref.is_empty() {
                continue;
            }

            let target = match self.index.lookup(&candidate.normalized_ref) {
                Some(target) => Some(target.clone()),
                None if candidate.kind == CandidateKind::SymbolTag => self.search_symbol_tag(
                    candidate.source_page,
                    &candidate.normalized_ref,
                ),
                None => None,
            };

            match target {
                Some(target) if target.page_number == candidate.source_page => {}
                Some(target) => resolution
                    .resolved
                    .push(ResolvedCandidate { candidate, target }),
                None => {
                    let key = (
                        candidate.source_page,
                        candidate.reference_text.to_uppercase(),
                    );
                    if resolution.unresolved.len() >= self.unresolved_limit
                        || !unresolved_seen.insert(key)
                    {
                        continue;
                    }
                    resolution.unresolved.push(UnresolvedReference {
                        source_page: candidate.source_page,
                        reference_text: candidate.reference_text,
                        normalized_ref: candidate.normalized_ref,
                        kind: candidate.kind,
                    });
                }
            }
        }

        resolution
    }

    fn search_symbol_tag(&self, source_page: u32, normalized_ref: &str) -> Option<SheetTarget> {
        let alpha = normalized_ref
            .chars()
            .take_while(|character| character.is_ascii_alphabetic())
            .collect::<String>();
        let numeric = &normalized_ref[alpha.len()..];
        if alpha.is_empty() || numeric.is_empty() {
            return None;
        }

        let variants = [
            format!("{alpha}{numeric}"),
            format!("{alpha}-{numeric}"),
            format!("{alpha} {numeric}"),
        ];

        let matches = self
            .blobs
            .iter()
            .filter(|(page, _)| **page != source_page)
            .filter(|(_, blob)| variants.iter().any(|variant| blob.contains(variant.as_str())))
            .map(|(page, _)| *page)
            .collect::<Vec<u32>>();

        let preferred = matches.iter().copied().find(|page| {
            self.records
                .get(page)
                .and_then(|record| record.page_title.as_deref())
                .map(|title| {
                    let title = title.to_uppercase();
                    PREFERRED_TITLE_KEYWORDS
                        .iter()
                        .any(|keyword| title.contains(keyword))
                })
                .unwrap_or(false)
        });

        let page = preferred.or_else(|| matches.first().copied())?;
        Some(match self.records.get(&page) {
            Some(record) => SheetTarget::from_record(record),
            None => SheetTarget {
                page_number: page,
                sheet_number: None,
                title: None,
            },
        })
    }
}
