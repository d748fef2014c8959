use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

use super::{
    DetectionConfig, ReferenceDetector, RevisionLabelDetector, SheetRefDetector,
    SymbolTagDetector, TargetResolver, build_links, derive_revisions, fallback_page_record,
    group_revisions, page_text_blob,
};
use crate::model::{
    PageLink, PageRecord, PageText, ReferenceCandidate, RevisionGroup, UnresolvedReference,
};

#[derive(Debug, Clone, Default)]
pub struct PlanAnalysis {
    pub links: Vec<PageLink>,
    pub revisions: Vec<RevisionGroup>,
    pub unresolved: Vec<UnresolvedReference>,
    pub candidates_detected: usize,
}

pub struct Analyzer {
    sheet_refs: SheetRefDetector,
    symbol_tags: SymbolTagDetector,
    revision_labels: RevisionLabelDetector,
    config: DetectionConfig,
}

impl Analyzer {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        Ok(Self {
            sheet_refs: SheetRefDetector::new(&config)?,
            symbol_tags: SymbolTagDetector::new(&config)?,
            revision_labels: RevisionLabelDetector::new()?,
            config,
        })
    }

    /// Record for a page with no metadata, built from its own text.
    pub fn fallback_record(&self, plan_id: &str, page: &PageText, blob: &str) -> PageRecord {
        fallback_page_record(plan_id, page, blob, &self.sheet_refs, &self.revision_labels)
    }

    pub fn detect_page(&self, page: &PageText) -> Vec<ReferenceCandidate> {
        let detectors: [&dyn ReferenceDetector; 2] = [&self.sheet_refs, &self.symbol_tags];
        detectors
            .iter()
            .flat_map(|detector| {
                let found = detector.detect(page);
                debug!(
                    page = page.page_number,
                    kind = detector.kind().as_str(),
                    count = found.len(),
                    "detected candidates"
                );
                found
            })
            .collect()
    }

    /// (page text, page metadata) -> (links, revisions, unresolved).
    ///
    /// Every page's text blob is built before any candidate is resolved.
    pub fn analyze_plan(
        &self,
        plan_id: &str,
        pages: &[PageText],
        records: &[PageRecord],
    ) -> PlanAnalysis {
        let blobs = pages
            .iter()
            .map(|page| (page.page_number, page_text_blob(page)))
            .collect::<BTreeMap<u32, String>>();

        let mut ordered = pages.iter().collect::<Vec<&PageText>>();
        ordered.sort_by_key(|page| page.page_number);
        let candidates = ordered
            .into_iter()
            .flat_map(|page| self.detect_page(page))
            .collect::<Vec<ReferenceCandidate>>();
        let candidates_detected = candidates.len();

        let resolver = TargetResolver::new(
            records,
            &blobs,
            &self.sheet_refs,
            self.config.unresolved_limit,
        );
        debug!(keys = resolver.index().len(), "built sheet index");
        let resolution = resolver.resolve(candidates);

        let links = build_links(plan_id, &resolution.resolved, self.config.min_box_size);
        let revisions = group_revisions(&derive_revisions(plan_id, records));

        PlanAnalysis {
            links,
            revisions,
            unresolved: resolution.unresolved,
            candidates_detected,
        }
    }
}
