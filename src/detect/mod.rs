//! Sheet cross-reference detection and link resolution.
//!
//! Everything in this module is pure: it takes extracted page text and page
//! metadata and returns links, revision groups and unresolved references.
//! Callers own persistence.

use crate::cli::PairingMode;
use crate::model::{CandidateKind, PageText, ReferenceCandidate};

mod geometry;
mod links;
mod normalize;
mod pipeline;
mod resolve;
mod revisions;
mod sheet_ref;
mod symbol_tag;
mod title_block;
#[cfg(test)]
mod tests;

pub use geometry::{extract_text_boxes, normalize_box};
pub use links::build_links;
pub use normalize::{fold_token, normalize_sheet_ref, normalize_symbol_tag_ref};
pub use pipeline::Analyzer;
pub use resolve::{ResolvedCandidate, TargetResolver, page_text_blob};
pub use revisions::{RevisionLabelDetector, derive_revisions, group_revisions};
pub use sheet_ref::SheetRefDetector;
pub use symbol_tag::SymbolTagDetector;
pub use title_block::fallback_page_record;

#[cfg(test)]
use links::dedup_key;
#[cfg(test)]
use resolve::SheetTarget;
#[cfg(test)]
use revisions::revision_sort_value;
#[cfg(test)]
use symbol_tag::{AllPairs, GridBuckets};
#[cfg(test)]
use title_block::infer_discipline;

pub const SHEET_REF_CONFIDENCE: f64 = 0.75;
pub const SYMBOL_TAG_CONFIDENCE: f64 = 0.62;

/// Tuned thresholds. Pixel values assume the text boxes were laid out at the
/// configured render scale.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub sheet_ref_confidence: f64,
    pub symbol_tag_confidence: f64,
    pub max_run_chars: usize,
    /// Single-letter discipline codes (`M` over `3`) pair by default.
    pub min_alpha_chars: usize,
    pub max_alpha_chars: usize,
    pub center_tolerance_px: f64,
    pub center_tolerance_ratio: f64,
    pub min_vertical_gap_px: f64,
    pub max_vertical_gap_px: f64,
    pub vertical_gap_ratio: f64,
    pub min_box_size: f64,
    pub unresolved_limit: usize,
    pub pairing: PairingMode,
    pub grid_threshold: usize,
    pub extra_sheet_patterns: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sheet_ref_confidence: SHEET_REF_CONFIDENCE,
            symbol_tag_confidence: SYMBOL_TAG_CONFIDENCE,
            max_run_chars: 48,
            min_alpha_chars: 1,
            max_alpha_chars: 4,
            center_tolerance_px: 12.0,
            center_tolerance_ratio: 0.8,
            min_vertical_gap_px: -4.0,
            max_vertical_gap_px: 28.0,
            vertical_gap_ratio: 1.4,
            min_box_size: 0.01,
            unresolved_limit: 200,
            pairing: PairingMode::Auto,
            grid_threshold: 400,
            extra_sheet_patterns: Vec::new(),
        }
    }
}

/// A strategy that turns one page of text boxes into reference candidates.
pub trait ReferenceDetector {
    fn kind(&self) -> CandidateKind;

    fn detect(&self, page: &PageText) -> Vec<ReferenceCandidate>;
}
