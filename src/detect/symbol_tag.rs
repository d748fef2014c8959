use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::trace;

use super::{DetectionConfig, ReferenceDetector, fold_token, normalize_box, normalize_symbol_tag_ref};
use crate::cli::PairingMode;
use crate::model::{CandidateKind, PageText, ReferenceCandidate, TextBox};

/// Produces the (top, bottom) index pairs worth testing for stacking.
///
/// Implementations may prune, but must return every pair that could pass the
/// geometric test, ordered by top index and then bottom index.
pub trait PairingStrategy {
    fn name(&self) -> &'static str;

    fn candidate_pairs(
        &self,
        boxes: &[TextBox],
        tops: &[usize],
        bottoms: &[usize],
        max_center_tolerance: f64,
    ) -> Vec<(usize, usize)>;
}

pub struct AllPairs;

impl PairingStrategy for AllPairs {
    fn name(&self) -> &'static str {
        "all_pairs"
    }

    fn candidate_pairs(
        &self,
        _boxes: &[TextBox],
        tops: &[usize],
        bottoms: &[usize],
        _max_center_tolerance: f64,
    ) -> Vec<(usize, usize)> {
        tops.iter()
            .flat_map(|top| bottoms.iter().map(move |bottom| (*top, *bottom)))
            .filter(|(top, bottom)| top != bottom)
            .collect()
    }
}

/// Buckets bottom codes into columns one tolerance wide, so a top code only
/// looks at its own column and the two neighbours.
pub struct GridBuckets;

impl PairingStrategy for GridBuckets {
    fn name(&self) -> &'static str {
        "grid_buckets"
    }

    fn candidate_pairs(
        &self,
        boxes: &[TextBox],
        tops: &[usize],
        bottoms: &[usize],
        max_center_tolerance: f64,
    ) -> Vec<(usize, usize)> {
        let cell = max_center_tolerance.max(1.0);
        let column_of = |text_box: &TextBox| (text_box.center_x() / cell).floor() as i64;

        let mut columns = HashMap::<i64, Vec<usize>>::new();
        for bottom in bottoms {
            columns.entry(column_of(&boxes[*bottom])).or_default().push(*bottom);
        }

        let mut pairs = Vec::new();
        for top in tops {
            let column = column_of(&boxes[*top]);
            let mut nearby = (column - 1..=column + 1)
                .filter_map(|key| columns.get(&key))
                .flatten()
                .copied()
                .filter(|bottom| bottom != top)
                .collect::<Vec<usize>>();
            nearby.sort_unstable();
            pairs.extend(nearby.into_iter().map(|bottom| (*top, bottom)));
        }

        pairs
    }
}

/// Finds circular callout symbols: an alphabetic discipline code stacked above
/// a numeric detail code.
pub struct SymbolTagDetector {
    alpha_pattern: Regex,
    numeric_pattern: Regex,
    config: DetectionConfig,
}

impl SymbolTagDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        Ok(Self {
            alpha_pattern: Regex::new(r"^[A-Z]{1,4}$")
                .context("failed to compile symbol alpha regex")?,
            numeric_pattern: Regex::new(r"^[0-9]{1,3}[A-Z]?$")
                .context("failed to compile symbol numeric regex")?,
            config: config.clone(),
        })
    }

    fn strategy_for(&self, box_count: usize) -> Box<dyn PairingStrategy> {
        match self.config.pairing {
            PairingMode::AllPairs => Box::new(AllPairs),
            PairingMode::Grid => Box::new(GridBuckets),
            PairingMode::Auto if box_count > self.config.grid_threshold => Box::new(GridBuckets),
            PairingMode::Auto => Box::new(AllPairs),
        }
    }

    pub fn detect_with(
        &self,
        page: &PageText,
        strategy: &dyn PairingStrategy,
    ) -> Vec<ReferenceCandidate> {
        let folded = page
            .boxes
            .iter()
            .map(|text_box| fold_token(&text_box.text))
            .collect::<Vec<String>>();

        let tops = folded
            .iter()
            .enumerate()
            .filter(|(_, token)| self.is_alpha_code(token))
            .map(|(index, _)| index)
            .collect::<Vec<usize>>();
        let bottoms = folded
            .iter()
            .enumerate()
            .filter(|(_, token)| self.numeric_pattern.is_match(token))
            .map(|(index, _)| index)
            .collect::<Vec<usize>>();
        if tops.is_empty() || bottoms.is_empty() {
            return Vec::new();
        }

        let widest = tops
            .iter()
            .chain(bottoms.iter())
            .map(|index| page.boxes[*index].width)
            .fold(0.0_f64, f64::max);
        let max_center_tolerance = self
            .config
            .center_tolerance_px
            .max(self.config.center_tolerance_ratio * widest);

        let mut seen = HashSet::<(u32, String, i64, i64)>::new();
        let mut candidates = Vec::new();

        for (top_index, bottom_index) in
            strategy.candidate_pairs(&page.boxes, &tops, &bottoms, max_center_tolerance)
        {
            let top = &page.boxes[top_index];
            let bottom = &page.boxes[bottom_index];
            if !self.is_stacked(top, bottom) {
                continue;
            }

            let alpha = &folded[top_index];
            let numeric = &folded[bottom_index];
            let normalized_ref = normalize_symbol_tag_ref(alpha, numeric);

            let left = top.x.min(bottom.x);
            let upper = top.y.min(bottom.y);
            let right = top.right().max(bottom.right());
            let lower = top.bottom().max(bottom.bottom());

            let dedup = (
                page.page_number,
                normalized_ref.clone(),
                left.round() as i64,
                upper.round() as i64,
            );
            if !seen.insert(dedup) {
                continue;
            }

            candidates.push(ReferenceCandidate {
                source_page: page.page_number,
                reference_text: format!("{alpha} {numeric}"),
                normalized_ref,
                bbox: normalize_box(
                    left,
                    upper,
                    right - left,
                    lower - upper,
                    page.width_px,
                    page.height_px,
                    self.config.min_box_size,
                ),
                confidence: self.config.symbol_tag_confidence,
                kind: CandidateKind::SymbolTag,
            });
        }

        candidates
    }

    fn is_alpha_code(&self, token: &str) -> bool {
        let length = token.chars().count();
        self.alpha_pattern.is_match(token)
            && length >= self.config.min_alpha_chars
            && length <= self.config.max_alpha_chars
    }

    fn is_stacked(&self, top: &TextBox, bottom: &TextBox) -> bool {
        let center_tolerance = self
            .config
            .center_tolerance_px
            .max(self.config.center_tolerance_ratio * top.width.max(bottom.width));
        if (top.center_x() - bottom.center_x()).abs() > center_tolerance {
            return false;
        }

        let gap = bottom.y - top.bottom();
        let max_gap = self
            .config
            .max_vertical_gap_px
            .max(self.config.vertical_gap_ratio * (top.height + bottom.height));

        gap >= self.config.min_vertical_gap_px && gap <= max_gap
    }
}

impl ReferenceDetector for SymbolTagDetector {
    fn kind(&self) -> CandidateKind {
        CandidateKind::SymbolTag
    }

    fn detect(&self, page: &PageText) -> Vec<ReferenceCandidate> {
        let strategy = self.strategy_for(page.boxes.len());
        trace!(
            page = page.page_number,
            boxes = page.boxes.len(),
            strategy = strategy.name(),
            "pairing symbol tag codes"
        );
        self.detect_with(page, strategy.as_ref())
    }
}
