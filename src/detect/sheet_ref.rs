use anyhow::{Context, Result};
use regex::Regex;

use super::{DetectionConfig, ReferenceDetector, normalize_box, normalize_sheet_ref};
use crate::model::{CandidateKind, PageText, ReferenceCandidate, TextBox};

/// Optional `<digits>/` detail prefix, 1-4 letters, optional separator, 1-3
/// digits and an optional `.digits` suffix. The `sheet` group is the part that
/// gets resolved; the detail prefix only stays in the display text.
const DEFAULT_SHEET_PATTERN: &str = r"(?x)
    \b
    (?:\d{1,3}\s*/\s*)?
    (?P<sheet>[A-Z]{1,4}(?:\s?[-_]\s?)?\d{1,3}(?:\.\d{1,3})?)
    \b
";

/// Finds conventional sheet numbers ("A-101", "M1.2", "3/S-201") in running text.
#[derive(Debug, Clone)]
pub struct SheetRefDetector {
    patterns: Vec<Regex>,
    max_run_chars: usize,
    confidence: f64,
    min_box_size: f64,
}

impl SheetRefDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        let mut sources = vec![DEFAULT_SHEET_PATTERN.to_string()];
        sources.extend(config.extra_sheet_patterns.iter().cloned());
        Self::with_patterns(&sources, config)
    }

    /// Builds a detector from an explicit pattern set. A pattern may expose a
    /// `sheet` capture group; otherwise the whole match is resolved.
    pub fn with_patterns(sources: &[String], config: &DetectionConfig) -> Result<Self> {
        let patterns = sources
            .iter()
            .map(|source| {
                Regex::new(source)
                    .with_context(|| format!("failed to compile sheet pattern: {source}"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            patterns,
            max_run_chars: config.max_run_chars,
            confidence: config.sheet_ref_confidence,
            min_box_size: config.min_box_size,
        })
    }

    /// Every sheet-shaped substring of `text`, normalized, in match order.
    pub fn sheet_keys_in(&self, text: &str) -> Vec<String> {
        self.matches_in(text)
            .into_iter()
            .map(|found| normalize_sheet_ref(&found.sheet))
            .filter(|key| !key.is_empty())
            .collect()
    }

    /// True when the whole of `text` is a single sheet number.
    pub fn is_sheet_number(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.matches_in(trimmed)
            .iter()
            .any(|found| found.start == 0 && found.end == trimmed.len() && found.sheet == found.full)
    }

    fn matches_in(&self, text: &str) -> Vec<SheetMatch> {
        let mut found = Vec::<SheetMatch>::new();

        for pattern in &self.patterns {
            for captures in pattern.captures_iter(text) {
                let Some(full) = captures.get(0) else {
                    continue;
                };
                if full.as_str().trim().is_empty() {
                    continue;
                }
                if found
                    .iter()
                    .any(|existing| full.start() < existing.end && existing.start < full.end())
                {
                    continue;
                }

                let sheet = captures
                    .name("sheet")
                    .map(|value| value.as_str())
                    .unwrap_or(full.as_str());

                found.push(SheetMatch {
                    start: full.start(),
                    end: full.end(),
                    full: full.as_str().to_string(),
                    sheet: sheet.to_string(),
                });
            }
        }

        found.sort_by_key(|entry| entry.start);
        found
    }

    fn detect_in_box(
        &self,
        page: &PageText,
        text_box: &TextBox,
        out: &mut Vec<ReferenceCandidate>,
    ) {
        let text = text_box.text.as_str();
        let total_chars = text.chars().count();
        if total_chars > self.max_run_chars || !has_letter_and_digit(text) {
            return;
        }

        let char_width = text_box.width / total_chars.max(1) as f64;

        for found in self.matches_in(text) {
            let normalized_ref = normalize_sheet_ref(&found.sheet);
            if normalized_ref.is_empty() {
                continue;
            }

            let offset_chars = text[..found.start].chars().count() as f64;
            let match_chars = found.full.chars().count() as f64;
            let bbox = normalize_box(
                text_box.x + offset_chars * char_width,
                text_box.y,
                match_chars * char_width,
                text_box.height,
                page.width_px,
                page.height_px,
                self.min_box_size,
            );

            out.push(ReferenceCandidate {
                source_page: page.page_number,
                reference_text: found.full.trim().to_string(),
                normalized_ref,
                bbox,
                confidence: self.confidence,
                kind: CandidateKind::SheetRef,
            });
        }
    }
}

impl ReferenceDetector for SheetRefDetector {
    fn kind(&self) -> CandidateKind {
        CandidateKind::SheetRef
    }

    fn detect(&self, page: &PageText) -> Vec<ReferenceCandidate> {
        let mut candidates = Vec::new();
        for text_box in &page.boxes {
            self.detect_in_box(page, text_box, &mut candidates);
        }
        candidates
    }
}

#[derive(Debug, Clone)]
struct SheetMatch {
    start: usize,
    end: usize,
    full: String,
    sheet: String,
}

fn has_letter_and_digit(text: &str) -> bool {
    text.chars().any(|character| character.is_alphabetic())
        && text.chars().any(|character| character.is_ascii_digit())
}
