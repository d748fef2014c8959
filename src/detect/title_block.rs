use super::{RevisionLabelDetector, SheetRefDetector, normalize_sheet_ref};
use crate::model::{PageRecord, PageText};

// Title blocks sit in the lower-right part of a drawing sheet.
const TITLE_BLOCK_MIN_X: f64 = 0.6;
const TITLE_BLOCK_MIN_Y: f64 = 0.6;

/// Guesses a page's own sheet number: the tallest text run in the title block
/// region that is exactly one sheet number, lowest on the page on ties.
pub fn infer_sheet_number(page: &PageText, detector: &SheetRefDetector) -> Option<String> {
    if page.width_px <= 0.0 || page.height_px <= 0.0 {
        return None;
    }

    page.boxes
        .iter()
        .filter(|text_box| {
            text_box.center_x() / page.width_px >= TITLE_BLOCK_MIN_X
                && (text_box.y + text_box.height / 2.0) / page.height_px >= TITLE_BLOCK_MIN_Y
        })
        .filter(|text_box| detector.is_sheet_number(&text_box.text))
        .max_by(|left, right| {
            left.height
                .total_cmp(&right.height)
                .then_with(|| left.y.total_cmp(&right.y))
        })
        .map(|text_box| text_box.text.trim().to_uppercase())
}

pub fn infer_discipline(sheet_number: &str) -> Option<String> {
    let key = normalize_sheet_ref(sheet_number);
    let prefix = key
        .chars()
        .take_while(|character| character.is_ascii_alphabetic())
        .collect::<String>();

    let discipline = match prefix.as_str() {
        "FP" => "Fire Protection",
        "ID" => "Interiors",
        "LS" => "Life Safety",
        "A" => "Architectural",
        "C" => "Civil",
        "E" => "Electrical",
        "G" => "General",
        "I" => "Interiors",
        "L" => "Landscape",
        "M" => "Mechanical",
        "P" => "Plumbing",
        "Q" => "Equipment",
        "S" => "Structural",
        "T" => "Telecommunications",
        _ => return None,
    };

    Some(discipline.to_string())
}

/// Record for a page the metadata source knows nothing about (or whose
/// extraction failed): title `Sheet N` plus whatever the text itself reveals.
pub fn fallback_page_record(
    plan_id: &str,
    page: &PageText,
    blob: &str,
    sheet_refs: &SheetRefDetector,
    revision_labels: &RevisionLabelDetector,
) -> PageRecord {
    let sheet_number = infer_sheet_number(page, sheet_refs);
    let discipline = sheet_number.as_deref().and_then(infer_discipline);

    PageRecord {
        plan_id: plan_id.to_string(),
        page_number: page.page_number,
        sheet_number,
        page_title: Some(format!("Sheet {}", page.page_number)),
        discipline,
        description: None,
        revision_label: revision_labels.detect(blob),
    }
}
