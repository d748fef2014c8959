use std::collections::HashSet;

use super::ResolvedCandidate;
use crate::model::PageLink;
use crate::util::round_to;

const BBOX_DECIMALS: i32 = 4;

pub fn dedup_key(
    source_page: u32,
    target_page: u32,
    normalized_ref: &str,
    x_norm: f64,
    y_norm: f64,
) -> String {
    format!("{source_page}:{target_page}:{normalized_ref}:{x_norm:.4}:{y_norm:.4}")
}

/// Turns resolved candidates into automatic link rows. The first row for each
/// dedup key wins, so a rerun over the same input yields the same set.
pub fn build_links(plan_id: &str, resolved: &[ResolvedCandidate], min_box_size: f64) -> Vec<PageLink> {
    let mut seen = HashSet::<String>::new();
    let mut links = Vec::with_capacity(resolved.len());

    for entry in resolved {
        let candidate = &entry.candidate;
        let target = &entry.target;
        if candidate.normalized_ref.is_empty() || candidate.source_page == target.page_number {
            continue;
        }

        let x_norm = round_to(candidate.bbox.x.clamp(0.0, 1.0), BBOX_DECIMALS);
        let y_norm = round_to(candidate.bbox.y.clamp(0.0, 1.0), BBOX_DECIMALS);
        let width_norm = round_to(candidate.bbox.width.clamp(min_box_size, 1.0), BBOX_DECIMALS);
        let height_norm = round_to(candidate.bbox.height.clamp(min_box_size, 1.0), BBOX_DECIMALS);

        let key = dedup_key(
            candidate.source_page,
            target.page_number,
            &candidate.normalized_ref,
            x_norm,
            y_norm,
        );
        if !seen.insert(key.clone()) {
            continue;
        }

        links.push(PageLink {
            id: None,
            plan_id: plan_id.to_string(),
            source_page: candidate.source_page,
            target_page: target.page_number,
            reference_text: candidate.reference_text.clone(),
            target_sheet_number: target.sheet_number.clone(),
            target_title: target.title.clone(),
            x_norm,
            y_norm,
            width_norm,
            height_norm,
            confidence: Some(candidate.confidence.clamp(0.0, 1.0)),
            is_auto: true,
            dedup_key: key,
        });
    }

    links
}
