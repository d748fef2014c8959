use std::collections::BTreeMap;

use super::*;
use crate::model::{
    CandidateKind, NormBox, PageRecord, PageRevision, PageText, PageTextLayer, RawTextRun,
    ReferenceCandidate, TextBox,
};

fn text_box(text: &str, x: f64, y: f64, width: f64, height: f64) -> TextBox {
    TextBox {
        text: text.to_string(),
        x,
        y,
        width,
        height,
    }
}

fn page(page_number: u32, boxes: Vec<TextBox>) -> PageText {
    PageText {
        page_number,
        width_px: 1000.0,
        height_px: 800.0,
        boxes,
    }
}

fn record(page_number: u32, sheet_number: Option<&str>, title: Option<&str>) -> PageRecord {
    PageRecord {
        plan_id: "plan-1".to_string(),
        page_number,
        sheet_number: sheet_number.map(ToOwned::to_owned),
        page_title: title.map(ToOwned::to_owned),
        ..PageRecord::default()
    }
}

fn analyzer() -> Analyzer {
    Analyzer::new(DetectionConfig::default()).expect("analyzer")
}

fn revision(target_page: u32, revision_sort: Option<i64>, is_current: Option<bool>) -> PageRevision {
    PageRevision {
        id: format!("plan-1:{target_page}"),
        plan_id: "plan-1".to_string(),
        target_page,
        sheet_number: Some("A-101".to_string()),
        sheet_key: "A101".to_string(),
        revision_label: format!("REV {}", revision_sort.unwrap_or_default()),
        revision_sort,
        is_current,
    }
}

#[test]
fn normalize_sheet_ref_collapses_separator_forms() {
    assert_eq!(normalize_sheet_ref("A - 101"), "A101");
    assert_eq!(normalize_sheet_ref("A-101"), "A101");
    assert_eq!(normalize_sheet_ref("A101"), "A101");
    assert_eq!(normalize_sheet_ref(" a_101 "), "A101");
    assert_eq!(normalize_sheet_ref("m1.2"), "M1.2");
    assert_eq!(normalize_sheet_ref("101-A"), "101-A");
}

#[test]
fn normalize_symbol_tag_ref_joins_halves_without_separator() {
    assert_eq!(normalize_symbol_tag_ref(" ab ", "1 2a"), "AB12A");
}

#[test]
fn extract_text_boxes_flips_to_top_down_pixels() {
    let layer = PageTextLayer {
        page_number: 3,
        viewport_width: 612.0,
        viewport_height: 792.0,
        items: vec![
            RawTextRun {
                text: "A-101".to_string(),
                transform: Some(vec![10.0, 0.0, 0.0, 10.0, 100.0, 700.0]),
                width: Some(50.0),
                height: Some(10.0),
            },
            RawTextRun {
                text: "zero".to_string(),
                transform: Some(vec![10.0, 0.0, 0.0, 10.0, 100.0, 600.0]),
                width: Some(0.0),
                height: Some(10.0),
            },
            RawTextRun {
                text: "no transform".to_string(),
                transform: None,
                width: Some(40.0),
                height: Some(10.0),
            },
            RawTextRun {
                text: "short transform".to_string(),
                transform: Some(vec![1.0, 0.0]),
                width: Some(40.0),
                height: Some(10.0),
            },
            RawTextRun {
                text: "off page".to_string(),
                transform: Some(vec![10.0, 0.0, 0.0, 10.0, 900.0, 100.0]),
                width: Some(40.0),
                height: Some(10.0),
            },
        ],
    };

    let extracted = extract_text_boxes(&layer, 2.0);
    assert_eq!(extracted.page_number, 3);
    assert_eq!(extracted.width_px, 1224.0);
    assert_eq!(extracted.height_px, 1584.0);
    assert_eq!(extracted.boxes.len(), 1);

    let only = &extracted.boxes[0];
    assert_eq!(only.text, "A-101");
    assert_eq!(only.x, 200.0);
    assert_eq!(only.y, 164.0);
    assert_eq!(only.width, 100.0);
    assert_eq!(only.height, 20.0);
}

#[test]
fn extract_text_boxes_falls_back_to_font_height() {
    let layer = PageTextLayer {
        page_number: 1,
        viewport_width: 100.0,
        viewport_height: 100.0,
        items: vec![RawTextRun {
            text: "E-1".to_string(),
            transform: Some(vec![8.0, 0.0, 0.0, 8.0, 10.0, 50.0]),
            width: Some(12.0),
            height: None,
        }],
    };

    let extracted = extract_text_boxes(&layer, 1.0);
    assert_eq!(extracted.boxes.len(), 1);
    assert_eq!(extracted.boxes[0].height, 8.0);
    assert_eq!(extracted.boxes[0].y, 42.0);
}

#[test]
fn normalize_box_enforces_minimum_size_inside_page() {
    let bbox = normalize_box(998.0, 10.0, 1.0, 2.0, 1000.0, 800.0, 0.01);
    assert_eq!(bbox.width, 0.01);
    assert_eq!(bbox.height, 0.01);
    assert!(bbox.x + bbox.width <= 1.0);
    assert!((bbox.x - 0.99).abs() < 1e-9);
}

#[test]
fn sheet_ref_detector_highlights_only_the_matched_substring() {
    let detector = SheetRefDetector::new(&DetectionConfig::default()).expect("detector");
    let source = page(1, vec![text_box("SEE A-101 FOR DETAIL", 0.0, 100.0, 200.0, 10.0)]);

    let candidates = detector.detect(&source);
    assert_eq!(candidates.len(), 1);

    let candidate = &candidates[0];
    assert_eq!(candidate.reference_text, "A-101");
    assert_eq!(candidate.normalized_ref, "A101");
    assert_eq!(candidate.kind, CandidateKind::SheetRef);
    assert_eq!(candidate.confidence, 0.75);
    assert!((candidate.bbox.x - 0.04).abs() < 1e-9);
    assert!((candidate.bbox.width - 0.05).abs() < 1e-9);
}

#[test]
fn sheet_ref_detector_reports_every_match_in_a_run() {
    let detector = SheetRefDetector::new(&DetectionConfig::default()).expect("detector");
    let source = page(1, vec![text_box("A-101, M1.2 AND 3/S-201", 0.0, 0.0, 230.0, 10.0)]);

    let candidates = detector.detect(&source);
    let refs = candidates
        .iter()
        .map(|candidate| (candidate.reference_text.as_str(), candidate.normalized_ref.as_str()))
        .collect::<Vec<(&str, &str)>>();
    assert_eq!(
        refs,
        vec![("A-101", "A101"), ("M1.2", "M1.2"), ("3/S-201", "S201")]
    );
}

#[test]
fn sheet_ref_detector_skips_long_or_digitless_runs() {
    let detector = SheetRefDetector::new(&DetectionConfig::default()).expect("detector");
    let long_run = "REFER TO A-101 FOR ALL DIMENSIONS AND TOLERANCES NOT SHOWN";
    let source = page(
        1,
        vec![
            text_box(long_run, 0.0, 0.0, 500.0, 10.0),
            text_box("GENERAL NOTES", 0.0, 20.0, 130.0, 10.0),
        ],
    );

    assert!(long_run.len() > 48);
    assert!(detector.detect(&source).is_empty());
}

#[test]
fn sheet_ref_detector_accepts_additional_patterns() {
    let config = DetectionConfig {
        extra_sheet_patterns: vec![r"\bDWG\s+(?P<sheet>\d{3}-\d{2})\b".to_string()],
        ..DetectionConfig::default()
    };
    let detector = SheetRefDetector::new(&config).expect("detector");
    let source = page(1, vec![text_box("DWG 100-02", 0.0, 0.0, 100.0, 10.0)]);

    let candidates = detector.detect(&source);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].normalized_ref, "100-02");
}

#[test]
fn symbol_tag_detector_pairs_stacked_codes() {
    let detector = SymbolTagDetector::new(&DetectionConfig::default()).expect("detector");
    let source = page(
        2,
        vec![
            text_box("M", 100.0, 100.0, 10.0, 12.0),
            text_box("3", 98.0, 114.0, 12.0, 12.0),
        ],
    );

    let candidates = detector.detect(&source);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].normalized_ref, "M3");
    assert_eq!(candidates[0].kind, CandidateKind::SymbolTag);
    assert_eq!(candidates[0].confidence, 0.62);
    assert!((candidates[0].bbox.x - 0.098).abs() < 1e-9);
    assert!((candidates[0].bbox.y - 0.125).abs() < 1e-9);
}

#[test]
fn symbol_tag_detector_rejects_misaligned_or_distant_codes() {
    let detector = SymbolTagDetector::new(&DetectionConfig::default()).expect("detector");
    let source = page(
        1,
        vec![
            text_box("EQ", 100.0, 100.0, 20.0, 12.0),
            text_box("4", 160.0, 114.0, 10.0, 12.0),
            text_box("AB", 400.0, 100.0, 20.0, 12.0),
            text_box("7", 405.0, 200.0, 10.0, 12.0),
            text_box("ABCDE", 600.0, 100.0, 50.0, 12.0),
            text_box("9", 620.0, 114.0, 10.0, 12.0),
        ],
    );

    assert!(detector.detect(&source).is_empty());
}

#[test]
fn pairing_strategies_agree() {
    let config = DetectionConfig::default();
    let detector = SymbolTagDetector::new(&config).expect("detector");

    let mut boxes = Vec::new();
    for column in 0..12 {
        let x = 40.0 + column as f64 * 70.0;
        boxes.push(text_box("HP", x, 100.0, 16.0, 12.0));
        boxes.push(text_box(&format!("{}", column + 1), x + 2.0, 114.0, 12.0, 12.0));
        boxes.push(text_box("NOTE", x, 400.0, 40.0, 12.0));
    }
    let source = page(4, boxes);

    let all_pairs = detector.detect_with(&source, &AllPairs);
    let grid = detector.detect_with(&source, &GridBuckets);
    assert_eq!(all_pairs.len(), 12);
    assert_eq!(all_pairs, grid);
}

#[test]
fn symbol_tag_detector_dedups_repeated_symbols() {
    let detector = SymbolTagDetector::new(&DetectionConfig::default()).expect("detector");
    let source = page(
        1,
        vec![
            text_box("AB", 100.0, 100.0, 20.0, 12.0),
            text_box("AB", 100.2, 100.3, 20.0, 12.0),
            text_box("12", 102.0, 114.0, 16.0, 12.0),
        ],
    );

    assert_eq!(detector.detect(&source).len(), 1);
}

#[test]
fn sheet_reference_resolves_to_declared_sheet() {
    let pages = vec![
        page(1, vec![text_box("SEE E-201 FOR PANEL SCHEDULE", 50.0, 50.0, 280.0, 10.0)]),
        page(5, vec![text_box("PANEL SCHEDULE", 50.0, 50.0, 140.0, 10.0)]),
    ];
    let records = vec![
        record(1, Some("E-101"), Some("Lighting Plan")),
        record(5, Some("E-201"), Some("Panel Schedules")),
    ];

    let analysis = analyzer().analyze_plan("plan-1", &pages, &records);
    assert_eq!(analysis.links.len(), 1);

    let link = &analysis.links[0];
    assert_eq!(link.source_page, 1);
    assert_eq!(link.target_page, 5);
    assert!(link.reference_text.contains("E-201"));
    assert_eq!(link.confidence, Some(0.75));
    assert_eq!(link.target_sheet_number.as_deref(), Some("E-201"));
    assert!(link.is_auto);
    assert!(analysis.unresolved.is_empty());
}

#[test]
fn unmatched_symbol_tag_is_reported_not_linked() {
    let pages = vec![
        page(1, vec![text_box("GENERAL NOTES", 10.0, 10.0, 130.0, 10.0)]),
        page(
            2,
            vec![
                text_box("M", 100.0, 100.0, 10.0, 12.0),
                text_box("3", 98.0, 114.0, 12.0, 12.0),
            ],
        ),
    ];
    let records = vec![record(1, None, None), record(2, None, None)];

    let analysis = analyzer().analyze_plan("plan-1", &pages, &records);
    assert!(analysis.links.is_empty());
    assert_eq!(analysis.unresolved.len(), 1);
    assert_eq!(analysis.unresolved[0].source_page, 2);
    assert_eq!(analysis.unresolved[0].normalized_ref, "M3");
    assert_eq!(analysis.unresolved[0].kind, CandidateKind::SymbolTag);
}

#[test]
fn symbol_tag_falls_back_to_text_search_preferring_schedules() {
    let pages = vec![
        page(
            2,
            vec![
                text_box("M", 100.0, 100.0, 10.0, 12.0),
                text_box("3", 98.0, 114.0, 12.0, 12.0),
            ],
        ),
        page(3, vec![text_box("UNIT M-3 ABOVE CEILING", 10.0, 10.0, 200.0, 10.0)]),
        page(4, vec![text_box("M 3 AIR HANDLER", 10.0, 10.0, 150.0, 10.0)]),
    ];
    let records = vec![
        record(2, Some("M-101"), Some("Mechanical Plan")),
        record(3, Some("M-102"), Some("Mechanical Roof Plan")),
        record(4, Some("M-501"), Some("Mechanical Equipment Schedule")),
    ];

    let analysis = analyzer().analyze_plan("plan-1", &pages, &records);
    let symbol_links = analysis
        .links
        .iter()
        .filter(|link| link.source_page == 2)
        .collect::<Vec<_>>();
    assert_eq!(symbol_links.len(), 1);
    assert_eq!(symbol_links[0].target_page, 4);
    assert_eq!(symbol_links[0].confidence, Some(0.62));
}

#[test]
fn symbol_tag_fallback_takes_first_page_without_preferred_titles() {
    let records = vec![
        record(1, None, Some("Plan")),
        record(2, None, Some("Elevations")),
        record(3, None, Some("Sections")),
    ];
    let blobs = BTreeMap::from([
        (1, "TAG".to_string()),
        (2, "SEE AB12 BELOW".to_string()),
        (3, "AB-12".to_string()),
    ]);
    let detector = SheetRefDetector::new(&DetectionConfig::default()).expect("detector");
    let resolver = TargetResolver::new(&records, &blobs, &detector, 10);

    let candidate = ReferenceCandidate {
        source_page: 1,
        reference_text: "AB 12".to_string(),
        normalized_ref: "AB12".to_string(),
        bbox: NormBox {
            x: 0.1,
            y: 0.1,
            width: 0.02,
            height: 0.02,
        },
        confidence: 0.62,
        kind: CandidateKind::SymbolTag,
    };

    let resolution = resolver.resolve(vec![candidate]);
    assert_eq!(resolution.resolved.len(), 1);
    assert_eq!(resolution.resolved[0].target.page_number, 2);
}

#[test]
fn sheet_number_embedded_in_title_is_indexed() {
    let pages = vec![
        page(1, vec![text_box("REFER TO E-301", 10.0, 10.0, 140.0, 10.0)]),
        page(7, vec![]),
    ];
    let records = vec![
        record(1, Some("E-101"), None),
        record(7, None, Some("E-301 Lighting Plan Level 3")),
    ];

    let analysis = analyzer().analyze_plan("plan-1", &pages, &records);
    assert_eq!(analysis.links.len(), 1);
    assert_eq!(analysis.links[0].target_page, 7);
}

#[test]
fn self_references_are_dropped_silently() {
    let pages = vec![page(5, vec![text_box("SHEET E-201", 900.0, 760.0, 90.0, 20.0)])];
    let records = vec![record(5, Some("E-201"), Some("Panel Schedules"))];

    let analysis = analyzer().analyze_plan("plan-1", &pages, &records);
    assert!(analysis.links.is_empty());
    assert!(analysis.unresolved.is_empty());
}

#[test]
fn unresolved_references_are_deduplicated_and_capped() {
    let config = DetectionConfig {
        unresolved_limit: 2,
        ..DetectionConfig::default()
    };
    let analyzer = Analyzer::new(config).expect("analyzer");
    let pages = vec![page(
        1,
        vec![
            text_box("SEE X-1", 0.0, 0.0, 70.0, 10.0),
            text_box("SEE X-1", 0.0, 50.0, 70.0, 10.0),
            text_box("SEE X-2", 0.0, 100.0, 70.0, 10.0),
            text_box("SEE X-3", 0.0, 150.0, 70.0, 10.0),
        ],
    )];
    let records = vec![record(1, None, None)];

    let analysis = analyzer.analyze_plan("plan-1", &pages, &records);
    let refs = analysis
        .unresolved
        .iter()
        .map(|entry| entry.normalized_ref.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(refs, vec!["X1", "X2"]);
}

#[test]
fn rerunning_analysis_yields_identical_links() {
    let pages = vec![
        page(
            1,
            vec![
                text_box("SEE A-201", 10.0, 10.0, 90.0, 10.0),
                text_box("SEE A-201", 10.0, 10.0, 90.0, 10.0),
                text_box("3/A-301", 400.0, 300.0, 70.0, 10.0),
            ],
        ),
        page(2, vec![]),
        page(3, vec![]),
    ];
    let records = vec![
        record(1, Some("A-101"), None),
        record(2, Some("A-201"), None),
        record(3, Some("A-301"), None),
    ];

    let analyzer = analyzer();
    let first = analyzer.analyze_plan("plan-1", &pages, &records);
    let second = analyzer.analyze_plan("plan-1", &pages, &records);

    assert_eq!(first.links.len(), 2);
    assert_eq!(first.links, second.links);
    for link in &first.links {
        assert_ne!(link.source_page, link.target_page);
        for value in [link.x_norm, link.y_norm, link.width_norm, link.height_norm] {
            assert!((0.0..=1.0).contains(&value));
        }
        assert!(link.width_norm >= 0.01);
        assert!(link.height_norm >= 0.01);
    }
}

#[test]
fn build_links_keeps_first_row_per_dedup_key() {
    let resolved = ResolvedCandidate {
        candidate: ReferenceCandidate {
            source_page: 1,
            reference_text: "A-201".to_string(),
            normalized_ref: "A201".to_string(),
            bbox: NormBox {
                x: 0.123456,
                y: 0.5,
                width: 0.001,
                height: 0.02,
            },
            confidence: 0.75,
            kind: CandidateKind::SheetRef,
        },
        target: SheetTarget {
            page_number: 2,
            sheet_number: Some("A-201".to_string()),
            title: None,
        },
    };
    let mut other = resolved.clone();
    other.candidate.bbox.y = 0.6;

    let links = build_links(
        "plan-1",
        &[resolved.clone(), other.clone(), resolved, other],
        0.01,
    );
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].dedup_key, "1:2:A201:0.1235:0.5000");
    assert_eq!(links[0].x_norm, 0.1235);
    assert_eq!(links[0].width_norm, 0.01);
}

#[test]
fn group_revisions_orders_newest_first() {
    let rows = vec![
        revision(10, Some(2), Some(false)),
        revision(4, Some(1), Some(false)),
        revision(12, Some(3), Some(true)),
    ];

    let groups = group_revisions(&rows);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].sheet_key, "A101");
    let sorts = groups[0]
        .revisions
        .iter()
        .map(|row| row.revision_sort)
        .collect::<Vec<Option<i64>>>();
    assert_eq!(sorts, vec![Some(3), Some(2), Some(1)]);
}

#[test]
fn group_revisions_breaks_ties_by_current_then_page() {
    let rows = vec![
        revision(3, Some(1), Some(false)),
        revision(9, Some(1), Some(false)),
        revision(2, Some(1), Some(true)),
    ];

    let groups = group_revisions(&rows);
    let pages = groups[0]
        .revisions
        .iter()
        .map(|row| row.target_page)
        .collect::<Vec<u32>>();
    assert_eq!(pages, vec![2, 9, 3]);
}

#[test]
fn derive_revisions_falls_back_to_page_keys_and_marks_current() {
    let mut first = record(1, Some("A-101"), None);
    first.revision_label = Some("REV 1".to_string());
    let mut second = record(2, Some("A 101"), None);
    second.revision_label = Some("REV 2".to_string());
    let third = record(3, None, None);

    let rows = derive_revisions("plan-1", &[first, second, third]);
    let groups = group_revisions(&rows);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].sheet_key, "A101");
    assert_eq!(groups[0].revisions[0].target_page, 2);
    assert_eq!(groups[0].revisions[0].is_current, Some(true));
    assert_eq!(groups[0].revisions[1].is_current, Some(false));
    assert_eq!(groups[1].sheet_key, "PAGE3");
    assert_eq!(groups[1].revisions[0].revision_label, "Original");
}

#[test]
fn revision_labels_and_sort_values() {
    let labels = RevisionLabelDetector::new().expect("revision labels");
    assert_eq!(
        labels.detect("REV 1 ISSUED REV 3 REV 2").as_deref(),
        Some("REV 3")
    );
    assert_eq!(labels.detect("REVISION B").as_deref(), Some("REV B"));
    assert_eq!(labels.detect("REV. NO. 2").as_deref(), Some("REV 2"));
    assert_eq!(labels.detect("REV4").as_deref(), Some("REV 4"));
    assert_eq!(labels.detect("REVIEWED BY"), None);
    assert_eq!(revision_sort_value("REV 12"), Some(12));
    assert_eq!(revision_sort_value("REV B"), Some(2));
    assert_eq!(revision_sort_value("Preliminary"), None);
}

#[test]
fn revisions_heading_is_not_a_letter_revision() {
    let labels = RevisionLabelDetector::new().expect("revision labels");
    assert_eq!(
        labels
            .detect("REVISIONS NO. DATE REV 3 ISSUED FOR PERMIT")
            .as_deref(),
        Some("REV 3")
    );
    assert_eq!(labels.detect("REVISIONS NO. DATE DESCRIPTION"), None);
}

#[test]
fn revisions_heading_does_not_steal_the_current_revision() {
    let analyzer = analyzer();
    let older = page(
        1,
        vec![
            text_box("REVISIONS", 700.0, 600.0, 90.0, 10.0),
            text_box("NO. DATE", 700.0, 615.0, 80.0, 10.0),
            text_box("REV 2", 700.0, 630.0, 50.0, 10.0),
            text_box("A-101", 850.0, 720.0, 60.0, 18.0),
        ],
    );
    let newer = page(
        2,
        vec![
            text_box("REV 3", 700.0, 630.0, 50.0, 10.0),
            text_box("A-101", 850.0, 720.0, 60.0, 18.0),
        ],
    );

    let records = [older, newer]
        .iter()
        .map(|source| analyzer.fallback_record("plan-1", source, &page_text_blob(source)))
        .collect::<Vec<PageRecord>>();
    assert_eq!(records[0].revision_label.as_deref(), Some("REV 2"));
    assert_eq!(records[1].revision_label.as_deref(), Some("REV 3"));

    let groups = group_revisions(&derive_revisions("plan-1", &records));
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].sheet_key, "A101");
    assert_eq!(groups[0].revisions[0].target_page, 2);
    assert_eq!(groups[0].revisions[0].is_current, Some(true));
    assert_eq!(groups[0].revisions[1].revision_sort, Some(2));
}

#[test]
fn fallback_record_infers_sheet_from_title_block() {
    let detector = SheetRefDetector::new(&DetectionConfig::default()).expect("detector");
    let source = page(
        6,
        vec![
            text_box("SEE M-201", 100.0, 100.0, 90.0, 10.0),
            text_box("M-101", 850.0, 720.0, 60.0, 18.0),
            text_box("M-102", 850.0, 760.0, 40.0, 8.0),
        ],
    );
    let blob = page_text_blob(&source);

    let labels = RevisionLabelDetector::new().expect("revision labels");
    let fallback = fallback_page_record("plan-1", &source, &blob, &detector, &labels);
    assert_eq!(fallback.page_number, 6);
    assert_eq!(fallback.page_title.as_deref(), Some("Sheet 6"));
    assert_eq!(fallback.sheet_number.as_deref(), Some("M-101"));
    assert_eq!(fallback.discipline.as_deref(), Some("Mechanical"));
    assert_eq!(infer_discipline("FP-2"), Some("Fire Protection".to_string()));
    assert_eq!(infer_discipline("X-2"), None);
}
